use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use coroner_core::image::SparseImage;
use coroner_core::resolver::{LibraryResolver, ResolverSettings};
use coroner_core::types::{Address, DumpKind};
use coroner_core::AddressSpace;
use coroner_utils::{
    info, init_logging, init_logging_to_file, init_logging_with_level, InspectConfig, LogFormat, LogLevel, LoggingError,
    LoggingGuard,
};

mod render;

/// Postmortem inspector for captured process images.
#[derive(Parser, Debug)]
#[command(name = "coroner")]
#[command(version)]
#[command(about = "Postmortem inspector for captured process images", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,

    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides CORONER_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Write logs to this file (or directory) instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List the address ranges captured in the image
    Regions
    {
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Walk the segment lists and print every segment
    Segments
    {
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Find the segment (and module) containing an address
    FindSegment
    {
        #[command(flatten)]
        image: ImageArgs,
        /// Address to look up (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// List threads with their registers, properties and stacks
    Threads
    {
        #[command(flatten)]
        image: ImageArgs,
        /// Also walk and print each thread's stack frames
        #[arg(long, default_value_t = false)]
        frames: bool,
    },
    /// List the modules loaded in the captured process
    Modules
    {
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Map an address to the nearest symbol of its module
    Symbol
    {
        #[command(flatten)]
        image: ImageArgs,
        /// Address to symbolicate (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
        #[command(flatten)]
        lookup: LookupArgs,
    },
    /// Locate an artifact the way symbol lookup would
    Resolve
    {
        /// Artifact name as recorded in the image
        name: String,
        #[command(flatten)]
        lookup: LookupArgs,
        /// Do not log a warning when the artifact is missing
        #[arg(long, default_value_t = false)]
        silent: bool,
    },
}

/// Which image to open and where its runtime lists start
#[derive(Args, Debug)]
struct ImageArgs
{
    /// Path to the ELF core image
    image: PathBuf,
    /// Address of a thread list head (repeatable)
    #[arg(long = "thread-list", value_parser = parse_address)]
    thread_lists: Vec<Address>,
    /// Address of a segment list header (repeatable)
    #[arg(long = "segment-list", value_parser = parse_address)]
    segment_lists: Vec<Address>,
    /// Address of a module list head (repeatable)
    #[arg(long = "module-list", value_parser = parse_address)]
    module_lists: Vec<Address>,
    /// The image is a minimal dump (no registers or stack sections)
    #[arg(long, default_value_t = false)]
    minimal: bool,
}

/// Where to look for artifacts, on top of `CORONER_*` settings
#[derive(Args, Debug, Default)]
struct LookupArgs
{
    /// Directory to search for artifacts (repeatable, searched before CORONER_SEARCH_PATH)
    #[arg(long = "search-path")]
    search_path: Vec<PathBuf>,
    /// Artifact store directory (overrides CORONER_ARCHIVE_DIR)
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Store fetch timeout in milliseconds (overrides CORONER_STORE_TIMEOUT_MS)
    #[arg(long, value_name = "MS")]
    store_timeout_ms: Option<u64>,
}

fn main()
{
    let cli = Cli::parse();

    // Logs go to stderr (or a file) so results on stdout stay clean
    let _guard = match start_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn start_logging(cli: &Cli) -> Result<LoggingGuard, LoggingError>
{
    let format = cli.log_format.unwrap_or_default();
    match (&cli.log_file, cli.log_level) {
        (Some(path), level) => init_logging_to_file(path, level, format).map(|(guard, _)| guard),
        (None, Some(level)) => init_logging_with_level(level, format),
        (None, None) => init_logging(),
    }
}

fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>>
{
    match command {
        Commands::Regions { image } => {
            let space = open_space(&image)?;
            let width = space.pointer_width();
            for (base, len) in space.captured_ranges() {
                println!("{}", render::region(base, len, width));
            }
            Ok(())
        }
        Commands::Segments { image } => {
            if image.segment_lists.is_empty() {
                return Err("no segment list given (use --segment-list <address>)".into());
            }
            let space = open_space(&image)?;
            let width = space.pointer_width();
            for list in &image.segment_lists {
                println!("{}", render::segment_list(&space.dump_segment_list(*list), width));
            }
            for (a, b) in space.segment_index().overlaps() {
                let segments = space.segment_index().segments();
                println!(
                    "overlap: {} and {}",
                    render::segment(&segments[a], width),
                    render::segment(&segments[b], width)
                );
            }
            Ok(())
        }
        Commands::FindSegment { image, address } => {
            let space = open_space(&image)?;
            let width = space.pointer_width();
            let matches = space.segment_index().segments_containing(address);
            if matches.is_empty() {
                println!("{} is not in any segment", address.format(width));
            }
            for segment in matches {
                println!("{}", render::segment(segment, width));
            }
            let module = space.library_for_address(address);
            println!("module: {}", render::outcome(&module, |lib| lib.name.clone()));
            Ok(())
        }
        Commands::Threads { image, frames } => {
            let space = open_space(&image)?;
            let width = space.pointer_width();
            info!("{} threads in {}", space.threads().len(), image.image.display());
            for thread in space.threads() {
                println!("{}", render::thread(thread, width, frames));
            }
            Ok(())
        }
        Commands::Modules { image } => {
            let space = open_space(&image)?;
            let width = space.pointer_width();
            for entry in space.libraries() {
                println!("{}", render::library(entry, width));
            }
            Ok(())
        }
        Commands::Symbol { image, address, lookup } => {
            let space = open_space(&image)?;
            let resolver = resolver_settings(&lookup, InspectConfig::from_env()?).build()?;
            let result = space.symbolicate(address, &resolver);
            println!("{}", render::symbol(address, &result, space.pointer_width()));
            resolver.dispose();
            Ok(())
        }
        Commands::Resolve { name, lookup, silent } => {
            let resolver = resolver_settings(&lookup, InspectConfig::from_env()?).build()?;
            let source = resolver.resolve_with(&name, silent)?;
            println!("{}", render::artifact(&source, source.len()?));
            resolver.dispose();
            Ok(())
        }
    }
}

fn open_space(args: &ImageArgs) -> coroner_core::Result<AddressSpace>
{
    info!("Opening image {}", args.image.display());
    let image = SparseImage::from_elf_core_file(&args.image)?;
    let dump_kind = if args.minimal { DumpKind::Minimal } else { DumpKind::Full };

    let mut builder = AddressSpace::builder(Arc::new(image)).dump_kind(dump_kind);
    for root in &args.thread_lists {
        builder = builder.thread_list(*root);
    }
    for list in &args.segment_lists {
        builder = builder.segment_list(*list);
    }
    for root in &args.module_lists {
        builder = builder.module_list(*root);
    }
    builder.build()
}

/// Command-line flags win over the environment; search paths from both are kept, flags first.
fn resolver_settings(args: &LookupArgs, config: InspectConfig) -> ResolverSettings
{
    let defaults = ResolverSettings::default();
    ResolverSettings {
        search_path: args.search_path.iter().cloned().chain(config.search_path).collect(),
        archive_dir: args.archive.clone().or(config.archive_dir),
        store_timeout: args
            .store_timeout_ms
            .map(Duration::from_millis)
            .or(config.store_timeout)
            .unwrap_or(defaults.store_timeout),
        ..defaults
    }
}

/// Parse an address in hex (`0x` prefix) or decimal.
fn parse_address(s: &str) -> Result<Address, String>
{
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    };
    parsed.map(Address::new).map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_address()
    {
        assert_eq!(parse_address("0x1000").unwrap(), Address::new(0x1000));
        assert_eq!(parse_address("0XdEaD_0000").unwrap(), Address::new(0xdead_0000));
        assert_eq!(parse_address("4096").unwrap(), Address::new(4096));
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_flags_override_environment()
    {
        let args = LookupArgs {
            search_path: vec![PathBuf::from("/flag")],
            archive: Some(PathBuf::from("/flag-archive")),
            store_timeout_ms: None,
        };
        let config = InspectConfig {
            search_path: vec![PathBuf::from("/env")],
            archive_dir: Some(PathBuf::from("/env-archive")),
            store_timeout: Some(Duration::from_millis(250)),
        };

        let settings = resolver_settings(&args, config);
        assert_eq!(settings.search_path, vec![PathBuf::from("/flag"), PathBuf::from("/env")]);
        assert_eq!(settings.archive_dir, Some(PathBuf::from("/flag-archive")));
        assert_eq!(settings.store_timeout, Duration::from_millis(250));
        assert_eq!(settings.working_dir, None);
    }

    #[test]
    fn test_default_store_timeout()
    {
        let settings = resolver_settings(&LookupArgs::default(), InspectConfig::default());
        assert_eq!(settings.store_timeout, ResolverSettings::default().store_timeout);
        assert!(settings.search_path.is_empty());
    }

    #[test]
    fn test_cli_parses_image_lists()
    {
        let cli = Cli::try_parse_from([
            "coroner",
            "segments",
            "core.dump",
            "--segment-list",
            "0x2000",
            "--segment-list",
            "0x3000",
            "--minimal",
        ])
        .unwrap();
        let Commands::Segments { image } = cli.command else {
            panic!("expected segments command");
        };
        assert_eq!(image.segment_lists, vec![Address::new(0x2000), Address::new(0x3000)]);
        assert!(image.minimal);
        assert!(image.thread_lists.is_empty());
    }

    #[test]
    fn test_cli_parses_regions()
    {
        let cli = Cli::try_parse_from(["coroner", "regions", "core.dump"]).unwrap();
        let Commands::Regions { image } = cli.command else {
            panic!("expected regions command");
        };
        assert_eq!(image.image, PathBuf::from("core.dump"));
        assert!(!image.minimal);
    }

    #[test]
    fn test_cli_rejects_bad_address()
    {
        assert!(Cli::try_parse_from(["coroner", "symbol", "core.dump", "nowhere"]).is_err());
    }
}
