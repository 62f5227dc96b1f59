//! Names read from an artifact's symbol table.

use std::fmt;

use rustc_demangle::try_demangle;

/// Source language of a symbol, inferred from its linkage-name mangling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// `_R` (v0) names, or `_ZN` names the Rust demangler accepts.
    Rust,
    /// Other Itanium `_Z` names.
    Cpp,
    /// Plain identifiers, as C and `extern "C"` code exports them.
    C,
    /// Anything else (compiler-generated labels, versioned names).
    Unknown,
}

impl SymbolLanguage
{
    /// Classify a raw linkage name; `demangles` says whether the Rust
    /// demangler accepted it.
    #[must_use]
    pub fn classify(raw: &str, demangles: bool) -> Self
    {
        if raw.starts_with("_R") || (raw.starts_with("_ZN") && demangles) {
            SymbolLanguage::Rust
        } else if raw.starts_with("_Z") {
            SymbolLanguage::Cpp
        } else if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            SymbolLanguage::C
        } else {
            SymbolLanguage::Unknown
        }
    }
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::C => "c",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Linkage name of a symbol found in a module artifact
///
/// ## Example
///
/// ```rust
/// use coroner_core::types::{SymbolLanguage, SymbolName};
///
/// let name = SymbolName::from_linkage_name("_ZN3foo3bar17h0123456789abcdefE");
/// assert_eq!(name.language(), SymbolLanguage::Rust);
/// assert_eq!(name.display_name(), "foo::bar");
/// assert_eq!(SymbolName::from_linkage_name("malloc").language(), SymbolLanguage::C);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    /// Build from parts already worked out by the caller.
    pub fn new(raw: String, demangled: Option<String>, language: SymbolLanguage) -> Self
    {
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Demangle and classify a name exactly as it appears in the symbol table
    ///
    /// Only Rust names are demangled; the hash suffix is dropped.
    #[must_use]
    pub fn from_linkage_name(raw: &str) -> Self
    {
        let demangled = try_demangle(raw).ok().map(|d| format!("{d:#}"));
        let language = SymbolLanguage::classify(raw, demangled.is_some());
        Self::new(raw.to_string(), demangled, language)
    }

    /// Name as stored in the artifact.
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    /// Demangled form, if the name was mangled Rust.
    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// Demangled form when there is one, else the raw name.
    pub fn display_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.display_name())
    }
}
