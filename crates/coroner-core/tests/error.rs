//! Tests for error handling

use std::path::PathBuf;

use coroner_core::error::{CoronerError, ErrorKind, Result};
use coroner_core::outcome::{CorruptData, CorruptKind};
use coroner_core::types::{Address, PointerWidth, SpaceId};

fn corrupt() -> CorruptData
{
    CorruptData::new(
        SpaceId::from_raw(1),
        PointerWidth::Bits32,
        Address::new(0x1050),
        "memory segment",
        CorruptKind::Unreadable { len: 24 },
    )
}

#[test]
fn test_not_found_display()
{
    let error = CoronerError::NotFound {
        name: "libfoo.so".to_string(),
        searched: vec![PathBuf::from("/a/libfoo.so"), PathBuf::from("/b/libfoo.so")],
    };
    let message = format!("{}", error);
    assert!(message.contains("libfoo.so"));
    assert!(message.contains("2 locations"));
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(error.is_recoverable());
}

#[test]
fn test_corrupt_display_uses_pointer_width()
{
    let error: CoronerError = corrupt().into();
    let message = format!("{}", error);
    assert!(message.contains("memory segment"));
    assert!(message.contains("0x00001050"));
    assert_eq!(error.kind(), ErrorKind::Corrupt);
    assert!(error.is_recoverable());
}

#[test]
fn test_resource_misuse_is_not_recoverable()
{
    let error = CoronerError::ResourceMisuse {
        name: "libfoo.so".to_string(),
    };
    let message = format!("{}", error);
    assert!(message.contains("disposed"));
    assert_eq!(error.kind(), ErrorKind::ResourceMisuse);
    assert!(!error.is_recoverable());
}

#[test]
fn test_read_out_of_range_display()
{
    let error = CoronerError::ReadOutOfRange {
        name: "libfoo.so".to_string(),
        offset: 16,
        len: 8,
        size: 20,
    };
    let message = format!("{}", error);
    assert!(message.contains("offset 16"));
    assert!(message.contains("20 bytes"));
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_io_error_conversion()
{
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
    let error: CoronerError = io_err.into();

    match error {
        CoronerError::Io(_) => {
            // Expected: io::Error should convert to Io variant
        }
        _ => panic!("Expected Io variant"),
    }
    assert_eq!(error.kind(), ErrorKind::IoFailure);
}

#[test]
fn test_image_format_kind()
{
    let error = CoronerError::ImageFormat("bad magic".to_string());
    assert!(format!("{}", error).contains("bad magic"));
    assert_eq!(error.kind(), ErrorKind::IoFailure);
}

#[test]
fn test_result_type()
{
    fn test_function() -> Result<u64>
    {
        Ok(42)
    }

    assert_eq!(test_function().unwrap(), 42);
}
