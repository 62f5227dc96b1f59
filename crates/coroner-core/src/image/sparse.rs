//! Sparse in-memory image and ELF core loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use object::{Object, ObjectSegment};
use tracing::debug;

use super::{ImageMemory, ReadFault};
use crate::error::{CoronerError, Result};
use crate::types::{Address, ByteOrder, PointerWidth};

/// Image made of captured regions keyed by base address
///
/// Reads may span several regions as long as they are contiguous. A gap
/// anywhere in the requested range is a [`ReadFault`].
///
/// ## Example
///
/// ```rust
/// use coroner_core::image::{ImageMemory, SparseImage};
/// use coroner_core::types::{Address, ByteOrder, PointerWidth};
///
/// let image = SparseImage::builder(PointerWidth::Bits64, ByteOrder::Little)
///     .map(Address::new(0x1000), vec![1, 2, 3, 4])
///     .build();
///
/// let mut buf = [0u8; 2];
/// image.read_into(Address::new(0x1002), &mut buf).unwrap();
/// assert_eq!(buf, [3, 4]);
/// assert!(image.read_into(Address::new(0x1003), &mut buf).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SparseImage
{
    width: PointerWidth,
    order: ByteOrder,
    regions: BTreeMap<u64, Arc<[u8]>>,
}

/// Builder for [`SparseImage`].
#[derive(Debug)]
pub struct SparseImageBuilder
{
    image: SparseImage,
}

impl SparseImageBuilder
{
    /// Add a captured region. A region with the same base replaces the old one.
    #[must_use]
    pub fn map(mut self, base: Address, bytes: impl Into<Arc<[u8]>>) -> Self
    {
        let bytes = bytes.into();
        if !bytes.is_empty() {
            self.image.regions.insert(base.value(), bytes);
        }
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> SparseImage
    {
        self.image
    }
}

impl SparseImage
{
    /// Start building an image for the given pointer width and byte order.
    #[must_use]
    pub fn builder(width: PointerWidth, order: ByteOrder) -> SparseImageBuilder
    {
        SparseImageBuilder {
            image: SparseImage {
                width,
                order,
                regions: BTreeMap::new(),
            },
        }
    }

    /// Load the `PT_LOAD` segments of an ELF core file held in memory
    ///
    /// Pointer width and byte order come from the ELF header. Segments with
    /// no file-backed bytes (`p_filesz == 0`) were not captured and are left
    /// unmapped.
    ///
    /// ## Errors
    ///
    /// `ImageFormat` if the bytes are not a parseable ELF file or a segment's
    /// file range lies outside the data.
    pub fn from_elf_core(bytes: &[u8]) -> Result<Self>
    {
        let file = object::File::parse(bytes)
            .map_err(|err| CoronerError::ImageFormat(format!("failed to parse core file: {err}")))?;

        let width = PointerWidth::from_is_64(file.is_64());
        let order = if file.is_little_endian() {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };

        let mut builder = SparseImage::builder(width, order);
        for segment in file.segments() {
            let data = segment.data().map_err(|err| {
                CoronerError::ImageFormat(format!("unreadable segment at 0x{:x}: {err}", segment.address()))
            })?;
            if data.is_empty() {
                debug!("Skipping uncaptured segment at 0x{:x}", segment.address());
                continue;
            }
            builder = builder.map(Address::new(segment.address()), data.to_vec());
        }

        let image = builder.build();
        debug!("Loaded core image with {} captured regions ({width})", image.regions.len());
        Ok(image)
    }

    /// Read and load an ELF core file from disk.
    ///
    /// ## Errors
    ///
    /// `Io` if the file cannot be read, `ImageFormat` if it cannot be parsed.
    pub fn from_elf_core_file(path: impl AsRef<Path>) -> Result<Self>
    {
        let bytes = fs::read(path.as_ref())?;
        Self::from_elf_core(&bytes)
    }

    /// Number of captured regions.
    pub fn region_count(&self) -> usize
    {
        self.regions.len()
    }

    fn region_for(&self, address: u64) -> Option<(u64, &Arc<[u8]>)>
    {
        let (&base, bytes) = self.regions.range(..=address).next_back()?;
        let offset = address - base;
        (offset < bytes.len() as u64).then_some((base, bytes))
    }
}

impl ImageMemory for SparseImage
{
    fn read_into(&self, address: Address, buf: &mut [u8]) -> std::result::Result<(), ReadFault>
    {
        let total = buf.len();
        let fault = |at: u64| ReadFault {
            address: Address::new(at),
            len: total,
        };
        let mut cursor = address.value();
        let mut filled = 0;

        while filled < total {
            let Some((base, bytes)) = self.region_for(cursor) else {
                return Err(fault(cursor));
            };
            // region_for guarantees cursor lies inside the region
            let offset = usize::try_from(cursor - base).map_err(|_| fault(cursor))?;
            let available = bytes.len() - offset;
            let take = available.min(total - filled);
            buf[filled..filled + take].copy_from_slice(&bytes[offset..offset + take]);
            filled += take;
            cursor = cursor.checked_add(take as u64).ok_or_else(|| fault(cursor))?;
        }

        Ok(())
    }

    fn pointer_width(&self) -> PointerWidth
    {
        self.width
    }

    fn byte_order(&self) -> ByteOrder
    {
        self.order
    }

    fn mapped_ranges(&self) -> Vec<(Address, u64)>
    {
        self.regions
            .iter()
            .map(|(&base, bytes)| (Address::new(base), bytes.len() as u64))
            .collect()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn image() -> SparseImage
    {
        SparseImage::builder(PointerWidth::Bits32, ByteOrder::Little)
            .map(Address::new(0x100), vec![0xaa; 0x10])
            .map(Address::new(0x110), vec![0xbb; 0x10])
            .map(Address::new(0x200), vec![0xcc; 0x10])
            .build()
    }

    #[test]
    fn test_read_spans_contiguous_regions()
    {
        let mut buf = [0u8; 4];
        image().read_into(Address::new(0x10e), &mut buf).unwrap();
        assert_eq!(buf, [0xaa, 0xaa, 0xbb, 0xbb]);
    }

    #[test]
    fn test_read_across_gap_faults_at_gap()
    {
        let mut buf = [0u8; 8];
        let fault = image().read_into(Address::new(0x11c), &mut buf).unwrap_err();
        assert_eq!(fault.address, Address::new(0x120));
        assert_eq!(fault.len, 8);
    }

    #[test]
    fn test_read_below_first_region_faults()
    {
        let mut buf = [0u8; 1];
        assert!(image().read_into(Address::new(0x10), &mut buf).is_err());
    }

    #[test]
    fn test_empty_regions_are_not_mapped()
    {
        let image = SparseImage::builder(PointerWidth::Bits64, ByteOrder::Little)
            .map(Address::new(0x100), Vec::new())
            .build();
        assert_eq!(image.region_count(), 0);
    }

    #[test]
    fn test_rejects_non_elf_core()
    {
        let err = SparseImage::from_elf_core(b"not an elf file").unwrap_err();
        assert!(matches!(err, CoronerError::ImageFormat(_)));
    }
}
