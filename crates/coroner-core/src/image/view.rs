//! Typed field reads over an image.

use std::sync::Arc;

use super::{ImageMemory, Layouts};
use crate::outcome::{CorruptData, CorruptKind, Entry};
use crate::types::{Address, ByteOrder, PointerWidth, SpaceId};

/// Longest string field the view will read before declaring it corrupt.
pub const MAX_STRING_LEN: usize = 4096;

/// Typed, failure-classifying reader bound to one address space
///
/// Every read names the structure it is decoding (`what`), so a failure comes
/// back as a [`CorruptData`] that already says which record was bad and
/// where. Cloning is cheap; the image and layouts are shared.
#[derive(Clone)]
pub struct ImageView
{
    space: SpaceId,
    memory: Arc<dyn ImageMemory>,
    layouts: Arc<Layouts>,
}

impl std::fmt::Debug for ImageView
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ImageView")
            .field("space", &self.space)
            .field("width", &self.width())
            .finish_non_exhaustive()
    }
}

impl ImageView
{
    /// Bind an image and its layouts to an address space id.
    pub fn new(space: SpaceId, memory: Arc<dyn ImageMemory>, layouts: Arc<Layouts>) -> Self
    {
        Self { space, memory, layouts }
    }

    /// Owning address space.
    pub fn space(&self) -> SpaceId
    {
        self.space
    }

    /// Pointer width of the image.
    pub fn width(&self) -> PointerWidth
    {
        self.memory.pointer_width()
    }

    /// Record layouts in use.
    pub fn layouts(&self) -> &Layouts
    {
        &self.layouts
    }

    /// Underlying byte source.
    pub fn memory(&self) -> &Arc<dyn ImageMemory>
    {
        &self.memory
    }

    /// Build a corruption marker for this space.
    pub fn corrupt(&self, address: Address, what: &'static str, kind: CorruptKind) -> CorruptData
    {
        CorruptData::new(self.space, self.width(), address, what, kind)
    }

    /// Address of a field at `offset` inside the record at `record`.
    ///
    /// A record so close to the top of the address space that the field would
    /// wrap is reported as unreadable.
    pub fn field(&self, record: Address, offset: usize, what: &'static str) -> Entry<Address>
    {
        record
            .checked_add(offset as u64)
            .ok_or_else(|| self.corrupt(record, what, CorruptKind::Unreadable { len: offset }))
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&self, address: Address, len: usize, what: &'static str) -> Entry<Vec<u8>>
    {
        let mut buf = vec![0u8; len];
        self.memory
            .read_into(address, &mut buf)
            .map_err(|fault| self.corrupt(fault.address, what, CorruptKind::Unreadable { len: fault.len }))?;
        Ok(buf)
    }

    fn read_array<const N: usize>(&self, address: Address, what: &'static str) -> Entry<[u8; N]>
    {
        let mut buf = [0u8; N];
        self.memory
            .read_into(address, &mut buf)
            .map_err(|fault| self.corrupt(fault.address, what, CorruptKind::Unreadable { len: fault.len }))?;
        Ok(buf)
    }

    /// Read a 32-bit unsigned field.
    pub fn read_u32(&self, address: Address, what: &'static str) -> Entry<u32>
    {
        let bytes = self.read_array::<4>(address, what)?;
        Ok(match self.memory.byte_order() {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Read a 64-bit unsigned field.
    pub fn read_u64(&self, address: Address, what: &'static str) -> Entry<u64>
    {
        let bytes = self.read_array::<8>(address, what)?;
        Ok(match self.memory.byte_order() {
            ByteOrder::Little => u64::from_le_bytes(bytes),
            ByteOrder::Big => u64::from_be_bytes(bytes),
        })
    }

    /// Read a pointer-sized unsigned field, zero-extended to `u64`.
    pub fn read_uptr(&self, address: Address, what: &'static str) -> Entry<u64>
    {
        match self.width() {
            PointerWidth::Bits32 => self.read_u32(address, what).map(u64::from),
            PointerWidth::Bits64 => self.read_u64(address, what),
        }
    }

    /// Read a pointer field.
    pub fn read_pointer(&self, address: Address, what: &'static str) -> Entry<Address>
    {
        self.read_uptr(address, what).map(Address::new)
    }

    /// Read a pointer field at `offset` inside the record at `record`.
    pub fn pointer_field(&self, record: Address, offset: usize, what: &'static str) -> Entry<Address>
    {
        self.read_pointer(self.field(record, offset, what)?, what)
    }

    /// Read a pointer-sized unsigned field at `offset` inside `record`.
    pub fn uptr_field(&self, record: Address, offset: usize, what: &'static str) -> Entry<u64>
    {
        self.read_uptr(self.field(record, offset, what)?, what)
    }

    /// Read a 32-bit field at `offset` inside `record`.
    pub fn u32_field(&self, record: Address, offset: usize, what: &'static str) -> Entry<u32>
    {
        self.read_u32(self.field(record, offset, what)?, what)
    }

    /// Read a NUL-terminated UTF-8 string of at most `max_len` bytes
    ///
    /// Bytes are read one at a time so that a short string near the end of a
    /// captured region still decodes.
    pub fn read_c_string(&self, address: Address, max_len: usize, what: &'static str) -> Entry<String>
    {
        let mut bytes = Vec::new();
        let mut cursor = address;
        loop {
            if bytes.len() >= max_len.min(MAX_STRING_LEN) {
                return Err(self.corrupt(address, what, CorruptKind::BadString));
            }
            let [byte] = self.read_array::<1>(cursor, what)?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            cursor = self.field(cursor, 1, what)?;
        }
        String::from_utf8(bytes).map_err(|_| self.corrupt(address, what, CorruptKind::BadString))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::image::SparseImage;

    fn view(order: ByteOrder, width: PointerWidth, bytes: Vec<u8>) -> ImageView
    {
        let image = SparseImage::builder(width, order).map(Address::new(0x1000), bytes).build();
        ImageView::new(SpaceId::from_raw(1), Arc::new(image), Arc::new(Layouts::for_width(width)))
    }

    #[test]
    fn test_read_uptr_honours_width_and_order()
    {
        let bytes = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let le32 = view(ByteOrder::Little, PointerWidth::Bits32, bytes.clone());
        assert_eq!(le32.read_uptr(Address::new(0x1000), "word").unwrap(), 0x0403_0201);

        let be64 = view(ByteOrder::Big, PointerWidth::Bits64, bytes);
        assert_eq!(be64.read_uptr(Address::new(0x1000), "word").unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_unmapped_read_names_structure()
    {
        let v = view(ByteOrder::Little, PointerWidth::Bits64, vec![0; 4]);
        let err = v.read_u64(Address::new(0x1000), "segment header").unwrap_err();
        assert_eq!(err.what, "segment header");
        assert_eq!(err.address, Address::new(0x1004));
        assert_eq!(err.kind, CorruptKind::Unreadable { len: 8 });
        assert_eq!(err.space, SpaceId::from_raw(1));
    }

    #[test]
    fn test_read_c_string()
    {
        let v = view(ByteOrder::Little, PointerWidth::Bits64, b"libfoo.so\0junk".to_vec());
        assert_eq!(v.read_c_string(Address::new(0x1000), 64, "name").unwrap(), "libfoo.so");
    }

    #[test]
    fn test_unterminated_string_is_corrupt()
    {
        let v = view(ByteOrder::Little, PointerWidth::Bits64, b"abcdef".to_vec());
        let err = v.read_c_string(Address::new(0x1000), 4, "name").unwrap_err();
        assert_eq!(err.kind, CorruptKind::BadString);

        // Runs off the end of the region before finding a terminator
        let err = v.read_c_string(Address::new(0x1000), 64, "name").unwrap_err();
        assert!(matches!(err.kind, CorruptKind::Unreadable { .. }));
    }
}
