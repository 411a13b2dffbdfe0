use crate::error::{DexError, Result};
use crate::reader::Reader;

const DEX_MAGIC: &[u8; 4] = b"dex\n";
const ODEX_MAGIC: &[u8; 4] = b"dey\n";

/// Locates the dex payload inside a container.
///
/// A plain dex file is returned whole. An optimized container (`dey`
/// magic) stores the embedded dex at the offset/length pair sitting right
/// after its magic, so the payload is the sub-slice those describe. The
/// odex dependency and auxiliary sections are ignored.
pub fn dex_payload(bytes: &[u8]) -> Result<&[u8]> {
    let mut header = Reader::new(bytes);
    let magic = header.take(8)?;

    if magic.starts_with(DEX_MAGIC) {
        return Ok(bytes);
    }
    if !magic.starts_with(ODEX_MAGIC) {
        let mut m = [0u8; 8];
        m.copy_from_slice(magic);
        return Err(DexError::InvalidMagic(m));
    }

    let offset = header.read_u32()? as usize;
    let length = header.read_u32()? as usize;
    let end = offset.checked_add(length).filter(|&end| end <= bytes.len());
    match end {
        Some(end) => Ok(&bytes[offset..end]),
        None => Err(DexError::TruncatedPayload {
            offset,
            length,
            file_size: bytes.len(),
        }),
    }
}
