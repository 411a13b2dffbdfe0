use thiserror::Error;

pub type Result<T> = std::result::Result<T, DexError>;

#[derive(Debug, Error)]
pub enum DexError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),
    #[error("not a dex or odex container (magic {0:02x?})")]
    InvalidMagic([u8; 8]),
    #[error("unsupported dex version {0:?}")]
    UnsupportedVersion(String),
    #[error("big-endian dex files are not supported (endian tag 0x{0:08x})")]
    UnsupportedEndianness(u32),
    #[error("uleb128 value exceeds 32 bits at offset {0}")]
    OversizedUleb(usize),
    #[error("invalid modified UTF-8 in string data at offset {0}")]
    InvalidModifiedUtf8(usize),
    #[error("{kind} index {index} out of range (table size {size})")]
    IndexOutOfRange {
        kind: &'static str,
        index: u32,
        size: u32,
    },
    #[error("embedded dex region {offset}+{length} lies outside the odex container ({file_size} bytes)")]
    TruncatedPayload {
        offset: usize,
        length: usize,
        file_size: usize,
    },
}
