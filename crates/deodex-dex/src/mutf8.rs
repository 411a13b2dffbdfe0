use crate::error::{DexError, Result};

/// Decodes the Modified UTF-8 encoding dex strings use.
///
/// MUTF-8 differs from UTF-8 in two ways: `U+0000` is encoded as the
/// two-byte sequence `C0 80`, and characters outside the BMP are encoded
/// as a CESU-8 surrogate pair (two three-byte units). Surrogate pairs are
/// recombined; a lone surrogate becomes `U+FFFD` rather than failing the
/// whole string, since descriptors never contain surrogates anyway.
pub(crate) fn decode(bytes: &[u8], err_offset: usize) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;

    // First pass: MUTF-8 bytes to UTF-16 code units.
    while i < bytes.len() {
        let b0 = bytes[i];
        let unit = match b0 {
            0x01..=0x7f => {
                i += 1;
                u16::from(b0)
            }
            0xc0..=0xdf => {
                let b1 = *bytes.get(i + 1).ok_or(DexError::InvalidModifiedUtf8(err_offset))?;
                if b1 & 0xc0 != 0x80 {
                    return Err(DexError::InvalidModifiedUtf8(err_offset));
                }
                i += 2;
                (u16::from(b0 & 0x1f) << 6) | u16::from(b1 & 0x3f)
            }
            0xe0..=0xef => {
                if i + 2 >= bytes.len() {
                    return Err(DexError::InvalidModifiedUtf8(err_offset));
                }
                let (b1, b2) = (bytes[i + 1], bytes[i + 2]);
                if b1 & 0xc0 != 0x80 || b2 & 0xc0 != 0x80 {
                    return Err(DexError::InvalidModifiedUtf8(err_offset));
                }
                i += 3;
                (u16::from(b0 & 0x0f) << 12) | (u16::from(b1 & 0x3f) << 6) | u16::from(b2 & 0x3f)
            }
            // 0x00 only appears as the terminator, which the caller strips.
            _ => return Err(DexError::InvalidModifiedUtf8(err_offset)),
        };
        units.push(unit);
    }

    // Second pass: UTF-16 to String, replacing unpaired surrogates.
    for ch in char::decode_utf16(units.into_iter()) {
        out.push(ch.unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(decode(b"Ljava/lang/Object;", 0).unwrap(), "Ljava/lang/Object;");
    }

    #[test]
    fn two_byte_nul_decodes_to_nul() {
        assert_eq!(decode(&[0xc0, 0x80], 0).unwrap(), "\0");
    }

    #[test]
    fn surrogate_pair_recombines() {
        // U+10400 as CESU-8: D801 DC00.
        let bytes = [0xed, 0xa0, 0x81, 0xed, 0xb0, 0x80];
        assert_eq!(decode(&bytes, 0).unwrap(), "\u{10400}");
    }

    #[test]
    fn lone_surrogate_is_replaced() {
        let bytes = [0xed, 0xa0, 0x81];
        assert_eq!(decode(&bytes, 0).unwrap(), "\u{fffd}");
    }

    #[test]
    fn truncated_sequence_is_an_error() {
        assert!(matches!(
            decode(&[0xe2, 0x82], 7),
            Err(DexError::InvalidModifiedUtf8(7))
        ));
    }
}
