//! Minimal base64 decoder (RFC 4648 standard alphabet).
//!
//! Only decoding is needed: logo payloads arrive base64-encoded inside
//! `ASSET_RESPONSE` messages and are persisted as raw bytes. Strictness
//! over leniency — invalid characters or bad padding reject the whole
//! payload rather than salvage a prefix.

/// Decode failure; callers treat the payload as a remote error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base64Error {
    /// Input length is not a multiple of 4.
    BadLength,
    /// A character outside the alphabet (or misplaced padding).
    BadChar,
}

impl core::fmt::Display for Base64Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadLength => write!(f, "length not a multiple of 4"),
            Self::BadChar => write!(f, "invalid base64 character"),
        }
    }
}

fn value_of(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode a padded base64 string.
pub fn decode(input: &str) -> Result<Vec<u8>, Base64Error> {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.len() % 4 != 0 {
        return Err(Base64Error::BadLength);
    }

    let padding = bytes.iter().rev().take_while(|&&b| b == b'=').count();
    if padding > 2 {
        return Err(Base64Error::BadChar);
    }

    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for (i, quad) in bytes.chunks_exact(4).enumerate() {
        let last = i == bytes.len() / 4 - 1;
        let mut acc: u32 = 0;
        let mut digits = 0;
        for (j, &c) in quad.iter().enumerate() {
            if c == b'=' {
                // Padding only in the final quad's tail positions.
                if !last || j < 4 - padding {
                    return Err(Base64Error::BadChar);
                }
                acc <<= 6;
            } else {
                let v = value_of(c).ok_or(Base64Error::BadChar)?;
                acc = (acc << 6) | u32::from(v);
                digits += 1;
            }
        }
        out.push((acc >> 16) as u8);
        if digits > 2 {
            out.push((acc >> 8) as u8);
        }
        if digits > 3 {
            out.push(acc as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfc_vectors() {
        assert_eq!(decode("").unwrap(), b"");
        assert_eq!(decode("Zg==").unwrap(), b"f");
        assert_eq!(decode("Zm8=").unwrap(), b"fo");
        assert_eq!(decode("Zm9v").unwrap(), b"foo");
        assert_eq!(decode("Zm9vYg==").unwrap(), b"foob");
        assert_eq!(decode("Zm9vYmE=").unwrap(), b"fooba");
        assert_eq!(decode("Zm9vYmFy").unwrap(), b"foobar");
    }

    #[test]
    fn decodes_binary_payload() {
        // PNG signature.
        assert_eq!(
            decode("iVBORw0KGgo=").unwrap(),
            [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        );
    }

    #[test]
    fn rejects_bad_length() {
        assert_eq!(decode("Zm9"), Err(Base64Error::BadLength));
    }

    #[test]
    fn rejects_invalid_character() {
        assert_eq!(decode("Zm9!"), Err(Base64Error::BadChar));
    }

    #[test]
    fn rejects_interior_padding() {
        assert_eq!(decode("Zg==Zm9v"), Err(Base64Error::BadChar));
    }

    #[test]
    fn rejects_excess_padding() {
        assert_eq!(decode("Z==="), Err(Base64Error::BadChar));
    }
}
