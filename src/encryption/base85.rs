//! Base85 as defined by RFC 1924, with partial trailing chunks.

use crate::errors::{ClientError, Result};

const ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

fn digit_value(ch: u8) -> Option<u32> {
    ALPHABET.iter().position(|&c| c == ch).map(|idx| idx as u32)
}

/// Encodes bytes into base85 text.
pub fn encode(data: &[u8]) -> String {
    let padding = (4 - data.len() % 4) % 4;
    let mut out = Vec::with_capacity((data.len() + padding) / 4 * 5);

    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = ALPHABET[(value % 85) as usize];
            value /= 85;
        }
        out.extend_from_slice(&digits);
    }

    out.truncate(out.len() - padding);
    // Every byte comes from the ASCII alphabet.
    out.into_iter().map(char::from).collect()
}

/// Decodes base85 text. Rejects characters outside the alphabet and
/// chunks that overflow 32 bits.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let padding = (5 - bytes.len() % 5) % 5;
    let mut out = Vec::with_capacity((bytes.len() + padding) / 5 * 4);

    for (chunk_index, chunk) in bytes.chunks(5).enumerate() {
        let mut acc: u64 = 0;
        for idx in 0..5 {
            let ch = chunk.get(idx).copied().unwrap_or(b'~');
            let value = digit_value(ch).ok_or_else(|| {
                ClientError::BadData(format!(
                    "bad base85 character at position {}",
                    chunk_index * 5 + idx
                ))
            })?;
            acc = acc * 85 + u64::from(value);
        }
        let word = u32::try_from(acc).map_err(|_| {
            ClientError::BadData(format!("base85 overflow in chunk starting at {}", chunk_index * 5))
        })?;
        out.extend_from_slice(&word.to_be_bytes());
    }

    out.truncate(out.len() - padding);
    Ok(out)
}
