//! The character-string presentation format of text-bearing record types.
//!
//! Route53 stores every TXT and SPF value as one or more double quoted character strings. Inside the quotes, `"`
//! and `\` are escaped with a backslash and every byte outside of printable ASCII is written as a three digit octal
//! escape (`\351`). A single character string holds at most 255 bytes, longer values are split into several quoted
//! segments separated by a space.

use thiserror::Error;

/// The maximum number of raw bytes in a single character string.
pub const MAX_SEGMENT_LEN: usize = 255;

/// Represents a malformed character-string value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A backslash at the very end of the input.
    #[error("unterminated escape sequence at offset {0}")]
    UnterminatedEscape(usize),

    /// A backslash followed by anything other than `"`, `\` or three octal digits.
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    /// A quoted segment without its closing quote.
    #[error("unterminated quoted string starting at offset {0}")]
    UnterminatedQuote(usize),

    /// A quote in the middle of an unquoted segment.
    #[error("unexpected quote at offset {0}")]
    UnexpectedQuote(usize),

    /// A quoted segment directly followed by something other than whitespace.
    #[error("missing segment separator at offset {0}")]
    MissingSeparator(usize),

    #[error("decoded value is not valid UTF-8")]
    InvalidUtf8,
}

/// Encodes raw bytes into their quoted wire form.
///
/// Values whose escaped form exceeds 255 bytes are cut into chunks of at most 255 raw bytes before escaping; every
/// chunk is quoted on its own and the chunks are joined with a single space.
pub fn encode(raw: &[u8]) -> String {
    let escaped = escape(raw);
    if escaped.len() <= MAX_SEGMENT_LEN {
        return format!("\"{}\"", escaped);
    }

    raw.chunks(MAX_SEGMENT_LEN)
        .map(|chunk| format!("\"{}\"", escape(chunk)))
        .collect::<Vec<String>>()
        .join(" ")
}

/// Encodes text into its quoted wire form, see [`encode`].
pub fn encode_str(text: &str) -> String {
    encode(text.as_bytes())
}

/// Decodes a wire value into raw bytes.
///
/// The value may consist of several whitespace separated segments, which are concatenated. Segments are usually
/// quoted, unquoted segments end at the next whitespace.
pub fn decode(wire: &str) -> Result<Vec<u8>, DecodeError> {
    let input = wire.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;

    loop {
        while pos < input.len() && input[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos == input.len() {
            return Ok(out);
        }

        if input[pos] == b'"' {
            let start = pos;
            pos += 1;
            loop {
                match input.get(pos) {
                    None => return Err(DecodeError::UnterminatedQuote(start)),
                    Some(b'"') => {
                        pos += 1;
                        break;
                    }
                    Some(b'\\') => pos = unescape_at(input, pos, &mut out)?,
                    Some(&octet) => {
                        out.push(octet);
                        pos += 1;
                    }
                }
            }
            // segments must be separated by whitespace
            if let Some(&octet) = input.get(pos) {
                if !octet.is_ascii_whitespace() {
                    return Err(DecodeError::MissingSeparator(pos));
                }
            }
        } else {
            while let Some(&octet) = input.get(pos) {
                match octet {
                    b'"' => return Err(DecodeError::UnexpectedQuote(pos)),
                    b'\\' => pos = unescape_at(input, pos, &mut out)?,
                    _ if octet.is_ascii_whitespace() => break,
                    _ => {
                        out.push(octet);
                        pos += 1;
                    }
                }
            }
        }
    }
}

/// Decodes a wire value into text, see [`decode`].
pub fn decode_str(wire: &str) -> Result<String, DecodeError> {
    String::from_utf8(decode(wire)?).map_err(|_| DecodeError::InvalidUtf8)
}

/// Resolves the escape sequences of an unquoted value, e.g. a record set name like `\052.example.com.`.
pub fn unescape(raw: &str) -> Result<String, DecodeError> {
    let input = raw.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    while let Some(&octet) = input.get(pos) {
        if octet == b'\\' {
            pos = unescape_at(input, pos, &mut out)?;
        } else {
            out.push(octet);
            pos += 1;
        }
    }
    String::from_utf8(out).map_err(|_| DecodeError::InvalidUtf8)
}

fn escape(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &octet in raw {
        match octet {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(char::from(octet)),
            _ => out.push_str(&format!("\\{:03o}", octet)),
        }
    }
    out
}

/// Decodes the escape sequence starting with the backslash at `pos` and returns the position after it.
fn unescape_at(input: &[u8], pos: usize, out: &mut Vec<u8>) -> Result<usize, DecodeError> {
    match input.get(pos + 1) {
        None => Err(DecodeError::UnterminatedEscape(pos)),
        Some(&octet @ (b'"' | b'\\')) => {
            out.push(octet);
            Ok(pos + 2)
        }
        Some(b'0'..=b'7') => {
            let digits = input
                .get(pos + 1..pos + 4)
                .ok_or(DecodeError::UnterminatedEscape(pos))?;
            let mut value: u16 = 0;
            for &digit in digits {
                if !(b'0'..=b'7').contains(&digit) {
                    return Err(DecodeError::InvalidEscape(pos));
                }
                value = value * 8 + u16::from(digit - b'0');
            }
            let octet = u8::try_from(value).map_err(|_| DecodeError::InvalidEscape(pos))?;
            out.push(octet);
            Ok(pos + 4)
        }
        Some(_) => Err(DecodeError::InvalidEscape(pos)),
    }
}
