use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use thiserror::Error;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const PAD: char = '=';

/// The error type that describes failures to decode Base64 encoded strings.
#[derive(Error, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum DecodeError {
    /// An invalid byte was found in the input. The offset and offending byte are provided.
    #[error("invalid byte {1} at offset {0}")]
    InvalidByte(usize, u8),
}

/// Whether encoded output is padded with `=` to a multiple of 4 characters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Padding {
    #[default]
    None,
    Padded,
}

/// Encodes bytes using the URL safe Base64 dictionary.
pub fn encode(bytes: &[u8], padding: Padding) -> String {
    let total_bits = bytes.len() * 8;
    let mut r = BitReader::endian(bytes, BigEndian);
    let mut output = String::with_capacity(total_bits.div_ceil(24) * 4);

    for _ in 0..total_bits / 6 {
        let value = r.read::<u8>(6).expect("read within input should not fail");
        output.push(base64_char(value));
    }

    // last partial character is filled with zeroes
    let remaining = (total_bits % 6) as u32;
    if remaining > 0 {
        let value = r
            .read::<u8>(remaining)
            .expect("read within input should not fail");
        output.push(base64_char(value << (6 - remaining)));
    }

    if padding == Padding::Padded {
        while output.len() % 4 != 0 {
            output.push(PAD);
        }
    }

    output
}

/// Decodes a URL safe Base64 string, with or without trailing padding.
///
/// Bits left over after the last whole byte are dropped.
pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
    let data = s.trim_end_matches(PAD);

    // output buffer is never larger than the input string, pre-allocate to avoid reallocations
    let mut buffer = Vec::with_capacity(data.len());
    let mut bw = BitWriter::endian(&mut buffer, BigEndian);

    // write 6 bits for every decoded character
    for (i, b) in data.bytes().enumerate() {
        let value = base64_value(b).ok_or(DecodeError::InvalidByte(i, b))?;
        bw.write(6, value).expect("write into vec should not fail");
    }
    drop(bw);

    Ok(buffer)
}

fn base64_char(value: u8) -> char {
    char::from(ALPHABET[usize::from(value & 0x3f)])
}

fn base64_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(b'A' => Some(0))]
    #[test_case(b'Z' => Some(25))]
    #[test_case(b'a' => Some(26))]
    #[test_case(b'z' => Some(51))]
    #[test_case(b'0' => Some(52))]
    #[test_case(b'9' => Some(61))]
    #[test_case(b'-' => Some(62) ; "dash")]
    #[test_case(b'_' => Some(63) ; "underscore")]
    #[test_case(b'+' => None ; "plus")]
    #[test_case(b'/' => None ; "slash")]
    #[test_case(b'=' => None ; "equal")]
    #[test_case(b'#' => None ; "sharp")]
    fn base64_value_map(b: u8) -> Option<u8> {
        base64_value(b)
    }

    #[test_case("Zm9vYmFy" => b"foobar".to_vec() ; "aligned")]
    #[test_case("Zm9vYg" => b"foob".to_vec() ; "unpadded")]
    #[test_case("Zm9vYg==" => b"foob".to_vec() ; "padded")]
    #[test_case("Zm9vYmE=" => b"fooba".to_vec() ; "single pad")]
    #[test_case("_-8" => vec![0xff, 0xef] ; "url safe characters")]
    #[test_case("" => is empty ; "empty string")]
    fn test_decode(s: &str) -> Vec<u8> {
        decode(s).unwrap()
    }

    #[test_case("===" => is empty ; "padding only")]
    fn test_decode_padding_only(s: &str) -> Vec<u8> {
        decode(s).unwrap()
    }

    #[test_case("Zm9v+mFy" => DecodeError::InvalidByte(4, b'+') ; "standard alphabet")]
    #[test_case("Zm=9" => DecodeError::InvalidByte(2, b'=') ; "padding in the middle")]
    #[test_case("a  " => DecodeError::InvalidByte(1, b' ') ; "whitespaces")]
    fn test_decode_error(s: &str) -> DecodeError {
        decode(s).unwrap_err()
    }

    #[test_case(b"foobar", Padding::None => "Zm9vYmFy")]
    #[test_case(b"foob", Padding::None => "Zm9vYg")]
    #[test_case(b"foob", Padding::Padded => "Zm9vYg==")]
    #[test_case(b"fooba", Padding::Padded => "Zm9vYmE=")]
    #[test_case(&[0xff, 0xef], Padding::None => "_-8" ; "url safe characters")]
    #[test_case(b"", Padding::Padded => "" ; "empty")]
    fn test_encode(bytes: &[u8], padding: Padding) -> String {
        encode(bytes, padding)
    }

    #[test]
    fn round_trip_all_lengths() {
        let data = (0..=255u8).collect::<Vec<_>>();
        for len in 0..data.len() {
            for padding in [Padding::None, Padding::Padded] {
                let s = encode(&data[..len], padding);
                assert_eq!(decode(&s).unwrap(), &data[..len]);
            }
        }
    }
}
