//! # Principals
//!
//! A principal is the address of a canister (or of a caller). It is an opaque
//! byte string of at most 29 bytes with a checksummed textual form:
//!
//! ```text
//! group5(base32(crc32_be(bytes) ++ bytes))   e.g. "rwlgt-iiaaa-aaaaa-aaaaa-cai"
//! ```
//!
//! Base32 is RFC 4648, lowercase, without padding.

use std::fmt;
use std::str::FromStr;

const MAX_LEN: usize = 29;
const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
const ANONYMOUS_TAG: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    /// More than 29 bytes.
    TooLong(usize),
    /// Decoded text is shorter than its own checksum.
    TooShort,
    /// Character outside the base32 alphabet (dashes excepted).
    InvalidChar(char),
    /// Checksum does not match the decoded bytes.
    ChecksumMismatch,
    /// Text decodes, but is not how this principal is written.
    NotCanonical { expected: String },
}

impl fmt::Display for PrincipalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong(len) => write!(f, "principal is {} bytes, at most {} allowed", len, MAX_LEN),
            Self::TooShort => write!(f, "principal text is too short"),
            Self::InvalidChar(c) => write!(f, "invalid character {:?} in principal text", c),
            Self::ChecksumMismatch => write!(f, "principal checksum mismatch"),
            Self::NotCanonical { expected } => write!(f, "principal text is not canonical, expected {}", expected),
        }
    }
}

impl std::error::Error for PrincipalError {}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    bytes: Vec<u8>,
}

impl Principal {
    /// The management canister, `aaaaa-aa`.
    pub fn management() -> Self {
        Self { bytes: Vec::new() }
    }

    /// The anonymous caller, `2vxsx-fae`.
    pub fn anonymous() -> Self {
        Self { bytes: vec![ANONYMOUS_TAG] }
    }

    /// The id of the `index`-th canister of a subnet.
    pub fn from_canister_index(index: u64) -> Self {
        let mut bytes = index.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0x01, 0x01]);
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrincipalError> {
        if bytes.len() > MAX_LEN {
            return Err(PrincipalError::TooLong(bytes.len()));
        }
        Ok(Self { bytes: bytes.to_vec() })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_anonymous(&self) -> bool {
        self.bytes == [ANONYMOUS_TAG]
    }

    pub fn to_text(&self) -> String {
        let mut raw = crc32(&self.bytes).to_be_bytes().to_vec();
        raw.extend_from_slice(&self.bytes);

        let encoded = base32_encode(&raw);
        let mut text = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                text.push('-');
            }
            text.push(c);
        }
        text
    }

    pub fn from_text(text: &str) -> Result<Self, PrincipalError> {
        let lowered = text.to_ascii_lowercase();
        let compact: String = lowered.chars().filter(|c| *c != '-').collect();

        let raw = base32_decode(&compact)?;
        if raw.len() < 4 {
            return Err(PrincipalError::TooShort);
        }

        let (checksum, body) = raw.split_at(4);
        let principal = Self::from_slice(body)?;
        if checksum != crc32(body).to_be_bytes() {
            return Err(PrincipalError::ChecksumMismatch);
        }

        let expected = principal.to_text();
        if expected != lowered {
            return Err(PrincipalError::NotCanonical { expected });
        }
        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl TryFrom<&str> for Principal {
    type Error = PrincipalError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_text(s)
    }
}

/// CRC-32 (IEEE 802.3, reflected).
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer = 0u32;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Result<Vec<u8>, PrincipalError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer = 0u32;
    let mut bits = 0u32;

    for c in text.chars() {
        let value = ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or(PrincipalError::InvalidChar(c))? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_principals() {
        assert_eq!(Principal::management().to_text(), "aaaaa-aa");
        assert_eq!(Principal::anonymous().to_text(), "2vxsx-fae");
        assert_eq!(Principal::from_canister_index(0).to_text(), "rwlgt-iiaaa-aaaaa-aaaaa-cai");
        assert_eq!(Principal::from_canister_index(1).to_text(), "rrkah-fqaaa-aaaaa-aaaaq-cai");
        assert_eq!(Principal::from_canister_index(65536).to_text(), "wd3ea-eiaaa-aaaaa-baaaa-cai");
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(Principal::from_text("aaaaa-aa").unwrap(), Principal::management());
        assert_eq!(Principal::from_text("2vxsx-fae").unwrap(), Principal::anonymous());
        assert_eq!(
            "rdmx6-jaaaa-aaaaa-aaadq-cai".parse::<Principal>().unwrap(),
            Principal::from_canister_index(7)
        );
        assert!(Principal::from_text("2VXSX-FAE").unwrap().is_anonymous());
    }

    #[test]
    fn test_parse_rejects_bad_text() {
        assert_eq!(Principal::from_text("aaaaa-a1"), Err(PrincipalError::InvalidChar('1')));
        assert_eq!(Principal::from_text("aaa"), Err(PrincipalError::TooShort));
        assert_eq!(Principal::from_text("baaaa-aa"), Err(PrincipalError::ChecksumMismatch));
        assert!(matches!(
            Principal::from_text("aaaaaaa"),
            Err(PrincipalError::NotCanonical { expected }) if expected == "aaaaa-aa"
        ));
    }

    #[test]
    fn test_rejects_oversized_principal() {
        assert_eq!(Principal::from_slice(&[0u8; 30]), Err(PrincipalError::TooLong(30)));
        assert!(Principal::from_slice(&[0u8; 29]).is_ok());
    }
}
