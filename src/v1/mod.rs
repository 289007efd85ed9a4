//! Version 1 of the IAB Transparency & Consent Framework consent string.
//!
//! A consent string is a bit packed record, encoded with URL-safe Base64:
//!
//! ```text
//! BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA
//! ```
//!
//! Fields are stored at fixed bit offsets, followed by the vendor section
//! which uses either one bit per vendor, or a default value and a list of
//! ranges of vendors for which the default does not apply.
//!
//! # Examples
//!
//! Decoding a string, and checking the user's choices:
//!
//! ```
//! use gdpr_cmp::v1::{ConsentDecodeError, ConsentRecord};
//!
//! fn main() -> Result<(), ConsentDecodeError> {
//!     let r = ConsentRecord::parse_str("BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA")?;
//!
//!     assert_eq!(r.cmp_id, 7);
//!     assert!(r.is_purpose_allowed(1));
//!     assert!(r.is_vendor_allowed(8));
//!     assert!(!r.is_vendor_allowed(9));
//!     Ok(())
//! }
//! ```
//!
//! Encoding a record is the exact reverse operation:
//!
//! ```
//! use gdpr_cmp::v1::{ConsentRecord, Padding};
//!
//! let s = "BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA";
//! let r: ConsentRecord = s.parse().unwrap();
//!
//! assert_eq!(r.encode(Padding::None).unwrap(), s);
//! ```
//!
use crate::core::base64;
use crate::core::base64::DecodeError;
use crate::core::{BitBuffer, FormatError};
use bitstream_io::{BigEndian, BitWrite, BitWriter};
use std::io;
use std::str::FromStr;
use thiserror::Error;

pub use crate::core::base64::Padding;
pub use range::{RangeEntry, RangeSet};
pub use record::{ConsentRecord, IdSet, VendorConsents, VendorEncoding, PURPOSES_COUNT};

mod range;
mod record;

const VERSION_BIT_OFFSET: usize = 0;
const VERSION_BIT_SIZE: usize = 6;
const CREATED_BIT_OFFSET: usize = 6;
const CREATED_BIT_SIZE: usize = 36;
const UPDATED_BIT_OFFSET: usize = 42;
const UPDATED_BIT_SIZE: usize = 36;
const CMP_ID_OFFSET: usize = 78;
const CMP_ID_SIZE: usize = 12;
const CMP_VERSION_OFFSET: usize = 90;
const CMP_VERSION_SIZE: usize = 12;
const CONSENT_SCREEN_OFFSET: usize = 102;
const CONSENT_SCREEN_SIZE: usize = 6;
const CONSENT_LANGUAGE_OFFSET: usize = 108;
const CONSENT_LANGUAGE_SIZE: usize = 12;
const VENDOR_LIST_VERSION_OFFSET: usize = 120;
const VENDOR_LIST_VERSION_SIZE: usize = 12;
const PURPOSES_OFFSET: usize = 132;
const MAX_VENDOR_ID_OFFSET: usize = 156;
const MAX_VENDOR_ID_SIZE: usize = 16;
const ENCODING_TYPE_OFFSET: usize = 172;
const VENDOR_BITFIELD_OFFSET: usize = 173;
const DEFAULT_CONSENT_OFFSET: usize = 173;
const NUM_ENTRIES_OFFSET: usize = 174;
const NUM_ENTRIES_SIZE: usize = 12;
const RANGE_ENTRY_OFFSET: usize = 186;
const VENDOR_ID_SIZE: usize = 16;

/// Timestamps are stored as deciseconds, records hold milliseconds.
const MILLIS_PER_DECISECOND: u64 = 100;

/// The error type for consent string decoding operations.
#[derive(Error, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConsentDecodeError {
    /// The string is not valid URL-safe Base64.
    #[error("unable to decode string: {0}")]
    Decode(#[from] DecodeError),
    /// The decoded data is too short, or a field cannot be read.
    ///
    /// This usually occurs if the input string is truncated.
    #[error("unable to read consent data: {0}")]
    Format(#[from] FormatError),
}

/// The error type for consent string encoding operations.
#[derive(Error, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum EncodeError {
    /// The record has no vendor, its max vendor ID is 0.
    #[error("record has no vendors")]
    NoVendors,
    /// The consent language is not made of two ASCII letters.
    #[error("invalid consent language {0:?}")]
    InvalidLanguage(String),
    #[error("invalid purpose id {0}")]
    InvalidPurposeId(u16),
    #[error("invalid vendor id {id} (max vendor id is {max_vendor_id})")]
    InvalidVendorId { id: u16, max_vendor_id: u16 },
    #[error("too many range entries ({0})")]
    TooManyRangeEntries(usize),
    /// A field value is too large for the number of bits it is stored on.
    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        bits: usize,
    },
}

/// Decodes a consent record from its binary representation.
pub fn decode(bytes: &[u8]) -> Result<ConsentRecord, ConsentDecodeError> {
    let bits = BitBuffer::from(bytes);

    let version = bits.get_int(VERSION_BIT_OFFSET, VERSION_BIT_SIZE)? as u8;
    let created = bits.get_long(CREATED_BIT_OFFSET, CREATED_BIT_SIZE)? * MILLIS_PER_DECISECOND;
    let last_updated =
        bits.get_long(UPDATED_BIT_OFFSET, UPDATED_BIT_SIZE)? * MILLIS_PER_DECISECOND;
    let cmp_id = bits.get_int(CMP_ID_OFFSET, CMP_ID_SIZE)? as u16;
    let cmp_version = bits.get_int(CMP_VERSION_OFFSET, CMP_VERSION_SIZE)? as u16;
    let consent_screen = bits.get_int(CONSENT_SCREEN_OFFSET, CONSENT_SCREEN_SIZE)? as u8;
    let consent_language =
        bits.get_six_bit_string(CONSENT_LANGUAGE_OFFSET, CONSENT_LANGUAGE_SIZE)?;
    let vendor_list_version =
        bits.get_int(VENDOR_LIST_VERSION_OFFSET, VENDOR_LIST_VERSION_SIZE)? as u16;

    let mut purposes_allowed = IdSet::new();
    for id in 1..=PURPOSES_COUNT {
        if bits.get_bit(PURPOSES_OFFSET + usize::from(id) - 1)? {
            purposes_allowed.insert(id);
        }
    }

    let max_vendor_id = bits.get_int(MAX_VENDOR_ID_OFFSET, MAX_VENDOR_ID_SIZE)? as u16;
    let vendor_consents = match bits.get_bit(ENCODING_TYPE_OFFSET)? {
        true => decode_vendor_ranges(&bits)?,
        false => decode_vendor_bitfield(&bits, max_vendor_id)?,
    };

    Ok(ConsentRecord {
        version,
        created,
        last_updated,
        cmp_id,
        cmp_version,
        consent_screen,
        consent_language,
        vendor_list_version,
        purposes_allowed,
        max_vendor_id,
        vendor_consents,
    })
}

/// Decodes a consent record from a URL-safe Base64 string, padded or not.
pub fn decode_str(s: &str) -> Result<ConsentRecord, ConsentDecodeError> {
    let bytes = base64::decode(s)?;
    decode(&bytes)
}

fn decode_vendor_bitfield(
    bits: &BitBuffer,
    max_vendor_id: u16,
) -> Result<VendorConsents, FormatError> {
    let mut allowed = IdSet::new();
    for id in 1..=max_vendor_id {
        if bits.get_bit(VENDOR_BITFIELD_OFFSET + usize::from(id) - 1)? {
            allowed.insert(id);
        }
    }

    Ok(VendorConsents::BitField(allowed))
}

fn decode_vendor_ranges(bits: &BitBuffer) -> Result<VendorConsents, FormatError> {
    let default_consent = bits.get_bit(DEFAULT_CONSENT_OFFSET)?;
    let num_entries = bits.get_int(NUM_ENTRIES_OFFSET, NUM_ENTRIES_SIZE)?;

    let mut entries = RangeSet::new();
    let mut offset = RANGE_ENTRY_OFFSET;
    for _ in 0..num_entries {
        let is_range = bits.get_bit(offset)?;
        offset += 1;

        let start = bits.get_int(offset, VENDOR_ID_SIZE)? as u16;
        offset += VENDOR_ID_SIZE;

        if is_range {
            let end = bits.get_int(offset, VENDOR_ID_SIZE)? as u16;
            offset += VENDOR_ID_SIZE;
            entries.push(RangeEntry::Range(start, end));
        } else {
            entries.push(RangeEntry::Single(start));
        }
    }

    Ok(VendorConsents::Range {
        default_consent,
        entries,
    })
}

/// Encodes a consent record into its binary representation, padded with zeroes to a whole
/// number of bytes.
///
/// The record is encoded as is: timestamps and version must be set by the caller.
pub fn to_bytes(record: &ConsentRecord) -> Result<Vec<u8>, EncodeError> {
    validate(record)?;

    let mut buffer = Vec::new();
    let mut w = FieldWriter(BitWriter::endian(&mut buffer, BigEndian));

    w.field("version", VERSION_BIT_SIZE, record.version.into())?;
    w.field(
        "created",
        CREATED_BIT_SIZE,
        record.created / MILLIS_PER_DECISECOND,
    )?;
    w.field(
        "last_updated",
        UPDATED_BIT_SIZE,
        record.last_updated / MILLIS_PER_DECISECOND,
    )?;
    w.field("cmp_id", CMP_ID_SIZE, record.cmp_id.into())?;
    w.field("cmp_version", CMP_VERSION_SIZE, record.cmp_version.into())?;
    w.field(
        "consent_screen",
        CONSENT_SCREEN_SIZE,
        record.consent_screen.into(),
    )?;
    for c in record.consent_language.bytes() {
        w.field(
            "consent_language",
            6,
            u64::from(c.to_ascii_uppercase() - b'A'),
        )?;
    }
    w.field(
        "vendor_list_version",
        VENDOR_LIST_VERSION_SIZE,
        record.vendor_list_version.into(),
    )?;

    // purposes are always computed from the current record state
    for id in 1..=PURPOSES_COUNT {
        w.bit(record.is_purpose_allowed(id));
    }

    w.field(
        "max_vendor_id",
        MAX_VENDOR_ID_SIZE,
        record.max_vendor_id.into(),
    )?;
    w.bit(record.vendor_encoding() == VendorEncoding::Range);

    match &record.vendor_consents {
        VendorConsents::BitField(allowed) => {
            for id in 1..=record.max_vendor_id {
                w.bit(allowed.contains(&id));
            }
        }
        VendorConsents::Range {
            default_consent,
            entries,
        } => {
            w.bit(*default_consent);
            w.field("num_entries", NUM_ENTRIES_SIZE, entries.len() as u64)?;

            for entry in entries {
                w.bit(entry.is_range());
                w.field("vendor_id", VENDOR_ID_SIZE, entry.min().into())?;
                if entry.is_range() {
                    w.field("vendor_id", VENDOR_ID_SIZE, entry.max().into())?;
                }
            }
        }
    }

    w.finish();
    Ok(buffer)
}

/// Encodes a consent record into a URL-safe Base64 string.
pub fn encode(record: &ConsentRecord, padding: Padding) -> Result<String, EncodeError> {
    let bytes = to_bytes(record)?;
    Ok(base64::encode(&bytes, padding))
}

/// Checks the record values that cannot be encoded, apart from the fixed size fields which
/// are checked as they are written.
fn validate(record: &ConsentRecord) -> Result<(), EncodeError> {
    if record.max_vendor_id == 0 {
        return Err(EncodeError::NoVendors);
    }

    let language = &record.consent_language;
    if language.len() != CONSENT_LANGUAGE_SIZE / 6
        || !language.bytes().all(|c| c.is_ascii_alphabetic())
    {
        return Err(EncodeError::InvalidLanguage(language.clone()));
    }

    if let Some(&id) = record
        .purposes_allowed
        .iter()
        .find(|&&id| !(1..=PURPOSES_COUNT).contains(&id))
    {
        return Err(EncodeError::InvalidPurposeId(id));
    }

    let valid_vendor = |id: u16| {
        if id == 0 || id > record.max_vendor_id {
            Err(EncodeError::InvalidVendorId {
                id,
                max_vendor_id: record.max_vendor_id,
            })
        } else {
            Ok(())
        }
    };

    match &record.vendor_consents {
        VendorConsents::BitField(allowed) => allowed.iter().try_for_each(|&id| valid_vendor(id)),
        VendorConsents::Range { entries, .. } => {
            if entries.len() >= 1 << NUM_ENTRIES_SIZE {
                return Err(EncodeError::TooManyRangeEntries(entries.len()));
            }
            // both bounds of inverted entries are checked too, they are written as is
            entries.iter().try_for_each(|e| {
                valid_vendor(e.min())?;
                valid_vendor(e.max())
            })
        }
    }
}

/// Sequential writer of fixed size fields.
struct FieldWriter<W: io::Write>(BitWriter<W, BigEndian>);

impl<W: io::Write> FieldWriter<W> {
    fn field(&mut self, field: &'static str, bits: usize, value: u64) -> Result<(), EncodeError> {
        if value >> bits != 0 {
            return Err(EncodeError::FieldOverflow { field, value, bits });
        }
        self.0
            .write(bits as u32, value)
            .expect("write into vec should not fail");
        Ok(())
    }

    fn bit(&mut self, value: bool) {
        self.0
            .write_bit(value)
            .expect("write into vec should not fail");
    }

    /// Pads the last byte with zeroes.
    fn finish(mut self) {
        self.0
            .byte_align()
            .expect("write into vec should not fail");
    }
}

impl ConsentRecord {
    /// Parses a URL-safe Base64 consent string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsentDecodeError`] if the string is not valid Base64, or is too short
    /// to contain all the fields it declares.
    pub fn parse_str(s: &str) -> Result<Self, ConsentDecodeError> {
        decode_str(s)
    }

    /// Encodes this record as a URL-safe Base64 consent string.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if the record has no vendors, or if one of its fields
    /// cannot be represented in the format.
    pub fn encode(&self, padding: Padding) -> Result<String, EncodeError> {
        encode(self, padding)
    }
}

impl FromStr for ConsentRecord {
    type Err = ConsentDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_str(s)
    }
}
