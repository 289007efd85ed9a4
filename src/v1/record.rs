use crate::v1::range::{RangeEntry, RangeSet};
use num_derive::{FromPrimitive, ToPrimitive};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use strum_macros::Display;

/// Number of purposes a consent string carries.
pub const PURPOSES_COUNT: u16 = 24;

/// Record versions are stored on 6 bits.
const MAX_RECORD_VERSION: u8 = 0x3f;

pub type IdSet = BTreeSet<u16>;

/// How vendor consents are laid out in a consent string.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, FromPrimitive, ToPrimitive)]
pub enum VendorEncoding {
    BitField = 0,
    Range = 1,
}

/// Vendor consents, in one of the two encodings supported by the format.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum VendorConsents {
    /// IDs of allowed vendors, one bit per vendor from 1 to the max vendor ID.
    BitField(IdSet),
    /// A default consent value, and the entries for which it is inverted.
    Range {
        default_consent: bool,
        entries: RangeSet,
    },
}

impl VendorConsents {
    /// Builds vendor consents from the set of allowed vendor IDs.
    ///
    /// When every vendor from 1 to `max_vendor_id` has the same consent value, a single range
    /// covering all of them is used instead of a bitfield. Results of
    /// [`ConsentRecord::is_vendor_allowed`] are the same either way.
    pub fn from_allowed(max_vendor_id: u16, allowed: &IdSet) -> Self {
        let allowed_count = allowed
            .iter()
            .filter(|&&id| (1..=max_vendor_id).contains(&id))
            .count();

        if max_vendor_id > 0 && allowed_count == usize::from(max_vendor_id) {
            Self::all(max_vendor_id, true)
        } else if max_vendor_id > 0 && allowed_count == 0 {
            Self::all(max_vendor_id, false)
        } else {
            Self::BitField(
                allowed
                    .iter()
                    .copied()
                    .filter(|&id| id >= 1 && id <= max_vendor_id)
                    .collect(),
            )
        }
    }

    /// The same consent value for every vendor from 1 to `max_vendor_id`.
    pub fn all(max_vendor_id: u16, allowed: bool) -> Self {
        let entries = if max_vendor_id > 0 {
            RangeSet::from_iter([RangeEntry::Range(1, max_vendor_id)])
        } else {
            RangeSet::new()
        };

        // every vendor is covered by the range, so the default applies to none of them
        Self::Range {
            default_consent: !allowed,
            entries,
        }
    }

    pub fn encoding(&self) -> VendorEncoding {
        match self {
            VendorConsents::BitField(_) => VendorEncoding::BitField,
            VendorConsents::Range { .. } => VendorEncoding::Range,
        }
    }
}

impl Default for VendorConsents {
    fn default() -> Self {
        Self::BitField(IdSet::new())
    }
}

/// A single consent decision, as stored in a consent string.
///
/// Timestamps are milliseconds since the Unix epoch. The format only stores
/// tenths of seconds, so the last two digits are lost when encoding.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsentRecord {
    pub version: u8,
    pub created: u64,
    pub last_updated: u64,
    pub cmp_id: u16,
    pub cmp_version: u16,
    pub consent_screen: u8,
    pub consent_language: String,
    pub vendor_list_version: u16,
    pub purposes_allowed: IdSet,
    pub max_vendor_id: u16,
    pub vendor_consents: VendorConsents,
}

impl ConsentRecord {
    /// Creates the first version of a record, with no purpose and no vendor allowed.
    pub fn new(
        now: u64,
        cmp_id: u16,
        cmp_version: u16,
        consent_screen: u8,
        consent_language: &str,
        vendor_list_version: u16,
    ) -> Self {
        Self {
            version: 1,
            created: now,
            last_updated: now,
            cmp_id,
            cmp_version,
            consent_screen,
            consent_language: consent_language.to_ascii_uppercase(),
            vendor_list_version,
            purposes_allowed: IdSet::new(),
            max_vendor_id: 0,
            vendor_consents: VendorConsents::default(),
        }
    }

    /// Returns a copy of this record for a new consent action, with an incremented version.
    pub fn next_revision(&self, now: u64) -> Self {
        Self {
            version: self.version.wrapping_add(1) & MAX_RECORD_VERSION,
            last_updated: now,
            ..self.clone()
        }
    }

    /// Allows or disallows every purpose and every vendor up to `max_vendor_id`.
    pub fn with_consent_all(self, max_vendor_id: u16, allowed: bool) -> Self {
        let purposes_allowed = if allowed {
            (1..=PURPOSES_COUNT).collect()
        } else {
            IdSet::new()
        };

        Self {
            purposes_allowed,
            max_vendor_id,
            vendor_consents: VendorConsents::all(max_vendor_id, allowed),
            ..self
        }
    }

    /// Sets individual purpose and vendor choices.
    ///
    /// See [`VendorConsents::from_allowed`] for how vendors are encoded.
    pub fn with_choices(self, purposes: IdSet, max_vendor_id: u16, allowed_vendors: &IdSet) -> Self {
        Self {
            purposes_allowed: purposes,
            max_vendor_id,
            vendor_consents: VendorConsents::from_allowed(max_vendor_id, allowed_vendors),
            ..self
        }
    }

    /// Whether the given purpose is allowed. The lowest purpose ID is 1.
    pub fn is_purpose_allowed(&self, id: u16) -> bool {
        (1..=PURPOSES_COUNT).contains(&id) && self.purposes_allowed.contains(&id)
    }

    /// Whether the given vendor is allowed. The lowest vendor ID is 1.
    ///
    /// Vendors above the max vendor ID are never allowed.
    pub fn is_vendor_allowed(&self, id: u16) -> bool {
        if id == 0 || id > self.max_vendor_id {
            return false;
        }

        match &self.vendor_consents {
            VendorConsents::BitField(allowed) => allowed.contains(&id),
            VendorConsents::Range {
                default_consent,
                entries,
            } => *default_consent ^ entries.contains(id),
        }
    }

    pub fn allowed_purposes(&self) -> IdSet {
        (1..=PURPOSES_COUNT)
            .filter(|&id| self.is_purpose_allowed(id))
            .collect()
    }

    pub fn allowed_vendors(&self) -> IdSet {
        (1..=self.max_vendor_id)
            .filter(|&id| self.is_vendor_allowed(id))
            .collect()
    }

    pub fn vendor_encoding(&self) -> VendorEncoding {
        self.vendor_consents.encoding()
    }

    pub fn created_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.created)
    }

    pub fn last_updated_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.last_updated)
    }
}
