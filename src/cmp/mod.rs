//! Consent management flows.
//!
//! A [`ConsentManager`] owns the CMP configuration and a [`ConsentStore`], where the consent
//! string and GDPR applicability are saved under the keys defined by the IAB for in-app CMPs.
//!
//! Two screens produce consent strings:
//! - the simple screen, where the user either accepts or refuses everything, see
//!   [`ConsentManager::consent_all`],
//! - the details screen, where each purpose and vendor is toggled individually through
//!   [`ConsentChoices`], see [`ConsentManager::save_choices`].
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use gdpr_cmp::cmp::{CmpConfig, CmpOutcome, ConsentManager, MemoryStore};
//!
//! let mut cmp = ConsentManager::new(CmpConfig::default(), MemoryStore::new());
//! cmp.set_subject_to_gdpr(true)?;
//!
//! // no vendor list could be fetched, the default max vendor ID is used
//! let outcome = cmp.consent_all(None, true, 1_525_000_000_000)?;
//! assert_eq!(outcome, CmpOutcome::ConsentAll);
//!
//! let record = cmp.record().ok_or("no record")?;
//! assert!(record.is_vendor_allowed(121));
//! assert!(cmp.has_consent_string()?);
//! # Ok(())
//! # }
//! ```
//!
use crate::catalog::Catalog;
use crate::v1::{self, ConsentRecord, EncodeError, Padding};
use num_derive::{FromPrimitive, ToPrimitive};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, warn};

pub use choices::ConsentChoices;
pub use region::{is_gdpr_region, EuCountry};
pub use store::{ConsentStore, MemoryStore, CONSENT_STRING_KEY, SUBJECT_TO_GDPR_KEY};

mod choices;
mod region;
mod store;

const LANGUAGE_PLACEHOLDER: &str = "{lang}";

/// Vendor list version used when no vendor list is available.
const FALLBACK_VENDOR_LIST_VERSION: u16 = 1;

/// CMP settings.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct CmpConfig {
    pub cmp_id: u16,
    pub cmp_version: u16,
    /// Screen ID stored when the user accepts or refuses everything.
    pub simple_screen_id: u8,
    /// Screen ID stored when the user saves individual choices.
    pub details_screen_id: u8,
    pub consent_language: String,
    /// Max vendor ID used when the vendor list has no vendors or could not be fetched.
    pub default_max_vendor_id: u16,
    pub vendor_list_url: String,
    /// Translations URL, where `{lang}` is replaced by a lowercase language code.
    pub localized_purposes_url: String,
    /// Country of the device, used when GDPR applicability has not been stored.
    pub country: Option<String>,
}

impl Default for CmpConfig {
    fn default() -> Self {
        Self {
            cmp_id: 99,
            cmp_version: 3,
            simple_screen_id: 1,
            details_screen_id: 2,
            consent_language: "EN".to_string(),
            default_max_vendor_id: 121,
            vendor_list_url: "https://vendorlist.consensu.org/vendorlist.json".to_string(),
            localized_purposes_url: "https://vendorlist.consensu.org/purposes-{lang}.json"
                .to_string(),
            country: None,
        }
    }
}

impl CmpConfig {
    /// URL of the translated purposes for `lang`, or `None` for English, which the vendor list
    /// is written in.
    pub fn localized_purposes_url_for(&self, lang: &str) -> Option<String> {
        let lang = lang.trim();
        if lang.is_empty() || lang.eq_ignore_ascii_case("en") {
            return None;
        }

        Some(
            self.localized_purposes_url
                .replace(LANGUAGE_PLACEHOLDER, &lang.to_ascii_lowercase()),
        )
    }
}

/// Result codes reported to the host application at the end of a consent flow.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash, FromPrimitive, ToPrimitive)]
pub enum CmpOutcome {
    FailedToWriteConsentString = 37,
    CouldNotFetchVendorList = 38,
    ConsentCustomPartial = 39,
    ConsentAll = 40,
    ConsentNone = 41,
    CanceledConsent = 42,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CmpError {
    #[error("unable to encode consent string: {0}")]
    Encode(#[from] EncodeError),
    #[error("consent store failure: {0}")]
    Store(#[from] io::Error),
}

impl CmpError {
    /// Result code to report for this failure.
    pub fn outcome(&self) -> CmpOutcome {
        match self {
            CmpError::Encode(_) | CmpError::Store(_) => CmpOutcome::FailedToWriteConsentString,
        }
    }
}

/// Drives consent flows and keeps the current record in sync with the store.
#[derive(Debug)]
pub struct ConsentManager<S> {
    config: CmpConfig,
    store: S,
    record: Option<ConsentRecord>,
}

impl<S: ConsentStore> ConsentManager<S> {
    /// Creates a manager with no current record. Call [`ConsentManager::load`] to read the
    /// stored one.
    pub fn new(config: CmpConfig, store: S) -> Self {
        Self {
            config,
            store,
            record: None,
        }
    }

    pub fn config(&self) -> &CmpConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The current record, either loaded or produced by the last consent flow.
    pub fn record(&self) -> Option<&ConsentRecord> {
        self.record.as_ref()
    }

    /// Reads and decodes the stored consent string.
    ///
    /// A stored string that cannot be decoded is treated as if the user never consented.
    pub fn load(&mut self) -> Result<Option<&ConsentRecord>, CmpError> {
        self.record = match self.store.get(CONSENT_STRING_KEY)? {
            Some(s) => match ConsentRecord::parse_str(&s) {
                Ok(record) => {
                    debug!(consent_string = %s, version = record.version, "loaded consent string");
                    Some(record)
                }
                Err(e) => {
                    warn!(consent_string = %s, error = %e, "ignoring invalid stored consent string");
                    None
                }
            },
            None => None,
        };

        Ok(self.record.as_ref())
    }

    pub fn consent_string(&self) -> Result<Option<String>, CmpError> {
        Ok(self.store.get(CONSENT_STRING_KEY)?)
    }

    pub fn has_consent_string(&self) -> Result<bool, CmpError> {
        Ok(self.consent_string()?.is_some_and(|s| !s.is_empty()))
    }

    /// Whether GDPR applies to the user.
    ///
    /// A stored value takes precedence, otherwise the configured country is checked.
    pub fn is_subject_to_gdpr(&self) -> Result<bool, CmpError> {
        Ok(match self.store.get(SUBJECT_TO_GDPR_KEY)? {
            Some(v) => v == "1",
            None => self.config.country.as_deref().is_some_and(is_gdpr_region),
        })
    }

    pub fn set_subject_to_gdpr(&mut self, subject: bool) -> Result<(), CmpError> {
        self.store
            .set(SUBJECT_TO_GDPR_KEY, if subject { "1" } else { "0" })?;
        Ok(())
    }

    /// Removes the stored consent string and GDPR applicability.
    pub fn clear(&mut self) -> Result<(), CmpError> {
        self.store.remove(SUBJECT_TO_GDPR_KEY)?;
        self.store.remove(CONSENT_STRING_KEY)?;
        self.record = None;
        debug!("cleared consent data");
        Ok(())
    }

    /// Initial state of the details screen: the current record if there is one, otherwise
    /// everything set to `default_consent_all`.
    pub fn choices(&self, catalog: &Catalog, default_consent_all: bool) -> ConsentChoices {
        match &self.record {
            Some(record) => ConsentChoices::from_record(catalog, record),
            None => ConsentChoices::new(catalog, default_consent_all),
        }
    }

    /// Allows or refuses every purpose and vendor.
    ///
    /// The consent string is only persisted if the user is subject to GDPR.
    pub fn consent_all(
        &mut self,
        catalog: Option<&Catalog>,
        allowed: bool,
        now: u64,
    ) -> Result<CmpOutcome, CmpError> {
        let max_vendor_id = self.max_vendor_id(catalog);
        let record = self.next_record(catalog, self.config.simple_screen_id, now, |r| {
            r.with_consent_all(max_vendor_id, allowed)
        });

        if self.is_subject_to_gdpr()? {
            self.persist(&record)?;
            self.set_subject_to_gdpr(true)?;
        } else {
            debug!("not subject to GDPR, consent string not persisted");
        }
        self.record = Some(record);

        Ok(match allowed {
            true => CmpOutcome::ConsentAll,
            false => CmpOutcome::ConsentNone,
        })
    }

    /// Saves individual purpose and vendor choices.
    pub fn save_choices(
        &mut self,
        catalog: &Catalog,
        choices: &ConsentChoices,
        now: u64,
    ) -> Result<CmpOutcome, CmpError> {
        let max_vendor_id = self.max_vendor_id(Some(catalog));
        let allowed_vendors = choices.allowed_vendors();
        let record = self.next_record(Some(catalog), self.config.details_screen_id, now, |r| {
            r.with_choices(choices.allowed_purposes(), max_vendor_id, &allowed_vendors)
        });

        self.persist(&record)?;
        self.record = Some(record);

        Ok(CmpOutcome::ConsentCustomPartial)
    }

    fn max_vendor_id(&self, catalog: Option<&Catalog>) -> u16 {
        catalog
            .and_then(Catalog::max_vendor_id)
            .unwrap_or(self.config.default_max_vendor_id)
    }

    /// Next revision of the current record, completed by `fill`.
    ///
    /// A new record is created instead if there is no current record, or if its next revision
    /// cannot be encoded.
    fn next_record<F>(
        &self,
        catalog: Option<&Catalog>,
        screen: u8,
        now: u64,
        fill: F,
    ) -> ConsentRecord
    where
        F: Fn(ConsentRecord) -> ConsentRecord,
    {
        let vendor_list_version = catalog
            .map(|c| c.vendor_list_version)
            .unwrap_or(FALLBACK_VENDOR_LIST_VERSION);

        if let Some(current) = &self.record {
            let record = fill(ConsentRecord {
                vendor_list_version,
                cmp_version: self.config.cmp_version,
                consent_screen: screen,
                ..current.next_revision(now)
            });
            match v1::to_bytes(&record) {
                Ok(_) => return record,
                Err(e) => warn!(
                    error = %e,
                    version = current.version,
                    "unable to update consent record, creating a new one"
                ),
            }
        }

        fill(ConsentRecord::new(
            now,
            self.config.cmp_id,
            self.config.cmp_version,
            screen,
            &self.config.consent_language,
            vendor_list_version,
        ))
    }

    fn persist(&mut self, record: &ConsentRecord) -> Result<(), CmpError> {
        let s = record.encode(Padding::None)?;
        self.store.set(CONSENT_STRING_KEY, &s)?;
        debug!(
            consent_string = %s,
            version = record.version,
            encoding = %record.vendor_encoding(),
            "persisted consent string"
        );
        Ok(())
    }
}
