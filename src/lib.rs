//! This crate is an implementation of the IAB Transparency & Consent Framework version 1
//! [Consent String Format](https://github.com/InteractiveAdvertisingBureau/GDPR-Transparency-and-Consent-Framework),
//! along with the building blocks of a consent management platform (CMP) that produces
//! such strings.
//!
//! NOTE: This is not an official IAB library.
//!
//! # Parsing consent strings
//!
//! The [`ConsentRecord`](v1/struct.ConsentRecord.html) type holds a decoded consent string.
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use std::str::FromStr;
//! use gdpr_cmp::v1::ConsentRecord;
//!
//! let s = "BONZt-1ONZt-1AHABBENAO-AAAAHCAEAASABmADYAOAAeA";
//! let record = ConsentRecord::from_str(s)?;
//!
//! // does the user consent to purpose 1, and to vendor 9?
//! assert!(record.is_purpose_allowed(1));
//! assert!(record.is_vendor_allowed(9));
//! assert!(!record.is_vendor_allowed(10));
//! # Ok(())
//! # }
//! ```
//!
//! # Producing consent strings
//!
//! Records are built from the user's choices, then encoded:
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use gdpr_cmp::v1::{ConsentRecord, IdSet, Padding};
//!
//! let now = 1_525_000_000_000;
//! let vendors: IdSet = [1, 2, 8].into();
//! let record = ConsentRecord::new(now, 99, 3, 2, "EN", 42)
//!     .with_choices([1, 2].into(), 10, &vendors);
//!
//! let s = record.encode(Padding::None)?;
//! let decoded = s.parse::<ConsentRecord>()?;
//! assert_eq!(decoded.allowed_vendors(), vendors);
//! # Ok(())
//! # }
//! ```
//!
//! The [`cmp`](cmp/index.html) module drives a whole consent flow: loading the stored string,
//! applying the user's choices against a vendor list [`Catalog`](catalog/struct.Catalog.html)
//! and persisting the result.
//!
//! # Error handling
//!
//! A string that cannot be fully decoded is considered as an error, rather than being partially
//! decoded, to avoid obtaining erroneous user consent information from corrupted payloads.
//!
pub mod catalog;
pub mod cmp;
pub mod core;
pub mod v1;
