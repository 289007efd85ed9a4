use assert_json_diff::assert_json_eq;
use gdpr_cmp::v1::{ConsentRecord, Padding};
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// A consent string along with the record it decodes to.
#[derive(Deserialize)]
pub struct Fixture {
    consent_string: String,
    #[serde(default)]
    padded: bool,
    expected_record: ConsentRecord,
}

impl Fixture {
    pub fn load_from_file<P: AsRef<Path>>(p: P) -> io::Result<Self> {
        let f = File::open(p)?;
        serde_json::from_reader(&f).map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))
    }

    pub fn assert_decodes_to_expected_record(&self) {
        let record = match ConsentRecord::from_str(&self.consent_string) {
            Ok(r) => r,
            Err(e) => panic!("decode error: {e}"),
        };

        assert_json_eq!(record, self.expected_record);
    }

    /// The expected record encodes to the exact same string.
    pub fn assert_encodes_back(&self) {
        let padding = if self.padded {
            Padding::Padded
        } else {
            Padding::None
        };

        assert_eq!(
            self.expected_record.encode(padding).unwrap(),
            self.consent_string
        );
    }
}
