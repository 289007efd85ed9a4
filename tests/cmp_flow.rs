use gdpr_cmp::catalog::{Catalog, Purpose, Translations, Vendor};
use gdpr_cmp::cmp::{
    CmpConfig, CmpError, CmpOutcome, ConsentManager, ConsentStore, MemoryStore,
    CONSENT_STRING_KEY, SUBJECT_TO_GDPR_KEY,
};
use gdpr_cmp::core::{base64, BitBuffer};
use gdpr_cmp::v1::{self, ConsentRecord, IdSet, Padding, VendorEncoding};
use std::io;

const NOW: u64 = 1_525_000_000_000;

fn catalog() -> Catalog {
    let purposes = (1..=5)
        .map(|id| Purpose {
            id,
            name: format!("Purpose {id}"),
            description: String::new(),
        })
        .collect();

    // vendor n needs purposes 1 to (n % 5) + 1
    let vendors = (1..=30)
        .filter(|id| id % 3 != 0)
        .map(|id| Vendor {
            id,
            name: format!("Vendor {id}"),
            purpose_ids: (1..=(id % 5) + 1).collect(),
            ..Vendor::default()
        })
        .collect();

    Catalog {
        vendor_list_version: 14,
        last_updated: "2018-05-07T16:00:15Z".to_string(),
        purposes,
        features: vec![],
        vendors,
    }
}

/// A store whose writes always fail.
#[derive(Default)]
struct ReadOnlyStore(MemoryStore);

impl ConsentStore for ReadOnlyStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        self.0.get(key)
    }

    fn set(&mut self, _key: &str, _value: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read only"))
    }

    fn remove(&mut self, _key: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read only"))
    }
}

#[test]
fn first_run_then_details_screen() {
    let c = catalog();
    let mut cmp = ConsentManager::new(CmpConfig::default(), MemoryStore::new());
    assert!(cmp.load().unwrap().is_none());

    let mut choices = cmp.choices(&c, false);
    assert!(choices.is_all(false));

    choices.set_purpose(1, true);
    choices.set_purpose(2, true);
    choices.set_vendor(29, true);
    assert_eq!(
        cmp.save_choices(&c, &choices, NOW).unwrap(),
        CmpOutcome::ConsentCustomPartial
    );

    let s = cmp.consent_string().unwrap().unwrap();
    let record = ConsentRecord::parse_str(&s).unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(record.cmp_id, 99);
    assert_eq!(record.cmp_version, 3);
    assert_eq!(record.consent_screen, 2);
    assert_eq!(record.vendor_list_version, 14);
    assert_eq!(record.max_vendor_id, 29);
    assert_eq!(record.allowed_purposes(), [1, 2].into());
    // vendors needing purposes 1 and 2 only, and vendor 29 set by hand
    assert_eq!(record.allowed_vendors(), [1, 5, 10, 11, 16, 20, 25, 26, 29].into());
}

#[test]
fn simple_screen_after_details_screen() {
    let c = catalog();
    let mut cmp = ConsentManager::new(CmpConfig::default(), MemoryStore::new());
    cmp.set_subject_to_gdpr(true).unwrap();

    let choices = cmp.choices(&c, true);
    cmp.save_choices(&c, &choices, NOW).unwrap();

    // vendor IDs missing from the list are refused, so a bitfield is needed
    let saved = cmp.load().unwrap().unwrap().clone();
    assert_eq!(saved.vendor_encoding(), VendorEncoding::BitField);
    assert_eq!(
        saved.allowed_vendors(),
        c.vendors.iter().map(|v| v.id).collect::<IdSet>()
    );

    // new session
    let store = cmp.into_store();
    let mut cmp = ConsentManager::new(CmpConfig::default(), store);
    cmp.load().unwrap();
    assert_eq!(
        cmp.consent_all(Some(&c), false, NOW + 1000).unwrap(),
        CmpOutcome::ConsentNone
    );

    let record = cmp.load().unwrap().unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.created, saved.created);
    assert_eq!(record.last_updated, NOW + 1000);
    assert_eq!(record.consent_screen, 1);
    assert!(record.allowed_purposes().is_empty());
    assert!(record.allowed_vendors().is_empty());
}

#[test]
fn region_fallback() {
    let config = CmpConfig {
        country: Some("IE".to_string()),
        ..CmpConfig::default()
    };
    let mut cmp = ConsentManager::new(config, MemoryStore::new());
    assert!(cmp.is_subject_to_gdpr().unwrap());

    cmp.consent_all(None, true, NOW).unwrap();
    assert_eq!(
        cmp.store().get(SUBJECT_TO_GDPR_KEY).unwrap().as_deref(),
        Some("1")
    );
    assert!(cmp.has_consent_string().unwrap());
}

#[test]
fn corrupted_stored_string() {
    let mut store = MemoryStore::new();
    store.set(CONSENT_STRING_KEY, "BOEFEAyOEFEAy").unwrap();

    let mut cmp = ConsentManager::new(CmpConfig::default(), store);
    assert!(cmp.load().unwrap().is_none());

    // a fresh record replaces it
    let c = catalog();
    let choices = cmp.choices(&c, true);
    cmp.save_choices(&c, &choices, NOW).unwrap();
    assert_eq!(cmp.load().unwrap().map(|r| r.version), Some(1));
}

#[test]
fn stored_string_that_cannot_be_updated() {
    // language letters 26 and 40 are outside A to Z
    let record = ConsentRecord::parse_str("BOEFEAyOEFEAyAHABDENAI4AAAB9vABAASA").unwrap();
    let mut bits = BitBuffer::new(v1::to_bytes(&record).unwrap());
    bits.set_uint(108, 6, 26).unwrap();
    bits.set_uint(114, 6, 40).unwrap();

    let mut store = MemoryStore::new();
    store
        .set(
            CONSENT_STRING_KEY,
            &base64::encode(bits.as_bytes(), Padding::None),
        )
        .unwrap();
    store.set(SUBJECT_TO_GDPR_KEY, "1").unwrap();

    let mut cmp = ConsentManager::new(CmpConfig::default(), store);
    let loaded = cmp.load().unwrap().unwrap();
    assert_eq!(loaded.consent_language, "[I");
    assert_eq!(loaded.version, 1);

    // a fresh record replaces it
    assert_eq!(
        cmp.consent_all(None, true, NOW).unwrap(),
        CmpOutcome::ConsentAll
    );
    let r = cmp.load().unwrap().unwrap();
    assert_eq!(r.version, 1);
    assert_eq!(r.cmp_id, 99);
    assert_eq!(r.created, NOW);
    assert_eq!(r.consent_language, "EN");
    assert_eq!(r.max_vendor_id, 121);

    // and later updates go through as usual
    let c = catalog();
    let mut choices = cmp.choices(&c, true);
    assert!(choices.is_all(true));
    choices.set_all(false);
    cmp.save_choices(&c, &choices, NOW + 1000).unwrap();
    let r = cmp.load().unwrap().unwrap();
    assert_eq!(r.version, 2);
    assert_eq!(r.created, NOW);
    assert!(r.allowed_vendors().is_empty());
}

#[test]
fn store_failure() {
    let mut cmp = ConsentManager::new(CmpConfig::default(), ReadOnlyStore::default());
    let c = catalog();
    let choices = cmp.choices(&c, true);

    let e = cmp.save_choices(&c, &choices, NOW).unwrap_err();
    assert!(matches!(e, CmpError::Store(_)));
    assert_eq!(e.outcome(), CmpOutcome::FailedToWriteConsentString);
    assert!(cmp.record().is_none());
}

#[test]
fn encode_failure() {
    let config = CmpConfig {
        consent_language: "ENG".to_string(),
        ..CmpConfig::default()
    };
    let mut cmp = ConsentManager::new(config, MemoryStore::new());
    let c = catalog();
    let choices = cmp.choices(&c, true);

    let e = cmp.save_choices(&c, &choices, NOW).unwrap_err();
    assert!(matches!(e, CmpError::Encode(_)));
    assert_eq!(e.outcome(), CmpOutcome::FailedToWriteConsentString);
}

#[test]
fn localized_catalog() {
    let mut c = catalog();
    let config = CmpConfig::default();

    assert_eq!(
        config.localized_purposes_url_for("FR").as_deref(),
        Some("https://vendorlist.consensu.org/purposes-fr.json")
    );

    c.localize(&Translations {
        purposes: vec![Purpose {
            id: 1,
            name: "Stockage et accès aux informations".to_string(),
            description: String::new(),
        }],
        features: vec![],
    });
    assert_eq!(
        c.purpose(1).unwrap().name,
        "Stockage et accès aux informations"
    );
    assert_eq!(c.purpose(2).unwrap().name, "Purpose 2");
}
