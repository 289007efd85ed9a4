use fnv::FnvHashMap;
use std::io;

/// Key under which the last consent string is stored.
pub const CONSENT_STRING_KEY: &str = "IABConsent_ConsentString";
/// Key under which GDPR applicability is stored, as `"1"` or `"0"`.
pub const SUBJECT_TO_GDPR_KEY: &str = "IABConsent_SubjectToGDPR";

/// A persistent key/value store, such as the application preferences of a device.
pub trait ConsentStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// A store that keeps values in memory only.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: FnvHashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsentStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

impl<S: ConsentStore + ?Sized> ConsentStore for &mut S {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        (**self).remove(key)
    }
}
