use crate::catalog::Catalog;
use crate::v1::{ConsentRecord, IdSet};
use fnv::FnvHashMap;

/// Per-item consent state, as edited by the user on the details screen.
///
/// Only purposes and vendors of the catalog the choices were built from are tracked. Unknown
/// IDs are ignored by setters and reported as not allowed.
#[derive(Clone, Debug, Default)]
pub struct ConsentChoices {
    purposes: FnvHashMap<u16, bool>,
    vendors: FnvHashMap<u16, bool>,
    vendor_purposes: FnvHashMap<u16, IdSet>,
}

impl ConsentChoices {
    /// Sets every purpose and vendor of the catalog to the same initial value.
    pub fn new(catalog: &Catalog, default_consent_all: bool) -> Self {
        Self::with(catalog, |_| default_consent_all, |_| default_consent_all)
    }

    /// Initial state from a previously saved record.
    pub fn from_record(catalog: &Catalog, record: &ConsentRecord) -> Self {
        Self::with(
            catalog,
            |id| record.is_purpose_allowed(id),
            |id| record.is_vendor_allowed(id),
        )
    }

    fn with(
        catalog: &Catalog,
        purpose_allowed: impl Fn(u16) -> bool,
        vendor_allowed: impl Fn(u16) -> bool,
    ) -> Self {
        Self {
            purposes: catalog
                .purposes
                .iter()
                .map(|p| (p.id, purpose_allowed(p.id)))
                .collect(),
            vendors: catalog
                .vendors
                .iter()
                .map(|v| (v.id, vendor_allowed(v.id)))
                .collect(),
            vendor_purposes: catalog
                .vendors
                .iter()
                .map(|v| (v.id, v.purpose_ids.clone()))
                .collect(),
        }
    }

    pub fn is_purpose_allowed(&self, id: u16) -> bool {
        self.purposes.get(&id).copied().unwrap_or(false)
    }

    pub fn is_vendor_allowed(&self, id: u16) -> bool {
        self.vendors.get(&id).copied().unwrap_or(false)
    }

    /// Allows or disallows a purpose, and updates the vendors that need it.
    ///
    /// Disallowing a purpose disallows every vendor declaring it. Allowing a purpose allows the
    /// vendors declaring it whose purposes are now all allowed.
    pub fn set_purpose(&mut self, id: u16, allowed: bool) {
        let Some(state) = self.purposes.get_mut(&id) else {
            return;
        };
        *state = allowed;

        for (vendor, purposes) in &self.vendor_purposes {
            if !purposes.contains(&id) {
                continue;
            }

            let vendor_allowed =
                allowed && purposes.iter().all(|p| self.purposes.get(p).copied().unwrap_or(false));
            self.vendors.insert(*vendor, vendor_allowed);
        }
    }

    pub fn set_vendor(&mut self, id: u16, allowed: bool) {
        if let Some(state) = self.vendors.get_mut(&id) {
            *state = allowed;
        }
    }

    /// Allows or disallows everything at once.
    pub fn set_all(&mut self, allowed: bool) {
        self.purposes.values_mut().for_each(|v| *v = allowed);
        self.vendors.values_mut().for_each(|v| *v = allowed);
    }

    /// Whether every purpose and every vendor is set to `value`.
    pub fn is_all(&self, value: bool) -> bool {
        self.purposes.values().chain(self.vendors.values()).all(|&v| v == value)
    }

    pub fn allowed_purposes(&self) -> IdSet {
        allowed_ids(&self.purposes)
    }

    pub fn allowed_vendors(&self) -> IdSet {
        allowed_ids(&self.vendors)
    }
}

fn allowed_ids(states: &FnvHashMap<u16, bool>) -> IdSet {
    states
        .iter()
        .filter(|&(_, &allowed)| allowed)
        .map(|(&id, _)| id)
        .collect()
}
