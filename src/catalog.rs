//! Global vendor list: the purposes, features and vendors a user is asked to consent to.
//!
//! The types follow the layout of the IAB `vendorlist.json` file (version 1), and can be
//! deserialized from it when the `serde` feature is enabled. Translated names and descriptions
//! come from the `purposes-{lang}.json` files, see [`Catalog::localize`].
//!
use crate::v1::IdSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Purpose {
    pub id: u16,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Feature {
    pub id: u16,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Vendor {
    pub id: u16,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub policy_url: String,
    /// Purposes the vendor needs consent for.
    #[cfg_attr(feature = "serde", serde(default))]
    pub purpose_ids: IdSet,
    /// Purposes the vendor claims a legitimate interest for.
    #[cfg_attr(feature = "serde", serde(default))]
    pub leg_int_purpose_ids: IdSet,
    #[cfg_attr(feature = "serde", serde(default))]
    pub feature_ids: IdSet,
}

/// A vendor list, as published by the IAB.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Catalog {
    pub vendor_list_version: u16,
    /// Publication date of the list, as found in the file (e.g. `2018-05-28T16:00:15Z`).
    #[cfg_attr(feature = "serde", serde(default))]
    pub last_updated: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub purposes: Vec<Purpose>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub features: Vec<Feature>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub vendors: Vec<Vendor>,
}

/// Translated purpose and feature texts for a single language.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Translations {
    #[cfg_attr(feature = "serde", serde(default))]
    pub purposes: Vec<Purpose>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub features: Vec<Feature>,
}

impl Catalog {
    pub fn purpose(&self, id: u16) -> Option<&Purpose> {
        self.purposes.iter().find(|p| p.id == id)
    }

    pub fn feature(&self, id: u16) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn vendor(&self, id: u16) -> Option<&Vendor> {
        self.vendors.iter().find(|v| v.id == id)
    }

    /// Highest vendor ID in the list, or `None` if the list has no vendors.
    pub fn max_vendor_id(&self) -> Option<u16> {
        self.vendors.iter().map(|v| v.id).max()
    }

    /// Purposes the given vendor needs consent for.
    ///
    /// IDs that are not part of the list are skipped.
    pub fn vendor_purposes<'a>(
        &'a self,
        vendor: &'a Vendor,
    ) -> impl Iterator<Item = &'a Purpose> + 'a {
        vendor
            .purpose_ids
            .iter()
            .filter_map(|&id| self.purpose(id))
    }

    /// Features the given vendor uses.
    ///
    /// IDs that are not part of the list are skipped.
    pub fn vendor_features<'a>(
        &'a self,
        vendor: &'a Vendor,
    ) -> impl Iterator<Item = &'a Feature> + 'a {
        vendor
            .feature_ids
            .iter()
            .filter_map(|&id| self.feature(id))
    }

    /// Replaces purpose and feature names and descriptions by their translations.
    ///
    /// Items without a translation keep their current texts, and empty translated texts are
    /// ignored.
    pub fn localize(&mut self, translations: &Translations) {
        for t in &translations.purposes {
            if let Some(p) = self.purposes.iter_mut().find(|p| p.id == t.id) {
                overlay(&mut p.name, &t.name);
                overlay(&mut p.description, &t.description);
            }
        }
        for t in &translations.features {
            if let Some(f) = self.features.iter_mut().find(|f| f.id == t.id) {
                overlay(&mut f.name, &t.name);
                overlay(&mut f.description, &t.description);
            }
        }
    }
}

fn overlay(s: &mut String, translated: &str) {
    if !translated.is_empty() {
        *s = translated.to_string();
    }
}
