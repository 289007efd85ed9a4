use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Countries where GDPR applies, by ISO 3166-1 alpha-2 code.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum EuCountry {
    GB,
    DE,
    PL,
    FR,
    IT,
    ES,
    RO,
    SE,
    BG,
    NL,
    GR,
    HR,
    IE,
    CZ,
    AT,
    HU,
    FI,
    DK,
    BE,
    PT,
    MT,
    CY,
    LT,
    SK,
    SI,
    EE,
    LV,
    LU,
}

/// Whether GDPR applies to a device located in the given country.
pub fn is_gdpr_region(country: &str) -> bool {
    EuCountry::from_str(country.trim()).is_ok()
}
