//! Identifier resolution for devices and users.
//!
//! Records can be addressed either by their natural key (MAC address for
//! devices, email for users) or by their surrogate [`ObjectId`]. [`resolve`]
//! turns an untrusted identifier string into a typed [`Filter`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})$").expect("static regex is valid")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]+[_.-]*[a-zA-Z0-9]*@[a-zA-Z0-9]+[.]{1}[a-zA-Z0-9]{2,}$")
        .expect("static regex is valid")
});

/// A domain-meaningful unique key usable for lookup.
pub trait NaturalKey: Sized + fmt::Display {
    /// Column the key is stored under.
    const FIELD: &'static str;

    /// Parse and normalise, `None` when `raw` is not a valid key.
    fn parse(raw: &str) -> Option<Self>;
}

/// Device MAC address in canonical form (`AA:BB:CC:DD:EE:FF`).
///
/// Accepts `-` or `:` delimiters and either case on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl NaturalKey for MacAddress {
    const FIELD: &'static str = "mac";

    fn parse(raw: &str) -> Option<Self> {
        MAC_RE
            .is_match(raw)
            .then(|| Self(raw.replace('-', ":").to_ascii_uppercase()))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw).ok_or_else(|| Error::InvalidInput(format!("invalid MAC address {raw}")))
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

/// User email. Stored exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl NaturalKey for Email {
    const FIELD: &'static str = "email";

    fn parse(raw: &str) -> Option<Self> {
        EMAIL_RE.is_match(raw).then(|| Self(raw.to_string()))
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw).ok_or_else(|| Error::InvalidInput(format!("invalid email {raw}")))
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// 12-byte surrogate id, written as 24 lowercase hex characters.
///
/// The first 4 bytes are the creation time in unix seconds (big-endian), the
/// remaining 8 are random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];
        let secs = patio_core::db::unix_timestamp() as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..].copy_from_slice(&uuid::Uuid::new_v4().as_bytes()[..8]);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(24), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("invalid object id {s}"));
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

/// Typed lookup filter produced by [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter<K> {
    ByNaturalKey(K),
    ById(ObjectId),
}

pub type DeviceFilter = Filter<MacAddress>;
pub type UserFilter = Filter<Email>;

impl<K: NaturalKey> Filter<K> {
    /// Column to match on.
    pub const fn field(&self) -> &'static str {
        match self {
            Self::ByNaturalKey(_) => K::FIELD,
            Self::ById(_) => "id",
        }
    }

    /// Value bound against [`Filter::field`].
    pub fn value(&self) -> String {
        match self {
            Self::ByNaturalKey(key) => key.to_string(),
            Self::ById(id) => id.to_hex(),
        }
    }
}

impl<K: NaturalKey> fmt::Display for Filter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field(), self.value())
    }
}

/// Decide whether `identifier` is a natural key or a surrogate id.
///
/// The natural key is tried first. An identifier that is neither is
/// rejected with [`Error::InvalidInput`].
pub fn resolve<K: NaturalKey>(identifier: &str) -> Result<Filter<K>> {
    if let Some(key) = K::parse(identifier) {
        return Ok(Filter::ByNaturalKey(key));
    }
    identifier
        .parse::<ObjectId>()
        .map(Filter::ById)
        .map_err(|_| {
            Error::InvalidInput(format!(
                "identifier {identifier:?} is neither a {} nor an object id",
                K::FIELD
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mac_resolves_to_natural_key() {
        let filter = resolve::<MacAddress>("ab:cd:ef:01:23:45").unwrap();
        assert_eq!(
            filter,
            Filter::ByNaturalKey(MacAddress("AB:CD:EF:01:23:45".into()))
        );
        assert_eq!(filter.field(), "mac");
    }

    #[test]
    fn mac_delimiters_and_case_normalise() {
        let dashed = MacAddress::parse("45-36-17-e3-1c-70").unwrap();
        let colon = MacAddress::parse("45:36:17:E3:1C:70").unwrap();
        assert_eq!(dashed, colon);
        assert_eq!(dashed.as_str(), "45:36:17:E3:1C:70");
    }

    #[test]
    fn hex_resolves_to_id() {
        let filter = resolve::<MacAddress>("65f1a2b3c4d5e6f708192a3b").unwrap();
        assert!(matches!(filter, Filter::ById(_)));
        assert_eq!(filter.field(), "id");
        assert_eq!(filter.value(), "65f1a2b3c4d5e6f708192a3b");
    }

    #[test]
    fn garbage_is_invalid_input() {
        let err = resolve::<MacAddress>("not-a-valid-anything").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = resolve::<Email>("not-a-valid-anything").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn email_or_id() {
        let filter = resolve::<Email>("jionesco0@globo.com").unwrap();
        assert_eq!(filter.field(), "email");
        let id = ObjectId::new();
        assert_eq!(resolve::<Email>(&id.to_hex()).unwrap(), Filter::ById(id));
    }

    #[test]
    fn object_id_rejects_wrong_length_and_non_hex() {
        assert!("abc".parse::<ObjectId>().is_err());
        assert!("zz1a2b3c4d5e6f708192a3b4".parse::<ObjectId>().is_err());
        assert!("65f1a2b3c4d5e6f708192a3b00".parse::<ObjectId>().is_err());
    }

    #[test]
    fn signed_pairs_are_not_an_id() {
        assert!("+1+2+3+4+5+6+7+8+9+a+b+c".parse::<ObjectId>().is_err());
        let err = resolve::<MacAddress>("+1+2+3+4+5+6+7+8+9+a+b+c").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn new_ids_are_unique_and_round_trip() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_hex().len(), 24);
        assert_eq!(a.to_hex().parse::<ObjectId>().unwrap(), a);
    }

    #[test]
    fn email_validation() {
        assert!(Email::parse("koreilly1@wufoo.com").is_some());
        assert!(Email::parse("john.doe@gmail.com").is_some());
        assert!(Email::parse("no-at-sign.com").is_none());
        assert!(Email::parse("a@b.c").is_none());
    }
}
