//! Abstract permissions.
//!
//! [`Permissions`] is a set of abstract permissions. Enforcers compare
//! sets, never ordinals: holding `ADMINISTRATE` does not imply `WRITE`.
//!
//! # Example
//!
//! ```
//! use twinguard_auth::Permissions;
//!
//! let granted = Permissions::READ | Permissions::WRITE;
//! assert!(granted.contains(Permissions::WRITE));
//! assert!(!granted.contains(Permissions::WRITE | Permissions::ADMINISTRATE));
//! ```

use bitflags::bitflags;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// A set of abstract permissions on a resource.
    ///
    /// | Permission | Meaning |
    /// |------------|---------|
    /// | [`READ`](Self::READ) | Retrieve the resource |
    /// | [`WRITE`](Self::WRITE) | Create, modify or delete the resource |
    /// | [`ADMINISTRATE`](Self::ADMINISTRATE) | Change who may do the above (ACL changes) |
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Permissions: u8 {
        /// Retrieve the resource.
        const READ         = 0b0000_0001;
        /// Change the resource.
        const WRITE        = 0b0000_0010;
        /// Change the permissions on the resource.
        const ADMINISTRATE = 0b0000_0100;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl Permissions {
    /// Returns the names of all contained permissions.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::READ) {
            names.push("READ");
        }
        if self.contains(Self::WRITE) {
            names.push("WRITE");
        }
        if self.contains(Self::ADMINISTRATE) {
            names.push("ADMINISTRATE");
        }
        names
    }

    /// Parses a single permission name (case-insensitive).
    ///
    /// ```
    /// use twinguard_auth::Permissions;
    ///
    /// assert_eq!(Permissions::parse("read"), Some(Permissions::READ));
    /// assert_eq!(Permissions::parse("ADMINISTRATE"), Some(Permissions::ADMINISTRATE));
    /// assert_eq!(Permissions::parse("EXECUTE"), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "READ" => Some(Self::READ),
            "WRITE" => Some(Self::WRITE),
            "ADMINISTRATE" => Some(Self::ADMINISTRATE),
            _ => None,
        }
    }

    /// Parses a list of names into a combined set.
    ///
    /// Returns the combined set and the names that were not recognized.
    #[must_use]
    pub fn parse_list<'a>(names: &[&'a str]) -> (Self, Vec<&'a str>) {
        let mut perms = Self::empty();
        let mut unknown = Vec::new();
        for name in names {
            match Self::parse(name) {
                Some(p) => perms |= p,
                None => unknown.push(*name),
            }
        }
        (perms, unknown)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

// Serialized as a JSON array of names: `["READ", "WRITE"]`.
impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamesVisitor;

        impl<'de> Visitor<'de> for NamesVisitor {
            type Value = Permissions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of permission names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut perms = Permissions::empty();
                while let Some(name) = seq.next_element::<String>()? {
                    match Permissions::parse(&name) {
                        Some(p) => perms |= p,
                        None => {
                            return Err(de::Error::custom(format!(
                                "unknown permission '{name}'"
                            )))
                        }
                    }
                }
                Ok(perms)
            }
        }

        deserializer.deserialize_seq(NamesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_comparison_is_not_ordinal() {
        let admin_only = Permissions::ADMINISTRATE;
        assert!(!admin_only.contains(Permissions::WRITE));
        assert!(!admin_only.contains(Permissions::READ));
    }

    #[test]
    fn names_and_display() {
        let perms = Permissions::READ | Permissions::ADMINISTRATE;
        assert_eq!(perms.names(), vec!["READ", "ADMINISTRATE"]);
        assert_eq!(perms.to_string(), "READ | ADMINISTRATE");
        assert_eq!(Permissions::empty().to_string(), "(none)");
    }

    #[test]
    fn parse_list_reports_unknown() {
        let (perms, unknown) = Permissions::parse_list(&["READ", "bogus", "write"]);
        assert_eq!(perms, Permissions::READ | Permissions::WRITE);
        assert_eq!(unknown, vec!["bogus"]);
    }

    #[test]
    fn serializes_as_name_array() {
        let json = serde_json::to_value(Permissions::READ | Permissions::WRITE).expect("serialize");
        assert_eq!(json, serde_json::json!(["READ", "WRITE"]));

        let parsed: Permissions =
            serde_json::from_value(serde_json::json!(["write", "ADMINISTRATE"])).expect("parse");
        assert_eq!(parsed, Permissions::WRITE | Permissions::ADMINISTRATE);
    }

    #[test]
    fn deserialize_rejects_unknown_names() {
        let err = serde_json::from_value::<Permissions>(serde_json::json!(["READ", "EXECUTE"]))
            .expect_err("unknown permission");
        assert!(err.to_string().contains("EXECUTE"), "got: {err}");
    }
}
