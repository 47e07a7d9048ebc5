use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between part values in the rendered form of a compound key.
pub const KEY_SEPARATOR: char = ',';

/// Errors produced when building or parsing a [`ResourceKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A key must name at least one part.
    #[error("resource key has no parts")]
    Empty,

    /// A part was present but its value was empty.
    #[error("resource key part '{0}' is empty")]
    EmptyPart(String),

    /// The rendered identifier did not have one value per expected part.
    #[error("unexpected format for identifier ({id}), expected {expected}")]
    Format { id: String, expected: String },
}

/// Identity of a managed remote object.
///
/// A key is an ordered list of named parts: a single `id` for most resources,
/// or several parts (e.g. `ledger_name` + `id`) when the remote API scopes the
/// object under a parent. Keys are immutable once built and compare by value,
/// so two keys with the same parts identify the same remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeyParts")]
pub struct ResourceKey {
    parts: Vec<(String, String)>,
}

/// Wire shape of [`ResourceKey`]; deserialized keys go through
/// [`ResourceKey::compound`].
#[derive(Deserialize)]
struct KeyParts {
    parts: Vec<(String, String)>,
}

impl TryFrom<KeyParts> for ResourceKey {
    type Error = KeyError;

    fn try_from(value: KeyParts) -> Result<Self, Self::Error> {
        Self::compound(value.parts)
    }
}

impl ResourceKey {
    /// Build a single-part key.
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Result<Self, KeyError> {
        Self::compound([(name.into(), value.into())])
    }

    /// Build a key from ordered `(name, value)` parts.
    ///
    /// Every part must carry a non-empty value; partial keys are rejected.
    pub fn compound<I, N, V>(parts: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let parts: Vec<(String, String)> = parts
            .into_iter()
            .map(|(n, v)| (n.into(), v.into()))
            .collect();

        if parts.is_empty() {
            return Err(KeyError::Empty);
        }
        if let Some((name, _)) = parts.iter().find(|(_, v)| v.is_empty()) {
            return Err(KeyError::EmptyPart(name.clone()));
        }

        Ok(Self { parts })
    }

    /// Parse a rendered identifier (`a,b,...`) against the expected part names.
    ///
    /// This is the import path: it checks shape only and never validates that
    /// the object exists.
    pub fn parse(id: &str, names: &[&str]) -> Result<Self, KeyError> {
        let values: Vec<&str> = id.split(KEY_SEPARATOR).collect();
        if names.is_empty() || values.len() != names.len() || values.iter().any(|v| v.is_empty()) {
            return Err(KeyError::Format {
                id: id.to_owned(),
                expected: names.join(&KEY_SEPARATOR.to_string()),
            });
        }

        Self::compound(names.iter().copied().zip(values))
    }

    /// Look up a part value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, value)` parts in order.
    pub fn parts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parts.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always `false`: empty keys cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, value)) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{KEY_SEPARATOR}")?;
            }
            f.write_str(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_renders_value() {
        let key = ResourceKey::single("id", "alpha").unwrap();
        assert_eq!(key.to_string(), "alpha");
        assert_eq!(key.get("id"), Some("alpha"));
        assert_eq!(key.len(), 1);
    }

    #[test]
    fn compound_key_preserves_order() {
        let key = ResourceKey::compound([("ledger_name", "books"), ("id", "s-1")]).unwrap();
        assert_eq!(key.to_string(), "books,s-1");
        let names: Vec<_> = key.parts().map(|(n, _)| n).collect();
        assert_eq!(names, ["ledger_name", "id"]);
    }

    #[test]
    fn empty_part_is_rejected() {
        let err = ResourceKey::compound([("ledger_name", "books"), ("id", "")]).unwrap_err();
        assert_eq!(err, KeyError::EmptyPart("id".into()));
    }

    #[test]
    fn no_parts_is_rejected() {
        let parts: Vec<(String, String)> = Vec::new();
        assert_eq!(ResourceKey::compound(parts).unwrap_err(), KeyError::Empty);
    }

    #[test]
    fn parse_matches_part_count() {
        let key = ResourceKey::parse("books,s-1", &["ledger_name", "id"]).unwrap();
        assert_eq!(key.get("ledger_name"), Some("books"));
        assert_eq!(key.get("id"), Some("s-1"));

        let err = ResourceKey::parse("s-1", &["ledger_name", "id"]).unwrap_err();
        assert!(matches!(err, KeyError::Format { .. }));
        assert_eq!(
            err.to_string(),
            "unexpected format for identifier (s-1), expected ledger_name,id"
        );

        assert!(ResourceKey::parse("books,", &["ledger_name", "id"]).is_err());
    }

    #[test]
    fn deserialization_rejects_partial_keys() {
        let key = ResourceKey::compound([("ledger_name", "books"), ("id", "s-1")]).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(serde_json::from_str::<ResourceKey>(&json).unwrap(), key);

        let err = serde_json::from_str::<ResourceKey>(r#"{"parts":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no parts"));
        assert!(serde_json::from_str::<ResourceKey>(r#"{"parts":[["id",""]]}"#).is_err());
    }

    #[test]
    fn equality_is_identity() {
        let a = ResourceKey::single("id", "alpha").unwrap();
        let b = ResourceKey::parse("alpha", &["id"]).unwrap();
        let c = ResourceKey::single("id", "beta").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
