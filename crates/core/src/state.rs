use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Name of the attribute every resource uses as its state identity.
pub const ID_ATTRIBUTE: &str = "id";

/// Flat attribute record for one resource instance.
///
/// Mirrors the resource schema: scalar attributes map to JSON scalars and
/// nested single blocks are stored as a one-element list of objects. The host
/// engine persists this record as-is, keyed by the `id` attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type name (e.g. `aws_simpledb_domain`).
    pub type_name: String,

    /// Attribute values by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ResourceState {
    /// Create an empty record for the given resource type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Build a record from a typed data struct.
    ///
    /// `null` fields are dropped so that unset optional attributes stay absent.
    pub fn from_data<T: Serialize>(
        type_name: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut state = Self::new(type_name);
        state.set_data(data)?;
        Ok(state)
    }

    /// Replace every attribute with the fields of a typed data struct.
    pub fn set_data<T: Serialize>(&mut self, data: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(data)?;
        self.attributes = match value {
            serde_json::Value::Object(map) => {
                map.into_iter().filter(|(_, v)| !v.is_null()).collect()
            }
            other => {
                return Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                    "resource data must serialize to an object, got {other}"
                )));
            }
        };
        Ok(())
    }

    /// Decode the record into a typed data struct.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map))
    }

    /// Set a single attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Set a single attribute in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Get an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Get a string attribute; non-string and empty values count as missing.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The `id` attribute, if set.
    pub fn id(&self) -> Option<&str> {
        self.string(ID_ATTRIBUTE)
    }

    /// Whether the record carries no attributes at all.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(default)]
        id: Option<String>,
        name: String,
    }

    #[test]
    fn typed_data_roundtrips_through_record() {
        let data = Sample {
            id: Some("alpha".into()),
            name: "alpha".into(),
        };
        let state = ResourceState::from_data("aws_simpledb_domain", &data).unwrap();
        assert_eq!(state.id(), Some("alpha"));
        assert_eq!(state.data::<Sample>().unwrap(), data);
    }

    #[test]
    fn null_fields_are_dropped() {
        let data = Sample {
            id: None,
            name: "alpha".into(),
        };
        let state = ResourceState::from_data("t", &data).unwrap();
        assert!(state.attribute("id").is_none());
        assert_eq!(state.id(), None);
    }

    #[test]
    fn set_data_replaces_wholesale() {
        let mut state = ResourceState::new("t").with_attribute("stale", serde_json::json!(1));
        state
            .set_data(&Sample {
                id: Some("a".into()),
                name: "a".into(),
            })
            .unwrap();
        assert!(state.attribute("stale").is_none());
        assert_eq!(state.attributes.len(), 2);
    }

    #[test]
    fn non_object_data_is_rejected() {
        let mut state = ResourceState::new("t");
        assert!(state.set_data(&42).is_err());
    }

    #[test]
    fn empty_string_is_not_an_id() {
        let state = ResourceState::new("t").with_attribute("id", serde_json::json!(""));
        assert_eq!(state.id(), None);
    }
}
