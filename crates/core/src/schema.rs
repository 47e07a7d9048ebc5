//! Attribute schemas for resource types.
//!
//! A [`Schema`] describes the attributes of a resource record: which are
//! required, which are computed by the provider, which force the host engine
//! to replace the resource when they change, and which nested single-block
//! groups exist. Validation runs against a [`ResourceState`] before any
//! adapter logic sees the plan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{ID_ATTRIBUTE, ResourceState};

/// Value type of a scalar attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    /// String keys to string values.
    Map,
}

impl AttributeType {
    fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Map => value
                .as_object()
                .is_some_and(|map| map.values().all(serde_json::Value::is_string)),
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Map => write!(f, "map of strings"),
        }
    }
}

/// Definition of a scalar attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_type: AttributeType,
    pub required: bool,
    pub computed: bool,
    /// A change to this attribute forces destroy-and-recreate.
    pub requires_replace: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Attribute {
    fn new(attribute_type: AttributeType) -> Self {
        Self {
            attribute_type,
            required: false,
            computed: false,
            requires_replace: false,
            default: None,
            description: None,
        }
    }

    /// A required string set by the user.
    pub fn required_string() -> Self {
        Self {
            required: true,
            ..Self::new(AttributeType::String)
        }
    }

    /// An optional string set by the user.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String)
    }

    /// A string set by the provider.
    pub fn computed_string() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::String)
        }
    }

    /// An optional boolean set by the user.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool)
    }

    /// An optional string map set by the user.
    pub fn optional_map() -> Self {
        Self::new(AttributeType::Map)
    }

    /// A string map set by the provider.
    pub fn computed_map() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::Map)
        }
    }

    /// The standard `id` attribute.
    pub fn id() -> Self {
        Self::computed_string().with_description("Identifier of the resource")
    }

    #[must_use]
    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A nested single-block group (stored as a list with at most one element).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub attributes: BTreeMap<String, Attribute>,
    pub required: bool,
    pub requires_replace: bool,
}

impl Block {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            required: false,
            requires_replace: false,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

/// A problem found while validating a record against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required attribute '{0}'")]
    MissingAttribute(String),

    #[error("attribute '{name}' must be a {expected}")]
    WrongType {
        name: String,
        expected: AttributeType,
    },

    #[error("unsupported attribute '{0}'")]
    UnknownAttribute(String),

    #[error("block '{name}' allows at most one element, got {count}")]
    TooManyBlocks { name: String, count: usize },

    #[error("missing required block '{0}'")]
    MissingBlock(String),

    #[error("block '{0}' must be a list of objects")]
    MalformedBlock(String),
}

impl SchemaError {
    /// Attribute path the violation refers to.
    pub fn attribute(&self) -> &str {
        match self {
            Self::MissingAttribute(name)
            | Self::UnknownAttribute(name)
            | Self::MissingBlock(name)
            | Self::MalformedBlock(name)
            | Self::WrongType { name, .. }
            | Self::TooManyBlocks { name, .. } => name,
        }
    }
}

/// Schema for one resource type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub version: u32,
    pub attributes: BTreeMap<String, Attribute>,
    pub blocks: BTreeMap<String, Block>,
}

impl Schema {
    /// A version 0 schema carrying only the standard `id` attribute.
    pub fn v0() -> Self {
        Self::default().with_attribute(ID_ATTRIBUTE, Attribute::id())
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    #[must_use]
    pub fn with_block(mut self, name: impl Into<String>, block: Block) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Validate a planned record.
    ///
    /// Computed-only attributes may be absent; every violation is collected
    /// rather than stopping at the first.
    pub fn validate(&self, state: &ResourceState) -> Vec<SchemaError> {
        let mut errors = Vec::new();

        for name in state.attributes.keys() {
            if !self.attributes.contains_key(name) && !self.blocks.contains_key(name) {
                errors.push(SchemaError::UnknownAttribute(name.clone()));
            }
        }

        validate_attributes(&self.attributes, &state.attributes, "", &mut errors);

        for (name, block) in &self.blocks {
            let elements = match state.attribute(name) {
                None | Some(serde_json::Value::Null) => &[][..],
                Some(serde_json::Value::Array(items)) => items.as_slice(),
                Some(_) => {
                    errors.push(SchemaError::MalformedBlock(name.clone()));
                    continue;
                }
            };

            if elements.len() > 1 {
                errors.push(SchemaError::TooManyBlocks {
                    name: name.clone(),
                    count: elements.len(),
                });
            }
            if block.required && elements.is_empty() {
                errors.push(SchemaError::MissingBlock(name.clone()));
            }

            for element in elements {
                let Some(object) = element.as_object() else {
                    errors.push(SchemaError::MalformedBlock(name.clone()));
                    continue;
                };
                let values: BTreeMap<String, serde_json::Value> = object
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for key in values.keys() {
                    if !block.attributes.contains_key(key) {
                        errors.push(SchemaError::UnknownAttribute(format!("{name}.0.{key}")));
                    }
                }
                validate_attributes(
                    &block.attributes,
                    &values,
                    &format!("{name}.0."),
                    &mut errors,
                );
            }
        }

        errors
    }

    /// Fill in declared defaults for unset attributes, including inside blocks.
    pub fn apply_defaults(&self, state: &mut ResourceState) {
        for (name, attribute) in &self.attributes {
            if let Some(default) = &attribute.default {
                state
                    .attributes
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        for (name, block) in &self.blocks {
            let Some(serde_json::Value::Array(items)) = state.attributes.get_mut(name) else {
                continue;
            };
            for item in items.iter_mut().filter_map(serde_json::Value::as_object_mut) {
                for (attr_name, attribute) in &block.attributes {
                    if let Some(default) = &attribute.default {
                        match item.get(attr_name) {
                            None | Some(serde_json::Value::Null) => {
                                item.insert(attr_name.clone(), default.clone());
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        }
    }

    /// Names of replace-forcing attributes and blocks whose value differs
    /// between `prior` and `planned`.
    pub fn requires_replace(&self, prior: &ResourceState, planned: &ResourceState) -> Vec<String> {
        let attributes = self
            .attributes
            .iter()
            .filter(|(_, a)| a.requires_replace)
            .map(|(n, _)| n);
        let blocks = self
            .blocks
            .iter()
            .filter(|(_, b)| b.requires_replace)
            .map(|(n, _)| n);

        attributes
            .chain(blocks)
            .filter(|name| prior.attribute(name) != planned.attribute(name))
            .cloned()
            .collect()
    }
}

fn validate_attributes(
    schema: &BTreeMap<String, Attribute>,
    values: &BTreeMap<String, serde_json::Value>,
    prefix: &str,
    errors: &mut Vec<SchemaError>,
) {
    for (name, attribute) in schema {
        match values.get(name) {
            None | Some(serde_json::Value::Null) => {
                if attribute.required && attribute.default.is_none() {
                    errors.push(SchemaError::MissingAttribute(format!("{prefix}{name}")));
                }
            }
            Some(value) if !attribute.attribute_type.matches(value) => {
                errors.push(SchemaError::WrongType {
                    name: format!("{prefix}{name}"),
                    expected: attribute.attribute_type,
                });
            }
            Some(_) => {}
        }
    }
}
