//! JSON-borne schema descriptors.
//!
//! A descriptor is the declarative subset of the schema language: everything
//! except code-only leaves (custom checks, transforms). It exists so the CLI
//! and config files can carry schemas as plain JSON; library users building
//! schemas in Rust use the constructors directly.

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::schema::pipe::Action;
use crate::schema::{self, Schema};

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Malformed descriptor JSON, with the JSON path of the offending node.
    #[error("at JSON path {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid regex pattern {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaDescriptor {
    Any,
    Null,
    Boolean,
    Number,
    String,
    Literal {
        value: Value,
    },
    Optional {
        inner: Box<SchemaDescriptor>,
        #[serde(default)]
        default: Option<Value>,
    },
    Nullable {
        inner: Box<SchemaDescriptor>,
        #[serde(default)]
        default: Option<Value>,
    },
    Array {
        item: Box<SchemaDescriptor>,
    },
    Record {
        key: Box<SchemaDescriptor>,
        value: Box<SchemaDescriptor>,
    },
    Object {
        entries: IndexMap<String, SchemaDescriptor>,
    },
    ObjectWithRest {
        entries: IndexMap<String, SchemaDescriptor>,
        rest: Box<SchemaDescriptor>,
    },
    Intersect {
        options: Vec<SchemaDescriptor>,
    },
    Variant {
        key: String,
        options: Vec<SchemaDescriptor>,
    },
    Pipe {
        schema: Box<SchemaDescriptor>,
        #[serde(default)]
        actions: Vec<ActionDescriptor>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDescriptor {
    MinLength { min: usize },
    MaxLength { max: usize },
    Regex { pattern: String },
    Email,
    MinValue { min: f64 },
    MaxValue { max: f64 },
}

impl ActionDescriptor {
    fn build(self) -> Result<Action, DescriptorError> {
        Ok(match self {
            ActionDescriptor::MinLength { min } => Action::min_length(min),
            ActionDescriptor::MaxLength { max } => Action::max_length(max),
            ActionDescriptor::Regex { pattern } => {
                let regex = Regex::new(&pattern)
                    .map_err(|source| DescriptorError::Regex { pattern, source })?;
                Action::regex(regex)
            }
            ActionDescriptor::Email => Action::email(),
            ActionDescriptor::MinValue { min } => Action::min_value(min),
            ActionDescriptor::MaxValue { max } => Action::max_value(max),
        })
    }
}

impl SchemaDescriptor {
    /// Materialize the descriptor into a runnable schema. Only regex
    /// compilation can fail.
    pub fn build(self) -> Result<Schema, DescriptorError> {
        Ok(match self {
            SchemaDescriptor::Any => schema::any(),
            SchemaDescriptor::Null => schema::null_(),
            SchemaDescriptor::Boolean => schema::boolean(),
            SchemaDescriptor::Number => schema::number(),
            SchemaDescriptor::String => schema::string(),
            SchemaDescriptor::Literal { value } => schema::literal(value),
            SchemaDescriptor::Optional { inner, default } => match default {
                Some(d) => schema::optional_default(inner.build()?, d),
                None => schema::optional(inner.build()?),
            },
            SchemaDescriptor::Nullable { inner, default } => match default {
                Some(d) => schema::nullable_default(inner.build()?, d),
                None => schema::nullable(inner.build()?),
            },
            SchemaDescriptor::Array { item } => schema::array(item.build()?),
            SchemaDescriptor::Record { key, value } => schema::record(key.build()?, value.build()?),
            SchemaDescriptor::Object { entries } => Schema::Object {
                entries: build_entries(entries)?,
            },
            SchemaDescriptor::ObjectWithRest { entries, rest } => Schema::ObjectWithRest {
                entries: build_entries(entries)?,
                rest: Box::new(rest.build()?),
            },
            SchemaDescriptor::Intersect { options } => schema::intersect(build_options(options)?),
            SchemaDescriptor::Variant { key, options } => {
                Schema::Variant { key, options: build_options(options)? }
            }
            SchemaDescriptor::Pipe { schema: inner, actions } => {
                let actions = actions
                    .into_iter()
                    .map(ActionDescriptor::build)
                    .collect::<Result<Vec<_>, _>>()?;
                schema::pipe(inner.build()?, actions)
            }
        })
    }
}

fn build_entries(
    entries: IndexMap<String, SchemaDescriptor>,
) -> Result<IndexMap<String, Schema>, DescriptorError> {
    entries.into_iter().map(|(k, d)| Ok((k, d.build()?))).collect()
}

fn build_options(options: Vec<SchemaDescriptor>) -> Result<Vec<Schema>, DescriptorError> {
    options.into_iter().map(SchemaDescriptor::build).collect()
}

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DescriptorError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DescriptorError::Parse {
        path: err.path().to_string(),
        source: err.into_inner(),
    })
}

/// Parse descriptor JSON and build the schema in one step.
pub fn schema_from_str(src: &str) -> Result<Schema, DescriptorError> {
    from_str_with_path::<SchemaDescriptor>(src)?.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Config, Dataset};
    use serde_json::json;

    #[test]
    fn object_descriptor_round_trips_through_validation() {
        let schema = schema_from_str(
            r#"{
                "type": "object",
                "entries": {
                    "name": { "type": "pipe",
                              "schema": { "type": "string" },
                              "actions": [{ "type": "min_length", "min": 1 }] },
                    "age": { "type": "optional", "inner": { "type": "number" } }
                }
            }"#,
        )
        .expect("valid descriptor");

        let ok = schema.validate(Dataset::new(json!({ "name": "ada" })), &Config::default());
        assert!(ok.is_ok());

        let bad = schema.validate(Dataset::new(json!({ "name": "" })), &Config::default());
        assert_eq!(bad.issues[0].code, "min_length");
    }

    #[test]
    fn variant_descriptor() {
        let schema = schema_from_str(
            r#"{
                "type": "variant",
                "key": "kind",
                "options": [
                    { "type": "object", "entries": {
                        "kind": { "type": "literal", "value": "a" },
                        "a": { "type": "string" } } },
                    { "type": "object", "entries": {
                        "kind": { "type": "literal", "value": "b" },
                        "b": { "type": "number" } } }
                ]
            }"#,
        )
        .expect("valid descriptor");
        let out = schema.validate(Dataset::new(json!({ "kind": "b", "b": 2 })), &Config::default());
        assert!(out.is_ok());
    }

    #[test]
    fn parse_error_carries_the_json_path() {
        let err = schema_from_str(
            r#"{ "type": "object", "entries": { "a": { "type": "nope" } } }"#,
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("entries.a"), "{text}");
    }

    #[test]
    fn bad_regex_is_a_build_error() {
        let err = schema_from_str(
            r#"{ "type": "pipe", "schema": { "type": "string" },
                 "actions": [{ "type": "regex", "pattern": "[" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DescriptorError::Regex { .. }));
    }
}
