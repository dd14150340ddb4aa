//! The closed schema sum type and its validation dispatch.
//!
//! The source of truth for "what kinds of schema exist" is the [`Schema`]
//! enum; every validate path is an exhaustive match, so adding a schema kind
//! without wiring it into both engines is a compile error.
//!
//! Design notes:
//! - Composite schemas own their children (`Box`/`Vec`/`IndexMap`) and are
//!   immutable after construction, so one schema value can serve arbitrarily
//!   many concurrent validate calls.
//! - `validate` moves the [`Dataset`] in and out; it is never shared across
//!   async branches (each branch gets its own and results are merged).
//! - The async engine mirrors the sync one; purely-sync subtrees take the
//!   sync path even under `validate_async`.

pub mod containers;
pub mod leaves;
pub mod object;
pub mod pipe;
pub mod variant;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use crate::dataset::{Config, Dataset, describe};
pub use pipe::Action;

/// Synchronous custom check: true means the value passes.
pub type CheckFn = dyn Fn(&Value) -> bool + Send + Sync;
/// Asynchronous custom check.
pub type AsyncCheckFn = dyn for<'a> Fn(&'a Value) -> BoxFuture<'a, bool> + Send + Sync;

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

pub enum Schema {
    /// Accepts anything, including null.
    Any,
    Null,
    Bool,
    Number,
    String,
    /// Strict equality against one JSON value.
    Literal { value: Value },
    /// Leaf predicate supplied by the caller.
    Custom { check: Box<CheckFn>, expects: String },
    /// Async leaf predicate; makes the whole schema async-only.
    CustomAsync { check: Box<AsyncCheckFn>, expects: String },
    /// Tolerates absence inside object entries; validates `inner` otherwise.
    Optional { inner: Box<Schema>, default: Option<Value> },
    /// Accepts null (replaced by `default` when one exists).
    Nullable { inner: Box<Schema>, default: Option<Value> },
    Array { item: Box<Schema> },
    /// String-keyed map: `key` validates each key, `value` each value.
    Record { key: Box<Schema>, value: Box<Schema> },
    /// Fixed entries, declaration order preserved. Unknown keys are dropped.
    Object { entries: IndexMap<String, Schema> },
    /// Fixed entries plus a `rest` schema for every remaining key.
    ObjectWithRest { entries: IndexMap<String, Schema>, rest: Box<Schema> },
    /// All options against the same input, outputs structurally merged.
    Intersect { options: Vec<Schema> },
    /// Discriminated union over `key`.
    Variant { key: String, options: Vec<Schema> },
    /// A schema followed by post-validation actions.
    Pipe { schema: Box<Schema>, actions: Vec<Action> },
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schema::Any => f.write_str("Any"),
            Schema::Null => f.write_str("Null"),
            Schema::Bool => f.write_str("Bool"),
            Schema::Number => f.write_str("Number"),
            Schema::String => f.write_str("String"),
            Schema::Literal { value } => f.debug_struct("Literal").field("value", value).finish(),
            Schema::Custom { expects, .. } => {
                f.debug_struct("Custom").field("expects", expects).finish_non_exhaustive()
            }
            Schema::CustomAsync { expects, .. } => {
                f.debug_struct("CustomAsync").field("expects", expects).finish_non_exhaustive()
            }
            Schema::Optional { inner, default } => f
                .debug_struct("Optional")
                .field("inner", inner)
                .field("default", default)
                .finish(),
            Schema::Nullable { inner, default } => f
                .debug_struct("Nullable")
                .field("inner", inner)
                .field("default", default)
                .finish(),
            Schema::Array { item } => f.debug_struct("Array").field("item", item).finish(),
            Schema::Record { key, value } => {
                f.debug_struct("Record").field("key", key).field("value", value).finish()
            }
            Schema::Object { entries } => {
                f.debug_struct("Object").field("entries", entries).finish()
            }
            Schema::ObjectWithRest { entries, rest } => f
                .debug_struct("ObjectWithRest")
                .field("entries", entries)
                .field("rest", rest)
                .finish(),
            Schema::Intersect { options } => {
                f.debug_struct("Intersect").field("options", options).finish()
            }
            Schema::Variant { key, options } => {
                f.debug_struct("Variant").field("key", key).field("options", options).finish()
            }
            Schema::Pipe { schema, .. } => {
                f.debug_struct("Pipe").field("schema", schema).finish_non_exhaustive()
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

pub fn any() -> Schema {
    Schema::Any
}

pub fn null_() -> Schema {
    Schema::Null
}

pub fn boolean() -> Schema {
    Schema::Bool
}

pub fn number() -> Schema {
    Schema::Number
}

pub fn string() -> Schema {
    Schema::String
}

pub fn literal(value: Value) -> Schema {
    Schema::Literal { value }
}

pub fn custom(expects: impl Into<String>, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Schema {
    Schema::Custom { check: Box::new(check), expects: expects.into() }
}

pub fn custom_async(
    expects: impl Into<String>,
    check: impl for<'a> Fn(&'a Value) -> BoxFuture<'a, bool> + Send + Sync + 'static,
) -> Schema {
    Schema::CustomAsync { check: Box::new(check), expects: expects.into() }
}

pub fn optional(inner: Schema) -> Schema {
    Schema::Optional { inner: Box::new(inner), default: None }
}

pub fn optional_default(inner: Schema, default: Value) -> Schema {
    Schema::Optional { inner: Box::new(inner), default: Some(default) }
}

pub fn nullable(inner: Schema) -> Schema {
    Schema::Nullable { inner: Box::new(inner), default: None }
}

pub fn nullable_default(inner: Schema, default: Value) -> Schema {
    Schema::Nullable { inner: Box::new(inner), default: Some(default) }
}

pub fn array(item: Schema) -> Schema {
    Schema::Array { item: Box::new(item) }
}

pub fn record(key: Schema, value: Schema) -> Schema {
    Schema::Record { key: Box::new(key), value: Box::new(value) }
}

pub fn object<K, I>(entries: I) -> Schema
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Schema)>,
{
    Schema::Object {
        entries: entries.into_iter().map(|(k, s)| (k.into(), s)).collect(),
    }
}

pub fn object_with_rest<K, I>(entries: I, rest: Schema) -> Schema
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Schema)>,
{
    Schema::ObjectWithRest {
        entries: entries.into_iter().map(|(k, s)| (k.into(), s)).collect(),
        rest: Box::new(rest),
    }
}

pub fn intersect(options: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::Intersect { options: options.into_iter().collect() }
}

pub fn variant(key: impl Into<String>, options: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::Variant { key: key.into(), options: options.into_iter().collect() }
}

pub fn pipe(schema: Schema, actions: impl IntoIterator<Item = Action>) -> Schema {
    Schema::Pipe { schema: Box::new(schema), actions: actions.into_iter().collect() }
}

// ————————————————————————————————————————————————————————————————————————————
// CAPABILITIES
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Stable type tag, used as the issue `type` field.
    pub fn code(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::Null => "null",
            Schema::Bool => "boolean",
            Schema::Number => "number",
            Schema::String => "string",
            Schema::Literal { .. } => "literal",
            Schema::Custom { .. } => "custom",
            Schema::CustomAsync { .. } => "custom",
            Schema::Optional { .. } => "optional",
            Schema::Nullable { .. } => "nullable",
            Schema::Array { .. } => "array",
            Schema::Record { .. } => "record",
            Schema::Object { .. } => "object",
            Schema::ObjectWithRest { .. } => "object_with_rest",
            Schema::Intersect { .. } => "intersect",
            Schema::Variant { .. } => "variant",
            Schema::Pipe { schema, .. } => schema.code(),
        }
    }

    /// Human-readable description of what the schema accepts.
    pub fn expects(&self) -> String {
        match self {
            Schema::Any => "unknown".to_string(),
            Schema::Null => "null".to_string(),
            Schema::Bool => "boolean".to_string(),
            Schema::Number => "number".to_string(),
            Schema::String => "string".to_string(),
            Schema::Literal { value } => describe(Some(value)),
            Schema::Custom { expects, .. } => expects.clone(),
            Schema::CustomAsync { expects, .. } => expects.clone(),
            Schema::Optional { inner, .. } => format!("({} | undefined)", inner.expects()),
            Schema::Nullable { inner, .. } => format!("({} | null)", inner.expects()),
            Schema::Array { .. } => "Array".to_string(),
            Schema::Record { .. } => "Object".to_string(),
            Schema::Object { .. } => "Object".to_string(),
            Schema::ObjectWithRest { .. } => "Object".to_string(),
            Schema::Intersect { options } => {
                let parts: Vec<String> = options.iter().map(Schema::expects).collect();
                parts.join(" & ")
            }
            Schema::Variant { .. } => "Object".to_string(),
            Schema::Pipe { schema, .. } => schema.expects(),
        }
    }

    /// True when any descendant carries an async custom check. The sync
    /// parse wrappers refuse such schemas up front.
    pub fn is_async(&self) -> bool {
        match self {
            Schema::CustomAsync { .. } => true,
            Schema::Any
            | Schema::Null
            | Schema::Bool
            | Schema::Number
            | Schema::String
            | Schema::Literal { .. }
            | Schema::Custom { .. } => false,
            Schema::Optional { inner, .. } | Schema::Nullable { inner, .. } => inner.is_async(),
            Schema::Array { item } => item.is_async(),
            Schema::Record { key, value } => key.is_async() || value.is_async(),
            Schema::Object { entries } => entries.values().any(Schema::is_async),
            Schema::ObjectWithRest { entries, rest } => {
                entries.values().any(Schema::is_async) || rest.is_async()
            }
            Schema::Intersect { options } | Schema::Variant { options, .. } => {
                options.iter().any(Schema::is_async)
            }
            Schema::Pipe { schema, .. } => schema.is_async(),
        }
    }

    /// How the object family treats this entry when its key is absent.
    pub(crate) fn missing_policy(&self) -> MissingPolicy {
        match self {
            Schema::Optional { default: Some(d), .. } => MissingPolicy::Default(d.clone()),
            Schema::Optional { default: None, .. } => MissingPolicy::Skip,
            Schema::Nullable { default: Some(d), .. } => MissingPolicy::Default(d.clone()),
            Schema::Pipe { schema, .. } => schema.missing_policy(),
            _ => MissingPolicy::Forbid,
        }
    }

    /// Entry schema under `key`, looking through pipes. Used by the variant
    /// discriminator pre-check.
    pub(crate) fn entry(&self, key: &str) -> Option<&Schema> {
        match self {
            Schema::Object { entries } => entries.get(key),
            Schema::ObjectWithRest { entries, .. } => entries.get(key),
            Schema::Pipe { schema, .. } => schema.entry(key),
            _ => None,
        }
    }
}

/// Absent-key handling for one object entry.
pub(crate) enum MissingPolicy {
    /// Required: absence is a key issue.
    Forbid,
    /// Tolerated: the key is simply left out of the output.
    Skip,
    /// Tolerated: validate this default in place of the missing value.
    Default(Value),
}

// ————————————————————————————————————————————————————————————————————————————
// DISPATCH
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Synchronous validation. Returns a dataset whose `issues` list is
    /// empty or non-empty ordered; never panics for representable inputs.
    pub fn validate(&self, dataset: Dataset, config: &Config) -> Dataset {
        match self {
            Schema::Any => leaves::validate_any(dataset),
            Schema::Null => leaves::validate_null(dataset, config),
            Schema::Bool => leaves::validate_bool(dataset, config),
            Schema::Number => leaves::validate_number(dataset, config),
            Schema::String => leaves::validate_string(dataset, config),
            Schema::Literal { value } => leaves::validate_literal(value, dataset, config),
            Schema::Custom { check, expects } => {
                leaves::validate_custom(check, expects, dataset, config)
            }
            Schema::CustomAsync { expects, .. } => {
                leaves::reject_async_in_sync(expects, dataset, config)
            }
            Schema::Optional { inner, .. } => inner.validate(dataset, config),
            Schema::Nullable { inner, default } => {
                leaves::validate_nullable(inner, default.as_ref(), dataset, config)
            }
            Schema::Array { item } => containers::validate_array(item, dataset, config),
            Schema::Record { key, value } => {
                containers::validate_record(key, value, dataset, config)
            }
            Schema::Object { entries } => object::validate_entries(entries, None, dataset, config),
            Schema::ObjectWithRest { entries, rest } => {
                object::validate_entries(entries, Some(rest), dataset, config)
            }
            Schema::Intersect { options } => {
                containers::validate_intersect(options, dataset, config)
            }
            Schema::Variant { key, options } => {
                variant::validate_variant(key, options, dataset, config)
            }
            Schema::Pipe { schema, actions } => pipe::validate_pipe(schema, actions, dataset, config),
        }
    }

    /// Asynchronous validation: same algorithms, with independent
    /// sub-validations scheduled concurrently and joined in declaration
    /// order before any issue-ordering decision is made.
    pub fn validate_async<'a>(&'a self, dataset: Dataset, config: &'a Config) -> BoxFuture<'a, Dataset> {
        Box::pin(async move {
            match self {
                Schema::CustomAsync { check, expects } => {
                    leaves::validate_custom_async(check, expects, dataset, config).await
                }
                Schema::Optional { inner, .. } => inner.validate_async(dataset, config).await,
                Schema::Nullable { inner, default } => {
                    leaves::validate_nullable_async(inner, default.as_ref(), dataset, config).await
                }
                Schema::Array { item } => {
                    containers::validate_array_async(item, dataset, config).await
                }
                Schema::Record { key, value } => {
                    containers::validate_record_async(key, value, dataset, config).await
                }
                Schema::Object { entries } => {
                    object::validate_entries_async(entries, None, dataset, config).await
                }
                Schema::ObjectWithRest { entries, rest } => {
                    object::validate_entries_async(entries, Some(rest), dataset, config).await
                }
                Schema::Intersect { options } => {
                    containers::validate_intersect_async(options, dataset, config).await
                }
                Schema::Variant { key, options } => {
                    variant::validate_variant_async(key, options, dataset, config).await
                }
                Schema::Pipe { schema, actions } => {
                    pipe::validate_pipe_async(schema, actions, dataset, config).await
                }
                // Purely synchronous leaves.
                Schema::Any
                | Schema::Null
                | Schema::Bool
                | Schema::Number
                | Schema::String
                | Schema::Literal { .. }
                | Schema::Custom { .. } => self.validate(dataset, config),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expects_descriptors() {
        assert_eq!(string().expects(), "string");
        assert_eq!(literal(json!("a")).expects(), "\"a\"");
        assert_eq!(optional(string()).expects(), "(string | undefined)");
        assert_eq!(nullable(number()).expects(), "(number | null)");
        assert_eq!(object([("a", string())]).expects(), "Object");
        assert_eq!(
            intersect([object([("a", string())]), object([("b", number())])]).expects(),
            "Object & Object"
        );
    }

    #[test]
    fn async_flag_bubbles_up_from_leaves() {
        let sync_schema = object([("a", string()), ("b", optional(number()))]);
        assert!(!sync_schema.is_async());

        let async_leaf = custom_async("even", |v: &Value| {
            let even = v.as_i64().is_some_and(|n| n % 2 == 0);
            Box::pin(async move { even })
        });
        let async_schema = object([("a", string()), ("b", async_leaf)]);
        assert!(async_schema.is_async());
    }

    #[test]
    fn missing_policy_looks_through_pipes() {
        let schema = pipe(optional(string()), []);
        assert!(matches!(schema.missing_policy(), MissingPolicy::Skip));
        assert!(matches!(string().missing_policy(), MissingPolicy::Forbid));
        assert!(matches!(
            nullable_default(string(), json!("x")).missing_policy(),
            MissingPolicy::Default(_)
        ));
        assert!(matches!(nullable(string()).missing_policy(), MissingPolicy::Forbid));
    }
}
