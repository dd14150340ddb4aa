//! Dataset, issue, and path model.
//!
//! Every validation call threads a [`Dataset`] through the schema tree:
//! the raw input comes in as `value`, gets progressively replaced by
//! validated/coerced output, and structured [`Issue`]s accumulate in-band.
//! The engine never panics for representable input errors; a non-empty
//! issue list is the only failure signal.
//!
//! `typed` is subtler than "no issues": it is true once the subtree
//! structurally matches its schema's output shape, even if it still carries
//! issues (a valid object whose one field failed a length check stays
//! typed, so later pipeline actions can run over it).

use serde::Serialize;
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// DATASET
// ————————————————————————————————————————————————————————————————————————————

/// The unit of work flowing through `validate`.
///
/// An empty `issues` vec is the "absent" state; `Vec::new` does not allocate,
/// so the success path stays allocation-free.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub value: Value,
    pub typed: bool,
    pub issues: Vec<Issue>,
}

impl Dataset {
    /// Fresh dataset for a raw, untyped input value.
    pub fn new(value: Value) -> Self {
        Self { value, typed: false, issues: Vec::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}

/// Validation configuration, passed by shared reference through the whole
/// recursive call tree. Never mutated by the engine.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Stop collecting after the first issue, at every recursion level.
    pub abort_early: bool,
    /// Stop only post-validation action pipelines after their first issue.
    pub abort_pipe_early: bool,
    /// Message language hint, copied verbatim onto issues.
    pub lang: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// ISSUES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Wrong basic shape/type (including missing required keys and the
    /// synthetic union/intersect failures).
    Schema,
    /// A post-validation pipe action failed (length, format, ...).
    Validation,
}

/// One structured validation failure.
///
/// `expected`/`received` are human-readable descriptors (`"string"`,
/// `"\"abc\""`), not raw values; consumers and tests compare against them.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Stable tag naming the failing schema or action ("string", "object",
    /// "key", "variant", "intersect", "min_length", ...).
    #[serde(rename = "type")]
    pub code: &'static str,
    /// The failing value. `None` models a value that was not there at all
    /// (missing object key), which renders as `undefined`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub expected: String,
    pub received: String,
    pub message: String,
    /// Route from the validation root to the failing value, root first.
    /// Containers prepend their own item as the issue bubbles up.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathItem>,
    /// Action requirement (length bound, regex source, ...), when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_early: Option<bool>,
}

impl Issue {
    /// Core constructor; computes `received` and the message from the label
    /// ("type", "key", "length", ...) and the descriptors.
    pub fn new(
        kind: IssueKind,
        code: &'static str,
        label: &str,
        expected: impl Into<String>,
        input: Option<Value>,
        requirement: Option<Value>,
        config: &Config,
    ) -> Self {
        let expected = expected.into();
        let received = describe(input.as_ref());
        let message = format!("Invalid {label}: Expected {expected} but received {received}");
        Self {
            kind,
            code,
            input,
            expected,
            received,
            message,
            path: Vec::new(),
            requirement,
            lang: config.lang.clone(),
            abort_early: if config.abort_early { Some(true) } else { None },
        }
    }

    /// Schema-kind type issue ("Invalid type: Expected X but received Y").
    pub fn schema(
        code: &'static str,
        expected: impl Into<String>,
        input: Option<Value>,
        config: &Config,
    ) -> Self {
        Self::new(IssueKind::Schema, code, "type", expected, input, None, config)
    }

    /// Validation-kind issue from a pipe action, with an explicit `received`
    /// descriptor (actions report derived quantities like lengths).
    pub fn validation(
        code: &'static str,
        label: &str,
        expected: impl Into<String>,
        received: impl Into<String>,
        input: Value,
        requirement: Option<Value>,
        config: &Config,
    ) -> Self {
        let mut issue =
            Self::new(IssueKind::Validation, code, label, expected, Some(input), requirement, config);
        issue.received = received.into();
        issue.message = format!(
            "Invalid {label}: Expected {} but received {}",
            issue.expected, issue.received
        );
        issue
    }

    pub fn prefix_path(&mut self, item: PathItem) {
        self.path.insert(0, item);
    }

    /// Dot path from the issue's path items (`addresses.0.city`), for error
    /// display and logs.
    pub fn dot_path(&self) -> String {
        let mut out = String::new();
        for item in &self.path {
            if !out.is_empty() {
                out.push('.');
            }
            match &item.key {
                PathKey::Key(k) => out.push_str(k),
                PathKey::Index(i) => out.push_str(&i.to_string()),
            }
        }
        out
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PATHS
// ————————————————————————————————————————————————————————————————————————————

/// One step in the route from the validation root to a failing value.
#[derive(Debug, Clone, Serialize)]
pub struct PathItem {
    /// Container discriminator of the enclosing schema.
    #[serde(rename = "type")]
    pub kind: PathKind,
    pub origin: PathOrigin,
    /// The enclosing container value.
    pub input: Value,
    pub key: PathKey,
    /// The value under `key`; `None` when the key was missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Object,
    Array,
    Record,
}

/// Whether the issue is about the key itself or the value under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOrigin {
    Key,
    Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathKey {
    Key(String),
    Index(usize),
}

// ————————————————————————————————————————————————————————————————————————————
// DESCRIPTORS
// ————————————————————————————————————————————————————————————————————————————

/// Human-readable descriptor of a value: `"abc"` stays quoted, numbers and
/// booleans print bare, containers collapse to their basic type name, and an
/// absent value renders as `undefined` (wire parity for missing keys).
pub fn describe(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => format!("{s:?}"),
        Some(Value::Array(_)) => "Array".to_string(),
        Some(Value::Object(_)) => "Object".to_string(),
    }
}
