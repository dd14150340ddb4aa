//! Top-level parse entry points.
//!
//! `validate` on a schema is deliberately infallible at the Rust level (all
//! failure is in-band issues); these wrappers turn that into the `Result`
//! shape callers actually want at the boundary.

use serde_json::Value;

use crate::dataset::{Config, Dataset, Issue};
use crate::schema::Schema;

#[derive(Debug, thiserror::Error)]
pub enum ValiError {
    #[error("{}", issues_summary(.0))]
    Invalid(Vec<Issue>),
    #[error("schema contains async checks: use parse_async")]
    AsyncSchema,
}

fn issues_summary(issues: &[Issue]) -> String {
    let mut out = format!(
        "validation failed with {} issue{}",
        issues.len(),
        if issues.len() == 1 { "" } else { "s" }
    );
    for issue in issues {
        let path = issue.dot_path();
        if path.is_empty() {
            out.push_str(&format!("\n  {}", issue.message));
        } else {
            out.push_str(&format!("\n  {path}: {}", issue.message));
        }
    }
    out
}

/// Full validation result, including the partially-built output and the
/// `typed` flag. The lossless counterpart of [`parse`].
#[derive(Debug)]
pub struct ParseOutput {
    pub value: Value,
    pub typed: bool,
    pub issues: Vec<Issue>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    fn from_dataset(dataset: Dataset) -> Self {
        Self { value: dataset.value, typed: dataset.typed, issues: dataset.issues }
    }
}

/// Validate and keep everything the engine produced. The only hard error is
/// an async schema reaching the sync entry point.
pub fn safe_parse(schema: &Schema, value: Value, config: &Config) -> Result<ParseOutput, ValiError> {
    if schema.is_async() {
        return Err(ValiError::AsyncSchema);
    }
    let dataset = schema.validate(Dataset::new(value), config);
    Ok(ParseOutput::from_dataset(dataset))
}

/// Validate and return the output value, or the full issue list as an error.
pub fn parse(schema: &Schema, value: Value, config: &Config) -> Result<Value, ValiError> {
    let output = safe_parse(schema, value, config)?;
    if output.is_ok() {
        Ok(output.value)
    } else {
        Err(ValiError::Invalid(output.issues))
    }
}

/// Async counterpart of [`safe_parse`]; accepts sync schemas too.
pub async fn safe_parse_async(schema: &Schema, value: Value, config: &Config) -> ParseOutput {
    let dataset = schema.validate_async(Dataset::new(value), config).await;
    ParseOutput::from_dataset(dataset)
}

pub async fn parse_async(schema: &Schema, value: Value, config: &Config) -> Result<Value, ValiError> {
    let output = safe_parse_async(schema, value, config).await;
    if output.is_ok() {
        Ok(output.value)
    } else {
        Err(ValiError::Invalid(output.issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{custom_async, number, object, optional, string};
    use serde_json::json;

    #[test]
    fn parse_returns_the_validated_output() {
        let schema = object([("name", string()), ("age", optional(number()))]);
        let value = parse(&schema, json!({ "name": "ada", "extra": 1 }), &Config::default())
            .expect("valid input");
        assert_eq!(value, json!({ "name": "ada" }));
    }

    #[test]
    fn parse_error_lists_issue_paths() {
        let schema = object([("name", string()), ("age", number())]);
        let err = parse(&schema, json!({ "name": 1 }), &Config::default()).unwrap_err();
        let ValiError::Invalid(issues) = &err else { panic!("expected Invalid") };
        assert_eq!(issues.len(), 2);
        let text = err.to_string();
        assert!(text.contains("2 issues"), "{text}");
        assert!(text.contains("name: Invalid type: Expected string but received 1"), "{text}");
        assert!(text.contains("age: Invalid key"), "{text}");
    }

    #[test]
    fn safe_parse_keeps_partial_output() {
        let schema = object([("name", string()), ("age", number())]);
        let out = safe_parse(&schema, json!({ "name": "ada", "age": "x" }), &Config::default())
            .expect("sync schema");
        assert!(!out.is_ok());
        assert_eq!(out.value["name"], json!("ada"));
    }

    #[test]
    fn sync_entry_refuses_async_schemas() {
        let schema = object([(
            "id",
            custom_async("known id", |v: &Value| {
                let ok = v.is_string();
                Box::pin(async move { ok })
            }),
        )]);
        let err = safe_parse(&schema, json!({ "id": "a" }), &Config::default()).unwrap_err();
        assert!(matches!(err, ValiError::AsyncSchema));
    }

    #[tokio::test]
    async fn parse_async_runs_async_checks() {
        let schema = object([(
            "id",
            custom_async("known id", |v: &Value| {
                let ok = v.as_str().is_some_and(|s| s.starts_with("id_"));
                Box::pin(async move { ok })
            }),
        )]);
        let config = Config::default();
        let value = parse_async(&schema, json!({ "id": "id_1" }), &config).await.expect("valid");
        assert_eq!(value, json!({ "id": "id_1" }));

        let err = parse_async(&schema, json!({ "id": "nope" }), &config).await.unwrap_err();
        let ValiError::Invalid(issues) = err else { panic!("expected Invalid") };
        assert_eq!(issues[0].expected, "known id");
    }
}
