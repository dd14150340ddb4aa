//! Post-validation action pipelines.
//!
//! A pipe runs its schema first, then feeds the typed output through the
//! actions in order. Checks emit validation-kind issues without untyping the
//! dataset; transforms only run while the dataset is issue-free, so they
//! never see a value that failed an earlier check.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::dataset::{Config, Dataset, Issue, describe};
use crate::schema::{CheckFn, Schema};

/// Value-to-value transform, applied to the owned output.
pub type TransformFn = dyn Fn(Value) -> Value + Send + Sync;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w+-]+(?:\.[\w+-]+)*@[\da-z]+(?:[.-][\da-z]+)*\.[a-z]{2,}$").unwrap()
});

pub enum Action {
    MinLength { min: usize },
    MaxLength { max: usize },
    Regex { regex: Regex },
    Email,
    MinValue { min: f64 },
    MaxValue { max: f64 },
    /// Arbitrary predicate over the validated value.
    Check { check: Box<CheckFn>, expects: String },
    /// Rewrites the value; runs only while the dataset has no issues.
    Transform { transform: Box<TransformFn> },
}

impl Action {
    pub fn min_length(min: usize) -> Self {
        Action::MinLength { min }
    }

    pub fn max_length(max: usize) -> Self {
        Action::MaxLength { max }
    }

    pub fn regex(regex: Regex) -> Self {
        Action::Regex { regex }
    }

    pub fn email() -> Self {
        Action::Email
    }

    pub fn min_value(min: f64) -> Self {
        Action::MinValue { min }
    }

    pub fn max_value(max: f64) -> Self {
        Action::MaxValue { max }
    }

    pub fn check(
        expects: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Action::Check { check: Box::new(check), expects: expects.into() }
    }

    pub fn transform(transform: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Action::Transform { transform: Box::new(transform) }
    }
}

/// Length in the sense the length actions check: characters for strings,
/// elements for arrays. Other kinds are not length-checked.
fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn check_action(action: &Action, value: &Value, config: &Config) -> Option<Issue> {
    match action {
        Action::MinLength { min } => {
            let len = length_of(value)?;
            (len < *min).then(|| {
                Issue::validation(
                    "min_length",
                    "length",
                    format!(">={min}"),
                    len.to_string(),
                    value.clone(),
                    Some(json!(*min)),
                    config,
                )
            })
        }
        Action::MaxLength { max } => {
            let len = length_of(value)?;
            (len > *max).then(|| {
                Issue::validation(
                    "max_length",
                    "length",
                    format!("<={max}"),
                    len.to_string(),
                    value.clone(),
                    Some(json!(*max)),
                    config,
                )
            })
        }
        Action::Regex { regex } => {
            let s = value.as_str()?;
            (!regex.is_match(s)).then(|| {
                Issue::validation(
                    "regex",
                    "format",
                    regex.as_str().to_string(),
                    describe(Some(value)),
                    value.clone(),
                    Some(Value::String(regex.as_str().to_string())),
                    config,
                )
            })
        }
        Action::Email => {
            let s = value.as_str()?;
            (!EMAIL_RE.is_match(s)).then(|| {
                Issue::validation(
                    "email",
                    "email",
                    "email",
                    describe(Some(value)),
                    value.clone(),
                    Some(Value::String(EMAIL_RE.as_str().to_string())),
                    config,
                )
            })
        }
        Action::MinValue { min } => {
            let n = value.as_f64()?;
            (n < *min).then(|| {
                Issue::validation(
                    "min_value",
                    "value",
                    format!(">={min}"),
                    describe(Some(value)),
                    value.clone(),
                    Some(json!(*min)),
                    config,
                )
            })
        }
        Action::MaxValue { max } => {
            let n = value.as_f64()?;
            (n > *max).then(|| {
                Issue::validation(
                    "max_value",
                    "value",
                    format!("<={max}"),
                    describe(Some(value)),
                    value.clone(),
                    Some(json!(*max)),
                    config,
                )
            })
        }
        Action::Check { check, expects } => (!check(value)).then(|| {
            Issue::validation(
                "check",
                "input",
                expects.clone(),
                describe(Some(value)),
                value.clone(),
                None,
                config,
            )
        }),
        Action::Transform { .. } => None,
    }
}

fn run_actions(actions: &[Action], dataset: &mut Dataset, config: &Config) {
    // Untyped output never reaches the pipeline. With abort_early an issue
    // from the schema step is already terminal.
    if !dataset.typed || (!dataset.issues.is_empty() && config.abort_early) {
        return;
    }
    for action in actions {
        match action {
            Action::Transform { transform } => {
                if dataset.issues.is_empty() {
                    let value = std::mem::take(&mut dataset.value);
                    dataset.value = transform(value);
                }
            }
            action => {
                if let Some(issue) = check_action(action, &dataset.value, config) {
                    dataset.push_issue(issue);
                    if config.abort_early || config.abort_pipe_early {
                        return;
                    }
                }
            }
        }
    }
}

pub(crate) fn validate_pipe(
    schema: &Schema,
    actions: &[Action],
    dataset: Dataset,
    config: &Config,
) -> Dataset {
    let mut dataset = schema.validate(dataset, config);
    run_actions(actions, &mut dataset, config);
    dataset
}

/// Actions themselves are synchronous; only the schema step can suspend.
pub(crate) async fn validate_pipe_async(
    schema: &Schema,
    actions: &[Action],
    dataset: Dataset,
    config: &Config,
) -> Dataset {
    let mut dataset = schema.validate_async(dataset, config).await;
    run_actions(actions, &mut dataset, config);
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::IssueKind;
    use crate::schema::{array, number, object, pipe, string};
    use serde_json::json;

    fn run(schema: &Schema, value: Value) -> Dataset {
        schema.validate(Dataset::new(value), &Config::default())
    }

    #[test]
    fn min_length_reports_the_actual_length() {
        let schema = pipe(string(), [Action::min_length(3)]);
        assert!(run(&schema, json!("abc")).is_ok());

        let out = run(&schema, json!("ab"));
        assert!(out.typed, "check failures keep the dataset typed");
        assert_eq!(out.issues.len(), 1);
        let issue = &out.issues[0];
        assert_eq!(issue.kind, IssueKind::Validation);
        assert_eq!(issue.code, "min_length");
        assert_eq!(issue.expected, ">=3");
        assert_eq!(issue.received, "2");
        assert_eq!(issue.requirement, Some(json!(3)));
        assert_eq!(issue.message, "Invalid length: Expected >=3 but received 2");
    }

    #[test]
    fn length_actions_cover_arrays() {
        let schema = pipe(array(number()), [Action::max_length(2)]);
        assert!(run(&schema, json!([1, 2])).is_ok());
        let out = run(&schema, json!([1, 2, 3]));
        assert_eq!(out.issues[0].code, "max_length");
        assert_eq!(out.issues[0].received, "3");
    }

    #[test]
    fn value_bounds() {
        let schema = pipe(number(), [Action::min_value(0.0), Action::max_value(10.0)]);
        assert!(run(&schema, json!(5)).is_ok());

        let low = run(&schema, json!(-1));
        assert_eq!(low.issues[0].code, "min_value");
        assert_eq!(low.issues[0].expected, ">=0");

        let high = run(&schema, json!(11));
        assert_eq!(high.issues[0].code, "max_value");
        assert_eq!(high.issues[0].received, "11");
    }

    #[test]
    fn email_and_regex_formats() {
        let email = pipe(string(), [Action::email()]);
        assert!(run(&email, json!("a.b@example.com")).is_ok());
        let bad = run(&email, json!("not-an-email"));
        assert_eq!(bad.issues[0].code, "email");
        assert_eq!(bad.issues[0].received, "\"not-an-email\"");

        let hex = pipe(string(), [Action::regex(Regex::new(r"^[0-9a-f]+$").unwrap())]);
        assert!(run(&hex, json!("deadbeef")).is_ok());
        let bad = run(&hex, json!("xyz"));
        assert_eq!(bad.issues[0].code, "regex");
        assert_eq!(bad.issues[0].expected, "^[0-9a-f]+$");
    }

    #[test]
    fn check_action_uses_its_expects() {
        let schema = pipe(
            number(),
            [Action::check("even number", |v: &Value| v.as_i64().is_some_and(|n| n % 2 == 0))],
        );
        assert!(run(&schema, json!(4)).is_ok());
        let out = run(&schema, json!(3));
        assert_eq!(out.issues[0].code, "check");
        assert_eq!(out.issues[0].expected, "even number");
    }

    #[test]
    fn actions_skip_untyped_output() {
        let schema = pipe(string(), [Action::min_length(3)]);
        let out = run(&schema, json!(42));
        // Only the type issue; the length check never ran.
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].code, "string");
    }

    #[test]
    fn transform_runs_only_issue_free() {
        let upper = pipe(
            string(),
            [Action::min_length(3), Action::transform(|v| {
                json!(v.as_str().map(str::to_uppercase).unwrap_or_default())
            })],
        );
        let ok = run(&upper, json!("abc"));
        assert_eq!(ok.value, json!("ABC"));

        let bad = run(&upper, json!("ab"));
        // The min_length issue blocks the transform; the value is untouched.
        assert_eq!(bad.value, json!("ab"));
        assert_eq!(bad.issues.len(), 1);
    }

    #[test]
    fn checks_after_a_failure_still_run_by_default() {
        let schema = pipe(string(), [Action::min_length(5), Action::email()]);
        let out = run(&schema, json!("ab"));
        assert_eq!(out.issues.len(), 2);
        assert_eq!(out.issues[0].code, "min_length");
        assert_eq!(out.issues[1].code, "email");
    }

    #[test]
    fn abort_pipe_early_stops_after_the_first_action_issue() {
        let schema = pipe(string(), [Action::min_length(5), Action::email()]);
        let config = Config { abort_pipe_early: true, ..Config::default() };
        let out = schema.validate(Dataset::new(json!("ab")), &config);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].code, "min_length");
    }

    #[test]
    fn abort_early_is_terminal_across_the_pipe() {
        let schema = object([("name", pipe(string(), [Action::min_length(5), Action::email()]))]);
        let config = Config { abort_early: true, ..Config::default() };
        let out = schema.validate(Dataset::new(json!({ "name": "ab" })), &config);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].code, "min_length");
        assert_eq!(out.issues[0].dot_path(), "name");
    }

    #[test]
    fn pipe_issues_carry_container_paths() {
        let schema = object([("name", pipe(string(), [Action::min_length(3)]))]);
        let out = run(&schema, json!({ "name": "ab" }));
        assert!(out.typed);
        assert_eq!(out.issues[0].dot_path(), "name");
    }

    #[tokio::test]
    async fn async_pipe_matches_sync() {
        let schema = pipe(string(), [Action::min_length(3), Action::email()]);
        for input in [json!("a.b@example.com"), json!("ab"), json!(1)] {
            let s = schema.validate(Dataset::new(input.clone()), &Config::default());
            let a = schema
                .validate_async(Dataset::new(input.clone()), &Config::default())
                .await;
            assert_eq!(s.typed, a.typed);
            assert_eq!(s.value, a.value);
            assert_eq!(s.issues.len(), a.issues.len());
        }
    }
}
