//! Leaf checks and wrappers.
//!
//! Leaves check one JSON value kind (or a predicate) and set `typed`; they
//! never recurse. The composite algorithms live in the sibling modules.

use serde_json::Value;

use crate::dataset::{Config, Dataset, Issue};
use crate::schema::{AsyncCheckFn, CheckFn, Schema};

pub(crate) fn validate_any(mut dataset: Dataset) -> Dataset {
    dataset.typed = true;
    dataset
}

pub(crate) fn validate_null(mut dataset: Dataset, config: &Config) -> Dataset {
    if dataset.value.is_null() {
        dataset.typed = true;
    } else {
        let issue = Issue::schema("null", "null", Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
    }
    dataset
}

pub(crate) fn validate_bool(mut dataset: Dataset, config: &Config) -> Dataset {
    if dataset.value.is_boolean() {
        dataset.typed = true;
    } else {
        let issue = Issue::schema("boolean", "boolean", Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
    }
    dataset
}

pub(crate) fn validate_number(mut dataset: Dataset, config: &Config) -> Dataset {
    if dataset.value.is_number() {
        dataset.typed = true;
    } else {
        let issue = Issue::schema("number", "number", Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
    }
    dataset
}

pub(crate) fn validate_string(mut dataset: Dataset, config: &Config) -> Dataset {
    if dataset.value.is_string() {
        dataset.typed = true;
    } else {
        let issue = Issue::schema("string", "string", Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
    }
    dataset
}

pub(crate) fn validate_literal(expected: &Value, mut dataset: Dataset, config: &Config) -> Dataset {
    if dataset.value == *expected {
        dataset.typed = true;
    } else {
        let issue = Issue::schema(
            "literal",
            crate::dataset::describe(Some(expected)),
            Some(dataset.value.clone()),
            config,
        );
        dataset.push_issue(issue);
    }
    dataset
}

pub(crate) fn validate_custom(
    check: &CheckFn,
    expects: &str,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    if check(&dataset.value) {
        dataset.typed = true;
    } else {
        let issue = Issue::schema("custom", expects, Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
    }
    dataset
}

pub(crate) async fn validate_custom_async(
    check: &AsyncCheckFn,
    expects: &str,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    if check(&dataset.value).await {
        dataset.typed = true;
    } else {
        let issue = Issue::schema("custom", expects, Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
    }
    dataset
}

/// An async custom check reached through the sync engine. The parse wrappers
/// refuse async schemas before validating, so this only fires on a direct
/// `validate` call; it stays in-band rather than panicking.
pub(crate) fn reject_async_in_sync(expects: &str, mut dataset: Dataset, config: &Config) -> Dataset {
    let mut issue = Issue::schema("async", expects, Some(dataset.value.clone()), config);
    issue.message = "Async check in synchronous validation: use validate_async".to_string();
    dataset.push_issue(issue);
    dataset
}

/// Null input: substitute the default when one exists, otherwise null is
/// already the typed output. Anything else goes to the inner schema.
pub(crate) fn validate_nullable(
    inner: &Schema,
    default: Option<&Value>,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    if dataset.value.is_null() {
        match default {
            Some(d) => {
                dataset.value = d.clone();
                inner.validate(dataset, config)
            }
            None => {
                dataset.typed = true;
                dataset
            }
        }
    } else {
        inner.validate(dataset, config)
    }
}

pub(crate) async fn validate_nullable_async(
    inner: &Schema,
    default: Option<&Value>,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    if dataset.value.is_null() {
        match default {
            Some(d) => {
                dataset.value = d.clone();
                inner.validate_async(dataset, config).await
            }
            None => {
                dataset.typed = true;
                dataset
            }
        }
    } else {
        inner.validate_async(dataset, config).await
    }
}
