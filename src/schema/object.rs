//! Object-family entry validation (object, object-with-rest).
//!
//! Invariants:
//! - Output is always a freshly allocated map containing only explicitly
//!   processed keys; nothing passes through untouched.
//! - `__proto__` / `prototype` / `constructor` are never copied into the
//!   output, even when the rest schema would accept anything.
//! - Entries run in declaration order; rest keys in input order after them.
//! - `abort_early` halts both loops at the first issue and marks the
//!   composite untyped.

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::dataset::{Config, Dataset, Issue, IssueKind, PathItem, PathKey, PathKind, PathOrigin};
use crate::schema::{MissingPolicy, Schema};

/// Keys that must never reach the output map. Copying them would let
/// hostile payloads smuggle prototype-pollution shapes through `any`-typed
/// rest/value schemas.
pub(crate) const BLOCKED_KEYS: [&str; 3] = ["__proto__", "prototype", "constructor"];

pub(crate) fn is_blocked_key(key: &str) -> bool {
    BLOCKED_KEYS.contains(&key)
}

/// Kind `key` issue for a required entry that is absent from the input.
pub(crate) fn missing_key_issue(container: &Map<String, Value>, key: &str, config: &Config) -> Issue {
    let mut issue = Issue::new(
        IssueKind::Schema,
        "key",
        "key",
        format!("{key:?}"),
        None,
        None,
        config,
    );
    issue.prefix_path(PathItem {
        kind: PathKind::Object,
        origin: PathOrigin::Key,
        input: Value::Object(container.clone()),
        key: PathKey::Key(key.to_string()),
        value: None,
    });
    issue
}

/// Fold one validated child into the parent dataset: prefix the container
/// path item onto each child issue, propagate `typed`, write the (possibly
/// transformed) value into the fresh output. Returns true when `abort_early`
/// stops the whole algorithm.
pub(crate) fn merge_child(
    dataset: &mut Dataset,
    output: &mut Map<String, Value>,
    container: &Map<String, Value>,
    kind: PathKind,
    key: &str,
    child: Dataset,
    config: &Config,
) -> bool {
    if !child.issues.is_empty() {
        let item = PathItem {
            kind,
            origin: PathOrigin::Value,
            input: Value::Object(container.clone()),
            key: PathKey::Key(key.to_string()),
            value: Some(child.value.clone()),
        };
        for mut issue in child.issues {
            issue.prefix_path(item.clone());
            dataset.issues.push(issue);
        }
        if config.abort_early {
            dataset.typed = false;
            dataset.issues.truncate(1);
            return true;
        }
    }
    if !child.typed {
        dataset.typed = false;
    }
    output.insert(key.to_string(), child.value);
    false
}

// ————————————————————————————————————————————————————————————————————————————
// SYNC
// ————————————————————————————————————————————————————————————————————————————

pub(crate) fn validate_entries(
    entries: &IndexMap<String, Schema>,
    rest: Option<&Schema>,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let code = if rest.is_some() { "object_with_rest" } else { "object" };
    let input = match std::mem::take(&mut dataset.value) {
        Value::Object(map) => map,
        other => {
            let issue = Issue::schema(code, "Object", Some(other.clone()), config);
            dataset.value = other;
            dataset.push_issue(issue);
            return dataset;
        }
    };

    let mut output = Map::new();
    dataset.typed = true;
    let mut aborted = false;

    for (key, child) in entries {
        let child_value = match input.get(key) {
            Some(v) => Some(v.clone()),
            None => match child.missing_policy() {
                MissingPolicy::Default(d) => Some(d),
                MissingPolicy::Skip => None,
                MissingPolicy::Forbid => {
                    dataset.typed = false;
                    dataset.push_issue(missing_key_issue(&input, key, config));
                    if config.abort_early {
                        aborted = true;
                        break;
                    }
                    continue;
                }
            },
        };
        let Some(child_value) = child_value else { continue };
        let child = child.validate(Dataset::new(child_value), config);
        if merge_child(&mut dataset, &mut output, &input, PathKind::Object, key, child, config) {
            aborted = true;
            break;
        }
    }

    if !aborted {
        if let Some(rest_schema) = rest {
            for (key, value) in &input {
                if entries.contains_key(key.as_str()) || is_blocked_key(key) {
                    continue;
                }
                let child = rest_schema.validate(Dataset::new(value.clone()), config);
                if merge_child(&mut dataset, &mut output, &input, PathKind::Object, key, child, config) {
                    break;
                }
            }
        }
    }

    dataset.value = Value::Object(output);
    dataset
}

// ————————————————————————————————————————————————————————————————————————————
// ASYNC
// ————————————————————————————————————————————————————————————————————————————

/// Result slot for one scheduled entry, indexed by declaration position.
enum Slot {
    /// Optional without default, key absent: nothing to do.
    Skipped,
    /// Required key absent.
    Missing,
    Validated(Dataset),
}

pub(crate) async fn validate_entries_async(
    entries: &IndexMap<String, Schema>,
    rest: Option<&Schema>,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let code = if rest.is_some() { "object_with_rest" } else { "object" };
    let input = match std::mem::take(&mut dataset.value) {
        Value::Object(map) => map,
        other => {
            let issue = Issue::schema(code, "Object", Some(other.clone()), config);
            dataset.value = other;
            dataset.push_issue(issue);
            return dataset;
        }
    };

    let mut output = Map::new();
    dataset.typed = true;
    let mut aborted = false;

    // Schedule every entry in declaration order; join_all keeps results
    // positional, so the final issue order never depends on completion time.
    let entry_futures: Vec<_> = entries
        .iter()
        .map(|(key, child)| {
            let child_value = match input.get(key.as_str()) {
                Some(v) => Some(v.clone()),
                None => match child.missing_policy() {
                    MissingPolicy::Default(d) => Some(d),
                    MissingPolicy::Skip => None,
                    MissingPolicy::Forbid => {
                        return futures::future::Either::Left(std::future::ready(Slot::Missing));
                    }
                },
            };
            match child_value {
                None => futures::future::Either::Left(std::future::ready(Slot::Skipped)),
                Some(v) => futures::future::Either::Right(async move {
                    Slot::Validated(child.validate_async(Dataset::new(v), config).await)
                }),
            }
        })
        .collect();
    let results = join_all(entry_futures).await;

    for (key, slot) in entries.keys().zip(results) {
        match slot {
            Slot::Skipped => {}
            Slot::Missing => {
                dataset.typed = false;
                dataset.push_issue(missing_key_issue(&input, key, config));
                if config.abort_early {
                    dataset.issues.truncate(1);
                    aborted = true;
                    break;
                }
            }
            Slot::Validated(child) => {
                if merge_child(&mut dataset, &mut output, &input, PathKind::Object, key, child, config) {
                    aborted = true;
                    break;
                }
            }
        }
    }

    // Rest keys are only scheduled when no entry aborted; they always
    // order strictly after the entry loop.
    if !aborted {
        if let Some(rest_schema) = rest {
            let rest_keys: Vec<&String> = input
                .keys()
                .filter(|k| !entries.contains_key(k.as_str()) && !is_blocked_key(k))
                .collect();
            let rest_futures: Vec<_> = rest_keys
                .iter()
                .map(|key| {
                    let value = input[key.as_str()].clone();
                    async move { rest_schema.validate_async(Dataset::new(value), config).await }
                })
                .collect();
            let results = join_all(rest_futures).await;
            for (key, child) in rest_keys.into_iter().zip(results) {
                if merge_child(&mut dataset, &mut output, &input, PathKind::Object, key, child, config) {
                    break;
                }
            }
        }
    }

    dataset.value = Value::Object(output);
    dataset
}
