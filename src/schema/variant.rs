//! Discriminated-union ("variant") resolution.
//!
//! Depth-first, order-preserving search over the options. Nested variants
//! contribute their own discriminator key and share one search state, so
//! best-candidate tracking and the invalid-discriminator locator are global
//! across the whole recursive search.
//!
//! When nothing matches, the single reported issue points at the most
//! useful failing discriminator: the outermost one (lowest priority index),
//! with an equal-priority tie broken in favor of a key actually present on
//! the input.

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::dataset::{Config, Dataset, Issue, PathItem, PathKey, PathKind, PathOrigin};
use crate::schema::{MissingPolicy, Schema};

#[derive(Default)]
struct Search {
    /// Best full-validation result so far. A typed result replaces an
    /// untyped one; the first found wins ties.
    best: Option<Dataset>,
    /// Currently tracked failing discriminator key.
    invalid: Option<InvalidKey>,
    /// Expected-value descriptions collected for the tracked key, deduped,
    /// in option order.
    expected: Vec<String>,
}

struct InvalidKey {
    key: String,
    /// Index of the key in the active-key list at check time. Lower index
    /// means an outer variant, which takes precedence.
    priority: usize,
    /// Whether the key exists on the input at all.
    present: bool,
}

impl Search {
    fn record_key_failure(&mut self, key: &str, priority: usize, present: bool, desc: String) {
        let replace = match &self.invalid {
            None => true,
            Some(cur) => {
                priority < cur.priority || (priority == cur.priority && present && !cur.present)
            }
        };
        if replace {
            self.invalid = Some(InvalidKey { key: key.to_string(), priority, present });
            self.expected.clear();
        }
        if self.invalid.as_ref().is_some_and(|cur| cur.key == key) && !self.expected.contains(&desc)
        {
            self.expected.push(desc);
        }
    }

    /// Candidate bookkeeping. Returns true when the search must stop
    /// (zero-issue result found).
    fn record_candidate(&mut self, ds: Dataset) -> bool {
        if ds.issues.is_empty() {
            self.best = Some(ds);
            return true;
        }
        match &self.best {
            None => self.best = Some(ds),
            Some(cur) if ds.typed && !cur.typed => self.best = Some(ds),
            _ => {}
        }
        false
    }
}

/// Cheap discriminator check for one active key against one option, without
/// touching any output. `None` when the option does not constrain the key.
fn key_check_fails(
    option: &Schema,
    active_key: &str,
    input: &Map<String, Value>,
    config: &Config,
) -> Option<bool> {
    let entry_schema = option.entry(active_key)?;
    let failed = match input.get(active_key) {
        Some(v) => {
            let ds = entry_schema.validate(Dataset::new(v.clone()), config);
            !ds.issues.is_empty()
        }
        None => !matches!(
            entry_schema.missing_policy(),
            MissingPolicy::Skip | MissingPolicy::Default(_)
        ),
    };
    Some(failed)
}

// ————————————————————————————————————————————————————————————————————————————
// SYNC
// ————————————————————————————————————————————————————————————————————————————

fn search_options(
    options: &[Schema],
    active_keys: &mut Vec<String>,
    search: &mut Search,
    input: &Map<String, Value>,
    config: &Config,
) -> bool {
    for option in options {
        match option {
            Schema::Variant { key: nested_key, options: nested } => {
                let added = if active_keys.iter().any(|k| k == nested_key) {
                    false
                } else {
                    active_keys.push(nested_key.clone());
                    true
                };
                let stop = search_options(nested, active_keys, search, input, config);
                if added {
                    active_keys.pop();
                }
                if stop {
                    return true;
                }
            }
            option => {
                let mut keys_ok = true;
                for (priority, active_key) in active_keys.iter().enumerate() {
                    let Some(failed) = key_check_fails(option, active_key, input, config) else {
                        continue;
                    };
                    if failed {
                        keys_ok = false;
                        let desc = option
                            .entry(active_key)
                            .map(Schema::expects)
                            .unwrap_or_default();
                        let present = input.contains_key(active_key);
                        search.record_key_failure(active_key, priority, present, desc);
                        break;
                    }
                }
                if keys_ok {
                    let ds = option.validate(Dataset::new(Value::Object(input.clone())), config);
                    if search.record_candidate(ds) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

pub(crate) fn validate_variant(
    key: &str,
    options: &[Schema],
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let Value::Object(input) = &dataset.value else {
        let issue = Issue::schema("variant", "Object", Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
        return dataset;
    };
    let input = input.clone();

    let mut search = Search::default();
    let mut active_keys = vec![key.to_string()];
    search_options(options, &mut active_keys, &mut search, &input, config);
    finish_variant(search, dataset, &input, config)
}

/// Turn the settled search state into the variant's result: the best
/// candidate when one exists (a closest typed match beats no match), or
/// exactly one issue located at the tracked invalid discriminator.
fn finish_variant(
    search: Search,
    mut dataset: Dataset,
    input: &Map<String, Value>,
    config: &Config,
) -> Dataset {
    if let Some(best) = search.best {
        return best;
    }
    match search.invalid {
        Some(inv) => {
            let value = input.get(&inv.key).cloned();
            let mut issue = Issue::schema("variant", search.expected.join("|"), value.clone(), config);
            issue.prefix_path(PathItem {
                kind: PathKind::Object,
                origin: PathOrigin::Value,
                input: Value::Object(input.clone()),
                key: PathKey::Key(inv.key),
                value,
            });
            dataset.push_issue(issue);
        }
        // No option constrained any active key (e.g. empty options).
        None => {
            let issue = Issue::schema("variant", "Object", Some(dataset.value.clone()), config);
            dataset.push_issue(issue);
        }
    }
    dataset
}

// ————————————————————————————————————————————————————————————————————————————
// ASYNC
// ————————————————————————————————————————————————————————————————————————————

/// Depth-first flattening of the option tree, pairing each leaf option with
/// the active-key snapshot it must satisfy.
fn flatten_options<'a>(
    options: &'a [Schema],
    active_keys: &mut Vec<String>,
    out: &mut Vec<(&'a Schema, Vec<String>)>,
) {
    for option in options {
        match option {
            Schema::Variant { key: nested_key, options: nested } => {
                let added = if active_keys.iter().any(|k| k == nested_key) {
                    false
                } else {
                    active_keys.push(nested_key.clone());
                    true
                };
                flatten_options(nested, active_keys, out);
                if added {
                    active_keys.pop();
                }
            }
            option => out.push((option, active_keys.clone())),
        }
    }
}

/// Outcome of one scheduled option probe.
enum Probe {
    KeyFailed { key: String, priority: usize, present: bool, desc: String },
    Validated(Dataset),
}

pub(crate) async fn validate_variant_async(
    key: &str,
    options: &[Schema],
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let Value::Object(input) = &dataset.value else {
        let issue = Issue::schema("variant", "Object", Some(dataset.value.clone()), config);
        dataset.push_issue(issue);
        return dataset;
    };
    let input = input.clone();

    let mut active_keys = vec![key.to_string()];
    let mut flat = Vec::new();
    flatten_options(options, &mut active_keys, &mut flat);

    // Probe every option concurrently; the fold below walks the settled
    // results in declaration order, so the outcome (including early stop
    // and locator state) is identical to the sync search.
    let input_ref = &input;
    let probes: Vec<_> = flat
        .iter()
        .map(|(option, keys)| async move {
            for (priority, active_key) in keys.iter().enumerate() {
                let Some(entry_schema) = option.entry(active_key) else { continue };
                let failed = match input_ref.get(active_key.as_str()) {
                    Some(v) => {
                        let ds = entry_schema.validate_async(Dataset::new(v.clone()), config).await;
                        !ds.issues.is_empty()
                    }
                    None => !matches!(
                        entry_schema.missing_policy(),
                        MissingPolicy::Skip | MissingPolicy::Default(_)
                    ),
                };
                if failed {
                    return Probe::KeyFailed {
                        key: active_key.clone(),
                        priority,
                        present: input_ref.contains_key(active_key.as_str()),
                        desc: entry_schema.expects(),
                    };
                }
            }
            let ds = option
                .validate_async(Dataset::new(Value::Object(input_ref.clone())), config)
                .await;
            Probe::Validated(ds)
        })
        .collect();
    let results = join_all(probes).await;

    let mut search = Search::default();
    for probe in results {
        match probe {
            Probe::KeyFailed { key, priority, present, desc } => {
                search.record_key_failure(&key, priority, present, desc);
            }
            Probe::Validated(ds) => {
                if search.record_candidate(ds) {
                    break;
                }
            }
        }
    }
    finish_variant(search, dataset, &input, config)
}
