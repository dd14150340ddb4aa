//! Container fan-out: array, record, intersect.
//!
//! Same shape as the object-family walk, different iteration targets:
//! arrays index by position, records iterate own keys (with the same
//! blocked-key guard), intersect runs every option against the identical
//! input and then attempts a structural merge of the outputs.

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::dataset::{Config, Dataset, Issue, PathItem, PathKey, PathKind, PathOrigin};
use crate::schema::Schema;
use crate::schema::object::is_blocked_key;

// ————————————————————————————————————————————————————————————————————————————
// ARRAY
// ————————————————————————————————————————————————————————————————————————————

fn merge_item(
    dataset: &mut Dataset,
    output: &mut Vec<Value>,
    container: &[Value],
    index: usize,
    child: Dataset,
    config: &Config,
) -> bool {
    if !child.issues.is_empty() {
        let item = PathItem {
            kind: PathKind::Array,
            origin: PathOrigin::Value,
            input: Value::Array(container.to_vec()),
            key: PathKey::Index(index),
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
    output.push(child.value);
    false
}

pub(crate) fn validate_array(item: &Schema, mut dataset: Dataset, config: &Config) -> Dataset {
    let input = match std::mem::take(&mut dataset.value) {
        Value::Array(items) => items,
        other => {
            let issue = Issue::schema("array", "Array", Some(other.clone()), config);
            dataset.value = other;
            dataset.push_issue(issue);
            return dataset;
        }
    };

    let mut output = Vec::with_capacity(input.len());
    dataset.typed = true;
    for (index, value) in input.iter().enumerate() {
        let child = item.validate(Dataset::new(value.clone()), config);
        if merge_item(&mut dataset, &mut output, &input, index, child, config) {
            break;
        }
    }
    dataset.value = Value::Array(output);
    dataset
}

pub(crate) async fn validate_array_async(
    item: &Schema,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let input = match std::mem::take(&mut dataset.value) {
        Value::Array(items) => items,
        other => {
            let issue = Issue::schema("array", "Array", Some(other.clone()), config);
            dataset.value = other;
            dataset.push_issue(issue);
            return dataset;
        }
    };

    let item_futures: Vec<_> = input
        .iter()
        .map(|value| {
            let value = value.clone();
            async move { item.validate_async(Dataset::new(value), config).await }
        })
        .collect();
    let results = join_all(item_futures).await;

    let mut output = Vec::with_capacity(input.len());
    dataset.typed = true;
    for (index, child) in results.into_iter().enumerate() {
        if merge_item(&mut dataset, &mut output, &input, index, child, config) {
            break;
        }
    }
    dataset.value = Value::Array(output);
    dataset
}

// ————————————————————————————————————————————————————————————————————————————
// RECORD
// ————————————————————————————————————————————————————————————————————————————

/// Fold one record entry: key dataset first (origin `key`), then value
/// dataset (origin `value`). The output only receives entries whose key
/// validated. Returns true on abort-early.
fn merge_record_entry(
    dataset: &mut Dataset,
    output: &mut Map<String, Value>,
    container: &Map<String, Value>,
    key: &str,
    key_ds: Dataset,
    value_ds: Dataset,
    config: &Config,
) -> bool {
    let key_typed = key_ds.typed;
    if !key_ds.issues.is_empty() {
        let item = PathItem {
            kind: PathKind::Record,
            origin: PathOrigin::Key,
            input: Value::Object(container.clone()),
            key: PathKey::Key(key.to_string()),
            value: Some(Value::String(key.to_string())),
        };
        for mut issue in key_ds.issues {
            issue.prefix_path(item.clone());
            dataset.issues.push(issue);
        }
        if config.abort_early {
            dataset.typed = false;
            dataset.issues.truncate(1);
            return true;
        }
    }
    if !key_typed {
        dataset.typed = false;
    }

    if !value_ds.issues.is_empty() {
        let item = PathItem {
            kind: PathKind::Record,
            origin: PathOrigin::Value,
            input: Value::Object(container.clone()),
            key: PathKey::Key(key.to_string()),
            value: Some(value_ds.value.clone()),
        };
        for mut issue in value_ds.issues {
            issue.prefix_path(item.clone());
            dataset.issues.push(issue);
        }
        if config.abort_early {
            dataset.typed = false;
            dataset.issues.truncate(1);
            return true;
        }
    }
    if !value_ds.typed {
        dataset.typed = false;
    }
    if key_typed {
        output.insert(key.to_string(), value_ds.value);
    }
    false
}

pub(crate) fn validate_record(
    key_schema: &Schema,
    value_schema: &Schema,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let input = match std::mem::take(&mut dataset.value) {
        Value::Object(map) => map,
        other => {
            let issue = Issue::schema("record", "Object", Some(other.clone()), config);
            dataset.value = other;
            dataset.push_issue(issue);
            return dataset;
        }
    };

    let mut output = Map::new();
    dataset.typed = true;
    for (key, value) in &input {
        if is_blocked_key(key) {
            continue;
        }
        let key_ds = key_schema.validate(Dataset::new(Value::String(key.clone())), config);
        let value_ds = value_schema.validate(Dataset::new(value.clone()), config);
        if merge_record_entry(&mut dataset, &mut output, &input, key, key_ds, value_ds, config) {
            break;
        }
    }
    dataset.value = Value::Object(output);
    dataset
}

pub(crate) async fn validate_record_async(
    key_schema: &Schema,
    value_schema: &Schema,
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let input = match std::mem::take(&mut dataset.value) {
        Value::Object(map) => map,
        other => {
            let issue = Issue::schema("record", "Object", Some(other.clone()), config);
            dataset.value = other;
            dataset.push_issue(issue);
            return dataset;
        }
    };

    let keys: Vec<&String> = input.keys().filter(|k| !is_blocked_key(k)).collect();
    let entry_futures: Vec<_> = keys
        .iter()
        .map(|key| {
            let key_value = Value::String((*key).clone());
            let value = input[key.as_str()].clone();
            async move {
                let key_ds = key_schema.validate_async(Dataset::new(key_value), config).await;
                let value_ds = value_schema.validate_async(Dataset::new(value), config).await;
                (key_ds, value_ds)
            }
        })
        .collect();
    let results = join_all(entry_futures).await;

    let mut output = Map::new();
    dataset.typed = true;
    for (key, (key_ds, value_ds)) in keys.into_iter().zip(results) {
        if merge_record_entry(&mut dataset, &mut output, &input, key, key_ds, value_ds, config) {
            break;
        }
    }
    dataset.value = Value::Object(output);
    dataset
}

// ————————————————————————————————————————————————————————————————————————————
// INTERSECT
// ————————————————————————————————————————————————————————————————————————————

/// Basic type name of a value, for the synthetic merge-failure issue.
fn basic_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Structural merge of two branch outputs. Objects union (recursing on
/// shared keys), arrays merge element-wise when lengths agree, primitives
/// must be equal. `Err` means the branches disagree irreconcilably.
fn merge_values(a: Value, b: Value) -> Result<Value, ()> {
    match (a, b) {
        (Value::Object(mut a), Value::Object(b)) => {
            for (k, bv) in b {
                match a.get_mut(&k) {
                    Some(av) => {
                        let merged = merge_values(std::mem::take(av), bv)?;
                        *av = merged;
                    }
                    None => {
                        a.insert(k, bv);
                    }
                }
            }
            Ok(Value::Object(a))
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(());
            }
            let merged: Result<Vec<Value>, ()> =
                a.into_iter().zip(b).map(|(x, y)| merge_values(x, y)).collect();
            Ok(Value::Array(merged?))
        }
        (a, b) => {
            if a == b {
                Ok(a)
            } else {
                Err(())
            }
        }
    }
}

/// Fold the N branch outputs once every branch ran: merge when all branches
/// were typed, emit exactly one synthetic `intersect` issue on conflict.
fn finish_intersect(
    mut dataset: Dataset,
    mut outputs: Vec<Value>,
    input: Value,
    config: &Config,
) -> Dataset {
    if !dataset.typed || outputs.is_empty() {
        dataset.value = input;
        return dataset;
    }
    let mut merged = outputs.remove(0);
    for next in outputs {
        let expected = basic_kind(&merged);
        match merge_values(merged, next) {
            Ok(v) => merged = v,
            Err(()) => {
                let issue = Issue::schema("intersect", expected, Some(input.clone()), config);
                dataset.typed = false;
                dataset.push_issue(issue);
                dataset.value = input;
                return dataset;
            }
        }
    }
    dataset.value = merged;
    dataset
}

pub(crate) fn validate_intersect(
    options: &[Schema],
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let input = std::mem::take(&mut dataset.value);
    dataset.typed = true;
    let mut outputs = Vec::with_capacity(options.len());
    for option in options {
        let child = option.validate(Dataset::new(input.clone()), config);
        if !child.issues.is_empty() {
            dataset.issues.extend(child.issues);
            if config.abort_early {
                dataset.typed = false;
                dataset.issues.truncate(1);
                dataset.value = input;
                return dataset;
            }
        }
        if !child.typed {
            dataset.typed = false;
        }
        outputs.push(child.value);
    }
    finish_intersect(dataset, outputs, input, config)
}

pub(crate) async fn validate_intersect_async(
    options: &[Schema],
    mut dataset: Dataset,
    config: &Config,
) -> Dataset {
    let input = std::mem::take(&mut dataset.value);
    dataset.typed = true;

    let option_futures: Vec<_> = options
        .iter()
        .map(|option| {
            let value = input.clone();
            async move { option.validate_async(Dataset::new(value), config).await }
        })
        .collect();
    let results = join_all(option_futures).await;

    let mut outputs = Vec::with_capacity(options.len());
    for child in results {
        if !child.issues.is_empty() {
            dataset.issues.extend(child.issues);
            if config.abort_early {
                dataset.typed = false;
                dataset.issues.truncate(1);
                dataset.value = input;
                return dataset;
            }
        }
        if !child.typed {
            dataset.typed = false;
        }
        outputs.push(child.value);
    }
    finish_intersect(dataset, outputs, input, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::pipe::Action;
    use crate::schema::{array, custom, intersect, number, object, pipe, record, string};
    use serde_json::json;

    fn run(schema: &Schema, value: Value) -> Dataset {
        schema.validate(Dataset::new(value), &Config::default())
    }

    #[test]
    fn array_indexes_issues_by_position() {
        let schema = array(number());
        let out = run(&schema, json!([1, "x", 3, "y"]));
        assert!(out.typed);
        assert_eq!(out.issues.len(), 2);
        assert_eq!(out.issues[0].path[0].key, PathKey::Index(1));
        assert_eq!(out.issues[1].path[0].key, PathKey::Index(3));
        assert_eq!(out.issues[0].dot_path(), "1");
    }

    #[test]
    fn array_rejects_non_arrays() {
        let out = run(&array(number()), json!({"0": 1}));
        assert!(!out.typed);
        assert_eq!(out.issues[0].code, "array");
        assert_eq!(out.issues[0].received, "Object");
    }

    #[test]
    fn array_abort_early_stops_at_first_bad_item() {
        let config = Config { abort_early: true, ..Config::default() };
        let out = array(number()).validate(Dataset::new(json!(["a", "b"])), &config);
        assert!(!out.typed);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].path[0].key, PathKey::Index(0));
    }

    #[test]
    fn record_validates_keys_with_key_origin() {
        let key_schema = custom("key of length 1", |v: &Value| {
            v.as_str().is_some_and(|s| s.len() == 1)
        });
        let schema = record(key_schema, number());
        let out = run(&schema, json!({ "a": 1, "long": 2 }));
        assert!(!out.typed);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].path[0].origin, PathOrigin::Key);
        assert_eq!(out.issues[0].path[0].kind, PathKind::Record);
        // The failing key never reaches the output.
        assert_eq!(out.value, json!({ "a": 1 }));
    }

    #[test]
    fn record_value_issues_use_value_origin() {
        let schema = record(string(), number());
        let out = run(&schema, json!({ "a": 1, "b": "x" }));
        assert!(out.typed);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].path[0].origin, PathOrigin::Value);
        assert_eq!(out.issues[0].dot_path(), "b");
    }

    #[test]
    fn intersect_merges_disjoint_objects() {
        let schema = intersect([
            object([("a", string())]),
            object([("b", number())]),
        ]);
        let out = run(&schema, json!({ "a": "x", "b": 2 }));
        assert!(out.typed && out.is_ok());
        assert_eq!(out.value, json!({ "a": "x", "b": 2 }));
    }

    #[test]
    fn intersect_merge_conflict_is_one_synthetic_issue() {
        // Second branch rewrites the shared field to a number, so the two
        // outputs disagree on a primitive and the merge must fail once.
        let to_number = pipe(string(), [Action::transform(|_| json!(1))]);
        let schema = intersect([
            object([("key", string())]),
            object([("key", to_number)]),
        ]);
        let out = run(&schema, json!({ "key": "foo" }));
        assert!(!out.typed);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].code, "intersect");
        assert_eq!(out.issues[0].expected, "Object");
    }

    #[test]
    fn intersect_collects_branch_issues_without_merging() {
        let schema = intersect([
            object([("a", string())]),
            object([("b", number())]),
        ]);
        let out = run(&schema, json!({ "a": 1, "b": "x" }));
        assert!(!out.typed || !out.issues.is_empty());
        assert_eq!(out.issues.len(), 2);
        assert_eq!(out.issues[0].dot_path(), "a");
        assert_eq!(out.issues[1].dot_path(), "b");
    }

    #[test]
    fn merge_values_recurses_and_compares() {
        let a = json!({ "x": { "y": 1 }, "s": "v" });
        let b = json!({ "x": { "z": 2 }, "s": "v" });
        assert_eq!(
            merge_values(a, b).unwrap(),
            json!({ "x": { "y": 1, "z": 2 }, "s": "v" })
        );
        assert!(merge_values(json!([1]), json!([1, 2])).is_err());
        assert!(merge_values(json!(1), json!(2)).is_err());
        assert_eq!(merge_values(json!([1, 2]), json!([1, 2])).unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn async_array_keeps_declaration_order() {
        let schema = array(number());
        let out = schema
            .validate_async(Dataset::new(json!(["a", 2, "c"])), &Config::default())
            .await;
        assert_eq!(out.issues.len(), 2);
        assert_eq!(out.issues[0].path[0].key, PathKey::Index(0));
        assert_eq!(out.issues[1].path[0].key, PathKey::Index(2));
    }

    #[tokio::test]
    async fn async_intersect_matches_sync() {
        let schema = intersect([
            object([("a", string())]),
            object([("b", number())]),
        ]);
        let input = json!({ "a": "x", "b": 2 });
        let sync_out = schema.validate(Dataset::new(input.clone()), &Config::default());
        let async_out = schema
            .validate_async(Dataset::new(input), &Config::default())
            .await;
        assert_eq!(sync_out.value, async_out.value);
        assert_eq!(sync_out.typed, async_out.typed);
    }
}
