//! Runtime JSON validation with structured, path-addressed issues.
//!
//! Schemas are plain Rust values built from the constructors in [`schema`]
//! (or loaded from JSON descriptors via [`descriptor`]); validating never
//! panics for representable inputs and never throws on the first failure —
//! every problem comes back as an [`Issue`] with a root-to-leaf path.
//!
//! ```
//! use json_vet::{object, string, number, optional, parse, Config};
//! use serde_json::json;
//!
//! let schema = object([("name", string()), ("age", optional(number()))]);
//! let value = parse(&schema, json!({ "name": "ada" }), &Config::default()).unwrap();
//! assert_eq!(value, json!({ "name": "ada" }));
//! ```

pub mod cli;
pub mod dataset;
pub mod descriptor;
pub mod parse;
pub mod schema;

pub use dataset::{Config, Dataset, Issue, IssueKind, PathItem, PathKey, PathKind, PathOrigin};
pub use parse::{ParseOutput, ValiError, parse, parse_async, safe_parse, safe_parse_async};
pub use schema::{
    Action, Schema, any, array, boolean, custom, custom_async, intersect, literal, null_, nullable,
    nullable_default, number, object, object_with_rest, optional, optional_default, pipe, record,
    string, variant,
};
