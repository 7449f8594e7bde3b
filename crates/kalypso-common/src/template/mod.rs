//! Manifest template engine
//!
//! Cluster types reference named Template resources whose manifests are
//! expanded once per assignment. The engine is minijinja with the default
//! `{{ ... }}` delimiters, strict undefined handling, and a filter set
//! covering the helpers templates rely on (`toYaml`, `stringify`, `hash`,
//! `unquote` plus the usual string/encoding family).
//!
//! A template's output may itself contain `{{ ... }}` (a common pattern is
//! emitting a block from config data that is itself a template); expansion
//! re-runs on the same data bundle until a fixpoint, bounded by
//! [`TEMPLATE_RECURSION_LIMIT`].

mod engine;
mod error;
mod filters;

pub use engine::{TemplateEngine, TEMPLATE_RECURSION_LIMIT};
pub use error::TemplateError;
