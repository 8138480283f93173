//! Error types with fix suggestions

use std::collections::BTreeSet;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum ParamError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Registration errors (PARAM-010 to PARAM-011)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-010: Owner '{owner}' has no single-argument setter named '{setter}'")]
    BindingNotFound { owner: String, setter: String },

    #[error("PARAM-011: Invalid parameter name '{name}': {reason}")]
    InvalidParameterName { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Apply-time errors (PARAM-020 to PARAM-022)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-020: Cannot apply '{name}': setter argument kind '{kind}' is not supported (allowed: float, int, bool, string)")]
    UnsupportedValueKind { name: String, kind: String },

    #[error("PARAM-021: Cannot parse '{value}' as {kind} for parameter '{name}'")]
    Coercion {
        name: String,
        value: String,
        kind: String,
    },

    #[error("PARAM-022: Parameter '{name}' was requested but has no submitted value")]
    MissingValue { name: String },

    // ─────────────────────────────────────────────────────────────
    // Resolution errors (PARAM-030)
    // ─────────────────────────────────────────────────────────────

    #[error(
        "PARAM-030: Parameters {} unhandled! Known parameters: [{}]",
        join(.names),
        .handled.join(", ")
    )]
    UnresolvedParameters {
        names: BTreeSet<String>,
        handled: Vec<String>,
    },

    // ─────────────────────────────────────────────────────────────
    // Tree errors (PARAM-040 to PARAM-041)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-040: Unknown dispatcher node #{index}")]
    UnknownNode { index: usize },

    #[error("PARAM-041: Attaching '{child}' under '{parent}' would create a cycle")]
    CycleDetected { parent: String, child: String },

    // ─────────────────────────────────────────────────────────────
    // Input errors (PARAM-050 to PARAM-060)
    // ─────────────────────────────────────────────────────────────

    #[error("PARAM-050: Invalid properties line {line}: {details}")]
    InvalidProperties { line: usize, details: String },

    #[error("PARAM-051: Invalid assignment '{arg}' (expected key=value)")]
    InvalidAssignment { arg: String },

    #[error("PARAM-060: Invalid tree description: {details}")]
    Config { details: String },
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl FixSuggestion for ParamError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ParamError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            ParamError::Json(_) => None,
            ParamError::Io(_) => Some("Check file path and permissions"),
            ParamError::BindingNotFound { .. } => {
                Some("Add the setter to the owner's setter table or fix the setter name")
            }
            ParamError::InvalidParameterName { .. } => Some("Use a non-empty parameter name"),
            ParamError::UnsupportedValueKind { .. } => {
                Some("Declare the binding as float, int, bool or string")
            }
            ParamError::Coercion { .. } => {
                Some("Pass a decimal number for float and a base-10 integer for int")
            }
            ParamError::MissingValue { .. } => {
                Some("Only request names that are present in the submitted values")
            }
            ParamError::UnresolvedParameters { .. } => Some(
                "Bind the parameter on some node, attach the node that binds it, or submit non-strict",
            ),
            ParamError::UnknownNode { .. } => {
                Some("Use node ids returned by the same DispatcherTree")
            }
            ParamError::CycleDetected { .. } => {
                Some("Dispatcher links must form a DAG; remove the back link")
            }
            ParamError::InvalidProperties { .. } => {
                Some("Use one 'key=value' or 'key: value' pair per line")
            }
            ParamError::InvalidAssignment { .. } => Some("Write assignments as --set key=value"),
            ParamError::Config { .. } => {
                Some("Check node ids, link endpoints and the root node in the tree file")
            }
        }
    }
}
