// error.rs — Fatal error taxonomy
//
// Every stage fails fast: the first fatal condition aborts the run and no
// output is written. Each error maps to a stable code so the driver can
// print it in the same shape as advisory diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::diag::{codes, DiagCode};

/// The serialized text could not be turned into a graph.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: missing required field `{field}`")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: unknown object class `{class}`")]
    UnknownClass { line: usize, class: String },

    #[error("line {line}: unknown pin category `{category}`")]
    UnknownPinCategory { line: usize, category: String },

    #[error("line {line}: property record outside of any object")]
    OrphanRecord { line: usize },

    #[error("node `{node}`: pin `{pin}` refers to pin `{missing}` which is not on the node")]
    MissingRelatedPin {
        node: String,
        pin: String,
        missing: String,
    },

    #[error("line {line}: duplicate node name `{name}`")]
    DuplicateNode { line: usize, name: String },
}

/// The graph is well-formed text but violates a structural rule.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("control input `{pin}` on `{node}` has {count} incoming connections")]
    ExecFanIn {
        node: String,
        pin: String,
        count: usize,
    },

    #[error("node `{node}` is missing required pin `{pin}`")]
    MissingPin { node: String, pin: String },

    #[error("reroute node `{node}` has no connection to follow")]
    UnresolvedReroute { node: String },

    #[error("reroute node `{node}` is part of a reroute cycle")]
    RerouteCycle { node: String },

    #[error("`{from}` links to unknown node `{target}`")]
    UnknownNode { from: String, target: String },

    #[error("`{from}` links to unknown pin `{pin}` on `{target}`")]
    UnknownPin {
        from: String,
        target: String,
        pin: String,
    },

    #[error("value of `{node}`.`{pin}` is not available here")]
    UnboundPin { node: String, pin: String },

    #[error("`{node}`.`{pin}` is already bound to a variable")]
    DuplicateBinding { node: String, pin: String },

    #[error("no entry node found")]
    NoEntry,
}

/// A recognized node was used in a way the compiler cannot express.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("cannot derive an operator from `{member}` on `{node}`")]
    UnknownOperator { node: String, member: String },

    #[error("{stage} cannot handle `{node}` of kind {kind}")]
    UnhandledKind {
        node: String,
        kind: String,
        stage: &'static str,
    },

    #[error("no constructor syntax configured for split struct `{ty}` on `{node}`.`{pin}`")]
    MissingStructCtor { ty: String, node: String, pin: String },

    #[error("break of loop `{node}` reached before the loop started")]
    BreakBeforeLoop { node: String },
}

/// Any fatal compiler error.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl CompileError {
    /// Stable code for this error.
    pub fn code(&self) -> DiagCode {
        match self {
            CompileError::Parse(e) => match e {
                ParseError::MissingField { .. } => codes::E0101,
                ParseError::UnknownClass { .. } => codes::E0102,
                ParseError::UnknownPinCategory { .. } => codes::E0103,
                ParseError::OrphanRecord { .. } => codes::E0104,
                ParseError::MissingRelatedPin { .. } => codes::E0105,
                ParseError::DuplicateNode { .. } => codes::E0106,
            },
            CompileError::Structural(e) => match e {
                StructuralError::ExecFanIn { .. } => codes::E0201,
                StructuralError::MissingPin { .. } => codes::E0202,
                StructuralError::UnresolvedReroute { .. } => codes::E0203,
                StructuralError::RerouteCycle { .. } => codes::E0204,
                StructuralError::UnknownNode { .. } | StructuralError::UnknownPin { .. } => {
                    codes::E0205
                }
                StructuralError::UnboundPin { .. } => codes::E0206,
                StructuralError::DuplicateBinding { .. } => codes::E0207,
                StructuralError::NoEntry => codes::E0208,
            },
            CompileError::Semantic(e) => match e {
                SemanticError::UnknownOperator { .. } => codes::E0301,
                SemanticError::UnhandledKind { .. } => codes::E0302,
                SemanticError::MissingStructCtor { .. } => codes::E0303,
                SemanticError::BreakBeforeLoop { .. } => codes::E0304,
            },
        }
    }
}

/// Loading or compiling the lookup tables failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("call template `{name}`: {message}")]
    Template { name: String, message: String },

    #[error("rewrite pattern `{pattern}`: {source}")]
    Regex {
        pattern: String,
        source: regex::Error,
    },
}

/// The persisted name counter could not be read or written.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: expected `currentVarInc=<N>`, found `{content}`", path.display())]
    Malformed { path: PathBuf, content: String },
}
