// diag.rs — Advisory diagnostics shared by all compiler passes
//
// Fatal conditions travel as `CompileError` values; everything a pass wants
// to report without aborting is collected here and handed to the driver.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0201`, `W0201`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of every code the compiler can emit.
pub mod codes {
    use super::DiagCode;

    // Parse (E01xx)
    pub const E0101: DiagCode = DiagCode("E0101"); // missing required field
    pub const E0102: DiagCode = DiagCode("E0102"); // unknown object class
    pub const E0103: DiagCode = DiagCode("E0103"); // unknown pin category
    pub const E0104: DiagCode = DiagCode("E0104"); // property record outside an object
    pub const E0105: DiagCode = DiagCode("E0105"); // sub-pin or parent pin not found
    pub const E0106: DiagCode = DiagCode("E0106"); // duplicate node name

    // Structural (E02xx)
    pub const E0201: DiagCode = DiagCode("E0201"); // control fan-in
    pub const E0202: DiagCode = DiagCode("E0202"); // missing required pin
    pub const E0203: DiagCode = DiagCode("E0203"); // unresolved reroute
    pub const E0204: DiagCode = DiagCode("E0204"); // reroute cycle
    pub const E0205: DiagCode = DiagCode("E0205"); // link to unknown node or pin
    pub const E0206: DiagCode = DiagCode("E0206"); // unbound pin lookup
    pub const E0207: DiagCode = DiagCode("E0207"); // duplicate binding
    pub const E0208: DiagCode = DiagCode("E0208"); // no entry node

    // Semantic (E03xx)
    pub const E0301: DiagCode = DiagCode("E0301"); // unknown operator
    pub const E0302: DiagCode = DiagCode("E0302"); // unhandled node kind
    pub const E0303: DiagCode = DiagCode("E0303"); // missing struct constructor
    pub const E0304: DiagCode = DiagCode("E0304"); // loop break before loop

    // Warnings
    pub const W0201: DiagCode = DiagCode("W0201"); // pure node with several consumers
    pub const W0202: DiagCode = DiagCode("W0202"); // several entry candidates
    pub const W0203: DiagCode = DiagCode("W0203"); // entry control output leads nowhere
    pub const W0204: DiagCode = DiagCode("W0204"); // engine-internal K2 name in output
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any pass.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub message: String,
    pub hint: Option<String>,
    /// Node the diagnostic is about, when there is one.
    pub node: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint or node.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            message: message.into(),
            hint: None,
            node: None,
        }
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
