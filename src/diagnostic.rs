//! Non-fatal diagnostics
//!
//! Best-effort operations (source discovery, dependency resolution, git
//! worktree acquisition) always produce a value. Anything that went wrong
//! along the way is carried next to it as a list of [`Diagnostic`]s, which
//! the caller logs and moves on from.

use std::fmt;
use tracing::{error, warn};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// A single non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Emit this diagnostic through `tracing` at its severity
    pub fn emit(&self) {
        match self.severity {
            Severity::Warning => warn!("{}", self.message),
            Severity::Error => error!("{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// A value together with the diagnostics collected while producing it
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Resolved<T> {
    /// A value with no diagnostics
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// Log every diagnostic and return the value
    pub fn emit(self) -> T {
        for diagnostic in &self.diagnostics {
            diagnostic.emit();
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::warning("dependency not found: lib");
        assert_eq!(d.to_string(), "warning: dependency not found: lib");
        assert_eq!(Diagnostic::error("clone failed").to_string(), "error: clone failed");
    }

    #[test]
    fn emit_returns_value() {
        let resolved = Resolved::with_diagnostics(2, vec![Diagnostic::warning("cycle")]);
        assert_eq!(resolved.emit(), 2);
        assert!(Resolved::clean("x").diagnostics.is_empty());
    }
}
