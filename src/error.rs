//! Error taxonomy for the component compiler.
//!
//! Only a missing backend dependency aborts a compile call. Every other
//! failure (unreadable external section, backend rejection, rewrite-stage
//! fault) is recorded on the owning section's result and reported through
//! the logger after the pipeline has run to completion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors raised from the public entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A registered plugin could not resolve its underlying backend.
    /// Not retried; the configuration has to change.
    #[error("{message}")]
    MissingBackend { message: String },
}

impl CompileError {
    pub fn missing_backend(name: &str, targets: &[String]) -> Self {
        CompileError::MissingBackend {
            message: missing_backend_message(name, targets),
        }
    }
}

/// Build the fatal message, naming every install target.
fn missing_backend_message(name: &str, targets: &[String]) -> String {
    let owned;
    let targets = if targets.is_empty() {
        owned = [name.to_string()];
        &owned[..]
    } else {
        targets
    };

    let subject = match targets {
        [single] => format!("{} is", single),
        many => {
            let (last, rest) = many.split_last().expect("non-empty target list");
            format!("{} and {} are", rest.join(", "), last)
        }
    };

    format!(
        "You are trying to use \"{}\". {} missing.\n\nTo install run:\nnpm install --save-dev {}",
        name,
        subject,
        targets.join(" ")
    )
}

/// Non-fatal failure a backend reports for one section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDiagnostic {
    pub message: String,
    /// Pretty framed source excerpt, when the backend produces one.
    pub code_frame: Option<String>,
}

impl BackendDiagnostic {
    /// The string recorded on the section result; the framed excerpt wins.
    pub fn report(self) -> String {
        self.code_frame.unwrap_or(self.message)
    }
}

/// What a section plugin may fail with.
#[derive(Debug)]
pub enum PluginFailure {
    /// The underlying backend is not installed. Fatal, never retried.
    MissingBackend { name: String, targets: Vec<String> },
    /// The backend rejected the input. Recorded, compilation continues.
    Diagnostic(BackendDiagnostic),
}

impl From<String> for PluginFailure {
    fn from(message: String) -> Self {
        PluginFailure::Diagnostic(BackendDiagnostic {
            message,
            code_frame: None,
        })
    }
}
