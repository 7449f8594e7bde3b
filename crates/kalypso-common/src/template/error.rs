//! Template error types

use thiserror::Error;

/// Errors raised while expanding manifest templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template failed to parse or render
    #[error("template error: {message}")]
    Render {
        /// Underlying engine error, including line information
        message: String,
    },

    /// Nested expansion did not reach a fixpoint within the bound
    #[error("template recursion limit of {limit} exceeded without reaching a fixpoint")]
    RecursionLimit {
        /// The configured expansion bound
        limit: usize,
    },
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        // walk the source chain so "undefined value" causes are not lost
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        TemplateError::Render { message }
    }
}
