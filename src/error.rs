use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while lowering async functions
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Error {
    #[error("I/O error: {0}")]
    #[diagnostic(code(async_to_promises::io_error))]
    Io(String),

    #[error("Parse error: {message}")]
    #[diagnostic(code(async_to_promises::parse_error))]
    Parse { message: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(
        code(async_to_promises::config_error),
        help("options are read as JSON with camelCase keys, e.g. {{\"externalHelpers\": true}}")
    )]
    Config { message: String },

    #[error("Calling eval from inside an async function is not supported ({line}:{column})")]
    #[diagnostic(
        code(async_to_promises::eval_in_async),
        help("move the eval call into a synchronous helper function")
    )]
    EvalInAsync {
        line: usize,
        column: usize,
        #[label("eval called here")]
        span: SourceSpan,
    },

    #[error("Unsupported suspension point in {construct} ({line}:{column})")]
    #[diagnostic(code(async_to_promises::unsupported))]
    Unsupported {
        construct: String,
        line: usize,
        column: usize,
        #[label("await or yield inside {construct}")]
        span: SourceSpan,
    },

    #[error("Unknown helper '{name}'")]
    #[diagnostic(
        code(async_to_promises::unknown_helper),
        help("run `async-to-promises helpers --names` to list the available helpers")
    )]
    UnknownHelper { name: String },

    #[error("Internal invariant violated: {message}")]
    #[diagnostic(
        code(async_to_promises::invariant),
        help("this is a bug in the transform, not in the input program")
    )]
    Invariant { message: String },

    #[error("Code generation failed: {message}")]
    #[diagnostic(code(async_to_promises::codegen_error))]
    Codegen { message: String },
}

impl Error {
    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::Invariant {
            message: message.into(),
        }
    }

    /// Reject an `eval` call found at `offset` in `source`
    pub fn eval_in_async(source: &str, offset: u32, length: u32) -> Self {
        let (line, column) = line_column(source, offset);
        Error::EvalInAsync {
            line,
            column,
            span: (offset as usize, length as usize).into(),
        }
    }

    /// Reject a suspension point inside a construct the rewriter does not model
    pub fn unsupported(construct: impl Into<String>, source: &str, offset: u32, length: u32) -> Self {
        let (line, column) = line_column(source, offset);
        Error::Unsupported {
            construct: construct.into(),
            line,
            column,
            span: (offset as usize, length as usize).into(),
        }
    }

    /// True for errors caused by the input program rather than the transform itself
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. }
                | Error::EvalInAsync { .. }
                | Error::Unsupported { .. }
                | Error::UnknownHelper { .. }
        )
    }
}

/// 1-based line and column of a byte offset
pub fn line_column(source: &str, offset: u32) -> (usize, usize) {
    let offset = (offset as usize).min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_first_line() {
        assert_eq!(line_column("let a = 1;", 4), (1, 5));
    }

    #[test]
    fn test_line_column_after_newlines() {
        let source = "a;\nbb;\n  eval(x);";
        let offset = source.find("eval").unwrap() as u32;
        assert_eq!(line_column(source, offset), (3, 3));
    }

    #[test]
    fn test_eval_error_reports_location() {
        let source = "async function f() {\n  eval('1');\n}";
        let offset = source.find("eval").unwrap() as u32;
        let err = Error::eval_in_async(source, offset, 9);
        assert!(err.is_user_error());
        assert!(err.to_string().contains("(2:3)"));
    }
}
