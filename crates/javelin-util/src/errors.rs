use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for Javelin operations outside the evaluator.
///
/// The key/scope evaluator has its own error enum (`EvalError` in
/// `javelin-eval`) because callers need to distinguish "no binding" from
/// real failures; everything else funnels through here.
#[derive(Debug, Error, Diagnostic)]
pub enum JavelinError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed build manifest (Javelin.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your Javelin.toml for syntax errors"))]
    Manifest { message: String },

    /// Dependency resolution finished with one or more failed nodes.
    #[error("Dependency resolution failed:\n{message}")]
    Resolution { message: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// A downloaded artifact did not match its published checksum.
    #[error("Checksum mismatch: {message}")]
    Checksum { message: String },

    /// Assembling the output archive failed (path conflicts, bad inputs).
    #[error("Assembly failed: {message}")]
    Assembly { message: String },

    /// A query string could not be parsed.
    #[error("Invalid query: {message}")]
    Query { message: String },

    /// Project aggregates form a cycle; resolution cannot start.
    #[error("Cyclic project dependency: {cycle}")]
    CyclicProject { cycle: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type JavelinResult<T> = miette::Result<T>;
