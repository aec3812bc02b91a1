//! Error taxonomy.
//!
//! Parse failures, policy rejections, environment failures and remote
//! protocol failures are distinct types so that callers can branch on them.
//! A nonzero exit code is not an error anywhere in this crate; it is data
//! carried by [`BoxedResult`](crate::command::BoxedResult).

use thiserror::Error;

/// A shell syntax error with the character offset where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SyntaxError at offset {offset}: {message}")]
pub struct SyntaxError {
    /// Character offset into the source string.
    pub offset: usize,
    /// What the parser expected at that point.
    pub message: String,
}

/// A construct the grammar recognizes but does not model.
///
/// Raised for here-document redirection (`<<`, `<<-`). Callers must treat
/// this as "cannot safely reason about this command", not as a plain
/// syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("UnimplementedError: {message}")]
pub struct UnimplementedError {
    pub message: String,
}

/// Either kind of parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Unimplemented(#[from] UnimplementedError),
}

/// A policy rejection from the validator.
///
/// The message is stable and surfaced verbatim; tests assert exact text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cmdbox command validation error: {0}")]
pub struct ValidationError(pub String);

/// A policy file could not be read or parsed.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file \"{path}\": {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The execution environment failed before or outside the child process:
/// staging, spawn, harvest I/O. Distinct from a command that ran and
/// exited nonzero.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to stage input file \"{name}\": {source}")]
    Staging {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to harvest output file \"{name}\": {source}")]
    Harvest {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scratch directory error: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("file name \"{0}\" is not a safe relative path")]
    UnsafeName(String),
    #[error("{0}")]
    Other(String),
}

/// A failure in the remote-delegation path, distinguishable from an
/// application-level rejection on the far side.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("malformed response: {0}")]
    Protocol(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
}

/// Umbrella error for `execute()` entry points.
#[derive(Debug, Error)]
pub enum BoxError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_kinds_are_distinguishable() {
        let s: ParseError = SyntaxError {
            offset: 3,
            message: "expected word".into(),
        }
        .into();
        let u: ParseError = UnimplementedError {
            message: "here-document".into(),
        }
        .into();
        assert!(matches!(s, ParseError::Syntax(_)));
        assert!(matches!(u, ParseError::Unimplemented(_)));
    }

    #[test]
    fn validation_error_has_stable_prefix() {
        let e = ValidationError("unexpected option cpuLimit".into());
        assert_eq!(
            e.to_string(),
            "cmdbox command validation error: unexpected option cpuLimit"
        );
    }

    #[test]
    fn syntax_error_reports_offset() {
        let e = SyntaxError {
            offset: 7,
            message: "expected \")\"".into(),
        };
        assert_eq!(e.to_string(), "SyntaxError at offset 7: expected \")\"");
    }
}
