//! Remote delegation: serialize a command, send it through a transport,
//! rebuild the result byte for byte.
//!
//! The wire protocol is the client-data JSON plus named binary parts; the
//! HTTP/HMAC envelope around it lives outside this crate, behind
//! [`CommandTransport`]. Tests use an in-process transport wired straight
//! into the server handler.

use std::collections::BTreeMap;
use std::io::Write;

use serde_json::Value;

use crate::command::{BoxedCommand, BoxedResult, OutputSink};
use crate::error::{BoxError, EnvironmentError, RemoteError, ValidationError};

use super::BoxedExecutor;

/// One serialized command on its way out.
#[derive(Debug)]
pub struct RemoteRequest {
    pub route: String,
    /// Client data: the JSON description of the command.
    pub data: Value,
    /// Named binary parts: stdin and in-memory input files.
    pub parts: Vec<(String, Vec<u8>)>,
}

/// What came back. Either the command ran (possibly exiting nonzero) or
/// the far side rejected it on validation.
#[derive(Debug)]
pub struct RemoteResponse {
    pub exit_code: Option<i32>,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
    /// Received files by name. `None` contents means the far side routed
    /// the bytes itself (URL sinks).
    pub files: BTreeMap<String, Option<Vec<u8>>>,
    /// Validation rejection message, without the error prefix.
    pub validation_error: Option<String>,
}

impl RemoteResponse {
    pub fn rejected(message: String) -> Self {
        RemoteResponse {
            exit_code: None,
            stdout: None,
            stderr: None,
            files: BTreeMap::new(),
            validation_error: Some(message),
        }
    }

    pub fn from_result(result: &BoxedResult) -> Self {
        let files = result
            .file_names()
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    result.file_contents(name).map(<[u8]>::to_vec),
                )
            })
            .collect();
        RemoteResponse {
            exit_code: result.exit_code(),
            stdout: result.stdout().map(<[u8]>::to_vec),
            stderr: result.stderr().map(<[u8]>::to_vec),
            files,
            validation_error: None,
        }
    }
}

/// Carries a request to wherever execution happens. Implementations own
/// timeouts and authentication; failures there are [`RemoteError`]s,
/// never validation errors.
pub trait CommandTransport {
    fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}

/// Delegates execution through a transport and routes received files
/// into the command's local sinks.
pub struct RemoteBoxedExecutor<T: CommandTransport> {
    transport: T,
}

impl<T: CommandTransport> RemoteBoxedExecutor<T> {
    pub fn new(transport: T) -> Self {
        RemoteBoxedExecutor { transport }
    }
}

impl<T: CommandTransport> BoxedExecutor for RemoteBoxedExecutor<T> {
    fn execute(&self, mut command: BoxedCommand) -> Result<BoxedResult, BoxError> {
        let (data, parts) = command.to_client_data()?;
        let route = command.route().unwrap_or("").to_string();
        let response = self.transport.send(RemoteRequest { route, data, parts })?;

        if let Some(message) = response.validation_error {
            return Err(ValidationError(message).into());
        }

        let mut result = BoxedResult::new();
        if let Some(code) = response.exit_code {
            result.set_exit_code(code);
        }
        if let Some(stdout) = response.stdout {
            result.set_stdout(stdout);
        }
        if let Some(stderr) = response.stderr {
            result.set_stderr(stderr);
        }

        let mut sinks = std::mem::take(command.output_files());
        for (name, contents) in response.files {
            let delivered = match sinks.remove(&name).map(|f| f.sink) {
                Some(OutputSink::File(dest)) => {
                    let bytes = contents.as_deref().unwrap_or_default();
                    write_file(&name, &dest, bytes)?;
                    None
                }
                Some(OutputSink::Stream(mut stream)) => {
                    let bytes = contents.as_deref().unwrap_or_default();
                    stream
                        .write_all(bytes)
                        .and_then(|()| stream.flush())
                        .map_err(|source| EnvironmentError::Harvest {
                            name: name.clone(),
                            source,
                        })?;
                    None
                }
                // URL sinks were uploaded on the far side; captures and
                // glob matches keep their bytes.
                Some(OutputSink::Url { .. }) => None,
                Some(OutputSink::Capture) | None => contents,
            };
            result.add_file(&name, delivered);
        }
        Ok(result)
    }
}

fn write_file(name: &str, dest: &std::path::Path, bytes: &[u8]) -> Result<(), EnvironmentError> {
    let harvest = |source| EnvironmentError::Harvest {
        name: name.to_string(),
        source,
    };
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(harvest)?;
    }
    std::fs::write(dest, bytes).map_err(harvest)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedTransport(fn(RemoteRequest) -> Result<RemoteResponse, RemoteError>);

    impl CommandTransport for CannedTransport {
        fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            (self.0)(request)
        }
    }

    #[test]
    fn validation_rejection_surfaces_as_validation_error() {
        let executor = RemoteBoxedExecutor::new(CannedTransport(|_| {
            Ok(RemoteResponse::rejected(
                "The route \"x\" is not in the list of allowed routes".to_string(),
            ))
        }));
        let command = BoxedCommand::new().route_name("x").params(["a"]);
        match executor.execute(command) {
            Err(BoxError::Validation(e)) => {
                assert!(e.to_string().contains("not in the list of allowed routes"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn transport_failure_surfaces_as_remote_error() {
        let executor = RemoteBoxedExecutor::new(CannedTransport(|_| {
            Err(RemoteError::Timeout(5000))
        }));
        let command = BoxedCommand::new().route_name("x").params(["a"]);
        match executor.execute(command) {
            Err(BoxError::Remote(RemoteError::Timeout(5000))) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn response_bytes_are_rebuilt_exactly() {
        let executor = RemoteBoxedExecutor::new(CannedTransport(|_| {
            let mut files = BTreeMap::new();
            files.insert("out.bin".to_string(), Some(vec![0u8, 255, 10]));
            Ok(RemoteResponse {
                exit_code: Some(3),
                stdout: Some(vec![1, 2, 3]),
                stderr: Some(b"warn".to_vec()),
                files,
                validation_error: None,
            })
        }));
        let command = BoxedCommand::new()
            .route_name("x")
            .params(["a"])
            .output_file_to_string("out.bin");
        let result = executor.execute(command).unwrap();
        assert_eq!(result.exit_code(), Some(3));
        assert_eq!(result.stdout(), Some([1u8, 2, 3].as_slice()));
        assert_eq!(result.stderr(), Some(b"warn".as_slice()));
        assert_eq!(result.file_contents("out.bin"), Some([0u8, 255, 10].as_slice()));
    }
}
