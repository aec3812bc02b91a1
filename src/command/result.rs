//! The outcome of a boxed execution.

use std::collections::BTreeMap;

/// What came back from running a boxed command. A nonzero exit code is
/// data here, never an error; errors are reserved for the environment
/// failing around the command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxedResult {
    exit_code: Option<i32>,
    stdout: Option<Vec<u8>>,
    stderr: Option<Vec<u8>>,
    /// Received output files by scratch-relative name. `None` contents
    /// means the file was received but routed to a sink rather than
    /// captured.
    files: BTreeMap<String, Option<Vec<u8>>>,
}

impl BoxedResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// The exit code of the command, with signal death mapped to
    /// `128 + signo`.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stdout(&self) -> Option<&[u8]> {
        self.stdout.as_deref()
    }

    pub fn stderr(&self) -> Option<&[u8]> {
        self.stderr.as_deref()
    }

    /// Captured contents of a received output file.
    pub fn file_contents(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name)?.as_deref()
    }

    /// Whether a declared output was actually produced and harvested.
    pub fn was_received(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Names of all received files, sorted.
    pub fn file_names(&self) -> Vec<&str> {
        self.files.keys().map(|k| k.as_str()).collect()
    }

    pub fn set_exit_code(&mut self, code: i32) -> &mut Self {
        self.exit_code = Some(code);
        self
    }

    pub fn set_stdout(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.stdout = Some(bytes);
        self
    }

    pub fn set_stderr(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.stderr = Some(bytes);
        self
    }

    /// Record a received file, captured or not.
    pub fn add_file(&mut self, name: &str, contents: Option<Vec<u8>>) -> &mut Self {
        self.files.insert(name.to_string(), contents);
        self
    }
}
