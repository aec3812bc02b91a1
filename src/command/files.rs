//! Input sources and output sinks for boxed files.
//!
//! Inputs are placed into the scratch directory before the command runs;
//! outputs are harvested from it afterward. Names are always paths
//! relative to the scratch directory.

use std::io::{Read, Write};
use std::path::PathBuf;

/// Where an input file's bytes come from.
pub enum InputSource {
    /// Bytes held in memory.
    Literal(Vec<u8>),
    /// A file on the local filesystem.
    File(PathBuf),
    /// A byte stream, drained once at staging time.
    Stream(Box<dyn Read + Send>),
    /// Downloaded via the configured [`UrlClient`](crate::exec::UrlClient).
    Url(String),
}

pub struct InputFile {
    pub(crate) source: InputSource,
}

impl InputFile {
    pub(crate) fn new(source: InputSource) -> Self {
        InputFile { source }
    }
}

/// Where a harvested output file's bytes go.
pub enum OutputSink {
    /// Captured in memory and readable from the result.
    Capture,
    /// Written to a file on the local filesystem.
    File(PathBuf),
    /// Copied into a byte stream.
    Stream(Box<dyn Write + Send>),
    /// Uploaded via the configured [`UrlClient`](crate::exec::UrlClient).
    Url {
        url: String,
        headers: Vec<(String, String)>,
        send_content_hash: bool,
    },
}

pub struct OutputFile {
    pub(crate) sink: OutputSink,
    /// Harvest only when the command exited with this code.
    pub(crate) require_exit_code: Option<i32>,
}

impl OutputFile {
    pub(crate) fn new(sink: OutputSink) -> Self {
        OutputFile {
            sink,
            require_exit_code: None,
        }
    }
}

/// Where files matched by an output glob go.
pub enum GlobSink {
    /// Each match captured in memory under its relative path.
    Capture,
    /// Each match written under a local directory.
    Directory(PathBuf),
    /// Each match uploaded to `base_url` + `/` + its base name.
    Url(String),
}

/// A `prefix*.extension` pattern harvested after execution. The prefix
/// may contain directory separators; matches are named by their path
/// relative to the scratch directory.
pub struct OutputGlob {
    pub(crate) prefix: String,
    pub(crate) extension: String,
    pub(crate) sink: GlobSink,
    pub(crate) require_exit_code: Option<i32>,
}

impl OutputGlob {
    pub(crate) fn new(prefix: &str, extension: &str, sink: GlobSink) -> Self {
        OutputGlob {
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            sink,
            require_exit_code: None,
        }
    }

    /// The key a glob is registered and validated under.
    pub fn key(&self) -> String {
        format!("{}*.{}", self.prefix, self.extension)
    }

    /// Whether a scratch-relative path matches this glob.
    pub fn matches(&self, relative_path: &str) -> bool {
        // The prefix binds the directory part: only files directly in the
        // prefix's directory are eligible.
        let (dir, base_prefix) = match self.prefix.rfind('/') {
            Some(i) => (&self.prefix[..=i], &self.prefix[i + 1..]),
            None => ("", self.prefix.as_str()),
        };
        let rest = match relative_path.strip_prefix(dir) {
            Some(rest) => rest,
            None => return false,
        };
        if rest.contains('/') {
            return false;
        }
        rest.starts_with(base_prefix) && rest.ends_with(&format!(".{}", self.extension))
    }
}
