//! The boxed command: what to run, under which route, with which files
//! and limits.
//!
//! Built fluently, validated against a route spec, then consumed by an
//! executor. The command line is assembled from escaped fragments; the
//! escape hatches (`unsafe_params`, `unsafe_command`) take the caller's
//! text verbatim and shift responsibility for quoting to them.

mod files;
mod result;

pub use files::{GlobSink, InputFile, InputSource, OutputFile, OutputGlob, OutputSink};
pub use result::BoxedResult;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;

use serde_json::{Map, Value, json};

use crate::error::{EnvironmentError, RemoteError};
use crate::escape::escape_one;

#[derive(Default)]
pub struct BoxedCommand {
    route_name: Option<String>,
    /// Command-line fragments, joined with single spaces.
    params: Vec<String>,
    stdin: Vec<u8>,
    environment: BTreeMap<String, String>,
    input_files: BTreeMap<String, InputFile>,
    output_files: BTreeMap<String, OutputFile>,
    output_globs: BTreeMap<String, OutputGlob>,
    cpu_limit: Option<u64>,
    wall_time_limit: Option<u64>,
    memory_limit: Option<u64>,
    file_size_limit: Option<u64>,
    include_stderr: Option<bool>,
    log_stderr: Option<bool>,
    /// Name of the most recently declared output file, for the
    /// header/hash modifiers.
    last_output: Option<String>,
}

impl BoxedCommand {
    pub fn new() -> Self {
        Self::default()
    }

    // ── identity ──

    pub fn route_name(mut self, name: &str) -> Self {
        self.route_name = Some(name.to_string());
        self
    }

    pub fn route(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    // ── command line ──

    /// Append arguments, each escaped as a single shell word.
    pub fn params<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.params.push(escape_one(arg.as_ref()));
        }
        self
    }

    /// Append raw fragments with no escaping.
    pub fn unsafe_params<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.params.push(arg.as_ref().to_string());
        }
        self
    }

    /// Discard previous fragments and start over with escaped arguments.
    pub fn replace_params<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.params.clear();
        self.params(args)
    }

    /// Discard previous fragments and use a raw command line.
    pub fn unsafe_command(mut self, command: &str) -> Self {
        self.params.clear();
        self.params.push(command.to_string());
        self
    }

    /// The assembled command line.
    pub fn command_string(&self) -> String {
        self.params.join(" ")
    }

    // ── stdin / environment ──

    pub fn stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = bytes.into();
        self
    }

    pub fn stdin_bytes(&self) -> &[u8] {
        &self.stdin
    }

    /// Merge environment overrides over the ambient environment.
    pub fn environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.environment.insert(k.into(), v.into());
        }
        self
    }

    pub fn environment_overrides(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    // ── input files ──

    pub fn input_file_from_string(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.input_files.insert(
            name.to_string(),
            InputFile::new(InputSource::Literal(contents.into())),
        );
        self
    }

    pub fn input_file_from_file(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.input_files.insert(
            name.to_string(),
            InputFile::new(InputSource::File(path.into())),
        );
        self
    }

    pub fn input_file_from_stream(mut self, name: &str, stream: Box<dyn Read + Send>) -> Self {
        self.input_files.insert(
            name.to_string(),
            InputFile::new(InputSource::Stream(stream)),
        );
        self
    }

    pub fn input_file_from_url(mut self, name: &str, url: &str) -> Self {
        self.input_files.insert(
            name.to_string(),
            InputFile::new(InputSource::Url(url.to_string())),
        );
        self
    }

    // ── output files ──

    /// Capture an output file's contents in the result.
    pub fn output_file_to_string(mut self, name: &str) -> Self {
        self.output_files
            .insert(name.to_string(), OutputFile::new(OutputSink::Capture));
        self.last_output = Some(name.to_string());
        self
    }

    pub fn output_file_to_file(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.output_files
            .insert(name.to_string(), OutputFile::new(OutputSink::File(path.into())));
        self.last_output = Some(name.to_string());
        self
    }

    pub fn output_file_to_stream(mut self, name: &str, stream: Box<dyn Write + Send>) -> Self {
        self.output_files
            .insert(name.to_string(), OutputFile::new(OutputSink::Stream(stream)));
        self.last_output = Some(name.to_string());
        self
    }

    pub fn output_file_to_url(mut self, name: &str, url: &str) -> Self {
        self.output_files.insert(
            name.to_string(),
            OutputFile::new(OutputSink::Url {
                url: url.to_string(),
                headers: Vec::new(),
                send_content_hash: false,
            }),
        );
        self.last_output = Some(name.to_string());
        self
    }

    /// Add a header to the most recently declared URL output sink.
    pub fn output_header(mut self, name: &str, value: &str) -> Self {
        if let Some(file) = self
            .last_output
            .as_ref()
            .and_then(|n| self.output_files.get_mut(n))
        {
            if let OutputSink::Url { headers, .. } = &mut file.sink {
                headers.push((name.to_string(), value.to_string()));
            }
        }
        self
    }

    /// Send an integrity hash alongside the most recently declared URL
    /// output sink.
    pub fn output_content_hash(mut self) -> Self {
        if let Some(file) = self
            .last_output
            .as_ref()
            .and_then(|n| self.output_files.get_mut(n))
        {
            if let OutputSink::Url {
                send_content_hash, ..
            } = &mut file.sink
            {
                *send_content_hash = true;
            }
        }
        self
    }

    /// Harvest the named output only when the command exits with `code`.
    pub fn require_exit_code(mut self, name: &str, code: i32) -> Self {
        if let Some(file) = self.output_files.get_mut(name) {
            file.require_exit_code = Some(code);
        }
        if let Some(glob) = self.output_globs.get_mut(name) {
            glob.require_exit_code = Some(code);
        }
        self
    }

    // ── output globs ──

    pub fn output_glob_to_string(mut self, prefix: &str, extension: &str) -> Self {
        let glob = OutputGlob::new(prefix, extension, GlobSink::Capture);
        self.output_globs.insert(glob.key(), glob);
        self
    }

    pub fn output_glob_to_file(mut self, prefix: &str, extension: &str, dir: impl Into<PathBuf>) -> Self {
        let glob = OutputGlob::new(prefix, extension, GlobSink::Directory(dir.into()));
        self.output_globs.insert(glob.key(), glob);
        self
    }

    pub fn output_glob_to_url(mut self, prefix: &str, extension: &str, base_url: &str) -> Self {
        let glob = OutputGlob::new(prefix, extension, GlobSink::Url(base_url.to_string()));
        self.output_globs.insert(glob.key(), glob);
        self
    }

    // ── limits and flags ──

    /// CPU time limit in seconds.
    pub fn cpu_time_limit(mut self, seconds: u64) -> Self {
        self.cpu_limit = Some(seconds);
        self
    }

    /// Wall clock limit in seconds.
    pub fn wall_time_limit(mut self, seconds: u64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Memory limit in bytes.
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Output file size limit in bytes.
    pub fn file_size_limit(mut self, bytes: u64) -> Self {
        self.file_size_limit = Some(bytes);
        self
    }

    /// Merge stderr into stdout.
    pub fn include_stderr(mut self, yes: bool) -> Self {
        self.include_stderr = Some(yes);
        self
    }

    /// Log stderr at error level when the command fails.
    pub fn log_stderr(mut self, yes: bool) -> Self {
        self.log_stderr = Some(yes);
        self
    }

    pub fn wants_stderr_included(&self) -> bool {
        self.include_stderr.unwrap_or(false)
    }

    pub fn wants_stderr_logged(&self) -> bool {
        self.log_stderr.unwrap_or(false)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            cpu_seconds: self.cpu_limit,
            wall_seconds: self.wall_time_limit,
            memory_bytes: self.memory_limit,
            file_size_bytes: self.file_size_limit,
        }
    }

    // ── validator views ──

    /// The options that are set on this command, as data. Keys match the
    /// route-spec option vocabulary.
    pub fn options_value(&self) -> Map<String, Value> {
        let mut options = Map::new();
        if let Some(v) = self.cpu_limit {
            options.insert("cpuLimit".into(), json!(v));
        }
        if let Some(v) = self.memory_limit {
            options.insert("memoryLimit".into(), json!(v));
        }
        if let Some(v) = self.wall_time_limit {
            options.insert("wallTimeLimit".into(), json!(v));
        }
        if let Some(v) = self.file_size_limit {
            options.insert("fileSizeLimit".into(), json!(v));
        }
        if let Some(v) = self.include_stderr {
            options.insert("includeStderr".into(), json!(v));
        }
        if let Some(v) = self.log_stderr {
            options.insert("logStderr".into(), json!(v));
        }
        options
    }

    pub fn input_file_names(&self) -> Vec<&str> {
        self.input_files.keys().map(|k| k.as_str()).collect()
    }

    pub fn output_file_names(&self) -> Vec<&str> {
        self.output_files.keys().map(|k| k.as_str()).collect()
    }

    pub fn output_glob_keys(&self) -> Vec<&str> {
        self.output_globs.keys().map(|k| k.as_str()).collect()
    }

    pub(crate) fn input_files(&mut self) -> &mut BTreeMap<String, InputFile> {
        &mut self.input_files
    }

    pub(crate) fn output_files(&mut self) -> &mut BTreeMap<String, OutputFile> {
        &mut self.output_files
    }

    pub(crate) fn output_globs(&self) -> &BTreeMap<String, OutputGlob> {
        &self.output_globs
    }

    // ── client data ──

    /// Serialize for transport: a JSON description plus named binary
    /// parts for stdin and in-memory input files. File and stream inputs
    /// are drained into parts; file and stream output sinks are described
    /// as captures, to be routed locally when the response arrives.
    pub fn to_client_data(&mut self) -> Result<(Value, Vec<(String, Vec<u8>)>), EnvironmentError> {
        let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
        if !self.stdin.is_empty() {
            parts.push(("stdin".to_string(), self.stdin.clone()));
        }

        let mut inputs = Map::new();
        for (name, file) in &mut self.input_files {
            let bytes = match &mut file.source {
                InputSource::Literal(bytes) => Some(bytes.clone()),
                InputSource::File(path) => {
                    Some(std::fs::read(&path).map_err(|source| EnvironmentError::Staging {
                        name: name.clone(),
                        source,
                    })?)
                }
                InputSource::Stream(stream) => {
                    let mut bytes = Vec::new();
                    stream
                        .read_to_end(&mut bytes)
                        .map_err(|source| EnvironmentError::Staging {
                            name: name.clone(),
                            source,
                        })?;
                    Some(bytes)
                }
                InputSource::Url(url) => {
                    inputs.insert(name.clone(), json!({ "type": "url", "url": url }));
                    None
                }
            };
            if let Some(bytes) = bytes {
                inputs.insert(name.clone(), json!({ "type": "part" }));
                // Streams are single-use; keep the drained bytes.
                file.source = InputSource::Literal(bytes.clone());
                parts.push((format!("file:{name}"), bytes));
            }
        }

        let mut outputs = Map::new();
        for (name, file) in &self.output_files {
            let mut desc = match &file.sink {
                OutputSink::Url {
                    url,
                    headers,
                    send_content_hash,
                } => json!({
                    "type": "url",
                    "url": url,
                    "headers": headers
                        .iter()
                        .map(|(k, v)| json!([k, v]))
                        .collect::<Vec<_>>(),
                    "sendContentHash": send_content_hash,
                }),
                _ => json!({ "type": "capture" }),
            };
            if let Some(code) = file.require_exit_code {
                desc["requireExitCode"] = json!(code);
            }
            outputs.insert(name.clone(), desc);
        }

        let mut globs = Map::new();
        for glob in self.output_globs.values() {
            let mut desc = json!({
                "prefix": glob.prefix,
                "extension": glob.extension,
                "type": match glob.sink {
                    GlobSink::Url(ref url) => json!({ "url": url }),
                    _ => json!("capture"),
                },
            });
            if let Some(code) = glob.require_exit_code {
                desc["requireExitCode"] = json!(code);
            }
            globs.insert(glob.key(), desc);
        }

        let mut data = Map::new();
        if let Some(route) = &self.route_name {
            data.insert("routeName".into(), json!(route));
        }
        data.insert("command".into(), json!(self.command_string()));
        if !self.environment.is_empty() {
            data.insert("environment".into(), json!(self.environment));
        }
        if !inputs.is_empty() {
            data.insert("inputFiles".into(), Value::Object(inputs));
        }
        if !outputs.is_empty() {
            data.insert("outputFiles".into(), Value::Object(outputs));
        }
        if !globs.is_empty() {
            data.insert("outputGlobs".into(), Value::Object(globs));
        }
        for (key, value) in self.options_value() {
            data.insert(key, value);
        }
        Ok((Value::Object(data), parts))
    }

    /// Rebuild a command from transported client data.
    pub fn from_client_data(
        data: &Value,
        parts: &[(String, Vec<u8>)],
    ) -> Result<Self, RemoteError> {
        let obj = data
            .as_object()
            .ok_or_else(|| RemoteError::Protocol("client data is not an object".into()))?;
        let part = |name: &str| -> Option<&[u8]> {
            parts
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, bytes)| bytes.as_slice())
        };

        let mut command = BoxedCommand::new();
        if let Some(route) = obj.get("routeName").and_then(Value::as_str) {
            command = command.route_name(route);
        }
        let line = obj
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Protocol("missing command".into()))?;
        // Already escaped on the client side.
        command = command.unsafe_command(line);

        if let Some(bytes) = part("stdin") {
            command = command.stdin(bytes.to_vec());
        }
        if let Some(env) = obj.get("environment").and_then(Value::as_object) {
            for (k, v) in env {
                let v = v
                    .as_str()
                    .ok_or_else(|| RemoteError::Protocol("environment value not a string".into()))?;
                command = command.environment([(k.clone(), v.to_string())]);
            }
        }
        if let Some(inputs) = obj.get("inputFiles").and_then(Value::as_object) {
            for (name, desc) in inputs {
                match desc.get("type").and_then(Value::as_str) {
                    Some("part") => {
                        let bytes = part(&format!("file:{name}")).ok_or_else(|| {
                            RemoteError::Protocol(format!("missing part for input file \"{name}\""))
                        })?;
                        command = command.input_file_from_string(name, bytes.to_vec());
                    }
                    Some("url") => {
                        let url = desc.get("url").and_then(Value::as_str).ok_or_else(|| {
                            RemoteError::Protocol(format!("missing url for input file \"{name}\""))
                        })?;
                        command = command.input_file_from_url(name, url);
                    }
                    _ => {
                        return Err(RemoteError::Protocol(format!(
                            "unknown input file type for \"{name}\""
                        )));
                    }
                }
            }
        }
        if let Some(outputs) = obj.get("outputFiles").and_then(Value::as_object) {
            for (name, desc) in outputs {
                match desc.get("type").and_then(Value::as_str) {
                    Some("capture") => command = command.output_file_to_string(name),
                    Some("url") => {
                        let url = desc.get("url").and_then(Value::as_str).ok_or_else(|| {
                            RemoteError::Protocol(format!("missing url for output file \"{name}\""))
                        })?;
                        command = command.output_file_to_url(name, url);
                        if let Some(headers) = desc.get("headers").and_then(Value::as_array) {
                            for pair in headers {
                                if let (Some(k), Some(v)) = (
                                    pair.get(0).and_then(Value::as_str),
                                    pair.get(1).and_then(Value::as_str),
                                ) {
                                    command = command.output_header(k, v);
                                }
                            }
                        }
                        if desc.get("sendContentHash").and_then(Value::as_bool) == Some(true) {
                            command = command.output_content_hash();
                        }
                    }
                    _ => {
                        return Err(RemoteError::Protocol(format!(
                            "unknown output file type for \"{name}\""
                        )));
                    }
                }
                if let Some(code) = desc.get("requireExitCode").and_then(Value::as_i64) {
                    command = command.require_exit_code(name, code as i32);
                }
            }
        }
        if let Some(globs) = obj.get("outputGlobs").and_then(Value::as_object) {
            for desc in globs.values() {
                let prefix = desc
                    .get("prefix")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RemoteError::Protocol("glob missing prefix".into()))?;
                let extension = desc
                    .get("extension")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RemoteError::Protocol("glob missing extension".into()))?;
                command = match desc.get("type") {
                    Some(Value::Object(t)) => {
                        let url = t.get("url").and_then(Value::as_str).ok_or_else(|| {
                            RemoteError::Protocol("glob url sink missing url".into())
                        })?;
                        command.output_glob_to_url(prefix, extension, url)
                    }
                    _ => command.output_glob_to_string(prefix, extension),
                };
                if let Some(code) = desc.get("requireExitCode").and_then(Value::as_i64) {
                    let key = format!("{prefix}*.{extension}");
                    command = command.require_exit_code(&key, code as i32);
                }
            }
        }
        if let Some(v) = obj.get("cpuLimit").and_then(Value::as_u64) {
            command = command.cpu_time_limit(v);
        }
        if let Some(v) = obj.get("memoryLimit").and_then(Value::as_u64) {
            command = command.memory_limit(v);
        }
        if let Some(v) = obj.get("wallTimeLimit").and_then(Value::as_u64) {
            command = command.wall_time_limit(v);
        }
        if let Some(v) = obj.get("fileSizeLimit").and_then(Value::as_u64) {
            command = command.file_size_limit(v);
        }
        if let Some(v) = obj.get("includeStderr").and_then(Value::as_bool) {
            command = command.include_stderr(v);
        }
        if let Some(v) = obj.get("logStderr").and_then(Value::as_bool) {
            command = command.log_stderr(v);
        }
        Ok(command)
    }
}

/// Resource limits requested for an execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub cpu_seconds: Option<u64>,
    pub wall_seconds: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub file_size_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_escaped_and_joined() {
        let command = BoxedCommand::new()
            .params(["echo", "a", "b"])
            .unsafe_params(["c d"]);
        assert_eq!(command.command_string(), "'echo' 'a' 'b' c d");
    }

    #[test]
    fn replace_params_discards_previous_fragments() {
        let command = BoxedCommand::new()
            .params(["echo", "a"])
            .replace_params(["ls"]);
        assert_eq!(command.command_string(), "'ls'");
    }

    #[test]
    fn unsafe_command_discards_previous_fragments() {
        let command = BoxedCommand::new()
            .params(["echo", "a"])
            .unsafe_command("ls | wc -l");
        assert_eq!(command.command_string(), "ls | wc -l");
    }

    #[test]
    fn options_cover_only_set_values() {
        let command = BoxedCommand::new().cpu_time_limit(30).include_stderr(true);
        let options = command.options_value();
        assert_eq!(options.get("cpuLimit"), Some(&json!(30)));
        assert_eq!(options.get("includeStderr"), Some(&json!(true)));
        assert!(!options.contains_key("memoryLimit"));
        assert!(!options.contains_key("logStderr"));
    }

    #[test]
    fn client_data_round_trip() {
        let mut original = BoxedCommand::new()
            .route_name("demo")
            .params(["cat", "in.txt"])
            .stdin(b"stdin bytes".to_vec())
            .environment([("K", "V")])
            .input_file_from_string("in.txt", b"\x00\xffbinary".to_vec())
            .input_file_from_url("remote.txt", "http://files/remote.txt")
            .output_file_to_string("out.txt")
            .require_exit_code("out.txt", 0)
            .output_glob_to_string("part", "log")
            .cpu_time_limit(10)
            .include_stderr(true);

        let (data, parts) = original.to_client_data().unwrap();
        let rebuilt = BoxedCommand::from_client_data(&data, &parts).unwrap();

        assert_eq!(rebuilt.route(), Some("demo"));
        assert_eq!(rebuilt.command_string(), original.command_string());
        assert_eq!(rebuilt.stdin_bytes(), b"stdin bytes");
        assert_eq!(
            rebuilt.environment_overrides().get("K").map(String::as_str),
            Some("V")
        );
        assert_eq!(rebuilt.input_file_names(), vec!["in.txt", "remote.txt"]);
        assert_eq!(rebuilt.output_file_names(), vec!["out.txt"]);
        assert_eq!(rebuilt.output_glob_keys(), vec!["part*.log"]);
        assert_eq!(rebuilt.options_value(), original.options_value());
        // Binary payloads travel as parts, never through JSON strings.
        assert!(parts.iter().any(|(n, b)| n == "file:in.txt" && b == b"\x00\xffbinary"));
    }
}
