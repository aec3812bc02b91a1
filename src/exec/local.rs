//! Local execution in an exclusive scratch directory.
//!
//! One execution walks a fixed sequence: create scratch, stage inputs,
//! assemble the command line, spawn, drain pipes, wait, harvest outputs.
//! The scratch directory is a `TempDir`; teardown happens on drop, on
//! every exit path.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

use crate::command::{BoxedCommand, BoxedResult, GlobSink, InputSource, OutputSink};
use crate::error::{BoxError, EnvironmentError};

use super::{BoxedExecutor, CommandWrapper, UrlClient};

/// Decides whether a locale name is usable on this host.
type LocaleProbe = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct LocalBoxedExecutor {
    shell: PathBuf,
    wrappers: Vec<Box<dyn CommandWrapper>>,
    url_client: Option<Box<dyn UrlClient>>,
    locale_probe: LocaleProbe,
}

impl Default for LocalBoxedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBoxedExecutor {
    pub fn new() -> Self {
        LocalBoxedExecutor {
            shell: PathBuf::from("sh"),
            wrappers: Vec::new(),
            url_client: None,
            locale_probe: Box::new(default_locale_probe),
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Add a wrapper. Wrappers apply innermost-first: the first one added
    /// sits closest to the command.
    pub fn wrapper(mut self, wrapper: Box<dyn CommandWrapper>) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    pub fn url_client(mut self, client: Box<dyn UrlClient>) -> Self {
        self.url_client = Some(client);
        self
    }

    /// Replace the locale availability probe. The default accepts `C`,
    /// `POSIX` and UTF-8 locales.
    pub fn locale_probe(
        mut self,
        probe: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.locale_probe = Box::new(probe);
        self
    }

    fn stage_inputs(
        &self,
        command: &mut BoxedCommand,
        scratch: &Path,
    ) -> Result<(), EnvironmentError> {
        let inputs = std::mem::take(command.input_files());
        for (name, file) in inputs {
            let dest = scratch_path(scratch, &name)?;
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|source| EnvironmentError::Staging {
                    name: name.clone(),
                    source,
                })?;
            }
            let staged = |source| EnvironmentError::Staging {
                name: name.clone(),
                source,
            };
            let bytes_for_log = match file.source {
                InputSource::Literal(bytes) => {
                    let n = bytes.len() as u64;
                    std::fs::write(&dest, bytes).map_err(staged)?;
                    n
                }
                InputSource::File(path) => std::fs::copy(&path, &dest).map_err(staged)?,
                InputSource::Stream(mut stream) => {
                    let mut out = std::fs::File::create(&dest).map_err(staged)?;
                    std::io::copy(&mut stream, &mut out).map_err(staged)?
                }
                InputSource::Url(url) => {
                    let client = self.url_client.as_ref().ok_or_else(|| {
                        EnvironmentError::Other(format!(
                            "input file \"{name}\" is URL-bound but no URL client is configured"
                        ))
                    })?;
                    client.download(&url, &dest).map_err(staged)?;
                    std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(0)
                }
            };
            log::info!("staged input file \"{name}\" ({bytes_for_log} bytes)");
        }
        Ok(())
    }

    /// The full command line: merged stderr if requested, then wrappers
    /// applied inside-out.
    fn assemble(&self, command: &BoxedCommand) -> String {
        let mut line = command.command_string();
        if command.wants_stderr_included() {
            // Grouped so the redirect covers lists and compounds, not
            // just the last simple command.
            line = format!("{{ {line}\n}} 2>&1");
        }
        for wrapper in &self.wrappers {
            log::debug!("wrapping command with {}", wrapper.name());
            line = wrapper.wrap(&line);
        }
        line
    }

    /// Environment overrides with unusable locales downgraded.
    fn resolve_environment(&self, command: &BoxedCommand) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for (key, value) in command.environment_overrides() {
            let value = if (key == "LANG" || key.starts_with("LC_"))
                && !(self.locale_probe)(value)
            {
                log::warn!("locale \"{value}\" unavailable, using C.UTF-8 for {key}");
                "C.UTF-8".to_string()
            } else {
                value.clone()
            };
            env.insert(key.clone(), value);
        }
        env
    }

    fn harvest(
        &self,
        command: &mut BoxedCommand,
        scratch: &Path,
        exit_code: i32,
        result: &mut BoxedResult,
    ) -> Result<(), EnvironmentError> {
        let outputs = std::mem::take(command.output_files());
        for (name, file) in outputs {
            if let Some(required) = file.require_exit_code {
                if exit_code != required {
                    log::info!(
                        "skipping output file \"{name}\": exit code {exit_code}, required {required}"
                    );
                    continue;
                }
            }
            let path = scratch_path(scratch, &name)?;
            if !path.is_file() {
                log::info!("output file \"{name}\" was not created");
                continue;
            }
            self.deliver(&name, &path, file.sink, result)?;
        }

        if command.output_globs().is_empty() {
            return Ok(());
        }
        let mut relative_paths = Vec::new();
        collect_files(scratch, scratch, &mut relative_paths).map_err(|source| {
            EnvironmentError::Harvest {
                name: "<scratch>".to_string(),
                source,
            }
        })?;
        relative_paths.sort();
        for glob in command.output_globs().values() {
            if let Some(required) = glob.require_exit_code {
                if exit_code != required {
                    continue;
                }
            }
            for name in relative_paths.iter().filter(|p| glob.matches(p)) {
                if result.was_received(name) {
                    continue;
                }
                let path = scratch.join(name);
                let base_name = name.rsplit('/').next().unwrap_or(name);
                let sink = match &glob.sink {
                    GlobSink::Capture => OutputSink::Capture,
                    GlobSink::Directory(dir) => OutputSink::File(dir.join(base_name)),
                    GlobSink::Url(base_url) => OutputSink::Url {
                        url: format!("{base_url}/{base_name}"),
                        headers: Vec::new(),
                        send_content_hash: false,
                    },
                };
                self.deliver(name, &path, sink, result)?;
            }
        }
        Ok(())
    }

    fn deliver(
        &self,
        name: &str,
        path: &Path,
        sink: OutputSink,
        result: &mut BoxedResult,
    ) -> Result<(), EnvironmentError> {
        let harvest = |source| EnvironmentError::Harvest {
            name: name.to_string(),
            source,
        };
        let bytes_for_log;
        match sink {
            OutputSink::Capture => {
                let bytes = std::fs::read(path).map_err(harvest)?;
                bytes_for_log = bytes.len() as u64;
                result.add_file(name, Some(bytes));
            }
            OutputSink::File(dest) => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent).map_err(harvest)?;
                }
                bytes_for_log = std::fs::copy(path, &dest).map_err(harvest)?;
                result.add_file(name, None);
            }
            OutputSink::Stream(mut stream) => {
                let mut file = std::fs::File::open(path).map_err(harvest)?;
                bytes_for_log = std::io::copy(&mut file, &mut stream).map_err(harvest)?;
                stream.flush().map_err(harvest)?;
                result.add_file(name, None);
            }
            OutputSink::Url {
                url,
                headers,
                send_content_hash,
            } => {
                let client = self.url_client.as_ref().ok_or_else(|| {
                    EnvironmentError::Other(format!(
                        "output file \"{name}\" is URL-bound but no URL client is configured"
                    ))
                })?;
                client
                    .upload(&url, path, &headers, send_content_hash)
                    .map_err(harvest)?;
                bytes_for_log = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                result.add_file(name, None);
            }
        }
        log::info!("received output file \"{name}\" ({bytes_for_log} bytes)");
        Ok(())
    }
}

impl BoxedExecutor for LocalBoxedExecutor {
    fn execute(&self, mut command: BoxedCommand) -> Result<BoxedResult, BoxError> {
        let scratch = tempfile::Builder::new()
            .prefix("cmdbox-")
            .tempdir()
            .map_err(EnvironmentError::Scratch)?;

        self.stage_inputs(&mut command, scratch.path())?;

        let line = self.assemble(&command);
        log::debug!("executing: {line}");

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&line)
            .current_dir(scratch.path())
            .envs(self.resolve_environment(&command))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EnvironmentError::Spawn)?;

        let mut child_stdin = child.stdin.take();
        let mut child_stdout = child.stdout.take();
        let mut child_stderr = child.stderr.take();
        let stdin_bytes = command.stdin_bytes().to_vec();

        let (stdout, stderr) = std::thread::scope(|scope| {
            scope.spawn(move || {
                // The command may exit without reading; a broken pipe
                // here is not an error.
                if let Some(stdin) = child_stdin.as_mut() {
                    let _ = stdin.write_all(&stdin_bytes);
                }
            });
            let stderr_reader = scope.spawn(move || {
                let mut bytes = Vec::new();
                if let Some(stderr) = child_stderr.as_mut() {
                    let _ = stderr.read_to_end(&mut bytes);
                }
                bytes
            });
            let mut stdout = Vec::new();
            if let Some(out) = child_stdout.as_mut() {
                let _ = out.read_to_end(&mut stdout);
            }
            let stderr = stderr_reader.join().unwrap_or_default();
            (stdout, stderr)
        });

        let status = child.wait().map_err(EnvironmentError::Spawn)?;
        let exit_code = exit_code_of(status);

        let mut result = BoxedResult::new();
        result
            .set_exit_code(exit_code)
            .set_stdout(stdout)
            .set_stderr(stderr);

        if command.wants_stderr_logged() && exit_code != 0 {
            if let Some(stderr) = result.stderr().filter(|s| !s.is_empty()) {
                let route = command.route().unwrap_or("<unrouted>");
                log::error!(
                    "Error running {route}: {}",
                    String::from_utf8_lossy(stderr).trim_end()
                );
            }
        }

        self.harvest(&mut command, scratch.path(), exit_code, &mut result)?;
        Ok(result)
    }
}

/// Resolve a client-supplied file name inside the scratch directory.
/// Names are validated before joining; an absolute path or a traversal
/// component must never reach the host filesystem.
fn scratch_path(scratch: &Path, name: &str) -> Result<PathBuf, EnvironmentError> {
    if !crate::validate::is_safe_relative_path(name) {
        return Err(EnvironmentError::UnsafeName(name.to_string()));
    }
    Ok(scratch.join(name))
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signo) = status.signal() {
            return 128 + signo;
        }
    }
    -1
}

/// Accepts locales that exist everywhere this crate runs.
fn default_locale_probe(locale: &str) -> bool {
    locale == "C"
        || locale == "POSIX"
        || locale.ends_with(".UTF-8")
        || locale.ends_with(".utf8")
}

fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, base, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}
