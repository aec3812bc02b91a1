//! Sandbox wrappers around the assembled command line.
//!
//! A wrapper rewrites the command line so that an external confinement
//! tool runs the shell. Wrappers compose innermost-first: the first
//! wrapper in the chain sits closest to the command. The tools themselves
//! are configured, never reimplemented.

use crate::escape::escape_one;

pub trait CommandWrapper: Send + Sync {
    /// Tool name, for log attribution.
    fn name(&self) -> &'static str;

    /// Rewrite the command line. The incoming line must end up as the
    /// final argument of the wrapping tool.
    fn wrap(&self, command_line: &str) -> String;
}

/// `firejail` confinement with an optional profile.
pub struct FirejailWrapper {
    profile: Option<String>,
    extra_args: Vec<String>,
}

impl FirejailWrapper {
    pub fn new() -> Self {
        FirejailWrapper {
            profile: None,
            extra_args: Vec::new(),
        }
    }

    pub fn profile(mut self, path: &str) -> Self {
        self.profile = Some(path.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.extra_args.push(arg.to_string());
        self
    }
}

impl Default for FirejailWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandWrapper for FirejailWrapper {
    fn name(&self) -> &'static str {
        "firejail"
    }

    fn wrap(&self, command_line: &str) -> String {
        let mut line = String::from("firejail --quiet");
        if let Some(profile) = &self.profile {
            line.push_str(" --profile=");
            line.push_str(&escape_one(profile));
        }
        for arg in &self.extra_args {
            line.push(' ');
            line.push_str(&escape_one(arg));
        }
        line.push_str(" -- sh -c ");
        line.push_str(&escape_one(command_line));
        line
    }
}

/// `systemd-run` transient scope with resource properties.
pub struct SystemdRunWrapper {
    properties: Vec<(String, String)>,
}

impl SystemdRunWrapper {
    pub fn new() -> Self {
        SystemdRunWrapper {
            properties: Vec::new(),
        }
    }

    /// Add a `-p Name=Value` unit property, e.g. `MemoryMax=1G`.
    pub fn property(mut self, name: &str, value: &str) -> Self {
        self.properties.push((name.to_string(), value.to_string()));
        self
    }
}

impl Default for SystemdRunWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandWrapper for SystemdRunWrapper {
    fn name(&self) -> &'static str {
        "systemd-run"
    }

    fn wrap(&self, command_line: &str) -> String {
        let mut line = String::from("systemd-run --quiet --pipe --wait --collect --same-dir");
        for (name, value) in &self.properties {
            line.push_str(" -p ");
            line.push_str(&escape_one(&format!("{name}={value}")));
        }
        line.push_str(" sh -c ");
        line.push_str(&escape_one(command_line));
        line
    }
}
