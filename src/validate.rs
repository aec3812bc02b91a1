//! Route-spec validation of boxed commands.
//!
//! The validator interprets a route spec as plain data and checks a
//! command against it in a fixed rule order, so a given command and
//! policy always produce the same first error. Messages are stable text;
//! callers and tests rely on them verbatim.

use serde_json::Value;

use crate::command::BoxedCommand;
use crate::error::ValidationError;
use crate::parse;
use crate::policy::Policy;

/// Spec keys the validator understands. Anything else in a route spec is
/// a configuration error, rejected rather than ignored.
const TARGETS: &[&str] = &[
    "options",
    "argv",
    "inputFiles",
    "outputFiles",
    "outputGlobs",
    "shellFeatures",
];

/// Option keys subject to strict-mode checking.
const OPTION_KEYS: &[&str] = &[
    "cpuLimit",
    "memoryLimit",
    "wallTimeLimit",
    "fileSizeLimit",
    "includeStderr",
    "logStderr",
];

pub struct Validator<'a> {
    policy: &'a Policy,
}

impl<'a> Validator<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Validator { policy }
    }

    /// Check a command against the policy. Returns the first violation in
    /// rule order: route, spec shape, options, argv, files, globs,
    /// shell features.
    pub fn validate(&self, command: &BoxedCommand) -> Result<(), ValidationError> {
        let route = command.route().unwrap_or("");
        if !self.policy.is_route_allowed(route) {
            return Err(err(format!(
                "The route \"{route}\" is not in the list of allowed routes"
            )));
        }
        let spec = match self.policy.route_spec(route) {
            Some(spec) => spec,
            None => return Ok(()),
        };
        let spec = spec
            .as_object()
            .ok_or_else(|| err(format!("The route spec for \"{route}\" is not a table")))?;

        for key in spec.keys() {
            if !TARGETS.contains(&key.as_str()) {
                return Err(err(format!("Unknown validation target \"{key}\"")));
            }
        }

        if let Some(options) = spec.get("options") {
            self.check_options(command, options)?;
        }
        if let Some(argv) = spec.get("argv") {
            self.check_argv(command, argv)?;
        }
        if let Some(allowed) = spec.get("inputFiles") {
            check_names(command.input_file_names(), allowed, "input file")?;
        }
        if let Some(allowed) = spec.get("outputFiles") {
            check_names(command.output_file_names(), allowed, "output file")?;
        }
        if let Some(allowed) = spec.get("outputGlobs") {
            check_globs(command.output_glob_keys(), allowed)?;
        }
        if let Some(features) = spec.get("shellFeatures") {
            self.check_features(command, features)?;
        }
        Ok(())
    }

    /// Strict mode: the presence of `options` means any option the spec
    /// does not name is rejected. Named options are checked only when set
    /// on the command.
    fn check_options(
        &self,
        command: &BoxedCommand,
        options: &Value,
    ) -> Result<(), ValidationError> {
        let allowed = options
            .as_object()
            .ok_or_else(|| err("options must be a table".to_string()))?;
        let set = command.options_value();
        for key in OPTION_KEYS {
            let value = match set.get(*key) {
                Some(value) => value,
                None => continue,
            };
            let constraint = match allowed.get(*key) {
                Some(constraint) => constraint,
                None => return Err(err(format!("unexpected option {key}"))),
            };
            check_value(key, value, constraint)?;
        }
        Ok(())
    }

    fn check_argv(&self, command: &BoxedCommand, pattern: &Value) -> Result<(), ValidationError> {
        let slots = pattern
            .as_array()
            .ok_or_else(|| err("argv must be a list".to_string()))?;
        let argv = parse::parse(&command.command_string())
            .ok()
            .and_then(|tree| tree.info().literal_argv())
            .ok_or_else(|| err("argv may only contain literal strings".to_string()))?;
        for (i, slot) in slots.iter().enumerate() {
            let actual = argv.get(i).map(String::as_str);
            check_argv_slot(i, actual, slot)?;
        }
        if argv.len() > slots.len() {
            return Err(err(format!("argv[{}] is unexpected", slots.len())));
        }
        Ok(())
    }

    fn check_features(
        &self,
        command: &BoxedCommand,
        features: &Value,
    ) -> Result<(), ValidationError> {
        let allowed = features
            .as_array()
            .ok_or_else(|| err("shellFeatures must be a list".to_string()))?;
        let allowed: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
        let tree = parse::parse(&command.command_string())
            .map_err(|e| err(format!("Command could not be parsed: {e}")))?;
        for feature in tree.info().feature_list() {
            if !allowed.contains(&feature.as_str()) {
                return Err(err(format!(
                    "Command uses unexpected shell feature: {feature}"
                )));
            }
        }
        Ok(())
    }
}

fn err(message: String) -> ValidationError {
    ValidationError(message)
}

/// Check a set option value against its spec constraint: a type name, a
/// list of type names, or a literal value to match.
fn check_value(key: &str, value: &Value, constraint: &Value) -> Result<(), ValidationError> {
    match constraint {
        Value::String(type_name) => {
            if value_has_type(value, type_name)
                .map_err(|t| err(format!("unknown validation type \"{t}\"")))?
            {
                Ok(())
            } else {
                Err(err(format!("{key} must be of type {type_name}")))
            }
        }
        Value::Array(type_names) => {
            let mut names = Vec::new();
            for t in type_names {
                let t = t
                    .as_str()
                    .ok_or_else(|| err(format!("invalid type list for {key}")))?;
                if value_has_type(value, t)
                    .map_err(|t| err(format!("unknown validation type \"{t}\"")))?
                {
                    return Ok(());
                }
                names.push(t);
            }
            Err(err(format!("{key} must be one of: {}", names.join(", "))))
        }
        literal => {
            if value == literal {
                Ok(())
            } else {
                Err(err(format!(
                    "{key} does not match the expected value {literal}"
                )))
            }
        }
    }
}

fn check_argv_slot(i: usize, actual: Option<&str>, slot: &Value) -> Result<(), ValidationError> {
    match slot {
        Value::String(expected) => {
            if actual == Some(expected.as_str()) {
                Ok(())
            } else {
                Err(err(format!(
                    "argv[{i}] does not match the expected value \"{expected}\""
                )))
            }
        }
        Value::Object(restriction) => {
            for key in restriction.keys() {
                if key != "allow" {
                    return Err(err(format!(
                        "Unknown configured restriction type \"{key}\""
                    )));
                }
            }
            let type_name = restriction
                .get("allow")
                .and_then(Value::as_str)
                .ok_or_else(|| err(format!("argv[{i}] restriction is missing allow")))?;
            let ok = match (actual, type_name) {
                // An absent trailing argument satisfies only "any".
                (None, t) => t == "any",
                (Some(_), "any") => true,
                // Extraction already proved every entry is a literal word.
                (Some(_), "literal") => true,
                (Some(value), "relative") => is_safe_relative_path(value),
                (_, t) => return Err(err(format!("unknown validation type \"{t}\""))),
            };
            if ok {
                Ok(())
            } else {
                Err(err(format!("argv[{i}] must be of type {type_name}")))
            }
        }
        _ => Err(err(format!("argv[{i}] has an invalid spec slot"))),
    }
}

/// Coarse type check. `Err` carries the unrecognized type name.
fn value_has_type<'t>(value: &Value, type_name: &'t str) -> Result<bool, &'t str> {
    Ok(match type_name {
        "any" => true,
        "integer" => value.is_i64() || value.is_u64(),
        "float" => value.is_number(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "literal" => match value.as_str() {
            Some(s) => is_literal_word(s),
            None => false,
        },
        "relative" => match value.as_str() {
            Some(s) => is_safe_relative_path(s),
            None => false,
        },
        _ => return Err(type_name),
    })
}

/// Whether a string is a single literal shell word: it survives an
/// escape-free parse and comes back unchanged as a one-element argv.
fn is_literal_word(s: &str) -> bool {
    match parse::parse(s) {
        Ok(tree) => tree.info().literal_argv().as_deref() == Some(&[s.to_string()]),
        Err(_) => false,
    }
}

/// Relative, traversal-free, and clear of reserved device names.
///
/// The reserved-name check is unconditional on every platform: a path
/// that is unsafe on one supported platform is rejected everywhere, so a
/// policy validated here never produces platform-dependent outcomes.
pub(crate) fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    // Drive-letter absolute paths.
    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        return false;
    }
    for component in path.split(['/', '\\']) {
        if component.is_empty() || component == "." || component == ".." {
            return false;
        }
        if is_reserved_name(component) {
            return false;
        }
    }
    true
}

/// Windows device names are reserved with any extension (`con.txt` still
/// names the console device).
fn is_reserved_name(component: &str) -> bool {
    let stem = component.split('.').next().unwrap_or(component);
    let stem = stem.to_ascii_lowercase();
    match stem.as_str() {
        "con" | "prn" | "aux" | "nul" => true,
        _ => {
            (stem.len() == 4)
                && (stem.starts_with("com") || stem.starts_with("lpt"))
                && stem.as_bytes()[3].is_ascii_digit()
                && stem.as_bytes()[3] != b'0'
        }
    }
}

/// Membership check for file-name targets. The allowed set is the keys of
/// a table (names may carry per-file sub-specs).
fn check_names(actual: Vec<&str>, allowed: &Value, what: &str) -> Result<(), ValidationError> {
    let allowed = allowed
        .as_object()
        .ok_or_else(|| err(format!("{what} spec must be a table")))?;
    for name in actual {
        if !allowed.contains_key(name) {
            return Err(err(format!("Unexpected {what} \"{name}\"")));
        }
    }
    Ok(())
}

/// Membership check for glob keys; the allowed set is a list of
/// `prefix*.extension` strings.
fn check_globs(actual: Vec<&str>, allowed: &Value) -> Result<(), ValidationError> {
    let allowed = allowed
        .as_array()
        .ok_or_else(|| err("outputGlobs must be a list".to_string()))?;
    let allowed: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
    for key in actual {
        if !allowed.contains(&key) {
            return Err(err(format!("Unexpected glob \"{key}\"")));
        }
    }
    Ok(())
}
