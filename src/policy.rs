//! Route policy configuration.
//!
//! A policy names the allowed routes and, per route, an optional spec
//! table constraining commands on that route. Specs are kept as plain
//! JSON-like data rather than typed structs; the validator interprets
//! them field by field, so a policy file can carry spec shapes this
//! binary predates without failing to load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::de::Error as _;
use serde_json::Value;

use crate::error::PolicyError;

/// Embedded default policy: deny all routes.
const DEFAULT_POLICY: &str = include_str!("../policy.default.toml");

#[derive(Debug, Clone)]
pub struct Policy {
    allowed_routes: Vec<String>,
    route_specs: BTreeMap<String, Value>,
}

/// On-disk shape. Route specs arrive as TOML tables and are re-expressed
/// as `serde_json::Value` once at load time.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    allowed_routes: Vec<String>,
    #[serde(default)]
    route_specs: BTreeMap<String, toml::Value>,
}

impl Policy {
    /// The embedded deny-all default.
    pub fn default_policy() -> Self {
        Self::parse(DEFAULT_POLICY).expect("embedded default policy must parse")
    }

    /// Parse a policy from TOML text.
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = toml::from_str(text)?;
        let mut route_specs = BTreeMap::new();
        for (route, spec) in file.route_specs {
            // toml::Value serializes losslessly into JSON terms.
            let value = serde_json::to_value(spec)
                .map_err(|e| PolicyError::Parse(toml::de::Error::custom(e.to_string())))?;
            route_specs.insert(route, value);
        }
        Ok(Policy {
            allowed_routes: file.allowed_routes,
            route_specs,
        })
    }

    /// Load a policy file from disk.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn allowed_routes(&self) -> &[String] {
        &self.allowed_routes
    }

    pub fn is_route_allowed(&self, route: &str) -> bool {
        self.allowed_routes.iter().any(|r| r == route)
    }

    /// The spec table for a route, if the policy carries one. A route can
    /// be allowed without a spec, in which case nothing is constrained.
    pub fn route_spec(&self, route: &str) -> Option<&Value> {
        self.route_specs.get(route)
    }

    /// The effective policy rendered back as TOML, for `--dump-policy`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("allowed_routes = [");
        for (i, route) in self.allowed_routes.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{route:?}"));
        }
        out.push_str("]\n");
        for (route, spec) in &self.route_specs {
            out.push_str(&format!("\n[route_specs.{route}]\n"));
            out.push_str(&format!("# {spec}\n"));
        }
        out
    }
}
