//! cmdbox: defense-in-depth boxing of shell commands.
//!
//! Commands are built as [`command::BoxedCommand`]s from escaped
//! fragments, checked against a route policy by [`validate::Validator`],
//! and run by an executor in an exclusive scratch directory. The same
//! command can run locally or be delegated through a transport to a
//! server carrying the same policy, so the check happens on both sides
//! of the trust boundary.
//!
//! # Architecture
//!
//! - **[`escape`]** — POSIX sh and Windows cmd argument quoting.
//! - **[`parse`]** — Recursive-descent shell parser, syntax tree, feature
//!   and literal-argv analysis.
//! - **[`policy`]** — Route policy: TOML files, embedded deny-all default.
//! - **[`validate`]** — Route-spec validation with stable messages.
//! - **[`command`]** — The boxed command builder, files, and results.
//! - **[`exec`]** — Local and remote executors, sandbox wrappers.
//! - **[`server`]** — Server-side handler: deserialize, validate, run.

/// The boxed command builder, file bindings, and execution results.
pub mod command;
/// Error taxonomy shared across the crate.
pub mod error;
/// Shell argument escaping for POSIX sh and Windows cmd.
pub mod escape;
/// Local and remote executors plus sandbox wrappers.
pub mod exec;
/// Stderr logging setup for the binary.
pub mod logging;
/// Shell command parsing and analysis.
pub mod parse;
/// Route policy configuration.
pub mod policy;
/// Server-side request handling.
pub mod server;
/// Command validation against route specs.
pub mod validate;

use command::{BoxedCommand, BoxedResult};
use error::BoxError;
use exec::{BoxedExecutor, LocalBoxedExecutor};
use policy::Policy;
use validate::Validator;

/// Validate a command against a policy and run it locally.
///
/// This is the main entry point for embedders with simple needs. For
/// wrappers, URL clients, or remote delegation, build the executor
/// directly.
pub fn validate_and_execute(policy: &Policy, command: BoxedCommand) -> Result<BoxedResult, BoxError> {
    Validator::new(policy).validate(&command)?;
    LocalBoxedExecutor::new().execute(command)
}
