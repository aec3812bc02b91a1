//! Server-side handling of delegated commands.
//!
//! The handler owns a policy and a local executor: deserialize the
//! client data, validate against the route spec, run, and describe the
//! outcome. It implements [`CommandTransport`] directly so tests (and
//! embedders) can wire a client to a server in-process; a network server
//! wraps the same handler in its own envelope.

use crate::command::BoxedCommand;
use crate::error::RemoteError;
use crate::exec::{BoxedExecutor, CommandTransport, LocalBoxedExecutor, RemoteRequest, RemoteResponse};
use crate::policy::Policy;
use crate::validate::Validator;

pub struct ShellHandler {
    policy: Policy,
    executor: LocalBoxedExecutor,
}

impl ShellHandler {
    pub fn new(policy: Policy) -> Self {
        ShellHandler {
            policy,
            executor: LocalBoxedExecutor::new(),
        }
    }

    pub fn with_executor(policy: Policy, executor: LocalBoxedExecutor) -> Self {
        ShellHandler { policy, executor }
    }

    /// Handle one delegated command. Validation rejections are part of
    /// the response; only environment and protocol failures are errors.
    pub fn handle(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let command = BoxedCommand::from_client_data(&request.data, &request.parts)?;
        log::info!(
            "handling route \"{}\": {}",
            request.route,
            command.command_string()
        );

        let validator = Validator::new(&self.policy);
        if let Err(rejection) = validator.validate(&command) {
            log::info!("rejected route \"{}\": {rejection}", request.route);
            return Ok(RemoteResponse::rejected(rejection.0));
        }

        // Validation already ran; an executor failure here is
        // environmental and reads as a server-side fault to the client.
        match self.executor.execute(command) {
            Ok(result) => Ok(RemoteResponse::from_result(&result)),
            Err(e) => Err(RemoteError::Transport(e.to_string())),
        }
    }
}

impl CommandTransport for ShellHandler {
    fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        self.handle(request)
    }
}
