//! Executors: run a validated boxed command and report what happened.

mod local;
mod remote;
mod wrapper;

pub use local::LocalBoxedExecutor;
pub use remote::{CommandTransport, RemoteBoxedExecutor, RemoteRequest, RemoteResponse};
pub use wrapper::{CommandWrapper, FirejailWrapper, SystemdRunWrapper};

use std::io;
use std::path::Path;

use crate::command::{BoxedCommand, BoxedResult};
use crate::error::BoxError;

/// Runs a boxed command. Commands are consumed: their input streams are
/// single-use and their output sinks are written exactly once.
pub trait BoxedExecutor {
    fn execute(&self, command: BoxedCommand) -> Result<BoxedResult, BoxError>;
}

/// Transfers URL-bound files. The HTTP stack lives behind this trait;
/// declaring a URL file without configuring a client is an environment
/// error at staging or harvest time.
pub trait UrlClient: Send + Sync {
    fn download(&self, url: &str, dest: &Path) -> io::Result<()>;

    /// Upload a harvested file. `send_content_hash` asks the client to
    /// attach an integrity hash in whatever form its protocol uses.
    fn upload(
        &self,
        url: &str,
        src: &Path,
        headers: &[(String, String)],
        send_content_hash: bool,
    ) -> io::Result<()>;
}
