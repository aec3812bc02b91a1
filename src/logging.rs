//! Logging setup for the binary.
//!
//! Library code only emits through the `log` facade; this wires the
//! facade to stderr so stdout stays clean for the response JSON.

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Initialize stderr logging. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}
