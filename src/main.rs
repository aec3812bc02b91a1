//! cmdbox: run one boxed command from a JSON request.
//!
//! Reads a request from stdin, validates it against the policy, executes
//! it locally, and writes the result to stdout:
//!
//!   {"route": "compile", "argv": ["gcc", "main.c"],
//!    "stdin": "...", "input_files": {"main.c": "int main() {}"}}
//!
//! The reply carries the exit code, captured stdout/stderr, and any
//! files the command produced. Flags:
//!
//!   --policy PATH   load a policy file instead of the embedded default
//!   --dump-policy   print the effective policy and exit
//!   -v              debug logging

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use cmdbox::command::BoxedCommand;
use cmdbox::exec::{BoxedExecutor, LocalBoxedExecutor};
use cmdbox::policy::Policy;
use cmdbox::validate::Validator;

#[derive(Deserialize)]
struct Request {
    route: String,
    argv: Option<Vec<String>>,
    unsafe_command: Option<String>,
    stdin: Option<String>,
    input_files: Option<BTreeMap<String, String>>,
}

fn build_command(request: Request) -> BoxedCommand {
    let mut command = BoxedCommand::new().route_name(&request.route);
    if let Some(argv) = request.argv {
        command = command.params(argv);
    }
    if let Some(line) = request.unsafe_command {
        command = command.unsafe_command(&line);
    }
    if let Some(stdin) = request.stdin {
        command = command.stdin(stdin.into_bytes());
    }
    for (name, contents) in request.input_files.unwrap_or_default() {
        command = command.input_file_from_string(&name, contents.into_bytes());
    }
    command
}

fn main() {
    let mut policy_path: Option<PathBuf> = None;
    let mut dump_policy = false;
    let mut verbose = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--policy" => match args.next() {
                Some(path) => policy_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("--policy requires a path");
                    std::process::exit(1);
                }
            },
            "--dump-policy" => dump_policy = true,
            "-v" => verbose = true,
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(1);
            }
        }
    }

    cmdbox::logging::init(verbose);

    let policy = match policy_path {
        Some(path) => match Policy::load(&path) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        None => Policy::default_policy(),
    };

    if dump_policy {
        print!("{}", policy.dump());
        return;
    }

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("failed to read stdin");
        std::process::exit(1);
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("JSON parse error: {e}");
            std::process::exit(1);
        }
    };

    let command = build_command(request);

    if let Err(e) = Validator::new(&policy).validate(&command) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let result = match LocalBoxedExecutor::new().execute(command) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let files: BTreeMap<&str, Option<String>> = result
        .file_names()
        .iter()
        .map(|&name| {
            let contents = result
                .file_contents(name)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
            (name, contents)
        })
        .collect();

    let output = serde_json::json!({
        "exit_code": result.exit_code(),
        "stdout": String::from_utf8_lossy(result.stdout().unwrap_or_default()),
        "stderr": String::from_utf8_lossy(result.stderr().unwrap_or_default()),
        "files": files,
    });

    match serde_json::to_string(&output) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("failed to serialize result: {e}");
            std::process::exit(1);
        }
    }
}
