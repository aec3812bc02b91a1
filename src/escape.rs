//! Argument escaping for the two supported shell families.
//!
//! The POSIX half is the one the parser can round-trip: for any argument
//! list, `parse(escape(args))` recovers `args` via
//! [`SyntaxInfo::literal_argv`](crate::parse::SyntaxInfo::literal_argv).
//! The Windows half covers `cmd`-style quoting for command assembly only;
//! parsing cmd syntax is out of scope.

/// Escape one argument for the shell family of the current OS.
pub fn escape_one(arg: &str) -> String {
    #[cfg(windows)]
    {
        escape_one_cmd(arg)
    }
    #[cfg(not(windows))]
    {
        escape_one_posix(arg)
    }
}

/// Escape a list of arguments into a single command-line fragment.
/// An empty list yields the empty string.
pub fn escape<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|a| escape_one(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// POSIX sh quoting: wrap in single quotes, rewriting embedded single
/// quotes as `'\''`.
pub fn escape_one_posix(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Windows cmd quoting: wrap in double quotes, doubling embedded double
/// quotes.
pub fn escape_one_cmd(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}
