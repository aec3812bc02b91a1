//! Shell command parsing and analysis.
//!
//! [`parse`] turns a command-line string into a [`SyntaxTree`] covering
//! the POSIX shell command language, minus here-documents. The tree's
//! [`SyntaxInfo`] view reports which shell features the command uses and
//! recovers the literal argv when no expansion stands in the way.

mod analyze;
mod parser;
mod tree;

pub use analyze::{Feature, SyntaxInfo};
pub use parser::parse;
pub use tree::{Node, SyntaxTree};
