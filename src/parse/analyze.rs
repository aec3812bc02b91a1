//! Syntax tree analysis: which shell features a command uses, and
//! whether its argv can be recovered as plain literal strings.

use std::fmt;

use super::tree::{DquotePart, Fragment, Node, SyntaxTree, Word};

/// A shell language feature observed in a parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Asynchronous execution with `&`.
    Background,
    /// Sequential or conditional lists (`;`, `&&`, `||`).
    List,
    /// Pipelines with two or more commands.
    Pipeline,
    /// I/O redirection.
    Redirect,
    /// Compound commands: groups, subshells, loops, conditionals,
    /// function definitions.
    Compound,
    /// Command substitution, either `$(...)` or backquotes.
    CommandExpansion,
    /// Parameter use or expansion.
    Parameter,
    /// Parameter expansion with a modifying operator, or arithmetic
    /// expansion.
    ExoticExpansion,
    /// Variable assignment preceding a command.
    Assignment,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Background => "background",
            Feature::List => "list",
            Feature::Pipeline => "pipeline",
            Feature::Redirect => "redirect",
            Feature::Compound => "compound",
            Feature::CommandExpansion => "command_expansion",
            Feature::Parameter => "parameter",
            Feature::ExoticExpansion => "exotic_expansion",
            Feature::Assignment => "assignment",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived information about a parsed command line.
pub struct SyntaxInfo<'a> {
    tree: &'a SyntaxTree,
}

impl<'a> SyntaxInfo<'a> {
    pub(crate) fn new(tree: &'a SyntaxTree) -> Self {
        SyntaxInfo { tree }
    }

    /// The features used by the command, in first-observed order.
    pub fn feature_list(&self) -> Vec<Feature> {
        let mut features = Vec::new();
        visit_node(self.tree.root(), &mut features);
        features
    }

    /// The command's arguments as literal strings, if the command is a
    /// single simple command whose words contain no expansions.
    /// Assignment prefixes and redirects are permitted but excluded from
    /// the result.
    pub fn literal_argv(&self) -> Option<Vec<String>> {
        let commands = match self.tree.root() {
            Node::Program(commands) => commands,
            _ => return None,
        };
        let children = match commands.as_slice() {
            [Node::CompleteCommand(children)] => children,
            _ => return None,
        };
        let suffix = match children.as_slice() {
            [Node::SimpleCommand { suffix, .. }] => suffix,
            _ => return None,
        };
        let mut argv = Vec::new();
        for node in suffix {
            match node {
                Node::Word(word) => argv.push(literal_word(word)?),
                Node::IoRedirect { .. } => {}
                _ => return None,
            }
        }
        Some(argv)
    }
}

fn record(features: &mut Vec<Feature>, feature: Feature) {
    if !features.contains(&feature) {
        features.push(feature);
    }
}

fn visit_node(node: &Node, features: &mut Vec<Feature>) {
    match node {
        Node::Program(children) | Node::CompleteCommand(children) => {
            visit_all(children, features);
        }
        Node::List(children) | Node::AndIf(children) | Node::OrIf(children) => {
            record(features, Feature::List);
            visit_all(children, features);
        }
        Node::Background(children) => {
            record(features, Feature::Background);
            visit_all(children, features);
        }
        Node::Bang(children) => visit_all(children, features),
        Node::Pipeline(children) => {
            record(features, Feature::Pipeline);
            visit_all(children, features);
        }
        Node::SimpleCommand { prefix, suffix } => {
            visit_all(prefix, features);
            visit_all(suffix, features);
        }
        Node::Assignment { value, .. } => {
            record(features, Feature::Assignment);
            visit_word(value, features);
        }
        Node::IoRedirect { target, .. } => {
            record(features, Feature::Redirect);
            visit_word(target, features);
        }
        Node::Subshell(children) | Node::BraceGroup(children) => {
            record(features, Feature::Compound);
            visit_all(children, features);
        }
        Node::For {
            in_words, body, ..
        } => {
            record(features, Feature::Compound);
            if let Some(words) = in_words {
                for word in words {
                    visit_word(word, features);
                }
            }
            visit_all(body, features);
        }
        Node::Case { subject, items } => {
            record(features, Feature::Compound);
            visit_word(subject, features);
            for item in items {
                for pattern in &item.patterns {
                    visit_word(pattern, features);
                }
                visit_all(&item.consequent, features);
            }
        }
        Node::If { arms, else_body } => {
            record(features, Feature::Compound);
            for (condition, consequent) in arms {
                visit_all(condition, features);
                visit_all(consequent, features);
            }
            if let Some(body) = else_body {
                visit_all(body, features);
            }
        }
        Node::While { condition, body } | Node::Until { condition, body } => {
            record(features, Feature::Compound);
            visit_all(condition, features);
            visit_all(body, features);
        }
        Node::FunctionDefinition {
            body, redirects, ..
        } => {
            record(features, Feature::Compound);
            visit_node(body, features);
            visit_all(redirects, features);
        }
        Node::Word(word) => visit_word(word, features),
    }
}

fn visit_all(nodes: &[Node], features: &mut Vec<Feature>) {
    for node in nodes {
        visit_node(node, features);
    }
}

fn visit_word(word: &Word, features: &mut Vec<Feature>) {
    for fragment in &word.0 {
        visit_fragment(fragment, features);
    }
}

fn visit_fragment(fragment: &Fragment, features: &mut Vec<Feature>) {
    match fragment {
        Fragment::Literal(_) | Fragment::SingleQuote(_) | Fragment::BareEscape(_) => {}
        Fragment::DoubleQuote(parts) => {
            for part in parts {
                if let DquotePart::Expansion(inner) = part {
                    visit_fragment(inner, features);
                }
            }
        }
        Fragment::Parameter(_) => record(features, Feature::Parameter),
        Fragment::BracedExpansion { op, word, .. } => {
            if op.is_exotic() {
                record(features, Feature::ExoticExpansion);
            }
            record(features, Feature::Parameter);
            if let Some(word) = word {
                visit_word(word, features);
            }
        }
        Fragment::CommandExpansion(commands) => {
            record(features, Feature::CommandExpansion);
            visit_all(commands, features);
        }
        Fragment::Backquote(_) => record(features, Feature::CommandExpansion),
        Fragment::ArithmeticExpansion(_) => record(features, Feature::ExoticExpansion),
    }
}

fn literal_word(word: &Word) -> Option<String> {
    let mut out = String::new();
    for fragment in &word.0 {
        match fragment {
            Fragment::Literal(s) | Fragment::SingleQuote(s) => out.push_str(s),
            Fragment::BareEscape(c) => out.push(*c),
            Fragment::DoubleQuote(parts) => {
                for part in parts {
                    match part {
                        DquotePart::Literal(s) => out.push_str(s),
                        DquotePart::Escape(c) => out.push(*c),
                        DquotePart::Expansion(_) => return None,
                    }
                }
            }
            _ => return None,
        }
    }
    Some(out)
}
