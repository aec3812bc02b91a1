//! Syntax tree node types and their canonical serialization.
//!
//! The tree is a closed sum type built once by the parser and read-only
//! afterward. `dump()` renders the XML-ish form that defines tree equality
//! for tests: node kinds as elements, literal text entity-escaped.

/// A parsed shell program, wrapping the root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    root: Node,
}

impl SyntaxTree {
    pub(crate) fn new(root: Node) -> Self {
        SyntaxTree { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Read accessors for derived syntax information.
    pub fn info(&self) -> super::SyntaxInfo<'_> {
        super::SyntaxInfo::new(self)
    }

    /// Order-preserving serialization of node kinds and literal text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.root.dump(&mut out);
        out
    }
}

/// One node of the syntax tree.
///
/// Chain flattening follows the grammar: a complete command with a single
/// and/or chain holds the chain nodes directly; `;`/`&`-separated items
/// are wrapped in a single `List`; `&` wraps the preceding chain in
/// `Background`. Compound bodies hold the flattened item sequence with no
/// `List` wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Program(Vec<Node>),
    CompleteCommand(Vec<Node>),
    List(Vec<Node>),
    AndIf(Vec<Node>),
    OrIf(Vec<Node>),
    Background(Vec<Node>),
    Bang(Vec<Node>),
    Pipeline(Vec<Node>),
    /// `prefix` holds leading assignments/redirects; `suffix` holds words
    /// and redirects in source order.
    SimpleCommand {
        prefix: Vec<Node>,
        suffix: Vec<Node>,
    },
    Assignment {
        name: String,
        value: Word,
    },
    IoRedirect {
        subject: Option<String>,
        kind: RedirectKind,
        target: Word,
    },
    Subshell(Vec<Node>),
    BraceGroup(Vec<Node>),
    For {
        var: String,
        /// `None` when the `in` clause is absent entirely.
        in_words: Option<Vec<Word>>,
        body: Vec<Node>,
    },
    Case {
        subject: Word,
        items: Vec<CaseItem>,
    },
    If {
        /// First arm is the `if`; the rest are `elif`s.
        arms: Vec<(Vec<Node>, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
    While {
        condition: Vec<Node>,
        body: Vec<Node>,
    },
    Until {
        condition: Vec<Node>,
        body: Vec<Node>,
    },
    FunctionDefinition {
        name: String,
        body: Box<Node>,
        redirects: Vec<Node>,
    },
    Word(Word),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Input,
    Output,
    AppendOutput,
    DuplicateInput,
    DuplicateOutput,
    Clobber,
}

impl RedirectKind {
    fn element(self) -> &'static str {
        match self {
            RedirectKind::Input => "input",
            RedirectKind::Output => "output",
            RedirectKind::AppendOutput => "append_output",
            RedirectKind::DuplicateInput => "duplicate_input",
            RedirectKind::DuplicateOutput => "duplicate_output",
            RedirectKind::Clobber => "clobber",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseItem {
    pub patterns: Vec<Word>,
    pub consequent: Vec<Node>,
}

/// A shell word: an ordered sequence of fragments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word(pub Vec<Fragment>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Unquoted literal text.
    Literal(String),
    SingleQuote(String),
    DoubleQuote(Vec<DquotePart>),
    /// `\x` outside quotes.
    BareEscape(char),
    /// `$name`, `$1`, `$@`, ...
    Parameter(Param),
    /// `${a}`, `${a:-w}`, `${#a}`, `${a%%x}`, ...
    BracedExpansion {
        param: Param,
        op: ExpansionOp,
        word: Option<Word>,
    },
    /// `$( ... )`, recursively parsed; children are complete commands.
    CommandExpansion(Vec<Node>),
    /// `` ` ... ` `` with nested `` \` ... \` `` spans kept opaque.
    Backquote(Vec<BackquotePart>),
    /// `$(( ... ))`, captured as an opaque literal word.
    ArithmeticExpansion(Word),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DquotePart {
    Literal(String),
    /// A backslash escape of `$`, `` ` ``, `"` or `\`.
    Escape(char),
    /// A parameter/command/arithmetic expansion inside double quotes.
    Expansion(Fragment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Named(String),
    Positional(String),
    Special(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionOp {
    /// Plain `${a}` dereference.
    None,
    /// `:-`
    UseDefault,
    /// `:=`
    AssignDefault,
    /// `:?`
    IndicateError,
    /// `:+`
    UseAlternative,
    /// `-`
    UseDefaultUnset,
    /// `=`
    AssignDefaultUnset,
    /// `?`
    IndicateErrorUnset,
    /// `+`
    UseAlternativeUnset,
    /// `${#a}`
    StringLength,
    /// `%`
    RemoveSmallestSuffix,
    /// `%%`
    RemoveLargestSuffix,
    /// `#`
    RemoveSmallestPrefix,
    /// `##`
    RemoveLargestPrefix,
}

impl ExpansionOp {
    fn element(self) -> &'static str {
        match self {
            ExpansionOp::None => "braced_parameter_expansion",
            ExpansionOp::UseDefault => "use_default",
            ExpansionOp::AssignDefault => "assign_default",
            ExpansionOp::IndicateError => "indicate_error",
            ExpansionOp::UseAlternative => "use_alternative",
            ExpansionOp::UseDefaultUnset => "use_default_unset",
            ExpansionOp::AssignDefaultUnset => "assign_default_unset",
            ExpansionOp::IndicateErrorUnset => "indicate_error_unset",
            ExpansionOp::UseAlternativeUnset => "use_alternative_unset",
            ExpansionOp::StringLength => "string_length",
            ExpansionOp::RemoveSmallestSuffix => "remove_smallest_suffix",
            ExpansionOp::RemoveLargestSuffix => "remove_largest_suffix",
            ExpansionOp::RemoveSmallestPrefix => "remove_smallest_prefix",
            ExpansionOp::RemoveLargestPrefix => "remove_largest_prefix",
        }
    }

    /// Whether this operator makes the expansion "exotic" for feature
    /// purposes. Plain dereference and string length are not exotic.
    pub fn is_exotic(self) -> bool {
        !matches!(self, ExpansionOp::None | ExpansionOp::StringLength)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackquotePart {
    Text(String),
    DoubleBackquote(String),
}

// ── dump serialization ──

fn esc(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn tag(name: &str, out: &mut String, body: impl FnOnce(&mut String)) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    body(out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn dump_all(nodes: &[Node], out: &mut String) {
    for n in nodes {
        n.dump(out);
    }
}

impl Node {
    fn dump(&self, out: &mut String) {
        match self {
            Node::Program(c) => tag("program", out, |o| dump_all(c, o)),
            Node::CompleteCommand(c) => tag("complete_command", out, |o| dump_all(c, o)),
            Node::List(c) => tag("list", out, |o| dump_all(c, o)),
            Node::AndIf(c) => tag("and_if", out, |o| dump_all(c, o)),
            Node::OrIf(c) => tag("or_if", out, |o| dump_all(c, o)),
            Node::Background(c) => tag("background", out, |o| dump_all(c, o)),
            Node::Bang(c) => tag("bang", out, |o| dump_all(c, o)),
            Node::Pipeline(c) => tag("pipeline", out, |o| dump_all(c, o)),
            Node::SimpleCommand { prefix, suffix } => tag("simple_command", out, |o| {
                if !prefix.is_empty() {
                    tag("cmd_prefix", o, |o| dump_all(prefix, o));
                }
                dump_all(suffix, o);
            }),
            Node::Assignment { name, value } => tag("assignment", out, |o| {
                tag("name", o, |o| esc(name, o));
                value.dump(o);
            }),
            Node::IoRedirect {
                subject,
                kind,
                target,
            } => tag("io_redirect", out, |o| {
                if let Some(fd) = subject {
                    tag("io_subject", o, |o| esc(fd, o));
                }
                tag(kind.element(), o, |o| target.dump(o));
            }),
            Node::Subshell(c) => tag("subshell", out, |o| dump_all(c, o)),
            Node::BraceGroup(c) => tag("brace_group", out, |o| dump_all(c, o)),
            Node::For {
                var,
                in_words,
                body,
            } => tag("for", out, |o| {
                esc(var, o);
                if let Some(words) = in_words {
                    tag("in", o, |o| {
                        for w in words {
                            w.dump(o);
                        }
                    });
                }
                tag("do", o, |o| dump_all(body, o));
            }),
            Node::Case { subject, items } => tag("case", out, |o| {
                subject.dump(o);
                tag("in", o, |o| {
                    for item in items {
                        tag("case_item", o, |o| {
                            tag("case_pattern", o, |o| {
                                for p in &item.patterns {
                                    p.dump(o);
                                }
                            });
                            tag("case_consequent", o, |o| dump_all(&item.consequent, o));
                        });
                    }
                });
            }),
            Node::If { arms, else_body } => tag("if", out, |o| {
                for (i, (cond, body)) in arms.iter().enumerate() {
                    let (c, b) = if i == 0 {
                        ("condition", "consequent")
                    } else {
                        ("elif_condition", "elif_consequent")
                    };
                    tag(c, o, |o| dump_all(cond, o));
                    tag(b, o, |o| dump_all(body, o));
                }
                if let Some(body) = else_body {
                    tag("else", o, |o| dump_all(body, o));
                }
            }),
            Node::While { condition, body } => tag("while", out, |o| {
                tag("condition", o, |o| dump_all(condition, o));
                tag("do", o, |o| dump_all(body, o));
            }),
            Node::Until { condition, body } => tag("until", out, |o| {
                tag("condition", o, |o| dump_all(condition, o));
                tag("do", o, |o| dump_all(body, o));
            }),
            Node::FunctionDefinition {
                name,
                body,
                redirects,
            } => tag("function_definition", out, |o| {
                tag("function_name", o, |o| esc(name, o));
                body.dump(o);
                dump_all(redirects, o);
            }),
            Node::Word(w) => w.dump(out),
        }
    }
}

impl Word {
    fn dump(&self, out: &mut String) {
        tag("word", out, |o| {
            for f in &self.0 {
                f.dump(o);
            }
        });
    }
}

impl Param {
    fn dump(&self, out: &mut String) {
        match self {
            Param::Named(n) => tag("named_parameter", out, |o| esc(n, o)),
            Param::Positional(n) => tag("positional_parameter", out, |o| esc(n, o)),
            Param::Special(c) => tag("special_parameter", out, |o| esc(&c.to_string(), o)),
        }
    }
}

impl Fragment {
    fn dump(&self, out: &mut String) {
        match self {
            Fragment::Literal(text) => tag("unquoted_literal", out, |o| esc(text, o)),
            Fragment::SingleQuote(text) => tag("single_quote", out, |o| esc(text, o)),
            Fragment::DoubleQuote(parts) => tag("double_quote", out, |o| {
                for p in parts {
                    match p {
                        DquotePart::Literal(text) => esc(text, o),
                        DquotePart::Escape(c) => {
                            tag("dquoted_escape", o, |o| esc(&c.to_string(), o));
                        }
                        DquotePart::Expansion(f) => f.dump(o),
                    }
                }
            }),
            Fragment::BareEscape(c) => tag("bare_escape", out, |o| esc(&c.to_string(), o)),
            Fragment::Parameter(p) => p.dump(out),
            Fragment::BracedExpansion { param, op, word } => {
                if *op == ExpansionOp::None {
                    tag(op.element(), out, |o| param.dump(o));
                } else {
                    tag(op.element(), out, |o| {
                        param.dump(o);
                        if let Some(w) = word {
                            w.dump(o);
                        }
                    });
                }
            }
            Fragment::CommandExpansion(cmds) => {
                tag("command_expansion", out, |o| dump_all(cmds, o));
            }
            Fragment::Backquote(parts) => tag("backquote", out, |o| {
                for p in parts {
                    match p {
                        BackquotePart::Text(text) => esc(text, o),
                        BackquotePart::DoubleBackquote(text) => {
                            tag("double_backquote", o, |o| esc(text, o));
                        }
                    }
                }
            }),
            Fragment::ArithmeticExpansion(w) => tag("arithmetic_expansion", out, |o| w.dump(o)),
        }
    }
}
