//! Recursive-descent parser for the POSIX shell command language subset.
//!
//! The grammar covers lists (`;`, `&`, `&&`, `||`), pipelines, simple
//! commands with assignment/redirect prefixes, the compound commands
//! (`{ }`, `( )`, `for`, `case`, `while`, `until`, `if`, function
//! definitions), I/O redirection, and the full word sub-grammar (quoting,
//! escapes, parameter expansion with operators, command substitution,
//! arithmetic expansion). Here-documents are recognized and rejected with
//! a distinct [`UnimplementedError`].

use super::tree::{
    BackquotePart, CaseItem, DquotePart, ExpansionOp, Fragment, Node, Param, RedirectKind,
    SyntaxTree, Word,
};
use crate::error::{ParseError, SyntaxError, UnimplementedError};

/// Parse a command-line string into a syntax tree.
pub fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
    let mut p = Parser {
        chars: source.chars().collect(),
        pos: 0,
    };
    let commands = p.parse_program_body(None)?;
    if !p.at_end() {
        return Err(p.err("expected end of input").into());
    }
    Ok(SyntaxTree::new(Node::Program(commands)))
}

/// Words that terminate a list when found in command position.
const TERMINATOR_WORDS: &[&str] = &["do", "done", "then", "elif", "else", "fi", "esac", "in", "}"];

/// Characters that end an unquoted word.
fn is_meta(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '|' | '&' | ';' | '(' | ')' | '<' | '>')
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    // ── low-level scanning ──

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn err(&self, message: &str) -> SyntaxError {
        SyntaxError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    /// Skip spaces, tabs, line continuations and comments. Never consumes
    /// a newline.
    fn skip_blanks(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t') => {
                    self.pos += 1;
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Skip blanks and newlines.
    fn skip_linebreaks(&mut self) {
        loop {
            self.skip_blanks();
            if self.peek() == Some('\n') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// If the upcoming token is a plain unquoted word (no quotes, escapes
    /// or expansions), return it without consuming.
    fn peek_plain_word(&self) -> Option<String> {
        let mut i = self.pos;
        let mut word = String::new();
        while let Some(&c) = self.chars.get(i) {
            if is_meta(c) {
                break;
            }
            if matches!(c, '\'' | '"' | '\\' | '$' | '`') {
                return None;
            }
            word.push(c);
            i += 1;
        }
        if word.is_empty() { None } else { Some(word) }
    }

    /// Consume the upcoming plain word if it equals `expected`.
    fn eat_word(&mut self, expected: &str) -> bool {
        if self.peek_plain_word().as_deref() == Some(expected) {
            self.pos += expected.chars().count();
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<(), ParseError> {
        self.skip_linebreaks();
        if self.eat_word(expected) {
            Ok(())
        } else {
            Err(self.err(&format!("expected \"{expected}\"")).into())
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected \"{expected}\"")).into())
        }
    }

    fn at_terminator_word(&self) -> bool {
        match self.peek_plain_word() {
            Some(w) => TERMINATOR_WORDS.contains(&w.as_str()),
            None => false,
        }
    }

    fn at_double_semi(&self) -> bool {
        self.peek() == Some(';') && self.peek_at(1) == Some(';')
    }

    // ── program / list structure ──

    /// Parse a sequence of complete commands up to `end` (a closing
    /// delimiter such as `)`) or end of input.
    fn parse_program_body(&mut self, end: Option<char>) -> Result<Vec<Node>, ParseError> {
        let mut commands = Vec::new();
        loop {
            self.skip_linebreaks();
            if self.at_end() || (end.is_some() && self.peek() == end) {
                break;
            }
            commands.push(self.parse_complete_command(end)?);
        }
        Ok(commands)
    }

    /// One newline-terminated command line. Wraps multiple `;`/`&`
    /// separated items in a single `list` node.
    fn parse_complete_command(&mut self, end: Option<char>) -> Result<Node, ParseError> {
        let mut items = Vec::new();
        let mut chains = 0usize;
        loop {
            self.skip_blanks();
            match self.peek() {
                None | Some('\n') => break,
                c if end.is_some() && c == end => break,
                _ => {}
            }
            if self.at_double_semi() {
                return Err(self.err("unexpected \";;\"").into());
            }
            if self.at_terminator_word() {
                let w = self.peek_plain_word().unwrap_or_default();
                return Err(self.err(&format!("unexpected \"{w}\"")).into());
            }
            let chain = self.parse_and_or()?;
            chains += 1;
            self.skip_blanks();
            match self.peek() {
                Some('&') if self.peek_at(1) != Some('&') => {
                    self.pos += 1;
                    items.push(Node::Background(chain));
                }
                Some(';') if self.peek_at(1) != Some(';') => {
                    self.pos += 1;
                    items.extend(chain);
                }
                _ => {
                    items.extend(chain);
                    break;
                }
            }
        }
        if chains == 0 {
            return Err(self.err("expected a command").into());
        }
        let children = if chains > 1 {
            vec![Node::List(items)]
        } else {
            items
        };
        Ok(Node::CompleteCommand(children))
    }

    /// A compound-command body: items separated by `;`, `&` or newlines,
    /// flattened, terminated by a closing token left unconsumed.
    fn parse_compound_list(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_linebreaks();
            if self.at_end()
                || matches!(self.peek(), Some(')' | '}'))
                || self.at_double_semi()
                || self.at_terminator_word()
            {
                break;
            }
            let chain = self.parse_and_or()?;
            self.skip_blanks();
            match self.peek() {
                Some('&') if self.peek_at(1) != Some('&') => {
                    self.pos += 1;
                    items.push(Node::Background(chain));
                }
                Some(';') if self.peek_at(1) != Some(';') => {
                    self.pos += 1;
                    items.extend(chain);
                }
                _ => {
                    items.extend(chain);
                    // A newline continues the list; anything else must be
                    // a terminator checked at the top of the loop.
                }
            }
        }
        Ok(items)
    }

    /// One and/or chain, flattened: the first pipeline's nodes followed by
    /// `and_if`/`or_if` wrappers for each subsequent element.
    fn parse_and_or(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut out = self.parse_pipeline_seq()?;
        loop {
            self.skip_blanks();
            match (self.peek(), self.peek_at(1)) {
                (Some('&'), Some('&')) => {
                    self.pos += 2;
                    self.skip_linebreaks();
                    out.push(Node::AndIf(self.parse_pipeline_seq()?));
                }
                (Some('|'), Some('|')) => {
                    self.pos += 2;
                    self.skip_linebreaks();
                    out.push(Node::OrIf(self.parse_pipeline_seq()?));
                }
                _ => break,
            }
        }
        Ok(out)
    }

    /// A possibly-negated pipeline. Returns the flattened node sequence
    /// (a compound command may carry trailing redirect siblings).
    fn parse_pipeline_seq(&mut self) -> Result<Vec<Node>, ParseError> {
        self.skip_blanks();
        let bang = self.eat_word("!");
        if bang {
            self.skip_blanks();
        }
        let mut elements = vec![self.parse_command()?];
        loop {
            self.skip_blanks();
            if self.peek() == Some('|') && self.peek_at(1) != Some('|') {
                self.pos += 1;
                self.skip_linebreaks();
                elements.push(self.parse_command()?);
            } else {
                break;
            }
        }
        let seq = if elements.len() > 1 {
            vec![Node::Pipeline(elements.into_iter().flatten().collect())]
        } else {
            elements.pop().unwrap_or_default()
        };
        Ok(if bang { vec![Node::Bang(seq)] } else { seq })
    }

    // ── commands ──

    /// One command: simple or compound. Compound commands may be followed
    /// by redirects, returned as trailing siblings (except for function
    /// definitions, which embed them).
    fn parse_command(&mut self) -> Result<Vec<Node>, ParseError> {
        self.skip_blanks();
        if self.peek() == Some('(') {
            self.pos += 1;
            let items = self.parse_compound_list()?;
            self.skip_linebreaks();
            self.expect_char(')')?;
            return self.with_trailing_redirects(Node::Subshell(items));
        }
        if let Some(word) = self.peek_plain_word() {
            match word.as_str() {
                "{" => {
                    self.pos += 1;
                    let items = self.parse_compound_list()?;
                    self.expect_word("}")?;
                    return self.with_trailing_redirects(Node::BraceGroup(items));
                }
                "for" => {
                    let node = self.parse_for()?;
                    return self.with_trailing_redirects(node);
                }
                "case" => {
                    let node = self.parse_case()?;
                    return self.with_trailing_redirects(node);
                }
                "if" => {
                    let node = self.parse_if()?;
                    return self.with_trailing_redirects(node);
                }
                "while" | "until" => {
                    let node = self.parse_loop(word == "while")?;
                    return self.with_trailing_redirects(node);
                }
                w if TERMINATOR_WORDS.contains(&w) => {
                    return Err(self.err(&format!("unexpected \"{w}\"")).into());
                }
                _ => {
                    if let Some(node) = self.try_parse_function(&word)? {
                        return Ok(vec![node]);
                    }
                }
            }
        }
        Ok(vec![self.parse_simple_command()?])
    }

    fn with_trailing_redirects(&mut self, node: Node) -> Result<Vec<Node>, ParseError> {
        let mut nodes = vec![node];
        loop {
            self.skip_blanks();
            match self.try_parse_redirect()? {
                Some(r) => nodes.push(r),
                None => break,
            }
        }
        Ok(nodes)
    }

    /// `name() compound-command [redirects]`, detected by lookahead.
    fn try_parse_function(&mut self, word: &str) -> Result<Option<Node>, ParseError> {
        if !word.starts_with(is_name_start) || !word.chars().all(is_name_char) {
            return Ok(None);
        }
        let mut i = self.pos + word.chars().count();
        while matches!(self.chars.get(i), Some(' ' | '\t')) {
            i += 1;
        }
        if self.chars.get(i) != Some(&'(') {
            return Ok(None);
        }
        i += 1;
        while matches!(self.chars.get(i), Some(' ' | '\t')) {
            i += 1;
        }
        if self.chars.get(i) != Some(&')') {
            return Ok(None);
        }
        self.pos = i + 1;
        self.skip_linebreaks();
        let mut nodes = self.parse_command()?;
        let body = nodes.remove(0);
        if matches!(body, Node::SimpleCommand { .. }) {
            return Err(self.err("expected a compound command").into());
        }
        Ok(Some(Node::FunctionDefinition {
            name: word.to_string(),
            body: Box::new(body),
            redirects: nodes,
        }))
    }

    fn parse_for(&mut self) -> Result<Node, ParseError> {
        self.eat_word("for");
        self.skip_blanks();
        let var = self
            .peek_plain_word()
            .filter(|w| w.starts_with(is_name_start) && w.chars().all(is_name_char))
            .ok_or_else(|| self.err("expected a variable name"))?;
        self.pos += var.chars().count();
        self.skip_blanks();
        let in_words = match self.peek() {
            Some(';') => {
                self.pos += 1;
                None
            }
            Some('\n') => None,
            _ if self.peek_plain_word().as_deref() == Some("in") => {
                self.pos += 2;
                let mut words = Vec::new();
                loop {
                    self.skip_blanks();
                    match self.peek() {
                        Some(';') => {
                            self.pos += 1;
                            break;
                        }
                        Some('\n') | None => break,
                        _ => words.push(self.parse_word(false)?),
                    }
                }
                Some(words)
            }
            _ => return Err(self.err("expected \";\", a newline or \"in\"").into()),
        };
        self.expect_word("do")?;
        let body = self.parse_compound_list()?;
        self.expect_word("done")?;
        Ok(Node::For {
            var,
            in_words,
            body,
        })
    }

    fn parse_case(&mut self) -> Result<Node, ParseError> {
        self.eat_word("case");
        self.skip_blanks();
        let subject = self.parse_word(false)?;
        self.expect_word("in")?;
        let mut items = Vec::new();
        loop {
            self.skip_linebreaks();
            if self.eat_word("esac") {
                break;
            }
            if self.at_end() {
                return Err(self.err("expected \"esac\"").into());
            }
            if self.peek() == Some('(') {
                self.pos += 1;
                self.skip_blanks();
            }
            let mut patterns = vec![self.parse_word(false)?];
            loop {
                self.skip_blanks();
                if self.peek() == Some('|') && self.peek_at(1) != Some('|') {
                    self.pos += 1;
                    self.skip_blanks();
                    patterns.push(self.parse_word(false)?);
                } else {
                    break;
                }
            }
            self.expect_char(')')?;
            let consequent = self.parse_compound_list()?;
            self.skip_linebreaks();
            if self.at_double_semi() {
                self.pos += 2;
            }
            items.push(CaseItem {
                patterns,
                consequent,
            });
        }
        Ok(Node::Case { subject, items })
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        self.eat_word("if");
        let mut arms = Vec::new();
        let cond = self.parse_compound_list()?;
        self.expect_word("then")?;
        let body = self.parse_compound_list()?;
        arms.push((cond, body));
        let mut else_body = None;
        loop {
            self.skip_linebreaks();
            if self.eat_word("elif") {
                let cond = self.parse_compound_list()?;
                self.expect_word("then")?;
                let body = self.parse_compound_list()?;
                arms.push((cond, body));
            } else if self.eat_word("else") {
                else_body = Some(self.parse_compound_list()?);
            } else {
                break;
            }
        }
        self.expect_word("fi")?;
        Ok(Node::If { arms, else_body })
    }

    fn parse_loop(&mut self, is_while: bool) -> Result<Node, ParseError> {
        self.eat_word(if is_while { "while" } else { "until" });
        let condition = self.parse_compound_list()?;
        self.expect_word("do")?;
        let body = self.parse_compound_list()?;
        self.expect_word("done")?;
        Ok(if is_while {
            Node::While { condition, body }
        } else {
            Node::Until { condition, body }
        })
    }

    /// Simple command: assignment/redirect prefix, then words and
    /// redirects in source order.
    fn parse_simple_command(&mut self) -> Result<Node, ParseError> {
        let mut prefix = Vec::new();
        let mut suffix = Vec::new();
        loop {
            self.skip_blanks();
            if let Some(r) = self.try_parse_redirect()? {
                if suffix.is_empty() {
                    prefix.push(r);
                } else {
                    suffix.push(r);
                }
                continue;
            }
            if suffix.is_empty() {
                if let Some(a) = self.try_parse_assignment()? {
                    prefix.push(a);
                    continue;
                }
            }
            match self.peek() {
                Some(c) if !is_meta(c) => suffix.push(Node::Word(self.parse_word(false)?)),
                _ => break,
            }
        }
        if prefix.is_empty() && suffix.is_empty() {
            return Err(self.err("expected a command").into());
        }
        Ok(Node::SimpleCommand { prefix, suffix })
    }

    /// `name=value` in prefix position, where `name` is a valid variable
    /// name directly followed by `=`.
    fn try_parse_assignment(&mut self) -> Result<Option<Node>, ParseError> {
        let start = self.pos;
        let mut i = self.pos;
        match self.chars.get(i) {
            Some(&c) if is_name_start(c) => i += 1,
            _ => return Ok(None),
        }
        while matches!(self.chars.get(i), Some(&c) if is_name_char(c)) {
            i += 1;
        }
        if self.chars.get(i) != Some(&'=') {
            return Ok(None);
        }
        let name: String = self.chars[start..i].iter().collect();
        self.pos = i + 1;
        let value = match self.peek() {
            Some(c) if !is_meta(c) => self.parse_word(false)?,
            _ => Word::default(),
        };
        Ok(Some(Node::Assignment { name, value }))
    }

    // ── redirects ──

    fn try_parse_redirect(&mut self) -> Result<Option<Node>, ParseError> {
        let start = self.pos;
        let mut i = self.pos;
        while matches!(self.chars.get(i), Some(c) if c.is_ascii_digit()) {
            i += 1;
        }
        let subject = if i > self.pos && matches!(self.chars.get(i), Some('<' | '>')) {
            let fd: String = self.chars[self.pos..i].iter().collect();
            self.pos = i;
            Some(fd)
        } else {
            None
        };
        let kind = match (self.peek(), self.peek_at(1)) {
            (Some('<'), Some('<')) => {
                // `<<` / `<<-`: recognized but never interpreted.
                return Err(UnimplementedError {
                    message: "here-document".to_string(),
                }
                .into());
            }
            (Some('<'), Some('&')) => {
                self.pos += 2;
                RedirectKind::DuplicateInput
            }
            (Some('<'), _) => {
                self.pos += 1;
                RedirectKind::Input
            }
            (Some('>'), Some('>')) => {
                self.pos += 2;
                RedirectKind::AppendOutput
            }
            (Some('>'), Some('&')) => {
                self.pos += 2;
                RedirectKind::DuplicateOutput
            }
            (Some('>'), Some('|')) => {
                self.pos += 2;
                RedirectKind::Clobber
            }
            (Some('>'), _) => {
                self.pos += 1;
                RedirectKind::Output
            }
            _ => {
                self.pos = start;
                return Ok(None);
            }
        };
        self.skip_blanks();
        match self.peek() {
            Some(c) if !is_meta(c) => {}
            _ => return Err(self.err("expected a redirect target").into()),
        }
        let target = self.parse_word(false)?;
        Ok(Some(Node::IoRedirect {
            subject,
            kind,
            target,
        }))
    }

    // ── words ──

    /// Parse one word. When `in_braces` is set, `}` also terminates the
    /// word (used inside `${...}` operator arguments).
    fn parse_word(&mut self, in_braces: bool) -> Result<Word, ParseError> {
        let mut fragments: Vec<Fragment> = Vec::new();
        let mut literal = String::new();
        loop {
            let c = match self.peek() {
                Some(c) if !is_meta(c) && !(in_braces && c == '}') => c,
                _ => break,
            };
            match c {
                '\'' => {
                    flush_literal(&mut fragments, &mut literal);
                    self.pos += 1;
                    let mut text = String::new();
                    loop {
                        match self.bump() {
                            Some('\'') => break,
                            Some(c) => text.push(c),
                            None => return Err(self.err("unterminated single quote").into()),
                        }
                    }
                    fragments.push(Fragment::SingleQuote(text));
                }
                '"' => {
                    flush_literal(&mut fragments, &mut literal);
                    fragments.push(self.parse_double_quote()?);
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('\n') => {
                            self.pos += 1;
                        }
                        Some(c) => {
                            flush_literal(&mut fragments, &mut literal);
                            self.pos += 1;
                            fragments.push(Fragment::BareEscape(c));
                        }
                        None => {
                            return Err(self.err("expected a character after backslash").into());
                        }
                    }
                }
                '$' => {
                    flush_literal(&mut fragments, &mut literal);
                    fragments.push(self.parse_dollar()?);
                }
                '`' => {
                    flush_literal(&mut fragments, &mut literal);
                    fragments.push(self.parse_backquote()?);
                }
                _ => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }
        flush_literal(&mut fragments, &mut literal);
        if fragments.is_empty() {
            return Err(self.err("expected a word").into());
        }
        Ok(Word(fragments))
    }

    fn parse_double_quote(&mut self) -> Result<Fragment, ParseError> {
        self.pos += 1; // opening "
        let mut parts: Vec<DquotePart> = Vec::new();
        let mut literal = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated double quote").into()),
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => match self.peek_at(1) {
                    Some('\n') => {
                        self.pos += 2;
                    }
                    Some(c @ ('$' | '`' | '"' | '\\')) => {
                        if !literal.is_empty() {
                            parts.push(DquotePart::Literal(std::mem::take(&mut literal)));
                        }
                        self.pos += 2;
                        parts.push(DquotePart::Escape(c));
                    }
                    _ => {
                        // Backslash before anything else is literal.
                        literal.push('\\');
                        self.pos += 1;
                    }
                },
                Some('$') => {
                    if !literal.is_empty() {
                        parts.push(DquotePart::Literal(std::mem::take(&mut literal)));
                    }
                    let f = self.parse_dollar()?;
                    parts.push(DquotePart::Expansion(f));
                }
                Some('`') => {
                    if !literal.is_empty() {
                        parts.push(DquotePart::Literal(std::mem::take(&mut literal)));
                    }
                    let f = self.parse_backquote()?;
                    parts.push(DquotePart::Expansion(f));
                }
                Some(c) => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }
        if !literal.is_empty() {
            parts.push(DquotePart::Literal(literal));
        }
        Ok(Fragment::DoubleQuote(parts))
    }

    /// `$name`, `$1`, `$@`, `${...}`, `$(...)`, `$((...))`. A `$` followed
    /// by nothing recognizable stays a literal dollar sign.
    fn parse_dollar(&mut self) -> Result<Fragment, ParseError> {
        self.pos += 1; // $
        match self.peek() {
            Some('(') if self.peek_at(1) == Some('(') => {
                self.pos += 2;
                self.parse_arithmetic()
            }
            Some('(') => {
                self.pos += 1;
                let commands = self.parse_program_body(Some(')'))?;
                self.expect_char(')')?;
                Ok(Fragment::CommandExpansion(commands))
            }
            Some('{') => {
                self.pos += 1;
                self.parse_braced_expansion()
            }
            Some(c) if is_name_start(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    if is_name_char(c) {
                        name.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(Fragment::Parameter(Param::Named(name)))
            }
            Some('0') => {
                self.pos += 1;
                Ok(Fragment::Parameter(Param::Special('0')))
            }
            Some(c) if c.is_ascii_digit() => {
                self.pos += 1;
                Ok(Fragment::Parameter(Param::Positional(c.to_string())))
            }
            Some(c @ ('@' | '*' | '#' | '?' | '-' | '$' | '!')) => {
                self.pos += 1;
                Ok(Fragment::Parameter(Param::Special(c)))
            }
            _ => Ok(Fragment::Literal("$".to_string())),
        }
    }

    /// `$(( ... ))`, captured as an opaque literal word.
    fn parse_arithmetic(&mut self) -> Result<Fragment, ParseError> {
        let mut content = String::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated arithmetic expansion").into()),
                Some('(') => {
                    depth += 1;
                    content.push('(');
                    self.pos += 1;
                }
                Some(')') if depth == 0 && self.peek_at(1) == Some(')') => {
                    self.pos += 2;
                    break;
                }
                Some(')') if depth > 0 => {
                    depth -= 1;
                    content.push(')');
                    self.pos += 1;
                }
                Some(c) => {
                    content.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(Fragment::ArithmeticExpansion(Word(vec![Fragment::Literal(
            content,
        )])))
    }

    fn parse_braced_expansion(&mut self) -> Result<Fragment, ParseError> {
        // ${#} is the special parameter; ${#name} is string length.
        if self.peek() == Some('#') && self.peek_at(1) != Some('}') {
            self.pos += 1;
            let param = self.parse_braced_param()?;
            self.expect_char('}')?;
            return Ok(Fragment::BracedExpansion {
                param,
                op: ExpansionOp::StringLength,
                word: None,
            });
        }
        let param = self.parse_braced_param()?;
        let op = match (self.peek(), self.peek_at(1)) {
            (Some('}'), _) => {
                self.pos += 1;
                return Ok(Fragment::BracedExpansion {
                    param,
                    op: ExpansionOp::None,
                    word: None,
                });
            }
            (Some(':'), Some('-')) => {
                self.pos += 2;
                ExpansionOp::UseDefault
            }
            (Some(':'), Some('=')) => {
                self.pos += 2;
                ExpansionOp::AssignDefault
            }
            (Some(':'), Some('?')) => {
                self.pos += 2;
                ExpansionOp::IndicateError
            }
            (Some(':'), Some('+')) => {
                self.pos += 2;
                ExpansionOp::UseAlternative
            }
            (Some('-'), _) => {
                self.pos += 1;
                ExpansionOp::UseDefaultUnset
            }
            (Some('='), _) => {
                self.pos += 1;
                ExpansionOp::AssignDefaultUnset
            }
            (Some('?'), _) => {
                self.pos += 1;
                ExpansionOp::IndicateErrorUnset
            }
            (Some('+'), _) => {
                self.pos += 1;
                ExpansionOp::UseAlternativeUnset
            }
            (Some('%'), Some('%')) => {
                self.pos += 2;
                ExpansionOp::RemoveLargestSuffix
            }
            (Some('%'), _) => {
                self.pos += 1;
                ExpansionOp::RemoveSmallestSuffix
            }
            (Some('#'), Some('#')) => {
                self.pos += 2;
                ExpansionOp::RemoveLargestPrefix
            }
            (Some('#'), _) => {
                self.pos += 1;
                ExpansionOp::RemoveSmallestPrefix
            }
            _ => return Err(self.err("expected a parameter expansion operator").into()),
        };
        // Blanks are allowed after the operator but not before it.
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
        let word = if self.peek() == Some('}') {
            None
        } else {
            Some(self.parse_word(true)?)
        };
        self.expect_char('}')?;
        Ok(Fragment::BracedExpansion { param, op, word })
    }

    fn parse_braced_param(&mut self) -> Result<Param, ParseError> {
        match self.peek() {
            Some(c) if is_name_start(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    if is_name_char(c) {
                        name.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(Param::Named(name))
            }
            Some(c) if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(Param::Positional(digits))
            }
            Some(c @ ('@' | '*' | '#' | '?' | '-' | '$' | '!')) => {
                self.pos += 1;
                Ok(Param::Special(c))
            }
            _ => Err(self.err("expected a parameter name").into()),
        }
    }

    /// `` `...` ``: content opaque, with `` \`...\` `` nesting captured as
    /// double-backquote spans.
    fn parse_backquote(&mut self) -> Result<Fragment, ParseError> {
        self.pos += 1; // opening `
        let mut parts: Vec<BackquotePart> = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated backquote").into()),
                Some('`') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') if self.peek_at(1) == Some('`') => {
                    if !text.is_empty() {
                        parts.push(BackquotePart::Text(std::mem::take(&mut text)));
                    }
                    self.pos += 2;
                    let mut inner = String::new();
                    loop {
                        match self.peek() {
                            None => return Err(self.err("unterminated backquote").into()),
                            Some('\\') if self.peek_at(1) == Some('`') => {
                                self.pos += 2;
                                break;
                            }
                            Some(c) => {
                                inner.push(c);
                                self.pos += 1;
                            }
                        }
                    }
                    parts.push(BackquotePart::DoubleBackquote(inner));
                }
                Some('\\') => {
                    text.push('\\');
                    self.pos += 1;
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        if !text.is_empty() {
            parts.push(BackquotePart::Text(text));
        }
        Ok(Fragment::Backquote(parts))
    }
}

fn flush_literal(fragments: &mut Vec<Fragment>, literal: &mut String) {
    if !literal.is_empty() {
        fragments.push(Fragment::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse and dump, or a marker for the expected failure kind.
    fn dump(input: &str) -> String {
        match parse(input) {
            Ok(tree) => tree.dump(),
            Err(ParseError::Syntax(e)) => format!("SyntaxError: {}", e.message),
            Err(ParseError::Unimplemented(e)) => format!("UnimplementedError: {}", e.message),
        }
    }

    macro_rules! parse_test {
        ($name:ident, $input:expr, $expected:expr) => {
            #[test]
            fn $name() {
                let got = dump($input);
                if $expected == "SyntaxError" || $expected == "UnimplementedError" {
                    assert!(
                        got.starts_with($expected),
                        "input {:?}: expected {} but got {}",
                        $input,
                        $expected,
                        got
                    );
                } else {
                    assert_eq!(got, $expected, "input: {:?}", $input);
                }
            }
        };
    }

    parse_test!(empty, "", "<program></program>");
    parse_test!(
        one_word,
        "a",
        "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></complete_command></program>"
    );
    parse_test!(
        three_words,
        "a b c",
        "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word><word><unquoted_literal>b</unquoted_literal></word><word><unquoted_literal>c</unquoted_literal></word></simple_command></complete_command></program>"
    );
    parse_test!(
        comment,
        "a # |b",
        "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></complete_command></program>"
    );
    parse_test!(
        double_quote,
        "\"a\"",
        "<program><complete_command><simple_command><word><double_quote>a</double_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        single_quote,
        "'a'",
        "<program><complete_command><simple_command><word><single_quote>a</single_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        quote_escape_quote,
        "'a'\\''a'",
        "<program><complete_command><simple_command><word><single_quote>a</single_quote><bare_escape>'</bare_escape><single_quote>a</single_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dquote_escapes,
        "\"a\\\"\\b\"",
        "<program><complete_command><simple_command><word><double_quote>a<dquoted_escape>&quot;</dquoted_escape>\\b</double_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        bare_escape,
        "\\a",
        "<program><complete_command><simple_command><word><bare_escape>a</bare_escape></word></simple_command></complete_command></program>"
    );
    parse_test!(
        backquote,
        "`cmd`",
        "<program><complete_command><simple_command><word><backquote>cmd</backquote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        nested_backquote,
        "`a \\`b\\` c`",
        "<program><complete_command><simple_command><word><backquote>a <double_backquote>b</double_backquote> c</backquote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        named_param,
        "$a",
        "<program><complete_command><simple_command><word><named_parameter>a</named_parameter></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dollar_zero,
        "$0",
        "<program><complete_command><simple_command><word><special_parameter>0</special_parameter></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dollar_one,
        "$1",
        "<program><complete_command><simple_command><word><positional_parameter>1</positional_parameter></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dollar_at,
        "$@",
        "<program><complete_command><simple_command><word><special_parameter>@</special_parameter></word></simple_command></complete_command></program>"
    );
    parse_test!(
        named_param_multi,
        "$aa",
        "<program><complete_command><simple_command><word><named_parameter>aa</named_parameter></word></simple_command></complete_command></program>"
    );
    parse_test!(
        braced_positional,
        "${11}",
        "<program><complete_command><simple_command><word><braced_parameter_expansion><positional_parameter>11</positional_parameter></braced_parameter_expansion></word></simple_command></complete_command></program>"
    );
    parse_test!(
        braced_named,
        "${aa}",
        "<program><complete_command><simple_command><word><braced_parameter_expansion><named_parameter>aa</named_parameter></braced_parameter_expansion></word></simple_command></complete_command></program>"
    );
    parse_test!(
        use_default_empty,
        "${a:-}",
        "<program><complete_command><simple_command><word><use_default><named_parameter>a</named_parameter></use_default></word></simple_command></complete_command></program>"
    );
    parse_test!(
        use_default,
        "${a:-w}",
        "<program><complete_command><simple_command><word><use_default><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></use_default></word></simple_command></complete_command></program>"
    );
    parse_test!(
        assign_default_empty,
        "${a:=}",
        "<program><complete_command><simple_command><word><assign_default><named_parameter>a</named_parameter></assign_default></word></simple_command></complete_command></program>"
    );
    parse_test!(
        assign_default,
        "${a:=w}",
        "<program><complete_command><simple_command><word><assign_default><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></assign_default></word></simple_command></complete_command></program>"
    );
    parse_test!(space_before_operator, "${a := w}", "SyntaxError");
    parse_test!(
        space_after_operator,
        "${a:= w}",
        "<program><complete_command><simple_command><word><assign_default><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></assign_default></word></simple_command></complete_command></program>"
    );
    parse_test!(
        assign_default_param,
        "${a:=$w}",
        "<program><complete_command><simple_command><word><assign_default><named_parameter>a</named_parameter><word><named_parameter>w</named_parameter></word></assign_default></word></simple_command></complete_command></program>"
    );
    parse_test!(
        indicate_error_empty,
        "${a:?}",
        "<program><complete_command><simple_command><word><indicate_error><named_parameter>a</named_parameter></indicate_error></word></simple_command></complete_command></program>"
    );
    parse_test!(
        indicate_error,
        "${a:?w}",
        "<program><complete_command><simple_command><word><indicate_error><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></indicate_error></word></simple_command></complete_command></program>"
    );
    parse_test!(
        use_alternative_empty,
        "${a:+}",
        "<program><complete_command><simple_command><word><use_alternative><named_parameter>a</named_parameter></use_alternative></word></simple_command></complete_command></program>"
    );
    parse_test!(
        use_alternative,
        "${a:+w}",
        "<program><complete_command><simple_command><word><use_alternative><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></use_alternative></word></simple_command></complete_command></program>"
    );
    parse_test!(
        use_default_unset,
        "${a-w}",
        "<program><complete_command><simple_command><word><use_default_unset><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></use_default_unset></word></simple_command></complete_command></program>"
    );
    parse_test!(
        assign_default_unset,
        "${a=w}",
        "<program><complete_command><simple_command><word><assign_default_unset><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></assign_default_unset></word></simple_command></complete_command></program>"
    );
    parse_test!(space_before_unset_operator, "${a = w}", "SyntaxError");
    parse_test!(
        indicate_error_unset,
        "${a?w}",
        "<program><complete_command><simple_command><word><indicate_error_unset><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></indicate_error_unset></word></simple_command></complete_command></program>"
    );
    parse_test!(
        use_alternative_unset,
        "${a+w}",
        "<program><complete_command><simple_command><word><use_alternative_unset><named_parameter>a</named_parameter><word><unquoted_literal>w</unquoted_literal></word></use_alternative_unset></word></simple_command></complete_command></program>"
    );
    parse_test!(
        string_length,
        "${#a}",
        "<program><complete_command><simple_command><word><string_length><named_parameter>a</named_parameter></string_length></word></simple_command></complete_command></program>"
    );
    parse_test!(
        positional_assign_unset,
        "${11=}",
        "<program><complete_command><simple_command><word><assign_default_unset><positional_parameter>11</positional_parameter></assign_default_unset></word></simple_command></complete_command></program>"
    );
    parse_test!(
        arithmetic,
        "$((1+2))",
        "<program><complete_command><simple_command><word><arithmetic_expansion><word><unquoted_literal>1+2</unquoted_literal></word></arithmetic_expansion></word></simple_command></complete_command></program>"
    );
    parse_test!(
        command_expansion,
        "$(cmd)",
        "<program><complete_command><simple_command><word><command_expansion><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word></simple_command></complete_command></command_expansion></word></simple_command></complete_command></program>"
    );
    parse_test!(
        nested_command_expansion,
        "$( $(cmd) )",
        "<program><complete_command><simple_command><word><command_expansion><complete_command><simple_command><word><command_expansion><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word></simple_command></complete_command></command_expansion></word></simple_command></complete_command></command_expansion></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dquoted_param,
        "\"$a\"",
        "<program><complete_command><simple_command><word><double_quote><named_parameter>a</named_parameter></double_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dquoted_backquote,
        "\"`cmd`\"",
        "<program><complete_command><simple_command><word><double_quote><backquote>cmd</backquote></double_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(
        dquoted_command_expansion,
        "\"$(cmd)\"",
        "<program><complete_command><simple_command><word><double_quote><command_expansion><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word></simple_command></complete_command></command_expansion></double_quote></word></simple_command></complete_command></program>"
    );
    parse_test!(unterminated_subst_quote, "\"$(\")", "SyntaxError");
    parse_test!(unterminated_subst_quote2, "\"$(\")\"", "SyntaxError");
    parse_test!(
        redirect_out,
        "cmd>out",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><output><word><unquoted_literal>out</unquoted_literal></word></output></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        redirect_out_in,
        "cmd >out <in",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><output><word><unquoted_literal>out</unquoted_literal></word></output></io_redirect><io_redirect><input><word><unquoted_literal>in</unquoted_literal></word></input></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        fd_duplicate,
        "cmd 2>&1",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><io_subject>2</io_subject><duplicate_output><word><unquoted_literal>1</unquoted_literal></word></duplicate_output></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        fd_out,
        "cmd 2>out",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><io_subject>2</io_subject><output><word><unquoted_literal>out</unquoted_literal></word></output></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        redirect_prefix,
        ">out cmd",
        "<program><complete_command><simple_command><cmd_prefix><io_redirect><output><word><unquoted_literal>out</unquoted_literal></word></output></io_redirect></cmd_prefix><word><unquoted_literal>cmd</unquoted_literal></word></simple_command></complete_command></program>"
    );
    parse_test!(
        append,
        "cmd>>out",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><append_output><word><unquoted_literal>out</unquoted_literal></word></append_output></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        duplicate_input,
        "cmd <& f",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><duplicate_input><word><unquoted_literal>f</unquoted_literal></word></duplicate_input></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        duplicate_output,
        "cmd >& f",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><duplicate_output><word><unquoted_literal>f</unquoted_literal></word></duplicate_output></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        clobber,
        "cmd >| f",
        "<program><complete_command><simple_command><word><unquoted_literal>cmd</unquoted_literal></word><io_redirect><clobber><word><unquoted_literal>f</unquoted_literal></word></clobber></io_redirect></simple_command></complete_command></program>"
    );
    parse_test!(
        subshell,
        "(a)",
        "<program><complete_command><subshell><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></subshell></complete_command></program>"
    );
    parse_test!(
        list_with_subshell,
        "a; (b;c)",
        "<program><complete_command><list><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><subshell><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></subshell></list></complete_command></program>"
    );
    parse_test!(
        assignment_prefix,
        "a=b c",
        "<program><complete_command><simple_command><cmd_prefix><assignment><name>a</name><word><unquoted_literal>b</unquoted_literal></word></assignment></cmd_prefix><word><unquoted_literal>c</unquoted_literal></word></simple_command></complete_command></program>"
    );
    parse_test!(
        and_if,
        "a&&b",
        "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><and_if><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></and_if></complete_command></program>"
    );
    parse_test!(
        and_or,
        "a && b || c",
        "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><and_if><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></and_if><or_if><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></or_if></complete_command></program>"
    );
    parse_test!(
        bang_joined,
        "!a",
        "<program><complete_command><simple_command><word><unquoted_literal>!a</unquoted_literal></word></simple_command></complete_command></program>"
    );
    parse_test!(
        bang,
        "! a",
        "<program><complete_command><bang><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></bang></complete_command></program>"
    );
    parse_test!(
        pipeline,
        "a|b",
        "<program><complete_command><pipeline><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></pipeline></complete_command></program>"
    );
    parse_test!(
        and_then_pipeline,
        "a && b | c",
        "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><and_if><pipeline><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></pipeline></and_if></complete_command></program>"
    );
    parse_test!(
        pipeline_then_and,
        "a | b && c",
        "<program><complete_command><pipeline><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></pipeline><and_if><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></and_if></complete_command></program>"
    );
    parse_test!(
        background,
        "a&",
        "<program><complete_command><background><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></background></complete_command></program>"
    );
    parse_test!(
        background_then_command,
        "a&b",
        "<program><complete_command><list><background><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></background><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></list></complete_command></program>"
    );
    parse_test!(
        background_then_and_if,
        "a&b&&c",
        "<program><complete_command><list><background><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></background><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command><and_if><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></and_if></list></complete_command></program>"
    );
    parse_test!(
        double_background,
        "a&b&",
        "<program><complete_command><list><background><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></background><background><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></background></list></complete_command></program>"
    );
    parse_test!(
        background_trailing_semi,
        "a&b;",
        "<program><complete_command><list><background><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></background><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></list></complete_command></program>"
    );
    parse_test!(
        brace_group,
        "{ a; }",
        "<program><complete_command><brace_group><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></brace_group></complete_command></program>"
    );
    parse_test!(
        brace_group_newline,
        "{ a\n}",
        "<program><complete_command><brace_group><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></brace_group></complete_command></program>"
    );
    parse_test!(brace_group_no_separator, "{ a }", "SyntaxError");
    parse_test!(
        brace_group_redirect,
        "{ a; } >out",
        "<program><complete_command><brace_group><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></brace_group><io_redirect><output><word><unquoted_literal>out</unquoted_literal></word></output></io_redirect></complete_command></program>"
    );
    parse_test!(
        for_in,
        "for p in a; do b; done",
        "<program><complete_command><for>p<in><word><unquoted_literal>a</unquoted_literal></word></in><do><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></do></for></complete_command></program>"
    );
    parse_test!(
        for_in_empty,
        "for p in ; do b; done",
        "<program><complete_command><for>p<in></in><do><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></do></for></complete_command></program>"
    );
    parse_test!(
        for_no_in,
        "for p; do b; done",
        "<program><complete_command><for>p<do><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></do></for></complete_command></program>"
    );
    parse_test!(for_missing_separator, "for a do b done", "SyntaxError");
    parse_test!(bare_esac, "esac", "SyntaxError");
    parse_test!(
        for_background_body,
        "for p in a; do b & done",
        "<program><complete_command><for>p<in><word><unquoted_literal>a</unquoted_literal></word></in><do><background><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></background></do></for></complete_command></program>"
    );
    parse_test!(
        for_double_background_body,
        "for p in a; do b & c & done",
        "<program><complete_command><for>p<in><word><unquoted_literal>a</unquoted_literal></word></in><do><background><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></background><background><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></background></do></for></complete_command></program>"
    );
    parse_test!(
        case_items,
        "\n\t\t\t\tcase w in\n\t\t\t\t\tp1)\n\t\t\t\t\t\tx\n\t\t\t\t\t\t;;\n\t\t\t\t\tp2|p3)\n\t\t\t\t\t\tx\n\t\t\t\t\t\t;;\n\t\t\t\t\t(p4)\n\t\t\t\t\t\tx\n\t\t\t\t\t\t;;\n\t\t\t\tesac",
        "<program><complete_command><case><word><unquoted_literal>w</unquoted_literal></word><in><case_item><case_pattern><word><unquoted_literal>p1</unquoted_literal></word></case_pattern><case_consequent><simple_command><word><unquoted_literal>x</unquoted_literal></word></simple_command></case_consequent></case_item><case_item><case_pattern><word><unquoted_literal>p2</unquoted_literal></word><word><unquoted_literal>p3</unquoted_literal></word></case_pattern><case_consequent><simple_command><word><unquoted_literal>x</unquoted_literal></word></simple_command></case_consequent></case_item><case_item><case_pattern><word><unquoted_literal>p4</unquoted_literal></word></case_pattern><case_consequent><simple_command><word><unquoted_literal>x</unquoted_literal></word></simple_command></case_consequent></case_item></in></case></complete_command></program>"
    );
    parse_test!(
        case_last_item_no_dsemi,
        "\n\t\t\t\tcase w in\n\t\t\t\t\tp1)\n\t\t\t\t\t\tx\n\t\t\t\t\t\t;;\n\t\t\t\t\tp2|p3)\n\t\t\t\t\t\tx\n\t\t\t\t\t\t;;\n\t\t\t\t\t(p4)\n\t\t\t\t\t\tx\n\t\t\t\tesac",
        "<program><complete_command><case><word><unquoted_literal>w</unquoted_literal></word><in><case_item><case_pattern><word><unquoted_literal>p1</unquoted_literal></word></case_pattern><case_consequent><simple_command><word><unquoted_literal>x</unquoted_literal></word></simple_command></case_consequent></case_item><case_item><case_pattern><word><unquoted_literal>p2</unquoted_literal></word><word><unquoted_literal>p3</unquoted_literal></word></case_pattern><case_consequent><simple_command><word><unquoted_literal>x</unquoted_literal></word></simple_command></case_consequent></case_item><case_item><case_pattern><word><unquoted_literal>p4</unquoted_literal></word></case_pattern><case_consequent><simple_command><word><unquoted_literal>x</unquoted_literal></word></simple_command></case_consequent></case_item></in></case></complete_command></program>"
    );
    parse_test!(
        case_empty,
        "case w in\nesac",
        "<program><complete_command><case><word><unquoted_literal>w</unquoted_literal></word><in></in></case></complete_command></program>"
    );
    parse_test!(
        if_simple,
        "if a; then b; fi",
        "<program><complete_command><if><condition><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></condition><consequent><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></consequent></if></complete_command></program>"
    );
    parse_test!(
        if_else,
        "if a; then b; else c; fi",
        "<program><complete_command><if><condition><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></condition><consequent><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></consequent><else><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></else></if></complete_command></program>"
    );
    parse_test!(
        if_elif_else,
        "if a; then b; elif c; then d; else e; fi",
        "<program><complete_command><if><condition><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></condition><consequent><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></consequent><elif_condition><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></elif_condition><elif_consequent><simple_command><word><unquoted_literal>d</unquoted_literal></word></simple_command></elif_consequent><else><simple_command><word><unquoted_literal>e</unquoted_literal></word></simple_command></else></if></complete_command></program>"
    );
    parse_test!(if_missing_separator, "if a then b fi", "SyntaxError");
    parse_test!(
        while_loop,
        "while a; do b; done",
        "<program><complete_command><while><condition><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></condition><do><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></do></while></complete_command></program>"
    );
    parse_test!(
        until_loop,
        "until a; b; c; do d; e; done",
        "<program><complete_command><until><condition><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>c</unquoted_literal></word></simple_command></condition><do><simple_command><word><unquoted_literal>d</unquoted_literal></word></simple_command><simple_command><word><unquoted_literal>e</unquoted_literal></word></simple_command></do></until></complete_command></program>"
    );
    parse_test!(
        function_definition,
        "f() { a; }",
        "<program><complete_command><function_definition><function_name>f</function_name><brace_group><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></brace_group></function_definition></complete_command></program>"
    );
    parse_test!(
        function_definition_redirect,
        "f() { a; } >out",
        "<program><complete_command><function_definition><function_name>f</function_name><brace_group><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></brace_group><io_redirect><output><word><unquoted_literal>out</unquoted_literal></word></output></io_redirect></function_definition></complete_command></program>"
    );
    parse_test!(heredoc, "a<<END\nfoo\nEND\n", "UnimplementedError");
    parse_test!(heredoc_word, "a<<b", "UnimplementedError");
    parse_test!(heredoc_dash, "a<<-b", "UnimplementedError");
    parse_test!(heredoc_fd, "a 2<<-b", "UnimplementedError");

    #[test]
    fn newline_separates_complete_commands() {
        let tree = parse("a\nb").unwrap();
        assert_eq!(
            tree.dump(),
            "<program><complete_command><simple_command><word><unquoted_literal>a</unquoted_literal></word></simple_command></complete_command><complete_command><simple_command><word><unquoted_literal>b</unquoted_literal></word></simple_command></complete_command></program>"
        );
    }

    #[test]
    fn parse_is_idempotent() {
        for src in [
            "a && b | c",
            "for p in a b; do c & done",
            "x=1 cmd 'arg' \"v $y\" 2>&1",
            "case w in p) x;; esac",
        ] {
            let first = parse(src).unwrap().dump();
            let second = parse(src).unwrap().dump();
            assert_eq!(first, second, "source: {src:?}");
        }
    }

    #[test]
    fn syntax_error_reports_offset() {
        let err = parse("echo 'unterminated").unwrap_err();
        match err {
            ParseError::Syntax(e) => assert_eq!(e.offset, 18),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn line_continuation_joins_words() {
        let tree = parse("ab\\\ncd").unwrap();
        assert_eq!(
            tree.info().literal_argv(),
            Some(vec!["abcd".to_string()])
        );
    }
}
