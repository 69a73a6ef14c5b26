//! Scanner for declaration calls in Ruby manifests
//!
//! Finds `gem`, `pod` and `add_*dependency` calls and splits their
//! arguments into literals, symbols, arrays and hash options, keeping byte
//! spans so callers can splice replacements into the original text.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[A-Za-z_][A-Za-z0-9_]*\.)?(?P<method>[a-z_]+)(?P<gap>[ \t]*\(|[ \t]+)")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    /// String literal; `value` is the text between the delimiters
    Str {
        value: String,
        open: String,
        close: String,
    },
    Symbol(String),
    Array(Vec<Arg>),
    /// Variables, constants, method calls and interpolated strings
    Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub kind: ArgKind,
    pub span: Range<usize>,
}

impl Arg {
    /// Literal text of a string or symbol
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ArgKind::Str { value, .. } => Some(value),
            ArgKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Strings, or a list of them, flattened
    pub fn literal_strings(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ArgKind::Str { value, .. } => Some(vec![value.as_str()]),
            ArgKind::Array(items) => items
                .iter()
                .map(|i| match &i.kind {
                    ArgKind::Str { value, .. } => Some(value.as_str()),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// Symbols or strings, or a list of them
    pub fn names(&self) -> Vec<&str> {
        match &self.kind {
            ArgKind::Array(items) => items.iter().filter_map(Arg::as_str).collect(),
            _ => self.as_str().into_iter().collect(),
        }
    }

    pub fn is_expr(&self) -> bool {
        matches!(self.kind, ArgKind::Expr)
    }
}

/// `key: value` or `:key => value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOption {
    pub key: String,
    pub value: Arg,
    /// From the start of the key to the end of the value
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub method: String,
    pub name: Arg,
    /// Positional arguments after the name
    pub positional: Vec<Arg>,
    pub options: Vec<HashOption>,
    /// From the name to the end of the last argument
    pub args_span: Range<usize>,
}

impl Declaration {
    pub fn name(&self) -> Option<&str> {
        self.name.as_str()
    }

    pub fn option(&self, key: &str) -> Option<&Arg> {
        self.options.iter().find(|o| o.key == key).map(|o| &o.value)
    }

    pub fn string_option(&self, key: &str) -> Option<&str> {
        self.option(key).and_then(Arg::as_str)
    }

    /// The requirement strings, or `None` when any argument is not a
    /// string literal. A bare declaration gives an empty list.
    pub fn requirement_strings(&self) -> Option<Vec<&str>> {
        let mut strings = Vec::new();
        for arg in &self.positional {
            strings.extend(arg.literal_strings()?);
        }
        Some(strings)
    }
}

/// Every call to one of `methods` in `content`, in source order
pub fn find_declarations(content: &str, methods: &[&str]) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for caps in DECLARATION_RE.captures_iter(content) {
        let method = &caps["method"];
        if !methods.contains(&method) {
            continue;
        }
        let gap = caps.name("gap").map(|g| g.as_str()).unwrap_or_default();
        let Some(start) = caps.get(0).map(|m| m.end()) else {
            continue;
        };
        let mut scanner = Scanner::new(content, start);
        let Some(raw) = scanner.arguments(gap.ends_with('(')) else {
            continue;
        };
        if let Some(declaration) = build_declaration(method, raw) {
            declarations.push(declaration);
        }
    }
    declarations
}

/// Declarations of one dependency
pub fn declarations_for<'a>(
    declarations: &'a [Declaration],
    name: &'a str,
) -> impl Iterator<Item = &'a Declaration> {
    declarations.iter().filter(move |d| d.name() == Some(name))
}

struct RawArg {
    key: Option<String>,
    start: usize,
    value: Arg,
}

fn build_declaration(method: &str, raw: Vec<RawArg>) -> Option<Declaration> {
    let mut args = raw.into_iter();
    let first = args.next()?;
    if first.key.is_some() || first.value.as_str().is_none() {
        return None;
    }

    let mut end = first.value.span.end;
    let start = first.value.span.start;
    let mut positional = Vec::new();
    let mut options = Vec::new();
    for arg in args {
        end = arg.value.span.end;
        match arg.key {
            Some(key) => options.push(HashOption {
                key,
                span: arg.start..arg.value.span.end,
                value: arg.value,
            }),
            None => positional.push(arg.value),
        }
    }

    Some(Declaration {
        method: method.to_string(),
        name: first.value,
        positional,
        options,
        args_span: start..end,
    })
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_blank(&mut self, newlines: bool) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' => self.pos += 1,
                b'\n' | b'\r' if newlines => self.pos += 1,
                b'\\' if self.peek_at(1) == Some(b'\n') => self.pos += 2,
                b'#' if newlines => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn arguments(&mut self, parenthesised: bool) -> Option<Vec<RawArg>> {
        let mut args = Vec::new();
        let mut after_comma = false;
        loop {
            self.skip_blank(parenthesised || after_comma);
            match self.peek() {
                None | Some(b'\n') | Some(b'#') => break,
                Some(b')') if parenthesised => break,
                _ => {}
            }

            let start = self.pos;
            if let Some(key) = self.label() {
                self.skip_blank(true);
                let value = self.value(parenthesised)?;
                args.push(RawArg {
                    key: Some(key),
                    start,
                    value,
                });
            } else {
                let value = self.value(parenthesised)?;
                let save = self.pos;
                self.skip_blank(false);
                if self.src[self.pos..].starts_with("=>") {
                    self.pos += 2;
                    self.skip_blank(true);
                    let key = value.as_str()?.to_string();
                    let value = self.value(parenthesised)?;
                    args.push(RawArg {
                        key: Some(key),
                        start,
                        value,
                    });
                } else {
                    self.pos = save;
                    args.push(RawArg {
                        key: None,
                        start,
                        value,
                    });
                }
            }

            let save = self.pos;
            self.skip_blank(false);
            if self.peek() == Some(b',') {
                self.pos += 1;
                after_comma = true;
                continue;
            }
            self.pos = save;
            break;
        }
        Some(args)
    }

    /// `key:` style hash label
    fn label(&mut self) -> Option<String> {
        let start = self.pos;
        let mut end = start;
        while self
            .bytes
            .get(end)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            end += 1;
        }
        let is_label = end > start
            && !self.bytes[start].is_ascii_digit()
            && self.bytes.get(end) == Some(&b':')
            && self.bytes.get(end + 1) != Some(&b':');
        if !is_label {
            return None;
        }
        self.pos = end + 1;
        Some(self.src[start..end].to_string())
    }

    fn value(&mut self, parenthesised: bool) -> Option<Arg> {
        match self.peek()? {
            b'\'' | b'"' => self.quoted().map(|arg| self.frozen(arg)),
            b'%' => match self.percent() {
                Some(arg) => Some(self.frozen(arg)),
                None => self.expr(parenthesised),
            },
            b':' if self
                .peek_at(1)
                .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_' || b == b'"') =>
            {
                self.symbol()
            }
            b'[' => self.array(),
            _ => self.expr(parenthesised),
        }
    }

    /// Swallows a trailing `.freeze` on a literal
    fn frozen(&mut self, mut arg: Arg) -> Arg {
        if self.src[self.pos..].starts_with(".freeze") {
            self.pos += ".freeze".len();
            arg.span.end = self.pos;
        }
        arg
    }

    fn quoted(&mut self) -> Option<Arg> {
        let start = self.pos;
        let quote = self.bytes[start];
        let mut i = start + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b if b == quote => break,
                _ => i += 1,
            }
        }
        if i >= self.bytes.len() {
            return None;
        }
        self.pos = i + 1;
        let value = &self.src[start + 1..i];
        let delimiter = (quote as char).to_string();
        let kind = if quote == b'"' && value.contains("#{") {
            ArgKind::Expr
        } else {
            ArgKind::Str {
                value: value.to_string(),
                open: delimiter.clone(),
                close: delimiter,
            }
        };
        Some(Arg {
            kind,
            span: start..self.pos,
        })
    }

    /// `%q(..)`, `%Q{..}` and `%(..)`
    fn percent(&mut self) -> Option<Arg> {
        let start = self.pos;
        let mut i = start + 1;
        let interpolating = match self.bytes.get(i)? {
            b'q' => {
                i += 1;
                false
            }
            b'Q' => {
                i += 1;
                true
            }
            _ => true,
        };
        let open = *self.bytes.get(i)?;
        let close = match open {
            b'(' => b')',
            b'[' => b']',
            b'{' => b'}',
            b'<' => b'>',
            b'|' | b'!' | b'/' => open,
            _ => return None,
        };
        let body_start = i + 1;
        let body_end = body_start + self.src[body_start..].find(close as char)?;
        self.pos = body_end + 1;

        let value = &self.src[body_start..body_end];
        let kind = if interpolating && value.contains("#{") {
            ArgKind::Expr
        } else {
            ArgKind::Str {
                value: value.to_string(),
                open: self.src[start..body_start].to_string(),
                close: (close as char).to_string(),
            }
        };
        Some(Arg {
            kind,
            span: start..self.pos,
        })
    }

    fn symbol(&mut self) -> Option<Arg> {
        let start = self.pos;
        self.pos += 1;
        if self.peek() == Some(b'"') {
            let quoted = self.quoted()?;
            let name = quoted.as_str()?.to_string();
            return Some(Arg {
                kind: ArgKind::Symbol(name),
                span: start..self.pos,
            });
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'?' || b == b'!')
        {
            self.pos += 1;
        }
        Some(Arg {
            kind: ArgKind::Symbol(self.src[start + 1..self.pos].to_string()),
            span: start..self.pos,
        })
    }

    fn array(&mut self) -> Option<Arg> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_blank(true);
            match self.peek()? {
                b']' => {
                    self.pos += 1;
                    break;
                }
                b',' => self.pos += 1,
                _ => items.push(self.value(true)?),
            }
        }
        Some(Arg {
            kind: ArgKind::Array(items),
            span: start..self.pos,
        })
    }

    /// Anything else, up to the next argument boundary
    fn expr(&mut self, parenthesised: bool) -> Option<Arg> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut in_string: Option<u8> = None;
        while let Some(b) = self.peek() {
            if let Some(quote) = in_string {
                if b == b'\\' {
                    self.pos += 1;
                } else if b == quote {
                    in_string = None;
                }
                self.pos += 1;
                continue;
            }
            match b {
                b'\'' | b'"' => in_string = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' if depth > 0 => depth -= 1,
                b')' if parenthesised => break,
                b',' | b'\n' | b'#' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        let text = self.src[start..self.pos].trim_end();
        if text.is_empty() {
            return None;
        }
        self.pos = start + text.len();
        Some(Arg {
            kind: ArgKind::Expr,
            span: start..self.pos,
        })
    }
}
