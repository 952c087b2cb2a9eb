//! Ground terms as exchanged with the solving engine.
//!
//! A [`Term`] is the value of a shown symbol, an assumption, or an external
//! atom. The textual form matches what the engine prints, so terms can be
//! round-tripped through generated program text and reified fact bases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A ground term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// `#inf`, smaller than every other term.
    Infimum,
    /// An integer.
    Number(i64),
    /// A quoted string (stored unescaped).
    String(String),
    /// A function symbol or, with an empty name, a tuple.
    Function {
        name: String,
        args: Vec<Term>,
        /// Classically negated (`-p(x)`).
        negated: bool,
    },
    /// `#sup`, larger than every other term.
    Supremum,
}

impl Term {
    /// A constant or function term.
    pub fn function(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Function {
            name: name.into(),
            args,
            negated: false,
        }
    }

    /// A constant (function without arguments).
    pub fn constant(name: impl Into<String>) -> Self {
        Self::function(name, Vec::new())
    }

    /// A tuple `(a,b,...)`.
    pub fn tuple(args: Vec<Term>) -> Self {
        Self::function("", args)
    }

    /// Function name, or `None` for numbers, strings and the extrema.
    pub fn name(&self) -> Option<&str> {
        match self {
            Term::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Function arguments (empty for everything but functions and tuples).
    pub fn arguments(&self) -> &[Term] {
        match self {
            Term::Function { args, .. } => args,
            _ => &[],
        }
    }

    /// Integer value, if this is a number.
    pub fn number(&self) -> Option<i64> {
        match self {
            Term::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether the term is `name/arity`.
    pub fn matches(&self, name: &str, arity: usize) -> bool {
        matches!(self, Term::Function { name: n, args, negated: false } if n == name && args.len() == arity)
    }

    /// Parse a term from its textual form.
    pub fn parse(input: &str) -> Option<Term> {
        let mut parser = Parser::new(input);
        let term = parser.term()?;
        parser.skip_ws();
        parser.at_end().then_some(term)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Infimum => write!(f, "#inf"),
            Term::Supremum => write!(f, "#sup"),
            Term::Number(n) => write!(f, "{n}"),
            Term::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Term::Function {
                name,
                args,
                negated,
            } => {
                if *negated {
                    write!(f, "-")?;
                }
                write!(f, "{name}")?;
                if !args.is_empty() || name.is_empty() {
                    write!(f, "(")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    // Unary tuples need the trailing comma to stay tuples.
                    if name.is_empty() && args.len() == 1 {
                        write!(f, ",")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            src: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn term(&mut self) -> Option<Term> {
        self.skip_ws();
        match self.peek()? {
            b'#' => {
                let word = self.word_after(1);
                match word.as_str() {
                    "inf" | "infimum" => Some(Term::Infimum),
                    "sup" | "supremum" => Some(Term::Supremum),
                    _ => None,
                }
            }
            b'"' => self.string(),
            b'(' => {
                self.pos += 1;
                let (args, trailing_comma) = self.arguments(b')')?;
                if args.len() == 1 && !trailing_comma {
                    args.into_iter().next()
                } else {
                    Some(Term::tuple(args))
                }
            }
            b'-' => {
                self.pos += 1;
                match self.term()? {
                    Term::Number(n) => Some(Term::Number(-n)),
                    Term::Function { name, args, negated } if !name.is_empty() => {
                        Some(Term::Function {
                            name,
                            args,
                            negated: !negated,
                        })
                    }
                    _ => None,
                }
            }
            c if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                std::str::from_utf8(&self.src[start..self.pos])
                    .ok()?
                    .parse()
                    .ok()
                    .map(Term::Number)
            }
            c if c == b'_' || c.is_ascii_lowercase() => {
                let name = self.word_after(0);
                if self.eat(b'(') {
                    let (args, _) = self.arguments(b')')?;
                    Some(Term::function(name, args))
                } else {
                    Some(Term::constant(name))
                }
            }
            _ => None,
        }
    }

    fn word_after(&mut self, skip: usize) -> String {
        self.pos += skip;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c == b'_' || c == b'\'' || c.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn arguments(&mut self, close: u8) -> Option<(Vec<Term>, bool)> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Some((args, false));
        }
        loop {
            args.push(self.term()?);
            if self.eat(close) {
                return Some((args, false));
            }
            if !self.eat(b',') {
                return None;
            }
            if self.eat(close) {
                return Some((args, true));
            }
        }
    }

    fn string(&mut self) -> Option<Term> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                b'"' => return Some(Term::String(out)),
                b'\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    out.push(match escaped {
                        b'n' => '\n',
                        other => other as char,
                    });
                }
                _ => {
                    // Re-decode multi-byte sequences from the source slice.
                    let start = self.pos - 1;
                    let width = utf8_width(c);
                    let end = (start + width).min(self.src.len());
                    out.push_str(std::str::from_utf8(&self.src[start..end]).ok()?);
                    self.pos = end;
                }
            }
        }
    }
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}
