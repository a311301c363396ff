//! A small configurable tokenizer.
//!
//! The tokenizer splits an input string once, up front, and then presents a
//! pull-based stream: callers consume tokens, peek ahead, or push a token
//! back. Its behavior is driven entirely by its configuration:
//!
//! - *whitespace*: characters skipped between tokens. `'\n'` is special: it
//!   is always a delimiter as well, so line numbers stay accurate even when
//!   newline-skipping is enabled.
//! - *delimiters*: strings that form tokens by themselves and split whatever
//!   surrounds them. When one delimiter is a prefix of another, the longer
//!   match wins.
//! - *reserved words*: strings that may appear in the input but must be
//!   consumed explicitly; fetching one via [`Tokenizer::consume_token`] is an
//!   error.
//! - *raw regions*: an optional `(open, close)` marker pair. The markers are
//!   tokens themselves and everything between them becomes a single verbatim
//!   token, whitespace and delimiters included.

use std::collections::BTreeSet;

use thiserror::Error;

/// Tokenizer errors. Syntax errors carry the line on which they occurred.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("left raw delimiter `{open}` unmatched by right raw delimiter `{close}`")]
    UnmatchedRaw { open: String, close: String },
}

/// Result type for tokenizer operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// A pull-based token stream over a fully tokenized input.
pub struct Tokenizer {
    /// Tokens in reverse order, so the next token is at the back.
    tokens: Vec<String>,
    /// Current line within the input, starting at 1.
    line: u32,
    delimiters: BTreeSet<String>,
    reserved: BTreeSet<String>,
    newline_is_whitespace: bool,
}

impl Tokenizer {
    /// Tokenize `input` with no raw regions.
    pub fn new(input: &str, whitespace: &[char], delimiters: &[&str], reserved: &[&str]) -> Self {
        let mut tk = Self::empty(whitespace, delimiters, reserved);
        tk.tokenize(input, whitespace);
        tk.tokens.reverse();
        tk
    }

    /// Tokenize `input`, turning every region between `open` and `close`
    /// into a single verbatim token. Fails if an `open` marker is never
    /// closed.
    pub fn with_raw(
        input: &str,
        whitespace: &[char],
        delimiters: &[&str],
        reserved: &[&str],
        (open, close): (&str, &str),
    ) -> TokenResult<Self> {
        let mut tk = Self::empty(whitespace, delimiters, reserved);
        tk.delimiters.insert(open.to_string());
        tk.delimiters.insert(close.to_string());

        let mut rest = input;
        while let Some(start) = rest.find(open) {
            tk.tokenize(&rest[..start], whitespace);
            tk.tokens.push(open.to_string());

            let after = &rest[start + open.len()..];
            let end = after.find(close).ok_or_else(|| TokenError::UnmatchedRaw {
                open: open.to_string(),
                close: close.to_string(),
            })?;
            tk.tokens.push(after[..end].to_string());
            tk.tokens.push(close.to_string());
            rest = &after[end + close.len()..];
        }
        tk.tokenize(rest, whitespace);

        tk.tokens.reverse();
        Ok(tk)
    }

    fn empty(whitespace: &[char], delimiters: &[&str], reserved: &[&str]) -> Self {
        let mut delimiters: BTreeSet<String> =
            delimiters.iter().map(|d| d.to_string()).collect();
        // '\n' is always a delimiter so that line counting works.
        delimiters.insert("\n".to_string());

        Self {
            tokens: Vec::new(),
            line: 1,
            delimiters,
            reserved: reserved.iter().map(|r| r.to_string()).collect(),
            newline_is_whitespace: whitespace.contains(&'\n'),
        }
    }

    /// Require that the next token is exactly `expected` and consume it.
    pub fn consume(&mut self, expected: &str) -> TokenResult<()> {
        match self.pop_next() {
            None => Err(self.error("unexpected end of input")),
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("unexpected token {token}"))),
        }
    }

    /// Consume the next token iff it equals `expected`.
    pub fn try_consume(&mut self, expected: &str) -> bool {
        if self.next_is(expected) {
            self.pop_next();
            true
        } else {
            false
        }
    }

    /// Whether the next token equals `expected`; consumes nothing.
    pub fn next_is(&mut self, expected: &str) -> bool {
        self.next_no_consume() == expected
    }

    /// Consume and return the next token. Fails if that token is a delimiter
    /// or a reserved word, or if the input is exhausted.
    pub fn consume_token(&mut self) -> TokenResult<String> {
        let token = self.next_no_consume();
        if token.is_empty() {
            return Err(self.error("unexpected end of input"));
        }
        if self.delimiters.contains(&token) || self.reserved.contains(&token) {
            return Err(self.error(format!("read delimiter or reserved word: {token}")));
        }
        self.pop_next();
        Ok(token)
    }

    /// Consume and return the next token verbatim, with no delimiter or
    /// reserved-word checks. This is the way to extract raw-region tokens;
    /// line numbers are advanced by any newlines the token contains.
    pub fn consume_raw(&mut self) -> TokenResult<String> {
        match self.tokens.pop() {
            None => Err(self.error("unexpected end of input")),
            Some(token) => {
                self.line += token.matches('\n').count() as u32;
                Ok(token)
            }
        }
    }

    /// Consume and return the next character, splitting a multi-character
    /// token if necessary.
    pub fn consume_char(&mut self) -> TokenResult<char> {
        let token = self.next_no_consume();
        let Some(ch) = token.chars().next() else {
            return Err(self.error("unexpected end of input"));
        };

        let ch_str = ch.to_string();
        if self.delimiters.contains(&ch_str) || self.reserved.contains(&ch_str) {
            return Err(self.error(format!("read delimiter or reserved word: {token}")));
        }

        self.tokens.pop();
        let rest = &token[ch.len_utf8()..];
        if !rest.is_empty() {
            self.tokens.push(rest.to_string());
        }
        Ok(ch)
    }

    /// Whether the next token is a delimiter or a reserved word.
    pub fn is_next_reserved(&mut self) -> bool {
        let token = self.peek(0);
        self.delimiters.contains(&token) || self.reserved.contains(&token)
    }

    /// Push a token back onto the stream; it becomes the next token.
    pub fn put(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    /// Return the token `ahead` positions from the front of the stream
    /// (0 = next), honoring newline skipping. Returns the empty string when
    /// `ahead` runs past the end of the input.
    pub fn peek(&self, ahead: usize) -> String {
        let mut idx = self.tokens.len() as isize - 1;

        self.skip_newlines(&mut idx);
        for _ in 0..ahead {
            idx -= 1;
            self.skip_newlines(&mut idx);
        }

        if idx < 0 {
            String::new()
        } else {
            self.tokens[idx as usize].clone()
        }
    }

    /// Whether the input is exhausted.
    pub fn end_of_input(&mut self) -> bool {
        self.next_no_consume().is_empty()
    }

    /// The current line number, starting at 1.
    pub fn line(&self) -> u32 {
        self.line
    }

    fn skip_newlines(&self, idx: &mut isize) {
        if !self.newline_is_whitespace {
            return;
        }
        while *idx >= 0 && self.tokens[*idx as usize] == "\n" {
            *idx -= 1;
        }
    }

    /// The next token without consuming it, after discarding any skippable
    /// newlines (which still advance the line count). Empty at end of input.
    fn next_no_consume(&mut self) -> String {
        if self.newline_is_whitespace {
            while self.tokens.last().map(|t| t == "\n").unwrap_or(false) {
                self.line += 1;
                self.tokens.pop();
            }
        }
        self.tokens.last().cloned().unwrap_or_default()
    }

    /// Consume the next token, if any.
    fn pop_next(&mut self) -> Option<String> {
        let token = self.next_no_consume();
        if token.is_empty() {
            return None;
        }
        if token == "\n" {
            self.line += 1;
        }
        self.tokens.pop()
    }

    fn error(&self, message: impl Into<String>) -> TokenError {
        TokenError::Syntax { line: self.line, message: message.into() }
    }

    /// Split on whitespace (newlines excepted, they are delimiters), then
    /// split each run on delimiters.
    fn tokenize(&mut self, input: &str, whitespace: &[char]) {
        let space: Vec<char> = whitespace.iter().copied().filter(|&c| c != '\n').collect();
        for run in input.split(|c: char| space.contains(&c)) {
            if !run.is_empty() {
                self.delimit(run);
            }
        }
    }

    /// Break `run` into tokens at delimiter boundaries. The earliest match
    /// wins; among delimiters matching at the same position, the longest.
    fn delimit(&mut self, run: &str) {
        let mut rest = run;
        while !rest.is_empty() {
            let mut found: Option<(usize, usize)> = None;
            for delimiter in &self.delimiters {
                if let Some(pos) = rest.find(delimiter.as_str()) {
                    let better = match found {
                        None => true,
                        Some((p, l)) => pos < p || (pos == p && delimiter.len() > l),
                    };
                    if better {
                        found = Some((pos, delimiter.len()));
                    }
                }
            }

            match found {
                None => {
                    self.tokens.push(rest.to_string());
                    break;
                }
                Some((pos, len)) => {
                    if pos > 0 {
                        self.tokens.push(rest[..pos].to_string());
                    }
                    self.tokens.push(rest[pos..pos + len].to_string());
                    rest = &rest[pos + len..];
                }
            }
        }
    }
}
