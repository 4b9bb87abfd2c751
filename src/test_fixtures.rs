//! Shared test support: a small PHP-subset tokenizer and helpers.
//!
//! The fixture tokenizer implements just enough of the tokenizer contract to
//! exercise the engine: position tracking, tab normalization with
//! `original_text`, comments, strings, and the token kinds the structural
//! link builder cares about. It is deliberately not a real PHP lexer.

use crate::token::{SourceFormat, Token, TokenKind, TokenStore, TokenizeError, Tokenizer};

pub struct MiniTokenizer {
    fail: bool,
}

impl MiniTokenizer {
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// A tokenizer that always reports a tokenization failure.
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Tokenizer for MiniTokenizer {
    fn format(&self) -> SourceFormat {
        SourceFormat::Php
    }

    fn tokenize(&self, text: &str, tab_width: usize) -> Result<Vec<Token>, TokenizeError> {
        if self.fail {
            return Err(TokenizeError::new("maximum nesting level reached"));
        }
        Ok(Lexer::new(text, tab_width).run())
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    tab_width: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(text: &str, tab_width: usize) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            tab_width: tab_width.max(1),
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        let mut in_php = false;
        while self.pos < self.chars.len() {
            if in_php {
                if self.peek_str("?>") {
                    self.emit_ahead(TokenKind::CloseTag, 2);
                    in_php = false;
                } else {
                    self.lex_php_token();
                }
            } else if self.peek_str("<?php") {
                self.emit_ahead(TokenKind::OpenTag, 5);
                in_php = true;
            } else {
                self.lex_inline_html();
            }
        }
        self.tokens
    }

    fn lex_inline_html(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len() && !self.peek_str("<?php") {
            self.pos += 1;
        }
        self.emit_span(TokenKind::InlineHtml, start, self.pos);
    }

    fn lex_php_token(&mut self) {
        let c = self.chars[self.pos];
        match c {
            ' ' | '\t' | '\r' | '\n' => self.lex_whitespace(),
            '$' => {
                let start = self.pos;
                self.pos += 1;
                while self.pos < self.chars.len() && is_ident(self.chars[self.pos]) {
                    self.pos += 1;
                }
                self.emit_span(TokenKind::Variable, start, self.pos);
            }
            '/' if self.peek_str("//") => self.lex_line_comment(),
            '#' => self.lex_line_comment(),
            '/' if self.peek_str("/*") => self.lex_block_comment(),
            '\'' | '"' => self.lex_string(c),
            c if c.is_ascii_digit() => {
                let start = self.pos;
                while self.pos < self.chars.len()
                    && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.')
                {
                    self.pos += 1;
                }
                self.emit_span(TokenKind::Number, start, self.pos);
            }
            c if is_ident_start(c) => {
                let start = self.pos;
                while self.pos < self.chars.len() && is_ident(self.chars[self.pos]) {
                    self.pos += 1;
                }
                let word: String = self.chars[start..self.pos].iter().collect();
                self.emit_span(keyword_kind(&word), start, self.pos);
            }
            '{' => self.emit_ahead(TokenKind::OpenCurly, 1),
            '}' => self.emit_ahead(TokenKind::CloseCurly, 1),
            '(' => self.emit_ahead(TokenKind::OpenParen, 1),
            ')' => self.emit_ahead(TokenKind::CloseParen, 1),
            '[' => self.emit_ahead(TokenKind::OpenSquare, 1),
            ']' => self.emit_ahead(TokenKind::CloseSquare, 1),
            ';' => self.emit_ahead(TokenKind::Semicolon, 1),
            ',' => self.emit_ahead(TokenKind::Comma, 1),
            ':' => self.emit_ahead(TokenKind::Colon, 1),
            '=' if self.peek_str("=>") => self.emit_ahead(TokenKind::DoubleArrow, 2),
            '=' if self.peek_str("==") => {
                let len = if self.peek_str("===") { 3 } else { 2 };
                self.emit_ahead(TokenKind::Operator, len);
            }
            '=' => self.emit_ahead(TokenKind::Equals, 1),
            '+' | '-' | '*' | '/' | '.' | '<' | '>' | '!' | '&' | '|' | '%' | '?' | '@' => {
                self.emit_ahead(TokenKind::Operator, 1);
            }
            _ => self.emit_ahead(TokenKind::Other, 1),
        }
    }

    fn lex_whitespace(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len() {
            match self.chars[self.pos] {
                '\n' => {
                    // A newline terminates the whitespace token so tokens
                    // never start mid-line-break.
                    self.pos += 1;
                    break;
                }
                ' ' | '\t' | '\r' => self.pos += 1,
                _ => break,
            }
        }
        self.emit_span(TokenKind::Whitespace, start, self.pos);
    }

    fn lex_line_comment(&mut self) {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
            self.pos += 1;
        }
        self.emit_span(TokenKind::Comment, start, self.pos);
    }

    fn lex_block_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        while self.pos < self.chars.len() && !self.peek_str("*/") {
            self.pos += 1;
        }
        self.pos = (self.pos + 2).min(self.chars.len());
        self.emit_span(TokenKind::Comment, start, self.pos);
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            self.pos += 1;
            if c == '\\' {
                self.pos = (self.pos + 1).min(self.chars.len());
            } else if c == quote {
                break;
            }
        }
        self.emit_span(TokenKind::StringLiteral, start, self.pos);
    }

    fn peek_str(&self, needle: &str) -> bool {
        needle
            .chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn emit_ahead(&mut self, kind: TokenKind, len: usize) {
        let start = self.pos;
        self.pos = (self.pos + len).min(self.chars.len());
        self.emit_span(kind, start, self.pos);
    }

    /// Emit the token covering `[start, end)`, normalizing tabs to spaces
    /// with `original_text` kept, and advance the line/column cursor.
    fn emit_span(&mut self, kind: TokenKind, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let raw: String = self.chars[start..end].iter().collect();
        let line = self.line;
        let column = self.col;

        let mut expanded = String::new();
        let mut col = self.col;
        let mut tab_seen = false;
        for c in raw.chars() {
            match c {
                '\t' => {
                    tab_seen = true;
                    let width = self.tab_width as u32;
                    let pad = width - ((col - 1) % width);
                    for _ in 0..pad {
                        expanded.push(' ');
                    }
                    col += pad;
                }
                '\n' => {
                    expanded.push('\n');
                    self.line += 1;
                    col = 1;
                }
                c => {
                    expanded.push(c);
                    col += 1;
                }
            }
        }
        self.col = col;

        let mut token = Token::new(kind, expanded, line, column);
        if tab_seen {
            token.original_text = Some(raw);
        }
        self.tokens.push(token);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword_kind(word: &str) -> TokenKind {
    match word.to_ascii_lowercase().as_str() {
        "if" => TokenKind::If,
        "elseif" => TokenKind::ElseIf,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "foreach" => TokenKind::Foreach,
        "do" => TokenKind::Do,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "function" => TokenKind::Function,
        "class" => TokenKind::Class,
        "interface" => TokenKind::Interface,
        "trait" => TokenKind::Trait,
        "return" => TokenKind::Return,
        "echo" => TokenKind::Echo,
        _ => TokenKind::Ident,
    }
}

/// Tokenize PHP-subset source into a linked store.
pub fn store_of(source: &str) -> TokenStore {
    let tokens = MiniTokenizer::new()
        .tokenize(source, 4)
        .expect("fixture tokenization failed");
    TokenStore::new(tokens)
}

/// Index of the first token with the given kind.
pub fn first_of(store: &TokenStore, kind: TokenKind) -> usize {
    store
        .iter()
        .position(|t| t.kind == kind)
        .expect("kind not found in fixture source")
}

use std::sync::Arc;

use crate::config::RunConfig;
use crate::file::SourceFile;
use crate::sniff::{Registry, Sniff, SniffProperties};

/// Checks spacing around assignment operators and offers fixes: exactly one
/// space on each side.
pub struct SpacingSniff;

impl Sniff for SpacingSniff {
    fn code(&self) -> &str {
        "Fixture.Spacing"
    }

    fn register(&self) -> Vec<TokenKind> {
        vec![TokenKind::Equals]
    }

    fn process(
        &self,
        file: &mut SourceFile,
        index: usize,
        _props: &SniffProperties,
    ) -> Option<usize> {
        if index > 0 && file.store().kind(index - 1) != TokenKind::Whitespace {
            let fix = file.add_fixable_error(
                "Expected 1 space before assignment operator",
                index,
                "Fixture.Spacing.SpaceBefore",
                &[],
                0,
            );
            if fix {
                file.fixer_mut().insert_before(index, " ");
            }
        }

        let next = index + 1;
        if next >= file.store().len() {
            return None;
        }
        let (next_kind, next_text) = {
            let token = file.store().token(next);
            (token.kind, token.text.clone())
        };
        if next_kind == TokenKind::Whitespace {
            if next_text != " " && !next_text.contains('\n') {
                let found = next_text.chars().count().to_string();
                let fix = file.add_fixable_error(
                    "Expected 1 space after assignment operator; %s found",
                    next,
                    "Fixture.Spacing.SpaceAfter",
                    &[found],
                    0,
                );
                if fix {
                    file.fixer_mut().replace_token(next, " ");
                }
            }
        } else {
            let fix = file.add_fixable_error(
                "Expected 1 space after assignment operator",
                index,
                "Fixture.Spacing.SpaceAfter",
                &[],
                0,
            );
            if fix {
                file.fixer_mut().insert_after(index, " ");
            }
        }
        None
    }
}

/// Reports one error per variable token.
pub struct VarSniff {
    pub severity: u8,
}

impl VarSniff {
    pub fn new() -> Self {
        Self { severity: 0 }
    }
}

impl Sniff for VarSniff {
    fn code(&self) -> &str {
        "Fixture.Vars"
    }

    fn register(&self) -> Vec<TokenKind> {
        vec![TokenKind::Variable]
    }

    fn process(
        &self,
        file: &mut SourceFile,
        index: usize,
        _props: &SniffProperties,
    ) -> Option<usize> {
        let name = file.store().text(index).to_string();
        file.add_error(
            "Variable %s found",
            index,
            "Fixture.Vars.Found",
            &[name],
            self.severity,
        );
        None
    }
}

pub fn default_config() -> Arc<RunConfig> {
    Arc::new(RunConfig::default())
}

pub fn registry_of(sniffs: Vec<Arc<dyn Sniff>>) -> Registry {
    let mut registry = Registry::new();
    for sniff in sniffs {
        registry.register(sniff).expect("fixture registration failed");
    }
    registry
}

/// Tokenize and run one dispatch pass over ad-hoc content.
pub fn check(source: &str, sniffs: Vec<Arc<dyn Sniff>>) -> SourceFile {
    check_with_config(source, sniffs, default_config())
}

pub fn check_with_config(
    source: &str,
    sniffs: Vec<Arc<dyn Sniff>>,
    config: Arc<RunConfig>,
) -> SourceFile {
    let registry = registry_of(sniffs);
    let mut file = SourceFile::from_stdin(source.to_string(), config);
    file.process(&registry, &MiniTokenizer::new());
    file
}
