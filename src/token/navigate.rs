//! Search algorithms over a [`TokenStore`].
//!
//! Everything here is a pure read: nothing mutates the store. The one
//! invariant that matters most is the pair-skip logic — a backward walk that
//! meets the closer of a matched bracket/paren/scope pair jumps to its opener
//! and continues, so nested content is skipped whole and never half-entered.

use super::{EMPTY_KINDS, Token, TokenKind, TokenStore};

/// Kinds that terminate a backward walk to the start of a statement.
const STATEMENT_START_BOUNDARY: &[TokenKind] = &[
    TokenKind::Colon,
    TokenKind::Comma,
    TokenKind::DoubleArrow,
    TokenKind::Semicolon,
    TokenKind::OpenCurly,
    TokenKind::OpenTag,
    TokenKind::CloseTag,
];

/// Kinds that terminate a forward walk to the end of a statement.
const STATEMENT_END_BOUNDARY: &[TokenKind] = &[
    TokenKind::Colon,
    TokenKind::Comma,
    TokenKind::DoubleArrow,
    TokenKind::Semicolon,
    TokenKind::CloseCurly,
    TokenKind::CloseParen,
    TokenKind::CloseSquare,
    TokenKind::OpenTag,
    TokenKind::CloseTag,
];

/// A token search predicate for the `find_*` family.
///
/// Matches tokens whose kind is in (or, with [`Self::excluding`], not in) the
/// given set, optionally requiring an exact literal text, optionally aborting
/// at a statement terminator on the top nesting level.
#[derive(Debug, Clone, Copy)]
pub struct TokenQuery<'a> {
    kinds: &'a [TokenKind],
    exclude: bool,
    text: Option<&'a str>,
    stop_at_statement_end: bool,
}

impl<'a> TokenQuery<'a> {
    /// Match tokens whose kind is one of `kinds`.
    #[must_use]
    pub const fn of(kinds: &'a [TokenKind]) -> Self {
        Self {
            kinds,
            exclude: false,
            text: None,
            stop_at_statement_end: false,
        }
    }

    /// Match tokens whose kind is *not* one of `kinds`.
    #[must_use]
    pub const fn excluding(kinds: &'a [TokenKind]) -> Self {
        Self {
            kinds,
            exclude: true,
            text: None,
            stop_at_statement_end: false,
        }
    }

    /// Additionally require the candidate's literal text to equal `text`.
    #[must_use]
    pub const fn with_text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }

    /// Abort the scan (returning no match) upon crossing a statement
    /// terminator at the top nesting level.
    #[must_use]
    pub const fn local(mut self) -> Self {
        self.stop_at_statement_end = true;
        self
    }

    fn matches(&self, token: &Token) -> bool {
        if self.kinds.contains(&token.kind) == self.exclude {
            return false;
        }
        self.text.is_none_or(|text| token.text == text)
    }
}

impl TokenStore {
    /// Scan forward from `start` (inclusive) to `end` (exclusive, defaulting
    /// to the end of the stream) for the first token matching `query`.
    #[must_use]
    pub fn find_next(&self, query: TokenQuery<'_>, start: usize, end: Option<usize>) -> Option<usize> {
        let end = end.unwrap_or(self.len()).min(self.len());
        for i in start..end {
            let token = self.token(i);
            if query.matches(token) {
                return Some(i);
            }
            if query.stop_at_statement_end && self.is_top_level_terminator(i) {
                return None;
            }
        }
        None
    }

    /// Scan backward from `start` (inclusive) down to `end` (inclusive,
    /// defaulting to the start of the stream) for the first token matching
    /// `query`.
    ///
    /// With a local query, meeting the closer of a matched pair jumps the scan
    /// to its opener so nested content is skipped whole. That jump is an
    /// optimization only: nothing inside a closed pair can match a local scan
    /// that started outside it.
    #[must_use]
    pub fn find_previous(
        &self,
        query: TokenQuery<'_>,
        start: usize,
        end: Option<usize>,
    ) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let low = end.unwrap_or(0);
        let mut i = start.min(self.len() - 1);
        loop {
            let token = self.token(i);
            if query.matches(token) {
                return Some(i);
            }
            if query.stop_at_statement_end {
                if let Some(open) = self.backward_jump_target(i) {
                    i = open;
                } else if token.kind == TokenKind::Semicolon {
                    return None;
                }
            }
            if i <= low {
                return None;
            }
            i -= 1;
        }
    }

    /// Earliest token of the queried kind on the physical line of `start`, at
    /// or before `start`.
    #[must_use]
    pub fn find_first_on_line(&self, query: TokenQuery<'_>, start: usize) -> Option<usize> {
        if start >= self.len() {
            return None;
        }
        let line = self.token(start).line;
        let mut found = None;
        let mut i = start;
        loop {
            let token = self.token(i);
            if token.line < line {
                break;
            }
            if query.matches(token) {
                found = Some(i);
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }
        found
    }

    /// Walk backward from `start` to the first non-empty token of the
    /// statement containing it.
    ///
    /// Statement-boundary kinds stop the walk unless listed in `ignore`;
    /// closed bracket/paren/scope pairs met at their closer are skipped whole
    /// via the opener, so nested content never itself stops the walk. Returns
    /// `0` when no boundary exists before the start of the stream.
    #[must_use]
    pub fn find_start_of_statement(&self, start: usize, ignore: &[TokenKind]) -> usize {
        if start >= self.len() {
            return 0;
        }
        let mut last_not_empty = start;
        let mut i = start;
        loop {
            let kind = self.kind(i);
            if STATEMENT_START_BOUNDARY.contains(&kind) && !ignore.contains(&kind) {
                break;
            }
            let at = self.backward_jump_target(i).unwrap_or(i);
            if !self.kind(at).is_empty_kind() {
                last_not_empty = at;
            }
            if at == 0 {
                break;
            }
            i = at - 1;
        }
        last_not_empty
    }

    /// Forward mirror of [`Self::find_start_of_statement`].
    ///
    /// When `start` itself opens a scope owned by a scope-opening construct,
    /// the scope's closer is the end of the statement and is returned
    /// immediately.
    #[must_use]
    pub fn find_end_of_statement(&self, start: usize, ignore: &[TokenKind]) -> usize {
        if start >= self.len() {
            return self.len().saturating_sub(1);
        }
        if self.scope_open(start) == Some(start)
            && let Some(close) = self.scope_close(start)
            && self.scope_owner(start).is_some()
        {
            return close;
        }
        let mut last_not_empty = start;
        let mut i = start;
        while i < self.len() {
            let kind = self.kind(i);
            if i != start && STATEMENT_END_BOUNDARY.contains(&kind) && !ignore.contains(&kind) {
                break;
            }
            let at = self.forward_jump_target(i).unwrap_or(i);
            if !self.kind(at).is_empty_kind() {
                last_not_empty = at;
            }
            i = at + 1;
        }
        last_not_empty
    }

    /// Concatenate the text of `length` consecutive tokens from `start`,
    /// clipped to the end of the stream. With `use_original_text`, tokens
    /// whose text was normalized contribute their pre-normalization bytes.
    #[must_use]
    pub fn tokens_as_string(&self, start: usize, length: usize, use_original_text: bool) -> String {
        let end = start.saturating_add(length).min(self.len());
        let mut out = String::new();
        for i in start..end {
            let token = self.token(i);
            if use_original_text {
                out.push_str(token.source_text());
            } else {
                out.push_str(&token.text);
            }
        }
        out
    }

    /// Whether any enclosing scope of `index` is owned by one of `kinds`.
    #[must_use]
    pub fn has_condition(&self, index: usize, kinds: &[TokenKind]) -> bool {
        index < self.len() && self.conditions(index).values().any(|kind| kinds.contains(kind))
    }

    /// Index of the outermost enclosing scope owner of `index` with the given
    /// kind.
    #[must_use]
    pub fn get_condition(&self, index: usize, kind: TokenKind) -> Option<usize> {
        if index >= self.len() {
            return None;
        }
        self.conditions(index)
            .iter()
            .find(|&(_, &owner_kind)| owner_kind == kind)
            .map(|(&owner, _)| owner)
    }

    /// First non-empty token before `index`, skipping whitespace and comments.
    #[must_use]
    pub fn previous_non_empty(&self, index: usize) -> Option<usize> {
        if index == 0 {
            return None;
        }
        self.find_previous(TokenQuery::excluding(EMPTY_KINDS), index - 1, None)
    }

    fn is_top_level_terminator(&self, index: usize) -> bool {
        self.kind(index) == TokenKind::Semicolon
            && self.conditions(index).is_empty()
            && self.nesting_parens(index).is_empty()
    }

    /// When `index` is the closer of a matched pair, the opener to resume
    /// from; `None` otherwise.
    fn backward_jump_target(&self, index: usize) -> Option<usize> {
        if self.scope_close(index) == Some(index) {
            if let Some(open) = self.scope_open(index)
                && open < index
            {
                return Some(open);
            }
        }
        if let Some(open) = self.matching_bracket(index)
            && open < index
        {
            return Some(open);
        }
        if let Some(open) = self.matching_paren(index)
            && open < index
        {
            return Some(open);
        }
        None
    }

    /// When `index` is the opener of a matched pair, the closer to resume
    /// from; `None` otherwise.
    fn forward_jump_target(&self, index: usize) -> Option<usize> {
        if self.scope_open(index) == Some(index) {
            if let Some(close) = self.scope_close(index)
                && close > index
            {
                return Some(close);
            }
        }
        if let Some(close) = self.matching_bracket(index)
            && close > index
        {
            return Some(close);
        }
        if let Some(close) = self.matching_paren(index)
            && close > index
        {
            return Some(close);
        }
        None
    }
}

#[cfg(test)]
#[path = "navigate_tests.rs"]
mod tests;
