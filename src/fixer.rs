//! Accumulates proposed text edits and applies them transactionally.
//!
//! Edits are proposed against token indices of the current pass. A changeset
//! brackets edits that must land together: either every member commits or
//! none do. Within one pass, the last committed edit at an index wins; a
//! collision between two changesets at the same index is logged, since it
//! means two sniffs disagree about a fix. Across passes, re-proposing the
//! exact edit that was already applied in an earlier pass is refused, which
//! breaks low-level churn from sniffs that naively re-apply idempotent fixes.

use std::collections::HashMap;

use crate::token::TokenStore;

#[derive(Debug, Clone, Default)]
pub struct Fixer {
    enabled: bool,
    /// Working copy of each token's contributed source text, mutated as
    /// edits commit. Initialized from the pre-normalization bytes so tokens
    /// the fixer never touches round-trip exactly.
    contents: Vec<String>,
    /// Edits committed this pass: index → replacement.
    fixed: HashMap<usize, String>,
    /// Edits applied in earlier passes of the current convergence run.
    previously_applied: HashMap<usize, String>,
    /// Open changeset buffer, in proposal order.
    changeset: Option<Vec<(usize, String)>>,
    eol: String,
}

impl Fixer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether fixes should actually be materialized. Sniffs consult this
    /// (via the file's fixable-violation helpers) before building edits.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Snapshot the token contents for a new dispatch pass.
    pub fn start_pass(&mut self, store: &TokenStore, eol: &str) {
        self.contents = store.iter().map(|t| t.source_text().to_string()).collect();
        self.fixed.clear();
        self.changeset = None;
        self.eol = eol.to_string();
    }

    /// Retire the pass: applied edits become refusal memos for later passes.
    pub fn finish_pass(&mut self) {
        self.previously_applied.extend(self.fixed.drain());
    }

    /// Forget convergence-run state entirely.
    pub fn reset(&mut self) {
        self.previously_applied.clear();
        self.fixed.clear();
        self.changeset = None;
    }

    /// Number of distinct token indices mutated this pass.
    #[must_use]
    pub fn fix_count(&self) -> u32 {
        u32::try_from(self.fixed.len()).unwrap_or(u32::MAX)
    }

    /// The current text of a token, reflecting committed edits and any open
    /// changeset proposals.
    #[must_use]
    pub fn token_text(&self, index: usize) -> &str {
        if let Some(changeset) = &self.changeset
            && let Some((_, text)) = changeset.iter().rev().find(|(i, _)| *i == index)
        {
            return text;
        }
        self.contents.get(index).map_or("", String::as_str)
    }

    /// Open a changeset. Edits proposed until [`Self::end_changeset`] commit
    /// as one atomic unit.
    pub fn begin_changeset(&mut self) {
        self.changeset = Some(Vec::new());
    }

    /// Commit the open changeset. If any member edit is refused, every
    /// already-applied member is rolled back and the whole set is discarded.
    pub fn end_changeset(&mut self) -> bool {
        let Some(proposals) = self.changeset.take() else {
            return false;
        };
        let mut applied: Vec<(usize, String, Option<String>)> = Vec::new();
        for (index, text) in proposals {
            let before = self.contents.get(index).cloned().unwrap_or_default();
            let prior_fix = self.fixed.get(&index).cloned();
            if self.commit(index, text) {
                applied.push((index, before, prior_fix));
            } else {
                for (idx, before, prior_fix) in applied.iter().rev() {
                    self.contents[*idx] = before.clone();
                    match prior_fix {
                        Some(old) => {
                            self.fixed.insert(*idx, old.clone());
                        }
                        None => {
                            self.fixed.remove(idx);
                        }
                    }
                }
                tracing::debug!(index, "changeset rolled back");
                return false;
            }
        }
        true
    }

    /// Propose replacing the text of token `index`.
    ///
    /// Returns false (discarding the edit) when the identical replacement was
    /// already applied in an earlier pass of this convergence run.
    pub fn replace_token(&mut self, index: usize, text: impl Into<String>) -> bool {
        let text = text.into();
        if index >= self.contents.len() {
            return false;
        }
        if let Some(changeset) = &mut self.changeset {
            changeset.push((index, text));
            return true;
        }
        self.commit(index, text)
    }

    /// Insert text before token `index` (prepends to its current text).
    pub fn insert_before(&mut self, index: usize, text: &str) -> bool {
        let combined = format!("{text}{}", self.token_text(index));
        self.replace_token(index, combined)
    }

    /// Insert text after token `index` (appends to its current text).
    pub fn insert_after(&mut self, index: usize, text: &str) -> bool {
        let combined = format!("{}{text}", self.token_text(index));
        self.replace_token(index, combined)
    }

    /// Insert this file's end-of-line marker before token `index`.
    pub fn insert_newline_before(&mut self, index: usize) -> bool {
        let combined = format!("{}{}", self.eol, self.token_text(index));
        self.replace_token(index, combined)
    }

    fn commit(&mut self, index: usize, text: String) -> bool {
        if self.previously_applied.get(&index) == Some(&text) {
            tracing::debug!(index, "identical fix already applied in an earlier pass; refused");
            return false;
        }
        if let Some(existing) = self.fixed.get(&index)
            && *existing != text
        {
            // Two changesets touched the same index this pass. Last writer
            // wins; surfaced because it usually means two sniffs disagree.
            tracing::debug!(index, old = %existing, new = %text, "fix collision, last writer wins");
        }
        self.contents[index] = text.clone();
        self.fixed.insert(index, text);
        true
    }

    /// The file content all committed edits produce.
    #[must_use]
    pub fn contents(&self) -> String {
        self.contents.concat()
    }
}

#[cfg(test)]
#[path = "fixer_tests.rs"]
mod tests;
