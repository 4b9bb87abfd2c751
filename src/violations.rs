//! Violation recording, filtering, and counting.
//!
//! Every reported problem flows through [`Ledger::record`], which evaluates
//! the full suppression pipeline *before* anything is stored: inline
//! annotations, sniff restrictions, per-file memos, error/warning coercion,
//! severity thresholds, and per-code path patterns, in that fixed order.
//! Counts are maintained even when message storage is skipped (fast-path
//! mode), so summary reporting stays accurate under cached runs.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::annotations::SuppressionMap;
use crate::config::{DEFAULT_SEVERITY, RunConfig, code_variants, sniff_code_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    Error,
    Warning,
}

impl ViolationKind {
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// One reported problem, keyed for storage by `(line, column)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
    /// Dot-separated `Standard.Category.Specific`.
    pub code: String,
    /// Effective severity, 1–10.
    pub severity: u8,
    pub fixable: bool,
}

/// Violations stored per position, insertion order preserved within one
/// position (discovery order: listener registration then token order).
pub type MessageMap = BTreeMap<(u32, u32), Vec<Violation>>;

/// Records, filters, and counts the violations of one file.
#[derive(Debug, Clone)]
pub struct Ledger {
    config: Arc<RunConfig>,
    path: PathBuf,
    suppressions: SuppressionMap,
    errors: MessageMap,
    warnings: MessageMap,
    raw_errors: Vec<Violation>,
    raw_warnings: Vec<Violation>,
    /// Codes memoized as permanently suppressed for this file by an exclude
    /// pattern match.
    ignored_codes: HashSet<String>,
    error_count: u32,
    warning_count: u32,
    fixable_count: u32,
    fixed_count: u32,
    /// Collect the least-filtered violation set (for the result cache):
    /// inline-annotation suppression still applies, configuration-dependent
    /// filters do not.
    collect_raw: bool,
    /// Replaying a previously collected raw set: sniff-restriction filtering
    /// is bypassed, severity and pattern filtering still apply.
    replaying: bool,
}

impl Ledger {
    #[must_use]
    pub fn new(config: Arc<RunConfig>, path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            path: path.into(),
            suppressions: SuppressionMap::default(),
            errors: MessageMap::new(),
            warnings: MessageMap::new(),
            raw_errors: Vec::new(),
            raw_warnings: Vec::new(),
            ignored_codes: HashSet::new(),
            error_count: 0,
            warning_count: 0,
            fixable_count: 0,
            fixed_count: 0,
            collect_raw: false,
            replaying: false,
        }
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn set_suppressions(&mut self, suppressions: SuppressionMap) {
        self.suppressions = suppressions;
    }

    pub fn set_collect_raw(&mut self, collect_raw: bool) {
        self.collect_raw = collect_raw;
    }

    /// Reset per-pass state: each dispatch pass recomputes findings from
    /// scratch. The applied-fix total survives across passes.
    pub fn reset_pass(&mut self) {
        self.errors.clear();
        self.warnings.clear();
        self.raw_errors.clear();
        self.raw_warnings.clear();
        self.error_count = 0;
        self.warning_count = 0;
        self.fixable_count = 0;
    }

    /// Discard everything, including suppression memos and the fix total.
    pub fn clear(&mut self) {
        self.reset_pass();
        self.ignored_codes.clear();
        self.fixed_count = 0;
    }

    /// Run one violation through the suppression pipeline; store it if it
    /// survives. Returns whether the violation was actually stored — callers
    /// use this to decide whether a corrective fix should proceed.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        kind: ViolationKind,
        message: &str,
        line: u32,
        column: u32,
        code: &str,
        data: &[String],
        severity: u8,
        fixable: bool,
    ) -> bool {
        // 1–2. Inline annotation suppression, full-line markers first.
        if self.suppressions.suppresses(line, code) {
            return false;
        }

        // 3. Sniff allow/deny restrictions (skipped while replaying a cached
        // set: the restriction belongs to the producing run, not this one).
        if !self.config.record_errors
            && !self.replaying
            && !self.collect_raw
            && !self.config.restrictions().allows(sniff_code_of(code))
        {
            return false;
        }

        // 4. Codes already memoized as suppressed for this file path.
        if self.ignored_codes.contains(code) {
            return false;
        }

        // 5. Ruleset-forced error/warning coercion.
        let kind = self
            .config
            .resolve_override(code, |policy| policy.coerce)
            .unwrap_or(kind);

        if !self.collect_raw {
            // 6. Fast path: a zero class severity displays nothing at all.
            if !self.config.record_errors && self.config.class_min_severity(kind) == 0 {
                return false;
            }
        }

        // 7. Effective severity: ruleset override wins over the caller.
        let severity = self
            .config
            .resolve_override(code, |policy| policy.severity)
            .unwrap_or(if severity == 0 { DEFAULT_SEVERITY } else { severity });

        if !self.collect_raw {
            // 8. Severity threshold: stored iff severity >= configured minimum.
            if severity < self.config.class_min_severity(kind) {
                return false;
            }

            // 9. Per-code path include/exclude patterns, most specific first.
            if !self.path_patterns_allow(code) {
                return false;
            }
        }

        // 10. Accept.
        match kind {
            ViolationKind::Error => self.error_count += 1,
            ViolationKind::Warning => self.warning_count += 1,
        }
        if fixable {
            self.fixable_count += 1;
        }

        if self.collect_raw || self.config.record_errors {
            let template = self
                .config
                .resolve_override(code, |policy| policy.message.clone());
            let message = substitute(template.as_deref().unwrap_or(message), data);
            let violation = Violation {
                kind,
                message,
                line,
                column,
                code: code.to_string(),
                severity,
                fixable,
            };
            if self.collect_raw {
                match kind {
                    ViolationKind::Error => self.raw_errors.push(violation),
                    ViolationKind::Warning => self.raw_warnings.push(violation),
                }
            } else {
                let map = match kind {
                    ViolationKind::Error => &mut self.errors,
                    ViolationKind::Warning => &mut self.warnings,
                };
                map.entry((line, column)).or_default().push(violation);
            }
        }

        true
    }

    /// Re-run the suppression pipeline against a previously stored,
    /// unfiltered violation set. This is how a cached raw set becomes the
    /// filtered set appropriate for the current run's configuration without
    /// re-tokenizing.
    pub fn replay(&mut self, errors: &[Violation], warnings: &[Violation]) {
        self.reset_pass();
        let was_collecting = self.collect_raw;
        self.collect_raw = false;
        self.replaying = true;
        for violation in errors.iter().chain(warnings) {
            self.record(
                violation.kind,
                &violation.message,
                violation.line,
                violation.column,
                &violation.code,
                &[],
                violation.severity,
                violation.fixable,
            );
        }
        self.replaying = false;
        self.collect_raw = was_collecting;
    }

    fn path_patterns_allow(&mut self, code: &str) -> bool {
        let path: &Path = &self.path;
        let mut any_includes = false;
        let mut include_matched = false;

        for variant in code_variants(code) {
            let Some(policy) = self.config.override_for(variant) else {
                continue;
            };
            if policy.exclude_matches(path) {
                // Memoized: repeated pattern evaluation for this code is
                // pointless for the rest of this file.
                self.ignored_codes.insert(code.to_string());
                return false;
            }
            if policy.has_include_patterns() {
                any_includes = true;
                include_matched |= policy.include_matches(path);
            }
        }

        // An include set that exists but never matched rejects, without the
        // memo: a more specific code may still match later.
        !(any_includes && !include_matched)
    }

    pub fn add_fixed(&mut self, count: u32) {
        self.fixed_count += count;
    }

    #[must_use]
    pub const fn error_count(&self) -> u32 {
        self.error_count
    }

    #[must_use]
    pub const fn warning_count(&self) -> u32 {
        self.warning_count
    }

    #[must_use]
    pub const fn fixable_count(&self) -> u32 {
        self.fixable_count
    }

    #[must_use]
    pub const fn fixed_count(&self) -> u32 {
        self.fixed_count
    }

    /// Restore counts directly from a cached entry (fast-path adoption).
    pub fn adopt_counts(&mut self, errors: u32, warnings: u32, fixable: u32) {
        self.error_count = errors;
        self.warning_count = warnings;
        self.fixable_count = fixable;
    }

    #[must_use]
    pub const fn errors(&self) -> &MessageMap {
        &self.errors
    }

    #[must_use]
    pub const fn warnings(&self) -> &MessageMap {
        &self.warnings
    }

    #[must_use]
    pub fn raw_errors(&self) -> &[Violation] {
        &self.raw_errors
    }

    #[must_use]
    pub fn raw_warnings(&self) -> &[Violation] {
        &self.raw_warnings
    }

    /// All stored violations in position order, errors and warnings
    /// interleaved by `(line, column)`.
    pub fn all(&self) -> impl Iterator<Item = &Violation> {
        let mut positions: Vec<&(u32, u32)> =
            self.errors.keys().chain(self.warnings.keys()).collect();
        positions.sort_unstable();
        positions.dedup();
        positions.into_iter().flat_map(|pos| {
            self.errors
                .get(pos)
                .into_iter()
                .chain(self.warnings.get(pos))
                .flatten()
        })
    }
}

/// Substitute `%s` placeholders in a message template from `data`, in order.
fn substitute(template: &str, data: &[String]) -> String {
    if data.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut values = data.iter();
    let mut rest = template;
    while let Some(at) = rest.find("%s") {
        out.push_str(&rest[..at]);
        match values.next() {
            Some(value) => out.push_str(value),
            None => out.push_str("%s"),
        }
        rest = &rest[at + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "violations_tests.rs"]
mod tests;
