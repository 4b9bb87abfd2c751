//! One unit of work: a source file (or ad-hoc content) being checked.
//!
//! A `SourceFile` owns exactly one current token store, one violation ledger,
//! and one fixer. Lifecycle: created → content assigned → tokenized →
//! processed (once per fixer convergence pass) → finalized → disposed. A file
//! marked ignored short-circuits all further processing and discards any
//! violations already recorded for it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::annotations::{DirectiveParser, SuppressionMap};
use crate::cache::CacheEntry;
use crate::config::{MAX_FIX_PASSES, RunConfig};
use crate::dispatch::{self, PassOutcome};
use crate::fixer::Fixer;
use crate::sniff::Registry;
use crate::token::{SourceFormat, TokenStore, Tokenizer};
use crate::violations::{Ledger, ViolationKind};
use crate::{Result, TokenSniffError};

/// Sentinel path for unsaved/standard-input content.
pub const STDIN_PATH: &str = "STDIN";

/// First-line directive that assigns a real path to ad-hoc content.
const INPUT_FILE_DIRECTIVE: &str = "phpcs_input_file:";

/// Per-metric value buckets: metric name → value → occurrence count.
pub type MetricMap = HashMap<String, HashMap<String, u32>>;

pub struct SourceFile {
    path: PathBuf,
    content: String,
    eol: String,
    eol_warning: bool,
    config: Arc<RunConfig>,
    directives: DirectiveParser,
    store: TokenStore,
    ledger: Ledger,
    fixer: Fixer,
    format: SourceFormat,
    metrics: MetricMap,
    metric_seen: HashSet<(usize, String)>,
    tokenized: bool,
    ignored: bool,
    from_cache: bool,
    token_count: u32,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: Arc<RunConfig>) -> Self {
        let path = path.into();
        Self {
            ledger: Ledger::new(Arc::clone(&config), path.clone()),
            path,
            content: String::new(),
            eol: "\n".to_string(),
            eol_warning: false,
            config,
            directives: DirectiveParser::new(),
            store: TokenStore::default(),
            fixer: Fixer::new(),
            format: SourceFormat::Php,
            metrics: MetricMap::new(),
            metric_seen: HashSet::new(),
            tokenized: false,
            ignored: false,
            from_cache: false,
            token_count: 0,
        }
    }

    /// Create a file by reading `path` from disk.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::FileRead`] when the content cannot be read.
    pub fn from_path(path: impl Into<PathBuf>, config: Arc<RunConfig>) -> Result<Self> {
        let path = path.into();
        let content =
            std::fs::read_to_string(&path).map_err(|source| TokenSniffError::FileRead {
                path: path.clone(),
                source,
            })?;
        let mut file = Self::new(path, config);
        file.set_content(content);
        Ok(file)
    }

    /// Create a file from ad-hoc (non-path-backed) content.
    ///
    /// When the first line is a `phpcs_input_file:` directive, the named path
    /// is adopted and the directive line itself is stripped from the content.
    #[must_use]
    pub fn from_stdin(content: String, config: Arc<RunConfig>) -> Self {
        let mut file = Self::new(STDIN_PATH, config);
        if let Some(rest) = content.strip_prefix(INPUT_FILE_DIRECTIVE) {
            let (first_line, remainder) = match rest.split_once('\n') {
                Some((line, remainder)) => (line, remainder.to_string()),
                None => (rest, String::new()),
            };
            file.path = PathBuf::from(first_line.trim());
            file.ledger.set_path(file.path.clone());
            file.set_content(remainder);
        } else {
            file.set_content(content);
        }
        file
    }

    /// Assign content and detect its end-of-line marker. Detection failure
    /// (no line ending present at all) is a partial degradation, reported as
    /// one internal warning on line 1 once processing runs; the file is not
    /// marked ignored.
    pub fn set_content(&mut self, content: String) {
        match detect_line_endings(&content) {
            Some(eol) => {
                self.eol = self.config.eol.clone().unwrap_or(eol);
                self.eol_warning = false;
            }
            None => {
                self.eol = self.config.eol.clone().unwrap_or_else(|| "\n".to_string());
                self.eol_warning = true;
            }
        }
        self.content = content;
        self.tokenized = false;
        self.ignored = false;
    }

    /// Replacement content produced by a fixer pass; the detected EOL is kept.
    fn set_fixed_content(&mut self, content: String) {
        self.content = content;
        self.tokenized = false;
    }

    /// Run one dispatch pass: tokenize if needed, then walk the token stream
    /// invoking listeners. Counts are recomputed from scratch each pass.
    pub fn process(&mut self, registry: &Registry, tokenizer: &dyn Tokenizer) -> PassOutcome {
        self.ledger.reset_pass();
        if self.ignored {
            return PassOutcome::FileIgnored;
        }
        if self.eol_warning {
            self.add_warning_on_line(
                "File appears to have no line endings; line-based reporting may be inaccurate",
                1,
                "Internal.DetectLineEndings",
            );
        }
        self.parse(tokenizer);
        if self.ignored {
            return PassOutcome::FileIgnored;
        }
        self.fixer.start_pass(&self.store, &self.eol);
        dispatch::run_pass(self, registry)
    }

    /// Apply fixes until no sniff proposes further changes.
    ///
    /// Each pass snapshots the content, runs a full dispatch pass, applies
    /// every committed edit, re-tokenizes from scratch, and repeats. Returns
    /// the total number of token mutations applied.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::FixerNonConvergence`] when the loop-guard
    /// ceiling is hit, which means two sniffs are proposing mutually-undoing
    /// edits forever.
    pub fn fix(&mut self, registry: &Registry, tokenizer: &dyn Tokenizer) -> Result<u32> {
        self.fixer.reset();
        self.fixer.set_enabled(true);
        let mut passes: u32 = 0;
        let mut total: u32 = 0;
        loop {
            passes += 1;
            if passes > MAX_FIX_PASSES {
                self.fixer.set_enabled(false);
                return Err(TokenSniffError::FixerNonConvergence {
                    path: self.path.clone(),
                    passes: MAX_FIX_PASSES,
                });
            }
            let outcome = self.process(registry, tokenizer);
            if outcome == PassOutcome::FileIgnored {
                break;
            }
            let fixes = self.fixer.fix_count();
            self.ledger.add_fixed(fixes);
            total += fixes;
            if fixes == 0 {
                tracing::debug!(path = %self.path.display(), passes, "fixer converged");
                break;
            }
            let content = self.fixer.contents();
            self.fixer.finish_pass();
            self.set_fixed_content(content);
        }
        self.fixer.set_enabled(false);
        Ok(total)
    }

    fn parse(&mut self, tokenizer: &dyn Tokenizer) {
        if self.tokenized {
            return;
        }
        self.format = tokenizer.format();
        match tokenizer.tokenize(&self.content, self.config.tab_width) {
            Ok(tokens) => {
                self.store = TokenStore::new(tokens);
                self.token_count = u32::try_from(self.store.len()).unwrap_or(u32::MAX);
                let suppressions = if self.config.check_annotations {
                    SuppressionMap::build(&self.store, &self.directives)
                } else {
                    SuppressionMap::default()
                };
                self.ledger.set_suppressions(suppressions);
                self.tokenized = true;
            }
            Err(error) => {
                self.add_warning_on_line(
                    &format!(
                        "An error occurred during processing; checking has been aborted. The error message was: {}",
                        error.message
                    ),
                    1,
                    "Internal.Tokenizer.Exception",
                );
                self.ignored = true;
            }
        }
    }

    /// Mark the file ignored: all further processing is short-circuited and
    /// violations recorded so far are discarded by the dispatcher.
    pub fn mark_ignored(&mut self) {
        self.ignored = true;
    }

    #[must_use]
    pub const fn ignored(&self) -> bool {
        self.ignored
    }

    #[must_use]
    pub fn is_stdin(&self) -> bool {
        self.path.as_os_str() == STDIN_PATH
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn eol(&self) -> &str {
        &self.eol
    }

    #[must_use]
    pub const fn format(&self) -> SourceFormat {
        self.format
    }

    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub const fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    #[must_use]
    pub const fn fixer(&self) -> &Fixer {
        &self.fixer
    }

    pub const fn fixer_mut(&mut self) -> &mut Fixer {
        &mut self.fixer
    }

    #[must_use]
    pub const fn config(&self) -> &Arc<RunConfig> {
        &self.config
    }

    #[must_use]
    pub const fn directives(&self) -> &DirectiveParser {
        &self.directives
    }

    #[must_use]
    pub const fn token_count(&self) -> u32 {
        self.token_count
    }

    #[must_use]
    pub const fn from_cache(&self) -> bool {
        self.from_cache
    }

    // ----- violation helpers (the sniff-facing reporting surface) -----

    /// Report an error at a token. Returns whether it was stored.
    pub fn add_error(
        &mut self,
        message: &str,
        index: usize,
        code: &str,
        data: &[String],
        severity: u8,
    ) -> bool {
        let (line, column) = self.position_of(index);
        self.ledger.record(
            ViolationKind::Error,
            message,
            line,
            column,
            code,
            data,
            severity,
            false,
        )
    }

    pub fn add_warning(
        &mut self,
        message: &str,
        index: usize,
        code: &str,
        data: &[String],
        severity: u8,
    ) -> bool {
        let (line, column) = self.position_of(index);
        self.ledger.record(
            ViolationKind::Warning,
            message,
            line,
            column,
            code,
            data,
            severity,
            false,
        )
    }

    /// Report an error the calling sniff can fix. Returns true when the
    /// violation was stored *and* fixing is enabled, i.e. when the caller
    /// should go ahead and build its edit.
    pub fn add_fixable_error(
        &mut self,
        message: &str,
        index: usize,
        code: &str,
        data: &[String],
        severity: u8,
    ) -> bool {
        let (line, column) = self.position_of(index);
        let recorded = self.ledger.record(
            ViolationKind::Error,
            message,
            line,
            column,
            code,
            data,
            severity,
            true,
        );
        recorded && self.fixer.enabled()
    }

    pub fn add_fixable_warning(
        &mut self,
        message: &str,
        index: usize,
        code: &str,
        data: &[String],
        severity: u8,
    ) -> bool {
        let (line, column) = self.position_of(index);
        let recorded = self.ledger.record(
            ViolationKind::Warning,
            message,
            line,
            column,
            code,
            data,
            severity,
            true,
        );
        recorded && self.fixer.enabled()
    }

    pub fn add_error_on_line(&mut self, message: &str, line: u32, code: &str) -> bool {
        self.ledger
            .record(ViolationKind::Error, message, line, 1, code, &[], 0, false)
    }

    pub fn add_warning_on_line(&mut self, message: &str, line: u32, code: &str) -> bool {
        self.ledger
            .record(ViolationKind::Warning, message, line, 1, code, &[], 0, false)
    }

    fn position_of(&self, index: usize) -> (u32, u32) {
        self.store
            .get(index)
            .map_or((1, 1), |token| (token.line, token.column))
    }

    // ----- metrics -----

    /// Record a named metric observation for a token. The same
    /// `(token, metric)` pair is counted at most once.
    pub fn record_metric(&mut self, index: usize, metric: &str, value: &str) -> bool {
        if !self.metric_seen.insert((index, metric.to_string())) {
            return false;
        }
        *self
            .metrics
            .entry(metric.to_string())
            .or_default()
            .entry(value.to_string())
            .or_insert(0) += 1;
        true
    }

    #[must_use]
    pub const fn metrics(&self) -> &MetricMap {
        &self.metrics
    }

    // ----- result-cache integration -----

    /// Collect the least-filtered violation set during processing so it can
    /// be written to the result cache.
    pub fn set_collect_raw(&mut self, collect_raw: bool) {
        self.ledger.set_collect_raw(collect_raw);
    }

    #[must_use]
    pub fn to_cache_entry(&self, hash: String) -> CacheEntry {
        CacheEntry {
            hash,
            errors: self.ledger.raw_errors().to_vec(),
            warnings: self.ledger.raw_warnings().to_vec(),
            metrics: self.metrics.clone(),
            error_count: self.ledger.error_count(),
            warning_count: self.ledger.warning_count(),
            fixable_count: self.ledger.fixable_count(),
            token_count: self.token_count,
        }
    }

    /// Adopt a cached entry instead of processing. Metrics and the token
    /// count are taken directly; counts are adopted as-is when message
    /// detail is not being recorded this run, otherwise the raw set is
    /// replayed through the suppression pipeline so the current run's
    /// filters still apply.
    pub fn adopt_cached(&mut self, entry: &CacheEntry) {
        self.metrics = entry.metrics.clone();
        self.token_count = entry.token_count;
        self.from_cache = true;
        if self.config.record_errors {
            self.ledger.replay(&entry.errors, &entry.warnings);
        } else {
            self.ledger
                .adopt_counts(entry.error_count, entry.warning_count, entry.fixable_count);
        }
    }

    /// Re-filter the raw set collected this run for immediate reporting.
    pub fn replay_raw(&mut self) {
        self.set_collect_raw(false);
        let errors = self.ledger.raw_errors().to_vec();
        let warnings = self.ledger.raw_warnings().to_vec();
        self.ledger.replay(&errors, &warnings);
    }

    /// Release the large per-file buffers once results have been consumed.
    pub fn dispose(&mut self) {
        self.content = String::new();
        self.store = TokenStore::default();
        self.fixer = Fixer::new();
        self.metric_seen = HashSet::new();
        self.tokenized = false;
    }
}

/// Detect the end-of-line marker from the first line break in `content`.
fn detect_line_endings(content: &str) -> Option<String> {
    let bytes = content.as_bytes();
    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    return Some("\r\n".to_string());
                }
                return Some("\r".to_string());
            }
            b'\n' => return Some("\n".to_string()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
