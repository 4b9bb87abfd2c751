//! Read-only run configuration shared by every file processed in one run.
//!
//! Per-code overrides carry the ruleset-derived policy the violation pipeline
//! consults: severity, error/warning coercion, custom message templates, and
//! include/exclude path patterns. Patterns are compiled once at construction.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use globset::{Glob, GlobMatcher};

use crate::violations::ViolationKind;
use crate::{Result, TokenSniffError};

/// Severity used when a sniff reports `0` ("use default").
pub const DEFAULT_SEVERITY: u8 = 5;

/// Hard ceiling on fixer convergence passes for one file.
pub const MAX_FIX_PASSES: u32 = 50;

/// Policy attached to one violation code (at any granularity: `Standard`,
/// `Standard.Category`, or `Standard.Category.Specific`).
#[derive(Debug, Clone, Default)]
pub struct CodeOverride {
    /// Forced severity; wins over the value the sniff reported.
    pub severity: Option<u8>,
    /// Force violations with this code to the given class (error↔warning).
    pub coerce: Option<ViolationKind>,
    /// Replacement message template; `%s` placeholders are substituted from
    /// the reporting sniff's data.
    pub message: Option<String>,
    include: Vec<CompiledPattern>,
    exclude: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    matcher: GlobMatcher,
}

fn compile(patterns: &[String]) -> Result<Vec<CompiledPattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map(|glob| CompiledPattern {
                    matcher: glob.compile_matcher(),
                })
                .map_err(|source| TokenSniffError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}

impl CodeOverride {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_severity(mut self, severity: u8) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub const fn with_coercion(mut self, kind: ViolationKind) -> Self {
        self.coerce = Some(kind);
        self
    }

    #[must_use]
    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = Some(template.into());
        self
    }

    /// Restrict this code to files matching one of `patterns`.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::InvalidPattern`] for an invalid glob.
    pub fn with_include_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.include = compile(patterns)?;
        Ok(self)
    }

    /// Suppress this code for files matching one of `patterns`.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::InvalidPattern`] for an invalid glob.
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = compile(patterns)?;
        Ok(self)
    }

    #[must_use]
    pub fn has_include_patterns(&self) -> bool {
        !self.include.is_empty()
    }

    #[must_use]
    pub fn include_matches(&self, path: &Path) -> bool {
        self.include.iter().any(|p| p.matcher.is_match(path))
    }

    #[must_use]
    pub fn exclude_matches(&self, path: &Path) -> bool {
        self.exclude.iter().any(|p| p.matcher.is_match(path))
    }
}

/// Explicit sniff allow/deny lists, active when a run is limited to (or told
/// to skip) specific sniffs. Identities are two-segment sniff codes
/// (`Standard.Category`).
#[derive(Debug, Clone, Default)]
pub struct SniffRestrictions {
    pub include: HashSet<String>,
    pub exclude: HashSet<String>,
}

impl SniffRestrictions {
    #[must_use]
    pub fn allows(&self, sniff_code: &str) -> bool {
        if self.exclude.contains(sniff_code) {
            return false;
        }
        self.include.is_empty() || self.include.contains(sniff_code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Tab width used for visual-length accounting, passed to tokenizers.
    pub tab_width: usize,
    /// Forced end-of-line marker for rewritten content; `None` preserves the
    /// marker detected from each file.
    pub eol: Option<String>,
    /// Minimum severity an error must reach to be kept.
    pub error_severity: u8,
    /// Minimum severity a warning must reach to be kept.
    pub warning_severity: u8,
    /// When false, the engine runs in fast-path mode: counts are maintained
    /// but messages are neither formatted nor stored.
    pub record_errors: bool,
    /// Whether the embedding interpreter would accept `<?` short open tags;
    /// controls the no-code-found warning.
    pub short_open_tag: bool,
    /// Whether inline `phpcs:` annotations are honored at all.
    pub check_annotations: bool,
    overrides: HashMap<String, CodeOverride>,
    restrictions: SniffRestrictions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tab_width: 4,
            eol: None,
            error_severity: DEFAULT_SEVERITY,
            warning_severity: DEFAULT_SEVERITY,
            record_errors: true,
            short_open_tag: false,
            check_annotations: true,
            overrides: HashMap::new(),
            restrictions: SniffRestrictions::default(),
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_override(&mut self, code: impl Into<String>, policy: CodeOverride) {
        self.overrides.insert(code.into(), policy);
    }

    pub fn set_restrictions(&mut self, restrictions: SniffRestrictions) {
        self.restrictions = restrictions;
    }

    #[must_use]
    pub const fn restrictions(&self) -> &SniffRestrictions {
        &self.restrictions
    }

    #[must_use]
    pub fn override_for(&self, code: &str) -> Option<&CodeOverride> {
        self.overrides.get(code)
    }

    /// Resolve an override property by walking the code's granularities, most
    /// specific first.
    pub(crate) fn resolve_override<T>(
        &self,
        code: &str,
        pick: impl Fn(&CodeOverride) -> Option<T>,
    ) -> Option<T> {
        for variant in code_variants(code) {
            if let Some(policy) = self.overrides.get(variant)
                && let Some(value) = pick(policy)
            {
                return Some(value);
            }
        }
        None
    }

    /// Minimum severity a violation of the given class must reach.
    #[must_use]
    pub const fn class_min_severity(&self, kind: ViolationKind) -> u8 {
        match kind {
            ViolationKind::Error => self.error_severity,
            ViolationKind::Warning => self.warning_severity,
        }
    }
}

/// Granularities of a dot-separated code, most specific first:
/// `Standard.Category.Specific`, `Standard.Category`, `Standard`.
pub(crate) fn code_variants(code: &str) -> impl Iterator<Item = &str> {
    let mut ends: Vec<usize> = code
        .char_indices()
        .filter(|&(_, c)| c == '.')
        .map(|(i, _)| i)
        .collect();
    ends.push(code.len());
    ends.into_iter().rev().map(|end| &code[..end])
}

/// Two-segment sniff identity (`Standard.Category`) of a violation code.
#[must_use]
pub fn sniff_code_of(code: &str) -> &str {
    let mut dots = 0;
    for (i, c) in code.char_indices() {
        if c == '.' {
            dots += 1;
            if dots == 2 {
                return &code[..i];
            }
        }
    }
    code
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
