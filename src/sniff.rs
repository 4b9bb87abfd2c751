//! The sniff capability interface and the listener registry.
//!
//! A registry is built once per run from the loaded ruleset: each sniff is
//! constructed, asked which token kinds it listens for, and indexed under a
//! stable string code. Dispatch order for listeners sharing a token kind is
//! registration order. The registry also owns the live property table that
//! inline `phpcs:set` directives mutate; listeners read current values from
//! the snapshot handed to each `process` call.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use globset::{Glob, GlobMatcher};

use crate::file::SourceFile;
use crate::token::{SourceFormat, TokenKind};
use crate::{Result, TokenSniffError};

/// Live configuration snapshot for one listener, keyed by property name.
pub type SniffProperties = HashMap<String, String>;

/// A rule-checking unit. Implementations are stateless per call; mutable
/// configuration lives in the registry's property table.
pub trait Sniff: Send + Sync {
    /// Stable two-segment identity (`Standard.Category`) used for
    /// registration, restrictions, and `phpcs:set` targeting.
    fn code(&self) -> &str;

    /// Token kinds this sniff wants to be invoked for.
    fn register(&self) -> Vec<TokenKind>;

    /// Token-source formats this sniff understands.
    fn supported_formats(&self) -> &[SourceFormat] {
        const PHP_ONLY: &[SourceFormat] = &[SourceFormat::Php];
        PHP_ONLY
    }

    /// Process one token. Returning `Some(n)` skips all tokens before `n`
    /// for this listener for the remainder of the current pass.
    fn process(&self, file: &mut SourceFile, index: usize, props: &SniffProperties)
    -> Option<usize>;
}

pub struct ListenerEntry {
    pub sniff: Arc<dyn Sniff>,
    include: Vec<GlobMatcher>,
    exclude: Vec<GlobMatcher>,
}

impl ListenerEntry {
    /// Whether this listener's path patterns allow `path`. `false` is
    /// memoized by the dispatcher as "disabled for this file".
    #[must_use]
    pub fn allows_path(&self, path: &Path) -> bool {
        if self.exclude.iter().any(|m| m.is_match(path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|m| m.is_match(path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<GlobMatcher>> {
    patterns
        .iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map(|glob| glob.compile_matcher())
                .map_err(|source| TokenSniffError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}

#[derive(Default)]
pub struct Registry {
    listeners: Vec<ListenerEntry>,
    by_kind: HashMap<TokenKind, Vec<usize>>,
    by_code: HashMap<String, usize>,
    properties: Mutex<HashMap<(String, String), String>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sniff with no path restrictions.
    ///
    /// # Errors
    /// Never fails today; kept fallible to match
    /// [`Self::register_with_patterns`].
    pub fn register(&mut self, sniff: Arc<dyn Sniff>) -> Result<()> {
        self.register_with_patterns(sniff, &[], &[])
    }

    /// Register a sniff restricted to (or excluded from) paths matching the
    /// given glob patterns.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::InvalidPattern`] for an invalid glob.
    pub fn register_with_patterns(
        &mut self,
        sniff: Arc<dyn Sniff>,
        include: &[String],
        exclude: &[String],
    ) -> Result<()> {
        let entry = ListenerEntry {
            include: compile(include)?,
            exclude: compile(exclude)?,
            sniff,
        };
        let index = self.listeners.len();
        self.by_code.insert(entry.sniff.code().to_string(), index);
        for kind in entry.sniff.register() {
            self.by_kind.entry(kind).or_default().push(index);
        }
        self.listeners.push(entry);
        Ok(())
    }

    /// Listeners registered for `kind`, in registration order, with their
    /// registry-wide listener ids.
    pub fn listeners_for(&self, kind: TokenKind) -> impl Iterator<Item = (usize, &ListenerEntry)> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|&index| (index, &self.listeners[index]))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Set a listener property for the remainder of the run. Directives
    /// naming an unknown listener are ignored.
    pub fn set_property(&self, sniff_code: &str, property: &str, value: impl Into<String>) {
        if !self.by_code.contains_key(sniff_code) {
            tracing::debug!(sniff = sniff_code, property, "phpcs:set for unknown sniff ignored");
            return;
        }
        let mut table = self.properties.lock().expect("property table poisoned");
        table.insert((sniff_code.to_string(), property.to_string()), value.into());
    }

    #[must_use]
    pub fn property(&self, sniff_code: &str, property: &str) -> Option<String> {
        let table = self.properties.lock().expect("property table poisoned");
        table
            .get(&(sniff_code.to_string(), property.to_string()))
            .cloned()
    }

    /// Current property snapshot for one listener.
    #[must_use]
    pub fn properties_for(&self, sniff_code: &str) -> SniffProperties {
        let table = self.properties.lock().expect("property table poisoned");
        table
            .iter()
            .filter(|((code, _), _)| code == sniff_code)
            .map(|((_, property), value)| (property.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "sniff_tests.rs"]
mod tests;
