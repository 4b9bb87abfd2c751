//! Batch processing entry points.
//!
//! Files are independent, share-nothing units of work: each owns its token
//! store, ledger, and fixer, so a batch parallelizes directly across a worker
//! pool. The registry, configuration, and tokenizer are shared read-only; the
//! result cache backend handles its own synchronization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::cache::{self, ResultCache};
use crate::config::RunConfig;
use crate::file::SourceFile;
use crate::sniff::Registry;
use crate::token::Tokenizer;
use crate::{Result, TokenSniffError};

pub struct Runner {
    config: Arc<RunConfig>,
    registry: Arc<Registry>,
    tokenizer: Arc<dyn Tokenizer>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl Runner {
    #[must_use]
    pub fn new(config: Arc<RunConfig>, registry: Arc<Registry>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            config,
            registry,
            tokenizer,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Arc<RunConfig> {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Check one file, consulting the result cache when one is attached.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::FileRead`] when the file cannot be read.
    pub fn process_file(&self, path: &Path) -> Result<SourceFile> {
        let file = SourceFile::from_path(path, Arc::clone(&self.config))?;
        Ok(self.run(file))
    }

    /// Check ad-hoc content (honors a leading `phpcs_input_file:` line).
    #[must_use]
    pub fn process_stdin(&self, content: String) -> SourceFile {
        let file = SourceFile::from_stdin(content, Arc::clone(&self.config));
        self.run(file)
    }

    /// Check many files across the worker pool.
    pub fn process_files(&self, paths: &[PathBuf]) -> Vec<Result<SourceFile>> {
        paths.par_iter().map(|path| self.process_file(path)).collect()
    }

    /// Fix one file to convergence, rewriting it in place when any edit was
    /// applied. Returns the processed file; its ledger reflects the state of
    /// the converged content.
    ///
    /// # Errors
    /// Returns [`TokenSniffError::FixerNonConvergence`] when the loop guard
    /// trips, and [`TokenSniffError::FileWrite`] when the rewrite fails.
    pub fn fix_file(&self, path: &Path) -> Result<SourceFile> {
        let mut file = SourceFile::from_path(path, Arc::clone(&self.config))?;
        let fixed = file.fix(&self.registry, self.tokenizer.as_ref())?;
        if fixed > 0 {
            std::fs::write(path, file.content()).map_err(|source| TokenSniffError::FileWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(file)
    }

    /// Fix many files across the worker pool.
    pub fn fix_files(&self, paths: &[PathBuf]) -> Vec<Result<SourceFile>> {
        paths.par_iter().map(|path| self.fix_file(path)).collect()
    }

    fn run(&self, mut file: SourceFile) -> SourceFile {
        if let Some(cache) = &self.cache {
            let hash = cache::content_hash(file.content());
            if let Some(entry) = cache.get(file.path())
                && entry.is_valid_for(&hash)
            {
                tracing::debug!(path = %file.path().display(), "result cache hit");
                file.adopt_cached(&entry);
                return file;
            }
            tracing::debug!(path = %file.path().display(), "result cache miss");
            file.set_collect_raw(true);
            file.process(&self.registry, self.tokenizer.as_ref());
            cache.set(file.path(), file.to_cache_entry(hash));
            // Filter the raw set for immediate reporting under this run's
            // configuration.
            file.replay_raw();
        } else {
            file.process(&self.registry, self.tokenizer.as_ref());
        }
        file
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
