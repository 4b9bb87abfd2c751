pub mod annotations;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod file;
pub mod fixer;
pub mod fs_utils;
pub mod runner;
pub mod sniff;
pub mod token;
pub mod violations;

pub use config::RunConfig;
pub use dispatch::PassOutcome;
pub use error::{Result, TokenSniffError};
pub use file::SourceFile;
pub use runner::Runner;
pub use sniff::{Registry, Sniff};
pub use token::{Token, TokenKind, TokenQuery, TokenStore, Tokenizer};
pub use violations::{Violation, ViolationKind};

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
