//! Inline annotation directives and the per-line suppression map.
//!
//! The engine is directive-compatible with the `phpcs:` comment family:
//!
//! - `phpcs:ignoreFile` — discard the whole file.
//! - `phpcs:ignore [codes]` — suppress on one line: the comment's own line
//!   when it trails other tokens, the next line when it stands alone.
//! - `phpcs:disable [codes]` / `phpcs:enable [codes]` — suppress a line
//!   range; enabling a subset while a broader disable is active records an
//!   "except" allow-list for those codes.
//! - `phpcs:set Standard.Category property value` — reconfigure a listener
//!   for the remainder of the run.
//!
//! Codes are comma-separated and match at any prefix granularity
//! (`Standard`, `Standard.Category`, `Standard.Category.Specific`). Anything
//! after ` -- ` is a free-form note.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::config::code_variants;
use crate::token::{TokenKind, TokenStore};

/// A parsed inline control directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    IgnoreFile,
    IgnoreLine { codes: Vec<String> },
    Disable { codes: Vec<String> },
    Enable { codes: Vec<String> },
    Set {
        sniff: String,
        property: String,
        value: String,
    },
}

pub struct DirectiveParser {
    pattern: Regex,
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectiveParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"@?phpcs:(ignoreFile|ignore|disable|enable|set)\b[ \t]*(.*)")
                .expect("Invalid regex"),
        }
    }

    /// Parse a directive out of raw comment text, if one is present.
    #[must_use]
    pub fn parse(&self, comment_text: &str) -> Option<Directive> {
        let caps = self.pattern.captures(comment_text)?;
        let command = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps.get(2).map_or("", |m| m.as_str());
        // Strip free-form notes and a block-comment closer.
        let rest = rest.split("--").next().unwrap_or("");
        let rest = rest.trim_end_matches("*/").trim();

        match command {
            "ignoreFile" => Some(Directive::IgnoreFile),
            "ignore" => Some(Directive::IgnoreLine {
                codes: parse_codes(rest),
            }),
            "disable" => Some(Directive::Disable {
                codes: parse_codes(rest),
            }),
            "enable" => Some(Directive::Enable {
                codes: parse_codes(rest),
            }),
            "set" => {
                let mut parts = rest.split_whitespace();
                let sniff = parts.next()?.to_string();
                let property = parts.next()?.to_string();
                let value = parts.collect::<Vec<_>>().join(" ");
                Some(Directive::Set {
                    sniff,
                    property,
                    value,
                })
            }
            _ => None,
        }
    }
}

fn parse_codes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

/// Suppression rules in force on one source line.
#[derive(Debug, Clone, Default)]
pub struct LineRules {
    /// A bare `phpcs:ignore` marker: reject everything on this line, with no
    /// possible allow-list.
    pub hard_all: bool,
    /// A `phpcs:disable` with no codes is active across this line.
    pub all: bool,
    /// Codes (at any granularity) suppressed on this line.
    pub codes: HashSet<String>,
    /// Codes re-enabled while a broader disable is active.
    pub except: HashSet<String>,
}

impl LineRules {
    fn merge_ignore(&mut self, codes: &[String]) {
        if codes.is_empty() {
            self.hard_all = true;
        } else {
            self.codes.extend(codes.iter().cloned());
        }
    }

    fn merge_active(&mut self, active: &ActiveDisable) {
        self.all |= active.all;
        self.codes.extend(active.codes.iter().cloned());
        self.except.extend(active.except.iter().cloned());
    }

    /// Whether a violation with `code` is suppressed by this line's rules.
    /// An "except" entry for the code (or any of its prefixes) always wins,
    /// short of a hard full-line marker.
    #[must_use]
    pub fn suppresses(&self, code: &str) -> bool {
        if self.hard_all {
            return true;
        }
        if code_variants(code).any(|variant| self.except.contains(variant)) {
            return false;
        }
        if self.all {
            return true;
        }
        code_variants(code).any(|variant| self.codes.contains(variant))
    }
}

#[derive(Debug, Clone, Default)]
struct ActiveDisable {
    all: bool,
    codes: HashSet<String>,
    except: HashSet<String>,
}

impl ActiveDisable {
    fn is_active(&self) -> bool {
        self.all || !self.codes.is_empty()
    }
}

/// Per-line suppression state for one tokenization pass, consulted by the
/// violation pipeline before anything is stored.
#[derive(Debug, Clone, Default)]
pub struct SuppressionMap {
    lines: HashMap<u32, LineRules>,
}

impl SuppressionMap {
    /// Scan a token store for suppression directives.
    ///
    /// `phpcs:ignoreFile` and `phpcs:set` are left for the dispatch loop;
    /// only line-granular suppression state is collected here.
    #[must_use]
    pub fn build(store: &TokenStore, parser: &DirectiveParser) -> Self {
        let mut map = Self::default();
        let mut active = ActiveDisable::default();

        for (i, token) in store.iter().enumerate() {
            if active.is_active() {
                map.lines.entry(token.line).or_default().merge_active(&active);
            }

            if !token.kind.is_annotation_bearing() {
                continue;
            }
            match parser.parse(&token.text) {
                Some(Directive::IgnoreLine { codes }) => {
                    let target = if is_first_on_line(store, i) {
                        token.line + 1
                    } else {
                        token.line
                    };
                    map.lines.entry(target).or_default().merge_ignore(&codes);
                }
                Some(Directive::Disable { codes }) => {
                    if codes.is_empty() {
                        active.all = true;
                    } else {
                        for code in codes {
                            active.except.remove(&code);
                            active.codes.insert(code);
                        }
                    }
                }
                Some(Directive::Enable { codes }) => {
                    if codes.is_empty() {
                        active = ActiveDisable::default();
                    } else {
                        for code in codes {
                            active.codes.remove(&code);
                            if active.all {
                                active.except.insert(code);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        map
    }

    #[must_use]
    pub fn line(&self, line: u32) -> Option<&LineRules> {
        self.lines.get(&line)
    }

    #[must_use]
    pub fn suppresses(&self, line: u32, code: &str) -> bool {
        self.lines.get(&line).is_some_and(|rules| rules.suppresses(code))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Whether the token at `index` is the first non-whitespace token on its
/// physical line. A directive comment standing alone applies to the next
/// line; one trailing a statement applies to its own.
fn is_first_on_line(store: &TokenStore, index: usize) -> bool {
    let line = store.token(index).line;
    let mut i = index;
    while i > 0 {
        i -= 1;
        let token = store.token(i);
        if token.line < line {
            return true;
        }
        if token.kind != TokenKind::Whitespace {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod tests;
