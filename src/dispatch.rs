//! The single token walk that drives all listeners over one file.
//!
//! Listeners registered for a token's kind are invoked in registration
//! order, subject to per-listener state accumulated during the pass:
//! a "resume not before index N" guard (from a listener's own return value),
//! and a disabled memo (path-pattern mismatch or self-requested whole-file
//! ignore). Inline control directives are handled here as explicit messages:
//! an ignore-file marker terminates the pass after clearing the ledger, and a
//! set-property marker updates the registry's live configuration table.

use std::collections::{HashMap, HashSet};

use crate::annotations::Directive;
use crate::file::SourceFile;
use crate::sniff::Registry;
use crate::token::{SourceFormat, TokenKind};

/// Terminal state of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    FileIgnored,
}

pub(crate) fn run_pass(file: &mut SourceFile, registry: &Registry) -> PassOutcome {
    let mut skip_until: HashMap<usize, usize> = HashMap::new();
    let mut disabled: HashSet<usize> = HashSet::new();
    let mut found_code = false;
    let check_annotations = file.config().check_annotations;

    let count = file.store().len();
    for index in 0..count {
        let kind = file.store().kind(index);
        if kind != TokenKind::InlineHtml {
            found_code = true;
        }

        if check_annotations && kind.is_annotation_bearing() {
            let directive = file.directives().parse(file.store().text(index));
            match directive {
                Some(Directive::IgnoreFile) => {
                    file.ledger_mut().clear();
                    file.mark_ignored();
                    return PassOutcome::FileIgnored;
                }
                Some(Directive::Set {
                    sniff,
                    property,
                    value,
                }) => {
                    // Live reconfiguration, effective for the remainder of
                    // the run (subsequent tokens and subsequent files).
                    registry.set_property(&sniff, &property, value);
                }
                _ => {}
            }
        }

        for (listener_id, entry) in registry.listeners_for(kind) {
            if disabled.contains(&listener_id) {
                continue;
            }
            if skip_until.get(&listener_id).is_some_and(|&until| index < until) {
                continue;
            }
            if !entry.sniff.supported_formats().contains(&file.format()) {
                continue;
            }
            if !entry.allows_path(file.path()) {
                disabled.insert(listener_id);
                continue;
            }
            let props = registry.properties_for(entry.sniff.code());
            if let Some(until) = entry.sniff.process(file, index, &props) {
                skip_until.insert(listener_id, until);
            }
        }
    }

    if file.format() == SourceFormat::Php
        && !file.is_stdin()
        && !found_code
        && !file.config().short_open_tag
    {
        file.add_warning_on_line(
            "No PHP code was found in this file and short open tags are not allowed; \
             this file may be using short open tags but the interpreter does not allow them",
            1,
            "Internal.NoCodeFound",
        );
    }

    PassOutcome::Completed
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
