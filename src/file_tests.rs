//! Tests for the file lifecycle: content assignment, tokenization failure,
//! metrics, and the fix convergence loop.

use std::sync::Arc;

use super::*;
use crate::sniff::{Sniff, SniffProperties};
use crate::test_fixtures::{
    MiniTokenizer, SpacingSniff, VarSniff, check, default_config, registry_of,
};
use crate::token::TokenKind;

#[test]
fn detects_unix_line_endings() {
    let mut file = SourceFile::new("a.php", default_config());
    file.set_content("<?php\n$a = 1;\n".to_string());
    assert_eq!(file.eol(), "\n");
}

#[test]
fn detects_windows_line_endings() {
    let mut file = SourceFile::new("a.php", default_config());
    file.set_content("<?php\r\n$a = 1;\r\n".to_string());
    assert_eq!(file.eol(), "\r\n");
}

#[test]
fn configured_eol_overrides_detection() {
    let mut config = crate::config::RunConfig::default();
    config.eol = Some("\n".to_string());
    let mut file = SourceFile::new("a.php", Arc::new(config));
    file.set_content("<?php\r\n".to_string());
    assert_eq!(file.eol(), "\n");
}

#[test]
fn missing_line_endings_degrade_with_a_warning() {
    let mut file = SourceFile::new("a.php", default_config());
    file.set_content("<?php $a = 1;".to_string());
    assert_eq!(file.eol(), "\n", "falls back to the platform default");

    file.process(&registry_of(vec![]), &MiniTokenizer::new());
    assert!(!file.ignored(), "detection failure is not fatal");
    let stored = file.ledger().warnings().get(&(1, 1)).expect("warning on line 1");
    assert_eq!(stored[0].code, "Internal.DetectLineEndings");
}

#[test]
fn input_file_directive_assigns_the_path() {
    let content = "phpcs_input_file: /tmp/example.php\n<?php\n$a = 1;\n";
    let mut file = SourceFile::from_stdin(content.to_string(), default_config());

    assert_eq!(file.path(), std::path::Path::new("/tmp/example.php"));
    assert!(!file.is_stdin());
    assert_eq!(file.content(), "<?php\n$a = 1;\n", "the directive line is stripped");

    file.process(&registry_of(vec![]), &MiniTokenizer::new());
    let has_directive_token = file
        .store()
        .iter()
        .any(|t| t.text.contains("phpcs_input_file"));
    assert!(!has_directive_token);
}

#[test]
fn stdin_without_directive_keeps_the_sentinel() {
    let file = SourceFile::from_stdin("<?php\n$a = 1;\n".to_string(), default_config());
    assert!(file.is_stdin());
}

#[test]
fn tokenizer_failure_marks_the_file_ignored_with_one_warning() {
    let mut file = SourceFile::new("broken.php", default_config());
    file.set_content("<?php\n$a = 1;\n".to_string());
    file.process(&registry_of(vec![Arc::new(VarSniff::new())]), &MiniTokenizer::failing());

    assert!(file.ignored());
    assert_eq!(file.ledger().warning_count(), 1);
    assert_eq!(file.ledger().error_count(), 0, "no listener ever ran");
    let stored = file.ledger().warnings().get(&(1, 1)).expect("warning on line 1");
    assert_eq!(stored[0].code, "Internal.Tokenizer.Exception");
    assert!(stored[0].message.contains("maximum nesting level reached"));
}

#[test]
fn violations_carry_token_positions() {
    let file = check("<?php\n$a = 1;\n", vec![Arc::new(VarSniff::new())]);
    let stored = file.ledger().errors().get(&(2, 1)).expect("error at $a");
    assert_eq!(stored[0].message, "Variable $a found");
}

#[test]
fn metric_dedup_counts_each_token_once() {
    let mut file = SourceFile::new("a.php", default_config());
    assert!(file.record_metric(3, "line length", "80"));
    assert!(!file.record_metric(3, "line length", "80"), "same pair is dropped");
    assert!(!file.record_metric(3, "line length", "120"), "value does not matter");
    assert!(file.record_metric(4, "line length", "80"));

    let buckets = &file.metrics()["line length"];
    assert_eq!(buckets["80"], 2);
    assert_eq!(buckets.get("120"), None);
}

#[test]
fn fixable_error_reports_whether_to_fix() {
    // With the fixer disabled (dry-run counting), the violation is recorded
    // but the sniff is told not to build its edit.
    let file = check("<?php\n$a=  1;\n", vec![Arc::new(SpacingSniff)]);
    assert_eq!(file.ledger().error_count(), 2);
    assert_eq!(file.ledger().fixable_count(), 2);
    assert_eq!(file.ledger().fixed_count(), 0);
}

#[test]
fn spacing_scenario_flags_the_extra_space() {
    let file = check("<?php\n$a=  1;\n", vec![Arc::new(SpacingSniff)]);
    let stored = file.ledger().errors().get(&(2, 4)).expect("error at the extra space");
    assert_eq!(stored[0].message, "Expected 1 space after assignment operator; 2 found");
}

#[test]
fn spacing_scenario_converges_in_one_fixing_pass() {
    let config = default_config();
    let registry = registry_of(vec![Arc::new(SpacingSniff)]);
    let mut file = SourceFile::from_stdin("<?php\n$a=  1;\n".to_string(), config);

    let fixed = file.fix(&registry, &MiniTokenizer::new()).expect("converges");
    assert_eq!(fixed, 2, "one insertion and one replacement");
    assert_eq!(file.content(), "<?php\n$a = 1;\n");
    assert_eq!(file.ledger().fixed_count(), 2);
    assert_eq!(file.ledger().error_count(), 0, "the converged content is clean");
}

#[test]
fn fixing_is_idempotent() {
    let config = default_config();
    let registry = registry_of(vec![Arc::new(SpacingSniff)]);
    let mut file = SourceFile::from_stdin("<?php\n$a=  1;\n".to_string(), config);

    file.fix(&registry, &MiniTokenizer::new()).expect("first run converges");
    let converged = file.content().to_string();

    let again = file.fix(&registry, &MiniTokenizer::new()).expect("second run converges");
    assert_eq!(again, 0, "a converged file proposes no further edits");
    assert_eq!(file.content(), converged);
}

/// Flips a literal between two values forever; can never converge.
struct OscillatingSniff;

impl Sniff for OscillatingSniff {
    fn code(&self) -> &str {
        "Fixture.Oscillate"
    }

    fn register(&self) -> Vec<TokenKind> {
        vec![TokenKind::Number]
    }

    fn process(
        &self,
        file: &mut SourceFile,
        index: usize,
        _props: &SniffProperties,
    ) -> Option<usize> {
        let text = file.store().text(index).to_string();
        let replacement = if text == "1" { "2" } else { "1" };
        let fix = file.add_fixable_error(
            "Literal must change",
            index,
            "Fixture.Oscillate.Flip",
            &[],
            0,
        );
        if fix {
            file.fixer_mut().replace_token(index, replacement);
        }
        None
    }
}

#[test]
fn non_convergence_hits_the_loop_guard() {
    let config = default_config();
    let registry = registry_of(vec![Arc::new(OscillatingSniff)]);
    let mut file = SourceFile::from_stdin("<?php\n$a = 1;\n".to_string(), config);

    let result = file.fix(&registry, &MiniTokenizer::new());
    assert!(matches!(
        result,
        Err(crate::TokenSniffError::FixerNonConvergence { passes: 50, .. })
    ));
}

#[test]
fn ignored_file_short_circuits_fixing() {
    let config = default_config();
    let registry = registry_of(vec![Arc::new(SpacingSniff)]);
    let mut file = SourceFile::from_stdin(
        "<?php\n// phpcs:ignoreFile\n$a=  1;\n".to_string(),
        config,
    );

    let fixed = file.fix(&registry, &MiniTokenizer::new()).expect("terminates");
    assert_eq!(fixed, 0);
    assert_eq!(file.content(), "<?php\n// phpcs:ignoreFile\n$a=  1;\n");
}

#[test]
fn counts_reset_between_passes_but_fixed_total_accumulates() {
    let config = default_config();
    let registry = registry_of(vec![Arc::new(SpacingSniff)]);
    let mut file = SourceFile::from_stdin("<?php\n$a=  1;\n".to_string(), config);

    file.fix(&registry, &MiniTokenizer::new()).expect("converges");
    // Final pass found nothing; only the fix total survives.
    assert_eq!(file.ledger().error_count(), 0);
    assert_eq!(file.ledger().fixed_count(), 2);
}

#[test]
fn dispose_releases_buffers() {
    let mut file = check("<?php\n$a = 1;\n", vec![Arc::new(VarSniff::new())]);
    let errors_before = file.ledger().error_count();
    file.dispose();
    assert!(file.content().is_empty());
    assert_eq!(file.store().len(), 0);
    assert_eq!(file.ledger().error_count(), errors_before, "counts survive disposal");
}
