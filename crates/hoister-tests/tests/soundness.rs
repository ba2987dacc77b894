//! Equivalence tests: every fixture must behave the same before and after
//! optimization.
//!
//! Each test parses a program, runs it, optimizes it, runs the result and
//! compares the printed lines and the returned value. Programs that fail at
//! run time must fail with the same error once optimized.

use anyhow::{anyhow, Result};
use hoister::parser::parse_program;
use hoister::{optimize_source, OptimizeOptions};
use hoister_tests::{run, Outcome, FAILING_FIXTURES, FIXTURES};

fn fixture(name: &str) -> Result<&'static str> {
    FIXTURES
        .iter()
        .chain(FAILING_FIXTURES)
        .find(|(n, _)| *n == name)
        .map(|(_, source)| *source)
        .ok_or_else(|| anyhow!("no fixture named {name}"))
}

/// Runs `name` before and after optimization and returns the optimized
/// source together with the shared outcome.
fn check(name: &str) -> Result<(String, Outcome)> {
    let source = fixture(name)?;
    let before = run(&parse_program(source)?)?;

    let optimized = optimize_source(source, &OptimizeOptions::default())?;
    println!("Optimized {name}:\n{optimized}");
    let after = run(&parse_program(&optimized)?)?;

    assert_eq!(before, after, "{name} changed behaviour");
    Ok((optimized, after))
}

/// Like [`check`] for a program expected to fail: both runs must stop with
/// the same error, which is returned.
fn check_failure(name: &str) -> Result<String> {
    let source = fixture(name)?;
    let before = run(&parse_program(source)?).map_err(|e| format!("{e:#}"));

    let optimized = optimize_source(source, &OptimizeOptions::default())?;
    println!("Optimized {name}:\n{optimized}");
    let after = run(&parse_program(&optimized)?).map_err(|e| format!("{e:#}"));

    assert_eq!(before, after, "{name} changed behaviour");
    after
        .err()
        .ok_or_else(|| anyhow!("{name} was expected to fail"))
}

#[test]
fn test_array_sum() -> Result<()> {
    let (optimized, outcome) = check("array_sum")?;
    assert!(optimized.contains("final var aLength = a.length;"));
    assert!(optimized.contains("final var aI = a[i];"));
    assert_eq!(outcome.lines, ["1034", "26", "12", "[1, 2, 5, 10, 17, 26]"]);
    Ok(())
}

#[test]
fn test_branches() -> Result<()> {
    let (optimized, _) = check("branches")?;
    assert!(optimized.contains("final var pX = p.x;"));
    assert!(optimized.contains("final var pY = p.y;"));
    Ok(())
}

#[test]
fn test_fields() -> Result<()> {
    let (optimized, outcome) = check("fields")?;
    assert!(optimized.contains("final var headNext = head.next;"));
    assert_eq!(outcome.lines, ["6", "6", "23", "7", "8"]);
    Ok(())
}

#[test]
fn test_matrix() -> Result<()> {
    let (optimized, _) = check("matrix")?;
    assert!(optimized.contains("final var mLength = m.length;"));
    Ok(())
}

#[test]
fn test_strings() -> Result<()> {
    let (optimized, outcome) = check("strings")?;
    assert!(optimized.contains("final var sLength = s.length();"));
    assert_eq!(outcome.lines, ["3", "15", "hr", "8"]);
    Ok(())
}

#[test]
fn test_switch_loop() -> Result<()> {
    let (_, outcome) = check("switch_loop")?;
    assert_eq!(outcome.lines, ["21", "{ones=1, other=12, twos=8}", "10"]);
    Ok(())
}

#[test]
fn test_writes() -> Result<()> {
    let (_, outcome) = check("writes")?;
    assert_eq!(outcome.returned.as_deref(), Some("39"));
    Ok(())
}

#[test]
fn test_zero_trip() -> Result<()> {
    let (optimized, outcome) = check("zero_trip")?;
    // Only the length read after the loops may move to the top level.
    assert!(optimized
        .lines()
        .filter(|line| line.starts_with("final var"))
        .all(|line| line.ends_with("= empty.length;")));
    assert!(optimized.contains("    final var boxV = box.v;\n"), "{optimized}");
    assert_eq!(outcome.lines, ["0", "0"]);
    Ok(())
}

#[test]
fn test_nested_branch() -> Result<()> {
    let (optimized, outcome) = check("nested_branch")?;
    assert!(!optimized.contains("final var"), "{optimized}");
    assert_eq!(outcome.lines, ["0", "0"]);
    assert_eq!(outcome.returned.as_deref(), Some("0"));
    Ok(())
}

#[test]
fn test_null_receiver() -> Result<()> {
    let err = check_failure("null_receiver")?;
    assert_eq!(err, "cannot read field `v` of null");
    Ok(())
}

#[test]
fn test_empty_array() -> Result<()> {
    let err = check_failure("empty_array")?;
    assert_eq!(err, "index 0 out of bounds for length 0");
    Ok(())
}

#[test]
fn test_fixtures_are_idempotent() -> Result<()> {
    let options = OptimizeOptions::default();
    for (name, source) in FIXTURES.iter().chain(FAILING_FIXTURES) {
        let once = optimize_source(source, &options)?;
        let twice = optimize_source(&once, &options)?;
        assert_eq!(once, twice, "{name} is not stable under a second pass");
    }
    Ok(())
}
