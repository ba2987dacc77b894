//! hoister — scope-sensitive common sub-expression elimination.
//!
//! This crate parses a small Java-like statement language, hoists repeated
//! pure reads (field reads, array element reads and value-producing calls)
//! into `final var` locals, and prints the rewritten program.

pub mod ast;
pub mod optimizer;
pub mod parser;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
use optimizer::{optimize_with, DefaultEligibility};
use parser::parse_program;

/// Configuration options for optimization
#[derive(Debug, Clone, Default)]
pub struct OptimizeOptions {
    /// Also hoist static field reads such as `Integer.MAX`
    pub static_fields: bool,
}

/// Optimize a program given as source text.
///
/// This is the main entry point: parse, run the CSE pass, print.
///
/// # Example
/// ```
/// use hoister::{optimize_source, OptimizeOptions};
///
/// let out = optimize_source("x = a.length;\ny = a.length;\n", &OptimizeOptions::default()).unwrap();
/// assert_eq!(out, "final var aLength = a.length;\nx = aLength;\ny = aLength;\n");
/// ```
pub fn optimize_source(source: &str, options: &OptimizeOptions) -> Result<String> {
    let mut program = parse_program(source).context("failed to parse program")?;

    let filter = DefaultEligibility {
        static_fields: options.static_fields,
    };
    optimize_with(&mut program, &filter).context("optimization failed")?;

    Ok(program.to_string())
}
