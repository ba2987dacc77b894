//! Common sub-expression elimination over the statement tree.
//!
//! The pass runs in two phases. [`cse::analyze`] walks the tree scope by scope
//! and collects every pure sub-expression that is evaluated more than once
//! with the same value. [`extract::extract`] then declares one `final var`
//! per such expression and rewrites the occurrences to read it.

use crate::ast::Block;
use anyhow::Result;
use log::debug;

// ── Analysis ─────────────────────────────────────────────────────────────────
mod context;
mod cse;
mod scope;
mod state;

// ── Rewriting ────────────────────────────────────────────────────────────────
mod extract;
mod filter;
mod utils;

pub use filter::{DefaultEligibility, Eligibility};

/// Optimizes `block` in place using the default eligibility policy.
pub fn optimize(block: &mut Block) -> Result<()> {
    optimize_with(block, &DefaultEligibility::default())
}

/// Optimizes `block` in place, hoisting only expressions `filter` accepts.
///
/// On error the tree may be partially rewritten.
pub fn optimize_with(block: &mut Block, filter: &dyn Eligibility) -> Result<()> {
    let analysis = cse::analyze(block, filter)?;
    debug!(
        "analysis found {} candidate state(s)",
        analysis.candidates.len()
    );
    let hoisted = extract::extract(block, &analysis)?;
    debug!("hoisted {hoisted} variable(s)");
    Ok(())
}

// ── optimize integration tests ───────────────────────────────────────────────
