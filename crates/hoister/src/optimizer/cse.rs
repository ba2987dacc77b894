//! Scope-sensitive availability analysis.
//!
//! The driver walks the tree one block at a time. Each block scan keeps two
//! contexts:
//!
//! - `out` holds expressions read before anything they depend on was written
//!   in this scan. Their value is the one they had on entry, so they may be
//!   merged into the enclosing scope.
//! - `current` holds expressions read after a dependency was written. They are
//!   closed as soon as another dependency write happens, and at scope exit.
//!
//! A state created in `out` before any statement that may leave the block
//! early is *certain*: it is read every time the block runs. Only certain
//! states open a new state in the enclosing scope. States from an `if`
//! without `else`, a loop body or an uncertain read only join a state the
//! enclosing scope already tracks, so no declaration is evaluated on a path
//! that never read the expression.
//!
//! A closed state with more than one occurrence becomes a candidate for
//! extraction.

use super::context::Context;
use super::filter::Eligibility;
use super::scope::{NodeId, ScopeTree};
use super::state::{Site, StateArena, StateId};
use super::utils::{depends_on, is_modified};
use crate::ast::{
    collect_block_writes, Access, Block, Branches, Container, Expr, ExprPath, LoopParts,
    ModifiedSet, StmtKind,
};
use anyhow::Result;
use log::{debug, trace};
use std::collections::HashSet;

/// Everything extraction needs from the analysis.
#[derive(Debug)]
pub struct Analysis {
    pub scopes: ScopeTree,
    pub states: StateArena,
    /// Closed states with more than one occurrence, possibly sharing roots.
    pub candidates: Vec<StateId>,
}

/// Analyses `block` and collects the common sub-expressions it contains.
pub fn analyze(block: &Block, filter: &dyn Eligibility) -> Result<Analysis> {
    let mut driver = Driver {
        filter,
        scopes: ScopeTree::new(),
        states: StateArena::default(),
        candidates: Vec::new(),
    };
    let root = driver.scopes.root();
    let scan = driver.scan_block(block, root, ModifiedSet::new())?;
    driver.close_all(scan.current);
    driver.close_all(scan.out);

    Ok(Analysis {
        scopes: driver.scopes,
        states: driver.states,
        candidates: driver.candidates,
    })
}

/// State of one forward scan over a block.
struct Scan {
    node: NodeId,
    current: Context,
    out: Context,
    modified: ModifiedSet,
    /// `out` states read on every run of the block.
    certain: HashSet<StateId>,
    /// Set once a statement that may leave the block early was scanned.
    may_leave: bool,
}

enum Event {
    Read(Expr, ExprPath),
    Write(Expr),
}

struct Driver<'f> {
    filter: &'f dyn Eligibility,
    scopes: ScopeTree,
    states: StateArena,
    candidates: Vec<StateId>,
}

impl Driver<'_> {
    fn scan_block(&mut self, block: &Block, node: NodeId, modified: ModifiedSet) -> Result<Scan> {
        let mut scan = Scan {
            node,
            current: Context::default(),
            out: Context::default(),
            modified,
            certain: HashSet::new(),
            may_leave: false,
        };

        for (idx, stmt) in block.stmts.iter().enumerate() {
            match stmt.kind() {
                StmtKind::Container(container) => {
                    self.scan_container(&mut scan, &container, idx, None);
                }
                StmtKind::Branching { cond, branches } => {
                    self.scan_container(&mut scan, &cond, idx, None);
                    match branches {
                        Branches::Single(body) => {
                            self.scan_nested(&mut scan, body, idx, false)?
                        }
                        Branches::Exclusive { blocks, exhaustive } => {
                            self.scan_exclusive(&mut scan, &blocks, exhaustive, idx)?
                        }
                    }
                }
                StmtKind::Loop(parts) => self.scan_loop(&mut scan, &parts, idx)?,
                StmtKind::Block(body) => self.scan_nested(&mut scan, body, idx, true)?,
            }
            if !scan.may_leave && stmt.may_leave_block() {
                trace!("statement {idx} may leave the block");
                scan.may_leave = true;
            }
        }
        Ok(scan)
    }

    // ── Containers ───────────────────────────────────────────────────────

    /// Replays the reads and writes of `container`, which belongs to
    /// statement `idx` of the scanned block. Reads of anything in `unstable`
    /// are not tracked.
    fn scan_container(
        &mut self,
        scan: &mut Scan,
        container: &Container<'_>,
        idx: usize,
        unstable: Option<&ModifiedSet>,
    ) {
        let mut events = Vec::new();
        container.for_all_sub_expressions(|access| {
            match access {
                Access::Write(target) => events.push(Event::Write(target.clone())),
                Access::Read { expr, path } => {
                    if self.filter.accepts(expr) {
                        events.push(Event::Read(expr.clone(), path.clone()));
                    }
                }
            }
            true
        });

        for event in events {
            match event {
                Event::Read(expr, path) => {
                    if unstable.is_some_and(|m| is_modified(&expr, m)) {
                        continue;
                    }
                    let site = Site {
                        node: scan.node,
                        stmt: idx,
                        path,
                    };
                    self.record(scan, &expr, site, idx);
                }
                Event::Write(target) => self.invalidate(scan, target),
            }
        }
    }

    fn record(&mut self, scan: &mut Scan, expr: &Expr, site: Site, anchor: usize) {
        if scan.current.add_if_present(&mut self.states, expr, &site) {
            return;
        }
        if is_modified(expr, &scan.modified) {
            scan.current.add(&mut self.states, expr, scan.node, anchor, site);
            return;
        }
        let fresh = !scan.out.contains(expr);
        let id = scan.out.add(&mut self.states, expr, scan.node, anchor, site);
        if fresh && !scan.may_leave {
            scan.certain.insert(id);
        }
    }

    /// Marks `target` as written and closes every current state reading it.
    fn invalidate(&mut self, scan: &mut Scan, target: Expr) {
        for id in scan.current.take_matching(|e| depends_on(e, &target)) {
            trace!(
                "`{}` invalidated by write to `{}`",
                self.states.get(id).expr,
                target
            );
            self.close(id);
        }
        scan.modified.insert(target);
    }

    fn close(&mut self, id: StateId) {
        if self.states.size(id) > 1 {
            self.candidates.push(id);
        }
    }

    fn close_all(&mut self, ctx: Context) {
        for id in ctx.into_states() {
            self.close(id);
        }
    }

    // ── Nested scopes ────────────────────────────────────────────────────

    /// Links a state from a nested scan into `scan`, anchored at statement
    /// `anchor`. The expression is classified against `scan`'s own writes.
    ///
    /// A `certain` state may open a new state here. Any other state only joins
    /// one that is already tracked; failing that it is closed where it is.
    fn merge(
        &mut self,
        scan: &mut Scan,
        nested: StateId,
        anchor: usize,
        certain: bool,
    ) -> Result<()> {
        let expr = self.states.get(nested).expr.clone();
        let into_current = scan.current.contains(&expr) || is_modified(&expr, &scan.modified);
        let ctx = if into_current {
            &mut scan.current
        } else {
            &mut scan.out
        };

        if !certain {
            if !ctx.link_if_present(&mut self.states, nested)? {
                trace!("`{expr}` stays in its own scope");
                self.close(nested);
            }
            return Ok(());
        }
        let fresh = !ctx.contains(&expr);
        let id = ctx.add_state(&mut self.states, nested, scan.node, anchor)?;
        if fresh && !into_current && !scan.may_leave {
            scan.certain.insert(id);
        }
        Ok(())
    }

    /// Applies the writes of a nested scan to `scan`.
    fn fold_writes(&mut self, scan: &mut Scan, modified: ModifiedSet) {
        for target in modified {
            self.invalidate(scan, target);
        }
    }

    /// A block that runs at most once per execution of statement `idx`: a
    /// plain nested block if `always_runs`, else the body of an `if` without
    /// `else`.
    fn scan_nested(
        &mut self,
        scan: &mut Scan,
        body: &Block,
        idx: usize,
        always_runs: bool,
    ) -> Result<()> {
        let node = self.scopes.child(scan.node, idx, 0);
        let inner = self.scan_block(body, node, ModifiedSet::new())?;
        self.close_all(inner.current);
        for id in inner.out.into_states() {
            let certain = always_runs && inner.certain.contains(&id);
            self.merge(scan, id, idx, certain)?;
        }
        self.fold_writes(scan, inner.modified);
        Ok(())
    }

    /// Mutually exclusive branches. Only expressions read on every run of
    /// every branch are promoted; the rest stay local to their branch unless
    /// the enclosing scope already tracks them.
    fn scan_exclusive(
        &mut self,
        scan: &mut Scan,
        blocks: &[&Block],
        exhaustive: bool,
        idx: usize,
    ) -> Result<()> {
        let mut inners = Vec::with_capacity(blocks.len());
        for (slot, body) in blocks.iter().enumerate() {
            let node = self.scopes.child(scan.node, idx, slot);
            inners.push(self.scan_block(body, node, ModifiedSet::new())?);
        }

        // Without a default arm control may skip every branch.
        let common: Vec<Expr> = match inners.first() {
            Some(first) if exhaustive => first
                .out
                .exprs()
                .into_iter()
                .filter(|e| {
                    inners.iter().all(|inner| {
                        inner
                            .out
                            .get(e)
                            .is_some_and(|id| inner.certain.contains(&id))
                    })
                })
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        if !common.is_empty() {
            debug!(
                "statement {idx}: {} expression(s) common to {} branches",
                common.len(),
                inners.len()
            );
        }

        for expr in &common {
            for inner in &mut inners {
                if let Some(id) = inner.out.take(expr) {
                    self.merge(scan, id, idx, true)?;
                }
            }
        }
        // No arm sees another arm's writes.
        let mut writes = Vec::with_capacity(inners.len());
        for inner in inners {
            self.close_all(inner.current);
            for id in inner.out.into_states() {
                self.merge(scan, id, idx, false)?;
            }
            writes.push(inner.modified);
        }
        for modified in writes {
            self.fold_writes(scan, modified);
        }
        Ok(())
    }

    /// A loop at statement `idx`.
    ///
    /// Everything written anywhere in one iteration is collected up front and
    /// treated as already written when the body is scanned, so nothing read in
    /// the body is considered stable if a later iteration could change it.
    /// The body may run zero times, so its stable reads are pinned to the
    /// body and only join a state the enclosing scope already tracks, such as
    /// a read in the loop condition.
    fn scan_loop(&mut self, scan: &mut Scan, parts: &LoopParts<'_>, idx: usize) -> Result<()> {
        self.scan_container(scan, &parts.once, idx, None);

        let mut seed = ModifiedSet::new();
        parts.once.collect_writes(&mut seed);
        parts.guard.collect_writes(&mut seed);
        parts.per_iteration.collect_writes(&mut seed);
        collect_block_writes(parts.body, &mut seed);
        debug!(
            "loop at statement {idx}: {} target(s) written per iteration",
            seed.len()
        );

        self.scan_container(scan, &parts.guard, idx, Some(&seed));

        let node = self.scopes.child(scan.node, idx, 0);
        let inner = self.scan_block(parts.body, node, seed)?;
        self.close_all(inner.current);
        for id in inner.out.into_states() {
            self.states.get_mut(id).must_define_here = true;
            self.merge(scan, id, idx, false)?;
        }
        self.fold_writes(scan, inner.modified);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::filter::DefaultEligibility;
    use crate::parser::parse_program;

    /// One line per distinct candidate forest: `expr size depth anchor`,
    /// where depth and anchor describe the definition base.
    fn summarize(source: &str) -> Vec<String> {
        let block = parse_program(source).unwrap();
        let analysis = analyze(&block, &DefaultEligibility::default()).unwrap();
        let mut roots: Vec<_> = analysis
            .candidates
            .iter()
            .map(|&id| analysis.states.root(id))
            .collect();
        roots.sort();
        roots.dedup();
        roots
            .into_iter()
            .map(|id| {
                let base = analysis.states.get(analysis.states.definition_base(id));
                format!(
                    "{} {} {} {}",
                    analysis.states.get(id).expr,
                    analysis.states.size(id),
                    analysis.scopes.depth(base.node),
                    base.anchor
                )
            })
            .collect()
    }

    #[test]
    fn write_splits_occurrences() {
        let found = summarize("n = a.length + a.length; a = b; m = a.length;");
        assert_eq!(found, vec!["a.length 2 0 0"]);
    }

    #[test]
    fn reads_after_a_write_group_until_the_next_write() {
        let found = summarize("a = b; x = a.length; y = a.length; a = c; z = a.length;");
        assert_eq!(found, vec!["a.length 2 0 1"]);
    }

    #[test]
    fn unrelated_writes_do_not_split() {
        let found = summarize("x = p.v; q = null; p.w = 1; y = p.v;");
        assert_eq!(found, vec!["p.v 2 0 0"]);
    }

    #[test]
    fn common_branch_reads_are_promoted() {
        let found = summarize("if (c) { x = p.v; } else { y = p.v; }");
        assert_eq!(found, vec!["p.v 2 0 0"]);
    }

    #[test]
    fn one_sided_branch_reads_stay_local() {
        assert!(summarize("if (c) { x = p.v; } else { y = 1; } z = p.v;").is_empty());
    }

    #[test]
    fn switch_without_default_promotes_nothing() {
        let source = "switch (k) { case 1 -> { x = p.v; } case 2 -> { y = p.v; } }";
        assert!(summarize(source).is_empty());

        let exhaustive =
            "switch (k) { case 1 -> { x = p.v; } default -> { y = p.v; } }";
        assert_eq!(summarize(exhaustive), vec!["p.v 2 0 0"]);
    }

    #[test]
    fn single_branch_defines_inside_the_branch() {
        let found = summarize("x = 0; if (c) { x = p.v; y = p.v; }");
        assert_eq!(found, vec!["p.v 2 1 0"]);
    }

    #[test]
    fn nested_block_joins_the_enclosing_scope() {
        let found = summarize("x = p.v; { y = p.v; }");
        assert_eq!(found, vec!["p.v 2 0 0"]);
    }

    #[test]
    fn branch_writes_invalidate_the_parent() {
        let found = summarize("a = b; x = a.length; if (c) { a = d; } y = a.length;");
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn loop_body_writes_are_seen_before_the_body_runs() {
        let source = "while (i < a.length) { x = a.length; a = b; y = a.length; z = a.length; }";
        assert_eq!(summarize(source), vec!["a.length 2 1 2"]);
    }

    #[test]
    fn loop_invariant_reads_are_defined_before_the_loop() {
        let source = "for (int i = 0; i < a.length; i++) { s += a.length; }";
        assert_eq!(summarize(source), vec!["a.length 2 0 0"]);
    }

    #[test]
    fn body_only_loop_reads_are_defined_in_the_body() {
        let source = "while (s > 0) { s = a[0] + a[0]; }";
        assert_eq!(summarize(source), vec!["a[0] 2 1 0"]);

        let source = "for (int i = 0; i < n; i++) { s += p.v; t += p.v; }";
        assert_eq!(summarize(source), vec!["p.v 2 1 0"]);
    }

    #[test]
    fn earlier_reads_let_loop_bodies_join_the_enclosing_scope() {
        let source = "x = p.v; while (s > 0) { s -= p.v; }";
        assert_eq!(summarize(source), vec!["p.v 2 0 0"]);
    }

    #[test]
    fn single_branch_reads_join_an_earlier_read() {
        assert_eq!(summarize("x = p.v; if (c) { y = p.v; }"), vec!["p.v 2 0 0"]);
        assert!(summarize("if (c) { y = p.v; } x = p.v;").is_empty());
    }

    #[test]
    fn nested_single_branch_is_not_common_to_both_branches() {
        let source = "if (c) { if (d) { x = p.v; } } else { y = p.v; }";
        assert!(summarize(source).is_empty());

        let both = "if (c) { z = p.v; if (d) { x = p.v; } } else { y = p.v; }";
        assert_eq!(summarize(both), vec!["p.v 3 0 0"]);
    }

    #[test]
    fn reads_after_an_early_exit_are_not_promoted() {
        let source = "if (c) { if (p == null) { return; } x = p.v; } else { y = p.v; }";
        assert!(summarize(source).is_empty());

        let source = "{ if (q) { return; } x = p.v; } y = p.v;";
        assert!(summarize(source).is_empty());
    }

    #[test]
    fn element_reads_indexed_by_the_loop_variable_stay_in_the_body() {
        let source = "for (int i = 0; i < n; i++) { s += a[i] * a[i]; }";
        assert_eq!(summarize(source), vec!["a[i] 2 1 0"]);
    }

    #[test]
    fn element_writes_invalidate_other_indices() {
        let found = summarize("x = a[0]; a[k] = 1; y = a[0];");
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn short_circuit_operands_are_not_shared() {
        let found = summarize("if (p != null && p.v > 0) { x = p.v; }");
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn nested_sub_expressions_are_tracked_separately() {
        let found = summarize("x = p.q.v; y = p.q.v;");
        assert_eq!(found, vec!["p.q.v 2 0 0", "p.q 2 0 0"]);
    }
}
