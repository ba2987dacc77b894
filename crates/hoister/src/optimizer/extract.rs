//! Extraction: declare one variable per common sub-expression and rewrite its
//! occurrences to read it.
//!
//! Candidates are processed simplest first, so a variable hoisted for `a.b`
//! is already in place when `a.b.c` is extracted and ends up in its
//! initializer. That reuse needs an occurrence of the expression at the
//! declaration point to copy from. A state without one, such as a read
//! promoted out of both arms of an `if`, is initialized with the original
//! expression instead. All occurrence rewrites happen before any declaration is
//! inserted, which keeps the recorded statement indices valid. Declarations
//! then go in deepest blocks first and, within a block, from the last anchor
//! to the first.

use super::cse::Analysis;
use super::scope::{NodeId, ScopeTree};
use super::state::{Site, StateId};
use super::utils::{name_stem, NameGenerator};
use crate::ast::{Block, Expr, Stmt};
use anyhow::{anyhow, bail, Result};
use log::debug;

struct Candidate {
    root: StateId,
    base: StateId,
    complexity: usize,
}

struct Declaration {
    node: NodeId,
    anchor: usize,
    seq: usize,
    stmt: Stmt,
}

/// Rewrites `block` according to `analysis`. Returns the number of variables
/// introduced.
pub fn extract(block: &mut Block, analysis: &Analysis) -> Result<usize> {
    let Analysis {
        scopes,
        states,
        candidates,
    } = analysis;

    let mut roots: Vec<StateId> = candidates.iter().map(|&id| states.root(id)).collect();
    roots.sort();
    roots.dedup();

    let mut ordered: Vec<Candidate> = roots
        .into_iter()
        .filter(|&id| states.size(id) > 1)
        .map(|root| Candidate {
            root,
            base: states.definition_base(root),
            complexity: states.get(root).expr.node_count(),
        })
        .collect();
    ordered.sort_by(|a, b| {
        let (base_a, base_b) = (states.get(a.base), states.get(b.base));
        a.complexity
            .cmp(&b.complexity)
            .then_with(|| scopes.compare(base_a.node, base_b.node))
            .then_with(|| base_a.anchor.cmp(&base_b.anchor))
            .then_with(|| a.root.cmp(&b.root))
    });

    let mut names = NameGenerator::avoiding_locals(block);
    let mut declarations = Vec::new();

    for (seq, candidate) in ordered.iter().enumerate() {
        let expr = &states.get(candidate.root).expr;

        let mut sites = Vec::new();
        states.for_all_sites(candidate.root, &mut |site| {
            sites.push(site.clone());
            true
        });
        let mut live = Vec::with_capacity(sites.len());
        for site in sites {
            if site_mut(block, scopes, &site)?.is_some() {
                live.push(site);
            }
        }
        if live.len() < 2 {
            debug!(
                "skipping `{expr}`: {} live occurrence(s) left",
                live.len()
            );
            continue;
        }

        // Taken before rewriting so it still holds the expression itself.
        let base = states.get(candidate.base);
        let init = match base.sites.iter().find(|s| s.stmt == base.anchor) {
            Some(site) => site_mut(block, scopes, site)?
                .cloned()
                .unwrap_or_else(|| expr.clone()),
            None => expr.clone(),
        };

        let name = names.fresh(&name_stem(expr));
        for site in &live {
            if let Some(slot) = site_mut(block, scopes, site)? {
                *slot = Expr::Local(name.clone());
            }
        }
        debug!(
            "hoisting `{expr}` into `{name}` ({} occurrences, depth {}, before statement {})",
            live.len(),
            scopes.depth(base.node),
            base.anchor
        );

        declarations.push(Declaration {
            node: base.node,
            anchor: base.anchor,
            seq,
            stmt: Stmt::Local {
                is_final: true,
                ty: "var".to_string(),
                name,
                init: Some(init),
            },
        });
    }

    declarations.sort_by(|a, b| {
        scopes
            .depth(b.node)
            .cmp(&scopes.depth(a.node))
            .then_with(|| b.anchor.cmp(&a.anchor))
            .then_with(|| b.seq.cmp(&a.seq))
    });

    let count = declarations.len();
    for decl in declarations {
        let target = scopes.block_mut(block, decl.node)?;
        if decl.anchor > target.stmts.len() {
            bail!(
                "invariant violated: anchor {} outside a block of {} statements",
                decl.anchor,
                target.stmts.len()
            );
        }
        target.stmts.insert(decl.anchor, decl.stmt);
    }
    Ok(count)
}

/// The expression slot `site` addresses, or `None` if an earlier rewrite
/// replaced the expression that contained it.
fn site_mut<'a>(
    block: &'a mut Block,
    scopes: &ScopeTree,
    site: &Site,
) -> Result<Option<&'a mut Expr>> {
    let stmt = scopes
        .block_mut(block, site.node)?
        .stmts
        .get_mut(site.stmt)
        .ok_or_else(|| anyhow!("invariant violated: no statement {} in its block", site.stmt))?;
    Ok(stmt.expr_at_mut(&site.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::cse::analyze;
    use crate::optimizer::filter::DefaultEligibility;
    use crate::parser::parse_program;

    fn run(source: &str) -> (usize, String) {
        let mut block = parse_program(source).unwrap();
        let analysis = analyze(&block, &DefaultEligibility::default()).unwrap();
        let count = extract(&mut block, &analysis).unwrap();
        (count, block.to_string())
    }

    #[test]
    fn declaration_goes_before_the_first_occurrence() {
        let (count, out) = run("x = 1;\ny = a.length;\nz = a.length;\n");
        assert_eq!(count, 1);
        assert_eq!(
            out,
            "x = 1;\nfinal var aLength = a.length;\ny = aLength;\nz = aLength;\n"
        );
    }

    #[test]
    fn simpler_variables_feed_larger_initializers() {
        let (count, out) = run("x = p.q.v;\ny = p.q.v;\n");
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "final var pQ = p.q;\nfinal var pQV = pQ.v;\nx = pQV;\ny = pQV;\n"
        );
    }

    #[test]
    fn sub_expression_shared_beyond_the_larger_one_keeps_its_variable() {
        let (_, out) = run("x = p.q.v;\ny = p.q.v;\nz = p.q.w;\n");
        assert_eq!(
            out,
            "final var pQ = p.q;\nfinal var pQV = pQ.v;\nx = pQV;\ny = pQV;\nz = pQ.w;\n"
        );
    }

    #[test]
    fn same_expression_in_separate_windows_gets_numbered_names() {
        let (count, out) = run("x = a.length;\ny = a.length;\na = b;\nz = a.length;\nw = a.length;\n");
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "final var aLength = a.length;\nx = aLength;\ny = aLength;\na = b;\n\
             final var aLength1 = a.length;\nz = aLength1;\nw = aLength1;\n"
        );
    }

    #[test]
    fn promoted_read_is_initialized_from_the_expression_itself() {
        let (count, out) = run(
            "x = p.q;\ny = p.q;\nif (c) {\n    z = p.q.v;\n} else {\n    w = p.q.v;\n}\n",
        );
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "final var pQ = p.q;\nx = pQ;\ny = pQ;\nfinal var pQV = p.q.v;\n\
             if (c) {\n    z = pQV;\n} else {\n    w = pQV;\n}\n"
        );
    }

    #[test]
    fn declarations_land_in_nested_blocks() {
        let (_, out) = run("if (c) {\n    x = p.v;\n    y = p.v;\n}\n");
        assert_eq!(
            out,
            "if (c) {\n    final var pV = p.v;\n    x = pV;\n    y = pV;\n}\n"
        );
    }

    #[test]
    fn nothing_to_do_leaves_the_tree_alone() {
        let source = "x = a.length;\na = b;\ny = a.length;\n";
        let (count, out) = run(source);
        assert_eq!(count, 0);
        assert_eq!(out, source);
    }
}
