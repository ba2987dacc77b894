//! Expression states and the occurrence forest.
//!
//! An [`ExpressionState`] collects the occurrence sites of one expression seen
//! in one scope. States for the same expression found in nested scopes are
//! linked into a forest whose root stands for every occurrence at once; the
//! forest decides where the hoisted declaration goes.

use super::scope::NodeId;
use crate::ast::{Expr, ExprPath};
use anyhow::{bail, Result};

/// Index of a state in its [`StateArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

/// An addressable occurrence of an expression: statement `stmt` of the block
/// for `node`, then `path` inside that statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub node: NodeId,
    pub stmt: usize,
    pub path: ExprPath,
}

#[derive(Debug, Clone)]
pub struct ExpressionState {
    pub expr: Expr,
    /// Scope the state was created in.
    pub node: NodeId,
    /// Statement a declaration for this state is inserted before.
    pub anchor: usize,
    /// Stops [`StateArena::definition_base`] from descending past this state.
    pub must_define_here: bool,
    /// Occurrences recorded directly in `node`.
    pub sites: Vec<Site>,
    pub parent: Option<StateId>,
    pub children: Vec<StateId>,
}

#[derive(Debug, Clone, Default)]
pub struct StateArena {
    states: Vec<ExpressionState>,
}

impl StateArena {
    pub fn create(&mut self, expr: Expr, node: NodeId, anchor: usize, must: bool) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(ExpressionState {
            expr,
            node,
            anchor,
            must_define_here: must,
            sites: Vec::new(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: StateId) -> &ExpressionState {
        &self.states[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: StateId) -> &mut ExpressionState {
        &mut self.states[id.0 as usize]
    }

    pub fn add_site(&mut self, id: StateId, site: Site) {
        self.get_mut(id).sites.push(site);
    }

    /// Occurrences recorded in `id` and every state below it.
    pub fn size(&self, id: StateId) -> usize {
        let state = self.get(id);
        state.sites.len() + state.children.iter().map(|&c| self.size(c)).sum::<usize>()
    }

    /// Walks down single-child chains of states without sites of their own,
    /// stopping at a state flagged `must_define_here`.
    pub fn definition_base(&self, id: StateId) -> StateId {
        let mut id = id;
        loop {
            let state = self.get(id);
            match state.children.as_slice() {
                [only] if state.sites.is_empty() && !state.must_define_here => id = *only,
                _ => return id,
            }
        }
    }

    pub fn root(&self, id: StateId) -> StateId {
        let mut id = id;
        while let Some(parent) = self.get(id).parent {
            id = parent;
        }
        id
    }

    /// Attaches the root of `other`'s forest below the root of `this`'s.
    pub fn link(&mut self, this: StateId, other: StateId) -> Result<()> {
        let (this, other) = (self.root(this), self.root(other));
        if self.get(this).expr != self.get(other).expr {
            bail!(
                "invariant violated: cannot link state of `{}` with state of `{}`",
                self.get(this).expr,
                self.get(other).expr
            );
        }
        if this != other {
            self.get_mut(other).parent = Some(this);
            self.get_mut(this).children.push(other);
        }
        Ok(())
    }

    /// Visits the sites of `id` and its descendants depth-first. Stops early
    /// and returns false once `f` returns false.
    pub fn for_all_sites<F>(&self, id: StateId, f: &mut F) -> bool
    where
        F: FnMut(&Site) -> bool,
    {
        let state = self.get(id);
        state.sites.iter().all(&mut *f)
            && state
                .children
                .iter()
                .all(|&child| self.for_all_sites(child, &mut *f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::scope::ScopeTree;

    fn site(node: NodeId, stmt: usize) -> Site {
        Site {
            node,
            stmt,
            path: ExprPath::new(0),
        }
    }

    fn a_length() -> Expr {
        Expr::field(Expr::local("a"), "length")
    }

    #[test]
    fn size_counts_the_whole_forest() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let inner = tree.child(root, 1, 0);

        let mut arena = StateArena::default();
        let outer = arena.create(a_length(), root, 0, false);
        arena.add_site(outer, site(root, 0));
        let nested = arena.create(a_length(), inner, 0, false);
        arena.add_site(nested, site(inner, 0));
        arena.add_site(nested, site(inner, 2));

        arena.link(outer, nested).unwrap();
        assert_eq!(arena.size(outer), 3);
        assert_eq!(arena.size(nested), 2);
        assert_eq!(arena.root(nested), outer);
    }

    #[test]
    fn link_rejects_unequal_expressions() {
        let root = ScopeTree::new().root();
        let mut arena = StateArena::default();
        let a = arena.create(a_length(), root, 0, false);
        let b = arena.create(Expr::field(Expr::local("b"), "length"), root, 0, false);
        let err = arena.link(a, b).unwrap_err();
        assert!(err.to_string().contains("invariant violated"), "{err}");
    }

    #[test]
    fn link_joins_roots_and_is_idempotent() {
        let root = ScopeTree::new().root();
        let mut arena = StateArena::default();
        let a = arena.create(a_length(), root, 0, false);
        let b = arena.create(a_length(), root, 1, false);
        let c = arena.create(a_length(), root, 2, false);
        arena.link(b, c).unwrap();
        arena.link(a, c).unwrap();
        arena.link(a, b).unwrap();

        assert_eq!(arena.root(c), a);
        assert_eq!(arena.get(a).children, vec![b]);
        assert_eq!(arena.get(b).children, vec![c]);
    }

    #[test]
    fn definition_base_collapses_single_child_chains() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let branch = tree.child(root, 0, 0);
        let deeper = tree.child(branch, 0, 0);

        let mut arena = StateArena::default();
        let top = arena.create(a_length(), root, 0, false);
        let mid = arena.create(a_length(), branch, 0, false);
        let leaf = arena.create(a_length(), deeper, 0, false);
        arena.add_site(leaf, site(deeper, 0));
        arena.add_site(leaf, site(deeper, 1));
        arena.link(mid, leaf).unwrap();
        arena.link(top, mid).unwrap();

        assert_eq!(arena.definition_base(top), leaf);

        arena.get_mut(mid).must_define_here = true;
        assert_eq!(arena.definition_base(top), mid);
    }

    #[test]
    fn definition_base_stops_at_direct_sites_or_forks() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let left = tree.child(root, 0, 0);
        let right = tree.child(root, 0, 1);

        let mut arena = StateArena::default();
        let top = arena.create(a_length(), root, 0, false);
        for node in [left, right] {
            let s = arena.create(a_length(), node, 0, false);
            arena.add_site(s, site(node, 0));
            arena.link(top, s).unwrap();
        }
        assert_eq!(arena.definition_base(top), top);
    }

    #[test]
    fn for_all_sites_short_circuits() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let inner = tree.child(root, 0, 0);

        let mut arena = StateArena::default();
        let top = arena.create(a_length(), root, 0, false);
        arena.add_site(top, site(root, 3));
        let nested = arena.create(a_length(), inner, 0, false);
        arena.add_site(nested, site(inner, 0));
        arena.add_site(nested, site(inner, 1));
        arena.link(top, nested).unwrap();

        let mut seen = Vec::new();
        assert!(arena.for_all_sites(top, &mut |s| {
            seen.push(s.stmt);
            true
        }));
        assert_eq!(seen, vec![3, 0, 1]);

        let mut count = 0;
        assert!(!arena.for_all_sites(top, &mut |_| {
            count += 1;
            count < 2
        }));
        assert_eq!(count, 2);
    }
}
