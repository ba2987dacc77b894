//! Availability contexts.
//!
//! A [`Context`] maps each tracked expression of one scope scan to the state
//! collecting its occurrences. Every state a context holds is the root of its
//! forest.

use super::scope::NodeId;
use super::state::{Site, StateArena, StateId};
use crate::ast::Expr;
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Context {
    entries: HashMap<Expr, StateId>,
}

impl Context {
    /// Records `site` on the state for `expr`, creating the state at
    /// (`node`, `anchor`) when the expression is not tracked yet.
    pub fn add(
        &mut self,
        arena: &mut StateArena,
        expr: &Expr,
        node: NodeId,
        anchor: usize,
        site: Site,
    ) -> StateId {
        let id = match self.entries.get(expr) {
            Some(&id) => id,
            None => {
                let id = arena.create(expr.clone(), node, anchor, false);
                self.entries.insert(expr.clone(), id);
                id
            }
        };
        arena.add_site(id, site);
        id
    }

    /// Links `nested`, a state from an inner scope, below this context's state
    /// for the same expression. A new state is created at (`node`, `anchor`)
    /// if needed.
    pub fn add_state(
        &mut self,
        arena: &mut StateArena,
        nested: StateId,
        node: NodeId,
        anchor: usize,
    ) -> Result<StateId> {
        let expr = arena.get(nested).expr.clone();
        let id = match self.entries.get(&expr) {
            Some(&id) => id,
            None => {
                let id = arena.create(expr.clone(), node, anchor, false);
                self.entries.insert(expr, id);
                id
            }
        };
        arena.link(id, nested)?;
        Ok(id)
    }

    /// Links `nested` only if its expression is already tracked.
    pub fn link_if_present(&self, arena: &mut StateArena, nested: StateId) -> Result<bool> {
        match self.entries.get(&arena.get(nested).expr) {
            Some(&id) => {
                arena.link(id, nested)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Records `site` only if `expr` is already tracked.
    pub fn add_if_present(&self, arena: &mut StateArena, expr: &Expr, site: &Site) -> bool {
        match self.entries.get(expr) {
            Some(&id) => {
                arena.add_site(id, site.clone());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, expr: &Expr) -> Option<StateId> {
        self.entries.get(expr).copied()
    }

    pub fn contains(&self, expr: &Expr) -> bool {
        self.entries.contains_key(expr)
    }

    pub fn take(&mut self, expr: &Expr) -> Option<StateId> {
        self.entries.remove(expr)
    }

    /// Removes every entry whose expression satisfies `pred`, in creation order.
    pub fn take_matching(&mut self, mut pred: impl FnMut(&Expr) -> bool) -> Vec<StateId> {
        let mut taken = Vec::new();
        self.entries.retain(|expr, id| {
            if pred(expr) {
                taken.push(*id);
                false
            } else {
                true
            }
        });
        taken.sort();
        taken
    }

    /// Expressions tracked here, ordered by the creation of their states.
    pub fn exprs(&self) -> Vec<&Expr> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, id)| **id);
        entries.into_iter().map(|(expr, _)| expr).collect()
    }

    /// Consumes the context, returning its states in creation order.
    pub fn into_states(self) -> Vec<StateId> {
        let mut states: Vec<_> = self.entries.into_values().collect();
        states.sort();
        states
    }
}
