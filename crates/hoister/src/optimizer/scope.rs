//! Scope tree mirroring block nesting.
//!
//! Every block the driver enters gets a [`BlockNode`]. Nodes remember where
//! their block lives inside the parent block (statement index and block slot),
//! which is enough to find the block again when declarations are inserted.

use crate::ast::Block;
use anyhow::{anyhow, Result};
use std::cmp::Ordering;

/// Index of a node in its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Position of a nested block inside its parent block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    /// Index of the owning statement in the parent block.
    pub stmt: usize,
    /// Block slot of the owning statement (see [`crate::ast::Stmt::block_mut`]).
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub parent: Option<NodeId>,
    /// Position among the parent's children.
    pub index: usize,
    /// `None` for the root.
    pub origin: Option<Origin>,
    pub depth: usize,
    pub children: Vec<NodeId>,
}

/// Append-only arena of block nodes.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    nodes: Vec<BlockNode>,
}

impl ScopeTree {
    /// Creates a tree holding only the parentless root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![BlockNode {
                parent: None,
                index: 0,
                origin: None,
                depth: 0,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Registers a child of `parent` for the block in slot `slot` of statement
    /// `stmt`. Its index is the parent's child count before the call.
    pub fn child(&mut self, parent: NodeId, stmt: usize, slot: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent_node = &mut self.nodes[parent.0 as usize];
        let node = BlockNode {
            parent: Some(parent),
            index: parent_node.children.len(),
            origin: Some(Origin { stmt, slot }),
            depth: parent_node.depth + 1,
            children: Vec::new(),
        };
        parent_node.children.push(id);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &BlockNode {
        &self.nodes[id.0 as usize]
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.get(id).depth
    }

    /// Orders two nodes: a descendant is greater than its ancestors, siblings
    /// compare by index, and unrelated nodes compare like their ancestors
    /// below the closest common one.
    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (mut x, mut y) = (a, b);
        while self.depth(x) > self.depth(y) {
            let Some(px) = self.get(x).parent else { break };
            if px == y {
                return Ordering::Greater;
            }
            x = px;
        }
        while self.depth(y) > self.depth(x) {
            let Some(py) = self.get(y).parent else { break };
            if py == x {
                return Ordering::Less;
            }
            y = py;
        }
        while let (Some(px), Some(py)) = (self.get(x).parent, self.get(y).parent) {
            if px == py {
                return self.get(x).index.cmp(&self.get(y).index);
            }
            x = px;
            y = py;
        }
        Ordering::Equal
    }

    /// Returns the block `node` stands for inside the tree rooted at `root`.
    pub fn block_mut<'a>(&self, root: &'a mut Block, node: NodeId) -> Result<&'a mut Block> {
        let mut origins = Vec::new();
        let mut current = node;
        while let (Some(origin), Some(parent)) = (self.get(current).origin, self.get(current).parent)
        {
            origins.push(origin);
            current = parent;
        }

        let mut block = root;
        for origin in origins.into_iter().rev() {
            block = block
                .stmts
                .get_mut(origin.stmt)
                .and_then(|stmt| stmt.block_mut(origin.slot))
                .ok_or_else(|| {
                    anyhow!(
                        "invariant violated: no block in slot {} of statement {}",
                        origin.slot,
                        origin.stmt
                    )
                })?;
        }
        Ok(block)
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}
