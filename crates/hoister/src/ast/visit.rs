//! Statement classification and sub-expression traversal.
//!
//! Every statement falls into exactly one of four shapes ([`StmtKind`]):
//! a plain expression container, a branching statement, a loop, or a nested
//! block. The expression-bearing part of each shape is exposed as a
//! [`Container`], which replays its reads and writes in evaluation order.

use super::types::{Block, Expr, Stmt, FOR_COND_SLOT, FOR_UPDATE_SLOT};
use std::collections::HashSet;

/// Set of assignment targets written somewhere.
pub type ModifiedSet = HashSet<Expr>;

/// Address of an expression slot inside one statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExprPath {
    /// Root slot of the statement (see the slot table on [`Stmt`]).
    pub root: usize,
    /// Child steps from the root expression, numbered as in [`Expr::children`].
    pub steps: Vec<usize>,
}

impl ExprPath {
    pub fn new(root: usize) -> Self {
        Self {
            root,
            steps: Vec::new(),
        }
    }
}

/// One event reported by [`Container::for_all_sub_expressions`].
#[derive(Debug)]
pub enum Access<'a> {
    /// An assignment target is being written.
    Write(&'a Expr),
    /// A sub-expression is being read from the slot at `path`.
    Read { expr: &'a Expr, path: &'a ExprPath },
}

#[derive(Debug, Clone)]
enum Item<'a> {
    /// Read of the whole expression in `slot`.
    Read { slot: usize, expr: &'a Expr },
    /// Reads of the operands of a target; the target slot itself is not a read.
    TargetParts { slot: usize, target: &'a Expr },
    /// Write to an existing target.
    Write(&'a Expr),
    /// Write that introduces a variable.
    Declare(Expr),
}

/// The expression-bearing part of a statement.
#[derive(Debug, Clone, Default)]
pub struct Container<'a> {
    items: Vec<Item<'a>>,
}

impl<'a> Container<'a> {
    /// Container for a simple statement whose root slots start at `base`.
    fn simple(stmt: &'a Stmt, base: usize) -> Self {
        let mut items = Vec::new();
        match stmt {
            Stmt::Expr(e) | Stmt::Return(Some(e)) => items.push(Item::Read {
                slot: base,
                expr: e,
            }),
            Stmt::Local { name, init, .. } => {
                if let Some(init) = init {
                    items.push(Item::Read {
                        slot: base,
                        expr: init,
                    });
                }
                items.push(Item::Declare(Expr::Local(name.clone())));
            }
            Stmt::Assign { target, value, .. } => {
                items.push(Item::TargetParts { slot: base, target });
                items.push(Item::Read {
                    slot: base + 1,
                    expr: value,
                });
                items.push(Item::Write(target));
            }
            _ => {}
        }
        Self { items }
    }

    fn read(slot: usize, expr: &'a Expr) -> Self {
        Self {
            items: vec![Item::Read { slot, expr }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replays every read and write in evaluation order.
    ///
    /// Returning `false` from `f` on a read skips that expression's operands.
    /// The right operand of `&&` and `||` is never reported: it may not be
    /// evaluated at all.
    pub fn for_all_sub_expressions<F>(&self, mut f: F)
    where
        F: FnMut(Access<'_>) -> bool,
    {
        for item in &self.items {
            match item {
                Item::Read { slot, expr } => {
                    let mut path = ExprPath::new(*slot);
                    walk(expr, &mut path, &mut f);
                }
                Item::TargetParts { slot, target } => {
                    let mut path = ExprPath::new(*slot);
                    walk_children(target, &mut path, &mut f);
                }
                Item::Write(target) => {
                    f(Access::Write(target));
                }
                Item::Declare(local) => {
                    f(Access::Write(local));
                }
            }
        }
    }

    /// Adds every target this container writes to `out`.
    pub fn collect_writes(&self, out: &mut ModifiedSet) {
        for item in &self.items {
            match item {
                Item::Write(target) => {
                    out.insert((*target).clone());
                }
                Item::Declare(local) => {
                    out.insert(local.clone());
                }
                Item::Read { .. } | Item::TargetParts { .. } => {}
            }
        }
    }
}

fn walk<F>(expr: &Expr, path: &mut ExprPath, f: &mut F)
where
    F: FnMut(Access<'_>) -> bool,
{
    if f(Access::Read { expr, path }) {
        walk_children(expr, path, f);
    }
}

fn walk_children<F>(expr: &Expr, path: &mut ExprPath, f: &mut F)
where
    F: FnMut(Access<'_>) -> bool,
{
    let conditional_rhs = matches!(expr, Expr::Binary { op, .. } if op.is_short_circuit());
    for (step, child) in expr.children().into_iter().enumerate() {
        if conditional_rhs && step == 1 {
            break;
        }
        path.steps.push(step);
        walk(child, path, f);
        path.steps.pop();
    }
}

/// The branches of a branching statement.
#[derive(Debug)]
pub enum Branches<'a> {
    /// A body that runs or is skipped (`if` without `else`).
    Single(&'a Block),
    /// Mutually exclusive alternatives, listed in block-slot order.
    ///
    /// `exhaustive` is false when control may also take none of them.
    Exclusive {
        blocks: Vec<&'a Block>,
        exhaustive: bool,
    },
}

/// The views of a loop.
#[derive(Debug)]
pub struct LoopParts<'a> {
    /// Evaluated exactly once, before the first iteration.
    pub once: Container<'a>,
    /// Condition checked before every iteration, the first one included.
    pub guard: Container<'a>,
    /// Evaluated on every iteration after the body has run.
    pub per_iteration: Container<'a>,
    /// Executed zero or more times.
    pub body: &'a Block,
}

/// Closed classification of a statement.
#[derive(Debug)]
pub enum StmtKind<'a> {
    Container(Container<'a>),
    Branching {
        cond: Container<'a>,
        branches: Branches<'a>,
    },
    Loop(LoopParts<'a>),
    Block(&'a Block),
}

impl Stmt {
    /// Classifies this statement.
    pub fn kind(&self) -> StmtKind<'_> {
        match self {
            Stmt::Expr(_)
            | Stmt::Local { .. }
            | Stmt::Assign { .. }
            | Stmt::Return(_)
            | Stmt::Break
            | Stmt::Continue => StmtKind::Container(Container::simple(self, 0)),
            Stmt::Block(block) => StmtKind::Block(block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => StmtKind::Branching {
                cond: Container::read(0, cond),
                branches: match else_branch {
                    None => Branches::Single(then_branch),
                    Some(else_branch) => Branches::Exclusive {
                        blocks: vec![then_branch, else_branch],
                        exhaustive: true,
                    },
                },
            },
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => StmtKind::Branching {
                cond: Container::read(0, scrutinee),
                branches: Branches::Exclusive {
                    blocks: cases
                        .iter()
                        .map(|c| &c.body)
                        .chain(default.iter())
                        .collect(),
                    exhaustive: default.is_some(),
                },
            },
            Stmt::While { cond, body } => StmtKind::Loop(LoopParts {
                once: Container::default(),
                guard: Container::read(0, cond),
                per_iteration: Container::default(),
                body,
            }),
            Stmt::DoWhile { body, cond } => StmtKind::Loop(LoopParts {
                once: Container::default(),
                guard: Container::default(),
                per_iteration: Container::read(0, cond),
                body,
            }),
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let once = init
                    .as_deref()
                    .map(|s| Container::simple(s, 0))
                    .unwrap_or_default();
                let guard = cond
                    .as_ref()
                    .map(|c| Container::read(FOR_COND_SLOT, c))
                    .unwrap_or_default();
                let per_iteration = update
                    .as_deref()
                    .map(|s| Container::simple(s, FOR_UPDATE_SLOT))
                    .unwrap_or_default();
                StmtKind::Loop(LoopParts {
                    once,
                    guard,
                    per_iteration,
                    body,
                })
            }
            Stmt::ForEach {
                name,
                iterable,
                body,
                ..
            } => StmtKind::Loop(LoopParts {
                once: Container::read(0, iterable),
                guard: Container::default(),
                per_iteration: Container {
                    items: vec![Item::Declare(Expr::Local(name.clone()))],
                },
                body,
            }),
        }
    }

    /// Resolves `path` to the expression slot it addresses.
    pub fn expr_at_mut(&mut self, path: &ExprPath) -> Option<&mut Expr> {
        let mut expr = self.root_mut(path.root)?;
        for &step in &path.steps {
            expr = expr.child_mut(step)?;
        }
        Some(expr)
    }
}

/// Adds every target written anywhere inside `block`, nested scopes included.
pub fn collect_block_writes(block: &Block, out: &mut ModifiedSet) {
    for stmt in &block.stmts {
        match stmt.kind() {
            StmtKind::Container(c) => c.collect_writes(out),
            StmtKind::Branching { cond, branches } => {
                cond.collect_writes(out);
                match branches {
                    Branches::Single(body) => collect_block_writes(body, out),
                    Branches::Exclusive { blocks, .. } => {
                        for body in blocks {
                            collect_block_writes(body, out);
                        }
                    }
                }
            }
            StmtKind::Loop(parts) => {
                parts.once.collect_writes(out);
                parts.guard.collect_writes(out);
                parts.per_iteration.collect_writes(out);
                collect_block_writes(parts.body, out);
            }
            StmtKind::Block(inner) => collect_block_writes(inner, out),
        }
    }
}

impl Stmt {
    /// Returns true if running this statement may skip the statements that
    /// follow it in its block, through a `return`, `break` or `continue` that
    /// escapes it.
    pub fn may_leave_block(&self) -> bool {
        self.escapes(true, true)
    }

    fn escapes(&self, breaks: bool, continues: bool) -> bool {
        let any = |block: &Block, breaks, continues| {
            block.stmts.iter().any(|s| s.escapes(breaks, continues))
        };
        match self {
            Stmt::Return(_) => true,
            Stmt::Break => breaks,
            Stmt::Continue => continues,
            Stmt::Expr(_) | Stmt::Local { .. } | Stmt::Assign { .. } => false,
            Stmt::Block(block) => any(block, breaks, continues),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                any(then_branch, breaks, continues)
                    || else_branch
                        .as_ref()
                        .is_some_and(|b| any(b, breaks, continues))
            }
            // `break` ends the switch, not the enclosing block.
            Stmt::Switch { cases, default, .. } => cases
                .iter()
                .map(|c| &c.body)
                .chain(default.iter())
                .any(|b| any(b, false, continues)),
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForEach { body, .. } => any(body, false, false),
        }
    }
}
