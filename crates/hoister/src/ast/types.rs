//! AST type definitions.
//!
//! These types represent a structured, Java-like imperative program: blocks of
//! statements, branching statements, loops and value-producing expressions.
//! Expressions compare structurally, so two expressions are the same
//! computation exactly when they are `==`.

use std::fmt;

/// Literal constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// Short-circuit `&&`.
    And,
    /// Short-circuit `||`.
    Or,
}

impl BinOp {
    /// Source spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinOp::Or => 3,
            BinOp::And => 4,
            BinOp::Eq | BinOp::Ne => 5,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 6,
            BinOp::Add | BinOp::Sub => 7,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 8,
        }
    }

    /// Returns true when the right operand is only evaluated conditionally.
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl UnOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Literal constant.
    Literal(Literal),
    /// Local variable or parameter: `name`.
    Local(String),
    /// Reference to a type used as a receiver: `Math`, `Integer`.
    TypeRef(String),
    /// Field read through a receiver: `receiver.name`.
    Field { receiver: Box<Expr>, name: String },
    /// Array element: `array[index]`.
    Index { array: Box<Expr>, index: Box<Expr> },
    /// Method call: `receiver.method(args)` or `method(args)`.
    ///
    /// `yields_value` is false for calls whose result is discarded, which is
    /// how the model tells void calls apart without type information.
    Call {
        receiver: Option<Box<Expr>>,
        method: String,
        args: Vec<Expr>,
        yields_value: bool,
    },
    /// Binary operation: `lhs op rhs`.
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Unary operation: `op operand`.
    Unary { op: UnOp, operand: Box<Expr> },
    /// Object allocation: `new Class(args)`.
    New { class: String, args: Vec<Expr> },
    /// Array allocation: `new element[len]`.
    NewArray { element: String, len: Box<Expr> },
}

impl Expr {
    pub fn local(name: &str) -> Self {
        Expr::Local(name.to_string())
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn field(receiver: Expr, name: &str) -> Self {
        Expr::Field {
            receiver: Box::new(receiver),
            name: name.to_string(),
        }
    }

    pub fn index(array: Expr, index: Expr) -> Self {
        Expr::Index {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    /// A value-yielding call.
    pub fn call(receiver: Option<Expr>, method: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            receiver: receiver.map(Box::new),
            method: method.to_string(),
            args,
            yields_value: true,
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Returns true for expressions that can be written to.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Local(_) | Expr::Field { .. } | Expr::Index { .. }
        )
    }

    /// Direct operands in evaluation order.
    ///
    /// The position of a child in this list is its step in an `ExprPath`.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Local(_) | Expr::TypeRef(_) => vec![],
            Expr::Field { receiver, .. } => vec![&**receiver],
            Expr::Index { array, index } => vec![&**array, &**index],
            Expr::Call { receiver, args, .. } => {
                receiver.iter().map(|r| &**r).chain(args.iter()).collect()
            }
            Expr::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            Expr::Unary { operand, .. } => vec![&**operand],
            Expr::New { args, .. } => args.iter().collect(),
            Expr::NewArray { len, .. } => vec![&**len],
        }
    }

    /// Mutable access to the `step`-th child, numbered as in [`Expr::children`].
    pub fn child_mut(&mut self, step: usize) -> Option<&mut Expr> {
        match self {
            Expr::Literal(_) | Expr::Local(_) | Expr::TypeRef(_) => None,
            Expr::Field { receiver, .. } => (step == 0).then_some(&mut **receiver),
            Expr::Index { array, index } => match step {
                0 => Some(&mut **array),
                1 => Some(&mut **index),
                _ => None,
            },
            Expr::Call { receiver, args, .. } => match receiver {
                Some(recv) if step == 0 => Some(&mut **recv),
                Some(_) => args.get_mut(step - 1),
                None => args.get_mut(step),
            },
            Expr::Binary { lhs, rhs, .. } => match step {
                0 => Some(&mut **lhs),
                1 => Some(&mut **rhs),
                _ => None,
            },
            Expr::Unary { operand, .. } => (step == 0).then_some(&mut **operand),
            Expr::New { args, .. } => args.get_mut(step),
            Expr::NewArray { len, .. } => (step == 0).then_some(&mut **len),
        }
    }

    /// Number of expression nodes in this tree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(Expr::node_count)
            .sum::<usize>()
    }

    /// Returns true if `pred` holds for `self` or any nested expression.
    pub fn any(&self, pred: &mut impl FnMut(&Expr) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(&mut *pred))
    }
}

/// An ordered sequence of statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

/// One `case L -> { ... }` arm of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub label: Literal,
    pub body: Block,
}

/// A statement.
///
/// Every expression a statement holds lives in a numbered root slot, and every
/// nested block in a numbered block slot. Slot numbers are stable for the
/// lifetime of the statement and are what occurrence paths are built from:
///
/// | statement | root slots | block slots |
/// |-----------|------------|-------------|
/// | `Expr`, `Return` | 0 | – |
/// | `Local` | 0 = initializer | – |
/// | `Assign` | 0 = target, 1 = value | – |
/// | `If` | 0 = condition | 0 = then, 1 = else |
/// | `Switch` | 0 = scrutinee | one per case, then default |
/// | `While`, `DoWhile` | 0 = condition | 0 = body |
/// | `For` | 0-1 = init, 2 = condition, 3-4 = update | 0 = body |
/// | `ForEach` | 0 = iterable | 0 = body |
/// | `Block` | – | 0 |
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression evaluated for its effect: `call(...);`
    Expr(Expr),
    /// Local declaration: `[final] ty name [= init];`
    Local {
        is_final: bool,
        ty: String,
        name: String,
        init: Option<Expr>,
    },
    /// Assignment `target = value;` or compound `target op= value;`
    Assign {
        target: Expr,
        op: Option<BinOp>,
        value: Expr,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    /// Nested scope that always executes: `{ ... }`
    Block(Block),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    Switch {
        scrutinee: Expr,
        cases: Vec<Case>,
        default: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    DoWhile {
        body: Block,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Block,
    },
    ForEach {
        ty: String,
        name: String,
        iterable: Expr,
        body: Block,
    },
}

/// First root slot of a `for` loop's update statement.
pub(crate) const FOR_UPDATE_SLOT: usize = 3;
/// Root slot of a `for` loop's condition.
pub(crate) const FOR_COND_SLOT: usize = 2;

impl Stmt {
    /// Expression held in root slot `slot`.
    pub fn root(&self, slot: usize) -> Option<&Expr> {
        match self {
            Stmt::Expr(e) => (slot == 0).then_some(e),
            Stmt::Return(e) => e.as_ref().filter(|_| slot == 0),
            Stmt::Local { init, .. } => init.as_ref().filter(|_| slot == 0),
            Stmt::Assign { target, value, .. } => match slot {
                0 => Some(target),
                1 => Some(value),
                _ => None,
            },
            Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
                (slot == 0).then_some(cond)
            }
            Stmt::Switch { scrutinee, .. } => (slot == 0).then_some(scrutinee),
            Stmt::ForEach { iterable, .. } => (slot == 0).then_some(iterable),
            Stmt::For {
                init, cond, update, ..
            } => match slot {
                0 | 1 => init.as_ref().and_then(|s| s.root(slot)),
                FOR_COND_SLOT => cond.as_ref(),
                3 | 4 => update.as_ref().and_then(|s| s.root(slot - FOR_UPDATE_SLOT)),
                _ => None,
            },
            Stmt::Break | Stmt::Continue | Stmt::Block(_) => None,
        }
    }

    /// Mutable access to root slot `slot`, numbered as in [`Stmt::root`].
    pub fn root_mut(&mut self, slot: usize) -> Option<&mut Expr> {
        match self {
            Stmt::Expr(e) => (slot == 0).then_some(e),
            Stmt::Return(e) => e.as_mut().filter(|_| slot == 0),
            Stmt::Local { init, .. } => init.as_mut().filter(|_| slot == 0),
            Stmt::Assign { target, value, .. } => match slot {
                0 => Some(target),
                1 => Some(value),
                _ => None,
            },
            Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
                (slot == 0).then_some(cond)
            }
            Stmt::Switch { scrutinee, .. } => (slot == 0).then_some(scrutinee),
            Stmt::ForEach { iterable, .. } => (slot == 0).then_some(iterable),
            Stmt::For {
                init, cond, update, ..
            } => match slot {
                0 | 1 => init.as_mut().and_then(|s| s.root_mut(slot)),
                FOR_COND_SLOT => cond.as_mut(),
                3 | 4 => update
                    .as_mut()
                    .and_then(|s| s.root_mut(slot - FOR_UPDATE_SLOT)),
                _ => None,
            },
            Stmt::Break | Stmt::Continue | Stmt::Block(_) => None,
        }
    }

    /// Mutable access to block slot `slot`.
    pub fn block_mut(&mut self, slot: usize) -> Option<&mut Block> {
        match self {
            Stmt::Block(b) => (slot == 0).then_some(b),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => match slot {
                0 => Some(then_branch),
                1 => else_branch.as_mut(),
                _ => None,
            },
            Stmt::Switch { cases, default, .. } => {
                if slot < cases.len() {
                    Some(&mut cases[slot].body)
                } else if slot == cases.len() {
                    default.as_mut()
                } else {
                    None
                }
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::ForEach { body, .. } => (slot == 0).then_some(body),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Null => write!(f, "null"),
            Literal::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}
