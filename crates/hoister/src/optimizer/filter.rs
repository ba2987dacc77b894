//! Eligibility predicates deciding which expressions the pass may hoist.

use crate::ast::Expr;

/// Decides whether an expression may be tracked and hoisted.
///
/// Any `Fn(&Expr) -> bool` closure is an eligibility predicate.
pub trait Eligibility {
    fn accepts(&self, expr: &Expr) -> bool;
}

impl<F> Eligibility for F
where
    F: Fn(&Expr) -> bool,
{
    fn accepts(&self, expr: &Expr) -> bool {
        self(expr)
    }
}

/// Default policy: field reads, array element reads and value-producing calls.
///
/// Field reads rooted at a type reference (`Integer.MAX`) are static reads and
/// are only accepted with `static_fields`. Expressions that allocate are never
/// accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEligibility {
    pub static_fields: bool,
}

impl Eligibility for DefaultEligibility {
    fn accepts(&self, expr: &Expr) -> bool {
        if expr.any(&mut |e| matches!(e, Expr::New { .. } | Expr::NewArray { .. })) {
            return false;
        }
        match expr {
            Expr::Field { receiver, .. } => self.static_fields || !is_static(receiver),
            Expr::Index { .. } => true,
            Expr::Call { yields_value, .. } => *yields_value,
            _ => false,
        }
    }
}

/// Returns true if the receiver chain of `expr` starts at a type reference.
fn is_static(expr: &Expr) -> bool {
    match expr {
        Expr::TypeRef(_) => true,
        Expr::Field { receiver, .. } => is_static(receiver),
        _ => false,
    }
}
