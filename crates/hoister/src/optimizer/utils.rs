//! Shared helpers for the CSE pass: dependency checks and variable naming.

use crate::ast::{Block, Expr, ModifiedSet, Stmt};
use heck::ToLowerCamelCase;
use std::collections::{HashMap, HashSet};

// ── Dependencies ─────────────────────────────────────────────────────────────

/// Returns true if `expr` reads anything in `modified`.
///
/// A sub-expression counts when it equals a modified target. An element read
/// `a[j]` also counts when any element `a[k]` of a structurally equal array
/// was written, since the indices may alias.
pub fn is_modified(expr: &Expr, modified: &ModifiedSet) -> bool {
    if modified.is_empty() {
        return false;
    }
    expr.any(&mut |sub| {
        modified.contains(sub)
            || matches!(sub, Expr::Index { array, .. } if writes_element_of(modified, array))
    })
}

/// Returns true if reading `expr` depends on the single target `target`.
pub fn depends_on(expr: &Expr, target: &Expr) -> bool {
    expr.any(&mut |sub| {
        sub == target
            || matches!(
                (sub, target),
                (Expr::Index { array, .. }, Expr::Index { array: written, .. }) if array == written
            )
    })
}

fn writes_element_of(modified: &ModifiedSet, array: &Expr) -> bool {
    modified
        .iter()
        .any(|t| matches!(t, Expr::Index { array: written, .. } if **written == *array))
}

// ── Naming ───────────────────────────────────────────────────────────────────

/// Identifier stem for a variable holding `expr`: `a.length` → `aLength`.
pub fn name_stem(expr: &Expr) -> String {
    let text = expr.to_string();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let stem = words.join(" ").to_lower_camel_case();
    if stem.is_empty() {
        "value".to_string()
    } else if stem.starts_with(|c: char| c.is_ascii_digit()) {
        format!("v{stem}")
    } else {
        stem
    }
}

/// Hands out distinct variable names, numbering collisions per stem:
/// `aLength`, `aLength1`, `aLength2`.
#[derive(Debug, Default)]
pub struct NameGenerator {
    used: HashSet<String>,
    counters: HashMap<String, usize>,
}

impl NameGenerator {
    /// Generator that also avoids every local declared in `block`.
    pub fn avoiding_locals(block: &Block) -> Self {
        let mut names = Self::default();
        collect_declared(block, &mut names.used);
        names
    }

    pub fn fresh(&mut self, stem: &str) -> String {
        if self.used.insert(stem.to_string()) {
            return stem.to_string();
        }
        let counter = self.counters.entry(stem.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{stem}{counter}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn collect_declared(block: &Block, out: &mut HashSet<String>) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Local { name, .. } => {
                out.insert(name.clone());
            }
            Stmt::ForEach { name, body, .. } => {
                out.insert(name.clone());
                collect_declared(body, out);
            }
            Stmt::For { init, body, .. } => {
                if let Some(Stmt::Local { name, .. }) = init.as_deref() {
                    out.insert(name.clone());
                }
                collect_declared(body, out);
            }
            Stmt::Block(body) | Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
                collect_declared(body, out)
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_declared(then_branch, out);
                if let Some(else_branch) = else_branch {
                    collect_declared(else_branch, out);
                }
            }
            Stmt::Switch { cases, default, .. } => {
                for case in cases {
                    collect_declared(&case.body, out);
                }
                if let Some(default) = default {
                    collect_declared(default, out);
                }
            }
            Stmt::Expr(_)
            | Stmt::Assign { .. }
            | Stmt::Return(_)
            | Stmt::Break
            | Stmt::Continue => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn a_length() -> Expr {
        Expr::field(Expr::local("a"), "length")
    }

    #[test]
    fn literals_are_never_modified() {
        let modified: ModifiedSet = [Expr::local("a")].into_iter().collect();
        assert!(!is_modified(&Expr::int(3), &modified));
        assert!(is_modified(&a_length(), &modified));
        assert!(!is_modified(&Expr::field(Expr::local("b"), "length"), &modified));
    }

    #[test]
    fn field_writes_are_structural() {
        let modified: ModifiedSet = [Expr::field(Expr::local("p"), "x")].into_iter().collect();
        assert!(is_modified(
            &Expr::binary(BinOp::Add, Expr::field(Expr::local("p"), "x"), Expr::int(1)),
            &modified
        ));
        assert!(!is_modified(&Expr::field(Expr::local("p"), "y"), &modified));
    }

    #[test]
    fn element_writes_alias_every_index_of_the_same_array() {
        let written = Expr::index(Expr::local("a"), Expr::local("k"));
        let modified: ModifiedSet = [written.clone()].into_iter().collect();
        let other = Expr::index(Expr::local("a"), Expr::int(0));
        assert!(is_modified(&other, &modified));
        assert!(depends_on(&other, &written));
        assert!(!is_modified(&Expr::index(Expr::local("b"), Expr::int(0)), &modified));
        // The array itself and its length are untouched by an element write.
        assert!(!is_modified(&a_length(), &modified));
    }

    #[test]
    fn stems_are_lower_camel_case() {
        assert_eq!(name_stem(&a_length()), "aLength");
        assert_eq!(
            name_stem(&Expr::call(
                Some(Expr::TypeRef("Math".into())),
                "max",
                vec![Expr::local("a"), Expr::local("b")]
            )),
            "mathMaxAB"
        );
        assert_eq!(name_stem(&Expr::Literal(crate::ast::Literal::Str("".into()))), "value");
    }

    #[test]
    fn collisions_are_numbered_per_stem() {
        let mut names = NameGenerator::default();
        assert_eq!(names.fresh("aLength"), "aLength");
        assert_eq!(names.fresh("aLength"), "aLength1");
        assert_eq!(names.fresh("pX"), "pX");
        assert_eq!(names.fresh("aLength"), "aLength2");
        assert_eq!(names.fresh("pX"), "pX1");
    }

    #[test]
    fn declared_locals_are_avoided() {
        let block = Block::new(vec![Stmt::Local {
            is_final: false,
            ty: "int".into(),
            name: "aLength".into(),
            init: None,
        }]);
        let mut names = NameGenerator::avoiding_locals(&block);
        assert_eq!(names.fresh("aLength"), "aLength1");
    }
}
