//! Source printer.
//!
//! Renders the AST back to Java-like source text. Bodies are always braced,
//! indentation is four spaces, and parentheses are only emitted where operator
//! precedence requires them.

use super::types::{BinOp, Block, Expr, Stmt};
use std::fmt::{self, Write};

const INDENT: &str = "    ";

/// Precedence of postfix forms (`.`, `[]`, calls) and atoms.
const POSTFIX: u8 = 10;
/// Precedence of prefix unary operators.
const PREFIX: u8 = 9;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } | Expr::NewArray { .. } => PREFIX,
        _ => POSTFIX,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Local(name) | Expr::TypeRef(name) => write!(f, "{name}"),
            Expr::Field { receiver, name } => {
                write_operand(f, receiver, POSTFIX)?;
                write!(f, ".{name}")
            }
            Expr::Index { array, index } => {
                write_operand(f, array, POSTFIX)?;
                write!(f, "[{index}]")
            }
            Expr::Call {
                receiver,
                method,
                args,
                ..
            } => {
                if let Some(receiver) = receiver {
                    write_operand(f, receiver, POSTFIX)?;
                    write!(f, ".")?;
                }
                write!(f, "{method}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                write_operand(f, lhs, prec)?;
                write!(f, " {} ", op.symbol())?;
                // Left-associative: an equal-precedence right operand needs parens.
                write_operand(f, rhs, prec + 1)
            }
            Expr::Unary { op, operand } => {
                write!(f, "{}", op.symbol())?;
                if matches!(**operand, Expr::Unary { .. }) {
                    write!(f, "({operand})")
                } else {
                    write_operand(f, operand, PREFIX)
                }
            }
            Expr::New { class, args } => {
                write!(f, "new {class}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::NewArray { element, len } => write!(f, "new {element}[{len}]"),
        }
    }
}

/// Writes a simple statement without its terminating `;`.
///
/// Used for statements and for the init/update clauses of `for` headers.
fn write_simple(out: &mut String, stmt: &Stmt) -> fmt::Result {
    match stmt {
        Stmt::Expr(e) => write!(out, "{e}"),
        Stmt::Local {
            is_final,
            ty,
            name,
            init,
        } => {
            if *is_final {
                write!(out, "final ")?;
            }
            write!(out, "{ty} {name}")?;
            if let Some(init) = init {
                write!(out, " = {init}")?;
            }
            Ok(())
        }
        Stmt::Assign { target, op, value } => match op {
            None => write!(out, "{target} = {value}"),
            Some(BinOp::Add) if *value == Expr::int(1) => write!(out, "{target}++"),
            Some(BinOp::Sub) if *value == Expr::int(1) => write!(out, "{target}--"),
            Some(op) => write!(out, "{target} {}= {value}", op.symbol()),
        },
        Stmt::Return(None) => write!(out, "return"),
        Stmt::Return(Some(e)) => write!(out, "return {e}"),
        Stmt::Break => write!(out, "break"),
        Stmt::Continue => write!(out, "continue"),
        other => write_stmt(out, other, 0),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

/// Writes `{`, the block's statements one level deeper, and the closing `}`
/// at `depth`. No trailing newline.
fn write_braced(out: &mut String, block: &Block, depth: usize) -> fmt::Result {
    out.push_str("{\n");
    write_block(out, block, depth + 1)?;
    indent(out, depth);
    out.push('}');
    Ok(())
}

/// Writes every statement of `block` at `depth`, one per line.
pub fn write_block(out: &mut String, block: &Block, depth: usize) -> fmt::Result {
    for stmt in &block.stmts {
        indent(out, depth);
        write_stmt(out, stmt, depth)?;
        out.push('\n');
    }
    Ok(())
}

/// Writes one statement whose first line is already indented to `depth`.
fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) -> fmt::Result {
    match stmt {
        Stmt::Expr(_)
        | Stmt::Local { .. }
        | Stmt::Assign { .. }
        | Stmt::Return(_)
        | Stmt::Break
        | Stmt::Continue => {
            write_simple(out, stmt)?;
            out.push(';');
            Ok(())
        }
        Stmt::Block(block) => write_braced(out, block, depth),
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            write!(out, "if ({cond}) ")?;
            write_braced(out, then_branch, depth)?;
            match else_branch {
                None => Ok(()),
                Some(block) => match block.stmts.as_slice() {
                    [nested @ Stmt::If { .. }] => {
                        out.push_str(" else ");
                        write_stmt(out, nested, depth)
                    }
                    _ => {
                        out.push_str(" else ");
                        write_braced(out, block, depth)
                    }
                },
            }
        }
        Stmt::Switch {
            scrutinee,
            cases,
            default,
        } => {
            writeln!(out, "switch ({scrutinee}) {{")?;
            for case in cases {
                indent(out, depth + 1);
                write!(out, "case {} -> ", case.label)?;
                write_braced(out, &case.body, depth + 1)?;
                out.push('\n');
            }
            if let Some(block) = default {
                indent(out, depth + 1);
                out.push_str("default -> ");
                write_braced(out, block, depth + 1)?;
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
            Ok(())
        }
        Stmt::While { cond, body } => {
            write!(out, "while ({cond}) ")?;
            write_braced(out, body, depth)
        }
        Stmt::DoWhile { body, cond } => {
            out.push_str("do ");
            write_braced(out, body, depth)?;
            write!(out, " while ({cond});")
        }
        Stmt::For {
            init,
            cond,
            update,
            body,
        } => {
            out.push_str("for (");
            if let Some(init) = init {
                write_simple(out, init)?;
            }
            out.push(';');
            if let Some(cond) = cond {
                write!(out, " {cond}")?;
            }
            out.push(';');
            if let Some(update) = update {
                out.push(' ');
                write_simple(out, update)?;
            }
            out.push_str(") ");
            write_braced(out, body, depth)
        }
        Stmt::ForEach {
            ty,
            name,
            iterable,
            body,
        } => {
            write!(out, "for ({ty} {name} : {iterable}) ")?;
            write_braced(out, body, depth)
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_stmt(&mut out, self, 0)?;
        f.write_str(&out)
    }
}

/// A block prints as its statements, one per line, without surrounding braces.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_block(&mut out, self, 0)?;
        f.write_str(&out)
    }
}
