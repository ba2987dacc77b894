//! Parser for the Java-like statement language.
//!
//! A program is a sequence of statements forming the root block; there are no
//! class or method wrappers. The parser is a hand-written recursive descent
//! over the tokens produced by [`lexer::tokenize`]; errors report the
//! `line:column` of the offending token.

mod lexer;

use crate::ast::{BinOp, Block, Case, Expr, Literal, Stmt, UnOp};
use anyhow::{bail, Result};
use lexer::{tokenize, Tok, Token};

const KEYWORDS: &[&str] = &[
    "if", "else", "while", "do", "for", "switch", "case", "default", "return", "break",
    "continue", "final", "new", "true", "false", "null",
];

/// Binary operators by precedence level, loosest first.
const BINARY_LEVELS: &[&[(&str, BinOp)]] = &[
    &[("||", BinOp::Or)],
    &[("&&", BinOp::And)],
    &[("==", BinOp::Eq), ("!=", BinOp::Ne)],
    &[
        ("<", BinOp::Lt),
        ("<=", BinOp::Le),
        (">", BinOp::Gt),
        (">=", BinOp::Ge),
    ],
    &[("+", BinOp::Add), ("-", BinOp::Sub)],
    &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Rem)],
];

const COMPOUND_ASSIGN: &[(&str, BinOp)] = &[
    ("+=", BinOp::Add),
    ("-=", BinOp::Sub),
    ("*=", BinOp::Mul),
    ("/=", BinOp::Div),
    ("%=", BinOp::Rem),
];

/// Parses a whole program into its root block.
pub fn parse_program(source: &str) -> Result<Block> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let mut stmts = Vec::new();
    while !parser.at_eof() {
        stmts.push(parser.statement()?);
    }
    Ok(Block::new(stmts))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn at_eof(&self) -> bool {
        *self.peek() == Tok::Eof
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error<T>(&self, message: impl std::fmt::Display) -> Result<T> {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        bail!("{}:{}: {message}", token.line, token.col)
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(name) if name == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            self.error(format!("expected '{p}', found {}", describe(self.peek())))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            self.error(format!("expected '{kw}', found {}", describe(self.peek())))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek() {
            Tok::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => self.error(format!("expected identifier, found {}", describe(other))),
        }
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.braced_block()?));
        }
        if self.eat_keyword("if") {
            return self.if_statement();
        }
        if self.eat_keyword("switch") {
            return self.switch_statement();
        }
        if self.eat_keyword("while") {
            self.expect_punct("(")?;
            let cond = self.expression()?;
            self.expect_punct(")")?;
            let body = self.body()?;
            return Ok(Stmt::While { cond, body });
        }
        if self.eat_keyword("do") {
            let body = self.body()?;
            self.expect_keyword("while")?;
            self.expect_punct("(")?;
            let cond = self.expression()?;
            self.expect_punct(")")?;
            self.expect_punct(";")?;
            return Ok(Stmt::DoWhile { body, cond });
        }
        if self.eat_keyword("for") {
            return self.for_statement();
        }
        if self.eat_keyword("return") {
            let value = if self.is_punct(";") {
                None
            } else {
                Some(self.expression()?)
            };
            self.expect_punct(";")?;
            return Ok(Stmt::Return(value));
        }
        if self.eat_keyword("break") {
            self.expect_punct(";")?;
            return Ok(Stmt::Break);
        }
        if self.eat_keyword("continue") {
            self.expect_punct(";")?;
            return Ok(Stmt::Continue);
        }
        let stmt = self.simple_statement()?;
        self.expect_punct(";")?;
        Ok(stmt)
    }

    fn braced_block(&mut self) -> Result<Block> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return self.error("unexpected end of input, expected '}'");
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        Ok(Block::new(stmts))
    }

    /// Body of a branch or loop; a lone statement is wrapped in a block.
    fn body(&mut self) -> Result<Block> {
        if self.is_punct("{") {
            self.braced_block()
        } else {
            Ok(Block::new(vec![self.statement()?]))
        }
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let then_branch = self.body()?;
        let else_branch = if self.eat_keyword("else") {
            Some(self.body()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt> {
        self.expect_punct("(")?;
        let scrutinee = self.expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        let mut default = None;
        while !self.eat_punct("}") {
            if self.eat_keyword("case") {
                let label = self.literal()?;
                self.expect_punct("->")?;
                let body = self.body()?;
                cases.push(Case { label, body });
            } else if self.eat_keyword("default") {
                if default.is_some() {
                    return self.error("duplicate default arm");
                }
                self.expect_punct("->")?;
                default = Some(self.body()?);
            } else {
                return self.error(format!(
                    "expected 'case' or 'default', found {}",
                    describe(self.peek())
                ));
            }
        }
        Ok(Stmt::Switch {
            scrutinee,
            cases,
            default,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.expect_punct("(")?;
        if self.declaration_ahead() {
            let (is_final, ty, name) = self.declaration_head()?;
            if self.eat_punct(":") {
                let iterable = self.expression()?;
                self.expect_punct(")")?;
                let body = self.body()?;
                return Ok(Stmt::ForEach {
                    ty,
                    name,
                    iterable,
                    body,
                });
            }
            let init = self.declaration_tail(is_final, ty, name)?;
            return self.for_rest(Some(Box::new(init)));
        }
        let init = if self.is_punct(";") {
            None
        } else {
            Some(Box::new(self.simple_statement()?))
        };
        self.for_rest(init)
    }

    fn for_rest(&mut self, init: Option<Box<Stmt>>) -> Result<Stmt> {
        self.expect_punct(";")?;
        let cond = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(Box::new(self.simple_statement()?))
        };
        self.expect_punct(")")?;
        let body = self.body()?;
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    /// Returns true if the upcoming tokens start a local declaration:
    /// `final ...`, `Type name`, or `Type[] name`.
    fn declaration_ahead(&self) -> bool {
        if self.is_keyword("final") {
            return true;
        }
        let Tok::Ident(ty) = self.peek() else {
            return false;
        };
        if KEYWORDS.contains(&ty.as_str()) {
            return false;
        }
        match self.peek_at(1) {
            Tok::Ident(_) => true,
            Tok::Punct("[") => *self.peek_at(2) == Tok::Punct("]"),
            _ => false,
        }
    }

    fn declaration_head(&mut self) -> Result<(bool, String, String)> {
        let is_final = self.eat_keyword("final");
        let mut ty = self.ident()?;
        while self.is_punct("[") {
            self.advance();
            self.expect_punct("]")?;
            ty.push_str("[]");
        }
        let name = self.ident()?;
        Ok((is_final, ty, name))
    }

    fn declaration_tail(&mut self, is_final: bool, ty: String, name: String) -> Result<Stmt> {
        let init = if self.eat_punct("=") {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Stmt::Local {
            is_final,
            ty,
            name,
            init,
        })
    }

    /// Declaration, assignment, increment or call, without the trailing `;`.
    fn simple_statement(&mut self) -> Result<Stmt> {
        if self.declaration_ahead() {
            let (is_final, ty, name) = self.declaration_head()?;
            return self.declaration_tail(is_final, ty, name);
        }
        let expr = self.expression()?;

        let op = if self.eat_punct("=") {
            Some(None)
        } else if let Some((_, op)) = COMPOUND_ASSIGN.iter().find(|(p, _)| self.is_punct(p)) {
            self.advance();
            Some(Some(*op))
        } else {
            None
        };
        if let Some(op) = op {
            if !expr.is_assignable() {
                return self.error(format!("cannot assign to `{expr}`"));
            }
            let value = self.expression()?;
            return Ok(Stmt::Assign {
                target: expr,
                op,
                value,
            });
        }

        for (p, op) in [("++", BinOp::Add), ("--", BinOp::Sub)] {
            if self.eat_punct(p) {
                if !expr.is_assignable() {
                    return self.error(format!("cannot apply {p} to `{expr}`"));
                }
                return Ok(Stmt::Assign {
                    target: expr,
                    op: Some(op),
                    value: Expr::int(1),
                });
            }
        }

        match expr {
            Expr::Call {
                receiver,
                method,
                args,
                ..
            } => Ok(Stmt::Expr(Expr::Call {
                receiver,
                method,
                args,
                yields_value: false,
            })),
            other => self.error(format!("`{other}` is not a statement")),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.binary(0)
    }

    fn binary(&mut self, level: usize) -> Result<Expr> {
        if level == BINARY_LEVELS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(level + 1)?;
        while let Some(&(_, op)) = BINARY_LEVELS[level].iter().find(|(p, _)| self.is_punct(p)) {
            self.advance();
            let rhs = self.binary(level + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        for (p, op) in [("-", UnOp::Neg), ("!", UnOp::Not)] {
            if self.eat_punct(p) {
                let operand = self.unary()?;
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.ident()?;
                if self.eat_punct("(") {
                    let args = self.arguments()?;
                    expr = Expr::call(Some(expr), &name, args);
                } else {
                    expr = Expr::Field {
                        receiver: Box::new(expr),
                        name,
                    };
                }
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::index(expr, index);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated arguments after an already consumed `(`.
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat_punct(")") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Tok::Int(_) | Tok::Str(_) => Ok(Expr::Literal(self.literal()?)),
            Tok::Punct("(") => {
                self.advance();
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Tok::Ident(word) => match word.as_str() {
                "true" | "false" | "null" => Ok(Expr::Literal(self.literal()?)),
                "new" => {
                    self.advance();
                    let class = self.ident()?;
                    if self.eat_punct("[") {
                        let len = self.expression()?;
                        self.expect_punct("]")?;
                        Ok(Expr::NewArray {
                            element: class,
                            len: Box::new(len),
                        })
                    } else {
                        self.expect_punct("(")?;
                        let args = self.arguments()?;
                        Ok(Expr::New { class, args })
                    }
                }
                _ => {
                    let name = self.ident()?;
                    if self.eat_punct("(") {
                        let args = self.arguments()?;
                        Ok(Expr::call(None, &name, args))
                    } else if name.starts_with(|c: char| c.is_ascii_uppercase()) {
                        Ok(Expr::TypeRef(name))
                    } else {
                        Ok(Expr::Local(name))
                    }
                }
            },
            other => self.error(format!("expected expression, found {}", describe(&other))),
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        let negative = self.eat_punct("-");
        let lit = match self.peek() {
            Tok::Int(v) => Literal::Int(if negative { -*v } else { *v }),
            Tok::Str(s) if !negative => Literal::Str(s.clone()),
            Tok::Ident(w) if !negative && w == "true" => Literal::Bool(true),
            Tok::Ident(w) if !negative && w == "false" => Literal::Bool(false),
            Tok::Ident(w) if !negative && w == "null" => Literal::Null,
            other => return self.error(format!("expected literal, found {}", describe(other))),
        };
        self.advance();
        Ok(lit)
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(name) => format!("'{name}'"),
        Tok::Int(v) => format!("'{v}'"),
        Tok::Str(s) => format!("\"{s}\""),
        Tok::Punct(p) => format!("'{p}'"),
        Tok::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(source: &str) -> String {
        parse_program(source).unwrap().to_string()
    }

    #[test]
    fn declarations_and_assignments() {
        let block = parse_program("int[] a = new int[3]; a[0] = 1; x += a.length; i++;").unwrap();
        assert_eq!(block.stmts.len(), 4);
        assert!(matches!(
            &block.stmts[0],
            Stmt::Local { ty, name, init: Some(Expr::NewArray { .. }), .. }
                if ty == "int[]" && name == "a"
        ));
        assert!(matches!(
            &block.stmts[2],
            Stmt::Assign {
                op: Some(BinOp::Add),
                ..
            }
        ));
        assert_eq!(
            block.stmts[3],
            Stmt::Assign {
                target: Expr::local("i"),
                op: Some(BinOp::Add),
                value: Expr::int(1),
            }
        );
    }

    #[test]
    fn statement_level_calls_are_void() {
        let block = parse_program("print(s.length());").unwrap();
        let Stmt::Expr(Expr::Call {
            yields_value, args, ..
        }) = &block.stmts[0]
        else {
            panic!("expected call statement");
        };
        assert!(!yields_value);
        assert!(matches!(
            &args[0],
            Expr::Call {
                yields_value: true,
                ..
            }
        ));
    }

    #[test]
    fn capitalised_receivers_are_type_refs() {
        let block = parse_program("x = Math.max(a, Integer.MAX);").unwrap();
        let Stmt::Assign { value, .. } = &block.stmts[0] else {
            panic!("expected assignment");
        };
        let Expr::Call { receiver, args, .. } = value else {
            panic!("expected call");
        };
        assert_eq!(receiver.as_deref(), Some(&Expr::TypeRef("Math".into())));
        assert_eq!(args[1], Expr::field(Expr::TypeRef("Integer".into()), "MAX"));
    }

    #[test]
    fn precedence_and_roundtrip() {
        assert_eq!(roundtrip("x = a + b * c - d;"), "x = a + b * c - d;\n");
        assert_eq!(roundtrip("x = (a + b) * c;"), "x = (a + b) * c;\n");
        assert_eq!(
            roundtrip("if (a < b && !c) x = 1; else x = 2;"),
            "if (a < b && !c) {\n    x = 1;\n} else {\n    x = 2;\n}\n"
        );
    }

    #[test]
    fn loops_roundtrip() {
        let source = "\
for (int i = 0; i < a.length; i++) {
    s += a[i];
}
for (int v : a) {
    print(v);
}
while (n > 0) {
    n--;
}
do {
    n++;
} while (n < 3);
";
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn switch_roundtrip() {
        let source = "\
switch (k) {
    case 1 -> {
        x = 1;
    }
    case -2 -> {
        x = 2;
    }
    default -> {
        x = 3;
    }
}
";
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn non_statement_expression_is_rejected() {
        let err = parse_program("a.b;").unwrap_err();
        assert!(err.to_string().contains("is not a statement"), "{err}");
    }

    #[test]
    fn assignment_to_call_is_rejected() {
        let err = parse_program("f() = 1;").unwrap_err();
        assert!(err.to_string().contains("cannot assign"), "{err}");
    }

    #[test]
    fn missing_semicolon_reports_position() {
        let err = parse_program("x = 1\ny = 2;").unwrap_err();
        assert_eq!(err.to_string(), "2:1: expected ';', found 'y'");
    }
}
