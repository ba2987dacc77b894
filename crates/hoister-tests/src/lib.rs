//! Reference interpreter for hoister programs.
//!
//! The equivalence tests run every program before and after optimization and
//! compare what it printed and returned. The interpreter knows just enough of
//! the language for that: integers, booleans, strings, arrays, field bags
//! created by `new C()`, and a handful of pure builtins (`print`, `Math.*`,
//! `String.length()`/`charAt()`).

use anyhow::{anyhow, bail, Result};
use hoister::ast::{BinOp, Block, Expr, Literal, Stmt, UnOp};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Program fixtures shared by the equivalence tests and the benchmarks.
pub const FIXTURES: &[(&str, &str)] = &[
    ("array_sum", include_str!("../data/array_sum.java")),
    ("branches", include_str!("../data/branches.java")),
    ("fields", include_str!("../data/fields.java")),
    ("matrix", include_str!("../data/matrix.java")),
    ("nested_branch", include_str!("../data/nested_branch.java")),
    ("strings", include_str!("../data/strings.java")),
    ("switch_loop", include_str!("../data/switch_loop.java")),
    ("writes", include_str!("../data/writes.java")),
    ("zero_trip", include_str!("../data/zero_trip.java")),
];

/// Programs that stop with a runtime error, which optimization must keep.
pub const FAILING_FIXTURES: &[(&str, &str)] = &[
    ("empty_array", include_str!("../data/empty_array.java")),
    ("null_receiver", include_str!("../data/null_receiver.java")),
];

/// Upper bound on executed statements, so a broken rewrite cannot hang a test.
const MAX_STEPS: usize = 1_000_000;

/// A runtime value. Arrays and objects are shared references.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    Null,
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<HashMap<String, Value>>>),
}

impl Value {
    fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => bail!("expected int, found {other}"),
        }
    }

    fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => bail!("expected boolean, found {other}"),
        }
    }

    /// `==` as the language defines it: by value for scalars and strings, by
    /// identity for arrays and objects.
    fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn default_for(ty: &str) -> Value {
        match ty {
            "int" | "long" | "short" | "byte" | "char" => Value::Int(0),
            "boolean" => Value::Bool(false),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                let fields = fields.borrow();
                let mut names: Vec<_> = fields.keys().collect();
                names.sort();
                write!(f, "{{")?;
                for (i, name) in names.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}={}", fields[name])?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Observable result of running a program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    /// Lines written by `print`.
    pub lines: Vec<String>,
    /// Rendered value of a top-level `return`, if one ran.
    pub returned: Option<String>,
}

/// Runs `program` from an empty environment.
pub fn run(program: &Block) -> Result<Outcome> {
    let mut interp = Interpreter::default();
    interp.scopes.push(HashMap::new());
    let returned = match interp.block(program)? {
        Flow::Return(value) => value.map(|v| v.to_string()),
        Flow::Normal => None,
        Flow::Break | Flow::Continue => bail!("break or continue outside a loop"),
    };
    Ok(Outcome {
        lines: interp.lines,
        returned,
    })
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Option<Value>),
}

/// An assignable location, resolved before the value is computed.
enum Place {
    Local(String),
    Field(Rc<RefCell<HashMap<String, Value>>>, String),
    Element(Rc<RefCell<Vec<Value>>>, usize),
}

#[derive(Default)]
struct Interpreter {
    scopes: Vec<HashMap<String, Value>>,
    lines: Vec<String>,
    steps: usize,
}

impl Interpreter {
    // ── Statements ───────────────────────────────────────────────────────

    fn block(&mut self, block: &Block) -> Result<Flow> {
        self.scopes.push(HashMap::new());
        let flow = self.stmts(&block.stmts);
        self.scopes.pop();
        flow
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            match self.stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            bail!("step limit of {MAX_STEPS} exceeded");
        }
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Local { ty, name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init)?,
                    None => Value::default_for(ty),
                };
                self.declare(name, value)?;
            }
            Stmt::Assign { target, op, value } => {
                let place = self.place(target)?;
                let value = match op {
                    Some(op) => {
                        let current = self.load(&place)?;
                        let rhs = self.eval(value)?;
                        binary(*op, current, rhs)?
                    }
                    None => self.eval(value)?,
                };
                self.store(place, value)?;
            }
            Stmt::Return(value) => {
                let value = value.as_ref().map(|e| self.eval(e)).transpose()?;
                return Ok(Flow::Return(value));
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Block(block) => return self.block(block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond)?.as_bool()? {
                    return self.block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.block(else_branch);
                }
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let value = self.eval(scrutinee)?;
                let arm = cases
                    .iter()
                    .find(|case| literal(&case.label).same(&value))
                    .map(|case| &case.body)
                    .or(default.as_ref());
                if let Some(body) = arm {
                    return match self.block(body)? {
                        Flow::Break => Ok(Flow::Normal),
                        other => Ok(other),
                    };
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.as_bool()? {
                    match self.block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::DoWhile { body, cond } => loop {
                match self.block(body)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Normal | Flow::Continue => {}
                }
                if !self.eval(cond)?.as_bool()? {
                    break;
                }
            },
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.scopes.push(HashMap::new());
                let flow = self.for_loop(init.as_deref(), cond.as_ref(), update.as_deref(), body);
                self.scopes.pop();
                return flow;
            }
            Stmt::ForEach {
                name,
                iterable,
                body,
                ..
            } => {
                let items: Vec<Value> = match self.eval(iterable)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string().into())).collect(),
                    other => bail!("cannot iterate over {other}"),
                };
                for item in items {
                    self.scopes.push(HashMap::from([(name.clone(), item)]));
                    let flow = self.block(body);
                    self.scopes.pop();
                    match flow? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn for_loop(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Stmt>,
        body: &Block,
    ) -> Result<Flow> {
        if let Some(init) = init {
            self.stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval(cond)?.as_bool()? {
                    break;
                }
            }
            match self.block(body)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(update) = update {
                self.stmt(update)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ── Variables and places ─────────────────────────────────────────────

    fn declare(&mut self, name: &str, value: Value) -> Result<()> {
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| anyhow!("no scope to declare `{name}` in"))?;
        if scope.insert(name.to_string(), value).is_some() {
            bail!("`{name}` is already declared in this scope");
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| anyhow!("undefined variable `{name}`"))
    }

    fn place(&mut self, target: &Expr) -> Result<Place> {
        match target {
            Expr::Local(name) => Ok(Place::Local(name.clone())),
            Expr::Field { receiver, name } => match self.eval(receiver)? {
                Value::Object(fields) => Ok(Place::Field(fields, name.clone())),
                other => bail!("cannot assign field `{name}` of {other}"),
            },
            Expr::Index { array, index } => {
                let array = self.eval(array)?;
                let index = self.eval(index)?.as_int()?;
                match array {
                    Value::Array(items) => {
                        let slot = checked_index(&items.borrow(), index)?;
                        Ok(Place::Element(items, slot))
                    }
                    other => bail!("cannot index into {other}"),
                }
            }
            other => bail!("`{other}` is not assignable"),
        }
    }

    fn load(&self, place: &Place) -> Result<Value> {
        match place {
            Place::Local(name) => self.lookup(name),
            Place::Field(fields, name) => fields
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("field `{name}` was never set")),
            Place::Element(items, slot) => Ok(items.borrow()[*slot].clone()),
        }
    }

    fn store(&mut self, place: Place, value: Value) -> Result<()> {
        match place {
            Place::Local(name) => {
                let scope = self
                    .scopes
                    .iter_mut()
                    .rev()
                    .find(|scope| scope.contains_key(&name))
                    .ok_or_else(|| anyhow!("assignment to undeclared `{name}`"))?;
                scope.insert(name, value);
            }
            Place::Field(fields, name) => {
                fields.borrow_mut().insert(name, value);
            }
            Place::Element(items, slot) => items.borrow_mut()[slot] = value,
        }
        Ok(())
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Local(name) => self.lookup(name),
            Expr::TypeRef(name) => bail!("type `{name}` used as a value"),
            Expr::Field { receiver, name } => {
                if let Expr::TypeRef(ty) = &**receiver {
                    return static_field(ty, name);
                }
                match self.eval(receiver)? {
                    Value::Array(items) if name == "length" => {
                        Ok(Value::Int(items.borrow().len() as i64))
                    }
                    Value::Object(fields) => self.load(&Place::Field(fields, name.clone())),
                    other => bail!("cannot read field `{name}` of {other}"),
                }
            }
            Expr::Index { array, index } => {
                let array = self.eval(array)?;
                let index = self.eval(index)?.as_int()?;
                match array {
                    Value::Array(items) => {
                        let items = items.borrow();
                        Ok(items[checked_index(&items, index)?].clone())
                    }
                    other => bail!("cannot index into {other}"),
                }
            }
            Expr::Call {
                receiver,
                method,
                args,
                ..
            } => self.call(receiver.as_deref(), method, args),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                match op {
                    BinOp::And if !lhs.as_bool()? => Ok(Value::Bool(false)),
                    BinOp::Or if lhs.as_bool()? => Ok(Value::Bool(true)),
                    BinOp::And | BinOp::Or => Ok(Value::Bool(self.eval(rhs)?.as_bool()?)),
                    _ => {
                        let rhs = self.eval(rhs)?;
                        binary(*op, lhs, rhs)
                    }
                }
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnOp::Neg => Ok(Value::Int(value.as_int()?.wrapping_neg())),
                    UnOp::Not => Ok(Value::Bool(!value.as_bool()?)),
                }
            }
            Expr::New { args, .. } => {
                for arg in args {
                    self.eval(arg)?;
                }
                Ok(Value::Object(Rc::default()))
            }
            Expr::NewArray { element, len } => {
                let len = self.eval(len)?.as_int()?;
                let len = usize::try_from(len).map_err(|_| anyhow!("negative array size {len}"))?;
                let items = vec![Value::default_for(element); len];
                Ok(Value::Array(Rc::new(RefCell::new(items))))
            }
        }
    }

    fn call(&mut self, receiver: Option<&Expr>, method: &str, args: &[Expr]) -> Result<Value> {
        let receiver = match receiver {
            Some(Expr::TypeRef(ty)) => Some(Err(ty.as_str())),
            Some(expr) => Some(Ok(self.eval(expr)?)),
            None => None,
        };
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>>>()?;

        match (receiver, method, args.as_slice()) {
            (None, "print", [value]) => {
                self.lines.push(value.to_string());
                Ok(Value::Null)
            }
            (Some(Err("Math")), "max", [a, b]) => Ok(Value::Int(a.as_int()?.max(b.as_int()?))),
            (Some(Err("Math")), "min", [a, b]) => Ok(Value::Int(a.as_int()?.min(b.as_int()?))),
            (Some(Err("Math")), "abs", [a]) => Ok(Value::Int(a.as_int()?.wrapping_abs())),
            (Some(Ok(Value::Str(s))), "length", []) => Ok(Value::Int(s.chars().count() as i64)),
            (Some(Ok(Value::Str(s))), "charAt", [i]) => {
                let i = i.as_int()?;
                let c = usize::try_from(i)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .ok_or_else(|| anyhow!("string index {i} out of bounds"))?;
                Ok(Value::Str(c.to_string().into()))
            }
            (_, method, args) => bail!("unknown method `{method}` with {} argument(s)", args.len()),
        }
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Int(v) => Value::Int(*v),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Str(s) => Value::Str(s.as_str().into()),
        Literal::Null => Value::Null,
    }
}

fn static_field(ty: &str, name: &str) -> Result<Value> {
    match (ty, name) {
        ("Integer", "MAX") => Ok(Value::Int(i32::MAX.into())),
        ("Integer", "MIN") => Ok(Value::Int(i32::MIN.into())),
        _ => bail!("unknown static field `{ty}.{name}`"),
    }
}

fn checked_index(items: &[Value], index: i64) -> Result<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < items.len())
        .ok_or_else(|| anyhow!("index {index} out of bounds for length {}", items.len()))
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
    if op == BinOp::Add && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_))) {
        return Ok(Value::Str(format!("{lhs}{rhs}").into()));
    }
    Ok(match op {
        BinOp::Eq => Value::Bool(lhs.same(&rhs)),
        BinOp::Ne => Value::Bool(!lhs.same(&rhs)),
        BinOp::And => Value::Bool(lhs.as_bool()? && rhs.as_bool()?),
        BinOp::Or => Value::Bool(lhs.as_bool()? || rhs.as_bool()?),
        BinOp::Add => Value::Int(lhs.as_int()?.wrapping_add(rhs.as_int()?)),
        BinOp::Sub => Value::Int(lhs.as_int()?.wrapping_sub(rhs.as_int()?)),
        BinOp::Mul => Value::Int(lhs.as_int()?.wrapping_mul(rhs.as_int()?)),
        BinOp::Div => Value::Int(
            lhs.as_int()?
                .checked_div(rhs.as_int()?)
                .ok_or_else(|| anyhow!("division by zero"))?,
        ),
        BinOp::Rem => Value::Int(
            lhs.as_int()?
                .checked_rem(rhs.as_int()?)
                .ok_or_else(|| anyhow!("division by zero"))?,
        ),
        BinOp::Lt => Value::Bool(lhs.as_int()? < rhs.as_int()?),
        BinOp::Le => Value::Bool(lhs.as_int()? <= rhs.as_int()?),
        BinOp::Gt => Value::Bool(lhs.as_int()? > rhs.as_int()?),
        BinOp::Ge => Value::Bool(lhs.as_int()? >= rhs.as_int()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoister::parser::parse_program;

    fn output(source: &str) -> Vec<String> {
        run(&parse_program(source).unwrap()).unwrap().lines
    }

    #[test]
    fn prints_arithmetic_and_strings() {
        assert_eq!(
            output("int x = 2 + 3 * 4;\nprint(x);\nprint(\"n=\" + x);\n"),
            ["14", "n=14"]
        );
    }

    #[test]
    fn arrays_and_objects_are_shared_references() {
        let lines = output(
            "int[] a = new int[2];\nint[] b = a;\nb[1] = 7;\nprint(a);\n\
             Point p = new Point();\np.x = 3;\nprint(p.x);\n",
        );
        assert_eq!(lines, ["[0, 7]", "3"]);
    }

    #[test]
    fn loops_honour_break_and_continue() {
        let lines = output(
            "int s = 0;\nfor (int i = 0; i < 10; i++) {\n    if (i == 2) {\n        continue;\n    }\n    \
             if (i == 5) {\n        break;\n    }\n    s += i;\n}\nprint(s);\n",
        );
        assert_eq!(lines, ["8"]);
    }

    #[test]
    fn top_level_return_is_reported() {
        let outcome = run(&parse_program("int x = 4;\nreturn x * x;\nprint(x);\n").unwrap()).unwrap();
        assert!(outcome.lines.is_empty());
        assert_eq!(outcome.returned.as_deref(), Some("16"));
    }

    #[test]
    fn runtime_errors_are_reported() {
        let err = run(&parse_program("int[] a = new int[1];\nprint(a[3]);\n").unwrap()).unwrap_err();
        assert!(err.to_string().contains("out of bounds"), "{err}");
        let err = run(&parse_program("print(1 / 0);\n").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn every_fixture_runs() {
        for (name, source) in FIXTURES {
            let program = parse_program(source).unwrap();
            let outcome = run(&program).unwrap_or_else(|e| panic!("{name}: {e:#}"));
            assert!(!outcome.lines.is_empty(), "{name} printed nothing");
        }
    }

    #[test]
    fn every_failing_fixture_fails() {
        for (name, source) in FAILING_FIXTURES {
            let program = parse_program(source).unwrap();
            assert!(run(&program).is_err(), "{name} ran to completion");
        }
    }
}
