// lir.rs — Statement IR between lowering and rendering
//
// Lowering produces a flat list of indented statements. Expressions are
// text fragments interleaved with references to generated variables, so the
// flattener can decide per variable whether to keep the name or substitute
// its initializer without re-parsing any text.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::collections::HashMap;

// ── Variables ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Where a variable's initializer may be substituted for its single use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlinePolicy {
    /// Parameters, locals, loop indices, out-parameters: never inlined.
    Never,
    /// Pure producers: anywhere.
    Anywhere,
    /// Impure producers: only into the statement immediately following.
    NextStatement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub name: String,
    pub inline: InlinePolicy,
}

// ── Expressions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Var(VarId),
}

/// Text with embedded variable references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expr(pub Vec<Part>);

impl Expr {
    pub fn text(s: impl Into<String>) -> Expr {
        let s = s.into();
        if s.is_empty() {
            Expr::default()
        } else {
            Expr(vec![Part::Text(s)])
        }
    }

    pub fn var(var: VarId) -> Expr {
        Expr(vec![Part::Var(var)])
    }

    pub fn push_text(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        match self.0.last_mut() {
            Some(Part::Text(prev)) => prev.push_str(s),
            _ => self.0.push(Part::Text(s.to_string())),
        }
    }

    pub fn push_var(&mut self, var: VarId) {
        self.0.push(Part::Var(var));
    }

    pub fn append(&mut self, other: Expr) {
        for part in other.0 {
            match part {
                Part::Text(t) => self.push_text(&t),
                Part::Var(v) => self.push_var(v),
            }
        }
    }

    /// `items` separated by `sep`.
    pub fn join(items: impl IntoIterator<Item = Expr>, sep: &str) -> Expr {
        let mut out = Expr::default();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                out.push_text(sep);
            }
            out.append(item);
        }
        out
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.0.iter().filter_map(|p| match p {
            Part::Var(v) => Some(*v),
            Part::Text(_) => None,
        })
    }

    pub fn uses(&self, var: VarId) -> usize {
        self.vars().filter(|&v| v == var).count()
    }

    pub fn render(&self, vars: &HashMap<VarId, VarInfo>) -> String {
        let mut out = String::new();
        for part in &self.0 {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Var(v) => match vars.get(v) {
                    Some(info) => out.push_str(&info.name),
                    None => out.push_str("/*?*/"),
                },
            }
        }
        out
    }
}

// ── Statements ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `T name = init;`
    Let { ty: String, var: VarId, init: Expr },
    /// `T a; U b;` ahead of a call with by-reference outputs.
    Declare(Vec<(String, VarId)>),
    /// `expr;`
    Eval(Expr),
    /// `target = value;`
    Assign { target: Expr, value: Expr },
    /// `head {`
    Open(Expr),
    /// `for (...) {`; the head is evaluated on every iteration.
    Loop(Expr),
    /// `} else {`
    Else,
    /// `}`
    Close,
}

impl Stmt {
    /// Expressions read by this statement, excluding the name a `Let`
    /// introduces.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Let { init, .. } => vec![init],
            Stmt::Eval(e) | Stmt::Open(e) | Stmt::Loop(e) => vec![e],
            Stmt::Assign { target, value } => vec![target, value],
            Stmt::Declare(_) | Stmt::Else | Stmt::Close => Vec::new(),
        }
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Stmt::Let { init, .. } => vec![init],
            Stmt::Eval(e) | Stmt::Open(e) | Stmt::Loop(e) => vec![e],
            Stmt::Assign { target, value } => vec![target, value],
            Stmt::Declare(_) | Stmt::Else | Stmt::Close => Vec::new(),
        }
    }

    pub fn uses(&self, var: VarId) -> usize {
        self.exprs().iter().map(|e| e.uses(var)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub depth: usize,
    pub stmt: Stmt,
}

/// One lowered function body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LirFunction {
    pub lines: Vec<Line>,
    pub vars: HashMap<VarId, VarInfo>,
}

impl LirFunction {
    pub fn name_of(&self, var: VarId) -> &str {
        self.vars.get(&var).map_or("", |v| v.name.as_str())
    }
}
