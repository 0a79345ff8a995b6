// flatten.rs — Single-use temporary inlining
//
// Substitutes the initializer of a temporary for its only use and deletes the
// declaration, repeating until nothing changes.
//
// Preconditions: `function` comes from `lower::lower`.
// Postconditions: no remaining temporary with a non-`Never` policy has
//   exactly one eligible use; a second run is a no-op.
// Failure modes: none.
// Side effects: none.
//
// Rules:
//   - `Anywhere` temporaries inline into any later statement.
//   - `NextStatement` temporaries inline only into the statement directly
//     after their declaration, and at most one such substitution lands in any
//     statement, so the order of side effects is kept. Loop heads are
//     re-evaluated per iteration and never receive one.
//   - An initializer with a top-level space is parenthesized unless it lands
//     between delimiters that already bound it.

use tracing::trace;

use crate::lir::{Expr, InlinePolicy, LirFunction, Part, Stmt, VarId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenStats {
    pub inlined: usize,
    pub rounds: usize,
}

/// Inline single-use temporaries in place.
pub fn flatten(function: &mut LirFunction) -> FlattenStats {
    // Per line: an impure initializer was already substituted into it.
    let mut carries_impure = vec![false; function.lines.len()];
    let mut stats = FlattenStats::default();

    loop {
        stats.rounds += 1;
        let Some((decl, user)) = next_candidate(function, &carries_impure) else {
            break;
        };
        let Stmt::Let { var, init, .. } = function.lines[decl].stmt.clone() else {
            break;
        };
        let impure = function.vars.get(&var).map(|v| v.inline) == Some(InlinePolicy::NextStatement);
        trace!(var = function.name_of(var), line = decl, "inline");

        for expr in function.lines[user].stmt.exprs_mut() {
            if expr.uses(var) > 0 {
                *expr = substitute(expr, var, &init);
            }
        }
        carries_impure[user] |= impure || carries_impure[decl];
        function.lines.remove(decl);
        carries_impure.remove(decl);
        function.vars.remove(&var);
        stats.inlined += 1;
    }
    stats
}

/// First (declaration, use) pair eligible for inlining.
fn next_candidate(function: &LirFunction, carries_impure: &[bool]) -> Option<(usize, usize)> {
    for (i, line) in function.lines.iter().enumerate() {
        let Stmt::Let { var, .. } = &line.stmt else {
            continue;
        };
        let policy = match function.vars.get(var) {
            Some(info) => info.inline,
            None => continue,
        };
        if policy == InlinePolicy::Never {
            continue;
        }
        let Some(user) = single_use(function, *var) else {
            continue;
        };
        if user <= i {
            continue;
        }
        if policy == InlinePolicy::NextStatement
            && (user != i + 1
                || carries_impure[user]
                || carries_impure[i]
                || matches!(function.lines[user].stmt, Stmt::Loop(_)))
        {
            continue;
        }
        return Some((i, user));
    }
    None
}

/// Index of the only statement reading `var`, if it is read exactly once.
fn single_use(function: &LirFunction, var: VarId) -> Option<usize> {
    let mut found = None;
    for (i, line) in function.lines.iter().enumerate() {
        match line.stmt.uses(var) {
            0 => {}
            1 if found.is_none() => found = Some(i),
            _ => return None,
        }
    }
    found
}

/// Replace the reference to `var` in `expr` with `init`, parenthesized when
/// its neighbors would otherwise bind into it.
fn substitute(expr: &Expr, var: VarId, init: &Expr) -> Expr {
    let mut out = Expr::default();
    for (k, part) in expr.0.iter().enumerate() {
        match part {
            Part::Var(v) if *v == var => {
                let wrap = has_top_level_space(init) && !bounded(expr, k);
                if wrap {
                    out.push_text("(");
                }
                out.append(init.clone());
                if wrap {
                    out.push_text(")");
                }
            }
            Part::Var(v) => out.push_var(*v),
            Part::Text(t) => out.push_text(t),
        }
    }
    out
}

/// Space outside any bracket pair or string literal.
fn has_top_level_space(expr: &Expr) -> bool {
    let mut depth = 0i32;
    let mut quoted = false;
    let mut escaped = false;
    for part in &expr.0 {
        let Part::Text(text) = part else {
            continue;
        };
        for c in text.chars() {
            if quoted {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => quoted = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => quoted = true,
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ' ' if depth <= 0 => return true,
                _ => {}
            }
        }
    }
    false
}

/// The part at `k` sits between an opening delimiter (or the start) and a
/// closing delimiter (or the end).
fn bounded(expr: &Expr, k: usize) -> bool {
    let left = match k.checked_sub(1).map(|i| &expr.0[i]) {
        None => true,
        Some(Part::Text(t)) => matches!(
            t.trim_end().chars().last(),
            None | Some('(' | '[' | ',' | '{')
        ),
        Some(Part::Var(_)) => false,
    };
    let right = match expr.0.get(k + 1) {
        None => true,
        Some(Part::Text(t)) => matches!(
            t.trim_start().chars().next(),
            None | Some(')' | ']' | ',' | '}')
        ),
        Some(Part::Var(_)) => false,
    };
    left && right
}
