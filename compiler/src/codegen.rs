// codegen.rs — C++ text generation
//
// Renders a lowered (and optionally flattened) function body as C++ source
// text, one statement per line, then applies the configured post-processing
// rewrites.
//
// Preconditions: `function` comes from `lower::lower`, optionally passed
//   through `flatten::flatten`.
// Postconditions: `CodegenResult::cpp_source` ends with a newline; every
//   opening brace has a matching closing brace at the same indentation.
// Failure modes: none. Leftover engine-internal names are reported as
//   advisories.
// Side effects: none.

use std::fmt::Write as _;

use crate::diag::{codes, Diagnostic};
use crate::lir::{LirFunction, Stmt};
use crate::registry::Registry;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CodegenResult {
    pub cpp_source: String,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Render `function` with the configured indentation and rewrites.
pub fn codegen(function: &LirFunction, registry: &Registry) -> CodegenResult {
    let raw = render(function, &registry.config().indent);
    let cpp_source = registry.apply_post_replacements(&raw);

    let diagnostics = internal_names(&cpp_source)
        .into_iter()
        .map(|name| {
            Diagnostic::warning(
                codes::W0204,
                format!("generated code still calls engine-internal `{name}`"),
            )
            .with_hint("add a `member_name_replacements` entry for it")
        })
        .collect();

    CodegenResult {
        cpp_source,
        diagnostics,
    }
}

/// Plain rendering, no post-processing.
pub fn render(function: &LirFunction, indent: &str) -> String {
    let mut out = String::with_capacity(function.lines.len() * 32);
    for line in &function.lines {
        for _ in 0..line.depth {
            out.push_str(indent);
        }
        let r = |e: &crate::lir::Expr| e.render(&function.vars);
        let _ = match &line.stmt {
            Stmt::Let { ty, var, init } => {
                writeln!(out, "{ty} {} = {};", function.name_of(*var), r(init))
            }
            Stmt::Declare(decls) => {
                let parts: Vec<String> = decls
                    .iter()
                    .map(|(ty, var)| format!("{ty} {};", function.name_of(*var)))
                    .collect();
                writeln!(out, "{}", parts.join(" "))
            }
            Stmt::Eval(e) => writeln!(out, "{};", r(e)),
            Stmt::Assign { target, value } => writeln!(out, "{} = {};", r(target), r(value)),
            Stmt::Open(head) | Stmt::Loop(head) => writeln!(out, "{} {{", r(head)),
            Stmt::Else => writeln!(out, "}} else {{"),
            Stmt::Close => writeln!(out, "}}"),
        };
    }
    out
}

/// Distinct `K2_*` identifiers in `text`, in order of first appearance.
fn internal_names(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("K2_") {
        let boundary = rest[..pos]
            .chars()
            .last()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
        let tail = &rest[pos..];
        let len = tail
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(tail.len());
        let name = &tail[..len];
        if boundary && !found.iter().any(|f| f == name) {
            found.push(name.to_string());
        }
        rest = &tail[len..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::{Expr, InlinePolicy, Line, VarId, VarInfo};

    fn function(stmts: Vec<(usize, Stmt)>) -> LirFunction {
        let mut f = LirFunction::default();
        for (i, name) in ["var1", "var2"].iter().enumerate() {
            f.vars.insert(
                VarId(i as u32),
                VarInfo {
                    name: name.to_string(),
                    inline: InlinePolicy::Never,
                },
            );
        }
        f.lines = stmts
            .into_iter()
            .map(|(depth, stmt)| Line { depth, stmt })
            .collect();
        f
    }

    #[test]
    fn every_statement_form() {
        let f = function(vec![
            (0, Stmt::Open(Expr::text("void AMyActor::Run()"))),
            (1, Stmt::Declare(vec![("FHitResult".into(), VarId(0)), ("bool".into(), VarId(1))])),
            (1, Stmt::Eval(Expr::text("Trace(var1, var2)"))),
            (1, Stmt::Open(Expr::text("if (Ready)"))),
            (
                2,
                Stmt::Assign {
                    target: Expr::text("Count"),
                    value: Expr::text("1"),
                },
            ),
            (1, Stmt::Else),
            (
                2,
                Stmt::Let {
                    ty: "int".into(),
                    var: VarId(0),
                    init: Expr::text("2"),
                },
            ),
            (1, Stmt::Close),
            (0, Stmt::Close),
        ]);
        assert_eq!(
            render(&f, "\t"),
            "void AMyActor::Run() {\n\tFHitResult var1; bool var2;\n\tTrace(var1, var2);\n\tif (Ready) {\n\t\tCount = 1;\n\t} else {\n\t\tint var1 = 2;\n\t}\n}\n"
        );
    }

    #[test]
    fn post_rewrites_apply_to_output() {
        let registry = Registry::builtin().unwrap();
        let f = function(vec![
            (0, Stmt::Open(Expr::text("void AMyActor::Run()"))),
            (1, Stmt::Eval(Expr::text("SetTint(FLinearColor((R=1.0,G=0.5,B=0.0,A=1.0))"))),
            (0, Stmt::Close),
        ]);
        let out = codegen(&f, &registry);
        assert_eq!(
            out.cpp_source,
            "void AMyActor::Run() {\n\tSetTint(FLinearColor(1.0,0.5,0.0,1.0));\n}\n"
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn leftover_internal_names_are_reported_once() {
        let registry = Registry::builtin().unwrap();
        let f = function(vec![
            (0, Stmt::Open(Expr::text("void AMyActor::Run()"))),
            (1, Stmt::Eval(Expr::text("K2_DestroyComponent(this)"))),
            (1, Stmt::Eval(Expr::text("K2_DestroyComponent(this)"))),
            (1, Stmt::Eval(Expr::text("MyK2_Helper()"))),
            (0, Stmt::Close),
        ]);
        let out = codegen(&f, &registry);
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].message.contains("K2_DestroyComponent"));
    }

    #[test]
    fn internal_name_scan() {
        assert_eq!(internal_names("a(K2_Foo, K2_Bar) K2_Foo"), vec!["K2_Foo", "K2_Bar"]);
        assert!(internal_names("NoK2_Here").is_empty());
    }
}
