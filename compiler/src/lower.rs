// lower.rs — Control-flow emitter
//
// Walks the control edges from the entry node with an explicit work stack
// and emits block-structured statements. Values are pulled on demand
// through the resolver (`resolve.rs`), which shares this engine's state:
// the scope stack of pin bindings, the emitted lines and the variable table.
//
// Preconditions: `normalized` has no knots on live links and no control
//   fan-in; `registry` is compiled.
// Postconditions: `LirFunction` whose lines open and close balanced blocks;
//   every variable referenced by a line is in `vars`.
// Failure modes: `StructuralError` for missing named pins and unbound
//   values; `SemanticError` for node kinds or shapes that cannot be emitted.
// Side effects: advances the name counter.

use std::collections::HashMap;

use tracing::debug;

use crate::diag::{codes, Diagnostic};
use crate::error::{CompileError, SemanticError, StructuralError};
use crate::graph::{Direction, Graph, Link, NodeId, NodeKind, PinId};
use crate::id::NameAllocator;
use crate::lir::{Expr, InlinePolicy, Line, LirFunction, Stmt, VarId, VarInfo};
use crate::normalize::{EntryPoints, Normalized};
use crate::record;
use crate::registry::Registry;
use crate::scope::ScopeStack;

// ── Output types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct LowerResult {
    pub function: LirFunction,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn lower(
    normalized: &Normalized,
    registry: &Registry,
    names: &mut NameAllocator,
) -> Result<LowerResult, CompileError> {
    let mut engine = LowerEngine::new(&normalized.graph, registry, names);
    engine.run(normalized.entry)?;
    debug!(
        lines = engine.lines.len(),
        vars = engine.vars.len(),
        "function lowered"
    );
    Ok(LowerResult {
        function: LirFunction {
            lines: engine.lines,
            vars: engine.vars,
        },
        diagnostics: engine.diagnostics,
    })
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Pending work, processed last-in-first-out.
#[derive(Debug, Clone, Copy)]
enum Work {
    /// Emit `node`, entered through `via` (the control input it was reached by).
    Visit { node: NodeId, via: Option<Link> },
    /// Close the innermost block.
    Close,
    /// Close the innermost block and open its `else` arm.
    Else,
}

/// Which two-way branch a node is.
#[derive(Debug, Clone, Copy)]
enum BranchForm {
    Truth,
    Validity,
    /// Cast; the bound output is available on the true arm.
    Cast { bound: PinId },
}

#[derive(Debug, Clone, Copy)]
struct BranchPlan {
    subject: PinId,
    form: BranchForm,
    on_true: PinId,
    on_false: PinId,
}

pub(crate) struct LowerEngine<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) registry: &'a Registry,
    pub(crate) names: &'a mut NameAllocator,
    pub(crate) scopes: ScopeStack,
    pub(crate) lines: Vec<Line>,
    pub(crate) vars: HashMap<VarId, VarInfo>,
    /// Continuation flag of each started `ForLoopWithBreak`.
    breaks: HashMap<NodeId, VarId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> LowerEngine<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        registry: &'a Registry,
        names: &'a mut NameAllocator,
    ) -> Self {
        LowerEngine {
            graph,
            registry,
            names,
            scopes: ScopeStack::new(),
            lines: Vec::new(),
            vars: HashMap::new(),
            breaks: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(&mut self, entry: EntryPoints) -> Result<(), CompileError> {
        let mut stack = vec![Work::Visit {
            node: entry.entry,
            via: None,
        }];
        while let Some(work) = stack.pop() {
            match work {
                Work::Close => {
                    self.scopes.pop();
                    self.emit(Stmt::Close);
                }
                Work::Else => {
                    self.scopes.pop();
                    self.emit(Stmt::Else);
                    self.scopes.push();
                }
                Work::Visit { node, via } => {
                    if self.graph.is_ignored(node) {
                        continue;
                    }
                    if node == entry.entry {
                        self.open_function(node, entry.exit, &mut stack)?;
                    } else {
                        self.visit(node, via, &mut stack)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn visit(
        &mut self,
        node: NodeId,
        via: Option<Link>,
        stack: &mut Vec<Work>,
    ) -> Result<(), CompileError> {
        let kind = self.graph.node(node).kind;
        debug!(node = %self.graph.node(node).name, %kind, "emit");
        match kind {
            NodeKind::Tunnel | NodeKind::FunctionResult => self.emit_exit(node)?,
            NodeKind::VariableSet => {
                self.emit_set(node)?;
                self.schedule_then(node, stack);
            }
            _ if kind.is_call() => {
                self.emit_call(node)?;
                self.schedule_then(node, stack);
            }
            NodeKind::MacroInstance => self.emit_macro(node, via, stack)?,
            NodeKind::IfThenElse | NodeKind::DynamicCast => {
                let plan = self.branch_plan(node)?;
                self.emit_branch(plan, stack)?;
            }
            NodeKind::Sequence => {
                let outputs: Vec<PinId> = self
                    .graph
                    .node(node)
                    .pins
                    .iter()
                    .copied()
                    .filter(|&p| {
                        let pin = self.graph.pin(p);
                        pin.is_exec() && pin.is_output()
                    })
                    .collect();
                for pin in outputs.into_iter().rev() {
                    self.schedule(pin, stack);
                }
            }
            NodeKind::BreakStruct => {
                self.resolve_break(node)?;
                self.schedule_then(node, stack);
            }
            _ => {
                return Err(SemanticError::UnhandledKind {
                    node: self.graph.node(node).name.clone(),
                    kind: kind.to_string(),
                    stage: "emitter",
                }
                .into())
            }
        }
        Ok(())
    }

    // ── Shared helpers ─────────────────────────────────────────────────────

    pub(crate) fn emit(&mut self, stmt: Stmt) {
        self.lines.push(Line {
            depth: self.scopes.depth(),
            stmt,
        });
    }

    pub(crate) fn new_var(&mut self, name: String, inline: InlinePolicy) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.insert(id, VarInfo { name, inline });
        id
    }

    /// Fresh `var<N>` temporary.
    pub(crate) fn temp(&mut self, inline: InlinePolicy) -> VarId {
        let name = self.names.temp();
        self.new_var(name, inline)
    }

    pub(crate) fn bind(&mut self, pin: PinId, var: VarId) -> Result<(), StructuralError> {
        self.scopes.bind(pin, var).map_err(|_| {
            let (node, pin) = self.graph.describe(pin);
            StructuralError::DuplicateBinding { node, pin }
        })
    }

    /// A named pin of `node`, which must exist.
    pub(crate) fn require(&self, node: NodeId, name: &str) -> Result<PinId, StructuralError> {
        self.graph
            .find_pin(node, name)
            .ok_or_else(|| StructuralError::MissingPin {
                node: self.graph.node(node).name.clone(),
                pin: name.to_string(),
            })
    }

    fn schedule(&self, exec_out: PinId, stack: &mut Vec<Work>) {
        if let Some(link) = self.graph.first_live_link(exec_out) {
            stack.push(Work::Visit {
                node: link.node,
                via: Some(link),
            });
        }
    }

    fn schedule_then(&self, node: NodeId, stack: &mut Vec<Work>) {
        if let Some(then) = self.graph.then_output(node) {
            self.schedule(then, stack);
        }
    }

    fn open_block(&mut self, head: Expr) {
        self.emit(Stmt::Open(head));
        self.scopes.push();
    }

    /// Like `open_block`, for a head that is re-evaluated per iteration.
    fn open_loop(&mut self, head: Expr) {
        self.emit(Stmt::Loop(head));
        self.scopes.push();
    }

    // ── Function boundary ──────────────────────────────────────────────────

    fn open_function(
        &mut self,
        entry: NodeId,
        exit: Option<NodeId>,
        stack: &mut Vec<Work>,
    ) -> Result<(), CompileError> {
        let config = self.registry.config();
        let n = self.graph.node(entry);
        let name = n
            .directives
            .name
            .clone()
            .or_else(|| match n.kind {
                NodeKind::FunctionEntry => n.member_name.clone(),
                _ => None,
            })
            .unwrap_or_else(|| config.function_name.clone());

        let mut params = Vec::new();
        let mut bound = Vec::new();
        for pin in self.graph.value_pins(entry, Direction::Output) {
            let p = self.graph.pin(pin);
            let ident = record::var_name(&p.name);
            if p.ty.pointer && !p.ty.is_container() {
                params.push(format!("{} {}", p.ty.render(), ident));
            } else {
                params.push(format!("const {}& {}", p.ty.render(), ident));
            }
            bound.push((pin, ident));
        }
        if let Some(exit) = exit {
            for pin in self.graph.value_pins(exit, Direction::Input) {
                let p = self.graph.pin(pin);
                params.push(format!("{}& {}", p.ty.render(), record::var_name(&p.name)));
            }
        }

        let head = format!(
            "void {}::{}({})",
            config.class_name,
            name,
            params.join(", ")
        );
        debug!(function = %name, params = params.len(), "signature");
        self.open_block(Expr::text(head));

        for (pin, ident) in bound {
            let var = self.new_var(ident, InlinePolicy::Never);
            self.bind(pin, var)?;
            self.read_sub_pins(pin)?;
        }
        for local in self.graph.node(entry).locals.clone() {
            let p = self.graph.pin(local);
            let ty = p.ty.render();
            let init = Expr::text(self.literal(local));
            let var = self.new_var(record::var_name(&p.name), InlinePolicy::Never);
            self.emit(Stmt::Let { ty, var, init });
        }

        stack.push(Work::Close);
        match self.graph.then_output(entry) {
            Some(then) => self.schedule(then, stack),
            None => self.diagnostics.push(
                Diagnostic::warning(
                    codes::W0203,
                    format!(
                        "entry node `{}` has no connected control output; the function body is empty",
                        self.graph.node(entry).name
                    ),
                )
                .with_node(self.graph.node(entry).name.clone()),
            ),
        }
        Ok(())
    }

    /// Assign every connected (or explicitly defaulted) result pin to its
    /// out-parameter.
    fn emit_exit(&mut self, node: NodeId) -> Result<(), CompileError> {
        for pin in self.graph.value_pins(node, Direction::Input) {
            let p = self.graph.pin(pin);
            if !self.graph.is_connected(pin) && !p.explicit_default {
                continue;
            }
            let target = Expr::text(record::var_name(&p.name));
            self.resolve_input(pin)?;
            let value = self.input_expr(pin)?;
            self.emit(Stmt::Assign { target, value });
        }
        Ok(())
    }

    // ── Variable writes ────────────────────────────────────────────────────

    fn emit_set(&mut self, node: NodeId) -> Result<(), CompileError> {
        let n = self.graph.node(node);
        let value_pin = self
            .graph
            .value_pins(node, Direction::Input)
            .into_iter()
            .find(|&p| self.graph.pin(p).name != "self")
            .ok_or_else(|| StructuralError::MissingPin {
                node: n.name.clone(),
                pin: "value".to_string(),
            })?;
        let member = self.member_ident(node, value_pin);

        let target = if n.directives.local {
            Expr::text(format!(
                "{} {}",
                self.graph.pin(value_pin).ty.render(),
                member
            ))
        } else {
            self.member_access(node, &member)?
        };
        self.resolve_input(value_pin)?;
        let value = self.input_expr(value_pin)?;
        self.emit(Stmt::Assign { target, value });
        Ok(())
    }

    /// Identifier of the member a get/set node refers to.
    pub(crate) fn member_ident(&self, node: NodeId, pin: PinId) -> String {
        let raw = self
            .graph
            .node(node)
            .member_name
            .as_deref()
            .unwrap_or(&self.graph.pin(pin).name);
        record::var_name(raw)
    }

    /// `Member` on the implicit receiver, else `owner->Member` (or a
    /// configured accessor call for the receiver type).
    pub(crate) fn member_access(&mut self, node: NodeId, member: &str) -> Result<Expr, CompileError> {
        let self_pin = match self.graph.self_pin(node) {
            Some(p) if !self.graph.self_is_context(node) => p,
            _ => return Ok(Expr::text(member)),
        };
        self.resolve_input(self_pin)?;
        let mut expr = self.input_expr(self_pin)?;
        let ty = &self.graph.pin(self_pin).ty;
        expr.push_text(if ty.pointer { "->" } else { "." });
        match self.registry.variable_getter(&ty.base, member) {
            Some(getter) => expr.push_text(getter),
            None => expr.push_text(member),
        }
        Ok(expr)
    }

    // ── Macros and loops ───────────────────────────────────────────────────

    fn emit_macro(
        &mut self,
        node: NodeId,
        via: Option<Link>,
        stack: &mut Vec<Work>,
    ) -> Result<(), CompileError> {
        match self.macro_name(node).as_str() {
            "ForEachLoop" => self.emit_for_each(node, stack),
            "ForLoop" => self.emit_for_loop(node, false, stack),
            "ForLoopWithBreak" => {
                let break_pin = self.require(node, "Break")?;
                if via.map(|l| l.pin) == Some(break_pin) {
                    self.emit_loop_break(node)
                } else {
                    self.emit_for_loop(node, true, stack)
                }
            }
            "IsValid" => {
                let plan = self.branch_plan(node)?;
                self.emit_branch(plan, stack)
            }
            _ => {
                self.emit_macro_call(node)?;
                self.schedule_then(node, stack);
                Ok(())
            }
        }
    }

    /// Macro graph name after the last `:`, e.g. `ForEachLoop`.
    pub(crate) fn macro_name(&self, node: NodeId) -> String {
        let graph = self.graph.node(node).macro_graph.as_deref().unwrap_or("");
        graph.rsplit(':').next().unwrap_or(graph).to_string()
    }

    fn emit_for_each(&mut self, node: NodeId, stack: &mut Vec<Work>) -> Result<(), CompileError> {
        let array = self.require(node, "Array")?;
        let body = self.require(node, "LoopBody")?;
        let completed = self.require(node, "Completed")?;
        let element = self.require(node, "Array Element")?;
        let index = self.require(node, "Array Index")?;

        self.resolve_input(array)?;
        let source = self.input_expr(array)?;
        let use_element = self.graph.is_connected(element);
        let use_index = self.graph.is_connected(index);

        if use_element && !use_index {
            let var = self.temp(InlinePolicy::Never);
            let mut head = Expr::text("for (auto& ");
            head.push_var(var);
            head.push_text(" : ");
            head.append(source);
            head.push_text(")");
            self.open_block(head);
            self.bind(element, var)?;
            self.read_sub_pins(element)?;
        } else {
            let name = self.names.index();
            let i = self.new_var(name, InlinePolicy::Never);
            let mut head = Expr::text("for (int ");
            head.push_var(i);
            head.push_text(" = 0; ");
            head.push_var(i);
            head.push_text(" < ");
            head.append(source.clone());
            head.push_text(".Num(); ++");
            head.push_var(i);
            head.push_text(")");
            self.open_loop(head);
            self.bind(index, i)?;
            if use_element {
                let mut init = source;
                init.push_text("[");
                init.push_var(i);
                init.push_text("]");
                self.declare(element, init, InlinePolicy::Anywhere)?;
            }
        }

        self.schedule(completed, stack);
        stack.push(Work::Close);
        self.schedule(body, stack);
        Ok(())
    }

    fn emit_for_loop(
        &mut self,
        node: NodeId,
        with_break: bool,
        stack: &mut Vec<Work>,
    ) -> Result<(), CompileError> {
        let first = self.require(node, "FirstIndex")?;
        let last = self.require(node, "LastIndex")?;
        let body = self.require(node, "LoopBody")?;
        let completed = self.require(node, "Completed")?;
        let index = self.require(node, "Index")?;

        self.resolve_input(first)?;
        self.resolve_input(last)?;
        let from = self.input_expr(first)?;
        let to = self.input_expr(last)?;

        let flag = if with_break {
            let name = self.names.flag();
            let flag = self.new_var(name, InlinePolicy::Never);
            self.emit(Stmt::Let {
                ty: "bool".to_string(),
                var: flag,
                init: Expr::text("true"),
            });
            self.breaks.insert(node, flag);
            Some(flag)
        } else {
            None
        };

        let name = self.names.index();
        let i = self.new_var(name, InlinePolicy::Never);
        let mut head = Expr::text("for (int ");
        head.push_var(i);
        head.push_text(" = ");
        head.append(from);
        head.push_text("; ");
        head.push_var(i);
        head.push_text(" <= ");
        head.append(to);
        if let Some(flag) = flag {
            head.push_text(" && ");
            head.push_var(flag);
        }
        head.push_text("; ++");
        head.push_var(i);
        head.push_text(")");
        self.open_loop(head);
        self.bind(index, i)?;

        self.schedule(completed, stack);
        stack.push(Work::Close);
        self.schedule(body, stack);
        Ok(())
    }

    fn emit_loop_break(&mut self, node: NodeId) -> Result<(), CompileError> {
        let flag = self
            .breaks
            .get(&node)
            .copied()
            .ok_or_else(|| SemanticError::BreakBeforeLoop {
                node: self.graph.node(node).name.clone(),
            })?;
        self.emit(Stmt::Assign {
            target: Expr::var(flag),
            value: Expr::text("false"),
        });
        Ok(())
    }

    // ── Branches ───────────────────────────────────────────────────────────

    fn branch_plan(&self, node: NodeId) -> Result<BranchPlan, StructuralError> {
        match self.graph.node(node).kind {
            NodeKind::DynamicCast => {
                let bound = self
                    .graph
                    .value_pins(node, Direction::Output)
                    .into_iter()
                    .find(|&p| self.graph.pin(p).name.starts_with("As"))
                    .ok_or_else(|| StructuralError::MissingPin {
                        node: self.graph.node(node).name.clone(),
                        pin: "As…".to_string(),
                    })?;
                Ok(BranchPlan {
                    subject: self.require(node, "Object")?,
                    form: BranchForm::Cast { bound },
                    on_true: self.require(node, "then")?,
                    on_false: self.require(node, "CastFailed")?,
                })
            }
            NodeKind::MacroInstance => Ok(BranchPlan {
                subject: self.require(node, "InputObject")?,
                form: BranchForm::Validity,
                on_true: self.require(node, "Is Valid")?,
                on_false: self.require(node, "Is Not Valid")?,
            }),
            _ => Ok(BranchPlan {
                subject: self.require(node, "Condition")?,
                form: BranchForm::Truth,
                on_true: self.require(node, "then")?,
                on_false: self.require(node, "else")?,
            }),
        }
    }

    fn emit_branch(&mut self, plan: BranchPlan, stack: &mut Vec<Work>) -> Result<(), CompileError> {
        self.resolve_input(plan.subject)?;
        let subject = self.input_expr(plan.subject)?;
        let condition = match plan.form {
            BranchForm::Truth => subject,
            BranchForm::Validity => {
                let mut c = Expr::text("IsValid(");
                c.append(subject);
                c.push_text(")");
                c
            }
            BranchForm::Cast { bound } => {
                let mut cast = Expr::text(format!("Cast<{}>(", self.graph.pin(bound).ty.base));
                cast.append(subject);
                cast.push_text(")");
                Expr::var(self.declare(bound, cast, InlinePolicy::NextStatement)?)
            }
        };

        let on_true = self.graph.is_connected(plan.on_true);
        let on_false = self.graph.is_connected(plan.on_false);
        let mut head = Expr::text(if on_true || !on_false { "if (" } else { "if (!" });
        head.append(condition);
        head.push_text(")");

        match (on_true, on_false) {
            (true, true) => {
                self.open_block(head);
                stack.push(Work::Close);
                self.schedule(plan.on_false, stack);
                stack.push(Work::Else);
                self.schedule(plan.on_true, stack);
            }
            (true, false) => {
                self.open_block(head);
                stack.push(Work::Close);
                self.schedule(plan.on_true, stack);
            }
            (false, true) => {
                self.open_block(head);
                stack.push(Work::Close);
                self.schedule(plan.on_false, stack);
            }
            (false, false) => {}
        }
        Ok(())
    }
}
