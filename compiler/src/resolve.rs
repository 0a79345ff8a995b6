// resolve.rs — Demand-driven value resolution
//
// Pulls the value behind an input pin: walks back to the producing output,
// evaluates the producer (and, recursively, its own inputs) into a fresh
// variable and records the binding in the current scope frame. A producer
// already bound in a visible frame is never evaluated again.
//
// Also hosts call emission, shared by pure calls pulled here and impure
// calls reached by the control-flow walk in `lower.rs`.
//
// Preconditions: runs inside a `LowerEngine` whose scope stack reflects the
//   block being emitted.
// Postconditions: after `resolve_input(pin)`, `input_expr(pin)` succeeds.
// Failure modes: `StructuralError::UnboundPin` when a producer cannot be
//   evaluated here (e.g. an impure node not yet executed on this path),
//   `SemanticError` for unknown operators and producer kinds.
// Side effects: appends statements to the engine.

use tracing::debug;

use crate::error::{CompileError, SemanticError, StructuralError};
use crate::graph::{Direction, NodeId, NodeKind, PinId};
use crate::lir::{Expr, InlinePolicy, Stmt, VarId};
use crate::lower::LowerEngine;
use crate::record;
use crate::template::{CallTemplate, Segment};

/// Operator of a commutative binary node, by member-name prefix.
const OPERATORS: &[(&str, &str)] = &[
    ("BooleanAND", "&&"),
    ("BooleanOR", "||"),
    ("Multiply", "*"),
    ("Add", "+"),
    ("And_", "&"),
    ("Or_", "|"),
    ("Xor_", "^"),
];

impl<'a> LowerEngine<'a> {
    // ── Pulling values ─────────────────────────────────────────────────────

    /// Make every value feeding `pin` (or its split fields) available.
    pub(crate) fn resolve_input(&mut self, pin: PinId) -> Result<(), CompileError> {
        let subs = self.graph.pin(pin).sub_pins.clone();
        if !subs.is_empty() {
            for sub in subs {
                self.resolve_input(sub)?;
            }
            return Ok(());
        }
        let sources: Vec<PinId> = self.graph.live_links(pin).map(|l| l.pin).collect();
        for source in sources {
            self.resolve_output(source)?;
        }
        Ok(())
    }

    /// Evaluate the producer of `out` unless it is already bound.
    pub(crate) fn resolve_output(&mut self, out: PinId) -> Result<(), CompileError> {
        if self.scopes.lookup(out).is_some() {
            return Ok(());
        }
        let node = self.graph.pin(out).node;
        let kind = self.graph.node(node).kind;
        let pure = self.graph.is_pure(node);
        debug!(node = %self.graph.node(node).name, pin = %self.graph.pin(out).name, %kind, "resolve");

        match kind {
            NodeKind::VariableGet | NodeKind::VariableSet => self.resolve_member_read(node, out)?,
            _ if kind.is_call() && pure => self.emit_call(node)?,
            NodeKind::MacroInstance if pure => self.emit_macro_call(node)?,
            NodeKind::DynamicCast if pure => self.resolve_pure_cast(node)?,
            NodeKind::GetArrayItem => self.resolve_array_item(node)?,
            NodeKind::BinaryOperator => self.resolve_operator(node)?,
            NodeKind::MakeArray => self.resolve_make_array(node)?,
            NodeKind::BreakStruct => self.resolve_break(node)?,
            NodeKind::SelfRef => {
                let var = self.new_var("this".to_string(), InlinePolicy::Never);
                self.bind(out, var)?;
            }
            // Bound by the control-flow walk when it runs the node.
            NodeKind::CallFunction
            | NodeKind::CallArrayFunction
            | NodeKind::MacroInstance
            | NodeKind::DynamicCast
            | NodeKind::FunctionEntry
            | NodeKind::Tunnel => {}
            _ => {
                return Err(SemanticError::UnhandledKind {
                    node: self.graph.node(node).name.clone(),
                    kind: kind.to_string(),
                    stage: "resolver",
                }
                .into())
            }
        }

        if self.scopes.lookup(out).is_none() {
            let (node, pin) = self.graph.describe(out);
            return Err(StructuralError::UnboundPin { node, pin }.into());
        }
        Ok(())
    }

    /// Expression for an input pin: constructor over its split fields, the
    /// bound variable of its source, or its literal default.
    pub(crate) fn input_expr(&self, pin: PinId) -> Result<Expr, CompileError> {
        let p = self.graph.pin(pin);
        if !p.sub_pins.is_empty() {
            let (node, name) = self.graph.describe(pin);
            let ctor = self.registry.struct_ctor(&p.ty.base).ok_or_else(|| {
                SemanticError::MissingStructCtor {
                    ty: p.ty.base.clone(),
                    node,
                    pin: name,
                }
            })?;
            let mut fields = Vec::with_capacity(p.sub_pins.len());
            for &sub in &p.sub_pins {
                fields.push(self.input_expr(sub)?);
            }
            let mut expr = Expr::text(ctor.prefix.clone());
            expr.append(Expr::join(fields, ", "));
            expr.push_text(&ctor.suffix);
            return Ok(expr);
        }
        match self.graph.first_live_link(pin) {
            Some(link) => match self.scopes.lookup(link.pin) {
                Some(var) => Ok(Expr::var(var)),
                None => {
                    let (node, pin) = self.graph.describe(link.pin);
                    Err(StructuralError::UnboundPin { node, pin }.into())
                }
            },
            None => Ok(Expr::text(self.literal(pin))),
        }
    }

    /// Literal text for an unconnected pin.
    pub(crate) fn literal(&self, pin: PinId) -> String {
        let p = self.graph.pin(pin);
        if p.ty.is_container() {
            return "{}".to_string();
        }
        if p.ty.pointer {
            if p.name == "self" || p.name == "WorldContextObject" {
                return "this".to_string();
            }
            return match &p.default_object {
                Some(class) => format!("{class}::StaticClass()"),
                None => "nullptr".to_string(),
            };
        }
        let value = p.default.clone().unwrap_or_default();
        match p.ty.base.as_str() {
            "FString" | "FName" => format!("\"{}\"", escape(&value)),
            "FText" if value.is_empty() => "FText::GetEmpty()".to_string(),
            "FText" => format!("FText::FromString(TEXT(\"{}\"))", escape(&value)),
            base => match self.registry.struct_ctor(base) {
                Some(ctor) if p.explicit_default => ctor.apply(&value),
                _ if value.is_empty() => "{}".to_string(),
                _ => value,
            },
        }
    }

    // ── Variables ──────────────────────────────────────────────────────────

    /// Bind `pin` to a fresh temporary initialized with `init`, then bind
    /// its connected split fields.
    pub(crate) fn declare(
        &mut self,
        pin: PinId,
        init: Expr,
        inline: InlinePolicy,
    ) -> Result<VarId, CompileError> {
        let var = self.temp(inline);
        self.bind(pin, var)?;
        let ty = self.graph.pin(pin).ty.render();
        self.emit(Stmt::Let { ty, var, init });
        self.read_sub_pins(pin)?;
        Ok(var)
    }

    /// `Type field = parent.Accessor;` for each connected field of a bound
    /// split output.
    pub(crate) fn read_sub_pins(&mut self, pin: PinId) -> Result<(), CompileError> {
        let p = self.graph.pin(pin);
        if p.sub_pins.is_empty() {
            return Ok(());
        }
        let parent = self.scopes.lookup(pin).ok_or_else(|| {
            let (node, name) = self.graph.describe(pin);
            StructuralError::UnboundPin { node, pin: name }
        })?;
        let parent_ty = p.ty.base.clone();
        for sub in p.sub_pins.clone() {
            if !self.graph.is_connected(sub) || self.scopes.lookup(sub).is_some() {
                continue;
            }
            let name = &self.graph.pin(sub).name;
            let accessor = match self.registry.sub_pin_getter(&parent_ty, name) {
                Some(getter) => getter.to_string(),
                None => name.rsplit('_').next().unwrap_or(name).to_string(),
            };
            let mut init = Expr::var(parent);
            init.push_text(".");
            init.push_text(&accessor);
            self.declare(sub, init, InlinePolicy::Anywhere)?;
        }
        Ok(())
    }

    fn producer_policy(&self, node: NodeId) -> InlinePolicy {
        if self.graph.is_pure(node) {
            InlinePolicy::Anywhere
        } else {
            InlinePolicy::NextStatement
        }
    }

    // ── Producers ──────────────────────────────────────────────────────────

    fn resolve_member_read(&mut self, node: NodeId, out: PinId) -> Result<(), CompileError> {
        let top = self
            .graph
            .value_pins(node, Direction::Output)
            .into_iter()
            .next()
            .unwrap_or(out);
        let member = self.member_ident(node, top);
        let local = self.graph.node(node).directives.local;
        if local || self.graph.self_is_context(node) {
            let var = self.new_var(member, InlinePolicy::Never);
            self.bind(top, var)?;
            return self.read_sub_pins(top);
        }
        let read = self.member_access(node, &member)?;
        self.declare(top, read, InlinePolicy::Anywhere)?;
        Ok(())
    }

    fn resolve_array_item(&mut self, node: NodeId) -> Result<(), CompileError> {
        let array = self.require(node, "Array")?;
        let index = self.require(node, "Dimension 1")?;
        let out = self.require(node, "Output")?;
        self.resolve_input(array)?;
        self.resolve_input(index)?;
        let mut expr = self.input_expr(array)?;
        expr.push_text("[");
        expr.append(self.input_expr(index)?);
        expr.push_text("]");
        self.declare(out, expr, InlinePolicy::Anywhere)?;
        Ok(())
    }

    fn resolve_operator(&mut self, node: NodeId) -> Result<(), CompileError> {
        let n = self.graph.node(node);
        let member = n.member_name.clone().unwrap_or_default();
        let op = OPERATORS
            .iter()
            .find(|(prefix, _)| member.starts_with(prefix))
            .map(|(_, op)| *op)
            .ok_or_else(|| SemanticError::UnknownOperator {
                node: n.name.clone(),
                member: member.clone(),
            })?;

        let operands: Vec<PinId> = self
            .graph
            .value_pins(node, Direction::Input)
            .into_iter()
            .filter(|&p| self.graph.pin(p).name != "self")
            .collect();
        let mut exprs = Vec::with_capacity(operands.len());
        for pin in operands {
            self.resolve_input(pin)?;
            exprs.push(self.input_expr(pin)?);
        }
        let out = match self.graph.find_pin(node, "ReturnValue") {
            Some(p) => p,
            None => self.first_output(node)?,
        };
        self.declare(out, Expr::join(exprs, &format!(" {op} ")), InlinePolicy::Anywhere)?;
        Ok(())
    }

    fn resolve_make_array(&mut self, node: NodeId) -> Result<(), CompileError> {
        let out = self.first_output(node)?;
        let items = self.graph.value_pins(node, Direction::Input);
        let mut exprs = Vec::with_capacity(items.len());
        for pin in items {
            self.resolve_input(pin)?;
            exprs.push(self.input_expr(pin)?);
        }
        let mut literal = Expr::text("{");
        literal.append(Expr::join(exprs, ", "));
        literal.push_text("}");
        self.declare(out, literal, InlinePolicy::Never)?;
        Ok(())
    }

    /// Each connected field of a broken struct reads `source.Field`.
    pub(crate) fn resolve_break(&mut self, node: NodeId) -> Result<(), CompileError> {
        let source_pin = self
            .graph
            .value_pins(node, Direction::Input)
            .into_iter()
            .next()
            .ok_or_else(|| StructuralError::MissingPin {
                node: self.graph.node(node).name.clone(),
                pin: "struct input".to_string(),
            })?;
        self.resolve_input(source_pin)?;
        let source = self.input_expr(source_pin)?;
        for out in self.graph.value_pins(node, Direction::Output) {
            if !self.graph.is_connected(out) || self.scopes.lookup(out).is_some() {
                continue;
            }
            let mut read = source.clone();
            read.push_text(".");
            read.push_text(&record::function_name(&self.graph.pin(out).name));
            self.declare(out, read, InlinePolicy::Anywhere)?;
        }
        Ok(())
    }

    fn resolve_pure_cast(&mut self, node: NodeId) -> Result<(), CompileError> {
        let object = self.require(node, "Object")?;
        let bound = self
            .graph
            .value_pins(node, Direction::Output)
            .into_iter()
            .find(|&p| self.graph.pin(p).name.starts_with("As"))
            .ok_or_else(|| StructuralError::MissingPin {
                node: self.graph.node(node).name.clone(),
                pin: "As…".to_string(),
            })?;
        self.resolve_input(object)?;
        let mut cast = Expr::text(format!("Cast<{}>(", self.graph.pin(bound).ty.base));
        cast.append(self.input_expr(object)?);
        cast.push_text(")");
        let var = self.declare(bound, cast, InlinePolicy::Anywhere)?;
        if let Some(success) = self.graph.find_pin(node, "bSuccess") {
            if self.graph.is_connected(success) {
                let mut test = Expr::var(var);
                test.push_text(" != nullptr");
                self.declare(success, test, InlinePolicy::Anywhere)?;
            }
        }
        Ok(())
    }

    fn first_output(&self, node: NodeId) -> Result<PinId, StructuralError> {
        self.graph
            .value_pins(node, Direction::Output)
            .into_iter()
            .next()
            .ok_or_else(|| StructuralError::MissingPin {
                node: self.graph.node(node).name.clone(),
                pin: "output".to_string(),
            })
    }

    // ── Calls ──────────────────────────────────────────────────────────────

    /// Emit a function call node: by-reference outputs declared first, the
    /// return value bound only when something reads it.
    pub(crate) fn emit_call(&mut self, node: NodeId) -> Result<(), CompileError> {
        let graph = self.graph;
        let registry = self.registry;
        let n = graph.node(node);
        let member = n.member_name.clone().unwrap_or_default();
        if let Some(template) = registry.template(&member) {
            return self.emit_template(node, template);
        }

        let self_pin = self.graph.self_pin(node);
        let receivers: Vec<PinId> = match self_pin {
            Some(p) => {
                self.resolve_input(p)?;
                self.graph.live_links(p).map(|l| l.pin).collect()
            }
            None => Vec::new(),
        };

        let inputs: Vec<PinId> = self
            .graph
            .value_pins(node, Direction::Input)
            .into_iter()
            .filter(|&p| Some(p) != self_pin)
            .collect();
        let wrap = |pin: PinId, arg: Expr| match registry.pin_wrapper(&member, &graph.pin(pin).name) {
            Some(wrap) => {
                let mut wrapped = Expr::text(wrap.prefix.clone());
                wrapped.append(arg);
                wrapped.push_text(&wrap.suffix);
                wrapped
            }
            None => arg,
        };
        let mut args = Vec::with_capacity(inputs.len());
        for &pin in &inputs {
            self.resolve_input(pin)?;
            args.push(wrap(pin, self.input_expr(pin)?));
        }

        let outputs = self.graph.value_pins(node, Direction::Output);
        let ret = outputs
            .iter()
            .copied()
            .find(|&p| self.graph.pin(p).name == "ReturnValue");
        let by_ref: Vec<PinId> = outputs.into_iter().filter(|&p| Some(p) != ret).collect();
        let declared = self.declare_outputs(&by_ref)?;
        args.extend(
            by_ref
                .iter()
                .zip(declared)
                .map(|(&pin, var)| wrap(pin, Expr::var(var))),
        );

        let static_owner = n
            .member_parent
            .as_deref()
            .and_then(|parent| registry.parent_type(parent));
        let prefix_for = |engine: &Self, receiver: Option<PinId>| -> Result<Expr, CompileError> {
            if let Some(owner) = static_owner {
                return Ok(Expr::text(format!("{owner}::")));
            }
            match (receiver, self_pin) {
                (Some(source), Some(self_pin)) => {
                    let var = engine.scopes.lookup(source).ok_or_else(|| {
                        let (node, pin) = engine.graph.describe(source);
                        StructuralError::UnboundPin { node, pin }
                    })?;
                    let mut prefix = Expr::var(var);
                    let pointer = engine.graph.pin(self_pin).ty.pointer;
                    prefix.push_text(if pointer { "->" } else { "." });
                    Ok(prefix)
                }
                _ => Ok(Expr::default()),
            }
        };
        let call_with = |prefix: Expr| {
            let mut call = prefix;
            call.push_text(&member);
            call.push_text("(");
            call.append(Expr::join(args.clone(), ", "));
            call.push_text(")");
            call
        };

        match ret {
            Some(ret) if self.graph.is_connected(ret) => {
                let call = call_with(prefix_for(self, receivers.first().copied())?);
                self.declare(ret, call, self.producer_policy(node))?;
            }
            _ if receivers.len() > 1 && static_owner.is_none() => {
                for &receiver in &receivers {
                    let call = call_with(prefix_for(self, Some(receiver))?);
                    self.emit(Stmt::Eval(call));
                }
            }
            _ => {
                let call = call_with(prefix_for(self, receivers.first().copied())?);
                self.emit(Stmt::Eval(call));
            }
        }

        for pin in by_ref {
            self.read_sub_pins(pin)?;
        }
        Ok(())
    }

    /// A macro instance used as a plain call: its name after the last `:`,
    /// inputs then by-reference outputs.
    pub(crate) fn emit_macro_call(&mut self, node: NodeId) -> Result<(), CompileError> {
        let name = self.macro_name(node);
        let registry = self.registry;
        if let Some(template) = registry.template(&name) {
            return self.emit_template(node, template);
        }
        let inputs = self.graph.value_pins(node, Direction::Input);
        let mut args = Vec::with_capacity(inputs.len());
        for pin in inputs {
            self.resolve_input(pin)?;
            args.push(self.input_expr(pin)?);
        }
        let outputs = self.graph.value_pins(node, Direction::Output);
        let declared = self.declare_outputs(&outputs)?;
        args.extend(declared.into_iter().map(Expr::var));

        let mut call = Expr::text(format!("{name}("));
        call.append(Expr::join(args, ", "));
        call.push_text(")");
        self.emit(Stmt::Eval(call));
        for pin in outputs {
            self.read_sub_pins(pin)?;
        }
        Ok(())
    }

    /// `T a; U b;` for by-reference outputs, bound before the call.
    fn declare_outputs(&mut self, pins: &[PinId]) -> Result<Vec<VarId>, CompileError> {
        let mut decls = Vec::with_capacity(pins.len());
        let mut vars = Vec::with_capacity(pins.len());
        for &pin in pins {
            let var = self.temp(InlinePolicy::Never);
            self.bind(pin, var)?;
            decls.push((self.graph.pin(pin).ty.render(), var));
            vars.push(var);
        }
        if !decls.is_empty() {
            self.emit(Stmt::Declare(decls));
        }
        Ok(vars)
    }

    /// Emit a call through its configured template.
    fn emit_template(&mut self, node: NodeId, template: &CallTemplate) -> Result<(), CompileError> {
        let mut outputs = Vec::new();
        for name in template.body_pins() {
            let pin = self.require(node, name)?;
            if self.graph.pin(pin).is_output() {
                outputs.push(pin);
            } else {
                self.resolve_input(pin)?;
            }
        }
        let declared = self.declare_outputs(&outputs)?;

        let mut body = Expr::default();
        for segment in &template.body {
            match segment {
                Segment::Text(text) => body.push_text(text),
                Segment::Pin(name) => {
                    let pin = self.require(node, name)?;
                    match outputs.iter().position(|&p| p == pin) {
                        Some(i) => body.push_var(declared[i]),
                        None => body.append(self.input_expr(pin)?),
                    }
                }
            }
        }

        match &template.assigned {
            Some(name) => {
                let pin = self.require(node, name)?;
                if self.graph.is_connected(pin) {
                    self.declare(pin, body, self.producer_policy(node))?;
                } else {
                    self.emit(Stmt::Eval(body));
                }
            }
            None => self.emit(Stmt::Eval(body)),
        }
        for pin in outputs {
            self.read_sub_pins(pin)?;
        }
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use crate::codegen::render;
    use crate::error::{CompileError, SemanticError, StructuralError};
    use crate::id::NameAllocator;
    use crate::lower::lower;
    use crate::normalize::normalize;
    use crate::parser::parse;
    use crate::registry::Registry;
    use crate::testkit::{call, node, P};

    fn lower_text(parts: &[String]) -> Result<String, CompileError> {
        let reg = Registry::builtin().unwrap();
        let graph = parse(&parts.concat(), &reg)?;
        let normalized = normalize(graph)?;
        let mut names = NameAllocator::new();
        let lowered = lower(&normalized, &reg, &mut names)?;
        Ok(render(&lowered.function, "  "))
    }

    fn entry(then: (&str, &str)) -> String {
        node(
            "K2Node_FunctionEntry",
            "Entry",
            &[r#"FunctionReference=(MemberName="Run")"#],
            &[P::exec_out("E0", "then").link(then.0, then.1)],
        )
    }

    fn entry_with(then: (&str, &str), outputs: Vec<P>) -> String {
        let mut pins = vec![P::exec_out("E0", "then").link(then.0, then.1)];
        pins.extend(outputs);
        node(
            "K2Node_FunctionEntry",
            "Entry",
            &[r#"FunctionReference=(MemberName="Run")"#],
            &pins,
        )
    }

    fn speed_getter(links: &[(&str, &str)]) -> String {
        let mut out = P::output("G", "Speed", "float");
        for (node, pin) in links {
            out = out.link(node, pin);
        }
        node(
            "K2Node_VariableGet",
            "Get",
            &[r#"VariableReference=(MemberName="Speed",bSelfContext=True)"#],
            &[out],
        )
    }

    #[test]
    fn pure_call_is_evaluated_once_for_two_consumers() {
        let out = lower_text(&[
            entry(("A", "X")),
            speed_getter(&[("Double", "A"), ("Double", "B")]),
            call(
                "Double",
                Some("KismetMathLibrary"),
                "Add_FloatFloat",
                &[
                    P::input("A", "A", "float").link("Get", "G"),
                    P::input("B", "B", "float").link("Get", "G"),
                    P::output("R", "ReturnValue", "float").link("A", "V").link("B", "V"),
                ],
            ),
            call(
                "A",
                None,
                "Use",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::exec_out("T", "then").link("B", "X"),
                    P::input("V", "Value", "float").link("Double", "R"),
                ],
            ),
            call(
                "B",
                None,
                "Use",
                &[
                    P::exec_in("X").link("A", "T"),
                    P::input("V", "Value", "float").link("Double", "R"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run() {\n  float var1 = UKismetMathLibrary::Add_FloatFloat(Speed, Speed);\n  Use(var1);\n  Use(var1);\n}\n"
        );
    }

    #[test]
    fn unconnected_inputs_use_literals() {
        let out = lower_text(&[
            entry(("C", "X")),
            call(
                "C",
                Some("GameplayStatics"),
                "SpawnThing",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("W", "WorldContextObject", "object"),
                    P::input("N", "Count", "int"),
                    P::input("L", "Label", "string").default("Hi"),
                    P::input("T", "Title", "text"),
                    P::input("K", "Kind", "class")
                        .default_object("/Script/Engine.StaticMeshActor"),
                    P::input("O", "Owner", "object").sub_object("/Script/Engine.Actor"),
                    P::input("V", "Where", "struct")
                        .sub_object("/Script/CoreUObject.Vector")
                        .default("1.0,2.0,3.0"),
                    P::input("A", "Items", "int").container("Array"),
                ],
            ),
        ])
        .unwrap();
        assert!(
            out.contains(
                "UGameplayStatics::SpawnThing(this, 0, \"Hi\", FText::GetEmpty(), AStaticMeshActor::StaticClass(), nullptr, FVector(1.0,2.0,3.0), {});"
            ),
            "{out}"
        );
    }

    #[test]
    fn split_struct_input_uses_constructor_in_field_order() {
        let out = lower_text(&[
            entry(("C", "X")),
            speed_getter(&[("C", "R1")]),
            call(
                "C",
                None,
                "Turn",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("R", "Rot", "struct")
                        .sub_object("/Script/CoreUObject.Rotator")
                        .sub_pins("C", &["R0", "R1", "R2"]),
                    P::input("R0", "Rot_Roll", "float").parent("C", "R").default("5"),
                    P::input("R1", "Rot_Pitch", "float").parent("C", "R").link("Get", "G"),
                    P::input("R2", "Rot_Yaw", "float").parent("C", "R"),
                ],
            ),
        ])
        .unwrap();
        assert!(out.contains("  Turn(FRotator(Speed, 0, 5));\n"), "{out}");
    }

    #[test]
    fn split_struct_with_every_field_connected() {
        let out = lower_text(&[
            entry_with(
                ("C", "X"),
                vec![
                    P::output("PR", "Roll", "float").link("C", "R0"),
                    P::output("PP", "Pitch", "float").link("C", "R1"),
                    P::output("PY", "Yaw", "float").link("C", "R2"),
                ],
            ),
            call(
                "C",
                None,
                "Turn",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("R", "Rot", "struct")
                        .sub_object("/Script/CoreUObject.Rotator")
                        .sub_pins("C", &["R0", "R1", "R2"]),
                    P::input("R0", "Rot_Roll", "float").parent("C", "R").link("Entry", "PR"),
                    P::input("R1", "Rot_Pitch", "float").parent("C", "R").link("Entry", "PP"),
                    P::input("R2", "Rot_Yaw", "float").parent("C", "R").link("Entry", "PY"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run(const float& Roll, const float& Pitch, const float& Yaw) {\n  Turn(FRotator(Pitch, Yaw, Roll));\n}\n"
        );
    }

    #[test]
    fn pure_cast_binds_result_and_success() {
        let out = lower_text(&[
            entry_with(
                ("Use", "X"),
                vec![P::output("O", "Thing", "object")
                    .sub_object("/Script/Engine.Actor")
                    .link("Cast", "Obj")],
            ),
            node(
                "K2Node_DynamicCast",
                "Cast",
                &[],
                &[
                    P::input("Obj", "Object", "object")
                        .sub_object("/Script/Engine.Actor")
                        .link("Entry", "O"),
                    P::output("As", "AsCharacter", "object")
                        .sub_object("/Script/Engine.Character")
                        .link("Use", "C"),
                    P::output("Ok", "bSuccess", "bool").link("Use", "B"),
                ],
            ),
            call(
                "Use",
                None,
                "Greet",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("C", "Who", "object")
                        .sub_object("/Script/Engine.Character")
                        .link("Cast", "As"),
                    P::input("B", "bKnown", "bool").link("Cast", "Ok"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run(AActor* Thing) {\n  ACharacter* var1 = Cast<ACharacter>(Thing);\n  bool var2 = var1 != nullptr;\n  Greet(var1, var2);\n}\n"
        );
    }

    #[test]
    fn make_array_builds_a_braced_literal() {
        let out = lower_text(&[
            entry(("Use", "X")),
            node(
                "K2Node_VariableGet",
                "Get",
                &[r#"VariableReference=(MemberName="Score",bSelfContext=True)"#],
                &[P::output("G", "Score", "int").link("Make", "I1")],
            ),
            node(
                "K2Node_MakeArray",
                "Make",
                &[],
                &[
                    P::input("I0", "[0]", "int").default("1"),
                    P::input("I1", "[1]", "int").link("Get", "G"),
                    P::output("A", "Array", "int").container("Array").link("Use", "V"),
                ],
            ),
            call(
                "Use",
                None,
                "SetScores",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("V", "Values", "int").container("Array").link("Make", "A"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run() {\n  TArray<int> var1 = {1, Score};\n  SetScores(var1);\n}\n"
        );
    }

    #[test]
    fn break_struct_reads_connected_fields_on_demand() {
        let out = lower_text(&[
            entry_with(
                ("Use", "X"),
                vec![P::output("T", "Where", "struct")
                    .sub_object("/Script/CoreUObject.Vector")
                    .link("Break", "In")],
            ),
            node(
                "K2Node_BreakStruct",
                "Break",
                &[],
                &[
                    P::input("In", "Vector", "struct")
                        .sub_object("/Script/CoreUObject.Vector")
                        .link("Entry", "T"),
                    P::output("X", "X", "float").link("Use", "A"),
                    P::output("Y", "Y", "float"),
                    P::output("Z", "Z", "float").link("Use", "B"),
                ],
            ),
            call(
                "Use",
                None,
                "Plot",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("A", "Across", "float").link("Break", "X"),
                    P::input("B", "Up", "float").link("Break", "Z"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run(const FVector& Where) {\n  float var1 = Where.X;\n  float var2 = Where.Z;\n  Plot(var1, var2);\n}\n"
        );
    }

    #[test]
    fn by_reference_outputs_are_declared_before_the_call() {
        let out = lower_text(&[
            entry(("Trace", "X")),
            call(
                "Trace",
                None,
                "LineTrace",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::exec_out("T", "then").link("Use", "X"),
                    P::output("H", "OutHit", "struct")
                        .sub_object("/Script/Engine.HitResult")
                        .link("Use", "V"),
                    P::output("R", "ReturnValue", "bool"),
                ],
            ),
            call(
                "Use",
                None,
                "Consume",
                &[
                    P::exec_in("X").link("Trace", "T"),
                    P::input("V", "Hit", "struct")
                        .sub_object("/Script/Engine.HitResult")
                        .link("Trace", "H"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run() {\n  FHitResult var1;\n  LineTrace(var1);\n  Consume(var1);\n}\n"
        );
    }

    #[test]
    fn receiver_with_two_links_calls_each() {
        let out = lower_text(&[
            entry(("C", "X")),
            node(
                "K2Node_VariableGet",
                "MeshA",
                &[r#"VariableReference=(MemberName="MeshA",bSelfContext=True)"#],
                &[P::output("M", "MeshA", "object")
                    .sub_object("/Script/Engine.StaticMeshComponent")
                    .link("C", "S")],
            ),
            node(
                "K2Node_VariableGet",
                "MeshB",
                &[r#"VariableReference=(MemberName="MeshB",bSelfContext=True)"#],
                &[P::output("M", "MeshB", "object")
                    .sub_object("/Script/Engine.StaticMeshComponent")
                    .link("C", "S")],
            ),
            call(
                "C",
                Some("PrimitiveComponent"),
                "SetVisibility",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("S", "self", "object")
                        .sub_object("/Script/Engine.StaticMeshComponent")
                        .link("MeshA", "M")
                        .link("MeshB", "M"),
                    P::input("V", "bNewVisibility", "bool").default("false"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run() {\n  MeshA->SetVisibility(false);\n  MeshB->SetVisibility(false);\n}\n"
        );
    }

    #[test]
    fn template_call_assigns_connected_output() {
        let out = lower_text(&[
            entry(("Use", "X")),
            node(
                "K2Node_VariableGet",
                "Get",
                &[r#"VariableReference=(MemberName="Scores",bSelfContext=True)"#],
                &[P::output("G", "Scores", "int").container("Array").link("Len", "A")],
            ),
            call(
                "Len",
                Some("KismetArrayLibrary"),
                "Array_Length",
                &[
                    P::input("A", "TargetArray", "int").container("Array").link("Get", "G"),
                    P::output("R", "ReturnValue", "int").link("Use", "V"),
                ],
            ),
            call(
                "Use",
                None,
                "Report",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("V", "Count", "int").link("Len", "R"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run() {\n  int var1 = Scores.Num();\n  Report(var1);\n}\n"
        );
    }

    #[test]
    fn binary_operator_joins_operands() {
        let out = lower_text(&[
            entry(("Use", "X")),
            speed_getter(&[("Op", "A")]),
            node(
                "K2Node_CommutativeAssociativeBinaryOperator",
                "Op",
                &[r#"FunctionReference=(MemberParent=Class'"/Script/Engine.KismetMathLibrary"',MemberName="Multiply_FloatFloat")"#],
                &[
                    P::input("A", "A", "float").link("Get", "G"),
                    P::input("B", "B", "float").default("2.0"),
                    P::input("C", "C", "float").default("0.5"),
                    P::output("R", "ReturnValue", "float").link("Use", "V"),
                ],
            ),
            call(
                "Use",
                None,
                "Apply",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("V", "Amount", "float").link("Op", "R"),
                ],
            ),
        ])
        .unwrap();
        assert!(out.contains("float var1 = Speed * 2.0 * 0.5;"), "{out}");
    }

    #[test]
    fn unknown_operator_is_semantic() {
        let err = lower_text(&[
            entry(("Use", "X")),
            node(
                "K2Node_CommutativeAssociativeBinaryOperator",
                "Op",
                &[r#"FunctionReference=(MemberParent=Class'"/Script/Engine.KismetMathLibrary"',MemberName="Percent_IntInt")"#],
                &[
                    P::input("A", "A", "int"),
                    P::output("R", "ReturnValue", "int").link("Use", "V"),
                ],
            ),
            call(
                "Use",
                None,
                "Apply",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("V", "Amount", "int").link("Op", "R"),
                ],
            ),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Semantic(SemanticError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn impure_value_outside_its_path_is_unbound() {
        // `Late` runs after `Early`, but `Early` reads its return value.
        let err = lower_text(&[
            entry(("Early", "X")),
            call(
                "Early",
                None,
                "Report",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::exec_out("T", "then").link("Late", "X"),
                    P::input("V", "Count", "int").link("Late", "R"),
                ],
            ),
            call(
                "Late",
                None,
                "Measure",
                &[
                    P::exec_in("X").link("Early", "T"),
                    P::output("R", "ReturnValue", "int").link("Early", "V"),
                ],
            ),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Structural(StructuralError::UnboundPin { .. })
        ));
    }

    #[test]
    fn split_output_fields_read_through_getters() {
        let out = lower_text(&[
            entry(("Use", "X")),
            call(
                "Xf",
                None,
                "GetTransform",
                &[
                    P::output("R", "ReturnValue", "struct")
                        .sub_object("/Script/CoreUObject.Transform")
                        .sub_pins("Xf", &["L", "Q", "S"]),
                    P::output("L", "ReturnValue_Location", "struct")
                        .sub_object("/Script/CoreUObject.Vector")
                        .parent("Xf", "R")
                        .link("Use", "V"),
                    P::output("Q", "ReturnValue_Rotation", "struct")
                        .sub_object("/Script/CoreUObject.Rotator")
                        .parent("Xf", "R"),
                    P::output("S", "ReturnValue_Scale", "struct")
                        .sub_object("/Script/CoreUObject.Vector")
                        .parent("Xf", "R"),
                ],
            ),
            call(
                "Use",
                None,
                "MoveTo",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("V", "Where", "struct")
                        .sub_object("/Script/CoreUObject.Vector")
                        .link("Xf", "L"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "void AMyActor::Run() {\n  FTransform var1 = GetTransform();\n  FVector var2 = var1.GetLocation();\n  MoveTo(var2);\n}\n"
        );
    }
}
