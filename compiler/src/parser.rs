// parser.rs — Graph builder for clipboard exports
//
// Turns the line-oriented `Begin Object … End Object` dump into a `Graph`.
// Records are dispatched by a marker substring and their fields pulled out
// with `record`; the cross-references (links, sub-pins, parent pins) are
// kept raw until the whole text has been read, then resolved in one go.
//
// Preconditions: UTF-8 text copied from the node editor.
// Postconditions: every link resolved to (node, pin); sub-pins ordered for
//   positional constructors; unconnected pins carry a literal default.
// Failure modes: `ParseError` for malformed records, `StructuralError` for
//   links to nodes or pins that are not in the export.
// Side effects: none.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{CompileError, ParseError, StructuralError};
use crate::graph::{Container, Direction, Directives, Graph, Link, NodeId, NodeKind, PinId, PinType};
use crate::record;
use crate::registry::Registry;

/// Constructor argument order for split structs whose serialized field
/// order differs: entry `i` of the permutation is the serialized index of
/// the `i`-th constructor argument.
const FIELD_ORDER: &[(&str, &[usize])] = &[
    // (Location, Rotation, Scale) -> FTransform(FRotator, FVector, FVector)
    ("FTransform", &[1, 0, 2]),
    // (Roll, Pitch, Yaw) -> FRotator(Pitch, Yaw, Roll)
    ("FRotator", &[1, 2, 0]),
];

/// Engine classes deriving from AActor whose names do not say so.
const ACTOR_CLASSES: &[&str] = &[
    "Pawn",
    "Character",
    "Controller",
    "PlayerController",
    "AIController",
    "GameModeBase",
    "GameMode",
    "GameStateBase",
    "PlayerState",
    "HUD",
    "Info",
];

const COMMENT_CLASS: &str = "EdGraphNode_Comment";

// ── Public entry point ──────────────────────────────────────────────────────

/// Build a graph from serialized text.
pub fn parse(source: &str, registry: &Registry) -> Result<Graph, CompileError> {
    let mut builder = Builder {
        graph: Graph::new(),
        registry,
        raw: Vec::new(),
        dropped: HashSet::new(),
        current: Current::Outside,
    };
    for (index, line) in source.lines().enumerate() {
        builder.line(line, index + 1)?;
    }
    builder.finish()
}

// ── Builder state ───────────────────────────────────────────────────────────

enum Current {
    Outside,
    Node(NodeId),
    Skipped,
}

/// Cross-references of one pin, resolved after all records are read.
struct RawPin {
    pin: PinId,
    links: Vec<(String, String)>,
    sub_keys: Vec<String>,
    parent_key: Option<String>,
}

struct Builder<'a> {
    graph: Graph,
    registry: &'a Registry,
    raw: Vec<RawPin>,
    /// Pins deliberately not modelled, as (node, key).
    dropped: HashSet<(NodeId, String)>,
    current: Current,
}

impl<'a> Builder<'a> {
    fn line(&mut self, line: &str, line_no: usize) -> Result<(), CompileError> {
        let trimmed = line.trim();
        if trimmed.starts_with("Begin Object") {
            return self.begin_object(trimmed, line_no);
        }
        if trimmed.starts_with("End Object") {
            self.current = Current::Outside;
            return Ok(());
        }

        let is_record = trimmed.contains("CustomProperties Pin")
            || trimmed.contains("LocalVariables(")
            || trimmed.contains("FunctionReference=")
            || trimmed.contains("VariableReference=")
            || trimmed.contains("MacroGraphReference=")
            || trimmed.contains("NodeComment=");
        if !is_record {
            return Ok(());
        }
        let node = match self.current {
            Current::Node(node) => node,
            Current::Skipped => return Ok(()),
            Current::Outside => return Err(ParseError::OrphanRecord { line: line_no }.into()),
        };

        if trimmed.contains("CustomProperties Pin") {
            self.pin(node, trimmed, line_no)?;
        } else if trimmed.contains("LocalVariables(") {
            self.local(node, trimmed, line_no)?;
        } else if trimmed.contains("FunctionReference=") {
            let parent = record::value(trimmed, "MemberParent").map(record::leaf);
            let member = required(record::value(trimmed, "MemberName"), line_no, "MemberName")?;
            let member = self.registry.member_name(&record::function_name(&record::clean(member)));
            let n = self.graph.node_mut(node);
            n.member_parent = parent;
            n.member_name = Some(member);
        } else if trimmed.contains("VariableReference=") {
            let member = required(record::value(trimmed, "MemberName"), line_no, "MemberName")?;
            let member = self.registry.member_name(&record::clean(member));
            self.graph.node_mut(node).member_name = Some(member);
        } else if trimmed.contains("MacroGraphReference=") {
            let graph = required(record::value(trimmed, "MacroGraph"), line_no, "MacroGraph")?;
            self.graph.node_mut(node).macro_graph = Some(record::leaf(graph));
        } else {
            let comment = required(record::quoted(trimmed, "NodeComment"), line_no, "NodeComment")?;
            let comment = record::clean(comment);
            let n = self.graph.node_mut(node);
            n.directives = Directives::parse(&comment);
            n.comment = comment;
        }
        Ok(())
    }

    fn begin_object(&mut self, line: &str, line_no: usize) -> Result<(), CompileError> {
        let class = required(record::word(line, "Class"), line_no, "Class")?;
        let name = record::clean(required(record::word(line, "Name"), line_no, "Name")?);
        let leaf = class.rsplit('.').next().unwrap_or(class);
        if leaf == COMMENT_CLASS {
            self.current = Current::Skipped;
            return Ok(());
        }
        let kind = NodeKind::from_class(leaf).ok_or_else(|| ParseError::UnknownClass {
            line: line_no,
            class: class.to_string(),
        })?;
        if self.graph.node_by_name(&name).is_some() {
            return Err(ParseError::DuplicateNode { line: line_no, name }.into());
        }
        let id = self.graph.add_node(name, kind, line_no);
        self.current = Current::Node(id);
        Ok(())
    }

    fn pin(&mut self, node: NodeId, line: &str, line_no: usize) -> Result<(), CompileError> {
        let key = required(record::value(line, "PinId"), line_no, "PinId")?.to_string();
        let name = record::clean(required(record::value(line, "PinName"), line_no, "PinName")?);
        if name == "__WorldContext" {
            self.dropped.insert((node, key));
            return Ok(());
        }

        let category = record::clean(required(
            record::value(line, "PinType.PinCategory"),
            line_no,
            "PinType.PinCategory",
        )?);
        let mut ty = derive_type(
            &category,
            record::value(line, "PinType.PinSubCategory"),
            record::value(line, "PinType.PinSubCategoryObject"),
            line_no,
        )?;
        ty.container = container(line, "PinType.ContainerType", line_no)?;

        let direction = if line.contains("Direction=\"EGPD_Output\"") {
            Direction::Output
        } else {
            Direction::Input
        };
        let pin = self.graph.add_pin(node, key, name, direction, ty);
        self.graph.node_mut(node).pins.push(pin);

        let explicit = record::quoted(line, "DefaultValue").map(record::clean);
        self.set_default(pin, explicit);
        if let Some(object) = record::value(line, "DefaultObject") {
            let class = record::leaf(object);
            if class != "None" && !class.is_empty() {
                self.graph.pin_mut(pin).default_object = Some(object_class(&class));
            }
        }

        let links = record::list(line, "LinkedTo")
            .unwrap_or_default()
            .into_iter()
            .filter_map(split_endpoint)
            .collect();
        let sub_keys = record::list(line, "SubPins")
            .unwrap_or_default()
            .into_iter()
            .filter_map(split_endpoint)
            .map(|(_, pin)| pin)
            .collect();
        let parent_key = record::value(line, "ParentPin")
            .map(record::clean)
            .and_then(|p| split_endpoint(&p).map(|(_, pin)| pin));

        self.raw.push(RawPin {
            pin,
            links,
            sub_keys,
            parent_key,
        });
        Ok(())
    }

    fn local(&mut self, node: NodeId, line: &str, line_no: usize) -> Result<(), CompileError> {
        let name = record::clean(required(record::value(line, "VarName"), line_no, "VarName")?);
        let category = record::clean(required(
            record::value(line, "PinCategory"),
            line_no,
            "PinCategory",
        )?);
        let mut ty = derive_type(
            &category,
            record::value(line, "PinSubCategory"),
            record::value(line, "PinSubCategoryObject"),
            line_no,
        )?;
        ty.container = container(line, "ContainerType", line_no)?;
        let pin = self
            .graph
            .add_pin(node, name.clone(), name, Direction::Output, ty);
        self.graph.node_mut(node).locals.push(pin);
        let explicit = record::quoted(line, "DefaultValue").map(record::clean);
        self.set_default(pin, explicit);
        Ok(())
    }

    fn set_default(&mut self, pin: PinId, explicit: Option<String>) {
        let p = self.graph.pin_mut(pin);
        match explicit.filter(|v| !v.is_empty()) {
            Some(value) => {
                let value = if p.ty.base == "bool" {
                    value.to_lowercase()
                } else {
                    match &p.ty.enumeration {
                        Some(e) if !value.contains("::") => format!("{e}::{value}"),
                        _ => value,
                    }
                };
                p.default = Some(value);
                p.explicit_default = true;
            }
            None => p.default = synthesized_default(&p.ty),
        }
    }

    // ── Cross-reference resolution ─────────────────────────────────────────

    fn finish(mut self) -> Result<Graph, CompileError> {
        self.link_sub_pins()?;

        for node in 0..self.graph.nodes.len() {
            let id = NodeId(node as u32);
            let all = std::mem::take(&mut self.graph.node_mut(id).pins);
            let top: Vec<PinId> = all
                .iter()
                .copied()
                .filter(|&p| self.graph.pin(p).parent.is_none())
                .collect();
            for &p in &all {
                apply_field_order(&mut self.graph, p);
            }
            let mut ordered = Vec::new();
            for &p in &top {
                collect_sub_pins(&self.graph, p, &mut ordered);
            }
            let n = self.graph.node_mut(id);
            n.pins = top;
            n.sub_pins = ordered;
        }

        self.resolve_links()?;
        debug!(
            nodes = self.graph.nodes.len(),
            pins = self.graph.pins.len(),
            links = self.graph.link_count(),
            "graph built"
        );
        Ok(self.graph)
    }

    fn link_sub_pins(&mut self) -> Result<(), CompileError> {
        for raw in &self.raw {
            let node = self.graph.pin(raw.pin).node;
            for key in &raw.sub_keys {
                let sub = self.related(node, raw.pin, key)?;
                if !self.graph.pin(raw.pin).sub_pins.contains(&sub) {
                    self.graph.pin_mut(raw.pin).sub_pins.push(sub);
                }
                self.graph.pin_mut(sub).parent = Some(raw.pin);
            }
        }
        for raw in &self.raw {
            let Some(key) = &raw.parent_key else { continue };
            let node = self.graph.pin(raw.pin).node;
            let parent = self.related(node, raw.pin, key)?;
            self.graph.pin_mut(raw.pin).parent = Some(parent);
            if !self.graph.pin(parent).sub_pins.contains(&raw.pin) {
                self.graph.pin_mut(parent).sub_pins.push(raw.pin);
            }
        }
        Ok(())
    }

    fn related(&self, node: NodeId, pin: PinId, key: &str) -> Result<PinId, ParseError> {
        self.graph
            .pin_by_key(node, key)
            .ok_or_else(|| ParseError::MissingRelatedPin {
                node: self.graph.node(node).name.clone(),
                pin: self.graph.pin(pin).name.clone(),
                missing: key.to_string(),
            })
    }

    fn resolve_links(&mut self) -> Result<(), CompileError> {
        for raw in &self.raw {
            let from = self.graph.node(self.graph.pin(raw.pin).node).name.clone();
            let mut links = Vec::with_capacity(raw.links.len());
            for (target, key) in &raw.links {
                let node = self
                    .graph
                    .node_by_name(target)
                    .ok_or_else(|| StructuralError::UnknownNode {
                        from: from.clone(),
                        target: target.clone(),
                    })?;
                match self.graph.pin_by_key(node, key) {
                    Some(pin) => links.push(Link { node, pin }),
                    None if self.dropped.contains(&(node, key.clone())) => {}
                    None => {
                        return Err(StructuralError::UnknownPin {
                            from,
                            target: target.clone(),
                            pin: key.clone(),
                        }
                        .into())
                    }
                }
            }
            self.graph.pin_mut(raw.pin).links = links;
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn required<'s>(
    value: Option<&'s str>,
    line: usize,
    field: &'static str,
) -> Result<&'s str, ParseError> {
    value.ok_or(ParseError::MissingField { line, field })
}

/// `"NodeName PinKey"` as its two parts.
fn split_endpoint(entry: &str) -> Option<(String, String)> {
    let mut parts = entry.split_whitespace();
    let node = parts.next()?;
    let pin = parts.next()?;
    Some((node.to_string(), pin.to_string()))
}

/// `A` prefix for actor classes, `U` for everything else.
fn object_class(name: &str) -> String {
    let lower = name.to_lowercase();
    let actor = !lower.contains("component")
        && (lower.contains("actor") || ACTOR_CLASSES.contains(&name));
    if actor {
        format!("A{name}")
    } else {
        format!("U{name}")
    }
}

/// Target type for a (category, sub-category, sub-category object) triple.
fn derive_type(
    category: &str,
    sub_category: Option<&str>,
    sub_object: Option<&str>,
    line: usize,
) -> Result<PinType, ParseError> {
    let object = sub_object
        .map(record::leaf)
        .filter(|o| !o.is_empty() && o != "None");
    let mut ty = PinType::scalar("");
    match category {
        "exec" => ty.base = "exec".into(),
        "object" | "softobject" => {
            ty.base = object_class(object.as_deref().unwrap_or("Object"));
            ty.pointer = true;
        }
        "class" | "softclass" => {
            ty.base = "UClass".into();
            ty.pointer = true;
        }
        "struct" => ty.base = format!("F{}", object.as_deref().unwrap_or("Struct")),
        "name" => ty.base = "FName".into(),
        "string" => ty.base = "FString".into(),
        "text" => ty.base = "FText".into(),
        "byte" | "enum" => match object {
            Some(e) => {
                ty.base = e.clone();
                ty.enumeration = Some(e);
            }
            None => ty.base = "uint8".into(),
        },
        "int" | "int64" | "float" | "double" | "bool" => ty.base = category.into(),
        "real" => {
            let sub = sub_category.map(record::clean).unwrap_or_default();
            let base = if sub == "float" { "float" } else { "double" };
            ty.base = base.to_string();
        }
        "interface" | "wildcard" => ty.base = "auto".into(),
        _ => {
            return Err(ParseError::UnknownPinCategory {
                line,
                category: category.to_string(),
            })
        }
    }
    Ok(ty)
}

/// Container kind, with the value type for maps.
fn container(line: &str, key: &str, line_no: usize) -> Result<Container, ParseError> {
    let kind = record::value(line, key).map(record::clean).unwrap_or_default();
    Ok(match kind.as_str() {
        "Array" => Container::Array,
        "Set" => Container::Set,
        "Map" => {
            let category = record::clean(required(
                record::value(line, "TerminalCategory"),
                line_no,
                "TerminalCategory",
            )?);
            let value = derive_type(
                &category,
                record::value(line, "TerminalSubCategory"),
                record::value(line, "TerminalSubCategoryObject"),
                line_no,
            )?;
            Container::Map {
                value: value.base,
                value_pointer: value.pointer,
            }
        }
        _ => Container::None,
    })
}

/// Zero value used when a pin has no explicit literal.
fn synthesized_default(ty: &PinType) -> Option<String> {
    if ty.is_container() || ty.pointer {
        return None;
    }
    let value = match ty.base.as_str() {
        "FTransform" => "FTransform::Identity",
        "FVector" => "FVector::ZeroVector",
        "FIntVector" => "FIntVector::ZeroValue",
        "FVector2D" => "FVector2D::ZeroVector",
        "FRotator" => "FRotator::ZeroRotator",
        "float" | "double" | "int" | "int64" | "uint8" => "0",
        "bool" => "false",
        "FString" | "FName" | "FText" => "",
        _ => return None,
    };
    Some(value.to_string())
}

/// Reorder the fields of one split pin into constructor order.
fn apply_field_order(graph: &mut Graph, pin: PinId) {
    let base = graph.pin(pin).ty.base.clone();
    let Some((_, order)) = FIELD_ORDER.iter().find(|(ty, _)| *ty == base) else {
        return;
    };
    let fields = &graph.pin(pin).sub_pins;
    if fields.len() != order.len() {
        return;
    }
    let reordered: Vec<PinId> = order.iter().map(|&i| fields[i]).collect();
    graph.pin_mut(pin).sub_pins = reordered;
}

fn collect_sub_pins(graph: &Graph, pin: PinId, out: &mut Vec<PinId>) {
    for &sub in &graph.pin(pin).sub_pins {
        out.push(sub);
        collect_sub_pins(graph, sub, out);
    }
}
