// graph.rs — Node/pin graph model
//
// Owns every node and pin parsed from one clipboard export. Pins live in a
// single arena indexed by `PinId`; nodes refer to their pins by id, so a
// `Link` is just (node, pin) and every stage can follow edges without
// string lookups.
//
// Preconditions: built by `parser::parse`, rewritten only by `normalize`.
// Postconditions: read-only for the emitter and resolver.
// Failure modes: none (lookups by id are infallible; by-name lookups return Option).
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

// ── Identifiers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(pub u32);

/// Directed edge endpoint: a pin on another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub node: NodeId,
    pub pin: PinId,
}

// ── Node kinds ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Tunnel,
    FunctionEntry,
    FunctionResult,
    VariableGet,
    VariableSet,
    CallFunction,
    CallArrayFunction,
    MacroInstance,
    GetArrayItem,
    DynamicCast,
    IfThenElse,
    Sequence,
    BinaryOperator,
    MakeArray,
    BreakStruct,
    SelfRef,
    Knot,
}

impl NodeKind {
    /// Map an object class leaf (`K2Node_CallFunction`) to a kind. `None`
    /// for classes the compiler does not know.
    pub fn from_class(class: &str) -> Option<NodeKind> {
        let kind = match class {
            "K2Node_Tunnel" => NodeKind::Tunnel,
            "K2Node_FunctionEntry" => NodeKind::FunctionEntry,
            "K2Node_FunctionResult" => NodeKind::FunctionResult,
            "K2Node_VariableGet" => NodeKind::VariableGet,
            "K2Node_VariableSet" => NodeKind::VariableSet,
            "K2Node_CallFunction" | "K2Node_CallMaterialParameterCollectionFunction" => {
                NodeKind::CallFunction
            }
            "K2Node_CallArrayFunction" => NodeKind::CallArrayFunction,
            "K2Node_MacroInstance" => NodeKind::MacroInstance,
            "K2Node_GetArrayItem" => NodeKind::GetArrayItem,
            "K2Node_DynamicCast" => NodeKind::DynamicCast,
            "K2Node_IfThenElse" => NodeKind::IfThenElse,
            "K2Node_ExecutionSequence" => NodeKind::Sequence,
            "K2Node_CommutativeAssociativeBinaryOperator" => NodeKind::BinaryOperator,
            "K2Node_MakeArray" => NodeKind::MakeArray,
            "K2Node_BreakStruct" => NodeKind::BreakStruct,
            "K2Node_Self" => NodeKind::SelfRef,
            "K2Node_Knot" => NodeKind::Knot,
            _ => return None,
        };
        Some(kind)
    }

    /// Kinds that call a function by member name.
    pub fn is_call(self) -> bool {
        matches!(self, NodeKind::CallFunction | NodeKind::CallArrayFunction)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Pin types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    None,
    Array,
    Set,
    Map { value: String, value_pointer: bool },
}

/// Target-language type of a pin. `base` is `"exec"` for control pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinType {
    pub base: String,
    pub pointer: bool,
    /// Enumeration name for byte pins backed by an enum.
    pub enumeration: Option<String>,
    pub container: Container,
}

impl PinType {
    pub fn exec() -> PinType {
        PinType::scalar("exec")
    }

    pub fn scalar(base: &str) -> PinType {
        PinType {
            base: base.to_string(),
            pointer: false,
            enumeration: None,
            container: Container::None,
        }
    }

    pub fn is_exec(&self) -> bool {
        self.base == "exec"
    }

    pub fn is_container(&self) -> bool {
        self.container != Container::None
    }

    /// Render as a C++ type, e.g. `TMap<FName, UObject*>`.
    pub fn render(&self) -> String {
        let element = if self.pointer {
            format!("{}*", self.base)
        } else {
            self.base.clone()
        };
        match &self.container {
            Container::None => element,
            Container::Array => format!("TArray<{element}>"),
            Container::Set => format!("TSet<{element}>"),
            Container::Map {
                value,
                value_pointer,
            } => {
                let star = if *value_pointer { "*" } else { "" };
                format!("TMap<{element}, {value}{star}>")
            }
        }
    }
}

// ── Directives ──────────────────────────────────────────────────────────────

/// Markers found in a node's comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// `cpp:ignore`: skip the node and everything only it reaches.
    pub ignore: bool,
    /// `cpp:local`: a variable write declares a local instead.
    pub local: bool,
    /// `cpp:cache`: silence the multi-consumer advisory.
    pub cache: bool,
    /// `cpp:name=<Name>`, or the first non-directive comment line.
    pub name: Option<String>,
}

impl Directives {
    pub fn parse(comment: &str) -> Directives {
        let mut directives = Directives {
            ignore: comment.contains("cpp:ignore"),
            local: comment.contains("cpp:local"),
            cache: comment.contains("cpp:cache"),
            name: None,
        };
        if let Some(pos) = comment.find("cpp:name=") {
            let rest = &comment[pos + "cpp:name=".len()..];
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                directives.name = Some(name);
            }
        }
        if directives.name.is_none() {
            directives.name = comment
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .filter(|l| !l.starts_with("cpp:"))
                .map(crate::record::function_name);
        }
        directives
    }
}

// ── Pins and nodes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pin {
    pub id: PinId,
    pub node: NodeId,
    /// Serialized `PinId`, unique within the node.
    pub key: String,
    pub name: String,
    pub direction: Direction,
    pub ty: PinType,
    /// Literal used when unconnected, explicit or synthesized.
    pub default: Option<String>,
    /// True when `default` came from the export rather than synthesis.
    pub explicit_default: bool,
    /// `UClass::StaticClass()` style default for class pins.
    pub default_object: Option<String>,
    pub links: Vec<Link>,
    /// Decomposed fields in constructor order.
    pub sub_pins: Vec<PinId>,
    pub parent: Option<PinId>,
}

impl Pin {
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    pub fn is_exec(&self) -> bool {
        self.ty.is_exec()
    }

    pub fn is_value(&self) -> bool {
        !self.ty.is_exec()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Top-level pins in export order.
    pub pins: Vec<PinId>,
    /// All decomposed pins, pre-order over `pins`.
    pub sub_pins: Vec<PinId>,
    pub member_parent: Option<String>,
    pub member_name: Option<String>,
    /// Macro graph reference, e.g. `StandardMacros:ForEachLoop`.
    pub macro_graph: Option<String>,
    pub comment: String,
    pub directives: Directives,
    /// Function-local variables declared on an entry node.
    pub locals: Vec<PinId>,
    /// Line of the `Begin Object` record.
    pub line: usize,
}

// ── Graph ───────────────────────────────────────────────────────────────────

/// Owner of all nodes and pins of one export.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub pins: Vec<Pin>,
    by_name: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: String, kind: NodeKind, line: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.nodes.push(Node {
            id,
            name,
            kind,
            pins: Vec::new(),
            sub_pins: Vec::new(),
            member_parent: None,
            member_name: None,
            macro_graph: None,
            comment: String::new(),
            directives: Directives::default(),
            locals: Vec::new(),
            line,
        });
        id
    }

    /// Allocate a pin owned by `node`. The caller decides whether it is
    /// listed among the node's pins, sub-pins or locals.
    pub fn add_pin(
        &mut self,
        node: NodeId,
        key: String,
        name: String,
        direction: Direction,
        ty: PinType,
    ) -> PinId {
        let id = PinId(self.pins.len() as u32);
        self.pins.push(Pin {
            id,
            node,
            key,
            name,
            direction,
            ty,
            default: None,
            explicit_default: false,
            default_object: None,
            links: Vec::new(),
            sub_pins: Vec::new(),
            parent: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.0 as usize]
    }

    pub fn pin_mut(&mut self, id: PinId) -> &mut Pin {
        &mut self.pins[id.0 as usize]
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Top-level pins followed by sub-pins.
    pub fn all_pins(&self, node: NodeId) -> impl Iterator<Item = PinId> + '_ {
        let n = self.node(node);
        n.pins.iter().chain(n.sub_pins.iter()).copied()
    }

    /// Find a pin by display name, searching top-level pins first.
    pub fn find_pin(&self, node: NodeId, name: &str) -> Option<PinId> {
        self.all_pins(node).find(|&p| self.pin(p).name == name)
    }

    /// Find a pin by its serialized key.
    pub fn pin_by_key(&self, node: NodeId, key: &str) -> Option<PinId> {
        self.all_pins(node).find(|&p| self.pin(p).key == key)
    }

    pub fn is_ignored(&self, node: NodeId) -> bool {
        self.node(node).directives.ignore
    }

    /// Links whose far end is not an ignored node.
    pub fn live_links(&self, pin: PinId) -> impl Iterator<Item = Link> + '_ {
        self.pin(pin)
            .links
            .iter()
            .copied()
            .filter(|l| !self.is_ignored(l.node))
    }

    pub fn first_live_link(&self, pin: PinId) -> Option<Link> {
        self.live_links(pin).next()
    }

    /// A pin is connected when it or any decomposed field has a live link.
    pub fn is_connected(&self, pin: PinId) -> bool {
        self.first_live_link(pin).is_some()
            || self.pin(pin).sub_pins.iter().any(|&s| self.is_connected(s))
    }

    /// Derived from the owner's pin trees rather than the `parent` field.
    pub fn is_sub_pin(&self, pin: PinId) -> bool {
        let owner = self.pin(pin).node;
        self.all_pins(owner)
            .any(|p| self.pin(p).sub_pins.contains(&pin))
    }

    /// Number of distinct nodes reading this pin or any of its fields.
    pub fn distinct_consumers(&self, pin: PinId) -> usize {
        let mut nodes: Vec<NodeId> = Vec::new();
        let mut stack = vec![pin];
        while let Some(p) = stack.pop() {
            for link in &self.pin(p).links {
                if !nodes.contains(&link.node) {
                    nodes.push(link.node);
                }
            }
            stack.extend(self.pin(p).sub_pins.iter().copied());
        }
        nodes.len()
    }

    pub fn has_input_exec(&self, node: NodeId) -> bool {
        self.node(node).pins.iter().any(|&p| {
            let pin = self.pin(p);
            pin.is_exec() && pin.is_input() && !pin.links.is_empty()
        })
    }

    pub fn has_output_exec(&self, node: NodeId) -> bool {
        self.node(node).pins.iter().any(|&p| {
            let pin = self.pin(p);
            pin.is_exec() && pin.is_output() && !pin.links.is_empty()
        })
    }

    /// Pure nodes execute on demand: they have no connected control input.
    pub fn is_pure(&self, node: NodeId) -> bool {
        !self.has_input_exec(node)
    }

    pub fn self_pin(&self, node: NodeId) -> Option<PinId> {
        self.node(node).pins.iter().copied().find(|&p| {
            let pin = self.pin(p);
            pin.is_input() && pin.name == "self"
        })
    }

    /// The node acts on the implicit receiver: it has no `self` input or
    /// the `self` input is unconnected.
    pub fn self_is_context(&self, node: NodeId) -> bool {
        match self.self_pin(node) {
            None => true,
            Some(p) => self.pin(p).links.is_empty(),
        }
    }

    /// First connected control output (the `then` of most nodes).
    pub fn then_output(&self, node: NodeId) -> Option<PinId> {
        self.node(node).pins.iter().copied().find(|&p| {
            let pin = self.pin(p);
            pin.is_exec() && pin.is_output() && self.is_connected(p)
        })
    }

    /// Value pins of a node in export order, filtered by direction.
    pub fn value_pins(&self, node: NodeId, direction: Direction) -> Vec<PinId> {
        self.node(node)
            .pins
            .iter()
            .copied()
            .filter(|&p| {
                let pin = self.pin(p);
                pin.is_value() && pin.direction == direction
            })
            .collect()
    }

    /// `node.pin` for messages.
    pub fn describe(&self, pin: PinId) -> (String, String) {
        let p = self.pin(pin);
        (self.node(p.node).name.clone(), p.name.clone())
    }

    pub fn link_count(&self) -> usize {
        self.pins.iter().map(|p| p.links.len()).sum()
    }
}
