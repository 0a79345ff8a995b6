// dot.rs — Graphviz DOT output for normalized node graphs
//
// Renders the graph the emitter will walk: one box per node, control edges
// bold, data edges dashed and labelled with the pin pair.
//
// Preconditions: `graph` has been through `normalize` (no reroutes left).
// Postconditions: returns a DOT string; node order follows the export.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::graph::*;

/// Emit the graph as a Graphviz DOT string.
pub fn emit_dot(graph: &Graph) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "digraph blueprint {{");
    let _ = writeln!(buf, "    rankdir=LR;");
    let _ = writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];");
    let _ = writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];");
    let _ = writeln!(buf);

    for id in graph.node_ids() {
        let node = graph.node(id);
        if node.kind == NodeKind::Knot {
            continue;
        }
        let _ = writeln!(buf, "    n{} [{}];", id.0, node_attrs(graph, id));
    }

    let _ = writeln!(buf);
    for id in graph.node_ids() {
        if graph.node(id).kind == NodeKind::Knot {
            continue;
        }
        for &pin_id in &graph.node(id).pins {
            write_edges(&mut buf, graph, pin_id);
        }
    }

    let _ = writeln!(buf, "}}");
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn write_edges(buf: &mut String, graph: &Graph, pin_id: PinId) {
    let pin = graph.pin(pin_id);
    if pin.is_output() {
        for link in &pin.links {
            let target = graph.pin(link.pin);
            let style = if pin.is_exec() {
                "style=bold".to_string()
            } else {
                format!(
                    "style=dashed, label=\"{} → {}\"",
                    escape(&pin.name),
                    escape(&target.name)
                )
            };
            let _ = writeln!(buf, "    n{} -> n{} [{}];", pin.node.0, link.node.0, style);
        }
    }
    for &sub in &pin.sub_pins {
        write_edges(buf, graph, sub);
    }
}

fn node_label(graph: &Graph, id: NodeId) -> String {
    let node = graph.node(id);
    let detail = node
        .member_name
        .as_deref()
        .or(node.macro_graph.as_deref())
        .unwrap_or("");
    if detail.is_empty() {
        format!("{}\\n{}", escape(&node.name), node.kind)
    } else {
        format!("{}\\n{} {}", escape(&node.name), node.kind, escape(detail))
    }
}

fn node_attrs(graph: &Graph, id: NodeId) -> String {
    let (shape, color) = match graph.node(id).kind {
        NodeKind::FunctionEntry | NodeKind::FunctionResult | NodeKind::Tunnel => {
            ("box", "lightsalmon")
        }
        NodeKind::IfThenElse | NodeKind::Sequence | NodeKind::DynamicCast => {
            ("diamond", "lightyellow")
        }
        NodeKind::MacroInstance => ("box", "lightgreen"),
        _ if graph.is_pure(id) => ("box", "white"),
        _ => ("box", "lightblue"),
    };
    let style = if graph.is_ignored(id) {
        "dotted"
    } else {
        "filled"
    };
    format!(
        "shape={shape}, style={style}, fillcolor={color}, label=\"{}\"",
        node_label(graph, id)
    )
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
