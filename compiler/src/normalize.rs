// normalize.rs — Structural normalization of a built graph
//
// Removes reroute (knot) nodes from every connection, rejects control inputs
// with more than one incoming edge, flags pure producers read by several
// nodes, and picks the entry and exit nodes lowering starts from.
//
// Preconditions: `graph` comes from `parser::parse` (links resolved).
// Postconditions: no live link references a knot; every control input has
//   at most one link; `entry` names the node lowering starts at.
// Failure modes: `StructuralError` for reroutes that lead nowhere or loop,
//   control fan-in, or a graph without any entry node.
// Side effects: may add a synthesized control edge between the entry and
//   exit tunnels of an exec-less macro graph.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::diag::{codes, Diagnostic};
use crate::error::{CompileError, StructuralError};
use crate::graph::{Direction, Graph, Link, NodeId, NodeKind, PinId, PinType};

// ── Public types ────────────────────────────────────────────────────────────

/// Where lowering starts and which node supplies the out-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoints {
    pub entry: NodeId,
    pub exit: Option<NodeId>,
}

#[derive(Debug)]
pub struct Normalized {
    pub graph: Graph,
    pub entry: EntryPoints,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn normalize(mut graph: Graph) -> Result<Normalized, CompileError> {
    let knots = eliminate_reroutes(&mut graph)?;
    check_fan_in(&graph)?;
    let mut diagnostics = consumer_advisories(&graph);
    let entry = find_entry(&mut graph, &mut diagnostics)?;
    info!(
        knots,
        entry = %graph.node(entry.entry).name,
        advisories = diagnostics.len(),
        "graph normalized"
    );
    Ok(Normalized {
        graph,
        entry,
        diagnostics,
    })
}

// ── Reroute elimination ─────────────────────────────────────────────────────

/// Rewrite every link into a knot to the knot chain's far endpoints, then
/// detach the knots. Returns the number of knots removed.
fn eliminate_reroutes(graph: &mut Graph) -> Result<usize, StructuralError> {
    let knots: HashSet<NodeId> = graph
        .node_ids()
        .filter(|&n| graph.node(n).kind == NodeKind::Knot)
        .collect();
    if knots.is_empty() {
        return Ok(0);
    }

    let mut rewritten: Vec<(PinId, Vec<Link>)> = Vec::new();
    for pin in &graph.pins {
        if knots.contains(&pin.node) || !pin.links.iter().any(|l| knots.contains(&l.node)) {
            continue;
        }
        let mut links = Vec::new();
        for &link in &pin.links {
            if knots.contains(&link.node) {
                let mut path = Vec::new();
                follow(graph, &knots, link.node, pin.direction, &mut path, &mut links)?;
            } else if !links.contains(&link) {
                links.push(link);
            }
        }
        rewritten.push((pin.id, links));
    }
    for (pin, links) in rewritten {
        graph.pin_mut(pin).links = links;
    }

    for &knot in &knots {
        let pins: Vec<PinId> = graph.all_pins(knot).collect();
        for pin in pins {
            graph.pin_mut(pin).links.clear();
        }
    }
    debug!(count = knots.len(), "reroutes eliminated");
    Ok(knots.len())
}

/// Collect the non-knot endpoints reached through `knot`. `side` is the
/// direction of the pin that entered the chain: an output keeps flowing
/// downstream through the knot's outputs, an input walks upstream.
fn follow(
    graph: &Graph,
    knots: &HashSet<NodeId>,
    knot: NodeId,
    side: Direction,
    path: &mut Vec<NodeId>,
    out: &mut Vec<Link>,
) -> Result<(), StructuralError> {
    let name = || graph.node(knot).name.clone();
    if path.contains(&knot) {
        return Err(StructuralError::RerouteCycle { node: name() });
    }
    path.push(knot);

    let next: Vec<Link> = graph
        .node(knot)
        .pins
        .iter()
        .map(|&p| graph.pin(p))
        .filter(|p| p.direction == side)
        .flat_map(|p| p.links.iter().copied())
        .collect();
    if next.is_empty() {
        return Err(StructuralError::UnresolvedReroute { node: name() });
    }
    for link in next {
        if knots.contains(&link.node) {
            follow(graph, knots, link.node, side, path, out)?;
        } else if !out.contains(&link) {
            out.push(link);
        }
    }

    path.pop();
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────────────

fn check_fan_in(graph: &Graph) -> Result<(), StructuralError> {
    for node in graph.node_ids() {
        if graph.is_ignored(node) {
            continue;
        }
        for &pin in &graph.node(node).pins {
            let p = graph.pin(pin);
            if !(p.is_exec() && p.is_input()) {
                continue;
            }
            let count = graph.live_links(pin).count();
            if count > 1 {
                return Err(StructuralError::ExecFanIn {
                    node: graph.node(node).name.clone(),
                    pin: p.name.clone(),
                    count,
                });
            }
        }
    }
    Ok(())
}

/// W0201 for every pure producer output read by more than one node.
fn consumer_advisories(graph: &Graph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for node in graph.node_ids() {
        let n = graph.node(node);
        let exempt = matches!(
            n.kind,
            NodeKind::Knot | NodeKind::Tunnel | NodeKind::FunctionEntry | NodeKind::SelfRef
        ) || (n.kind == NodeKind::VariableGet && graph.self_is_context(node));
        if exempt || n.directives.cache || n.directives.ignore || !graph.is_pure(node) {
            continue;
        }
        for pin in graph.value_pins(node, Direction::Output) {
            let consumers = graph.distinct_consumers(pin);
            if consumers > 1 {
                diagnostics.push(
                    Diagnostic::warning(
                        codes::W0201,
                        format!(
                            "pure node `{}` output `{}` feeds {} nodes and is evaluated once, at its first use",
                            n.name,
                            graph.pin(pin).name,
                            consumers
                        ),
                    )
                    .with_hint("duplicate the node, or add `cpp:cache` to its comment")
                    .with_node(n.name.clone()),
                );
            }
        }
    }
    diagnostics
}

// ── Entry discovery ─────────────────────────────────────────────────────────

fn find_entry(
    graph: &mut Graph,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<EntryPoints, StructuralError> {
    let live = |graph: &Graph, n: NodeId| {
        !graph.is_ignored(n) && graph.node(n).kind != NodeKind::Knot
    };
    let is_boundary =
        |kind: NodeKind| matches!(kind, NodeKind::FunctionEntry | NodeKind::Tunnel);

    let candidates: Vec<NodeId> = graph
        .node_ids()
        .filter(|&n| live(graph, n) && !graph.has_input_exec(n) && graph.has_output_exec(n))
        .collect();

    let function_entry = graph
        .node_ids()
        .find(|&n| live(graph, n) && graph.node(n).kind == NodeKind::FunctionEntry);

    let entry = if let Some(&first) = candidates.first() {
        let chosen = candidates
            .iter()
            .copied()
            .find(|&n| is_boundary(graph.node(n).kind))
            .unwrap_or(first);
        if candidates.len() > 1 {
            let names: Vec<&str> = candidates
                .iter()
                .map(|&n| graph.node(n).name.as_str())
                .collect();
            diagnostics.push(
                Diagnostic::warning(
                    codes::W0202,
                    format!(
                        "{} nodes start a control chain ({}); compiling from `{}`",
                        candidates.len(),
                        names.join(", "),
                        graph.node(chosen).name
                    ),
                )
                .with_hint("copy only one function body at a time"),
            );
        }
        chosen
    } else if let Some(entry) = function_entry {
        entry
    } else {
        return exec_less_macro(graph);
    };

    let exit = graph
        .node_ids()
        .find(|&n| live(graph, n) && graph.node(n).kind == NodeKind::FunctionResult)
        .or_else(|| {
            graph.node_ids().find(|&n| {
                n != entry && live(graph, n) && graph.node(n).kind == NodeKind::Tunnel
            })
        });
    Ok(EntryPoints { entry, exit })
}

/// A macro graph with no control pins at all: connect its input tunnel to
/// its output tunnel so lowering has a path from one to the other.
fn exec_less_macro(graph: &mut Graph) -> Result<EntryPoints, StructuralError> {
    let tunnels: Vec<NodeId> = graph
        .node_ids()
        .filter(|&n| !graph.is_ignored(n) && graph.node(n).kind == NodeKind::Tunnel)
        .collect();
    let entry = tunnels
        .iter()
        .copied()
        .find(|&n| graph.value_pins(n, Direction::Input).is_empty())
        .ok_or(StructuralError::NoEntry)?;
    let exit = tunnels
        .iter()
        .copied()
        .find(|&n| n != entry && graph.value_pins(n, Direction::Output).is_empty())
        .ok_or(StructuralError::NoEntry)?;

    let then = graph.add_pin(
        entry,
        "__then".into(),
        "then".into(),
        Direction::Output,
        PinType::exec(),
    );
    let execute = graph.add_pin(
        exit,
        "__execute".into(),
        "execute".into(),
        Direction::Input,
        PinType::exec(),
    );
    graph.node_mut(entry).pins.push(then);
    graph.node_mut(exit).pins.push(execute);
    graph.pin_mut(then).links.push(Link {
        node: exit,
        pin: execute,
    });
    graph.pin_mut(execute).links.push(Link {
        node: entry,
        pin: then,
    });
    debug!(
        entry = %graph.node(entry).name,
        exit = %graph.node(exit).name,
        "synthesized control edge for exec-less macro"
    );
    Ok(EntryPoints {
        entry,
        exit: Some(exit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::registry::Registry;
    use crate::testkit::{call, node, P};

    fn graph_of(parts: &[String]) -> Graph {
        let reg = Registry::builtin().unwrap();
        parse(&parts.concat(), &reg).expect("parse failed")
    }

    fn entry_node(then_target: Option<(&str, &str)>) -> String {
        let mut then = P::exec_out("E0", "then");
        if let Some((node, pin)) = then_target {
            then = then.link(node, pin);
        }
        node(
            "K2Node_FunctionEntry",
            "Entry",
            &[r#"FunctionReference=(MemberName="Run")"#],
            &[then],
        )
    }

    fn knot(name: &str, input: P, output: P) -> String {
        node("K2Node_Knot", name, &[], &[input, output])
    }

    #[test]
    fn knot_chain_is_bypassed_both_ways() {
        let g = graph_of(&[
            entry_node(Some(("Call", "X"))),
            node(
                "K2Node_VariableGet",
                "Get",
                &[r#"VariableReference=(MemberName="Speed",bSelfContext=True)"#],
                &[P::output("G", "Speed", "float").link("K1", "I")],
            ),
            knot(
                "K1",
                P::input("I", "InputPin", "wildcard").link("Get", "G"),
                P::output("O", "OutputPin", "wildcard").link("K2", "I"),
            ),
            knot(
                "K2",
                P::input("I", "InputPin", "wildcard").link("K1", "O"),
                P::output("O", "OutputPin", "wildcard").link("Call", "V"),
            ),
            call(
                "Call",
                None,
                "Consume",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::input("V", "Value", "float").link("K2", "O"),
                ],
            ),
        ]);
        let n = normalize(g).unwrap();
        let g = &n.graph;
        let get = g.node_by_name("Get").unwrap();
        let call = g.node_by_name("Call").unwrap();
        let out = g.find_pin(get, "Speed").unwrap();
        let value = g.find_pin(call, "Value").unwrap();
        assert_eq!(g.pin(out).links, vec![Link { node: call, pin: value }]);
        assert_eq!(g.pin(value).links, vec![Link { node: get, pin: out }]);
        let k1 = g.node_by_name("K1").unwrap();
        assert!(g.all_pins(k1).all(|p| g.pin(p).links.is_empty()));
    }

    #[test]
    fn dangling_knot_is_rejected() {
        let g = graph_of(&[
            entry_node(Some(("K", "I"))),
            knot(
                "K",
                P::input("I", "InputPin", "exec").link("Entry", "E0"),
                P::output("O", "OutputPin", "exec"),
            ),
        ]);
        assert!(matches!(
            normalize(g),
            Err(CompileError::Structural(StructuralError::UnresolvedReroute { node })) if node == "K"
        ));
    }

    #[test]
    fn knot_cycle_is_rejected() {
        let g = graph_of(&[
            entry_node(Some(("A", "I"))),
            knot(
                "A",
                P::input("I", "InputPin", "exec").link("Entry", "E0").link("B", "O"),
                P::output("O", "OutputPin", "exec").link("B", "I"),
            ),
            knot(
                "B",
                P::input("I", "InputPin", "exec").link("A", "O"),
                P::output("O", "OutputPin", "exec").link("A", "I"),
            ),
        ]);
        assert!(matches!(
            normalize(g),
            Err(CompileError::Structural(StructuralError::RerouteCycle { .. }))
        ));
    }

    #[test]
    fn control_fan_in_is_rejected() {
        let g = graph_of(&[
            node(
                "K2Node_ExecutionSequence",
                "Seq",
                &[],
                &[
                    P::exec_in("S"),
                    P::exec_out("A", "then_0").link("Call", "X"),
                    P::exec_out("B", "then_1").link("Call", "X"),
                ],
            ),
            call(
                "Call",
                None,
                "Work",
                &[P::exec_in("X").link("Seq", "A").link("Seq", "B")],
            ),
        ]);
        match normalize(g) {
            Err(CompileError::Structural(StructuralError::ExecFanIn { node, count, .. })) => {
                assert_eq!(node, "Call");
                assert_eq!(count, 2);
            }
            other => panic!("expected fan-in error, got {other:?}"),
        }
    }

    fn shared_producer(comment: &[&str]) -> Graph {
        graph_of(&[
            entry_node(Some(("A", "X"))),
            call(
                "Sum",
                Some("KismetMathLibrary"),
                "Add_IntInt",
                &[
                    P::input("1", "A", "int").default("1"),
                    P::input("2", "B", "int").default("2"),
                    P::output("3", "ReturnValue", "int").link("A", "V").link("B", "V"),
                ],
            )
            .replacen(
                "   FunctionReference",
                &format!(
                    "{}   FunctionReference",
                    comment.iter().map(|c| format!("   {c}\n")).collect::<String>()
                ),
                1,
            ),
            call(
                "A",
                None,
                "Use",
                &[
                    P::exec_in("X").link("Entry", "E0"),
                    P::exec_out("T", "then").link("B", "X"),
                    P::input("V", "Value", "int").link("Sum", "3"),
                ],
            ),
            call(
                "B",
                None,
                "Use",
                &[
                    P::exec_in("X").link("A", "T"),
                    P::input("V", "Value", "int").link("Sum", "3"),
                ],
            ),
        ])
    }

    #[test]
    fn shared_pure_output_is_advised() {
        let n = normalize(shared_producer(&[])).unwrap();
        assert_eq!(n.diagnostics.len(), 1);
        assert_eq!(n.diagnostics[0].code, Some(codes::W0201));
        assert_eq!(n.diagnostics[0].node.as_deref(), Some("Sum"));
    }

    #[test]
    fn cache_directive_silences_advisory() {
        let n = normalize(shared_producer(&["NodeComment=\"cpp:cache\""])).unwrap();
        assert!(n.diagnostics.is_empty());
    }

    #[test]
    fn function_entry_is_preferred() {
        let g = graph_of(&[
            entry_node(Some(("A", "X"))),
            call("A", None, "Use", &[P::exec_in("X").link("Entry", "E0")]),
            node(
                "K2Node_FunctionResult",
                "Result",
                &[],
                &[P::exec_in("R")],
            ),
        ]);
        let n = normalize(g).unwrap();
        assert_eq!(n.graph.node(n.entry.entry).name, "Entry");
        assert_eq!(n.entry.exit.map(|e| n.graph.node(e).name.clone()), Some("Result".into()));
        assert!(n.diagnostics.is_empty());
    }

    #[test]
    fn entry_without_successor_is_still_found() {
        let n = normalize(graph_of(&[entry_node(None)])).unwrap();
        assert_eq!(n.graph.node(n.entry.entry).name, "Entry");
    }

    #[test]
    fn exec_less_macro_gets_synthesized_edge() {
        let g = graph_of(&[
            node(
                "K2Node_Tunnel",
                "In",
                &[],
                &[P::output("A", "Value", "float").link("Out", "B")],
            ),
            node(
                "K2Node_Tunnel",
                "Out",
                &[],
                &[P::input("B", "Result", "float").link("In", "A")],
            ),
        ]);
        let n = normalize(g).unwrap();
        let g = &n.graph;
        let (entry, exit) = (n.entry.entry, n.entry.exit.unwrap());
        assert_eq!(g.node(entry).name, "In");
        assert_eq!(g.node(exit).name, "Out");
        let then = g.then_output(entry).expect("synthesized then");
        assert_eq!(g.pin(then).links[0].node, exit);
        assert!(g.has_input_exec(exit));
    }

    #[test]
    fn graph_without_entry_is_rejected() {
        let g = graph_of(&[call("A", None, "Use", &[P::input("V", "Value", "int")])]);
        assert!(matches!(
            normalize(g),
            Err(CompileError::Structural(StructuralError::NoEntry))
        ));
    }
}
