// pass.rs — Pass descriptors, dependency resolution, emit targets
//
// Declares the compiler's passes, their dependency edges and the artifacts
// they produce. The pipeline runner uses this to compute the minimal pass
// list for each `--emit` target.

use std::collections::HashSet;

// ── Pass and artifact identifiers ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Build,
    Normalize,
    Lower,
    Flatten,
    Codegen,
}

/// Machine-readable artifact identifiers. Each maps to a field of the
/// compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Graph,      // Graph
    Normalized, // Normalized
    Lir,        // LirFunction
    Generated,  // String
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Name for diagnostics and timing output.
    pub name: &'static str,
    /// Passes whose outputs this pass consumes.
    pub inputs: &'static [PassId],
    pub outputs: &'static [ArtifactId],
    /// Postcondition, documentation only.
    pub invariants: &'static str,
}

pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Build => PassDescriptor {
            name: "build",
            inputs: &[],
            outputs: &[ArtifactId::Graph],
            invariants: "every link resolved to a pin, split fields in constructor order",
        },
        PassId::Normalize => PassDescriptor {
            name: "normalize",
            inputs: &[PassId::Build],
            outputs: &[ArtifactId::Normalized],
            invariants: "no reroute on any path, no control fan-in, entry found",
        },
        PassId::Lower => PassDescriptor {
            name: "lower",
            inputs: &[PassId::Normalize],
            outputs: &[ArtifactId::Lir],
            invariants: "every pure producer evaluated at most once per scope",
        },
        PassId::Flatten => PassDescriptor {
            name: "flatten",
            inputs: &[PassId::Lower],
            outputs: &[ArtifactId::Lir],
            invariants: "no single-use temporary left that may be inlined",
        },
        PassId::Codegen => PassDescriptor {
            name: "codegen",
            inputs: &[PassId::Flatten],
            outputs: &[ArtifactId::Generated],
            invariants: "balanced braces, post rewrites applied",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

pub const ALL_PASSES: [PassId; 5] = [
    PassId::Build,
    PassId::Normalize,
    PassId::Lower,
    PassId::Flatten,
    PassId::Codegen,
];

/// Minimal ordered set of passes needed to produce `terminal`, in execution
/// order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Emit targets ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmitTarget {
    /// C++ function body.
    Cpp,
    /// Graphviz DOT of the normalized graph.
    Graph,
    /// JSON provenance of the input and configuration.
    BuildInfo,
}

impl EmitTarget {
    /// Last pass the target needs, `None` when no pass has to run.
    pub fn terminal(self) -> Option<PassId> {
        match self {
            EmitTarget::Cpp => Some(PassId::Codegen),
            EmitTarget::Graph => Some(PassId::Normalize),
            EmitTarget::BuildInfo => None,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
