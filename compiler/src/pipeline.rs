// pipeline.rs — Compilation state and pass orchestration
//
// Holds every pass artifact and runs the minimal set of passes for a given
// terminal PassId.
//
// Preconditions: source text and Registry are set before calling run_pipeline.
// Postconditions: artifacts for all required passes are populated, or the
//   first fatal error is returned together with the pass that raised it.
// Failure modes: any `CompileError` from a pass.
// Side effects: calls `on_pass_complete` after each pass so the driver can
//   print advisories immediately; logs per-pass timing at debug level.

use std::time::Instant;

use tracing::{debug, info};

use crate::codegen::codegen;
use crate::diag::Diagnostic;
use crate::error::CompileError;
use crate::flatten::flatten;
use crate::graph::Graph;
use crate::id::NameAllocator;
use crate::lir::LirFunction;
use crate::lower::lower;
use crate::normalize::{normalize, Normalized};
use crate::parser::parse;
use crate::pass::{descriptor, required_passes, PassId};
use crate::registry::Registry;

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for `--emit build-info`.
///
/// `source_hash`: SHA-256 of the raw input text.
/// `config_fingerprint`: SHA-256 of `Registry::canonical_json()`.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub config_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    pub fn config_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.config_fingerprint)
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "source_hash": self.source_hash_hex(),
            "config_fingerprint": self.config_fingerprint_hex(),
            "compiler_version": self.compiler_version,
        })
        .to_string()
            + "\n"
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Hash the input text and the canonical configuration.
pub fn compute_provenance(source: &str, registry: &Registry) -> Provenance {
    Provenance {
        source_hash: sha256(source),
        config_fingerprint: sha256(&registry.canonical_json()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Holds all compilation artifacts and accumulated advisories.
pub struct CompilationState {
    pub registry: Registry,
    pub source: String,
    pub names: NameAllocator,
    pub graph: Option<Graph>,
    pub normalized: Option<Normalized>,
    pub lir: Option<LirFunction>,
    pub generated: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationState {
    pub fn new(source: impl Into<String>, registry: Registry, names: NameAllocator) -> Self {
        Self {
            registry,
            source: source.into(),
            names,
            graph: None,
            normalized: None,
            lir: None,
            generated: None,
            diagnostics: Vec::new(),
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// A pass failed; nothing after it ran.
#[derive(Debug, thiserror::Error)]
#[error("{pass} failed: {error}", pass = pass_name(.failing_pass))]
pub struct PipelineError {
    pub failing_pass: PassId,
    #[source]
    pub error: CompileError,
}

fn pass_name(id: &PassId) -> &'static str {
    descriptor(*id).name
}

fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    started: Instant,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) {
    let elapsed = started.elapsed();
    on_pass_complete(pass_id, &diags);
    state.diagnostics.extend(diags);
    debug!(
        pass = descriptor(pass_id).name,
        ms = elapsed.as_secs_f64() * 1000.0,
        "pass complete"
    );
}

fn fail(pass_id: PassId) -> impl FnOnce(CompileError) -> PipelineError {
    move |error| PipelineError {
        failing_pass: pass_id,
        error,
    }
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → timing log.
/// The flatten pass is skipped (but still reported) when the configuration
/// disables it.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        let started = Instant::now();
        let diags = match pass_id {
            PassId::Build => {
                let graph = parse(&state.source, &state.registry).map_err(fail(pass_id))?;
                info!(
                    nodes = graph.nodes.len(),
                    pins = graph.pins.len(),
                    links = graph.link_count(),
                    "graph built"
                );
                state.graph = Some(graph);
                Vec::new()
            }
            PassId::Normalize => {
                let graph = state.graph.take().unwrap_or_default();
                let mut normalized = normalize(graph).map_err(fail(pass_id))?;
                let diags = std::mem::take(&mut normalized.diagnostics);
                state.normalized = Some(normalized);
                diags
            }
            PassId::Lower => {
                let Some(normalized) = state.normalized.as_ref() else {
                    continue;
                };
                let result = lower(normalized, &state.registry, &mut state.names)
                    .map_err(fail(pass_id))?;
                info!(lines = result.function.lines.len(), "function lowered");
                state.lir = Some(result.function);
                result.diagnostics
            }
            PassId::Flatten => {
                if state.registry.config().flatten {
                    if let Some(lir) = state.lir.as_mut() {
                        let stats = flatten(lir);
                        info!(inlined = stats.inlined, "temporaries inlined");
                    }
                }
                Vec::new()
            }
            PassId::Codegen => {
                let Some(lir) = state.lir.as_ref() else {
                    continue;
                };
                let result = codegen(lir, &state.registry);
                state.generated = Some(result.cpp_source);
                result.diagnostics
            }
        };
        finish_pass(state, pass_id, diags, started, &mut on_pass_complete);
    }
    Ok(())
}

/// Output of a whole compilation.
#[derive(Debug)]
pub struct Compiled {
    pub cpp_source: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile `source` to C++ in one call. `names` continues from its current
/// counter and is advanced past every name used.
pub fn compile(
    source: &str,
    registry: Registry,
    names: &mut NameAllocator,
) -> Result<Compiled, PipelineError> {
    let mut state = CompilationState::new(source, registry, names.clone());
    run_pipeline(&mut state, PassId::Codegen, |_, _| {})?;
    *names = state.names;
    Ok(Compiled {
        cpp_source: state.generated.unwrap_or_default(),
        diagnostics: state.diagnostics,
    })
}
