use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bpcc::config::Config;
use bpcc::diag::Diagnostic;
use bpcc::id::{NameAllocator, DEFAULT_STATE_FILE};
use bpcc::pass::EmitTarget;
use bpcc::pipeline::{compute_provenance, run_pipeline, CompilationState};
use bpcc::registry::Registry;

#[derive(Parser, Debug)]
#[command(
    name = "bpcc",
    version,
    about = "Blueprint Clipboard Compiler: compiles copied Blueprint node graphs to C++ function bodies"
)]
struct Cli {
    /// Clipboard export to compile (`-` for standard input)
    input: PathBuf,

    /// Output file path
    #[arg(short, long, default_value = "output.cpp")]
    output: PathBuf,

    /// Also print the result to standard output
    #[arg(long)]
    stdout: bool,

    /// Output kind
    #[arg(long, value_enum, default_value_t = EmitTarget::Cpp)]
    emit: EmitTarget,

    /// JSON configuration replacing the built-in one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Name counter file
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Neither read nor write the name counter
    #[arg(long)]
    no_state: bool,

    /// Owning class of the generated function
    #[arg(long)]
    class: Option<String>,

    /// Fallback function name
    #[arg(long)]
    function: Option<String>,

    /// Keep every temporary as a named variable
    #[arg(long)]
    no_flatten: bool,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Configuration ──
    let config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::builtin(),
    };
    let mut config = match config {
        Ok(c) => c,
        Err(e) => fatal(2, &e.to_string()),
    };
    if let Some(class) = &cli.class {
        config.class_name = class.clone();
    }
    if let Some(function) = &cli.function {
        config.function_name = function.clone();
    }
    if cli.no_flatten {
        config.flatten = false;
    }
    let registry = match Registry::new(config) {
        Ok(r) => r,
        Err(e) => fatal(2, &e.to_string()),
    };

    // ── Input ──
    let source = match read_input(&cli.input) {
        Ok(s) => s,
        Err(e) => fatal(2, &format!("{}: {}", cli.input.display(), e)),
    };

    if cli.emit == EmitTarget::BuildInfo {
        let info = compute_provenance(&source, &registry).to_json();
        write_outputs(&cli, &info);
        return;
    }

    // ── Compile ──
    let names = if cli.no_state {
        NameAllocator::new()
    } else {
        match NameAllocator::load(&cli.state) {
            Ok(n) => n,
            Err(e) => fatal(2, &e.to_string()),
        }
    };

    let mut state = CompilationState::new(source, registry, names);
    let terminal = match cli.emit.terminal() {
        Some(pass) => pass,
        None => return,
    };
    let result = run_pipeline(&mut state, terminal, |_, diags| {
        for d in diags {
            print_diagnostic(d);
        }
    });
    if let Err(e) = result {
        fatal(1, &format!("error[{}]: {}", e.error.code(), e.error));
    }

    let text = match cli.emit {
        EmitTarget::Graph => state
            .normalized
            .as_ref()
            .map(|n| bpcc::dot::emit_dot(&n.graph))
            .unwrap_or_default(),
        _ => state.generated.take().unwrap_or_default(),
    };
    write_outputs(&cli, &text);

    if !cli.no_state && cli.emit == EmitTarget::Cpp {
        if let Err(e) = state.names.store(&cli.state) {
            fatal(2, &e.to_string());
        }
    }
}

fn read_input(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
    }
}

fn write_outputs(cli: &Cli, text: &str) {
    if let Err(e) = std::fs::write(&cli.output, text) {
        fatal(2, &format!("{}: {}", cli.output.display(), e));
    }
    if cli.stdout {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            fatal(2, &format!("stdout: {e}"));
        }
    }
}

fn print_diagnostic(d: &Diagnostic) {
    eprintln!("bpcc: {}", d);
    if let Some(node) = &d.node {
        eprintln!("  node: {}", node);
    }
}

fn fatal(code: i32, message: &str) -> ! {
    eprintln!("bpcc: {}", message);
    std::process::exit(code);
}
