// bpcc — Blueprint Clipboard Compiler
//
// Library root. One module per compiler stage plus the shared graph model,
// statement IR, diagnostics and configuration.

pub mod codegen;
pub mod config;
pub mod diag;
pub mod dot;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod id;
pub mod lir;
pub mod lower;
pub mod normalize;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod template;

#[cfg(test)]
mod testkit;
