// id.rs — Generated identifier allocation
//
// One monotonically increasing counter mints every generated name. It is
// persisted between runs so code pasted from separate compilations into the
// same file never reuses a name.
//
// Preconditions: none.
// Postconditions: every name returned by one allocator is distinct, and
//   distinct from names of earlier runs sharing the same state file.
// Failure modes: `StateError` when the state file cannot be read, parsed
//   or written.
// Side effects: `load` reads and `store` writes the state file.

use std::path::Path;

use crate::error::StateError;

/// Default counter file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = ".bpcc-counter";

const KEY: &str = "currentVarInc=";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameAllocator {
    counter: u64,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(counter: u64) -> Self {
        NameAllocator { counter }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn next(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// `var<N>`
    pub fn temp(&mut self) -> String {
        format!("var{}", self.next())
    }

    /// `i<N>`
    pub fn index(&mut self) -> String {
        format!("i{}", self.next())
    }

    /// `break_<N>`
    pub fn flag(&mut self) -> String {
        format!("break_{}", self.next())
    }

    /// Read the counter; a missing file starts from zero.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(StateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let trimmed = text.trim();
        trimmed
            .strip_prefix(KEY)
            .and_then(|n| n.trim().parse().ok())
            .map(Self::starting_at)
            .ok_or_else(|| StateError::Malformed {
                path: path.to_path_buf(),
                content: trimmed.to_string(),
            })
    }

    pub fn store(&self, path: &Path) -> Result<(), StateError> {
        std::fs::write(path, format!("{KEY}{}\n", self.counter)).map_err(|source| {
            StateError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}
