// scope.rs — Pin-to-variable bindings with block scoping
//
// Each open block of the emitted function owns one frame. A pin bound inside
// a loop body or branch arm disappears when that block closes, so a later
// reader outside the block re-evaluates the producer instead of naming a
// variable that is no longer in scope.

use std::collections::HashMap;

use crate::graph::PinId;
use crate::lir::VarId;

#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<HashMap<PinId, VarId>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Drop the innermost frame. The root frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of frames above the root.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn lookup(&self, pin: PinId) -> Option<VarId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(&pin).copied())
    }

    /// Bind `pin` in the innermost frame. Fails with the existing variable
    /// when the pin is already visible.
    pub fn bind(&mut self, pin: PinId, var: VarId) -> Result<(), VarId> {
        if let Some(existing) = self.lookup(pin) {
            return Err(existing);
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(pin, var);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_bindings_vanish_on_pop() {
        let mut s = ScopeStack::new();
        s.bind(PinId(1), VarId(10)).unwrap();
        s.push();
        s.bind(PinId(2), VarId(20)).unwrap();
        assert_eq!(s.lookup(PinId(1)), Some(VarId(10)));
        assert_eq!(s.lookup(PinId(2)), Some(VarId(20)));
        assert_eq!(s.depth(), 1);
        s.pop();
        assert_eq!(s.lookup(PinId(2)), None);
        assert_eq!(s.lookup(PinId(1)), Some(VarId(10)));
    }

    #[test]
    fn rebinding_a_visible_pin_fails() {
        let mut s = ScopeStack::new();
        s.bind(PinId(1), VarId(10)).unwrap();
        s.push();
        assert_eq!(s.bind(PinId(1), VarId(11)), Err(VarId(10)));
    }

    #[test]
    fn root_frame_survives_extra_pops() {
        let mut s = ScopeStack::new();
        s.bind(PinId(1), VarId(1)).unwrap();
        s.pop();
        s.pop();
        assert_eq!(s.depth(), 0);
        assert_eq!(s.lookup(PinId(1)), Some(VarId(1)));
    }
}
