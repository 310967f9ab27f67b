use crate::value::Map;
use crate::value::Value;

/// Stack of variable frames, innermost last.
///
/// The stack always holds at least the root frame the render was seeded
/// with; [`ScopeStack::pop`] refuses to remove it.
#[derive(Clone, Debug)]
pub struct ScopeStack {
    frames: Vec<Map>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl ScopeStack {
    #[must_use]
    pub fn new(root: Map) -> Self {
        Self { frames: vec![root] }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: Map) {
        self.frames.push(frame);
    }

    /// Remove the innermost frame. The root frame is never removed.
    pub fn pop(&mut self) -> Option<Map> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Resolve `name`, innermost frame first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind `name` in the innermost frame, shadowing outer bindings.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::context;

    #[test]
    fn test_inner_frames_shadow_outer_ones() {
        let mut scopes = ScopeStack::new(context([("x", 1)]));
        scopes.push(context([("x", 2)]));
        assert_eq!(scopes.get("x"), Some(&Value::Int(2)));
        scopes.pop();
        assert_eq!(scopes.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_set_writes_to_the_innermost_frame() {
        let mut scopes = ScopeStack::default();
        scopes.push(Map::new());
        scopes.set("y", Value::Bool(true));
        assert!(scopes.contains("y"));
        scopes.pop();
        assert!(!scopes.contains("y"));
    }

    #[test]
    fn test_root_frame_is_never_popped() {
        let mut scopes = ScopeStack::new(context([("x", 1)]));
        assert!(scopes.pop().is_none());
        assert_eq!(scopes.depth(), 1);
        assert!(scopes.contains("x"));
    }

    #[test]
    fn test_get_mut_finds_outer_bindings() {
        let mut scopes = ScopeStack::new(context([("n", 1)]));
        scopes.push(Map::new());
        if let Some(value) = scopes.get_mut("n") {
            *value = Value::Int(5);
        }
        scopes.pop();
        assert_eq!(scopes.get("n"), Some(&Value::Int(5)));
    }
}
