use std::collections::HashMap;

use super::value::Value;

type ScopeFrame = HashMap<String, Value>;

/// Lexical scoping of locals while evaluating one function body.
///
/// Top-level names are not kept here; the interpreter resolves them itself.
#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<ScopeFrame>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// A scope that starts out with the locals a closure captured.
    pub fn with_env(env: ScopeFrame) -> Self {
        Self { frames: vec![env] }
    }

    /// Enter a new scope frame
    pub fn enter(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Leave the current scope frame
    pub fn leave(&mut self) {
        self.frames.pop();
    }

    /// Resolve a name by searching from innermost to outermost scope
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Add a binding to the current (innermost) scope
    pub fn add(&mut self, name: impl ToString, value: Value) {
        if self.frames.is_empty() {
            self.frames.push(HashMap::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Flatten all visible bindings, inner ones winning.
    pub fn capture(&self) -> ScopeFrame {
        let mut env = HashMap::new();
        for frame in &self.frames {
            for (name, value) in frame {
                env.insert(name.clone(), value.clone());
            }
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_outer_ones() {
        let mut scope = Scope::new();
        scope.add("x", Value::Long(1));
        scope.enter();
        scope.add("x", Value::Long(2));
        assert_eq!(scope.resolve("x"), Some(&Value::Long(2)));
        assert_eq!(scope.capture().get("x"), Some(&Value::Long(2)));
        scope.leave();
        assert_eq!(scope.resolve("x"), Some(&Value::Long(1)));
        assert_eq!(scope.resolve("y"), None);
    }
}
