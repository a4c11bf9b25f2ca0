//! Environment chains and scoping.
//!
//! An environment is an ordered chain of frames, innermost first. Frames are
//! shared (`Rc<RefCell<..>>`) because closures alias live frames of the
//! environment that created them; lookup walks the chain innermost to
//! outermost and the first hit wins.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    error::{Error, RunResult},
    value::Value,
};

/// A single environment frame: an insertion-ordered map of bindings.
pub type EnvFrame = Rc<RefCell<IndexMap<String, Value>>>;

/// How the callee environment is composed on user-function calls.
///
/// This is a constructor parameter of the evaluator and the VM, not a
/// process-wide global, so tests can exercise both modes side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ScopeMode {
    /// The callee sees its arguments, its captured closure frames, and the
    /// caller's outermost (global) frame.
    #[default]
    Lexical,
    /// The callee sees its arguments, its captured closure frames, and a
    /// flattened snapshot of the caller's entire environment.
    Dynamic,
}

/// An ordered chain of binding frames, innermost first.
///
/// The chain is never empty; a fresh environment has a single (global) frame.
#[derive(Debug, Clone)]
pub struct Env {
    frames: Vec<EnvFrame>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// Creates an environment with a single empty global frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![new_frame()],
        }
    }

    /// Creates a single-frame environment from existing bindings.
    #[must_use]
    pub fn from_bindings(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            frames: vec![Rc::new(RefCell::new(bindings.into_iter().collect()))],
        }
    }

    /// Creates an environment from an explicit frame chain, innermost first.
    ///
    /// # Panics
    /// Panics if `frames` is empty; the chain always has a global frame.
    #[must_use]
    pub fn from_frames(frames: Vec<EnvFrame>) -> Self {
        assert!(!frames.is_empty(), "environment chain must have at least one frame");
        Self { frames }
    }

    /// Number of frames in the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Looks a name up, walking innermost to outermost.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames.iter().find_map(|frame| frame.borrow().get(name).cloned())
    }

    /// Looks a name up or fails with an unknown-name error.
    pub fn get(&self, name: &str) -> RunResult<Value> {
        self.lookup(name).ok_or_else(|| Error::unknown_name(name))
    }

    /// Binds a name in the innermost frame (`set`).
    pub fn set(&self, name: &str, value: Value) {
        self.frames[0].borrow_mut().insert(name.to_owned(), value);
    }

    /// Binds a name in the outermost (global) frame (`setg`).
    pub fn set_global(&self, name: &str, value: Value) {
        self.frames[self.frames.len() - 1]
            .borrow_mut()
            .insert(name.to_owned(), value);
    }

    /// Binds a name in the second-from-outermost frame (`setc`).
    ///
    /// In a single-frame environment this degrades to writing that frame,
    /// the same as `set` and `setg`.
    pub fn set_enclosing(&self, name: &str, value: Value) {
        let idx = self.frames.len().saturating_sub(2);
        self.frames[idx].borrow_mut().insert(name.to_owned(), value);
    }

    /// The frames a lambda captures: every frame except the outermost.
    #[must_use]
    pub fn closure_frames(&self) -> Vec<EnvFrame> {
        self.frames[..self.frames.len() - 1].to_vec()
    }

    /// The outermost (global) frame.
    #[must_use]
    pub fn global_frame(&self) -> EnvFrame {
        Rc::clone(&self.frames[self.frames.len() - 1])
    }

    /// Merges the whole chain into one frame; innermost bindings win.
    ///
    /// Used to compose callee environments under dynamic scoping.
    #[must_use]
    pub fn flattened(&self) -> EnvFrame {
        let mut merged = IndexMap::new();
        for frame in self.frames.iter().rev() {
            for (name, value) in &*frame.borrow() {
                merged.insert(name.clone(), value.clone());
            }
        }
        Rc::new(RefCell::new(merged))
    }
}

/// Creates an empty shared frame.
#[must_use]
pub fn new_frame() -> EnvFrame {
    Rc::new(RefCell::new(IndexMap::new()))
}

/// Binds call arguments to parameter names, checking arity.
pub fn bind_args(what: &str, params: &[String], args: crate::value::ArgVec) -> RunResult<EnvFrame> {
    if params.len() != args.len() {
        return Err(Error::arity(what, params.len(), args.len()));
    }
    let map: IndexMap<String, Value> = params.iter().cloned().zip(args).collect();
    Ok(Rc::new(RefCell::new(map)))
}

/// Composes the environment a user function body runs in.
///
/// Lexical: `[args, closures.., caller_global]`.
/// Dynamic: `[args, closures.., flatten(caller_env)]`.
#[must_use]
pub fn compose_call_env(args: EnvFrame, closures: &[EnvFrame], caller: &Env, mode: ScopeMode) -> Env {
    let mut frames = Vec::with_capacity(closures.len() + 2);
    frames.push(args);
    frames.extend(closures.iter().map(Rc::clone));
    frames.push(match mode {
        ScopeMode::Lexical => caller.global_frame(),
        ScopeMode::Dynamic => caller.flattened(),
    });
    Env::from_frames(frames)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn num(n: i64) -> Value {
        Value::Number(n.into())
    }

    #[test]
    fn innermost_lookup_wins() {
        let global = new_frame();
        global.borrow_mut().insert("x".to_owned(), num(1));
        let local = new_frame();
        local.borrow_mut().insert("x".to_owned(), num(2));
        let env = Env::from_frames(vec![local, global]);
        assert_eq!(env.lookup("x"), Some(num(2)));
    }

    #[test]
    fn set_variants_target_distinct_frames() {
        let inner = new_frame();
        let middle = new_frame();
        let outer = new_frame();
        let env = Env::from_frames(vec![inner.clone(), middle.clone(), outer.clone()]);

        env.set("a", num(1));
        env.set_global("b", num(2));
        env.set_enclosing("c", num(3));

        assert_eq!(inner.borrow().get("a"), Some(&num(1)));
        assert_eq!(outer.borrow().get("b"), Some(&num(2)));
        assert_eq!(middle.borrow().get("c"), Some(&num(3)));
    }

    #[test]
    fn single_frame_env_degrades_all_sets() {
        let env = Env::new();
        env.set("a", num(1));
        env.set_global("b", num(2));
        env.set_enclosing("c", num(3));
        for name in ["a", "b", "c"] {
            assert!(env.lookup(name).is_some());
        }
    }

    #[test]
    fn flatten_prefers_innermost() {
        let global = new_frame();
        global.borrow_mut().insert("x".to_owned(), num(1));
        global.borrow_mut().insert("y".to_owned(), num(9));
        let local = new_frame();
        local.borrow_mut().insert("x".to_owned(), num(2));
        let env = Env::from_frames(vec![local, global]);

        let flat = env.flattened();
        assert_eq!(flat.borrow().get("x"), Some(&num(2)));
        assert_eq!(flat.borrow().get("y"), Some(&num(9)));
    }

    #[test]
    fn closure_frames_exclude_global() {
        let global = new_frame();
        let local = new_frame();
        let env = Env::from_frames(vec![local.clone(), global]);
        let captured = env.closure_frames();
        assert_eq!(captured.len(), 1);
        assert!(Rc::ptr_eq(&captured[0], &local));
    }

    #[test]
    fn bind_args_checks_arity() {
        let params = vec!["x".to_owned(), "y".to_owned()];
        assert!(bind_args("f", &params, [num(1)].into_iter().collect()).is_err());
        let frame = bind_args("f", &params, [num(1), num(2)].into_iter().collect()).unwrap();
        assert_eq!(frame.borrow().get("y"), Some(&num(2)));
    }
}
