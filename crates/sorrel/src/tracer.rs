//! Execution tracing hooks.
//!
//! The interpreter's observability layer is a trait with default no-op
//! methods, monomorphized into the evaluator and VM. With [`NoopTracer`]
//! every hook compiles away entirely; [`StderrTracer`] produces a
//! human-readable execution log for debugging.

/// Trait for execution tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code and zero runtime cost. Implementations only override
/// the hooks they care about.
pub trait Tracer {
    /// Called before each bytecode instruction is executed.
    ///
    /// This is the hottest hook; implementations should stay lightweight.
    #[inline(always)]
    fn on_inst(&mut self, _pc: usize, _inst: &'static str, _stack_depth: usize, _frame_depth: usize) {}

    /// Called when a call frame is pushed (or reused by a tail call).
    #[inline(always)]
    fn on_frame_push(&mut self, _name: &str, _depth: usize) {}

    /// Called when a call frame is popped.
    #[inline(always)]
    fn on_frame_pop(&mut self, _depth: usize) {}

    /// Called when the tree-walking evaluator enters a node.
    #[inline(always)]
    fn on_eval_enter(&mut self, _kind: &'static str, _depth: usize) {}

    /// Called when the tree-walking evaluator leaves a node.
    #[inline(always)]
    fn on_eval_leave(&mut self, _kind: &'static str, _depth: usize) {}
}

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that prints a human-readable execution log to stderr.
///
/// Output format:
/// ```text
/// [    0] PushImm        stack=0  frames=1
/// [    1] PopVar         stack=1  frames=1
///   >>> CALL fib         depth=2
///   <<< RETURN           depth=1
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of instructions to log before going quiet
    /// (prevents runaway output on loops). None = unlimited.
    limit: Option<usize>,
    count: usize,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracer that stops logging after `limit` instructions.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    fn exhausted(&mut self) -> bool {
        if let Some(limit) = self.limit {
            if self.count >= limit {
                return true;
            }
            self.count += 1;
            if self.count == limit {
                eprintln!("--- trace limit reached ({limit} instructions) ---");
            }
        }
        false
    }
}

impl Tracer for StderrTracer {
    #[inline]
    fn on_inst(&mut self, pc: usize, inst: &'static str, stack_depth: usize, frame_depth: usize) {
        if self.exhausted() {
            return;
        }
        eprintln!("[{pc:>5}] {inst:<14} stack={stack_depth}  frames={frame_depth}");
    }

    fn on_frame_push(&mut self, name: &str, depth: usize) {
        eprintln!("  >>> CALL {name:<14} depth={depth}");
    }

    fn on_frame_pop(&mut self, depth: usize) {
        eprintln!("  <<< RETURN           depth={depth}");
    }

    fn on_eval_enter(&mut self, kind: &'static str, depth: usize) {
        eprintln!("{:indent$}enter {kind}", "", indent = depth * 2);
    }

    fn on_eval_leave(&mut self, kind: &'static str, depth: usize) {
        eprintln!("{:indent$}leave {kind}", "", indent = depth * 2);
    }
}
