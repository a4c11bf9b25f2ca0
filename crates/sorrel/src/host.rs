use crate::{env::ScopeMode, io::{PrintWriter, ReadSource}, tracer::Tracer};

/// Host facilities threaded through both engines.
///
/// Bundles the print writer, the fallback input source for `read`, the
/// execution tracer, and the scoping mode. The generics monomorphize away:
/// with [`crate::NoopTracer`] the trace hooks cost nothing.
#[derive(Debug)]
pub struct Host<P, R, T> {
    pub print: P,
    pub read: R,
    pub tracer: T,
    pub scoping: ScopeMode,
    /// Current tree-evaluation nesting depth, for trace indentation.
    pub(crate) eval_depth: usize,
}

impl<P: PrintWriter, R: ReadSource, T: Tracer> Host<P, R, T> {
    pub fn new(print: P, read: R, tracer: T, scoping: ScopeMode) -> Self {
        Self {
            print,
            read,
            tracer,
            scoping,
            eval_depth: 0,
        }
    }
}

impl Host<crate::io::NoPrint, crate::io::QueuedLines, crate::tracer::NoopTracer> {
    /// A silent host with no input, for tests and quiet embedding.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(
            crate::io::NoPrint,
            crate::io::QueuedLines::default(),
            crate::tracer::NoopTracer,
            ScopeMode::Lexical,
        )
    }
}
