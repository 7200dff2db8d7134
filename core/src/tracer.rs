//! # Tracer: Statement Instrumentation Hook
//!
//! A [`Tracer`] is told about every instrumented statement before it runs and
//! hands back a completion callback that fires once the statement returns.

use std::sync::Arc;

/// Completion callback returned by [`Tracer::trace_data`].
pub type SpanFinish = Box<dyn FnOnce() + Send + 'static>;

/// Pre/post statement observer.
///
/// Implementations are shared by every in-flight statement, so each call must
/// produce an independent callback. Backend failures are the tracer's own
/// business; the executor only guarantees the callback runs exactly once.
pub trait Tracer: Send + Sync + 'static {
    /// `descriptor` is the SQL text, or `"batch"` for batched statements.
    fn trace_data(&self, descriptor: &str) -> SpanFinish;
}

impl<T: Tracer + ?Sized> Tracer for Arc<T> {
    fn trace_data(&self, descriptor: &str) -> SpanFinish {
        (**self).trace_data(descriptor)
    }
}

/// Tracer that does nothing. The executor default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilTracer;

impl NilTracer {
    pub fn new() -> Self {
        Self
    }
}

impl Tracer for NilTracer {
    fn trace_data(&self, _descriptor: &str) -> SpanFinish {
        Box::new(|| {})
    }
}

/// Runs a [`SpanFinish`] when dropped, so the callback also fires when the
/// traced future panics or is dropped mid-flight.
#[must_use = "the completion callback runs when the guard is dropped"]
pub struct TraceGuard {
    finish: Option<SpanFinish>,
}

impl TraceGuard {
    pub fn start(tracer: &dyn Tracer, descriptor: &str) -> Self {
        Self {
            finish: Some(tracer.trace_data(descriptor)),
        }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        if let Some(finish) = self.finish.take() {
            finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        started: AtomicUsize,
        finished: Arc<AtomicUsize>,
    }

    impl Tracer for Counting {
        fn trace_data(&self, _descriptor: &str) -> SpanFinish {
            self.started.fetch_add(1, Ordering::SeqCst);
            let finished = self.finished.clone();
            Box::new(move || {
                finished.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[test]
    fn nil_tracer_callback_is_inert() {
        let finish = NilTracer::new().trace_data("select 1");
        finish();
    }

    #[test]
    fn guard_finishes_once_on_unwind() {
        let tracer = Counting {
            started: AtomicUsize::new(0),
            finished: Arc::new(AtomicUsize::new(0)),
        };
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = TraceGuard::start(&tracer, "select 1");
            panic!("driver blew up");
        }));
        assert!(result.is_err());
        assert_eq!(tracer.started.load(Ordering::SeqCst), 1);
        assert_eq!(tracer.finished.load(Ordering::SeqCst), 1);
    }
}
