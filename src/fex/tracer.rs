//! Trace observer hook.
//!
//! A tracer receives free-form trace messages (from `trace` actions) and
//! operator pass/fail signals (from `trace_op` bindings). The default
//! tracer forwards everything to the `log` facade, so traces cost nothing
//! unless a logger is installed.

/// Observer for trace output emitted while an expression runs.
///
/// Levels are user-defined; a tracer may filter on them.
pub trait Tracer {
    /// A free-form trace message from a `trace` action.
    fn message(&self, level: i32, msg: &str);

    /// An operator finished: `msg` is the bound format output, `passed`
    /// the predicate result.
    fn op_result(&self, level: i32, msg: &str, passed: bool) {
        self.message(level, &format!("{} [{}]", msg, if passed { "pass" } else { "fail" }));
    }
}

/// Default tracer: routes messages to `log::debug!` and operator
/// signals to `log::trace!`.
pub struct LogTracer;

impl Tracer for LogTracer {
    fn message(&self, level: i32, msg: &str) {
        log::debug!("trace[{}]: {}", level, msg);
    }

    fn op_result(&self, level: i32, msg: &str, passed: bool) {
        log::trace!(
            "trace[{}]: {} [{}]",
            level,
            msg,
            if passed { "pass" } else { "fail" }
        );
    }
}
