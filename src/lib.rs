//! # fex
//!
//! Flow expressions: declaratively built, tree-structured programs that
//! drive a mutable *context* through operators, decisions, repetitions
//! and side effects. The canonical use is recursive-descent parsing,
//! where the context is a text scanner and the expression describes a
//! grammar, but the engine is context-agnostic: the same machinery
//! drives menu loops, REPLs, or any rule-based flow-chart logic.
//!
//! ```
//! use fex::scanner::{scanner_expression, ScanOps, TextScanner};
//! use std::{cell::RefCell, rc::Rc};
//!
//! let digits = Rc::new(RefCell::new(String::new()));
//! let d = digits.clone();
//!
//! let fex = scanner_expression();
//! let axiom = fex.seq(|s| {
//!     s.ch('#')
//!         .rep(3, -1, |r| {
//!             r.digit().act_value::<char>(move |c| d.borrow_mut().push(c));
//!         })
//!         .on_fail(|s: &mut TextScanner| s.log_error("3+ digits expected"))
//!         .is_eos();
//! });
//!
//! assert!(axiom.run(&mut TextScanner::new("#2718")));
//! assert_eq!(*digits.borrow(), "2718");
//! ```
//!
//! Alternative selection is driven by lookahead: a `one_of` probes each
//! arm and only a *first-step* decline moves it on to the next arm. Once
//! an arm's first meaningful step passes, the arm is committed and any
//! later failure is final. Fail-actions stay quiet during lookahead, so
//! rejected arms never produce spurious diagnostics.
//!
//! Recursive grammars cite productions by name (`ref_name`/`ref_to`);
//! forward references resolve when the expression runs.
//!
//! ## Left recursion
//!
//! There is no left-recursion detection. A reference that can re-enter
//! its own production without consuming context input will recurse until
//! the stack runs out; restructure such grammars so every cycle first
//! consumes something.

pub mod fex;
pub mod scanner;

pub use crate::fex::{
    CheckResult, FexBuilder, FexNode, FlowExpression, LogTracer, Tracer, ValueSlot,
};
pub use crate::scanner::{scanner_expression, ScanError, ScanErrorLog, ScanOps, TextScanner};
