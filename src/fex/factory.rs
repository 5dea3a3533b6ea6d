//! Factory and entry points.
//!
//! A [`FlowExpression`] owns the build state (reference registry, shared
//! pre-operator, tracer) and hands out top-level expression handles. A
//! handle can be run as an axiom, spliced into another expression with
//! `fex`, or recorded under a name for deferred lookup.
//!
//! Two factories are fully independent: names recorded in one are not
//! visible from the other. Keep the factory alive while its expressions
//! run, since it owns the named productions that references resolve to.

use std::cell::RefCell;
use std::rc::Rc;

use super::builder::{BuildState, FexBuilder};
use super::node::{check_node, run_node, CheckResult, Node, NodeRef};
use super::pre_op::ActFn;
use super::tracer::Tracer;

pub struct FlowExpression<T> {
    state: Rc<RefCell<BuildState<T>>>,
}

impl<T> FlowExpression<T> {
    pub fn new() -> Self {
        FlowExpression {
            state: Rc::new(RefCell::new(BuildState::new())),
        }
    }

    /// A factory whose `skip()`/`global_skip()` conveniences are wired to
    /// `skip`.
    pub fn with_default_skip(skip: impl Fn(&mut T) + 'static) -> Self {
        let fex = FlowExpression::new();
        fex.set_default_skip(skip);
        fex
    }

    pub fn set_default_skip(&self, skip: impl Fn(&mut T) + 'static) {
        let skip: ActFn<T> = Rc::new(skip);
        self.state.borrow_mut().default_skip = Some(skip);
    }

    /// Install a trace observer for expressions built after this call.
    pub fn set_tracer(&self, tracer: Rc<dyn Tracer>) {
        self.state.borrow_mut().tracer = tracer;
    }

    /// Enable or disable trace bindings made after this call.
    pub fn trace_on(&self, on: bool) {
        self.state.borrow_mut().tracing = on;
    }

    fn top(&self, node: NodeRef<T>, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        let mut builder = FexBuilder::new(self.state.clone(), node.clone());
        build(&mut builder);
        FexNode { inner: node }
    }

    pub fn seq(&self, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.top(Node::new_seq(), build)
    }

    pub fn opt(&self, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.top(Node::new_opt(), build)
    }

    pub fn one_of(&self, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.top(Node::new_one_of(), build)
    }

    pub fn not_one_of(&self, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.top(Node::new_not_one_of(), build)
    }

    pub fn rep(&self, min: i32, max: i32, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.top(Node::new_rep(min, max), build)
    }

    pub fn rep_n(&self, n: i32, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.rep(n, n, build)
    }

    pub fn rep_0_n(&self, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.rep(0, -1, build)
    }

    pub fn rep_1_n(&self, build: impl FnOnce(&mut FexBuilder<T>)) -> FexNode<T> {
        self.rep(1, -1, build)
    }

    pub fn rep_one_of(
        &self,
        min: i32,
        max: i32,
        build: impl FnOnce(&mut FexBuilder<T>),
    ) -> FexNode<T> {
        let one_of = Node::new_one_of();
        let mut builder = FexBuilder::new(self.state.clone(), one_of.clone());
        build(&mut builder);
        let rep = Node::new_rep(min, max);
        rep.borrow_mut().children.push(one_of);
        FexNode { inner: rep }
    }
}

impl<T> Default for FlowExpression<T> {
    fn default() -> Self {
        FlowExpression::new()
    }
}

/// Handle to a constructed expression tree.
///
/// Cheap to clone; clones share the same tree.
pub struct FexNode<T> {
    pub(crate) inner: NodeRef<T>,
}

impl<T> Clone for FexNode<T> {
    fn clone(&self) -> Self {
        FexNode {
            inner: self.inner.clone(),
        }
    }
}

impl<T> FexNode<T> {
    /// Drive the expression against `ctx`. Side effects (value captures,
    /// diagnostics from fail-actions) happen inside the callbacks the
    /// expression was built from.
    pub fn run(&self, ctx: &mut T) -> bool {
        run_node(&self.inner, ctx)
    }

    /// Lookahead execution; containers use this internally, and it is
    /// occasionally useful to probe an axiom without hard failures.
    pub fn check_run(&self, ctx: &mut T) -> CheckResult {
        check_node(&self.inner, ctx)
    }
}
