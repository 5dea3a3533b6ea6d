//! Fluent builder for assembling expression trees.
//!
//! A builder always points at a *host* node; leaf methods append children
//! to it, composite methods create a child node and recurse into a nested
//! build with that child as the new host. Alongside the host the shared
//! build state tracks the most recently added first-class node (the
//! target of `on_fail`) and the most recent operator (the target of
//! `act_value`, `pre_op`, `skip` and the `trace_op` bindings).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::factory::FexNode;
use super::node::{Node, NodeKind, NodeRef, OpData, TraceActFn, ValueActFn};
use super::pre_op::{ActFn, PreOp};
use super::registry::RefRegistry;
use super::tracer::{LogTracer, Tracer};
use super::value::ValueSlot;

pub(crate) struct BuildState<T> {
    pub(crate) registry: RefRegistry<T>,
    pub(crate) global_pre_op: Rc<PreOp<T>>,
    pub(crate) tracer: Rc<dyn Tracer>,
    pub(crate) tracing: bool,
    pub(crate) default_skip: Option<ActFn<T>>,
    pub(crate) last_added: Option<NodeRef<T>>,
    pub(crate) last_op: Option<NodeRef<T>>,
}

impl<T> BuildState<T> {
    pub(crate) fn new() -> Self {
        BuildState {
            registry: RefRegistry::new(),
            global_pre_op: Rc::new(PreOp::new()),
            tracer: Rc::new(LogTracer),
            tracing: true,
            default_skip: None,
            last_added: None,
            last_op: None,
        }
    }
}

pub struct FexBuilder<T> {
    state: Rc<RefCell<BuildState<T>>>,
    host: NodeRef<T>,
}

impl<T> FexBuilder<T> {
    pub(crate) fn new(state: Rc<RefCell<BuildState<T>>>, host: NodeRef<T>) -> Self {
        FexBuilder { state, host }
    }

    fn append(&self, node: &NodeRef<T>) {
        self.host.borrow_mut().children.push(node.clone());
    }

    fn build_into(&self, node: &NodeRef<T>, build: impl FnOnce(&mut FexBuilder<T>)) {
        let mut inner = FexBuilder::new(self.state.clone(), node.clone());
        build(&mut inner);
    }

    /// Appending a composite invalidates the operator binding; one-of,
    /// not-one-of and repeat additionally become the `on_fail` target.
    fn note_composite(&self, fail_target: Option<NodeRef<T>>) {
        let mut state = self.state.borrow_mut();
        state.last_op = None;
        if let Some(node) = fail_target {
            state.last_added = Some(node);
        }
    }

    fn note_operator(&self, node: NodeRef<T>) {
        let mut state = self.state.borrow_mut();
        state.last_added = Some(node.clone());
        state.last_op = Some(node);
    }

    // ========================================================================
    // COMPOSITES
    // ========================================================================

    /// All children must pass, in order.
    pub fn seq(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        let node = Node::new_seq();
        self.build_into(&node, build);
        self.append(&node);
        self.note_composite(None);
        self
    }

    /// Passes when the first step declines; otherwise all children must
    /// pass.
    pub fn opt(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        let node = Node::new_opt();
        self.build_into(&node, build);
        self.append(&node);
        self.note_composite(None);
        self
    }

    /// First alternative whose first step passes wins; it must then
    /// complete.
    pub fn one_of(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        let node = Node::new_one_of();
        self.build_into(&node, build);
        self.append(&node);
        self.note_composite(Some(node));
        self
    }

    /// `one_of` wrapped in an optional.
    pub fn opt_one_of(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        let one_of = Node::new_one_of();
        self.build_into(&one_of, build);
        let opt = Node::new_opt();
        opt.borrow_mut().children.push(one_of.clone());
        self.append(&opt);
        self.note_composite(Some(one_of));
        self
    }

    /// Passes only when every alternative declines on its first step.
    pub fn not_one_of(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        let node = Node::new_not_one_of();
        self.build_into(&node, build);
        self.append(&node);
        self.note_composite(Some(node));
        self
    }

    /// Alias for [`not_one_of`](Self::not_one_of); reads better as a loop
    /// terminator.
    pub fn break_on(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        self.not_one_of(build)
    }

    /// Repeat the body between `min` and `max` times; `max = -1` means
    /// unbounded.
    pub fn rep(&mut self, min: i32, max: i32, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        let node = Node::new_rep(min, max);
        self.build_into(&node, build);
        self.append(&node);
        self.note_composite(Some(node));
        self
    }

    /// Repeat exactly `n` times.
    pub fn rep_n(&mut self, n: i32, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        self.rep(n, n, build)
    }

    pub fn rep_0_n(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        self.rep(0, -1, build)
    }

    pub fn rep_1_n(&mut self, build: impl FnOnce(&mut FexBuilder<T>)) -> &mut Self {
        self.rep(1, -1, build)
    }

    /// Repeat wrapping a one-of: each iteration takes whichever
    /// alternative applies.
    pub fn rep_one_of(
        &mut self,
        min: i32,
        max: i32,
        build: impl FnOnce(&mut FexBuilder<T>),
    ) -> &mut Self {
        let one_of = Node::new_one_of();
        self.build_into(&one_of, build);
        let rep = Node::new_rep(min, max);
        rep.borrow_mut().children.push(one_of);
        self.append(&rep);
        self.note_composite(Some(rep));
        self
    }

    // ========================================================================
    // LEAVES
    // ========================================================================

    /// Leaf operator from a plain predicate.
    pub fn op(&mut self, pred: impl Fn(&mut T) -> bool + 'static) -> &mut Self {
        self.op_val(move |ctx, _slot| pred(ctx))
    }

    /// Leaf operator whose predicate may deposit a value for a following
    /// `act_value`.
    pub fn op_val(&mut self, pred: impl Fn(&mut T, &mut ValueSlot) -> bool + 'static) -> &mut Self {
        let pre_op = self.state.borrow().global_pre_op.clone();
        let node = Node::new_op(OpData {
            pred: Rc::new(pred),
            pre_op: Some(pre_op),
            value_act: None,
            trace_act: None,
            hard: false,
        });
        self.append(&node);
        self.note_operator(node);
        self
    }

    /// Operator that always passes after performing `action`.
    pub fn valid_op(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        self.op(move |ctx| {
            action(ctx);
            true
        })
    }

    /// Hard condition: failure is final (never "try another alternative")
    /// and the bound fail-action fires even during lookahead. No pre-op
    /// runs ahead of it.
    pub fn assert(&mut self, pred: impl Fn(&mut T) -> bool + 'static) -> &mut Self {
        let node = Node::new_op(OpData {
            pred: Rc::new(move |ctx: &mut T, _slot: &mut ValueSlot| pred(ctx)),
            pre_op: None,
            value_act: None,
            trace_act: None,
            hard: true,
        });
        self.append(&node);
        self.note_operator(node);
        self
    }

    /// Side effect; always passes, never commits a lookahead.
    pub fn act(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        self.append(&Node::new_act(Rc::new(action), false));
        self
    }

    /// Side effect that *does* commit a lookahead: the "default" arm of
    /// a one-of.
    pub fn default_act(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        self.append(&Node::new_act(Rc::new(action), true));
        self
    }

    /// Alias for [`default_act`](Self::default_act).
    pub fn valid_act(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        self.default_act(action)
    }

    /// Side effect repeated `count` times with the iteration index.
    pub fn rep_act(&mut self, count: usize, action: impl Fn(&mut T, usize) + 'static) -> &mut Self {
        self.append(&Node::new_rep_act(count, Rc::new(action)));
        self
    }

    /// Always fails after performing `action`; the terminating arm of a
    /// one-of, typically used to report "none of the above".
    pub fn fail(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        self.append(&Node::new_fail(Rc::new(action)));
        self
    }

    /// Bind a fail-action to the most recently added first-class node
    /// (operator, assert, repeat, one-of, not-one-of). Silently ignored
    /// when there is none.
    pub fn on_fail(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        let target = self.state.borrow().last_added.clone();
        if let Some(target) = target {
            target.borrow_mut().fail_act = Some(Rc::new(action));
        }
        self
    }

    // ========================================================================
    // REFERENCES
    // ========================================================================

    /// Record the current host under `name` (case-insensitive) so other
    /// expressions can cite it with [`ref_to`](Self::ref_to).
    pub fn ref_name(&mut self, name: &str) -> &mut Self {
        self.state
            .borrow_mut()
            .registry
            .record(name, self.host.clone());
        self
    }

    /// Append a reference to the production recorded under `name`. The
    /// name may be recorded later; the link resolves at run time.
    pub fn ref_to(&mut self, name: &str) -> &mut Self {
        let cell = self.state.borrow_mut().registry.link(name);
        self.append(&Node::new_ref(name.to_lowercase(), cell));
        self
    }

    /// Append an optional recursion into the current host.
    pub fn opt_self(&mut self) -> &mut Self {
        let cell = Rc::new(RefCell::new(Some(Rc::downgrade(&self.host))));
        let opt = Node::new_opt();
        opt.borrow_mut()
            .children
            .push(Node::new_ref("<self>".into(), cell));
        self.append(&opt);
        self.note_composite(None);
        self
    }

    /// Splice previously constructed expressions in as children of the
    /// host.
    pub fn fex(&mut self, nodes: &[&FexNode<T>]) -> &mut Self {
        for node in nodes {
            self.append(&node.inner);
        }
        self
    }

    // ========================================================================
    // OPERATOR ATTACHMENTS
    // ========================================================================

    /// Deliver the most recent operator's committed value, downcast to
    /// `V`. Ignored when no operator precedes it or when a composite was
    /// appended in between.
    pub fn act_value<V: Any>(&mut self, handler: impl Fn(V) + 'static) -> &mut Self {
        let target = self.state.borrow().last_op.clone();
        let Some(target) = target else {
            log::debug!("act_value without a preceding operator is ignored");
            return self;
        };
        let wrapped: ValueActFn = Rc::new(move |boxed: Box<dyn Any>| match boxed.downcast::<V>() {
            Ok(v) => handler(*v),
            Err(_) => log::warn!("operator value does not match the act_value type"),
        });
        if let NodeKind::Op(data) = &mut target.borrow_mut().kind {
            data.value_act = Some(wrapped);
        }
        self
    }

    /// Set the shared pre-operator action attached to every operator.
    pub fn global_pre_op(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        let pre = self.state.borrow().global_pre_op.clone();
        pre.set_action(Some(Rc::new(action)));
        self
    }

    /// Clear the shared pre-operator action.
    pub fn clear_global_pre_op(&mut self) -> &mut Self {
        let pre = self.state.borrow().global_pre_op.clone();
        pre.set_action(None);
        self
    }

    /// Give the most recent operator its own pre-operator, detached from
    /// the shared one.
    pub fn pre_op(&mut self, action: impl Fn(&mut T) + 'static) -> &mut Self {
        let target = self.state.borrow().last_op.clone();
        if let Some(target) = target {
            if let NodeKind::Op(data) = &mut target.borrow_mut().kind {
                data.pre_op = Some(Rc::new(PreOp::with_action(Rc::new(action))));
            }
        }
        self
    }

    /// Point the shared pre-operator at the installed default-skip
    /// callback.
    pub fn global_skip(&mut self) -> &mut Self {
        let (pre, skip) = {
            let state = self.state.borrow();
            (state.global_pre_op.clone(), state.default_skip.clone())
        };
        match skip {
            Some(skip) => pre.set_action(Some(skip)),
            None => log::debug!("global_skip: no default skip callback installed"),
        }
        self
    }

    /// Give the most recent operator a fresh pre-operator running the
    /// installed default-skip callback.
    pub fn skip(&mut self) -> &mut Self {
        let (target, skip) = {
            let state = self.state.borrow();
            (state.last_op.clone(), state.default_skip.clone())
        };
        if let (Some(target), Some(skip)) = (target, skip) {
            if let NodeKind::Op(data) = &mut target.borrow_mut().kind {
                data.pre_op = Some(Rc::new(PreOp::with_action(skip)));
            }
        }
        self
    }

    // ========================================================================
    // TRACING
    // ========================================================================

    /// Append an action that sends a formatted message to the tracer.
    /// A no-op while tracing is disabled.
    pub fn trace(&mut self, fmt: impl Fn(&mut T) -> String + 'static, level: i32) -> &mut Self {
        let (tracer, on) = {
            let state = self.state.borrow();
            (state.tracer.clone(), state.tracing)
        };
        if on {
            let action: ActFn<T> = Rc::new(move |ctx| tracer.message(level, &fmt(ctx)));
            self.append(&Node::new_act(action, false));
        }
        self
    }

    /// Bind a pass/fail trace to the most recent operator.
    pub fn trace_op(&mut self, fmt: impl Fn(&mut T) -> String + 'static, level: i32) -> &mut Self {
        self.bind_trace(level, move |ctx, _slot| fmt(ctx))
    }

    /// Like [`trace_op`](Self::trace_op), with access to the operator's
    /// value slot.
    pub fn trace_op_with_value(
        &mut self,
        fmt: impl Fn(&mut T, &ValueSlot) -> String + 'static,
        level: i32,
    ) -> &mut Self {
        self.bind_trace(level, fmt)
    }

    /// Enable or disable *future* trace bindings.
    pub fn trace_on(&mut self, on: bool) -> &mut Self {
        self.state.borrow_mut().tracing = on;
        self
    }

    fn bind_trace(
        &mut self,
        level: i32,
        fmt: impl Fn(&mut T, &ValueSlot) -> String + 'static,
    ) -> &mut Self {
        let (target, tracer, on) = {
            let state = self.state.borrow();
            (state.last_op.clone(), state.tracer.clone(), state.tracing)
        };
        if !on {
            return self;
        }
        if let Some(target) = target {
            let trace: TraceActFn<T> =
                Rc::new(move |ctx, slot, passed| tracer.op_result(level, &fmt(ctx, slot), passed));
            if let NodeKind::Op(data) = &mut target.borrow_mut().kind {
                data.trace_act = Some(trace);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::fex::FlowExpression;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn on_fail_binds_to_repeat_not_trailing_sugar() {
        let failures = Rc::new(RefCell::new(0));
        let f = failures.clone();

        let fex: FlowExpression<Vec<char>> = FlowExpression::new();
        // Context: a stack of chars consumed from the back.
        let axiom = fex.seq(|s| {
            s.rep_n(2, |r| {
                r.op(|ctx: &mut Vec<char>| ctx.pop() == Some('x'));
            })
            .act(|_ctx| {})
            .on_fail(move |_ctx| *f.borrow_mut() += 1);
        });

        assert!(!axiom.run(&mut vec!['x']));
        assert_eq!(*failures.borrow(), 1);
    }

    #[test]
    fn act_value_after_composite_is_ignored() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();

        let fex: FlowExpression<Vec<char>> = FlowExpression::new();
        let axiom = fex.seq(|b| {
            b.op_val(|ctx: &mut Vec<char>, slot| {
                let c = ctx.pop();
                slot.set_opt(c.is_some(), c)
            })
            .seq(|_inner| {})
            .act_value::<char>(move |c| s.borrow_mut().push(c));
        });

        assert!(axiom.run(&mut vec!['a']));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn act_value_receives_the_committed_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();

        let fex: FlowExpression<Vec<char>> = FlowExpression::new();
        let axiom = fex.seq(|b| {
            b.op_val(|ctx: &mut Vec<char>, slot| {
                let c = ctx.pop();
                slot.set_opt(c.is_some(), c)
            })
            .act_value::<char>(move |c| s.borrow_mut().push(c));
        });

        assert!(axiom.run(&mut vec!['a']));
        assert_eq!(*seen.borrow(), vec!['a']);
    }
}
