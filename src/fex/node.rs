//! The expression-tree node model and its execution semantics.
//!
//! Every node supports two execution modes:
//!
//! 1. `run`: execute outright; a hard failure may fire the node's bound
//!    fail-action.
//! 2. `check_run`: lookahead execution returning a three-valued
//!    [`CheckResult`], which lets containers tell "this alternative
//!    declined on its first step" apart from "this alternative committed
//!    and then broke".
//!
//! The three-valued discipline is what drives alternative selection:
//! `OneOf` probes each arm with `check_run` and only treats a first-step
//! decline as "try the next arm"; any failure after the first committing
//! step is final and propagates without consulting further arms.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::pre_op::{ActFn, PreOp};
use super::registry::RefSlot;
use super::value::ValueSlot;

pub(crate) type OpFn<T> = Rc<dyn Fn(&mut T, &mut ValueSlot) -> bool>;
pub(crate) type ValueActFn = Rc<dyn Fn(Box<dyn Any>)>;
pub(crate) type RepActFn<T> = Rc<dyn Fn(&mut T, usize)>;
pub(crate) type TraceActFn<T> = Rc<dyn Fn(&mut T, &ValueSlot, bool)>;

pub(crate) type NodeRef<T> = Rc<RefCell<Node<T>>>;
pub(crate) type NodeWeak<T> = Weak<RefCell<Node<T>>>;

/// Outcome of a lookahead (`check_run`) execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckResult {
    /// The node succeeded end to end.
    Passed,
    /// The first meaningful step declined; the enclosing container may
    /// treat this as "not this alternative" without raising an error.
    FailFirst,
    /// A committing step passed but a later step failed. Hard failure;
    /// propagates all the way up.
    FailRemainder,
}

/// Repetition bounds, normalized at construction.
///
/// `min` is clamped to zero; a negative `max` means unbounded. A bounded
/// `max` is kept as the number of repetitions allowed beyond `min`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RepBounds {
    pub(crate) min: usize,
    pub(crate) max_extra: usize,
    pub(crate) unbounded: bool,
}

impl RepBounds {
    pub(crate) fn new(min: i32, max: i32) -> Self {
        let min = min.max(0) as usize;
        if max < 0 {
            RepBounds {
                min,
                max_extra: 0,
                unbounded: true,
            }
        } else {
            RepBounds {
                min,
                max_extra: (max.max(0) as usize).saturating_sub(min),
                unbounded: false,
            }
        }
    }
}

/// Leaf operator payload: predicate plus its optional attachments.
pub(crate) struct OpData<T> {
    pub(crate) pred: OpFn<T>,
    pub(crate) pre_op: Option<Rc<PreOp<T>>>,
    pub(crate) value_act: Option<ValueActFn>,
    pub(crate) trace_act: Option<TraceActFn<T>>,
    /// Hard condition: failure is `FailRemainder` and the fail-action
    /// fires in both execution modes.
    pub(crate) hard: bool,
}

impl<T> Clone for OpData<T> {
    fn clone(&self) -> Self {
        OpData {
            pred: self.pred.clone(),
            pre_op: self.pre_op.clone(),
            value_act: self.value_act.clone(),
            trace_act: self.trace_act.clone(),
            hard: self.hard,
        }
    }
}

pub(crate) enum NodeKind<T> {
    Seq,
    Opt,
    OneOf,
    NotOneOf,
    Rep(RepBounds),
    Op(OpData<T>),
    Act {
        action: ActFn<T>,
        /// A committing ("default") action reports `Passed` from
        /// lookahead and thereby commits its enclosing sequence.
        committing: bool,
    },
    RepAct {
        count: usize,
        action: RepActFn<T>,
    },
    Fail {
        action: ActFn<T>,
    },
    Ref {
        name: String,
        cell: RefSlot<T>,
    },
}

impl<T> Clone for NodeKind<T> {
    fn clone(&self) -> Self {
        match self {
            NodeKind::Seq => NodeKind::Seq,
            NodeKind::Opt => NodeKind::Opt,
            NodeKind::OneOf => NodeKind::OneOf,
            NodeKind::NotOneOf => NodeKind::NotOneOf,
            NodeKind::Rep(b) => NodeKind::Rep(*b),
            NodeKind::Op(op) => NodeKind::Op(op.clone()),
            NodeKind::Act { action, committing } => NodeKind::Act {
                action: action.clone(),
                committing: *committing,
            },
            NodeKind::RepAct { count, action } => NodeKind::RepAct {
                count: *count,
                action: action.clone(),
            },
            NodeKind::Fail { action } => NodeKind::Fail {
                action: action.clone(),
            },
            NodeKind::Ref { name, cell } => NodeKind::Ref {
                name: name.clone(),
                cell: cell.clone(),
            },
        }
    }
}

pub(crate) struct Node<T> {
    pub(crate) kind: NodeKind<T>,
    pub(crate) children: Vec<NodeRef<T>>,
    pub(crate) fail_act: Option<ActFn<T>>,
    pub(crate) optional: bool,
}

// Shallow clone: children and callbacks are shared handles. Execution
// clones the node out of its cell first so recursion (self-references,
// named refs back into an ancestor) never re-borrows a live cell.
impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Node {
            kind: self.kind.clone(),
            children: self.children.clone(),
            fail_act: self.fail_act.clone(),
            optional: self.optional,
        }
    }
}

impl<T> Node<T> {
    fn new(kind: NodeKind<T>, optional: bool) -> NodeRef<T> {
        Rc::new(RefCell::new(Node {
            kind,
            children: Vec::new(),
            fail_act: None,
            optional,
        }))
    }

    pub(crate) fn new_seq() -> NodeRef<T> {
        Node::new(NodeKind::Seq, false)
    }

    pub(crate) fn new_opt() -> NodeRef<T> {
        Node::new(NodeKind::Opt, true)
    }

    pub(crate) fn new_one_of() -> NodeRef<T> {
        Node::new(NodeKind::OneOf, false)
    }

    pub(crate) fn new_not_one_of() -> NodeRef<T> {
        Node::new(NodeKind::NotOneOf, false)
    }

    pub(crate) fn new_rep(min: i32, max: i32) -> NodeRef<T> {
        let bounds = RepBounds::new(min, max);
        let optional = bounds.min == 0;
        Node::new(NodeKind::Rep(bounds), optional)
    }

    pub(crate) fn new_op(data: OpData<T>) -> NodeRef<T> {
        Node::new(NodeKind::Op(data), false)
    }

    pub(crate) fn new_act(action: ActFn<T>, committing: bool) -> NodeRef<T> {
        Node::new(NodeKind::Act { action, committing }, true)
    }

    pub(crate) fn new_rep_act(count: usize, action: RepActFn<T>) -> NodeRef<T> {
        Node::new(NodeKind::RepAct { count, action }, true)
    }

    pub(crate) fn new_fail(action: ActFn<T>) -> NodeRef<T> {
        Node::new(NodeKind::Fail { action }, false)
    }

    pub(crate) fn new_ref(name: String, cell: RefSlot<T>) -> NodeRef<T> {
        Node::new(NodeKind::Ref { name, cell }, false)
    }
}

fn fire_fail<T>(fail_act: &Option<ActFn<T>>, ctx: &mut T) {
    if let Some(act) = fail_act {
        act(ctx);
    }
}

fn resolve<T>(cell: &RefSlot<T>) -> Option<NodeRef<T>> {
    cell.borrow().as_ref().and_then(|weak| weak.upgrade())
}

/// Whether a sequence lookahead may skip this node after a first-step
/// decline. Named references take their answer from the target.
pub(crate) fn is_optional<T>(node: &NodeRef<T>) -> bool {
    let target = {
        let n = node.borrow();
        match &n.kind {
            NodeKind::Ref { cell, .. } => resolve(cell),
            _ => return n.optional,
        }
    };
    match target {
        Some(t) => is_optional(&t),
        None => false,
    }
}

pub(crate) fn run_node<T>(node: &NodeRef<T>, ctx: &mut T) -> bool {
    let n = node.borrow().clone();
    match n.kind {
        NodeKind::Seq => run_children(&n.children, ctx),
        NodeKind::Opt => check_children(&n.children, ctx) != CheckResult::FailRemainder,
        NodeKind::OneOf => run_one_of(&n.children, &n.fail_act, ctx),
        NodeKind::NotOneOf => run_not_one_of(&n.children, &n.fail_act, ctx),
        NodeKind::Rep(bounds) => {
            rep_phases(bounds.min, bounds.max_extra, bounds.unbounded, &n.children, &n.fail_act, ctx)
        }
        NodeKind::Op(op) => run_op(&op, &n.fail_act, ctx, false) == CheckResult::Passed,
        NodeKind::Act { action, .. } => {
            action(ctx);
            true
        }
        NodeKind::RepAct { count, action } => {
            for i in 0..count {
                action(ctx, i);
            }
            true
        }
        NodeKind::Fail { action } => {
            action(ctx);
            false
        }
        NodeKind::Ref { name, cell } => match resolve(&cell) {
            Some(target) => run_node(&target, ctx),
            None => {
                log::warn!("flow reference '{}' is unbound", name);
                false
            }
        },
    }
}

pub(crate) fn check_node<T>(node: &NodeRef<T>, ctx: &mut T) -> CheckResult {
    let n = node.borrow().clone();
    match n.kind {
        NodeKind::Seq | NodeKind::Opt => check_children(&n.children, ctx),
        NodeKind::OneOf => check_one_of(&n.children, ctx),
        NodeKind::NotOneOf => check_not_one_of(&n.children, ctx),
        NodeKind::Rep(bounds) => check_rep(bounds, &n.children, &n.fail_act, ctx),
        NodeKind::Op(op) => run_op(&op, &n.fail_act, ctx, true),
        NodeKind::Act { action, committing } => {
            action(ctx);
            if committing {
                CheckResult::Passed
            } else {
                CheckResult::FailFirst
            }
        }
        NodeKind::RepAct { count, action } => {
            for i in 0..count {
                action(ctx, i);
            }
            CheckResult::FailFirst
        }
        NodeKind::Fail { action } => {
            action(ctx);
            CheckResult::FailRemainder
        }
        NodeKind::Ref { name, cell } => match resolve(&cell) {
            Some(target) => check_node(&target, ctx),
            None => {
                log::warn!("flow reference '{}' is unbound", name);
                CheckResult::FailFirst
            }
        },
    }
}

/// Plain in-order execution of a child list: stop at the first failure.
fn run_children<T>(children: &[NodeRef<T>], ctx: &mut T) -> bool {
    for child in children {
        if !run_node(child, ctx) {
            return false;
        }
    }
    true
}

/// Lookahead execution of a child list with commit tracking.
///
/// Children that decline on their first step are skipped while marked
/// optional; the first child to pass commits the list, after which every
/// remaining child must succeed outright. A list that runs out of
/// children without any commit declines as a whole.
fn check_children<T>(children: &[NodeRef<T>], ctx: &mut T) -> CheckResult {
    let mut idx = 0;
    let mut committed = false;
    while idx < children.len() {
        let child = &children[idx];
        match check_node(child, ctx) {
            CheckResult::Passed => {
                committed = true;
                idx += 1;
                break;
            }
            CheckResult::FailFirst => {
                if !is_optional(child) {
                    return CheckResult::FailFirst;
                }
                idx += 1;
            }
            CheckResult::FailRemainder => return CheckResult::FailRemainder,
        }
    }
    if !committed {
        return CheckResult::FailFirst;
    }
    for child in &children[idx..] {
        if !run_node(child, ctx) {
            return CheckResult::FailRemainder;
        }
    }
    CheckResult::Passed
}

fn run_one_of<T>(alts: &[NodeRef<T>], fail_act: &Option<ActFn<T>>, ctx: &mut T) -> bool {
    for alt in alts {
        match check_node(alt, ctx) {
            CheckResult::Passed => return true,
            // Commit-then-break is fatal; later alternatives are not
            // consulted and the inner fail-action already reported it.
            CheckResult::FailRemainder => return false,
            CheckResult::FailFirst => {}
        }
    }
    fire_fail(fail_act, ctx);
    false
}

fn check_one_of<T>(alts: &[NodeRef<T>], ctx: &mut T) -> CheckResult {
    for alt in alts {
        match check_node(alt, ctx) {
            CheckResult::Passed => return CheckResult::Passed,
            CheckResult::FailRemainder => return CheckResult::FailRemainder,
            CheckResult::FailFirst => {}
        }
    }
    CheckResult::FailFirst
}

fn run_not_one_of<T>(alts: &[NodeRef<T>], fail_act: &Option<ActFn<T>>, ctx: &mut T) -> bool {
    for alt in alts {
        match check_node(alt, ctx) {
            CheckResult::Passed => {
                fire_fail(fail_act, ctx);
                return false;
            }
            CheckResult::FailRemainder => return false,
            CheckResult::FailFirst => {}
        }
    }
    true
}

fn check_not_one_of<T>(alts: &[NodeRef<T>], ctx: &mut T) -> CheckResult {
    for alt in alts {
        match check_node(alt, ctx) {
            CheckResult::Passed => return CheckResult::FailFirst,
            CheckResult::FailRemainder => return CheckResult::FailRemainder,
            CheckResult::FailFirst => {}
        }
    }
    CheckResult::Passed
}

/// Mandatory-then-tail repetition. The mandatory phase runs the body
/// `min` times outright; the tail probes with lookahead and stops at the
/// first clean decline.
fn rep_phases<T>(
    min: usize,
    max_extra: usize,
    unbounded: bool,
    children: &[NodeRef<T>],
    fail_act: &Option<ActFn<T>>,
    ctx: &mut T,
) -> bool {
    for _ in 0..min {
        if !run_children(children, ctx) {
            fire_fail(fail_act, ctx);
            return false;
        }
    }
    let mut extra = 0;
    while unbounded || extra < max_extra {
        match check_children(children, ctx) {
            CheckResult::Passed => extra += 1,
            CheckResult::FailFirst => break,
            CheckResult::FailRemainder => {
                fire_fail(fail_act, ctx);
                return false;
            }
        }
    }
    true
}

fn check_rep<T>(
    bounds: RepBounds,
    children: &[NodeRef<T>],
    fail_act: &Option<ActFn<T>>,
    ctx: &mut T,
) -> CheckResult {
    if bounds.min == 0 && !bounds.unbounded && bounds.max_extra == 0 {
        return CheckResult::FailFirst;
    }
    // Probe the first repetition so an enclosing container can still
    // treat a clean decline as "not this alternative".
    match check_children(children, ctx) {
        CheckResult::FailFirst => return CheckResult::FailFirst,
        CheckResult::FailRemainder => return CheckResult::FailRemainder,
        CheckResult::Passed => {}
    }
    let ok = rep_phases(
        bounds.min.saturating_sub(1),
        bounds.max_extra.saturating_sub(1),
        bounds.unbounded,
        children,
        fail_act,
        ctx,
    );
    if ok {
        CheckResult::Passed
    } else {
        CheckResult::FailRemainder
    }
}

/// Leaf operator execution: pre-op, fresh value slot, predicate, trace,
/// then commit bookkeeping. `check` suppresses the fail-action on a soft
/// decline; hard (assert-style) operators fire it in both modes.
fn run_op<T>(op: &OpData<T>, fail_act: &Option<ActFn<T>>, ctx: &mut T, check: bool) -> CheckResult {
    if let Some(pre) = &op.pre_op {
        pre.run(ctx);
    }
    let mut slot = ValueSlot::new();
    let passed = (op.pred)(ctx, &mut slot);
    if let Some(trace) = &op.trace_act {
        trace(ctx, &slot, passed);
    }
    if passed {
        if let Some(pre) = &op.pre_op {
            pre.reset();
        }
        if let Some(value_act) = &op.value_act {
            if let Some(value) = slot.take_any() {
                value_act(value);
            }
        }
        CheckResult::Passed
    } else if op.hard {
        fire_fail(fail_act, ctx);
        CheckResult::FailRemainder
    } else {
        if !check {
            fire_fail(fail_act, ctx);
        }
        CheckResult::FailFirst
    }
}
