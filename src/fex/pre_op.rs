//! Deferred one-shot action attached to operators.
//!
//! A pre-operator runs lazily just before an operator's predicate and at
//! most once until it is re-armed. Operators re-arm it when they commit,
//! so between two committing operators the action fires exactly once no
//! matter how many candidate operators were probed and declined in between.
//! The canonical use is skipping whitespace and comments ahead of every
//! decision point.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub(crate) type ActFn<T> = Rc<dyn Fn(&mut T)>;

pub struct PreOp<T> {
    action: RefCell<Option<ActFn<T>>>,
    armed: Cell<bool>,
}

impl<T> PreOp<T> {
    pub(crate) fn new() -> Self {
        PreOp {
            action: RefCell::new(None),
            armed: Cell::new(true),
        }
    }

    pub(crate) fn with_action(action: ActFn<T>) -> Self {
        PreOp {
            action: RefCell::new(Some(action)),
            armed: Cell::new(true),
        }
    }

    /// Replace (or clear) the action. Operators sharing this pre-op see
    /// the change immediately.
    pub(crate) fn set_action(&self, action: Option<ActFn<T>>) {
        *self.action.borrow_mut() = action;
    }

    /// Execute the action unless it already ran since the last reset.
    pub fn run(&self, ctx: &mut T) {
        if !self.armed.get() {
            return;
        }
        self.armed.set(false);
        let action = self.action.borrow().clone();
        if let Some(action) = action {
            action(ctx);
        }
    }

    /// Re-arm the action so it runs again before the next operator.
    pub fn reset(&self) {
        self.armed.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    #[test]
    fn runs_once_until_reset() {
        let count = Rc::new(StdCell::new(0));
        let c = count.clone();
        let pre: PreOp<()> = PreOp::with_action(Rc::new(move |_| c.set(c.get() + 1)));

        pre.run(&mut ());
        pre.run(&mut ());
        assert_eq!(count.get(), 1);

        pre.reset();
        pre.run(&mut ());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn empty_action_is_a_no_op() {
        let pre: PreOp<u32> = PreOp::new();
        let mut ctx = 0_u32;
        pre.run(&mut ctx);
        pre.reset();
        pre.run(&mut ctx);
        assert_eq!(ctx, 0);
    }

    #[test]
    fn action_can_be_swapped_while_shared() {
        let hits = Rc::new(StdCell::new(0));
        let pre: PreOp<()> = PreOp::new();

        pre.run(&mut ());
        pre.reset();

        let h = hits.clone();
        pre.set_action(Some(Rc::new(move |_| h.set(h.get() + 1))));
        pre.run(&mut ());
        assert_eq!(hits.get(), 1);
    }
}
