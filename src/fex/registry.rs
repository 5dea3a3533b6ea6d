//! Forward-reference registry.
//!
//! Productions are recorded under a case-folded name; references link to a
//! shared cell that is filled in whenever the name is (re)recorded. A link
//! placed before the name is defined resolves correctly at run time, which
//! is what makes mutually recursive grammars buildable in one pass.
//!
//! The registry keeps a strong handle to every recorded production so a
//! production referenced only by name stays alive for as long as the
//! factory does. The cells themselves hold weak handles, keeping the
//! reference graph free of ownership cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::node::{NodeRef, NodeWeak};

/// Shared cell a named reference indirects through. Empty until the name
/// is recorded; rebound in place on redefinition.
pub(crate) type RefSlot<T> = Rc<RefCell<Option<NodeWeak<T>>>>;

pub(crate) struct RefRegistry<T> {
    cells: HashMap<String, RefSlot<T>>,
    productions: HashMap<String, NodeRef<T>>,
}

impl<T> RefRegistry<T> {
    pub(crate) fn new() -> Self {
        RefRegistry {
            cells: HashMap::new(),
            productions: HashMap::new(),
        }
    }

    /// Bind `name` to `node`. A second record under the same name rebinds
    /// the cell; links already placed in a tree observe the new binding.
    pub(crate) fn record(&mut self, name: &str, node: NodeRef<T>) {
        let key = name.to_lowercase();
        let cell = self
            .cells
            .entry(key.clone())
            .or_insert_with(|| Rc::new(RefCell::new(None)));
        *cell.borrow_mut() = Some(Rc::downgrade(&node));
        self.productions.insert(key, node);
    }

    /// Fetch (creating if absent) the shared cell for `name`.
    pub(crate) fn link(&mut self, name: &str) -> RefSlot<T> {
        self.cells
            .entry(name.to_lowercase())
            .or_insert_with(|| Rc::new(RefCell::new(None)))
            .clone()
    }
}
