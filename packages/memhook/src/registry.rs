//! The ordered set of hooks currently observing a heap.

use std::cell::RefCell;
use std::rc::Rc;

use crate::hook::HookState;

/// Ordered list of the hooks registered with one heap.
///
/// Hooks observe in strict stack discipline: the most recently registered hook
/// must always be the first to deregister. Violating that, or exceeding the
/// configured capacity, is a usage defect and panics rather than being
/// reported as a recoverable error.
#[derive(Debug)]
pub(crate) struct HookRegistry {
    hooks: Vec<Rc<RefCell<HookState>>>,
    max_hooks: usize,
}

impl HookRegistry {
    pub(crate) fn new(max_hooks: usize) -> Self {
        Self {
            hooks: Vec::new(),
            max_hooks,
        }
    }

    /// Appends a hook to the end of the active list.
    ///
    /// # Panics
    ///
    /// Panics if the configured hook capacity is already reached.
    pub(crate) fn push(&mut self, hook: Rc<RefCell<HookState>>) {
        assert!(
            self.hooks.len() < self.max_hooks,
            "too many live hooks: the heap was configured for at most {} simultaneously \
             active hooks",
            self.max_hooks,
        );

        self.hooks.push(hook);
    }

    /// Removes a hook from the active list.
    ///
    /// # Panics
    ///
    /// Panics if `hook` is not the most recently registered entry. Hooks are
    /// scoped objects and must be dropped in reverse registration order.
    pub(crate) fn pop(&mut self, hook: &Rc<RefCell<HookState>>) {
        let last_matches = self
            .hooks
            .last()
            .is_some_and(|last| Rc::ptr_eq(last, hook));

        assert!(
            last_matches,
            "hook dropped out of order: hooks must be dropped in reverse registration \
             (LIFO) order",
        );

        self.hooks.pop();
    }

    /// The active hooks in registration order.
    ///
    /// Returns owned references so the caller can mutate heap state while
    /// delivering notifications.
    pub(crate) fn active(&self) -> Vec<Rc<RefCell<HookState>>> {
        self.hooks.iter().map(Rc::clone).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook() -> Rc<RefCell<HookState>> {
        Rc::new(RefCell::new(HookState::new(0)))
    }

    #[test]
    fn push_and_pop_in_lifo_order() {
        let mut registry = HookRegistry::new(4);
        let first = hook();
        let second = hook();

        registry.push(Rc::clone(&first));
        registry.push(Rc::clone(&second));
        assert_eq!(registry.len(), 2);

        registry.pop(&second);
        registry.pop(&first);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn pop_out_of_order_panics() {
        let mut registry = HookRegistry::new(4);
        let first = hook();
        let second = hook();

        registry.push(Rc::clone(&first));
        registry.push(Rc::clone(&second));

        registry.pop(&first);
    }

    #[test]
    #[should_panic(expected = "too many live hooks")]
    fn push_over_capacity_panics() {
        let mut registry = HookRegistry::new(1);

        registry.push(hook());
        registry.push(hook());
    }

    #[test]
    fn active_preserves_registration_order() {
        let mut registry = HookRegistry::new(4);
        let first = hook();
        let second = hook();

        registry.push(Rc::clone(&first));
        registry.push(Rc::clone(&second));

        let active = registry.active();
        assert_eq!(active.len(), 2);
        assert!(Rc::ptr_eq(active.first().expect("two entries"), &first));
        assert!(Rc::ptr_eq(active.last().expect("two entries"), &second));
    }
}
