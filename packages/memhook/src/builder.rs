use crate::Heap;

/// The hook capacity of a heap built without explicit configuration.
pub const DEFAULT_MAX_HOOKS: usize = 64;

/// Builder for creating an instance of [`Heap`].
///
/// All settings are optional; [`build`][Self::build] with no configuration is
/// equivalent to [`Heap::new`].
///
/// # Examples
///
/// ```
/// use memhook::Heap;
///
/// let heap = Heap::builder().max_hooks(8).build();
/// let _hook = heap.hook();
/// ```
#[derive(Debug)]
#[must_use]
pub struct HeapBuilder {
    max_hooks: usize,
}

impl HeapBuilder {
    pub(crate) fn new() -> Self {
        Self {
            max_hooks: DEFAULT_MAX_HOOKS,
        }
    }

    /// Sets the maximum number of simultaneously registered hooks.
    ///
    /// Registering a hook beyond this bound is a fatal configuration error:
    /// the registration panics rather than degrading tracking silently.
    ///
    /// # Panics
    ///
    /// Panics if `max_hooks` is zero; a heap that cannot accept any hook has
    /// no reason to exist.
    pub fn max_hooks(mut self, max_hooks: usize) -> Self {
        assert!(max_hooks > 0, "a heap must allow at least one hook");
        self.max_hooks = max_hooks;
        self
    }

    /// Builds the heap with the specified configuration.
    #[must_use]
    pub fn build(self) -> Heap {
        Heap::with_max_hooks(self.max_hooks)
    }
}
