use std::cell::{Cell, RefCell};
use std::fmt;

/// A deregistration action: cancel a timer or idle request, stop
/// observing an element, remove an event listener.
pub type Teardown = Box<dyn FnOnce()>;

/// Ordered teardown actions owned by a [`HydrationGate`](
/// crate::HydrationGate).
///
/// Actions are run back-to-front, each exactly once.  Running the
/// registry drains it and closes it; any action pushed after that is
/// executed on the spot, so a trigger that manages to register itself
/// after the gate has already transitioned never outlives the gate.
#[derive(Default)]
pub struct CleanupRegistry {
    actions: RefCell<Vec<Teardown>>,
    drained: Cell<bool>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teardown action.
    pub fn push(&self, action: impl FnOnce() + 'static) {
        if self.drained.get() {
            action();
        } else {
            self.actions.borrow_mut().push(Box::new(action));
        }
    }

    /// Run every registered action.  A second run is a no-op.
    ///
    /// The internal borrow is released before each action is invoked,
    /// so actions may freely push into (and thus run immediately
    /// against) this registry.
    pub fn run(&self) {
        self.drained.set(true);
        loop {
            let next = self.actions.borrow_mut().pop();
            match next {
                Some(action) => action(),
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.borrow().is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.drained.get()
    }
}

impl fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending", &self.len())
            .field("drained", &self.drained.get())
            .finish()
    }
}
