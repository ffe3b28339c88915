use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use crate::{
    broker::VisibilityBroker,
    cleanup::CleanupRegistry,
    config::{ConfigWarning, LazyHydrateConfig},
    env::{Environment, Fire},
    trigger::{Arming, TriggerSet},
};

/// Whether the subtree behind a gate is still inert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Dehydrated,
    Hydrated,
}

struct GateInner<E: Environment> {
    env: E,
    root: Option<E::Node>,
    status: Cell<Status>,
    mounted: Cell<bool>,
    unmounted: Cell<bool>,
    armed: Cell<bool>,
    warning: Cell<Option<ConfigWarning>>,
    cleanup: CleanupRegistry,
    did_hydrate: RefCell<Option<Rc<dyn Fn()>>>,
    subscriber: RefCell<Option<Box<dyn FnOnce(Status)>>>,
}

/// The per-subtree hydration state machine.
///
/// A gate starts out [`Dehydrated`](Status::Dehydrated) in an
/// interactive environment and [`Hydrated`](Status::Hydrated) anywhere
/// else, as server rendering produces the final markup directly.  The
/// status changes at most once, from dehydrated to hydrated.
///
/// Upon [`mount`](Self::mount), the configured triggers are armed.
/// Whichever of them fires first calls [`activate`](Self::activate),
/// which flips the status, synchronously tears down every other
/// trigger, and then notifies the rendering layer.  Triggers only hold
/// a weak reference to the gate, and every one of them re-checks the
/// status when invoked, so a trigger that was already in flight when
/// the gate hydrated (or was unmounted) has no effect.
///
/// Dropping the gate runs the same teardown as [`unmount`](Self::unmount).
pub struct HydrationGate<E: Environment> {
    inner: Rc<GateInner<E>>,
}

impl<E: Environment> GateInner<E> {
    fn activate(&self) {
        if self.status.get() == Status::Hydrated || self.unmounted.get() {
            return;
        }
        self.status.set(Status::Hydrated);
        self.armed.set(false);
        self.cleanup.run();

        // Both slots are emptied before invocation so the callbacks may
        // safely call back into the gate.
        let did_hydrate = self.did_hydrate.borrow_mut().take();
        if let Some(did_hydrate) = did_hydrate {
            did_hydrate();
        }
        let subscriber = self.subscriber.borrow_mut().take();
        if let Some(subscriber) = subscriber {
            subscriber(Status::Hydrated);
        }
    }
}

impl<E: Environment> Drop for GateInner<E> {
    fn drop(&mut self) {
        self.cleanup.run();
    }
}

impl<E: Environment> HydrationGate<E> {
    /// Create the gate for the subtree under `root`.
    ///
    /// `root` is `None` when the subtree has no container node at all,
    /// which is treated the same as a container without any content.
    pub fn new(env: E, root: Option<E::Node>) -> Self {
        let status = if env.is_interactive() {
            Status::Dehydrated
        } else {
            Status::Hydrated
        };
        Self {
            inner: Rc::new(GateInner {
                env,
                root,
                status: Cell::new(status),
                mounted: Cell::new(false),
                unmounted: Cell::new(false),
                armed: Cell::new(false),
                warning: Cell::new(None),
                cleanup: CleanupRegistry::new(),
                did_hydrate: RefCell::new(None),
                subscriber: RefCell::new(None),
            }),
        }
    }

    /// Set the single subscriber notified, synchronously and exactly
    /// once, when the gate transitions to hydrated.  A gate that starts
    /// out hydrated never transitions and never notifies.
    pub fn on_hydrate(&self, subscriber: impl FnOnce(Status) + 'static) {
        *self.inner.subscriber.borrow_mut() = Some(Box::new(subscriber));
    }

    /// Mount the gate and arm the configured triggers.
    ///
    /// A subtree without any content hydrates right away with nothing
    /// armed.  Only the first call has any effect.
    pub fn mount(&self, config: LazyHydrateConfig<E>, broker: &VisibilityBroker<E>) {
        let inner = &self.inner;
        if inner.mounted.replace(true) || inner.unmounted.get() {
            return;
        }
        if inner.status.get() == Status::Hydrated {
            return;
        }

        let root = match &inner.root {
            Some(root) if inner.env.has_child_nodes(root) => root.clone(),
            _ => {
                inner.activate();
                return;
            }
        };

        if let Some(warning) = config.warning() {
            leptos::logging::warn!("{warning}");
            inner.warning.set(Some(warning));
        }
        if config.ssr_only {
            return;
        }

        *inner.did_hydrate.borrow_mut() = config.did_hydrate.clone();
        let triggers = TriggerSet::from_config(config);
        if triggers.is_empty() {
            return;
        }

        inner.armed.set(true);
        let fire = self.activator();
        let cx = Arming {
            env: &inner.env,
            root: &root,
            broker,
            cleanup: &inner.cleanup,
            fire: &fire,
        };
        triggers.arm(&cx, || inner.status.get() == Status::Dehydrated);
    }

    /// Hydrate the subtree.  Idempotent, and a no-op once unmounted.
    pub fn activate(&self) {
        self.inner.activate();
    }

    /// A callback that activates this gate for as long as it exists.
    pub fn activator(&self) -> Fire {
        let gate: Weak<GateInner<E>> = Rc::downgrade(&self.inner);
        Rc::new(move || {
            if let Some(gate) = gate.upgrade() {
                gate.activate();
            }
        })
    }

    /// Release everything acquired while dehydrated, whatever the
    /// status.  Nothing fires on this gate afterwards.
    pub fn unmount(&self) {
        self.inner.unmounted.set(true);
        self.inner.armed.set(false);
        self.inner.cleanup.run();
    }

    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    pub fn is_hydrated(&self) -> bool {
        self.status() == Status::Hydrated
    }

    /// Whether triggers are armed and waiting.
    pub fn is_armed(&self) -> bool {
        self.inner.armed.get()
    }

    /// The configuration diagnostic emitted on mount, if any.
    pub fn warning(&self) -> Option<ConfigWarning> {
        self.inner.warning.get()
    }

    /// Number of teardown actions still registered.
    pub fn pending_teardowns(&self) -> usize {
        self.inner.cleanup.len()
    }

    pub fn root(&self) -> Option<&E::Node> {
        self.inner.root.as_ref()
    }
}

impl<E: Environment> fmt::Debug for HydrationGate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationGate")
            .field("status", &self.status())
            .field("armed", &self.is_armed())
            .field("root", &self.inner.root)
            .field("cleanup", &self.inner.cleanup)
            .finish()
    }
}
