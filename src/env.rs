//! The capabilities a [`HydrationGate`](crate::HydrationGate) needs from
//! its host environment.
//!
//! The gate never talks to the DOM directly; everything it does goes
//! through an [`Environment`].  Under the `hydrate` feature the crate
//! provides [`BrowserEnv`](crate::browser::BrowserEnv), backed by
//! `web-sys`; tests and other hosts may provide their own.

use std::{fmt, rc::Rc, time::Duration};

use futures::future::LocalBoxFuture;

use crate::{cleanup::Teardown, config::ObserverOptions};

/// A callback scheduled with the environment, invoked with no arguments.
pub type Fire = Rc<dyn Fn()>;

/// Options applied to an event listener registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub once: bool,
    pub capture: bool,
    pub passive: bool,
}

impl ListenerOptions {
    /// The options used for every listener armed by a trigger: the
    /// listener removes itself after the first delivery, runs in the
    /// capture phase and never blocks scrolling.
    pub const fn hydration() -> Self {
        Self {
            once: true,
            capture: true,
            passive: true,
        }
    }
}

/// A single intersection record delivered by an intersection observer.
#[derive(Clone, Debug)]
pub struct IntersectionEntry<N> {
    pub target: N,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

impl<N> IntersectionEntry<N> {
    /// Whether this entry should count as the target becoming visible.
    pub fn is_visible(&self) -> bool {
        self.is_intersecting || self.intersection_ratio > 0.0
    }
}

/// Something that can start and stop tracking the visibility of nodes.
///
/// Implemented by the intersection observers an [`Environment`]
/// creates, and usable directly as a caller-supplied observer through
/// [`LazyHydrateConfig::with_observer`](crate::LazyHydrateConfig::with_observer).
pub trait Observe<N> {
    fn observe(&self, node: &N);
    fn unobserve(&self, node: &N);
}

/// The host environment of the gate.
///
/// Implementations are expected to be cheap handles; they are cloned
/// into the teardown actions they hand out.  All callbacks are invoked
/// later by the environment's own queue, never synchronously inside the
/// registering call.
pub trait Environment: Clone + 'static {
    /// An element node.
    type Node: Clone + PartialEq + fmt::Debug + 'static;
    /// Anything events can be listened for on; every node is one.
    type Target: Clone + From<Self::Node> + 'static;

    /// Whether this is an interactive client environment with a DOM.
    fn is_interactive(&self) -> bool;

    fn has_child_nodes(&self, node: &Self::Node) -> bool;

    fn first_element_child(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Request `callback` to run when the host is idle, no later than
    /// `timeout`.  Returns `None` if idle scheduling is not available.
    fn request_idle_callback(&self, timeout: Duration, callback: Fire) -> Option<Teardown>;

    fn set_timeout(&self, delay: Duration, callback: Fire) -> Teardown;

    fn add_event_listener(
        &self,
        target: &Self::Target,
        event: &str,
        options: ListenerOptions,
        callback: Fire,
    ) -> Teardown;

    /// Dispatch a synthetic, non-bubbling event named `event` on `node`.
    fn dispatch_event(&self, node: &Self::Node, event: &str);

    /// Create an intersection observer reporting every entry to
    /// `on_entry`.  Returns `None` if intersection tracking is not
    /// available.
    fn create_intersection_observer(
        &self,
        options: &ObserverOptions,
        on_entry: Rc<dyn Fn(IntersectionEntry<Self::Node>)>,
    ) -> Option<Rc<dyn Observe<Self::Node>>>;

    /// Queue a future on the local, single-threaded task queue.
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);
}
