//! The shared visibility broker.
//!
//! Intersection observers are comparatively expensive, so rather than
//! creating one per subtree, every gate goes through a single
//! [`VisibilityBroker`] which lazily creates one observer per distinct
//! set of [`ObserverOptions`] and keeps it for the rest of its life.
//!
//! The broker never calls into a gate.  When an observed node becomes
//! visible it dispatches [`HYDRATE_EVENT`] on that node, and the gate
//! that asked for the observation picks it up through an ordinary
//! capturing listener on its root, the same path any other trigger
//! event takes.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    config::ObserverOptions,
    env::{Environment, IntersectionEntry, Observe},
};

/// Name of the synthetic event dispatched on a node once it is visible.
pub const HYDRATE_EVENT: &str = "hydrate";

/// Dispatch [`HYDRATE_EVENT`] on `node`.
///
/// Caller-supplied observers should call this for visible entries, as
/// the broker does.
pub fn dispatch_hydrate<E: Environment>(env: &E, node: &E::Node) {
    env.dispatch_event(node, HYDRATE_EVENT);
}

type SharedObserver<N> = Option<Rc<dyn Observe<N>>>;

struct Registration<N> {
    node: N,
    options: ObserverOptions,
    count: usize,
}

struct BrokerInner<E: Environment> {
    env: E,
    // `None` records that the environment has no intersection tracking
    // for those options, so the attempt is never repeated.  Entries are
    // never removed.
    observers: RefCell<Vec<(ObserverOptions, SharedObserver<E::Node>)>>,
    registrations: RefCell<Vec<Registration<E::Node>>>,
}

/// Handle to a shared intersection-tracking resource.
///
/// Clones share the same observers and registration table.
pub struct VisibilityBroker<E: Environment> {
    inner: Rc<BrokerInner<E>>,
}

impl<E: Environment> Clone for VisibilityBroker<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Environment> VisibilityBroker<E> {
    /// Create a broker.  No observer is created until the first
    /// observation is requested.
    pub fn new(env: E) -> Self {
        Self {
            inner: Rc::new(BrokerInner {
                env,
                observers: RefCell::new(Vec::new()),
                registrations: RefCell::new(Vec::new()),
            }),
        }
    }

    fn observer_for(&self, options: &ObserverOptions) -> SharedObserver<E::Node> {
        if let Some((_, observer)) = self
            .inner
            .observers
            .borrow()
            .iter()
            .find(|(existing, _)| existing == options)
        {
            return observer.clone();
        }

        let env = self.inner.env.clone();
        let observer = self.inner.env.create_intersection_observer(
            options,
            Rc::new(move |entry: IntersectionEntry<E::Node>| {
                if entry.is_visible() {
                    dispatch_hydrate(&env, &entry.target);
                }
            }),
        );
        if observer.is_none() {
            leptos::logging::debug_warn!(
                "intersection tracking unavailable for root margin {:?}",
                options.root_margin,
            );
        }
        self.inner
            .observers
            .borrow_mut()
            .push((options.clone(), observer.clone()));
        observer
    }

    /// Whether intersection tracking is available for `options`.
    pub fn is_supported(&self, options: &ObserverOptions) -> bool {
        self.observer_for(options).is_some()
    }

    /// Start observing `node`.  Returns `false` without registering
    /// anything if intersection tracking is unavailable.
    ///
    /// Observing the same node with the same options more than once is
    /// counted; it is only released once every observation has been
    /// matched by an [`unobserve`](Self::unobserve).
    pub fn observe(&self, node: &E::Node, options: &ObserverOptions) -> bool {
        let Some(observer) = self.observer_for(options) else {
            return false;
        };
        let first = {
            let mut registrations = self.inner.registrations.borrow_mut();
            match registrations
                .iter_mut()
                .find(|r| &r.node == node && &r.options == options)
            {
                Some(registration) => {
                    registration.count += 1;
                    false
                }
                None => {
                    registrations.push(Registration {
                        node: node.clone(),
                        options: options.clone(),
                        count: 1,
                    });
                    true
                }
            }
        };
        if first {
            observer.observe(node);
        }
        true
    }

    /// Stop observing `node`.  Unknown nodes are ignored.
    pub fn unobserve(&self, node: &E::Node, options: &ObserverOptions) {
        let released = {
            let mut registrations = self.inner.registrations.borrow_mut();
            let Some(idx) = registrations
                .iter()
                .position(|r| &r.node == node && &r.options == options)
            else {
                return;
            };
            registrations[idx].count -= 1;
            if registrations[idx].count == 0 {
                registrations.swap_remove(idx);
                true
            } else {
                false
            }
        };
        if released {
            if let Some(observer) = self.observer_for(options) {
                observer.unobserve(node);
            }
        }
    }

    pub fn is_observing(&self, node: &E::Node) -> bool {
        self.inner
            .registrations
            .borrow()
            .iter()
            .any(|r| &r.node == node)
    }

    /// Number of live (node, options) registrations.
    pub fn observed_count(&self) -> usize {
        self.inner.registrations.borrow().len()
    }
}

impl<E: Environment> fmt::Debug for VisibilityBroker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityBroker")
            .field("observers", &self.inner.observers.borrow().len())
            .field("observed", &self.observed_count())
            .finish()
    }
}
