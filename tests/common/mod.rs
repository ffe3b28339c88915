#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
    time::Duration,
};

use futures::{
    executor::{LocalPool, LocalSpawner},
    future::LocalBoxFuture,
    task::LocalSpawnExt,
};
use leptos_lazy_hydrate::{
    Environment, Fire, IntersectionEntry, ListenerOptions, ObserverOptions, Observe, Teardown,
};

pub struct NodeData {
    name: &'static str,
    is_element: bool,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<MockNode>>,
}

/// A DOM-ish node; equality is identity.
#[derive(Clone)]
pub struct MockNode(Rc<NodeData>);

impl MockNode {
    pub fn new(name: &'static str) -> Self {
        Self::with_kind(name, true)
    }

    pub fn text() -> Self {
        Self::with_kind("#text", false)
    }

    fn with_kind(name: &'static str, is_element: bool) -> Self {
        Self(Rc::new(NodeData {
            name,
            is_element,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn append(&self, child: &MockNode) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
    }

    pub fn parent(&self) -> Option<MockNode> {
        self.0.parent.borrow().upgrade().map(MockNode)
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// This node followed by its ancestors.
    fn path(&self) -> Vec<MockNode> {
        let mut path = vec![self.clone()];
        while let Some(parent) = path.last().and_then(MockNode::parent) {
            path.push(parent);
        }
        path
    }
}

impl PartialEq for MockNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0.name)
    }
}

/// A wrapper root holding a single child element, as rendered by the
/// server.
pub fn rendered_subtree() -> (MockNode, MockNode) {
    let root = MockNode::new("div");
    let child = MockNode::new("section");
    root.append(&child);
    (root, child)
}

struct Scheduled {
    id: usize,
    delay: Duration,
    callback: Fire,
}

struct Listener {
    id: usize,
    target: MockNode,
    event: String,
    options: ListenerOptions,
    callback: Fire,
}

struct ObserverState {
    options: ObserverOptions,
    on_entry: Rc<dyn Fn(IntersectionEntry<MockNode>)>,
    observed: RefCell<Vec<MockNode>>,
}

struct MockObserver(Rc<ObserverState>);

impl Observe<MockNode> for MockObserver {
    fn observe(&self, node: &MockNode) {
        self.0.observed.borrow_mut().push(node.clone());
    }

    fn unobserve(&self, node: &MockNode) {
        self.0.observed.borrow_mut().retain(|n| n != node);
    }
}

/// A caller-supplied observer that only records what it is asked to do.
#[derive(Default)]
pub struct RecordingObserver {
    pub observed: RefCell<Vec<MockNode>>,
    pub unobserved: RefCell<Vec<MockNode>>,
}

impl Observe<MockNode> for RecordingObserver {
    fn observe(&self, node: &MockNode) {
        self.observed.borrow_mut().push(node.clone());
    }

    fn unobserve(&self, node: &MockNode) {
        self.unobserved.borrow_mut().push(node.clone());
    }
}

struct State {
    interactive: Cell<bool>,
    idle: Cell<bool>,
    intersection: Cell<bool>,
    next_id: Cell<usize>,
    timers: RefCell<Vec<Scheduled>>,
    idle_requests: RefCell<Vec<Scheduled>>,
    listeners: RefCell<Vec<Listener>>,
    observers: RefCell<Vec<Rc<ObserverState>>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

/// A deterministic environment: nothing runs until the test says so.
#[derive(Clone)]
pub struct MockEnv(Rc<State>);

impl MockEnv {
    /// An interactive environment with every capability.
    pub fn browser() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self(Rc::new(State {
            interactive: Cell::new(true),
            idle: Cell::new(true),
            intersection: Cell::new(true),
            next_id: Cell::new(0),
            timers: RefCell::new(Vec::new()),
            idle_requests: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            pool: RefCell::new(pool),
            spawner,
        }))
    }

    /// A non-interactive, server-side environment.
    pub fn server() -> Self {
        let env = Self::browser();
        env.0.interactive.set(false);
        env
    }

    pub fn without_idle(self) -> Self {
        self.0.idle.set(false);
        self
    }

    pub fn without_intersection(self) -> Self {
        self.0.intersection.set(false);
        self
    }

    fn next_id(&self) -> usize {
        let id = self.0.next_id.get();
        self.0.next_id.set(id + 1);
        id
    }

    /// Fire every pending timer, returning their delays.
    pub fn run_timers(&self) -> Vec<Duration> {
        let pending = std::mem::take(&mut *self.0.timers.borrow_mut());
        pending
            .into_iter()
            .map(|timer| {
                (timer.callback)();
                timer.delay
            })
            .collect()
    }

    /// Grant idle time to every pending idle request, returning their
    /// timeouts.
    pub fn grant_idle(&self) -> Vec<Duration> {
        let pending = std::mem::take(&mut *self.0.idle_requests.borrow_mut());
        pending
            .into_iter()
            .map(|request| {
                (request.callback)();
                request.delay
            })
            .collect()
    }

    pub fn pending_timers(&self) -> usize {
        self.0.timers.borrow().len()
    }

    pub fn pending_idle(&self) -> usize {
        self.0.idle_requests.borrow().len()
    }

    pub fn idle_timeouts(&self) -> Vec<Duration> {
        self.0.idle_requests.borrow().iter().map(|r| r.delay).collect()
    }

    pub fn timer_delays(&self) -> Vec<Duration> {
        self.0.timers.borrow().iter().map(|t| t.delay).collect()
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    pub fn listeners_on(&self, target: &MockNode) -> Vec<(String, ListenerOptions)> {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|l| &l.target == target)
            .map(|l| (l.event.clone(), l.options))
            .collect()
    }

    pub fn observers_created(&self) -> usize {
        self.0.observers.borrow().len()
    }

    pub fn observation_count(&self) -> usize {
        self.0
            .observers
            .borrow()
            .iter()
            .map(|o| o.observed.borrow().len())
            .sum()
    }

    pub fn observer_margins(&self) -> Vec<String> {
        self.0
            .observers
            .borrow()
            .iter()
            .map(|o| o.options.root_margin.clone())
            .collect()
    }

    /// Nothing at all is left scheduled, listened for or observed.
    pub fn is_quiescent(&self) -> bool {
        self.pending_timers() == 0
            && self.pending_idle() == 0
            && self.listener_count() == 0
            && self.observation_count() == 0
    }

    /// Dispatch a user event on `node`; it bubbles.
    pub fn fire_event(&self, node: &MockNode, event: &str) {
        self.dispatch(node, event, true);
    }

    /// Report `node` as intersecting the viewport to every observer
    /// currently observing it.
    pub fn intersect(&self, node: &MockNode) {
        let callbacks = self
            .0
            .observers
            .borrow()
            .iter()
            .filter(|o| o.observed.borrow().contains(node))
            .map(|o| o.on_entry.clone())
            .collect::<Vec<_>>();
        for on_entry in callbacks {
            on_entry(IntersectionEntry {
                target: node.clone(),
                is_intersecting: true,
                intersection_ratio: 0.5,
            });
        }
    }

    /// Deliver an intersection entry to every observer, observing `node`
    /// or not, the way a late, already queued entry would arrive.
    pub fn deliver_entry(&self, node: &MockNode, is_intersecting: bool) {
        let callbacks = self
            .0
            .observers
            .borrow()
            .iter()
            .map(|o| o.on_entry.clone())
            .collect::<Vec<_>>();
        for on_entry in callbacks {
            on_entry(IntersectionEntry {
                target: node.clone(),
                is_intersecting,
                intersection_ratio: if is_intersecting { 1.0 } else { 0.0 },
            });
        }
    }

    /// Run spawned continuations until none can make progress.
    pub fn run_until_stalled(&self) {
        self.0.pool.borrow_mut().run_until_stalled();
    }

    fn dispatch(&self, node: &MockNode, event: &str, bubbles: bool) {
        let path = node.path();
        let ids = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event)
            .filter(|l| {
                path.iter().enumerate().any(|(depth, n)| {
                    &l.target == n && (depth == 0 || l.options.capture || bubbles)
                })
            })
            .map(|l| l.id)
            .collect::<Vec<_>>();
        for id in ids {
            // listeners removed by an earlier listener are skipped
            let callback = {
                let mut listeners = self.0.listeners.borrow_mut();
                let Some(idx) = listeners.iter().position(|l| l.id == id) else {
                    continue;
                };
                if listeners[idx].options.once {
                    listeners.remove(idx).callback
                } else {
                    listeners[idx].callback.clone()
                }
            };
            callback();
        }
    }
}

impl Environment for MockEnv {
    type Node = MockNode;
    type Target = MockNode;

    fn is_interactive(&self) -> bool {
        self.0.interactive.get()
    }

    fn has_child_nodes(&self, node: &MockNode) -> bool {
        !node.0.children.borrow().is_empty()
    }

    fn first_element_child(&self, node: &MockNode) -> Option<MockNode> {
        node.0
            .children
            .borrow()
            .iter()
            .find(|child| child.0.is_element)
            .cloned()
    }

    fn request_idle_callback(&self, timeout: Duration, callback: Fire) -> Option<Teardown> {
        if !self.0.idle.get() {
            return None;
        }
        let id = self.next_id();
        self.0.idle_requests.borrow_mut().push(Scheduled {
            id,
            delay: timeout,
            callback,
        });
        let env = self.clone();
        Some(Box::new(move || {
            env.0.idle_requests.borrow_mut().retain(|r| r.id != id);
        }))
    }

    fn set_timeout(&self, delay: Duration, callback: Fire) -> Teardown {
        let id = self.next_id();
        self.0.timers.borrow_mut().push(Scheduled {
            id,
            delay,
            callback,
        });
        let env = self.clone();
        Box::new(move || {
            env.0.timers.borrow_mut().retain(|t| t.id != id);
        })
    }

    fn add_event_listener(
        &self,
        target: &MockNode,
        event: &str,
        options: ListenerOptions,
        callback: Fire,
    ) -> Teardown {
        let id = self.next_id();
        self.0.listeners.borrow_mut().push(Listener {
            id,
            target: target.clone(),
            event: event.to_string(),
            options,
            callback,
        });
        let env = self.clone();
        Box::new(move || {
            env.0.listeners.borrow_mut().retain(|l| l.id != id);
        })
    }

    fn dispatch_event(&self, node: &MockNode, event: &str) {
        self.dispatch(node, event, false);
    }

    fn create_intersection_observer(
        &self,
        options: &ObserverOptions,
        on_entry: Rc<dyn Fn(IntersectionEntry<MockNode>)>,
    ) -> Option<Rc<dyn Observe<MockNode>>> {
        if !self.0.intersection.get() {
            return None;
        }
        let state = Rc::new(ObserverState {
            options: options.clone(),
            on_entry,
            observed: RefCell::new(Vec::new()),
        });
        self.0.observers.borrow_mut().push(state.clone());
        Some(Rc::new(MockObserver(state)))
    }

    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        self.0
            .spawner
            .spawn_local(future)
            .expect("local pool accepts new tasks");
    }
}
