//! The individual trigger sources and the set a gate arms.
//!
//! Every trigger is handed the same `fire` callback.  Arming a trigger
//! registers it with the environment and pushes whatever is needed to
//! undo that registration into the gate's [`CleanupRegistry`]; nothing
//! else about an armed trigger is retained.

use std::{fmt, rc::Rc};

use futures::future::{self, FutureExt};

use crate::{
    broker::{VisibilityBroker, HYDRATE_EVENT},
    cleanup::CleanupRegistry,
    config::{
        EventNames, HydrationPromise, IdleOptions, LazyHydrateConfig, ObserverOptions,
        RejectionPolicy,
    },
    env::{Environment, Fire, ListenerOptions, Observe},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Idle,
    Visible,
    Event,
    Promise,
}

/// Fires once the environment has idle time, or after a fixed delay
/// where there is no idle scheduler.
#[derive(Clone, Copy, Debug)]
pub struct IdleTrigger {
    pub options: IdleOptions,
}

/// Fires once the first element child of the root becomes visible.
pub struct VisibilityTrigger<E: Environment> {
    pub options: ObserverOptions,
    pub observer: Option<Rc<dyn Observe<E::Node>>>,
}

/// Fires on the first of the named events delivered to the root, or to
/// an alternate target.
pub struct EventTrigger<E: Environment> {
    pub events: EventNames,
    pub target: Option<E::Target>,
}

/// Fires once the promise settles, subject to the rejection policy.
pub struct PromiseTrigger {
    pub promise: HydrationPromise,
    pub on_reject: RejectionPolicy,
}

pub enum Trigger<E: Environment> {
    Idle(IdleTrigger),
    Visible(VisibilityTrigger<E>),
    Event(EventTrigger<E>),
    Promise(PromiseTrigger),
}

/// Everything a trigger needs while being armed.
pub(crate) struct Arming<'a, E: Environment> {
    pub(crate) env: &'a E,
    pub(crate) root: &'a E::Node,
    pub(crate) broker: &'a VisibilityBroker<E>,
    pub(crate) cleanup: &'a CleanupRegistry,
    pub(crate) fire: &'a Fire,
}

impl IdleTrigger {
    fn arm<E: Environment>(self, cx: &Arming<'_, E>) {
        let teardown = match cx
            .env
            .request_idle_callback(self.options.timeout, cx.fire.clone())
        {
            Some(cancel) => cancel,
            None => cx
                .env
                .set_timeout(self.options.fallback_delay, cx.fire.clone()),
        };
        cx.cleanup.push(teardown);
    }
}

impl<E: Environment> VisibilityTrigger<E> {
    fn arm(self, cx: &Arming<'_, E>) {
        // The root itself is laid out with `display: contents` and has
        // no box to intersect with.
        let Some(child) = cx.env.first_element_child(cx.root) else {
            (cx.fire)();
            return;
        };
        let supported = match &self.observer {
            Some(_) => true,
            None => cx.broker.is_supported(&self.options),
        };
        if !supported {
            (cx.fire)();
            return;
        }

        cx.cleanup.push(cx.env.add_event_listener(
            &E::Target::from(cx.root.clone()),
            HYDRATE_EVENT,
            ListenerOptions::hydration(),
            cx.fire.clone(),
        ));

        match self.observer {
            Some(observer) => {
                observer.observe(&child);
                cx.cleanup.push(move || observer.unobserve(&child));
            }
            None => {
                let broker = cx.broker.clone();
                let options = self.options;
                broker.observe(&child, &options);
                cx.cleanup.push(move || broker.unobserve(&child, &options));
            }
        }
    }
}

impl<E: Environment> EventTrigger<E> {
    fn arm(self, cx: &Arming<'_, E>) {
        let target = self
            .target
            .unwrap_or_else(|| E::Target::from(cx.root.clone()));
        for event in self.events.iter() {
            cx.cleanup.push(cx.env.add_event_listener(
                &target,
                event,
                ListenerOptions::hydration(),
                cx.fire.clone(),
            ));
        }
    }
}

impl PromiseTrigger {
    // The task is aborted on teardown, which drops the pending future and
    // everything it captured.  `fire` is inert once the gate has hydrated
    // or is gone, for a promise that settles in the same turn.
    fn arm<E: Environment>(self, cx: &Arming<'_, E>) {
        let fire = cx.fire.clone();
        let on_reject = self.on_reject;
        let (settled, handle) = future::abortable(async move {
            match self.promise.await {
                Ok(()) => fire(),
                Err(e) => match on_reject {
                    RejectionPolicy::Hydrate => {
                        leptos::logging::log!("{e}; hydrating regardless");
                        fire();
                    }
                    RejectionPolicy::Ignore => {
                        leptos::logging::log!("{e}; staying dehydrated");
                    }
                },
            }
        });
        cx.env.spawn_local(settled.map(|_| ()).boxed_local());
        cx.cleanup.push(move || handle.abort());
    }
}

impl<E: Environment> Trigger<E> {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Idle(_) => TriggerKind::Idle,
            Trigger::Visible(_) => TriggerKind::Visible,
            Trigger::Event(_) => TriggerKind::Event,
            Trigger::Promise(_) => TriggerKind::Promise,
        }
    }

    pub(crate) fn arm(self, cx: &Arming<'_, E>) {
        match self {
            Trigger::Idle(trigger) => trigger.arm(cx),
            Trigger::Visible(trigger) => trigger.arm(cx),
            Trigger::Event(trigger) => trigger.arm(cx),
            Trigger::Promise(trigger) => trigger.arm(cx),
        }
    }
}

impl<E: Environment> fmt::Debug for Trigger<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Trigger").field(&self.kind()).finish()
    }
}

/// The triggers configured for one gate.
pub struct TriggerSet<E: Environment> {
    triggers: Vec<Trigger<E>>,
}

impl<E: Environment> TriggerSet<E> {
    /// Build the set from the trigger-related parts of `config`.
    pub fn from_config(config: LazyHydrateConfig<E>) -> Self {
        let mut triggers = Vec::new();
        if let Some(promise) = config.promise {
            triggers.push(Trigger::Promise(PromiseTrigger {
                promise,
                on_reject: config.on_reject,
            }));
        }
        if let Some(options) = config.when_idle {
            triggers.push(Trigger::Idle(IdleTrigger { options }));
        }
        if let Some(options) = config.when_visible {
            triggers.push(Trigger::Visible(VisibilityTrigger {
                options,
                observer: config.observer,
            }));
        }
        if !config.on.is_empty() {
            triggers.push(Trigger::Event(EventTrigger {
                events: config.on,
                target: config.listen_on,
            }));
        }
        Self { triggers }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn kinds(&self) -> Vec<TriggerKind> {
        self.triggers.iter().map(Trigger::kind).collect()
    }

    /// Arm every trigger in turn, stopping early once `pending` reports
    /// the gate no longer needs arming.  Returns the number armed.
    pub(crate) fn arm(self, cx: &Arming<'_, E>, pending: impl Fn() -> bool) -> usize {
        let mut armed = 0;
        for trigger in self.triggers {
            if !pending() {
                break;
            }
            trigger.arm(cx);
            armed += 1;
        }
        armed
    }
}

impl<E: Environment> fmt::Debug for TriggerSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}
