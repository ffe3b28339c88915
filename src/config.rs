use std::{fmt, future::Future, rc::Rc, time::Duration};

use futures::future::{FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};

use crate::env::{Environment, Observe};

/// Timeout handed to the idle scheduler when idle scheduling is available.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);
/// Delay of the timer used in place of the idle scheduler.
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_millis(2000);
/// Margin around the viewport within which a subtree counts as visible.
pub const DEFAULT_ROOT_MARGIN: &str = "150px";

/// Options for the idle trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleOptions {
    /// Upper bound passed to the idle scheduler.
    pub timeout: Duration,
    /// Delay of the fallback timer, only used when there is no idle
    /// scheduler.
    pub fallback_delay: Duration,
}

impl Default for IdleOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_IDLE_TIMEOUT,
            fallback_delay: DEFAULT_FALLBACK_DELAY,
        }
    }
}

impl IdleOptions {
    /// Idle options with a caller-supplied fallback delay.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            fallback_delay: delay,
            ..Self::default()
        }
    }
}

impl From<Duration> for IdleOptions {
    fn from(delay: Duration) -> Self {
        Self::with_delay(delay)
    }
}

/// Options for the intersection observer used by the visibility trigger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverOptions {
    pub root_margin: String,
    /// Left empty, the environment's default threshold applies.
    #[serde(default)]
    pub threshold: Vec<f64>,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin: DEFAULT_ROOT_MARGIN.to_string(),
            threshold: Vec::new(),
        }
    }
}

impl ObserverOptions {
    pub fn root_margin(mut self, margin: impl Into<String>) -> Self {
        self.root_margin = margin.into();
        self
    }

    pub fn threshold(mut self, threshold: impl Into<Vec<f64>>) -> Self {
        self.threshold = threshold.into();
        self
    }
}

/// The event names the event trigger listens for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventNames(Vec<String>);

impl EventNames {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for EventNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for EventNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for EventNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for EventNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

/// What a rejected hydration promise does to the gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionPolicy {
    /// Hydrate on rejection exactly as on resolution.
    #[default]
    Hydrate,
    /// Leave the gate alone; only a resolution hydrates.
    Ignore,
}

/// The failure half of a [`HydrationPromise`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("hydration promise rejected: {0}")]
pub struct PromiseRejected(pub String);

/// An externally settled signal that the subtree may hydrate.
pub type HydrationPromise = LocalBoxFuture<'static, Result<(), PromiseRejected>>;

/// Non-fatal diagnostics about a gate configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigWarning {
    #[error(
        "LazyHydration: enable at least one trigger for hydration. \
         If you don't want to hydrate, use ssr_only"
    )]
    NoTrigger,
}

/// Caller-supplied configuration of a [`HydrationGate`](crate::HydrationGate).
pub struct LazyHydrateConfig<E: Environment> {
    /// Never arm any trigger; the server markup stays inert.
    pub ssr_only: bool,
    pub when_idle: Option<IdleOptions>,
    pub when_visible: Option<ObserverOptions>,
    pub on: EventNames,
    pub promise: Option<HydrationPromise>,
    pub on_reject: RejectionPolicy,
    /// Alternate target for the event trigger, in place of the root.
    pub listen_on: Option<E::Target>,
    /// Observer used in place of the shared broker.
    pub observer: Option<Rc<dyn Observe<E::Node>>>,
    pub did_hydrate: Option<Rc<dyn Fn()>>,
}

impl<E: Environment> Default for LazyHydrateConfig<E> {
    fn default() -> Self {
        Self {
            ssr_only: false,
            when_idle: None,
            when_visible: None,
            on: EventNames::default(),
            promise: None,
            on_reject: RejectionPolicy::default(),
            listen_on: None,
            observer: None,
            did_hydrate: None,
        }
    }
}

impl<E: Environment> LazyHydrateConfig<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ssr_only(mut self) -> Self {
        self.ssr_only = true;
        self
    }

    pub fn when_idle(mut self) -> Self {
        self.when_idle = Some(IdleOptions::default());
        self
    }

    pub fn when_idle_with(mut self, options: impl Into<IdleOptions>) -> Self {
        self.when_idle = Some(options.into());
        self
    }

    pub fn when_visible(mut self) -> Self {
        self.when_visible = Some(ObserverOptions::default());
        self
    }

    /// Hydrate on visibility, tracked with `options`.
    ///
    /// The broker keeps one observer per distinct [`ObserverOptions`] for
    /// the rest of the page, so every new margin or threshold costs an
    /// observer that is never released.  Keep to a small, fixed set of
    /// option values rather than computing them per subtree.
    pub fn when_visible_with(mut self, options: ObserverOptions) -> Self {
        self.when_visible = Some(options);
        self
    }

    pub fn on(mut self, events: impl Into<EventNames>) -> Self {
        self.on = events.into();
        self
    }

    pub fn with_promise<F>(mut self, promise: F) -> Self
    where
        F: Future<Output = Result<(), PromiseRejected>> + 'static,
    {
        self.promise = Some(promise.boxed_local());
        self
    }

    pub fn on_reject(mut self, policy: RejectionPolicy) -> Self {
        self.on_reject = policy;
        self
    }

    pub fn listen_on(mut self, target: impl Into<E::Target>) -> Self {
        self.listen_on = Some(target.into());
        self
    }

    pub fn with_observer(mut self, observer: Rc<dyn Observe<E::Node>>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn did_hydrate(mut self, callback: impl Fn() + 'static) -> Self {
        self.did_hydrate = Some(Rc::new(callback));
        self
    }

    /// Whether any trigger is configured at all.
    pub fn has_trigger(&self) -> bool {
        self.when_idle.is_some()
            || self.when_visible.is_some()
            || !self.on.is_empty()
            || self.promise.is_some()
    }

    /// The diagnostic for this configuration, if any.
    pub fn warning(&self) -> Option<ConfigWarning> {
        (!self.ssr_only && !self.has_trigger()).then_some(ConfigWarning::NoTrigger)
    }
}

impl<E: Environment> fmt::Debug for LazyHydrateConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHydrateConfig")
            .field("ssr_only", &self.ssr_only)
            .field("when_idle", &self.when_idle)
            .field("when_visible", &self.when_visible)
            .field("on", &self.on)
            .field("promise", &self.promise.is_some())
            .field("on_reject", &self.on_reject)
            .field("listen_on", &self.listen_on.is_some())
            .field("observer", &self.observer.is_some())
            .field("did_hydrate", &self.did_hydrate.is_some())
            .finish()
    }
}
