use std::time::Duration;

use leptos::{children::ChildrenFn, component, html::Div, prelude::*, IntoView};
use serde::{Deserialize, Serialize};

use crate::config::{EventNames, HydrationPromise, IdleOptions, ObserverOptions, RejectionPolicy};

/// An event target other than the subtree root, for the event trigger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenTarget {
    Window,
    Document,
    /// The first element matching this CSS selector.
    Selector(String),
}

/// Render `children` on the server, and only hydrate them on the client
/// once one of the configured triggers fires.
///
/// Under SSR the children are rendered inside a `display: contents`
/// wrapper.  On the client the wrapper is first rendered empty and
/// inert, keeping the server markup in place, until the gate hydrates;
/// from then on the children are rendered live, inside the wrapper
/// unless `no_wrapper` is set.
///
/// ```
/// use leptos::prelude::*;
/// use leptos_lazy_hydrate::component::LazyHydrate;
///
/// #[component]
/// fn Comments() -> impl IntoView {
///     view! {
///         <LazyHydrate when_visible=true hydrate_on="click">
///             <button>"Load more"</button>
///         </LazyHydrate>
///     }
/// }
/// ```
#[component]
pub fn LazyHydrate(
    /// Never hydrate; keep the server markup inert.
    #[prop(optional)]
    ssr_only: bool,
    /// Hydrate once the browser is idle.
    #[prop(optional)]
    when_idle: bool,
    /// Delay before hydrating when there is no idle scheduler.
    #[prop(optional, into)]
    idle_delay: Option<Duration>,
    /// Hydrate once the content scrolls near the viewport.
    #[prop(optional)]
    when_visible: bool,
    #[prop(optional, into)] observer_options: Option<ObserverOptions>,
    /// Hydrate on the first of these events.
    #[prop(optional, into)]
    hydrate_on: EventNames,
    /// Listen for `hydrate_on` events here rather than on the wrapper.
    #[prop(optional, into)]
    listen_on: Option<ListenTarget>,
    /// Hydrate once this settles.
    #[prop(optional)]
    promise: Option<HydrationPromise>,
    #[prop(optional)] on_reject: RejectionPolicy,
    /// Called right after hydration.
    #[prop(optional, into)]
    did_hydrate: Option<Callback<()>>,
    /// Drop the wrapper once hydrated on the client.
    #[prop(optional)]
    no_wrapper: bool,
    children: ChildrenFn,
) -> impl IntoView {
    #[cfg_attr(not(feature = "hydrate"), allow(unused_variables))]
    let config = ClientConfig {
        ssr_only,
        when_idle: when_idle
            .then(|| idle_delay.map(IdleOptions::with_delay).unwrap_or_default()),
        when_visible: when_visible.then(|| observer_options.unwrap_or_default()),
        on: hydrate_on,
        listen_on,
        promise,
        on_reject,
        did_hydrate,
    };

    #[cfg_attr(not(feature = "hydrate"), allow(unused_variables))]
    let (hydrated, set_hydrated) = signal(!cfg!(feature = "hydrate"));
    let root = NodeRef::<Div>::new();

    #[cfg(feature = "hydrate")]
    crate::browser::mount(root, set_hydrated, config);

    // the server always keeps the wrapper; the client gate needs it
    let bare = no_wrapper && cfg!(feature = "hydrate");
    move || match (hydrated.get(), bare) {
        (true, true) => children().into_any(),
        (true, false) => {
            view! { <div node_ref=root style="display: contents">{children()}</div> }.into_any()
        }
        (false, _) => {
            view! { <div node_ref=root style="display: contents" inner_html=""></div> }.into_any()
        }
    }
}

/// The props of a `<LazyHydrate>` that reach the client gate.
#[cfg_attr(not(feature = "hydrate"), allow(dead_code))]
pub(crate) struct ClientConfig {
    pub(crate) ssr_only: bool,
    pub(crate) when_idle: Option<IdleOptions>,
    pub(crate) when_visible: Option<ObserverOptions>,
    pub(crate) on: EventNames,
    pub(crate) listen_on: Option<ListenTarget>,
    pub(crate) promise: Option<HydrationPromise>,
    pub(crate) on_reject: RejectionPolicy,
    pub(crate) did_hydrate: Option<Callback<()>>,
}
