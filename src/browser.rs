//! [`Environment`] for the browser, built on `web-sys`.
//!
//! Capabilities are detected at runtime: without `requestIdleCallback`
//! the idle trigger falls back to a timer, and without
//! `IntersectionObserver` the visibility trigger fires at once.
//!
//! A closure handed to the browser may well be the one running when its
//! own teardown is invoked (the firing listener hydrates the gate, which
//! cancels every trigger).  Dropping a `Closure` from inside itself is
//! an error in `wasm-bindgen`, so released closures are only dropped
//! from a later task.

use std::{cell::RefCell, rc::Rc, time::Duration};

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, Reflect};
use leptos::{html::Div, prelude::*};
use send_wrapper::SendWrapper;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AddEventListenerOptions, CustomEvent, Element, EventTarget, IdleRequestOptions,
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
};

use crate::{
    broker::VisibilityBroker,
    cleanup::Teardown,
    component::{ClientConfig, ListenTarget},
    config::{HydrationPromise, LazyHydrateConfig, ObserverOptions, PromiseRejected},
    env::{Environment, Fire, IntersectionEntry, ListenerOptions, Observe},
    gate::HydrationGate,
};

thread_local! {
    static BROKER: VisibilityBroker<BrowserEnv> = VisibilityBroker::new(BrowserEnv);
}

/// The browser window as a hydration environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserEnv;

impl BrowserEnv {
    /// The visibility broker shared by every gate on this page.
    pub fn broker() -> VisibilityBroker<BrowserEnv> {
        BROKER.with(Clone::clone)
    }
}

fn has_global(name: &str) -> bool {
    web_sys::window()
        .and_then(|window| Reflect::has(&window, &JsValue::from_str(name)).ok())
        .unwrap_or(false)
}

fn release<T: 'static>(value: T) {
    leptos::task::spawn_local(async move {
        drop(value);
    });
}

fn millis(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

fn noop() -> Teardown {
    Box::new(|| ())
}

struct BrowserObserver {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(Array)>,
}

impl Observe<Element> for BrowserObserver {
    fn observe(&self, node: &Element) {
        self.observer.observe(node);
    }

    fn unobserve(&self, node: &Element) {
        self.observer.unobserve(node);
    }
}

impl Environment for BrowserEnv {
    type Node = Element;
    type Target = EventTarget;

    fn is_interactive(&self) -> bool {
        web_sys::window().is_some()
    }

    fn has_child_nodes(&self, node: &Element) -> bool {
        node.has_child_nodes()
    }

    fn first_element_child(&self, node: &Element) -> Option<Element> {
        node.first_element_child()
    }

    fn request_idle_callback(&self, timeout: Duration, callback: Fire) -> Option<Teardown> {
        if !has_global("requestIdleCallback") {
            return None;
        }
        let window = web_sys::window()?;
        let closure = Closure::<dyn FnMut()>::new(move || callback());
        let options = IdleRequestOptions::new();
        options.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        match window.request_idle_callback_with_options(closure.as_ref().unchecked_ref(), &options)
        {
            Ok(handle) => Some(Box::new(move || {
                window.cancel_idle_callback(handle);
                release(closure);
            })),
            Err(e) => {
                leptos::logging::warn!("requestIdleCallback failed: {e:?}");
                None
            }
        }
    }

    fn set_timeout(&self, delay: Duration, callback: Fire) -> Teardown {
        let Some(window) = web_sys::window() else {
            return noop();
        };
        let closure = Closure::<dyn FnMut()>::new(move || callback());
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            millis(delay),
        ) {
            Ok(handle) => Box::new(move || {
                window.clear_timeout_with_handle(handle);
                release(closure);
            }),
            Err(e) => {
                leptos::logging::warn!("setTimeout failed: {e:?}");
                noop()
            }
        }
    }

    fn add_event_listener(
        &self,
        target: &EventTarget,
        event: &str,
        options: ListenerOptions,
        callback: Fire,
    ) -> Teardown {
        let closure = Closure::<dyn FnMut()>::new(move || callback());
        let listener_options = AddEventListenerOptions::new();
        listener_options.set_once(options.once);
        listener_options.set_capture(options.capture);
        listener_options.set_passive(options.passive);
        if let Err(e) = target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            &listener_options,
        ) {
            leptos::logging::warn!("addEventListener({event:?}) failed: {e:?}");
            return noop();
        }
        let target = target.clone();
        let event = event.to_string();
        Box::new(move || {
            if let Err(e) = target.remove_event_listener_with_callback_and_bool(
                &event,
                closure.as_ref().unchecked_ref(),
                options.capture,
            ) {
                leptos::logging::warn!("removeEventListener({event:?}) failed: {e:?}");
            }
            release(closure);
        })
    }

    fn dispatch_event(&self, node: &Element, event: &str) {
        match CustomEvent::new(event) {
            Ok(custom) => {
                if let Err(e) = node.dispatch_event(&custom) {
                    leptos::logging::warn!("dispatching {event:?} failed: {e:?}");
                }
            }
            Err(e) => leptos::logging::warn!("failed to create {event:?} event: {e:?}"),
        }
    }

    fn create_intersection_observer(
        &self,
        options: &ObserverOptions,
        on_entry: Rc<dyn Fn(IntersectionEntry<Element>)>,
    ) -> Option<Rc<dyn Observe<Element>>> {
        if !has_global("IntersectionObserver") {
            return None;
        }
        let callback = Closure::<dyn FnMut(Array)>::new(move |entries: Array| {
            for entry in entries.iter() {
                let entry: IntersectionObserverEntry = entry.unchecked_into();
                on_entry(IntersectionEntry {
                    target: entry.target(),
                    is_intersecting: entry.is_intersecting(),
                    intersection_ratio: entry.intersection_ratio(),
                });
            }
        });
        let init = IntersectionObserverInit::new();
        init.set_root_margin(&options.root_margin);
        if !options.threshold.is_empty() {
            let threshold = options
                .threshold
                .iter()
                .map(|t| JsValue::from_f64(*t))
                .collect::<Array>();
            init.set_threshold(&threshold);
        }
        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => Some(Rc::new(BrowserObserver {
                observer,
                _callback: callback,
            })),
            Err(e) => {
                leptos::logging::warn!("IntersectionObserver unavailable: {e:?}");
                None
            }
        }
    }

    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        leptos::task::spawn_local(future);
    }
}

/// Adapt a JavaScript promise into a [`HydrationPromise`].
pub fn js_promise(promise: js_sys::Promise) -> HydrationPromise {
    async move {
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| PromiseRejected(format!("{e:?}")))
    }
    .boxed_local()
}

impl ListenTarget {
    /// Look up the target in the current document.
    pub fn resolve(&self) -> Option<EventTarget> {
        let window = web_sys::window()?;
        match self {
            ListenTarget::Window => Some(window.into()),
            ListenTarget::Document => window.document().map(Into::into),
            ListenTarget::Selector(selector) => window
                .document()?
                .query_selector(selector)
                .ok()
                .flatten()
                .map(Into::into),
        }
    }
}

impl ClientConfig {
    pub(crate) fn into_config(self) -> LazyHydrateConfig<BrowserEnv> {
        let mut config = LazyHydrateConfig::new().on(self.on).on_reject(self.on_reject);
        config.ssr_only = self.ssr_only;
        config.when_idle = self.when_idle;
        config.when_visible = self.when_visible;
        config.promise = self.promise;
        if let Some(target) = &self.listen_on {
            match target.resolve() {
                Some(target) => config.listen_on = Some(target),
                None => leptos::logging::warn!("listen_on target {target:?} not found"),
            }
        }
        if let Some(did_hydrate) = self.did_hydrate {
            config = config.did_hydrate(move || did_hydrate.run(()));
        }
        config
    }
}

/// Mount a gate on `root` once it is attached, flipping `hydrated` when
/// the gate activates and unmounting it with the owning component.
pub(crate) fn mount(root: NodeRef<Div>, hydrated: WriteSignal<bool>, config: ClientConfig) {
    let gate = Rc::new(RefCell::new(None::<HydrationGate<BrowserEnv>>));
    let mut pending = Some(config);

    Effect::new({
        let gate = gate.clone();
        move |_| {
            let Some(el) = root.get() else {
                return;
            };
            let Some(config) = pending.take() else {
                return;
            };
            let element: Element = el.into();
            let new_gate = HydrationGate::new(BrowserEnv, Some(element));
            new_gate.on_hydrate(move |_| hydrated.set(true));
            new_gate.mount(config.into_config(), &BrowserEnv::broker());
            *gate.borrow_mut() = Some(new_gate);
        }
    });

    let gate = SendWrapper::new(gate);
    on_cleanup(move || {
        if let Some(gate) = gate.borrow_mut().take() {
            gate.unmount();
        }
    });
}
