//! This crate defers the hydration of server-rendered subtrees within the
//! Leptos framework until they are actually needed.  Binding event
//! handlers and setting up reactivity for a large page all at once is a
//! substantial amount of main-thread work on initial load; most of that
//! work is wasted on content the user never scrolls to or touches.
//!
//! ## How it works
//!
//! Each deferred subtree is guarded by a [`HydrationGate`], a small state
//! machine that starts out dehydrated on the client and hydrates exactly
//! once.  The gate arms any combination of triggers:
//!
//! - **idle**: once the browser reports idle time (or after a fixed
//!   delay where `requestIdleCallback` is not available);
//! - **visible**: once the content scrolls to within a margin of the
//!   viewport, tracked by a single [`VisibilityBroker`] shared by every
//!   gate on the page;
//! - **events**: on the first of any named DOM events on the content, or
//!   on some other target;
//! - **promise**: once an externally supplied future settles.
//!
//! Whichever fires first hydrates the subtree, and every other trigger
//! is torn down in the same step.  Unmounting a gate that never hydrated
//! tears down everything it armed, so no timer, observation or listener
//! outlives it.
//!
//! Where a capability is missing, the gate prefers becoming interactive
//! over staying inert: without intersection tracking the visibility
//! trigger hydrates at once.
//!
//! # Example
//!
//! ```
//! use leptos::prelude::*;
//! use leptos_lazy_hydrate::component::LazyHydrate;
//!
//! #[component]
//! fn Article() -> impl IntoView {
//!     view! {
//!         <article>"Static text, hydrated with the rest of the page."</article>
//!         // Hydrate the comment box when it is about to be seen, or as
//!         // soon as the pointer moves over it.
//!         <LazyHydrate when_visible=true hydrate_on=["mouseover", "focusin"]>
//!             <CommentBox/>
//!         </LazyHydrate>
//!         // Hydrate the footer whenever the browser has time for it.
//!         <LazyHydrate when_idle=true>
//!             <footer>"..."</footer>
//!         </LazyHydrate>
//!     }
//! }
//!
//! #[component]
//! fn CommentBox() -> impl IntoView {
//!     let (count, set_count) = signal(0);
//!     view! {
//!         <button on:click=move |_| set_count.update(|n| *n += 1)>
//!             "Comments: " {count}
//!         </button>
//!     }
//! }
//! ```
//!
//! The gate itself is independent of the DOM; everything it needs from
//! the host goes through the [`Environment`] trait, for which the
//! `hydrate` feature provides a `web-sys` implementation in
//! [`browser`](crate::browser).
//!
//! # Feature Flags
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]

pub mod broker;
#[cfg(feature = "hydrate")]
pub mod browser;
pub mod cleanup;
pub mod component;
pub mod config;
pub mod env;
mod gate;
pub mod trigger;


pub use broker::{dispatch_hydrate, VisibilityBroker, HYDRATE_EVENT};
pub use cleanup::{CleanupRegistry, Teardown};
pub use config::{
    ConfigWarning, EventNames, HydrationPromise, IdleOptions, LazyHydrateConfig, ObserverOptions,
    PromiseRejected, RejectionPolicy,
};
pub use env::{Environment, Fire, IntersectionEntry, ListenerOptions, Observe};
pub use gate::{HydrationGate, Status};
