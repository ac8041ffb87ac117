//! Asynchronous GET client that decodes JSON or images relative to a base URL.
//!
//! # Overview
//! `HttpClient` joins a stored base URL with a per-call endpoint, performs one
//! GET through an injected [`Transport`], decodes the body, and reports exactly
//! one outcome. Outcomes are available as futures (`get_json`, `get_image`) or
//! through single-shot callbacks (`fetch_json`, `fetch_image`).
//!
//! # Design
//! - `HttpClient` holds only `base_url` plus its wiring; it keeps no mutable
//!   state, so one instance serves any number of concurrent calls.
//! - The network sits behind the `Transport` trait. `UreqTransport` is the
//!   default; tests swap in fakes.
//! - Where callbacks run is an explicit [`Delivery`] choice rather than a
//!   platform default.
//! - Status codes are not interpreted; only the body decides the outcome.

pub mod client;
pub mod delivery;
pub mod error;
pub mod http;
mod runtime;

pub use client::{HttpClient, HttpClientBuilder, Image};
pub use delivery::{Delivery, DeliveryPolicy, Dispatch, Job, MainQueue};
pub use error::{FetchError, TransportError};
pub use http::{HttpResponse, Transport, UreqTransport};
