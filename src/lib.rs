//! # ntex-ipgate
//!
//! `ntex-ipgate` is a per-client admission gate for the `ntex` web framework.
//! Each client, keyed by IP address, gets its own token bucket: requests are
//! forwarded while the bucket holds a whole token and answered with
//! `429 Too Many Requests` once it runs dry. A background sweeper evicts
//! clients that have gone idle, so the gate's memory stays bounded even under
//! rotating or spoofed source addresses.
//!
//! ## Features
//!
//! - **Token bucket per client**: 2 requests/second sustained with bursts of
//!   4 by default; fractional, continuously-refilled token arithmetic with no
//!   minimum granularity (rapid polling cannot game the burst).
//! - **IP-based client identity**: honours `X-Forwarded-For` and `X-Real-IP`,
//!   falling back to the transport peer address; requests with no derivable
//!   address are refused with `400` (fail closed).
//! - **Idle-client eviction**: a cancellable background task prunes clients
//!   idle beyond a threshold (2 minutes by default).
//! - **Explicit wiring, no globals**: construct a [`ClientRegistry`], hand it
//!   to [`IpGate`] and [`spawn_sweeper`], stop the sweeper on shutdown.
//! - **JSON rejections**: `429`/`400` responses carry a small JSON body.
//!
//! ## Installation
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! ntex-ipgate = "0.1"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ntex::web;
//! use ntex_ipgate::{spawn_sweeper, ClientRegistry, IpGate};
//!
//! #[ntex::main]
//! async fn main() -> std::io::Result<()> {
//!     let registry = Arc::new(ClientRegistry::new());
//!     let sweeper = spawn_sweeper(Arc::clone(&registry));
//!
//!     web::HttpServer::new(move || {
//!         web::App::new()
//!             .wrap(IpGate::new(Arc::clone(&registry)))
//!             .service(web::resource("/ping").to(|| async { "Hello World" }))
//!     })
//!     .bind("127.0.0.1:8080")?
//!     .run()
//!     .await?;
//!
//!     sweeper.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! The defaults live in [`GateConfig`]; build the registry with
//! [`ClientRegistry::with_config`] to tighten or relax them.
//!
//! ## Module Structure
//!
//! - `bucket`: the token-bucket algorithm for a single client.
//! - `registry`: the shared client-to-bucket map and its configuration.
//! - `sweeper`: the cancellable idle-client eviction task.
//! - `middleware`: the `IpGate` middleware and its rejection responses.

mod bucket;
mod middleware;
mod registry;
mod sweeper;

pub use bucket::TokenBucket;
pub use middleware::{GateError, IpGate};
pub use registry::{
    ClientRegistry, GateConfig, DEFAULT_BURST, DEFAULT_IDLE_TIMEOUT, DEFAULT_RATE_PER_SEC,
    DEFAULT_SWEEP_INTERVAL,
};
pub use sweeper::{spawn_sweeper, SweeperHandle};
