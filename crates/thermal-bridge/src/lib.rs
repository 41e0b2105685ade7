//! thermal-bridge library crate.
//!
//! Bridges one thermal-camera control process, reachable only through two
//! one-way byte channels, to any number of WebSocket clients.  Device state
//! changes are fanned out to every client; client commands are relayed back
//! to the device.
//!
//! # Architecture
//!
//! ```text
//! WebSocket clients (JSON or bincode)
//!         ↕
//! [thermal-bridge]
//!   ├── domain/           Pure types: client messages, BridgeConfig
//!   ├── application/      State cache, session registry, codecs, dispatch
//!   └── infrastructure/
//!         ├── device_link/ Framed pipe transport + inbound pump
//!         ├── ws_server/   WebSocket accept loop (tokio-tungstenite)
//!         ├── session/     Per-client writer and reader
//!         ├── config_file/ Optional TOML settings
//!         └── launcher/    Startup wiring
//!         ↕
//! device process  (68-byte frames over /tmp/fromC and /tmp/toC)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `thermal-core`; its only async
//!   primitives are the session queue and stop signal.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tokio-tungstenite`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: device state, fan-out and translation.
pub mod application;

/// Infrastructure layer: device channels, WebSocket server, config file.
pub mod infrastructure;
