//! # Sable Networking
//!
//! Peer-to-peer entity replication for the Sable engine.
//!
//! ## Architecture
//!
//! ```text
//! PEER A (game master)                 PEER B
//!   |                                    |
//!   |--- Handshake(nonce A) ------------>|
//!   |<-- Handshake(nonce A) echoed ------|
//!   |                                    |
//!   |--- Create(guid 2) ---------------->| <- volatile remote entity
//!   |--- Update(guid 2, segments) ------>| <- applied by system name
//!   |--- Delete(guid 2) ---------------->|
//! ```
//!
//! Each side owns the entities it created; remote entities are only ever
//! written by replication.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sable_networking::{LoopbackLink, NetworkSystem};
//!
//! let (a, b) = LoopbackLink::pair();
//! let mut network = NetworkSystem::new();
//! network.set_api(Box::new(a));
//! world.register(network)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod api;
pub mod error;
pub mod loopback;
pub mod message;
pub mod system;

pub use api::NetworkApi;
pub use error::{NetworkError, NetworkResult};
pub use loopback::{LinkStats, LoopbackLink};
pub use message::{ComponentSegment, MessageType, NetworkMessage, HEADER_SIZE};
pub use system::{NetworkComponent, NetworkStats, NetworkSystem};
