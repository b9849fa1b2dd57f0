//! # smtp-engine
//!
//! An SMTP protocol engine for readiness-driven, non-blocking I/O, covering
//! both the accepting (server) and the delivering (client) role.
//!
//! The engine does no I/O scheduling of its own. A reactor owns the
//! connections, watches them for readiness, and reports five events per
//! connection through [`IoEventDispatch`]: connected, input ready, output
//! ready, timeout and disconnected. Each event runs one bounded step of the
//! SMTP dialogue on the thread that owns the connection; the engine tells
//! the reactor what to watch next through the connection's [`Interest`].
//!
//! ## Roles
//!
//! - **Server**: [`ServerSessionFactory`] greets clients, answers envelope
//!   commands (with `PIPELINING`), receives content and hands each message
//!   to a [`DeliveryHandler`]. Envelope addresses pass through an
//!   [`EnvelopeValidator`], which may answer later from another thread.
//! - **Client**: [`ClientSessionFactory`] pulls [`DeliveryRequest`]s from a
//!   [`DeliveryRequestHandler`], delivers them one transaction at a time and
//!   reports a [`DeliveryResult`] for each.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use smtp_engine::{
//!     Address, ClientConfig, ClientEventDispatch, ClientSessionFactory, DeliveryQueue,
//!     DeliveryRequest, DeliveryRequestHandler, SessionRegistry,
//! };
//!
//! # fn main() -> smtp_engine::Result<()> {
//! let queue = Arc::new(DeliveryQueue::new());
//! queue.push(DeliveryRequest::new(
//!     Address::new("sender@example.com")?,
//!     vec![Address::new("recipient@example.org")?],
//!     "Subject: hello\r\n\r\nHello, World!\r\n",
//! )?);
//!
//! let handler: Arc<dyn DeliveryRequestHandler> = queue.clone();
//! let factory = ClientSessionFactory::new(ClientConfig::new("client.example.com"), handler);
//! let registry = Arc::new(SessionRegistry::new());
//! let dispatch = ClientEventDispatch::new(factory, Arc::clone(&registry));
//! assert!(dispatch.registry().is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dispatch`]: reactor events to sessions, audit log of transport faults
//! - [`registry`]: the set of live sessions, with shutdown waiting
//! - [`codec`]: the per-sub-dialogue codec contract
//! - [`server`] / [`client`]: the two roles
//! - [`command`], [`parser`], [`types`]: wire format

#![forbid(unsafe_code)]

pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod delivery;
pub mod dispatch;
mod error;
pub mod id;
pub mod io;
pub mod parser;
pub mod pending;
pub mod registry;
pub mod server;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use client::{ClientSession, ClientSessionFactory, ClientState};
pub use codec::{ProtocolCodec, ProtocolState};
pub use config::{ClientConfig, ServerConfig, TimeoutPolicy};
pub use delivery::{
    DeliveryQueue, DeliveryRequest, DeliveryRequestHandler, DeliveryResult, RcptResult,
    SessionContext,
};
pub use dispatch::{
    AuditEntry, AuditLog, ClientEventDispatch, EventDispatch, IoEventDispatch,
    ServerEventDispatch, Session, SessionFactory,
};
pub use error::{Error, Result};
pub use id::{BasicIdGenerator, IdGenerator};
pub use io::{Channel, Connection, ConnectionId, Interest, IoHandle};
pub use pending::{PendingResult, Validation, ValidationSender};
pub use registry::{RegistryCallback, SessionRegistry};
pub use server::{ServerSession, ServerSessionFactory, ServerState};
pub use types::{Address, EnhancedCode, Extension, Reply, ReplyClass, ReplyCode};
pub use validate::{
    AcceptAll, DeliveryHandler, EnvelopeValidator, ReceivedMessage, RemoteAddressValidator,
    SmtpError,
};
