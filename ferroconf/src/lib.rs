//! # Ferroconf
//!
//! Async NETCONF client library and command-line tool.
//!
//! Ferroconf connects to a device over the SSH `netconf` subsystem, sends
//! one RPC, waits for the reply carrying the same message-id, and prints
//! the reply or the nodes an XPath expression selects from it.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with RFC 6242 end-of-message and
//!   chunked framing
//! - Typed `get` / `get-config` requests with XPath filters, plus raw
//!   commands and XML
//! - Bounded, cancellable reply wait with message-id correlation
//! - Envelope/payload reply splitting
//! - XPath 1.0 queries with caller-supplied namespace prefixes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferroconf::rpc::{RequestBuilder, RpcInput};
//! use ferroconf::xml::BindingSet;
//! use ferroconf::{ClientBuilder, render};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferroconf::Error> {
//!     let mut client = ClientBuilder::new("192.0.2.1")
//!         .username("admin")
//!         .password("secret")
//!         .build()?;
//!
//!     let request = RequestBuilder::new(RpcInput::Command("get-config".into()))
//!         .arg("running")
//!         .build()?;
//!
//!     client.open().await?;
//!     let reply = client.execute(request).await?;
//!     client.close().await?;
//!
//!     print!("{}", render::render_reply_to_string(&reply, None, &BindingSet::new())?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod exchange;
pub mod render;
pub mod reply;
pub mod rpc;
pub mod session;
pub mod transport;
pub mod xml;

// Re-export main types for convenience
pub use client::{Client, ClientBuilder, run_session};
pub use error::{Error, ErrorKind};
pub use exchange::{Exchange, ExchangeConfig, ExchangeState};
pub use reply::{DecodedReply, Envelope, ReplyStatus, ServerError};
pub use rpc::{Request, RequestBuilder, RpcInput};
pub use session::{MessageId, NetconfSession, RawReply, Session, SessionConfig};
pub use transport::{AuthMethod, HostKeyVerification, SshConfig};
pub use xml::{BindingSet, XmlDocument};
