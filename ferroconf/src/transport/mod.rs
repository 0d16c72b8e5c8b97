//! SSH transport layer wrapping russh.
//!
//! This module provides the low-level SSH connection management:
//! connection setup, authentication, the `netconf` subsystem channel,
//! and message framing on that channel.

pub mod config;
pub mod framing;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, NETCONF_PORT, SshConfig};
pub use framing::{FrameDecoder, Framing};
pub use ssh::SshTransport;
