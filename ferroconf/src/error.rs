//! Error types for ferroconf.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::MessageId;

/// Main error type for ferroconf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport and session-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Request building and RPC exchange errors
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// XPath query errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Output sink errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport layer errors (SSH connection, authentication, framing).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict verification)
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Server refused the netconf subsystem
    #[error("Server refused the netconf subsystem")]
    SubsystemRefused,

    /// Invalid or unexpected hello message
    #[error("Hello exchange failed: {0}")]
    Hello(String),

    /// Message framing violated
    #[error("Framing error: {0}")]
    Framing(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Request construction and exchange errors.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Malformed namespace-binding string or request text
    #[error("Format error: {message}")]
    Format { message: String },

    /// Value outside its allowed enumeration
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// XML text or file could not be read or parsed
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    /// The session rejected the request
    #[error("Failed to send RPC: {message}")]
    SendFailed { message: String },

    /// No correlated reply within the wait budget
    #[error("No reply to message-id {message_id} within {timeout:?}")]
    ReplyTimeout {
        message_id: MessageId,
        timeout: Duration,
    },

    /// The wait was abandoned by the caller
    #[error("Exchange for message-id {message_id} cancelled")]
    Cancelled { message_id: MessageId },

    /// Client not connected
    #[error("Client not connected - call open() first")]
    NotConnected,

    /// Client already connected
    #[error("Client already connected")]
    AlreadyConnected,

    /// Invalid configuration in the client builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// XPath query errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Namespace binding rejected by the XPath context
    #[error("Unable to register namespace prefix '{prefix}' for '{uri}'")]
    Namespace { prefix: String, uri: String },

    /// Expression uses a prefix with no binding
    #[error("Undefined namespace prefix '{prefix}' in XPath expression '{expression}'")]
    UndefinedPrefix { prefix: String, expression: String },

    /// Expression failed to compile
    #[error("Invalid XPath expression '{expression}': {message}")]
    Compile { expression: String, message: String },

    /// Expression failed to evaluate
    #[error("Unable to evaluate XPath expression '{expression}': {message}")]
    Evaluate { expression: String, message: String },

    /// Expression evaluated to something other than a node-set
    #[error("XPath expression '{expression}' did not select nodes")]
    NotANodeSet { expression: String },
}

/// Coarse classification of failures, one per pipeline stage outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    InvalidArgument,
    MalformedInput,
    SendFailed,
    ReplyTimeout,
    Query,
    Transport,
    Cancelled,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Query(_) => ErrorKind::Query,
            Error::Io(_) => ErrorKind::Io,
            Error::Rpc(e) => match e {
                RpcError::Format { .. } => ErrorKind::Format,
                RpcError::InvalidArgument { .. } | RpcError::InvalidConfig { .. } => {
                    ErrorKind::InvalidArgument
                }
                RpcError::MalformedInput { .. } => ErrorKind::MalformedInput,
                RpcError::SendFailed { .. } => ErrorKind::SendFailed,
                RpcError::ReplyTimeout { .. } => ErrorKind::ReplyTimeout,
                RpcError::Cancelled { .. } => ErrorKind::Cancelled,
                RpcError::NotConnected | RpcError::AlreadyConnected => ErrorKind::Transport,
            },
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        RpcError::Format {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        RpcError::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        RpcError::MalformedInput {
            message: message.into(),
        }
        .into()
    }
}

/// Result type alias using ferroconf's Error.
pub type Result<T> = std::result::Result<T, Error>;
