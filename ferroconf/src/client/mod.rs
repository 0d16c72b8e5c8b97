//! High-level NETCONF client.
//!
//! The client owns one SSH session and runs one exchange at a time on
//! it: submit the request, wait for the matching reply, decode it.

mod builder;

pub use builder::ClientBuilder;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RpcError};
use crate::exchange::{self, ExchangeConfig};
use crate::reply::DecodedReply;
use crate::rpc::Request;
use crate::session::{Capabilities, NetconfSession, Session, SessionConfig};

/// A NETCONF client for one device.
pub struct Client {
    session_config: SessionConfig,
    exchange_config: ExchangeConfig,
    session: Option<NetconfSession>,
}

impl Client {
    /// Create a client; see [`ClientBuilder`] for the usual entry point.
    pub fn new(session_config: SessionConfig, exchange_config: ExchangeConfig) -> Self {
        Self {
            session_config,
            exchange_config,
            session: None,
        }
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    pub fn exchange_config(&self) -> &ExchangeConfig {
        &self.exchange_config
    }

    /// Connect and complete the hello exchange.
    pub async fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(RpcError::AlreadyConnected.into());
        }

        let session = NetconfSession::connect(&self.session_config).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Close the session. Does nothing when not connected.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_open)
    }

    /// Capabilities the server advertised, once connected.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.session.as_ref().map(NetconfSession::capabilities)
    }

    /// Send `request` and decode its reply.
    pub async fn execute(&mut self, request: Request) -> Result<DecodedReply> {
        self.execute_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), abandoning the wait when `cancel`
    /// fires.
    pub async fn execute_with_cancel(
        &mut self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<DecodedReply> {
        let session = self.session.as_mut().ok_or(RpcError::NotConnected)?;
        let reply = exchange::execute(session, request, &self.exchange_config, cancel).await?;
        log_server_errors(&reply);
        Ok(reply)
    }

    /// Open, execute `request`, and close, closing even when the exchange
    /// fails.
    pub async fn run(&mut self, request: Request, cancel: CancellationToken) -> Result<DecodedReply> {
        self.open().await?;
        let mut session = self.session.take().ok_or(RpcError::NotConnected)?;
        run_session(&mut session, request, &self.exchange_config, cancel).await
    }
}

/// Execute `request` on an open session, then close the session whatever
/// the outcome.
///
/// A failure while closing is logged and does not replace the result of
/// the exchange.
pub async fn run_session<S: Session>(
    session: &mut S,
    request: Request,
    config: &ExchangeConfig,
    cancel: CancellationToken,
) -> Result<DecodedReply> {
    let result = exchange::execute(session, request, config, cancel).await;

    if let Err(e) = session.close().await {
        warn!("error closing session: {}", e);
    }

    let reply = result?;
    log_server_errors(&reply);
    Ok(reply)
}

fn log_server_errors(reply: &DecodedReply) {
    let errors = reply.errors();
    if errors.is_empty() {
        debug!("reply decoded");
    }
    for error in errors {
        warn!("server reported: {}", error);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.session_config.ssh.host)
            .field("port", &self.session_config.ssh.port)
            .field("session", &self.session)
            .finish()
    }
}
