//! NETCONF over SSH.

use log::{debug, info, trace, warn};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::hello::{BASE_1_1, Capabilities, ServerHello};
use super::{MessageId, RawReply, Session};
use crate::error::{Result, RpcError, TransportError};
use crate::rpc::Request;
use crate::transport::framing::{self, FrameDecoder, Framing};
use crate::transport::{SshConfig, SshTransport};
use crate::xml::NETCONF_BASE_NS;

/// Settings for opening a [`NetconfSession`].
#[derive(Debug)]
pub struct SessionConfig {
    /// SSH connection settings; `timeout` also bounds the hello exchange.
    pub ssh: SshConfig,

    /// Capabilities advertised in the client hello.
    pub capabilities: Capabilities,
}

impl SessionConfig {
    pub fn new(ssh: SshConfig) -> Self {
        Self {
            ssh,
            capabilities: Capabilities::client(),
        }
    }
}

/// A NETCONF session on an SSH `netconf` subsystem channel.
pub struct NetconfSession {
    transport: Option<SshTransport>,
    channel: Option<Channel<Msg>>,
    decoder: FrameDecoder,
    next_id: u64,
    session_id: u64,
    server_capabilities: Capabilities,
}

impl NetconfSession {
    /// Connect, authenticate, and complete the hello exchange.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let transport = SshTransport::connect(&config.ssh).await?;
        let channel = transport.open_netconf_channel().await?;

        let mut session = Self {
            transport: Some(transport),
            channel: Some(channel),
            decoder: FrameDecoder::new(Framing::EndOfMessage),
            next_id: 1,
            session_id: 0,
            server_capabilities: Capabilities::default(),
        };

        let hello = config.capabilities.to_hello()?;
        session.write_message(&hello).await?;

        let hello = tokio::time::timeout(config.ssh.timeout, session.read_message())
            .await
            .map_err(|_| TransportError::Timeout(config.ssh.timeout))??;
        let hello = ServerHello::parse(&hello)?;

        if hello.capabilities.contains(BASE_1_1) && config.capabilities.contains(BASE_1_1) {
            session.decoder.set_framing(Framing::Chunked);
        }

        info!(
            "NETCONF session {} established with {} ({} capabilities, {:?} framing)",
            hello.session_id,
            config.ssh.socket_addr(),
            hello.capabilities.len(),
            session.decoder.framing()
        );

        session.session_id = hello.session_id;
        session.server_capabilities = hello.capabilities;
        Ok(session)
    }

    /// Session id assigned by the server.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Capabilities from the server hello.
    pub fn capabilities(&self) -> &Capabilities {
        &self.server_capabilities
    }

    pub fn framing(&self) -> Framing {
        self.decoder.framing()
    }

    /// Whether the SSH connection is still running.
    pub fn is_alive(&self) -> bool {
        self.transport.as_ref().is_some_and(SshTransport::is_alive)
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(TransportError::Disconnected)?;
        trace!("send: {}", message);
        let framed = framing::encode(self.decoder.framing(), message);
        channel
            .data(&framed[..])
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<String> {
        loop {
            if let Some(message) = self.decoder.next_message()? {
                trace!("recv: {}", message);
                return Ok(message);
            }

            let channel = self.channel.as_mut().ok_or(TransportError::Disconnected)?;
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => self.decoder.extend(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    debug!(
                        "ignoring {} bytes of extended data (type {})",
                        data.len(),
                        ext
                    );
                }
                Some(ChannelMsg::Failure) => return Err(TransportError::SubsystemRefused.into()),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected.into());
                }
                Some(other) => trace!("channel message: {:?}", other),
            }
        }
    }
}

impl Session for NetconfSession {
    async fn submit(&mut self, request: &Request) -> Result<MessageId> {
        if self.channel.is_none() {
            return Err(RpcError::SendFailed {
                message: "session is closed".to_string(),
            }
            .into());
        }

        let message_id = MessageId::new(self.next_id);
        let message = request.encode(message_id)?;

        self.write_message(&message)
            .await
            .map_err(|e| RpcError::SendFailed {
                message: e.to_string(),
            })?;

        self.next_id += 1;
        debug!("sent {} as message-id {}", request.describe(), message_id);
        Ok(message_id)
    }

    async fn recv(&mut self) -> Result<RawReply> {
        let message = self.read_message().await?;
        Ok(RawReply::new(message))
    }

    async fn close(&mut self) -> Result<()> {
        let mut close_sent = false;
        if self.channel.is_some() {
            let close = format!(
                "<rpc xmlns=\"{}\" message-id=\"{}\"><close-session/></rpc>",
                NETCONF_BASE_NS, self.next_id
            );
            self.next_id += 1;
            match self.write_message(&close).await {
                Ok(()) => close_sent = true,
                Err(e) => debug!("close-session not sent: {}", e),
            }
        }

        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.eof().await {
                debug!("channel eof failed: {}", e);
            }
        }

        if let Some(transport) = self.transport.take() {
            match transport.close().await {
                Ok(()) => debug!("session {} closed", self.session_id),
                // The server may drop the connection as soon as it reads <close-session>
                Err(e) if close_sent => {
                    debug!("session {} already closed by server: {}", self.session_id, e)
                }
                Err(e) => {
                    warn!("error closing SSH connection: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.channel.is_some()
    }
}

impl std::fmt::Debug for NetconfSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetconfSession")
            .field("session_id", &self.session_id)
            .field("framing", &self.decoder.framing())
            .field("next_id", &self.next_id)
            .field("open", &self.channel.is_some())
            .finish()
    }
}
