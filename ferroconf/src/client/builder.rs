//! Builder for creating NETCONF clients.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::Client;
use crate::error::{Result, RpcError};
use crate::exchange::{DEFAULT_REPLY_TIMEOUT, ExchangeConfig};
use crate::session::{Capabilities, SessionConfig};
use crate::transport::{AuthMethod, HostKeyVerification, NETCONF_PORT, SshConfig};

/// Builder for constructing NETCONF clients.
///
/// # Example
///
/// ```rust,no_run
/// use ferroconf::ClientBuilder;
///
/// # fn example() -> Result<(), ferroconf::Error> {
/// let client = ClientBuilder::new("192.0.2.1")
///     .username("admin")
///     .password("secret")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Duration,
    reply_timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    capabilities: Capabilities,
}

impl ClientBuilder {
    /// Create a new client builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: NETCONF_PORT,
            username: None,
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            capabilities: Capabilities::client(),
        }
    }

    /// Set the SSH port (default: 830).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the connection and hello timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long to wait for each reply (default: 100 seconds).
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Replace the capabilities advertised in the client hello.
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Build the client.
    ///
    /// This does not connect. Call `open()` on the returned client to
    /// establish the session.
    pub fn build(self) -> Result<Client> {
        let username = self.username.ok_or_else(|| RpcError::InvalidConfig {
            message: "Username is required".to_string(),
        })?;

        if self.host.is_empty() {
            return Err(RpcError::InvalidConfig {
                message: "Host is required".to_string(),
            }
            .into());
        }

        if self.reply_timeout.is_zero() {
            return Err(RpcError::InvalidConfig {
                message: "Reply timeout must be greater than zero".to_string(),
            }
            .into());
        }

        let ssh = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        let session = SessionConfig {
            ssh,
            capabilities: self.capabilities,
        };

        Ok(Client::new(
            session,
            ExchangeConfig {
                reply_timeout: self.reply_timeout,
            },
        ))
    }
}
