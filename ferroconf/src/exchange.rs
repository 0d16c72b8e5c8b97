//! Request/reply exchange over a [`Session`].
//!
//! One exchange sends one request and waits, within a bounded time, for
//! the reply carrying the same message-id. Replies to anything else are
//! dropped while waiting. Nothing is retried.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, RpcError};
use crate::reply::{self, DecodedReply};
use crate::rpc::Request;
use crate::session::{MessageId, RawReply, Session};

/// Default time to wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(100);

/// Exchange settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// How long to wait for the correlated reply.
    pub reply_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Where an exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sent(MessageId),
    Replied(MessageId),
    TimedOut(MessageId),
    TransportError,
    Cancelled(MessageId),
}

impl ExchangeState {
    /// Whether the exchange has reached an end state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExchangeState::Idle | ExchangeState::Sent(_))
    }
}

/// Coordinates a single request/reply exchange.
#[derive(Debug)]
pub struct Exchange {
    config: ExchangeConfig,
    cancel: CancellationToken,
    state: ExchangeState,
    discarded: usize,
}

impl Exchange {
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            state: ExchangeState::Idle,
            discarded: 0,
        }
    }

    /// Abandon the wait when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Replies dropped because their message-id did not match.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Send `request` and wait for its reply.
    ///
    /// The request is consumed; it is dropped once the exchange ends,
    /// whatever the outcome.
    pub async fn run<S: Session>(&mut self, session: &mut S, request: Request) -> Result<RawReply> {
        self.state = ExchangeState::Idle;
        self.discarded = 0;

        let message_id = match session.submit(&request).await {
            Ok(id) => id,
            Err(e) => {
                self.state = ExchangeState::TransportError;
                return Err(as_send_failure(e));
            }
        };
        self.state = ExchangeState::Sent(message_id);

        let timeout = self.config.reply_timeout;
        let deadline = Instant::now() + timeout;
        debug!(
            "waiting up to {:?} for reply to {} (message-id {})",
            timeout,
            request.describe(),
            message_id
        );

        loop {
            let cancel = self.cancel.clone();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                received = tokio::time::timeout_at(deadline, session.recv()) => Some(received),
            };

            match outcome {
                None => {
                    self.state = ExchangeState::Cancelled(message_id);
                    debug!("exchange for message-id {} cancelled", message_id);
                    return Err(RpcError::Cancelled { message_id }.into());
                }
                Some(Err(_elapsed)) => {
                    self.state = ExchangeState::TimedOut(message_id);
                    warn!("no reply to message-id {} within {:?}", message_id, timeout);
                    return Err(RpcError::ReplyTimeout {
                        message_id,
                        timeout,
                    }
                    .into());
                }
                Some(Ok(Err(e))) => {
                    self.state = ExchangeState::TransportError;
                    return Err(e);
                }
                Some(Ok(Ok(reply))) if reply.message_id == Some(message_id) => {
                    self.state = ExchangeState::Replied(message_id);
                    return Ok(reply);
                }
                Some(Ok(Ok(reply))) => {
                    self.discarded += 1;
                    match reply.message_id {
                        Some(other) => debug!(
                            "discarding reply with message-id {} while waiting for {}",
                            other, message_id
                        ),
                        None => debug!(
                            "discarding message without message-id while waiting for {}",
                            message_id
                        ),
                    }
                }
            }
        }
    }
}

fn as_send_failure(e: Error) -> Error {
    match e {
        Error::Rpc(RpcError::SendFailed { .. }) => e,
        other => RpcError::SendFailed {
            message: other.to_string(),
        }
        .into(),
    }
}

/// Run one exchange and decode its reply according to the request kind.
pub async fn execute<S: Session>(
    session: &mut S,
    request: Request,
    config: &ExchangeConfig,
    cancel: CancellationToken,
) -> Result<DecodedReply> {
    let kind = request.reply_kind();
    let raw = Exchange::new(config.clone())
        .with_cancellation(cancel)
        .run(session, request)
        .await?;
    reply::decode(raw, kind)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::error::{ErrorKind, TransportError};
    use crate::rpc::{Operation, Payload};

    /// Replies scripted up front; `recv` pends forever once they run out.
    struct ScriptedSession {
        next_id: u64,
        fail_submit: bool,
        replies: VecDeque<(Duration, Result<RawReply>)>,
        submitted: Vec<MessageId>,
    }

    impl ScriptedSession {
        fn new() -> Self {
            Self {
                next_id: 1,
                fail_submit: false,
                replies: VecDeque::new(),
                submitted: Vec::new(),
            }
        }

        fn reply(mut self, delay: Duration, id: u64) -> Self {
            let xml = format!("<rpc-reply message-id=\"{}\"><ok/></rpc-reply>", id);
            self.replies.push_back((delay, Ok(RawReply::new(xml))));
            self
        }
    }

    impl Session for ScriptedSession {
        async fn submit(&mut self, _request: &Request) -> Result<MessageId> {
            if self.fail_submit {
                return Err(TransportError::Disconnected.into());
            }
            let id = MessageId::new(self.next_id);
            self.next_id += 1;
            self.submitted.push(id);
            Ok(id)
        }

        async fn recv(&mut self) -> Result<RawReply> {
            match self.replies.pop_front() {
                Some((delay, reply)) => {
                    tokio::time::sleep(delay).await;
                    reply
                }
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    fn request() -> Request {
        Request::Untyped(Payload::Command("get-system-information".to_string()))
    }

    fn short() -> ExchangeConfig {
        ExchangeConfig {
            reply_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_reply() {
        let mut session = ScriptedSession::new().reply(Duration::from_millis(10), 1);
        let mut exchange = Exchange::new(short());

        let reply = exchange.run(&mut session, request()).await.unwrap();
        assert_eq!(reply.message_id, Some(MessageId::new(1)));
        assert_eq!(exchange.state(), ExchangeState::Replied(MessageId::new(1)));
        assert_eq!(exchange.discarded(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_replies_discarded() {
        let mut session = ScriptedSession::new()
            .reply(Duration::from_millis(10), 99)
            .reply(Duration::from_millis(10), 98)
            .reply(Duration::from_millis(10), 1);
        session.replies.push_front((
            Duration::ZERO,
            Ok(RawReply::new("<notification><eventTime/></notification>")),
        ));
        let mut exchange = Exchange::new(short());

        let reply = exchange.run(&mut session, request()).await.unwrap();
        assert_eq!(reply.message_id, Some(MessageId::new(1)));
        assert_eq!(exchange.discarded(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_reply() {
        let mut session = ScriptedSession::new();
        let mut exchange = Exchange::new(short());
        let start = Instant::now();

        let err = exchange.run(&mut session, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplyTimeout);
        assert_eq!(exchange.state(), ExchangeState::TimedOut(MessageId::new(1)));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_times_out() {
        let mut session = ScriptedSession::new().reply(Duration::from_secs(6), 1);
        let mut exchange = Exchange::new(short());

        let err = exchange.run(&mut session, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplyTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discards_share_one_deadline() {
        // Each mismatched reply arrives in time, but together they exhaust the budget
        let mut session = ScriptedSession::new()
            .reply(Duration::from_secs(3), 7)
            .reply(Duration::from_secs(3), 1);
        let mut exchange = Exchange::new(short());

        let err = exchange.run(&mut session, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReplyTimeout);
        assert_eq!(exchange.discarded(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_is_send_failed() {
        let mut session = ScriptedSession::new();
        session.fail_submit = true;
        let mut exchange = Exchange::new(short());

        let err = exchange.run(&mut session, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SendFailed);
        assert_eq!(exchange.state(), ExchangeState::TransportError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_while_waiting() {
        let mut session = ScriptedSession::new();
        session
            .replies
            .push_back((Duration::ZERO, Err(TransportError::Disconnected.into())));
        let mut exchange = Exchange::new(short());

        let err = exchange.run(&mut session, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(exchange.state(), ExchangeState::TransportError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let mut session = ScriptedSession::new();
        let token = CancellationToken::new();
        let mut exchange = Exchange::new(short()).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let err = exchange.run(&mut session, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(exchange.state(), ExchangeState::Cancelled(MessageId::new(1)));
        assert!(exchange.state().is_terminal());
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_decodes_typed_reply() {
        let mut session = ScriptedSession::new();
        session.replies.push_back((
            Duration::ZERO,
            Ok(RawReply::new(
                r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="1"><data><system xmlns="urn:example:sys"/></data></rpc-reply>"#,
            )),
        ));

        let reply = execute(
            &mut session,
            Request::Typed(Operation::Get { filter: None }),
            &short(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        match reply {
            DecodedReply::Typed { payload, .. } => assert!(payload.is_some()),
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(session.submitted, vec![MessageId::new(1)]);
    }
}
