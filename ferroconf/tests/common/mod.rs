//! In-memory session for driving the request pipeline without a device.

use std::collections::VecDeque;
use std::time::Duration;

use ferroconf::error::{Result, TransportError};
use ferroconf::{MessageId, RawReply, Request, Session};

/// Placeholder replaced by the message-id of the last submitted request.
pub const ID: &str = "{id}";

/// Answers each request from a queue of reply templates.
pub struct MockSession {
    next_id: u64,
    replies: VecDeque<(Duration, String)>,
    /// Encoded requests, in submission order.
    pub sent: Vec<String>,
    pub closed: bool,
    /// Make `close` report a transport error after marking the session closed.
    pub fail_close: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            replies: VecDeque::new(),
            sent: Vec::new(),
            closed: false,
            fail_close: false,
        }
    }

    /// Queue a reply delivered immediately.
    pub fn reply(self, template: &str) -> Self {
        self.reply_after(Duration::ZERO, template)
    }

    /// Queue a reply delivered after `delay`.
    pub fn reply_after(mut self, delay: Duration, template: &str) -> Self {
        self.replies.push_back((delay, template.to_string()));
        self
    }
}

impl Session for MockSession {
    async fn submit(&mut self, request: &Request) -> Result<MessageId> {
        let id = MessageId::new(self.next_id);
        self.sent.push(request.encode(id)?);
        self.next_id += 1;
        Ok(id)
    }

    async fn recv(&mut self) -> Result<RawReply> {
        let Some((delay, template)) = self.replies.pop_front() else {
            return std::future::pending().await;
        };
        tokio::time::sleep(delay).await;
        let id = (self.next_id - 1).to_string();
        Ok(RawReply::new(template.replace(ID, &id)))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        if self.fail_close {
            return Err(TransportError::Disconnected.into());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
