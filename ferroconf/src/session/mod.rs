//! NETCONF sessions.
//!
//! A [`Session`] accepts encoded requests and hands back raw replies. The
//! SSH-backed implementation is [`NetconfSession`]; anything else that
//! speaks the same trait (a scripted test double, a different transport)
//! can drive the exchange coordinator unchanged.

mod hello;
mod netconf;

pub use hello::{BASE_1_0, BASE_1_1, Capabilities, ServerHello};
pub use netconf::{NetconfSession, SessionConfig};

use std::fmt;
use std::future::Future;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::Result;
use crate::rpc::Request;

/// Identifier correlating a request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete message received on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    /// `message-id` of the root element, when it has a numeric one.
    pub message_id: Option<MessageId>,

    /// The message text.
    pub xml: String,
}

impl RawReply {
    /// Wrap received text, reading the `message-id` off its root element.
    ///
    /// Text that is not XML, or whose root lacks a numeric `message-id`,
    /// yields a reply with no id; such replies never match a request.
    pub fn new(xml: impl Into<String>) -> Self {
        let xml = xml.into();
        let message_id = root_message_id(&xml);
        Self { message_id, xml }
    }
}

fn root_message_id(xml: &str) -> Option<MessageId> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => {
                let attr = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"message-id")?;
                let value = attr.unescape_value().ok()?;
                return value.trim().parse().ok().map(MessageId::new);
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// A connection able to carry NETCONF requests.
///
/// At most one request is outstanding at a time; [`Session::recv`]
/// returns whatever message arrives next, which may belong to an earlier
/// request that was abandoned.
pub trait Session: Send {
    /// Encode and send `request`, returning the message-id it was sent with.
    ///
    /// A failure to deliver is reported as a send failure.
    fn submit(&mut self, request: &Request) -> impl Future<Output = Result<MessageId>> + Send;

    /// Wait for the next complete message.
    fn recv(&mut self) -> impl Future<Output = Result<RawReply>> + Send;

    /// Close the session. Closing an already closed session succeeds.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the session can still carry requests.
    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_from_root() {
        let reply = RawReply::new(
            r#"<?xml version="1.0"?><rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="12"><ok/></rpc-reply>"#,
        );
        assert_eq!(reply.message_id, Some(MessageId::new(12)));
    }

    #[test]
    fn test_message_id_absent_or_invalid() {
        assert_eq!(RawReply::new("<notification/>").message_id, None);
        assert_eq!(RawReply::new(r#"<rpc-reply message-id="abc"/>"#).message_id, None);
        assert_eq!(RawReply::new("not xml").message_id, None);
    }

    #[test]
    fn test_nested_message_id_ignored() {
        let reply = RawReply::new(r#"<rpc-reply><data message-id="3"/></rpc-reply>"#);
        assert_eq!(reply.message_id, None);
    }
}
