//! `<hello>` capability exchange.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};
use crate::xml::NETCONF_BASE_NS;

/// Base protocol 1.0 capability.
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// Base protocol 1.1 capability, which enables chunked framing.
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Capability URIs advertised by one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Vec<String>);

impl Capabilities {
    /// What this client advertises.
    pub fn client() -> Self {
        Self(vec![BASE_1_0.to_string(), BASE_1_1.to_string()])
    }

    pub fn contains(&self, uri: &str) -> bool {
        // Capabilities may carry query parameters (`...?module=x`)
        self.0
            .iter()
            .any(|cap| cap == uri || cap.split_once('?').is_some_and(|(base, _)| base == uri))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode a `<hello>` advertising these capabilities.
    pub fn to_hello(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        let mut hello = BytesStart::new("hello");
        hello.push_attribute(("xmlns", NETCONF_BASE_NS));

        emit(&mut writer, Event::Start(hello))?;
        emit(&mut writer, Event::Start(BytesStart::new("capabilities")))?;
        for cap in &self.0 {
            emit(&mut writer, Event::Start(BytesStart::new("capability")))?;
            emit(&mut writer, Event::Text(BytesText::new(cap)))?;
            emit(&mut writer, Event::End(BytesEnd::new("capability")))?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("capabilities")))?;
        emit(&mut writer, Event::End(BytesEnd::new("hello")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| hello_error(format!("client hello is not valid UTF-8: {}", e)))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| hello_error(format!("unable to encode client hello: {}", e)))
}

impl FromIterator<String> for Capabilities {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The server's `<hello>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub session_id: u64,
    pub capabilities: Capabilities,
}

impl ServerHello {
    /// Parse a server `<hello>` message.
    ///
    /// The message must carry at least one base capability and a
    /// session-id.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut capabilities = Vec::new();
        let mut session_id = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| hello_error(format!("unreadable hello: {}", e)))?;
            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if path.is_empty() && name != "hello" {
                        return Err(hello_error(format!("expected <hello>, got <{}>", name)));
                    }
                    path.push(name);
                }
                Event::Empty(e) if path.is_empty() => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    return Err(hello_error(format!("empty <{}> message", name)));
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| hello_error(format!("bad text in hello: {}", e)))?;
                    match path.last().map(String::as_str) {
                        Some("capability") => capabilities.push(text.trim().to_string()),
                        Some("session-id") if path.len() == 2 => {
                            let id = text.trim().parse().map_err(|_| {
                                hello_error(format!("invalid session-id '{}'", text.trim()))
                            })?;
                            session_id = Some(id);
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let capabilities = Capabilities(capabilities);
        if !capabilities.contains(BASE_1_0) && !capabilities.contains(BASE_1_1) {
            return Err(hello_error("server advertises no base capability"));
        }
        let session_id = session_id.ok_or_else(|| hello_error("server hello has no session-id"))?;

        Ok(Self {
            session_id,
            capabilities,
        })
    }
}

fn hello_error(message: impl Into<String>) -> crate::Error {
    TransportError::Hello(message.into()).into()
}
