//! Reply decoding.
//!
//! Replies to `get` and `get-config` are split into the `<rpc-reply>`
//! envelope and the `<data>` payload. Every other reply is kept whole.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::rpc::ReplyKind;
use crate::session::{MessageId, RawReply};
use crate::xml::XmlDocument;

/// One `<rpc-error>` reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerError {
    pub error_type: String,
    pub error_tag: String,
    pub error_severity: String,
    pub error_app_tag: Option<String>,
    pub error_path: Option<String>,
    pub error_message: Option<String>,
}

impl ServerError {
    fn set(&mut self, field: &str, value: String) {
        match field {
            "error-type" => self.error_type = value,
            "error-tag" => self.error_tag = value,
            "error-severity" => self.error_severity = value,
            "error-app-tag" => self.error_app_tag = Some(value),
            "error-path" => self.error_path = Some(value),
            "error-message" => self.error_message = Some(value),
            _ => {}
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.error_severity, self.error_type, self.error_tag)?;
        if let Some(ref message) = self.error_message {
            write!(f, ": {}", message)?;
        }
        if let Some(ref path) = self.error_path {
            write!(f, " (at {})", path)?;
        }
        Ok(())
    }
}

/// Outcome reported by the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplyStatus {
    /// `<ok/>`.
    Ok,
    /// Neither `<ok/>` nor errors; any output is in the payload.
    Data,
    /// One or more `<rpc-error>` elements.
    Error(Vec<ServerError>),
}

/// The `<rpc-reply>` wrapper of a typed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub message_id: Option<MessageId>,
    pub status: ReplyStatus,

    /// Namespace declarations on `<rpc-reply>`; the default namespace has
    /// an empty prefix.
    pub namespaces: Vec<(String, String)>,

    /// The reply with `<data>` removed.
    pub document: XmlDocument,

    /// The reply exactly as received.
    pub source: XmlDocument,
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedReply {
    Typed {
        envelope: Envelope,
        payload: Option<XmlDocument>,
    },
    Raw(XmlDocument),
}

impl DecodedReply {
    /// The complete reply document.
    pub fn document(&self) -> &XmlDocument {
        match self {
            DecodedReply::Typed { envelope, .. } => &envelope.source,
            DecodedReply::Raw(document) => document,
        }
    }

    /// Errors reported by a typed reply.
    pub fn errors(&self) -> &[ServerError] {
        match self {
            DecodedReply::Typed {
                envelope:
                    Envelope {
                        status: ReplyStatus::Error(errors),
                        ..
                    },
                ..
            } => errors,
            _ => &[],
        }
    }
}

/// Decode `reply` as `kind` dictates.
pub fn decode(reply: RawReply, kind: ReplyKind) -> Result<DecodedReply> {
    match kind {
        ReplyKind::Raw => Ok(DecodedReply::Raw(XmlDocument::parse(reply.xml)?)),
        ReplyKind::Typed => decode_typed(reply),
    }
}

fn decode_typed(reply: RawReply) -> Result<DecodedReply> {
    let source = XmlDocument::parse(reply.xml)?;

    let mut reader = Reader::from_str(source.as_str());
    let mut envelope = Writer::new(Vec::new());
    let mut payload: Option<Writer<Vec<u8>>> = None;
    let mut payload_depth = 0usize;

    let mut depth = 0usize;
    let mut namespaces = Vec::new();
    let mut saw_ok = false;
    let mut errors = Vec::new();
    let mut current_error: Option<ServerError> = None;
    let mut current_field: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(decode_error)?;

        // Inside <data>: copy everything to the payload
        if payload_depth > 0 {
            match &event {
                Event::Start(_) => payload_depth += 1,
                Event::End(_) => payload_depth -= 1,
                Event::Eof => return Err(Error::malformed("reply ended inside <data>")),
                _ => {}
            }
            if let Some(writer) = payload.as_mut() {
                writer.write_event(event).map_err(write_error)?;
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let name = local_name(e);

                if depth == 0 {
                    if name != "rpc-reply" {
                        return Err(Error::malformed(format!(
                            "expected <rpc-reply>, got <{}>",
                            name
                        )));
                    }
                    namespaces = declarations(e)?;
                } else if depth == 1 && name == "data" {
                    let root = payload_root(e, &namespaces)?;
                    let mut writer = Writer::new(Vec::new());
                    let root_event = if is_start {
                        payload_depth = 1;
                        Event::Start(root)
                    } else {
                        Event::Empty(root)
                    };
                    writer.write_event(root_event).map_err(write_error)?;
                    payload = Some(writer);
                    continue;
                } else if depth == 1 && name == "ok" {
                    saw_ok = true;
                } else if depth == 1 && name == "rpc-error" {
                    if is_start {
                        current_error = Some(ServerError::default());
                    } else {
                        errors.push(ServerError::default());
                    }
                } else if depth == 2 && current_error.is_some() && is_start {
                    current_field = Some(name);
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 2 {
                    current_field = None;
                } else if depth == 1 {
                    if let Some(error) = current_error.take() {
                        errors.push(error);
                    }
                }
            }
            Event::Text(ref t) if depth == 3 => {
                if let (Some(error), Some(field)) = (current_error.as_mut(), current_field.as_ref()) {
                    let text = t.unescape().map_err(decode_error)?;
                    error.set(field, text.trim().to_string());
                }
            }
            _ => {}
        }

        envelope.write_event(event).map_err(write_error)?;
    }

    let status = if !errors.is_empty() {
        ReplyStatus::Error(errors)
    } else if saw_ok {
        ReplyStatus::Ok
    } else {
        ReplyStatus::Data
    };

    let payload = payload
        .map(|writer| XmlDocument::parse(into_string(writer)?))
        .transpose()?;
    let document = XmlDocument::parse(into_string(envelope)?)?;

    Ok(DecodedReply::Typed {
        envelope: Envelope {
            message_id: reply.message_id,
            status,
            namespaces,
            document,
            source,
        },
        payload,
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// `xmlns` and `xmlns:p` attributes of an element, in document order.
fn declarations(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::malformed(format!("bad attribute in reply: {}", e)))?;
        let key = attr.key.as_ref();
        let prefix = if key == b"xmlns" {
            String::new()
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            String::from_utf8_lossy(prefix).into_owned()
        } else {
            continue;
        };
        let uri = attr.unescape_value().map_err(decode_error)?.into_owned();
        out.push((prefix, uri));
    }
    Ok(out)
}

/// `<data>` with the envelope's declarations it does not override.
fn payload_root(e: &BytesStart<'_>, inherited: &[(String, String)]) -> Result<BytesStart<'static>> {
    let own: Vec<String> = declarations(e)?.into_iter().map(|(p, _)| p).collect();
    let mut root = e.clone().into_owned();
    for (prefix, uri) in inherited {
        if own.contains(prefix) {
            continue;
        }
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        root.push_attribute((key.as_str(), uri.as_str()));
    }
    Ok(root)
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::malformed(format!("reply is not valid UTF-8: {}", e)))
}

fn decode_error(e: impl std::fmt::Display) -> Error {
    Error::malformed(format!("unreadable reply: {}", e))
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::malformed(format!("unable to split reply: {}", e))
}
