//! Request values and their `<rpc>` encoding.

use std::path::PathBuf;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use super::datastore::Datastore;
use crate::error::{Error, Result};
use crate::session::MessageId;
use crate::xml::{BindingSet, NETCONF_BASE_NS, XmlDocument};

/// XPath filter embedded in a `<get>` or `<get-config>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// The `select` expression.
    pub select: String,

    /// Prefixes the expression uses, declared on the `<filter>` element.
    pub namespaces: BindingSet,
}

impl Filter {
    pub fn new(select: impl Into<String>) -> Self {
        Self {
            select: select.into(),
            namespaces: BindingSet::new(),
        }
    }

    pub fn with_namespaces(mut self, namespaces: BindingSet) -> Self {
        self.namespaces = namespaces;
        self
    }
}

/// Operations whose reply is split into envelope and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `<get>` with an optional filter.
    Get { filter: Option<Filter> },

    /// `<get-config>` from a datastore with an optional filter.
    GetConfig {
        source: Datastore,
        filter: Option<Filter>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get { .. } => "get",
            Operation::GetConfig { .. } => "get-config",
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        match self {
            Operation::Get { filter } | Operation::GetConfig { filter, .. } => filter.as_ref(),
        }
    }
}

/// Opaque request content sent as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A bare operation name, sent as an empty element.
    Command(String),

    /// XML given inline.
    Xml(XmlDocument),

    /// XML read from a file.
    Document { path: PathBuf, document: XmlDocument },
}

/// How the reply to a request is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Envelope plus optional data payload.
    Typed,

    /// Whole reply as a single document.
    Raw,
}

/// A request ready to be submitted on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Typed(Operation),
    Untyped(Payload),
}

impl Request {
    /// How the reply to this request should be decoded.
    pub fn reply_kind(&self) -> ReplyKind {
        match self {
            Request::Typed(_) => ReplyKind::Typed,
            Request::Untyped(_) => ReplyKind::Raw,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Request::Typed(op) => op.name().to_string(),
            Request::Untyped(Payload::Command(name)) => name.clone(),
            Request::Untyped(Payload::Xml(_)) => "inline xml".to_string(),
            Request::Untyped(Payload::Document { path, .. }) => path.display().to_string(),
        }
    }

    /// Encode as a complete `<rpc>` message carrying `message_id`.
    ///
    /// XML payloads whose root is `<rpc>` have that wrapper replaced: its
    /// children become the operation and its attributes, other than
    /// `message-id` and the default namespace, move onto the new wrapper.
    pub fn encode(&self, message_id: MessageId) -> Result<String> {
        let id = message_id.to_string();
        let mut rpc = BytesStart::new("rpc");
        rpc.push_attribute(("xmlns", NETCONF_BASE_NS));
        rpc.push_attribute(("message-id", id.as_str()));

        let mut writer = Writer::new(Vec::new());

        match self {
            Request::Typed(op) => {
                emit(&mut writer, Event::Start(rpc))?;
                write_operation(&mut writer, op)?;
            }
            Request::Untyped(Payload::Command(name)) => {
                emit(&mut writer, Event::Start(rpc))?;
                emit(&mut writer, Event::Empty(BytesStart::new(name.as_str())))?;
            }
            Request::Untyped(Payload::Xml(document))
            | Request::Untyped(Payload::Document { document, .. }) => {
                copy_operation(&mut writer, rpc, document.as_str())?;
            }
        }

        emit(&mut writer, Event::End(BytesEnd::new("rpc")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::malformed(format!("request is not valid UTF-8: {}", e)))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::malformed(format!("unable to encode request: {}", e)))
}

fn write_operation(writer: &mut Writer<Vec<u8>>, op: &Operation) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(op.name())))?;

    if let Operation::GetConfig { source, .. } = op {
        emit(writer, Event::Start(BytesStart::new("source")))?;
        emit(writer, Event::Empty(BytesStart::new(source.as_str())))?;
        emit(writer, Event::End(BytesEnd::new("source")))?;
    }

    if let Some(filter) = op.filter() {
        let mut element = BytesStart::new("filter");
        element.push_attribute(("type", "xpath"));
        element.push_attribute(("select", filter.select.as_str()));
        for (prefix, uri) in filter.namespaces.iter() {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            element.push_attribute((key.as_str(), uri));
        }
        emit(writer, Event::Empty(element))?;
    }

    emit(writer, Event::End(BytesEnd::new(op.name())))
}

/// Copy the operation element(s) of `xml` under a fresh `<rpc>` wrapper.
fn copy_operation(writer: &mut Writer<Vec<u8>>, mut rpc: BytesStart<'_>, xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);

    let (root, is_empty) = loop {
        match reader.read_event().map_err(read_error)? {
            Event::Start(e) => break (e, false),
            Event::Empty(e) => break (e, true),
            Event::Eof => return Err(Error::malformed("request XML has no root element")),
            _ => {}
        }
    };

    if root.local_name().as_ref() == b"rpc" {
        for attr in root.attributes() {
            let attr = attr.map_err(|e| Error::malformed(format!("bad attribute: {}", e)))?;
            let key = attr.key.as_ref();
            if key == b"message-id" || key == b"xmlns" {
                continue;
            }
            rpc.push_attribute(attr);
        }
        emit(writer, Event::Start(rpc))?;
        if !is_empty {
            copy_children(writer, &mut reader)?;
        }
    } else {
        emit(writer, Event::Start(rpc))?;
        if is_empty {
            emit(writer, Event::Empty(root))?;
        } else {
            let end = root.to_end().into_owned();
            emit(writer, Event::Start(root))?;
            copy_children(writer, &mut reader)?;
            emit(writer, Event::End(end))?;
        }
    }

    Ok(())
}

/// Copy events up to, not including, the end tag of the current element.
fn copy_children(writer: &mut Writer<Vec<u8>>, reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        let event = reader.read_event().map_err(read_error)?;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(()),
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(Error::malformed("request XML ended inside an element")),
            Event::Decl(_) | Event::DocType(_) | Event::PI(_) => continue,
            _ => {}
        }
        emit(writer, event)?;
    }
}

fn read_error(e: quick_xml::Error) -> Error {
    Error::malformed(format!("request XML: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{BindingSet, shape};

    fn encode(request: &Request) -> String {
        request.encode(MessageId::new(42)).unwrap()
    }

    #[test]
    fn test_get_without_filter() {
        let xml = encode(&Request::Typed(Operation::Get { filter: None }));
        assert_eq!(
            xml,
            format!(
                "<rpc xmlns=\"{}\" message-id=\"42\"><get></get></rpc>",
                NETCONF_BASE_NS
            )
        );
    }

    #[test]
    fn test_get_config_with_filter() {
        let filter = Filter::new("/if:interfaces/if:interface[if:name='ge-0/0/0']")
            .with_namespaces(BindingSet::parse("if=urn:ietf:params:xml:ns:yang:ietf-interfaces").unwrap());
        let xml = encode(&Request::Typed(Operation::GetConfig {
            source: Datastore::Candidate,
            filter: Some(filter),
        }));

        assert!(xml.contains("<get-config><source><candidate/></source>"));
        assert!(xml.contains("type=\"xpath\""));
        assert!(xml.contains("select=\"/if:interfaces/if:interface[if:name="));
        assert!(xml.contains("xmlns:if=\"urn:ietf:params:xml:ns:yang:ietf-interfaces\""));
        XmlDocument::parse(xml).unwrap();
    }

    #[test]
    fn test_command_becomes_empty_element() {
        let xml = encode(&Request::Untyped(Payload::Command(
            "get-system-information".to_string(),
        )));
        assert!(xml.ends_with("message-id=\"42\"><get-system-information/></rpc>"));
    }

    #[test]
    fn test_inline_rpc_wrapper_replaced() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0"?><rpc message-id="7" xmlns:junos="http://xml.juniper.net/junos/*/junos"><get-system-uptime-information/></rpc>"#,
        )
        .unwrap();
        let xml = encode(&Request::Untyped(Payload::Xml(doc)));

        assert!(!xml.contains("message-id=\"7\""));
        assert!(!xml.contains("<?xml"));
        assert!(xml.contains("message-id=\"42\""));
        assert!(xml.contains("xmlns:junos="));

        let expected = XmlDocument::parse(format!(
            "<rpc xmlns=\"{}\" xmlns:junos=\"http://xml.juniper.net/junos/*/junos\" message-id=\"42\"><get-system-uptime-information/></rpc>",
            NETCONF_BASE_NS
        ))
        .unwrap();
        assert_eq!(shape(&XmlDocument::parse(xml).unwrap()), shape(&expected));
    }

    #[test]
    fn test_bare_operation_is_wrapped() {
        let doc = XmlDocument::parse(
            "<get-interface-information><terse/><interface-name>ge-0/0/0</interface-name></get-interface-information>",
        )
        .unwrap();
        let xml = encode(&Request::Untyped(Payload::Document {
            path: PathBuf::from("req.xml"),
            document: doc,
        }));
        assert_eq!(
            xml,
            format!(
                "<rpc xmlns=\"{}\" message-id=\"42\"><get-interface-information><terse/><interface-name>ge-0/0/0</interface-name></get-interface-information></rpc>",
                NETCONF_BASE_NS
            )
        );
    }

    #[test]
    fn test_reply_kind() {
        assert_eq!(
            Request::Typed(Operation::Get { filter: None }).reply_kind(),
            ReplyKind::Typed
        );
        assert_eq!(
            Request::Untyped(Payload::Command("x".into())).reply_kind(),
            ReplyKind::Raw
        );
    }
}
