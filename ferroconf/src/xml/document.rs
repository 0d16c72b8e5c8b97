//! Owned, validated XML documents.

use std::fmt;
use std::fs;
use std::path::Path;

use log::trace;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::Event;
use sxd_document::Package;

use crate::error::{Error, Result};

/// A well-formed XML document.
///
/// The document is kept as its serialized text, which was checked for
/// well-formedness (including namespace well-formedness) when it was
/// constructed. Tree views are built on demand, so the value is cheap to
/// move between tasks.
#[derive(Clone, PartialEq, Eq)]
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Parse and validate XML text.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        sxd_document::parser::parse(&text)
            .map_err(|e| Error::malformed(format!("XML parse error: {}", e)))?;
        Ok(Self { text })
    }

    /// Read and validate an XML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::malformed(format!("unable to read file \"{}\": {}", path.display(), e))
        })?;
        trace!("read {} bytes from {}", text.len(), path.display());

        sxd_document::parser::parse(&text).map_err(|e| {
            Error::malformed(format!("unable to parse file \"{}\": {}", path.display(), e))
        })?;
        Ok(Self { text })
    }

    /// The document text exactly as it was received or read.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the document and return its text.
    pub fn into_string(self) -> String {
        self.text
    }

    /// Build a DOM for this document.
    pub(crate) fn package(&self) -> Result<Package> {
        sxd_document::parser::parse(&self.text)
            .map_err(|e| Error::malformed(format!("XML parse error: {}", e)))
    }

    /// Serialize with two-space indentation.
    ///
    /// Whitespace-only text between elements is dropped and re-generated
    /// by the indenter. All other text, including the whitespace-only
    /// content of a leaf such as `<a> </a>`, is written unchanged.
    pub fn to_pretty_string(&self) -> Result<String> {
        let mut reader = Reader::from_str(&self.text);
        let mut writer = Writer::new_with_indent(Vec::with_capacity(self.text.len()), b' ', 2);

        // Blank text right after a start tag, kept only if the element closes next
        let mut pending: Option<Event<'_>> = None;
        let mut after_start = false;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(Error::malformed(format!(
                        "XML read error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            };

            if let Some(blank) = pending.take() {
                if matches!(event, Event::End(_)) {
                    write_pretty(&mut writer, blank)?;
                }
            }

            let is_blank = matches!(&event, Event::Text(t) if t.iter().all(u8::is_ascii_whitespace));
            let is_start = matches!(event, Event::Start(_));

            match event {
                Event::Eof => break,
                event if is_blank => {
                    if after_start {
                        pending = Some(event);
                    }
                }
                event => write_pretty(&mut writer, event)?,
            }
            after_start = is_start;
        }

        let mut out = String::from_utf8(writer.into_inner())
            .map_err(|e| Error::malformed(format!("XML is not valid UTF-8: {}", e)))?;
        out.push('\n');
        Ok(out)
    }
}

fn write_pretty(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::malformed(format!("XML write error: {}", e)))
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument")
            .field("len", &self.text.len())
            .finish()
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
