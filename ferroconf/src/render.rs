//! Output rendering.
//!
//! Everything is rendered into a `String` first and written in one go,
//! so a failed query or a failed reply never leaves partial output
//! behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::reply::DecodedReply;
use crate::xml::{BindingSet, XmlDocument, evaluate};

/// Where rendered output goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Sink {
    #[default]
    Stdout,
    File(PathBuf),
}

impl Sink {
    /// `File` when a path is given, `Stdout` otherwise.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(Sink::File).unwrap_or_default()
    }

    /// Write `text` to the sink.
    pub fn write(&self, text: &str) -> Result<()> {
        match self {
            Sink::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            Sink::File(path) => {
                fs::write(path, text)?;
                debug!("wrote {} bytes to {}", text.len(), path.display());
            }
        }
        Ok(())
    }
}

/// Render a document, or the nodes `expression` selects from it.
pub fn render_to_string(
    document: &XmlDocument,
    expression: Option<&str>,
    bindings: &BindingSet,
) -> Result<String> {
    match expression {
        None => document.to_pretty_string(),
        Some(expression) => Ok(evaluate(document, expression, bindings)?.to_string()),
    }
}

/// Render into `out`.
pub fn render<W: Write>(
    document: &XmlDocument,
    expression: Option<&str>,
    bindings: &BindingSet,
    out: &mut W,
) -> Result<()> {
    let text = render_to_string(document, expression, bindings)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Render a decoded reply.
///
/// Without an expression a typed reply prints its payload (when there is
/// one) followed by its envelope. With an expression the payload is
/// queried when present, the envelope otherwise.
pub fn render_reply_to_string(
    reply: &DecodedReply,
    expression: Option<&str>,
    bindings: &BindingSet,
) -> Result<String> {
    match (reply, expression) {
        (DecodedReply::Raw(document), _) => render_to_string(document, expression, bindings),
        (DecodedReply::Typed { envelope, payload }, None) => {
            let mut text = match payload {
                Some(payload) => payload.to_pretty_string()?,
                None => String::new(),
            };
            text.push_str(&envelope.document.to_pretty_string()?);
            Ok(text)
        }
        (DecodedReply::Typed { envelope, payload }, Some(_)) => {
            let target = payload.as_ref().unwrap_or(&envelope.document);
            render_to_string(target, expression, bindings)
        }
    }
}

/// Write a document's text, unformatted, to `path`.
pub fn write_document(document: &XmlDocument, path: &Path) -> Result<()> {
    fs::write(path, document.as_str())?;
    debug!("saved document to {}", path.display());
    Ok(())
}
