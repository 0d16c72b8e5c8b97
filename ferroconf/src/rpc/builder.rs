//! Builder turning user input into a [`Request`].

use std::path::PathBuf;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use super::datastore::Datastore;
use super::request::{Filter, Operation, Payload, Request};
use crate::error::{Error, Result};
use crate::xml::{BindingSet, XmlDocument};

/// Where the request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcInput {
    /// An operation name such as `get-config` or `get-system-information`.
    Command(String),

    /// Inline XML text.
    Xml(String),

    /// Path to a file holding XML.
    File(PathBuf),
}

/// XML element name, optionally prefixed.
static ELEMENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*(:[A-Za-z_][A-Za-z0-9_.\-]*)?$").expect("static regex")
});

/// Builder for constructing requests.
///
/// `get` takes one optional argument, an XPath filter. `get-config` takes
/// an optional datastore followed by an optional XPath filter. Any other
/// command, and XML input, becomes an untyped request.
///
/// # Example
///
/// ```rust
/// use ferroconf::rpc::{Datastore, Operation, Request, RequestBuilder, RpcInput};
///
/// let request = RequestBuilder::new(RpcInput::Command("get-config".into()))
///     .arg("candidate")
///     .build()
///     .unwrap();
///
/// assert_eq!(
///     request,
///     Request::Typed(Operation::GetConfig { source: Datastore::Candidate, filter: None })
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    input: RpcInput,
    args: Vec<String>,
    namespaces: BindingSet,
}

impl RequestBuilder {
    /// Create a new builder for the given input.
    pub fn new(input: RpcInput) -> Self {
        Self {
            input,
            args: Vec::new(),
            namespaces: BindingSet::new(),
        }
    }

    /// Append a positional operation argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several positional operation arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Namespace prefixes to declare on an embedded filter.
    pub fn namespaces(mut self, namespaces: BindingSet) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Build the request.
    ///
    /// Fails with an invalid-argument error for an unknown datastore, a
    /// format error for a command that is not an element name, and a
    /// malformed-input error for XML that cannot be read or parsed.
    pub fn build(self) -> Result<Request> {
        let request = match self.input {
            RpcInput::Command(ref command) => {
                let command = command.trim();
                match command {
                    "get" => {
                        self.warn_unused(1, command);
                        Request::Typed(Operation::Get {
                            filter: self.filter_arg(0),
                        })
                    }
                    "get-config" => {
                        self.warn_unused(2, command);
                        let source = Datastore::from_arg(self.args.first().map(String::as_str))?;
                        Request::Typed(Operation::GetConfig {
                            source,
                            filter: self.filter_arg(1),
                        })
                    }
                    _ => {
                        if !ELEMENT_NAME.is_match(command) {
                            return Err(Error::format(format!(
                                "'{}' is not a valid RPC name",
                                command
                            )));
                        }
                        self.warn_unused(0, command);
                        Request::Untyped(Payload::Command(command.to_string()))
                    }
                }
            }
            RpcInput::Xml(text) => Request::Untyped(Payload::Xml(XmlDocument::parse(text)?)),
            RpcInput::File(path) => {
                let document = XmlDocument::from_file(&path)?;
                Request::Untyped(Payload::Document { path, document })
            }
        };

        debug!("built {} request", request.describe());
        Ok(request)
    }

    fn filter_arg(&self, index: usize) -> Option<Filter> {
        self.args
            .get(index)
            .filter(|select| !select.is_empty())
            .map(|select| Filter::new(select.clone()).with_namespaces(self.namespaces.clone()))
    }

    fn warn_unused(&self, accepted: usize, command: &str) {
        if self.args.len() > accepted {
            warn!(
                "ignoring {} extra argument(s) to '{}': {:?}",
                self.args.len() - accepted,
                command,
                &self.args[accepted..]
            );
        }
    }
}
