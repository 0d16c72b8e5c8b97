//! XML documents, namespace bindings, and XPath queries.

mod document;
pub mod namespaces;
pub mod query;

pub use document::XmlDocument;
pub use namespaces::BindingSet;
pub use query::{MatchedNode, NodeKind, NodeSet, evaluate};

/// NETCONF base namespace.
pub const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

#[cfg(test)]
pub(crate) use document::tests::shape;
