//! XPath evaluation over XML documents.

use std::fmt;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};

use super::document::XmlDocument;
use super::namespaces::BindingSet;
use crate::error::{QueryError, Result};

/// Kind of a matched node that is neither an element nor a namespace.
///
/// [`tag`](Self::tag) gives the DOM `nodeType` number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Attribute,
    Text,
    ProcessingInstruction,
    Comment,
    Document,
}

impl NodeKind {
    /// DOM node type number.
    pub fn tag(self) -> u8 {
        match self {
            NodeKind::Attribute => 2,
            NodeKind::Text => 3,
            NodeKind::ProcessingInstruction => 7,
            NodeKind::Comment => 8,
            NodeKind::Document => 9,
        }
    }
}

/// Summary of one node selected by an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedNode {
    /// A namespace declaration in scope on `owner_name`.
    Namespace {
        prefix: String,
        uri: String,
        owner_namespace: Option<String>,
        owner_name: String,
    },

    /// An element.
    Element {
        namespace: Option<String>,
        local_name: String,
    },

    /// Anything else.
    Other { name: String, kind: NodeKind },
}

impl fmt::Display for MatchedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedNode::Namespace {
                prefix,
                uri,
                owner_namespace: Some(ns),
                owner_name,
            } => write!(
                f,
                "= namespace \"{}\"=\"{}\" for node {}:{}",
                prefix, uri, ns, owner_name
            ),
            MatchedNode::Namespace {
                prefix,
                uri,
                owner_namespace: None,
                owner_name,
            } => write!(
                f,
                "= namespace \"{}\"=\"{}\" for node {}",
                prefix, uri, owner_name
            ),
            MatchedNode::Element {
                namespace: Some(ns),
                local_name,
            } => write!(f, "= element node \"{}:{}\"", ns, local_name),
            MatchedNode::Element {
                namespace: None,
                local_name,
            } => write!(f, "= element node \"{}\"", local_name),
            MatchedNode::Other { name, kind } => {
                write!(f, "= node \"{}\": type {}", name, kind.tag())
            }
        }
    }
}

/// Nodes selected by an expression, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: Vec<MatchedNode>,
}

impl NodeSet {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchedNode> {
        self.nodes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&MatchedNode> {
        self.nodes.get(index)
    }
}

impl fmt::Display for NodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Result ({} nodes):", self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "{}", node)?;
        }
        Ok(())
    }
}

/// Evaluate `expression` against `document`.
///
/// Prefixes used in the expression resolve through `bindings`. An empty
/// prefix cannot be registered and is reported as a query error. So is
/// an expression that fails to compile or evaluate, or whose value is not
/// a node-set.
pub fn evaluate(document: &XmlDocument, expression: &str, bindings: &BindingSet) -> Result<NodeSet> {
    let mut context = Context::new();
    for (prefix, uri) in bindings.iter() {
        if prefix.is_empty() {
            return Err(QueryError::Namespace {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
            }
            .into());
        }
        context.set_namespace(prefix, uri);
    }

    if let Some(prefix) = undefined_prefix(expression, bindings) {
        return Err(QueryError::UndefinedPrefix {
            prefix,
            expression: expression.to_string(),
        }
        .into());
    }

    let factory = Factory::new();
    let xpath = factory
        .build(expression)
        .map_err(|e| QueryError::Compile {
            expression: expression.to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| QueryError::Compile {
            expression: expression.to_string(),
            message: "empty expression".to_string(),
        })?;

    let package = document.package()?;
    let doc = package.as_document();

    let value = xpath
        .evaluate(&context, doc.root())
        .map_err(|e| QueryError::Evaluate {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;

    let nodeset = match value {
        Value::Nodeset(nodeset) => nodeset,
        _ => {
            return Err(QueryError::NotANodeSet {
                expression: expression.to_string(),
            }
            .into());
        }
    };

    let nodes: Vec<MatchedNode> = nodeset.document_order().into_iter().map(summarize).collect();
    debug!("xpath {:?} matched {} nodes", expression, nodes.len());

    Ok(NodeSet { nodes })
}

/// `prefix:name` or `prefix:*` outside of string literals. `axis::` never
/// matches because the character after the first colon must start a name.
static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_.\-]*):[A-Za-z_*]").expect("static regex")
});

/// First prefix used in `expression` that `bindings` does not declare.
fn undefined_prefix(expression: &str, bindings: &BindingSet) -> Option<String> {
    let mut unquoted = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    for c in expression.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                unquoted.push(' ');
            }
            None => unquoted.push(c),
        }
    }

    QUALIFIED_NAME
        .captures_iter(&unquoted)
        .map(|caps| caps[1].to_string())
        .find(|prefix| bindings.get(prefix).is_none())
}

fn summarize(node: Node<'_>) -> MatchedNode {
    match node {
        Node::Namespace(ns) => {
            let (owner_namespace, owner_name) = match node.parent() {
                Some(Node::Element(owner)) => {
                    let name = owner.name();
                    (
                        name.namespace_uri().map(str::to_string),
                        name.local_part().to_string(),
                    )
                }
                _ => (None, String::new()),
            };
            MatchedNode::Namespace {
                prefix: ns.prefix().to_string(),
                uri: ns.uri().to_string(),
                owner_namespace,
                owner_name,
            }
        }
        Node::Element(element) => {
            let name = element.name();
            MatchedNode::Element {
                namespace: name.namespace_uri().map(str::to_string),
                local_name: name.local_part().to_string(),
            }
        }
        Node::Attribute(attribute) => MatchedNode::Other {
            name: attribute.name().local_part().to_string(),
            kind: NodeKind::Attribute,
        },
        Node::Text(_) => MatchedNode::Other {
            name: "text".to_string(),
            kind: NodeKind::Text,
        },
        Node::Comment(_) => MatchedNode::Other {
            name: "comment".to_string(),
            kind: NodeKind::Comment,
        },
        Node::ProcessingInstruction(pi) => MatchedNode::Other {
            name: pi.target().to_string(),
            kind: NodeKind::ProcessingInstruction,
        },
        Node::Root(_) => MatchedNode::Other {
            name: "#document".to_string(),
            kind: NodeKind::Document,
        },
    }
}
