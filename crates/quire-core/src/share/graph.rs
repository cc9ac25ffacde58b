//! # Metadata Graph
//!
//! The node types exported to the indexer and the validated container
//! holding them.
//!
//! Every node carries a blank identifier (`_:<uuid>`). Edges are
//! `{"@id", "@type"}` references; [`MetadataGraph::new`] rejects duplicate
//! identifiers and references that do not resolve to a node of the
//! declared kind.

use crate::types::QuireError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Fresh blank node identifier.
#[must_use]
pub fn blank_id() -> String {
    format!("_:{}", uuid::Uuid::new_v4())
}

// =============================================================================
// KINDS & REFERENCES
// =============================================================================

/// Node kinds, serialized as the indexer's lowercase type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Preprint,
    Person,
    Creator,
    Contributor,
    Tag,
    ThroughTags,
    Subject,
    ThroughSubjects,
    WorkIdentifier,
    AgentIdentifier,
}

/// An edge to another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: NodeKind,
}

impl NodeRef {
    #[must_use]
    pub fn new(id: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
        }
    }
}

// =============================================================================
// NODES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprintNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_deleted: bool,
    pub date_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// A bibliographic contributor, cited in `order_cited` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub agent: NodeRef,
    pub creative_work: NodeRef,
    pub cited_as: String,
    pub order_cited: usize,
}

/// A non-bibliographic contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub agent: NodeRef,
    pub creative_work: NodeRef,
    pub cited_as: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughTagsNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub tag: NodeRef,
    pub creative_work: NodeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThroughSubjectsNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub subject: NodeRef,
    pub creative_work: NodeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkIdentifierNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub uri: String,
    pub creative_work: NodeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentIdentifierNode {
    #[serde(rename = "@id")]
    pub id: String,
    pub uri: String,
    pub agent: NodeRef,
}

/// A node of the exported graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type", rename_all = "lowercase")]
pub enum GraphNode {
    Preprint(PreprintNode),
    Person(PersonNode),
    Creator(CreatorNode),
    Contributor(ContributorNode),
    Tag(TagNode),
    ThroughTags(ThroughTagsNode),
    Subject(SubjectNode),
    ThroughSubjects(ThroughSubjectsNode),
    WorkIdentifier(WorkIdentifierNode),
    AgentIdentifier(AgentIdentifierNode),
}

impl GraphNode {
    /// The node's blank identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Preprint(n) => &n.id,
            Self::Person(n) => &n.id,
            Self::Creator(n) => &n.id,
            Self::Contributor(n) => &n.id,
            Self::Tag(n) => &n.id,
            Self::ThroughTags(n) => &n.id,
            Self::Subject(n) => &n.id,
            Self::ThroughSubjects(n) => &n.id,
            Self::WorkIdentifier(n) => &n.id,
            Self::AgentIdentifier(n) => &n.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Preprint(_) => NodeKind::Preprint,
            Self::Person(_) => NodeKind::Person,
            Self::Creator(_) => NodeKind::Creator,
            Self::Contributor(_) => NodeKind::Contributor,
            Self::Tag(_) => NodeKind::Tag,
            Self::ThroughTags(_) => NodeKind::ThroughTags,
            Self::Subject(_) => NodeKind::Subject,
            Self::ThroughSubjects(_) => NodeKind::ThroughSubjects,
            Self::WorkIdentifier(_) => NodeKind::WorkIdentifier,
            Self::AgentIdentifier(_) => NodeKind::AgentIdentifier,
        }
    }

    /// Outgoing edges of this node.
    #[must_use]
    pub fn references(&self) -> Vec<&NodeRef> {
        match self {
            Self::Preprint(_) | Self::Person(_) | Self::Tag(_) | Self::Subject(_) => Vec::new(),
            Self::Creator(n) => vec![&n.agent, &n.creative_work],
            Self::Contributor(n) => vec![&n.agent, &n.creative_work],
            Self::ThroughTags(n) => vec![&n.tag, &n.creative_work],
            Self::ThroughSubjects(n) => vec![&n.subject, &n.creative_work],
            Self::WorkIdentifier(n) => vec![&n.creative_work],
            Self::AgentIdentifier(n) => vec![&n.agent],
        }
    }

    /// A reference pointing at this node.
    #[must_use]
    pub fn to_ref(&self) -> NodeRef {
        NodeRef::new(self.id(), self.kind())
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// A validated, ordered list of graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetadataGraph {
    nodes: Vec<GraphNode>,
}

impl MetadataGraph {
    /// Validate and wrap `nodes`.
    pub fn new(nodes: Vec<GraphNode>) -> Result<Self, QuireError> {
        let mut kinds: BTreeMap<&str, NodeKind> = BTreeMap::new();
        for node in &nodes {
            if kinds.insert(node.id(), node.kind()).is_some() {
                return Err(QuireError::InvalidGraph(format!(
                    "duplicate node id {}",
                    node.id()
                )));
            }
        }

        for node in &nodes {
            for edge in node.references() {
                match kinds.get(edge.id.as_str()) {
                    None => {
                        return Err(QuireError::InvalidGraph(format!(
                            "{} references missing node {}",
                            node.id(),
                            edge.id
                        )));
                    }
                    Some(kind) if *kind != edge.kind => {
                        return Err(QuireError::InvalidGraph(format!(
                            "{} references {} as {:?}, found {:?}",
                            node.id(),
                            edge.id,
                            edge.kind,
                            kind
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self { nodes })
    }

    /// Iterate the nodes in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, GraphNode> {
        self.nodes.iter()
    }

    /// Nodes of one kind.
    pub fn of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Look a node up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }
}

impl<'a> IntoIterator for &'a MetadataGraph {
    type Item = &'a GraphNode;
    type IntoIter = std::slice::Iter<'a, GraphNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str) -> GraphNode {
        GraphNode::Tag(TagNode {
            id: id.to_string(),
            name: "biology".to_string(),
        })
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_value(tag("_:t")).expect("json");
        assert_eq!(json["@type"], "tag");
        assert_eq!(json["@id"], "_:t");

        let kind = serde_json::to_value(NodeKind::ThroughSubjects).expect("json");
        assert_eq!(kind, "throughsubjects");
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = MetadataGraph::new(vec![tag("_:a"), tag("_:a")]);
        assert!(matches!(result, Err(QuireError::InvalidGraph(_))));
    }

    #[test]
    fn dangling_reference_rejected() {
        let through = GraphNode::ThroughTags(ThroughTagsNode {
            id: "_:tt".to_string(),
            tag: NodeRef::new("_:t", NodeKind::Tag),
            creative_work: NodeRef::new("_:missing", NodeKind::Preprint),
        });
        assert!(MetadataGraph::new(vec![tag("_:t"), through]).is_err());
    }

    #[test]
    fn wrong_kind_reference_rejected() {
        let through = GraphNode::ThroughTags(ThroughTagsNode {
            id: "_:tt".to_string(),
            tag: NodeRef::new("_:t", NodeKind::Subject),
            creative_work: NodeRef::new("_:t", NodeKind::Tag),
        });
        assert!(MetadataGraph::new(vec![tag("_:t"), through]).is_err());
    }

    #[test]
    fn blank_ids_are_unique() {
        assert_ne!(blank_id(), blank_id());
        assert!(blank_id().starts_with("_:"));
    }
}
