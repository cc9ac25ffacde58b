//! # Metadata Export
//!
//! Graph formatting for the external scholarly index and the envelope the
//! index expects on its push endpoint.

mod formatter;
mod graph;

pub use formatter::{FormatOptions, PreprintSnapshot, format_preprint};
pub use graph::{
    AgentIdentifierNode, ContributorNode, CreatorNode, GraphNode, MetadataGraph, NodeKind,
    NodeRef, PersonNode, PreprintNode, SubjectNode, TagNode, ThroughSubjectsNode,
    ThroughTagsNode, WorkIdentifierNode, blank_id,
};

use crate::types::QuireError;
use serde_json::{Value, json};

/// Wrap a graph in the `NormalizedData` push envelope.
pub fn envelope(graph: &MetadataGraph) -> Result<Value, QuireError> {
    let nodes =
        serde_json::to_value(graph).map_err(|e| QuireError::SerializationError(e.to_string()))?;
    Ok(json!({
        "data": {
            "type": "NormalizedData",
            "attributes": {
                "tasks": [],
                "raw": null,
                "data": {
                    "@graph": nodes,
                },
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let graph = MetadataGraph::new(vec![GraphNode::Tag(TagNode {
            id: "_:t".to_string(),
            name: "biology".to_string(),
        })])
        .expect("graph");

        let body = envelope(&graph).expect("envelope");
        assert_eq!(body["data"]["type"], "NormalizedData");
        assert_eq!(body["data"]["attributes"]["tasks"], json!([]));
        assert!(body["data"]["attributes"]["raw"].is_null());
        assert_eq!(body["data"]["attributes"]["data"]["@graph"][0]["@type"], "tag");
    }
}
