//! # Preprint Formatter
//!
//! Turns a [`PreprintSnapshot`] into a [`MetadataGraph`].
//!
//! The formatter trusts its input: it does not re-validate entities, it
//! only describes them. Node order is fixed (preprint, identifiers,
//! people, tags, subjects), so two calls on the same snapshot differ only
//! in blank ids.

use super::graph::{
    AgentIdentifierNode, ContributorNode, CreatorNode, GraphNode, MetadataGraph, NodeKind,
    NodeRef, PersonNode, PreprintNode, SubjectNode, TagNode, ThroughSubjectsNode,
    ThroughTagsNode, WorkIdentifierNode, blank_id,
};
use crate::model::{Contributor, File, Preprint, PreprintProjection, Project, Subject, User};
use crate::primitives::{DOI_RESOLVER, QA_TEST_TAG};
use crate::settings::Settings;
use crate::types::QuireError;
use chrono::{DateTime, SecondsFormat, Utc};

/// Everything the formatter reads, loaded up front.
#[derive(Debug, Clone)]
pub struct PreprintSnapshot {
    pub preprint: Preprint,
    pub project: Project,
    pub primary_file: Option<File>,
    /// Contributors in contribution order with their user records.
    pub contributors: Vec<(Contributor, User)>,
    /// Distinct subjects across all groups, in first-seen order.
    pub subjects: Vec<Subject>,
}

impl PreprintSnapshot {
    /// Whether the indexer should treat the preprint as removed.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        let projection = PreprintProjection::compute(
            &self.preprint,
            &self.project,
            self.primary_file.as_ref(),
        );
        !(self.preprint.is_published && self.project.is_public)
            || projection.is_preprint_orphan
            || self.project.is_deleted
            || self.project.has_tag(QA_TEST_TAG)
    }
}

/// Formatting options.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Public base URL used for canonical and profile URLs.
    pub domain: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            domain: Settings::default().domain,
        }
    }
}

impl From<&Settings> for FormatOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            domain: settings.domain.clone(),
        }
    }
}

impl FormatOptions {
    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.domain.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Format one preprint into its metadata graph.
pub fn format_preprint(
    snapshot: &PreprintSnapshot,
    options: &FormatOptions,
) -> Result<MetadataGraph, QuireError> {
    let preprint = &snapshot.preprint;
    let project = &snapshot.project;
    let mut nodes = Vec::new();

    let work = GraphNode::Preprint(PreprintNode {
        id: blank_id(),
        title: project.title.clone(),
        description: project.description.clone(),
        is_deleted: snapshot.is_deleted(),
        date_updated: timestamp(preprint.date_modified),
        date_published: preprint.date_published.map(timestamp),
    });
    let work_ref = work.to_ref();
    nodes.push(work);

    // Work identifiers
    let mut work_uris = Vec::new();
    if let Some(doi) = preprint.article_doi.as_deref().filter(|d| !d.is_empty()) {
        work_uris.push(format!("{}{}", DOI_RESOLVER, doi));
    }
    work_uris.push(options.url(&preprint.url()));
    for uri in work_uris {
        nodes.push(GraphNode::WorkIdentifier(WorkIdentifierNode {
            id: blank_id(),
            uri,
            creative_work: work_ref.clone(),
        }));
    }

    // People
    let mut order_cited = 0;
    for (contributor, user) in &snapshot.contributors {
        let person = GraphNode::Person(PersonNode {
            id: blank_id(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            additional_name: non_empty(&user.middle_names),
            suffix: non_empty(&user.suffix),
        });
        let agent = person.to_ref();
        nodes.push(person);

        let mut agent_uris: Vec<String> = user.emails.iter().map(|e| format!("mailto:{}", e)).collect();
        agent_uris.push(user.profile_image_url());
        if user.is_registered {
            agent_uris.push(options.url(&user.profile_url()));
        }
        for uri in agent_uris {
            nodes.push(GraphNode::AgentIdentifier(AgentIdentifierNode {
                id: blank_id(),
                uri,
                agent: agent.clone(),
            }));
        }

        if contributor.visible {
            nodes.push(GraphNode::Creator(CreatorNode {
                id: blank_id(),
                agent,
                creative_work: work_ref.clone(),
                cited_as: user.fullname.clone(),
                order_cited,
            }));
            order_cited += 1;
        } else {
            nodes.push(GraphNode::Contributor(ContributorNode {
                id: blank_id(),
                agent,
                creative_work: work_ref.clone(),
                cited_as: user.fullname.clone(),
            }));
        }
    }

    // Tags
    let mut seen_tags: Vec<&str> = Vec::new();
    for name in &project.tags {
        if seen_tags.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            continue;
        }
        seen_tags.push(name);
        let tag_id = blank_id();
        let tag_ref = NodeRef::new(&tag_id, NodeKind::Tag);
        nodes.push(GraphNode::Tag(TagNode {
            id: tag_id,
            name: name.clone(),
        }));
        nodes.push(GraphNode::ThroughTags(ThroughTagsNode {
            id: blank_id(),
            tag: tag_ref,
            creative_work: work_ref.clone(),
        }));
    }

    // Subjects
    let mut seen_subjects = Vec::new();
    for subject in &snapshot.subjects {
        if seen_subjects.contains(&&subject.id) {
            continue;
        }
        seen_subjects.push(&subject.id);
        let subject_id = blank_id();
        let subject_ref = NodeRef::new(&subject_id, NodeKind::Subject);
        nodes.push(GraphNode::Subject(SubjectNode {
            id: subject_id,
            name: subject.text.clone(),
        }));
        nodes.push(GraphNode::ThroughSubjects(ThroughSubjectsNode {
            id: blank_id(),
            subject: subject_ref,
            creative_work: work_ref.clone(),
        }));
    }

    MetadataGraph::new(nodes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Permission;

    fn snapshot() -> PreprintSnapshot {
        let now = Utc::now();
        let author = User::registered("Ada Lovelace", "ada@example.com", now);
        let mut project = Project::new("Analytical Engines", &author.id, now);
        project.is_public = true;
        let file = File::new(&project.id, "paper.pdf");
        let mut preprint = Preprint::new(&project.id, None, now);
        preprint.primary_file = Some(file.id.clone());
        preprint.is_published = true;
        preprint.date_published = Some(now);

        let contributor = project.contributors[0].clone();
        PreprintSnapshot {
            preprint,
            project,
            primary_file: Some(file),
            contributors: vec![(contributor, author)],
            subjects: Vec::new(),
        }
    }

    #[test]
    fn published_public_preprint_is_live() {
        let snap = snapshot();
        assert!(!snap.is_deleted());
    }

    #[test]
    fn qa_tag_marks_deleted() {
        let mut snap = snapshot();
        snap.project.tags.push("QATest".to_string());
        assert!(snap.is_deleted());
    }

    #[test]
    fn private_project_marks_deleted() {
        let mut snap = snapshot();
        snap.project.is_public = false;
        assert!(snap.is_deleted());
    }

    #[test]
    fn non_bibliographic_contributor_gets_contributor_node() {
        let mut snap = snapshot();
        let helper = User::unregistered("Charles Babbage");
        snap.contributors.push((
            Contributor {
                user: helper.id.clone(),
                permission: Permission::Read,
                visible: false,
            },
            helper,
        ));

        let graph = format_preprint(&snap, &FormatOptions::default()).expect("format");
        assert_eq!(graph.of_kind(NodeKind::Creator).count(), 1);
        assert_eq!(graph.of_kind(NodeKind::Contributor).count(), 1);
        assert_eq!(graph.of_kind(NodeKind::Person).count(), 2);
    }

    #[test]
    fn untagged_unclassified_preprint_has_no_tag_or_subject_nodes() {
        let graph = format_preprint(&snapshot(), &FormatOptions::default()).expect("format");
        for kind in [
            NodeKind::Tag,
            NodeKind::ThroughTags,
            NodeKind::Subject,
            NodeKind::ThroughSubjects,
        ] {
            assert_eq!(graph.of_kind(kind).count(), 0, "{:?}", kind);
        }
    }

    #[test]
    fn unpublished_preprint_omits_date_published() {
        let mut snap = snapshot();
        snap.preprint.date_published = None;
        let graph = format_preprint(&snap, &FormatOptions::default()).expect("format");
        let json = serde_json::to_value(&graph).expect("json");
        assert!(json[0].get("date_published").is_none());
    }
}
