//! # Taxonomy Rules
//!
//! Subject hierarchy validation and provider allow-lists.
//!
//! A provider's `subjects_acceptable` entries are hierarchy paths. A
//! subject is acceptable when it appears on one of those paths, or when
//! its parent or grandparent ends a path whose `include_children` flag is
//! set. An empty allow-list accepts every subject.

use crate::model::{Provider, Subject};
use crate::primitives::{MAX_SUBJECT_DEPTH, MAX_SUBJECT_GROUPS};
use crate::store::Store;
use crate::types::{QuireError, SubjectId};
use std::collections::BTreeSet;

/// Precomputed allow-list view of a provider.
#[derive(Debug, Clone, Default)]
pub struct SubjectRules {
    restricted: bool,
    allowed: BTreeSet<SubjectId>,
    allows_children: BTreeSet<SubjectId>,
}

impl SubjectRules {
    /// Build the rules for `provider`; `None` accepts everything.
    #[must_use]
    pub fn for_provider(provider: Option<&Provider>) -> Self {
        let Some(provider) = provider else {
            return Self::default();
        };
        let mut rules = Self {
            restricted: !provider.subjects_acceptable.is_empty(),
            ..Self::default()
        };
        for entry in &provider.subjects_acceptable {
            rules.allowed.extend(entry.path.iter().cloned());
            if entry.include_children {
                if let Some(last) = entry.path.last() {
                    rules.allows_children.insert(last.clone());
                }
            }
        }
        rules
    }

    /// Whether the provider restricts subjects at all.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Check a subject, walking up to two ancestor levels through `store`.
    pub fn accepts(&self, store: &impl Store, subject: &Subject) -> Result<bool, QuireError> {
        if !self.restricted || self.allowed.contains(&subject.id) {
            return Ok(true);
        }
        for parent_id in &subject.parents {
            if self.allows_children.contains(parent_id) {
                return Ok(true);
            }
            let Some(parent) = store.get::<Subject>(parent_id.as_str())? else {
                continue;
            };
            if parent
                .parents
                .iter()
                .any(|grandparent| self.allows_children.contains(grandparent))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Validate one hierarchy group and return the loaded subjects.
///
/// The group must be a root-to-leaf path: the first subject is top-level
/// and every later subject lists its predecessor as a parent.
pub fn validate_hierarchy(
    store: &impl Store,
    group: &[SubjectId],
) -> Result<Vec<Subject>, QuireError> {
    if group.is_empty() {
        return Err(QuireError::InvalidSubject(
            "subject group must not be empty".to_string(),
        ));
    }
    if group.len() > MAX_SUBJECT_DEPTH {
        return Err(QuireError::InvalidSubject(format!(
            "subject hierarchy deeper than {} levels",
            MAX_SUBJECT_DEPTH
        )));
    }

    let mut subjects: Vec<Subject> = Vec::with_capacity(group.len());
    for id in group {
        let subject = store
            .get::<Subject>(id.as_str())?
            .ok_or_else(|| QuireError::InvalidSubject(format!("unknown subject {}", id)))?;

        match subjects.last() {
            None if !subject.is_top_level() => {
                return Err(QuireError::InvalidSubject(format!(
                    "{} is not a top-level subject",
                    subject.id
                )));
            }
            Some(previous) if !subject.parents.contains(&previous.id) => {
                return Err(QuireError::InvalidSubject(format!(
                    "{} is not a child of {}",
                    subject.id, previous.id
                )));
            }
            _ => {}
        }
        subjects.push(subject);
    }
    Ok(subjects)
}

/// Validate every group against the hierarchy and the provider allow-list.
pub fn validate_groups(
    store: &impl Store,
    provider: Option<&Provider>,
    groups: &[Vec<SubjectId>],
) -> Result<(), QuireError> {
    if groups.len() > MAX_SUBJECT_GROUPS {
        return Err(QuireError::InvalidSubject(format!(
            "at most {} subject groups are allowed",
            MAX_SUBJECT_GROUPS
        )));
    }
    let rules = SubjectRules::for_provider(provider);
    for group in groups {
        for subject in validate_hierarchy(store, group)? {
            if !rules.accepts(store, &subject)? {
                return Err(QuireError::InvalidSubject(format!(
                    "{} is not acceptable for this provider",
                    subject.text
                )));
            }
        }
    }
    Ok(())
}

fn sorted(mut subjects: Vec<Subject>) -> Vec<Subject> {
    subjects.sort_by(|a, b| a.text.cmp(&b.text).then_with(|| a.id.cmp(&b.id)));
    subjects
}

fn filter_acceptable(
    store: &impl Store,
    rules: &SubjectRules,
    candidates: Vec<Subject>,
) -> Result<Vec<Subject>, QuireError> {
    let mut out = Vec::new();
    for subject in candidates {
        if rules.accepts(store, &subject)? {
            out.push(subject);
        }
    }
    Ok(sorted(out))
}

/// Every subject the provider accepts, sorted by text.
pub fn all_subjects(store: &impl Store, provider: &Provider) -> Result<Vec<Subject>, QuireError> {
    let rules = SubjectRules::for_provider(Some(provider));
    filter_acceptable(store, &rules, store.all::<Subject>()?)
}

/// Top-level subjects the provider accepts, sorted by text.
pub fn top_level_subjects(
    store: &impl Store,
    provider: &Provider,
) -> Result<Vec<Subject>, QuireError> {
    let rules = SubjectRules::for_provider(Some(provider));
    let candidates = store
        .all::<Subject>()?
        .into_iter()
        .filter(Subject::is_top_level)
        .collect();
    filter_acceptable(store, &rules, candidates)
}

/// Direct children of `parent` the provider accepts, sorted by text.
pub fn children_of(
    store: &impl Store,
    provider: &Provider,
    parent: &SubjectId,
) -> Result<Vec<Subject>, QuireError> {
    let rules = SubjectRules::for_provider(Some(provider));
    let candidates = store
        .all::<Subject>()?
        .into_iter()
        .filter(|s| s.parents.contains(parent))
        .collect();
    filter_acceptable(store, &rules, candidates)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AcceptableSubject;
    use crate::store::MemoryStore;

    struct Tree {
        store: MemoryStore,
        biology: Subject,
        genetics: Subject,
        epigenetics: Subject,
        physics: Subject,
        optics: Subject,
    }

    fn tree() -> Tree {
        let mut store = MemoryStore::new();
        let biology = Subject::new("Biology");
        let genetics = Subject::child_of("Genetics", &biology.id);
        let epigenetics = Subject::child_of("Epigenetics", &genetics.id);
        let physics = Subject::new("Physics");
        let optics = Subject::child_of("Optics", &physics.id);
        for s in [&biology, &genetics, &epigenetics, &physics, &optics] {
            store.put(s).expect("put");
        }
        Tree {
            store,
            biology,
            genetics,
            epigenetics,
            physics,
            optics,
        }
    }

    #[test]
    fn valid_hierarchy_path() {
        let t = tree();
        let group = vec![
            t.biology.id.clone(),
            t.genetics.id.clone(),
            t.epigenetics.id.clone(),
        ];
        let subjects = validate_hierarchy(&t.store, &group).expect("valid");
        assert_eq!(subjects.len(), 3);
    }

    #[test]
    fn broken_hierarchy_rejected() {
        let t = tree();
        let group = vec![t.physics.id.clone(), t.genetics.id.clone()];
        assert!(matches!(
            validate_hierarchy(&t.store, &group),
            Err(QuireError::InvalidSubject(_))
        ));
    }

    #[test]
    fn group_must_start_at_root() {
        let t = tree();
        let group = vec![t.genetics.id.clone()];
        assert!(validate_hierarchy(&t.store, &group).is_err());
    }

    #[test]
    fn unknown_subject_rejected() {
        let t = tree();
        let group = vec![SubjectId::new("missing")];
        assert!(validate_hierarchy(&t.store, &group).is_err());
    }

    #[test]
    fn unrestricted_provider_accepts_all() {
        let t = tree();
        let provider = Provider::new("osf", "OSF");
        assert_eq!(all_subjects(&t.store, &provider).expect("all").len(), 5);
        let top: Vec<String> = top_level_subjects(&t.store, &provider)
            .expect("top")
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(top, vec!["Biology", "Physics"]);
    }

    #[test]
    fn allow_list_with_children() {
        let t = tree();
        let mut provider = Provider::new("bio", "BioArxiv");
        provider.subjects_acceptable.push(AcceptableSubject {
            path: vec![t.biology.id.clone()],
            include_children: true,
        });

        let rules = SubjectRules::for_provider(Some(&provider));
        assert!(rules.accepts(&t.store, &t.biology).expect("accepts"));
        assert!(rules.accepts(&t.store, &t.genetics).expect("accepts"));
        // Grandchild accepted through the grandparent.
        assert!(rules.accepts(&t.store, &t.epigenetics).expect("accepts"));
        assert!(!rules.accepts(&t.store, &t.physics).expect("accepts"));
        assert!(!rules.accepts(&t.store, &t.optics).expect("accepts"));
    }

    #[test]
    fn allow_list_without_children() {
        let t = tree();
        let mut provider = Provider::new("phys", "PhysArxiv");
        provider.subjects_acceptable.push(AcceptableSubject {
            path: vec![t.physics.id.clone()],
            include_children: false,
        });

        assert!(children_of(&t.store, &provider, &t.physics.id)
            .expect("children")
            .is_empty());

        let groups = vec![vec![t.physics.id.clone(), t.optics.id.clone()]];
        assert!(validate_groups(&t.store, Some(&provider), &groups).is_err());

        let groups = vec![vec![t.physics.id.clone()]];
        assert!(validate_groups(&t.store, Some(&provider), &groups).is_ok());
    }
}
