//! # Read Queries
//!
//! Listings and visibility checks over the record store. Pure reads: no
//! query mutates a record.

use crate::model::{License, Preprint, Project, Provider};
use crate::primitives::NATIVE_PROVIDER_ID;
use crate::store::Store;
use crate::types::{Permission, ProjectId, ProviderId, QuireError, UserId};

/// Whether `viewer` may see `preprint` in listings and detail views.
///
/// Anonymous viewers see published preprints on public projects. Signed-in
/// viewers additionally see published preprints on projects they can
/// read, and every preprint on projects they administer. Preprints on
/// deleted projects are never visible.
#[must_use]
pub fn preprint_visible_to(preprint: &Preprint, project: &Project, viewer: Option<&UserId>) -> bool {
    if project.is_deleted {
        return false;
    }
    if preprint.is_published && project.is_public {
        return true;
    }
    match viewer {
        None => false,
        Some(user) => {
            project.is_admin(user)
                || (preprint.is_published && project.has_permission(user, Permission::Read))
        }
    }
}

/// Preprints of `provider` visible to `viewer`, newest first.
pub fn provider_preprints(
    store: &impl Store,
    provider: &ProviderId,
    viewer: Option<&UserId>,
) -> Result<Vec<Preprint>, QuireError> {
    let mut out = Vec::new();
    for preprint in store.all::<Preprint>()? {
        if preprint.provider.as_ref() != Some(provider) {
            continue;
        }
        let Some(project) = store.get::<Project>(preprint.node.as_str())? else {
            continue;
        };
        if preprint_visible_to(&preprint, &project, viewer) {
            out.push(preprint);
        }
    }
    out.sort_by(|a, b| {
        b.date_created
            .cmp(&a.date_created)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(out)
}

/// Licenses a provider accepts; every license when it names none.
pub fn provider_licenses(store: &impl Store, provider: &Provider) -> Result<Vec<License>, QuireError> {
    let mut licenses = if provider.licenses_acceptable.is_empty() {
        store.all::<License>()?
    } else {
        let mut out = Vec::with_capacity(provider.licenses_acceptable.len());
        for id in &provider.licenses_acceptable {
            if let Some(license) = store.get::<License>(id.as_str())? {
                out.push(license);
            }
        }
        out
    };
    licenses.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(licenses)
}

/// Every provider, sorted by name.
pub fn providers_by_name(store: &impl Store) -> Result<Vec<Provider>, QuireError> {
    let mut providers = store.all::<Provider>()?;
    providers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(providers)
}

/// The preprint attached to `project`, if any.
pub fn preprint_for_project(
    store: &impl Store,
    project: &ProjectId,
) -> Result<Option<Preprint>, QuireError> {
    Ok(store
        .all::<Preprint>()?
        .into_iter()
        .find(|p| &p.node == project))
}

/// Branding of the preprint attached to `project`.
///
/// Returns `("osf", name)` for the native service, `("branded", name)`
/// for any other provider, and `None` when the project carries no
/// preprint with a known provider.
pub fn find_preprint_provider(
    store: &impl Store,
    project: &ProjectId,
) -> Result<Option<(&'static str, String)>, QuireError> {
    let Some(preprint) = preprint_for_project(store, project)? else {
        return Ok(None);
    };
    let Some(provider_id) = preprint.provider else {
        return Ok(None);
    };
    let Some(provider) = store.get::<Provider>(provider_id.as_str())? else {
        return Ok(None);
    };
    let kind = if provider.id.as_str() == NATIVE_PROVIDER_ID {
        "osf"
    } else {
        "branded"
    };
    Ok(Some((kind, provider.name)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    struct Fixture {
        store: MemoryStore,
        admin: User,
        reader: User,
        stranger: User,
    }

    fn fixture() -> Fixture {
        let now = Utc::now();
        Fixture {
            store: MemoryStore::new(),
            admin: User::registered("Admin", "admin@example.com", now),
            reader: User::registered("Reader", "reader@example.com", now),
            stranger: User::registered("Stranger", "stranger@example.com", now),
        }
    }

    fn add_preprint(
        f: &mut Fixture,
        provider: &str,
        published: bool,
        public: bool,
        age_days: i64,
    ) -> Preprint {
        let now = Utc::now() - Duration::days(age_days);
        let mut project = Project::new("Project", &f.admin.id, now);
        project.is_public = public;
        project.add_contributor(&f.reader.id, Permission::Read, true, None, now);
        let mut preprint = Preprint::new(&project.id, Some(ProviderId::new(provider)), now);
        preprint.is_published = published;
        f.store.put(&project).expect("put");
        f.store.put(&preprint).expect("put");
        preprint
    }

    #[test]
    fn anonymous_sees_published_public_only() {
        let mut f = fixture();
        let live = add_preprint(&mut f, "osf", true, true, 0);
        add_preprint(&mut f, "osf", true, false, 0);
        add_preprint(&mut f, "osf", false, true, 0);

        let listed = provider_preprints(&f.store, &ProviderId::new("osf"), None).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
    }

    #[test]
    fn contributor_sees_published_private() {
        let mut f = fixture();
        add_preprint(&mut f, "osf", true, false, 0);
        add_preprint(&mut f, "osf", false, false, 0);

        let provider = ProviderId::new("osf");
        let reader = provider_preprints(&f.store, &provider, Some(&f.reader.id)).expect("list");
        assert_eq!(reader.len(), 1);
        let admin = provider_preprints(&f.store, &provider, Some(&f.admin.id)).expect("list");
        assert_eq!(admin.len(), 2);
        let stranger = provider_preprints(&f.store, &provider, Some(&f.stranger.id)).expect("list");
        assert!(stranger.is_empty());
    }

    #[test]
    fn listing_filters_provider_and_sorts_newest_first() {
        let mut f = fixture();
        let old = add_preprint(&mut f, "osf", true, true, 3);
        let new = add_preprint(&mut f, "osf", true, true, 1);
        add_preprint(&mut f, "socarxiv", true, true, 0);

        let listed = provider_preprints(&f.store, &ProviderId::new("osf"), None).expect("list");
        let ids: Vec<_> = listed.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[test]
    fn deleted_project_hidden_from_admin() {
        let mut f = fixture();
        let preprint = add_preprint(&mut f, "osf", true, true, 0);
        let mut project: Project = f.store.require(preprint.node.as_str()).expect("project");
        project.is_deleted = true;
        f.store.put(&project).expect("put");

        let listed =
            provider_preprints(&f.store, &ProviderId::new("osf"), Some(&f.admin.id)).expect("list");
        assert!(listed.is_empty());
    }

    #[test]
    fn licenses_default_to_all() {
        let mut store = MemoryStore::new();
        let cc = License::new("CC-By Attribution 4.0 International");
        let mit = License::new("MIT License");
        store.put(&cc).expect("put");
        store.put(&mit).expect("put");

        let mut provider = Provider::new("osf", "OSF");
        assert_eq!(provider_licenses(&store, &provider).expect("all").len(), 2);

        provider.licenses_acceptable.push(mit.id.clone());
        let licenses = provider_licenses(&store, &provider).expect("some");
        assert_eq!(licenses, vec![mit]);
    }

    #[test]
    fn find_provider_branding() {
        let mut f = fixture();
        f.store.put(&Provider::new("osf", "Open Science Framework")).expect("put");
        f.store.put(&Provider::new("socarxiv", "SocArXiv")).expect("put");

        let native = add_preprint(&mut f, "osf", true, true, 0);
        let branded = add_preprint(&mut f, "socarxiv", true, true, 0);

        assert_eq!(
            find_preprint_provider(&f.store, &native.node).expect("find"),
            Some(("osf", "Open Science Framework".to_string()))
        );
        assert_eq!(
            find_preprint_provider(&f.store, &branded.node).expect("find"),
            Some(("branded", "SocArXiv".to_string()))
        );
        assert_eq!(
            find_preprint_provider(&f.store, &ProjectId::new("none0")).expect("find"),
            None
        );
    }
}
