//! # Institution Login
//!
//! Exchanges an institution login token for a platform user and a bearer
//! token. Users are resolved by username and created on first login.
//!
//! Failure is uniform: any decoding problem, an unknown institution or a
//! payload without a usable name is reported as
//! [`QuireError::AuthenticationFailed`], and nothing is written.

use crate::mail::{Mail, MailTemplate};
use crate::model::{AccessToken, Institution, User};
use crate::platform::Platform;
use crate::store::Store;
use crate::token::{InstitutionPayload, open_token};
use crate::types::{InstitutionId, QuireError};

/// Outcome of a successful institution login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstitutionLogin {
    pub user: User,
    pub institution: Institution,
    pub token: AccessToken,
    /// The user account was created by this login.
    pub created: bool,
}

fn some(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl Platform {
    /// Authenticate a raw institution login token.
    pub fn authenticate_institution(&mut self, token: &str) -> Result<InstitutionLogin, QuireError> {
        let payload = open_token(token, &self.settings.jwe_secret, &self.settings.jwt_secret)?;
        self.login_with_payload(&payload)
    }

    /// Authenticate an already decoded payload.
    pub fn login_with_payload(
        &mut self,
        payload: &InstitutionPayload,
    ) -> Result<InstitutionLogin, QuireError> {
        let provider = &payload.provider;
        let institution = self
            .backend
            .get::<Institution>(&provider.id)?
            .ok_or_else(|| {
                QuireError::AuthenticationFailed(format!(
                    "Invalid institution id specified \"{}\"",
                    provider.id
                ))
            })?;

        let claims = &provider.user;
        let username = some(&claims.username)
            .ok_or_else(|| QuireError::AuthenticationFailed("username missing".to_string()))?;
        let fullname = match (
            some(&claims.fullname),
            some(&claims.given_name),
            some(&claims.family_name),
        ) {
            (Some(full), _, _) => full.to_string(),
            (None, Some(given), Some(family)) => format!("{} {}", given, family),
            _ => {
                return Err(QuireError::AuthenticationFailed(
                    "fullname missing".to_string(),
                ));
            }
        };

        let now = self.now();
        let existing = self
            .backend
            .all::<User>()?
            .into_iter()
            .find(|u| u.username.as_deref() == Some(username));

        let (mut user, created) = match existing {
            Some(user) if user.is_disabled => {
                return Err(QuireError::AuthenticationFailed(
                    "user is disabled".to_string(),
                ));
            }
            Some(user) => (user, false),
            None => {
                let mut user = User::unregistered(fullname);
                if let Some(given) = some(&claims.given_name) {
                    user.given_name = given.to_string();
                }
                if let Some(middle) = some(&claims.middle_names) {
                    user.middle_names = middle.to_string();
                }
                if let Some(family) = some(&claims.family_name) {
                    user.family_name = family.to_string();
                }
                if let Some(suffix) = some(&claims.suffix) {
                    user.suffix = suffix.to_string();
                }
                user.register(username, now);
                user.date_last_login = Some(now);
                (user, true)
            }
        };

        if !user.is_affiliated_with(&institution.id) {
            user.affiliated_institutions.push(institution.id.clone());
        }
        self.backend.put(&user)?;

        if created {
            self.mailer.send(
                Mail::new(username, MailTemplate::WelcomeInstitution)
                    .with("fullname", user.fullname.clone())
                    .with("domain", self.settings.domain.clone())
                    .with("institution", institution.name.clone()),
            );
        }

        let token = self.issue_token(&user.id)?;
        Ok(InstitutionLogin {
            user,
            institution,
            token,
            created,
        })
    }

    /// Users affiliated with an institution.
    pub fn institution_users(&self, institution: &InstitutionId) -> Result<Vec<User>, QuireError> {
        Ok(self
            .backend
            .all::<User>()?
            .into_iter()
            .filter(|u| u.is_affiliated_with(institution))
            .collect())
    }
}
