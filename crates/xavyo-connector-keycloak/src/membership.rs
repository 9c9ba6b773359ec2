//! User lookup and group membership changes.

use reqwest::{Method, StatusCode};
use tracing::{debug, instrument, warn};

use crate::client::{read_body, segment, AdminClient};
use crate::context::ReconcileContext;
use crate::error::{KeycloakError, KeycloakResult};
use crate::ledger::ErrorLedger;
use crate::models::UserRepresentation;
use crate::sink::OperatorSink;

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Add,
    Remove,
}

impl MembershipChange {
    fn method(self) -> Method {
        match self {
            Self::Add => Method::PUT,
            Self::Remove => Method::DELETE,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

/// Counts from one membership pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembershipOutcome {
    pub applied: usize,
    pub failed: usize,
}

impl AdminClient {
    /// Find the id of the user with exactly this username.
    ///
    /// With several hits the first one is used unless `strict` is set.
    #[instrument(skip(self))]
    pub async fn resolve_user(&self, login: &str, strict: bool) -> KeycloakResult<String> {
        let response = self
            .request(Method::GET, "users")?
            .query(&[("exact", "true"), ("username", login)])
            .send()
            .await?;

        let status = response.status();
        let body = read_body(response).await;
        if status != StatusCode::OK {
            debug!(%body, "User search rejected");
            return Err(KeycloakError::UserSearch {
                login: login.to_string(),
                status: status.as_u16(),
            });
        }

        let users: Vec<UserRepresentation> = serde_json::from_str(&body)
            .map_err(|e| KeycloakError::Parse(format!("Failed to parse user list: {e}")))?;

        match users.as_slice() {
            [] => Err(KeycloakError::LoginNotFound {
                login: login.to_string(),
            }),
            [user] => Ok(user.id.clone()),
            [_, ..] if strict => Err(KeycloakError::AmbiguousLogin {
                login: login.to_string(),
                matches: users.len(),
            }),
            [first, ..] => {
                warn!(
                    login,
                    matches = users.len(),
                    user_id = %first.id,
                    "Several users match login, using the first"
                );
                Ok(first.id.clone())
            }
        }
    }

    /// Add a user to a group. Expects 204.
    pub async fn add_member(&self, user_id: &str, group_id: &str) -> KeycloakResult<()> {
        self.change_membership(MembershipChange::Add, user_id, group_id)
            .await
    }

    /// Remove a user from a group. Expects 204.
    pub async fn remove_member(&self, user_id: &str, group_id: &str) -> KeycloakResult<()> {
        self.change_membership(MembershipChange::Remove, user_id, group_id)
            .await
    }

    #[instrument(skip(self))]
    async fn change_membership(
        &self,
        change: MembershipChange,
        user_id: &str,
        group_id: &str,
    ) -> KeycloakResult<()> {
        let response = self
            .request(
                change.method(),
                &format!("users/{}/groups/{}", segment(user_id), segment(group_id)),
            )?
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            return Err(KeycloakError::Membership {
                operation: change.verb(),
                user_id: user_id.to_string(),
                group_id: group_id.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Apply `change` for every login in order.
    ///
    /// Failures are recorded in `ledger` and never stop the loop. The sink
    /// advances exactly once per login.
    #[allow(clippy::too_many_arguments)]
    pub async fn sync_memberships(
        &self,
        context: &ReconcileContext,
        change: MembershipChange,
        group_id: &str,
        role_name: &str,
        logins: &[String],
        strict: bool,
        ledger: &mut ErrorLedger,
        sink: &dyn OperatorSink,
    ) -> MembershipOutcome {
        let mut outcome = MembershipOutcome::default();
        sink.begin_logins(role_name, logins.len());

        for login in logins {
            let result = self
                .sync_one(context, change, group_id, login, strict)
                .await;
            match result {
                Ok(()) => {
                    debug!(login = %login, group_id, change = change.verb(), "Membership updated");
                    outcome.applied += 1;
                }
                Err(e) => {
                    ledger.record(&e);
                    outcome.failed += 1;
                }
            }
            sink.login_processed(login);
        }

        sink.finish_logins();
        outcome
    }

    async fn sync_one(
        &self,
        context: &ReconcileContext,
        change: MembershipChange,
        group_id: &str,
        login: &str,
        strict: bool,
    ) -> KeycloakResult<()> {
        context.user_lookup.acquire(login).await?;
        let user_id = self.resolve_user(login, strict).await?;
        match change {
            MembershipChange::Add => self.add_member(&user_id, group_id).await,
            MembershipChange::Remove => self.remove_member(&user_id, group_id).await,
        }
    }
}
