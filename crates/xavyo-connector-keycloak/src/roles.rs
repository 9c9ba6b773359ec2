//! Client roles and the role/group state machine.
//!
//! A role is usable only when both the client role and the subgroup of the
//! same name under the client group exist. [`plan_role_action`] turns the
//! observed [`RoleState`] and the requested [`Action`] into a [`RolePlan`].

use reqwest::{Method, StatusCode};
use tracing::{debug, info, instrument};

use crate::client::{read_body, segment, AdminClient};
use crate::error::{KeycloakError, KeycloakResult};
use crate::models::{Action, NamedResource, RoleMapping, RoleRepresentation};
use crate::retry::RetryPolicy;

/// Observed existence of a role and its paired subgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    Both,
    RoleOnly,
    GroupOnly,
    Neither,
}

impl RoleState {
    #[must_use]
    pub fn from_parts(role_exists: bool, group_exists: bool) -> Self {
        match (role_exists, group_exists) {
            (true, true) => Self::Both,
            (true, false) => Self::RoleOnly,
            (false, true) => Self::GroupOnly,
            (false, false) => Self::Neither,
        }
    }

    /// What is missing, for diagnostics. `None` when both halves exist.
    #[must_use]
    pub fn missing(&self) -> Option<&'static str> {
        match self {
            Self::Both => None,
            Self::RoleOnly => Some("group"),
            Self::GroupOnly => Some("role"),
            Self::Neither => Some("role and group"),
        }
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::RoleOnly | Self::GroupOnly)
    }
}

/// What the reconciler does for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePlan {
    /// Create the missing halves, then continue as a grant.
    Create,
    /// Link the role to its group, then add members.
    Grant,
    /// Remove members.
    Revoke,
    /// The role is not usable; no membership change is made.
    Reject { missing: &'static str },
}

impl RolePlan {
    /// Action actually carried out once the plan completes.
    #[must_use]
    pub fn effective_action(&self, requested: Action) -> Action {
        match self {
            Self::Create => Action::CreateRole,
            Self::Grant => Action::AssociateUsers,
            Self::Revoke => Action::RemoveUsers,
            Self::Reject { .. } => requested,
        }
    }
}

/// Decide how to satisfy `action` given the current `state`.
#[must_use]
pub fn plan_role_action(state: RoleState, action: Action) -> RolePlan {
    match (action, state.missing()) {
        (Action::CreateRole, None) => RolePlan::Grant,
        (Action::CreateRole, Some(_)) => RolePlan::Create,
        (Action::AssociateUsers, None) => RolePlan::Grant,
        (Action::RemoveUsers, None) => RolePlan::Revoke,
        (Action::AssociateUsers | Action::RemoveUsers, Some(missing)) => {
            RolePlan::Reject { missing }
        }
    }
}

/// Role and subgroup as found on the server.
#[derive(Debug, Clone, Default)]
pub struct RoleStatus {
    pub role: Option<RoleRepresentation>,
    pub group_id: Option<String>,
}

impl RoleStatus {
    #[must_use]
    pub fn state(&self) -> RoleState {
        RoleState::from_parts(self.role.is_some(), self.group_id.is_some())
    }
}

impl AdminClient {
    /// Single read of a client role. A 404 is `Ok(None)`.
    #[instrument(skip(self))]
    pub async fn lookup_role(
        &self,
        client_id: &str,
        role_name: &str,
    ) -> KeycloakResult<Option<RoleRepresentation>> {
        let response = self
            .request(
                Method::GET,
                &format!(
                    "clients/{}/roles/{}",
                    segment(client_id),
                    segment(role_name)
                ),
            )?
            .send()
            .await?;

        let status = response.status();
        let body = read_body(response).await;
        match status {
            StatusCode::OK => {
                let role: RoleRepresentation = serde_json::from_str(&body)
                    .map_err(|e| KeycloakError::Parse(format!("Failed to parse role: {e}")))?;
                Ok(Some(role))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(KeycloakError::UnexpectedStatus {
                operation: format!("Role lookup for {role_name}"),
                status: status.as_u16(),
                detail: body,
            }),
        }
    }

    /// Read a just-created role, retrying on 404 until it becomes visible.
    #[instrument(skip(self, policy))]
    pub async fn confirm_role_created(
        &self,
        client_id: &str,
        role_name: &str,
        policy: &RetryPolicy,
    ) -> KeycloakResult<RoleRepresentation> {
        let this = self;
        policy
            .execute(
                "confirm_role_created",
                |e| matches!(e, KeycloakError::RoleNotFound { .. }),
                move || async move {
                    this.lookup_role(client_id, role_name)
                        .await?
                        .ok_or_else(|| KeycloakError::RoleNotFound {
                            role: role_name.to_string(),
                            detail: "not readable yet".into(),
                        })
                },
            )
            .await
    }

    /// Create a client role. An "already exists" answer counts as success.
    #[instrument(skip(self))]
    pub async fn create_role(&self, client_id: &str, role_name: &str) -> KeycloakResult<()> {
        let response = self
            .request(Method::POST, &format!("clients/{}/roles", segment(client_id)))?
            .json(&NamedResource { name: role_name })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CREATED {
            info!(role = role_name, "Role created");
            return Ok(());
        }

        let body = read_body(response).await;
        if body.contains("already exists") {
            info!(role = role_name, "Role already exists");
            return Ok(());
        }
        Err(KeycloakError::RoleCreation {
            role: role_name.to_string(),
            status: status.as_u16(),
            detail: body,
        })
    }

    /// Map a client role onto a group.
    #[instrument(skip(self, role), fields(role = %role.name))]
    pub async fn assign_role_to_group(
        &self,
        group_id: &str,
        client_id: &str,
        role: &RoleRepresentation,
    ) -> KeycloakResult<()> {
        let response = self
            .request(
                Method::POST,
                &format!(
                    "groups/{}/role-mappings/clients/{}",
                    segment(group_id),
                    segment(client_id)
                ),
            )?
            .json(&[RoleMapping {
                id: &role.id,
                name: &role.name,
            }])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            debug!(body = %read_body(response).await, "Role mapping rejected");
            return Err(KeycloakError::RoleAssignment {
                role: role.name.clone(),
                group_id: group_id.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Look up both halves of a role under the given client group.
    pub async fn inspect_role(
        &self,
        client_id: &str,
        client_group_id: &str,
        role_name: &str,
    ) -> KeycloakResult<RoleStatus> {
        let role = self.lookup_role(client_id, role_name).await?;
        let group_id = self.find_child_group(client_group_id, role_name).await?;
        Ok(RoleStatus { role, group_id })
    }
}
