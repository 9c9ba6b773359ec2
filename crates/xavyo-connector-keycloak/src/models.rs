//! Request records and Keycloak admin API representations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KeycloakError;

/// Requested change for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create the role and its group, then grant users.
    CreateRole,
    /// Grant users membership in an existing role group.
    AssociateUsers,
    /// Revoke users' membership in an existing role group.
    RemoveUsers,
}

impl Action {
    /// Human-readable label used in request files.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateRole => "Create new role and add users to this role",
            Self::AssociateUsers => "Associate users with role",
            Self::RemoveUsers => "Remove users from role",
        }
    }

    /// All accepted labels, in declaration order.
    #[must_use]
    pub fn labels() -> [&'static str; 3] {
        [
            Self::CreateRole.label(),
            Self::AssociateUsers.label(),
            Self::RemoveUsers.label(),
        ]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Action {
    type Err = KeycloakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Create new role and add users to this role" => Ok(Self::CreateRole),
            "Associate users with role" => Ok(Self::AssociateUsers),
            "Remove users from role" => Ok(Self::RemoveUsers),
            other => Err(KeycloakError::Config(format!(
                "unknown action '{other}', expected one of: {}",
                Self::labels().join(" | ")
            ))),
        }
    }
}

/// Keycloak server and realm a request is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealmTarget {
    /// Base URL of the Keycloak server, without trailing slash.
    pub base_url: String,
    /// Realm name.
    pub realm: String,
}

impl RealmTarget {
    pub fn new(base_url: impl Into<String>, realm: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: realm.into(),
        }
    }
}

impl fmt::Display for RealmTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/realms/{}", self.base_url, self.realm)
    }
}

/// One validated row of desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub target: RealmTarget,
    /// Client application name (Keycloak `clientId`).
    pub client_name: String,
    pub action: Action,
    pub role_name: String,
    /// Logins in input order.
    pub logins: Vec<String>,
    /// Logins exactly as supplied, for diagnostics.
    pub raw_logins: String,
}

impl ReconcileRequest {
    /// Build a request, splitting `raw_logins` on commas.
    pub fn new(
        target: RealmTarget,
        client_name: impl Into<String>,
        action: Action,
        role_name: impl Into<String>,
        raw_logins: impl Into<String>,
    ) -> Self {
        let raw_logins = raw_logins.into();
        Self {
            target,
            client_name: client_name.into(),
            action,
            role_name: role_name.into(),
            logins: parse_logins(&raw_logins),
            raw_logins,
        }
    }
}

/// Split a comma separated login list, trimming blanks and dropping empties.
#[must_use]
pub fn parse_logins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Client entry returned by the clients search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    /// Internal UUID.
    pub id: String,
    /// Public client identifier.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Node of the Keycloak group tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRepresentation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sub_groups: Vec<GroupRepresentation>,
}

/// Client role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRepresentation {
    pub id: String,
    pub name: String,
}

/// Minimal user entry returned by the users search.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRepresentation {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Body for role and group creation.
#[derive(Debug, Serialize)]
pub(crate) struct NamedResource<'a> {
    pub name: &'a str,
}

/// Element of a role mapping request.
#[derive(Debug, Serialize)]
pub(crate) struct RoleMapping<'a> {
    pub id: &'a str,
    pub name: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_labels() {
        for label in Action::labels() {
            let action: Action = label.parse().unwrap();
            assert_eq!(action.label(), label);
        }
    }

    #[test]
    fn test_action_rejects_unknown_label() {
        let err = "Delete role".parse::<Action>().unwrap_err();
        assert!(err.to_string().contains("unknown action 'Delete role'"));
    }

    #[test]
    fn test_parse_logins_trims_and_drops_empty() {
        assert_eq!(
            parse_logins(" alice, bob ,,carol ,"),
            vec!["alice", "bob", "carol"]
        );
        assert!(parse_logins("").is_empty());
        assert!(parse_logins(" , ").is_empty());
    }

    #[test]
    fn test_request_keeps_raw_logins() {
        let request = ReconcileRequest::new(
            RealmTarget::new("https://kc.example.com/", "employee"),
            "Billing",
            Action::AssociateUsers,
            "Auditor",
            "alice, bob",
        );
        assert_eq!(request.target.base_url, "https://kc.example.com");
        assert_eq!(request.logins, vec!["alice", "bob"]);
        assert_eq!(request.raw_logins, "alice, bob");
    }

    #[test]
    fn test_group_deserializes_without_subgroups() {
        let group: GroupRepresentation =
            serde_json::from_str(r#"{"id":"g1","name":"Roles","path":"/Roles"}"#).unwrap();
        assert_eq!(group.name, "Roles");
        assert!(group.sub_groups.is_empty());
    }
}
