//! Role group hierarchy: `/{Roles}/{client}/{role}`.

use reqwest::{Method, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::client::{location_id, read_body, segment, AdminClient};
use crate::error::{KeycloakError, KeycloakResult};
use crate::models::{GroupRepresentation, NamedResource};

/// Page size for the container group search. Exact matches are picked from it by name.
const GROUP_SEARCH_MAX: &str = "21";

/// Upper bound on the children listed under one group.
const CHILD_GROUPS_MAX: &str = "250";

impl AdminClient {
    /// Find the top-level container group by exact name. It is never created here.
    #[instrument(skip(self))]
    pub async fn find_container_group(&self, container_name: &str) -> KeycloakResult<String> {
        let response = self
            .request(Method::GET, "groups")?
            .query(&[
                ("search", container_name),
                ("exact", "true"),
                ("global", "true"),
                ("max", GROUP_SEARCH_MAX),
            ])
            .send()
            .await?;

        let groups: Vec<GroupRepresentation> =
            parse_ok(response, &format!("Group search for {container_name}")).await?;

        groups
            .into_iter()
            .find(|g| g.name == container_name)
            .map(|g| g.id)
            .ok_or_else(|| KeycloakError::GroupNotFound(container_name.to_string()))
    }

    /// Immediate children of a group.
    #[instrument(skip(self))]
    pub async fn list_child_groups(
        &self,
        parent_id: &str,
    ) -> KeycloakResult<Vec<GroupRepresentation>> {
        let response = self
            .request(
                Method::GET,
                &format!("groups/{}/children", segment(parent_id)),
            )?
            .query(&[("first", "0"), ("max", CHILD_GROUPS_MAX)])
            .send()
            .await?;

        parse_ok(response, &format!("Listing children of group {parent_id}")).await
    }

    /// Id of the child of `parent_id` named `name`, if any.
    pub async fn find_child_group(
        &self,
        parent_id: &str,
        name: &str,
    ) -> KeycloakResult<Option<String>> {
        Ok(self
            .list_child_groups(parent_id)
            .await?
            .into_iter()
            .find(|g| g.name == name)
            .map(|g| g.id))
    }

    /// Locate the per-client group under the container, creating it when absent.
    #[instrument(skip(self))]
    pub async fn resolve_or_create_client_group(
        &self,
        container_name: &str,
        client_name: &str,
    ) -> KeycloakResult<String> {
        let container_id = self.find_container_group(container_name).await?;

        if let Some(id) = self.find_child_group(&container_id, client_name).await? {
            debug!(group_id = %id, "Client group found");
            return Ok(id);
        }

        info!(group = client_name, "Client group missing, creating it");
        let response = self.post_child_group(&container_id, client_name).await?;
        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(KeycloakError::GroupCreation {
                group: client_name.to_string(),
                status: status.as_u16(),
                detail: read_body(response).await,
            });
        }
        created_group_id(response, client_name).await
    }

    /// Create a role subgroup under the client group.
    ///
    /// A conflict means the subgroup already exists and its id is looked up by name.
    #[instrument(skip(self))]
    pub async fn create_subgroup(&self, parent_id: &str, name: &str) -> KeycloakResult<String> {
        let response = self.post_child_group(parent_id, name).await?;
        let status = response.status();

        match status {
            StatusCode::CREATED => {
                let id = created_group_id(response, name).await?;
                info!(group_id = %id, "Role group created");
                Ok(id)
            }
            StatusCode::CONFLICT => {
                warn!(group = name, "Role group already exists, looking it up");
                self.find_child_group(parent_id, name)
                    .await?
                    .ok_or_else(|| KeycloakError::GroupNotFound(name.to_string()))
            }
            _ => Err(KeycloakError::GroupCreation {
                group: name.to_string(),
                status: status.as_u16(),
                detail: read_body(response).await,
            }),
        }
    }

    async fn post_child_group(
        &self,
        parent_id: &str,
        name: &str,
    ) -> KeycloakResult<reqwest::Response> {
        Ok(self
            .request(
                Method::POST,
                &format!("groups/{}/children", segment(parent_id)),
            )?
            .json(&NamedResource { name })
            .send()
            .await?)
    }
}

/// Decode a 200 JSON body or map the status to `UnexpectedStatus`.
async fn parse_ok<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> KeycloakResult<T> {
    let status = response.status();
    let body = read_body(response).await;
    if status != StatusCode::OK {
        return Err(KeycloakError::UnexpectedStatus {
            operation: operation.to_string(),
            status: status.as_u16(),
            detail: body,
        });
    }
    serde_json::from_str(&body)
        .map_err(|e| KeycloakError::Parse(format!("{operation}: invalid response: {e}")))
}

/// Id of a freshly created group: response body first, `Location` header second.
async fn created_group_id(response: reqwest::Response, name: &str) -> KeycloakResult<String> {
    let from_header = location_id(&response);
    let body = read_body(response).await;

    if let Ok(group) = serde_json::from_str::<GroupRepresentation>(&body) {
        if !group.id.is_empty() {
            return Ok(group.id);
        }
    }

    from_header.ok_or_else(|| {
        KeycloakError::Parse(format!(
            "Group {name} created but no id in response body or Location header"
        ))
    })
}
