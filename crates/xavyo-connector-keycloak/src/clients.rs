//! Client application lookup.

use reqwest::{Method, StatusCode};
use tracing::{debug, instrument};

use crate::client::{read_body, AdminClient};
use crate::context::ClientCache;
use crate::error::{KeycloakError, KeycloakResult};
use crate::models::ClientRepresentation;

impl AdminClient {
    /// Resolve a client name to its internal id, consulting `cache` first.
    ///
    /// Only a single exact match is accepted and cached.
    #[instrument(skip(self, cache), fields(realm = %self.target()))]
    pub async fn resolve_client(
        &self,
        cache: &ClientCache,
        client_name: &str,
    ) -> KeycloakResult<String> {
        if let Some(id) = cache.get(self.target(), client_name).await {
            debug!(client_id = %id, "Client resolved from cache");
            return Ok(id);
        }

        let response = self
            .request(Method::GET, "clients")?
            .query(&[
                ("clientId", client_name),
                ("first", "0"),
                ("max", "100"),
                ("search", "false"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = read_body(response).await;
        if status != StatusCode::OK {
            return Err(KeycloakError::UnexpectedStatus {
                operation: format!("Client search for {client_name}"),
                status: status.as_u16(),
                detail: body,
            });
        }

        let clients: Vec<ClientRepresentation> = serde_json::from_str(&body)
            .map_err(|e| KeycloakError::Parse(format!("Failed to parse client list: {e}")))?;

        match clients.as_slice() {
            [] => Err(KeycloakError::ClientNotFound {
                client: client_name.to_string(),
            }),
            [client] => {
                let id = cache
                    .insert(self.target(), client_name, client.id.clone())
                    .await;
                debug!(client_id = %id, "Client resolved");
                Ok(id)
            }
            many => Err(KeycloakError::AmbiguousClient {
                client: client_name.to_string(),
                matches: many.len(),
            }),
        }
    }
}
