//! Mock Keycloak admin API using wiremock for integration testing.
//!
//! Roles and the group tree are kept in memory, so create calls are visible
//! to later reads the way they are on a real server.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use xavyo_connector_keycloak::{
    AdminClient, AdminCredentials, OperatorSink, RealmTarget, ReconcileConfig, ReconcileContext,
    Reconciler,
};

pub const REALM: &str = "employee";
pub const TOKEN: &str = "test-token-123";

#[derive(Default)]
struct State {
    /// (client id, role name) -> role id
    roles: HashMap<(String, String), String>,
    /// parent group id -> children (id, name)
    children: HashMap<String, Vec<(String, String)>>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// A mock Keycloak server for one realm.
pub struct MockKeycloak {
    server: MockServer,
    state: Arc<Mutex<State>>,
}

impl MockKeycloak {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Underlying server, for mounting one-off mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn target(&self) -> RealmTarget {
        RealmTarget::new(self.uri(), REALM)
    }

    /// Unauthenticated admin client for this server.
    pub fn client(&self) -> AdminClient {
        AdminClient::new(self.target(), reqwest::Client::new())
    }

    /// Admin client that already holds a session.
    pub async fn authenticated_client(&self) -> AdminClient {
        let mut client = self.client();
        client
            .authenticate(&credentials())
            .await
            .expect("authentication against mock");
        client
    }

    pub fn reconciler(&self, sink: Arc<dyn OperatorSink>) -> Reconciler {
        self.reconciler_with(ReconcileConfig::for_testing(), sink)
    }

    pub fn reconciler_with(&self, config: ReconcileConfig, sink: Arc<dyn OperatorSink>) -> Reconciler {
        let context = ReconcileContext::new(&config.user_lookup).unwrap();
        Reconciler::new(context, credentials(), config, sink, reqwest::Client::new()).unwrap()
    }

    fn admin(path: &str) -> String {
        format!("/admin/realms/{REALM}/{path}")
    }

    // =========================================================================
    // Seed data
    // =========================================================================

    pub fn seed_group(&self, parent_id: &str, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push((id.to_string(), name.to_string()));
    }

    pub fn seed_role(&self, client_id: &str, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .roles
            .insert((client_id.to_string(), name.to_string()), id.to_string());
    }

    pub fn has_role(&self, client_id: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .roles
            .contains_key(&(client_id.to_string(), name.to_string()))
    }

    pub fn child_id(&self, parent_id: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .children
            .get(parent_id)
            .and_then(|c| c.iter().find(|(_, n)| n == name).map(|(id, _)| id.clone()))
    }

    // =========================================================================
    // Token endpoint
    // =========================================================================

    pub async fn mock_token(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/realms/{REALM}/protocol/openid-connect/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TOKEN,
                "expires_in": 300,
                "refresh_expires_in": 1800,
                "refresh_token": "refresh-123",
                "token_type": "Bearer",
                "scope": "profile email"
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_rejected(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/realms/{REALM}/protocol/openid-connect/token")))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid user credentials"
            })))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Client search returning one entry per id.
    pub async fn mock_clients(&self, client_name: &str, ids: &[&str]) {
        let body: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "clientId": client_name, "enabled": true }))
            .collect();

        Mock::given(method("GET"))
            .and(path(Self::admin("clients")))
            .and(query_param("clientId", client_name))
            .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Container group search plus a stateful children listing and creation.
    pub async fn mock_group_tree(&self, container_name: &str, container_id: &str) {
        Mock::given(method("GET"))
            .and(path(Self::admin("groups")))
            .and(query_param("search", container_name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "decoy", "name": format!("{container_name}-archive"), "subGroups": [] },
                { "id": container_id, "name": container_name, "path": format!("/{container_name}") }
            ])))
            .mount(&self.server)
            .await;

        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path_regex(format!(r"^/admin/realms/{REALM}/groups/[^/]+/children$")))
            .respond_with(move |req: &Request| {
                let parent = segment(req, 5);
                let state = state.lock().unwrap();
                let children: Vec<Value> = state
                    .children
                    .get(&parent)
                    .map(|c| {
                        c.iter()
                            .map(|(id, name)| json!({ "id": id, "name": name }))
                            .collect()
                    })
                    .unwrap_or_default();
                ResponseTemplate::new(200).set_body_json(children)
            })
            .mount(&self.server)
            .await;

        let state = self.state.clone();
        Mock::given(method("POST"))
            .and(path_regex(format!(r"^/admin/realms/{REALM}/groups/[^/]+/children$")))
            .respond_with(move |req: &Request| {
                let parent = segment(req, 5);
                let name = body_name(req);
                let mut state = state.lock().unwrap();
                let exists = state
                    .children
                    .get(&parent)
                    .is_some_and(|c| c.iter().any(|(_, n)| *n == name));
                if exists {
                    return ResponseTemplate::new(409).set_body_json(json!({
                        "errorMessage": format!("Top level group named '{name}' already exists.")
                    }));
                }
                let id = state.next_id("group");
                state
                    .children
                    .entry(parent)
                    .or_default()
                    .push((id.clone(), name.clone()));
                ResponseTemplate::new(201).set_body_json(json!({ "id": id, "name": name }))
            })
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Roles
    // =========================================================================

    /// Stateful role read and creation for every client.
    pub async fn mock_roles(&self) {
        let state = self.state.clone();
        Mock::given(method("GET"))
            .and(path_regex(format!(r"^/admin/realms/{REALM}/clients/[^/]+/roles/[^/]+$")))
            .respond_with(move |req: &Request| {
                let client = segment(req, 5);
                let name = segment(req, 7);
                let state = state.lock().unwrap();
                match state.roles.get(&(client, name.clone())) {
                    Some(id) => ResponseTemplate::new(200)
                        .set_body_json(json!({ "id": id, "name": name, "composite": false })),
                    None => ResponseTemplate::new(404)
                        .set_body_json(json!({ "error": "Could not find role" })),
                }
            })
            .mount(&self.server)
            .await;

        let state = self.state.clone();
        Mock::given(method("POST"))
            .and(path_regex(format!(r"^/admin/realms/{REALM}/clients/[^/]+/roles$")))
            .respond_with(move |req: &Request| {
                let client = segment(req, 5);
                let name = body_name(req);
                let mut state = state.lock().unwrap();
                let key = (client, name.clone());
                if state.roles.contains_key(&key) {
                    return ResponseTemplate::new(409).set_body_json(json!({
                        "errorMessage": format!("Role with name {name} already exists")
                    }));
                }
                let id = state.next_id("role");
                state.roles.insert(key, id);
                ResponseTemplate::new(201)
            })
            .mount(&self.server)
            .await;
    }

    pub async fn mock_role_mapping(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path_regex(format!(
                r"^/admin/realms/{REALM}/groups/[^/]+/role-mappings/clients/[^/]+$"
            )))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Users and membership
    // =========================================================================

    /// User search for `login` returning one entry per id.
    pub async fn mock_user(&self, login: &str, ids: &[&str]) {
        let body: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "username": login, "enabled": true }))
            .collect();

        Mock::given(method("GET"))
            .and(path(Self::admin("users")))
            .and(query_param("username", login))
            .and(query_param("exact", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_memberships(&self, status: u16) {
        for verb in ["PUT", "DELETE"] {
            Mock::given(method(verb))
                .and(path_regex(format!(r"^/admin/realms/{REALM}/users/[^/]+/groups/[^/]+$")))
                .respond_with(ResponseTemplate::new(status))
                .mount(&self.server)
                .await;
        }
    }

    // =========================================================================
    // Request inspection
    // =========================================================================

    /// Number of received requests with this method whose path contains `fragment`.
    pub async fn count(&self, verb: &str, fragment: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == verb && r.url.path().contains(fragment))
            .count()
    }

    /// Paths of every received request with this method.
    pub async fn paths(&self, verb: &str) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == verb)
            .map(|r| r.url.path().to_string())
            .collect()
    }
}

pub fn credentials() -> AdminCredentials {
    AdminCredentials::new("admin", "admin-password")
}

/// Decoded path segment at `index` (0 is the empty root segment).
fn segment(req: &Request, index: usize) -> String {
    let raw = req.url.path().split('/').nth(index).unwrap_or_default();
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn body_name(req: &Request) -> String {
    serde_json::from_slice::<Value>(&req.body)
        .ok()
        .and_then(|v| v.get("name").and_then(Value::as_str).map(String::from))
        .unwrap_or_default()
}

/// Sink that records every line and progress tick.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
    processed: Mutex<Vec<String>>,
    batches: Mutex<Vec<(String, usize)>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.with_prefix("WARN ")
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_prefix("ERROR ")
    }

    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<(String, usize)> {
        self.batches.lock().unwrap().clone()
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix(prefix).map(String::from))
            .collect()
    }
}

impl OperatorSink for RecordingSink {
    fn begin_logins(&self, role: &str, total: usize) {
        self.batches.lock().unwrap().push((role.to_string(), total));
    }

    fn login_processed(&self, login: &str) {
        self.processed.lock().unwrap().push(login.to_string());
    }

    fn finish_logins(&self) {}

    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("INFO {message}"));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("WARN {message}"));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("ERROR {message}"));
    }
}
