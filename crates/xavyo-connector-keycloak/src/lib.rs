//! Keycloak connector for xavyo
//!
//! Reconciles client roles, their paired role groups and group memberships
//! against the Keycloak admin REST API.
//!
//! # Features
//!
//! - Password grant authentication, one session per request
//! - Client lookup with a process-wide cache
//! - Idempotent creation of the `Roles/{client}/{role}` group hierarchy
//! - Role/group state machine with read-after-create confirmation
//! - Rate limited user lookup shared across requests
//! - Per-request error ledger so a batch continues past failures
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xavyo_connector_keycloak::{
//!     Action, AdminClient, AdminCredentials, RealmTarget, ReconcileConfig, ReconcileContext,
//!     ReconcileRequest, Reconciler, TracingSink,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReconcileConfig::default();
//! let context = ReconcileContext::new(&config.user_lookup)?;
//! let http = AdminClient::http_client(std::time::Duration::from_secs(30))?;
//! let reconciler = Reconciler::new(
//!     context,
//!     AdminCredentials::new("admin", "secret"),
//!     config,
//!     Arc::new(TracingSink),
//!     http,
//! )?;
//!
//! let request = ReconcileRequest::new(
//!     RealmTarget::new("https://employee.example.com", "employee"),
//!     "Billing",
//!     Action::CreateRole,
//!     "Auditor",
//!     "alice, bob",
//! );
//! let summary = reconciler.run_batch(&[request]).await;
//! assert_eq!(summary.processed, 1);
//! # Ok(())
//! # }
//! ```

mod client;
mod clients;
mod config;
mod context;
mod engine;
mod error;
mod groups;
mod ledger;
mod membership;
mod models;
mod rate_limit;
mod retry;
mod roles;
mod sink;

// Re-exports
pub use client::{AdminClient, Session};
pub use config::{AdminCredentials, ReconcileConfig, DEFAULT_ADMIN_CLIENT_ID, DEFAULT_ROLES_GROUP};
pub use context::{ClientCache, ReconcileContext};
pub use engine::{BatchSummary, Reconciler, RequestOutcome, RequestReport};
pub use error::{ErrorKind, KeycloakError, KeycloakResult};
pub use ledger::{ErrorLedger, LedgerEntry, Severity};
pub use membership::{MembershipChange, MembershipOutcome};
pub use models::{
    parse_logins, Action, ClientRepresentation, GroupRepresentation, RealmTarget,
    ReconcileRequest, RoleRepresentation, UserRepresentation,
};
pub use rate_limit::{RateLimitConfig, UserLookupLimiter};
pub use retry::RetryPolicy;
pub use roles::{plan_role_action, RolePlan, RoleState, RoleStatus};
pub use sink::{OperatorSink, TracingSink};
