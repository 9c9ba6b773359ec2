//! Request-by-request reconciliation.
//!
//! Each request runs through authenticate, resolve client, resolve client
//! group, inspect role, apply plan, sync memberships. Any failure before the
//! membership pass aborts that request only; its ledger is flushed to the
//! sink and the batch moves on.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::client::AdminClient;
use crate::config::{AdminCredentials, ReconcileConfig};
use crate::context::ReconcileContext;
use crate::error::{ErrorKind, KeycloakError, KeycloakResult};
use crate::ledger::{ErrorLedger, Severity};
use crate::membership::{MembershipChange, MembershipOutcome};
use crate::models::{Action, ReconcileRequest, RoleRepresentation};
use crate::roles::{plan_role_action, RolePlan, RoleStatus};
use crate::sink::OperatorSink;

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Reached the membership pass. Individual logins may still have failed.
    Completed,
    /// Stopped before touching memberships.
    Aborted(ErrorKind),
}

/// Result of one request.
#[derive(Debug, Clone)]
pub struct RequestReport {
    pub requested_action: Action,
    pub effective_action: Action,
    pub outcome: RequestOutcome,
    pub memberships: MembershipOutcome,
    pub ledger: ErrorLedger,
}

impl RequestReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.ledger.is_empty()
    }
}

/// Totals for a batch of requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub aborted: usize,
    pub with_errors: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.with_errors > 0
    }

    pub fn merge(&mut self, other: BatchSummary) {
        self.processed += other.processed;
        self.aborted += other.aborted;
        self.with_errors += other.with_errors;
    }

    fn add(&mut self, report: &RequestReport) {
        self.processed += 1;
        if matches!(report.outcome, RequestOutcome::Aborted(_)) {
            self.aborted += 1;
        }
        if report.has_errors() {
            self.with_errors += 1;
        }
    }
}

/// Drives requests against Keycloak, one at a time.
pub struct Reconciler {
    context: Arc<ReconcileContext>,
    credentials: AdminCredentials,
    config: ReconcileConfig,
    sink: Arc<dyn OperatorSink>,
    http: reqwest::Client,
}

impl Reconciler {
    pub fn new(
        context: Arc<ReconcileContext>,
        credentials: AdminCredentials,
        config: ReconcileConfig,
        sink: Arc<dyn OperatorSink>,
        http: reqwest::Client,
    ) -> KeycloakResult<Self> {
        config.validate()?;
        credentials.validate()?;
        Ok(Self {
            context,
            credentials,
            config,
            sink,
            http,
        })
    }

    /// Process requests in order and tally the results.
    pub async fn run_batch(&self, requests: &[ReconcileRequest]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let total = requests.len();

        for (index, request) in requests.iter().enumerate() {
            self.sink.info(&format!(
                "Processing operation {}/{}: {} - {}",
                index + 1,
                total,
                request.action,
                request.role_name
            ));
            let report = self.reconcile(request).await;
            summary.add(&report);
        }

        summary
    }

    /// Process a single request and flush its ledger to the sink.
    #[instrument(skip(self, request), fields(
        realm = %request.target,
        client = %request.client_name,
        role = %request.role_name,
        action = ?request.action,
    ))]
    pub async fn reconcile(&self, request: &ReconcileRequest) -> RequestReport {
        let mut ledger = ErrorLedger::new();

        let (outcome, effective_action, memberships) = match self.apply(request, &mut ledger).await
        {
            Ok((effective, memberships)) => (RequestOutcome::Completed, effective, memberships),
            Err(e) => {
                let kind = e.kind();
                warn!(error = %e, ?kind, "Request aborted");
                if kind == ErrorKind::Auth {
                    ledger.push(
                        Severity::Error,
                        format!("{e}; logins not processed: {}", request.raw_logins),
                    );
                } else {
                    ledger.record(&e);
                }
                (
                    RequestOutcome::Aborted(kind),
                    request.action,
                    MembershipOutcome::default(),
                )
            }
        };

        ledger.flush(self.sink.as_ref());
        info!(
            applied = memberships.applied,
            failed = memberships.failed,
            entries = ledger.len(),
            "Request finished"
        );

        RequestReport {
            requested_action: request.action,
            effective_action,
            outcome,
            memberships,
            ledger,
        }
    }

    async fn apply(
        &self,
        request: &ReconcileRequest,
        ledger: &mut ErrorLedger,
    ) -> KeycloakResult<(Action, MembershipOutcome)> {
        let mut client = AdminClient::new(request.target.clone(), self.http.clone());
        client.authenticate(&self.credentials).await?;

        let client_id = client
            .resolve_client(&self.context.clients, &request.client_name)
            .await?;
        let client_group_id = client
            .resolve_or_create_client_group(&self.config.roles_group_name, &request.client_name)
            .await?;

        let status = client
            .inspect_role(&client_id, &client_group_id, &request.role_name)
            .await?;
        let state = status.state();
        let plan = plan_role_action(state, request.action);
        let effective_action = plan.effective_action(request.action);

        let (role, group_id) = match plan {
            RolePlan::Reject { missing } => {
                return Err(KeycloakError::RoleMissing {
                    role: request.role_name.clone(),
                    missing,
                    logins: request.raw_logins.clone(),
                });
            }
            RolePlan::Create => {
                if let Some(missing) = state.missing().filter(|_| state.is_partial()) {
                    let message = format!(
                        "Role {} is partially configured ({missing} missing), completing it",
                        request.role_name
                    );
                    warn!("{message}");
                    self.sink.warn(&message);
                }
                self.create_role_pair(&client, &client_id, &client_group_id, request)
                    .await?
            }
            RolePlan::Grant | RolePlan::Revoke => {
                if request.action == Action::CreateRole {
                    self.sink.info(&format!(
                        "Role {} already exists, associating users",
                        request.role_name
                    ));
                }
                existing_pair(status, state.missing(), request)?
            }
        };

        let change = if plan == RolePlan::Revoke {
            MembershipChange::Remove
        } else {
            client
                .assign_role_to_group(&group_id, &client_id, &role)
                .await?;
            MembershipChange::Add
        };

        let memberships = client
            .sync_memberships(
                &self.context,
                change,
                &group_id,
                &request.role_name,
                &request.logins,
                self.config.strict_user_match,
                ledger,
                self.sink.as_ref(),
            )
            .await;

        Ok((effective_action, memberships))
    }

    /// Create role, wait until it is readable, then create its subgroup.
    async fn create_role_pair(
        &self,
        client: &AdminClient,
        client_id: &str,
        client_group_id: &str,
        request: &ReconcileRequest,
    ) -> KeycloakResult<(RoleRepresentation, String)> {
        let role_name = &request.role_name;

        client.create_role(client_id, role_name).await?;
        let role = client
            .confirm_role_created(client_id, role_name, &self.config.role_confirmation)
            .await?;
        let group_id = client.create_subgroup(client_group_id, role_name).await?;

        self.sink.info(&format!(
            "Role {role_name} and its group created for client {}",
            request.client_name
        ));
        Ok((role, group_id))
    }
}

fn existing_pair(
    status: RoleStatus,
    missing: Option<&'static str>,
    request: &ReconcileRequest,
) -> KeycloakResult<(RoleRepresentation, String)> {
    match (status.role, status.group_id) {
        (Some(role), Some(group_id)) => Ok((role, group_id)),
        _ => Err(KeycloakError::RoleMissing {
            role: request.role_name.clone(),
            missing: missing.unwrap_or("role"),
            logins: request.raw_logins.clone(),
        }),
    }
}
