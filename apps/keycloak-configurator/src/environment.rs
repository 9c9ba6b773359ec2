//! Keycloak instance and environment naming.
//!
//! Each instance type has its own realm and host; the environment picks the
//! host suffix.

use std::fmt;
use std::str::FromStr;

use xavyo_connector_keycloak::RealmTarget;

/// Which Keycloak installation a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    Employee,
    Partner,
    Customer,
}

impl InstanceType {
    pub const VALID: &'static str = "Employee|Partner|Customer";

    pub fn realm(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Partner => "partner",
            Self::Customer => "customer",
        }
    }

    fn host(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Partner => "partners",
            Self::Customer => "customer",
        }
    }
}

impl FromStr for InstanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Employee" => Ok(Self::Employee),
            "Partner" => Ok(Self::Partner),
            "Customer" => Ok(Self::Customer),
            other => Err(format!(
                "invalid Keycloak type: {other}. Valid: {}",
                Self::VALID
            )),
        }
    }
}

/// Deployment stage of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Prod,
    Dev,
    Test,
}

impl Environment {
    pub const VALID: &'static str = "Prod|Dev|Test";

    fn host_suffix(&self) -> &'static str {
        match self {
            Self::Prod => "",
            Self::Dev => "-dev",
            Self::Test => "-test",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Prod" => Ok(Self::Prod),
            "Dev" => Ok(Self::Dev),
            "Test" => Ok(Self::Test),
            other => Err(format!(
                "invalid Keycloak environment: {other}. Valid: {}",
                Self::VALID
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prod => "Prod",
            Self::Dev => "Dev",
            Self::Test => "Test",
        };
        f.write_str(name)
    }
}

/// `https://{host}{suffix}.{domain}`
pub fn base_url(instance: InstanceType, environment: Environment, domain: &str) -> String {
    format!(
        "https://{}{}.{}",
        instance.host(),
        environment.host_suffix(),
        domain.trim_matches('.')
    )
}

/// Server and realm for an instance in an environment.
pub fn realm_target(instance: InstanceType, environment: Environment, domain: &str) -> RealmTarget {
    RealmTarget::new(base_url(instance, environment, domain), instance.realm())
}
