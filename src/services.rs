// src/services.rs

//! Host service status monitor.
//!
//! Read-only: the configured query command is run once per request with the
//! watched service names appended as trailing arguments. It must print a JSON
//! array of `{"name", "status", "startType"}` objects; a single bare object is
//! accepted too. Any failure reports every watched service as `unknown`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::exec::{CommandSpec, run_captured};

/// Status value used when the query fails or cannot be parsed.
pub const UNKNOWN: &str = "unknown";

/// One `[[service]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ServiceSpec {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub display_name: String,
    /// e.g. `running`, `stopped`, `not_found`, `unknown`
    pub status: String,
    /// e.g. `automatic`, `manual`, `disabled`, `unknown`
    pub start_type: String,
}

#[derive(Debug, Deserialize)]
struct ServiceRow {
    name: String,
    status: String,
    #[serde(rename = "startType")]
    start_type: String,
}

#[derive(Debug, Clone)]
pub struct ServiceMonitor {
    command: Vec<String>,
    timeout: Duration,
    services: Vec<ServiceSpec>,
}

impl ServiceMonitor {
    pub fn new(command: Vec<String>, timeout: Duration, services: Vec<ServiceSpec>) -> Self {
        Self {
            command,
            timeout,
            services,
        }
    }

    /// Query every watched service. Empty when nothing is configured.
    pub async fn status(&self) -> Vec<ServiceInfo> {
        if self.services.is_empty() {
            return Vec::new();
        }

        let Some(spec) = CommandSpec::from_argv(&self.command) else {
            warn!("service query command is empty");
            return self.all_unknown();
        };
        let spec = spec.args(self.services.iter().map(|svc| svc.name.clone()));

        let (code, output) = run_captured(&spec, self.timeout).await;
        if code != 0 {
            warn!(exit_code = code, output = %output.trim(), "service query failed");
            return self.all_unknown();
        }

        match parse_service_rows(&output) {
            Ok(rows) => {
                debug!(services = rows.len(), "service query finished");
                rows.into_iter().map(|row| self.info_for(row)).collect()
            }
            Err(err) => {
                warn!(error = %err, output = %output.trim(), "unparseable service query output");
                self.all_unknown()
            }
        }
    }

    fn info_for(&self, row: ServiceRow) -> ServiceInfo {
        let display_name = self
            .services
            .iter()
            .find(|svc| svc.name == row.name)
            .map(|svc| svc.display_name().to_string())
            .unwrap_or_else(|| row.name.clone());

        ServiceInfo {
            name: row.name,
            display_name,
            status: row.status.to_lowercase(),
            start_type: row.start_type.to_lowercase(),
        }
    }

    fn all_unknown(&self) -> Vec<ServiceInfo> {
        self.services
            .iter()
            .map(|svc| ServiceInfo {
                name: svc.name.clone(),
                display_name: svc.display_name().to_string(),
                status: UNKNOWN.to_string(),
                start_type: UNKNOWN.to_string(),
            })
            .collect()
    }
}

fn parse_service_rows(output: &str) -> serde_json::Result<Vec<ServiceRow>> {
    let value: Value = serde_json::from_str(output.trim())?;
    let rows = match value {
        Value::Object(_) => vec![value],
        other => serde_json::from_value::<Vec<Value>>(other)?,
    };
    rows.into_iter().map(serde_json::from_value).collect()
}

