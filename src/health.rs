//! Health check module
//! Reports the state of the service and its dependencies.

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
    Disabled,
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn disabled(details: impl Into<String>) -> Self {
        Self {
            status: ComponentState::Disabled,
            response_time_ms: None,
            details: Some(details.into()),
        }
    }
}

/// Health checker over the optional database pool. A service running
/// without a database is degraded, not dead: the sheet store still
/// accepts applications.
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: Option<PgPool>,
}

impl HealthChecker {
    pub fn new(db_pool: Option<PgPool>) -> Self {
        Self { db_pool }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let mut checks = HashMap::new();
        let mut healthy = true;

        match &self.db_pool {
            Some(pool) => match timeout(Duration::from_secs(5), check_database(pool)).await {
                Ok(Ok(elapsed_ms)) => {
                    info!("database health check: OK ({}ms)", elapsed_ms);
                    checks.insert("database".to_string(), ComponentHealth::up(Some(elapsed_ms)));
                }
                Ok(Err(e)) => {
                    error!("database health check failed: {}", e);
                    healthy = false;
                    checks.insert(
                        "database".to_string(),
                        ComponentHealth::down(Some(e.to_string())),
                    );
                }
                Err(_) => {
                    error!("database health check timed out");
                    healthy = false;
                    checks.insert(
                        "database".to_string(),
                        ComponentHealth::down(Some("timeout".to_string())),
                    );
                }
            },
            None => {
                checks.insert(
                    "database".to_string(),
                    ComponentHealth::disabled("no DATABASE_URL configured"),
                );
            }
        }

        HealthStatus {
            status: if healthy {
                HealthState::Healthy
            } else {
                HealthState::Degraded
            },
            checks,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Liveness never depends on dependencies; the process answering is
    /// the signal.
    pub fn liveness(&self) -> &'static str {
        "OK"
    }
}

async fn check_database(pool: &PgPool) -> Result<u128, sqlx::Error> {
    let started = Instant::now();
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(started.elapsed().as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_database_is_degraded_gracefully() {
        let checker = HealthChecker::new(None);
        let status = checker.check_health().await;
        assert!(matches!(status.status, HealthState::Healthy));
        assert!(matches!(
            status.checks.get("database").unwrap().status,
            ComponentState::Disabled
        ));
    }
}
