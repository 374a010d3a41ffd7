//! Report execution: one endpoint, many users, flat rows.

use anyhow::{anyhow, Result};
use fitsync::endpoints::{Endpoint, EndpointRegistry};
use fitsync::session::{ApiError, ApiSession, UnitSystem};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// What to fetch and for whom.
#[derive(Clone, Debug, Default)]
pub struct ReportQuery {
    /// Registry id, e.g. `daily_activity_summary`
    pub endpoint: String,
    /// `None` reports on every linked user
    pub user_ids: Option<Vec<String>>,
    /// Path template parameters such as `date`
    pub params: Vec<(String, String)>,
    /// Overrides the session default for this report
    pub unit_system: Option<UnitSystem>,
}

impl ReportQuery {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn for_users<I, S>(mut self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_ids = Some(user_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn unit_system(mut self, unit_system: UnitSystem) -> Self {
        self.unit_system = Some(unit_system);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    /// Position in the report, starting at 0
    pub index: usize,
    pub user_id: String,
    /// Field dot path → value (`null` when absent)
    pub values: Map<String, Value>,
}

/// A user whose fetch failed for a reason other than a missing scope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportFailure {
    pub user_id: String,
    pub kind: &'static str,
    pub message: String,
    pub needs_reauthorization: bool,
}

impl ReportFailure {
    fn new(user_id: &str, error: &ApiError) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            needs_reauthorization: error.needs_reauthorization(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    pub endpoint: String,
    pub path: String,
    pub rows: Vec<ResultRow>,
    pub failures: Vec<ReportFailure>,
}

/// Runs `query` against the session.
///
/// Users are fetched concurrently and rows come back in user order. A user is
/// skipped when their grant lacks the endpoint's scope or the response lacks
/// the endpoint's response key; any other per-user error lands in
/// [`Report::failures`] without aborting the report.
pub async fn execute(
    session: &ApiSession,
    registry: &EndpointRegistry,
    query: &ReportQuery,
) -> Result<Report> {
    let endpoint = registry
        .get(&query.endpoint)
        .ok_or_else(|| anyhow!("Unknown endpoint '{}'", query.endpoint))?;

    let user_ids = match &query.user_ids {
        Some(ids) => ids.clone(),
        None => session.linked_users()?,
    };
    let path = endpoint.render_path(&query.params);
    let unit_system = query.unit_system.unwrap_or_else(|| session.unit_system());

    info!(
        endpoint = endpoint.id,
        path = %path,
        users = user_ids.len(),
        unit_system = %unit_system,
        "Executing report"
    );

    let fetches = user_ids
        .iter()
        .map(|user_id| session.fetch_with_units(user_id, &path, &[], unit_system));
    let results = join_all(fetches).await;

    let mut report = Report {
        endpoint: endpoint.id.to_string(),
        path,
        ..Report::default()
    };
    for (user_id, result) in user_ids.iter().zip(results) {
        collect(&mut report, endpoint, user_id, result);
    }

    info!(
        endpoint = endpoint.id,
        rows = report.rows.len(),
        failures = report.failures.len(),
        "Report complete"
    );
    Ok(report)
}

fn collect(
    report: &mut Report,
    endpoint: &Endpoint,
    user_id: &str,
    result: Result<Value, ApiError>,
) {
    match result {
        Ok(response) if endpoint.matches(&response) => {
            report.rows.push(ResultRow {
                index: report.rows.len(),
                user_id: user_id.to_string(),
                values: endpoint.project(&response),
            });
        }
        Ok(_) => {
            debug!(
                user_id = %user_id,
                response_key = endpoint.response_key,
                "Response missing key, skipping user"
            );
        }
        Err(e) if e.is_benign() => {
            info!(user_id = %user_id, endpoint = endpoint.id, error = %e, "Skipping user");
        }
        Err(e) => {
            warn!(user_id = %user_id, kind = e.kind(), "Report fetch failed");
            report.failures.push(ReportFailure::new(user_id, &e));
        }
    }
}
