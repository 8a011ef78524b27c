use serde::Deserialize;

/// Filters a session log down to one day.
#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub date: Option<String>,
}

/// Adds the history of one exercise to a progress report.
#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub exercise: Option<String>,
}

/// Picks the month the dashboard reports on, as `YYYY-MM`.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub month: Option<String>,
}
