use serde::Serialize;
use uuid::Uuid;

use crate::auth::SessionContext;
use crate::client::ClientId;
use crate::metrics::{BodyMetrics, ClientSessions, CohortSummary, OneRepMax};
use crate::nutrition::NutritionEntry;
use crate::training::TrainingSession;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Login {
        token: Uuid,
        #[serde(flatten)]
        session: SessionContext,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Sessions {
        client: ClientId,
        sessions: Vec<TrainingSession>,
    },
    Progress {
        client: ClientId,
        sessions_done: usize,
        one_rep_max: Vec<OneRepMax>,
        history: Option<Vec<OneRepMax>>,
    },
    Body {
        client: ClientId,
        latest: Option<BodyMetrics>,
        history: Vec<BodyMetrics>,
    },
    Nutrition {
        client: ClientId,
        entries: Vec<NutritionEntry>,
    },
    Dashboard {
        total_clients: i64,
        cohort: CohortSummary,
        sessions_per_client: Vec<ClientSessions>,
    },
    Created {
        id: String,
    },
}
