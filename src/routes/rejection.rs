use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

/// The operation that failed, and the key it was working on.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Context {
    Login { username: Option<String> },
    Logout,
    Me,
    Exercises,
    AddExercise,
    ActivityLevels,
    GoalDiets,
    Meals,
    Clients,
    CreateClient { id: Option<String> },
    Client { id: String },
    UpdateClient { id: String },
    DeleteClient { id: String },
    Sessions { client: String },
    LogSession { client: String },
    UpdateSession { id: String },
    DeleteSession { id: String },
    Progress { client: String },
    BodyMetrics { client: String },
    RecordBody { client: String },
    Nutrition { client: String },
    UploadNutrition { client: String },
    Dashboard,
}

impl Context {
    pub fn login(username: Option<String>) -> Context {
        Context::Login { username }
    }

    pub fn logout() -> Context {
        Context::Logout
    }

    pub fn me() -> Context {
        Context::Me
    }

    pub fn exercises() -> Context {
        Context::Exercises
    }

    pub fn add_exercise() -> Context {
        Context::AddExercise
    }

    pub fn activity_levels() -> Context {
        Context::ActivityLevels
    }

    pub fn goal_diets() -> Context {
        Context::GoalDiets
    }

    pub fn meals() -> Context {
        Context::Meals
    }

    pub fn clients() -> Context {
        Context::Clients
    }

    pub fn create_client(id: Option<String>) -> Context {
        Context::CreateClient { id }
    }

    pub fn client(id: String) -> Context {
        Context::Client { id }
    }

    pub fn update_client(id: String) -> Context {
        Context::UpdateClient { id }
    }

    pub fn delete_client(id: String) -> Context {
        Context::DeleteClient { id }
    }

    pub fn sessions(client: String) -> Context {
        Context::Sessions { client }
    }

    pub fn log_session(client: String) -> Context {
        Context::LogSession { client }
    }

    pub fn update_session(id: String) -> Context {
        Context::UpdateSession { id }
    }

    pub fn delete_session(id: String) -> Context {
        Context::DeleteSession { id }
    }

    pub fn progress(client: String) -> Context {
        Context::Progress { client }
    }

    pub fn body_metrics(client: String) -> Context {
        Context::BodyMetrics { client }
    }

    pub fn record_body(client: String) -> Context {
        Context::RecordBody { client }
    }

    pub fn nutrition(client: String) -> Context {
        Context::Nutrition { client }
    }

    pub fn upload_nutrition(client: String) -> Context {
        Context::UploadNutrition { client }
    }

    pub fn dashboard() -> Context {
        Context::Dashboard
    }
}
