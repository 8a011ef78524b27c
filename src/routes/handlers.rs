use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, o, Logger};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::auth::{self, Identity, LoginRequest, SessionContext};
use crate::body::{BodyComposition, Measurement};
use crate::client::{Client, ClientDetails, ClientId, NewClient};
use crate::dates::{self, YearMonth};
use crate::environment::{Environment, SafeStore};
use crate::errors::BackendError;
use crate::io::parse_upload;
use crate::metrics;
use crate::normalization::normalize_name;
use crate::nutrition::{self, MealOption, MealSlot, NutritionEntry};
use crate::routes::{
    query::{DashboardQuery, ProgressQuery, SessionsQuery},
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::training::{NewExercise, SessionDetails, SessionUpdate, TrainingSession};
use crate::{image, metrics::newest_first};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)+) => {{
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($body)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    }};
}

pub async fn login<O: SafeStore>(environment: Environment<O>, body: Bytes) -> RouteResult {
    timed! {
        let request: LoginRequest =
            parse_json(&body).map_err(|e| Rejection::new(Context::login(None), e))?;
        let LoginRequest { username, password } = request;

        let error_handler = |e: BackendError| Rejection::new(Context::login(Some(username.clone())), e);
        let logger = environment.logger.new(o!("username" => username.clone()));

        debug!(logger, "Looking up credential...");
        let credential = environment
            .db
            .retrieve_credential(&username)
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::InvalidCredentials)
            .map_err(error_handler)?;

        let verified = auth::verify_password(password, credential.password_hash.clone())
            .await
            .map_err(error_handler)?;

        if !verified {
            debug!(logger, "Password mismatch");
            return Err(error_handler(BackendError::InvalidCredentials).into());
        }

        let session = SessionContext::new(Identity::new(credential.username, credential.name))
            .map_err(error_handler)?;

        let token = environment
            .db
            .create_login(&username)
            .await
            .map_err(error_handler)?;
        debug!(logger, "Logged in"; "admin" => session.is_admin());

        json(&SuccessResponse::Login { token, session })
    }
}

pub async fn logout<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::logout(), e);

        let token = auth::parse_bearer(authorization.as_deref()).map_err(error_handler)?;
        environment
            .db
            .delete_login(&token)
            .await
            .map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn me<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let session = authenticate(&environment, authorization)
            .await
            .map_err(|e| Rejection::new(Context::me(), e))?;

        json(&session)
    }
}

pub async fn exercises<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::exercises(), e);

        authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;

        let names = environment
            .db
            .retrieve_exercises()
            .await
            .map_err(error_handler)?;

        json(&names)
    }
}

pub async fn add_exercise<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::add_exercise(), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        session.require_admin().map_err(error_handler)?;

        let exercise: NewExercise = parse_json(&body).map_err(error_handler)?;
        exercise.validate().map_err(error_handler)?;

        debug!(environment.logger, "Adding exercise..."; "name" => &exercise.name);
        environment
            .db
            .insert_exercise(&exercise.name)
            .await
            .map_err(error_handler)?;

        with_status(
            json(&SuccessResponse::Created { id: exercise.name }),
            StatusCode::CREATED,
        )
    }
}

pub async fn activity_levels<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::activity_levels(), e);

        authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;

        let levels = environment
            .db
            .retrieve_activity_levels()
            .await
            .map_err(error_handler)?;

        json(&levels)
    }
}

pub async fn goal_diets<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::goal_diets(), e);

        authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;

        let diets = environment
            .db
            .retrieve_goal_diets()
            .await
            .map_err(error_handler)?;

        json(&diets)
    }
}

pub async fn meals<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        authenticate(&environment, authorization)
            .await
            .map_err(|e| Rejection::new(Context::meals(), e))?;

        let meals = MealSlot::ALL
            .iter()
            .copied()
            .map(MealOption::from)
            .collect::<Vec<_>>();

        json(&meals)
    }
}

pub async fn clients<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::clients(), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        session.require_admin().map_err(error_handler)?;

        let clients = environment
            .db
            .retrieve_clients()
            .await
            .map_err(error_handler)?;

        json(&clients)
    }
}

pub async fn create_client<O: SafeStore>(
    environment: Environment<O>,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let session = authenticate(&environment, authorization)
            .await
            .map_err(|e| Rejection::new(Context::create_client(None), e))?;
        session
            .require_admin()
            .map_err(|e| Rejection::new(Context::create_client(None), e))?;

        let new_client: NewClient = parse_json(&body)
            .map_err(|e| Rejection::new(Context::create_client(None), e))?;
        let NewClient { id, details } = new_client;

        let error_handler = |e: BackendError| Rejection::new(Context::create_client(Some(id.to_string())), e);
        details.validate().map_err(error_handler)?;

        debug!(environment.logger, "Creating client..."; "client" => id.as_str());
        let client = Client::new(id.clone(), details);
        environment
            .db
            .insert_client(client.clone())
            .await
            .map_err(error_handler)?;

        with_header(
            with_status(json(&client), StatusCode::CREATED),
            "location",
            environment.urls.client(&id).as_str(),
        )
    }
}

pub async fn client<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::client(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let option = environment
            .db
            .retrieve_client(&client_id)
            .await
            .map_err(error_handler)?;

        match option {
            Some(client) => with_status(json(&client), StatusCode::OK),
            None => with_status(json(&()), StatusCode::NOT_FOUND),
        }
    }
}

pub async fn update_client<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::update_client(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        session.require_admin().map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;

        let details: ClientDetails = parse_json(&body).map_err(error_handler)?;
        details.validate().map_err(error_handler)?;

        debug!(environment.logger, "Updating client..."; "client" => client_id.as_str());
        environment
            .db
            .update_client(&client_id, details.clone())
            .await
            .map_err(error_handler)?;

        json(&Client::new(client_id, details))
    }
}

pub async fn delete_client<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::delete_client(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        session.require_admin().map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;

        debug!(environment.logger, "Deleting client..."; "client" => client_id.as_str());
        environment
            .db
            .delete_client(&client_id)
            .await
            .map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn sessions<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    query: SessionsQuery,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::sessions(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let date = query
            .date
            .map(dates::parse_date)
            .transpose()
            .map_err(error_handler)?;

        let mut sessions = environment
            .db
            .retrieve_sessions(Some(&client_id))
            .await
            .map_err(error_handler)?;

        if let Some(date) = date {
            sessions.retain(|s| s.date() == date);
        }

        json(&SuccessResponse::Sessions {
            client: client_id,
            sessions,
        })
    }
}

pub async fn log_session<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::log_session(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let details: SessionDetails = parse_json(&body).map_err(error_handler)?;
        details.validate().map_err(error_handler)?;

        let logger = request_logger(&environment.logger, &session, &client_id);
        debug!(logger, "Logging session..."; "exercise" => &details.exercise, "measure" => %details.measure);

        let training_session = TrainingSession::new(Uuid::new_v4(), client_id, details);
        environment
            .db
            .insert_session(training_session.clone())
            .await
            .map_err(error_handler)?;

        with_header(
            with_status(json(&training_session), StatusCode::CREATED),
            "location",
            environment.urls.session(training_session.id()).as_str(),
        )
    }
}

pub async fn update_session<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::update_session(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let mut training_session = owned_session(&environment, &session, &id)
            .await
            .map_err(error_handler)?;

        let update: SessionUpdate = parse_json(&body).map_err(error_handler)?;
        update.validate().map_err(error_handler)?;

        environment
            .db
            .update_session(training_session.id(), update)
            .await
            .map_err(error_handler)?;
        training_session.apply(update);

        json(&training_session)
    }
}

pub async fn delete_session<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::delete_session(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let training_session = owned_session(&environment, &session, &id)
            .await
            .map_err(error_handler)?;

        environment
            .db
            .delete_session(training_session.id())
            .await
            .map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn progress<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    query: ProgressQuery,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::progress(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let sessions = environment
            .db
            .retrieve_sessions(Some(&client_id))
            .await
            .map_err(error_handler)?;

        let sessions_done = metrics::count_session_days(&sessions);
        let one_rep_max = newest_first(metrics::estimate_one_rep_max(&sessions));
        let history = query
            .exercise
            .map(|exercise| metrics::exercise_history(&one_rep_max, &client_id, &normalize_name(exercise)));

        json(&SuccessResponse::Progress {
            client: client_id,
            sessions_done,
            one_rep_max,
            history,
        })
    }
}

pub async fn body_metrics<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::body_metrics(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let db = &environment.db;
        let snapshots = db
            .retrieve_body_compositions(&client_id)
            .await
            .map_err(error_handler)?;
        let activity_levels = db.retrieve_activity_levels().await.map_err(error_handler)?;
        let goal_diets = db.retrieve_goal_diets().await.map_err(error_handler)?;

        let derived = metrics::derive_body_metrics(
            &snapshots,
            &activity_levels,
            &goal_diets,
            environment.today(),
        );
        if derived.len() < snapshots.len() {
            debug!(environment.logger, "Skipped unusable snapshots"; "client" => client_id.as_str(), "count" => snapshots.len() - derived.len());
        }

        let (latest, history) = metrics::latest_body_metrics(derived);

        json(&SuccessResponse::Body {
            client: client_id,
            latest,
            history,
        })
    }
}

pub async fn record_body<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::record_body(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        session.require_admin().map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;

        let measurement: Measurement = parse_json(&body).map_err(error_handler)?;
        measurement.validate().map_err(error_handler)?;

        let snapshot = BodyComposition::new(Uuid::new_v4(), client_id.clone(), measurement);
        environment
            .db
            .insert_body_composition(snapshot.clone())
            .await
            .map_err(error_handler)?;

        with_header(
            with_status(json(&snapshot), StatusCode::CREATED),
            "location",
            environment.urls.body_compositions(&client_id).as_str(),
        )
    }
}

pub async fn nutrition<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::nutrition(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let mut entries = environment
            .db
            .retrieve_nutrition(&client_id)
            .await
            .map_err(error_handler)?;
        nutrition::sort_newest_first(&mut entries);

        json(&SuccessResponse::Nutrition {
            client: client_id,
            entries,
        })
    }
}

pub async fn upload_nutrition<O: SafeStore>(
    environment: Environment<O>,
    id: String,
    authorization: Option<String>,
    content: FormData,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::upload_nutrition(id.clone()), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        let client_id = ClientId::parse(&id).map_err(error_handler)?;
        session.require_access(&client_id).map_err(error_handler)?;

        let logger = request_logger(&environment.logger, &session, &client_id);

        debug!(logger, "Parsing submission...");
        let upload = parse_upload(content).await.map_err(error_handler)?;
        let format = image::identify(&upload.image).map_err(error_handler)?;

        // nothing is stored for a client that doesn't exist
        environment
            .db
            .retrieve_client(&client_id)
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::UnknownClient)
            .map_err(error_handler)?;

        let date = upload.metadata.date;
        let meal = upload.metadata.meal;
        let key = nutrition::image_key(
            &environment.config.nutrition_prefix,
            &client_id,
            date,
            meal,
            format.extension(),
        );

        debug!(logger, "Saving image to store..."; "key" => &key);
        environment
            .store
            .save(&key, format.mime_type().essence_str().to_owned(), upload.image)
            .await
            .map_err(error_handler)?;

        let url = environment
            .store
            .get_url(&key)
            .map_err(|source| BackendError::FailedToGenerateUrl { source })
            .map_err(error_handler)?;

        debug!(logger, "Recording nutrition entry..."; "meal" => meal.key());
        let mut entry = NutritionEntry::new(Uuid::new_v4(), client_id.clone(), date, meal, url);
        entry.id = environment
            .db
            .upsert_nutrition(entry.clone())
            .await
            .map_err(error_handler)?;

        with_header(
            with_status(json(&entry), StatusCode::CREATED),
            "location",
            environment.urls.nutrition(&client_id).as_str(),
        )
    }
}

pub async fn dashboard<O: SafeStore>(
    environment: Environment<O>,
    query: DashboardQuery,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::dashboard(), e);

        let session = authenticate(&environment, authorization)
            .await
            .map_err(error_handler)?;
        session.require_admin().map_err(error_handler)?;

        let month = match query.month {
            Some(month) => month.parse::<YearMonth>().map_err(error_handler)?,
            None => YearMonth::of(environment.today()),
        };

        let total_clients = environment
            .db
            .count_clients()
            .await
            .map_err(error_handler)?;
        let sessions = environment
            .db
            .retrieve_sessions(None)
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::Dashboard {
            total_clients,
            cohort: metrics::summarize_cohort_activity(&sessions, month),
            sessions_per_client: metrics::sessions_per_active_client(&sessions, month),
        })
    }
}

/// Resolves the bearer token of a request into the context every
/// operation is checked against.
async fn authenticate<O: SafeStore>(
    environment: &Environment<O>,
    authorization: Option<String>,
) -> Result<SessionContext, BackendError> {
    let token = auth::parse_bearer(authorization.as_deref())?;

    let identity = environment
        .db
        .lookup_login(&token)
        .await?
        .ok_or(BackendError::Unauthenticated)?;

    SessionContext::new(identity)
}

/// Looks up a session by its ID, checking the caller may touch it.
async fn owned_session<O: SafeStore>(
    environment: &Environment<O>,
    session: &SessionContext,
    id: &str,
) -> Result<TrainingSession, BackendError> {
    let id = Uuid::parse_str(id).map_err(|_| BackendError::InvalidId(id.to_owned()))?;

    let training_session = environment
        .db
        .retrieve_session(&id)
        .await?
        .ok_or(BackendError::NonExistentSession(id))?;

    session.require_access(training_session.client_id())?;

    Ok(training_session)
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, BackendError> {
    serde_json::from_slice(body).map_err(BackendError::MalformedBody)
}

fn request_logger(logger: &Logger, session: &SessionContext, client: &ClientId) -> Logger {
    logger.new(o!(
        "username" => session.username.clone(),
        "client" => client.to_string()
    ))
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
