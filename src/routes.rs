use std::sync::Arc;

use log::{error, warn, Logger};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::{Environment, SafeStore};
use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The maximum form data size to accept. Meal photos from phone
/// cameras fit comfortably.
const MAX_CONTENT_LENGTH: u64 = 32 * 1024 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            warn!(logger, "Request refused"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        BadRequest
        | PartsMissing
        | MalformedFormSubmission
        | MalformedBody(..)
        | MalformedUploadMetadata(..)
        | MalformedMeasure(..)
        | InvalidDate(..)
        | InvalidMonth(..)
        | InvalidId(..)
        | InvalidField { .. }
        | UnknownClient => StatusCode::BAD_REQUEST,
        InvalidCredentials | Unauthenticated => StatusCode::UNAUTHORIZED,
        Forbidden => StatusCode::FORBIDDEN,
        NonExistentClient(..) | NonExistentSession(..) => StatusCode::NOT_FOUND,
        ClientAlreadyExists | ExerciseAlreadyExists | UsernameAlreadyExists => StatusCode::CONFLICT,
        UnsupportedImageFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Every API route, with errors rendered as JSON.
pub fn make_api<O: SafeStore + 'static>(environment: Environment<O>) -> BoxedFilter<(Box<dyn Reply>,)> {
    let logger = environment.logger.clone();

    let public = make_login_route(environment.clone())
        .or(make_logout_route(environment.clone()))
        .or(make_me_route(environment.clone()))
        .or(make_exercises_route(environment.clone()))
        .or(make_add_exercise_route(environment.clone()))
        .or(make_activity_levels_route(environment.clone()))
        .or(make_goal_diets_route(environment.clone()))
        .or(make_meals_route(environment.clone()))
        .boxed();

    let clients = make_clients_route(environment.clone())
        .or(make_create_client_route(environment.clone()))
        .or(make_client_route(environment.clone()))
        .or(make_update_client_route(environment.clone()))
        .or(make_delete_client_route(environment.clone()))
        .boxed();

    let training = make_sessions_route(environment.clone())
        .or(make_log_session_route(environment.clone()))
        .or(make_update_session_route(environment.clone()))
        .or(make_delete_session_route(environment.clone()))
        .or(make_progress_route(environment.clone()))
        .boxed();

    let tracking = make_body_route(environment.clone())
        .or(make_record_body_route(environment.clone()))
        .or(make_nutrition_route(environment.clone()))
        .or(make_upload_nutrition_route(environment.clone()))
        .or(make_dashboard_route(environment))
        .boxed();

    public
        .or(clients)
        .or(training)
        .or(tracking)
        .recover(move |r| format_rejection(logger.clone(), r))
        .map(|reply| Box::new(reply) as Box<dyn Reply>)
        .boxed()
}

mod internal {
    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, path as p, path::param as par, post, put, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name<O: Clone + Send + Sync + 'static>(environment: Environment<O>) -> Route {
            let r = environment.urls.api_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(r));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    fn auth() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
        warp::header::optional::<String>("authorization")
    }

    fn body() -> impl Filter<Extract = (bytes::Bytes,), Error = warp::Rejection> + Clone {
        warp::body::bytes()
    }

    route!(make_login_route => login, rt; p("login"), end(), post(), body());
    route!(make_logout_route => logout, rt; p("logout"), end(), post(), auth());
    route!(make_me_route => me, rt; p("me"), end(), g(), auth());
    route!(make_exercises_route => exercises, rt; p("exercises"), end(), g(), auth());
    route!(make_add_exercise_route => add_exercise, rt; p("exercises"), end(), post(), auth(), body());
    route!(make_activity_levels_route => activity_levels, rt; p("activity-levels"), end(), g(), auth());
    route!(make_goal_diets_route => goal_diets, rt; p("goal-diets"), end(), g(), auth());
    route!(make_meals_route => meals, rt; p("meals"), end(), g(), auth());
    route!(make_clients_route => clients, rt; p("clients"), end(), g(), auth());
    route!(make_create_client_route => create_client, rt; p("clients"), end(), post(), auth(), body());
    route!(make_client_route => client, rt; p("clients"), par::<String>(), end(), g(), auth());
    route!(make_update_client_route => update_client, rt; p("clients"), par::<String>(), end(), put(), auth(), body());
    route!(make_delete_client_route => delete_client, rt; p("clients"), par::<String>(), end(), delete(), auth());
    route!(make_sessions_route => sessions, rt; p("clients"), par::<String>(), p("sessions"), end(), g(), query::<q::SessionsQuery>(), auth());
    route!(make_log_session_route => log_session, rt; p("clients"), par::<String>(), p("sessions"), end(), post(), auth(), body());
    route!(make_update_session_route => update_session, rt; p("sessions"), par::<String>(), end(), put(), auth(), body());
    route!(make_delete_session_route => delete_session, rt; p("sessions"), par::<String>(), end(), delete(), auth());
    route!(make_progress_route => progress, rt; p("clients"), par::<String>(), p("progress"), end(), g(), query::<q::ProgressQuery>(), auth());
    route!(make_body_route => body_metrics, rt; p("clients"), par::<String>(), p("body"), end(), g(), auth());
    route!(make_record_body_route => record_body, rt; p("clients"), par::<String>(), p("body"), end(), post(), auth(), body());
    route!(make_nutrition_route => nutrition, rt; p("clients"), par::<String>(), p("nutrition"), end(), g(), auth());
    route!(make_upload_nutrition_route => upload_nutrition, rt; p("clients"), par::<String>(), p("nutrition"), end(), post(), auth(), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_dashboard_route => dashboard, rt; p("dashboard"), end(), g(), query::<q::DashboardQuery>(), auth());
}
