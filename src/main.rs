use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use log::{error, info, initialize_logger};
use tokio::sync::mpsc;
use warp::Filter;

use tracker::config::{get_port, get_url, get_variable, get_variable_or};
use tracker::db::PgDb;
use tracker::environment::{system_clock, Config, Environment};
use tracker::routes;
use tracker::store::S3Store;
use tracker::urls::Urls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let store = Arc::new(S3Store::from_env()?);

    let main_port = get_port("TRACKER_PORT");
    let admin_port = get_port("TRACKER_ADMIN_PORT");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("TRACKER_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string).await?;
    let db = Arc::new(PgDb::new(pool));

    let urls = Arc::new(Urls::new(
        get_url("TRACKER_BASE_URL"),
        get_variable_or("TRACKER_API_PATH", "api"),
    ));

    let environment: Environment<()> = Environment::new(
        logger.clone(),
        db,
        urls,
        store,
        Arc::new(system_clock),
        Config::default(),
    );

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = {
        let logger = logger.clone();

        Arc::new(move || {
            let termination_sender = termination_sender.clone();
            let logger = logger.clone();

            async move {
                if termination_sender.send(()).await.is_err() {
                    error!(logger, "Shutdown already in progress");
                }
            }
            .boxed()
        })
    };

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::make_api(environment.clone());

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
