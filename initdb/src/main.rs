//! A helper program to run the schema migrations and, optionally,
//! load seed data (exercises, clients, credentials) from an SQL file.

use std::env;
use std::fs;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger, o};

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = env::var("TRACKER_DB_CONNECTION_STRING")
        .expect("could not read TRACKER_DB_CONNECTION_STRING");
    let migration_dir =
        env::var("TRACKER_MIGRATIONS_DIR").unwrap_or_else(|_| "./migrations".to_owned());

    debug!(logger, "Connecting to database...");

    let mut client =
        Client::connect(&connection_string, NoTls).expect("could not connect to database");

    {
        // it would make more sense to use `tokio-postgres`, which is
        // inherently async, but `movine` expects the blocking client
        let mut movine = Movine::new(&mut client);
        movine.set_migration_dir(&migration_dir);
        movine.set_strict(true);

        if movine.status().is_err() {
            debug!(logger, "Initializing movine...");
            movine.initialize().expect("failed to initialize movine");
        }

        debug!(logger, "Running migrations..."; "directory" => &migration_dir);
        movine.up().expect("failed to run migrations");
    }

    if let Ok(seed_file) = env::var("TRACKER_SEED_FILE") {
        let logger = logger.new(o!("seed_file" => seed_file.clone()));

        info!(logger, "Loading seed data...");
        let sql = fs::read_to_string(&seed_file).expect("could not read seed file");
        client
            .simple_query(&sql)
            .expect("could not execute seed file");
    }

    info!(logger, "Completed initialization.");
}
