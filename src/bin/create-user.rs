use std::error::Error;
use std::io::{self, BufRead};

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;

use tracker::auth::{hash_password, Credential};
use tracker::config::get_variable;
use tracker::db::{Db, PgDb};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "create-user",
    about = "Create a login. The password is read from the first line of standard input"
)]
struct Opt {
    /// The login name; `admin` for the trainer, the client ID otherwise
    username: String,

    /// The name shown after login
    name: String,

    /// The bcrypt cost factor
    #[structopt(long, default_value = "12")]
    cost: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let mut password = String::new();
    io::stdin().lock().read_line(&mut password)?;
    let password = password.trim_end_matches(&['\r', '\n'][..]);

    if password.is_empty() {
        return Err("refusing to create a login with an empty password".into());
    }

    let connection_string = get_variable("TRACKER_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string).await?;
    let db = PgDb::new(pool);

    info!(logger, "Hashing password..."; "username" => &opt.username, "cost" => opt.cost);
    let password_hash = hash_password(password, opt.cost)?;

    db.create_credential(Credential::new(opt.username.clone(), opt.name, password_hash))
        .await?;

    info!(logger, "Created login"; "username" => opt.username);

    Ok(())
}
