use std::env;

use url::Url;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable, or `default`
/// if it isn't set.
pub fn get_variable_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Parses the named environment variable as a URL or panics.
pub fn get_url(name: &str) -> Url {
    let value = get_variable(name);

    Url::parse(&value).unwrap_or_else(|e| panic!("parse {} ({:?}) as URL: {}", name, value, e))
}

/// Parses the named environment variable as a port number or panics.
pub fn get_port(name: &str) -> u16 {
    get_variable(name)
        .parse()
        .unwrap_or_else(|_| panic!("parse {} as u16", name))
}
