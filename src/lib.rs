pub mod auth;
pub mod body;
pub mod client;
pub mod config;
pub mod dates;
pub mod db;
pub mod environment;
pub mod errors;
pub mod image;
pub mod io;
pub mod metrics;
pub mod normalization;
pub mod nutrition;
pub mod routes;
pub mod store;
pub mod training;
pub mod urls;
