use std::sync::Arc;

use log::Logger;
use time::{Date, OffsetDateTime};

use crate::db::Db;
use crate::store::Store;
use crate::urls::Urls;

pub type VecStore<O> = dyn Store<Output = O, Raw = Vec<u8>> + Send + Sync;

/// Returns today's date. Swapped out in tests to pin ages and months.
pub type Clock = dyn Fn() -> Date + Send + Sync;

/// Bounds on the output type of the blob store.
pub trait SafeStore: Clone + Send + Sync {}

impl<T: Clone + Send + Sync> SafeStore for T {}

#[derive(Clone)]
pub struct Environment<O: Clone + Send + Sync> {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub urls: Arc<Urls>,
    pub store: Arc<VecStore<O>>,
    pub clock: Arc<Clock>,
    pub config: Config,
}

impl<O: Clone + Send + Sync> Environment<O> {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db + Send + Sync>,
        urls: Arc<Urls>,
        store: Arc<VecStore<O>>,
        clock: Arc<Clock>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            urls,
            store,
            clock,
            config,
        }
    }

    pub fn today(&self) -> Date {
        (self.clock)()
    }
}

pub fn system_clock() -> Date {
    OffsetDateTime::now_utc().date()
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Blob-key prefix for meal photos.
    pub(crate) nutrition_prefix: String,
}

impl Config {
    pub fn new(nutrition_prefix: impl Into<String>) -> Self {
        Self {
            nutrition_prefix: nutrition_prefix.into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new("nutrition")
    }
}
