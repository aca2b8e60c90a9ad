//! Tag-filtered structured logging.
//!
//! Lines are built on a [`LogFields`] value and emitted as `tracing` events;
//! a [`SerpentLayer`] renders them with a [`Formatter`] to standard output
//! and, optionally, a log file.
//!
//! ```ignore
//! let log = app.logger();
//! log.out("starting");
//! log.tag("net").add("peer", addr).log("connected");
//! ```
//!
//! Tagged lines are only emitted when their tag was requested with
//! `--logtags` (or `logtags` in a config file), or when `--logalltags` is set.

mod fields;
mod format;
mod layer;

use std::fmt::Display;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::Level;

use crate::store::Store;

pub use fields::{ALL_TAGS_KEY, LogFields, TAGS_KEY};
pub use format::{Formatter, Record, TAG_FIELD};
pub use layer::{LogHandle, SerpentLayer, SharedBuffer};

pub(crate) use fields::VERBOSE_KEY;

/// Entry point for logging against a store.
#[derive(Debug, Clone)]
pub struct Logger {
    store: Store,
}

impl Logger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// An empty field set, passing.
    pub fn fields(&self) -> LogFields {
        LogFields::new(self.store.clone())
    }

    pub fn tag(&self, name: &str) -> LogFields {
        self.fields().tag(name)
    }

    pub fn with_field(&self, key: &str, value: impl Serialize) -> LogFields {
        self.fields().add(key, value)
    }

    pub fn with_fields(&self, fields: IndexMap<String, JsonValue>) -> LogFields {
        LogFields::from_map(self.store.clone(), fields)
    }

    pub fn out(&self, msg: impl Display) {
        fields::emit(Level::INFO, &IndexMap::new(), &msg);
    }

    pub fn log(&self, msg: impl Display) {
        fields::emit(Level::DEBUG, &IndexMap::new(), &msg);
    }

    pub fn out_v(&self, msg: impl Display) {
        if self.store.get_bool(VERBOSE_KEY) {
            self.out(msg);
        }
    }

    pub fn log_v(&self, msg: impl Display) {
        if self.store.get_bool(VERBOSE_KEY) {
            self.log(msg);
        }
    }
}
