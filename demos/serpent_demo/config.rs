//! Typed view of the demo's settings.
//!
//! Everything in here can come from `config.toml`, `SERPENT_DEMO_*`
//! environment variables or the command line; [`Store::extract`] merges
//! them into a [`DemoConfig`].
//!
//! [`Store::extract`]: serpent::Store::extract

use confique::Config;
use serde::{Deserialize, Serialize};

#[derive(Config, Serialize, Deserialize, Debug)]
pub struct DemoConfig {
    /// Name printed by `greet`.
    #[config(default = "world")]
    pub name: String,

    /// How many greetings to print.
    #[config(default = 1)]
    pub count: i32,

    #[config(nested)]
    pub server: ServerConfig,
}

/// The `[server]` section.
#[derive(Config, Serialize, Deserialize, Debug)]
pub struct ServerConfig {
    #[config(default = "127.0.0.1")]
    pub host: String,
}
