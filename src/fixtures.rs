#[cfg(test)]
pub mod test {
    use confique::Config;
    use serde::{Deserialize, Serialize};

    /// Shape of a typical program's settings, for [`Store::extract`] tests.
    ///
    /// [`Store::extract`]: crate::Store::extract
    #[derive(Config, Serialize, Deserialize, Debug, PartialEq)]
    pub struct ServeConfig {
        #[config(default = "localhost")]
        pub host: String,

        #[config(default = 8080)]
        pub port: u16,

        #[config(default = [])]
        pub logtags: Vec<String>,

        #[config(nested)]
        pub database: DbConfig,
    }

    #[derive(Config, Serialize, Deserialize, Debug, PartialEq)]
    pub struct DbConfig {
        pub url: Option<String>,

        #[config(default = 5)]
        pub pool_size: usize,
    }

    #[test]
    fn serve_config_defaults() {
        let config = ServeConfig::builder().load().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert!(config.logtags.is_empty());
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.pool_size, 5);
    }
}
