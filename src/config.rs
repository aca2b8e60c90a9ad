//! Policy the embedding program hands to [`init`](crate::init).
//!
//! ```ignore
//! let cfg = Config::new("myapp")
//!     .require_config_file(true)
//!     .env_prefix("MYAPP")
//!     .set_default("port", 8080);
//! ```

use std::path::PathBuf;

use toml::Value;
use tracing::level_filters::LevelFilter;

use crate::log::Formatter;
use crate::types::{SearchMode, SearchPath};

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) require_config_file: bool,
    pub(crate) report_missing_config_file: bool,
    pub(crate) require_log_file: bool,
    pub(crate) report_missing_log_file: bool,
    pub(crate) log_file: bool,
    pub(crate) config_file: String,
    pub(crate) search_local_config: bool,
    pub(crate) user_config_path: Option<String>,
    pub(crate) global_config_path: Option<PathBuf>,
    pub(crate) search_paths: Option<Vec<SearchPath>>,
    pub(crate) search_mode: SearchMode,
    pub(crate) watch_config: bool,
    pub(crate) use_env_variables: bool,
    pub(crate) env_prefix: Option<String>,
    pub(crate) formatter: Formatter,
    pub(crate) level: LevelFilter,
    pub(crate) defaults: Vec<(String, Value)>,
    pub(crate) overrides: Vec<(String, Value)>,
}

impl Config {
    /// Defaults for a real program: config file `config` searched in the
    /// working directory and `~/.{app}/`, optional; a log file is required.
    pub fn new(app: &str) -> Self {
        Self {
            require_config_file: false,
            report_missing_config_file: false,
            require_log_file: true,
            report_missing_log_file: true,
            log_file: true,
            config_file: "config".into(),
            search_local_config: true,
            user_config_path: Some(format!(".{app}")),
            global_config_path: None,
            search_paths: None,
            search_mode: SearchMode::FirstMatch,
            watch_config: false,
            use_env_variables: false,
            env_prefix: None,
            formatter: Formatter::default(),
            level: LevelFilter::DEBUG,
            defaults: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// For tests: verbose on, the given tags requested, debug lines shown,
    /// no config file search and no log file.
    pub fn testing(logtags: &[&str]) -> Self {
        let tags: Vec<String> = logtags.iter().map(|t| t.to_string()).collect();
        Self {
            user_config_path: None,
            search_local_config: false,
            search_paths: Some(Vec::new()),
            log_file: false,
            require_log_file: false,
            report_missing_log_file: false,
            formatter: Formatter::debug(),
            ..Self::new("")
        }
        .set_default("verbose", true)
        .set_default("logtags", tags)
    }

    /// Abort when no config file is found.
    pub fn require_config_file(mut self, b: bool) -> Self {
        self.require_config_file = b;
        self
    }

    /// Log a notice when an optional config file is missing.
    pub fn report_missing_config_file(mut self, b: bool) -> Self {
        self.report_missing_config_file = b;
        self
    }

    /// Abort when the log file cannot be created.
    pub fn require_log_file(mut self, b: bool) -> Self {
        self.require_log_file = b;
        self
    }

    pub fn report_missing_log_file(mut self, b: bool) -> Self {
        self.report_missing_log_file = b;
        self
    }

    /// Whether to write a log file at all.
    pub fn log_file(mut self, b: bool) -> Self {
        self.log_file = b;
        self
    }

    /// Config file name, without extension unless it is `.toml` or `.json`.
    pub fn config_file(mut self, name: &str) -> Self {
        self.config_file = name.to_string();
        self
    }

    pub fn search_local_config(mut self, b: bool) -> Self {
        self.search_local_config = b;
        self
    }

    /// Directory under the home directory to search, e.g. `.myapp`.
    pub fn user_config_path(mut self, path: &str) -> Self {
        self.user_config_path = Some(path.to_string());
        self
    }

    pub fn global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Replace the search list built from the three settings above.
    /// Priority-ascending: the last entry wins.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Reload the config file when it changes. Needs the `watch` feature.
    pub fn watch_config(mut self, b: bool) -> Self {
        self.watch_config = b;
        self
    }

    /// Overlay every environment variable as a config key.
    pub fn use_env_variables(mut self, b: bool) -> Self {
        self.use_env_variables = b;
        self
    }

    /// Overlay `{PREFIX}_*` environment variables. Implies
    /// [`use_env_variables`](Self::use_env_variables).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.use_env_variables = true;
        self.env_prefix = Some(prefix.to_string());
        self
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn set_default<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.defaults.push((key.to_string(), value.into()));
        self
    }

    pub fn set<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Start with logging silenced.
    pub fn log_panic_only(mut self) -> Self {
        self.level = LevelFilter::OFF;
        self
    }

    pub fn log_normal(mut self) -> Self {
        self.level = LevelFilter::DEBUG;
        self
    }

    /// Directories to search for the config file, lowest priority first:
    /// the global path, the user path, then the working directory.
    pub fn resolved_search_paths(&self) -> Vec<SearchPath> {
        if let Some(paths) = &self.search_paths {
            return paths.clone();
        }
        let mut paths = Vec::new();
        if let Some(global) = &self.global_config_path {
            paths.push(SearchPath::Path(global.clone()));
        }
        if let Some(user) = &self.user_config_path {
            paths.push(SearchPath::Home(user.clone()));
        }
        if self.search_local_config {
            paths.push(SearchPath::Cwd);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_search_order() {
        let cfg = Config::new("myapp").global_config_path("/etc/myapp");
        assert_eq!(
            cfg.resolved_search_paths(),
            vec![
                SearchPath::Path("/etc/myapp".into()),
                SearchPath::Home(".myapp".into()),
                SearchPath::Cwd,
            ]
        );
    }

    #[test]
    fn explicit_paths_replace_defaults() {
        let cfg = Config::new("myapp")
            .search_local_config(false)
            .search_paths(vec![SearchPath::Path("/tmp/x".into())]);
        assert_eq!(cfg.resolved_search_paths(), vec![SearchPath::Path("/tmp/x".into())]);
    }

    #[test]
    fn testing_config() {
        let cfg = Config::testing(&["net"]);
        assert!(cfg.resolved_search_paths().is_empty());
        assert!(!cfg.log_file);
        assert!(cfg.formatter.debug);
        assert_eq!(cfg.defaults[0], ("verbose".to_string(), Value::Boolean(true)));
        assert_eq!(
            cfg.defaults[1].1,
            Value::Array(vec![Value::String("net".into())])
        );
    }

    #[test]
    fn env_prefix_enables_env() {
        let cfg = Config::new("a").env_prefix("APP");
        assert!(cfg.use_env_variables);
        assert_eq!(cfg.env_prefix.as_deref(), Some("APP"));
    }

    #[test]
    fn log_level_toggles() {
        assert_eq!(Config::new("a").log_panic_only().level, LevelFilter::OFF);
        assert_eq!(Config::new("a").log_panic_only().log_normal().level, LevelFilter::DEBUG);
    }
}
