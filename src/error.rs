use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerpentError {
    /// A flag declaration is malformed: wrong default type, unparsable
    /// implied value, or an abbreviation longer than one character. This is
    /// a programming error in the embedding program, never a user error.
    #[error("Flag '{flag}' is misdeclared: {reason}")]
    Defect { flag: String, reason: String },

    #[error("Flag '{flag}' is declared twice in the scope of command '{command}'")]
    DuplicateFlag { flag: String, command: String },

    #[error("Flag '{flag}' is not defined on command '{command}'")]
    UnknownFlag { flag: String, command: String },

    #[error("required flag(s) {} not set", quoted(.0))]
    RequiredFlags(Vec<String>),

    #[error(transparent)]
    Parse(#[from] clap::Error),

    #[error("Can't read config file '{name}' (searched {})", display_paths(.searched))]
    ConfigFileNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Can't access log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[cfg(feature = "watch")]
    #[error("Failed to watch config file: {0}")]
    Watch(#[from] notify::Error),

    #[error("Configuration error: {0}")]
    Extract(#[from] confique::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("{0}")]
    Command(String),
}

impl SerpentError {
    pub(crate) fn defect(flag: &str, reason: impl Into<String>) -> Self {
        SerpentError::Defect {
            flag: flag.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap an arbitrary failure raised by a command body.
    pub fn command(err: impl std::fmt::Display) -> Self {
        SerpentError::Command(err.to_string())
    }

    /// True for the declaration-time defects that indicate a bug in the
    /// program rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            SerpentError::Defect { .. } | SerpentError::DuplicateFlag { .. }
        )
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no directories".into();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defect_formats_correctly() {
        let err = SerpentError::defect("count", "default is bool, expected i32");
        let msg = err.to_string();
        assert!(msg.contains("count"));
        assert!(msg.contains("expected i32"));
        assert!(err.is_defect());
    }

    #[test]
    fn required_flags_lists_every_name() {
        let err = SerpentError::RequiredFlags(vec!["name".into(), "port".into()]);
        assert_eq!(err.to_string(), "required flag(s) \"name\", \"port\" not set");
        assert!(!err.is_defect());
    }

    #[test]
    fn missing_config_names_searched_dirs() {
        let err = SerpentError::ConfigFileNotFound {
            name: "config".into(),
            searched: vec!["/etc/app".into(), "/home/u/.app".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("config"));
        assert!(msg.contains("/etc/app"));
        assert!(msg.contains("/home/u/.app"));
    }

    #[test]
    fn command_wraps_display() {
        let err = SerpentError::command("boom");
        assert_eq!(err.to_string(), "boom");
    }
}
