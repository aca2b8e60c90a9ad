use std::path::PathBuf;

/// Where to search for config files.
///
/// Lists of search paths are **priority-ascending**: the last entry wins.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".myapp".into())`.
    Home(String),
    /// Current working directory.
    Cwd,
    /// An explicit path.
    Path(PathBuf),
}

/// What to do when more than one search path holds a config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Use only the highest-priority file found.
    #[default]
    FirstMatch,
    /// Deep-merge every file found, later files overriding earlier ones.
    Merge,
}
