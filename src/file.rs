//! Config file discovery and parsing.
//!
//! A config is named without an extension (`"config"`); every search
//! directory is probed for `{name}.toml` then `{name}.json`, and the first
//! candidate present in a directory represents it. Directories come from a
//! priority-ascending [`SearchPath`] list and are resolved according to the
//! [`SearchMode`]:
//!
//! - [`SearchMode::FirstMatch`] walks from the highest-priority end and
//!   returns the first file found.
//! - [`SearchMode::Merge`] returns every file found, lowest priority first.
//!
//! Missing files are skipped. Only real I/O failures are errors.

use std::path::{Path, PathBuf};

use toml::Table;

use crate::error::SerpentError;
use crate::types::{SearchMode, SearchPath};

const EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// Returns `None` when the directory cannot be determined (no home directory,
/// unreadable working directory).
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

pub fn expand_search_paths(search_paths: &[SearchPath], app_name: &str) -> Vec<PathBuf> {
    search_paths
        .iter()
        .filter_map(|sp| resolve_search_path(sp, app_name))
        .collect()
}

/// File names to probe for a config called `name`.
///
/// A name that already carries a supported extension is used verbatim.
pub fn candidate_names(name: &str) -> Vec<String> {
    let has_ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e));
    if has_ext {
        vec![name.to_string()]
    } else {
        EXTENSIONS.iter().map(|ext| format!("{name}.{ext}")).collect()
    }
}

/// Load config files named `name` from the search paths.
///
/// Returns `(path, content)` pairs in priority-ascending order. An empty
/// result means nothing was found; callers decide whether that is fatal.
pub fn load_config_files(
    search_paths: &[SearchPath],
    name: &str,
    app_name: &str,
    mode: SearchMode,
) -> Result<Vec<(PathBuf, String)>, SerpentError> {
    let dirs = expand_search_paths(search_paths, app_name);
    let names = candidate_names(name);

    match mode {
        SearchMode::Merge => load_all(&dirs, &names),
        SearchMode::FirstMatch => load_first_match(&dirs, &names),
    }
}

fn load_all(dirs: &[PathBuf], names: &[String]) -> Result<Vec<(PathBuf, String)>, SerpentError> {
    let mut results = Vec::new();
    for dir in dirs {
        if let Some(found) = load_from_dir(dir, names)? {
            results.push(found);
        }
    }
    Ok(results)
}

fn load_first_match(
    dirs: &[PathBuf],
    names: &[String],
) -> Result<Vec<(PathBuf, String)>, SerpentError> {
    for dir in dirs.iter().rev() {
        if let Some(found) = load_from_dir(dir, names)? {
            return Ok(vec![found]);
        }
    }
    Ok(vec![])
}

fn load_from_dir(dir: &Path, names: &[String]) -> Result<Option<(PathBuf, String)>, SerpentError> {
    for name in names {
        let file_path = dir.join(name);
        match std::fs::read_to_string(&file_path) {
            Ok(content) => return Ok(Some((file_path, content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(SerpentError::IoError {
                    path: file_path,
                    source: e,
                });
            }
        }
    }
    Ok(None)
}

/// Parse file content by extension. Anything not ending in `.json` is TOML.
pub fn parse_config(path: &Path, content: &str) -> Result<Table, SerpentError> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(content).map_err(|e| SerpentError::JsonError {
            path: path.to_path_buf(),
            source: e,
        })
    } else {
        toml::from_str(content).map_err(|e| SerpentError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
