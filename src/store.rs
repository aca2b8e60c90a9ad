//! The unified configuration store.
//!
//! Every value a program reads (built-in defaults, config file contents,
//! environment variables, parsed command-line flags) resolves through one
//! flat, case-insensitive namespace. Layers, highest priority first:
//!
//! ```text
//! set()                     explicit programmatic values
//! flags (supplied)          bound after parsing, user passed the flag
//! environment               PREFIX_KEY snapshot
//! config file(s)            TOML or JSON
//! set_default()             built-in defaults
//! flags (not supplied)      the flag's own declared default
//! ```
//!
//! A flag's declared default sits *below* `set_default`, so a program default
//! is only shadowed by a flag the user actually typed.
//!
//! [`Store`] is a cheap handle: clones share the same layers. The file
//! watcher mutates the file layer from a background thread, so each read
//! takes the lock once and no multi-key read is transactional.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use confique::Config;
use serde::Deserialize;
use toml::{Table, Value};

use crate::env;
use crate::error::SerpentError;
use crate::file;
use crate::types::{SearchMode, SearchPath};

/// A parsed flag bound into the store.
#[derive(Debug, Clone, PartialEq)]
struct BoundFlag {
    value: Value,
    /// True when the value came from the command line rather than the
    /// flag's declared default.
    changed: bool,
}

#[derive(Debug, Default)]
struct Layers {
    overrides: Table,
    flags: BTreeMap<String, BoundFlag>,
    env: Table,
    file: Table,
    defaults: Table,
    config_files: Vec<PathBuf>,
}

/// Which layer answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Override,
    Flag,
    Env,
    File,
    Default,
    FlagDefault,
}

impl Source {
    /// Whether a value from this layer counts as explicitly set.
    pub fn is_explicit(self) -> bool {
        !matches!(self, Source::Default | Source::FlagDefault)
    }
}

struct Inner {
    layers: RwLock<Layers>,
    #[cfg(feature = "watch")]
    watcher: std::sync::Mutex<Option<notify::RecommendedWatcher>>,
}

/// Shared handle to the unified configuration store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("layers", &*self.read())
            .finish()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                layers: RwLock::new(Layers::default()),
                #[cfg(feature = "watch")]
                watcher: std::sync::Mutex::new(None),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Layers> {
        self.inner
            .layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Layers> {
        self.inner
            .layers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a value at the highest priority. Dotted keys address nested tables.
    pub fn set<V: Into<Value>>(&self, key: &str, value: V) {
        set_nested(&mut self.write().overrides, &normalize(key), value.into());
    }

    /// Set a built-in default, used when no other layer has the key.
    pub fn set_default<V: Into<Value>>(&self, key: &str, value: V) {
        set_nested(&mut self.write().defaults, &normalize(key), value.into());
    }

    /// Bind one parsed flag. A later binding of the same name replaces it,
    /// which is what lets two commands declare the same flag with different
    /// defaults.
    pub fn bind_flag(&self, name: &str, value: Value, changed: bool) {
        self.write()
            .flags
            .insert(normalize(name), BoundFlag { value, changed });
    }

    /// Drop every flag binding.
    pub fn clear_flags(&self) {
        self.write().flags.clear();
    }

    /// Replace the environment layer with a snapshot of `vars`.
    pub fn load_env(&self, prefix: Option<&str>, vars: impl IntoIterator<Item = (String, String)>) {
        let table = env::env_to_table(prefix, vars);
        self.write().env = table;
    }

    /// Snapshot the process environment into the environment layer.
    pub fn automatic_env(&self, prefix: Option<&str>) {
        self.load_env(prefix, std::env::vars());
    }

    /// Find, parse and install the config file(s) named `name`.
    ///
    /// Returns the paths that were read. Finding nothing is
    /// [`SerpentError::ConfigFileNotFound`]; the file layer is left untouched
    /// in that case.
    pub fn read_config(
        &self,
        name: &str,
        search_paths: &[SearchPath],
        app_name: &str,
        mode: SearchMode,
    ) -> Result<Vec<PathBuf>, SerpentError> {
        let files = file::load_config_files(search_paths, name, app_name, mode)?;
        if files.is_empty() {
            return Err(SerpentError::ConfigFileNotFound {
                name: name.to_string(),
                searched: file::expand_search_paths(search_paths, app_name),
            });
        }

        let mut merged = Table::new();
        for (path, content) in &files {
            let table = file::parse_config(path, content)?;
            merged = deep_merge(merged, lowercase_keys(table));
        }

        // Watch events carry absolute paths.
        let paths: Vec<PathBuf> = files
            .into_iter()
            .map(|(path, _)| std::path::absolute(&path).unwrap_or(path))
            .collect();
        let mut layers = self.write();
        layers.file = merged;
        layers.config_files = paths.clone();
        Ok(paths)
    }

    /// Re-read the files found by the last [`read_config`](Self::read_config).
    pub fn reload_config(&self) -> Result<(), SerpentError> {
        let paths = self.config_files();
        let mut merged = Table::new();
        for path in &paths {
            let content = std::fs::read_to_string(path).map_err(|e| SerpentError::IoError {
                path: path.clone(),
                source: e,
            })?;
            merged = deep_merge(merged, lowercase_keys(file::parse_config(path, &content)?));
        }
        self.write().file = merged;
        Ok(())
    }

    pub fn config_files(&self) -> Vec<PathBuf> {
        self.read().config_files.clone()
    }

    /// Watch the loaded config files and reload the file layer on change.
    ///
    /// The watcher lives as long as the store. Calling this again replaces
    /// the previous watcher.
    #[cfg(feature = "watch")]
    pub fn watch_config(&self) -> Result<(), SerpentError> {
        use notify::{EventKind, RecursiveMode, Watcher};

        let files = self.config_files();
        if files.is_empty() {
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        let watched = files.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let Ok(event) = res else { return };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                if !event.paths.iter().any(|p| watched.contains(p)) {
                    return;
                }
                let Some(inner) = weak.upgrade() else { return };
                match (Store { inner }).reload_config() {
                    Ok(()) => tracing::debug!(paths = ?event.paths, "config file changed"),
                    Err(e) => tracing::warn!(error = %e, "config reload failed"),
                }
            })?;

        // Editors replace files on save; watch the directories instead.
        let mut dirs: Vec<PathBuf> = files
            .iter()
            .filter_map(|f| f.parent().map(|p| p.to_path_buf()))
            .collect();
        dirs.dedup();
        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        *self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(watcher);
        Ok(())
    }

    /// Look a key up through every layer.
    pub fn lookup(&self, key: &str) -> Option<(Value, Source)> {
        let key = normalize(key);
        let layers = self.read();

        if let Some(v) = table_get(&layers.overrides, &key) {
            return Some((v.clone(), Source::Override));
        }
        if let Some(f) = layers.flags.get(&key).filter(|f| f.changed) {
            return Some((f.value.clone(), Source::Flag));
        }
        if let Some(v) = layers.env.get(&key) {
            return Some((v.clone(), Source::Env));
        }
        if let Some(v) = table_get(&layers.file, &key) {
            return Some((v.clone(), Source::File));
        }
        if let Some(v) = table_get(&layers.defaults, &key) {
            return Some((v.clone(), Source::Default));
        }
        layers
            .flags
            .get(&key)
            .map(|f| (f.value.clone(), Source::FlagDefault))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).map(|(v, _)| v)
    }

    /// True when some layer other than the defaults holds the key.
    pub fn is_set(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(|(_, src)| src.is_explicit())
    }

    /// Every key merged across layers, highest priority winning.
    pub fn all_settings(&self) -> Table {
        let layers = self.read();
        let (supplied, unsupplied): (Vec<_>, Vec<_>) =
            layers.flags.iter().partition(|(_, f)| f.changed);
        let to_table = |flags: Vec<(&String, &BoundFlag)>| -> Table {
            flags
                .into_iter()
                .map(|(k, f)| (k.clone(), f.value.clone()))
                .collect()
        };

        let mut merged = to_table(unsupplied);
        merged = deep_merge(merged, layers.defaults.clone());
        merged = deep_merge(merged, layers.file.clone());
        merged = deep_merge(merged, layers.env.clone());
        merged = deep_merge(merged, to_table(supplied));
        deep_merge(merged, layers.overrides.clone())
    }

    /// Deserialize the merged store into a typed config struct.
    ///
    /// confique fills `#[config(default)]` values for keys no layer holds and
    /// reports required fields that are still missing. Keys the struct does
    /// not know are ignored.
    pub fn extract<C: Config>(&self) -> Result<C, SerpentError>
    where
        C::Layer: for<'de> Deserialize<'de>,
    {
        let layer: C::Layer = Value::Table(self.all_settings())
            .try_into()
            .map_err(|e: toml::de::Error| SerpentError::InvalidValue {
                key: "<store>".into(),
                reason: e.to_string(),
            })?;

        C::builder()
            .preloaded(layer)
            .load()
            .map_err(SerpentError::from)
    }
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

fn lowercase_keys(table: Table) -> Table {
    table
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Table(t) => Value::Table(lowercase_keys(t)),
                other => other,
            };
            (k.to_lowercase(), v)
        })
        .collect()
}

/// Navigate a table by dotted key. A literal key containing dots wins over
/// the nested path.
fn table_get<'a>(table: &'a Table, dotted_key: &str) -> Option<&'a Value> {
    if let Some(v) = table.get(dotted_key) {
        return Some(v);
    }
    let (path, leaf) = dotted_key.rsplit_once('.')?;
    let mut current = table;
    for segment in path.split('.') {
        current = current.get(segment)?.as_table()?;
    }
    current.get(leaf)
}

/// Insert at a dotted key, creating (or replacing non-table) intermediates.
fn set_nested(table: &mut Table, dotted_key: &str, value: Value) {
    let mut segments = dotted_key.split('.').peekable();
    let mut current = table;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment)
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        let Value::Table(next) = entry else { return };
        current = next;
    }
}

/// Deep-merge `overlay` onto `base`; tables recurse, anything else is replaced.
fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, overlay_val) in overlay {
        let merged = match (base.remove(&key), overlay_val) {
            (Some(Value::Table(b)), Value::Table(o)) => Value::Table(deep_merge(b, o)),
            (_, o) => o,
        };
        base.insert(key, merged);
    }
    base
}
