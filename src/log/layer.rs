//! The `tracing` side of serpent logging.
//!
//! [`SerpentLayer`] turns every enabled event into a [`Record`] and hands it
//! to each sink's [`Formatter`]. A [`LogHandle`] owns the shared state (the
//! level and the sinks) and can be cloned freely; changing the level or
//! adding the file hook through any clone affects every layer built from it.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::{Dispatch, Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::error::SerpentError;
use crate::log::format::{Formatter, Record};

/// Event field holding the JSON-encoded field set of a serpent log call.
pub(crate) const FIELDS_KEY: &str = "serpent_fields";

struct Sink {
    formatter: Formatter,
    writer: Box<dyn Write + Send>,
}

impl Sink {
    fn write(&mut self, record: &Record) {
        let bytes = self.formatter.format(record);
        if !bytes.is_empty() {
            // Logging never fails the caller.
            let _ = self.writer.write_all(&bytes);
        }
    }
}

struct Sinks {
    stdout: Sink,
    file: Option<(PathBuf, Sink)>,
}

struct Shared {
    level: RwLock<LevelFilter>,
    sinks: Mutex<Sinks>,
}

impl Shared {
    fn level(&self) -> LevelFilter {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sinks(&self) -> std::sync::MutexGuard<'_, Sinks> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, record: &Record) {
        let mut sinks = self.sinks();
        sinks.stdout.write(record);
        if let Some((_, sink)) = sinks.file.as_mut() {
            sink.write(record);
        }
    }
}

/// Shared logging state: level, stdout sink and optional file hook.
#[derive(Clone)]
pub struct LogHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle")
            .field("level", &self.level())
            .field("file", &self.file_path())
            .finish()
    }
}

impl LogHandle {
    /// Log to standard output.
    pub fn new(formatter: Formatter, level: LevelFilter) -> Self {
        Self::with_writer(formatter, level, io::stdout())
    }

    /// Log to an arbitrary writer in place of standard output.
    pub fn with_writer(
        formatter: Formatter,
        level: LevelFilter,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                level: RwLock::new(level),
                sinks: Mutex::new(Sinks {
                    stdout: Sink {
                        formatter,
                        writer: Box::new(writer),
                    },
                    file: None,
                }),
            }),
        }
    }

    pub fn layer(&self) -> SerpentLayer {
        SerpentLayer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A complete subscriber: the registry plus this handle's layer.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry().with(self.layer())
    }

    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(self.subscriber())
    }

    /// Make this handle the process-wide default. Returns false when another
    /// subscriber was installed first.
    pub fn install(&self) -> bool {
        tracing::dispatcher::set_global_default(self.dispatch()).is_ok()
    }

    pub fn level(&self) -> LevelFilter {
        self.shared.level()
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self
            .shared
            .level
            .write()
            .unwrap_or_else(PoisonError::into_inner) = level;
    }

    /// Silence everything.
    pub fn panic_only(&self) {
        self.set_level(LevelFilter::OFF);
    }

    /// Back to the default level, debug.
    pub fn normal(&self) {
        self.set_level(LevelFilter::DEBUG);
    }

    pub fn set_formatter(&self, formatter: Formatter) {
        self.shared.sinks().stdout.formatter = formatter;
    }

    /// Create (truncating) `path` and copy every record into it with a debug
    /// formatter. Replaces any previous file hook.
    pub fn set_file_hook(&self, path: &Path) -> Result<(), SerpentError> {
        let file = File::create(path).map_err(|e| SerpentError::LogFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let sink = Sink {
            formatter: Formatter::debug(),
            writer: Box::new(file),
        };
        self.shared.sinks().file = Some((path.to_path_buf(), sink));
        Ok(())
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.shared.sinks().file.as_ref().map(|(p, _)| p.clone())
    }

    pub fn flush(&self) {
        let mut sinks = self.shared.sinks();
        let _ = sinks.stdout.writer.flush();
        if let Some((_, sink)) = sinks.file.as_mut() {
            let _ = sink.writer.flush();
        }
    }

    /// Flush and drop the file hook.
    pub fn close_file(&self) {
        let mut sinks = self.shared.sinks();
        if let Some((_, mut sink)) = sinks.file.take() {
            let _ = sink.writer.flush();
        }
    }
}

/// `tracing_subscriber` layer rendering events through serpent formatters.
pub struct SerpentLayer {
    shared: Arc<Shared>,
}

impl<S: Subscriber> Layer<S> for SerpentLayer {
    // The level is changed at runtime, so callsites are never cached.
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        *metadata.level() <= self.shared.level()
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        let record = Record {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.shared.write(&record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: IndexMap<String, JsonValue>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: JsonValue) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            FIELDS_KEY => {
                if let Ok(JsonValue::Object(map)) = serde_json::from_str(value) {
                    self.fields.extend(map);
                }
            }
            _ => self.insert(field, JsonValue::from(value)),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, JsonValue::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, JsonValue::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, JsonValue::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, JsonValue::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = text;
        } else {
            self.insert(field, JsonValue::String(text));
        }
    }
}

/// An in-memory writer whose clones share one buffer. Handy for capturing
/// log output in tests.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
