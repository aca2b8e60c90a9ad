use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::Level;

/// Field that carries the tag a line was logged under.
pub const TAG_FIELD: &str = "serpenttag";

const RESERVED: [&str; 3] = ["time", "msg", "level"];

/// One log line, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: IndexMap<String, JsonValue>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Renders records as `(tag) message [k1=v1, k2=v2]\n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Formatter {
    /// When false, debug and trace records render as nothing.
    pub debug: bool,
    pub hide_tags: bool,
    pub disable_sorting: bool,
}

impl Formatter {
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }

    pub fn format(&self, record: &Record) -> Vec<u8> {
        if record.level >= Level::DEBUG && !self.debug {
            return Vec::new();
        }

        let mut fields = record.fields.clone();
        prefix_field_clashes(&mut fields);

        let mut out = String::new();
        if let Some(tag) = fields.shift_remove(TAG_FIELD)
            && !self.hide_tags
        {
            out.push('(');
            out.push_str(&render_value(&tag));
            out.push_str(") ");
        }

        if !self.disable_sorting {
            fields.sort_keys();
        }

        out.push_str(&record.message);
        if !fields.is_empty() {
            let rendered: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k}={}", render_value(v)))
                .collect();
            out.push_str(" [");
            out.push_str(&rendered.join(", "));
            out.push(']');
        }
        out.push('\n');
        out.into_bytes()
    }
}

/// User fields named like the record's own keys move to `fields.<name>`.
// A renamed field never replaces one already carrying the target name:
// `fields.time` is taken, so it becomes `fields.time.2`, and so on.
fn prefix_field_clashes(fields: &mut IndexMap<String, JsonValue>) {
    for name in RESERVED {
        if let Some(v) = fields.shift_remove(name) {
            let mut key = format!("fields.{name}");
            let mut n = 2;
            while fields.contains_key(&key) {
                key = format!("fields.{name}.{n}");
                n += 1;
            }
            fields.insert(key, v);
        }
    }
}

pub(crate) fn render_value(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
