use std::fmt::Display;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::Level;

use crate::log::format::TAG_FIELD;
use crate::store::Store;

/// Store key holding the requested tags, as a table of `tag = true`.
pub const TAGS_KEY: &str = "serpenttags";
/// Store key that, when true, lets every tag through.
pub const ALL_TAGS_KEY: &str = "logalltags";
pub(crate) const VERBOSE_KEY: &str = "verbose";

/// Structured fields for one log call chain, plus whether the chain passed
/// its tag filter.
///
/// A fresh set passes. [`tag`](Self::tag) decides once, from the store, and
/// the decision sticks for the life of the value: the `out*`/`log*` calls
/// don't look at the tag configuration again.
#[derive(Debug, Clone)]
pub struct LogFields {
    store: Store,
    fields: IndexMap<String, JsonValue>,
    ok: bool,
}

impl LogFields {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            fields: IndexMap::new(),
            ok: true,
        }
    }

    pub(crate) fn from_map(store: Store, fields: IndexMap<String, JsonValue>) -> Self {
        Self {
            store,
            fields,
            ok: true,
        }
    }

    /// Assign this line to a tag and evaluate the filter.
    ///
    /// Passes when `logalltags` is set, or when the requested tag set is
    /// non-empty and contains `name`. Otherwise the line is dropped.
    pub fn tag(mut self, name: &str) -> Self {
        self.ok = if self.store.get_bool(ALL_TAGS_KEY) {
            true
        } else {
            let requested = self.store.get_string_map(TAGS_KEY);
            !requested.is_empty() && requested.contains_key(name)
        };
        if self.ok {
            self.fields
                .insert(TAG_FIELD.to_string(), JsonValue::from(name));
        }
        self
    }

    pub fn add(mut self, key: &str, value: impl Serialize) -> Self {
        self.fields.insert(key.to_string(), to_json(value));
        self
    }

    /// A copy of this set with one more field. `self` is unchanged.
    pub fn with_field(&self, key: &str, value: impl Serialize) -> Self {
        self.copy().add(key, value)
    }

    /// An independent copy; fields and the filter outcome are duplicated.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Record the type name of `value` under `type`.
    pub fn type_of<T: ?Sized>(mut self, _value: &T) -> Self {
        self.fields.insert(
            "type".to_string(),
            JsonValue::from(std::any::type_name::<T>()),
        );
        self
    }

    /// Like [`add`](Self::add), but strings are quoted and cut to 20
    /// characters plus `...`.
    pub fn strunc(mut self, key: &str, value: impl Serialize) -> Self {
        let value = match to_json(value) {
            JsonValue::String(s) if s.chars().count() > 20 => {
                let head: String = s.chars().take(20).collect();
                JsonValue::String(format!("{:?}", head + "..."))
            }
            JsonValue::String(s) => JsonValue::String(format!("{s:?}")),
            other => other,
        };
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn fields(&self) -> &IndexMap<String, JsonValue> {
        &self.fields
    }

    /// Whether lines from this set are emitted.
    pub fn passes(&self) -> bool {
        self.ok
    }

    /// Emit at info level.
    pub fn out(&self, msg: impl Display) {
        if self.ok {
            emit(Level::INFO, &self.fields, &msg);
        }
    }

    /// Emit at debug level.
    pub fn log(&self, msg: impl Display) {
        if self.ok {
            emit(Level::DEBUG, &self.fields, &msg);
        }
    }

    /// [`out`](Self::out), only when `verbose` is set.
    pub fn out_v(&self, msg: impl Display) {
        if self.ok && self.store.get_bool(VERBOSE_KEY) {
            emit(Level::INFO, &self.fields, &msg);
        }
    }

    /// [`log`](Self::log), only when `verbose` is set.
    pub fn log_v(&self, msg: impl Display) {
        if self.ok && self.store.get_bool(VERBOSE_KEY) {
            emit(Level::DEBUG, &self.fields, &msg);
        }
    }
}

fn to_json(value: impl Serialize) -> JsonValue {
    serde_json::to_value(value).unwrap_or_else(|e| JsonValue::String(format!("<{e}>")))
}

// The field set travels as one JSON-encoded event field; the serpent layer
// expands it back.
pub(crate) fn emit(level: Level, fields: &IndexMap<String, JsonValue>, msg: &dyn Display) {
    let encoded = if fields.is_empty() {
        String::new()
    } else {
        serde_json::to_string(fields).unwrap_or_default()
    };
    if level == Level::INFO {
        tracing::info!(target: "serpent", serpent_fields = encoded.as_str(), "{msg}");
    } else {
        tracing::debug!(target: "serpent", serpent_fields = encoded.as_str(), "{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::format::Formatter;
    use crate::log::layer::{LogHandle, SharedBuffer};
    use tracing::level_filters::LevelFilter;

    fn store_with_tags(tags: &[&str]) -> Store {
        let store = Store::new();
        let mut table = toml::Table::new();
        for t in tags {
            table.insert(t.to_string(), toml::Value::Boolean(true));
        }
        store.set(TAGS_KEY, toml::Value::Table(table));
        store
    }

    fn captured(f: impl FnOnce()) -> String {
        let buf = SharedBuffer::new();
        let handle = LogHandle::with_writer(Formatter::debug(), LevelFilter::DEBUG, buf.clone());
        tracing::subscriber::with_default(handle.subscriber(), f);
        buf.contents()
    }

    #[test]
    fn fresh_set_passes() {
        assert!(LogFields::new(Store::new()).passes());
    }

    #[test]
    fn all_tags_toggle_passes_everything() {
        let store = store_with_tags(&[]);
        store.set(ALL_TAGS_KEY, true);
        let f = LogFields::new(store).tag("anything");
        assert!(f.passes());
        assert_eq!(f.fields()[TAG_FIELD], JsonValue::from("anything"));
    }

    #[test]
    fn requested_tags_are_membership_checked() {
        let store = store_with_tags(&["net", "db"]);
        assert!(LogFields::new(store.clone()).tag("net").passes());
        let rejected = LogFields::new(store).tag("ui");
        assert!(!rejected.passes());
        assert!(!rejected.fields().contains_key(TAG_FIELD));
    }

    #[test]
    fn no_requested_tags_rejects() {
        assert!(!LogFields::new(store_with_tags(&[])).tag("net").passes());
        assert!(!LogFields::new(Store::new()).tag("net").passes());
    }

    #[test]
    fn copy_is_independent() {
        let original = LogFields::new(Store::new()).add("a", 1);
        let copy = original.copy().add("b", 2);
        assert_eq!(original.fields().len(), 1);
        assert_eq!(copy.fields().len(), 2);
        assert_eq!(copy.passes(), original.passes());

        let rejected = LogFields::new(Store::new()).tag("x");
        let rejected_copy = rejected.copy().add("c", 3);
        assert!(!rejected_copy.passes());
        assert!(!rejected.fields().contains_key("c"));
    }

    #[test]
    fn with_field_leaves_original_alone() {
        let original = LogFields::new(Store::new()).add("a", 1);
        let extended = original.with_field("b", "two");
        assert_eq!(original.fields().len(), 1);
        assert_eq!(extended.fields()["b"], JsonValue::from("two"));
    }

    #[test]
    fn type_and_strunc_helpers() {
        let f = LogFields::new(Store::new())
            .type_of(&5u16)
            .strunc("short", "abc")
            .strunc("long", "abcdefghijklmnopqrstuvwxyz")
            .strunc("num", 7);
        assert_eq!(f.fields()["type"], JsonValue::from("u16"));
        assert_eq!(f.fields()["short"], JsonValue::from("\"abc\""));
        assert_eq!(
            f.fields()["long"],
            JsonValue::from("\"abcdefghijklmnopqrst...\"")
        );
        assert_eq!(f.fields()["num"], JsonValue::from(7));
    }

    #[test]
    fn rejected_lines_are_not_emitted() {
        let store = store_with_tags(&["net"]);
        let out = captured(|| {
            LogFields::new(store.clone()).tag("db").out("dropped");
            LogFields::new(store.clone()).tag("net").add("b", 2).add("a", 1).out("hi");
        });
        assert_eq!(out, "(net) hi [a=1, b=2]\n");
    }

    #[test]
    fn verbose_variants_are_gated() {
        let store = Store::new();
        let out = captured(|| {
            LogFields::new(store.clone()).out_v("quiet");
            store.set(VERBOSE_KEY, true);
            LogFields::new(store.clone()).log_v("loud");
        });
        assert_eq!(out, "loud\n");
    }
}
