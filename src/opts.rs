//! Option lists: the chainable builder applied to a flag declaration.
//!
//! ```ignore
//! let verbose = BoolFlag::new("verbose", [Opts::new().ubiq(true).abbr("v")])?;
//! ```
//!
//! Records are applied in insertion order and the last record of a kind
//! wins, so a shared base list can be extended per flag.

use crate::value::FlagValue;

/// One option record.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagOpt {
    /// Keeps a fresh list non-empty; applying it does nothing.
    Empty,
    Abbr(String),
    Default(FlagValue),
    Desc(String),
    Implied(String),
    Req(bool),
    Ubiq(bool),
    Hide,
}

/// An ordered list of option records.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    records: Vec<FlagOpt>,
}

impl Opts {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            records: vec![FlagOpt::Empty],
        }
    }

    /// Same as [`new`](Self::new); reads better when starting over mid-chain.
    pub fn reset() -> Self {
        Self::new()
    }

    /// One-character short form, e.g. `"v"` for `-v`.
    pub fn abbr(mut self, v: &str) -> Self {
        self.records.push(FlagOpt::Abbr(v.to_string()));
        self
    }

    /// Default value. Its type must match the flag's type or declaration fails.
    pub fn default<V: Into<FlagValue>>(mut self, d: V) -> Self {
        self.records.push(FlagOpt::Default(d.into()));
        self
    }

    pub fn desc(mut self, v: &str) -> Self {
        self.records.push(FlagOpt::Desc(v.to_string()));
        self
    }

    /// Value taken when the flag is given without an argument.
    pub fn implied(mut self, v: &str) -> Self {
        self.records.push(FlagOpt::Implied(v.to_string()));
        self
    }

    /// Require the flag whenever the command declaring it is the one invoked
    /// (or, for a persistent flag, any descendant of it). Running a
    /// subcommand of the declaring command does not require its local flags.
    pub fn req(mut self, b: bool) -> Self {
        self.records.push(FlagOpt::Req(b));
        self
    }

    /// Make the flag inheritable by every subcommand.
    pub fn ubiq(mut self, b: bool) -> Self {
        self.records.push(FlagOpt::Ubiq(b));
        self
    }

    pub fn hide(mut self) -> Self {
        self.records.push(FlagOpt::Hide);
        self
    }

    pub fn records(&self) -> &[FlagOpt] {
        &self.records
    }
}

impl<'a> IntoIterator for &'a Opts {
    type Item = &'a FlagOpt;
    type IntoIter = std::slice::Iter<'a, FlagOpt>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
