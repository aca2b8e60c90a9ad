//! Declarative typed flags, one configuration store, and tag-filtered
//! logging for command-line programs built on [clap](https://docs.rs/clap).
//!
//! Declare a flag once and it is registered with the parser, readable
//! through the same lookup API as config files and environment variables,
//! and able to steer the logger.
//!
//! ```ignore
//! let mut app = serpent::init("myapp", Config::new("myapp"))?;
//!
//! let mut serve = Command::new("serve").run(|inv| {
//!     let port = inv.store().get_u16("port");
//!     inv.logger().tag("net").add("port", port).out("listening");
//!     Ok(())
//! });
//! serve.add_flag(&Uint16Flag::new("port", [Opts::new().abbr("p").default(8080u16)])?)?;
//! app.root_mut().sub_cmds([serve]);
//!
//! app.execute();
//! ```
//!
//! `myapp serve -p 9000 --logtags net` binds `port = 9000`, requests the
//! `net` tag, and prints `(net) listening [port=9000]`.
//!
//! # Flags
//!
//! A flag is a [`Flag<T>`] over one of the supported primitive types: `bool`,
//! signed and unsigned integers of every width, `f32`/`f64`, `String`,
//! `Vec<String>` (comma-separated or repeated) and [`HexBytes`]. Aliases
//! such as [`BoolFlag`] or [`Int32Flag`] name each one.
//!
//! Options come from [`Opts`] lists, applied in order with the last record of
//! each kind winning:
//!
//! - **`abbr("v")`**: one-character short form. Anything longer is rejected.
//! - **`default(v)`**: the value when the flag is absent. Its type must be
//!   exactly `T`: `default(5)` is an `i32` and fits [`Int32Flag`] only.
//! - **`desc("...")`**: help text.
//! - **`implied("v")`**: the value when the flag is given bare (`--level`).
//!   Booleans always imply `true`, so `--verbose` and `--verbose=false` both work.
//! - **`req(true)`**: the flag must be given.
//! - **`ubiq(true)`**: persistent; the flag is inherited by every subcommand.
//! - **`hide()`**: left out of help.
//!
//! A mismatched default or implied value is a programming error, reported as
//! [`SerpentError::Defect`] when the flag is declared, never at parse time.
//!
//! # Binding
//!
//! Flags are not bound into the store when declared. Right before the
//! invoked command runs, every flag in its scope (its own, plus the
//! persistent flags of its ancestors) is bound under its own name. Sibling
//! commands may therefore declare `--count` with different defaults and
//! each invocation reads its own.
//!
//! # Layer precedence
//!
//! ```text
//! flag default          the declared default, when the flag was not typed
//!        ↑ overridden by
//! set_default()         built-in program defaults
//!        ↑ overridden by
//! config file(s)        TOML or JSON
//!        ↑ overridden by
//! environment           PREFIX_KEY
//!        ↑ overridden by
//! flags                 typed on the command line
//!        ↑ overridden by
//! set()                 explicit values
//! ```
//!
//! Every `get_*` accessor on [`Store`] has a `check_*` twin returning whether
//! the key was explicitly set, i.e. answered by a layer other than the two
//! default layers. That is how `--config` is told apart from its empty
//! default.
//!
//! # Config files
//!
//! The file named by `--config` (or [`Config::config_file`], `config` by
//! default) is searched as `{name}.toml` then `{name}.json` in, from lowest
//! to highest priority, the global path, `~/.{app}/`, and the working
//! directory. [`SearchMode::FirstMatch`] reads the highest-priority file
//! found; [`SearchMode::Merge`] deep-merges them all. A missing file is a
//! warning or a fatal error depending on [`Config::require_config_file`].
//!
//! Keys are case-insensitive. Typed views of the merged store are available
//! through [`Store::extract`] for any `confique::Config` struct.
//!
//! # Logging
//!
//! [`Logger`] and [`LogFields`] emit `tracing` events which serpent's own
//! layer renders as `(tag) message [k1=v1, k2=v2]`. `out` logs at info,
//! `log` at debug; the `_v` variants only when `--verbose` is set. A line
//! built with [`LogFields::tag`] is dropped unless `--logalltags` is set or
//! its tag is listed in `--logtags`. The stdout formatter hides debug lines;
//! the log file, `{app}.log` unless `--log` says otherwise, gets everything.
//!
//! # Errors
//!
//! All fallible operations return [`SerpentError`]. [`App::execute`] prints
//! any error and exits with status 1; [`App::execute_from`] returns it.

pub mod error;
pub mod log;
pub mod types;

mod access;
mod app;
mod command;
mod config;
mod env;
mod file;
mod flag;
mod flagset;
mod opts;
mod store;
mod value;

#[cfg(test)]
mod fixtures;

pub use app::{App, init};
pub use command::{Command, Invocation};
pub use config::Config;
pub use error::SerpentError;
pub use flag::{
    AddFlag, BoolFlag, BytesHexFlag, Flag, Float32Flag, Float64Flag, Int8Flag, Int16Flag,
    Int32Flag, Int64Flag, StringFlag, StringSliceFlag, Uint8Flag, Uint16Flag, Uint32Flag,
    Uint64Flag,
};
pub use flagset::{FlagSet, FlagSpec};
pub use log::{LogFields, Logger};
pub use opts::{FlagOpt, Opts};
pub use store::{Source, Store};
pub use types::{SearchMode, SearchPath};
pub use value::{FlagType, FlagValue, HexBytes, ValueKind};
