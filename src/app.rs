//! Application bootstrap and execution.
//!
//! [`init`] creates the root command with the five standard flags, the
//! store and the log pipeline. [`App::execute`] then runs one invocation:
//!
//! 1. build the clap tree from the command tree and parse;
//! 2. bind every in-scope flag of the invoked command into the store;
//! 3. load configuration: environment overlay, config file (named by
//!    `--config` when given), log tags, log file;
//! 4. run the command body, or print help when it has none.

use std::ffi::OsString;
use std::path::Path;

use clap::error::ErrorKind;
use toml::{Table, Value};
use tracing::Dispatch;

use crate::command::{Command, Invocation};
use crate::config::Config;
use crate::error::SerpentError;
use crate::flag::{BoolFlag, StringFlag, StringSliceFlag};
use crate::log::{LogHandle, Logger, TAGS_KEY};
use crate::opts::Opts;
use crate::store::Store;

/// An initialized program: root command, store, logging.
#[derive(Debug)]
pub struct App {
    name: String,
    cfg: Config,
    root: Command,
    store: Store,
    log: LogHandle,
    dispatch: Dispatch,
}

/// Initialize a program logging to standard output.
pub fn init(name: &str, cfg: Config) -> Result<App, SerpentError> {
    let log = LogHandle::new(cfg.formatter, cfg.level);
    App::with_log(name, cfg, log)
}

impl App {
    /// Initialize with a caller-supplied log handle.
    pub fn with_log(name: &str, cfg: Config, log: LogHandle) -> Result<App, SerpentError> {
        let mut root = Command::new(name);
        root.add_flags(&[
            &StringFlag::new("config", [Opts::new().desc("config file name").ubiq(true)])?,
            &BoolFlag::new("verbose", [Opts::new().desc("verbose output").ubiq(true).abbr("v")])?,
            &StringFlag::new("log", [Opts::new().desc("path to the log file").ubiq(true)])?,
            &StringSliceFlag::new("logtags", [Opts::new().desc("log tags to show").ubiq(true)])?,
            &BoolFlag::new("logalltags", [Opts::new().desc("show every log tag").ubiq(true)])?,
        ])?;

        let store = Store::new();
        store.set(TAGS_KEY, Value::Table(Table::new()));
        for (key, value) in &cfg.defaults {
            store.set_default(key, value.clone());
        }
        for (key, value) in &cfg.overrides {
            store.set(key, value.clone());
        }
        apply_log_tags(&store);

        let dispatch = log.dispatch();
        // Only the first program in a process becomes the global default;
        // execute() always runs under its own dispatcher.
        let _ = tracing::dispatcher::set_global_default(dispatch.clone());

        Ok(App {
            name: name.to_string(),
            cfg,
            root,
            store,
            log,
            dispatch,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Command {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Command {
        &mut self.root
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn logger(&self) -> Logger {
        Logger::new(self.store.clone())
    }

    pub fn log_handle(&self) -> &LogHandle {
        &self.log
    }

    /// Run with the process arguments. Errors are printed and the process
    /// exits with status 1; help and version requests exit with 0.
    pub fn execute(&self) {
        if let Err(err) = self.execute_from(std::env::args_os()) {
            self.shutdown();
            match err {
                SerpentError::Parse(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::DisplayHelp
                            | ErrorKind::DisplayVersion
                            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                    ) =>
                {
                    e.exit()
                }
                SerpentError::Parse(e) => {
                    let _ = e.print();
                    std::process::exit(1);
                }
                other => {
                    eprintln!("{other}");
                    std::process::exit(1);
                }
            }
        }
    }

    /// Run one invocation with explicit arguments, the first being the
    /// program name.
    pub fn execute_from<I, T>(&self, args: I) -> Result<(), SerpentError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        tracing::dispatcher::with_default(&self.dispatch, || self.run(args))
    }

    fn run<I, T>(&self, args: I) -> Result<(), SerpentError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cli = self.root.build()?;
        let matches = cli.try_get_matches_from_mut(args)?;
        let (path, leaf_matches) = self.root.resolve(&matches);
        Command::bind(&path, leaf_matches, &self.store)?;
        self.load_configs()?;

        let Some(leaf) = path.last().copied() else {
            return Ok(());
        };
        match leaf.run_fn() {
            Some(body) => body(&Invocation::new(&self.store, leaf, leaf_matches)),
            None => {
                let mut target = cli;
                for cmd in &path[1..] {
                    match target.find_subcommand(cmd.name()) {
                        Some(sub) => target = sub.clone(),
                        None => break,
                    }
                }
                target.print_help().map_err(SerpentError::command)
            }
        }
    }

    /// Environment, config file, log tags and log file, in that order.
    fn load_configs(&self) -> Result<(), SerpentError> {
        let cfg = &self.cfg;
        let log = self.logger();

        if cfg.use_env_variables {
            self.store.automatic_env(cfg.env_prefix.as_deref());
        }

        let name = match self.store.check_string("config") {
            (name, true) if !name.is_empty() => name,
            _ => cfg.config_file.clone(),
        };
        let search_paths = cfg.resolved_search_paths();
        match self
            .store
            .read_config(&name, &search_paths, &self.name, cfg.search_mode)
        {
            Ok(paths) => {
                tracing::debug!(files = ?paths, "config loaded");
                if cfg.watch_config {
                    self.watch()?;
                }
            }
            Err(e) if cfg.require_config_file => {
                log.out(format_args!("exiting: can't read config file: {e}"));
                return Err(e);
            }
            Err(_) if cfg.report_missing_config_file => {
                log.out("continuing without a config file");
            }
            Err(_) => {}
        }

        apply_log_tags(&self.store);

        self.store.set_default("log", format!("{}.log", self.name));
        if cfg.log_file {
            let path = self.store.get_string("log");
            match self.log.set_file_hook(Path::new(&path)) {
                Ok(()) => {}
                Err(e) if cfg.require_log_file => {
                    log.out(format_args!("exiting: {e}"));
                    return Err(e);
                }
                Err(_) if cfg.report_missing_log_file => {
                    log.out("continuing without a log file");
                }
                Err(_) => {}
            }
        }
        Ok(())
    }

    #[cfg(feature = "watch")]
    fn watch(&self) -> Result<(), SerpentError> {
        self.store.watch_config()
    }

    #[cfg(not(feature = "watch"))]
    fn watch(&self) -> Result<(), SerpentError> {
        tracing::warn!("config watching needs the `watch` feature");
        Ok(())
    }

    /// Flush output and close the log file.
    pub fn shutdown(&self) {
        self.log.flush();
        self.log.close_file();
    }
}

/// Merge `logtags` into the requested-tags table.
fn apply_log_tags(store: &Store) {
    let tags = store.get_string_list("logtags");
    if tags.is_empty() {
        return;
    }
    let mut requested = match store.get(TAGS_KEY) {
        Some(Value::Table(t)) => t,
        _ => Table::new(),
    };
    for tag in tags {
        requested.insert(tag, Value::Boolean(true));
    }
    store.set(TAGS_KEY, Value::Table(requested));
}
