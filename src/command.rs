//! Command tree and per-invocation flag binding.
//!
//! Commands are assembled freely (children and flags may be added in any
//! order) and only turned into a `clap::Command` by [`Command::build`],
//! immediately before parsing. After parsing, [`Command::bind`] pushes every
//! flag in the invoked command's scope into the [`Store`], so two commands
//! may declare a flag of the same name with different defaults and each
//! invocation sees its own.

use std::collections::HashSet;
use std::fmt;

use clap::{Arg, ArgAction, ArgMatches};

use crate::error::SerpentError;
use crate::flag::AddFlag;
use crate::flagset::{ARGS_ID, FlagSet, FlagSpec};
use crate::log::Logger;
use crate::store::Store;

type RunFn = Box<dyn Fn(&Invocation<'_>) -> Result<(), SerpentError>>;

/// One node of the command tree.
pub struct Command {
    name: String,
    about: Option<String>,
    persistent: FlagSet,
    local: FlagSet,
    children: Vec<Command>,
    run: Option<RunFn>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("persistent", &self.persistent)
            .field("local", &self.local)
            .field("children", &self.children)
            .field("run", &self.run.is_some())
            .finish()
    }
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            about: None,
            persistent: FlagSet::new(name),
            local: FlagSet::new(name),
            children: Vec::new(),
            run: None,
        }
    }

    pub fn about(mut self, about: &str) -> Self {
        self.about = Some(about.to_string());
        self
    }

    /// The body executed when this command is invoked.
    pub fn run<F>(mut self, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<(), SerpentError> + 'static,
    {
        self.run = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append children. Existing children are kept.
    pub fn sub_cmds(&mut self, children: impl IntoIterator<Item = Command>) -> &mut Self {
        self.children.extend(children);
        self
    }

    pub fn children(&self) -> &[Command] {
        &self.children
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn add_flag(&mut self, flag: &dyn AddFlag) -> Result<&mut Self, SerpentError> {
        flag.add_to(self)?;
        Ok(self)
    }

    pub fn add_flags(&mut self, flags: &[&dyn AddFlag]) -> Result<&mut Self, SerpentError> {
        for flag in flags {
            flag.add_to(self)?;
        }
        Ok(self)
    }

    pub fn persistent_flags(&self) -> &FlagSet {
        &self.persistent
    }

    pub fn persistent_flags_mut(&mut self) -> &mut FlagSet {
        &mut self.persistent
    }

    pub fn flags(&self) -> &FlagSet {
        &self.local
    }

    pub fn flags_mut(&mut self) -> &mut FlagSet {
        &mut self.local
    }

    pub fn mark_flag_required(&mut self, name: &str) -> Result<(), SerpentError> {
        self.local.mark_required(name)
    }

    pub fn mark_persistent_flag_required(&mut self, name: &str) -> Result<(), SerpentError> {
        self.persistent.mark_required(name)
    }

    /// Materialize the whole tree as a clap command.
    pub fn build(&self) -> Result<clap::Command, SerpentError> {
        self.check_scopes(&[])?;
        Ok(self.materialize())
    }

    /// Every flag must be unique, by name and by short form, among the
    /// flags visible to a command: its ancestors' persistent flags and its own.
    fn check_scopes(&self, inherited: &[&FlagSpec]) -> Result<(), SerpentError> {
        let mut names = HashSet::new();
        let mut shorts = HashSet::new();
        let own = self.persistent.iter().chain(self.local.iter());
        for spec in inherited.iter().copied().chain(own) {
            let short_clash = spec.short().is_some_and(|c| !shorts.insert(c));
            if !names.insert(spec.name()) || short_clash {
                return Err(SerpentError::DuplicateFlag {
                    flag: spec.name().to_string(),
                    command: self.name.clone(),
                });
            }
        }

        let mut scope = inherited.to_vec();
        scope.extend(self.persistent.iter());
        for child in &self.children {
            child.check_scopes(&scope)?;
        }
        Ok(())
    }

    // Post-order: children are complete before their parent adopts them.
    fn materialize(&self) -> clap::Command {
        let children: Vec<clap::Command> = self.children.iter().map(Command::materialize).collect();

        let mut cmd = clap::Command::new(self.name.clone());
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        for spec in self.persistent.iter() {
            cmd = cmd.arg(spec.to_arg(true));
        }
        for spec in self.local.iter() {
            cmd = cmd.arg(spec.to_arg(false));
        }

        if children.is_empty() {
            cmd.arg(
                Arg::new(ARGS_ID)
                    .action(ArgAction::Append)
                    .num_args(0..)
                    .value_name("ARGS")
                    .hide(true),
            )
        } else {
            cmd.subcommands(children)
        }
    }

    /// Follow the parsed subcommand chain from this command down.
    pub(crate) fn resolve<'a>(
        &'a self,
        matches: &'a ArgMatches,
    ) -> (Vec<&'a Command>, &'a ArgMatches) {
        let mut path = vec![self];
        let mut current = self;
        let mut m = matches;
        while let Some((name, sub)) = m.subcommand() {
            let Some(child) = current.children.iter().find(|c| c.name == name) else {
                break;
            };
            path.push(child);
            current = child;
            m = sub;
        }
        (path, m)
    }

    /// Bind every flag in the invoked command's scope into the store,
    /// replacing the bindings of any previous invocation. Required flags
    /// of that scope must have been supplied.
    ///
    /// `path` runs from the root to the invoked command; `matches` are the
    /// invoked command's own matches, which carry propagated global flags.
    pub(crate) fn bind(
        path: &[&Command],
        matches: &ArgMatches,
        store: &Store,
    ) -> Result<(), SerpentError> {
        store.clear_flags();
        let Some((leaf, ancestors)) = path.split_last() else {
            return Ok(());
        };
        let scope: Vec<&FlagSpec> = ancestors
            .iter()
            .flat_map(|c| c.persistent.iter())
            .chain(leaf.persistent.iter())
            .chain(leaf.local.iter())
            .collect();

        let missing: Vec<String> = scope
            .iter()
            .filter(|spec| spec.is_required() && !spec.supplied_in(matches))
            .map(|spec| spec.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SerpentError::RequiredFlags(missing));
        }

        for spec in scope {
            let value = spec.value_in(matches);
            store.bind_flag(spec.name(), value.to_toml(), spec.supplied_in(matches));
        }
        Ok(())
    }

    pub(crate) fn run_fn(&self) -> Option<&RunFn> {
        self.run.as_ref()
    }
}

/// What a command body receives.
pub struct Invocation<'a> {
    store: &'a Store,
    command: &'a Command,
    matches: &'a ArgMatches,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(store: &'a Store, command: &'a Command, matches: &'a ArgMatches) -> Self {
        Self {
            store,
            command,
            matches,
        }
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    pub fn command(&self) -> &Command {
        self.command
    }

    pub fn matches(&self) -> &ArgMatches {
        self.matches
    }

    /// Positional arguments left after the flags.
    pub fn args(&self) -> Vec<String> {
        self.matches
            .try_get_many::<String>(ARGS_ID)
            .ok()
            .flatten()
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default()
    }

    pub fn logger(&self) -> Logger {
        Logger::new(self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::{BoolFlag, Int32Flag, StringFlag};
    use crate::opts::Opts;
    use toml::Value;

    fn count_flag(default: i32) -> Int32Flag {
        Int32Flag::new("count", [Opts::new().default(default)]).unwrap()
    }

    fn tree() -> Command {
        let mut root = Command::new("app");
        root.add_flag(&BoolFlag::new("verbose", [Opts::new().ubiq(true).abbr("v")]).unwrap())
            .unwrap();

        let mut a = Command::new("a");
        a.add_flag(&count_flag(5)).unwrap();
        let mut b = Command::new("b");
        b.add_flag(&count_flag(10)).unwrap();
        root.sub_cmds([a, b]);
        root
    }

    fn invoke(root: &Command, argv: &[&str]) -> Store {
        let matches = root
            .build()
            .unwrap()
            .try_get_matches_from(argv.iter().copied())
            .unwrap();
        let (path, leaf) = root.resolve(&matches);
        let store = Store::new();
        Command::bind(&path, leaf, &store).unwrap();
        store
    }

    #[test]
    fn sub_cmds_appends() {
        let mut root = Command::new("app");
        root.sub_cmds([Command::new("a")]);
        root.sub_cmds([Command::new("b"), Command::new("c")]);
        let names: Vec<_> = root.children().iter().map(Command::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn each_command_binds_its_own_default() {
        let root = tree();
        assert_eq!(invoke(&root, &["app", "a"]).get_i32("count"), 5);
        assert_eq!(invoke(&root, &["app", "b"]).get_i32("count"), 10);
    }

    #[test]
    fn supplied_flags_are_explicit() {
        let root = tree();
        let store = invoke(&root, &["app", "b", "--count", "3", "-v"]);
        assert_eq!(store.check_i32("count"), (3, true));
        assert_eq!(store.check_bool("verbose"), (true, true));

        let store = invoke(&root, &["app", "a"]);
        assert_eq!(store.check_i32("count"), (5, false));
        assert_eq!(store.check_bool("verbose"), (false, false));
    }

    #[test]
    fn persistent_flag_given_before_subcommand() {
        let root = tree();
        let store = invoke(&root, &["app", "--verbose", "a"]);
        assert!(store.get_bool("verbose"));
    }

    #[test]
    fn local_flags_do_not_leak_to_children() {
        let mut root = Command::new("app");
        root.add_flag(&StringFlag::new("only-root", [Opts::new()]).unwrap())
            .unwrap();
        root.sub_cmds([Command::new("child")]);
        let result = root
            .build()
            .unwrap()
            .try_get_matches_from(["app", "child", "--only-root", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_in_inherited_scope_rejected() {
        let mut root = Command::new("app");
        root.add_flag(&BoolFlag::new("verbose", [Opts::new().ubiq(true)]).unwrap())
            .unwrap();
        let mut child = Command::new("child");
        child
            .add_flag(&BoolFlag::new("verbose", [Opts::new()]).unwrap())
            .unwrap();
        root.sub_cmds([child]);
        assert!(matches!(
            root.build(),
            Err(SerpentError::DuplicateFlag { command, .. }) if command == "child"
        ));
    }

    #[test]
    fn duplicate_short_rejected() {
        let mut root = Command::new("app");
        root.add_flag(&BoolFlag::new("verbose", [Opts::new().ubiq(true).abbr("v")]).unwrap())
            .unwrap();
        let mut child = Command::new("child");
        child
            .add_flag(&StringFlag::new("version-file", [Opts::new().abbr("v")]).unwrap())
            .unwrap();
        root.sub_cmds([child]);
        assert!(root.build().unwrap_err().is_defect());
    }

    #[test]
    fn required_persistent_flag_checked_on_bind() {
        let mut root = Command::new("app");
        root.add_flag(&StringFlag::new("token", [Opts::new().ubiq(true).req(true)]).unwrap())
            .unwrap();
        root.sub_cmds([Command::new("go")]);

        let matches = root.build().unwrap().try_get_matches_from(["app", "go"]).unwrap();
        let (path, leaf) = root.resolve(&matches);
        let err = Command::bind(&path, leaf, &Store::new()).unwrap_err();
        assert_eq!(err.to_string(), r#"required flag(s) "token" not set"#);

        let matches = root
            .build()
            .unwrap()
            .try_get_matches_from(["app", "go", "--token", "t"])
            .unwrap();
        let (path, leaf) = root.resolve(&matches);
        let store = Store::new();
        Command::bind(&path, leaf, &store).unwrap();
        assert_eq!(store.get("token"), Some(Value::String("t".into())));
    }

    #[test]
    fn resolve_walks_to_leaf() {
        let mut root = Command::new("app");
        let mut mid = Command::new("remote");
        mid.sub_cmds([Command::new("add")]);
        root.sub_cmds([mid]);

        let matches = root
            .build()
            .unwrap()
            .try_get_matches_from(["app", "remote", "add", "origin"])
            .unwrap();
        let (path, leaf) = root.resolve(&matches);
        let names: Vec<_> = path.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["app", "remote", "add"]);

        let store = Store::new();
        let inv = Invocation::new(&store, path[2], leaf);
        assert_eq!(inv.args(), ["origin"]);
    }

    #[test]
    fn flag_and_child_added_in_any_order() {
        let mut root = Command::new("app");
        root.sub_cmds([Command::new("late")]);
        root.add_flag(&BoolFlag::new("debug", [Opts::new().ubiq(true)]).unwrap())
            .unwrap();
        if let Some(late) = root.child_mut("late") {
            late.add_flag(&count_flag(1)).unwrap();
        }
        let store = invoke(&root, &["app", "late", "--debug", "--count", "2"]);
        assert!(store.get_bool("debug"));
        assert_eq!(store.get_i32("count"), 2);
    }
}
