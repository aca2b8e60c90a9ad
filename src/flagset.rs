//! Per-command flag sets and their clap rendering.
//!
//! A [`Command`](crate::Command) owns two sets: persistent flags, inherited
//! by every descendant, and local flags, visible only on the command itself.
//! A set only records declarations. Nothing reaches clap until the command
//! tree is built, at which point each [`FlagSpec`] becomes one `clap::Arg`.

use clap::builder::ValueParser;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};

use crate::error::SerpentError;
use crate::value::{FlagType, FlagValue, HexBytes, ValueKind};

/// A single flag as the parser sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    name: String,
    short: Option<char>,
    default: FlagValue,
    help: String,
    required: bool,
    implied: Option<String>,
    hidden: bool,
}

impl FlagSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short(&self) -> Option<char> {
        self.short
    }

    pub fn kind(&self) -> ValueKind {
        self.default.kind()
    }

    pub fn default_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn implied(&self) -> Option<&str> {
        self.implied.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Render as a clap argument. `persistent` flags become global args.
    pub(crate) fn to_arg(&self, persistent: bool) -> Arg {
        let kind = self.kind();
        let mut arg = Arg::new(self.name.clone())
            .long(self.name.clone())
            .value_parser(parser_for(kind))
            .global(persistent)
            .hide(self.hidden);

        if let Some(c) = self.short {
            arg = arg.short(c);
        }
        if !self.help.is_empty() {
            arg = arg.help(self.help.clone());
        }

        arg = match kind {
            ValueKind::StringList => arg.action(ArgAction::Append).value_delimiter(','),
            _ => arg.action(ArgAction::Set),
        };

        // Bare `--flag` takes the implied value; `--flag=v` still works.
        // Booleans always behave this way, implying `true` unless told otherwise.
        let implied = match (&self.implied, kind) {
            (Some(v), _) => Some(v.clone()),
            (None, ValueKind::Bool) => Some("true".to_string()),
            (None, _) => None,
        };
        if let Some(v) = implied {
            arg = arg
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value(v);
        }

        // Requirements are checked after parsing, against the invoked
        // command's scope only; clap would also enforce them on subcommands.
        match &self.default {
            FlagValue::StringList(items) if items.is_empty() => arg,
            FlagValue::StringList(items) => arg.default_values(items.clone()),
            other => arg.default_value(other.to_arg_string()),
        }
    }

    /// The parsed value, falling back to the declared default.
    pub(crate) fn value_in(&self, matches: &ArgMatches) -> FlagValue {
        let id = self.name.as_str();
        let parsed = match self.kind() {
            ValueKind::Bool => one::<bool>(matches, id),
            ValueKind::I8 => one::<i8>(matches, id),
            ValueKind::I16 => one::<i16>(matches, id),
            ValueKind::I32 => one::<i32>(matches, id),
            ValueKind::I64 => one::<i64>(matches, id),
            ValueKind::U8 => one::<u8>(matches, id),
            ValueKind::U16 => one::<u16>(matches, id),
            ValueKind::U32 => one::<u32>(matches, id),
            ValueKind::U64 => one::<u64>(matches, id),
            ValueKind::F32 => one::<f32>(matches, id),
            ValueKind::F64 => one::<f64>(matches, id),
            ValueKind::String => one::<String>(matches, id),
            ValueKind::Bytes => one::<HexBytes>(matches, id),
            ValueKind::StringList => matches
                .try_get_many::<String>(id)
                .ok()
                .flatten()
                .map(|vals| {
                    FlagValue::StringList(
                        vals.map(|s| s.trim())
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect(),
                    )
                }),
        };
        parsed.unwrap_or_else(|| self.default.clone())
    }

    /// Whether the user typed this flag, as opposed to it taking its default.
    pub(crate) fn supplied_in(&self, matches: &ArgMatches) -> bool {
        matches.try_contains_id(&self.name).unwrap_or(false)
            && matches.value_source(&self.name) == Some(ValueSource::CommandLine)
    }
}

fn one<T: FlagType>(matches: &ArgMatches, id: &str) -> Option<FlagValue> {
    matches
        .try_get_one::<T>(id)
        .ok()
        .flatten()
        .cloned()
        .map(T::into_value)
}

fn parser_for(kind: ValueKind) -> ValueParser {
    match kind {
        ValueKind::Bool => bool::value_parser(),
        ValueKind::I8 => i8::value_parser(),
        ValueKind::I16 => i16::value_parser(),
        ValueKind::I32 => i32::value_parser(),
        ValueKind::I64 => i64::value_parser(),
        ValueKind::U8 => u8::value_parser(),
        ValueKind::U16 => u16::value_parser(),
        ValueKind::U32 => u32::value_parser(),
        ValueKind::U64 => u64::value_parser(),
        ValueKind::F32 => f32::value_parser(),
        ValueKind::F64 => f64::value_parser(),
        ValueKind::String => String::value_parser(),
        ValueKind::StringList => Vec::<String>::value_parser(),
        ValueKind::Bytes => HexBytes::value_parser(),
    }
}

/// Names clap reserves for its own help flag.
const RESERVED_NAME: &str = "help";
const RESERVED_SHORT: char = 'h';

/// Id of the hidden catch-all positional given to leaf commands.
pub(crate) const ARGS_ID: &str = "serpent-args";

/// The flags one command declares in one scope (persistent or local).
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    command: String,
    specs: Vec<FlagSpec>,
}

impl FlagSet {
    pub(crate) fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            specs: Vec::new(),
        }
    }

    /// Declare a flag without a short form.
    pub fn define(&mut self, name: &str, default: FlagValue, help: &str) -> Result<(), SerpentError> {
        self.insert(name, None, default, help)
    }

    /// Declare a flag with a one-character short form.
    pub fn define_short(
        &mut self,
        name: &str,
        short: char,
        default: FlagValue,
        help: &str,
    ) -> Result<(), SerpentError> {
        self.insert(name, Some(short), default, help)
    }

    fn insert(
        &mut self,
        name: &str,
        short: Option<char>,
        default: FlagValue,
        help: &str,
    ) -> Result<(), SerpentError> {
        if name.is_empty() || name.starts_with('-') {
            return Err(SerpentError::defect(name, "flag names must be non-empty and unprefixed"));
        }
        if name == RESERVED_NAME || short == Some(RESERVED_SHORT) {
            return Err(SerpentError::defect(name, "'--help' and '-h' are reserved"));
        }
        if name == ARGS_ID {
            return Err(SerpentError::defect(name, "the name is used for positional arguments"));
        }
        if short == Some('-') {
            return Err(SerpentError::defect(name, "'-' cannot be an abbreviation"));
        }
        if self.lookup(name).is_some() {
            return Err(SerpentError::DuplicateFlag {
                flag: name.to_string(),
                command: self.command.clone(),
            });
        }
        self.specs.push(FlagSpec {
            name: name.to_string(),
            short,
            default,
            help: help.to_string(),
            required: false,
            implied: None,
            hidden: false,
        });
        Ok(())
    }

    pub fn mark_required(&mut self, name: &str) -> Result<(), SerpentError> {
        self.spec_mut(name)?.required = true;
        Ok(())
    }

    /// Set the value a flag takes when given without an argument. The value
    /// must parse as the flag's type.
    pub fn set_implied(&mut self, name: &str, value: &str) -> Result<(), SerpentError> {
        let spec = self.spec_mut(name)?;
        let kind = spec.kind();
        FlagValue::parse(kind, value).map_err(|e| {
            SerpentError::defect(name, format!("implied value '{value}' is not a valid {kind}: {e}"))
        })?;
        spec.implied = Some(value.to_string());
        Ok(())
    }

    pub fn mark_hidden(&mut self, name: &str) -> Result<(), SerpentError> {
        self.spec_mut(name)?.hidden = true;
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&FlagSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlagSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    fn spec_mut(&mut self, name: &str) -> Result<&mut FlagSpec, SerpentError> {
        let command = &self.command;
        self.specs
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| SerpentError::UnknownFlag {
                flag: name.to_string(),
                command: command.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(arg: Arg, argv: &[&str]) -> ArgMatches {
        clap::Command::new("t")
            .arg(arg)
            .try_get_matches_from(std::iter::once("t").chain(argv.iter().copied()))
            .unwrap()
    }

    fn set_with(name: &str, default: FlagValue) -> FlagSet {
        let mut set = FlagSet::new("t");
        set.define(name, default, "").unwrap();
        set
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut set = set_with("count", FlagValue::I32(1));
        let err = set.define("count", FlagValue::I32(2), "").unwrap_err();
        assert!(matches!(err, SerpentError::DuplicateFlag { .. }));
    }

    #[test]
    fn help_is_reserved() {
        let mut set = FlagSet::new("t");
        assert!(set.define("help", FlagValue::Bool(false), "").unwrap_err().is_defect());
        assert!(set
            .define_short("host", 'h', FlagValue::from("x"), "")
            .unwrap_err()
            .is_defect());
    }

    #[test]
    fn dash_short_and_args_id_are_rejected() {
        let mut set = FlagSet::new("t");
        assert!(set
            .define_short("dash", '-', FlagValue::Bool(false), "")
            .unwrap_err()
            .is_defect());
        assert!(set.define(ARGS_ID, FlagValue::from(""), "").unwrap_err().is_defect());
        assert!(set.is_empty());
    }

    #[test]
    fn unknown_flag_mutations_fail() {
        let mut set = FlagSet::new("t");
        assert!(matches!(
            set.mark_hidden("nope"),
            Err(SerpentError::UnknownFlag { .. })
        ));
    }

    #[test]
    fn implied_value_must_parse() {
        let mut set = set_with("level", FlagValue::I32(0));
        assert!(set.set_implied("level", "high").unwrap_err().is_defect());
        set.set_implied("level", "3").unwrap();
        assert_eq!(set.lookup("level").unwrap().implied(), Some("3"));
    }

    #[test]
    fn default_used_when_absent() {
        let set = set_with("count", FlagValue::I32(5));
        let spec = set.lookup("count").unwrap();
        let m = parse(spec.to_arg(false), &[]);
        assert_eq!(spec.value_in(&m), FlagValue::I32(5));
        assert!(!spec.supplied_in(&m));
    }

    #[test]
    fn typed_value_from_command_line() {
        let set = set_with("count", FlagValue::I32(5));
        let spec = set.lookup("count").unwrap();
        let m = parse(spec.to_arg(false), &["--count", "7"]);
        assert_eq!(spec.value_in(&m), FlagValue::I32(7));
        assert!(spec.supplied_in(&m));
    }

    #[test]
    fn bool_flag_bare_and_explicit() {
        let set = set_with("verbose", FlagValue::Bool(false));
        let spec = set.lookup("verbose").unwrap();

        let m = parse(spec.to_arg(false), &["--verbose"]);
        assert_eq!(spec.value_in(&m), FlagValue::Bool(true));

        let m = parse(spec.to_arg(false), &["--verbose=no"]);
        assert_eq!(spec.value_in(&m), FlagValue::Bool(false));
        assert!(spec.supplied_in(&m));
    }

    #[test]
    fn implied_value_on_bare_flag() {
        let mut set = set_with("level", FlagValue::I32(0));
        set.set_implied("level", "3").unwrap();
        let spec = set.lookup("level").unwrap();

        let m = parse(spec.to_arg(false), &["--level"]);
        assert_eq!(spec.value_in(&m), FlagValue::I32(3));
        let m = parse(spec.to_arg(false), &["--level=9"]);
        assert_eq!(spec.value_in(&m), FlagValue::I32(9));
    }

    #[test]
    fn string_list_splits_and_appends() {
        let set = set_with("tags", FlagValue::StringList(vec![]));
        let spec = set.lookup("tags").unwrap();
        let m = parse(spec.to_arg(false), &["--tags", "a,b", "--tags", "c"]);
        assert_eq!(
            spec.value_in(&m),
            FlagValue::StringList(vec!["a".into(), "b".into(), "c".into()])
        );

        let m = parse(spec.to_arg(false), &[]);
        assert_eq!(spec.value_in(&m), FlagValue::StringList(vec![]));
    }

    #[test]
    fn hex_bytes_parse() {
        let set = set_with("key", FlagValue::Bytes(vec![]));
        let spec = set.lookup("key").unwrap();
        let m = parse(spec.to_arg(false), &["--key", "beef"]);
        assert_eq!(spec.value_in(&m), FlagValue::Bytes(vec![0xbe, 0xef]));
        assert!(clap::Command::new("t")
            .arg(spec.to_arg(false))
            .try_get_matches_from(["t", "--key", "zz"])
            .is_err());
    }

    #[test]
    fn required_flag_is_not_a_parser_requirement() {
        let mut set = set_with("name", FlagValue::from("anon"));
        set.mark_required("name").unwrap();
        let spec = set.lookup("name").unwrap();
        let m = parse(spec.to_arg(false), &[]);
        assert!(!spec.supplied_in(&m));
        assert_eq!(spec.value_in(&m), FlagValue::from("anon"));
    }

    #[test]
    fn hidden_flag_absent_from_help() {
        let mut set = set_with("secret", FlagValue::from(""));
        set.define("shown", FlagValue::from(""), "visible").unwrap();
        set.mark_hidden("secret").unwrap();
        let mut cmd = clap::Command::new("t");
        for spec in set.iter() {
            cmd = cmd.arg(spec.to_arg(false));
        }
        let help = cmd.render_help().to_string();
        assert!(help.contains("--shown"));
        assert!(!help.contains("--secret"));
    }
}
