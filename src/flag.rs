//! Typed flag declarations.
//!
//! A [`Flag<T>`] is built from option lists, checked against `T` once, and
//! attached to a [`Command`]:
//!
//! ```ignore
//! let count = Int32Flag::new("count", [Opts::new().abbr("c").default(5).desc("how many")])?;
//! cmd.add_flag(&count)?;
//! ```
//!
//! Attaching is two steps. [`register`](Flag::register) declares the flag on
//! the persistent or local set, with or without its short form.
//! [`post_add`](Flag::post_add) then applies the three independent
//! constraints (required, implied value, hidden) to the same set.

use std::borrow::Borrow;

use crate::command::Command;
use crate::error::SerpentError;
use crate::opts::{FlagOpt, Opts};
use crate::value::{FlagType, FlagValue, HexBytes};

/// A flag of primitive type `T` and its resolved options.
#[derive(Debug, Clone, PartialEq)]
pub struct Flag<T: FlagType> {
    name: String,
    abbr: Option<char>,
    desc: String,
    req: bool,
    ubiq: bool,
    default: T,
    implied: Option<String>,
    hide: bool,
}

pub type BoolFlag = Flag<bool>;
pub type Int8Flag = Flag<i8>;
pub type Int16Flag = Flag<i16>;
pub type Int32Flag = Flag<i32>;
pub type Int64Flag = Flag<i64>;
pub type Uint8Flag = Flag<u8>;
pub type Uint16Flag = Flag<u16>;
pub type Uint32Flag = Flag<u32>;
pub type Uint64Flag = Flag<u64>;
pub type Float32Flag = Flag<f32>;
pub type Float64Flag = Flag<f64>;
pub type StringFlag = Flag<String>;
pub type StringSliceFlag = Flag<Vec<String>>;
pub type BytesHexFlag = Flag<HexBytes>;

impl<T: FlagType> Flag<T> {
    /// Declare a flag, applying each option list in order.
    ///
    /// The provisional default is `T`'s zero value. A `default` whose type
    /// is not exactly `T`, an `implied` value that does not parse as `T`, or
    /// an abbreviation longer than one character is a
    /// [`SerpentError::Defect`].
    pub fn new<L>(name: &str, lists: impl IntoIterator<Item = L>) -> Result<Self, SerpentError>
    where
        L: Borrow<Opts>,
    {
        let mut flag = Self::bare(name);
        for list in lists {
            flag.populate(list.borrow())?;
        }
        Ok(flag)
    }

    /// A declaration with no options applied.
    pub fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            abbr: None,
            desc: String::new(),
            req: false,
            ubiq: false,
            default: T::default(),
            implied: None,
            hide: false,
        }
    }

    fn populate(&mut self, opts: &Opts) -> Result<(), SerpentError> {
        for opt in opts {
            match opt {
                FlagOpt::Empty => {}
                FlagOpt::Abbr(a) => self.abbr = parse_abbr(&self.name, a)?,
                FlagOpt::Default(v) => self.default = self.typed_default(v)?,
                FlagOpt::Desc(d) => self.desc = d.clone(),
                FlagOpt::Implied(v) => {
                    FlagValue::parse(T::KIND, v).map_err(|e| {
                        SerpentError::defect(
                            &self.name,
                            format!("implied value '{v}' is not a valid {}: {e}", T::KIND),
                        )
                    })?;
                    self.implied = Some(v.clone());
                }
                FlagOpt::Req(b) => self.req = *b,
                FlagOpt::Ubiq(b) => self.ubiq = *b,
                FlagOpt::Hide => self.hide = true,
            }
        }
        Ok(())
    }

    fn typed_default(&self, v: &FlagValue) -> Result<T, SerpentError> {
        T::from_value(v.clone()).ok_or_else(|| {
            SerpentError::defect(
                &self.name,
                format!("default value is {} instead of {}", v.kind(), T::KIND),
            )
        })
    }

    pub fn opt_abbr(&mut self, abbr: &str) -> Result<&mut Self, SerpentError> {
        self.abbr = parse_abbr(&self.name, abbr)?;
        Ok(self)
    }

    pub fn opt_desc(&mut self, desc: &str) -> &mut Self {
        self.desc = desc.to_string();
        self
    }

    pub fn opt_req(&mut self, req: bool) -> &mut Self {
        self.req = req;
        self
    }

    pub fn opt_ubiq(&mut self, ubiq: bool) -> &mut Self {
        self.ubiq = ubiq;
        self
    }

    pub fn opt_default(&mut self, default: T) -> &mut Self {
        self.default = default;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abbr(&self) -> Option<char> {
        self.abbr
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn is_required(&self) -> bool {
        self.req
    }

    pub fn is_ubiq(&self) -> bool {
        self.ubiq
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn implied(&self) -> Option<&str> {
        self.implied.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hide
    }

    /// Declare this flag on `cmd`.
    pub fn register(&self, cmd: &mut Command) -> Result<(), SerpentError> {
        let default = self.default.clone().into_value();
        let set = if self.ubiq {
            cmd.persistent_flags_mut()
        } else {
            cmd.flags_mut()
        };
        match self.abbr {
            Some(short) => set.define_short(&self.name, short, default, &self.desc),
            None => set.define(&self.name, default, &self.desc),
        }
    }

    /// Apply required / implied / hidden to the set [`register`](Self::register) used.
    pub fn post_add(&self, cmd: &mut Command) -> Result<(), SerpentError> {
        let set = if self.ubiq {
            cmd.persistent_flags_mut()
        } else {
            cmd.flags_mut()
        };
        if self.req {
            set.mark_required(&self.name)?;
        }
        if let Some(v) = &self.implied {
            set.set_implied(&self.name, v)?;
        }
        if self.hide {
            set.mark_hidden(&self.name)?;
        }
        Ok(())
    }
}

fn parse_abbr(flag: &str, abbr: &str) -> Result<Option<char>, SerpentError> {
    let mut chars = abbr.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some('-'), None) => Err(SerpentError::defect(flag, "'-' cannot be an abbreviation")),
        (Some(c), None) => Ok(Some(c)),
        (Some(_), Some(_)) => Err(SerpentError::defect(
            flag,
            format!("abbreviation '{abbr}' must be a single character"),
        )),
    }
}

/// Anything that can attach itself to a command.
pub trait AddFlag {
    fn add_to(&self, cmd: &mut Command) -> Result<(), SerpentError>;
}

impl<T: FlagType> AddFlag for Flag<T> {
    fn add_to(&self, cmd: &mut Command) -> Result<(), SerpentError> {
        self.register(cmd)?;
        self.post_add(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_value_is_provisional_default() {
        let f = Int32Flag::new("count", [Opts::new()]).unwrap();
        assert_eq!(*f.default_value(), 0);
        assert!(StringSliceFlag::bare("tags").default_value().is_empty());
    }

    #[test]
    fn matching_default_resolves_for_every_type() {
        fn check<T: FlagType + PartialEq>(value: T) {
            let f = Flag::<T>::new("f", [Opts::new().default(value.clone().into_value())])
                .unwrap();
            assert_eq!(f.default_value(), &value, "{} lost its default", T::KIND);
        }
        check(true);
        check(-8i8);
        check(-16i16);
        check(5i32);
        check(-64i64);
        check(8u8);
        check(16u16);
        check(32u32);
        check(64u64);
        check(1.5f32);
        check(2.25f64);
        check("x".to_string());
        check(vec!["a".to_string(), "b".to_string()]);
        check(HexBytes(vec![1, 0xff]));

        assert_eq!(*Int32Flag::new("n", [Opts::new().default(5)]).unwrap().default_value(), 5);
        assert_eq!(
            StringFlag::new("s", [Opts::new().default("x")]).unwrap().default_value(),
            "x"
        );
    }

    #[test]
    fn mismatched_default_is_defect_for_every_type() {
        fn check<T: FlagType>() {
            // A string default only fits the string flag, a bool only the bool flag.
            let wrong: FlagValue = if T::KIND == crate::value::ValueKind::String {
                FlagValue::Bool(true)
            } else {
                FlagValue::from("nope")
            };
            let err = Flag::<T>::new("f", [Opts::new().default(wrong)]).unwrap_err();
            assert!(err.is_defect(), "{} accepted a mismatched default", T::KIND);
        }
        check::<bool>();
        check::<i8>();
        check::<i16>();
        check::<i32>();
        check::<i64>();
        check::<u8>();
        check::<u16>();
        check::<u32>();
        check::<u64>();
        check::<f32>();
        check::<f64>();
        check::<String>();
        check::<Vec<String>>();
        check::<HexBytes>();
    }

    #[test]
    fn width_must_match_exactly() {
        let err = Int64Flag::new("n", [Opts::new().default(5i32)]).unwrap_err();
        assert!(err.to_string().contains("i32 instead of i64"));
    }

    #[test]
    fn implied_must_parse_as_type() {
        assert!(BoolFlag::new("b", [Opts::new().implied("maybe")]).is_err());
        let f = BoolFlag::new("b", [Opts::new().implied("false")]).unwrap();
        assert_eq!(f.implied(), Some("false"));
    }

    #[test]
    fn abbreviation_length() {
        assert_eq!(BoolFlag::new("v", [Opts::new().abbr("v")]).unwrap().abbr(), Some('v'));
        assert_eq!(BoolFlag::new("v", [Opts::new().abbr("")]).unwrap().abbr(), None);
        assert!(BoolFlag::new("v", [Opts::new().abbr("vv")]).unwrap_err().is_defect());
        assert!(BoolFlag::new("dash", [Opts::new().abbr("-")]).unwrap_err().is_defect());
    }

    #[test]
    fn later_lists_override_earlier() {
        let base = Opts::new().desc("base").ubiq(true);
        let f = StringFlag::new("s", [base.clone(), Opts::new().ubiq(false)]).unwrap();
        assert_eq!(f.desc(), "base");
        assert!(!f.is_ubiq());
    }

    #[test]
    fn same_list_yields_identical_declarations() {
        let opts = Opts::new().abbr("c").default(3).desc("count").req(true).hide();
        let a = Int32Flag::new("count", [&opts]).unwrap();
        let b = Int32Flag::new("count", [&opts]).unwrap();
        assert_eq!(a, b);
        assert!(a.is_required() && a.is_hidden());
    }

    #[test]
    fn setters_adjust_declaration() {
        let mut f = Int16Flag::bare("n");
        f.opt_desc("d").opt_req(true).opt_ubiq(true).opt_default(4);
        f.opt_abbr("n").unwrap();
        assert_eq!(
            (f.desc(), f.is_required(), f.is_ubiq(), *f.default_value(), f.abbr()),
            ("d", true, true, 4, Some('n'))
        );
        assert!(f.opt_abbr("no").is_err());
    }

    #[test]
    fn register_picks_persistent_or_local_set() {
        let mut cmd = Command::new("app");
        BoolFlag::new("verbose", [Opts::new().ubiq(true).abbr("v")])
            .unwrap()
            .add_to(&mut cmd)
            .unwrap();
        Int32Flag::new("count", [Opts::new().default(5)])
            .unwrap()
            .add_to(&mut cmd)
            .unwrap();

        let verbose = cmd.persistent_flags().lookup("verbose").unwrap();
        assert_eq!(verbose.short(), Some('v'));
        assert!(cmd.flags().lookup("verbose").is_none());
        assert_eq!(cmd.flags().lookup("count").unwrap().default_value(), &FlagValue::I32(5));
    }

    #[test]
    fn post_add_applies_every_constraint() {
        let mut cmd = Command::new("app");
        StringFlag::new(
            "mode",
            [Opts::new().ubiq(true).req(true).implied("fast").hide()],
        )
        .unwrap()
        .add_to(&mut cmd)
        .unwrap();

        let spec = cmd.persistent_flags().lookup("mode").unwrap();
        assert!(spec.is_required());
        assert_eq!(spec.implied(), Some("fast"));
        assert!(spec.is_hidden());
    }
}
