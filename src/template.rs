//! Engine input templates. A template is plain text with placeholders of the
//! form `&{name}`; [Template::render] fills them from a map of values
//!
//! ```text
//! !&{calculation} &{basis} &{functional}
//! *xyzfile 0 1 &{xyzfile}
//! ```

use std::{borrow::Cow, collections::HashMap, fmt::Display, path::Path};

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"&\{([^{}]*)\}").unwrap();
}

#[derive(Clone, Debug, PartialEq)]
pub struct Template(Cow<'static, str>);

impl Template {
    /// calculation on a geometry file referenced by name
    pub const BASIC: Self = Self(Cow::Borrowed(
        "!&{calculation} &{basis} &{functional}\n*xyzfile 0 1 &{xyzfile}\n",
    ));

    /// calculation on pasted XYZ coordinates
    pub const BASIC_XYZ: Self = Self(Cow::Borrowed(
        "!&{calculation} &{basis} &{functional}\n* xyz 0 1 \n&{xyz}\n*",
    ));

    pub const BASIC_PARALLEL: Self = Self(Cow::Borrowed(
        "!&{calculation} &{basis} &{functional}\n%pal nprocs &{cores} end\n\
         *xyzfile 0 1 &{xyzfile}\n",
    ));

    /// used for every optimization step after the first
    pub const BASIC_XYZ_PARALLEL: Self = Self(Cow::Borrowed(
        "!&{calculation} &{basis} &{functional}\n%pal nprocs &{cores} end\n\
         * xyz 0 1 \n&{xyz}\n*",
    ));

    pub fn new(s: impl Into<String>) -> Self {
        Self(Cow::Owned(s.into()))
    }

    /// load a template from an existing input file
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::read_to_string(path).map(Self::new)
    }

    /// interpret `s` as the name of a built-in template (`basic`,
    /// `basic-xyz`, `basic-parallel`, `basic-xyz-parallel`), a path to a
    /// `.inp` file, or a literal template, in that order
    pub fn resolve(s: &str) -> std::io::Result<Self> {
        Ok(match s.to_lowercase().as_str() {
            "basic" => Self::BASIC,
            "basic-xyz" => Self::BASIC_XYZ,
            "basic-parallel" => Self::BASIC_PARALLEL,
            "basic-xyz-parallel" => Self::BASIC_XYZ_PARALLEL,
            _ if s.ends_with(".inp") => Self::load(s)?,
            _ => Self::new(s),
        })
    }

    /// replace every `&{key}` with its value in `vars`. placeholders without
    /// a value are left untouched, and substituted values are never expanded
    /// themselves
    pub fn render(&self, vars: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(&self.0, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_owned(),
            })
            .into_owned()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The kinds of calculation the templates are used for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Calculation {
    Optimization,
    Frequency,
    HartreeFock,
    Goat,
    GoatXtb,
}

impl Display for Calculation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Calculation::Optimization => "OPT",
                Calculation::Frequency => "FREQ",
                Calculation::HartreeFock => "HF",
                Calculation::Goat => "GOAT",
                Calculation::GoatXtb => "GOAT XTB",
            }
        )
    }
}

pub mod basis {
    pub const DEF2_SVP: &str = "DEF2-SVP";
    pub const MINI: &str = "MINI";
}

pub mod functional {
    pub const B3LYP: &str = "B3LYP";
    pub const PBE: &str = "PBE";
}
