//! HTTP methods, on both sides of the dispatch table.
//!
//! [`Method`] is the incoming side: the verbs the dispatcher accepts on the
//! wire. Unknown method strings are rejected with `405 Method Not Allowed`
//! before matching ever runs.
//!
//! [`Verb`] is the declaration side: one variant per exposed method plus the
//! generic [`Verb::All`], which matches any incoming method.

use std::fmt;
use std::str::FromStr;

/// A supported incoming HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    /// Every supported method, in a fixed order. [`App::all`](crate::App::all)
    /// iterates this list to build its per-verb dedupe keys.
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Parses an uppercase method string. Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verb attached to a controller action at declaration time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Matches every incoming method.
    All,
}

impl Verb {
    /// Whether a request with `method` satisfies this declaration.
    pub fn matches(self, method: Method) -> bool {
        match self {
            Self::All => true,
            _ => self.as_method().is_some_and(|m| m == method),
        }
    }

    fn as_method(self) -> Option<Method> {
        match self {
            Self::Get => Some(Method::Get),
            Self::Post => Some(Method::Post),
            Self::Put => Some(Method::Put),
            Self::Delete => Some(Method::Delete),
            Self::Patch => Some(Method::Patch),
            Self::Head => Some(Method::Head),
            Self::Options => Some(Method::Options),
            Self::All => None,
        }
    }
}

impl From<Method> for Verb {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => Self::Get,
            Method::Post => Self::Post,
            Method::Put => Self::Put,
            Method::Delete => Self::Delete,
            Method::Patch => Self::Patch,
            Method::Head => Self::Head,
            Method::Options => Self::Options,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_method() {
            Some(m) => f.write_str(m.as_str()),
            None => f.write_str("ALL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert!("get".parse::<Method>().is_err());
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn all_verb_matches_everything() {
        for method in Method::ALL {
            assert!(Verb::All.matches(method));
        }
        assert!(Verb::Get.matches(Method::Get));
        assert!(!Verb::Get.matches(Method::Post));
    }
}
