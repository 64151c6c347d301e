//! Event status codes.
//!
//! Codes follow HTTP semantics. Codes of 300 and above are errors,
//! `Undetermined` is neither an error nor OK and is the initial status of
//! every event.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Status {
    #[default]
    Undetermined,
    Continue,
    Processing,
    Ok,
    MultipleChoices,
    MovedPermanently,
    Found,
    SeeOther,
    NotModified,
    TemporaryRedirect,
    PermanentRedirect,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    Conflict,
    PreconditionFailed,
    IAmATeapot,
    Locked,
    Error,
}

impl Status {
    /// Every status, ordered by code.
    pub const ALL: [Self; 21] = [
        Self::Undetermined,
        Self::Continue,
        Self::Processing,
        Self::Ok,
        Self::MultipleChoices,
        Self::MovedPermanently,
        Self::Found,
        Self::SeeOther,
        Self::NotModified,
        Self::TemporaryRedirect,
        Self::PermanentRedirect,
        Self::BadRequest,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::Timeout,
        Self::Conflict,
        Self::PreconditionFailed,
        Self::IAmATeapot,
        Self::Locked,
        Self::Error,
    ];

    /// HTTP-like numeric code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Undetermined => 0,
            Self::Continue => 100,
            Self::Processing => 102,
            Self::Ok => 200,
            Self::MultipleChoices => 300,
            Self::MovedPermanently => 301,
            Self::Found => 302,
            Self::SeeOther => 303,
            Self::NotModified => 304,
            Self::TemporaryRedirect => 307,
            Self::PermanentRedirect => 308,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Timeout => 408,
            Self::Conflict => 409,
            Self::PreconditionFailed => 412,
            Self::IAmATeapot => 418,
            Self::Locked => 423,
            Self::Error => 500,
        }
    }

    /// Upper snake case name, e.g. `NOT_FOUND`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Undetermined => "UNDETERMINED",
            Self::Continue => "CONTINUE",
            Self::Processing => "PROCESSING",
            Self::Ok => "OK",
            Self::MultipleChoices => "MULTIPLE_CHOICES",
            Self::MovedPermanently => "MOVED_PERMANENTLY",
            Self::Found => "FOUND",
            Self::SeeOther => "SEE_OTHER",
            Self::NotModified => "NOT_MODIFIED",
            Self::TemporaryRedirect => "TEMPORARY_REDIRECT",
            Self::PermanentRedirect => "PERMANENT_REDIRECT",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::Conflict => "CONFLICT",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::IAmATeapot => "I_AM_A_TEAPOT",
            Self::Locked => "LOCKED",
            Self::Error => "ERROR",
        }
    }

    /// Returns true for codes of 300 and above.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.code() >= 300
    }

    /// Returns true for determined, non-error codes.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        let code = self.code();
        code > 0 && code < 300
    }

    /// Returns true for the initial status.
    #[must_use]
    pub const fn is_undetermined(&self) -> bool {
        matches!(self, Self::Undetermined)
    }

    /// Returns true once the status can no longer be replaced.
    ///
    /// Only `Undetermined` and `Ok` may be overwritten by later listeners.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Undetermined | Self::Ok)
    }

    /// Looks a status up by code.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Looks a status up by name or code, e.g. `"not found"`, `"NOT_FOUND"` or `"404"`.
    #[must_use]
    pub fn parse_lenient(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(code) = input.parse::<u16>() {
            return Self::from_code(code);
        }
        let name = input.replace(' ', "_").to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Human readable name, e.g. `Not Found`.
    #[must_use]
    pub fn friendly_name(&self) -> String {
        if matches!(self, Self::Ok) {
            return "OK".to_string();
        }
        self.name()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_string() + &chars.as_str().to_ascii_lowercase(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.friendly_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_and_ok_ranges() {
        assert!(!Status::Undetermined.is_error());
        assert!(!Status::Undetermined.is_ok());
        assert!(Status::Continue.is_ok());
        assert!(Status::Ok.is_ok());
        assert!(Status::Found.is_error());
        assert!(Status::Unauthorized.is_error());
        assert!(Status::Error.is_error());
    }

    #[test]
    fn test_is_final() {
        assert!(!Status::Undetermined.is_final());
        assert!(!Status::Ok.is_final());
        assert!(Status::Processing.is_final());
        assert!(Status::Unauthorized.is_final());
        assert!(Status::Error.is_final());
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(Status::parse_lenient("ok"), Some(Status::Ok));
        assert_eq!(Status::parse_lenient("not found"), Some(Status::NotFound));
        assert_eq!(Status::parse_lenient("PRECONDITION_FAILED"), Some(Status::PreconditionFailed));
        assert_eq!(Status::parse_lenient("401"), Some(Status::Unauthorized));
        assert_eq!(Status::parse_lenient("499"), None);
        assert_eq!(Status::parse_lenient("bogus"), None);
    }

    #[test]
    fn test_codes_are_sorted_and_unique() {
        for pair in Status::ALL.windows(2) {
            assert!(pair[0].code() < pair[1].code());
        }
    }

    #[test]
    fn test_friendly_name() {
        assert_eq!(Status::Ok.friendly_name(), "OK");
        assert_eq!(Status::NotFound.friendly_name(), "Not Found");
        assert_eq!(Status::IAmATeapot.friendly_name(), "I Am A Teapot");
        assert_eq!(format!("{}", Status::Unauthorized), "401 Unauthorized");
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Status::NotFound).unwrap();
        assert_eq!(json, r#""not_found""#);
    }
}
