//! Right sets carried by authorize events.
//!
//! Listeners taking part in authorization inspect the still-unauthorized
//! rights and move the ones they can vouch for into the authorized list.
//! Rights compare by their string value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event type used for authorization requests.
pub const AUTHORIZE_EVENT: &str = "system:authorize";

/// Ordered unauthorized/authorized right lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    unauthorized: Vec<String>,
    authorized: Vec<String>,
}

impl Authorization {
    /// Creates a set in which every right is still unauthorized.
    #[must_use]
    pub fn new<I, R>(rights: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: fmt::Display,
    {
        Self {
            unauthorized: rights.into_iter().map(|r| r.to_string()).collect(),
            authorized: Vec::new(),
        }
    }

    /// Rights nobody has vouched for yet, in request order.
    #[must_use]
    pub fn unauthorized(&self) -> &[String] {
        &self.unauthorized
    }

    /// Rights already authorized, in authorization order.
    #[must_use]
    pub fn authorized(&self) -> &[String] {
        &self.authorized
    }

    /// Moves every unauthorized entry equal to `right` to the authorized list.
    ///
    /// Returns the number of entries moved.
    pub fn grant(&mut self, right: &str) -> usize {
        let before = self.unauthorized.len();
        let mut moved = Vec::new();
        self.unauthorized.retain(|r| {
            if r == right {
                moved.push(r.clone());
                false
            } else {
                true
            }
        });
        self.authorized.extend(moved);
        before - self.unauthorized.len()
    }

    /// Returns true if `right` has been authorized.
    #[must_use]
    pub fn is_authorized(&self, right: &str) -> bool {
        self.authorized.iter().any(|r| r == right)
    }

    /// Returns true once no right remains unauthorized.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unauthorized.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Authority(&'static str);

    impl fmt::Display for Authority {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    #[test]
    fn test_grant_moves_matching_rights() {
        let mut auth = Authorization::new(["A", "B"]);
        assert_eq!(auth.grant("A"), 1);
        assert_eq!(auth.unauthorized(), ["B".to_string()]);
        assert_eq!(auth.authorized(), ["A".to_string()]);
        assert!(auth.is_authorized("A"));
        assert!(!auth.is_authorized("B"));
        assert!(!auth.is_complete());
    }

    #[test]
    fn test_grant_unknown_right_is_noop() {
        let mut auth = Authorization::new(["A"]);
        assert_eq!(auth.grant("Z"), 0);
        assert!(!auth.is_authorized("Z"));
        assert_eq!(auth.unauthorized().len(), 1);
    }

    #[test]
    fn test_rights_compare_by_string_value() {
        let mut auth = Authorization::new([Authority("member:admin")]);
        auth.grant(&Authority("member:admin").to_string());
        assert!(auth.is_authorized("member:admin"));
        assert!(auth.is_complete());
    }

    #[test]
    fn test_duplicate_rights_move_together() {
        let mut auth = Authorization::new(["A", "A", "B"]);
        assert_eq!(auth.grant("A"), 2);
        assert_eq!(auth.authorized().len(), 2);
    }
}
