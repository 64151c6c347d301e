//! Declaration atoms.
//!
//! This module groups the immutable, validated records built from the
//! `listen`, `emit` and `webComponents` sections of module manifests, the
//! raw forms they are deserialized from, and the priority ordering shared by
//! the aggregated sections.

pub mod emit;
pub mod listen;
pub mod raw;
pub mod web_component;

use std::cmp::Ordering;

pub use emit::EmitAtom;
pub use listen::{ListenAtom, ListenAtomBuilder};
pub use raw::{OneOrMany, RawEmit, RawListen, RawWebComponent};
pub use web_component::WebComponentAtom;

use crate::error::ConfigError;
use crate::origin::Origin;

/// Priority assigned when a declaration omits one.
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// Ordering capability of aggregated atoms.
pub trait Prioritized {
    /// Higher runs first.
    fn priority(&self) -> f64;

    /// Tie-breaker, ascending.
    fn sort_key(&self) -> &str;
}

/// Compares two atoms: priority descending, then sort key ascending.
pub fn priority_order<T: Prioritized>(a: &T, b: &T) -> Ordering {
    b.priority()
        .total_cmp(&a.priority())
        .then_with(|| a.sort_key().cmp(b.sort_key()))
}

/// Stable sort by [`priority_order`].
pub fn sort_by_priority<T: Prioritized>(atoms: &mut [T]) {
    atoms.sort_by(priority_order);
}

/// Strips the namespace separator some manifests prefix class keys with.
#[must_use]
pub fn class_key(class: &str) -> &str {
    class.trim().trim_start_matches('\\')
}

pub(crate) fn required(
    value: Option<String>,
    atom: &'static str,
    field: &'static str,
    context: &impl serde::Serialize,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField {
            atom,
            field,
            context: serde_json::to_string(context).unwrap_or_default(),
        }),
    }
}

pub(crate) fn parse_origins(origin: Option<OneOrMany>) -> Result<Vec<Origin>, ConfigError> {
    let literals = origin.map(OneOrMany::into_vec).unwrap_or_default();
    let origins = literals
        .iter()
        .map(|s| s.parse::<Origin>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Origin::normalize(origins))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(f64, &'static str);

    impl Prioritized for Item {
        fn priority(&self) -> f64 {
            self.0
        }

        fn sort_key(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_sort_priority_desc_then_key_asc() {
        let mut items = vec![
            Item(0.2, "a"),
            Item(0.5, "zeta"),
            Item(0.9, "m"),
            Item(0.5, "alpha"),
        ];
        sort_by_priority(&mut items);
        let order: Vec<_> = items.iter().map(|i| (i.0, i.1)).collect();
        assert_eq!(order, vec![(0.9, "m"), (0.5, "alpha"), (0.5, "zeta"), (0.2, "a")]);
    }

    #[test]
    fn test_explicit_zero_priority_sorts_last() {
        let atom = |class: &str, priority: Option<f64>| {
            let builder = ListenAtom::builder().event("x").class(class);
            match priority {
                Some(p) => builder.priority(p).build().unwrap(),
                None => builder.build().unwrap(),
            }
        };
        let mut atoms = vec![
            atom("Zero", Some(0.0)),
            atom("Low", Some(0.1)),
            atom("Default", None),
        ];
        sort_by_priority(&mut atoms);
        let classes: Vec<_> = atoms.iter().map(ListenAtom::class).collect();
        // Zero is a real priority, not a stand-in for the default.
        assert_eq!(classes, vec!["Default", "Low", "Zero"]);
    }

    #[test]
    fn test_class_key_strips_namespace_prefix() {
        assert_eq!(class_key("\\Acme\\Listener"), "Acme\\Listener");
        assert_eq!(class_key("acme::Listener"), "acme::Listener");
        assert_eq!(class_key("  \\X "), "X");
    }

    #[test]
    fn test_parse_origins_normalizes() {
        let origins = parse_origins(Some(OneOrMany::Many(vec![
            "remote".to_string(),
            "cli".to_string(),
            "remote".to_string(),
        ])))
        .unwrap();
        assert_eq!(origins, vec![Origin::Cli, Origin::Remote]);
        assert!(parse_origins(None).unwrap().is_empty());
        assert!(parse_origins(Some(OneOrMany::One("mars".to_string()))).is_err());
    }
}
