//! Wildcard node paths
//!
//! A [`ViewDimNodePath`] addresses positions in the scanned tree across the
//! view dimensions: the group variable values, an optional artefact type, and
//! the artefact variable values. Each value position is either concrete or a
//! `*` wildcard. Paths order by *containment specificity*: a path containing
//! another pins a superset of its positions, and among several containing
//! patterns the one pinning the most significant positions wins.
//!
//! The canonical string form is the key space of persisted category data:
//! value positions joined by `|`, with an optional `;type;values` artefact
//! section, e.g. `cam_front|*` or `cam_front|*;image;4|*`.

use std::fmt;
use std::str::FromStr;

use crate::error::ProductError;

/// Wildcard marker in the canonical string form
pub const WILDCARD: &str = "*";

/// Artefact section of a node path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtefactPath {
    /// Artefact type id
    pub type_id: String,
    /// Artefact variable values; `None` is a wildcard
    pub values: Vec<Option<String>>,
}

/// A wildcard path across group values, artefact type and artefact values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewDimNodePath {
    /// Group variable values; `None` is a wildcard
    pub group: Vec<Option<String>>,
    /// Optional artefact refinement
    pub artefact: Option<ArtefactPath>,
}

impl ViewDimNodePath {
    /// A group-level path from concrete values
    pub fn from_group_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group: values.into_iter().map(|v| Some(v.into())).collect(),
            artefact: None,
        }
    }

    /// Refine this path with an artefact type and concrete artefact values
    pub fn with_artefact<I, S>(mut self, type_id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artefact = Some(ArtefactPath {
            type_id: type_id.into(),
            values: values.into_iter().map(|v| Some(v.into())).collect(),
        });
        self
    }

    /// Replace the group position `index` with a wildcard
    pub fn wildcard_group_at(mut self, index: usize) -> Self {
        if index < self.group.len() {
            self.group[index] = None;
        }
        self
    }

    /// Replace the artefact position `index` with a wildcard
    pub fn wildcard_artefact_at(mut self, index: usize) -> Self {
        if let Some(art) = &mut self.artefact {
            if index < art.values.len() {
                art.values[index] = None;
            }
        }
        self
    }

    /// Number of value positions, artefact-type slot included
    pub fn position_count(&self) -> usize {
        match &self.artefact {
            Some(art) => self.group.len() + 1 + art.values.len(),
            None => self.group.len(),
        }
    }

    /// Whether every non-wildcard position of `self` matches `other`.
    ///
    /// A path without an artefact section contains any artefact refinement of
    /// its group positions; a path with one requires the same artefact type.
    pub fn contains(&self, other: &ViewDimNodePath) -> bool {
        if self.group.len() != other.group.len() {
            return false;
        }
        for (mine, theirs) in self.group.iter().zip(&other.group) {
            if let Some(value) = mine {
                if theirs.as_ref() != Some(value) {
                    return false;
                }
            }
        }
        match (&self.artefact, &other.artefact) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => {
                if mine.type_id != theirs.type_id || mine.values.len() != theirs.values.len() {
                    return false;
                }
                for (a, b) in mine.values.iter().zip(&theirs.values) {
                    if let Some(value) = a {
                        if b.as_ref() != Some(value) {
                            return false;
                        }
                    }
                }
                true
            }
        }
    }

    /// Containment specificity of `self` with respect to `other`.
    ///
    /// -1 when `self` does not contain `other`; otherwise the sum of
    /// `1 << position` over the non-wildcard positions of `self`, counting
    /// group positions first, then the artefact-type slot, then artefact
    /// positions. Earlier positions carry lower weights; the ranking arises
    /// from every containing pattern being scored over the same positions.
    pub fn specificity(&self, other: &ViewDimNodePath) -> i64 {
        if !self.contains(other) {
            return -1;
        }
        let mut score: i64 = 0;
        for (position, value) in self.group.iter().enumerate() {
            if value.is_some() {
                score += 1 << position;
            }
        }
        if let Some(art) = &self.artefact {
            let type_slot = self.group.len();
            score += 1 << type_slot;
            for (offset, value) in art.values.iter().enumerate() {
                if value.is_some() {
                    score += 1 << (type_slot + 1 + offset);
                }
            }
        }
        score
    }
}

fn fmt_positions(values: &[Option<String>], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, "|")?;
        }
        write!(f, "{}", value.as_deref().unwrap_or(WILDCARD))?;
    }
    Ok(())
}

impl fmt::Display for ViewDimNodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_positions(&self.group, f)?;
        if let Some(art) = &self.artefact {
            write!(f, ";{};", art.type_id)?;
            fmt_positions(&art.values, f)?;
        }
        Ok(())
    }
}

fn parse_positions(section: &str) -> Vec<Option<String>> {
    if section.is_empty() {
        return Vec::new();
    }
    section
        .split('|')
        .map(|token| {
            if token == WILDCARD {
                None
            } else {
                Some(token.to_string())
            }
        })
        .collect()
}

impl FromStr for ViewDimNodePath {
    type Err = ProductError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sections: Vec<&str> = s.split(';').collect();
        match sections.as_slice() {
            [group] if !group.is_empty() => Ok(Self {
                group: parse_positions(group),
                artefact: None,
            }),
            [group, type_id, values] if !group.is_empty() && !type_id.is_empty() => Ok(Self {
                group: parse_positions(group),
                artefact: Some(ArtefactPath {
                    type_id: type_id.to_string(),
                    values: parse_positions(values),
                }),
            }),
            _ => Err(ProductError::InvalidNodePath(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ViewDimNodePath {
        s.parse().unwrap()
    }

    #[test]
    fn test_string_round_trip() {
        for s in ["a|b|c", "a|*|*", "a|b|*;image;1|*", "a;label;"] {
            assert_eq!(path(s).to_string(), s);
        }
    }

    #[test]
    fn test_invalid_strings_rejected() {
        assert!("".parse::<ViewDimNodePath>().is_err());
        assert!("a|b;;1".parse::<ViewDimNodePath>().is_err());
        assert!("a;b;c;d".parse::<ViewDimNodePath>().is_err());
    }

    #[test]
    fn test_containment() {
        assert!(path("a|*|*").contains(&path("a|b|c")));
        assert!(path("a|b|*").contains(&path("a|b|c")));
        assert!(!path("a|b|*").contains(&path("a|x|c")));
        assert!(!path("a|b").contains(&path("a|b|c")));
    }

    #[test]
    fn test_group_pattern_contains_artefact_refinement() {
        assert!(path("a|*").contains(&path("a|b;image;1|2")));
        assert!(!path("a|*;image;*|*").contains(&path("a|b")));
        assert!(!path("a|*;image;*|*").contains(&path("a|b;label;1|2")));
        assert!(path("a|*;image;1|*").contains(&path("a|b;image;1|2")));
    }

    #[test]
    fn test_specificity_ranks_by_pinned_positions() {
        let target = path("a|b|c");
        let p1 = path("a|*|*");
        let p2 = path("a|b|*");
        let p3 = path("a|b|c");
        assert!(p3.specificity(&target) > p2.specificity(&target));
        assert!(p2.specificity(&target) > p1.specificity(&target));
        assert_eq!(path("z|*|*").specificity(&target), -1);
    }

    #[test]
    fn test_specificity_is_shifted_position_sum() {
        let target = path("a|b;image;1|2");
        // group 0 -> 1, group 1 -> 2, type slot -> 4, artefact 0 -> 8, artefact 1 -> 16
        assert_eq!(path("a|*").specificity(&target), 1);
        assert_eq!(path("a|b").specificity(&target), 3);
        assert_eq!(path("a|b;image;*|*").specificity(&target), 7);
        assert_eq!(path("a|b;image;1|*").specificity(&target), 15);
        assert_eq!(path("a|b;image;1|2").specificity(&target), 31);
    }

    #[test]
    fn test_wildcard_builders() {
        let p = ViewDimNodePath::from_group_values(["a", "b"])
            .with_artefact("image", ["1", "2"])
            .wildcard_group_at(1)
            .wildcard_artefact_at(1);
        assert_eq!(p.to_string(), "a|*;image;1|*");
        assert_eq!(p.position_count(), 5);
    }
}
