// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

//! The raw, free-form-tagged map elements the engine is fed: nodes, ways and
//! multi-member relations. Kept untyped (string-keyed tags) so that unknown
//! OSM keys are tolerated; domain-specific parsing (colour, interval,
//! opening hours) happens at the point of use, not here.

use crate::geo_utils::Coord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The three kinds an OSM-style element can be.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A point.
    Node,
    /// An ordered list of node references.
    Way,
    /// An ordered list of (kind, id, role) members.
    Relation,
}

impl ElementKind {
    /// The lowercase name used in diagnostic messages (`"node 123"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key uniquely identifying one element across the whole dataset: its
/// kind plus its numeric OSM id. `node 12` and `way 12` are distinct.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TypedId {
    /// The element's kind.
    pub kind: ElementKind,
    /// The element's numeric id, unique within its kind.
    pub id: i64,
}

impl TypedId {
    /// Builds a typed id.
    pub fn new(kind: ElementKind, id: i64) -> Self {
        TypedId { kind, id }
    }

    /// Shorthand for a node id.
    pub fn node(id: i64) -> Self {
        TypedId::new(ElementKind::Node, id)
    }

    /// Shorthand for a way id.
    pub fn way(id: i64) -> Self {
        TypedId::new(ElementKind::Way, id)
    }

    /// Shorthand for a relation id.
    pub fn relation(id: i64) -> Self {
        TypedId::new(ElementKind::Relation, id)
    }
}

impl std::fmt::Display for TypedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// One member of a relation: the referenced element plus its role string
/// (which may be empty).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// The referenced element's id.
    pub id: TypedId,
    /// The member's role within the relation (`""`, `"stop"`, `"backward"`, ...).
    pub role: String,
}

impl Member {
    /// Builds a member with the given role.
    pub fn new(id: TypedId, role: impl Into<String>) -> Self {
        Member {
            id,
            role: role.into(),
        }
    }
}

/// Free-form string-to-string tags, preserved verbatim so unknown keys
/// survive the round trip; domain parsing (colour, interval, hours) is
/// total and happens where the tag is consumed.
pub type Tags = BTreeMap<String, String>;

/// A raw node, way or relation as fed to the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawElement {
    /// This element's own id.
    pub id: TypedId,
    /// String tags, empty if untagged.
    pub tags: Tags,
    /// For ways: the ordered list of node ids forming it.
    pub nodes: Option<Vec<i64>>,
    /// For relations: the ordered list of (kind, id, role) members.
    pub members: Option<Vec<Member>>,
    /// For nodes: their coordinate.
    pub coord: Option<Coord>,
}

impl RawElement {
    /// Builds a bare node at the given coordinate.
    pub fn node(id: i64, coord: Coord) -> Self {
        RawElement {
            id: TypedId::node(id),
            tags: Tags::new(),
            nodes: None,
            members: None,
            coord: Some(coord),
        }
    }

    /// Builds a bare way from its node id sequence.
    pub fn way(id: i64, nodes: Vec<i64>) -> Self {
        RawElement {
            id: TypedId::way(id),
            tags: Tags::new(),
            nodes: Some(nodes),
            members: None,
            coord: None,
        }
    }

    /// Builds a bare relation from its member sequence.
    pub fn relation(id: i64, members: Vec<Member>) -> Self {
        RawElement {
            id: TypedId::relation(id),
            tags: Tags::new(),
            nodes: None,
            members: Some(members),
            coord: None,
        }
    }

    /// Attaches tags to this element, builder-style.
    pub fn with_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The value of `tags[key]`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// The display name used in diagnostics: `name`, falling back to `ref`.
    pub fn display_name(&self) -> &str {
        self.tag("name").or_else(|| self.tag("ref")).unwrap_or("")
    }

    /// Whether any construction-in-progress tag (`construction`,
    /// `proposed`, `planned`, ...) is present.
    pub fn is_under_construction(&self) -> bool {
        crate::classify::CONSTRUCTION_KEYS
            .iter()
            .any(|k| self.tags.contains_key(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_id_orders_by_kind_then_id() {
        let a = TypedId::node(5);
        let b = TypedId::way(1);
        assert!(a < b, "node sorts before way regardless of numeric id");
    }

    #[test]
    fn display_name_falls_back_to_ref() {
        let el = RawElement::node(1, Coord::new(0.0, 0.0)).with_tags([("ref", "42")]);
        assert_eq!(el.display_name(), "42");
    }
}
