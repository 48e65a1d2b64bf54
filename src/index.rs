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

//! The single owner of every raw element for a city. Nothing downstream of
//! this module owns an element directly; [`Station`](crate::station::Station),
//! [`StopArea`](crate::stop_area::StopArea), [`Route`](crate::route::Route)
//! and [`RouteMaster`](crate::route_master::RouteMaster) all hold
//! [`TypedId`]s and look elements up here.

use crate::element::{ElementKind, RawElement, TypedId};
use crate::geo_utils::Coord;
use std::cell::RefCell;
use std::collections::HashMap;

/// An owning, lookup-by-id collection of [`RawElement`]s, with a
/// memoized centroid computation and a reverse index from a member to the
/// relations that reference it.
#[derive(Debug, Default)]
pub struct ElementIndex {
    elements: HashMap<TypedId, RawElement>,
    containing_relations: HashMap<TypedId, Vec<TypedId>>,
    centroid_cache: RefCell<HashMap<TypedId, Option<Coord>>>,
}

impl ElementIndex {
    /// Builds an empty index.
    pub fn new() -> Self {
        ElementIndex::default()
    }

    /// Inserts `element`, indexing its members (if a relation) or nodes (if
    /// a way) for [`containing_relations`](Self::containing_relations)
    /// lookups. Returns `false` without inserting if an element with the
    /// same id was already present, leaving the original in place.
    pub fn add(&mut self, element: RawElement) -> bool {
        if self.elements.contains_key(&element.id) {
            tracing::debug!("duplicate element {} ignored", element.id);
            return false;
        }
        if let Some(members) = &element.members {
            for member in members {
                self.containing_relations
                    .entry(member.id)
                    .or_default()
                    .push(element.id);
            }
        }
        self.elements.insert(element.id, element);
        true
    }

    /// Looks up an element by id.
    pub fn get(&self, id: TypedId) -> Option<&RawElement> {
        self.elements.get(&id)
    }

    /// Whether an element with this id has been indexed.
    pub fn contains(&self, id: TypedId) -> bool {
        self.elements.contains_key(&id)
    }

    /// The number of indexed elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the index holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates over every indexed element, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &RawElement> {
        self.elements.values()
    }

    /// Iterates over indexed elements of one kind.
    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &RawElement> {
        self.elements.values().filter(move |e| e.id.kind == kind)
    }

    /// The ids of every relation that lists `id` among its members (or, for
    /// a way's nodes, every way referencing it — callers pass node ids for
    /// that case too since `containing_relations` is keyed on the generic
    /// typed id regardless of the referencing element's own kind).
    pub fn containing_relations(&self, id: TypedId) -> &[TypedId] {
        self.containing_relations
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The centroid of an element: a node's own coordinate, a way's node
    /// coordinate average, or — for a relation — its first member's centroid,
    /// applied recursively. Results are memoized; a cycle in the (malformed)
    /// relation graph resolves to `None` instead of recursing forever.
    pub fn centroid(&self, id: TypedId) -> Option<Coord> {
        if let Some(cached) = self.centroid_cache.borrow().get(&id) {
            return *cached;
        }
        // Mark as in-progress so a cycle back to `id` sees `None` rather
        // than recursing.
        self.centroid_cache.borrow_mut().insert(id, None);
        let computed = self.compute_centroid(id);
        self.centroid_cache.borrow_mut().insert(id, computed);
        computed
    }

    fn compute_centroid(&self, id: TypedId) -> Option<Coord> {
        let element = self.elements.get(&id)?;
        match id.kind {
            ElementKind::Node => element.coord,
            ElementKind::Way => {
                let nodes = element.nodes.as_ref()?;
                let coords: Vec<Coord> = nodes
                    .iter()
                    .filter_map(|n| self.get(TypedId::node(*n)).and_then(|e| e.coord))
                    .collect();
                mean(&coords)
            }
            ElementKind::Relation => {
                let members = element.members.as_ref()?;
                let first = members.first()?;
                self.centroid(first.id)
            }
        }
    }
}

fn mean(coords: &[Coord]) -> Option<Coord> {
    if coords.is_empty() {
        return None;
    }
    let (sum_lon, sum_lat) = coords
        .iter()
        .fold((0.0, 0.0), |(lon, lat), c| (lon + c.lon, lat + c.lat));
    let n = coords.len() as f64;
    Some(Coord::new(sum_lon / n, sum_lat / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Member, RawElement};
    use pretty_assertions::assert_eq;

    #[test]
    fn add_rejects_a_duplicate_id() {
        let mut index = ElementIndex::new();
        assert!(index.add(RawElement::node(1, Coord::new(0.0, 0.0))));
        assert!(!index.add(RawElement::node(1, Coord::new(1.0, 1.0))));
        assert_eq!(index.get(TypedId::node(1)).unwrap().coord, Some(Coord::new(0.0, 0.0)));
    }

    #[test]
    fn way_centroid_averages_its_node_coordinates() {
        let mut index = ElementIndex::new();
        index.add(RawElement::node(1, Coord::new(0.0, 0.0)));
        index.add(RawElement::node(2, Coord::new(2.0, 0.0)));
        index.add(RawElement::way(10, vec![1, 2]));

        let centroid = index.centroid(TypedId::way(10)).unwrap();
        assert_eq!(centroid, Coord::new(1.0, 0.0));
    }

    #[test]
    fn relation_centroid_is_its_first_members_centroid_not_an_average() {
        let mut index = ElementIndex::new();
        index.add(RawElement::node(1, Coord::new(0.0, 0.0)));
        index.add(RawElement::node(2, Coord::new(10.0, 10.0)));
        index.add(RawElement::relation(
            1,
            vec![
                Member::new(TypedId::node(1), ""),
                Member::new(TypedId::node(2), ""),
            ],
        ));
        assert_eq!(index.centroid(TypedId::relation(1)), Some(Coord::new(0.0, 0.0)));
    }

    #[test]
    fn relation_centroid_is_none_when_no_member_resolves() {
        let mut index = ElementIndex::new();
        index.add(RawElement::relation(
            1,
            vec![Member::new(TypedId::node(99), "")],
        ));
        assert_eq!(index.centroid(TypedId::relation(1)), None);
    }

    #[test]
    fn a_self_referencing_relation_does_not_loop_forever() {
        let mut index = ElementIndex::new();
        index.add(RawElement::relation(
            1,
            vec![Member::new(TypedId::relation(1), "")],
        ));
        assert_eq!(index.centroid(TypedId::relation(1)), None);
    }

    #[test]
    fn containing_relations_reports_references() {
        let mut index = ElementIndex::new();
        index.add(RawElement::relation(
            1,
            vec![Member::new(TypedId::node(5), "stop")],
        ));
        assert_eq!(
            index.containing_relations(TypedId::node(5)),
            &[TypedId::relation(1)]
        );
    }
}
