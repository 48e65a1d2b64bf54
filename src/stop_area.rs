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

//! Clustering stations into stop areas and interchanges. A [`StopArea`] is
//! either explicit (backed by a `public_transport=stop_area` relation) or
//! implicit (synthesized from a lone station plus any entrances found
//! nearby); a [`Transfer`] groups the stop areas a `stop_area_group`
//! relation (or, across cities, a shared stop area id) ties together.

use crate::classify;
use crate::colour::{normalize_colour, Rgb};
use crate::diagnostics::Diagnostics;
use crate::element::{ElementKind, RawElement, TypedId};
use crate::geo_utils::{self, Coord};
use crate::index::ElementIndex;
use crate::station::Station;
use std::collections::{HashMap, HashSet};

/// Entrances further than this from a station's centre are never
/// considered to belong to it when no explicit stop area says otherwise.
pub const MAX_DISTANCE_TO_ENTRANCES: f64 = 300.0;

/// A cluster of a station with its stop positions, platforms and
/// entrances/exits, whether declared explicitly via a relation or inferred.
#[derive(Clone, Debug)]
pub struct StopArea {
    /// This stop area's own id: the backing relation's id if explicit,
    /// otherwise the station's id.
    pub id: TypedId,
    /// The station this stop area clusters around.
    pub station: TypedId,
    /// Stop position element ids.
    pub stops: HashSet<TypedId>,
    /// Platform element ids.
    pub platforms: HashSet<TypedId>,
    /// Entrance element ids, usable to enter a platform.
    pub entrances: HashSet<TypedId>,
    /// Exit element ids, usable to leave a platform.
    pub exits: HashSet<TypedId>,
    /// This stop area's centroid: the average of its stops' and platforms'
    /// centers, or the station's own center if it has neither.
    pub center: Coord,
    /// Per-member centroid, keyed by element id.
    pub centers: HashMap<TypedId, Coord>,
    /// Modes inherited from the station.
    pub modes: HashSet<String>,
    /// Display name, preferring the relation's own `name` tag.
    pub name: String,
    /// International name.
    pub int_name: Option<String>,
    /// Normalized colour.
    pub colour: Option<Rgb>,
    /// The `stop_area_group` relation id this stop area belongs to, if any.
    pub transfer: Option<TypedId>,
}

impl StopArea {
    /// Every element id this stop area is made of: itself, its station, and
    /// every stop/platform/entrance/exit.
    pub fn get_elements(&self) -> HashSet<TypedId> {
        let mut result = HashSet::new();
        result.insert(self.id);
        result.insert(self.station);
        result.extend(self.entrances.iter().copied());
        result.extend(self.exits.iter().copied());
        result.extend(self.stops.iter().copied());
        result.extend(self.platforms.iter().copied());
        result
    }

    fn finish(
        mut self,
        index: &ElementIndex,
        diagnostics: &mut Diagnostics,
        reference_element: &RawElement,
    ) -> StopArea {
        if !self.exits.is_empty() && self.entrances.is_empty() {
            diagnostics.warning_at("only exits for a station, no entrances", reference_element);
        }
        if !self.entrances.is_empty() && self.exits.is_empty() {
            diagnostics.warning_at("no exits for a station", reference_element);
        }

        for el in self.get_elements() {
            if let Some(c) = index.centroid(el) {
                self.centers.insert(el, c);
            }
        }

        let members: Vec<TypedId> = self
            .stops
            .iter()
            .chain(self.platforms.iter())
            .copied()
            .collect();
        if members.is_empty() {
            self.center = self.centers.get(&self.station).copied().unwrap_or(self.center);
        } else {
            let coords: Vec<Coord> = members
                .iter()
                .filter_map(|m| self.centers.get(m).copied())
                .collect();
            if let Some(mean) = mean(&coords) {
                self.center = mean;
            }
        }
        self
    }

    fn explicit(
        station: &Station,
        relation: &RawElement,
        index: &ElementIndex,
        modes: &HashSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> StopArea {
        let mut stop_area = StopArea {
            id: relation.id,
            station: station.id,
            stops: HashSet::new(),
            platforms: HashSet::new(),
            entrances: HashSet::new(),
            exits: HashSet::new(),
            center: station.center,
            centers: HashMap::new(),
            modes: station.modes.clone(),
            name: relation.tag("name").unwrap_or(&station.name).to_string(),
            int_name: relation
                .tag("int_name")
                .or_else(|| relation.tag("name:en"))
                .map(str::to_string)
                .or_else(|| station.int_name.clone()),
            colour: station.colour,
            transfer: None,
        };

        match normalize_colour(relation.tag("colour")) {
            Ok(Some(c)) => stop_area.colour = Some(c),
            Ok(None) => {}
            Err(e) => diagnostics.warning_at(e, relation),
        }

        let mut tracks_detected = false;
        if let Some(members) = &relation.members {
            for member in members {
                let el = match index.get(member.id) {
                    Some(el) => el,
                    None => continue,
                };
                if Station::is_station(el, modes) {
                    if el.id != station.id {
                        diagnostics.error_at("stop area has multiple stations", relation);
                    }
                } else if classify::is_stop(el) {
                    stop_area.stops.insert(el.id);
                } else if classify::is_platform(el) {
                    stop_area.platforms.insert(el.id);
                } else if classify::is_entrance(el) {
                    if el.id.kind != ElementKind::Node {
                        diagnostics.warning_at("entrance is not a node", el);
                    }
                    let entrance_tag = el.tag("entrance");
                    if entrance_tag != Some("exit") && member.role != "exit_only" {
                        stop_area.entrances.insert(el.id);
                    }
                    if entrance_tag != Some("entrance") && member.role != "entry_only" {
                        stop_area.exits.insert(el.id);
                    }
                } else if classify::is_track(el) {
                    tracks_detected = true;
                }
            }
        }
        if tracks_detected {
            diagnostics.warning_at("tracks in a stop_area relation", relation);
        }

        stop_area.finish(index, diagnostics, relation)
    }

    fn implicit(
        station: &Station,
        index: &ElementIndex,
        occupied_entrances: &HashSet<TypedId>,
        diagnostics: &mut Diagnostics,
    ) -> StopArea {
        let mut stop_area = StopArea {
            id: station.id,
            station: station.id,
            stops: HashSet::new(),
            platforms: HashSet::new(),
            entrances: HashSet::new(),
            exits: HashSet::new(),
            center: station.center,
            centers: HashMap::new(),
            modes: station.modes.clone(),
            name: station.name.clone(),
            int_name: station.int_name.clone(),
            colour: station.colour,
            transfer: None,
        };

        for el in index.iter() {
            if !classify::is_entrance(el) || occupied_entrances.contains(&el.id) {
                continue;
            }
            let center = match index.centroid(el.id) {
                Some(c) => c,
                None => continue,
            };
            if geo_utils::distance(station.center, center) > MAX_DISTANCE_TO_ENTRANCES {
                continue;
            }
            if el.id.kind != ElementKind::Node {
                diagnostics.warning_at("entrance is not a node", el);
            }
            let entrance_tag = el.tag("entrance");
            if entrance_tag != Some("exit") {
                stop_area.entrances.insert(el.id);
            }
            if entrance_tag != Some("entrance") {
                stop_area.exits.insert(el.id);
            }
        }

        let reference = index.get(station.id).expect("station element is indexed");
        stop_area.finish(index, diagnostics, reference)
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

/// A set of stop area ids known to be connected by an interchange.
pub type Transfer = HashSet<TypedId>;

/// Resolves stations into stop areas, and stop area groups into transfers,
/// for one city.
#[derive(Debug, Default)]
pub struct StationResolver {
    stations: HashMap<TypedId, Station>,
    stop_areas: HashMap<TypedId, StopArea>,
    /// Every element id belonging to at least one stop area, mapped to the
    /// stop areas it belongs to (open question (b): a station can be
    /// clustered by more than one explicit relation).
    element_membership: HashMap<TypedId, Vec<TypedId>>,
    transfers: Vec<Transfer>,
}

impl StationResolver {
    /// Promotes every station in `index`, clusters them into stop areas, and
    /// resolves `stop_area_group` relations into transfers.
    pub fn build(
        index: &ElementIndex,
        expected_modes: &HashSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> StationResolver {
        let mut resolver = StationResolver::default();
        let mut occupied_entrances: HashSet<TypedId> = HashSet::new();
        let mut stops_and_platforms: HashSet<TypedId> = HashSet::new();

        // First pass: collect every entrance referenced by an explicit
        // stop_area relation so the implicit-clustering pass doesn't
        // double-claim it.
        for el in index.of_kind(ElementKind::Relation) {
            if !classify::is_stop_area(el) {
                continue;
            }
            if let Some(members) = &el.members {
                for member in members {
                    if let Some(m_el) = index.get(member.id) {
                        if classify::is_entrance(m_el) {
                            occupied_entrances.insert(m_el.id);
                        }
                    }
                }
            }
        }

        let mut station_to_relations: HashMap<TypedId, Vec<TypedId>> = HashMap::new();
        for el in index.of_kind(ElementKind::Relation) {
            if !classify::is_stop_area(el) {
                continue;
            }
            if let Some(members) = &el.members {
                for member in members {
                    if let Some(m_el) = index.get(member.id) {
                        if Station::is_station(m_el, expected_modes) {
                            station_to_relations.entry(m_el.id).or_default().push(el.id);
                        }
                    }
                }
            }
        }

        for el in index.iter() {
            if !Station::is_station(el, expected_modes) {
                continue;
            }
            if el.id.kind == ElementKind::Relation && el.tag("type") != Some("multipolygon") {
                diagnostics.warning_at(
                    format!(
                        "a railway station cannot be a relation of type {}",
                        el.tag("type").unwrap_or("")
                    ),
                    el,
                );
                continue;
            }
            let station = match Station::new(el, index, diagnostics) {
                Some(s) => s,
                None => continue,
            };

            let stop_areas: Vec<StopArea> = match station_to_relations.get(&station.id) {
                Some(relations) => relations
                    .iter()
                    .filter_map(|rid| index.get(*rid))
                    .map(|rel| {
                        StopArea::explicit(&station, rel, index, expected_modes, diagnostics)
                    })
                    .collect(),
                None => vec![StopArea::implicit(
                    &station,
                    index,
                    &occupied_entrances,
                    diagnostics,
                )],
            };

            resolver.stations.insert(station.id, station);

            for stop_area in stop_areas {
                if resolver.stop_areas.contains_key(&stop_area.id) {
                    continue;
                }
                for member in stop_area.stops.iter().chain(stop_area.platforms.iter()) {
                    if !stops_and_platforms.insert(*member) {
                        diagnostics.notice(format!(
                            "a stop or a platform {} belongs to multiple stop areas, might be correct",
                            member
                        ));
                    }
                }
                for el_id in stop_area.get_elements() {
                    resolver
                        .element_membership
                        .entry(el_id)
                        .or_default()
                        .push(stop_area.id);
                }
                resolver.stop_areas.insert(stop_area.id, stop_area);
            }
        }

        resolver.resolve_transfers(index, diagnostics);
        resolver
    }

    fn resolve_transfers(&mut self, index: &ElementIndex, diagnostics: &mut Diagnostics) {
        for el in index.of_kind(ElementKind::Relation) {
            if !classify::is_stop_area_group(el) {
                continue;
            }
            let mut transfer: Transfer = HashSet::new();
            if let Some(members) = &el.members {
                for member in members {
                    let m_el = match index.get(member.id) {
                        Some(m_el) => m_el,
                        None => continue,
                    };
                    if !classify::is_stop_area(m_el) {
                        continue;
                    }
                    if let Some(stop_area) = self.stop_areas.get_mut(&m_el.id) {
                        transfer.insert(stop_area.id);
                        if stop_area.transfer.is_some() {
                            diagnostics.warning(format!(
                                "stop area {} belongs to multiple interchanges",
                                stop_area.id
                            ));
                        }
                        stop_area.transfer = Some(el.id);
                    }
                }
            }
            if transfer.len() > 1 {
                tracing::debug!("interchange {} groups {} stop areas", el.id, transfer.len());
                self.transfers.push(transfer);
            }
        }
    }

    /// The promoted station with this id, if any.
    pub fn station(&self, id: TypedId) -> Option<&Station> {
        self.stations.get(&id)
    }

    /// The stop area with this id, if any.
    pub fn stop_area(&self, id: TypedId) -> Option<&StopArea> {
        self.stop_areas.get(&id)
    }

    /// Every stop area clustered for this city.
    pub fn stop_areas(&self) -> impl Iterator<Item = &StopArea> {
        self.stop_areas.values()
    }

    /// Every promoted station for this city.
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// The stop area(s) a given element (station, stop, platform, entrance)
    /// belongs to.
    pub fn stop_areas_for(&self, id: TypedId) -> &[TypedId] {
        self.element_membership
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every interchange (stop-area-group-derived transfer) resolved so far.
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }
}

/// Finds interchanges across city boundaries: a `stop_area_group` may tie
/// together stop areas that ended up assigned to different cities (e.g. a
/// metro station near a border with heavy rail). `known_stop_areas` is the
/// set of every stop area id considered valid across every validated city.
pub fn find_transfers(
    index: &ElementIndex,
    known_stop_areas: &HashSet<TypedId>,
) -> Vec<Transfer> {
    let mut transfers = Vec::new();
    for el in index.of_kind(ElementKind::Relation) {
        if !classify::is_stop_area_group(el) {
            continue;
        }
        let Some(members) = &el.members else {
            continue;
        };
        let transfer: Transfer = members
            .iter()
            .map(|m| m.id)
            .filter(|id| known_stop_areas.contains(id))
            .collect();
        if transfer.len() > 1 {
            transfers.push(transfer);
        }
    }
    transfers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Member;

    fn subway_modes() -> HashSet<String> {
        ["subway".to_string()].into_iter().collect()
    }

    #[test]
    fn implicit_stop_area_collects_nearby_entrances() {
        let mut index = ElementIndex::new();
        index.add(
            RawElement::node(1, Coord::new(0.0, 0.0))
                .with_tags([("railway", "station"), ("subway", "yes"), ("name", "Central")]),
        );
        index.add(
            RawElement::node(2, Coord::new(0.001, 0.0))
                .with_tags([("railway", "subway_entrance")]),
        );

        let mut diagnostics = Diagnostics::new();
        let resolver = StationResolver::build(&index, &subway_modes(), &mut diagnostics);

        assert_eq!(resolver.stations().count(), 1);
        let stop_area = resolver.stop_areas().next().unwrap();
        assert!(stop_area.entrances.contains(&TypedId::node(2)));
        assert!(stop_area.exits.contains(&TypedId::node(2)));
    }

    #[test]
    fn explicit_stop_area_flags_a_second_station_as_an_error() {
        let mut index = ElementIndex::new();
        let station_a = RawElement::node(1, Coord::new(0.0, 0.0))
            .with_tags([("railway", "station"), ("subway", "yes")]);
        let station_b = RawElement::node(2, Coord::new(0.0, 0.0))
            .with_tags([("railway", "station"), ("subway", "yes")]);
        index.add(station_a);
        index.add(station_b);
        index.add(
            RawElement::relation(
                10,
                vec![
                    Member::new(TypedId::node(1), ""),
                    Member::new(TypedId::node(2), ""),
                ],
            )
            .with_tags([("type", "public_transport"), ("public_transport", "stop_area")]),
        );

        let mut diagnostics = Diagnostics::new();
        StationResolver::build(&index, &subway_modes(), &mut diagnostics);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn stop_area_group_with_two_members_becomes_a_transfer() {
        let mut index = ElementIndex::new();
        for (id, lon) in [(1, 0.0), (2, 0.01)] {
            index.add(
                RawElement::node(id, Coord::new(lon, 0.0))
                    .with_tags([("railway", "station"), ("subway", "yes")]),
            );
        }
        index.add(
            RawElement::relation(100, vec![Member::new(TypedId::node(1), "")])
                .with_tags([("type", "public_transport"), ("public_transport", "stop_area")]),
        );
        index.add(
            RawElement::relation(101, vec![Member::new(TypedId::node(2), "")])
                .with_tags([("type", "public_transport"), ("public_transport", "stop_area")]),
        );
        index.add(
            RawElement::relation(
                200,
                vec![
                    Member::new(TypedId::relation(100), ""),
                    Member::new(TypedId::relation(101), ""),
                ],
            )
            .with_tags([
                ("type", "public_transport"),
                ("public_transport", "stop_area_group"),
            ]),
        );

        let mut diagnostics = Diagnostics::new();
        let resolver = StationResolver::build(&index, &subway_modes(), &mut diagnostics);
        assert_eq!(resolver.transfers().len(), 1);
        assert_eq!(resolver.transfers()[0].len(), 2);
    }
}
