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

//! Orchestrating the full pipeline for one city: indexing its elements,
//! resolving stations and stop areas, assembling and grouping routes, and
//! producing a [`ValidationReport`]. Also the module-level, cross-city
//! transfer pass that can join stop area groups split across city
//! boundaries.

use crate::classify;
use crate::config::{CityConfig, ExpectedCounts};
use crate::diagnostics::Diagnostics;
use crate::element::{ElementKind, RawElement, TypedId};
use crate::index::ElementIndex;
use crate::recovery::RecoveryData;
use crate::report::{LineCounts, ValidationReport};
use crate::route::{self, Route};
use crate::route_master::{MasterAggregator, RouteMaster};
use crate::stop_area::{self, StationResolver, Transfer};
use crate::track_geometry;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A station/interchange count found further off its expected value than
/// this fraction is an error; closer misses are tolerated since a city's
/// expected counts are usually hand-maintained and go stale quickly.
pub const ALLOWED_STATIONS_MISMATCH: f64 = 0.02;

/// Same tolerance as [`ALLOWED_STATIONS_MISMATCH`], but wider: interchange
/// counts are harder to keep accurate by hand than station counts.
pub const ALLOWED_TRANSFERS_MISMATCH: f64 = 0.07;

/// A failure that aborts processing of an entire city, as opposed to a
/// [`Diagnostics`] entry, which is recorded and validation continues. The
/// only such condition the engine recognizes: a route relation references a
/// `stop`/`platform`-role member that is missing from the dataset entirely,
/// making it impossible to tell what the route actually serves.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum EngineError {
    /// A route's `stop`/`platform`-role member is missing from the dataset.
    #[error("route {route} references {role} member {id} which is missing from the dataset")]
    MissingMember {
        /// The member's role string as declared on the route.
        role: String,
        /// The missing member's id.
        id: TypedId,
        /// The route relation that references it.
        route: TypedId,
    },
}

/// One city's full validation state: its configuration, indexed elements,
/// accumulated diagnostics, and (once [`validate`](Self::validate) has run)
/// its resolved stations, assembled route masters and interchanges.
#[derive(Debug)]
pub struct City {
    /// This city's parsed configuration.
    pub config: CityConfig,
    index: ElementIndex,
    diagnostics: Diagnostics,
    route_masters: HashMap<TypedId, TypedId>,
    resolver: Option<StationResolver>,
    masters: Vec<RouteMaster>,
    transfers: Vec<Transfer>,
    report: Option<ValidationReport>,
}

impl City {
    /// Builds an empty city from its configuration; elements are added with
    /// [`add`](Self::add) before calling [`validate`](Self::validate).
    pub fn new(config: CityConfig) -> City {
        City {
            config,
            index: ElementIndex::new(),
            diagnostics: Diagnostics::new(),
            route_masters: HashMap::new(),
            resolver: None,
            masters: Vec::new(),
            transfers: Vec::new(),
            report: None,
        }
    }

    /// Indexes one more element, additionally recording `route_master`
    /// membership so a route referenced by two different masters can be
    /// flagged. Returns `false`, as [`ElementIndex::add`] does, if an
    /// element with the same id was already indexed.
    pub fn add(&mut self, element: RawElement) -> bool {
        if classify::is_route_master(&element) {
            for member in element.members.iter().flatten() {
                if member.id.kind != ElementKind::Relation {
                    continue;
                }
                match self.route_masters.get(&member.id) {
                    Some(existing) if *existing != element.id => {
                        self.diagnostics.error_at(
                            format!("route {} is a part of more than one route_master", member.id),
                            &element,
                        );
                    }
                    _ => {
                        self.route_masters.insert(member.id, element.id);
                    }
                }
            }
        }
        self.index.add(element)
    }

    /// The accumulated diagnostics so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Whether this city validated without recording any error-severity
    /// diagnostic. `false` before [`validate`](Self::validate) has run.
    pub fn is_good(&self) -> bool {
        self.report.is_some() && !self.diagnostics.has_errors()
    }

    /// The produced report, once [`validate`](Self::validate) has run.
    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    /// Every stop area id resolved for this city, for cross-city transfer
    /// detection; empty before [`validate`](Self::validate) has run.
    pub fn stop_areas(&self) -> impl Iterator<Item = TypedId> + '_ {
        self.resolver
            .iter()
            .flat_map(|resolver| resolver.stop_areas().map(|sa| sa.id))
    }

    /// Runs the full pipeline: station/stop-area resolution, route assembly
    /// and grouping, interchange filtering, and count validation. `recovery`
    /// supplies previously-known-good itineraries used to re-sort routes
    /// whose member order can't otherwise be trusted; `used_entrances` is the
    /// cross-city set of entrance ids found to belong to a resolved station,
    /// appended to (never read) so a later city sharing the dataset can tell
    /// a shared entrance was already accounted for.
    ///
    /// Returns `Err` only for the fatal [`EngineError`] condition, which
    /// aborts this city's validation entirely; every other problem is
    /// recorded in its diagnostics and processing continues.
    pub fn validate(
        &mut self,
        recovery: &RecoveryData,
        used_entrances: &mut HashSet<TypedId>,
    ) -> Result<(), EngineError> {
        tracing::info!(
            "validating \"{}\": {} indexed elements",
            self.config.name,
            self.index.len()
        );

        let resolver = StationResolver::build(&self.index, &self.config.modes, &mut self.diagnostics);
        tracing::debug!(
            "\"{}\": resolved {} stations into {} stop areas, {} transfers",
            self.config.name,
            resolver.stations().count(),
            resolver.stop_areas().count(),
            resolver.transfers().len()
        );

        let mut aggregator = MasterAggregator::new();
        let route_relations: Vec<&RawElement> = self
            .index
            .of_kind(ElementKind::Relation)
            .filter(|el| route::is_route(el, &self.config.modes))
            .filter(|el| !classify::is_access_restricted(el))
            .collect();

        for relation in route_relations {
            let master_id = self.route_masters.get(&relation.id).copied();
            let master_el = master_id.and_then(|id| self.index.get(id));

            if !self.config.networks.is_empty() {
                let network = route::get_network(relation);
                let master_network = master_el.and_then(route::get_network);
                let in_scope = network.map(|n| self.config.networks.contains(n)).unwrap_or(false)
                    || master_network.map(|n| self.config.networks.contains(n)).unwrap_or(false);
                if !in_scope {
                    continue;
                }
            }

            let mut built = match Route::new(
                relation,
                master_el,
                &self.index,
                &resolver,
                &self.config.modes,
                &mut self.diagnostics,
            ) {
                Ok(route) => route,
                Err(e) => {
                    tracing::warn!("aborting \"{}\": {}", self.config.name, e);
                    return Err(e);
                }
            };

            if built.stops.is_empty() {
                self.diagnostics.warning_at("route has no stops", relation);
                continue;
            }
            if built.stops.len() == 1 {
                self.diagnostics.warning_at("route has only one stop", relation);
                continue;
            }

            track_geometry::reconstruct(&mut built, relation, &self.index, &resolver, recovery, &mut self.diagnostics);
            tracing::debug!(
                "route {} (\"{}\"): {} stops, {} track points",
                built.id,
                built.ref_.as_deref().unwrap_or(""),
                built.stops.len(),
                built.tracks.len()
            );
            aggregator.add(built, relation, master_el, &mut self.diagnostics);
        }

        let masters = aggregator.finish();
        tracing::debug!("\"{}\": aggregated {} route masters", self.config.name, masters.len());

        let mut own_stopareas: HashSet<TypedId> = HashSet::new();
        let mut unused_stations: HashSet<TypedId> = resolver.stations().map(|s| s.id).collect();
        let mut found_stations: i64 = 0;

        for master in &masters {
            if !self.config.overground {
                master.check_return_routes(&self.index, &resolver, &mut self.diagnostics);
            }

            let mut route_stations: HashSet<TypedId> = HashSet::new();
            for r in &master.routes {
                for stop in &r.stops {
                    own_stopareas.insert(stop.stoparea);
                    if let Some(sa) = resolver.stop_area(stop.stoparea) {
                        route_stations.insert(sa.transfer.unwrap_or(sa.id));
                        unused_stations.remove(&sa.station);
                    }
                }
            }
            found_stations += route_stations.len() as i64;
        }

        if !unused_stations.is_empty() {
            self.diagnostics.notice(format!(
                "{} stations are not served by any route: {}",
                unused_stations.len(),
                format_elid_list(unused_stations.iter().copied())
            ));
        }

        let transfers: Vec<Transfer> = resolver
            .transfers()
            .iter()
            .map(|transfer| transfer.intersection(&own_stopareas).copied().collect::<Transfer>())
            .filter(|transfer| transfer.len() > 1)
            .collect();
        let found_transfers = transfers.len() as i64;

        let (unused_entrance_count, _not_in_stop_area_count) =
            count_unused_entrances(&self.index, &resolver, used_entrances, &mut self.diagnostics);

        let line_counts_by_mode = count_lines_by_mode(&masters);
        let found_networks = masters
            .iter()
            .filter_map(|m| m.network.as_deref())
            .filter(|n| !n.is_empty())
            .collect::<HashSet<_>>()
            .len() as i64;
        let networks_threshold = self.config.networks.len().max(1);
        if found_networks as usize > networks_threshold {
            self.diagnostics.notice(format!(
                "found {} networks, expected at most {}",
                found_networks, networks_threshold
            ));
        }

        let lines = match self.config.expected {
            ExpectedCounts::Rapid {
                num_stations,
                num_lines,
                num_light_lines,
                num_interchanges,
            } => {
                let found_subway = *line_counts_by_mode.get("subway").unwrap_or(&0) as i64;
                let found_light_rail = *line_counts_by_mode.get("light_rail").unwrap_or(&0) as i64;

                validate_exact_count("subway lines", found_subway, num_lines, &mut self.diagnostics);
                validate_exact_count("light rail lines", found_light_rail, num_light_lines, &mut self.diagnostics);
                validate_with_tolerance(
                    "stations",
                    found_stations,
                    num_stations,
                    ALLOWED_STATIONS_MISMATCH,
                    &mut self.diagnostics,
                );
                validate_with_tolerance(
                    "interchanges",
                    found_transfers,
                    num_interchanges,
                    ALLOWED_TRANSFERS_MISMATCH,
                    &mut self.diagnostics,
                );

                LineCounts::Rapid {
                    subway_lines_expected: num_lines,
                    subway_lines_found: found_subway,
                    light_rail_lines_expected: num_light_lines,
                    light_rail_lines_found: found_light_rail,
                    interchanges_expected: num_interchanges,
                }
            }
            ExpectedCounts::Overground {
                num_tram_lines,
                num_bus_lines,
                num_trolleybus_lines,
                num_other_lines,
            } => {
                let found_tram = *line_counts_by_mode.get("tram").unwrap_or(&0) as i64;
                let found_bus = *line_counts_by_mode.get("bus").unwrap_or(&0) as i64;
                let found_trolleybus = *line_counts_by_mode.get("trolleybus").unwrap_or(&0) as i64;
                let found_other: i64 = line_counts_by_mode
                    .iter()
                    .filter(|(mode, _)| !matches!(mode.as_str(), "tram" | "bus" | "trolleybus"))
                    .map(|(_, count)| *count as i64)
                    .sum();

                validate_tram_lines(found_tram, num_tram_lines, &mut self.diagnostics);
                validate_exact_count("bus lines", found_bus, num_bus_lines, &mut self.diagnostics);
                validate_exact_count("trolleybus lines", found_trolleybus, num_trolleybus_lines, &mut self.diagnostics);
                validate_exact_count("other overground lines", found_other, num_other_lines, &mut self.diagnostics);

                LineCounts::Overground {
                    tram_lines_expected: num_tram_lines,
                    tram_lines_found: found_tram,
                    bus_lines_expected: num_bus_lines,
                    bus_lines_found: found_bus,
                    trolleybus_lines_expected: num_trolleybus_lines,
                    trolleybus_lines_found: found_trolleybus,
                    other_lines_expected: num_other_lines,
                    other_lines_found: found_other,
                }
            }
        };

        let stations_expected = match self.config.expected {
            ExpectedCounts::Rapid { num_stations, .. } => num_stations,
            ExpectedCounts::Overground { .. } => 0,
        };

        self.report = Some(ValidationReport {
            name: self.config.name.clone(),
            country: self.config.country.clone(),
            continent: self.config.continent.clone(),
            stations_found: found_stations,
            stations_expected,
            transfers_found: found_transfers,
            unused_entrances: unused_entrance_count as i64,
            networks_found: found_networks,
            lines,
            is_good: !self.diagnostics.has_errors(),
            notices: self.diagnostics.notices().to_vec(),
            warnings: self.diagnostics.warnings().to_vec(),
            errors: self.diagnostics.errors().to_vec(),
        });

        tracing::info!(
            "\"{}\": {} stations, {} interchanges, {} notices, {} warnings, {} errors",
            self.config.name,
            found_stations,
            found_transfers,
            self.diagnostics.notices().len(),
            self.diagnostics.warnings().len(),
            self.diagnostics.errors().len()
        );

        self.resolver = Some(resolver);
        self.masters = masters;
        self.transfers = transfers;
        Ok(())
    }
}

fn count_lines_by_mode(masters: &[RouteMaster]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for master in masters {
        if let Some(mode) = &master.mode {
            *counts.entry(mode.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Counts entrances unreferenced by any route: `unused` have neither a
/// resolved stop area nor a raw `stop_area` relation membership;
/// `not_in_stop_area` lack the latter regardless of the former. Every
/// entrance found to belong to a resolved stop area is added to
/// `used_entrances`, the cross-city bookkeeping set.
fn count_unused_entrances(
    index: &ElementIndex,
    resolver: &StationResolver,
    used_entrances: &mut HashSet<TypedId>,
    diagnostics: &mut Diagnostics,
) -> (usize, usize) {
    let mut stop_area_members: HashSet<TypedId> = HashSet::new();
    for relation in index.of_kind(ElementKind::Relation) {
        if !classify::is_stop_area(relation) {
            continue;
        }
        for member in relation.members.iter().flatten() {
            stop_area_members.insert(member.id);
        }
    }

    let mut unused_ids: Vec<TypedId> = Vec::new();
    let mut not_in_stop_area_ids: Vec<TypedId> = Vec::new();
    for el in index.iter() {
        if !classify::is_entrance(el) {
            continue;
        }
        let resolved = !resolver.stop_areas_for(el.id).is_empty();
        if resolved {
            used_entrances.insert(el.id);
        }
        if !stop_area_members.contains(&el.id) {
            not_in_stop_area_ids.push(el.id);
            if !resolved {
                unused_ids.push(el.id);
            }
        }
    }
    let (unused, not_in_stop_area) = (unused_ids.len(), not_in_stop_area_ids.len());

    if not_in_stop_area > 0 {
        diagnostics.notice(format!(
            "{} entrances do not belong to any stop_area relation: {}",
            not_in_stop_area,
            format_elid_list(not_in_stop_area_ids)
        ));
    }
    if unused > 0 {
        diagnostics.notice(format!(
            "{} entrances are not used in any stop area or route: {}",
            unused,
            format_elid_list(unused_ids)
        ));
    }
    (unused, not_in_stop_area)
}

/// Formats a capped, sorted, comma-joined list of element ids for a
/// diagnostic message: at most the first 20 (by [`TypedId`]'s `Ord`),
/// suffixed with `", ..."` if more were dropped.
fn format_elid_list(ids: impl IntoIterator<Item = TypedId>) -> String {
    let mut sorted: Vec<TypedId> = ids.into_iter().collect();
    sorted.sort_unstable();
    let capped: Vec<String> = sorted.iter().take(20).map(TypedId::to_string).collect();
    let mut msg = capped.join(", ");
    if sorted.len() > 20 {
        msg.push_str(", ...");
    }
    msg
}

fn validate_exact_count(label: &str, found: i64, expected: i64, diagnostics: &mut Diagnostics) {
    if expected > 0 && found != expected {
        diagnostics.error(format!("found {} {}, expected {}", found, label, expected));
    }
}

fn validate_tram_lines(found: i64, expected: i64, diagnostics: &mut Diagnostics) {
    if expected <= 0 {
        return;
    }
    if found == 0 {
        diagnostics.error(format!("found no tram lines, expected {}", expected));
    } else if found != expected {
        diagnostics.notice(format!("found {} tram lines, expected {}", found, expected));
    }
}

fn validate_with_tolerance(label: &str, found: i64, expected: i64, tolerance: f64, diagnostics: &mut Diagnostics) {
    if expected <= 0 {
        return;
    }
    let diff = (found - expected).unsigned_abs() as f64;
    if diff / expected as f64 > tolerance {
        diagnostics.error(format!("found {} {}, expected {}", found, label, expected));
    }
}

/// Builds, indexes and validates a city from a flat collection of elements,
/// in one call.
pub fn validate_city(
    config: CityConfig,
    elements: impl IntoIterator<Item = RawElement>,
    recovery: &RecoveryData,
    used_entrances: &mut HashSet<TypedId>,
) -> Result<City, EngineError> {
    let mut city = City::new(config);
    for element in elements {
        city.add(element);
    }
    city.validate(recovery, used_entrances)?;
    Ok(city)
}

/// Finds interchanges spanning more than one validated city: a
/// `stop_area_group` relation might tie together stop areas that ended up
/// resolved by different cities sharing the same dataset (e.g. a station
/// near a shared border). Only stop areas belonging to a city that
/// validated cleanly ([`City::is_good`]) are considered.
pub fn find_transfers(index: &ElementIndex, cities: &[City]) -> Vec<Transfer> {
    let known_stop_areas: HashSet<TypedId> = cities
        .iter()
        .filter(|city| city.is_good())
        .flat_map(|city| city.stop_areas())
        .collect();
    stop_area::find_transfers(index, &known_stop_areas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawCityFields;
    use crate::element::Member;
    use crate::geo_utils::Coord;
    use pretty_assertions::assert_eq;

    fn rapid_config() -> CityConfig {
        let mut diagnostics = Diagnostics::new();
        CityConfig::parse(
            RawCityFields {
                id: "1",
                name: "Testopolis",
                country: "Testland",
                continent: "Testamerica",
                bbox: "",
                networks: "",
                overground: false,
                num_stations: "2",
                num_lines: "1",
                num_light_lines: "",
                num_interchanges: "",
                ..Default::default()
            },
            &mut diagnostics,
        )
    }

    fn station(id: i64, lon: f64, name: &str) -> RawElement {
        RawElement::node(id, Coord::new(lon, 0.0))
            .with_tags([("railway", "station"), ("subway", "yes"), ("name", name)])
    }

    fn two_stop_route(relation_id: i64, ref_: &str) -> RawElement {
        RawElement::relation(
            relation_id,
            vec![Member::new(TypedId::node(1), "stop"), Member::new(TypedId::node(2), "stop")],
        )
        .with_tags([("type", "route"), ("route", "subway"), ("ref", ref_), ("colour", "red")])
    }

    #[test]
    fn validates_a_minimal_two_station_route() {
        let elements = vec![station(1, 0.0, "A"), station(2, 0.01, "B"), two_stop_route(10, "1")];
        let recovery = RecoveryData::new();
        let mut used = HashSet::new();
        let city = validate_city(rapid_config(), elements, &recovery, &mut used).unwrap();

        let report = city.report().unwrap();
        assert_eq!(report.stations_found, 2);
        assert!(report.is_good, "errors: {:?}", report.errors);
    }

    #[test]
    fn a_route_in_two_route_masters_is_an_error() {
        let mut elements = vec![station(1, 0.0, "A"), station(2, 0.01, "B"), two_stop_route(10, "1")];
        elements.push(
            RawElement::relation(100, vec![Member::new(TypedId::relation(10), "")])
                .with_tags([("type", "route_master"), ("route_master", "subway")]),
        );
        elements.push(
            RawElement::relation(101, vec![Member::new(TypedId::relation(10), "")])
                .with_tags([("type", "route_master"), ("route_master", "subway")]),
        );

        let recovery = RecoveryData::new();
        let mut used = HashSet::new();
        let city = validate_city(rapid_config(), elements, &recovery, &mut used).unwrap();
        assert!(city.diagnostics().has_errors());
    }

    #[test]
    fn a_route_with_a_missing_stop_member_aborts_the_city() {
        let mut route = two_stop_route(10, "1");
        route.members.as_mut().unwrap().push(Member::new(TypedId::node(999), "stop"));
        let elements = vec![station(1, 0.0, "A"), station(2, 0.01, "B"), route];

        let recovery = RecoveryData::new();
        let mut used = HashSet::new();
        let result = validate_city(rapid_config(), elements, &recovery, &mut used);
        assert!(matches!(result, Err(EngineError::MissingMember { .. })));
    }

    #[test]
    fn an_entrance_far_from_any_station_is_unused() {
        let mut elements = vec![station(1, 0.0, "A"), station(2, 0.01, "B"), two_stop_route(10, "1")];
        elements.push(
            RawElement::node(3, Coord::new(5.0, 5.0)).with_tags([("railway", "subway_entrance")]),
        );

        let recovery = RecoveryData::new();
        let mut used = HashSet::new();
        let city = validate_city(rapid_config(), elements, &recovery, &mut used).unwrap();
        let report = city.report().unwrap();
        assert_eq!(report.unused_entrances, 1);
    }

    #[test]
    fn is_good_is_false_before_validation() {
        let city = City::new(rapid_config());
        assert!(!city.is_good());
    }

    #[test]
    fn station_unused_by_any_route_is_still_noticed() {
        let elements = vec![station(1, 0.0, "A"), station(2, 0.01, "B"), station(3, 0.02, "C")];
        let recovery = RecoveryData::new();
        let mut used = HashSet::new();
        let city = validate_city(rapid_config(), elements, &recovery, &mut used).unwrap();
        assert!(city.diagnostics().notices().iter().any(|n| n.contains("not served by any route")));
    }
}
