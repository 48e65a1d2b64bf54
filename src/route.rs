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

//! Assembling a route relation's members into an ordered sequence of
//! [`RouteStop`]s, and the tag parsing (colour, interval, opening hours)
//! that goes with a route.

use crate::city::EngineError;
use crate::classify::{self, CONSTRUCTION_KEYS};
use crate::colour::{normalize_colour, Rgb};
use crate::diagnostics::Diagnostics;
use crate::element::{Member, RawElement, TypedId};
use crate::geo_utils::Coord;
use crate::index::ElementIndex;
use crate::station::Station;
use crate::stop_area::StationResolver;
use std::collections::HashSet;

/// How a route member actually functions, independent of its declared role
/// (which can be missing or wrong).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActualRole {
    /// The member is, or stands in for, a stop position.
    Stop,
    /// The member is, or stands in for, a platform.
    Platform,
}

/// What a route member would actually do for routing purposes, regardless
/// of its declared `role`: a stop position, a platform, or (for a bare
/// station) whichever of the two its role string suggests.
pub fn actual_role(el: &RawElement, role: &str, modes: &HashSet<String>) -> Option<ActualRole> {
    if classify::is_stop(el) {
        Some(ActualRole::Stop)
    } else if classify::is_platform(el) {
        Some(ActualRole::Platform)
    } else if Station::is_station(el, modes) {
        if role.contains("platform") {
            Some(ActualRole::Platform)
        } else {
            Some(ActualRole::Stop)
        }
    } else {
        None
    }
}

/// One stop of a route: the stop area it resolves to, the coordinate it
/// stops at (possibly later projected onto the track), and which of a
/// platform's two directions of travel it supports.
#[derive(Clone, Debug)]
pub struct RouteStop {
    /// The stop area this stop belongs to.
    pub stoparea: TypedId,
    /// The stop position, before any projection onto the reconstructed track.
    pub stop: Option<Coord>,
    /// Along-route distance from the first stop, in meters, filled in once
    /// the track geometry has been reconstructed.
    pub distance: f64,
    /// The platform usable to board here, if any.
    pub platform_entry: Option<TypedId>,
    /// The platform usable to alight here, if any.
    pub platform_exit: Option<TypedId>,
    /// Whether a boardable member was found for this stop.
    pub can_enter: bool,
    /// Whether an alightable member was found for this stop.
    pub can_exit: bool,
    /// Along-line arclengths (meters from the track start) of every track
    /// segment within [`MAX_DISTANCE_STOP_TO_LINE`](crate::track_geometry::MAX_DISTANCE_STOP_TO_LINE)
    /// of this stop, filled in by [`track_geometry`](crate::track_geometry).
    pub positions_on_rails: Vec<f64>,
    seen_stop: bool,
    seen_platform_entry: bool,
    seen_platform_exit: bool,
    seen_station: bool,
}

impl RouteStop {
    fn new(stoparea: TypedId) -> Self {
        RouteStop {
            stoparea,
            stop: None,
            distance: 0.0,
            platform_entry: None,
            platform_exit: None,
            can_enter: false,
            can_exit: false,
            positions_on_rails: Vec::new(),
            seen_stop: false,
            seen_platform_entry: false,
            seen_platform_exit: false,
            seen_station: false,
        }
    }

    /// Whether either platform direction has been seen for this stop.
    pub fn seen_platform(&self) -> bool {
        self.seen_platform_entry || self.seen_platform_exit
    }

    /// Folds one more route member into this stop, updating its `stop`
    /// coordinate and entry/exit capability, and flagging duplicate roles.
    fn add(
        &mut self,
        member: &Member,
        relation: &RawElement,
        el: &RawElement,
        modes: &HashSet<String>,
        diagnostics: &mut Diagnostics,
    ) {
        let role = member.role.as_str();

        if classify::is_stop(el) {
            if role.contains("platform") {
                diagnostics.warning_at("stop position in a platform role in a route", el);
            }
            self.stop = el.coord;
            if !role.contains("entry_only") {
                self.can_exit = true;
            }
            if !role.contains("exit_only") {
                self.can_enter = true;
            }
        } else if Station::is_station(el, modes) {
            if !self.seen_stop && !self.seen_platform() {
                self.stop = el.coord;
                self.can_enter = true;
                self.can_exit = true;
            }
        } else if classify::is_platform(el) {
            if role.contains("stop") {
                diagnostics.warning_at("platform in a stop role in a route", el);
            }
            if !role.contains("exit_only") {
                self.platform_entry = Some(el.id);
                self.can_enter = true;
            }
            if !role.contains("entry_only") {
                self.platform_exit = Some(el.id);
                self.can_exit = true;
            }
            if !self.seen_stop {
                self.stop = el.coord;
            }
        }

        let mut multiple_check = false;
        match actual_role(el, role, modes) {
            Some(ActualRole::Platform) => {
                if role == "platform_entry_only" {
                    multiple_check = self.seen_platform_entry;
                    self.seen_platform_entry = true;
                } else if role == "platform_exit_only" {
                    multiple_check = self.seen_platform_exit;
                    self.seen_platform_exit = true;
                } else {
                    if role != "platform" && !role.contains("stop") {
                        diagnostics.warning_at(
                            format!(
                                "platform \"{}\" ({}) with invalid role \"{}\" in route",
                                el.tag("name").unwrap_or(""),
                                el.id,
                                role
                            ),
                            relation,
                        );
                    }
                    multiple_check = self.seen_platform();
                    self.seen_platform_entry = true;
                    self.seen_platform_exit = true;
                }
            }
            Some(ActualRole::Stop) => {
                multiple_check = self.seen_stop;
                self.seen_stop = true;
            }
            None => {}
        }
        if multiple_check {
            let role_name = match actual_role(el, role, modes) {
                Some(ActualRole::Stop) => "stop",
                _ => "platform",
            };
            let message = format!(
                "multiple {}s for a station \"{}\" ({}) in a route relation",
                role_name,
                el.tag("name").unwrap_or(""),
                el.id
            );
            if role_name == "stop" {
                diagnostics.error_at(message, relation);
            } else {
                diagnostics.notice_at(message, relation);
            }
        }
        if Station::is_station(el, modes) {
            self.seen_station = true;
        }
    }
}

/// Parses an OSM `opening_hours` value for its first `HH:MM-HH:MM`
/// substring, used as a rough proxy for a route's service window. Anything
/// more elaborate in the grammar (weekday selectors, exceptions, multiple
/// ranges) is intentionally not modeled.
pub fn get_start_end_times(opening_hours: &str) -> (Option<(u32, u32)>, Option<(u32, u32)>) {
    let digits = |s: &str| s.parse::<u32>().ok();
    let bytes = opening_hours.as_bytes();
    for start in 0..bytes.len() {
        let rest = &opening_hours[start..];
        if let Some(caps) = parse_time_range(rest) {
            return (Some((caps.0, caps.1)), Some((caps.2, caps.3)));
        }
    }
    (None, None)
}

fn parse_time_range(s: &str) -> Option<(u32, u32, u32, u32)> {
    // Matches a leading "HH:MM-HH:MM".
    let parts: Vec<&str> = s.splitn(2, '-').collect();
    if parts.len() != 2 {
        return None;
    }
    let (h1, m1) = split_hhmm(parts[0])?;
    // Only the leading "HH:MM" of the second half matters; anything after
    // (a day range, a comment) is ignored.
    let second = parts[1].get(0..5)?;
    let (h2, m2) = split_hhmm(second)?;
    Some((h1, m1, h2, m2))
}

fn split_hhmm(s: &str) -> Option<(u32, u32)> {
    if s.len() < 5 {
        return None;
    }
    let h = s.get(0..2)?.parse::<u32>().ok()?;
    if s.as_bytes().get(2) != Some(&b':') {
        return None;
    }
    let m = s.get(3..5)?.parse::<u32>().ok()?;
    Some((h, m))
}

/// Converts an OSM `interval`/`headway` value (`HH:MM:SS`, `HH:MM`, `MM` or
/// `M`) to a number of seconds. Returns `None` for anything that doesn't
/// parse as 1-3 colon-separated integers.
pub fn osm_interval_to_seconds(interval: &str) -> Option<u32> {
    let parts: Vec<&str> = interval.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m] => (0, m.parse::<u32>().ok()?, 0),
        [h, m] => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?, 0),
        [h, m, s] => (
            h.parse::<u32>().ok()?,
            m.parse::<u32>().ok()?,
            s.parse::<u32>().ok()?,
        ),
        _ => return None,
    };
    Some(seconds + 60 * minutes + 60 * 60 * hours)
}

/// Reads the `interval`/`headway` tag (or any `interval:*`/`headway:*`
/// variant), preferring an exact match.
pub fn get_interval(tags: &RawElement) -> Option<u32> {
    for key in ["interval", "headway"] {
        if let Some(v) = tags.tag(key) {
            return osm_interval_to_seconds(v);
        }
        if let Some((_, v)) = tags
            .tags
            .iter()
            .find(|(k, _)| k.starts_with(&format!("{}:", key)))
        {
            return osm_interval_to_seconds(v);
        }
    }
    None
}

/// Reads the network a route belongs to, preferring `network:metro` over
/// `network` over `operator`.
pub fn get_network(el: &RawElement) -> Option<&str> {
    ["network:metro", "network", "operator"]
        .iter()
        .find_map(|k| el.tag(k))
}

/// Whether `element` is a route relation with the ref/name needed to be
/// usable, a recognized mode, and not under construction.
pub fn is_route(element: &RawElement, modes: &HashSet<String>) -> bool {
    if !classify::is_route(element) {
        return false;
    }
    if element.members.is_none() {
        return false;
    }
    match element.tag("route") {
        Some(mode) if modes.contains(mode) => {}
        _ => return false,
    }
    if CONSTRUCTION_KEYS.iter().any(|k| element.tags.contains_key(*k)) {
        return false;
    }
    element.tag("ref").is_some() || element.tag("name").is_some()
}

/// One route: the longest ordered itinerary the engine assembles for a
/// single relation with a given ref, before twin-route pairing groups it
/// with others under a [`RouteMaster`](crate::route_master::RouteMaster).
#[derive(Clone, Debug)]
pub struct Route {
    /// The backing relation's id.
    pub id: TypedId,
    /// The route's ref (line number/code), if any.
    pub ref_: Option<String>,
    /// The route's own name, if any.
    pub name: Option<String>,
    /// The transport mode (`subway`, `tram`, ...).
    pub mode: String,
    /// Normalized line colour.
    pub colour: Option<Rgb>,
    /// Normalized infill colour.
    pub infill: Option<Rgb>,
    /// The network this route belongs to.
    pub network: Option<String>,
    /// Service interval in seconds, if tagged.
    pub interval: Option<u32>,
    /// Service start time, from `opening_hours`.
    pub start_time: Option<(u32, u32)>,
    /// Service end time, from `opening_hours`.
    pub end_time: Option<(u32, u32)>,
    /// Whether the route returns to its starting stop.
    pub is_circular: bool,
    /// The assembled, ordered stops.
    pub stops: Vec<RouteStop>,
    /// Track way element ids referenced by the route relation, in member
    /// order, used by [`track_geometry`](crate::track_geometry).
    pub track_members: Vec<(TypedId, String)>,
    /// The longest contiguous track polyline reconstructed for this route.
    /// Empty until [`track_geometry::reconstruct`](crate::track_geometry::reconstruct) runs.
    pub tracks: Vec<Coord>,
    /// Index into `stops` of the first stop lying on (or near) `tracks`.
    pub first_stop_on_rails_index: Option<usize>,
    /// Index into `stops` of the last stop lying on (or near) `tracks`.
    pub last_stop_on_rails_index: Option<usize>,
}

impl Route {
    /// Parses the route relation's tags (falling back to the master route's
    /// tags when the route's own are absent) and assembles its stops.
    /// Returns `Err` only for the one fatal condition: a route member whose
    /// `stop`/`platform` role element is missing from the dataset entirely.
    pub fn new(
        relation: &RawElement,
        master: Option<&RawElement>,
        index: &ElementIndex,
        resolver: &StationResolver,
        modes: &HashSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Route, EngineError> {
        let master_tag = |key: &str| master.and_then(|m| m.tag(key));

        if relation.tag("ref").is_none() && master_tag("ref").is_none() {
            diagnostics.notice_at("missing ref on a route", relation);
        }
        let ref_ = relation
            .tag("ref")
            .or_else(|| master.and_then(|m| m.tag("ref")))
            .or_else(|| relation.tag("name"))
            .map(str::to_string);
        let name = relation.tag("name").map(str::to_string);
        let mode = relation.tag("route").unwrap_or_default().to_string();

        if relation.tag("colour").is_none() && master_tag("colour").is_none() && mode != "tram" {
            diagnostics.notice_at("missing colour on a route", relation);
        }
        let colour_value = relation
            .tag("colour")
            .or_else(|| master.and_then(|m| m.tag("colour")));
        let colour = match normalize_colour(colour_value) {
            Ok(c) => c,
            Err(e) => {
                diagnostics.warning_at(e, relation);
                None
            }
        };
        let infill_value = relation
            .tag("colour:infill")
            .or_else(|| master.and_then(|m| m.tag("colour:infill")));
        let infill = match normalize_colour(infill_value) {
            Ok(c) => c,
            Err(e) => {
                diagnostics.warning_at(e, relation);
                None
            }
        };

        let network = get_network(relation)
            .or_else(|| master.and_then(get_network))
            .map(str::to_string);
        let interval = get_interval(relation).or_else(|| master.and_then(get_interval));
        let opening_hours = relation
            .tag("opening_hours")
            .or_else(|| master.and_then(|m| m.tag("opening_hours")))
            .unwrap_or("");
        let (start_time, end_time) = get_start_end_times(opening_hours);

        if relation.tag("public_transport:version") == Some("1") {
            diagnostics.warning_at(
                "public transport version is 1, which means the route is an unsorted pile of objects",
                relation,
            );
        }

        let mut route = Route {
            id: relation.id,
            ref_,
            name,
            mode,
            colour,
            infill,
            network,
            interval,
            start_time,
            end_time,
            is_circular: false,
            stops: Vec::new(),
            track_members: Vec::new(),
            tracks: Vec::new(),
            first_stop_on_rails_index: None,
            last_stop_on_rails_index: None,
        };

        route.process_stop_members(relation, index, resolver, modes, diagnostics)?;
        route.is_circular = route
            .stops
            .first()
            .zip(route.stops.last())
            .map(|(a, b)| route.stops.len() > 1 && a.stoparea == b.stoparea)
            .unwrap_or(false);

        for member in relation.members.as_ref().into_iter().flatten() {
            if let Some(el) = index.get(member.id) {
                if classify::is_track(el) {
                    route.track_members.push((el.id, member.role.clone()));
                }
            }
        }

        Ok(route)
    }

    fn process_stop_members(
        &mut self,
        relation: &RawElement,
        index: &ElementIndex,
        resolver: &StationResolver,
        modes: &HashSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), EngineError> {
        let mut seen_stoparea_ids: HashSet<TypedId> = HashSet::new();
        let mut seen_stops = false;
        let mut seen_platforms = false;
        let mut repeat_pos: Option<usize> = None;

        for member in relation.members.as_ref().into_iter().flatten() {
            if member.role.contains("inactive") {
                continue;
            }

            let stopareas = resolver.stop_areas_for(member.id);
            if !stopareas.is_empty() {
                let stoparea_id = stopareas[0];
                if stopareas.len() > 1 {
                    diagnostics.error_at(
                        "ambiguous station in route. Please use stop_position or split interchange stations",
                        relation,
                    );
                }
                let el = match index.get(member.id) {
                    Some(el) => el,
                    None => continue,
                };
                let role = actual_role(el, &member.role, modes);
                if let Some(role) = role {
                    let role_name = match role {
                        ActualRole::Stop => "stop",
                        ActualRole::Platform => "platform",
                    };
                    if !member.role.is_empty() && !member.role.contains(role_name) {
                        diagnostics.warning_at(
                            format!("wrong role '{}' for {} {}", member.role, role_name, member.id),
                            relation,
                        );
                    }

                    let stop_index = if let Some(pos) = repeat_pos {
                        if pos >= self.stops.len() {
                            continue;
                        }
                        if (matches!(role, ActualRole::Stop) && seen_stops)
                            || (matches!(role, ActualRole::Platform) && seen_platforms)
                        {
                            diagnostics.error_at(
                                format!(
                                    "found an out-of-place {}: \"{}\" ({})",
                                    role_name,
                                    el.tag("name").unwrap_or(""),
                                    member.id
                                ),
                                relation,
                            );
                            continue;
                        }
                        let mut p = pos;
                        while p < self.stops.len() && self.stops[p].stoparea != stoparea_id {
                            p += 1;
                        }
                        if p >= self.stops.len() {
                            diagnostics
                                .error_at(format!("incorrect order of {}s at {}", role_name, member.id), relation);
                            continue;
                        }
                        repeat_pos = Some(p);
                        p
                    } else if self.stops.is_empty() || !seen_stoparea_ids.contains(&stoparea_id) {
                        self.stops.push(RouteStop::new(stoparea_id));
                        seen_stoparea_ids.insert(stoparea_id);
                        self.stops.len() - 1
                    } else if self.stops.last().map(|s| s.stoparea) == Some(stoparea_id) {
                        self.stops.len() - 1
                    } else {
                        let circular = (seen_stops && seen_platforms)
                            || (matches!(role, ActualRole::Stop) && !seen_platforms)
                            || (matches!(role, ActualRole::Platform) && !seen_stops);
                        if circular {
                            self.stops.push(RouteStop::new(stoparea_id));
                            seen_stoparea_ids.insert(stoparea_id);
                            self.stops.len() - 1
                        } else {
                            repeat_pos = Some(0);
                            let mut p = 0;
                            while p < self.stops.len() && self.stops[p].stoparea != stoparea_id {
                                p += 1;
                            }
                            if p >= self.stops.len() {
                                diagnostics.error_at(
                                    format!("incorrect order of {}s at {}", role_name, member.id),
                                    relation,
                                );
                                continue;
                            }
                            repeat_pos = Some(p);
                            p
                        }
                    };

                    self.stops[stop_index].add(member, relation, el, modes, diagnostics);
                    if repeat_pos.is_none() {
                        let stop = &self.stops[stop_index];
                        seen_stops |= stop.seen_stop || stop.seen_station;
                        seen_platforms |= stop.seen_platform();
                    }
                }
                continue;
            }

            let el = match index.get(member.id) {
                Some(el) => el,
                None => {
                    if member.role.contains("stop") || member.role.contains("platform") {
                        return Err(EngineError::MissingMember {
                            role: member.role.clone(),
                            id: member.id,
                            route: relation.id,
                        });
                    }
                    continue;
                }
            };

            if CONSTRUCTION_KEYS.iter().any(|k| el.tags.contains_key(*k)) {
                diagnostics.warning_at(
                    format!(
                        "under construction {} {} in route. Consider setting 'inactive' role or removing construction attributes",
                        if member.role.is_empty() { "feature" } else { &member.role },
                        member.id
                    ),
                    relation,
                );
                continue;
            }

            if Station::is_station(el, modes) {
                // Already excluded by an earlier "multiple stations" error.
            } else if matches!(el.tag("railway"), Some("station") | Some("halt")) {
                diagnostics.error_at(
                    format!("missing station={} on a {}", self.mode, member.role),
                    el,
                );
            } else if let Some(role) = actual_role(el, &member.role, modes) {
                let _ = role;
                diagnostics.error_at(
                    format!("{} {} is not connected to a station in route", member.id, member.role),
                    relation,
                );
            } else if !classify::is_track(el) {
                diagnostics.warning_at(
                    format!("unknown member type for {} in route", member.id),
                    relation,
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn osm_interval_to_seconds_parses_every_supported_format() {
        assert_eq!(osm_interval_to_seconds("5"), Some(300));
        assert_eq!(osm_interval_to_seconds("1:30"), Some(5400));
        assert_eq!(osm_interval_to_seconds("1:00:10"), Some(3610));
        assert_eq!(osm_interval_to_seconds("a:b"), None);
    }

    #[test]
    fn get_start_end_times_extracts_the_first_range() {
        let (start, end) = get_start_end_times("Mo-Fr 06:00-23:30");
        assert_eq!(start, Some((6, 0)));
        assert_eq!(end, Some((23, 30)));
    }

    #[test]
    fn get_start_end_times_is_none_without_a_range() {
        let (start, end) = get_start_end_times("24/7");
        assert_eq!(start, None);
        assert_eq!(end, None);
    }
}
