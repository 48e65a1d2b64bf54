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

//! Reconstructing a route's track polyline from its member ways, projecting
//! its stops onto that line, checking the stops come in a sensible order,
//! and accumulating an along-route distance for each stop.

use crate::diagnostics::Diagnostics;
use crate::element::{RawElement, TypedId};
use crate::geo_utils::{self, Coord, Projection};
use crate::index::ElementIndex;
use crate::recovery::{RecoveryData, DISPLACEMENT_TOLERANCE};
use crate::route::Route;
use crate::stop_area::StationResolver;
use std::collections::HashSet;

/// Stops further than this from the reconstructed track are treated as not
/// lying on it at all.
pub const MAX_DISTANCE_STOP_TO_LINE: f64 = 100.0;

/// Below this angle between three consecutive stops, the middle one is
/// flagged as suspiciously placed (a warning).
pub const ALLOWED_ANGLE_BETWEEN_STOPS: f64 = 45.0;

/// Below this angle, the middle stop's placement is an error rather than a
/// warning.
pub const DISALLOWED_ANGLE_BETWEEN_STOPS: f64 = 20.0;

struct ProjectedStop {
    coords: Option<Coord>,
    positions_on_rails: Vec<f64>,
}

/// Stitches the route's member tracks into the single longest contiguous
/// polyline, projects every stop onto it, checks and (where possible)
/// recovers their order, and fills in each stop's along-route distance.
/// The one-off work a [`Route`] can't do on construction because it needs
/// the whole track geometry pass, not just its own member list.
pub fn reconstruct(
    route: &mut Route,
    relation: &RawElement,
    index: &ElementIndex,
    resolver: &StationResolver,
    recovery: &RecoveryData,
    diagnostics: &mut Diagnostics,
) {
    let (longest, line_nodes) = build_longest_line(route, relation, index, diagnostics);

    for (stop_el, _) in stop_position_elements(route, index) {
        if let Some(id) = node_id_of(stop_el) {
            if !line_nodes.contains(&id) {
                diagnostics.warning_at(
                    format!(
                        "stop position \"{}\" ({}) is not on tracks",
                        stop_el.tag("name").unwrap_or(""),
                        stop_el.id
                    ),
                    relation,
                );
            }
        }
    }

    route.tracks = resolve_track_coords(&longest, index, relation, diagnostics);

    if route.stops.len() <= 1 {
        return;
    }

    if route.is_circular
        && !route.tracks.is_empty()
        && route.tracks.first() != route.tracks.last()
    {
        diagnostics.warning_at("non-closed rail sequence in a circular route", relation);
    }

    let mut projected = project_stops_on_line(route, relation, resolver, diagnostics);
    check_and_recover_stops_order(route, relation, resolver, recovery, &mut projected, diagnostics);
    apply_projected_stops_data(route, &projected);
    calculate_distances(route);
}

fn node_id_of(el: &RawElement) -> Option<i64> {
    match el.id.kind {
        crate::element::ElementKind::Node => Some(el.id.id),
        _ => None,
    }
}

/// The route's stop-position members, used only to check they lie on the
/// reconstructed track.
fn stop_position_elements<'a>(
    route: &Route,
    index: &'a ElementIndex,
) -> Vec<(&'a RawElement, TypedId)> {
    route
        .stops
        .iter()
        .filter_map(|s| index.get(s.stoparea))
        .filter(|el| crate::classify::is_stop(el))
        .map(|el| (el, el.id))
        .collect()
}

fn build_longest_line(
    route: &Route,
    relation: &RawElement,
    index: &ElementIndex,
    diagnostics: &mut Diagnostics,
) -> (Vec<i64>, HashSet<i64>) {
    let mut line_nodes: HashSet<i64> = HashSet::new();
    let mut last_track: Vec<i64> = Vec::new();
    let mut track: Vec<i64> = Vec::new();
    let mut is_first = true;
    let mut warned_about_holes = false;

    for (track_id, role) in &route.track_members {
        let el = match index.get(*track_id) {
            Some(el) => el,
            None => continue,
        };
        let mut nodes = match &el.nodes {
            Some(n) if n.len() >= 2 => n.clone(),
            _ => {
                diagnostics.error_at("cannot find nodes in a railway", el);
                continue;
            }
        };
        if role == "backward" {
            nodes.reverse();
        }
        line_nodes.extend(nodes.iter().copied());

        if track.is_empty() {
            track.extend(nodes.iter().copied());
        } else {
            let new_segment = nodes.clone();
            if new_segment.first() == track.last() {
                track.extend(new_segment[1..].iter().copied());
            } else if new_segment.last() == track.last() {
                track.extend(new_segment[..new_segment.len() - 1].iter().rev().copied());
            } else if is_first
                && (track.first() == new_segment.first() || track.first() == new_segment.last())
            {
                track.reverse();
                if new_segment.first() == track.last() {
                    track.extend(new_segment[1..].iter().copied());
                } else {
                    track.extend(new_segment[..new_segment.len() - 1].iter().rev().copied());
                }
            } else {
                if !warned_about_holes {
                    diagnostics.warning_at(
                        format!("hole in route rails near node {}", track.last().unwrap_or(&0)),
                        relation,
                    );
                    warned_about_holes = true;
                }
                if track.len() > last_track.len() {
                    last_track = std::mem::take(&mut track);
                } else {
                    track.clear();
                }
            }
            is_first = false;
        }
    }
    if track.len() > last_track.len() {
        last_track = track;
    }
    last_track.dedup();
    (last_track, line_nodes)
}

fn resolve_track_coords(
    node_ids: &[i64],
    index: &ElementIndex,
    relation: &RawElement,
    diagnostics: &mut Diagnostics,
) -> Vec<Coord> {
    let coords: Vec<Option<Coord>> = node_ids
        .iter()
        .map(|n| index.get(TypedId::node(*n)).and_then(|e| e.coord))
        .collect();
    if coords.iter().any(Option::is_none) {
        if let Some(missing) = node_ids
            .iter()
            .zip(&coords)
            .find(|(_, c)| c.is_none())
            .map(|(n, _)| n)
        {
            diagnostics.warning_at(
                format!("the dataset is missing the railway tracks node {}", missing),
                relation,
            );
        }
        return Vec::new();
    }
    coords.into_iter().flatten().collect()
}

fn get_stop_projections(route: &Route) -> Vec<Projection> {
    route
        .stops
        .iter()
        .map(|s| match s.stop {
            Some(coord) => geo_utils::project_on_line(coord, &route.tracks, MAX_DISTANCE_STOP_TO_LINE),
            None => Projection::default(),
        })
        .collect()
}

fn stop_near_tracks(route: &Route, projections: &[Projection], i: usize) -> bool {
    match (route.stops[i].stop, &projections[i].projected_point) {
        (Some(stop), Some(projected)) => geo_utils::distance(stop, *projected) <= MAX_DISTANCE_STOP_TO_LINE,
        _ => false,
    }
}

/// The working state of a route's stop-to-track projection, reused as
/// `check_stops_order_on_tracks` may need to recompute it after reversing
/// the track.
struct ProjectedStopsData {
    first: usize,
    last: usize,
    on_longest_line: Vec<(usize, ProjectedStop)>,
}

fn project_stops_on_line(
    route: &mut Route,
    relation: &RawElement,
    resolver: &StationResolver,
    diagnostics: &mut Diagnostics,
) -> ProjectedStopsData {
    let projections = get_stop_projections(route);

    let mut first = 0;
    while first < route.stops.len() && !stop_near_tracks(route, &projections, first) {
        first += 1;
    }
    let mut last = route.stops.len().saturating_sub(1);
    while last > first && !stop_near_tracks(route, &projections, last) {
        last -= 1;
    }

    let mut on_longest_line = Vec::new();
    for i in first..=last.min(route.stops.len().saturating_sub(1)) {
        if i >= route.stops.len() || i < first {
            continue;
        }
        let projection = &projections[i];
        let stop_name = resolver
            .stop_area(route.stops[i].stoparea)
            .and_then(|sa| resolver.station(sa.station))
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        match projection.projected_point {
            None => {
                diagnostics.error_at(
                    format!("stop \"{}\" ({}) is nowhere near the tracks", stop_name, i),
                    relation,
                );
            }
            Some(point) => {
                let distance = route.stops[i].stop.map(|s| geo_utils::distance(s, point));
                let coords = if distance.map(|d| d > MAX_DISTANCE_STOP_TO_LINE).unwrap_or(true) {
                    if let Some(d) = distance {
                        diagnostics.notice_at(
                            format!(
                                "stop \"{}\" ({}) is {:.0} meters from the tracks",
                                stop_name, i, d
                            ),
                            relation,
                        );
                    }
                    None
                } else {
                    Some(point)
                };
                on_longest_line.push((
                    i,
                    ProjectedStop {
                        coords,
                        positions_on_rails: projection.positions_on_line.clone(),
                    },
                ));
            }
        }
    }

    ProjectedStopsData {
        first,
        last,
        on_longest_line,
    }
}

fn check_stops_order_by_angle(route: &Route) -> (Vec<String>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    if route.stops.len() < 3 {
        return (warnings, errors);
    }
    for i in 1..route.stops.len() - 1 {
        let (a, b, c) = (route.stops[i - 1].stop, route.stops[i].stop, route.stops[i + 1].stop);
        let (Some(a), Some(b), Some(c)) = (a, b, c) else {
            continue;
        };
        let angle = geo_utils::angle_between(a, b, c);
        if angle < ALLOWED_ANGLE_BETWEEN_STOPS {
            let msg = format!(
                "angle between stops around stop {} is too narrow, {:.1} degrees",
                i, angle
            );
            if angle < DISALLOWED_ANGLE_BETWEEN_STOPS {
                errors.push(msg);
            } else {
                warnings.push(msg);
            }
        }
    }
    (warnings, errors)
}

fn check_stops_order_on_tracks_direct<'a>(
    route: &Route,
    sequence: impl Iterator<Item = &'a (usize, ProjectedStop)>,
) -> Option<String> {
    let allowed_violations_initial = if route.is_circular { 1 } else { 0 };
    let mut allowed_violations = allowed_violations_initial;
    let mut max_position = -1.0_f64;
    for (stop_index, stop_data) in sequence {
        let positions = &stop_data.positions_on_rails;
        let mut suitable = 0;
        while suitable < positions.len() && positions[suitable] < max_position {
            suitable += 1;
        }
        if suitable == positions.len() {
            if allowed_violations > 0 {
                suitable = suitable.saturating_sub(1);
                allowed_violations -= 1;
            } else {
                return Some(format!(
                    "stops on tracks are unordered near stop {}",
                    stop_index
                ));
            }
        }
        if let Some(p) = positions.get(suitable) {
            max_position = *p;
        }
    }
    None
}

fn check_stops_order_on_tracks(
    route: &mut Route,
    relation: &RawElement,
    resolver: &StationResolver,
    projected: &mut ProjectedStopsData,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let error = check_stops_order_on_tracks_direct(route, projected.on_longest_line.iter());
    if error.is_some() {
        let reversed_error =
            check_stops_order_on_tracks_direct(route, projected.on_longest_line.iter().rev());
        if reversed_error.is_none() {
            diagnostics
                .warning_at("tracks seem to go in the opposite direction to stops", relation);
            tracing::debug!("reversing tracks for route {}", route.id);
            route.tracks.reverse();
            *projected = project_stops_on_line(route, relation, resolver, diagnostics);
            return None;
        }
    }
    error
}

fn check_and_recover_stops_order(
    route: &mut Route,
    relation: &RawElement,
    resolver: &StationResolver,
    recovery: &RecoveryData,
    projected: &mut ProjectedStopsData,
    diagnostics: &mut Diagnostics,
) {
    let (angle_warnings, angle_errors) = check_stops_order_by_angle(route);
    let track_error =
        check_stops_order_on_tracks(route, relation, resolver, projected, diagnostics);

    let mut errors = angle_errors;
    if let Some(msg) = track_error {
        errors.push(msg);
    }
    if angle_warnings.is_empty() && errors.is_empty() {
        return;
    }

    let recovered = try_resort_stops(route, relation, resolver, recovery);
    if recovered {
        for msg in &angle_warnings {
            diagnostics.notice_at(msg.clone(), relation);
        }
        for msg in &errors {
            diagnostics.warning_at(format!("fixed with recovery data: {}", msg), relation);
        }
    } else {
        for msg in &angle_warnings {
            diagnostics.notice_at(msg.clone(), relation);
        }
        for msg in &errors {
            diagnostics.error_at(msg.clone(), relation);
        }
    }
}

/// Attempts to re-sort `route.stops` into the order recorded by a matching
/// recovery itinerary. Refuses (returns `false`) whenever the match is
/// ambiguous rather than guessing: a repeated station name, no candidate
/// itinerary with the same station set, more than one candidate unless
/// `from`/`to` disambiguates it down to exactly one.
fn try_resort_stops(
    route: &mut Route,
    relation: &RawElement,
    resolver: &StationResolver,
    recovery: &RecoveryData,
) -> bool {
    let mut by_name: Vec<(String, usize)> = Vec::new();
    for (i, stop) in route.stops.iter().enumerate() {
        let Some(station) = resolver
            .stop_area(stop.stoparea)
            .and_then(|sa| resolver.station(sa.station))
        else {
            return false;
        };
        let name = if station.name == "?" {
            station.int_name.clone().unwrap_or_else(|| station.name.clone())
        } else {
            station.name.clone()
        };
        if by_name.iter().any(|(n, _)| n == &name) {
            return false;
        }
        by_name.push((name, i));
    }

    let itineraries = recovery.itineraries_for(route.colour, route.ref_.as_deref());
    if itineraries.is_empty() {
        return false;
    }

    let mut stop_names: Vec<&str> = by_name.iter().map(|(n, _)| n.as_str()).collect();
    stop_names.sort_unstable();

    let suitable: Vec<&crate::recovery::RecoveryItinerary> = itineraries
        .iter()
        .filter(|itinerary| {
            let mut names: Vec<&str> = itinerary.stations.iter().map(|s| s.name.as_str()).collect();
            names.sort_unstable();
            if names != stop_names {
                return false;
            }
            itinerary.stations.iter().all(|it_stop| {
                by_name
                    .iter()
                    .find(|(n, _)| n == &it_stop.name)
                    .and_then(|(_, i)| resolver.stop_area(route.stops[*i].stoparea))
                    .and_then(|sa| resolver.station(sa.station))
                    .map(|station| {
                        geo_utils::distance(it_stop.center, station.center) <= DISPLACEMENT_TOLERANCE
                    })
                    .unwrap_or(false)
            })
        })
        .collect();

    let chosen = match suitable.len() {
        0 => return false,
        1 => suitable[0],
        _ => {
            let from = relation.tag("from");
            let to = relation.tag("to");
            if from.is_none() && to.is_none() {
                return false;
            }
            let matching: Vec<&crate::recovery::RecoveryItinerary> = suitable
                .into_iter()
                .filter(|it| {
                    (from.is_some() && it.from.as_deref() == from)
                        || (to.is_some() && it.to.as_deref() == to)
                })
                .collect();
            if matching.len() != 1 {
                return false;
            }
            matching[0]
        }
    };

    let mut reordered = Vec::with_capacity(route.stops.len());
    for it_stop in &chosen.stations {
        let Some((_, i)) = by_name.iter().find(|(n, _)| n == &it_stop.name) else {
            return false;
        };
        reordered.push(route.stops[*i].clone());
    }
    route.stops = reordered;
    true
}

fn apply_projected_stops_data(route: &mut Route, projected: &ProjectedStopsData) {
    route.first_stop_on_rails_index = Some(projected.first);
    route.last_stop_on_rails_index = Some(projected.last);
    for (i, stop_data) in &projected.on_longest_line {
        if let Some(stop) = route.stops.get_mut(*i) {
            stop.positions_on_rails = stop_data.positions_on_rails.clone();
            if let Some(coords) = stop_data.coords {
                stop.stop = Some(coords);
            }
        }
    }
}

fn calculate_distances(route: &mut Route) {
    let first = route.first_stop_on_rails_index.unwrap_or(usize::MAX);
    let last = route.last_stop_on_rails_index.unwrap_or(0);
    let mut dist = 0.0_f64;
    let mut vertex = 0;
    for i in 0..route.stops.len() {
        if i > 0 {
            let (Some(prev), Some(cur)) = (route.stops[i - 1].stop, route.stops[i].stop) else {
                route.stops[i].distance = dist;
                continue;
            };
            let direct = geo_utils::distance(prev, cur);
            let on_line = if i >= first && i <= last {
                geo_utils::distance_on_line(prev, cur, &route.tracks, vertex)
            } else {
                None
            };
            match on_line {
                Some((d_line, new_vertex)) if direct - 10.0 <= d_line && d_line <= direct * 2.0 => {
                    vertex = new_vertex;
                    dist += d_line.round();
                }
                _ => dist += direct.round(),
            }
        }
        route.stops[i].distance = dist;
    }
}

/// Extends `route.tracks` with the raw stop coordinates of any leading or
/// trailing stops that didn't land on the reconstructed line, so a caller
/// rendering the route's geometry sees something continuous end to end.
pub fn extended_tracks(route: &Route) -> Vec<Coord> {
    let first = route.first_stop_on_rails_index.unwrap_or(route.stops.len());
    if first >= route.stops.len() {
        return route.stops.iter().filter_map(|s| s.stop).collect();
    }
    let last = route.last_stop_on_rails_index.unwrap_or(0);
    let mut tracks: Vec<Coord> = route
        .stops
        .iter()
        .take(first)
        .filter_map(|s| s.stop)
        .collect();
    tracks.extend(route.tracks.iter().copied());
    tracks.extend(
        route
            .stops
            .iter()
            .skip(last + 1)
            .filter_map(|s| s.stop),
    );
    tracks
}

/// Truncates the leading/trailing segments of `tracks` that extend beyond
/// the route's first and last stop, so the published geometry starts and
/// ends at a real stop rather than running past it.
pub fn truncated_tracks(route: &Route, tracks: &[Coord]) -> Vec<Coord> {
    if route.is_circular || tracks.len() < 2 {
        return tracks.to_vec();
    }
    let mut tracks = tracks.to_vec();

    let first_stop = route.stops.first().and_then(|s| s.stop);
    let last_stop = route.stops.last().and_then(|s| s.stop);

    if let Some(last_stop) = last_stop {
        if let Some((mut seg, u)) = geo_utils::find_segment(last_stop, &tracks) {
            if u == 0.0 && seg > 0 {
                seg -= 1;
            }
            if seg + 2 < tracks.len() {
                tracks.truncate(seg + 2);
            }
            if let Some(last) = tracks.last_mut() {
                *last = last_stop;
            }
        }
    }
    if let Some(first_stop) = first_stop {
        if let Some((mut seg, u)) = geo_utils::find_segment(first_stop, &tracks) {
            if u == 1.0 {
                seg += 1;
            }
            if seg > 0 && seg < tracks.len() {
                tracks.drain(0..seg);
            }
            if let Some(first) = tracks.first_mut() {
                *first = first_stop;
            }
        }
    }
    tracks
}

/// Whether every stop lies on (or near) the reconstructed track, i.e. the
/// projection pass didn't have to drop any leading/trailing stop.
pub fn are_tracks_complete(route: &Route) -> bool {
    route.first_stop_on_rails_index == Some(0)
        && route.last_stop_on_rails_index == Some(route.stops.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Member, RawElement};
    use crate::recovery::RecoveryData;
    use crate::route::Route;
    use crate::stop_area::StationResolver;
    use std::collections::HashSet;

    fn modes() -> HashSet<String> {
        ["subway".to_string()].into_iter().collect()
    }

    fn build_simple_route() -> (ElementIndex, RawElement) {
        let mut index = ElementIndex::new();
        for (id, lon) in [(1, 0.0), (2, 0.01), (3, 0.02)] {
            index.add(
                RawElement::node(id, Coord::new(lon, 0.0))
                    .with_tags([("railway", "station"), ("subway", "yes"), ("name", format!("S{}", id))]),
            );
        }
        for (id, lon) in [(11, 0.0), (12, 0.01), (13, 0.02)] {
            index.add(RawElement::node(id, Coord::new(lon, 0.0)));
        }
        index.add(RawElement::way(100, vec![11, 12, 13]).with_tags([("railway", "subway")]));

        let relation = RawElement::relation(
            1000,
            vec![
                Member::new(TypedId::node(1), "stop"),
                Member::new(TypedId::node(2), "stop"),
                Member::new(TypedId::node(3), "stop"),
                Member::new(TypedId::way(100), ""),
            ],
        )
        .with_tags([
            ("type", "route"),
            ("route", "subway"),
            ("ref", "1"),
        ]);
        index.add(relation.clone());
        (index, relation)
    }

    #[test]
    fn reconstructs_a_straight_track_and_orders_stops() {
        let (index, relation) = build_simple_route();
        let mut diagnostics = Diagnostics::new();
        let resolver = StationResolver::build(&index, &modes(), &mut diagnostics);
        let mut route = Route::new(&relation, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();
        let recovery = RecoveryData::new();

        reconstruct(&mut route, &relation, &index, &resolver, &recovery, &mut diagnostics);

        assert_eq!(route.tracks.len(), 3);
        assert!(route.stops[2].distance > route.stops[0].distance);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn a_stop_between_on_rails_stops_but_far_from_the_line_gets_a_notice() {
        let mut index = ElementIndex::new();
        for (id, lon, lat) in [(1, 0.0, 0.0), (2, 0.01, 0.001), (3, 0.02, 0.0)] {
            index.add(
                RawElement::node(id, Coord::new(lon, lat)).with_tags([
                    ("railway", "station"),
                    ("subway", "yes"),
                    ("name", format!("S{}", id)),
                ]),
            );
        }
        for (id, lon) in [(11, 0.0), (12, 0.01), (13, 0.02)] {
            index.add(RawElement::node(id, Coord::new(lon, 0.0)));
        }
        index.add(RawElement::way(100, vec![11, 12, 13]).with_tags([("railway", "subway")]));

        let relation = RawElement::relation(
            1000,
            vec![
                Member::new(TypedId::node(1), "stop"),
                Member::new(TypedId::node(2), "stop"),
                Member::new(TypedId::node(3), "stop"),
                Member::new(TypedId::way(100), ""),
            ],
        )
        .with_tags([("type", "route"), ("route", "subway"), ("ref", "1")]);
        index.add(relation.clone());

        let mut diagnostics = Diagnostics::new();
        let resolver = StationResolver::build(&index, &modes(), &mut diagnostics);
        let mut route = Route::new(&relation, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();
        let recovery = RecoveryData::new();

        reconstruct(&mut route, &relation, &index, &resolver, &recovery, &mut diagnostics);

        assert!(
            diagnostics.notices().iter().any(|n| n.contains("meters from the tracks")),
            "notices: {:?}",
            diagnostics.notices()
        );
    }
}
