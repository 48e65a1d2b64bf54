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

//! Small hand-built networks exercising track reconstruction and twin-route
//! pairing end to end, without going through a full [`City`](subway_validator::city::City).

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use subway_validator::diagnostics::Diagnostics;
use subway_validator::element::{Member, RawElement, TypedId};
use subway_validator::geo_utils::Coord;
use subway_validator::index::ElementIndex;
use subway_validator::recovery::RecoveryData;
use subway_validator::route::Route;
use subway_validator::route_master::{MasterAggregator, RouteMaster};
use subway_validator::stop_area::StationResolver;
use subway_validator::track_geometry::{self, extended_tracks, truncated_tracks};

fn modes() -> HashSet<String> {
    ["subway".to_string()].into_iter().collect()
}

fn station(id: i64, lon: f64, lat: f64, name: &str) -> RawElement {
    RawElement::node(id, Coord::new(lon, lat))
        .with_tags([("railway", "station"), ("subway", "yes"), ("name", name)])
}

fn build_route(
    index: &mut ElementIndex,
    relation_id: i64,
    ref_: &str,
    stop_ids: &[i64],
    track_ways: &[i64],
) -> RawElement {
    let mut members: Vec<Member> = stop_ids.iter().map(|&id| Member::new(TypedId::node(id), "stop")).collect();
    members.extend(track_ways.iter().map(|&id| Member::new(TypedId::way(id), "")));
    let relation = RawElement::relation(relation_id, members)
        .with_tags([("type", "route"), ("route", "subway"), ("ref", ref_), ("colour", "red")]);
    index.add(relation.clone());
    relation
}

fn assemble(index: &ElementIndex, relation: &RawElement) -> (Route, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let resolver = StationResolver::build(index, &modes(), &mut diagnostics);
    let mut route = Route::new(relation, None, index, &resolver, &modes(), &mut diagnostics).unwrap();
    let recovery = RecoveryData::new();
    track_geometry::reconstruct(&mut route, relation, index, &resolver, &recovery, &mut diagnostics);
    (route, diagnostics)
}

/// Two stations with no track way between them at all: the route still
/// assembles, its `tracks` stay empty, and `extended_tracks` falls back to
/// the bare stop coordinates so a caller can still draw something.
#[test]
fn two_stations_with_no_track_falls_back_to_stop_coordinates() {
    let mut index = ElementIndex::new();
    index.add(station(1, 0.0, 0.0, "A"));
    index.add(station(2, 1.0, 0.0, "B"));
    let relation = build_route(&mut index, 100, "1", &[1, 2], &[]);

    let (route, diagnostics) = assemble(&index, &relation);

    assert!(route.tracks.is_empty());
    assert_eq!(extended_tracks(&route), vec![Coord::new(0.0, 0.0), Coord::new(1.0, 0.0)]);
    assert!(truncated_tracks(&route, &route.tracks).is_empty());
    assert!(!diagnostics.has_errors());
}

/// Six collinear stations with one way whose nodes exactly match every
/// stop: the reconstructed line covers the route end to end, so extending
/// or truncating it is a no-op.
#[test]
fn six_stations_with_a_full_matching_track() {
    let mut index = ElementIndex::new();
    for i in 0..6 {
        index.add(station(i + 1, i as f64, 0.0, &format!("S{}", i)));
    }
    for i in 0..6 {
        index.add(RawElement::node(100 + i, Coord::new(i as f64, 0.0)));
    }
    index.add(RawElement::way(200, (100..106).collect()).with_tags([("railway", "subway")]));
    let relation = build_route(&mut index, 300, "1", &(1..=6).collect::<Vec<_>>(), &[200]);

    let (route, diagnostics) = assemble(&index, &relation);

    assert_eq!(route.tracks.len(), 6);
    assert_eq!(extended_tracks(&route), route.tracks);
    assert_eq!(truncated_tracks(&route, &route.tracks), route.tracks);
    assert!(track_geometry::are_tracks_complete(&route));
    assert!(!diagnostics.has_errors());
}

/// Six stations but the track way only threads through the middle four: the
/// two end stations fall back to their own coordinates in `extended_tracks`,
/// and `tracks` itself only covers the stretch the way actually describes.
#[test]
fn six_stations_with_a_track_covering_only_the_middle() {
    let mut index = ElementIndex::new();
    for i in 0..6 {
        index.add(station(i + 1, i as f64, 0.0, &format!("S{}", i)));
    }
    for i in 1..5 {
        index.add(RawElement::node(100 + i, Coord::new(i as f64, 0.0)));
    }
    index.add(RawElement::way(200, (101..105).collect()).with_tags([("railway", "subway")]));
    let relation = build_route(&mut index, 300, "1", &(1..=6).collect::<Vec<_>>(), &[200]);

    let (route, _diagnostics) = assemble(&index, &relation);

    assert_eq!(route.tracks, vec![
        Coord::new(1.0, 0.0),
        Coord::new(2.0, 0.0),
        Coord::new(3.0, 0.0),
        Coord::new(4.0, 0.0),
    ]);
    assert!(!track_geometry::are_tracks_complete(&route));

    let extended = extended_tracks(&route);
    assert_eq!(extended.first(), Some(&Coord::new(0.0, 0.0)));
    assert_eq!(extended.last(), Some(&Coord::new(5.0, 0.0)));
    assert_eq!(extended.len(), 6);
}

/// The track runs parallel to the route's stops but protrudes past the
/// first and last one on both ends; `truncated_tracks` clips the overhang
/// and pins the endpoints exactly to the first/last stop.
#[test]
fn track_protruding_past_both_end_stops_gets_truncated() {
    let mut index = ElementIndex::new();
    for i in 0..6 {
        index.add(station(i + 1, i as f64, 0.0001, &format!("S{}", i)));
    }
    let track_nodes: Vec<i64> = (-1..=6).map(|i| 100 + i).collect();
    for (offset, &id) in (-1..=6).zip(&track_nodes) {
        index.add(RawElement::node(id, Coord::new(offset as f64, 0.0)));
    }
    index.add(RawElement::way(200, track_nodes).with_tags([("railway", "subway")]));
    let relation = build_route(&mut index, 300, "1", &(1..=6).collect::<Vec<_>>(), &[200]);

    let (route, _diagnostics) = assemble(&index, &relation);

    assert_eq!(route.tracks.first(), Some(&Coord::new(-1.0, 0.0)));
    assert_eq!(route.tracks.last(), Some(&Coord::new(6.0, 0.0)));

    let truncated = truncated_tracks(&route, &route.tracks);
    assert_eq!(truncated.first(), route.stops.first().and_then(|s| s.stop).as_ref());
    assert_eq!(truncated.last(), route.stops.last().and_then(|s| s.stop).as_ref());
    assert!(truncated.len() < route.tracks.len());
}

/// A closed loop route returning to its starting stop area: the assembler
/// marks it circular, the stitched track closes on itself, and truncation
/// is a no-op for circular routes (there's no dangling end to clip).
#[test]
fn a_closed_loop_route_is_detected_as_circular() {
    let mut index = ElementIndex::new();
    let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    for (i, &(lon, lat)) in corners.iter().enumerate() {
        index.add(station(i as i64 + 1, lon, lat, &format!("Corner{}", i)));
        index.add(RawElement::node(100 + i as i64, Coord::new(lon, lat)));
    }
    // Closed way: 100 -> 101 -> 102 -> 103 -> 100.
    index.add(RawElement::way(200, vec![100, 101, 102, 103, 100]).with_tags([("railway", "subway")]));
    // The route revisits its first stop area at the end to close the loop.
    let relation = build_route(&mut index, 300, "1", &[1, 2, 3, 4, 1], &[200]);

    let (route, diagnostics) = assemble(&index, &relation);

    assert!(route.is_circular);
    assert_eq!(route.tracks.first(), route.tracks.last());
    assert_eq!(truncated_tracks(&route, &route.tracks), route.tracks);
    assert!(!diagnostics.has_errors());
}

/// Two directions of the same line, one of which is missing a stop in the
/// middle: pairing them as twins surfaces a notice naming the stop that's
/// present on one side but not the other, rather than silently losing it.
#[test]
fn twin_routes_with_a_missing_middle_stop_are_flagged() {
    let mut index = ElementIndex::new();
    for i in 0..4 {
        index.add(station(i + 1, i as f64, 0.0, &format!("S{}", i)));
    }
    let mut diagnostics = Diagnostics::new();
    let resolver = StationResolver::build(&index, &modes(), &mut diagnostics);

    // Forward direction: all four stops, 1-2-3-4.
    let forward_el = build_route(&mut index, 10, "1", &[1, 2, 3, 4], &[]);
    let forward = Route::new(&forward_el, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();

    // Return direction skips stop 3: 4-2-1.
    let backward_el = build_route(&mut index, 11, "1", &[4, 2, 1], &[]);
    let backward = Route::new(&backward_el, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();

    let mut aggregator = MasterAggregator::new();
    aggregator.add(forward, &forward_el, None, &mut diagnostics);
    aggregator.add(backward, &backward_el, None, &mut diagnostics);
    let masters = aggregator.finish();
    assert_eq!(masters.len(), 1);

    let master: &RouteMaster = &masters[0];
    master.check_return_routes(&index, &resolver, &mut diagnostics);

    assert!(
        diagnostics.notices().iter().any(|n| n.contains("not included in")),
        "notices: {:?}",
        diagnostics.notices()
    );
}
