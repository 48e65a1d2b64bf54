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

//! Grouping routes of one `ref` under a single master, harmonizing their
//! tags, and checking each has a sensible return direction: either an
//! explicit twin route running the opposite way, or (for circular routes) a
//! route that retraces most of the same stop sequence backwards.

use crate::colour::{normalize_colour, Rgb};
use crate::diagnostics::Diagnostics;
use crate::element::{RawElement, TypedId};
use crate::geo_utils::{self, Projection};
use crate::index::ElementIndex;
use crate::route::{get_interval, get_network, Route, RouteStop};
use crate::stop_area::StationResolver;
use crate::track_geometry::MAX_DISTANCE_STOP_TO_LINE;
use std::collections::{HashMap, HashSet};

/// Two stops closer than this might really be the same interchange that
/// simply hasn't been tagged as a stop area group.
pub const SUGGEST_TRANSFER_MIN_DISTANCE: f64 = 100.0;

/// All the routes sharing one `ref` (or grouped by an explicit
/// `route_master` relation), with their harmonized tags.
#[derive(Clone, Debug)]
pub struct RouteMaster {
    /// This master's id: the `route_master` relation's id if one grouped
    /// these routes explicitly, otherwise the minimal id among its routes.
    /// `None` only before the first route has been added.
    pub id: Option<TypedId>,
    /// The grouped routes, in the order they were added.
    pub routes: Vec<Route>,
    /// Whether an explicit `route_master` relation produced this group.
    pub has_master: bool,
    /// The harmonized ref.
    pub ref_: Option<String>,
    /// The harmonized name.
    pub name: Option<String>,
    /// The harmonized mode; a route with a different mode is rejected.
    pub mode: Option<String>,
    /// The harmonized colour.
    pub colour: Option<Rgb>,
    /// The harmonized infill colour.
    pub infill: Option<Rgb>,
    /// The harmonized network.
    pub network: Option<String>,
    /// The harmonized interval in seconds.
    pub interval: Option<u32>,
    interval_from_master: bool,
    best_index: Option<usize>,
}

impl RouteMaster {
    /// Builds an empty master, optionally seeded from a `route_master`
    /// relation's own tags.
    pub fn new(master: Option<&RawElement>) -> RouteMaster {
        match master {
            Some(master) => {
                let colour = normalize_colour(master.tag("colour")).ok().flatten();
                let infill = normalize_colour(master.tag("colour:infill")).ok().flatten();
                let interval = get_interval(master);
                RouteMaster {
                    id: Some(master.id),
                    routes: Vec::new(),
                    has_master: true,
                    ref_: master.tag("ref").or_else(|| master.tag("name")).map(str::to_string),
                    name: master.tag("name").map(str::to_string),
                    mode: master.tag("route_master").map(str::to_string),
                    colour,
                    infill,
                    network: get_network(master).map(str::to_string),
                    interval_from_master: interval.is_some(),
                    interval,
                    best_index: None,
                }
            }
            None => RouteMaster {
                id: None,
                routes: Vec::new(),
                has_master: false,
                ref_: None,
                name: None,
                mode: None,
                colour: None,
                infill: None,
                network: None,
                interval: None,
                interval_from_master: false,
                best_index: None,
            },
        }
    }

    /// Folds one more route into this master, harmonizing network (error on
    /// mismatch), colour/infill/ref (notice on mismatch), and mode (error,
    /// and the route is rejected, on mismatch). Returns whether the route
    /// was accepted. `element` is the route relation itself, used for
    /// locating any diagnostics this fold raises.
    pub fn add(&mut self, route: Route, diagnostics: &mut Diagnostics, element: &RawElement) -> bool {
        if self.network.is_none() {
            self.network = route.network.clone();
        } else if let Some(network) = &route.network {
            if Some(network) != self.network.as_ref() {
                diagnostics.error_at(
                    format!(
                        "route has different network (\"{}\") from master \"{}\"",
                        network,
                        self.network.as_deref().unwrap_or("")
                    ),
                    element,
                );
            }
        }

        if self.colour.is_none() {
            self.colour = route.colour;
        } else if let Some(colour) = route.colour {
            if Some(colour) != self.colour {
                diagnostics.notice_at(
                    format!(
                        "route \"{}\" has different colour from master \"{}\"",
                        colour,
                        self.colour.unwrap()
                    ),
                    element,
                );
            }
        }

        if self.infill.is_none() {
            self.infill = route.infill;
        } else if let Some(infill) = route.infill {
            if Some(infill) != self.infill {
                diagnostics.notice_at(
                    format!(
                        "route \"{}\" has different infill colour from master \"{}\"",
                        infill,
                        self.infill.unwrap()
                    ),
                    element,
                );
            }
        }

        if self.ref_.is_none() {
            self.ref_ = route.ref_.clone();
        } else if route.ref_ != self.ref_ {
            diagnostics.notice_at(
                format!(
                    "route \"{}\" has different ref from master \"{}\"",
                    route.ref_.as_deref().unwrap_or(""),
                    self.ref_.as_deref().unwrap_or("")
                ),
                element,
            );
        }

        if self.name.is_none() {
            self.name = route.name.clone();
        }

        if self.mode.is_none() {
            self.mode = Some(route.mode.clone());
        } else if Some(&route.mode) != self.mode.as_ref() {
            diagnostics.error_at(
                format!(
                    "incompatible PT mode: master has {} and route has {}",
                    self.mode.as_deref().unwrap_or(""),
                    route.mode
                ),
                element,
            );
            tracing::warn!("rejecting route {} ({}) from master {:?}", route.id, route.mode, self.id);
            return false;
        }

        if !self.interval_from_master {
            if let Some(interval) = route.interval {
                self.interval = Some(self.interval.map_or(interval, |i| i.min(interval)));
            }
        }

        if !self.has_master && (self.id.is_none() || self.id.unwrap() > route.id) {
            self.id = Some(route.id);
        }

        let better = match self.best_index {
            None => true,
            Some(best) => {
                route.stops.len() > self.routes[best].stops.len()
                    || (route.stops.len() == self.routes[best].stops.len()
                        && route.id < self.routes[best].id)
            }
        };
        self.routes.push(route);
        if better {
            self.best_index = Some(self.routes.len() - 1);
        }
        true
    }

    /// The longest route in the group (ties broken by minimal id), used as
    /// the representative for display purposes.
    pub fn best(&self) -> Option<&Route> {
        self.best_index.map(|i| &self.routes[i])
    }

    /// Routes with at least two stops; routes with fewer are excluded from
    /// every return-direction and twin check, matching the shape of the
    /// Python reference (a one-stop route can't sensibly have a "return").
    pub fn meaningful_routes(&self) -> impl Iterator<Item = (usize, &Route)> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.stops.len() >= 2)
    }

    /// Checks that this master's routes have a sensible return direction,
    /// and that twin routes agree on their stop sequence.
    pub fn check_return_routes(
        &self,
        index: &ElementIndex,
        resolver: &StationResolver,
        diagnostics: &mut Diagnostics,
    ) {
        let meaningful: Vec<usize> = self.meaningful_routes().map(|(i, _)| i).collect();
        if meaningful.is_empty() {
            diagnostics.error(format!(
                "an empty route master {}. Please set construction:route if it is under construction",
                self.id.map(|id| id.to_string()).unwrap_or_default()
            ));
            return;
        }
        if meaningful.len() == 1 {
            let only = &self.routes[meaningful[0]];
            let message = "only one route in route_master. Please check if it needs a return route";
            let element = index.get(only.id);
            match element {
                Some(el) if only.is_circular => diagnostics.notice_at(message, el),
                Some(el) => diagnostics.error_at(message, el),
                None if only.is_circular => diagnostics.notice(message),
                None => diagnostics.error(message),
            }
            return;
        }

        self.check_return_circular_routes(&meaningful, index, resolver, diagnostics);
        self.check_return_noncircular_routes(&meaningful, index, resolver, diagnostics);
    }

    fn check_return_noncircular_routes(
        &self,
        meaningful: &[usize],
        index: &ElementIndex,
        resolver: &StationResolver,
        diagnostics: &mut Diagnostics,
    ) {
        let noncircular: Vec<usize> = meaningful
            .iter()
            .copied()
            .filter(|&i| !self.routes[i].is_circular)
            .collect();

        let mut all_ends: HashSet<(TypedId, TypedId)> = HashSet::new();
        for &i in &noncircular {
            all_ends.insert(end_transfers(&self.routes[i], resolver));
        }
        for &i in &noncircular {
            let (a, b) = end_transfers(&self.routes[i], resolver);
            if !all_ends.contains(&(b, a)) {
                notice_on_route(diagnostics, index, &self.routes[i], "route does not have a return direction");
            }
        }

        let twins = self.find_twin_routes(&noncircular, resolver);
        let mut processed: HashSet<usize> = HashSet::new();
        for (&i, &j) in &twins {
            if processed.contains(&i) || processed.contains(&j) {
                continue;
            }
            processed.insert(i);
            processed.insert(j);
            let (first, second) = if self.routes[i].id < self.routes[j].id {
                (i, j)
            } else {
                (j, i)
            };
            self.alert_twin_routes_differ(first, second, index, resolver, diagnostics);
        }
    }

    fn find_twin_routes(
        &self,
        noncircular: &[usize],
        resolver: &StationResolver,
    ) -> HashMap<usize, usize> {
        let mut twins: HashMap<usize, usize> = HashMap::new();
        for &i in noncircular {
            if twins.contains_key(&i) {
                continue;
            }
            let route = &self.routes[i];
            let route_transfers: HashSet<TypedId> = transfers_sequence(route, resolver).into_iter().collect();
            let (a, b) = end_transfers(route, resolver);
            let ends_reversed = (b, a);

            let mut best_candidate: Option<(usize, usize)> = None; // (index, symmetric diff size)
            for &j in noncircular {
                if j == i || twins.contains_key(&j) {
                    continue;
                }
                let candidate = &self.routes[j];
                if end_transfers(candidate, resolver) != ends_reversed {
                    continue;
                }
                let len_diff = (candidate.stops.len() as i64 - route.stops.len() as i64).unsigned_abs() as usize;
                let max_len = candidate.stops.len().max(route.stops.len()).max(1);
                if !(len_diff <= 2 || (len_diff as f64) / (max_len as f64) <= 0.2) {
                    continue;
                }
                let candidate_transfers: HashSet<TypedId> =
                    transfers_sequence(candidate, resolver).into_iter().collect();
                let diff = route_transfers.symmetric_difference(&candidate_transfers).count();
                if best_candidate.map(|(_, best_diff)| diff < best_diff).unwrap_or(true) {
                    best_candidate = Some((j, diff));
                }
            }

            if let Some((j, _)) = best_candidate {
                twins.insert(i, j);
                twins.insert(j, i);
            }
        }
        twins
    }

    fn check_return_circular_routes(
        &self,
        meaningful: &[usize],
        index: &ElementIndex,
        resolver: &StationResolver,
        diagnostics: &mut Diagnostics,
    ) {
        let circular: Vec<usize> = meaningful
            .iter()
            .copied()
            .filter(|&i| self.routes[i].is_circular)
            .collect();
        let mut has_backward: HashSet<usize> = HashSet::new();

        for &i in &circular {
            if has_backward.contains(&i) {
                continue;
            }
            let mut seq1 = transfer_ids(&self.routes[i], resolver);
            seq1.pop();
            for &j in &circular {
                if j == i || has_backward.contains(&i) {
                    continue;
                }
                let mut seq2 = transfer_ids(&self.routes[j], resolver);
                seq2.pop();
                seq2.reverse();
                let common = find_common_circular_subsequence(&seq1, &seq2);
                let threshold = 0.8 * seq1.len().min(seq2.len()) as f64;
                if common.len() as f64 >= threshold {
                    has_backward.insert(i);
                    has_backward.insert(j);
                    break;
                }
            }
        }

        for &i in &circular {
            if !has_backward.contains(&i) {
                notice_on_route(diagnostics, index, &self.routes[i], "route does not have a return direction");
            }
        }
    }

    fn alert_twin_routes_differ(
        &self,
        i: usize,
        j: usize,
        index: &ElementIndex,
        resolver: &StationResolver,
        diagnostics: &mut Diagnostics,
    ) {
        let route1 = &self.routes[i];
        let route2 = &self.routes[j];
        let (missing_from_1, missing_from_2, mismatched) =
            calculate_twin_routes_diff(route1, route2, resolver);

        for st in &missing_from_1 {
            if stop_near_tracks_or_incomplete(route1, st) {
                notice_on_route(
                    diagnostics,
                    index,
                    route1,
                    format!(
                        "stop {} is included in {} but not included in {}",
                        stop_label(st, resolver),
                        route2.id,
                        route1.id
                    ),
                );
            }
        }
        for st in &missing_from_2 {
            if stop_near_tracks_or_incomplete(route2, st) {
                notice_on_route(
                    diagnostics,
                    index,
                    route2,
                    format!(
                        "stop {} is included in {} but not included in {}",
                        stop_label(st, resolver),
                        route1.id,
                        route2.id
                    ),
                );
            }
        }
        for (st1, st2) in &mismatched {
            let same_station = resolver
                .stop_area(st1.stoparea)
                .zip(resolver.stop_area(st2.stoparea))
                .map(|(a, b)| a.station == b.station)
                .unwrap_or(false);
            let close = match (st1.stop, st2.stop) {
                (Some(a), Some(b)) => geo_utils::distance(a, b) < SUGGEST_TRANSFER_MIN_DISTANCE,
                _ => false,
            };
            if same_station || close {
                notice_on_route(
                    diagnostics,
                    index,
                    route1,
                    format!(
                        "should there be one stop area or a transfer between {} and {}?",
                        stop_label(st1, resolver),
                        stop_label(st2, resolver)
                    ),
                );
            }
        }
    }
}

fn notice_on_route(diagnostics: &mut Diagnostics, index: &ElementIndex, route: &Route, message: impl std::fmt::Display) {
    match index.get(route.id) {
        Some(el) => diagnostics.notice_at(message, el),
        None => diagnostics.notice(message.to_string()),
    }
}

fn stop_label(stop: &RouteStop, resolver: &StationResolver) -> String {
    resolver
        .stop_area(stop.stoparea)
        .and_then(|sa| resolver.station(sa.station))
        .map(|s| s.name.clone())
        .unwrap_or_default()
}

fn stop_near_tracks_or_incomplete(route: &Route, stop: &RouteStop) -> bool {
    if !crate::track_geometry::are_tracks_complete(route) {
        return true;
    }
    let center = match stop.stop {
        Some(c) => c,
        None => return false,
    };
    let Projection { projected_point, .. } =
        geo_utils::project_on_line(center, &route.tracks, MAX_DISTANCE_STOP_TO_LINE);
    match projected_point {
        Some(p) => geo_utils::distance(center, p) <= MAX_DISTANCE_STOP_TO_LINE,
        None => false,
    }
}

/// The stop-area-or-transfer id at each end of the route, order-normalized
/// so a route and its reverse-direction twin produce swapped, not
/// identical, tuples — except when both ends share one transfer, which
/// would otherwise make a route look like its own twin.
pub fn end_transfers(route: &Route, resolver: &StationResolver) -> (TypedId, TypedId) {
    let first = route.stops.first();
    let last = route.stops.last();
    let (Some(first), Some(last)) = (first, last) else {
        return (TypedId::relation(0), TypedId::relation(0));
    };
    let first_transfer = resolver.stop_area(first.stoparea).and_then(|sa| sa.transfer);
    let last_transfer = resolver.stop_area(last.stoparea).and_then(|sa| sa.transfer);
    if first_transfer.is_some() && first_transfer == last_transfer {
        (first.stoparea, last.stoparea)
    } else {
        (first_transfer.unwrap_or(first.stoparea), last_transfer.unwrap_or(last.stoparea))
    }
}

fn transfer_ids(route: &Route, resolver: &StationResolver) -> Vec<TypedId> {
    route
        .stops
        .iter()
        .map(|s| {
            resolver
                .stop_area(s.stoparea)
                .and_then(|sa| sa.transfer)
                .unwrap_or(s.stoparea)
        })
        .collect()
}

/// The per-stop transfer-or-stop-area id sequence, with the ends
/// normalized the same way [`end_transfers`] normalizes them.
pub fn transfers_sequence(route: &Route, resolver: &StationResolver) -> Vec<TypedId> {
    let mut seq = transfer_ids(route, resolver);
    if let (Some(first), Some(last)) = (route.stops.first(), route.stops.last()) {
        let first_transfer = resolver.stop_area(first.stoparea).and_then(|sa| sa.transfer);
        let last_transfer = resolver.stop_area(last.stoparea).and_then(|sa| sa.transfer);
        if first_transfer.is_some() && first_transfer == last_transfer && seq.len() >= 2 {
            let (a, b) = end_transfers(route, resolver);
            let n = seq.len();
            seq[0] = a;
            seq[n - 1] = b;
        }
    }
    seq
}

fn find_common_circular_subsequence(seq1: &[TypedId], seq2: &[TypedId]) -> Vec<TypedId> {
    let mut i1 = None;
    let mut i2 = None;
    for (idx, x) in seq1.iter().enumerate() {
        if let Some(pos) = seq2.iter().position(|y| y == x) {
            i1 = Some(idx);
            i2 = Some(pos);
            break;
        }
    }
    let (Some(i1), Some(i2)) = (i1, i2) else {
        return Vec::new();
    };

    let rotated1: Vec<TypedId> = seq1[i1..].iter().chain(seq1[..i1].iter()).copied().collect();
    let rotated2: Vec<TypedId> = seq2[i2..].iter().chain(seq2[..i2].iter()).copied().collect();

    let mut common = Vec::new();
    let mut cursor = 0;
    for x in &rotated1 {
        if let Some(pos) = rotated2[cursor..].iter().position(|y| y == x) {
            common.push(*x);
            cursor += pos + 1;
            if cursor >= rotated2.len() {
                break;
            }
        }
    }
    common
}

fn stops_match(stop1: &RouteStop, stop2: &RouteStop, resolver: &StationResolver) -> bool {
    if stop1.stoparea == stop2.stoparea {
        return true;
    }
    let t1 = resolver.stop_area(stop1.stoparea).and_then(|sa| sa.transfer);
    let t2 = resolver.stop_area(stop2.stoparea).and_then(|sa| sa.transfer);
    t1.is_some() && t1 == t2
}

/// Wagner-Fischer edit distance between a route's stop sequence and its
/// twin's *reversed* stop sequence, classifying each edit as a stop missing
/// from one side or the other, or a pair of stops that don't match at all.
fn calculate_twin_routes_diff(
    route1: &Route,
    route2: &Route,
    resolver: &StationResolver,
) -> (Vec<RouteStop>, Vec<RouteStop>, Vec<(RouteStop, RouteStop)>) {
    let stops1 = &route1.stops;
    let stops2: Vec<RouteStop> = route2.stops.iter().rev().cloned().collect();

    let n = stops1.len();
    let m = stops2.len();
    let mut d = vec![vec![0usize; m + 1]; n + 1];
    for (j, cell) in d[0].iter_mut().enumerate() {
        *cell = j;
    }
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for i in 1..=n {
        for j in 1..=m {
            d[i][j] = if stops_match(&stops1[i - 1], &stops2[j - 1], resolver) {
                d[i - 1][j - 1]
            } else {
                (d[i - 1][j].min(d[i][j - 1]).min(d[i - 1][j - 1])) + 1
            };
        }
    }

    let mut missing_from_1 = Vec::new();
    let mut missing_from_2 = Vec::new();
    let mut mismatched = Vec::new();

    let mut i = n;
    let mut j = m;
    while !(i == 0 && j == 0) {
        let mut action = None;
        if i > 0 && j > 0 {
            let matched = stops_match(&stops1[i - 1], &stops2[j - 1], resolver);
            if matched && d[i - 1][j - 1] == d[i][j] {
                action = Some("no");
            } else if !matched && d[i - 1][j - 1] + 1 == d[i][j] {
                action = Some("change");
            }
        }
        if action.is_none() && i > 0 && d[i - 1][j] + 1 == d[i][j] {
            action = Some("add_2");
        }
        if action.is_none() && j > 0 && d[i][j - 1] + 1 == d[i][j] {
            action = Some("add_1");
        }

        match action {
            Some("add_1") => {
                missing_from_1.push(stops2[j - 1].clone());
                j -= 1;
            }
            Some("add_2") => {
                missing_from_2.push(stops1[i - 1].clone());
                i -= 1;
            }
            _ => {
                if action == Some("change") {
                    mismatched.push((stops1[i - 1].clone(), stops2[j - 1].clone()));
                }
                i -= 1;
                j -= 1;
            }
        }
    }

    (missing_from_1, missing_from_2, mismatched)
}

/// Groups routes into [`RouteMaster`]s: by the `route_master` relation that
/// owns them when one exists, otherwise by shared `ref`. Mirrors the final
/// grouping pass of route assembly, after which every master's return
/// directions are checked.
#[derive(Debug, Default)]
pub struct MasterAggregator {
    masters: Vec<RouteMaster>,
    by_key: HashMap<String, usize>,
}

impl MasterAggregator {
    /// Builds an empty aggregator.
    pub fn new() -> Self {
        MasterAggregator::default()
    }

    /// Folds one more route into its master, creating one keyed by
    /// `master`'s id (if given) or by the route's own `ref` otherwise. A
    /// route rejected by [`RouteMaster::add`] (mode mismatch) leaves its
    /// newly-created master empty; those are dropped in [`finish`](Self::finish).
    pub fn add(
        &mut self,
        route: Route,
        element: &RawElement,
        master: Option<&RawElement>,
        diagnostics: &mut Diagnostics,
    ) {
        let key = match master {
            Some(m) => format!("rel:{}", m.id),
            None => format!("ref:{}", route.ref_.as_deref().unwrap_or("")),
        };
        let index = match self.by_key.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.masters.len();
                self.masters.push(RouteMaster::new(master));
                self.by_key.insert(key, i);
                i
            }
        };
        self.masters[index].add(route, diagnostics, element);
    }

    /// Finalizes the grouping, dropping any master left with no accepted
    /// routes (every route it was offered failed the mode-compatibility
    /// check).
    pub fn finish(self) -> Vec<RouteMaster> {
        self.masters.into_iter().filter(|m| !m.routes.is_empty()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Member;
    use crate::geo_utils::Coord;
    use crate::index::ElementIndex;

    fn modes() -> HashSet<String> {
        ["subway".to_string()].into_iter().collect()
    }

    fn build_route(index: &mut ElementIndex, relation_id: i64, stop_ids: &[i64], ref_: &str, mode: &str) -> RawElement {
        let mut members = Vec::new();
        for &id in stop_ids {
            index.add(
                RawElement::node(id, Coord::new(id as f64 * 0.01, 0.0))
                    .with_tags([("railway", "station"), ("subway", "yes"), ("name", format!("S{}", id))]),
            );
            members.push(Member::new(TypedId::node(id), "stop"));
        }
        let relation = RawElement::relation(relation_id, members)
            .with_tags([("type", "route"), ("route", mode), ("ref", ref_)]);
        index.add(relation.clone());
        relation
    }

    #[test]
    fn mode_mismatch_rejects_the_route_and_leaves_the_master_empty() {
        let mut index = ElementIndex::new();
        let relation = build_route(&mut index, 1, &[1, 2], "1", "subway");
        let mut diagnostics = Diagnostics::new();
        let resolver = StationResolver::build(&index, &modes(), &mut diagnostics);
        let route = Route::new(&relation, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();

        let mut master = RouteMaster::new(None);
        master.mode = Some("tram".to_string());
        let accepted = master.add(route, &mut diagnostics, &relation);

        assert!(!accepted);
        assert!(master.routes.is_empty());
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn finds_the_common_circular_subsequence_with_a_rotation() {
        let seq1 = vec![TypedId::node(1), TypedId::node(2), TypedId::node(3), TypedId::node(4)];
        let seq2 = vec![TypedId::node(3), TypedId::node(4), TypedId::node(1), TypedId::node(2)];
        let common = find_common_circular_subsequence(&seq1, &seq2);
        assert_eq!(common.len(), 4);
    }

    #[test]
    fn aggregator_drops_a_master_whose_only_route_was_rejected() {
        let mut index = ElementIndex::new();
        let relation = build_route(&mut index, 1, &[1, 2], "1", "subway");
        let mut diagnostics = Diagnostics::new();
        let resolver = StationResolver::build(&index, &modes(), &mut diagnostics);
        let route = Route::new(&relation, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();

        let mut aggregator = MasterAggregator::new();
        aggregator.add(route, &relation, None, &mut diagnostics);
        // A second route under the same ref but an incompatible mode.
        let relation2 = build_route(&mut index, 2, &[1, 2], "1", "subway");
        let mut route2 = Route::new(&relation2, None, &index, &resolver, &modes(), &mut diagnostics).unwrap();
        route2.mode = "tram".to_string();
        aggregator.add(route2, &relation2, None, &mut diagnostics);

        let masters = aggregator.finish();
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].routes.len(), 1);
    }
}
