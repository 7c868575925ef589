use itertools::Itertools;
use placeseek_providers::{Coordinate, PlaceCandidate};

/// Order candidates by great-circle distance from `reference`, nearest first.
///
/// The sort is stable: candidates at the same distance keep their input order.
pub fn rank_by_distance(
    reference: &Coordinate,
    candidates: Vec<PlaceCandidate>,
) -> Vec<PlaceCandidate> {
    candidates
        .into_iter()
        .map(|candidate| (reference.distance_to(&candidate.coordinate()), candidate))
        .sorted_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, candidate)| candidate)
        .collect()
}
