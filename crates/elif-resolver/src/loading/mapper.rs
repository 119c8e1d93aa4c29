//! Data mapper - Attach loaded entities onto their parents' relation fields

use serde_json::Value;

use crate::entity::{loosely_matches, Entity};
use crate::relationships::RelationDescriptor;

/// Assign matching `candidates` onto `relation`'s destination field of every
/// source. A candidate matches a source when, for each filter entry, the
/// candidate's `filter_key` field loosely matches the source's `source_field`.
///
/// List relations always receive the full matching set, possibly empty.
/// Singular relations receive the first match and are left untouched when
/// nothing matches. Returns the number of sources that received a match.
pub fn map_relation(candidates: &[Entity], sources: &[Entity], relation: &RelationDescriptor) -> usize {
    let filter = relation.filter_spec();
    let mut mapped = 0;

    for source in sources {
        let wanted: Vec<(&str, Option<Value>)> = filter
            .iter()
            .map(|(filter_key, source_field)| (filter_key, source.value(source_field)))
            .collect();

        let matches: Vec<Entity> = candidates
            .iter()
            .filter(|candidate| {
                wanted.iter().all(|(filter_key, expected)| match (expected, candidate.value(filter_key)) {
                    (Some(expected), Some(actual)) => loosely_matches(expected, &actual),
                    _ => false,
                })
            })
            .cloned()
            .collect();

        if !matches.is_empty() {
            mapped += 1;
        }
        if relation.is_list() {
            source.set_related_many(relation.destination(), matches);
        } else if let Some(first) = matches.into_iter().next() {
            source.set_related_one(relation.destination(), first);
        }
    }
    mapped
}
