use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

use crate::model::{AssociationEdge, IdentityId};

/// Global edge order: more sources first, then stronger, then self name.
/// Counterparty name and ids finish the tie-break so the order is total.
pub fn compare_edges(a: &AssociationEdge, b: &AssociationEdge) -> Ordering {
    b.source_count()
        .cmp(&a.source_count())
        .then_with(|| OrderedFloat(b.strength).cmp(&OrderedFloat(a.strength)))
        .then_with(|| a.self_name.cmp(&b.self_name))
        .then_with(|| a.counterparty_name.cmp(&b.counterparty_name))
        .then_with(|| a.self_id.cmp(&b.self_id))
        .then_with(|| a.counterparty_id.cmp(&b.counterparty_id))
}

/// Top `top_n` edges in global order, then clustered by self identity.
///
/// Groups appear in the order their self identity first shows up in the
/// global order; rows inside a group keep their global order.
pub fn select_top(mut edges: Vec<AssociationEdge>, top_n: usize) -> Vec<AssociationEdge> {
    edges.sort_by(compare_edges);
    edges.truncate(top_n);
    group_by_first_appearance(edges)
}

/// Stable clustering of already-ordered rows by self identity.
pub fn group_by_first_appearance(edges: Vec<AssociationEdge>) -> Vec<AssociationEdge> {
    let mut group_of: BTreeMap<IdentityId, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<AssociationEdge>> = Vec::new();
    for edge in edges {
        let next = groups.len();
        let slot = *group_of.entry(edge.self_id).or_insert(next);
        if slot == next {
            groups.push(Vec::new());
        }
        groups[slot].push(edge);
    }
    groups.into_iter().flatten().collect()
}

/// True when every self identity's rows are contiguous.
pub fn is_grouped(edges: &[AssociationEdge]) -> bool {
    let mut closed: BTreeSet<IdentityId> = BTreeSet::new();
    let mut current: Option<IdentityId> = None;
    for e in edges {
        if current != Some(e.self_id) {
            if closed.contains(&e.self_id) {
                return false;
            }
            if let Some(prev) = current {
                closed.insert(prev);
            }
            current = Some(e.self_id);
        }
    }
    true
}
