use std::collections::BTreeMap;

use crate::config::HighlightConfig;
use crate::model::{AmountHighlight, Canonicalization, CounterpartCount};

#[derive(Default)]
struct AmountTally {
    occurrences: usize,
    by_name: BTreeMap<String, usize>,
}

impl AmountTally {
    /// Counterparts by count descending, then name.
    fn ranked(&self) -> Vec<CounterpartCount> {
        let mut out: Vec<CounterpartCount> = self
            .by_name
            .iter()
            .map(|(name, &count)| CounterpartCount {
                name: name.clone(),
                count,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        out
    }
}

fn total(cents: i64, tally: &AmountTally) -> i64 {
    let occurrences = i64::try_from(tally.occurrences).unwrap_or(i64::MAX);
    cents.saturating_mul(occurrences)
}

/// Tally money records by absolute amount. Only records with a non-zero
/// amount and a resolved counterparty other than the self identity count.
fn tally(canon: &Canonicalization<'_>) -> BTreeMap<i64, AmountTally> {
    let mut tallies: BTreeMap<i64, AmountTally> = BTreeMap::new();
    for r in &canon.resolved {
        if !r.record.source.carries_amount() {
            continue;
        }
        let (Some(amount), Some(cp)) = (r.record.amount_cents, r.counterparty) else {
            continue;
        };
        if amount == 0 || cp == r.self_id {
            continue;
        }
        let name = canon.display_name(cp);
        if name.is_empty() {
            continue;
        }
        let t = tallies.entry(amount.saturating_abs()).or_default();
        t.occurrences += 1;
        *t.by_name.entry(name.to_string()).or_insert(0) += 1;
    }
    tallies
}

/// Mandatory amounts first, in configured order, each with every
/// counterpart; then the `top_k` other amounts by total value, each with
/// its `top_k` most frequent counterparts.
pub fn highlight_amounts(canon: &Canonicalization<'_>, config: &HighlightConfig) -> Vec<AmountHighlight> {
    let tallies = tally(canon);
    let mandatory = config.mandatory_cents();
    let mut out = Vec::new();

    for cents in &mandatory {
        if let Some(t) = tallies.get(cents) {
            out.push(AmountHighlight {
                amount_cents: *cents,
                mandatory: true,
                occurrences: t.occurrences,
                total_cents: total(*cents, t),
                counterparts: t.ranked(),
            });
        }
    }

    let mut general: Vec<(i64, &AmountTally)> = tallies
        .iter()
        .filter(|(cents, _)| !mandatory.contains(*cents))
        .map(|(cents, t)| (*cents, t))
        .collect();
    general.sort_by(|(a, ta), (b, tb)| {
        total(*b, tb).cmp(&total(*a, ta)).then_with(|| b.cmp(a))
    });

    for (cents, t) in general.into_iter().take(config.top_k) {
        let mut counterparts = t.ranked();
        counterparts.truncate(config.top_k);
        out.push(AmountHighlight {
            amount_cents: cents,
            mandatory: false,
            occurrences: t.occurrences,
            total_cents: total(cents, t),
            counterparts,
        });
    }

    out
}
