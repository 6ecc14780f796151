use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::config::ScoringConfig;
use crate::model::{
    AssociationEdge, Canonicalization, CounterpartDetail, IdentityId, RawRecord, RecordRef,
    ResolvedRecord, Source, SourceEvidence,
};
use crate::normalize::clean;

/// Edge key: ordered (self, counterparty).
pub type PairKey = (IdentityId, IdentityId);

/// Group resolved records by (self, counterparty). Records without a
/// resolved counterparty, or whose counterparty is the self identity, do not
/// take part in association.
pub fn group_pairs<'r, 'a>(
    resolved: &'r [ResolvedRecord<'a>],
) -> BTreeMap<PairKey, Vec<&'r ResolvedRecord<'a>>> {
    let mut groups: BTreeMap<PairKey, Vec<&ResolvedRecord<'a>>> = BTreeMap::new();
    for r in resolved {
        if let Some(cp) = r.counterparty.filter(|&cp| cp != r.self_id) {
            groups.entry((r.self_id, cp)).or_default().push(r);
        }
    }
    groups
}

/// Strength of a pair given its per-source record counts.
///
/// Each source contributes `weight * saturation(count)`; every distinct
/// source beyond the first adds `source_bonus`. With non-negative weights
/// and increasing saturation this never decreases when a record or a new
/// source is added.
pub fn strength(counts: &BTreeMap<Source, usize>, config: &ScoringConfig) -> f64 {
    let terms: f64 = counts
        .iter()
        .map(|(source, &n)| source_term(*source, n, config))
        .sum();
    let extra_sources = counts.values().filter(|&&n| n > 0).count().saturating_sub(1);
    terms + config.source_bonus * extra_sources as f64
}

fn source_term(source: Source, count: usize, config: &ScoringConfig) -> f64 {
    config.weights.weight(source) * config.saturation.apply(count)
}

/// Build one edge per ordered pair, in pair order.
pub fn score_edges(canon: &Canonicalization<'_>, config: &ScoringConfig) -> Vec<AssociationEdge> {
    group_pairs(&canon.resolved)
        .into_iter()
        .map(|((self_id, cp_id), records)| build_edge(canon, self_id, cp_id, &records, config))
        .collect()
}

fn build_edge(
    canon: &Canonicalization<'_>,
    self_id: IdentityId,
    counterparty_id: IdentityId,
    records: &[&ResolvedRecord<'_>],
    config: &ScoringConfig,
) -> AssociationEdge {
    let mut sources: BTreeMap<Source, SourceEvidence> = BTreeMap::new();
    let mut first_seen: Option<NaiveDateTime> = None;
    let mut last_seen: Option<NaiveDateTime> = None;

    for r in records {
        let ev = sources.entry(r.record.source).or_default();
        ev.record_count += 1;
        if let Some(amount) = r.record.amount_cents {
            if amount >= 0 {
                ev.inbound_cents = ev.inbound_cents.saturating_add(amount);
            } else {
                ev.outbound_cents = ev.outbound_cents.saturating_add(amount.saturating_neg());
            }
        }
        if r.record.source == Source::Call {
            ev.call_count += 1;
            let secs = u64::from(r.record.duration_secs.unwrap_or(0));
            ev.call_duration_secs = ev.call_duration_secs.saturating_add(secs);
        }
        if let Some(ts) = r.timestamp {
            first_seen = Some(first_seen.map_or(ts, |f| f.min(ts)));
            last_seen = Some(last_seen.map_or(ts, |l| l.max(ts)));
        }
    }

    let counts: BTreeMap<Source, usize> =
        sources.iter().map(|(s, ev)| (*s, ev.record_count)).collect();
    for (source, ev) in sources.iter_mut() {
        ev.term = source_term(*source, ev.record_count, config);
    }
    let strength = strength(&counts, config);

    let mut refs: Vec<RecordRef> = records.iter().map(|r| r.record.record_ref()).collect();
    refs.sort();

    let active_days = match (first_seen, last_seen) {
        (Some(f), Some(l)) => Some((l.date() - f.date()).num_days() + 1),
        _ => None,
    };

    AssociationEdge {
        self_id,
        self_name: canon.display_name(self_id).to_string(),
        counterparty_id,
        counterparty_name: canon.display_name(counterparty_id).to_string(),
        sources,
        strength,
        records: refs,
        counterpart: counterpart_detail(records.iter().map(|r| r.record)),
        first_seen,
        last_seen,
        active_days,
    }
}

/// Counterparty phone/unit/role from the supporting records.
///
/// The most complete record wins (ties go to the earliest in record order);
/// fields it lacks are filled from the others, again in record order.
pub fn counterpart_detail<'a>(records: impl Iterator<Item = &'a RawRecord>) -> CounterpartDetail {
    let mut details: Vec<(RecordRef, CounterpartDetail)> = records
        .map(|r| {
            let cp = &r.counterparty;
            let detail = CounterpartDetail {
                phone: clean(cp.party.phone.as_deref()).map(str::to_string),
                unit: clean(cp.unit.as_deref()).map(str::to_string),
                role: clean(cp.role.as_deref()).map(str::to_string),
            };
            (r.record_ref(), detail)
        })
        .collect();
    details.sort_by(|(ra, da), (rb, db)| {
        completeness(db).cmp(&completeness(da)).then_with(|| ra.cmp(rb))
    });

    let mut out = CounterpartDetail::default();
    for (_, d) in details {
        if out.phone.is_none() {
            out.phone = d.phone;
        }
        if out.unit.is_none() {
            out.unit = d.unit;
        }
        if out.role.is_none() {
            out.role = d.role;
        }
    }
    out
}

fn completeness(d: &CounterpartDetail) -> usize {
    [d.phone.is_some(), d.unit.is_some(), d.role.is_some()]
        .iter()
        .filter(|&&present| present)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Saturation, SourceWeights};
    use crate::identity::canonicalize;
    use crate::model::{CounterpartyFields, PartyFields};

    fn rec(id: &str, source: Source, me: &str, other: &str, amount: Option<i64>) -> RawRecord {
        RawRecord {
            source,
            record_id: id.into(),
            self_party: PartyFields {
                name: Some(me.into()),
                ..PartyFields::default()
            },
            counterparty: CounterpartyFields {
                party: PartyFields {
                    name: Some(other.into()),
                    ..PartyFields::default()
                },
                unit: None,
                role: None,
            },
            amount_cents: amount,
            duration_secs: if source == Source::Call { Some(60) } else { None },
            timestamp: None,
            type_code: None,
            remark: None,
        }
    }

    fn edges(records: &[RawRecord]) -> Vec<AssociationEdge> {
        let mut refs: Vec<&RawRecord> = records.iter().collect();
        refs.sort();
        let canon = canonicalize(&refs);
        score_edges(&canon, &ScoringConfig::default())
    }

    #[test]
    fn repeated_sources_accumulate_into_one_edge() {
        let records = vec![
            rec("b1", Source::Bank, "张三", "李四", Some(52000)),
            rec("b2", Source::Bank, "张三", "李四", Some(-30000)),
            rec("w1", Source::ImPayment, "张三", "李四", Some(52000)),
            rec("c1", Source::Call, "张三", "王五", None),
        ];
        let edges = edges(&records);
        assert_eq!(edges.len(), 2);

        let lisi = edges.iter().find(|e| e.counterparty_name == "李四").unwrap();
        assert_eq!(
            lisi.sources_involved().into_iter().collect::<Vec<_>>(),
            vec![Source::Bank, Source::ImPayment]
        );
        let bank = &lisi.sources[&Source::Bank];
        assert_eq!(bank.record_count, 2);
        assert_eq!(bank.inbound_cents, 52000);
        assert_eq!(bank.outbound_cents, 30000);
        assert_eq!(lisi.records.len(), 3);

        let wangwu = edges.iter().find(|e| e.counterparty_name == "王五").unwrap();
        assert_eq!(wangwu.source_count(), 1);
        assert_eq!(wangwu.sources[&Source::Call].call_duration_secs, 60);
    }

    #[test]
    fn direction_matters() {
        let records = vec![
            rec("1", Source::Bank, "张三", "李四", Some(100)),
            rec("2", Source::Bank, "李四", "张三", Some(-100)),
        ];
        assert_eq!(edges(&records).len(), 2);
    }

    #[test]
    fn own_account_transfer_makes_no_edge() {
        let mut own = rec("b1", Source::Bank, "张三", "张三", Some(52000));
        own.self_party.account = Some("6222000011112222".into());
        own.counterparty.party.account = Some("6222000011112222".into());
        let records = vec![own, rec("b2", Source::Bank, "张三", "李四", Some(10000))];
        let edges = edges(&records);
        assert_eq!(edges.len(), 1);
        assert!(edges.iter().all(|e| e.self_id != e.counterparty_id));
        assert_eq!(edges[0].counterparty_name, "李四");
    }

    #[test]
    fn extreme_amounts_saturate() {
        let records = vec![
            rec("b1", Source::Bank, "张三", "李四", Some(i64::MIN)),
            rec("b2", Source::Bank, "张三", "李四", Some(i64::MIN)),
            rec("b3", Source::Bank, "张三", "李四", Some(i64::MAX)),
            rec("b4", Source::Bank, "张三", "李四", Some(i64::MAX)),
        ];
        let edges = edges(&records);
        let bank = &edges[0].sources[&Source::Bank];
        assert_eq!(bank.inbound_cents, i64::MAX);
        assert_eq!(bank.outbound_cents, i64::MAX);
    }

    #[test]
    fn strength_formula() {
        let config = ScoringConfig {
            source_bonus: 1.0,
            weights: SourceWeights {
                bank: 2.0,
                im_payment: 1.0,
                wallet_payment: 1.0,
                call: 0.5,
            },
            saturation: Saturation::Hyperbolic { half: 1.0 },
        };
        let counts = BTreeMap::from([(Source::Bank, 1), (Source::Call, 3)]);
        // 2 * 1/2 + 0.5 * 3/4 + 1 bonus
        let s = strength(&counts, &config);
        assert!((s - (1.0 + 0.375 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn strength_never_decreases() {
        let config = ScoringConfig::default();
        let mut counts = BTreeMap::from([(Source::Bank, 1)]);
        let mut prev = strength(&counts, &config);
        for _ in 0..30 {
            *counts.get_mut(&Source::Bank).unwrap() += 1;
            let s = strength(&counts, &config);
            assert!(s >= prev);
            prev = s;
        }
        counts.insert(Source::Call, 1);
        assert!(strength(&counts, &config) > prev);
    }

    #[test]
    fn counterpart_detail_prefers_most_complete() {
        let mut a = rec("a", Source::Call, "张三", "李四", None);
        a.counterparty.party.phone = Some("13900000002".into());
        let mut b = rec("b", Source::Call, "张三", "李四", None);
        b.counterparty.party.phone = Some("13900000099".into());
        b.counterparty.unit = Some("某某公司".into());
        let mut c = rec("c", Source::Call, "张三", "李四", None);
        c.counterparty.role = Some("经理".into());

        let detail = counterpart_detail([&a, &b, &c].into_iter());
        assert_eq!(detail.phone.as_deref(), Some("13900000099"));
        assert_eq!(detail.unit.as_deref(), Some("某某公司"));
        assert_eq!(detail.role.as_deref(), Some("经理"));
    }

    #[test]
    fn time_span_uses_valid_timestamps_only() {
        let mut a = rec("a", Source::Bank, "张三", "李四", Some(1));
        a.timestamp = Some("2024-01-01 10:00:00".into());
        let mut b = rec("b", Source::Bank, "张三", "李四", Some(1));
        b.timestamp = Some("2024-01-10 09:00:00".into());
        let mut c = rec("c", Source::Bank, "张三", "李四", Some(1));
        c.timestamp = Some("garbage".into());
        let edges = edges(&[a, b, c]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].sources[&Source::Bank].record_count, 3);
        assert_eq!(edges[0].active_days, Some(10));
    }
}
