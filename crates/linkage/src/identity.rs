//! Identity canonicalizer.
//!
//! Resolves the self and counterparty side of every record to a
//! [`CanonicalIdentity`]. Keys have a strict priority: phone, then
//! account/card, then display name. Two keys are proven equivalent when they
//! appear together on one record side; equivalences are resolved with a
//! [`DisjointSet`] so chains of merges stay transitive.
//!
//! The result does not depend on record order: keys are indexed in sorted
//! order, strong-key unions commute, and name attachment is decided only
//! after every strong-key union has been applied.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Diagnostic;
use crate::model::{
    Canonicalization, CanonicalIdentity, IdentityId, PartyFields, RawRecord, RecordRef,
    ResolvedRecord, Side,
};
use crate::normalize::{display_name, normalize_account, normalize_name, normalize_phone};
use crate::timestamp::{parse_timestamp, ParsedTimestamp};
use crate::union_find::DisjointSet;

/// A normalized identity key. Variant order is the key priority, so the
/// smallest key of a merged set is always its strongest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdentityKey {
    Phone(String),
    Account(String),
    Name(String),
}

/// Normalized keys found on one side of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideKeys {
    pub phone: Option<String>,
    pub account: Option<String>,
    pub name: Option<String>,
    pub display: Option<String>,
}

impl SideKeys {
    pub fn from_party(party: &PartyFields) -> Self {
        Self {
            phone: normalize_phone(party.phone.as_deref()),
            account: normalize_account(party.account.as_deref()),
            name: normalize_name(party.name.as_deref()),
            display: display_name(party.name.as_deref()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.account.is_none() && self.name.is_none()
    }

    /// Strongest key present, the one this side resolves through.
    pub fn primary(&self) -> Option<IdentityKey> {
        self.strong().or_else(|| self.name.clone().map(IdentityKey::Name))
    }

    fn strong(&self) -> Option<IdentityKey> {
        self.phone
            .clone()
            .map(IdentityKey::Phone)
            .or_else(|| self.account.clone().map(IdentityKey::Account))
    }

    fn all(&self) -> impl Iterator<Item = IdentityKey> + '_ {
        let phone = self.phone.clone().map(IdentityKey::Phone);
        let account = self.account.clone().map(IdentityKey::Account);
        let name = self.name.clone().map(IdentityKey::Name);
        phone.into_iter().chain(account).chain(name)
    }
}

struct Candidate<'a> {
    record: &'a RawRecord,
    self_keys: SideKeys,
    counterparty_keys: Option<SideKeys>,
}

impl Candidate<'_> {
    fn sides(&self) -> impl Iterator<Item = &SideKeys> {
        std::iter::once(&self.self_keys).chain(self.counterparty_keys.as_ref())
    }
}

/// Key index plus the forest over it.
struct KeyUniverse {
    index: BTreeMap<IdentityKey, usize>,
    sets: DisjointSet,
}

impl KeyUniverse {
    fn build(keys: impl Iterator<Item = IdentityKey>) -> Self {
        let sorted: BTreeSet<IdentityKey> = keys.collect();
        let index: BTreeMap<IdentityKey, usize> =
            sorted.into_iter().enumerate().map(|(i, k)| (k, i)).collect();
        let sets = DisjointSet::new(index.len());
        Self { index, sets }
    }

    fn node(&self, key: &IdentityKey) -> usize {
        // Every key handed in here was collected in `build`.
        self.index[key]
    }

    fn root_of(&mut self, key: &IdentityKey) -> usize {
        let node = self.node(key);
        self.sets.find(node)
    }
}

/// Canonicalize records, which must already be in canonical order.
pub fn canonicalize<'a>(records: &[&'a RawRecord]) -> Canonicalization<'a> {
    let mut diagnostics = Vec::new();
    let mut candidates = Vec::with_capacity(records.len());

    for &record in records {
        let self_keys = SideKeys::from_party(&record.self_party);
        if self_keys.is_empty() {
            log::warn!("record {}: no usable self identity key, excluded", record.record_ref());
            diagnostics.push(Diagnostic::UnresolvedIdentity {
                record: record.record_ref(),
                side: Side::SelfParty,
            });
            continue;
        }
        let counterparty_keys = SideKeys::from_party(&record.counterparty.party);
        let counterparty_keys = if counterparty_keys.is_empty() {
            log::warn!(
                "record {}: no usable counterparty identity key, excluded from association",
                record.record_ref()
            );
            diagnostics.push(Diagnostic::UnresolvedIdentity {
                record: record.record_ref(),
                side: Side::Counterparty,
            });
            None
        } else {
            Some(counterparty_keys)
        };
        candidates.push(Candidate {
            record,
            self_keys,
            counterparty_keys,
        });
    }

    let mut universe =
        KeyUniverse::build(candidates.iter().flat_map(|c| c.sides()).flat_map(|s| s.all()));

    // Phase 1: phone and account seen on the same side are one party.
    let mut strong_merges = 0usize;
    for side in candidates.iter().flat_map(|c| c.sides()) {
        if let (Some(phone), Some(account)) = (&side.phone, &side.account) {
            let a = universe.node(&IdentityKey::Phone(phone.clone()));
            let b = universe.node(&IdentityKey::Account(account.clone()));
            if universe.sets.union(a, b) {
                strong_merges += 1;
            }
        }
    }

    // Phase 2: attach each name to the strong identity it co-occurs with.
    let mut cooccurrence: BTreeMap<usize, BTreeMap<usize, usize>> = BTreeMap::new();
    for side in candidates.iter().flat_map(|c| c.sides()) {
        if let (Some(name), Some(strong)) = (&side.name, side.strong()) {
            let name_node = universe.node(&IdentityKey::Name(name.clone()));
            let strong_root = universe.root_of(&strong);
            *cooccurrence
                .entry(name_node)
                .or_default()
                .entry(strong_root)
                .or_insert(0) += 1;
        }
    }
    let mut name_merges = 0usize;
    for (name_node, roots) in &cooccurrence {
        let mut best: Option<(usize, usize)> = None;
        for (&root, &count) in roots {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((root, count));
            }
        }
        if roots.len() > 1 {
            log::debug!(
                "name node {name_node} seen with {} strong identities; attaching to the most frequent",
                roots.len()
            );
        }
        if let Some((root, _)) = best {
            if universe.sets.union(*name_node, root) {
                name_merges += 1;
            }
        }
    }
    log::debug!(
        "canonicalize: {} keys, {strong_merges} strong merges, {name_merges} name attachments",
        universe.index.len()
    );

    // Dense ids in root order. A root is the smallest node of its set and
    // nodes are numbered in key order, so ids follow representative keys.
    let keys: Vec<IdentityKey> = universe.index.keys().cloned().collect();
    let roots: BTreeSet<usize> = keys.iter().map(|k| universe.root_of(k)).collect();
    let root_ids: BTreeMap<usize, IdentityId> = roots
        .into_iter()
        .enumerate()
        .map(|(i, root)| (root, IdentityId(i)))
        .collect();

    let mut builders: Vec<IdentityBuilder> =
        (0..root_ids.len()).map(|_| IdentityBuilder::default()).collect();

    let mut resolved = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let record = candidate.record;
        let rref = record.record_ref();

        let Some(self_id) = resolve_side(&mut universe, &root_ids, &candidate.self_keys) else {
            continue;
        };
        builders[self_id.0].absorb(&candidate.self_keys, &rref);

        let counterparty = candidate
            .counterparty_keys
            .as_ref()
            .and_then(|keys| resolve_side(&mut universe, &root_ids, keys).map(|id| (id, keys)))
            .map(|(id, keys)| {
                builders[id.0].absorb(keys, &rref);
                id
            });

        let timestamp = match parse_timestamp(record.timestamp.as_deref()) {
            ParsedTimestamp::Valid(ts) => Some(ts),
            ParsedTimestamp::Absent => None,
            ParsedTimestamp::Malformed(value) => {
                log::warn!("record {rref}: malformed timestamp '{value}'");
                diagnostics.push(Diagnostic::MalformedTimestamp {
                    record: rref.clone(),
                    value,
                });
                None
            }
        };

        resolved.push(ResolvedRecord {
            record,
            self_id,
            counterparty,
            timestamp,
        });
    }

    let identities = builders
        .into_iter()
        .enumerate()
        .map(|(i, b)| b.finish(IdentityId(i)))
        .collect();

    Canonicalization {
        identities,
        resolved,
        diagnostics,
    }
}

fn resolve_side(
    universe: &mut KeyUniverse,
    root_ids: &BTreeMap<usize, IdentityId>,
    keys: &SideKeys,
) -> Option<IdentityId> {
    let key = keys.primary()?;
    let root = universe.root_of(&key);
    root_ids.get(&root).copied()
}

#[derive(Default)]
struct IdentityBuilder {
    name_counts: BTreeMap<String, usize>,
    phones: BTreeSet<String>,
    accounts: BTreeSet<String>,
    records: BTreeSet<RecordRef>,
}

impl IdentityBuilder {
    fn absorb(&mut self, keys: &SideKeys, record: &RecordRef) {
        if let Some(display) = &keys.display {
            *self.name_counts.entry(display.clone()).or_insert(0) += 1;
        }
        if let Some(phone) = &keys.phone {
            self.phones.insert(phone.clone());
        }
        if let Some(account) = &keys.account {
            self.accounts.insert(account.clone());
        }
        self.records.insert(record.clone());
    }

    fn finish(self, id: IdentityId) -> CanonicalIdentity {
        let mut best: Option<(&String, usize)> = None;
        for (name, &count) in &self.name_counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((name, count));
            }
        }
        let display_name = best
            .map(|(name, _)| name.clone())
            .or_else(|| self.phones.iter().next().cloned())
            .or_else(|| self.accounts.iter().next().cloned())
            .unwrap_or_default();

        CanonicalIdentity {
            id,
            display_name,
            names: self.name_counts.into_keys().collect(),
            phones: self.phones,
            accounts: self.accounts,
            records: self.records,
        }
    }
}
