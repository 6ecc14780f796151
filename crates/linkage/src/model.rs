use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::Diagnostic;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Where a record came from. Ordering is the canonical source order used
/// everywhere output must be deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Bank,
    ImPayment,
    WalletPayment,
    Call,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Bank,
        Source::ImPayment,
        Source::WalletPayment,
        Source::Call,
    ];

    /// Whether records from this source carry a money amount.
    pub fn carries_amount(&self) -> bool {
        !matches!(self, Self::Call)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bank => write!(f, "bank"),
            Self::ImPayment => write!(f, "im_payment"),
            Self::WalletPayment => write!(f, "wallet_payment"),
            Self::Call => write!(f, "call"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" => Ok(Self::Bank),
            "im_payment" => Ok(Self::ImPayment),
            "wallet_payment" => Ok(Self::WalletPayment),
            "call" => Ok(Self::Call),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

/// Identity fields for one side of a record, exactly as the source gave them.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartyFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub account: Option<String>,
}

/// Counterparty side: identity fields plus the descriptive detail some
/// sources (mostly call records) carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CounterpartyFields {
    pub party: PartyFields,
    pub unit: Option<String>,
    pub role: Option<String>,
}

/// A single record already mapped into the canonical schema.
///
/// `amount_cents` is signed: positive is money flowing in to the self side,
/// negative is money flowing out. Call records carry `duration_secs` instead.
/// Field order matters: the derived `Ord` sorts by (source, record_id) first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawRecord {
    pub source: Source,
    pub record_id: String,
    pub self_party: PartyFields,
    pub counterparty: CounterpartyFields,
    pub amount_cents: Option<i64>,
    pub duration_secs: Option<u32>,
    pub timestamp: Option<String>,
    pub type_code: Option<String>,
    pub remark: Option<String>,
}

impl RawRecord {
    pub fn record_ref(&self) -> RecordRef {
        RecordRef {
            source: self.source,
            record_id: self.record_id.clone(),
        }
    }
}

/// Stable reference to a record: (source, record_id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordRef {
    pub source: Source,
    pub record_id: String,
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.record_id)
    }
}

/// Fully materialized input for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub records: Vec<RawRecord>,
}

impl AnalysisInput {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    /// Records in canonical (source, record_id, ..) order.
    pub fn sorted_records(&self) -> Vec<&RawRecord> {
        let mut sorted: Vec<&RawRecord> = self.records.iter().collect();
        sorted.sort();
        sorted
    }
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Dense id of a canonical identity. Ids are assigned in the order of each
/// identity's representative key, so they do not depend on input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IdentityId(pub usize);

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalIdentity {
    pub id: IdentityId,
    pub display_name: String,
    pub names: BTreeSet<String>,
    pub phones: BTreeSet<String>,
    pub accounts: BTreeSet<String>,
    pub records: BTreeSet<RecordRef>,
}

/// Which side of a record an identity was resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    SelfParty,
    Counterparty,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfParty => write!(f, "self"),
            Self::Counterparty => write!(f, "counterparty"),
        }
    }
}

/// A record after canonicalization. `counterparty` is `None` when the
/// record carried no usable counterparty key (typical for cash movements).
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRecord<'a> {
    pub record: &'a RawRecord,
    pub self_id: IdentityId,
    pub counterparty: Option<IdentityId>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Canonicalizer output: the identity universe plus per-record resolution.
#[derive(Debug)]
pub struct Canonicalization<'a> {
    pub identities: Vec<CanonicalIdentity>,
    pub resolved: Vec<ResolvedRecord<'a>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Canonicalization<'_> {
    pub fn identity(&self, id: IdentityId) -> &CanonicalIdentity {
        &self.identities[id.0]
    }

    pub fn display_name(&self, id: IdentityId) -> &str {
        &self.identities[id.0].display_name
    }
}

// ---------------------------------------------------------------------------
// Cash classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CashLabel {
    Deposit,
    Withdrawal,
    Transfer,
    Unknown,
}

impl std::fmt::Display for CashLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
            Self::Transfer => write!(f, "transfer"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashClassification {
    pub record: RecordRef,
    pub label: CashLabel,
    /// 1-based index of the rule that fired.
    pub rule: u8,
    pub rule_name: &'static str,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

/// Per-source evidence accumulated inside one edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceEvidence {
    pub record_count: usize,
    pub inbound_cents: i64,
    pub outbound_cents: i64,
    pub call_count: usize,
    pub call_duration_secs: u64,
    /// This source's contribution to the edge strength.
    pub term: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CounterpartDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationEdge {
    pub self_id: IdentityId,
    pub self_name: String,
    pub counterparty_id: IdentityId,
    pub counterparty_name: String,
    pub sources: BTreeMap<Source, SourceEvidence>,
    pub strength: f64,
    pub records: Vec<RecordRef>,
    pub counterpart: CounterpartDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_days: Option<i64>,
}

impl AssociationEdge {
    pub fn sources_involved(&self) -> BTreeSet<Source> {
        self.sources.keys().copied().collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

// ---------------------------------------------------------------------------
// Highlights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterpartCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountHighlight {
    pub amount_cents: i64,
    pub mandatory: bool,
    pub occurrences: usize,
    pub total_cents: i64,
    pub counterparts: Vec<CounterpartCount>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CashSummary {
    pub deposit_count: usize,
    pub deposit_total_cents: i64,
    pub withdrawal_count: usize,
    pub withdrawal_total_cents: i64,
    pub transfer_count: usize,
    pub unknown_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total_records: usize,
    pub resolved_records: usize,
    pub excluded_records: usize,
    pub identities: usize,
    pub total_edges: usize,
    pub ranked_edges: usize,
    pub cross_source_edges: usize,
    pub records_by_source: BTreeMap<Source, usize>,
    pub cash: CashSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub meta: AnalysisMeta,
    pub summary: AnalysisSummary,
    pub identities: Vec<CanonicalIdentity>,
    pub cash: Vec<CashClassification>,
    pub edges: Vec<AssociationEdge>,
    pub highlights: Vec<AmountHighlight>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
