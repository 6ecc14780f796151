use std::collections::BTreeMap;

use crate::model::{
    AnalysisSummary, AssociationEdge, CashClassification, CashLabel, CashSummary, RecordRef,
    Source,
};

/// Count and total each cash label. Totals are absolute cents.
pub fn compute_cash_summary(
    classifications: &[CashClassification],
    amounts: &BTreeMap<RecordRef, i64>,
) -> CashSummary {
    let mut summary = CashSummary::default();
    for c in classifications {
        let amount = amounts.get(&c.record).copied().unwrap_or(0).saturating_abs();
        match c.label {
            CashLabel::Deposit => {
                summary.deposit_count += 1;
                summary.deposit_total_cents = summary.deposit_total_cents.saturating_add(amount);
            }
            CashLabel::Withdrawal => {
                summary.withdrawal_count += 1;
                summary.withdrawal_total_cents = summary.withdrawal_total_cents.saturating_add(amount);
            }
            CashLabel::Transfer => summary.transfer_count += 1,
            CashLabel::Unknown => summary.unknown_count += 1,
        }
    }
    summary
}

pub struct SummaryInputs<'a> {
    pub total_records: usize,
    pub resolved_records: usize,
    pub identities: usize,
    pub all_edges: &'a [AssociationEdge],
    pub ranked_edges: usize,
    pub records_by_source: BTreeMap<Source, usize>,
    pub cash: CashSummary,
}

/// Compute run-level statistics.
pub fn compute_summary(inputs: SummaryInputs<'_>) -> AnalysisSummary {
    AnalysisSummary {
        total_records: inputs.total_records,
        resolved_records: inputs.resolved_records,
        excluded_records: inputs.total_records - inputs.resolved_records,
        identities: inputs.identities,
        total_edges: inputs.all_edges.len(),
        ranked_edges: inputs.ranked_edges,
        cross_source_edges: inputs
            .all_edges
            .iter()
            .filter(|e| e.source_count() > 1)
            .count(),
        records_by_source: inputs.records_by_source,
        cash: inputs.cash,
    }
}
