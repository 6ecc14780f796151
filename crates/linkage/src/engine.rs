use std::collections::BTreeMap;

use crate::associate::score_edges;
use crate::classify::classify_all;
use crate::config::AnalysisConfig;
use crate::error::{Diagnostic, LinkageError};
use crate::highlight::highlight_amounts;
use crate::identity::canonicalize;
use crate::model::{AnalysisInput, AnalysisMeta, AnalysisResult, CashLabel, RecordRef, Source};
use crate::rank::select_top;
use crate::summary::{compute_cash_summary, compute_summary, SummaryInputs};

/// Run the full analysis: canonicalize identities, classify bank cash
/// movements, score and rank associations, highlight amounts.
///
/// Only an invalid config is an error. Data problems are reported as
/// diagnostics and never abort the run.
pub fn run(config: &AnalysisConfig, input: &AnalysisInput) -> Result<AnalysisResult, LinkageError> {
    config.validate()?;

    let records = input.sorted_records();
    let canon = canonicalize(&records);
    let mut diagnostics = canon.diagnostics.clone();

    let cash = classify_all(&canon.resolved, &config.cash);
    for c in &cash {
        if c.label == CashLabel::Unknown {
            diagnostics.push(Diagnostic::AmbiguousCashClassification {
                record: c.record.clone(),
            });
        }
    }
    let amounts: BTreeMap<RecordRef, i64> = canon
        .resolved
        .iter()
        .filter_map(|r| r.record.amount_cents.map(|a| (r.record.record_ref(), a)))
        .collect();
    let cash_summary = compute_cash_summary(&cash, &amounts);

    let all_edges = score_edges(&canon, &config.scoring);
    let total_edges = all_edges.len();
    let cross_source = all_edges.iter().filter(|e| e.source_count() > 1).count();
    let edges = select_top(all_edges.clone(), config.ranking.top_n);

    let highlights = highlight_amounts(&canon, &config.highlight);

    if canon.resolved.is_empty() {
        log::warn!("no resolvable records in input");
        diagnostics.push(Diagnostic::EmptyDataset);
    }
    diagnostics.sort();
    diagnostics.dedup();

    let mut records_by_source: BTreeMap<Source, usize> = BTreeMap::new();
    for r in &records {
        *records_by_source.entry(r.source).or_insert(0) += 1;
    }

    let summary = compute_summary(SummaryInputs {
        total_records: records.len(),
        resolved_records: canon.resolved.len(),
        identities: canon.identities.len(),
        all_edges: &all_edges,
        ranked_edges: edges.len(),
        records_by_source,
        cash: cash_summary,
    });

    log::info!(
        "analysis '{}': {} records, {} identities, {} edges ({} cross-source), {} ranked, {} highlights, {} diagnostics",
        config.name,
        summary.total_records,
        summary.identities,
        total_edges,
        cross_source,
        edges.len(),
        highlights.len(),
        diagnostics.len()
    );

    Ok(AnalysisResult {
        meta: AnalysisMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        identities: canon.identities,
        cash,
        edges,
        highlights,
        diagnostics,
    })
}
