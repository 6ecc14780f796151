//! Cash-movement classifier for bank records.
//!
//! An ordered cascade of pure rules; the first rule that returns a label
//! wins. Each rule is a plain function so it can be tested on its own.

use crate::config::CashConfig;
use crate::model::{CashClassification, CashLabel, IdentityId, RawRecord, ResolvedRecord, Source};
use crate::normalize::clean;

/// What a rule gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct CashContext<'a> {
    pub record: &'a RawRecord,
    pub self_id: IdentityId,
    pub counterparty: Option<IdentityId>,
}

impl<'a> CashContext<'a> {
    pub fn from_resolved(resolved: &ResolvedRecord<'a>) -> Self {
        Self {
            record: resolved.record,
            self_id: resolved.self_id,
            counterparty: resolved.counterparty,
        }
    }

    fn code(&self) -> Option<&'a str> {
        clean(self.record.type_code.as_deref())
    }

    fn remark(&self) -> Option<&'a str> {
        clean(self.record.remark.as_deref())
    }

    fn amount(&self) -> i64 {
        self.record.amount_cents.unwrap_or(0)
    }

    /// No counterparty, or the counterparty is the account holder.
    fn counterparty_is_self_or_empty(&self) -> bool {
        match self.counterparty {
            None => true,
            Some(id) => id == self.self_id,
        }
    }
}

pub struct CashRule {
    pub name: &'static str,
    pub confidence: f64,
    pub apply: fn(&CashContext<'_>, &CashConfig) -> Option<CashLabel>,
}

/// The cascade, in priority order. Rule indices reported are 1-based.
pub const RULES: [CashRule; 4] = [
    CashRule {
        name: "explicit_type_code",
        confidence: 0.95,
        apply: rule_explicit_code,
    },
    CashRule {
        name: "cash_channel_remark",
        confidence: 0.80,
        apply: rule_cash_channel_remark,
    },
    CashRule {
        name: "resolved_transfer",
        confidence: 0.60,
        apply: rule_resolved_transfer,
    },
    CashRule {
        name: "fallback",
        confidence: 0.0,
        apply: rule_fallback,
    },
];

fn contains_any(text: &str, words: &[String]) -> bool {
    let lower = text.to_lowercase();
    words
        .iter()
        .filter(|w| !w.is_empty())
        .any(|w| lower.contains(&w.to_lowercase()))
}

fn by_direction(amount: i64) -> Option<CashLabel> {
    match amount.signum() {
        1 => Some(CashLabel::Deposit),
        -1 => Some(CashLabel::Withdrawal),
        _ => None,
    }
}

/// Rule 1: the type code names an ATM/counter deposit or withdrawal and the
/// amount moves in that direction. A code contradicted by the sign falls
/// through to the later rules.
pub fn rule_explicit_code(ctx: &CashContext<'_>, config: &CashConfig) -> Option<CashLabel> {
    let code = ctx.code()?;
    let deposit = contains_any(code, &config.deposit_codes);
    let withdrawal = contains_any(code, &config.withdrawal_codes);
    let amount = ctx.amount();
    match (deposit, withdrawal) {
        (true, false) if amount >= 0 => Some(CashLabel::Deposit),
        (false, true) if amount <= 0 => Some(CashLabel::Withdrawal),
        (true, true) => by_direction(amount),
        _ => None,
    }
}

/// Rule 2: no counterparty, remark mentions a cash channel, and nothing in
/// the record says payroll, settlement or transfer.
pub fn rule_cash_channel_remark(ctx: &CashContext<'_>, config: &CashConfig) -> Option<CashLabel> {
    if !ctx.counterparty_is_self_or_empty() {
        return None;
    }
    let remark = ctx.remark()?;
    if !contains_any(remark, &config.cash_vocabulary) {
        return None;
    }
    let vetoed = contains_any(remark, &config.exclude_vocabulary)
        || ctx.code().is_some_and(|c| contains_any(c, &config.exclude_vocabulary));
    if vetoed {
        return None;
    }
    by_direction(ctx.amount())
}

/// Rule 3: money moved between two distinct resolved identities.
pub fn rule_resolved_transfer(ctx: &CashContext<'_>, _config: &CashConfig) -> Option<CashLabel> {
    match ctx.counterparty {
        Some(id) if id != ctx.self_id => Some(CashLabel::Transfer),
        _ => None,
    }
}

/// Rule 4: always fires.
pub fn rule_fallback(_ctx: &CashContext<'_>, _config: &CashConfig) -> Option<CashLabel> {
    Some(CashLabel::Unknown)
}

/// Run the cascade on one bank record. Returns `None` for other sources.
pub fn classify_record(ctx: &CashContext<'_>, config: &CashConfig) -> Option<CashClassification> {
    if ctx.record.source != Source::Bank {
        return None;
    }
    RULES.iter().enumerate().find_map(|(i, rule)| {
        (rule.apply)(ctx, config).map(|label| CashClassification {
            record: ctx.record.record_ref(),
            label,
            rule: (i + 1) as u8,
            rule_name: rule.name,
            confidence: rule.confidence,
        })
    })
}

/// Classify every bank record in a resolved set, in record order.
pub fn classify_all(resolved: &[ResolvedRecord<'_>], config: &CashConfig) -> Vec<CashClassification> {
    resolved
        .iter()
        .filter_map(|r| classify_record(&CashContext::from_resolved(r), config))
        .collect()
}
