use serde::Deserialize;

use crate::error::LinkageError;
use crate::model::Source;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub cash: CashConfig,
}

fn default_name() -> String {
    "analysis".into()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            scoring: ScoringConfig::default(),
            ranking: RankingConfig::default(),
            highlight: HighlightConfig::default(),
            cash: CashConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Added once for every distinct source beyond the first.
    #[serde(default = "default_source_bonus")]
    pub source_bonus: f64,
    #[serde(default)]
    pub weights: SourceWeights,
    #[serde(default)]
    pub saturation: Saturation,
}

fn default_source_bonus() -> f64 {
    1.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            source_bonus: default_source_bonus(),
            weights: SourceWeights::default(),
            saturation: Saturation::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceWeights {
    #[serde(default = "default_bank_weight")]
    pub bank: f64,
    #[serde(default = "default_payment_weight")]
    pub im_payment: f64,
    #[serde(default = "default_payment_weight")]
    pub wallet_payment: f64,
    #[serde(default = "default_call_weight")]
    pub call: f64,
}

fn default_bank_weight() -> f64 {
    1.0
}

fn default_payment_weight() -> f64 {
    0.8
}

fn default_call_weight() -> f64 {
    0.6
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            bank: default_bank_weight(),
            im_payment: default_payment_weight(),
            wallet_payment: default_payment_weight(),
            call: default_call_weight(),
        }
    }
}

impl SourceWeights {
    pub fn weight(&self, source: Source) -> f64 {
        match source {
            Source::Bank => self.bank,
            Source::ImPayment => self.im_payment,
            Source::WalletPayment => self.wallet_payment,
            Source::Call => self.call,
        }
    }
}

/// Diminishing-returns curve applied to a source's record count.
///
/// Every shape is zero at zero and strictly increasing in the count, which
/// is what keeps edge strength monotone.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Saturation {
    /// `1 - e^(-n / scale)`, bounded by 1.
    Exponential { scale: f64 },
    /// `ln(1 + n)`, unbounded but slow.
    Logarithmic,
    /// `n / (n + half)`, reaches 0.5 at `n == half`.
    Hyperbolic { half: f64 },
}

impl Default for Saturation {
    fn default() -> Self {
        Self::Exponential { scale: 5.0 }
    }
}

impl Saturation {
    pub fn apply(&self, count: usize) -> f64 {
        let n = count as f64;
        match *self {
            Self::Exponential { scale } => 1.0 - (-n / scale).exp(),
            Self::Logarithmic => n.ln_1p(),
            Self::Hyperbolic { half } => n / (n + half),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking + Highlight
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    10
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_n: default_top_n() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    /// Amounts in yuan that are always reported in full, in this order.
    #[serde(default = "default_mandatory_amounts")]
    pub mandatory_amounts: Vec<f64>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_mandatory_amounts() -> Vec<f64> {
    vec![1314.0, 520.0, 521.0]
}

fn default_top_k() -> usize {
    3
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            mandatory_amounts: default_mandatory_amounts(),
            top_k: default_top_k(),
        }
    }
}

impl HighlightConfig {
    /// Mandatory amounts in cents, configured order preserved.
    pub fn mandatory_cents(&self) -> Vec<i64> {
        self.mandatory_amounts
            .iter()
            .map(|yuan| (yuan * 100.0).round() as i64)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Cash vocabularies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CashConfig {
    /// Type codes that explicitly mean a cash deposit.
    #[serde(default = "default_deposit_codes")]
    pub deposit_codes: Vec<String>,
    /// Type codes that explicitly mean a cash withdrawal.
    #[serde(default = "default_withdrawal_codes")]
    pub withdrawal_codes: Vec<String>,
    /// Remark words pointing at a cash channel.
    #[serde(default = "default_cash_vocabulary")]
    pub cash_vocabulary: Vec<String>,
    /// Remark words that veto the cash-channel rule.
    #[serde(default = "default_exclude_vocabulary")]
    pub exclude_vocabulary: Vec<String>,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn default_deposit_codes() -> Vec<String> {
    strings(&["ATM存款", "ATM存现", "现金存入", "现金存款", "柜台存现", "存现", "现存"])
}

fn default_withdrawal_codes() -> Vec<String> {
    strings(&["ATM取款", "ATM取现", "现金支取", "柜台取现", "取现", "现支"])
}

fn default_cash_vocabulary() -> Vec<String> {
    strings(&["现金", "ATM", "柜台", "存现", "取现", "现存", "现支"])
}

fn default_exclude_vocabulary() -> Vec<String> {
    strings(&["工资", "代发", "结算", "转账", "汇款", "退款", "理财", "利息"])
}

impl Default for CashConfig {
    fn default() -> Self {
        Self {
            deposit_codes: default_deposit_codes(),
            withdrawal_codes: default_withdrawal_codes(),
            cash_vocabulary: default_cash_vocabulary(),
            exclude_vocabulary: default_exclude_vocabulary(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AnalysisConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkageError> {
        let config: AnalysisConfig =
            toml::from_str(input).map_err(|e| LinkageError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkageError> {
        let scoring = &self.scoring;

        for source in Source::ALL {
            let w = scoring.weights.weight(source);
            if !w.is_finite() || w < 0.0 {
                return Err(LinkageError::ConfigValidation(format!(
                    "weight for '{source}' must be a finite non-negative number, got {w}"
                )));
            }
        }

        if !scoring.source_bonus.is_finite() || scoring.source_bonus < 0.0 {
            return Err(LinkageError::ConfigValidation(format!(
                "source_bonus must be a finite non-negative number, got {}",
                scoring.source_bonus
            )));
        }

        match scoring.saturation {
            Saturation::Exponential { scale: p } | Saturation::Hyperbolic { half: p } => {
                if !p.is_finite() || p <= 0.0 {
                    return Err(LinkageError::ConfigValidation(format!(
                        "saturation parameter must be a finite positive number, got {p}"
                    )));
                }
            }
            Saturation::Logarithmic => {}
        }

        if self.ranking.top_n == 0 {
            return Err(LinkageError::ConfigValidation(
                "ranking.top_n must be at least 1".into(),
            ));
        }

        let mut seen = Vec::new();
        for (amount, cents) in self
            .highlight
            .mandatory_amounts
            .iter()
            .zip(self.highlight.mandatory_cents())
        {
            if !amount.is_finite() || *amount <= 0.0 {
                return Err(LinkageError::ConfigValidation(format!(
                    "mandatory amount must be a finite positive number, got {amount}"
                )));
            }
            if seen.contains(&cents) {
                return Err(LinkageError::ConfigValidation(format!(
                    "mandatory amount {amount} listed more than once"
                )));
            }
            seen.push(cents);
        }

        if self.cash.deposit_codes.is_empty() || self.cash.withdrawal_codes.is_empty() {
            return Err(LinkageError::ConfigValidation(
                "cash.deposit_codes and cash.withdrawal_codes must not be empty".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Family case"

[scoring]
source_bonus = 2.5

[scoring.weights]
bank = 1.2
call = 0.3

[scoring.saturation]
shape = "hyperbolic"
half = 4.0

[ranking]
top_n = 15

[highlight]
mandatory_amounts = [520, 13.14]
top_k = 5

[cash]
cash_vocabulary = ["现金"]
"#;

    #[test]
    fn parse_full() {
        let config = AnalysisConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Family case");
        assert_eq!(config.scoring.source_bonus, 2.5);
        assert_eq!(config.scoring.weights.bank, 1.2);
        assert_eq!(config.scoring.weights.call, 0.3);
        // Unspecified weights keep their defaults
        assert_eq!(config.scoring.weights.im_payment, 0.8);
        assert_eq!(config.scoring.saturation, Saturation::Hyperbolic { half: 4.0 });
        assert_eq!(config.ranking.top_n, 15);
        assert_eq!(config.highlight.mandatory_cents(), vec![52000, 1314]);
        assert_eq!(config.highlight.top_k, 5);
        assert_eq!(config.cash.cash_vocabulary, vec!["现金"]);
        assert!(!config.cash.deposit_codes.is_empty());
    }

    #[test]
    fn empty_document_gives_defaults() {
        let config = AnalysisConfig::from_toml("").unwrap();
        assert_eq!(config.name, "analysis");
        assert_eq!(config.ranking.top_n, 10);
        assert_eq!(config.highlight.top_k, 3);
        assert_eq!(config.highlight.mandatory_cents(), vec![131400, 52000, 52100]);
        assert_eq!(config.scoring.saturation, Saturation::Exponential { scale: 5.0 });
    }

    #[test]
    fn logarithmic_shape_needs_no_parameter() {
        let config = AnalysisConfig::from_toml(
            r#"
[scoring.saturation]
shape = "logarithmic"
"#,
        )
        .unwrap();
        assert_eq!(config.scoring.saturation, Saturation::Logarithmic);
    }

    #[test]
    fn reject_unknown_shape() {
        let err = AnalysisConfig::from_toml(
            r#"
[scoring.saturation]
shape = "linear"
"#,
        );
        assert!(matches!(err, Err(LinkageError::ConfigParse(_))));
    }

    #[test]
    fn reject_negative_weight() {
        let err = AnalysisConfig::from_toml(
            r#"
[scoring.weights]
wallet_payment = -1.0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("wallet_payment"));
    }

    #[test]
    fn reject_zero_scale() {
        let err = AnalysisConfig::from_toml(
            r#"
[scoring.saturation]
shape = "exponential"
scale = 0.0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("saturation parameter"));
    }

    #[test]
    fn reject_zero_top_n() {
        let err = AnalysisConfig::from_toml("[ranking]\ntop_n = 0\n").unwrap_err();
        assert!(err.to_string().contains("top_n"));
    }

    #[test]
    fn reject_duplicate_mandatory_amount() {
        let err = AnalysisConfig::from_toml("[highlight]\nmandatory_amounts = [520, 520.0]\n")
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn saturation_shapes_are_zero_at_zero_and_increasing() {
        for shape in [
            Saturation::Exponential { scale: 3.0 },
            Saturation::Logarithmic,
            Saturation::Hyperbolic { half: 2.0 },
        ] {
            assert_eq!(shape.apply(0), 0.0);
            let mut prev = 0.0;
            for n in 1..50 {
                let v = shape.apply(n);
                assert!(v > prev, "{shape:?} not increasing at {n}");
                prev = v;
            }
        }
    }
}
