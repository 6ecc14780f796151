//! Canonical CSV ingestion.
//!
//! Inputs are already mapped to the canonical column names; source-specific
//! field mapping happens upstream. Optional columns may be left out of the
//! header entirely.

use std::path::Path;

use crate::error::LinkageError;
use crate::model::{CounterpartyFields, PartyFields, RawRecord, Source};
use crate::normalize::clean;

pub const COLUMNS: [&str; 14] = [
    "record_id",
    "self_name",
    "self_phone",
    "self_account",
    "cp_name",
    "cp_phone",
    "cp_account",
    "cp_unit",
    "cp_role",
    "amount",
    "duration",
    "timestamp",
    "type_code",
    "remark",
];

/// Columns a source cannot do without.
fn required_columns(source: Source) -> &'static [&'static str] {
    if source.carries_amount() {
        &["record_id", "amount"]
    } else {
        &["record_id", "duration"]
    }
}

/// Largest accepted amount magnitude, in cents. Leaves headroom for sums.
pub const MAX_AMOUNT_CENTS: i64 = i64::MAX / 1024;

/// Parse a decimal yuan string ("1,314.00", "-520", "¥ 88.8") into cents.
/// Amounts beyond [`MAX_AMOUNT_CENTS`] are rejected.
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '¥' | '￥' | ' '))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    let cents = (value * 100.0).round();
    if !cents.is_finite() || cents.abs() > MAX_AMOUNT_CENTS as f64 {
        return None;
    }
    Some(cents as i64)
}

/// Parse a call duration in whole seconds. "75.0" is accepted.
pub fn parse_duration_secs(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<u32>() {
        return Some(secs);
    }
    let value: f64 = trimmed.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) {
        Some(value.round() as u32)
    } else {
        None
    }
}

/// Load canonical records for one source from CSV text.
pub fn load_csv_records(source: Source, csv_data: &str) -> Result<Vec<RawRecord>, LinkageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LinkageError::Io(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    for column in required_columns(source) {
        if !headers.iter().any(|h| h == column) {
            return Err(LinkageError::MissingColumn {
                source,
                column: (*column).into(),
            });
        }
    }

    let idx: Vec<Option<usize>> = COLUMNS
        .iter()
        .map(|name| headers.iter().position(|h| h == name))
        .collect();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| LinkageError::Io(e.to_string()))?;
        let field = |column: usize| -> Option<String> {
            let i = idx[column]?;
            clean(row.get(i)).map(str::to_string)
        };

        // Rows without an id get their 1-based data line number.
        let record_id = field(0).unwrap_or_else(|| format!("row{}", line + 1));

        let amount_cents = match field(9) {
            Some(raw) => Some(parse_amount_cents(&raw).ok_or_else(|| {
                LinkageError::AmountParse {
                    source,
                    record_id: record_id.clone(),
                    value: raw.clone(),
                }
            })?),
            None => None,
        };
        let duration_secs = match field(10) {
            Some(raw) => Some(parse_duration_secs(&raw).ok_or_else(|| {
                LinkageError::DurationParse {
                    source,
                    record_id: record_id.clone(),
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        records.push(RawRecord {
            source,
            self_party: PartyFields {
                name: field(1),
                phone: field(2),
                account: field(3),
            },
            counterparty: CounterpartyFields {
                party: PartyFields {
                    name: field(4),
                    phone: field(5),
                    account: field(6),
                },
                unit: field(7),
                role: field(8),
            },
            amount_cents,
            duration_secs,
            timestamp: field(11),
            type_code: field(12),
            remark: field(13),
            record_id,
        });
    }

    log::debug!("loaded {} {source} records", records.len());
    Ok(records)
}

/// Read a canonical CSV file from disk.
pub fn load_csv_file(source: Source, path: &Path) -> Result<Vec<RawRecord>, LinkageError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| LinkageError::Io(format!("{}: {e}", path.display())))?;
    load_csv_records(source, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_bank_csv() {
        let csv = "\
record_id,self_name,self_account,cp_name,cp_account,amount,timestamp,type_code,remark
b1,张三,6222000011112222,李四,6222000033334444,520.00,2024-01-02 10:00:00,转账,
b2,张三,6222000011112222,,,-500,2024-01-03,ATM取现,
";
        let records = load_csv_records(Source::Bank, csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_id, "b1");
        assert_eq!(records[0].amount_cents, Some(52000));
        assert_eq!(records[0].counterparty.party.name.as_deref(), Some("李四"));
        assert_eq!(records[0].remark, None);
        assert_eq!(records[1].amount_cents, Some(-50000));
        assert_eq!(records[1].counterparty.party.name, None);
        assert_eq!(records[1].type_code.as_deref(), Some("ATM取现"));
        assert_eq!(records[1].duration_secs, None);
    }

    #[test]
    fn load_call_csv() {
        let csv = "\
record_id,self_phone,cp_phone,cp_name,cp_unit,cp_role,duration,timestamp
c1,13800000001,13900000003,王五,某某公司,经理,125,2024-02-01 08:00:00
";
        let records = load_csv_records(Source::Call, csv).unwrap();
        assert_eq!(records[0].duration_secs, Some(125));
        assert_eq!(records[0].counterparty.unit.as_deref(), Some("某某公司"));
        assert_eq!(records[0].counterparty.role.as_deref(), Some("经理"));
        assert_eq!(records[0].amount_cents, None);
    }

    #[test]
    fn missing_required_column() {
        let csv = "record_id,self_name\nx,张三\n";
        let err = load_csv_records(Source::Bank, csv).unwrap_err();
        assert!(matches!(err, LinkageError::MissingColumn { ref column, .. } if column == "amount"));

        let err = load_csv_records(Source::Call, csv).unwrap_err();
        assert!(matches!(err, LinkageError::MissingColumn { ref column, .. } if column == "duration"));
    }

    #[test]
    fn bad_amount_is_an_error() {
        let csv = "record_id,amount\nb9,abc\n";
        let err = load_csv_records(Source::ImPayment, csv).unwrap_err();
        match err {
            LinkageError::AmountParse { record_id, value, .. } => {
                assert_eq!(record_id, "b9");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_amount_is_an_error() {
        let csv = "record_id,self_name,cp_name,amount\nb1,张三,李四,-1e30\n";
        match load_csv_records(Source::Bank, csv).unwrap_err() {
            LinkageError::AmountParse { record_id, value, .. } => {
                assert_eq!(record_id, "b1");
                assert_eq!(value, "-1e30");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_duration_is_an_error() {
        let csv = "record_id,duration\nc1,-3\n";
        assert!(matches!(
            load_csv_records(Source::Call, csv),
            Err(LinkageError::DurationParse { .. })
        ));
    }

    #[test]
    fn placeholder_cells_are_absent() {
        let csv = "record_id,cp_name,amount\nw1,nan,\\N\n";
        let records = load_csv_records(Source::WalletPayment, csv).unwrap();
        assert_eq!(records[0].counterparty.party.name, None);
        assert_eq!(records[0].amount_cents, None);
    }

    #[test]
    fn missing_record_id_falls_back_to_row_number() {
        let csv = "record_id,amount\n,1\n,2\n";
        let records = load_csv_records(Source::Bank, csv).unwrap();
        assert_eq!(records[0].record_id, "row1");
        assert_eq!(records[1].record_id, "row2");
    }

    #[test]
    fn amount_formats() {
        assert_eq!(parse_amount_cents("1,314.00"), Some(131400));
        assert_eq!(parse_amount_cents("¥ 88.8"), Some(8880));
        assert_eq!(parse_amount_cents("-0.01"), Some(-1));
        assert_eq!(parse_amount_cents("0.1"), Some(10));
        assert_eq!(parse_amount_cents("inf"), None);
        assert_eq!(parse_amount_cents("-1e30"), None);
        assert_eq!(parse_amount_cents("1e30"), None);
        assert_eq!(parse_amount_cents(""), None);
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration_secs("75"), Some(75));
        assert_eq!(parse_duration_secs("75.0"), Some(75));
        assert_eq!(parse_duration_secs("-1"), None);
        assert_eq!(parse_duration_secs("long"), None);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.csv");
        std::fs::write(&path, "record_id,self_name,cp_name,amount\nw1,张三,李四,521\n").unwrap();
        let records = load_csv_file(Source::WalletPayment, &path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, Source::WalletPayment);
        assert_eq!(records[0].amount_cents, Some(52100));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_csv_file(Source::Bank, &dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, LinkageError::Io(_)));
    }
}
