use crate::record::Record;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Names with this many rows or fewer are not considered.
const MIN_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyStatus {
    /// Three entries with points for two of them is an allowed pattern.
    Ok,
    /// Points on every entry, possibly duplicated.
    Warning,
    /// Needs a manual review.
    Info,
}

impl FrequencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyStatus::Ok => "OK",
            FrequencyStatus::Warning => "WARNING",
            FrequencyStatus::Info => "INFO",
        }
    }

    pub fn note(&self) -> &'static str {
        match self {
            FrequencyStatus::Ok => "3 entries with points for 2 is allowed.",
            FrequencyStatus::Warning => "Points on every entry, possible duplicates.",
            FrequencyStatus::Info => "Other pattern, needs manual review.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyFinding {
    /// The display name, which may be empty.
    pub name: String,
    pub row_count: usize,
    pub rows_with_points: usize,
    pub status: FrequencyStatus,
}

/// Count rows and point-earning rows per display name of the `operations` records, ordered by name.
///
/// A row earns points if its points, or its amount if the export has no points, are positive.
pub fn detect<'a>(operations: impl IntoIterator<Item = &'a Record>) -> Vec<FrequencyFinding> {
    let mut counts = BTreeMap::<&str, (usize, usize)>::new();
    for record in operations {
        let (rows, with_points) = counts.entry(record.display_name.as_str()).or_default();
        *rows += 1;
        if record.points.or(record.amount).unwrap_or_default() > Decimal::ZERO {
            *with_points += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, (rows, _))| *rows > MIN_ROWS)
        .map(|(name, (row_count, rows_with_points))| FrequencyFinding {
            name: name.to_owned(),
            row_count,
            rows_with_points,
            status: classify(row_count, rows_with_points),
        })
        .collect()
}

fn classify(row_count: usize, rows_with_points: usize) -> FrequencyStatus {
    if row_count == 3 && rows_with_points == 2 {
        FrequencyStatus::Ok
    } else if rows_with_points >= row_count {
        FrequencyStatus::Warning
    } else {
        FrequencyStatus::Info
    }
}
