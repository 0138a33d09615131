use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Could not create output directory at '{}'", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not inspect output directory at '{}'", path.display())]
    Inspect {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Placeholder for values that are absent.
pub const ABSENT: &str = "—";

pub(crate) mod function {
    use crate::assemble::{ReconciliationResult, Section};
    use crate::group::{Entry, KeyGroup};
    use crate::reconcile::KeyComparison;
    use crate::report::{Error, ABSENT};
    use rust_decimal::{Decimal, RoundingStrategy};
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};

    /// Write all sections of `result` into `dir`, one `<section>.csv` each, and return the written paths.
    pub fn write_report(result: &ReconciliationResult, dir: &Path) -> Result<Vec<PathBuf>, Error> {
        std::fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
            path: dir.to_owned(),
            source,
        })?;
        let mut written = Vec::new();
        for section in Section::ALL {
            let path = dir.join(format!("{}.csv", section.name()));
            let mut out = csv::Writer::from_path(&path)?;
            write_section(result, section, &mut out)?;
            tracing::debug!(path = %path.display(), rows = ?result.row_count(section), "wrote section");
            written.push(path);
        }
        Ok(written)
    }

    /// Write a single `section` of `result` as CSV to `out` and flush it.
    pub fn write_section<W: std::io::Write>(
        result: &ReconciliationResult,
        section: Section,
        out: &mut csv::Writer<W>,
    ) -> Result<(), Error> {
        match section {
            Section::Summary => {
                out.write_record(["section", "rows"])?;
                for (section, rows) in result.summary() {
                    out.write_record([section.name(), &rows.to_string()])?;
                }
                out.write_record(["tolerance", &fmt_amount(result.tolerance)])?;
            }
            Section::Matched => write_comparisons(out, &result.matched)?,
            Section::Mismatched => write_comparisons(out, &result.mismatched)?,
            Section::NameMismatch => write_comparisons(out, &result.name_mismatch)?,
            Section::CountMismatch => write_comparisons(out, &result.count_mismatch)?,
            Section::MissingInOperations => {
                write_groups(out, "loyalty", &result.missing_in_operations)?
            }
            Section::MissingInLoyalty => {
                write_groups(out, "operations", &result.missing_in_loyalty)?
            }
            Section::Frequency => {
                out.write_record(["name", "rows", "rows_with_points", "status", "note"])?;
                for finding in &result.frequency {
                    out.write_record([
                        or_absent(&finding.name),
                        &finding.row_count.to_string(),
                        &finding.rows_with_points.to_string(),
                        finding.status.as_str(),
                        finding.status.note(),
                    ])?;
                }
            }
            Section::TransactionReview => {
                out.write_record([
                    "category",
                    "priority",
                    "status_auto",
                    "status_manual",
                    "status_final",
                    "key",
                    "names_loyalty",
                    "names_operations",
                    "amount_loyalty",
                    "amount_operations",
                    "delta",
                    "date_loyalty",
                    "date_operations",
                    "note",
                ])?;
                for row in &result.review {
                    let outcome = &row.outcome;
                    out.write_record([
                        row.category.as_str(),
                        &row.priority.to_string(),
                        outcome.status.as_str(),
                        "",
                        outcome.status.as_str(),
                        &outcome.key,
                        &fmt_names(&outcome.loyalty_names),
                        &fmt_names(&outcome.operations_names),
                        &fmt_amounts(outcome.loyalty.iter().map(|e| e.amount)),
                        &fmt_amounts(outcome.operations.iter().map(|e| e.amount)),
                        &outcome.delta.map(fmt_amount).unwrap_or_else(|| ABSENT.into()),
                        &fmt_dates(&outcome.loyalty),
                        &fmt_dates(&outcome.operations),
                        or_absent(&outcome.note),
                    ])?;
                }
            }
        }
        out.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Pick the first of `01`..`limit` below `base` that doesn't exist yet, or else the least recently modified one.
    pub fn next_output_dir(base: &Path, limit: usize) -> Result<PathBuf, Error> {
        let candidates: Vec<_> = (1..=limit.max(1)).map(|i| base.join(format!("{i:02}"))).collect();
        if let Some(free) = candidates.iter().find(|p| !p.exists()) {
            return Ok(free.clone());
        }
        let mut oldest = None::<(std::time::SystemTime, &PathBuf)>;
        for path in &candidates {
            let modified = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map_err(|source| Error::Inspect {
                    path: path.clone(),
                    source,
                })?;
            if oldest.map_or(true, |(time, _)| modified < time) {
                oldest = Some((modified, path));
            }
        }
        Ok(oldest.map_or_else(|| candidates[0].clone(), |(_, path)| path.clone()))
    }

    fn write_comparisons<W: std::io::Write>(
        out: &mut csv::Writer<W>,
        comparisons: &[KeyComparison],
    ) -> Result<(), Error> {
        out.write_record([
            "key",
            "names_loyalty",
            "names_operations",
            "amounts_loyalty",
            "amounts_operations",
            "dates_loyalty",
            "dates_operations",
            "deltas",
        ])?;
        for comparison in comparisons {
            let deltas = match comparison.deltas() {
                Some(deltas) if !deltas.is_empty() => deltas
                    .into_iter()
                    .map(|d| format!("Δ={}", fmt_amount(d)))
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => ABSENT.into(),
            };
            out.write_record([
                comparison.key(),
                &fmt_names(&comparison.loyalty.names),
                &fmt_names(&comparison.operations.names),
                &fmt_amounts(comparison.loyalty.amounts()),
                &fmt_amounts(comparison.operations.amounts()),
                &fmt_dates(&comparison.loyalty.entries),
                &fmt_dates(&comparison.operations.entries),
                &deltas,
            ])?;
        }
        Ok(())
    }

    fn write_groups<W: std::io::Write>(
        out: &mut csv::Writer<W>,
        side: &str,
        groups: &[KeyGroup],
    ) -> Result<(), Error> {
        out.write_record([
            "key".to_string(),
            format!("names_{side}"),
            format!("amounts_{side}"),
            format!("dates_{side}"),
        ])?;
        for group in groups {
            out.write_record([
                group.key.as_str(),
                &fmt_names(&group.names),
                &fmt_amounts(group.amounts()),
                &fmt_dates(&group.entries),
            ])?;
        }
        Ok(())
    }

    fn or_absent(value: &str) -> &str {
        if value.is_empty() {
            ABSENT
        } else {
            value
        }
    }

    fn fmt_amount(amount: Decimal) -> String {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{rounded:.2}")
    }

    fn fmt_amounts(amounts: impl Iterator<Item = Decimal>) -> String {
        join_or_absent(amounts.map(fmt_amount))
    }

    fn fmt_names(names: &BTreeSet<String>) -> String {
        join_or_absent(names.iter().cloned())
    }

    fn fmt_dates(entries: &[Entry]) -> String {
        static FORMAT: &[time::format_description::FormatItem<'static>] =
            time::macros::format_description!("[year]-[month]-[day]");
        join_or_absent(entries.iter().map(|e| {
            e.date
                .and_then(|date| date.format(FORMAT).ok())
                .unwrap_or_else(|| ABSENT.into())
        }))
    }

    fn join_or_absent(values: impl Iterator<Item = String>) -> String {
        let joined = values.collect::<Vec<_>>().join(", ");
        if joined.is_empty() {
            ABSENT.into()
        } else {
            joined
        }
    }

}
