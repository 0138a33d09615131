use crate::group::{Entry, KeyGroup};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The amount tolerance must not be negative, got {tolerance}")]
    NegativeTolerance { tolerance: Decimal },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Options {
    /// Amounts that differ by no more than this are considered equal.
    pub tolerance: Decimal,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            tolerance: Decimal::new(10, 2),
        }
    }
}

/// The classification of a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Matched,
    NameMismatch,
    AmountMismatch,
    CountMismatch,
    MissingInOperations,
    MissingInLoyalty,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Matched => "MATCHED",
            Status::NameMismatch => "NAME_MISMATCH",
            Status::AmountMismatch => "AMOUNT_MISMATCH",
            Status::CountMismatch => "COUNT_MISMATCH",
            Status::MissingInOperations => "MISSING_IN_OPERATIONS",
            Status::MissingInLoyalty => "MISSING_IN_LOYALTY",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Status::Matched => Category::Ok,
            _ => Category::Problem,
        }
    }

    /// Lower is more urgent.
    pub fn priority(&self) -> u8 {
        match self {
            Status::AmountMismatch | Status::CountMismatch | Status::MissingInOperations | Status::MissingInLoyalty => 1,
            Status::NameMismatch => 2,
            Status::Matched => 3,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Ok,
    Problem,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ok => "OK",
            Category::Problem => "PROBLEM",
        }
    }
}

/// The aggregate classification of a key present on both sides with the same amount of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyVerdict {
    FullMatch,
    FullMatchNameMismatch,
    Mismatched,
}

impl KeyVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyVerdict::FullMatch => "FULL_MATCH",
            KeyVerdict::FullMatchNameMismatch => "FULL_MATCH_NAME_MISMATCH",
            KeyVerdict::Mismatched => "MISMATCHED",
        }
    }
}

pub const NOTE_MISSING_IN_LOYALTY: &str = "No transactions in loyalty.";
pub const NOTE_MISSING_IN_OPERATIONS: &str = "No transactions in operations.";
pub const NOTE_NAME_UNKNOWN_TO_OPERATIONS: &str = "Loyalty surname does not appear anywhere in operations.";

/// One row of the transaction review, either for a pair of transactions or for a whole key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonOutcome {
    pub key: String,
    /// A single entry for pair outcomes, all entries of the key otherwise, and none if the side has no counterpart.
    pub loyalty: Vec<Entry>,
    pub operations: Vec<Entry>,
    pub loyalty_names: BTreeSet<String>,
    pub operations_names: BTreeSet<String>,
    /// The absolute difference of a transaction pair.
    pub delta: Option<Decimal>,
    pub status: Status,
    /// Empty if there is nothing to say.
    pub note: String,
}

impl ComparisonOutcome {
    /// The loyalty amount of a transaction pair, or `None` for key-level outcomes.
    pub fn loyalty_amount(&self) -> Option<Decimal> {
        self.pair_amount(&self.loyalty)
    }

    /// The operations amount of a transaction pair, or `None` for key-level outcomes.
    pub fn operations_amount(&self) -> Option<Decimal> {
        self.pair_amount(&self.operations)
    }

    fn pair_amount(&self, entries: &[Entry]) -> Option<Decimal> {
        match (self.delta, entries) {
            (Some(_), [entry]) => Some(entry.amount),
            _ => None,
        }
    }
}

/// Both sides of a key that exists in both exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComparison {
    pub loyalty: KeyGroup,
    pub operations: KeyGroup,
    /// `None` if the transaction counts differ.
    pub verdict: Option<KeyVerdict>,
}

impl KeyComparison {
    pub fn key(&self) -> &str {
        &self.loyalty.key
    }

    /// The absolute differences of all positional pairs, or `None` if the counts differ.
    pub fn deltas(&self) -> Option<Vec<Decimal>> {
        (self.loyalty.len() == self.operations.len()).then(|| {
            self.loyalty
                .amounts()
                .zip(self.operations.amounts())
                .map(|(l, o)| (l - o).abs())
                .collect()
        })
    }
}

/// The outcome of comparing all keys of both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub matched: Vec<KeyComparison>,
    pub name_mismatch: Vec<KeyComparison>,
    pub mismatched: Vec<KeyComparison>,
    pub count_mismatch: Vec<KeyComparison>,
    /// Keys only known to the loyalty export.
    pub missing_in_operations: Vec<KeyGroup>,
    /// Keys only known to the operations export.
    pub missing_in_loyalty: Vec<KeyGroup>,
    /// One outcome per transaction pair, and one per key that couldn't be paired, in key order.
    pub outcomes: Vec<ComparisonOutcome>,
}

pub(crate) mod function {
    use super::{
        Classification, ComparisonOutcome, Error, KeyComparison, KeyVerdict, Options, Status,
        NOTE_MISSING_IN_LOYALTY, NOTE_MISSING_IN_OPERATIONS, NOTE_NAME_UNKNOWN_TO_OPERATIONS,
    };
    use crate::assemble::{assemble, ReconciliationResult};
    use crate::group::{group_by_key, KeyGroup, NameIndex};
    use crate::record::Record;
    use rust_decimal::Decimal;
    use std::collections::{BTreeMap, BTreeSet};

    /// Reconcile the `loyalty` records with the `operations` records.
    ///
    /// This is a pure function of its inputs, calling it twice yields the same result.
    pub fn reconcile(
        loyalty: &[Record],
        operations: &[Record],
        Options { tolerance }: Options,
    ) -> Result<ReconciliationResult, Error> {
        if tolerance < Decimal::ZERO {
            return Err(Error::NegativeTolerance { tolerance });
        }
        let loyalty_groups = group_by_key(loyalty);
        let operations_groups = group_by_key(operations);
        let names = NameIndex::from_records(operations);
        tracing::debug!(
            loyalty_keys = loyalty_groups.len(),
            operations_keys = operations_groups.len(),
            operations_names = names.len(),
            "grouped records"
        );

        let classification = classify(&loyalty_groups, &operations_groups, &names, tolerance);
        let frequency = crate::frequency::detect(operations);
        let result = assemble(classification, frequency, tolerance);
        tracing::info!(
            matched = result.matched.len(),
            name_mismatch = result.name_mismatch.len(),
            mismatched = result.mismatched.len(),
            count_mismatch = result.count_mismatch.len(),
            missing_in_operations = result.missing_in_operations.len(),
            missing_in_loyalty = result.missing_in_loyalty.len(),
            "reconciled {} loyalty and {} operations records",
            loyalty.len(),
            operations.len()
        );
        Ok(result)
    }

    /// Compare every key of `loyalty` and `operations` in lexicographic order.
    ///
    /// Amounts are paired by rank, which relies on both groups being sorted by amount.
    /// This approximates the true pairing well as long as the amounts of one key are distinct.
    pub fn classify(
        loyalty: &BTreeMap<String, KeyGroup>,
        operations: &BTreeMap<String, KeyGroup>,
        names: &NameIndex,
        tolerance: Decimal,
    ) -> Classification {
        let keys: BTreeSet<&String> = loyalty.keys().chain(operations.keys()).collect();
        let mut out = Classification::default();

        for key in keys {
            match (loyalty.get(key), operations.get(key)) {
                (None, Some(ops)) => {
                    out.outcomes.push(ComparisonOutcome {
                        key: key.clone(),
                        loyalty: Vec::new(),
                        operations: ops.entries.clone(),
                        loyalty_names: BTreeSet::new(),
                        operations_names: ops.names.clone(),
                        delta: None,
                        status: Status::MissingInLoyalty,
                        note: NOTE_MISSING_IN_LOYALTY.into(),
                    });
                    out.missing_in_loyalty.push(ops.clone());
                }
                (Some(loy), None) => {
                    out.outcomes.push(ComparisonOutcome {
                        key: key.clone(),
                        loyalty: loy.entries.clone(),
                        operations: Vec::new(),
                        loyalty_names: loy.names.clone(),
                        operations_names: BTreeSet::new(),
                        delta: None,
                        status: Status::MissingInOperations,
                        note: NOTE_MISSING_IN_OPERATIONS.into(),
                    });
                    out.missing_in_operations.push(loy.clone());
                }
                (Some(loy), Some(ops)) => compare_key(loy, ops, names, tolerance, &mut out),
                (None, None) => unreachable!("keys are taken from either map"),
            }
        }
        out
    }

    fn compare_key(
        loyalty: &KeyGroup,
        operations: &KeyGroup,
        names: &NameIndex,
        tolerance: Decimal,
        out: &mut Classification,
    ) {
        let globally_orphaned_name = names.misses_all(&loyalty.names);
        let outcome = |loyalty_entries, operations_entries, delta, status, note: String| ComparisonOutcome {
            key: loyalty.key.clone(),
            loyalty: loyalty_entries,
            operations: operations_entries,
            loyalty_names: loyalty.names.clone(),
            operations_names: operations.names.clone(),
            delta,
            status,
            note: if globally_orphaned_name {
                NOTE_NAME_UNKNOWN_TO_OPERATIONS.into()
            } else {
                note
            },
        };

        if loyalty.len() != operations.len() {
            tracing::debug!(
                key = %loyalty.key,
                loyalty = loyalty.len(),
                operations = operations.len(),
                "transaction counts differ"
            );
            out.outcomes.push(outcome(
                loyalty.entries.clone(),
                operations.entries.clone(),
                None,
                Status::CountMismatch,
                String::new(),
            ));
            out.count_mismatch.push(KeyComparison {
                loyalty: loyalty.clone(),
                operations: operations.clone(),
                verdict: None,
            });
            return;
        }

        let names_agree = loyalty.shares_name_with(operations);
        let mut all_within_tolerance = true;
        for (l, o) in loyalty.entries.iter().zip(&operations.entries) {
            let delta = (l.amount - o.amount).abs();
            let (status, note) = if delta <= tolerance {
                if names_agree {
                    (Status::Matched, String::new())
                } else {
                    (
                        Status::NameMismatch,
                        format!(
                            "Different surnames: loyalty={} vs operations={}",
                            join_names(&loyalty.names),
                            join_names(&operations.names)
                        ),
                    )
                }
            } else {
                all_within_tolerance = false;
                (Status::AmountMismatch, String::new())
            };
            out.outcomes
                .push(outcome(vec![*l], vec![*o], Some(delta), status, note));
        }

        let verdict = match (all_within_tolerance, names_agree) {
            (true, true) => KeyVerdict::FullMatch,
            (true, false) => KeyVerdict::FullMatchNameMismatch,
            (false, _) => KeyVerdict::Mismatched,
        };
        tracing::debug!(key = %loyalty.key, verdict = verdict.as_str(), globally_orphaned_name);
        let comparison = KeyComparison {
            loyalty: loyalty.clone(),
            operations: operations.clone(),
            verdict: Some(verdict),
        };
        match verdict {
            KeyVerdict::FullMatch => out.matched.push(comparison),
            KeyVerdict::FullMatchNameMismatch => out.name_mismatch.push(comparison),
            KeyVerdict::Mismatched => out.mismatched.push(comparison),
        }
    }

    fn join_names(names: &BTreeSet<String>) -> String {
        if names.is_empty() {
            crate::report::ABSENT.into()
        } else {
            names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::function::classify;
    use super::*;
    use crate::group::{group_by_key, NameIndex};
    use crate::record::{Record, Side};

    fn dec(v: &str) -> Decimal {
        v.parse().unwrap()
    }

    fn records(side: Side, rows: &[(&str, &str, &str)]) -> Vec<Record> {
        rows.iter()
            .map(|(key, amount, name)| Record::new(side, *key, crate::normalize::parse_amount(amount), *name))
            .collect()
    }

    fn run(loyalty: &[Record], operations: &[Record], tolerance: &str) -> Classification {
        classify(
            &group_by_key(loyalty),
            &group_by_key(operations),
            &NameIndex::from_records(operations),
            dec(tolerance),
        )
    }

    #[test]
    fn rank_pairing_within_tolerance_is_a_full_match() {
        let loyalty = records(Side::Loyalty, &[("K1", "250.05", "SMITH"), ("K1", "100.00", "SMITH")]);
        let operations = records(Side::Operations, &[("K1", "100.05", "SMITH"), ("K1", "250.00", "SMITH")]);
        let out = run(&loyalty, &operations, "0.10");

        assert_eq!(out.outcomes.len(), 2);
        for outcome in &out.outcomes {
            assert_eq!(outcome.status, Status::Matched);
            assert_eq!(outcome.delta, Some(dec("0.05")));
            assert!(outcome.note.is_empty());
        }
        assert_eq!(out.outcomes[0].loyalty_amount(), Some(dec("100.00")));
        assert_eq!(out.outcomes[0].operations_amount(), Some(dec("100.05")));
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].verdict, Some(KeyVerdict::FullMatch));
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let loyalty = records(Side::Loyalty, &[("K", "100.00", "SMITH")]);
        let operations = records(Side::Operations, &[("K", "100.10", "SMITH")]);
        assert_eq!(run(&loyalty, &operations, "0.10").outcomes[0].status, Status::Matched);
        assert_eq!(
            run(&loyalty, &operations, "0.09").outcomes[0].status,
            Status::AmountMismatch
        );
    }

    #[test]
    fn differing_counts_yield_a_single_outcome() {
        let loyalty = records(Side::Loyalty, &[("K2", "10", "SMITH")]);
        let operations = records(Side::Operations, &[("K2", "10", "SMITH"), ("K2", "20", "SMITH")]);
        let out = run(&loyalty, &operations, "0.10");

        assert_eq!(out.outcomes.len(), 1);
        assert_eq!(out.outcomes[0].status, Status::CountMismatch);
        assert_eq!(out.outcomes[0].delta, None);
        assert_eq!(out.outcomes[0].loyalty_amount(), None, "no pair, even with a single loyalty entry");
        assert_eq!(out.outcomes[0].operations_amount(), None);
        assert_eq!(out.count_mismatch.len(), 1);
        assert_eq!(out.count_mismatch[0].deltas(), None);
        assert!(out.matched.is_empty() && out.mismatched.is_empty() && out.name_mismatch.is_empty());
    }

    #[test]
    fn orphans_on_either_side() {
        let loyalty = records(Side::Loyalty, &[("A", "1", "JONES")]);
        let operations = records(Side::Operations, &[("K3", "5", "SMITH")]);
        let out = run(&loyalty, &operations, "0.10");

        assert_eq!(out.outcomes.len(), 2);
        assert_eq!(out.outcomes[0].key, "A");
        assert_eq!(out.outcomes[0].status, Status::MissingInOperations);
        assert_eq!(out.outcomes[0].note, NOTE_MISSING_IN_OPERATIONS);
        assert_eq!(out.outcomes[0].loyalty_amount(), None);
        assert_eq!(out.outcomes[1].key, "K3");
        assert_eq!(out.outcomes[1].status, Status::MissingInLoyalty);
        assert!(out.outcomes[1].loyalty.is_empty());
        assert_eq!(out.missing_in_loyalty.len(), 1);
        assert_eq!(out.missing_in_loyalty[0].key, "K3");
        assert_eq!(out.missing_in_operations[0].key, "A");
    }

    #[test]
    fn name_mismatch_notes_both_name_sets() {
        let loyalty = records(Side::Loyalty, &[("K", "10", "JONES")]);
        let operations = records(Side::Operations, &[("K", "10", "SMITH"), ("X", "1", "JONES")]);
        let out = run(&loyalty, &operations, "0.10");

        let outcome = &out.outcomes[0];
        assert_eq!(outcome.status, Status::NameMismatch);
        assert_eq!(outcome.note, "Different surnames: loyalty=JONES vs operations=SMITH");
        assert_eq!(out.name_mismatch.len(), 1);
        assert_eq!(out.name_mismatch[0].verdict, Some(KeyVerdict::FullMatchNameMismatch));
    }

    #[test]
    fn globally_unknown_name_takes_precedence_on_every_status() {
        let loyalty = records(Side::Loyalty, &[("K", "10", "NOBODY"), ("K", "50", "NOBODY")]);
        let operations = records(Side::Operations, &[("K", "10", "SMITH"), ("K", "99", "SMITH")]);
        let out = run(&loyalty, &operations, "0.10");

        assert_eq!(out.outcomes[0].status, Status::NameMismatch);
        assert_eq!(out.outcomes[1].status, Status::AmountMismatch);
        assert!(out
            .outcomes
            .iter()
            .all(|o| o.note == NOTE_NAME_UNKNOWN_TO_OPERATIONS));
        assert_eq!(out.mismatched.len(), 1);
        assert_eq!(out.mismatched[0].deltas(), Some(vec![dec("0"), dec("49")]));
    }

    #[test]
    fn keys_without_amounts_on_both_sides_are_judged_by_names() {
        let loyalty = records(Side::Loyalty, &[("K", "", "SMITH")]);
        let operations = records(Side::Operations, &[("K", "n/a", "SMITH")]);
        let out = run(&loyalty, &operations, "0.10");

        assert!(out.outcomes.is_empty());
        assert_eq!(out.matched.len(), 1);
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let err = super::function::reconcile(
            &[],
            &[],
            Options {
                tolerance: dec("-0.01"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::NegativeTolerance { .. }));
    }
}
