use crate::frequency::FrequencyFinding;
use crate::group::KeyGroup;
use crate::reconcile::{Category, Classification, ComparisonOutcome, KeyComparison};
use rust_decimal::Decimal;

/// A named result set, in the order they are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Summary,
    Matched,
    Mismatched,
    NameMismatch,
    CountMismatch,
    MissingInOperations,
    MissingInLoyalty,
    Frequency,
    TransactionReview,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::Summary,
        Section::Matched,
        Section::Mismatched,
        Section::NameMismatch,
        Section::CountMismatch,
        Section::MissingInOperations,
        Section::MissingInLoyalty,
        Section::Frequency,
        Section::TransactionReview,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::Summary => "00_summary",
            Section::Matched => "01_matched",
            Section::Mismatched => "02_mismatched",
            Section::NameMismatch => "03_name_mismatch",
            Section::CountMismatch => "04_count_mismatch",
            Section::MissingInOperations => "05_missing_in_operations",
            Section::MissingInLoyalty => "06_missing_in_loyalty",
            Section::Frequency => "07_frequency",
            Section::TransactionReview => "99_transaction_review",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A row of the transaction review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub category: Category,
    pub priority: u8,
    pub outcome: ComparisonOutcome,
}

/// Everything a reconciliation run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub tolerance: Decimal,
    pub matched: Vec<KeyComparison>,
    pub mismatched: Vec<KeyComparison>,
    pub name_mismatch: Vec<KeyComparison>,
    pub count_mismatch: Vec<KeyComparison>,
    pub missing_in_operations: Vec<KeyGroup>,
    pub missing_in_loyalty: Vec<KeyGroup>,
    pub frequency: Vec<FrequencyFinding>,
    /// Sorted by category, priority and key, with problems last.
    pub review: Vec<ReviewRow>,
}

impl ReconciliationResult {
    /// The amount of rows in `section`, or `None` for the summary itself.
    pub fn row_count(&self, section: Section) -> Option<usize> {
        Some(match section {
            Section::Summary => return None,
            Section::Matched => self.matched.len(),
            Section::Mismatched => self.mismatched.len(),
            Section::NameMismatch => self.name_mismatch.len(),
            Section::CountMismatch => self.count_mismatch.len(),
            Section::MissingInOperations => self.missing_in_operations.len(),
            Section::MissingInLoyalty => self.missing_in_loyalty.len(),
            Section::Frequency => self.frequency.len(),
            Section::TransactionReview => self.review.len(),
        })
    }

    /// The row count of every section but the summary, in presentation order.
    pub fn summary(&self) -> Vec<(Section, usize)> {
        Section::ALL
            .iter()
            .filter_map(|section| self.row_count(*section).map(|count| (*section, count)))
            .collect()
    }

    /// The key-level section `key` was placed in.
    pub fn section_of(&self, key: &str) -> Option<Section> {
        let in_comparisons = |v: &[KeyComparison]| v.iter().any(|c| c.key() == key);
        let in_groups = |v: &[KeyGroup]| v.iter().any(|g| g.key == key);
        if in_comparisons(&self.matched) {
            Some(Section::Matched)
        } else if in_comparisons(&self.mismatched) {
            Some(Section::Mismatched)
        } else if in_comparisons(&self.name_mismatch) {
            Some(Section::NameMismatch)
        } else if in_comparisons(&self.count_mismatch) {
            Some(Section::CountMismatch)
        } else if in_groups(&self.missing_in_operations) {
            Some(Section::MissingInOperations)
        } else if in_groups(&self.missing_in_loyalty) {
            Some(Section::MissingInLoyalty)
        } else {
            None
        }
    }
}

/// Assemble the result sets and order the transaction review so that problems sort after matches,
/// and urgent problems before name mismatches.
pub fn assemble(
    Classification {
        matched,
        name_mismatch,
        mismatched,
        count_mismatch,
        missing_in_operations,
        missing_in_loyalty,
        outcomes,
    }: Classification,
    frequency: Vec<FrequencyFinding>,
    tolerance: Decimal,
) -> ReconciliationResult {
    let mut review: Vec<_> = outcomes
        .into_iter()
        .map(|outcome| ReviewRow {
            category: outcome.status.category(),
            priority: outcome.status.priority(),
            outcome,
        })
        .collect();
    review.sort_by(|a, b| {
        (a.category, a.priority, &a.outcome.key).cmp(&(b.category, b.priority, &b.outcome.key))
    });

    ReconciliationResult {
        tolerance,
        matched,
        mismatched,
        name_mismatch,
        count_mismatch,
        missing_in_operations,
        missing_in_loyalty,
        frequency,
        review,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Status;

    fn outcome(key: &str, status: Status) -> ComparisonOutcome {
        ComparisonOutcome {
            key: key.into(),
            loyalty: Vec::new(),
            operations: Vec::new(),
            loyalty_names: Default::default(),
            operations_names: Default::default(),
            delta: None,
            status,
            note: String::new(),
        }
    }

    #[test]
    fn review_puts_matches_first_then_problems_by_priority_and_key() {
        let classification = Classification {
            outcomes: vec![
                outcome("A", Status::NameMismatch),
                outcome("B", Status::Matched),
                outcome("C", Status::MissingInLoyalty),
                outcome("A", Status::Matched),
                outcome("D", Status::AmountMismatch),
                outcome("A", Status::AmountMismatch),
            ],
            ..Default::default()
        };
        let result = assemble(classification, Vec::new(), Decimal::ZERO);
        let order: Vec<_> = result
            .review
            .iter()
            .map(|r| (r.category.as_str(), r.priority, r.outcome.key.as_str(), r.outcome.status))
            .collect();
        assert_eq!(
            order,
            [
                ("OK", 3, "A", Status::Matched),
                ("OK", 3, "B", Status::Matched),
                ("PROBLEM", 1, "A", Status::AmountMismatch),
                ("PROBLEM", 1, "C", Status::MissingInLoyalty),
                ("PROBLEM", 1, "D", Status::AmountMismatch),
                ("PROBLEM", 2, "A", Status::NameMismatch),
            ]
        );
    }

    #[test]
    fn summary_lists_all_sections_but_itself() {
        let result = assemble(Classification::default(), Vec::new(), Decimal::ZERO);
        let summary = result.summary();
        assert_eq!(summary.len(), Section::ALL.len() - 1);
        assert_eq!(summary[0].0, Section::Matched);
        assert_eq!(summary.last().map(|s| s.0), Some(Section::TransactionReview));
        assert!(summary.iter().all(|(_, count)| *count == 0));
    }
}
