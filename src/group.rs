use crate::record::Record;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// A transaction amount along with the date it was reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub amount: Decimal,
    pub date: Option<time::Date>,
}

/// All transactions and names of one side that share a join key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGroup {
    pub key: String,
    /// Sorted ascending by amount, with ties kept in input order.
    ///
    /// Amounts and dates travel together, so there is one date slot per amount even if it is empty.
    pub entries: Vec<Entry>,
    /// All non-empty display names seen for the key, including those of rows without amount.
    pub names: BTreeSet<String>,
}

impl KeyGroup {
    pub fn amounts(&self) -> impl ExactSizeIterator<Item = Decimal> + '_ {
        self.entries.iter().map(|e| e.amount)
    }

    pub fn dates(&self) -> impl ExactSizeIterator<Item = Option<time::Date>> + '_ {
        self.entries.iter().map(|e| e.date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return true if both groups share at least one name.
    pub fn shares_name_with(&self, other: &KeyGroup) -> bool {
        !self.names.is_disjoint(&other.names)
    }
}

/// Group `records` by join key, iterating keys in lexicographic order.
pub fn group_by_key<'a>(records: impl IntoIterator<Item = &'a Record>) -> BTreeMap<String, KeyGroup> {
    let mut groups = BTreeMap::<String, KeyGroup>::new();
    for record in records {
        let group = groups
            .entry(record.join_key.clone())
            .or_insert_with(|| KeyGroup {
                key: record.join_key.clone(),
                entries: Vec::new(),
                names: BTreeSet::new(),
            });
        if let Some(amount) = record.amount {
            group.entries.push(Entry {
                amount,
                date: record.date,
            });
        }
        if !record.display_name.is_empty() {
            group.names.insert(record.display_name.clone());
        }
    }
    for group in groups.values_mut() {
        // stable, equal amounts keep the order of their dates
        group.entries.sort_by(|a, b| a.amount.cmp(&b.amount));
    }
    groups
}

/// Every non-empty display name of the operations export, regardless of its key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex(BTreeSet<String>);

impl NameIndex {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        NameIndex(
            records
                .into_iter()
                .filter(|r| !r.display_name.is_empty())
                .map(|r| r.display_name.clone())
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Return true if none of `names` appears anywhere in this index.
    pub fn misses_all(&self, names: &BTreeSet<String>) -> bool {
        self.0.is_disjoint(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Side;
    use time::macros::date;

    fn dec(v: &str) -> Decimal {
        v.parse().unwrap()
    }

    #[test]
    fn entries_are_sorted_by_amount_and_keep_their_dates() {
        let records = [
            Record::new(Side::Loyalty, "K1", Some(dec("250.05")), "SMITH").with_date(Some(date!(2025 - 01 - 02))),
            Record::new(Side::Loyalty, "K1", Some(dec("100.00")), "SMITH").with_date(Some(date!(2025 - 01 - 01))),
            Record::new(Side::Loyalty, "K1", Some(dec("100.00")), "").with_date(Some(date!(2025 - 01 - 03))),
            Record::new(Side::Loyalty, "K1", None, "JONES"),
        ];
        let groups = group_by_key(&records);
        let group = &groups["K1"];
        assert_eq!(group.amounts().collect::<Vec<_>>(), [dec("100.00"), dec("100.00"), dec("250.05")]);
        assert_eq!(
            group.dates().collect::<Vec<_>>(),
            [
                Some(date!(2025 - 01 - 01)),
                Some(date!(2025 - 01 - 03)),
                Some(date!(2025 - 01 - 02))
            ],
            "ties keep input order"
        );
        assert_eq!(group.names.iter().collect::<Vec<_>>(), ["JONES", "SMITH"]);
    }

    #[test]
    fn dates_are_kept_per_amount_even_if_absent() {
        let records = [
            Record::new(Side::Operations, "K", Some(dec("1")), "A"),
            Record::new(Side::Operations, "K", Some(dec("2")), "A"),
        ];
        let group = &group_by_key(&records)["K"];
        assert_eq!(group.amounts().len(), group.dates().len());
        assert!(group.dates().all(|d| d.is_none()));
    }

    #[test]
    fn key_without_any_amount_still_has_a_group() {
        let records = [Record::new(Side::Loyalty, "K", None, "SMITH")];
        let group = &group_by_key(&records)["K"];
        assert!(group.is_empty());
        assert!(group.names.contains("SMITH"));
    }

    #[test]
    fn name_index_skips_empty_names() {
        let records = [
            Record::new(Side::Operations, "A", None, ""),
            Record::new(Side::Operations, "B", None, "SMITH"),
        ];
        let index = NameIndex::from_records(&records);
        assert_eq!(index.len(), 1);
        assert!(index.contains("SMITH"));
        assert!(!index.contains(""));
    }
}
