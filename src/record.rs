use rust_decimal::Decimal;

/// The export a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Loyalty,
    Operations,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Loyalty => "loyalty",
            Side::Operations => "operations",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transaction line of either export, with all column concerns already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The key shared by both exports, never empty.
    pub join_key: String,
    /// `None` if the amount couldn't be parsed, which keeps the row out of amount pairing.
    pub amount: Option<Decimal>,
    pub date: Option<time::Date>,
    /// The normalized surname, possibly empty.
    pub display_name: String,
    /// Reward points if the export has a points column, with unparsable values read as zero.
    pub points: Option<Decimal>,
    pub side: Side,
}

impl Record {
    /// Create a record without points or date.
    pub fn new(side: Side, join_key: impl Into<String>, amount: Option<Decimal>, display_name: impl Into<String>) -> Self {
        Record {
            join_key: join_key.into(),
            amount,
            date: None,
            display_name: display_name.into(),
            points: None,
            side,
        }
    }

    pub fn with_date(mut self, date: Option<time::Date>) -> Self {
        self.date = date;
        self
    }

    pub fn with_points(mut self, points: Option<Decimal>) -> Self {
        self.points = points;
        self
    }
}
