use crate::record::Side;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot use '{0}' as delimiter")]
    InvalidDelimiter(char),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("The {side} export has no {kind} column of index or name '{name}' - found columns: {found}")]
    MissingColumn {
        side: Side,
        kind: &'static str,
        name: String,
        found: String,
    },
    #[error("No {side} export ending in .csv with a name containing any of {keywords:?} was found in '{}'", folder.display())]
    NoInputFound {
        side: Side,
        folder: PathBuf,
        keywords: Vec<String>,
    },
}

/// How the join key is obtained from a row.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeySource {
    /// The column holds a card number that embeds the join key.
    Card { column: String },
    /// The column already holds the join key.
    Direct { column: String },
}

impl KeySource {
    pub fn column(&self) -> &str {
        match self {
            KeySource::Card { column } | KeySource::Direct { column } => column,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NameMode {
    /// The column holds a full name of which only the last token is used.
    Surname,
    /// The column holds a surname only.
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FilterAction {
    Keep,
    Drop,
}

/// Keep or drop rows whose trimmed and uppercased value in `column` is one of `values`.
///
/// The filter has no effect if the export doesn't have the column.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub action: FilterAction,
    pub values: Vec<String>,
}

/// The layout of one export. Columns are given by name or by index.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Options {
    pub key: KeySource,
    pub name_column: String,
    pub name_mode: NameMode,
    pub amount_column: String,
    #[serde(default)]
    pub date_column: Option<String>,
    /// The first of these columns that exists provides reward points.
    #[serde(default)]
    pub points_columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<RowFilter>,
    /// A line containing any of these, ignoring case, is the header line.
    #[serde(default)]
    pub header_keywords: Vec<String>,
    /// Sniffed from the header line if unset.
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl Options {
    /// The layout of the loyalty program export.
    pub fn loyalty() -> Self {
        Options {
            key: KeySource::Card {
                column: "Loyalty Card Number".into(),
            },
            name_column: "Guest Name".into(),
            name_mode: NameMode::Surname,
            amount_column: "Total Revenue (Net of VAT)".into(),
            date_column: Some("Departure".into()),
            points_columns: Vec::new(),
            filters: Vec::new(),
            header_keywords: vec!["loyalty card number".into(), "guest name".into()],
            delimiter: None,
        }
    }

    /// The layout of the operations export.
    pub fn operations() -> Self {
        Options {
            key: KeySource::Direct {
                column: "PMID".into(),
            },
            name_column: "Last name".into(),
            name_mode: NameMode::Full,
            amount_column: "Revenue Hotel currency".into(),
            date_column: Some("Check-out date".into()),
            points_columns: vec!["Rewards Points".into(), "Reward points".into()],
            filters: vec![
                RowFilter {
                    column: "Credit type".into(),
                    action: FilterAction::Keep,
                    values: vec!["HOTEL STAY".into()],
                },
                RowFilter {
                    column: "Earn Media".into(),
                    action: FilterAction::Drop,
                    values: vec!["HOTEL LINK".into()],
                },
            ],
            header_keywords: vec![
                "pmid".into(),
                "revenue hotel currency".into(),
                "card no".into(),
                "cardholder (stamped)".into(),
            ],
            delimiter: None,
        }
    }
}

pub(crate) mod function {
    use crate::ingest::{Error, FilterAction, KeySource, NameMode, Options};
    use crate::normalize;
    use crate::record::{Record, Side};
    use std::borrow::Cow;
    use std::io::Read;
    use std::path::{Path, PathBuf};

    /// Only this many lines are searched for the header line.
    const MAX_HEADER_LINE: usize = 120;
    const DELIMITERS: [char; 3] = [';', '\t', ','];

    /// Read all `csv_data` of one `side` into records, in input order.
    ///
    /// Cells that can't be parsed become absent values, and rows without join key are skipped.
    pub fn ingest(
        side: Side,
        csv_data: impl IntoIterator<Item = impl std::io::Read>,
        options: &Options,
    ) -> Result<Vec<Record>, Error> {
        let mut out = Vec::new();
        for mut data in csv_data {
            let mut buf = Vec::new();
            data.read_to_end(&mut buf)?;
            let text = decode(&buf);
            read_export(side, &text, options, &mut out)?;
        }
        Ok(out)
    }

    /// Return the most recently modified `.csv` file in `folder` whose lowercase name contains any of `keywords`.
    pub fn find_latest(side: Side, folder: &Path, keywords: &[&str]) -> Result<PathBuf, Error> {
        let mut latest = None::<(std::time::SystemTime, PathBuf)>;
        for entry in std::fs::read_dir(folder)? {
            let entry = entry?;
            let path = entry.path();
            let is_csv = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !is_csv || !keywords.iter().any(|k| name.contains(k)) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if latest.as_ref().map_or(true, |(time, _)| modified > *time) {
                latest = Some((modified, path));
            }
        }
        latest.map(|(_, path)| path).ok_or_else(|| Error::NoInputFound {
            side,
            folder: folder.to_owned(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
    }

    fn read_export(side: Side, text: &str, options: &Options, out: &mut Vec<Record>) -> Result<(), Error> {
        let header_line = find_header_line(text, &options.header_keywords);
        let body = skip_lines(text, header_line);
        let delimiter = options
            .delimiter
            .unwrap_or_else(|| sniff_delimiter(body.lines().next().unwrap_or_default()));
        let delimiter_byte: u8 = delimiter
            .try_into()
            .map_err(|_| Error::InvalidDelimiter(delimiter))?;

        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte)
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());
        let headers: Vec<String> = csv.headers()?.iter().map(|h| h.trim().to_owned()).collect();

        let required = |name: &str, kind: &'static str| {
            header_idx(name, &headers).ok_or_else(|| Error::MissingColumn {
                side,
                kind,
                name: name.to_owned(),
                found: headers.join(", "),
            })
        };
        let key_index = required(options.key.column(), "key")?;
        let name_index = required(&options.name_column, "name")?;
        let amount_index = required(&options.amount_column, "amount")?;
        let date_index = options
            .date_column
            .as_deref()
            .and_then(|name| header_idx(name, &headers));
        let points_index = options
            .points_columns
            .iter()
            .find_map(|name| header_idx(name, &headers));
        let filters: Vec<_> = options
            .filters
            .iter()
            .filter_map(|filter| match header_idx(&filter.column, &headers) {
                Some(index) => Some((index, filter)),
                None => {
                    tracing::debug!(%side, column = %filter.column, "filter column not present, ignoring filter");
                    None
                }
            })
            .collect();

        let (mut kept, mut filtered, mut keyless) = (0usize, 0usize, 0usize);
        for record in csv.records() {
            let record = record?;
            let cell = |index: usize| record.get(index).unwrap_or_default();

            let passes = filters.iter().all(|(index, filter)| {
                let value = cell(*index).trim().to_uppercase();
                let listed = filter.values.iter().any(|v| v.trim().eq_ignore_ascii_case(&value));
                match filter.action {
                    FilterAction::Keep => listed,
                    FilterAction::Drop => !listed,
                }
            });
            if !passes {
                filtered += 1;
                continue;
            }

            let join_key = match &options.key {
                KeySource::Card { .. } => {
                    normalize::extract_join_key(&normalize::normalize_identifier(cell(key_index)))
                }
                KeySource::Direct { .. } => normalize::normalize_direct_key(cell(key_index)),
            };
            if join_key.is_empty() {
                keyless += 1;
                continue;
            }
            let display_name = match options.name_mode {
                NameMode::Surname => normalize::extract_surname(cell(name_index)),
                NameMode::Full => normalize::normalize_full_name(cell(name_index)),
            };
            let points =
                points_index.map(|index| normalize::parse_amount(cell(index)).unwrap_or_default());

            out.push(
                Record::new(side, join_key, normalize::parse_amount(cell(amount_index)), display_name)
                    .with_date(date_index.and_then(|index| normalize::parse_date(cell(index))))
                    .with_points(points),
            );
            kept += 1;
        }
        tracing::info!(
            %side,
            header_line = header_line + 1,
            delimiter = ?delimiter,
            kept,
            filtered,
            keyless,
            "read export"
        );
        Ok(())
    }

    /// Decode UTF-8, falling back to Windows-1250 which is what legacy exports use.
    fn decode(buf: &[u8]) -> Cow<'_, str> {
        let buf = buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(buf);
        match std::str::from_utf8(buf) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => encoding_rs::WINDOWS_1250.decode_without_bom_handling(buf).0,
        }
    }

    /// Return the index of the header line, which is the first line containing a keyword,
    /// or else the first with plenty of delimiters, or else the first line.
    fn find_header_line(text: &str, keywords: &[String]) -> usize {
        let lines = || text.lines().take(MAX_HEADER_LINE);
        let keywords: Vec<_> = keywords.iter().map(|k| k.to_lowercase()).collect();
        lines()
            .position(|line| {
                let line = line.to_lowercase();
                keywords.iter().any(|k| line.contains(k.as_str()))
            })
            .or_else(|| {
                lines().position(|line| {
                    DELIMITERS
                        .iter()
                        .any(|d| line.matches(*d).count() >= 5)
                })
            })
            .unwrap_or(0)
    }

    fn skip_lines(text: &str, count: usize) -> &str {
        let offset: usize = text.split_inclusive('\n').take(count).map(str::len).sum();
        &text[offset..]
    }

    /// The delimiter occurring most often in `header`, preferring `;` on ties.
    fn sniff_delimiter(header: &str) -> char {
        let mut best = (DELIMITERS[0], header.matches(DELIMITERS[0]).count());
        for d in &DELIMITERS[1..] {
            let count = header.matches(*d).count();
            if count > best.1 {
                best = (*d, count);
            }
        }
        best.0
    }

    /// Return the position of `name_or_index` in `headers` or `None` if it wasn't found.
    /// If `name_or_index` is a number, it will be used as number and not as name.
    fn header_idx(name_or_index: &str, headers: &[String]) -> Option<usize> {
        if let Ok(index) = name_or_index.parse() {
            headers.get(index).map(|_| index)
        } else {
            headers
                .iter()
                .position(|name| name.eq_ignore_ascii_case(name_or_index.trim()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn header_line_by_keyword_or_delimiters() {
            let text = "Report\nHotel: X\nPMID;Last name;Revenue Hotel currency\n1;a;2\n";
            assert_eq!(find_header_line(text, &["pmid".into()]), 2);
            let text = "Title\na,b,c,d,e,f\n";
            assert_eq!(find_header_line(text, &[]), 1);
            assert_eq!(find_header_line("a\nb\n", &[]), 0);
        }

        #[test]
        fn delimiter_sniffing() {
            assert_eq!(sniff_delimiter("a;b;c"), ';');
            assert_eq!(sniff_delimiter("a\tb\tc;d"), '\t');
            assert_eq!(sniff_delimiter("a,b,c"), ',');
            assert_eq!(sniff_delimiter("abc"), ';');
        }

        #[test]
        fn legacy_encoding_is_decoded() {
            // "Łódź" in Windows-1250
            let text = decode(b"\xA3\xF3d\x9F");
            assert_eq!(text, "Łódź");
            assert_eq!(decode(b"\xEF\xBB\xBFPMID"), "PMID");
        }

        #[test]
        fn skipping_lines() {
            assert_eq!(skip_lines("a\r\nb\nc", 2), "c");
            assert_eq!(skip_lines("a", 0), "a");
        }
    }
}
