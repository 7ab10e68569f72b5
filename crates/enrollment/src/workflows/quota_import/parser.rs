use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One CSV row with its 1-based line number (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuotaRecord {
    pub(crate) line: u64,
    pub(crate) state: String,
    pub(crate) city: Option<String>,
    pub(crate) limit: u32,
    pub(crate) waitlist_limit: Option<u32>,
}

/// Reads `state,city,limit,waitlist_limit` rows. Columns may appear in any order.
pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<QuotaRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, record) in csv_reader.deserialize::<QuotaRow>().enumerate() {
        let row = record?;
        records.push(QuotaRecord {
            line: index as u64 + 2,
            state: row.state,
            city: row.city,
            limit: row.limit,
            waitlist_limit: row.waitlist_limit,
        });
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct QuotaRow {
    state: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    city: Option<String>,
    limit: u32,
    #[serde(default, deserialize_with = "empty_string_as_none_u32")]
    waitlist_limit: Option<u32>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn empty_string_as_none_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match empty_string_as_none(deserializer)? {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
