//! Warncell reference table: `warncellid -> {full_name, short_name}`.
//!
//! Grounded on the teacher's use of the `csv` crate throughout its pipeline,
//! applied here to a semicolon-delimited document. Startup fails if the
//! table can't be loaded — geocode-to-short-name resolution is a hard
//! precondition for abbreviated messages (spec.md §4.2).

use std::collections::HashMap;
use std::io::Read;

use anyhow::Context;
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::Result;

/// One entry in the Warncell reference table.
#[derive(Clone, Debug)]
pub struct WarncellEntry {
    pub full_name: String,
    pub short_name: String,
}

/// Raw row shape of the five-column DWD document. Field names are our own
/// (the original header uses DWD-specific umlauts that don't round-trip
/// cleanly as Rust identifiers), which is also why we discard the header
/// row explicitly rather than relying on `csv`'s header inference.
#[derive(Debug, Deserialize)]
struct Row {
    warncellid: String,
    fullname: String,
    #[allow(dead_code)]
    nuts_kennung: String,
    shortname: String,
    #[allow(dead_code)]
    sign_kennung: String,
}

/// `warncellid -> WarncellEntry` lookup table, loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct WarncellTable {
    entries: HashMap<String, WarncellEntry>,
}

impl WarncellTable {
    /// Parse the table from its on-the-wire semicolon-delimited form. The
    /// first record is a header row and is always discarded.
    pub fn parse(body: &str) -> Result<WarncellTable> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());

        let mut entries = HashMap::new();
        for (i, result) in reader.deserialize::<Row>().enumerate() {
            if i == 0 {
                // Header row; discard.
                continue;
            }
            let row = result.context("malformed Warncell CSV row")?;
            entries.insert(
                row.warncellid,
                WarncellEntry {
                    full_name: row.fullname,
                    short_name: row.shortname,
                },
            );
        }

        if entries.is_empty() {
            return Err(anyhow::format_err!(
                "Warncell table is empty after parsing; refusing to start"
            ));
        }

        Ok(WarncellTable { entries })
    }

    /// Load and parse the table from an already-open reader (a downloaded
    /// HTTP body, or a local file for offline testing).
    pub fn load_from_reader(mut reader: impl Read) -> Result<WarncellTable> {
        let mut body = String::new();
        reader
            .read_to_string(&mut body)
            .context("could not read Warncell document")?;
        Self::parse(&body)
    }

    /// Fetch the Warncell document over HTTP and parse it. This is a hard
    /// startup precondition: failure here is fatal.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<WarncellTable> {
        let body = client
            .get(url)
            .header("User-Agent", "Mozilla")
            .send()
            .await
            .context("could not download Warncell table")?
            .error_for_status()
            .context("Warncell server returned an error status")?
            .text()
            .await
            .context("could not read Warncell response body")?;
        Self::parse(&body)
    }

    /// Look up a code's short name, if known.
    pub fn short_name(&self, warncellid: &str) -> Option<&str> {
        self.entries.get(warncellid).map(|e| e.short_name.as_str())
    }

    /// Look up a code's full name, if known.
    pub fn full_name(&self, warncellid: &str) -> Option<&str> {
        self.entries.get(warncellid).map(|e| e.full_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "warncellid;fullname;nuts_kennung;shortname;sign_kennung\n\
                           803155033;Gemeinde Musterhausen;DE123;Musterhausen;01\n\
                           803155034;Stadt Beispielstadt;DE124;Beispielstadt;02\n";

    #[test]
    fn discards_header_row() {
        let table = WarncellTable::parse(SAMPLE).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.short_name("warncellid").is_none());
    }

    #[test]
    fn looks_up_by_id() {
        let table = WarncellTable::parse(SAMPLE).unwrap();
        assert_eq!(table.short_name("803155033"), Some("Musterhausen"));
        assert_eq!(table.full_name("803155034"), Some("Stadt Beispielstadt"));
    }

    #[test]
    fn unknown_code_falls_back_to_none() {
        let table = WarncellTable::parse(SAMPLE).unwrap();
        assert_eq!(table.short_name("000000"), None);
    }

    #[test]
    fn empty_table_is_an_error() {
        assert!(WarncellTable::parse("warncellid;fullname;nuts_kennung;shortname;sign_kennung\n")
            .is_err());
    }
}
