//! Readers for the movie summary corpus files.
//!
//! `plot_summaries.txt` is `id \t summary` per line. `movie.metadata.tsv` has
//! nine columns: id, freebase id, name, release date, box office, runtime,
//! languages, countries, genres, where the last three are JSON objects mapping
//! freebase ids to display names.

use anyhow::{anyhow, Context, Result};
use plotsim_core::{DocId, DocMeta};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn read_summaries(path: &Path) -> Result<Vec<(DocId, String)>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_summaries(BufReader::new(f)).with_context(|| format!("reading {}", path.display()))
}

pub fn parse_summaries<R: BufRead>(reader: R) -> Result<Vec<(DocId, String)>> {
    let mut out = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("line {}", line_no + 1))?;
        if line.trim().is_empty() { continue; }
        let (id, text) = line
            .split_once('\t')
            .ok_or_else(|| anyhow!("line {}: expected `id<TAB>summary`", line_no + 1))?;
        let id = parse_id(id).with_context(|| format!("line {}", line_no + 1))?;
        out.push((id, text.to_string()));
    }
    Ok(out)
}

pub fn read_metadata(path: &Path) -> Result<Vec<(DocId, DocMeta)>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_metadata(BufReader::new(f)).with_context(|| format!("reading {}", path.display()))
}

pub fn parse_metadata<R: BufRead>(reader: R) -> Result<Vec<(DocId, DocMeta)>> {
    let mut out = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("line {}", line_no + 1))?;
        if line.trim().is_empty() { continue; }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 9 {
            return Err(anyhow!("line {}: expected 9 columns, found {}", line_no + 1, cols.len()));
        }
        let id = parse_id(cols[0]).with_context(|| format!("line {}", line_no + 1))?;
        let meta = DocMeta {
            title: cols[2].to_string(),
            release_date: non_empty(cols[3]),
            languages: flatten_json_field(cols[6]),
            countries: flatten_json_field(cols[7]),
            genres: flatten_json_field(cols[8]),
            text_path: None,
        };
        out.push((id, meta));
    }
    Ok(out)
}

/// `{"/m/02h40lc": "English Language", ...}` -> `English Language, ...`.
/// Values keep the order they have in the file. Invalid JSON and empty objects
/// yield `None`.
pub fn flatten_json_field(field: &str) -> Option<String> {
    // CSV-style doubled quotes show up in re-exported copies of the file
    let unescaped = field.replace("\"\"", "\"");
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&unescaped).ok()?;
    let values: Vec<&str> = map.values().filter_map(|v| v.as_str()).collect();
    if values.is_empty() { None } else { Some(values.join(", ")) }
}

fn parse_id(raw: &str) -> Result<DocId> {
    raw.trim().parse::<DocId>().map_err(|e| anyhow!("invalid document id {raw:?}: {e}"))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn summaries_parse_and_skip_blank_lines() {
        let input = "23890098\tShlykov, a hard-working taxi driver...\n\n31186339\tThe nation of Panem.\n";
        let docs = parse_summaries(Cursor::new(input)).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1], (31186339, "The nation of Panem.".to_string()));
    }

    #[test]
    fn malformed_summary_id_fails() {
        let err = parse_summaries(Cursor::new("abc\tplot\n")).unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
        assert!(parse_summaries(Cursor::new("12 no tab here\n")).is_err());
    }

    #[test]
    fn metadata_fields_are_flattened() {
        let line = "975900\t/m/03vyhn\tGhosts of Mars\t2001-08-24\t14010832\t98.0\t{\"/m/02h40lc\": \"English Language\"}\t{\"/m/09c7w0\": \"United States of America\"}\t{\"/m/01jfsb\": \"Thriller\", \"/m/06n90\": \"Science Fiction\"}\n";
        let docs = parse_metadata(Cursor::new(line)).unwrap();
        let (id, meta) = &docs[0];
        assert_eq!(*id, 975900);
        assert_eq!(meta.title, "Ghosts of Mars");
        assert_eq!(meta.release_date.as_deref(), Some("2001-08-24"));
        assert_eq!(meta.languages.as_deref(), Some("English Language"));
        assert_eq!(meta.genres.as_deref(), Some("Thriller, Science Fiction"));
    }

    #[test]
    fn bad_json_fields_are_absent() {
        assert_eq!(flatten_json_field("{}"), None);
        assert_eq!(flatten_json_field("not json"), None);
        assert_eq!(flatten_json_field("{\"\"/m/x\"\": \"\"Drama\"\"}"), Some("Drama".into()));
    }

    #[test]
    fn flattened_values_keep_file_order() {
        let field = r#"{"/m/06n90": "Science Fiction", "/m/01jfsb": "Thriller", "/m/02kdv5l": "Action"}"#;
        assert_eq!(flatten_json_field(field).as_deref(), Some("Science Fiction, Thriller, Action"));
    }
}
