// Conversion service response models
// One typed schema per action; anything that does not fit is reported as a malformed response.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `{ "error": "..." }` body returned alongside a non-success status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreviewResponse {
    #[serde(deserialize_with = "deserialize_rows")]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeadersResponse {
    #[serde(deserialize_with = "deserialize_cells")]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BottomRow {
    pub index: usize,
    pub display_index: usize,
    #[serde(deserialize_with = "deserialize_cells")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BottomRowsResponse {
    pub rows: Vec<BottomRow>,
    #[serde(deserialize_with = "deserialize_cells")]
    pub columns: Vec<String>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidateRow {
    pub row_index: usize,
    #[serde(deserialize_with = "deserialize_cells")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostMergerCandidate {
    pub pre_merger: CandidateRow,
    pub post_merger: CandidateRow,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkippedCandidate {
    pub row_index: usize,
    #[serde(default)]
    pub scheme_name: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MergeCandidatesResponse {
    pub candidates: Vec<PostMergerCandidate>,
    #[serde(default)]
    pub skipped: Vec<SkippedCandidate>,
    #[serde(default, deserialize_with = "deserialize_cells")]
    pub columns: Vec<String>,
}

/// Row counts are required: a response without them is malformed rather than "N/A".
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvertResponse {
    pub csv_data: String,
    pub json_data: String,
    pub original_rows: usize,
    pub cleaned_rows: usize,
    pub removed_rows: usize,
    #[serde(default)]
    pub excluded_rows: usize,
    #[serde(default)]
    pub post_merger_deleted: usize,
}

/// Decoded success payload, tagged by the action that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Preview(PreviewResponse),
    Headers(HeadersResponse),
    BottomRows(BottomRowsResponse),
    MergeCandidates(MergeCandidatesResponse),
    Converted(ConvertResponse),
}

// The service renders spreadsheet cells through pandas, so numbers, booleans and nulls can leak
// into what the contract calls string cells. Normalize them instead of failing the whole step.
fn cell_to_string(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn deserialize_cells<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Value> = Vec::deserialize(deserializer)?;
    Ok(raw.into_iter().map(cell_to_string).collect())
}

fn deserialize_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<Value>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preview_cells_are_normalized_to_strings() {
        let parsed: PreviewResponse = serde_json::from_value(json!({
            "rows": [["Name", "Amount"], ["Alice", 12.5], [null, true]]
        }))
        .expect("preview should parse");
        assert_eq!(parsed.rows[1], vec!["Alice", "12.5"]);
        assert_eq!(parsed.rows[2], vec!["", "true"]);
    }

    #[test]
    fn convert_without_counts_is_rejected() {
        let res: Result<ConvertResponse, _> = serde_json::from_value(json!({
            "csv_data": "a\n1\n",
            "json_data": "[]"
        }));
        let err = res.expect_err("missing counts must not parse");
        assert!(err.to_string().contains("original_rows"), "{}", err);
    }

    #[test]
    fn convert_tolerates_missing_optional_counters() {
        let parsed: ConvertResponse = serde_json::from_value(json!({
            "csv_data": "Name\nAlice\n",
            "json_data": "[{\"Name\":\"Alice\"}]",
            "original_rows": 3,
            "cleaned_rows": 1,
            "removed_rows": 2
        }))
        .expect("convert should parse");
        assert_eq!(parsed.excluded_rows, 0);
        assert_eq!(parsed.post_merger_deleted, 0);
    }

    #[test]
    fn candidates_parse_with_skipped_entries() {
        let parsed: MergeCandidatesResponse = serde_json::from_value(json!({
            "candidates": [{
                "pre_merger": {"row_index": 4, "values": ["Fund A", 10]},
                "post_merger": {"row_index": 9, "values": ["Fund A (merged)", 10]}
            }],
            "skipped": [{"row_index": 5, "scheme_name": "Fund B", "reason": "no match"}],
            "columns": ["Scheme", "NAV"]
        }))
        .expect("candidates should parse");
        assert_eq!(parsed.candidates[0].pre_merger.row_index, 4);
        assert_eq!(parsed.candidates[0].post_merger.values[1], "10");
        assert_eq!(parsed.skipped[0].reason, "no match");
    }
}
