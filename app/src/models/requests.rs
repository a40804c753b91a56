// Conversion service request models
// One endpoint, five logical actions distinguished by the `action` form field.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::state::SelectedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionAction {
    GetPreview,
    GetHeaders,
    GetBottomRows,
    GetPostMergerCandidates,
    Convert,
}

impl ConversionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionAction::GetPreview => "get_preview",
            ConversionAction::GetHeaders => "get_headers",
            ConversionAction::GetBottomRows => "get_bottom_rows",
            ConversionAction::GetPostMergerCandidates => "get_post_merger_candidates",
            ConversionAction::Convert => "convert",
        }
    }

    /// Shown when the service fails without giving a reason.
    pub fn default_error_message(&self) -> &'static str {
        match self {
            ConversionAction::GetPreview => "Failed to load preview",
            ConversionAction::GetHeaders => "Failed to process file",
            ConversionAction::GetBottomRows => "Failed to load rows",
            ConversionAction::GetPostMergerCandidates => "Failed to analyze merge candidates",
            ConversionAction::Convert => "Conversion failed",
        }
    }
}

impl fmt::Display for ConversionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single multipart submission against the conversion endpoint.
///
/// Optional fields are only sent for the actions that need them; see
/// [`ConversionRequest::get_preview`] and friends for the per-action field sets.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub action: ConversionAction,
    pub file: Arc<SelectedFile>,
    pub header_row: Option<usize>,
    pub columns: Option<Vec<String>>,
    pub exclude_row_indices: Option<BTreeSet<usize>>,
    pub post_merger_deletions: Option<BTreeSet<usize>>,
}

impl ConversionRequest {
    fn bare(action: ConversionAction, file: Arc<SelectedFile>) -> Self {
        Self {
            action,
            file,
            header_row: None,
            columns: None,
            exclude_row_indices: None,
            post_merger_deletions: None,
        }
    }

    pub fn get_preview(file: Arc<SelectedFile>) -> Self {
        Self::bare(ConversionAction::GetPreview, file)
    }

    pub fn get_headers(file: Arc<SelectedFile>, header_row: usize) -> Self {
        Self {
            header_row: Some(header_row),
            ..Self::bare(ConversionAction::GetHeaders, file)
        }
    }

    pub fn get_bottom_rows(
        file: Arc<SelectedFile>,
        header_row: usize,
        columns: Vec<String>,
    ) -> Self {
        Self {
            header_row: Some(header_row),
            columns: Some(columns),
            ..Self::bare(ConversionAction::GetBottomRows, file)
        }
    }

    pub fn get_post_merger_candidates(
        file: Arc<SelectedFile>,
        header_row: usize,
        columns: Vec<String>,
        exclude_row_indices: BTreeSet<usize>,
    ) -> Self {
        Self {
            header_row: Some(header_row),
            columns: Some(columns),
            exclude_row_indices: Some(exclude_row_indices),
            ..Self::bare(ConversionAction::GetPostMergerCandidates, file)
        }
    }

    pub fn convert(
        file: Arc<SelectedFile>,
        header_row: usize,
        columns: Vec<String>,
        exclude_row_indices: BTreeSet<usize>,
        post_merger_deletions: BTreeSet<usize>,
    ) -> Self {
        Self {
            header_row: Some(header_row),
            columns: Some(columns),
            exclude_row_indices: Some(exclude_row_indices),
            post_merger_deletions: Some(post_merger_deletions),
            ..Self::bare(ConversionAction::Convert, file)
        }
    }

    /// Text fields of the multipart body, in submission order. The file part is added by the
    /// transport.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("action", self.action.as_str().to_string())];

        if let Some(row) = self.header_row {
            fields.push(("header_row", row.to_string()));
        }
        if let Some(columns) = &self.columns {
            fields.push((
                "columns",
                serde_json::to_string(columns).unwrap_or_else(|_| "[]".to_string()),
            ));
        }
        if let Some(rows) = &self.exclude_row_indices {
            fields.push(("exclude_row_indices", json_index_array(rows)));
        }
        if let Some(rows) = &self.post_merger_deletions {
            fields.push(("post_merger_deletions", json_index_array(rows)));
        }

        fields
    }
}

fn json_index_array(rows: &BTreeSet<usize>) -> String {
    let v: Vec<usize> = rows.iter().copied().collect();
    serde_json::to_string(&v).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> Arc<SelectedFile> {
        Arc::new(SelectedFile::new("sales.xlsx", None, vec![1, 2, 3]))
    }

    fn field<'a>(fields: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn preview_sends_only_the_action() {
        let fields = ConversionRequest::get_preview(file()).form_fields();
        assert_eq!(fields, vec![("action", "get_preview".to_string())]);
    }

    #[test]
    fn headers_carry_header_row_as_text() {
        let fields = ConversionRequest::get_headers(file(), 3).form_fields();
        assert_eq!(field(&fields, "action"), Some("get_headers"));
        assert_eq!(field(&fields, "header_row"), Some("3"));
        assert_eq!(field(&fields, "columns"), None);
    }

    #[test]
    fn candidates_request_omits_post_merger_deletions() {
        let excluded: BTreeSet<usize> = [7, 2].into_iter().collect();
        let fields = ConversionRequest::get_post_merger_candidates(
            file(),
            0,
            vec!["Name".to_string()],
            excluded,
        )
        .form_fields();
        assert_eq!(field(&fields, "columns"), Some(r#"["Name"]"#));
        assert_eq!(field(&fields, "exclude_row_indices"), Some("[2,7]"));
        assert_eq!(field(&fields, "post_merger_deletions"), None);
    }

    #[test]
    fn convert_sends_every_selection() {
        let fields = ConversionRequest::convert(
            file(),
            1,
            vec!["Name".to_string(), "Amount".to_string()],
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .form_fields();
        assert_eq!(field(&fields, "action"), Some("convert"));
        assert_eq!(field(&fields, "header_row"), Some("1"));
        assert_eq!(field(&fields, "columns"), Some(r#"["Name","Amount"]"#));
        assert_eq!(field(&fields, "exclude_row_indices"), Some("[]"));
        assert_eq!(field(&fields, "post_merger_deletions"), Some("[]"));
    }

    #[test]
    fn column_names_are_json_escaped() {
        let fields =
            ConversionRequest::get_bottom_rows(file(), 0, vec!["Say \"hi\"".to_string()])
                .form_fields();
        assert_eq!(field(&fields, "columns"), Some(r#"["Say \"hi\""]"#));
    }
}
