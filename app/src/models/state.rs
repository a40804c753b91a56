// Wizard session state (in-memory)
//
// NOTE: This is NOT persisted; it lives for one wizard run and is reset whenever a new file is
// chosen or the user starts over.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::responses::{
    BottomRow, BottomRowsResponse, ConvertResponse, MergeCandidatesResponse, PostMergerCandidate,
    SkippedCandidate,
};

/// The spreadsheet picked on the Upload screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    /// Declared content type, when one is known.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime,
            bytes,
        }
    }
}

#[derive(Debug, Default)]
pub struct WizardState {
    pub file: Option<Arc<SelectedFile>>,

    // Preview
    pub preview_rows: Vec<Vec<String>>,
    pub header_row_index: usize,

    // Columns (selection flags run parallel to `available_columns`)
    pub available_columns: Vec<String>,
    column_selected: Vec<bool>,

    // Exclusion
    pub bottom_rows: Vec<BottomRow>,
    pub total_rows: usize,
    pub excluded_row_indices: BTreeSet<usize>,

    // Merge review
    pub candidates: Vec<PostMergerCandidate>,
    pub skipped: Vec<SkippedCandidate>,
    pub post_merger_deletions: BTreeSet<usize>,

    // Result
    pub csv_output: Option<String>,
    pub json_output: Option<String>,
    pub summary: Option<ConvertResponse>,
    pub converted_column_count: usize,
}

impl WizardState {
    pub fn reset(&mut self) {
        *self = WizardState::default();
    }

    /// Replace the selected file. Everything derived from the previous file is discarded.
    pub fn choose_file(&mut self, file: SelectedFile) {
        self.reset();
        self.file = Some(Arc::new(file));
    }

    pub fn set_preview(&mut self, rows: Vec<Vec<String>>) {
        self.preview_rows = rows;
        if self.header_row_index >= self.preview_rows.len() {
            self.header_row_index = 0;
        }
    }

    /// Returns false when `index` is not a previewed row.
    pub fn select_header_row(&mut self, index: usize) -> bool {
        if index >= self.preview_rows.len() {
            return false;
        }
        self.header_row_index = index;
        true
    }

    /// New header set from the service; every column starts selected.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.column_selected = vec![true; columns.len()];
        self.available_columns = columns;
    }

    pub fn is_column_selected(&self, index: usize) -> bool {
        self.column_selected.get(index).copied().unwrap_or(false)
    }

    pub fn toggle_column(&mut self, index: usize) {
        if let Some(flag) = self.column_selected.get_mut(index) {
            *flag = !*flag;
        }
    }

    pub fn select_all_columns(&mut self) {
        self.column_selected.iter_mut().for_each(|f| *f = true);
    }

    pub fn deselect_all_columns(&mut self) {
        self.column_selected.iter_mut().for_each(|f| *f = false);
    }

    /// Selected column names, in header order.
    pub fn selected_columns(&self) -> Vec<String> {
        self.available_columns
            .iter()
            .zip(self.column_selected.iter())
            .filter(|(_, selected)| **selected)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn selected_count_text(&self) -> String {
        let total = self.available_columns.len();
        let checked = self.column_selected.iter().filter(|f| **f).count();
        if checked == total {
            "All columns selected".to_string()
        } else if checked == 0 {
            "No columns selected".to_string()
        } else {
            format!("{} of {} columns selected", checked, total)
        }
    }

    /// Load the rows offered for exclusion, keeping earlier exclusions that still exist.
    pub fn set_bottom_rows(&mut self, resp: BottomRowsResponse) {
        let present: BTreeSet<usize> = resp.rows.iter().map(|r| r.index).collect();
        self.excluded_row_indices.retain(|i| present.contains(i));
        self.bottom_rows = resp.rows;
        self.total_rows = resp.total_rows;
    }

    pub fn toggle_excluded_row(&mut self, row_index: usize) {
        if !self.bottom_rows.iter().any(|r| r.index == row_index) {
            return;
        }
        if !self.excluded_row_indices.remove(&row_index) {
            self.excluded_row_indices.insert(row_index);
        }
    }

    pub fn exclusion_count_text(&self) -> String {
        match self.excluded_row_indices.len() {
            1 => "1 row selected for exclusion".to_string(),
            n => format!("{} rows selected for exclusion", n),
        }
    }

    /// Load merge candidates; each pre-merger row starts marked for deletion.
    pub fn set_candidates(&mut self, resp: MergeCandidatesResponse) {
        self.post_merger_deletions = resp
            .candidates
            .iter()
            .map(|c| c.pre_merger.row_index)
            .collect();
        self.candidates = resp.candidates;
        self.skipped = resp.skipped;
    }

    pub fn clear_candidates(&mut self) {
        self.candidates.clear();
        self.skipped.clear();
        self.post_merger_deletions.clear();
    }

    pub fn toggle_merge_deletion(&mut self, row_index: usize) {
        let known = self.candidates.iter().any(|c| {
            c.pre_merger.row_index == row_index || c.post_merger.row_index == row_index
        });
        if !known {
            return;
        }
        if !self.post_merger_deletions.remove(&row_index) {
            self.post_merger_deletions.insert(row_index);
        }
    }

    pub fn set_converted(&mut self, resp: ConvertResponse, column_count: usize) {
        self.csv_output = Some(resp.csv_data.clone());
        self.json_output = Some(resp.json_data.clone());
        self.converted_column_count = column_count;
        self.summary = Some(resp);
    }

    /// "8 rows × 2 columns | Removed 2 rows", plus exclusion/merge counts when non-zero.
    pub fn result_message(&self) -> Option<String> {
        let summary = self.summary.as_ref()?;
        let mut msg = format!(
            "{} rows × {} columns | Removed {} rows",
            summary.cleaned_rows, self.converted_column_count, summary.removed_rows
        );
        if summary.excluded_rows > 0 {
            msg.push_str(&format!(" | Excluded {} rows", summary.excluded_rows));
        }
        if summary.post_merger_deleted > 0 {
            msg.push_str(&format!(
                " | Deleted {} merged rows",
                summary.post_merger_deleted
            ));
        }
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::responses::CandidateRow;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn bottom_row(index: usize) -> BottomRow {
        BottomRow {
            index,
            display_index: index + 1,
            values: vec![format!("row {}", index)],
        }
    }

    #[test]
    fn select_deselect_select_round_trips_to_full_selection() {
        let mut state = WizardState::default();
        state.set_columns(columns(&["Name", "Amount", "Date"]));
        let initial = state.selected_columns();

        state.select_all_columns();
        state.deselect_all_columns();
        assert!(state.selected_columns().is_empty());
        state.select_all_columns();

        assert_eq!(state.selected_columns(), initial);
        assert_eq!(state.selected_count_text(), "All columns selected");
    }

    #[test]
    fn selected_count_text_variants() {
        let mut state = WizardState::default();
        state.set_columns(columns(&["A", "B", "C"]));
        state.toggle_column(1);
        assert_eq!(state.selected_count_text(), "2 of 3 columns selected");
        assert_eq!(state.selected_columns(), columns(&["A", "C"]));
        state.deselect_all_columns();
        assert_eq!(state.selected_count_text(), "No columns selected");
    }

    #[test]
    fn exclusion_count_text_pluralizes() {
        let mut state = WizardState::default();
        state.set_bottom_rows(BottomRowsResponse {
            rows: vec![bottom_row(7), bottom_row(8), bottom_row(9)],
            columns: columns(&["A"]),
            total_rows: 10,
        });
        assert_eq!(state.exclusion_count_text(), "0 rows selected for exclusion");
        state.toggle_excluded_row(8);
        assert_eq!(state.exclusion_count_text(), "1 row selected for exclusion");
        state.toggle_excluded_row(9);
        assert_eq!(state.exclusion_count_text(), "2 rows selected for exclusion");
        state.toggle_excluded_row(8);
        assert_eq!(state.exclusion_count_text(), "1 row selected for exclusion");
    }

    #[test]
    fn unknown_rows_cannot_be_excluded() {
        let mut state = WizardState::default();
        state.set_bottom_rows(BottomRowsResponse {
            rows: vec![bottom_row(1)],
            columns: Vec::new(),
            total_rows: 2,
        });
        state.toggle_excluded_row(42);
        assert!(state.excluded_row_indices.is_empty());
    }

    #[test]
    fn refreshed_bottom_rows_drop_stale_exclusions() {
        let mut state = WizardState::default();
        state.set_bottom_rows(BottomRowsResponse {
            rows: vec![bottom_row(1), bottom_row(2)],
            columns: Vec::new(),
            total_rows: 3,
        });
        state.toggle_excluded_row(1);
        state.toggle_excluded_row(2);
        state.set_bottom_rows(BottomRowsResponse {
            rows: vec![bottom_row(2), bottom_row(3)],
            columns: Vec::new(),
            total_rows: 4,
        });
        assert_eq!(
            state.excluded_row_indices.iter().copied().collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[test]
    fn pre_merger_rows_default_to_deletion() {
        let mut state = WizardState::default();
        state.set_candidates(MergeCandidatesResponse {
            candidates: vec![PostMergerCandidate {
                pre_merger: CandidateRow {
                    row_index: 3,
                    values: Vec::new(),
                },
                post_merger: CandidateRow {
                    row_index: 6,
                    values: Vec::new(),
                },
            }],
            skipped: Vec::new(),
            columns: Vec::new(),
        });
        assert!(state.post_merger_deletions.contains(&3));
        assert!(!state.post_merger_deletions.contains(&6));

        state.toggle_merge_deletion(6);
        state.toggle_merge_deletion(3);
        state.toggle_merge_deletion(99);
        assert_eq!(
            state.post_merger_deletions.iter().copied().collect::<Vec<_>>(),
            vec![6]
        );
    }

    #[test]
    fn choosing_a_file_resets_selections() {
        let mut state = WizardState::default();
        state.set_bottom_rows(BottomRowsResponse {
            rows: vec![bottom_row(1)],
            columns: Vec::new(),
            total_rows: 1,
        });
        state.toggle_excluded_row(1);
        state.csv_output = Some("a\n".to_string());

        state.choose_file(SelectedFile::new("next.xlsx", None, vec![0; 4]));

        assert!(state.excluded_row_indices.is_empty());
        assert!(state.post_merger_deletions.is_empty());
        assert!(state.csv_output.is_none());
        assert_eq!(state.file.as_ref().map(|f| f.size), Some(4));
    }

    #[test]
    fn result_message_reports_zero_counts_as_numbers() {
        let mut state = WizardState::default();
        state.set_converted(
            ConvertResponse {
                csv_data: String::new(),
                json_data: String::new(),
                original_rows: 8,
                cleaned_rows: 8,
                removed_rows: 0,
                excluded_rows: 0,
                post_merger_deleted: 0,
            },
            2,
        );
        assert_eq!(
            state.result_message().as_deref(),
            Some("8 rows × 2 columns | Removed 0 rows")
        );
    }

    #[test]
    fn result_message_appends_exclusions_and_merges() {
        let mut state = WizardState::default();
        state.set_converted(
            ConvertResponse {
                csv_data: String::new(),
                json_data: String::new(),
                original_rows: 12,
                cleaned_rows: 7,
                removed_rows: 5,
                excluded_rows: 2,
                post_merger_deleted: 1,
            },
            3,
        );
        assert_eq!(
            state.result_message().as_deref(),
            Some("7 rows × 3 columns | Removed 5 rows | Excluded 2 rows | Deleted 1 merged rows")
        );
    }
}
