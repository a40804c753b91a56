//! Step controller for the spreadsheet cleanup wizard.
//!
//! Screens run `Upload -> Preview -> Columns -> Exclusion -> MergeReview (optional) -> Result`.
//! The controller owns the [`WizardState`] and is driven purely by [`Event`]s; anything with a
//! side effect (a conversion request, saving an export) is returned as an [`Effect`] for the
//! caller to execute. Request completions come back in as [`Event::Completed`].
//!
//! Only one request may be outstanding at a time. While one is in flight every user event is
//! ignored, so overlapping submissions against the same state cannot happen.

pub mod driver;
pub mod export;
pub mod file_check;

use crate::error::WizardError;
use crate::models::requests::{ConversionAction, ConversionRequest};
use crate::models::responses::Payload;
use crate::models::state::{SelectedFile, WizardState};
use export::{ExportArtifact, ExportFormat};
use log::{debug, info, warn};
use std::path::PathBuf;

pub const NO_COLUMNS_MESSAGE: &str = "Please select at least one column";
const EMPTY_PREVIEW_MESSAGE: &str = "No rows were found in the uploaded file";
const EMPTY_HEADERS_MESSAGE: &str = "No columns were found in the selected header row";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Upload,
    Preview,
    Columns,
    Exclusion,
    MergeReview,
    Result,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Upload => "Upload Spreadsheet",
            Screen::Preview => "Choose Header Row",
            Screen::Columns => "Select Columns",
            Screen::Exclusion => "Exclude Rows",
            Screen::MergeReview => "Review Merged Rows",
            Screen::Result => "Export Ready",
        }
    }

    pub fn as_id(&self) -> &'static str {
        match self {
            Screen::Upload => "upload",
            Screen::Preview => "preview",
            Screen::Columns => "columns",
            Screen::Exclusion => "exclusion",
            Screen::MergeReview => "merge",
            Screen::Result => "result",
        }
    }
}

#[derive(Debug)]
pub enum Event {
    /// Path input submitted or file passed on the command line.
    FileChosen(SelectedFile),
    RemoveFile,
    /// Forward button: convert / continue / proceed / generate export, depending on the screen.
    Next,
    Back,
    SelectHeaderRow(usize),
    ToggleColumn(usize),
    SelectAllColumns,
    DeselectAllColumns,
    /// Service row index (not the on-screen position).
    ToggleExcludedRow(usize),
    ToggleMergeDeletion(usize),
    Download(ExportFormat),
    NewFile,
    /// Dismiss the error banner.
    Retry,
    Completed {
        action: ConversionAction,
        result: Result<Payload, WizardError>,
    },
    Saved(Result<PathBuf, WizardError>),
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::FileChosen(_) => "file_chosen",
            Event::RemoveFile => "remove_file",
            Event::Next => "next",
            Event::Back => "back",
            Event::SelectHeaderRow(_) => "select_header_row",
            Event::ToggleColumn(_) => "toggle_column",
            Event::SelectAllColumns => "select_all_columns",
            Event::DeselectAllColumns => "deselect_all_columns",
            Event::ToggleExcludedRow(_) => "toggle_excluded_row",
            Event::ToggleMergeDeletion(_) => "toggle_merge_deletion",
            Event::Download(_) => "download",
            Event::NewFile => "new_file",
            Event::Retry => "retry",
            Event::Completed { .. } => "completed",
            Event::Saved(_) => "saved",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Effect {
    Request(ConversionRequest),
    Save(ExportArtifact),
}

/// Dismissible error overlay; `return_to` is the screen that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub message: String,
    pub return_to: Screen,
}

#[derive(Debug)]
pub struct StepController {
    screen: Screen,
    state: WizardState,
    in_flight: Option<ConversionAction>,
    banner: Option<ErrorBanner>,
    notice: Option<String>,
    status: Option<String>,
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}

impl StepController {
    pub fn new() -> Self {
        Self {
            screen: Screen::Upload,
            state: WizardState::default(),
            in_flight: None,
            banner: None,
            notice: None,
            status: None,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn in_flight(&self) -> Option<ConversionAction> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn banner(&self) -> Option<&ErrorBanner> {
        self.banner.as_ref()
    }

    /// Inline validation message for the current screen.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Last informational message (e.g. where an export was saved).
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.screen, Screen::Exclusion | Screen::MergeReview)
    }

    pub fn can_go_next(&self) -> bool {
        match self.screen {
            Screen::Upload => self.state.file.is_some(),
            Screen::Result => false,
            _ => true,
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let event = match event {
            Event::Completed { action, result } => return self.on_completed(action, result),
            Event::Saved(result) => {
                self.on_saved(result);
                return Vec::new();
            }
            other => other,
        };

        if let Some(action) = self.in_flight {
            debug!(
                "[PHASE: wizard] [STEP: busy] Ignoring {} while {} is in flight",
                event.name(),
                action
            );
            return Vec::new();
        }

        if let Some(banner) = &self.banner {
            if matches!(event, Event::Retry) {
                let back_to = banner.return_to;
                self.banner = None;
                self.go_to(back_to);
            }
            return Vec::new();
        }

        match (self.screen, event) {
            (Screen::Upload, Event::FileChosen(file)) => {
                self.choose_file(file);
                Vec::new()
            }
            (Screen::Upload, Event::RemoveFile) => {
                self.state.reset();
                self.notice = None;
                self.status = None;
                Vec::new()
            }
            (Screen::Upload, Event::Next) => match self.state.file.clone() {
                Some(file) => self.issue(ConversionRequest::get_preview(file)),
                None => Vec::new(),
            },

            (Screen::Preview, Event::SelectHeaderRow(index)) => {
                self.state.select_header_row(index);
                Vec::new()
            }
            (Screen::Preview, Event::Next) => match self.state.file.clone() {
                Some(file) => self.issue(ConversionRequest::get_headers(
                    file,
                    self.state.header_row_index,
                )),
                None => Vec::new(),
            },

            (Screen::Columns, Event::ToggleColumn(index)) => {
                self.state.toggle_column(index);
                self.notice = None;
                Vec::new()
            }
            (Screen::Columns, Event::SelectAllColumns) => {
                self.state.select_all_columns();
                self.notice = None;
                Vec::new()
            }
            (Screen::Columns, Event::DeselectAllColumns) => {
                self.state.deselect_all_columns();
                Vec::new()
            }
            (Screen::Columns, Event::Next) => self.proceed_from_columns(),

            (Screen::Exclusion, Event::ToggleExcludedRow(row)) => {
                self.state.toggle_excluded_row(row);
                Vec::new()
            }
            (Screen::Exclusion, Event::Back) => {
                self.go_to(Screen::Columns);
                Vec::new()
            }
            (Screen::Exclusion, Event::Next) => match self.state.file.clone() {
                Some(file) => self.issue(ConversionRequest::get_post_merger_candidates(
                    file,
                    self.state.header_row_index,
                    self.state.selected_columns(),
                    self.state.excluded_row_indices.clone(),
                )),
                None => Vec::new(),
            },

            (Screen::MergeReview, Event::ToggleMergeDeletion(row)) => {
                self.state.toggle_merge_deletion(row);
                Vec::new()
            }
            (Screen::MergeReview, Event::Back) => {
                self.go_to(Screen::Exclusion);
                Vec::new()
            }
            (Screen::MergeReview, Event::Next) => self.issue_convert(),

            (Screen::Result, Event::Download(format)) => self.download(format),
            (Screen::Result, Event::NewFile) => {
                self.state.reset();
                self.notice = None;
                self.status = None;
                self.go_to(Screen::Upload);
                Vec::new()
            }

            (screen, event) => {
                debug!(
                    "[PHASE: wizard] [STEP: ignore] {} has no effect on {}",
                    event.name(),
                    screen.as_id()
                );
                Vec::new()
            }
        }
    }

    fn choose_file(&mut self, file: SelectedFile) {
        self.status = None;
        match file_check::validate_file(&file) {
            Ok(()) => {
                info!(
                    "[PHASE: wizard] [STEP: file_chosen] {} ({})",
                    file.name,
                    file_check::format_file_size(file.size)
                );
                self.notice = None;
                self.state.choose_file(file);
            }
            Err(e) => {
                warn!(
                    "[PHASE: wizard] [STEP: file_chosen] Rejected {}: {}",
                    file.name, e
                );
                self.notice = Some(e.to_string());
            }
        }
    }

    fn proceed_from_columns(&mut self) -> Vec<Effect> {
        let columns = self.state.selected_columns();
        if columns.is_empty() {
            self.notice = Some(NO_COLUMNS_MESSAGE.to_string());
            return Vec::new();
        }
        match self.state.file.clone() {
            Some(file) => self.issue(ConversionRequest::get_bottom_rows(
                file,
                self.state.header_row_index,
                columns,
            )),
            None => Vec::new(),
        }
    }

    fn issue_convert(&mut self) -> Vec<Effect> {
        match self.state.file.clone() {
            Some(file) => self.issue(ConversionRequest::convert(
                file,
                self.state.header_row_index,
                self.state.selected_columns(),
                self.state.excluded_row_indices.clone(),
                self.state.post_merger_deletions.clone(),
            )),
            None => Vec::new(),
        }
    }

    fn issue(&mut self, request: ConversionRequest) -> Vec<Effect> {
        info!(
            "[PHASE: wizard] [STEP: request] {} requested from {}",
            request.action,
            self.screen.as_id()
        );
        self.in_flight = Some(request.action);
        self.notice = None;
        vec![Effect::Request(request)]
    }

    fn download(&mut self, format: ExportFormat) -> Vec<Effect> {
        let output = match format {
            ExportFormat::Csv => self.state.csv_output.clone(),
            ExportFormat::Json => self.state.json_output.clone(),
        };
        match (output, self.state.file.as_ref()) {
            (Some(contents), Some(file)) => vec![Effect::Save(ExportArtifact::new(
                &file.name, format, contents,
            ))],
            _ => Vec::new(),
        }
    }

    fn on_completed(
        &mut self,
        action: ConversionAction,
        result: Result<Payload, WizardError>,
    ) -> Vec<Effect> {
        if self.in_flight != Some(action) {
            warn!(
                "[PHASE: wizard] [STEP: completed] Unexpected {} completion (in flight: {:?})",
                action, self.in_flight
            );
            return Vec::new();
        }
        self.in_flight = None;

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                self.raise(e.user_message(action));
                return Vec::new();
            }
        };

        match payload {
            Payload::Preview(p) if action == ConversionAction::GetPreview => {
                if p.rows.is_empty() {
                    self.raise(EMPTY_PREVIEW_MESSAGE.to_string());
                } else {
                    self.state.set_preview(p.rows);
                    self.go_to(Screen::Preview);
                }
            }
            Payload::Headers(h) if action == ConversionAction::GetHeaders => {
                if h.columns.is_empty() {
                    self.raise(EMPTY_HEADERS_MESSAGE.to_string());
                } else {
                    self.state.set_columns(h.columns);
                    self.go_to(Screen::Columns);
                }
            }
            Payload::BottomRows(b) if action == ConversionAction::GetBottomRows => {
                self.state.set_bottom_rows(b);
                self.go_to(Screen::Exclusion);
            }
            Payload::MergeCandidates(m) if action == ConversionAction::GetPostMergerCandidates => {
                if m.candidates.is_empty() {
                    info!("[PHASE: wizard] [STEP: merge_review] No merge candidates; converting");
                    self.state.clear_candidates();
                    return self.issue_convert();
                }
                self.state.set_candidates(m);
                self.go_to(Screen::MergeReview);
            }
            Payload::Converted(c) if action == ConversionAction::Convert => {
                let column_count = self.state.selected_columns().len();
                self.state.set_converted(c, column_count);
                self.go_to(Screen::Result);
            }
            _ => {
                let e = WizardError::MalformedResponse {
                    action,
                    detail: "payload does not match the requested action".to_string(),
                };
                self.raise(e.user_message(action));
            }
        }
        Vec::new()
    }

    fn on_saved(&mut self, result: Result<PathBuf, WizardError>) {
        match result {
            Ok(path) => {
                self.status = Some(format!("Saved {}", path.display()));
            }
            Err(e) => {
                self.raise(format!("Unable to save export: {}", e));
            }
        }
    }

    fn raise(&mut self, message: String) {
        warn!(
            "[PHASE: wizard] [STEP: error] {} (screen={})",
            message,
            self.screen.as_id()
        );
        self.banner = Some(ErrorBanner {
            message,
            return_to: self.screen,
        });
    }

    fn go_to(&mut self, screen: Screen) {
        if self.screen != screen {
            info!(
                "[PHASE: wizard] [STEP: transition] {} -> {}",
                self.screen.as_id(),
                screen.as_id()
            );
        }
        self.screen = screen;
        self.notice = None;
    }
}
