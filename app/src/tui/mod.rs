//! Terminal UI for the spreadsheet cleanup wizard.
//!
//! Layout:
//! - Centered window frame titled "Sheet Cleaner"
//! - Left banner panel, main content panel for the current screen
//! - Bottom button row: [ Back ] [ Next ] [ Quit ]
//! - Error banner as a modal with [ Retry ]; quit confirmation modal
//!
//! Requests run on a background runtime and come back over a channel as wizard events.
//! Logging is file-only in this mode so the terminal is not corrupted.

use crate::api::{ConversionClient, HttpTransport};
use crate::config::Settings;
use crate::models::requests::ConversionRequest;
use crate::models::responses::{
    BottomRow, BottomRowsResponse, CandidateRow, ConvertResponse, HeadersResponse,
    MergeCandidatesResponse, Payload, PostMergerCandidate, PreviewResponse, SkippedCandidate,
};
use crate::models::state::SelectedFile;
use crate::utils::logging::mask_url_credentials;
use crate::wizard::export::ExportFormat;
use crate::wizard::file_check::{self, XLSX_MIME};
use crate::wizard::{Effect, Event, Screen, StepController};
use anyhow::Result;
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use log::info;
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BANNER: &str = r#"
   ┌───┬───┬───┐
   │ A │ B │ C │
   ├───┼───┼───┤
   │ 1 │ 2 │ 3 │
   ├───┼───┼───┤
   │ 4 │ 5 │ 6 │
   └───┴───┴───┘
        │
        ▼
   name,amount
   alice,10

   S H E E T
   C L E A N E R"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonFocus {
    Back,
    Next,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Content,
    Button(ButtonFocus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modal {
    ConfirmQuit { yes_focused: bool },
}

struct TextInput {
    value: String,
    /// Byte offset, always on a char boundary.
    cursor: usize,
}

impl TextInput {
    fn new(value: impl Into<String>) -> Self {
        let v = value.into();
        Self {
            cursor: v.len(),
            value: v,
        }
    }

    fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.len();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.value[..self.cursor]
            .chars()
            .next_back()
            .map(|c| self.cursor - c.len_utf8())
    }

    fn next_boundary(&self) -> Option<usize> {
        self.value[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                self.value.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                true
            }
            KeyCode::Backspace => {
                if let Some(idx) = self.prev_boundary() {
                    self.value.remove(idx);
                    self.cursor = idx;
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.value.len() {
                    self.value.remove(self.cursor);
                }
                true
            }
            KeyCode::Left => {
                if let Some(idx) = self.prev_boundary() {
                    self.cursor = idx;
                }
                true
            }
            KeyCode::Right => {
                if let Some(idx) = self.next_boundary() {
                    self.cursor = idx;
                }
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.value.len();
                true
            }
            _ => false,
        }
    }

    fn display_with_cursor(&self) -> String {
        format!(
            "{}▏{}",
            &self.value[..self.cursor],
            &self.value[self.cursor..]
        )
    }
}

/// Executes conversion requests off the UI thread.
struct Worker {
    runtime: tokio::runtime::Runtime,
    client: Arc<ConversionClient<HttpTransport>>,
    tx: mpsc::Sender<Event>,
}

impl Worker {
    fn submit(&self, request: ConversionRequest) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let action = request.action;
            let result = client.send(&request).await;
            let _ = tx.send(Event::Completed { action, result });
        });
    }
}

struct App {
    controller: StepController,
    path_input: TextInput,
    load_error: Option<String>,
    focus: Focus,
    list_cursor: usize,
    last_screen: Screen,
    modal: Option<Modal>,
    quit: bool,
    output_dir: PathBuf,
    endpoint: String,
}

impl App {
    fn new(settings: &Settings) -> Self {
        let endpoint = settings
            .endpoint()
            .map(|u| mask_url_credentials(u.as_str()))
            .unwrap_or_else(|_| mask_url_credentials(&settings.server_url));
        Self {
            controller: StepController::new(),
            path_input: TextInput::new(""),
            load_error: None,
            focus: Focus::Content,
            list_cursor: 0,
            last_screen: Screen::Upload,
            modal: None,
            quit: false,
            output_dir: settings.output_dir.clone(),
            endpoint,
        }
    }

    /// Number of selectable entries on the current screen.
    fn list_len(&self) -> usize {
        let state = self.controller.state();
        match self.controller.screen() {
            Screen::Preview => state.preview_rows.len(),
            Screen::Columns => state.available_columns.len(),
            Screen::Exclusion => state.bottom_rows.len(),
            Screen::MergeReview => state.candidates.len() * 2,
            Screen::Upload | Screen::Result => 0,
        }
    }

    /// Row index under the cursor on the merge review screen (pre/post members interleaved).
    fn merge_member_at(&self, position: usize) -> Option<&CandidateRow> {
        let candidate = self.controller.state().candidates.get(position / 2)?;
        Some(if position % 2 == 0 {
            &candidate.pre_merger
        } else {
            &candidate.post_merger
        })
    }
}

/// Feed one event to the controller and carry out the effects it returns.
fn apply(app: &mut App, event: Event, worker: Option<&Worker>) {
    let effects = app.controller.handle(event);

    let screen = app.controller.screen();
    if screen != app.last_screen {
        app.last_screen = screen;
        app.focus = Focus::Content;
        app.list_cursor = match screen {
            Screen::Preview => app.controller.state().header_row_index,
            _ => 0,
        };
    }

    for effect in effects {
        match effect {
            Effect::Request(request) => match worker {
                Some(w) => w.submit(request),
                None => info!(
                    "[PHASE: tui] [STEP: request] No worker attached; {} left pending",
                    request.action
                ),
            },
            Effect::Save(artifact) => {
                let result = artifact.save(&app.output_dir);
                apply(app, Event::Saved(result), worker);
            }
        }
    }
}

fn next_label(screen: Screen) -> &'static str {
    match screen {
        Screen::Upload => "Convert",
        Screen::MergeReview => "Generate Export",
        _ => "Next",
    }
}

pub fn run(settings: &Settings) -> Result<()> {
    let app = App::new(settings);
    info!(
        "[PHASE: tui] [STEP: start] Starting TUI wizard (endpoint={})",
        app.endpoint
    );

    let transport = HttpTransport::new(settings)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;
    let (tx, rx) = mpsc::channel::<Event>();
    let worker = Worker {
        runtime,
        client: Arc::new(ConversionClient::new(transport)),
        tx,
    };

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, app, &worker, &rx);
    restore_terminal(&mut terminal)?;

    info!("[PHASE: tui] [STEP: exit] TUI wizard closed");
    result
}

fn new_smoke_app(target: &str, settings: &Settings) -> App {
    let mut app = App::new(settings);
    let depth = match target {
        "preview" => 1,
        "columns" => 2,
        "exclusion" => 3,
        "merge" => 4,
        "result" => 5,
        _ => 0,
    };
    if depth == 0 {
        return app;
    }

    let cells = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<String>>();

    app.path_input.set("./sales.xlsx");
    apply(
        &mut app,
        Event::FileChosen(SelectedFile::new(
            "sales.xlsx",
            Some(XLSX_MIME.to_string()),
            vec![0u8; 18_432],
        )),
        None,
    );
    apply(&mut app, Event::Next, None);
    complete(
        &mut app,
        Payload::Preview(PreviewResponse {
            rows: vec![
                cells(&["Quarterly sales", "", ""]),
                cells(&["Name", "Amount", "Region"]),
                cells(&["Alice", "10", "North"]),
                cells(&["Bob", "20", "South"]),
            ],
        }),
    );
    if depth == 1 {
        return app;
    }

    apply(&mut app, Event::SelectHeaderRow(1), None);
    apply(&mut app, Event::Next, None);
    complete(
        &mut app,
        Payload::Headers(HeadersResponse {
            columns: cells(&["Name", "Amount", "Region"]),
        }),
    );
    if depth == 2 {
        return app;
    }

    apply(&mut app, Event::ToggleColumn(2), None);
    apply(&mut app, Event::Next, None);
    complete(
        &mut app,
        Payload::BottomRows(BottomRowsResponse {
            rows: vec![
                BottomRow {
                    index: 8,
                    display_index: 9,
                    values: cells(&["Carol", "30"]),
                },
                BottomRow {
                    index: 9,
                    display_index: 10,
                    values: cells(&["Total", "60"]),
                },
            ],
            columns: cells(&["Name", "Amount"]),
            total_rows: 10,
        }),
    );
    if depth == 3 {
        return app;
    }

    apply(&mut app, Event::ToggleExcludedRow(9), None);
    apply(&mut app, Event::Next, None);
    complete(
        &mut app,
        Payload::MergeCandidates(MergeCandidatesResponse {
            candidates: vec![PostMergerCandidate {
                pre_merger: CandidateRow {
                    row_index: 3,
                    values: cells(&["Fund A", "10"]),
                },
                post_merger: CandidateRow {
                    row_index: 6,
                    values: cells(&["Fund A II", "10"]),
                },
            }],
            skipped: vec![SkippedCandidate {
                row_index: 7,
                scheme_name: "Roman numeral".to_string(),
                reason: "No matching predecessor".to_string(),
            }],
            columns: cells(&["Name", "Amount"]),
        }),
    );
    if depth == 4 {
        return app;
    }

    apply(&mut app, Event::Next, None);
    complete(
        &mut app,
        Payload::Converted(ConvertResponse {
            csv_data: "Name,Amount\nAlice,10\n".to_string(),
            json_data: "[{\"Name\":\"Alice\",\"Amount\":\"10\"}]".to_string(),
            original_rows: 10,
            cleaned_rows: 7,
            removed_rows: 3,
            excluded_rows: 1,
            post_merger_deleted: 1,
        }),
    );
    app
}

/// Answer the in-flight request with a canned payload.
fn complete(app: &mut App, payload: Payload) {
    if let Some(action) = app.controller.in_flight() {
        apply(
            app,
            Event::Completed {
                action,
                result: Ok(payload),
            },
            None,
        );
    }
}

pub fn smoke(settings: &Settings, target: &str) -> Result<()> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let t = target.trim().to_ascii_lowercase();
    let app = new_smoke_app(t.as_str(), settings);

    // In-memory backend: no raw mode or alternate screen.
    let backend = TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &app))?;

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
    worker: &Worker,
    rx: &mpsc::Receiver<Event>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    while !app.quit {
        while let Ok(event) = rx.try_recv() {
            apply(&mut app, event, Some(worker));
        }
        terminal.draw(|f| draw(f.size(), f, &app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if event::poll(timeout)? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(&mut app, key.code, Some(worker));
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }

    Ok(())
}

fn cycle_focus(app: &mut App, forward: bool) {
    const ORDER: [Focus; 4] = [
        Focus::Content,
        Focus::Button(ButtonFocus::Back),
        Focus::Button(ButtonFocus::Next),
        Focus::Button(ButtonFocus::Quit),
    ];
    let pos = ORDER.iter().position(|f| *f == app.focus).unwrap_or(0);
    let next = if forward {
        (pos + 1) % ORDER.len()
    } else {
        (pos + ORDER.len() - 1) % ORDER.len()
    };
    app.focus = ORDER[next];
}

fn handle_key(app: &mut App, code: KeyCode, worker: Option<&Worker>) {
    if let Some(Modal::ConfirmQuit { yes_focused }) = app.modal {
        match code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                app.modal = Some(Modal::ConfirmQuit {
                    yes_focused: !yes_focused,
                });
            }
            KeyCode::Enter => {
                app.modal = None;
                if yes_focused {
                    app.quit = true;
                }
            }
            KeyCode::Esc => app.modal = None,
            _ => {}
        }
        return;
    }

    if app.controller.banner().is_some() {
        if matches!(
            code,
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('r') | KeyCode::Char('R')
        ) {
            apply(app, Event::Retry, worker);
        }
        return;
    }

    match code {
        KeyCode::Esc => {
            app.modal = Some(Modal::ConfirmQuit { yes_focused: false });
            return;
        }
        KeyCode::Tab => {
            cycle_focus(app, true);
            return;
        }
        KeyCode::BackTab => {
            cycle_focus(app, false);
            return;
        }
        _ => {}
    }

    match app.focus {
        Focus::Button(button) => match code {
            KeyCode::Left => {
                app.focus = Focus::Button(match button {
                    ButtonFocus::Quit => ButtonFocus::Next,
                    _ => ButtonFocus::Back,
                });
            }
            KeyCode::Right => {
                app.focus = Focus::Button(match button {
                    ButtonFocus::Back => ButtonFocus::Next,
                    _ => ButtonFocus::Quit,
                });
            }
            KeyCode::Enter => match button {
                ButtonFocus::Back if app.controller.can_go_back() => {
                    apply(app, Event::Back, worker)
                }
                ButtonFocus::Next if app.controller.can_go_next() => {
                    apply(app, Event::Next, worker)
                }
                ButtonFocus::Quit => {
                    app.modal = Some(Modal::ConfirmQuit { yes_focused: false })
                }
                _ => {}
            },
            KeyCode::Up | KeyCode::Down => app.focus = Focus::Content,
            _ => {}
        },
        Focus::Content => handle_content_key(app, code, worker),
    }
}

fn handle_content_key(app: &mut App, code: KeyCode, worker: Option<&Worker>) {
    let len = app.list_len();
    match code {
        KeyCode::Up if len > 0 => {
            app.list_cursor = app.list_cursor.saturating_sub(1);
            return;
        }
        KeyCode::Down if len > 0 => {
            app.list_cursor = (app.list_cursor + 1).min(len - 1);
            return;
        }
        _ => {}
    }

    let cursor = app.list_cursor;
    match app.controller.screen() {
        Screen::Upload => match code {
            KeyCode::Enter => load_path(app, worker),
            KeyCode::Backspace | KeyCode::Delete
                if app.path_input.value.is_empty() && app.controller.state().file.is_some() =>
            {
                apply(app, Event::RemoveFile, worker);
            }
            other => {
                if app.path_input.handle_key(other) {
                    app.load_error = None;
                }
            }
        },
        Screen::Preview => match code {
            KeyCode::Char(' ') => apply(app, Event::SelectHeaderRow(cursor), worker),
            KeyCode::Enter => apply(app, Event::Next, worker),
            _ => {}
        },
        Screen::Columns => match code {
            KeyCode::Char(' ') => apply(app, Event::ToggleColumn(cursor), worker),
            KeyCode::Char('a') => apply(app, Event::SelectAllColumns, worker),
            KeyCode::Char('n') => apply(app, Event::DeselectAllColumns, worker),
            KeyCode::Enter => apply(app, Event::Next, worker),
            _ => {}
        },
        Screen::Exclusion => match code {
            KeyCode::Char(' ') => {
                let row = app
                    .controller
                    .state()
                    .bottom_rows
                    .get(cursor)
                    .map(|r| r.index);
                if let Some(row) = row {
                    apply(app, Event::ToggleExcludedRow(row), worker);
                }
            }
            KeyCode::Enter => apply(app, Event::Next, worker),
            KeyCode::Backspace => apply(app, Event::Back, worker),
            _ => {}
        },
        Screen::MergeReview => match code {
            KeyCode::Char(' ') => {
                let row = app.merge_member_at(cursor).map(|m| m.row_index);
                if let Some(row) = row {
                    apply(app, Event::ToggleMergeDeletion(row), worker);
                }
            }
            KeyCode::Enter => apply(app, Event::Next, worker),
            KeyCode::Backspace => apply(app, Event::Back, worker),
            _ => {}
        },
        Screen::Result => match code {
            KeyCode::Char('c') => apply(app, Event::Download(ExportFormat::Csv), worker),
            KeyCode::Char('j') => apply(app, Event::Download(ExportFormat::Json), worker),
            KeyCode::Char('n') => {
                app.path_input.set("");
                apply(app, Event::NewFile, worker);
            }
            _ => {}
        },
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn load_path(app: &mut App, worker: Option<&Worker>) {
    let raw = app.path_input.value.trim().to_string();
    if raw.is_empty() {
        app.load_error = Some("Enter the path of a spreadsheet file".to_string());
        return;
    }

    let path = expand_home(&raw);
    match file_check::load_file(&path) {
        Ok(file) => {
            app.load_error = None;
            apply(app, Event::FileChosen(file), worker);
            if app.controller.state().file.is_some() && app.controller.notice().is_none() {
                app.focus = Focus::Button(ButtonFocus::Next);
            }
        }
        Err(e) => {
            app.load_error = Some(format!("Unable to read {}: {}", display_path(&path), e));
        }
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// First index of a `visible`-sized window that keeps `cursor` on screen.
fn scroll_offset(len: usize, cursor: usize, visible: usize) -> usize {
    if visible == 0 || len <= visible {
        return 0;
    }
    cursor
        .saturating_sub(visible - 1)
        .min(len.saturating_sub(visible))
}

fn join_cells(values: &[String]) -> String {
    values.join(" | ")
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let keep = width.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}

fn pointer(app: &App, position: usize) -> &'static str {
    if app.focus == Focus::Content && app.list_cursor == position {
        "> "
    } else {
        "  "
    }
}

fn warn_line(msg: &str) -> Line<'static> {
    Line::from(Span::styled(
        msg.to_string(),
        Style::default().fg(Color::Red),
    ))
}

fn content_text(app: &App, width: usize, height: usize) -> Text<'static> {
    let state = app.controller.state();
    let mut lines: Vec<Line<'static>> = Vec::new();

    match app.controller.screen() {
        Screen::Upload => {
            lines.push(Line::from("Choose the spreadsheet to clean (.xlsx or .xls)."));
            lines.push(Line::from(""));
            let input = if app.focus == Focus::Content {
                app.path_input.display_with_cursor()
            } else {
                app.path_input.value.clone()
            };
            lines.push(Line::from(format!("File path: {}", input)));
            lines.push(Line::from(""));
            match &state.file {
                Some(file) => lines.push(Line::from(format!(
                    "Selected: {} ({})",
                    file.name,
                    file_check::format_file_size(file.size)
                ))),
                None => lines.push(Line::from("No file selected")),
            }
            if let Some(err) = &app.load_error {
                lines.push(warn_line(err));
            }
            if let Some(notice) = app.controller.notice() {
                lines.push(warn_line(notice));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(format!("Service: {}", app.endpoint)));
            lines.push(Line::from(""));
            lines.push(Line::from(
                "Enter loads the file. Backspace on an empty path removes it.",
            ));
        }
        Screen::Preview => {
            lines.push(Line::from("Select the row that contains the column headers."));
            lines.push(Line::from(""));
            let visible = height.saturating_sub(4);
            let rows = &state.preview_rows;
            let offset = scroll_offset(rows.len(), app.list_cursor, visible);
            for (i, row) in rows.iter().enumerate().skip(offset).take(visible) {
                let mark = if i == state.header_row_index { "(x)" } else { "( )" };
                let line = format!(
                    "{}{} Row {}: {}",
                    pointer(app, i),
                    mark,
                    i + 1,
                    join_cells(row)
                );
                lines.push(Line::from(truncate(&line, width)));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Up/Down move, Space selects, Enter continues."));
        }
        Screen::Columns => {
            lines.push(Line::from(state.selected_count_text()));
            if let Some(notice) = app.controller.notice() {
                lines.push(warn_line(notice));
            } else {
                lines.push(Line::from(""));
            }
            let visible = height.saturating_sub(4);
            let columns = &state.available_columns;
            let offset = scroll_offset(columns.len(), app.list_cursor, visible);
            for (i, name) in columns.iter().enumerate().skip(offset).take(visible) {
                let mark = if state.is_column_selected(i) { "[x]" } else { "[ ]" };
                let line = format!("{}{} {}", pointer(app, i), mark, name);
                lines.push(Line::from(truncate(&line, width)));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Space toggles, a selects all, n selects none."));
        }
        Screen::Exclusion => {
            lines.push(Line::from(format!(
                "Last rows of the sheet ({} rows in total). Mark rows to leave out.",
                state.total_rows
            )));
            lines.push(Line::from(state.exclusion_count_text()));
            lines.push(Line::from(""));
            let visible = height.saturating_sub(5);
            let rows = &state.bottom_rows;
            if rows.is_empty() {
                lines.push(Line::from("No trailing rows to review."));
            }
            let offset = scroll_offset(rows.len(), app.list_cursor, visible);
            for (i, row) in rows.iter().enumerate().skip(offset).take(visible) {
                let mark = if state.excluded_row_indices.contains(&row.index) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let line = format!(
                    "{}{} Row {}: {}",
                    pointer(app, i),
                    mark,
                    row.display_index,
                    join_cells(&row.values)
                );
                lines.push(Line::from(truncate(&line, width)));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Space toggles exclusion, Enter continues."));
        }
        Screen::MergeReview => {
            lines.push(Line::from(
                "Rows that look like pre/post merger pairs. Marked rows are deleted.",
            ));
            lines.push(Line::from(""));
            let visible_pairs = height.saturating_sub(5) / 3;
            let candidates = &state.candidates;
            let offset = scroll_offset(candidates.len(), app.list_cursor / 2, visible_pairs);
            for (i, candidate) in candidates
                .iter()
                .enumerate()
                .skip(offset)
                .take(visible_pairs)
            {
                for (member, label, row) in [
                    (2 * i, "Pre ", &candidate.pre_merger),
                    (2 * i + 1, "Post", &candidate.post_merger),
                ] {
                    let mark = if state.post_merger_deletions.contains(&row.row_index) {
                        "[x]"
                    } else {
                        "[ ]"
                    };
                    let line = format!(
                        "{}{} {} row {}: {}",
                        pointer(app, member),
                        mark,
                        label,
                        row.row_index + 1,
                        join_cells(&row.values)
                    );
                    lines.push(Line::from(truncate(&line, width)));
                }
                lines.push(Line::from(""));
            }
            if !state.skipped.is_empty() {
                lines.push(Line::from(format!("Skipped {} rows:", state.skipped.len())));
                for s in state.skipped.iter().take(3) {
                    let line = format!(
                        "  row {} ({}): {}",
                        s.row_index + 1,
                        s.scheme_name,
                        s.reason
                    );
                    lines.push(Line::from(truncate(&line, width)));
                }
            }
            lines.push(Line::from("Space toggles deletion, Enter generates the export."));
        }
        Screen::Result => {
            lines.push(Line::from("Your cleaned data is ready."));
            lines.push(Line::from(""));
            if let Some(msg) = state.result_message() {
                lines.push(Line::from(msg));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(format!(
                "Exports are saved to {}",
                display_path(&app.output_dir)
            )));
            if let Some(status) = app.controller.status() {
                lines.push(Line::from(Span::styled(
                    status.to_string(),
                    Style::default().fg(Color::Green),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from("c saves CSV, j saves JSON, n starts over."));
        }
    }

    if let Some(action) = app.controller.in_flight() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Working ({})...", action),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }

    Text::from(lines)
}

fn draw(area: Rect, f: &mut ratatui::Frame<'_>, app: &App) {
    let window_area = centered_window(area, 100, 30);

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("Sheet Cleaner");
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&ratatui::layout::Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);
    let body = rows[0];
    let buttons = rows[1];

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(0)].as_ref())
        .split(body);

    let banner = Paragraph::new(BANNER)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(banner, cols[0]);

    let content_block = Block::default()
        .borders(Borders::ALL)
        .title(app.controller.screen().title());
    f.render_widget(content_block, cols[1]);

    let content_inner = cols[1].inner(&ratatui::layout::Margin {
        vertical: 1,
        horizontal: 1,
    });
    let text = content_text(
        app,
        content_inner.width as usize,
        content_inner.height as usize,
    );
    let content = Paragraph::new(text)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(content, content_inner);

    draw_buttons(f, buttons, app);

    if let Some(banner) = app.controller.banner() {
        draw_error_modal(f, window_area, &banner.message);
    } else if let Some(Modal::ConfirmQuit { yes_focused }) = app.modal {
        draw_quit_modal(f, window_area, yes_focused);
    }
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(60).min(area.width);
    let h = height.min(area.height.saturating_sub(2)).max(20).min(area.height);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn draw_buttons(f: &mut ratatui::Frame<'_>, area: Rect, app: &App) {
    let idle = !app.controller.is_busy() && app.controller.banner().is_none();
    let screen = app.controller.screen();

    let back = button_text(
        "Back",
        app.focus == Focus::Button(ButtonFocus::Back),
        idle && app.controller.can_go_back(),
    );
    let next = button_text(
        next_label(screen),
        app.focus == Focus::Button(ButtonFocus::Next),
        idle && app.controller.can_go_next(),
    );
    let quit = button_text("Quit", app.focus == Focus::Button(ButtonFocus::Quit), true);

    let line = Line::from(vec![back, Span::raw(" "), next, Span::raw(" "), quit]);
    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused && enabled {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn modal_area(window_area: Rect, width: u16, height: u16) -> Rect {
    let modal_w = width
        .min(window_area.width.saturating_sub(4))
        .max(40)
        .min(window_area.width);
    let modal_h = height
        .min(window_area.height.saturating_sub(4))
        .max(7)
        .min(window_area.height);
    Rect {
        x: window_area.x + (window_area.width.saturating_sub(modal_w)) / 2,
        y: window_area.y + (window_area.height.saturating_sub(modal_h)) / 2,
        width: modal_w,
        height: modal_h,
    }
}

fn modal_buttons_area(area: Rect) -> Rect {
    Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(2),
        width: area.width.saturating_sub(2),
        height: 1,
    }
}

fn draw_error_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, message: &str) {
    let area = modal_area(window_area, 70, 9);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Error")
        .border_style(Style::default().fg(Color::Red));
    let p = Paragraph::new(Text::from(message.to_string()))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);

    let retry = Span::styled("[ Retry ]", Style::default().add_modifier(Modifier::REVERSED));
    let p = Paragraph::new(Text::from(Line::from(vec![retry]))).alignment(Alignment::Right);
    f.render_widget(p, modal_buttons_area(area));
}

fn draw_quit_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, yes_focused: bool) {
    let area = modal_area(window_area, 50, 7);
    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Quit Sheet Cleaner?");
    let body = Paragraph::new(Text::from(vec![Line::from(
        "Selections that have not been exported will be lost.",
    )]))
    .block(block)
    .wrap(Wrap { trim: false });
    f.render_widget(body, area);

    let focused = |on: bool| {
        if on {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        }
    };
    let line = Line::from(vec![
        Span::styled("[ Yes, quit ]", focused(yes_focused)),
        Span::raw(" "),
        Span::styled("[ No ]", focused(!yes_focused)),
    ]);
    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, modal_buttons_area(area));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WizardError;
    use crate::models::requests::ConversionAction;

    fn render(app: &App) -> String {
        render_sized(app, 100, 30)
    }

    fn render_sized(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).expect("terminal");
        terminal.draw(|f| draw(f.size(), f, app)).expect("draw");
        let buffer = terminal.backend().buffer().clone();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn every_smoke_target_renders() {
        for target in ["upload", "preview", "columns", "exclusion", "merge", "result", "bogus"] {
            smoke(&settings(), target).expect(target);
        }
    }

    #[test]
    fn smoke_targets_reach_their_screens() {
        let cases = [
            ("upload", Screen::Upload),
            ("preview", Screen::Preview),
            ("columns", Screen::Columns),
            ("exclusion", Screen::Exclusion),
            ("merge", Screen::MergeReview),
            ("result", Screen::Result),
        ];
        for (target, screen) in cases {
            let app = new_smoke_app(target, &settings());
            assert_eq!(app.controller.screen(), screen, "{}", target);
            assert!(!app.controller.is_busy(), "{}", target);
        }
    }

    #[test]
    fn upload_screen_shows_window_and_buttons() {
        let out = render(&new_smoke_app("upload", &settings()));
        assert!(out.contains("Sheet Cleaner"));
        assert!(out.contains("Upload Spreadsheet"));
        assert!(out.contains("No file selected"));
        assert!(out.contains("[ Back ]"));
        assert!(out.contains("[ Convert ]"));
        assert!(out.contains("[ Quit ]"));
    }

    #[test]
    fn result_screen_shows_summary() {
        let out = render(&new_smoke_app("result", &settings()));
        assert!(
            out.contains("7 rows × 2 columns | Removed 3 rows | Excluded 1 rows"),
            "{}",
            out
        );
    }

    #[test]
    fn error_banner_renders_with_retry() {
        let mut app = new_smoke_app("columns", &settings());
        apply(&mut app, Event::Next, None);
        apply(
            &mut app,
            Event::Completed {
                action: ConversionAction::GetBottomRows,
                result: Err(WizardError::Server {
                    status: 400,
                    message: "Invalid column selection".to_string(),
                }),
            },
            None,
        );
        let out = render(&app);
        assert!(out.contains("Invalid column selection"));
        assert!(out.contains("[ Retry ]"));

        handle_key(&mut app, KeyCode::Enter, None);
        assert!(app.controller.banner().is_none());
        assert_eq!(app.controller.screen(), Screen::Columns);
    }

    #[test]
    fn modals_fit_a_narrow_terminal() {
        let mut app = new_smoke_app("columns", &settings());
        apply(&mut app, Event::Next, None);
        apply(
            &mut app,
            Event::Completed {
                action: ConversionAction::GetBottomRows,
                result: Err(WizardError::Transport("connection refused".to_string())),
            },
            None,
        );
        assert!(app.controller.banner().is_some());
        let out = render_sized(&app, 30, 10);
        assert!(out.contains("[ Retry ]"));

        let mut app = App::new(&settings());
        handle_key(&mut app, KeyCode::Esc, None);
        assert!(app.modal.is_some());
        let out = render_sized(&app, 30, 10);
        assert!(out.contains("Quit Sheet Cleaner?"));
    }

    #[test]
    fn space_toggles_the_row_under_the_cursor() {
        let mut app = new_smoke_app("exclusion", &settings());
        assert!(app.controller.state().excluded_row_indices.is_empty());
        handle_key(&mut app, KeyCode::Down, None);
        handle_key(&mut app, KeyCode::Char(' '), None);
        assert!(app.controller.state().excluded_row_indices.contains(&9));
        handle_key(&mut app, KeyCode::Char(' '), None);
        assert!(app.controller.state().excluded_row_indices.is_empty());
    }

    #[test]
    fn merge_cursor_walks_both_members() {
        let mut app = new_smoke_app("merge", &settings());
        assert!(app.controller.state().post_merger_deletions.contains(&3));
        handle_key(&mut app, KeyCode::Char(' '), None);
        assert!(!app.controller.state().post_merger_deletions.contains(&3));
        handle_key(&mut app, KeyCode::Down, None);
        handle_key(&mut app, KeyCode::Char(' '), None);
        assert!(app.controller.state().post_merger_deletions.contains(&6));
    }

    #[test]
    fn typing_a_path_and_enter_loads_the_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("sales.xlsx");
        std::fs::write(&path, b"PK\x03\x04xl/workbook.xml").expect("write");

        let mut app = App::new(&settings());
        for c in path.to_string_lossy().chars() {
            handle_key(&mut app, KeyCode::Char(c), None);
        }
        handle_key(&mut app, KeyCode::Enter, None);

        let file = app.controller.state().file.clone().expect("file chosen");
        assert_eq!(file.name, "sales.xlsx");
        assert_eq!(app.focus, Focus::Button(ButtonFocus::Next));
    }

    #[test]
    fn missing_path_shows_load_error() {
        let mut app = App::new(&settings());
        app.path_input.set("/definitely/not/here.xlsx");
        handle_key(&mut app, KeyCode::Enter, None);
        let err = app.load_error.clone().expect("load error");
        assert!(err.starts_with("Unable to read /definitely/not/here.xlsx"), "{}", err);
        assert!(app.controller.state().file.is_none());
    }

    #[test]
    fn esc_asks_before_quitting() {
        let mut app = App::new(&settings());
        handle_key(&mut app, KeyCode::Esc, None);
        assert!(app.modal.is_some());
        handle_key(&mut app, KeyCode::Enter, None);
        assert!(!app.quit);
        handle_key(&mut app, KeyCode::Esc, None);
        handle_key(&mut app, KeyCode::Left, None);
        handle_key(&mut app, KeyCode::Enter, None);
        assert!(app.quit);
    }

    #[test]
    fn text_input_handles_multibyte_chars() {
        let mut input = TextInput::new("");
        for c in "réport.xlsx".chars() {
            input.handle_key(KeyCode::Char(c));
        }
        input.handle_key(KeyCode::Home);
        input.handle_key(KeyCode::Right);
        input.handle_key(KeyCode::Right);
        input.handle_key(KeyCode::Backspace);
        assert_eq!(input.value, "rport.xlsx");
    }

    #[test]
    fn scroll_offset_keeps_cursor_visible() {
        assert_eq!(scroll_offset(5, 4, 10), 0);
        assert_eq!(scroll_offset(20, 3, 5), 0);
        assert_eq!(scroll_offset(20, 7, 5), 3);
        assert_eq!(scroll_offset(20, 19, 5), 15);
    }
}
