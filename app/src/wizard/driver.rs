// Sequential effect executor
// Runs controller effects one at a time against a ConversionClient; used by the headless runner.

use super::export::ExportFormat;
use super::file_check;
use super::{Effect, Event, Screen, StepController};
use crate::api::{ConversionClient, Transport};
use anyhow::{anyhow, bail, Context};
use log::info;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub struct Driver<T: Transport> {
    controller: StepController,
    client: ConversionClient<T>,
    output_dir: PathBuf,
    saved: Vec<PathBuf>,
}

impl<T: Transport> Driver<T> {
    pub fn new(client: ConversionClient<T>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            controller: StepController::new(),
            client,
            output_dir: output_dir.into(),
            saved: Vec::new(),
        }
    }

    pub fn controller(&self) -> &StepController {
        &self.controller
    }

    pub fn client(&self) -> &ConversionClient<T> {
        &self.client
    }

    /// Paths written by `Save` effects, in order.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    /// Feed one event and run every effect it causes, including follow-ups
    /// (e.g. the automatic convert after an empty merge review).
    pub async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.controller.handle(event) {
                match effect {
                    Effect::Request(request) => {
                        let action = request.action;
                        let result = self.client.send(&request).await;
                        queue.push_back(Event::Completed { action, result });
                    }
                    Effect::Save(artifact) => {
                        let result = artifact.save(&self.output_dir);
                        if let Ok(path) = &result {
                            self.saved.push(path.clone());
                        }
                        queue.push_back(Event::Saved(result));
                    }
                }
            }
        }
    }

    /// Fail with the banner or inline notice if either is showing.
    fn check(&self, step: &str) -> anyhow::Result<()> {
        if let Some(banner) = self.controller.banner() {
            bail!("{} failed: {}", step, banner.message);
        }
        if let Some(notice) = self.controller.notice() {
            bail!("{} failed: {}", step, notice);
        }
        Ok(())
    }
}

/// Choices for a non-interactive run. Unset fields keep the wizard defaults.
#[derive(Debug, Clone, Default)]
pub struct HeadlessOptions {
    pub header_row: Option<usize>,
    pub columns: Option<Vec<String>>,
}

/// Walk the whole wizard for one file and save both exports. Returns the saved paths.
pub async fn run_headless<T: Transport>(
    driver: &mut Driver<T>,
    path: &Path,
    options: &HeadlessOptions,
) -> anyhow::Result<Vec<PathBuf>> {
    let file = file_check::load_file(path)
        .with_context(|| format!("Unable to read {}", path.display()))?;
    driver.dispatch(Event::FileChosen(file)).await;
    driver.check("upload")?;

    driver.dispatch(Event::Next).await;
    driver.check("preview")?;

    if let Some(row) = options.header_row {
        let available = driver.controller().state().preview_rows.len();
        if row >= available {
            bail!(
                "Header row {} is out of range (preview has {} rows)",
                row,
                available
            );
        }
        driver.dispatch(Event::SelectHeaderRow(row)).await;
    }
    driver.dispatch(Event::Next).await;
    driver.check("header detection")?;

    if let Some(wanted) = &options.columns {
        let available = driver.controller().state().available_columns.clone();
        let mut positions = Vec::with_capacity(wanted.len());
        for name in wanted {
            let index = available.iter().position(|c| c == name).ok_or_else(|| {
                anyhow!(
                    "Unknown column '{}' (available: {})",
                    name,
                    available.join(", ")
                )
            })?;
            positions.push(index);
        }
        driver.dispatch(Event::DeselectAllColumns).await;
        for index in positions {
            if !driver.controller().state().is_column_selected(index) {
                driver.dispatch(Event::ToggleColumn(index)).await;
            }
        }
    }
    driver.dispatch(Event::Next).await;
    driver.check("column selection")?;

    driver.dispatch(Event::Next).await;
    driver.check("row exclusion")?;

    if driver.controller().screen() == Screen::MergeReview {
        info!(
            "[PHASE: headless] [STEP: merge_review] Accepting default deletions for {} candidates",
            driver.controller().state().candidates.len()
        );
        driver.dispatch(Event::Next).await;
        driver.check("conversion")?;
    }

    if driver.controller().screen() != Screen::Result {
        bail!(
            "Wizard stopped on {} instead of producing an export",
            driver.controller().screen().title()
        );
    }
    if let Some(message) = driver.controller().state().result_message() {
        info!("[PHASE: headless] [STEP: result] {}", message);
    }

    let before = driver.saved().len();
    for format in [ExportFormat::Csv, ExportFormat::Json] {
        driver.dispatch(Event::Download(format)).await;
        driver.check("export")?;
    }
    Ok(driver.saved()[before..].to_vec())
}
