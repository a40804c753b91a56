// Sheet Cleaner
// Main library entry point

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod tui;
pub mod utils;
pub mod wizard;

use api::{ConversionClient, HttpTransport};
use config::Settings;
use log::{error, info};
use std::path::{Path, PathBuf};
use wizard::driver::{Driver, HeadlessOptions};

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(settings: &Settings, with_stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder(settings)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("sheet-cleaner-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("sheet-cleaner-{}.txt", timestamp));

    // - JSON format to .log file
    // - Human-readable format to .txt file
    // - Optional: human-readable to stdout (never in TUI mode)
    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now()
                        .format("%Y-%m-%d %H:%M:%S%.3f")
                        .to_string();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line =
                        utils::logging::format_human_readable_log(&utils::logging::LogLine {
                            timestamp: &timestamp_local,
                            level: record.level(),
                            target: record.target(),
                            message: &cleaned_message,
                            phase: phase.as_deref(),
                            step: step.as_deref(),
                        });
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(&utils::logging::LogLine {
                        timestamp: &timestamp_utc,
                        level: record.level(),
                        target: record.target(),
                        message: &cleaned_message,
                        phase: phase.as_deref(),
                        step: step.as_deref(),
                    });
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now()
                        .format("%Y-%m-%d %H:%M:%S%.3f")
                        .to_string();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line =
                        utils::logging::format_human_readable_log(&utils::logging::LogLine {
                            timestamp: &timestamp_local,
                            level: record.level(),
                            target: record.target(),
                            message: &cleaned_message,
                            phase: phase.as_deref(),
                            step: step.as_deref(),
                        });
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

/// Load settings or exit with status 2; nothing useful can run without them.
fn load_settings_or_exit(config_path: Option<&Path>) -> Settings {
    match Settings::load(config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Sheet Cleaner: failed to load configuration: {}", e);
            std::process::exit(2);
        }
    }
}

/// Settings with `output_dir` resolved (and created).
fn with_resolved_output(mut settings: Settings) -> anyhow::Result<Settings> {
    settings.output_dir = utils::path_resolver::resolve_output_folder(&settings)?;
    Ok(settings)
}

fn log_startup(settings: &Settings, mode: &str) {
    info!(
        "[PHASE: initialization] Sheet Cleaner {} starting at {}",
        mode,
        chrono::Utc::now()
    );
    info!(
        "[PHASE: initialization] [STEP: settings] server_url={} output_dir={:?} timeout={:?}",
        utils::logging::mask_url_credentials(&settings.server_url),
        settings.output_dir,
        settings.request_timeout_secs
    );
}

pub fn run_tui(config_path: Option<&Path>) {
    let settings = load_settings_or_exit(config_path);

    // No stdout logging: it would corrupt the terminal UI
    if let Err(e) = init_logging(&settings, false) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let settings = match with_resolved_output(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("[PHASE: initialization] {}", e);
            eprintln!("Sheet Cleaner: {}", e);
            std::process::exit(1);
        }
    };
    log_startup(&settings, "TUI");

    if let Err(e) = tui::run(&settings) {
        error!("[PHASE: tui] [STEP: exit] TUI failed: {:#}", e);
        eprintln!("Sheet Cleaner: {:#}", e);
        std::process::exit(1);
    }
}

pub fn run_tui_smoke(config_path: Option<&Path>, target: Option<String>) {
    let settings = load_settings_or_exit(config_path);

    if let Err(e) = init_logging(&settings, false) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    log_startup(&settings, "TUI smoke");

    let target = target.unwrap_or_else(|| "upload".to_string());
    match tui::smoke(&settings, &target) {
        Ok(()) => {
            info!("[PHASE: tui] [STEP: smoke] Rendered target={}", target);
            println!("TUI smoke OK (target={})", target);
        }
        Err(e) => {
            error!("[PHASE: tui] [STEP: smoke] Render failed: {:#}", e);
            eprintln!("TUI smoke failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Walk the wizard for one file with default choices and save both exports.
pub fn headless(
    settings: Settings,
    file: &Path,
    options: &HeadlessOptions,
) -> anyhow::Result<Vec<PathBuf>> {
    let settings = with_resolved_output(settings)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let transport = HttpTransport::new(&settings)?;
    let mut driver = Driver::new(ConversionClient::new(transport), settings.output_dir.clone());

    runtime.block_on(wizard::driver::run_headless(&mut driver, file, options))
}

pub fn run_headless(config_path: Option<&Path>, file: &Path, options: HeadlessOptions) {
    let settings = load_settings_or_exit(config_path);

    if let Err(e) = init_logging(&settings, true) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    log_startup(&settings, "headless");

    match headless(settings, file, &options) {
        Ok(paths) => {
            for path in paths {
                println!("{}", path.display());
            }
        }
        Err(e) => {
            error!("[PHASE: headless] [STEP: exit] {:#}", e);
            eprintln!("Sheet Cleaner: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Print the effective settings as TOML. No logging: stdout carries only the document.
pub fn print_config(config_path: Option<&Path>) {
    let settings = load_settings_or_exit(config_path);
    match settings.to_toml() {
        Ok(doc) => print!("{}", doc),
        Err(e) => {
            eprintln!("Sheet Cleaner: {}", e);
            std::process::exit(1);
        }
    }
}
