use sheet_cleaner::wizard::driver::HeadlessOptions;
use std::path::PathBuf;

const USAGE: &str = "Usage:
  sheet-cleaner [--config <path>]
  sheet-cleaner --headless <file> [--header-row N] [--columns a,b,...] [--config <path>]
  sheet-cleaner --tui-smoke[=upload|preview|columns|exclusion|merge|result]
  sheet-cleaner --print-config [--config <path>]";

/// Value following `flag`, if present. Exits with usage when the flag has no value.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    match args.get(pos + 1) {
        Some(v) if !v.starts_with("--") => Some(v.clone()),
        _ => {
            eprintln!("{} requires a value\n\n{}", flag, USAGE);
            std::process::exit(2);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    let config_path = flag_value(&args, "--config").map(PathBuf::from);

    // Effective settings as TOML, then exit.
    if args.iter().any(|a| a == "--print-config") {
        sheet_cleaner::print_config(config_path.as_deref());
        return;
    }

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific screen and exits 0.
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        sheet_cleaner::run_tui_smoke(config_path.as_deref(), target);
        return;
    }

    // Non-interactive run over one file; prints the saved export paths.
    if let Some(file) = flag_value(&args, "--headless") {
        let header_row = flag_value(&args, "--header-row").map(|raw| match raw.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("--header-row expects a row index, got '{}'", raw);
                std::process::exit(2);
            }
        });
        let columns = flag_value(&args, "--columns").map(|raw| {
            raw.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        });

        sheet_cleaner::run_headless(
            config_path.as_deref(),
            &PathBuf::from(file),
            HeadlessOptions {
                header_row,
                columns,
            },
        );
        return;
    }

    sheet_cleaner::run_tui(config_path.as_deref());
}
