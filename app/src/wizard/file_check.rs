// Spreadsheet file intake: type check, content sniffing and size display.

use crate::error::{Result, WizardError};
use crate::models::state::SelectedFile;
use std::path::Path;

pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const VALID_MIME_TYPES: [&str; 2] = [XLS_MIME, XLSX_MIME];
pub const VALID_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

pub const INVALID_FILE_MESSAGE: &str = "Please select a valid Excel file (.xlsx or .xls)";

const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Accept when the declared type is a spreadsheet type, or the name has a spreadsheet extension.
pub fn validate_file(file: &SelectedFile) -> Result<()> {
    let mime_ok = file
        .mime
        .as_deref()
        .map(|m| VALID_MIME_TYPES.contains(&m))
        .unwrap_or(false);

    if mime_ok || has_spreadsheet_extension(&file.name) {
        Ok(())
    } else {
        Err(WizardError::Validation(INVALID_FILE_MESSAGE.to_string()))
    }
}

fn has_spreadsheet_extension(name: &str) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    VALID_EXTENSIONS
        .iter()
        .any(|valid| ext.eq_ignore_ascii_case(valid))
}

/// Best-effort content type from the leading bytes.
///
/// A terminal has no browser-declared type, so the declared MIME comes from the content itself.
/// Legacy workbooks are OLE2 compound documents; OOXML workbooks are ZIP archives with an
/// `xl/workbook` part.
pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&OLE2_MAGIC) {
        return Some(XLS_MIME.to_string());
    }
    if bytes.starts_with(&ZIP_MAGIC) && contains(bytes, b"xl/workbook") {
        return Some(XLSX_MIME.to_string());
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Read a file from disk into a [`SelectedFile`]. Does not validate the type.
pub fn load_file(path: &Path) -> Result<SelectedFile> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let mime = sniff_mime(&bytes);
    Ok(SelectedFile::new(name, mime, bytes))
}

/// Human-readable size: `0 Bytes`, `1.5 KB`, `2 MB` (base 1024, at most two decimals).
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0usize;
    while unit + 1 < UNITS.len() && bytes >= 1024u64.pow(unit as u32 + 1) {
        unit += 1;
    }
    let scaled = bytes as f64 / 1024f64.powi(unit as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
