//! Request file ingestion.
//!
//! Requests come from the `Request` sheet of an Excel workbook (`.xlsx`,
//! `.xls`) or from a CSV file with the same layout. The first row is a
//! header, then one request per row:
//!
//! ```text
//! Keycloak type,Keycloak environment,Action,Client ID,Role name,User logins
//! Employee,Prod,Associate users with role,Billing,Auditor,"alice, bob"
//! ```

use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use xavyo_connector_keycloak::{Action, ReconcileRequest};

use crate::environment::{realm_target, Environment, InstanceType};
use crate::error::{CliError, CliResult};

/// Number of columns a request row must have.
pub const MIN_COLUMNS: usize = 6;

/// Workbook sheet holding the requests.
pub const REQUEST_SHEET: &str = "Request";

/// Rows at the top of a sheet that are not requests.
const HEADER_ROWS: usize = 1;

const REQUIRED_FIELDS: [&str; MIN_COLUMNS] = [
    "Keycloak type",
    "Keycloak environment",
    "Action",
    "Client ID",
    "Role name",
    "User logins",
];

/// Supported request file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Workbook,
    Csv,
}

impl FileFormat {
    /// Format implied by the file extension, if it is a request file at all.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xls" => Some(Self::Workbook),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// A row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    /// 1-based line number; the header is row 1.
    pub row: usize,
    pub reason: String,
}

impl std::fmt::Display for RowWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {} - skipped", self.row, self.reason)
    }
}

/// Requests read from one file, plus the rows that were rejected.
#[derive(Debug, Default)]
pub struct RequestFile {
    pub requests: Vec<ReconcileRequest>,
    pub warnings: Vec<RowWarning>,
}

impl RequestFile {
    fn add_row(&mut self, row: usize, fields: &[&str], domain: &str) {
        match parse_row(fields, domain) {
            Ok(request) => self.requests.push(request),
            Err(reason) => self.warnings.push(RowWarning { row, reason }),
        }
    }
}

/// Read and validate a request file from disk. Anything that is not a
/// workbook is read as CSV.
pub fn load_file(path: &Path, domain: &str) -> CliResult<RequestFile> {
    if FileFormat::from_path(path) == Some(FileFormat::Workbook) {
        return read_workbook(path, domain);
    }

    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_requests(file, path, domain)
}

/// Read the `Request` sheet of a workbook.
pub fn read_workbook(path: &Path, domain: &str) -> CliResult<RequestFile> {
    let mut workbook = open_workbook_auto(path).map_err(|source| CliError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let sheets = workbook.sheet_names();
    if !sheets.iter().any(|name| name == REQUEST_SHEET) {
        return Err(CliError::MissingSheet {
            path: path.to_path_buf(),
            sheet: REQUEST_SHEET,
            available: sheets,
        });
    }

    let range = workbook
        .worksheet_range(REQUEST_SHEET)
        .map_err(|source| CliError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

    // Ranges start at the first used cell; keep row numbers sheet-absolute.
    let first_row = range.start().map_or(0, |(row, _)| row as usize);

    let mut parsed = RequestFile::default();
    let mut rows = 0usize;

    for (index, cells) in range.rows().enumerate().skip(HEADER_ROWS) {
        rows += 1;
        let values = cell_values(cells);
        let fields: Vec<&str> = values.iter().map(String::as_str).collect();
        parsed.add_row(first_row + index + 1, &fields, domain);
    }

    if rows == 0 {
        return Err(no_data_rows(path));
    }

    Ok(parsed)
}

/// Trimmed cell text with trailing blank cells dropped, so a short row
/// reads as missing columns.
fn cell_values(cells: &[Data]) -> Vec<String> {
    let mut values: Vec<String> = cells
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    while values.last().is_some_and(String::is_empty) {
        values.pop();
    }
    values
}

/// Parse request rows from any CSV reader. `source` is used in messages only.
pub fn read_requests<R: Read>(reader: R, source: &Path, domain: &str) -> CliResult<RequestFile> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    csv.headers().map_err(|e| csv_error(source, e))?;

    let mut parsed = RequestFile::default();
    let mut rows = 0usize;

    for (index, result) in csv.records().enumerate() {
        rows += 1;
        let fallback_row = index + HEADER_ROWS + 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let row = e
                    .position()
                    .map_or(fallback_row, |p| p.line() as usize);
                parsed.warnings.push(RowWarning {
                    row,
                    reason: format!("unreadable row: {e}"),
                });
                continue;
            }
        };

        let row = record
            .position()
            .map_or(fallback_row, |p| p.line() as usize);
        let fields: Vec<&str> = record.iter().collect();
        parsed.add_row(row, &fields, domain);
    }

    if rows == 0 {
        return Err(no_data_rows(source));
    }

    Ok(parsed)
}

fn parse_row(fields: &[&str], domain: &str) -> Result<ReconcileRequest, String> {
    if fields.len() < MIN_COLUMNS {
        return Err(format!(
            "has only {} columns, expected {MIN_COLUMNS}",
            fields.len()
        ));
    }

    for (value, name) in fields.iter().zip(REQUIRED_FIELDS) {
        if value.trim().is_empty() {
            return Err(format!("{name} must not be empty"));
        }
    }

    let instance: InstanceType = fields[0].parse()?;
    let environment: Environment = fields[1].parse()?;
    let action: Action = fields[2].parse().map_err(|_| {
        format!(
            "invalid action: {}. Valid: {}",
            fields[2],
            Action::labels().join("|")
        )
    })?;

    Ok(ReconcileRequest::new(
        realm_target(instance, environment, domain),
        fields[3],
        action,
        fields[4],
        fields[5],
    ))
}

fn no_data_rows(path: &Path) -> CliError {
    CliError::Validation(format!("{} contains no data rows", path.display()))
}

fn csv_error(path: &Path, source: csv::Error) -> CliError {
    CliError::Csv {
        path: PathBuf::from(path),
        source,
    }
}

/// Expand the given paths into request files.
///
/// Directories contribute their `.xlsx`, `.xls` and `.csv` files in name
/// order; files are taken as is.
pub fn discover_files(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && FileFormat::from_path(p).is_some())
                .collect();
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(CliError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
    }

    Ok(files)
}
