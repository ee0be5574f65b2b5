//! `keel validate` — the single CLI entrypoint named in `spec.md` §6:
//! load a directory of `.keel` schema files, run the full parse + validate
//! pipeline, and print the §6 "Validation output" interface (a success
//! signal, or a JSON array of positioned errors).
//!
//! Everything else named in §1's "deliberately out of scope" list (config
//! loading, code generation, the function runtime's HTTP transport) lives
//! outside this crate; `keel-cli` only drives the two core subsystems.

use keel_ast::parser::{parse_sources, ParseError, SchemaFile};
use keel_validate::{validate, ValidationError};
use std::path::{Path, PathBuf};

#[derive(clap::Parser, Debug)]
#[clap(name = "keel", about = "Schema compiler for Keel application backends")]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Parses and validates every `.keel` file under `dir`, printing a
    /// JSON error report on failure.
    Validate {
        /// Directory containing `.keel` schema files.
        #[clap(long, default_value = ".")]
        dir: PathBuf,
    },
}

/// The process exit code conventions from `spec.md` §6: `0` success, `1`
/// validation error, `2` everything else (I/O, no schema files found).
pub const EXIT_OK: i32 = 0;
pub const EXIT_VALIDATION_ERROR: i32 = 1;
pub const EXIT_RUNTIME_ERROR: i32 = 2;

#[derive(serde::Serialize)]
struct ReportedError {
    code: String,
    message: String,
    pos: ReportedPosition,
}

#[derive(serde::Serialize)]
struct ReportedPosition {
    filename: String,
    line: usize,
    column: usize,
}

impl From<&ParseError> for ReportedError {
    fn from(e: &ParseError) -> Self {
        Self {
            code: "ParseError".to_string(),
            message: e.message.clone(),
            pos: ReportedPosition {
                filename: e.position.filename.to_string(),
                line: e.position.line,
                column: e.position.column,
            },
        }
    }
}

impl From<&ValidationError> for ReportedError {
    fn from(e: &ValidationError) -> Self {
        Self {
            code: e.code.to_string(),
            message: render_message(e),
            pos: ReportedPosition {
                filename: e.position.filename.to_string(),
                line: e.position.line,
                column: e.position.column,
            },
        }
    }
}

/// Renders a human-facing message by substituting `template_literals` into
/// the error code's name. Full message templating lives in a presentation
/// layer out of scope for this repo (`spec.md` §1); this is a minimal
/// rendering so `keel validate`'s JSON output is useful standalone.
fn render_message(e: &ValidationError) -> String {
    if e.template_literals.is_empty() {
        return e.code.to_string();
    }
    let mut parts: Vec<String> = e
        .template_literals
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    parts.sort();
    format!("{}: {}", e.code, parts.join(", "))
}

/// Collects every `.keel` file directly under `dir` (non-recursive, matching
/// the "directory of files" unit described in `spec.md` §6) and reads each
/// into a [`SchemaFile`].
pub fn load_schema_files(dir: &Path) -> anyhow::Result<Vec<SchemaFile>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("reading schema directory {}: {e}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("keel"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        anyhow::bail!("no .keel files found under {}", dir.display());
    }

    paths
        .into_iter()
        .map(|path| {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
            Ok(SchemaFile::new(path.display().to_string(), contents))
        })
        .collect()
}

/// Runs the full pipeline: load files, parse, validate. Returns the
/// combined error report (empty on success) or an `Err` for I/O failures
/// that precede parsing.
pub fn run_validate(dir: &Path) -> anyhow::Result<Vec<ReportedErrorJson>> {
    let files = load_schema_files(dir)?;
    let (asts, parse_errors) = parse_sources(&files);

    let mut report: Vec<ReportedErrorJson> = parse_errors.iter().map(ReportedErrorJson::from).collect();

    // Validation still runs over whatever parsed, per spec.md §4.A's
    // "return the richest possible error output" discipline - a file with
    // a syntax error elsewhere shouldn't hide validation errors in a
    // sibling file.
    if !asts.is_empty() {
        report.extend(validate(&asts).iter().map(ReportedErrorJson::from));
    }

    Ok(report)
}

/// Public alias so `main.rs` doesn't need to know about the private
/// [`ReportedError`] name.
pub type ReportedErrorJson = ReportedError;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_schema(dir: &tempfile::TempDir, name: &str, contents: &str) {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn valid_schema_reports_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(
            &dir,
            "person.keel",
            r#"
            model Person {
                fields {
                    firstName Text @unique
                }
                operations {
                    get getPerson(id)
                }
            }
            "#,
        );
        let report = run_validate(dir.path()).unwrap();
        assert!(report.is_empty(), "expected no errors, got {:?}", report.iter().map(|e| &e.code).collect::<Vec<_>>());
    }

    #[test]
    fn reserved_field_name_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_schema(&dir, "person.keel", "model Person { fields { id Text } }");
        let report = run_validate(dir.path()).unwrap();
        assert!(report.iter().any(|e| e.code == "ReservedFieldName"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_validate(dir.path()).is_err());
    }
}
