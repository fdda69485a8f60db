use std::io::Write;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use fieldmark_core::db::{MarkingStore, SqliteMarkingStore};
use fieldmark_core::export::{render_markings_export, ExportFormat};

use crate::commands::common::open_database;
use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliExportFormat {
    Json,
    Geojson,
}

impl From<CliExportFormat> for ExportFormat {
    fn from(format: CliExportFormat) -> Self {
        match format {
            CliExportFormat::Json => Self::Json,
            CliExportFormat::Geojson => Self::GeoJson,
        }
    }
}

pub fn run_export(
    format: CliExportFormat,
    output: Option<&PathBuf>,
    db_path: Option<&Path>,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = SqliteMarkingStore::new(db.connection());
    let rendered = render_markings_export(&store.load_all()?, format.into())?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Exported to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
