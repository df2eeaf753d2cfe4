use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::models::{AdvancementRow, Project, Record};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Reads a sheet export with a header row. Blank cells are left out so the
/// alias lookups fall through to the next column.
pub fn read_records<R: Read>(input: R) -> Result<Vec<Record>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(input);
    let mut records = Vec::new();

    for result in reader.deserialize::<HashMap<String, String>>() {
        let row = result?;
        let record: Record = row
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(column, value)| (column, Value::String(value)))
            .collect();
        records.push(record);
    }

    Ok(records)
}

pub fn load_records(path: &Path) -> Result<Vec<Record>, ImportError> {
    let to_error = |source| ImportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(|err| to_error(csv::Error::from(err)))?;
    let records = read_records(file).map_err(to_error)?;
    debug!(path = %path.display(), rows = records.len(), "loaded csv export");
    Ok(records)
}

pub fn load_projects(path: &Path) -> Result<Vec<Arc<Project>>, ImportError> {
    Ok(load_records(path)?
        .into_iter()
        .map(|record| Arc::new(Project::from_record(record)))
        .collect())
}

pub fn load_advancement_rows(path: &Path) -> Result<Vec<AdvancementRow>, ImportError> {
    Ok(load_records(path)?
        .into_iter()
        .map(AdvancementRow::from_record)
        .collect())
}
