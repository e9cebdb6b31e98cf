use crate::config::PipelineConfig;
use crate::load::error::LoadError;
use crate::utils::ensure_dir_exists;
use log::{debug, info};
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub database: PathBuf,
    pub table: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Reads the cumulative dataset. The header of the first appended file defines the columns;
/// surplus trailing fields on later rows are dropped.
pub(crate) fn read_cumulative_csv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Replaces the configured table in the SQLite store with the full cumulative dataset.
///
/// The table is dropped and recreated on every run inside a single transaction.
pub fn load(config: &PipelineConfig) -> Result<LoadSummary, LoadError> {
    let csv_path = config.cumulative_path();
    if !csv_path.exists() {
        return Err(LoadError::MissingInput(csv_path));
    }
    let frame =
        read_cumulative_csv(&csv_path).map_err(|e| LoadError::Csv(csv_path.clone(), e))?;
    info!("Read {} rows from {}", frame.height(), csv_path.display());

    let database = config.database_path();
    if let Some(parent) = database.parent() {
        ensure_dir_exists(parent).map_err(|e| LoadError::DirCreation(parent.to_path_buf(), e))?;
    }
    replace_table(&database, &config.table_name, &frame)?;
    info!(
        "Loaded {} rows into table '{}' in {}",
        frame.height(),
        config.table_name,
        database.display()
    );

    Ok(LoadSummary {
        database,
        table: config.table_name.clone(),
        rows: frame.height(),
        columns: frame
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect(),
    })
}

fn replace_table(database: &Path, table: &str, frame: &DataFrame) -> Result<(), LoadError> {
    let sqlite = |source: rusqlite::Error| LoadError::Sqlite {
        path: database.to_path_buf(),
        table: table.to_string(),
        source,
    };

    let mut conn = Connection::open(database).map_err(sqlite)?;
    let tx = conn.transaction().map_err(sqlite)?;

    let definitions: Vec<String> = frame
        .get_columns()
        .iter()
        .map(|c| format!("{} {}", quote_identifier(c.name()), affinity(c.dtype())))
        .collect();
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({columns});",
        table = quote_identifier(table),
        columns = definitions.join(", ")
    ))
    .map_err(sqlite)?;
    debug!("Recreated table '{}' with {} columns", table, definitions.len());

    {
        let placeholders: Vec<String> = (1..=frame.width()).map(|i| format!("?{i}")).collect();
        let mut insert = tx
            .prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote_identifier(table),
                placeholders.join(", ")
            ))
            .map_err(sqlite)?;

        for row in 0..frame.height() {
            let values = frame
                .get_columns()
                .iter()
                .map(|column| {
                    column
                        .get(row)
                        .map(to_sql_value)
                        .map_err(|e| LoadError::Column {
                            column: column.name().to_string(),
                            source: e,
                        })
                })
                .collect::<Result<Vec<Value>, _>>()?;
            insert.execute(params_from_iter(values)).map_err(sqlite)?;
        }
    }

    tx.commit().map_err(sqlite)
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn affinity(dtype: &DataType) -> &'static str {
    if dtype.is_integer() || dtype.is_bool() {
        "INTEGER"
    } else if dtype.is_float() {
        "REAL"
    } else {
        "TEXT"
    }
}

fn to_sql_value(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Integer(i64::from(v)),
        AnyValue::Int32(v) => Value::Integer(i64::from(v)),
        AnyValue::Int64(v) => Value::Integer(v),
        AnyValue::UInt32(v) => Value::Integer(i64::from(v)),
        AnyValue::Float32(v) => Value::Real(f64::from(v)),
        AnyValue::Float64(v) => Value::Real(v),
        AnyValue::String(v) => Value::Text(v.to_string()),
        AnyValue::StringOwned(v) => Value::Text(v.to_string()),
        other => Value::Text(other.to_string()),
    }
}
