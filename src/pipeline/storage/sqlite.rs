use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::constants::{CATEGORY_COL, PART_ID_COL, PART_NAME_COL};
use crate::error::{PipelineError, Result};
use crate::metrics::{self, MetricName};
use crate::types::ColumnLayout;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS product_metadata (
        part_id    TEXT PRIMARY KEY,
        part_name  TEXT,
        category   TEXT
    );
    CREATE TABLE IF NOT EXISTS supplier_data (
        part_id      TEXT NOT NULL,
        stock_level  INTEGER NOT NULL,
        cost_price   REAL NOT NULL,
        entry_date   TEXT,
        PRIMARY KEY (part_id, entry_date)
    );
    CREATE TABLE IF NOT EXISTS load_runs (
        file_sha256  TEXT PRIMARY KEY,
        rows         INTEGER NOT NULL,
        run_id       TEXT NOT NULL,
        loaded_at    TEXT NOT NULL
    );
"#;

/// One row of the cleaned feed, typed for the `supplier_data` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierRow {
    pub part_id: String,
    pub stock_level: i64,
    pub cost_price: f64,
    pub entry_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMetadata {
    pub part_id: String,
    pub part_name: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    File,
    Derived,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub run_id: Uuid,
    pub file_sha256: String,
    pub metadata_source: MetadataSource,
    pub metadata_rows: usize,
    /// Metadata rows that were new to the store.
    pub metadata_inserted: usize,
    pub supplier_rows: usize,
    /// The same file content had been loaded before.
    pub previously_loaded: bool,
}

/// SQLite-backed store for cleaned supplier data and product metadata.
pub struct SupplierStore {
    conn: Connection,
}

impl SupplierStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Load a cleaned feed plus optional product metadata in one transaction.
    ///
    /// When `metadata_path` is absent or points at a missing file, one metadata
    /// row per distinct `part_id` is derived with empty name and category.
    #[instrument(skip(self), fields(cleaned = %cleaned_path.display()))]
    pub fn load_cleaned_file(&mut self, cleaned_path: &Path, metadata_path: Option<&Path>) -> Result<LoadSummary> {
        let started = Instant::now();
        if !cleaned_path.exists() {
            return Err(PipelineError::InputNotFound(cleaned_path.to_path_buf()));
        }
        let bytes = fs::read(cleaned_path)?;
        let file_sha256 = hex::encode(Sha256::digest(&bytes));
        let rows = read_supplier_rows(bytes.as_slice(), &cleaned_path.display().to_string())?;
        info!("Loaded cleaned supplier feed ({} rows)", rows.len());

        let (metadata, metadata_source) = match metadata_path.filter(|p| p.exists()) {
            Some(path) => {
                let meta = read_metadata(fs::File::open(path)?, &path.display().to_string())?;
                info!("Loaded metadata from {} ({} rows)", path.display(), meta.len());
                (meta, MetadataSource::File)
            }
            None => {
                let meta = derive_metadata(&rows);
                info!("No metadata file found, deriving {} distinct part_ids", meta.len());
                (meta, MetadataSource::Derived)
            }
        };

        let previously_loaded = self.has_loaded(&file_sha256)?;
        if previously_loaded {
            warn!(sha256 = %file_sha256, "File content was loaded before; replacing rows");
        }

        let run_id = Uuid::new_v4();
        let tx = self.conn.transaction()?;
        let mut metadata_inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO product_metadata (part_id, part_name, category) VALUES (?1, ?2, ?3)",
            )?;
            for m in &metadata {
                metadata_inserted += stmt.execute(params![m.part_id, m.part_name, m.category])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO supplier_data (part_id, stock_level, cost_price, entry_date)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in &rows {
                stmt.execute(params![r.part_id, r.stock_level, r.cost_price, r.entry_date])?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO load_runs (file_sha256, rows, run_id, loaded_at) VALUES (?1, ?2, ?3, ?4)",
                params![file_sha256, rows.len() as i64, run_id.to_string(), Utc::now().to_rfc3339()],
            )?;
        }
        tx.commit()?;

        metrics::increment(MetricName::LoadMetadataRows, metadata_inserted as u64);
        metrics::increment(MetricName::LoadSupplierRows, rows.len() as u64);
        metrics::record_duration(MetricName::LoadDuration, started.elapsed().as_secs_f64());
        info!(%run_id, supplier_rows = rows.len(), metadata_inserted, "Load complete");

        Ok(LoadSummary {
            run_id,
            file_sha256,
            metadata_source,
            metadata_rows: metadata.len(),
            metadata_inserted,
            supplier_rows: rows.len(),
            previously_loaded,
        })
    }

    pub fn has_loaded(&self, file_sha256: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM load_runs WHERE file_sha256 = ?1")?;
        let mut rows = stmt.query(params![file_sha256])?;
        Ok(rows.next()?.is_some())
    }

    pub fn supplier_row_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM supplier_data", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Parse the cleaned feed. Its typed columns are a contract, so any value that
/// does not parse is an error rather than something to repair here.
pub fn read_supplier_rows<R: std::io::Read>(reader: R, source_name: &str) -> Result<Vec<SupplierRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.to_string()).collect();
    let layout = ColumnLayout::from_headers(headers, source_name)?;

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let fields: Vec<&str> = record.iter().collect();
        let raw = layout.split_row(&fields);
        let row_number = index + 1;

        let stock_level = raw.stock_level.parse::<i64>().map_err(|_| PipelineError::InvalidValue {
            column: "stock_level".to_string(),
            row: row_number,
            value: raw.stock_level.clone(),
        })?;
        let cost_price = raw
            .cost_price
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PipelineError::InvalidValue {
                column: "cost_price".to_string(),
                row: row_number,
                value: raw.cost_price.clone(),
            })?;
        let entry_date = Some(raw.entry_date).filter(|d| !d.is_empty());

        rows.push(SupplierRow {
            part_id: raw.part_id,
            stock_level,
            cost_price,
            entry_date,
        });
    }
    Ok(rows)
}

/// Read a product metadata file. Only `part_id` is required; missing name or
/// category columns load as empty strings.
pub fn read_metadata<R: std::io::Read>(reader: R, source_name: &str) -> Result<Vec<ProductMetadata>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let part_id_idx = position(PART_ID_COL).ok_or_else(|| PipelineError::MissingColumns {
        source_name: source_name.to_string(),
        columns: vec![PART_ID_COL.to_string()],
    })?;
    let name_idx = position(PART_NAME_COL);
    let category_idx = position(CATEGORY_COL);

    let mut out = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").to_string();
        let part_id = field(Some(part_id_idx));
        if part_id.is_empty() {
            debug!("Skipping metadata row without part_id");
            continue;
        }
        out.push(ProductMetadata {
            part_id,
            part_name: field(name_idx),
            category: field(category_idx),
        });
    }
    Ok(out)
}

/// One metadata row per distinct `part_id`, in first-seen order.
pub fn derive_metadata(rows: &[SupplierRow]) -> Vec<ProductMetadata> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| seen.insert(r.part_id.as_str()))
        .map(|r| ProductMetadata {
            part_id: r.part_id.clone(),
            part_name: String::new(),
            category: String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CLEANED: &str = "part_id,stock_level,cost_price,entry_date\n\
                           P1,5,19.99,2025-04-12\n\
                           P1,7,18.5,2025-05-01\n\
                           P2,0,3.0,\n";

    #[test]
    fn test_read_supplier_rows_types_values() {
        let rows = read_supplier_rows(CLEANED.as_bytes(), "inline").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].stock_level, 5);
        assert_eq!(rows[1].cost_price, 18.5);
        assert_eq!(rows[2].entry_date, None);
    }

    #[test]
    fn test_read_supplier_rows_rejects_uncleaned_values() {
        let data = "part_id,stock_level,cost_price,entry_date\nP1,Low,1.0,2025-01-01\n";
        let err = read_supplier_rows(data.as_bytes(), "inline").unwrap_err();
        match err {
            PipelineError::InvalidValue { column, row, .. } => {
                assert_eq!(column, "stock_level");
                assert_eq!(row, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_supplier_rows_requires_columns() {
        let data = "part_id,stock_level\nP1,3\n";
        assert!(matches!(
            read_supplier_rows(data.as_bytes(), "inline"),
            Err(PipelineError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_derive_metadata_dedupes_in_order() {
        let rows = read_supplier_rows(CLEANED.as_bytes(), "inline").unwrap();
        let meta = derive_metadata(&rows);
        let ids: Vec<&str> = meta.iter().map(|m| m.part_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2"]);
        assert!(meta.iter().all(|m| m.category.is_empty()));
    }

    #[test]
    fn test_read_metadata_tolerates_missing_optional_columns() {
        let data = "part_id,part_name\nP1,Brake pad\n,orphan\n";
        let meta = read_metadata(data.as_bytes(), "inline").unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].part_name, "Brake pad");
        assert_eq!(meta[0].category, "");
    }

    #[test]
    fn test_load_upserts_and_records_run() {
        let dir = tempdir().unwrap();
        let cleaned = dir.path().join("cleaned.csv");
        fs::write(&cleaned, CLEANED).unwrap();
        let metadata = dir.path().join("product_metadata.csv");
        fs::write(&metadata, "part_id,part_name,category\nP1,Brake pad,Brakes\n").unwrap();

        let mut store = SupplierStore::open(dir.path().join("db").join("store.db")).unwrap();
        let first = store.load_cleaned_file(&cleaned, Some(&metadata)).unwrap();
        assert_eq!(first.metadata_source, MetadataSource::File);
        assert_eq!(first.metadata_inserted, 1);
        assert_eq!(first.supplier_rows, 3);
        assert!(!first.previously_loaded);
        assert_eq!(store.supplier_row_count().unwrap(), 3);

        // Dated rows are replaced on their (part_id, entry_date) key
        let second = store.load_cleaned_file(&cleaned, None).unwrap();
        assert!(second.previously_loaded);
        assert_eq!(second.metadata_source, MetadataSource::Derived);
        assert_eq!(second.metadata_inserted, 1);
        assert_eq!(store.supplier_row_count().unwrap(), 4);

        let category: String = store
            .connection()
            .query_row("SELECT category FROM product_metadata WHERE part_id = 'P1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(category, "Brakes");
    }

    #[test]
    fn test_missing_cleaned_file_is_fatal() {
        let mut store = SupplierStore::open_in_memory().unwrap();
        let err = store.load_cleaned_file(Path::new("/no/such/cleaned.csv"), None).unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound(_)));
    }
}
