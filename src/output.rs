use crate::cleaner::CleaningLog;
use crate::error::Result;
use crate::profiler::TableProfile;
use crate::quality::QualityReport;
use crate::reports::{CorrelationMatrix, Summaries};
use crate::table::Table;
use crate::util::sanitize_file_stem;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table as TextTable, Tabled};
use tracing::{debug, info};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

/// Write every cell in its canonical rendering; missing cells are empty.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.column_names())?;
    for i in 0..table.row_count() {
        wtr.write_record(table.row(i).iter().map(|v| v.render()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_correlation(path: &Path, matrix: &CorrelationMatrix) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec![String::new()];
    header.extend(matrix.columns.iter().cloned());
    wtr.write_record(&header)?;
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| v.map(|r| r.to_string()).unwrap_or_default()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = TextTable::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Markdown preview of the first `max_rows` rows of a data table.
pub fn preview_data(table: &Table, max_rows: usize) {
    if table.column_count() == 0 || table.row_count() == 0 {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(table.column_names().into_iter().map(String::from));
    for i in 0..table.row_count().min(max_rows) {
        builder.push_record(table.row(i).iter().map(|v| v.render()));
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn preview_correlation(matrix: &CorrelationMatrix) {
    if matrix.columns.is_empty() {
        println!("(no numeric columns)\n");
        return;
    }
    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(matrix.columns.iter().cloned());
    builder.push_record(header);
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| v.map(|r| format!("{:.2}", r)).unwrap_or_default()));
        builder.push_record(record);
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub output_dir: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub duplicate_rows_removed: usize,
    pub column_issues: usize,
    pub files: Vec<String>,
}

struct Exporter<'a> {
    dir: &'a Path,
    files: Vec<String>,
}

impl Exporter<'_> {
    fn path(&mut self, name: String) -> PathBuf {
        debug!(file = %name, "Writing output");
        let p = self.dir.join(&name);
        self.files.push(name);
        p
    }
}

/// Persist the cleaned table and every summary under `dir`.
pub fn export_all(
    dir: &Path,
    cleaned: &Table,
    profile: &TableProfile,
    quality: &QualityReport,
    log: &CleaningLog,
    summaries: &Summaries,
) -> Result<ExportManifest> {
    fs::create_dir_all(dir)?;
    let mut ex = Exporter {
        dir,
        files: Vec::new(),
    };

    write_table(&ex.path("cleaned.csv".into()), cleaned)?;
    write_json(&ex.path("profile.json".into()), profile)?;
    write_json(&ex.path("quality_report.json".into()), quality)?;
    write_json(&ex.path("cleaning_log.json".into()), log)?;
    write_csv(&ex.path("numerical_summary.csv".into()), &summaries.numeric)?;
    for (column, rows) in &summaries.value_counts {
        let name = format!("value_counts_{}.csv", sanitize_file_stem(column));
        write_csv(&ex.path(name), rows)?;
    }
    if let Some(amount) = &summaries.amount {
        for (column, rows) in &summaries.groups {
            let name = format!(
                "{}_by_{}.csv",
                sanitize_file_stem(amount),
                sanitize_file_stem(column)
            );
            write_csv(&ex.path(name), rows)?;
        }
    }
    for (period, rows) in &summaries.periods {
        write_csv(&ex.path(format!("{}.csv", period.name())), rows)?;
    }
    write_correlation(&ex.path("correlation.csv".into()), &summaries.correlation)?;
    if let Some(top) = &summaries.top_customers {
        write_csv(&ex.path("top_customers.csv".into()), top)?;
    }

    let mut files = ex.files;
    files.push("summary.json".into());
    let manifest = ExportManifest {
        output_dir: dir.to_path_buf(),
        rows: cleaned.row_count(),
        columns: cleaned.column_count(),
        duplicate_rows_removed: quality.duplicate_rows,
        column_issues: log.issues.len(),
        files,
    };
    write_json(&dir.join("summary.json"), &manifest)?;
    info!(dir = %dir.display(), files = manifest.files.len(), "Outputs written");
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadConfig;
    use crate::loader::load_table;
    use crate::table::{Column, ColumnKind, Value};
    use chrono::NaiveDate;

    #[test]
    fn exported_table_reloads_equal() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let table = Table::new(vec![
            Column::new(
                "sales",
                ColumnKind::Numeric,
                vec![Value::Number(10.5), Value::Number(0.0), Value::Number(1234567.25)],
            ),
            Column::new(
                "product",
                ColumnKind::Categorical,
                vec![
                    Value::Text("Laptop, Pro".into()),
                    Value::Text("Mouse".into()),
                    Value::Text("Desk \"XL\"".into()),
                ],
            ),
            Column::new(
                "date",
                ColumnKind::Temporal,
                vec![
                    Value::DateTime(dt.and_hms_opt(0, 0, 0).unwrap()),
                    Value::DateTime(dt.and_hms_opt(13, 5, 9).unwrap()),
                    Value::DateTime(dt.and_hms_opt(0, 0, 0).unwrap()),
                ],
            ),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_table(&path, &table).unwrap();
        let (reloaded, _) = load_table(&path, &LoadConfig::default()).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn correlation_csv_leaves_undefined_cells_empty() {
        let matrix = CorrelationMatrix {
            columns: vec!["a".into(), "b".into()],
            values: vec![vec![Some(1.0), None], vec![None, Some(1.0)]],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("correlation.csv");
        write_correlation(&path, &matrix).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, ",a,b\na,1,\nb,,1\n");
    }
}
