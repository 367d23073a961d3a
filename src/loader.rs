use crate::config::{LoadConfig, LookupJoin};
use crate::error::{PipelineError, Result};
use crate::table::{Column, ColumnKind, Table, Value};
use crate::util::{parse_datetime_safe, parse_f64_safe};
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_cells: usize,
    /// Cells that became missing because they did not fit a declared kind.
    pub coerced_cells: usize,
}

/// Read a CSV file into a [`Table`]. Fails fast: a missing file or any
/// malformed record aborts the load with no partial table.
pub fn load_table(path: &Path, config: &LoadConfig) -> Result<(Table, LoadReport)> {
    if !path.is_file() {
        return Err(PipelineError::SourceNotFound(path.to_path_buf()));
    }
    let parse_err = |source: csv::Error| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = ReaderBuilder::new()
        .delimiter(config.delimiter as u8)
        .flexible(false)
        .from_path(path)
        .map_err(parse_err)?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result.map_err(parse_err)?;
        for (idx, cell) in record.iter().enumerate() {
            raw[idx].push(normalize_cell(cell, &config.null_tokens));
        }
    }

    let mut report = LoadReport {
        total_columns: headers.len(),
        ..Default::default()
    };
    let mut columns = Vec::with_capacity(headers.len());
    for (name, cells) in headers.into_iter().zip(raw) {
        report.missing_cells += cells.iter().filter(|c| c.is_none()).count();
        let kind = match config.kinds.get(&name) {
            Some(kind) => *kind,
            None => infer_kind(&cells, &config.date_formats),
        };
        let (values, coerced) = build_values(&cells, kind, &config.date_formats);
        if coerced > 0 {
            warn!(column = %name, coerced, %kind, "Cells did not match declared kind; marked missing");
        }
        report.coerced_cells += coerced;
        debug!(column = %name, %kind, "Column loaded");
        columns.push(Column::new(name, kind, values));
    }

    let table = Table::new(columns)?;
    report.total_rows = table.row_count();
    info!(
        path = %path.display(),
        rows = report.total_rows,
        columns = report.total_columns,
        "Source loaded"
    );
    Ok((table, report))
}

fn normalize_cell(cell: &str, null_tokens: &[String]) -> Option<String> {
    if cell.is_empty() {
        return None;
    }
    let trimmed = cell.trim();
    if !trimmed.is_empty() && null_tokens.iter().any(|t| t == trimmed) {
        return None;
    }
    Some(cell.to_string())
}

/// Numeric if every present cell parses as a number, temporal if every
/// present cell parses as a date, categorical otherwise. A column with no
/// present cells is categorical.
fn infer_kind(cells: &[Option<String>], formats: &[String]) -> ColumnKind {
    let mut present = cells.iter().flatten().peekable();
    if present.peek().is_none() {
        return ColumnKind::Categorical;
    }
    let present: Vec<&String> = present.collect();
    if present.iter().all(|c| parse_f64_safe(Some(c)).is_some()) {
        ColumnKind::Numeric
    } else if present
        .iter()
        .all(|c| parse_datetime_safe(Some(c), formats).is_some())
    {
        ColumnKind::Temporal
    } else {
        ColumnKind::Categorical
    }
}

fn build_values(
    cells: &[Option<String>],
    kind: ColumnKind,
    formats: &[String],
) -> (Vec<Value>, usize) {
    let mut coerced = 0usize;
    let values = cells
        .iter()
        .map(|cell| {
            let Some(s) = cell else {
                return Value::Missing;
            };
            let parsed = match kind {
                ColumnKind::Numeric => parse_f64_safe(Some(s)).map(Value::Number),
                ColumnKind::Temporal => parse_datetime_safe(Some(s), formats).map(Value::DateTime),
                ColumnKind::Categorical => Some(Value::Text(s.clone())),
            };
            parsed.unwrap_or_else(|| {
                coerced += 1;
                Value::Missing
            })
        })
        .collect();
    (values, coerced)
}

/// Left-join a lookup table onto `table`. Returns the number of matched rows.
pub fn join_lookup(table: &mut Table, join: &LookupJoin, config: &LoadConfig) -> Result<usize> {
    let (lookup, _) = load_table(&join.path, config)?;
    let key_col = table.column(&join.key).ok_or_else(|| {
        PipelineError::Config(format!("lookup key column '{}' not found in source", join.key))
    })?;
    let lookup_key = lookup.column(&join.lookup_key).ok_or_else(|| {
        PipelineError::Config(format!(
            "lookup key column '{}' not found in {}",
            join.lookup_key,
            join.path.display()
        ))
    })?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut duplicate_keys = 0usize;
    for (row, v) in lookup_key.values.iter().enumerate() {
        if v.is_missing() {
            continue;
        }
        if index.contains_key(&v.render()) {
            duplicate_keys += 1;
        } else {
            index.insert(v.render(), row);
        }
    }
    if duplicate_keys > 0 {
        warn!(lookup = %join.path.display(), duplicate_keys, "Duplicate lookup keys; first row wins");
    }

    let matches: Vec<Option<usize>> = key_col
        .values
        .iter()
        .map(|v| {
            if v.is_missing() {
                None
            } else {
                index.get(&v.render()).copied()
            }
        })
        .collect();
    let matched = matches.iter().filter(|m| m.is_some()).count();

    let selected: Vec<&Column> = if join.columns.is_empty() {
        lookup
            .columns()
            .iter()
            .filter(|c| c.name != join.lookup_key)
            .collect()
    } else {
        join.columns
            .iter()
            .map(|name| {
                lookup.column(name).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "column '{}' not found in {}",
                        name,
                        join.path.display()
                    ))
                })
            })
            .collect::<Result<_>>()?
    };

    for col in selected {
        let values = matches
            .iter()
            .map(|m| m.map(|row| col.values[row].clone()).unwrap_or(Value::Missing))
            .collect();
        table.push_column(Column::new(format!("{}{}", join.prefix, col.name), col.kind, values))?;
    }

    info!(
        lookup = %join.path.display(),
        key = %join.key,
        matched,
        unmatched = table.row_count() - matched,
        "Lookup joined"
    );
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn infers_kinds_and_missing_markers() {
        let f = write_csv("id,sales,region,date\n1,10,North,2025-01-01\n2,NaN, ,2025-01-02\n3,\"1,000\",South,\n");
        let (t, report) = load_table(f.path(), &LoadConfig::default()).unwrap();
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.column("sales").unwrap().kind, ColumnKind::Numeric);
        assert_eq!(t.column("region").unwrap().kind, ColumnKind::Categorical);
        assert_eq!(t.column("date").unwrap().kind, ColumnKind::Temporal);
        let sales = &t.column("sales").unwrap().values;
        assert!(sales[1].is_missing());
        assert_eq!(sales[2], Value::Number(1000.0));
        // whitespace-only cells stay text
        assert_eq!(t.column("region").unwrap().values[1], Value::Text(" ".into()));
        assert_eq!(report.missing_cells, 2);
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let err = load_table(Path::new("/no/such/file.csv"), &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
    }

    #[test]
    fn ragged_rows_are_parse_errors() {
        let f = write_csv("a,b\n1,2\n3\n");
        let err = load_table(f.path(), &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn header_only_file_is_empty_table() {
        let f = write_csv("a,b\n");
        let (t, _) = load_table(f.path(), &LoadConfig::default()).unwrap();
        assert_eq!(t.row_count(), 0);
        assert_eq!(t.column_count(), 2);
    }

    #[test]
    fn declared_numeric_coerces_to_missing() {
        let f = write_csv("qty\n1\ntwo\n3\n");
        let mut config = LoadConfig::default();
        config.kinds.insert("qty".into(), ColumnKind::Numeric);
        let (t, report) = load_table(f.path(), &config).unwrap();
        assert!(t.column("qty").unwrap().values[1].is_missing());
        assert_eq!(report.coerced_cells, 1);
    }

    #[test]
    fn lookup_join_is_left_join() {
        let main = write_csv("trip,PULocationID\n1,1\n2,2\n3,99\n");
        let zones = write_csv("LocationID,Borough,Zone\n1,EWR,Newark Airport\n2,Queens,Jamaica Bay\n2,Queens,Dup\n");
        let config = LoadConfig::default();
        let (mut t, _) = load_table(main.path(), &config).unwrap();
        let join = LookupJoin {
            path: zones.path().to_path_buf(),
            key: "PULocationID".into(),
            lookup_key: "LocationID".into(),
            prefix: "pickup_".into(),
            columns: vec![],
        };
        let matched = join_lookup(&mut t, &join, &config).unwrap();
        assert_eq!(matched, 2);
        assert_eq!(t.row_count(), 3);
        let zone = &t.column("pickup_Zone").unwrap().values;
        assert_eq!(zone[0], Value::Text("Newark Airport".into()));
        assert_eq!(zone[1], Value::Text("Jamaica Bay".into()));
        assert!(zone[2].is_missing());
        assert!(t.column("pickup_LocationID").is_none());
    }
}
