//! Structural metadata. Never mutates the table and never fails.

use crate::table::Table;
use crate::types::ColumnProfileRow;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: usize,
    pub column_profiles: Vec<ColumnProfileRow>,
}

pub fn profile(table: &Table) -> TableProfile {
    let column_profiles: Vec<ColumnProfileRow> = table
        .columns()
        .iter()
        .map(|c| ColumnProfileRow {
            column: c.name.clone(),
            kind: c.kind.to_string(),
            non_missing: c.values.len() - c.missing_count(),
            distinct: c.distinct_count(),
        })
        .collect();
    let profile = TableProfile {
        rows: table.row_count(),
        columns: table.column_count(),
        column_profiles,
    };
    info!(rows = profile.rows, columns = profile.columns, "Profiled table");
    profile
}
