//! Missingness, duplicates and consistency checks.
//!
//! This is the one stage besides the cleaner that changes the table: exact
//! duplicate rows are dropped (first occurrence kept) once they have been
//! counted.

use crate::config::QualityConfig;
use crate::table::{ColumnKind, Table, Value};
use crate::types::{ConsistencyFinding, FindingKind, MissingRow};
use crate::util::round_to;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityReport {
    pub rows: usize,
    pub missing: Vec<MissingRow>,
    pub duplicate_rows: usize,
    pub findings: Vec<ConsistencyFinding>,
    /// Verbatim distinct values of low-cardinality categorical columns.
    pub levels: BTreeMap<String, Vec<String>>,
}

impl QualityReport {
    pub fn columns_with_missing(&self) -> impl Iterator<Item = &MissingRow> {
        self.missing.iter().filter(|m| m.missing > 0)
    }
}

pub fn assess(table: &mut Table, config: &QualityConfig) -> QualityReport {
    let rows = table.row_count();
    let missing = table
        .columns()
        .iter()
        .map(|c| {
            let count = c.missing_count();
            let pct = if rows == 0 {
                0.0
            } else {
                round_to(count as f64 / rows as f64 * 100.0, 2)
            };
            MissingRow {
                column: c.name.clone(),
                missing: count,
                missing_pct: pct,
            }
        })
        .collect();

    let mut findings = Vec::new();
    let mut levels = BTreeMap::new();
    for col in table.columns() {
        match col.kind {
            ColumnKind::Numeric => {
                let negatives = col.numbers().iter().filter(|v| **v < 0.0).count();
                if negatives > 0 {
                    findings.push(ConsistencyFinding {
                        column: col.name.clone(),
                        kind: FindingKind::NegativeValue,
                        count: negatives,
                    });
                }
            }
            ColumnKind::Categorical => {
                let blanks = col
                    .values
                    .iter()
                    .filter_map(Value::as_text)
                    .filter(|s| s.trim().is_empty())
                    .count();
                if blanks > 0 {
                    findings.push(ConsistencyFinding {
                        column: col.name.clone(),
                        kind: FindingKind::BlankCategorical,
                        count: blanks,
                    });
                }
                if col.distinct_count() < config.max_listed_levels {
                    let mut distinct: Vec<&Value> = col
                        .values
                        .iter()
                        .filter(|v| !v.is_missing())
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .collect();
                    distinct.sort_by(|a, b| a.natural_cmp(b));
                    levels.insert(
                        col.name.clone(),
                        distinct.into_iter().map(Value::render).collect(),
                    );
                }
            }
            ColumnKind::Temporal => {}
        }
    }
    for f in &findings {
        warn!(column = %f.column, violation = %f.kind, count = f.count, "Consistency finding");
    }

    let duplicate_rows = remove_duplicates(table);
    if duplicate_rows > 0 {
        info!(duplicate_rows, remaining = table.row_count(), "Removed duplicate rows");
    }

    QualityReport {
        rows,
        missing,
        duplicate_rows,
        findings,
        levels,
    }
}

/// Drop rows identical to an earlier row across every column. Returns the
/// number removed.
fn remove_duplicates(table: &mut Table) -> usize {
    let keep: Vec<bool> = {
        let mut seen: HashSet<Vec<&Value>> = HashSet::with_capacity(table.row_count());
        (0..table.row_count())
            .map(|i| seen.insert(table.row(i)))
            .collect()
    };
    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        table.retain_rows(&keep);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn sample() -> Table {
        Table::new(vec![
            Column::new(
                "region",
                ColumnKind::Categorical,
                vec![text("North"), text("  "), text("North"), Value::Missing],
            ),
            Column::new(
                "sales",
                ColumnKind::Numeric,
                vec![
                    Value::Number(10.0),
                    Value::Number(-5.0),
                    Value::Number(10.0),
                    Value::Missing,
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn reports_missing_percentages() {
        let mut t = sample();
        let report = assess(&mut t, &QualityConfig::default());
        assert_eq!(report.rows, 4);
        assert_eq!(report.missing[0].missing, 1);
        assert_eq!(report.missing[0].missing_pct, 25.0);
        assert_eq!(report.columns_with_missing().count(), 2);
    }

    #[test]
    fn removes_duplicates_keeping_first() {
        let mut t = sample();
        let report = assess(&mut t, &QualityConfig::default());
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.row(0), vec![&text("North"), &Value::Number(10.0)]);
        // a second pass finds nothing left to remove
        let again = assess(&mut t, &QualityConfig::default());
        assert_eq!(again.duplicate_rows, 0);
    }

    #[test]
    fn records_consistency_findings() {
        let mut t = sample();
        let report = assess(&mut t, &QualityConfig::default());
        assert!(report.findings.contains(&ConsistencyFinding {
            column: "sales".into(),
            kind: FindingKind::NegativeValue,
            count: 1,
        }));
        assert!(report.findings.contains(&ConsistencyFinding {
            column: "region".into(),
            kind: FindingKind::BlankCategorical,
            count: 1,
        }));
    }

    #[test]
    fn lists_levels_of_small_categoricals() {
        let mut t = sample();
        let report = assess(&mut t, &QualityConfig::default());
        assert_eq!(
            report.levels.get("region"),
            Some(&vec!["  ".to_string(), "North".to_string()])
        );
        let strict = QualityConfig {
            max_listed_levels: 2,
        };
        let mut t = sample();
        assert!(assess(&mut t, &strict).levels.is_empty());
    }

    #[test]
    fn empty_table_has_zero_percentages() {
        let mut t = Table::new(vec![Column::new("a", ColumnKind::Numeric, vec![])]).unwrap();
        let report = assess(&mut t, &QualityConfig::default());
        assert_eq!(report.missing[0].missing_pct, 0.0);
        assert_eq!(report.duplicate_rows, 0);
    }
}
