//! Deterministic repairs, applied in a fixed order:
//!
//! 1. impute missing values (median for numeric, mode otherwise)
//! 2. standardize text columns named in the config
//! 3. coerce configured temporal columns, re-filling unparsable cells
//! 4. cap numeric outliers to the IQR fences
//! 5. clip configured columns at zero
//!
//! A rule that cannot be applied to a column leaves that column untouched and
//! is recorded as a [`ColumnIssue`]; it never aborts the run.

use crate::config::{CleaningConfig, LoadConfig, TextRule};
use crate::quality::QualityReport;
use crate::table::{ColumnKind, Table, Value};
use crate::types::{CapRow, FillRow, FindingKind};
use crate::util::{cmp_f64, median, parse_datetime_safe, quantile_sorted, title_case};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanStep {
    Impute,
    Standardize,
    Temporal,
    Cap,
    FloorClip,
}

impl fmt::Display for CleanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CleanStep::Impute => "impute",
            CleanStep::Standardize => "standardize",
            CleanStep::Temporal => "temporal",
            CleanStep::Cap => "cap",
            CleanStep::FloorClip => "floor_clip",
        };
        f.write_str(s)
    }
}

/// A recoverable, single-column failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnIssue {
    pub column: String,
    pub step: CleanStep,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalRepair {
    pub column: String,
    pub parsed: usize,
    pub unparsed: usize,
    pub fill_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorClip {
    pub column: String,
    pub clipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningLog {
    pub blanks_cleared: usize,
    pub fills: Vec<FillRow>,
    pub standardized: Vec<String>,
    pub temporal: Vec<TemporalRepair>,
    pub caps: Vec<CapRow>,
    pub floor_clips: Vec<FloorClip>,
    pub issues: Vec<ColumnIssue>,
}

impl CleaningLog {
    fn issue(&mut self, column: &str, step: CleanStep, message: impl Into<String>) {
        let message = message.into();
        warn!(column, %step, %message, "Cleaning rule skipped");
        self.issues.push(ColumnIssue {
            column: column.to_string(),
            step,
            message,
        });
    }
}

pub fn clean(
    table: &mut Table,
    report: &QualityReport,
    config: &CleaningConfig,
    load: &LoadConfig,
) -> CleaningLog {
    let mut log = CleaningLog::default();
    let mut candidates: BTreeSet<String> = report
        .columns_with_missing()
        .map(|m| m.column.clone())
        .collect();
    if config.blank_as_missing {
        let blank_columns: Vec<&str> = report
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::BlankCategorical)
            .map(|f| f.column.as_str())
            .collect();
        log.blanks_cleared = clear_blanks(table, &blank_columns);
        candidates.extend(blank_columns.iter().map(|c| c.to_string()));
    }

    impute_missing(table, &candidates, &mut log);
    standardize_text(table, config, &load.null_tokens, &mut log);
    coerce_temporal(table, config, &load.date_formats, &mut log);
    cap_outliers(table, config, &mut log);
    clip_floor(table, config, &mut log);

    info!(
        filled_columns = log.fills.len(),
        capped_cells = log.caps.iter().map(|c| c.capped).sum::<usize>(),
        issues = log.issues.len(),
        "Cleaning complete"
    );
    log
}

fn clear_blanks(table: &mut Table, columns: &[&str]) -> usize {
    let mut cleared = 0;
    for name in columns {
        let Some(col) = table.column_mut(name) else {
            continue;
        };
        for v in col.values.iter_mut() {
            if v.as_text().is_some_and(|s| s.trim().is_empty()) {
                *v = Value::Missing;
                cleared += 1;
            }
        }
    }
    if cleared > 0 {
        debug!(cleared, "Blank text cells marked missing");
    }
    cleared
}

/// Most frequent present value. Ties go to the smallest value in natural
/// order so repeated runs agree.
pub fn mode(values: &[Value]) -> Option<Value> {
    let mut counts: HashMap<&Value, usize> = HashMap::new();
    for v in values.iter().filter(|v| !v.is_missing()) {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.natural_cmp(va)))
        .map(|(v, _)| v.clone())
}

fn impute_missing(table: &mut Table, candidates: &BTreeSet<String>, log: &mut CleaningLog) {
    for name in candidates {
        let Some(col) = table.column_mut(name) else {
            log.issue(name, CleanStep::Impute, "column not found");
            continue;
        };
        let missing = col.missing_count();
        if missing == 0 {
            continue;
        }
        if missing == col.values.len() {
            log.issue(name, CleanStep::Impute, "column has no values to impute from");
            continue;
        }
        let (strategy, fill) = match col.kind {
            ColumnKind::Numeric => ("median", Some(Value::Number(median(col.numbers())))),
            _ => ("mode", mode(&col.values)),
        };
        let Some(fill) = fill else {
            log.issue(name, CleanStep::Impute, "no fill value could be computed");
            continue;
        };
        for v in col.values.iter_mut().filter(|v| v.is_missing()) {
            *v = fill.clone();
        }
        info!(column = %name, strategy, fill_value = %fill, filled = missing, "Imputed missing values");
        log.fills.push(FillRow {
            column: name.clone(),
            strategy: strategy.to_string(),
            fill_value: fill.render(),
            filled: missing,
        });
    }
}

/// Values whose standardized form is a null token keep their loaded text,
/// otherwise the exported table would reload them as missing.
fn standardize_text(
    table: &mut Table,
    config: &CleaningConfig,
    null_tokens: &[String],
    log: &mut CleaningLog,
) {
    for (name, rule) in &config.text {
        let Some(col) = table.column_mut(name) else {
            log.issue(name, CleanStep::Standardize, "column not found");
            continue;
        };
        if col.kind != ColumnKind::Categorical {
            log.issue(name, CleanStep::Standardize, format!("{} column is not text", col.kind));
            continue;
        }
        let mut kept = 0usize;
        for v in col.values.iter_mut() {
            if let Value::Text(s) = v {
                let standardized = match rule {
                    TextRule::Lower => s.trim().to_lowercase(),
                    TextRule::Title => title_case(s),
                };
                if null_tokens.iter().any(|t| t == standardized.trim()) {
                    kept += 1;
                    continue;
                }
                *s = standardized;
            }
        }
        if kept > 0 {
            log.issue(
                name,
                CleanStep::Standardize,
                format!("{kept} values would standardize to a null token; kept as loaded"),
            );
        }
        debug!(column = %name, ?rule, "Standardized text");
        log.standardized.push(name.clone());
    }
}

fn coerce_temporal(
    table: &mut Table,
    config: &CleaningConfig,
    formats: &[String],
    log: &mut CleaningLog,
) {
    for name in &config.temporal {
        let Some(col) = table.column_mut(name) else {
            log.issue(name, CleanStep::Temporal, "column not found");
            continue;
        };
        let parsed: Vec<Value> = match col.kind {
            ColumnKind::Temporal => col.values.clone(),
            ColumnKind::Categorical => col
                .values
                .iter()
                .map(|v| {
                    parse_datetime_safe(v.as_text(), formats)
                        .map(Value::DateTime)
                        .unwrap_or(Value::Missing)
                })
                .collect(),
            ColumnKind::Numeric => {
                log.issue(name, CleanStep::Temporal, "numeric column cannot be parsed as dates");
                continue;
            }
        };
        let unparsed = parsed.iter().filter(|v| v.is_missing()).count();
        if unparsed == parsed.len() {
            log.issue(name, CleanStep::Temporal, "no value could be parsed as a date");
            continue;
        }
        let fill = mode(&parsed);
        col.values = parsed;
        col.kind = ColumnKind::Temporal;
        if let Some(fill) = &fill {
            for v in col.values.iter_mut().filter(|v| v.is_missing()) {
                *v = fill.clone();
            }
        }
        info!(column = %name, unparsed, "Coerced column to dates");
        log.temporal.push(TemporalRepair {
            column: name.clone(),
            parsed: col.values.len() - unparsed,
            unparsed,
            fill_value: fill.filter(|_| unparsed > 0).map(|v| v.render()),
        });
    }
}

/// `(Q1 - k*IQR, Q3 + k*IQR)` of the given values.
pub fn iqr_bounds(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(cmp_f64);
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - k * iqr, q3 + k * iqr))
}

pub(crate) fn cap_outliers(table: &mut Table, config: &CleaningConfig, log: &mut CleaningLog) {
    for name in &config.cap_include {
        match table.column(name) {
            None => log.issue(name, CleanStep::Cap, "column not found"),
            Some(c) if c.kind != ColumnKind::Numeric => {
                log.issue(name, CleanStep::Cap, format!("{} column cannot be capped", c.kind))
            }
            Some(_) => {}
        }
    }
    for col in table.columns_mut() {
        if col.kind != ColumnKind::Numeric || !config.caps(&col.name) {
            continue;
        }
        let Some((lower, upper)) = iqr_bounds(&col.numbers(), config.iqr_multiplier) else {
            continue;
        };
        if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
            log.issue(&col.name, CleanStep::Cap, "IQR fences are not finite; column left uncapped");
            continue;
        }
        let mut capped = 0usize;
        for v in col.values.iter_mut() {
            if let Value::Number(x) = v {
                let clipped = x.clamp(lower, upper);
                if clipped != *x {
                    *x = clipped;
                    capped += 1;
                }
            }
        }
        if capped > 0 {
            info!(column = %col.name, lower, upper, capped, "Capped outliers");
        }
        log.caps.push(CapRow {
            column: col.name.clone(),
            lower,
            upper,
            capped,
        });
    }
}

fn clip_floor(table: &mut Table, config: &CleaningConfig, log: &mut CleaningLog) {
    for name in &config.floor_zero {
        let Some(col) = table.column_mut(name) else {
            log.issue(name, CleanStep::FloorClip, "column not found");
            continue;
        };
        if col.kind != ColumnKind::Numeric {
            log.issue(name, CleanStep::FloorClip, format!("{} column cannot be clipped", col.kind));
            continue;
        }
        let mut clipped = 0usize;
        for v in col.values.iter_mut() {
            if let Value::Number(x) = v {
                if *x < 0.0 {
                    *x = 0.0;
                    clipped += 1;
                }
            }
        }
        if clipped > 0 {
            info!(column = %name, clipped, "Clipped negative values to zero");
        }
        log.floor_clips.push(FloorClip {
            column: name.clone(),
            clipped,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoadConfig, QualityConfig};
    use crate::quality::assess;
    use crate::table::Column;
    use chrono::NaiveDate;

    fn num(v: f64) -> Value {
        Value::Number(v)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::DateTime(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    fn run(table: &mut Table, config: &CleaningConfig) -> CleaningLog {
        let report = assess(table, &QualityConfig::default());
        clean(table, &report, config, &LoadConfig::default())
    }

    #[test]
    fn sales_scenario_imputes_caps_and_floors() {
        let mut t = Table::new(vec![Column::new(
            "sales",
            ColumnKind::Numeric,
            vec![num(10.0), num(-5.0), num(1000.0), num(20.0), Value::Missing],
        )])
        .unwrap();
        let config = CleaningConfig {
            floor_zero: vec!["sales".into()],
            ..Default::default()
        };
        let log = run(&mut t, &config);

        let sales = t.column("sales").unwrap().numbers();
        // median of 10, -5, 1000, 20
        assert_eq!(sales[4], 15.0);
        assert!(sales.iter().all(|v| *v >= 0.0));
        assert_eq!(log.caps[0].upper, 35.0);
        assert_eq!(sales[2], 35.0);
        assert_eq!(sales, vec![10.0, 0.0, 35.0, 20.0, 15.0]);
        assert_eq!(log.fills[0].fill_value, "15");
        assert_eq!(log.floor_clips[0].clipped, 1);
    }

    #[test]
    fn capping_is_idempotent() {
        let mut t = Table::new(vec![Column::new(
            "fare",
            ColumnKind::Numeric,
            [3.0, 5.0, 6.0, 7.0, 7.5, 8.0, 9.0, 10.0, 12.0, 250.0, -40.0]
                .into_iter()
                .map(num)
                .collect(),
        )])
        .unwrap();
        let config = CleaningConfig::default();
        let mut log = CleaningLog::default();
        cap_outliers(&mut t, &config, &mut log);
        assert_eq!(log.caps[0].capped, 2);
        let once = t.clone();

        let mut again = CleaningLog::default();
        cap_outliers(&mut t, &config, &mut again);
        assert_eq!(again.caps[0].capped, 0);
        assert_eq!(t, once);

        let (lower, upper) = iqr_bounds(&t.column("fare").unwrap().numbers(), 1.5).unwrap();
        assert!(t
            .column("fare")
            .unwrap()
            .numbers()
            .iter()
            .all(|v| *v >= lower && *v <= upper));
    }

    #[test]
    fn invalid_date_takes_earliest_on_tie() {
        let mut t = Table::new(vec![Column::new(
            "date",
            ColumnKind::Categorical,
            vec![text("2025-01-03"), text("not-a-date"), text("2025-01-01")],
        )])
        .unwrap();
        let config = CleaningConfig {
            temporal: vec!["date".into()],
            ..Default::default()
        };
        let log = run(&mut t, &config);
        let col = t.column("date").unwrap();
        assert_eq!(col.kind, ColumnKind::Temporal);
        assert_eq!(col.values, vec![date(2025, 1, 3), date(2025, 1, 1), date(2025, 1, 1)]);
        assert_eq!(log.temporal[0].unparsed, 1);
        assert_eq!(log.temporal[0].fill_value.as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn invalid_date_takes_most_frequent() {
        let mut t = Table::new(vec![
            Column::new("id", ColumnKind::Numeric, (0..4).map(|i| num(i as f64)).collect()),
            Column::new(
                "date",
                ColumnKind::Categorical,
                vec![text("2025-01-01"), text("bad"), text("2025-01-03"), text("2025-01-03")],
            ),
        ])
        .unwrap();
        let config = CleaningConfig {
            temporal: vec!["date".into()],
            ..Default::default()
        };
        run(&mut t, &config);
        assert_eq!(t.column("date").unwrap().values[1], date(2025, 1, 3));
    }

    #[test]
    fn unparsable_temporal_column_is_left_alone() {
        let mut t = Table::new(vec![Column::new(
            "when",
            ColumnKind::Categorical,
            vec![text("soon"), text("later")],
        )])
        .unwrap();
        let config = CleaningConfig {
            temporal: vec!["when".into()],
            ..Default::default()
        };
        let before = t.clone();
        let log = run(&mut t, &config);
        assert_eq!(t, before);
        assert_eq!(log.issues.len(), 1);
        assert_eq!(log.issues[0].step, CleanStep::Temporal);
    }

    #[test]
    fn mode_breaks_ties_lexicographically() {
        let values = vec![text("b"), text("a"), text("b"), text("a"), Value::Missing];
        assert_eq!(mode(&values), Some(text("a")));
        assert_eq!(mode(&[text("z"), text("y"), text("z")]), Some(text("z")));
        assert_eq!(mode(&[Value::Missing]), None);
    }

    #[test]
    fn imputes_categoricals_and_blank_cells() {
        let mut t = Table::new(vec![
            Column::new(
                "region",
                ColumnKind::Categorical,
                vec![text(" North "), text("south"), text("  "), Value::Missing, text("North")],
            ),
            Column::new(
                "product",
                ColumnKind::Categorical,
                vec![text("laptop pro"), text("MOUSE"), text("mouse"), text("desk"), text("x")],
            ),
        ])
        .unwrap();
        let mut config = CleaningConfig::default();
        config.text.insert("region".into(), TextRule::Lower);
        config.text.insert("product".into(), TextRule::Title);
        let log = run(&mut t, &config);

        assert_eq!(log.blanks_cleared, 1);
        let region: Vec<String> = t.column("region").unwrap().values.iter().map(Value::render).collect();
        // " North " and "North" are distinct before standardization, so the
        // lexicographically smallest of the tied values fills
        assert_eq!(region, vec!["north", "south", "north", "north", "north"]);
        let product: Vec<String> = t.column("product").unwrap().values.iter().map(Value::render).collect();
        assert_eq!(product, vec!["Laptop Pro", "Mouse", "Mouse", "Desk", "X"]);
        assert!(t.columns().iter().all(|c| c.missing_count() == 0));
    }

    #[test]
    fn fully_missing_column_is_reported_not_dropped() {
        let mut t = Table::new(vec![
            Column::new("a", ColumnKind::Numeric, vec![num(1.0), num(2.0)]),
            Column::new("empty", ColumnKind::Categorical, vec![Value::Missing, Value::Missing]),
        ])
        .unwrap();
        let log = run(&mut t, &CleaningConfig::default());
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.column("empty").unwrap().missing_count(), 2);
        assert!(log.issues.iter().any(|i| i.column == "empty" && i.step == CleanStep::Impute));
    }

    #[test]
    fn excluded_columns_are_not_capped() {
        let mut t = Table::new(vec![Column::new(
            "customer_id",
            ColumnKind::Numeric,
            [1.0, 2.0, 3.0, 4.0, 99999.0].into_iter().map(num).collect(),
        )])
        .unwrap();
        let config = CleaningConfig {
            cap_exclude: vec!["customer_id".into()],
            floor_zero: vec!["missing_col".into()],
            ..Default::default()
        };
        let log = run(&mut t, &config);
        assert_eq!(t.column("customer_id").unwrap().values[4], num(99999.0));
        assert!(log.caps.is_empty());
        assert_eq!(log.issues[0].column, "missing_col");
    }

    #[test]
    fn extreme_finite_values_degrade_to_an_issue() {
        let mut t = Table::new(vec![Column::new(
            "balance",
            ColumnKind::Numeric,
            vec![num(-1.7e308), num(1.7e308)],
        )])
        .unwrap();
        let before = t.clone();
        let mut log = CleaningLog::default();
        cap_outliers(&mut t, &CleaningConfig::default(), &mut log);
        assert_eq!(t, before);
        assert!(log.caps.is_empty());
        assert_eq!(log.issues.len(), 1);
        assert_eq!(log.issues[0].step, CleanStep::Cap);
        assert_eq!(log.issues[0].column, "balance");
    }

    #[test]
    fn standardizing_into_a_null_token_keeps_loaded_text() {
        let mut t = Table::new(vec![
            Column::new("id", ColumnKind::Numeric, (0..3).map(|i| num(i as f64)).collect()),
            Column::new(
                "product",
                ColumnKind::Categorical,
                vec![text("none"), text("laptop"), text("none")],
            ),
            Column::new(
                "code",
                ColumnKind::Categorical,
                vec![text("NAN"), text("ABC"), text("Xy")],
            ),
        ])
        .unwrap();
        let mut config = CleaningConfig::default();
        config.text.insert("product".into(), TextRule::Title);
        config.text.insert("code".into(), TextRule::Lower);
        let log = run(&mut t, &config);

        assert_eq!(t.column("product").unwrap().values, vec![text("none"), text("Laptop"), text("none")]);
        assert_eq!(t.column("code").unwrap().values, vec![text("NAN"), text("abc"), text("xy")]);
        let kept: Vec<&str> = log
            .issues
            .iter()
            .filter(|i| i.step == CleanStep::Standardize)
            .map(|i| i.column.as_str())
            .collect();
        assert_eq!(kept, vec!["code", "product"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        crate::output::write_table(&path, &t).unwrap();
        let (reloaded, _) = crate::loader::load_table(&path, &LoadConfig::default()).unwrap();
        assert_eq!(reloaded, t);
    }
}
