use crate::config::AnalysisConfig;
use crate::table::{Column, ColumnKind, Table, Value};
use crate::types::{CustomerRow, GroupSummaryRow, NumericSummaryRow, PeriodRow, ValueCountRow};
use crate::util::{average, cmp_f64, pearson, quantile_sorted, std_dev};
use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Year,
    Quarter,
    Month,
}

impl Period {
    pub fn label(self, dt: &NaiveDateTime) -> String {
        match self {
            Period::Year => format!("{:04}", dt.year()),
            Period::Quarter => format!("{:04}-Q{}", dt.year(), (dt.month() - 1) / 3 + 1),
            Period::Month => format!("{:04}-{:02}", dt.year(), dt.month()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Period::Year => "yearly",
            Period::Quarter => "quarterly",
            Period::Month => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `None` where the coefficient is undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summaries {
    pub numeric: Vec<NumericSummaryRow>,
    pub value_counts: Vec<(String, Vec<ValueCountRow>)>,
    pub amount: Option<String>,
    pub groups: Vec<(String, Vec<GroupSummaryRow>)>,
    pub periods: Vec<(Period, Vec<PeriodRow>)>,
    pub correlation: CorrelationMatrix,
    pub top_customers: Option<Vec<CustomerRow>>,
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

pub fn summarize(table: &Table, config: &AnalysisConfig) -> Summaries {
    let numeric = numeric_summary(table);
    let value_counts = table
        .columns_of_kind(ColumnKind::Categorical)
        .map(|c| (c.name.clone(), value_counts(c, config.top_n)))
        .collect();

    let amount = config
        .amount
        .as_deref()
        .and_then(|name| numeric_column(table, name, "amount"));

    let mut groups = Vec::new();
    let mut periods = Vec::new();
    let mut top_customers = None;
    if let Some(amount) = amount {
        for key in &config.group_by {
            match table.column(key) {
                Some(key_col) => groups.push((key.clone(), group_summary(key_col, amount))),
                None => warn!(column = %key, "Grouping column not found; skipped"),
            }
        }

        let date_col = match config.date.as_deref() {
            Some(name) => table.column(name).filter(|c| {
                let ok = c.kind == ColumnKind::Temporal;
                if !ok {
                    warn!(column = %name, kind = %c.kind, "Date column is not temporal; time buckets skipped");
                }
                ok
            }),
            None => table.columns_of_kind(ColumnKind::Temporal).next(),
        };
        if let Some(date_col) = date_col {
            for period in [Period::Year, Period::Quarter, Period::Month] {
                periods.push((period, period_sums(date_col, amount, period)));
            }
        }

        if let Some(customer) = config.customer.as_deref() {
            match table.column(customer) {
                Some(c) => top_customers = Some(top_customers_by(c, amount, config.top_n)),
                None => warn!(column = %customer, "Customer column not found; skipped"),
            }
        }
    }

    let summaries = Summaries {
        numeric,
        value_counts,
        amount: amount.map(|c| c.name.clone()),
        groups,
        periods,
        correlation: correlation_matrix(table),
        top_customers,
    };
    info!(
        numeric_columns = summaries.numeric.len(),
        categorical_columns = summaries.value_counts.len(),
        grouped = summaries.groups.len(),
        "Summaries computed"
    );
    summaries
}

fn numeric_column<'a>(table: &'a Table, name: &str, role: &str) -> Option<&'a Column> {
    match table.column(name) {
        Some(c) if c.kind == ColumnKind::Numeric => Some(c),
        Some(c) => {
            warn!(column = %name, role, kind = %c.kind, "Column is not numeric; skipped");
            None
        }
        None => {
            warn!(column = %name, role, "Column not found; skipped");
            None
        }
    }
}

/// count / mean / std / min / quartiles / max for every numeric column.
pub fn numeric_summary(table: &Table) -> Vec<NumericSummaryRow> {
    table
        .columns_of_kind(ColumnKind::Numeric)
        .map(|c| {
            let mut v = c.numbers();
            v.sort_by(cmp_f64);
            NumericSummaryRow {
                column: c.name.clone(),
                count: v.len(),
                mean: (!v.is_empty()).then(|| average(&v)),
                std: std_dev(&v),
                min: v.first().copied(),
                q25: quantile_sorted(&v, 0.25),
                q50: quantile_sorted(&v, 0.5),
                q75: quantile_sorted(&v, 0.75),
                max: v.last().copied(),
            }
        })
        .collect()
}

/// Top `n` values by count, ties broken by value.
pub fn value_counts(column: &Column, n: usize) -> Vec<ValueCountRow> {
    let mut counts: HashMap<&Value, usize> = HashMap::new();
    for v in column.values.iter().filter(|v| !v.is_missing()) {
        *counts.entry(v).or_insert(0) += 1;
    }
    // share of present cells; an all-missing column yields no rows
    let total = column.values.len() - column.missing_count();
    let mut rows: Vec<(&Value, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.natural_cmp(b.0)));
    rows.into_iter()
        .take(n)
        .map(|(v, count)| ValueCountRow {
            value: v.render(),
            count,
            percent: count as f64 * 100.0 / total as f64,
        })
        .collect()
}

/// Sum, mean and count of `amount` per distinct `key`, ranked by sum.
/// Rows missing either side are skipped.
pub fn group_summary(key: &Column, amount: &Column) -> Vec<GroupSummaryRow> {
    let mut acc: HashMap<&Value, (f64, usize)> = HashMap::new();
    for (k, a) in key.values.iter().zip(&amount.values) {
        if k.is_missing() {
            continue;
        }
        let Some(a) = a.as_f64() else {
            continue;
        };
        let e = acc.entry(k).or_insert((0.0, 0));
        e.0 += a;
        e.1 += 1;
    }
    let mut rows: Vec<(&Value, f64, usize)> = acc.into_iter().map(|(k, (s, n))| (k, s, n)).collect();
    rows.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.natural_cmp(b.0))
    });
    rows.into_iter()
        .map(|(k, sum, count)| GroupSummaryRow {
            group: k.render(),
            sum,
            mean: sum / count as f64,
            count,
        })
        .collect()
}

/// Sums of `amount` per calendar period, in chronological order.
pub fn period_sums(date: &Column, amount: &Column, period: Period) -> Vec<PeriodRow> {
    let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (d, a) in date.values.iter().zip(&amount.values) {
        let (Some(d), Some(a)) = (d.as_datetime(), a.as_f64()) else {
            continue;
        };
        let e = acc.entry(period.label(&d)).or_insert((0.0, 0));
        e.0 += a;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(period, (sum, count))| PeriodRow { period, sum, count })
        .collect()
}

pub fn top_customers_by(customer: &Column, amount: &Column, n: usize) -> Vec<CustomerRow> {
    group_summary(customer, amount)
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(idx, g)| CustomerRow {
            rank: idx + 1,
            customer: g.group,
            total: g.sum,
            orders: g.count,
        })
        .collect()
}

/// Pearson coefficients over every pair of numeric columns, using the rows
/// where both values are present.
pub fn correlation_matrix(table: &Table) -> CorrelationMatrix {
    let cols: Vec<&Column> = table.columns_of_kind(ColumnKind::Numeric).collect();
    let values: Vec<Vec<Option<f64>>> = cols
        .iter()
        .map(|a| {
            cols.iter()
                .map(|b| {
                    let pairs: Vec<(f64, f64)> = a
                        .values
                        .iter()
                        .zip(&b.values)
                        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
                        .collect();
                    pearson(&pairs)
                })
                .collect()
        })
        .collect();
    CorrelationMatrix {
        columns: cols.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}
