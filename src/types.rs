// Row types shared by the report generators, the CSV/JSON writers and the
// console previews.
use crate::util::{display_2dp, display_opt_2dp};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ColumnProfileRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Kind")]
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[serde(rename = "NonMissing")]
    #[tabled(rename = "NonMissing")]
    pub non_missing: usize,
    #[serde(rename = "Distinct")]
    #[tabled(rename = "Distinct")]
    pub distinct: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct MissingRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Missing")]
    #[tabled(rename = "Missing")]
    pub missing: usize,
    #[serde(rename = "MissingPct")]
    #[tabled(rename = "MissingPct", display_with = "display_2dp")]
    pub missing_pct: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    NegativeValue,
    BlankCategorical,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::NegativeValue => f.write_str("negative value"),
            FindingKind::BlankCategorical => f.write_str("blank categorical"),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ConsistencyFinding {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Violation")]
    #[tabled(rename = "Violation")]
    pub kind: FindingKind,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct FillRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Strategy")]
    #[tabled(rename = "Strategy")]
    pub strategy: String,
    #[serde(rename = "FillValue")]
    #[tabled(rename = "FillValue")]
    pub fill_value: String,
    #[serde(rename = "Filled")]
    #[tabled(rename = "Filled")]
    pub filled: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CapRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Lower")]
    #[tabled(rename = "Lower", display_with = "display_2dp")]
    pub lower: f64,
    #[serde(rename = "Upper")]
    #[tabled(rename = "Upper", display_with = "display_2dp")]
    pub upper: f64,
    #[serde(rename = "Capped")]
    #[tabled(rename = "Capped")]
    pub capped: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct NumericSummaryRow {
    #[serde(rename = "Column")]
    #[tabled(rename = "Column")]
    pub column: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Mean")]
    #[tabled(rename = "Mean", display_with = "display_opt_2dp")]
    pub mean: Option<f64>,
    #[serde(rename = "Std")]
    #[tabled(rename = "Std", display_with = "display_opt_2dp")]
    pub std: Option<f64>,
    #[serde(rename = "Min")]
    #[tabled(rename = "Min", display_with = "display_opt_2dp")]
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    #[tabled(rename = "25%", display_with = "display_opt_2dp")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    #[tabled(rename = "50%", display_with = "display_opt_2dp")]
    pub q50: Option<f64>,
    #[serde(rename = "75%")]
    #[tabled(rename = "75%", display_with = "display_opt_2dp")]
    pub q75: Option<f64>,
    #[serde(rename = "Max")]
    #[tabled(rename = "Max", display_with = "display_opt_2dp")]
    pub max: Option<f64>,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ValueCountRow {
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Percent")]
    #[tabled(rename = "Percent", display_with = "display_2dp")]
    pub percent: f64,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct GroupSummaryRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Sum")]
    #[tabled(rename = "Sum", display_with = "display_2dp")]
    pub sum: f64,
    #[serde(rename = "Mean")]
    #[tabled(rename = "Mean", display_with = "display_2dp")]
    pub mean: f64,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct PeriodRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Sum")]
    #[tabled(rename = "Sum", display_with = "display_2dp")]
    pub sum: f64,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CustomerRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Customer")]
    #[tabled(rename = "Customer")]
    pub customer: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total", display_with = "display_2dp")]
    pub total: f64,
    #[serde(rename = "Orders")]
    #[tabled(rename = "Orders")]
    pub orders: usize,
}
