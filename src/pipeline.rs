//! Explicit stage threading: the table, the config and the stage outputs are
//! owned by a [`Pipeline`] value instead of living in process-wide state.

use crate::cleaner::{self, CleaningLog};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::{self, LoadReport};
use crate::output::{self, ExportManifest};
use crate::profiler::{self, TableProfile};
use crate::quality::{self, QualityReport};
use crate::reports::{self, Summaries};
use crate::table::Table;
use std::path::Path;
use tracing::info;

pub struct Pipeline {
    config: PipelineConfig,
    raw: Table,
    table: Table,
    load_report: LoadReport,
}

/// Everything one full run produced.
pub struct RunOutcome {
    pub profile: TableProfile,
    pub quality: QualityReport,
    pub cleaning: CleaningLog,
    pub summaries: Summaries,
    pub manifest: ExportManifest,
}

impl Pipeline {
    /// Load the source and apply the configured lookup joins.
    pub fn load(path: &Path, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let (mut table, load_report) = loader::load_table(path, &config.load)?;
        for join in &config.lookups {
            loader::join_lookup(&mut table, join, &config.load)?;
        }
        Ok(Self::from_table(table, load_report, config))
    }

    pub fn from_table(table: Table, load_report: LoadReport, config: PipelineConfig) -> Self {
        Self {
            config,
            raw: table.clone(),
            table,
            load_report,
        }
    }

    /// The table exactly as loaded, before any stage touched it.
    pub fn raw(&self) -> &Table {
        &self.raw
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn profile(&self) -> TableProfile {
        profiler::profile(&self.table)
    }

    /// Builds the quality report and drops duplicate rows.
    pub fn assess(&mut self) -> QualityReport {
        quality::assess(&mut self.table, &self.config.quality)
    }

    pub fn clean(&mut self, report: &QualityReport) -> CleaningLog {
        cleaner::clean(
            &mut self.table,
            report,
            &self.config.cleaning,
            &self.config.load,
        )
    }

    pub fn summarize(&self) -> Summaries {
        reports::summarize(&self.table, &self.config.analysis)
    }

    /// Run every stage in order and export to `output_dir`.
    pub fn run(mut self, output_dir: &Path) -> Result<RunOutcome> {
        let profile = self.profile();
        let quality = self.assess();
        let cleaning = self.clean(&quality);
        let summaries = self.summarize();
        let manifest = output::export_all(
            output_dir,
            &self.table,
            &profile,
            &quality,
            &cleaning,
            &summaries,
        )?;
        info!(
            rows_in = self.raw.row_count(),
            rows_out = self.table.row_count(),
            "Pipeline finished"
        );
        Ok(RunOutcome {
            profile,
            quality,
            cleaning,
            summaries,
            manifest,
        })
    }
}
