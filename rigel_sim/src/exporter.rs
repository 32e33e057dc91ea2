//! JSON exporter for run results.
//!
//! Writes every scenario result of one CLI invocation to a single document
//! for CI tooling.

use crate::runner::ScenarioResult;
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// Complete export of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunExport {
    /// Seed used
    pub seed: u64,

    /// Delivery jitter bound in milliseconds
    pub jitter_ms: u64,

    pub passed: usize,
    pub failed: usize,

    /// All results, in run order
    pub results: Vec<ScenarioResult>,
}

impl RunExport {
    /// Creates a new export container.
    pub fn new(seed: u64, jitter_ms: u64) -> Self {
        Self {
            seed,
            jitter_ms,
            passed: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    /// Adds a result.
    pub fn add_result(&mut self, result: ScenarioResult) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
