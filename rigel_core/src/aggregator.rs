//! Verdict aggregation across every bridge of a run.

use crate::bridge::BridgeConnection;
use serde::Serialize;
use std::fmt;

/// Fans in requirement statuses from all bridge connections.
#[derive(Default)]
pub struct RequirementsAggregator {
    bridges: Vec<BridgeConnection>,
}

impl RequirementsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bridge; its statuses join the verdict in registration order.
    pub fn push(&mut self, bridge: BridgeConnection) {
        self.bridges.push(bridge);
    }

    pub fn bridges(&self) -> &[BridgeConnection] {
        &self.bridges
    }

    pub fn connection_count(&self) -> usize {
        self.bridges.len()
    }

    /// Total requirements registered, breakpoints included.
    pub fn requirement_count(&self) -> usize {
        self.bridges.iter().map(|b| b.statuses().len()).sum()
    }

    /// True iff at least one non-breakpoint requirement is registered and
    /// every one of them is satisfied.
    ///
    /// With no bridges, or with breakpoints only, this is false, so such a
    /// run is governed by its breakpoints and timeout instead of succeeding
    /// vacuously.
    pub fn all_satisfied(&self) -> bool {
        let mut requirements = self
            .bridges
            .iter()
            .flat_map(|b| b.statuses())
            .filter(|s| !s.is_breakpoint())
            .peekable();
        requirements.peek().is_some() && requirements.all(|s| s.is_satisfied())
    }

    /// True iff at least one bridge exists and any breakpoint is satisfied.
    pub fn any_breakpoint_satisfied(&self) -> bool {
        !self.bridges.is_empty()
            && self
                .bridges
                .iter()
                .flat_map(|b| b.statuses())
                .any(|s| s.is_breakpoint() && s.is_satisfied())
    }

    /// Snapshots every status into a report.
    pub fn report(&self) -> Report {
        let mut report = Report::default();
        for status in self.bridges.iter().flat_map(|b| b.statuses()) {
            let entry = ReportEntry {
                satisfied: status.is_satisfied(),
                description: status.requirement().describe(),
            };
            if status.is_breakpoint() {
                report.breakpoints.push(entry);
            } else {
                report.requirements.push(entry);
            }
        }
        report
    }

    /// Closes every live bridge connection.
    pub async fn close_all(&mut self) {
        for bridge in &mut self.bridges {
            bridge.close().await;
        }
    }
}

/// One report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub satisfied: bool,
    pub description: String,
}

/// Final verdict per requirement, split into requirements and breakpoints.
///
/// `Display` renders the stable text block external tooling greps:
///
/// ```text
/// REQUIREMENTS:
///  - /state (std_msgs/String) - state EQUALS done	...	SUCCESS
///
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub requirements: Vec<ReportEntry>,
    pub breakpoints: Vec<ReportEntry>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.breakpoints.is_empty()
    }

    /// Number of FAILURE lines under REQUIREMENTS.
    pub fn failed_requirements(&self) -> usize {
        self.requirements.iter().filter(|e| !e.satisfied).count()
    }

    fn write_section(
        f: &mut fmt::Formatter<'_>,
        label: &str,
        entries: &[ReportEntry],
    ) -> fmt::Result {
        if entries.is_empty() {
            return Ok(());
        }
        writeln!(f, "{}:", label)?;
        for entry in entries {
            let verdict = if entry.satisfied { "SUCCESS" } else { "FAILURE" };
            writeln!(f, " - {}\t...\t{}", entry.description, verdict)?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::write_section(f, "REQUIREMENTS", &self.requirements)?;
        Self::write_section(f, "BREAKPOINTS", &self.breakpoints)
    }
}
