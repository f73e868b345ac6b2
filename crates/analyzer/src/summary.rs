//! Run summary

use brapi_conformance_common::{AnalysisReport, Level};
use serde::{Deserialize, Serialize};

/// Counts over the reports of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Reports produced, including short-circuited ones
    pub requests: usize,

    /// Answered with 2xx and no report error
    pub succeeded: usize,

    /// Skipped because a prerequisite or variable could not be resolved
    pub pre_execution_failures: usize,

    /// Network or I/O failures
    pub transport_failures: usize,

    /// Refused before sending for lack of authorization
    pub authorization_failures: usize,

    pub cancelled: usize,

    /// Validation findings by level
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[AnalysisReport]) -> Self {
        let mut summary = Self {
            requests: reports.len(),
            ..Self::default()
        };

        for report in reports {
            if report.is_success() {
                summary.succeeded += 1;
            }

            match report.error_key() {
                Some(AnalysisReport::PRE_EXECUTION) => summary.pre_execution_failures += 1,
                Some(AnalysisReport::TRANSPORT) => summary.transport_failures += 1,
                Some(AnalysisReport::AUTHORIZATION) => summary.authorization_failures += 1,
                Some(AnalysisReport::CANCELLED) => summary.cancelled += 1,
                _ => {}
            }

            for message in &report.validation_messages {
                match message.level {
                    Level::Error => summary.errors += 1,
                    Level::Warn => summary.warnings += 1,
                    Level::Info => summary.infos += 1,
                    Level::Ignore => {}
                }
            }
        }

        summary
    }

    /// Share of requests that succeeded (0.0-1.0)
    pub fn success_rate(&self) -> f32 {
        if self.requests == 0 {
            return 0.0;
        }
        self.succeeded as f32 / self.requests as f32
    }

    /// Every request succeeded and no finding reached ERROR
    pub fn is_conformant(&self) -> bool {
        self.requests > 0 && self.succeeded == self.requests && self.errors == 0
    }

    /// Overall verdict as a human-readable string
    pub fn verdict(&self) -> &'static str {
        if self.is_conformant() {
            "CONFORMANT"
        } else if self.cancelled > 0 {
            "INCOMPLETE"
        } else {
            "NON-CONFORMANT"
        }
    }
}
