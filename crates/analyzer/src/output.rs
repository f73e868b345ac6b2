//! Text and JSON rendering of run outcomes

use crate::analyser::AnalysisOutcome;
use crate::summary::RunSummary;
use brapi_conformance_common::{AnalysisReport, Result};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Write as FmtWrite;

/// One line per report, its findings indented below, then the summary
pub fn generate_text(outcome: &AnalysisOutcome) -> Result<String> {
    let mut output = String::new();
    let summary = outcome.summary();

    write_header(&mut output, &summary, outcome.cancelled)?;

    for report in &outcome.reports {
        write_report(&mut output, report)?;
    }

    writeln!(output)?;
    write_summary(&mut output, &summary)?;

    Ok(output)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutcome<'a> {
    generated: String,
    summary: RunSummary,
    #[serde(flatten)]
    outcome: &'a AnalysisOutcome,
}

/// Reports plus summary as pretty JSON
pub fn generate_json(outcome: &AnalysisOutcome) -> Result<String> {
    let document = JsonOutcome {
        generated: Utc::now().to_rfc3339(),
        summary: outcome.summary(),
        outcome,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

fn write_header(output: &mut String, summary: &RunSummary, cancelled: bool) -> Result<()> {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    writeln!(output, "# BrAPI Conformance Analysis")?;
    writeln!(output, "# Generated: {timestamp}")?;
    writeln!(output, "# Verdict: {}", summary.verdict())?;
    if cancelled {
        writeln!(output, "# Run was cancelled before all requests completed")?;
    }
    writeln!(output)?;

    Ok(())
}

fn write_report(output: &mut String, report: &AnalysisReport) -> Result<()> {
    let request = &report.request;
    let outcome = match (&report.error, report.status_code) {
        (Some(error), _) => format!("{} [{}]", error.key, error.level),
        (None, Some(status)) => status.to_string(),
        (None, None) => "-".to_string(),
    };
    let elapsed = (report.end_time - report.start_time).num_milliseconds();

    writeln!(
        output,
        "{:<40} {:<7} {} -> {} ({elapsed} ms)",
        request.name,
        request.method,
        report.uri.as_deref().unwrap_or(&request.path_template),
        outcome
    )?;

    if let Some(error) = &report.error {
        writeln!(output, "    {}", error.message)?;
    }
    for message in &report.validation_messages {
        writeln!(
            output,
            "    {} {}: {}",
            message.level, message.key, message.message
        )?;
    }

    Ok(())
}

fn write_summary(output: &mut String, summary: &RunSummary) -> Result<()> {
    writeln!(output, "Summary:")?;
    writeln!(
        output,
        "  Requests: {} ({} succeeded, {:.0}%)",
        summary.requests,
        summary.succeeded,
        summary.success_rate() * 100.0
    )?;
    writeln!(
        output,
        "  Pre-execution failures: {}",
        summary.pre_execution_failures
    )?;
    writeln!(
        output,
        "  Transport failures: {}",
        summary.transport_failures
    )?;
    if summary.authorization_failures > 0 {
        writeln!(
            output,
            "  Authorization failures: {}",
            summary.authorization_failures
        )?;
    }
    writeln!(
        output,
        "  Findings: {} errors, {} warnings, {} info",
        summary.errors, summary.warnings, summary.infos
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brapi_conformance_common::{
        ApiRequest, HttpMethod, Level, ReportError, RequestKind, ValidationMessage,
    };

    fn request(name: &str, path: &str) -> ApiRequest {
        ApiRequest {
            name: name.to_string(),
            kind: RequestKind::List,
            index: 10,
            entity_name: Some("Study".to_string()),
            method: HttpMethod::Get,
            path_template: path.to_string(),
            path_parameters: vec![],
            query_parameters: vec![],
            body: None,
            cache_variables: vec![],
            prerequisites: vec![],
        }
    }

    fn outcome() -> AnalysisOutcome {
        let now = Utc::now();
        AnalysisOutcome {
            reports: vec![
                AnalysisReport::completed(
                    request("List Study", "/studies"),
                    "http://localhost/brapi/v2/studies".to_string(),
                    now,
                    now,
                    200,
                    vec![ValidationMessage::new(
                        "validation.response.body.schema",
                        Level::Error,
                        "/result: \"data\" is a required property",
                    )],
                ),
                AnalysisReport::failed(
                    request("Get Study", "/studies/{studyDbId}"),
                    None,
                    now,
                    ReportError {
                        key: AnalysisReport::PRE_EXECUTION.to_string(),
                        level: Level::Warn,
                        message: "Unresolved variables for Get Study: {studyDbId}".to_string(),
                    },
                ),
            ],
            cancelled: false,
        }
    }

    #[test]
    fn test_generate_text() {
        let text = generate_text(&outcome()).unwrap();

        assert!(text.contains("# Verdict: NON-CONFORMANT"));
        assert!(text.contains("http://localhost/brapi/v2/studies -> 200"));
        assert!(text.contains("ERROR validation.response.body.schema"));
        assert!(text.contains("/studies/{studyDbId} -> Pre-Execution [WARN]"));
        assert!(text.contains("Unresolved variables for Get Study: {studyDbId}"));
        assert!(text.contains("Requests: 2 (1 succeeded, 50%)"));
        assert!(!text.contains("Authorization failures"));
    }

    #[test]
    fn test_generate_json() {
        let json = generate_json(&outcome()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["cancelled"], false);
        assert_eq!(value["summary"]["requests"], 2);
        assert_eq!(value["summary"]["preExecutionFailures"], 1);
        assert_eq!(value["reports"][0]["statusCode"], 200);
        assert_eq!(value["reports"][1]["error"]["key"], "Pre-Execution");
        assert_eq!(
            value["reports"][1]["request"]["pathTemplate"],
            "/studies/{studyDbId}"
        );
    }
}
