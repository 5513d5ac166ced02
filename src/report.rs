use std::collections::HashMap;
use std::fmt::Write;

use serde_json::json;
use serde_sarif::sarif::{
    Artifact, Invocation, Location, LogicalLocation, Message, MultiformatMessageString,
    ReportingDescriptor, Result as SarifResult, Run, SCHEMA_URL, Sarif, Tool, ToolComponent,
};

use crate::engine::AnalysisContext;
use crate::ir::Method;
use crate::pattern::PatternInfo;

const TOOL_NAME: &str = "nanoscope";

/// Build a SARIF log with one rule per catalog pattern and one result per
/// (method, matched pattern).
pub fn build_sarif(
    context: &AnalysisContext,
    artifacts: Vec<Artifact>,
    invocation: Invocation,
) -> Sarif {
    let rules: Vec<ReportingDescriptor> = context.catalog().infos().map(rule_descriptor).collect();
    let driver = ToolComponent::builder()
        .name(TOOL_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .rules(rules)
        .build();
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let results = pattern_results(context);
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}

fn rule_descriptor(info: &PatternInfo) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(info.name)
        .name(info.name)
        .short_description(
            MultiformatMessageString::builder()
                .text(info.description)
                .build(),
        )
        .full_description(
            MultiformatMessageString::builder()
                .text(format!("{} ({})", info.description, info.category.as_str()))
                .build(),
        )
        .build()
}

fn pattern_results(context: &AnalysisContext) -> Vec<SarifResult> {
    let summaries = context.analyze();
    let mut results = Vec::new();
    for (method, summary) in context.methods().zip(&summaries) {
        for name in &summary.simple {
            results.push(pattern_result(
                method,
                name,
                format!("{} is {name}", summary.key),
            ));
        }
        for (name, count) in tally(&summary.advanced) {
            results.push(pattern_result(
                method,
                name,
                format!("{} is {name} ({count} matching instructions)", summary.key),
            ));
        }
    }
    results
}

/// Distinct names with their occurrence counts, in first-seen order.
fn tally(names: &[&'static str]) -> Vec<(&'static str, usize)> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for &name in names {
        let position = *first_seen.entry(name).or_insert_with(|| {
            counts.push((name, 0));
            counts.len() - 1
        });
        counts[position].1 += 1;
    }
    counts
}

fn pattern_result(method: &Method, rule_id: &str, message: String) -> SarifResult {
    SarifResult::builder()
        .rule_id(rule_id)
        .message(result_message(message))
        .locations(vec![method_location(method)])
        .build()
}

pub(crate) fn method_location(method: &Method) -> Location {
    let logical = LogicalLocation::builder()
        .name(method.key())
        .kind("function")
        .build();
    Location::builder().logical_locations(vec![logical]).build()
}

pub(crate) fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}

/// Plain-text dump of every method's expression forest.
///
/// Methods whose tree cannot be assembled are listed with the error and skipped.
pub fn render_forests(context: &AnalysisContext) -> String {
    let mut out = String::new();
    for method in context.methods() {
        let _ = writeln!(out, "{}", method.key());
        let tree = match context.expression_forest(method) {
            Ok(tree) => tree,
            Err(err) => {
                log::warn!("skipping {}: {err}", method.key());
                let _ = writeln!(out, "  ! {err}");
                continue;
            }
        };
        for root in tree.roots() {
            for line in tree.outline(*root).lines() {
                let _ = writeln!(out, "  {line}");
            }
            if let Ok(source) = tree.decompile(*root) {
                let _ = writeln!(out, "  = {source}");
            }
        }
    }
    out
}
