//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans,
//! validation results, and handoff receipts in text or JSON.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::handoff::HandoffReceipt;
use crate::planner::{Advisory, DeploymentPlan, ResolvedRole, ResourceKind};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan node row for table display.
#[derive(Tabled)]
struct PlanNodeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Depends on")]
    depends_on: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan, detailed: bool) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\nDeployment Plan: {}", plan.deployment_id().bold());
        let _ = writeln!(output, "   Plan id: {}", plan.plan_id());
        let _ = writeln!(output, "   Request hash: {}", Self::truncate(plan.request_hash(), 8));
        let _ = writeln!(output, "   Region: {}", plan.region());
        let _ = writeln!(output, "   Artifact: {}", plan.artifact().arn);
        let _ = writeln!(output, "   Role: {}\n", Self::format_role(plan.role()));

        let rows: Vec<PlanNodeRow> = plan
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| PlanNodeRow {
                index: i + 1,
                kind: Self::format_kind(node.kind),
                name: node.name.clone(),
                depends_on: node
                    .depends_on
                    .iter()
                    .map(|d| d.target().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if detailed {
            for node in plan.nodes() {
                let _ = writeln!(output, "\n{} {}", node.id.as_str().bold(), node.kind.engine_type());
                for (key, value) in &node.properties {
                    let _ = writeln!(output, "   {key}: {value}");
                }
                for (key, value) in &node.tags {
                    let _ = writeln!(output, "   tag {key}={value}");
                }
            }
        }

        let _ = write!(
            output,
            "\nPlan: {} resources to create\n",
            plan.node_count().to_string().green()
        );
        let _ = writeln!(output, "Endpoint URL: {}", plan.outputs().endpoint_url.cyan());

        if !plan.advisories().is_empty() {
            let _ = write!(output, "\n{} Advisories:\n", "⚠".yellow());
            for advisory in plan.advisories() {
                let line = advisory.to_string();
                let line = match advisory {
                    Advisory::BroadPermission { .. } => line.yellow().to_string(),
                    Advisory::AuditSuppression { .. } => line.dimmed().to_string(),
                };
                let _ = writeln!(output, "   - {line}");
            }
        }

        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Deployment file is valid\n", "✓".green())
                } else {
                    let mut text = format!(
                        "{} {} validation error(s):\n",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(text, "   - {error}");
                    }
                    text
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats a handoff receipt.
    #[must_use]
    pub fn format_receipt(&self, receipt: &HandoffReceipt) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(receipt).unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} Plan {} submitted to {} at {}\n",
                "✓".green(),
                receipt.plan_id,
                receipt.location,
                receipt.submitted_at.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }

    /// Formats the resolved role.
    fn format_role(role: &ResolvedRole) -> String {
        match role {
            ResolvedRole::Reference { arn } => format!("{arn} (existing)"),
            ResolvedRole::Synthesized(definition) => format!(
                "{} (synthesized, {} statements)",
                definition.name,
                definition.statements.len()
            ),
        }
    }

    /// Formats a resource kind with color.
    fn format_kind(kind: ResourceKind) -> String {
        match kind {
            ResourceKind::Role | ResourceKind::EncryptionKey => kind.to_string().yellow().to_string(),
            ResourceKind::SecurityGroup => kind.to_string().blue().to_string(),
            ResourceKind::Model | ResourceKind::EndpointConfig | ResourceKind::Endpoint => {
                kind.to_string().green().to_string()
            }
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentContext, DeploymentRequest, NetworkConfig};
    use crate::planner::{DeploymentPlanner, FixedClock};
    use crate::registry::StaticRegistry;
    use chrono::{TimeZone, Utc};

    async fn plan() -> DeploymentPlan {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 4)
            .single()
            .expect("valid timestamp");
        let request = DeploymentRequest::new(
            "churn",
            DeploymentContext::new("us-east-1", "111122223333"),
            NetworkConfig::new("vpc-1", vec![String::from("subnet-a")]),
        )
        .with_model_package("pkg-1");

        DeploymentPlanner::new(Box::new(StaticRegistry::new()))
            .with_clock(Box::new(FixedClock::new(at)))
            .plan(&request)
            .await
            .expect("plan builds")
    }

    #[tokio::test]
    async fn test_text_plan_lists_nodes_and_advisories() {
        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_plan(&plan().await, false);
        assert!(text.contains("churn-endpoint-20240309070504"));
        assert!(text.contains("6 resources to create"));
        assert!(text.contains("Advisories"));
        assert!(text.contains("/endpoints/churn-endpoint-20240309070504/invocations"));
    }

    #[tokio::test]
    async fn test_json_plan_parses_back() {
        let plan = plan().await;
        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&plan, false);
        let back: DeploymentPlan = serde_json::from_str(&json).expect("valid plan JSON");
        assert_eq!(back, plan);
    }

    #[test]
    fn test_validation_json() {
        let result = ValidationResult::default();
        let json = OutputFormatter::new(OutputFormat::Json).format_validation(&result, true);
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(value["valid"], true);
    }
}
