use driftmgr_core::Resource;
use driftmgr_drift::DriftSummary;
use driftmgr_executor::ModuleExecResult;

/// Render discovered resources as a plain-text table.
pub fn render_resources(resources: &[Resource]) -> String {
    if resources.is_empty() {
        return "No resources discovered.\n".to_string();
    }
    let mut out = String::new();
    for r in resources {
        out.push_str(&format!("{:<12} {:<28} {:<24} {}\n", r.provider, r.resource_type, r.id, r.name));
    }
    out
}

/// Render a drift summary the way an operator would scan it: headline
/// totals first, then the drifted resources ranked by how often they drift.
pub fn render_drift_summary(summary: &DriftSummary) -> String {
    let a = &summary.analysis;
    let total_drifts = a.missing + a.extra + a.modified;
    let mut out = String::new();
    out.push_str(&format!(
        "state={} live={} drifted={} compliance={:.1}%\n",
        a.total_state_resources, a.total_live_resources, total_drifts, summary.compliance_rate
    ));
    out.push_str(&format!("  missing={} extra={} modified={}\n", a.missing, a.extra, a.modified));

    if !summary.top_drifted.is_empty() {
        out.push_str("\nTop drifted resources:\n");
        for (i, top) in summary.top_drifted.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} ({}) — {} detection(s), last at {}\n",
                i + 1,
                top.resource_name,
                top.resource_id,
                top.drift_count,
                top.most_recent_detection
            ));
        }
    }

    if !summary.trend.is_empty() {
        out.push_str("\nTrend:\n");
        for point in &summary.trend {
            out.push_str(&format!(
                "  {} total={} drifted={} ({:.1}%) new={} resolved={}\n",
                point.date, point.total, point.drifted, point.drift_percentage, point.new, point.resolved
            ));
        }
    }
    out
}

/// Render executor results grouped by outcome, mirroring how `terragrunt
/// run-all` itself prints a trailing summary line per module.
pub fn render_exec_results(results: &[ModuleExecResult]) -> String {
    let mut out = String::new();
    for r in results {
        let plan = r
            .plan_summary
            .map(|p| format!(" [{} to add, {} to change, {} to destroy]", p.to_add, p.to_change, p.to_destroy))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<10} {} (exit={:?}, attempts={}){}\n",
            format!("{:?}", r.status).to_lowercase(),
            r.module_path,
            r.exit_code,
            r.attempts,
            plan
        ));
        if let Some(err) = &r.error {
            out.push_str(&format!("             {}\n", err));
        }
    }
    out
}
