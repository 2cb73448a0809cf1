//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use catsim_core::model::{Trajectory, MAX_ABILITY, MIN_ABILITY};
use catsim_core::report::SimulationReport;

/// Sessions beyond this many are listed in the results table only.
const MAX_DETAILED_SESSIONS: usize = 50;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Fixed-precision number, with infinities spelled out.
fn num(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "∞".to_string()
    } else if value == f64::NEG_INFINITY {
        "-∞".to_string()
    } else {
        format!("{value:.precision$}")
    }
}

/// Generate an HTML report from a simulation report.
pub fn generate_html(report: &SimulationReport) -> String {
    let settings = &report.settings;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>catsim report {}</title>\n",
        html_escape(&report.id.to_string())
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>catsim report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">{} sessions | {} items | {} | {} | seed {} | {}</p>\n",
        report.trajectories.len(),
        settings.pool.len(),
        settings.method.to_string().to_uppercase(),
        html_escape(&settings.stopping_rule.to_string()),
        settings.seed,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    match &report.aggregate {
        Some(stats) => {
            html.push_str("<table class=\"summary\">\n");
            html.push_str("<thead><tr><th>Sessions</th><th>Bias</th><th>RMSE</th><th>MAE</th><th>Correlation</th><th>Avg Items</th><th>Avg SE</th></tr></thead>\n");
            html.push_str(&format!(
                "<tbody><tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></tbody>\n",
                stats.examinee_count,
                num(stats.bias, 3),
                num(stats.rmse, 3),
                num(stats.mae, 3),
                stats
                    .correlation
                    .map(|r| num(r, 3))
                    .unwrap_or_else(|| "n/a".to_string()),
                num(stats.avg_items, 1),
                num(stats.avg_se, 3),
            ));
            html.push_str("</table>\n");
        }
        None => html.push_str("<p>No sessions were run.</p>\n"),
    }

    let reasons = report.stop_reason_counts();
    if !reasons.is_empty() {
        html.push_str("<p class=\"meta\">Stop reasons: ");
        let parts: Vec<String> = reasons
            .iter()
            .map(|(reason, count)| format!("{reason} ({count})"))
            .collect();
        html.push_str(&html_escape(&parts.join(", ")));
        html.push_str("</p>\n");
    }

    if !report.trajectories.is_empty() {
        html.push_str("<h3>Estimation error per session</h3>\n");
        html.push_str(&generate_error_chart(&report.trajectories));
    }

    if report.conditional.len() < report.trajectories.len() {
        html.push_str("<h3>By true ability</h3>\n");
        html.push_str("<table class=\"summary\">\n");
        html.push_str("<thead><tr><th>True θ</th><th>Replications</th><th>Mean Estimate</th><th>Bias</th><th>MSE</th><th>Avg Items</th></tr></thead>\n<tbody>\n");
        for c in &report.conditional {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                num(c.true_ability, 2),
                c.replications,
                num(c.mean_estimate, 3),
                num(c.bias, 3),
                num(c.mse, 3),
                num(c.avg_items, 1),
            ));
        }
        html.push_str("</tbody></table>\n");
    }
    html.push_str("</section>\n");

    // Per-session results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Results</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">#</th><th onclick=\"sortTable(1)\">True θ</th><th onclick=\"sortTable(2)\">Estimate</th><th onclick=\"sortTable(3)\">SE</th><th onclick=\"sortTable(4)\">Items</th><th onclick=\"sortTable(5)\">Error</th><th onclick=\"sortTable(6)\">Stop</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for (idx, t) in report.trajectories.iter().enumerate() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            idx + 1,
            num(t.true_ability, 3),
            num(t.final_estimate, 3),
            num(t.final_se, 3),
            t.items_administered,
            num(t.error(), 3),
            html_escape(&t.stop_reason.to_string()),
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Step-by-step detail
    if !report.trajectories.is_empty() {
        html.push_str("<section class=\"sessions\">\n");
        html.push_str("<h2>Sessions</h2>\n");
        for (idx, t) in report
            .trajectories
            .iter()
            .enumerate()
            .take(MAX_DETAILED_SESSIONS)
        {
            html.push_str(&session_detail(idx + 1, t));
        }
        if report.trajectories.len() > MAX_DETAILED_SESSIONS {
            html.push_str(&format!(
                "<p class=\"meta\">{} more sessions omitted; see the raw data below.</p>\n",
                report.trajectories.len() - MAX_DETAILED_SESSIONS
            ));
        }
        html.push_str("</section>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &SimulationReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn session_detail(number: usize, t: &Trajectory) -> String {
    let mut out = format!(
        "<details>\n<summary>Session {number} (θ = {}, estimate {} ± {}, {} items)</summary>\n",
        num(t.true_ability, 2),
        num(t.final_estimate, 3),
        num(t.final_se, 3),
        t.items_administered
    );
    out.push_str(&generate_progress_chart(t));
    out.push_str("<table>\n<thead><tr><th>Step</th><th>Item</th><th>Difficulty</th><th>Response</th><th>Estimate</th><th>SE</th><th>Fisher Info</th></tr></thead>\n<tbody>\n");
    for step in t.administered_steps() {
        let (class, response) = match step.response {
            Some(1) => ("pass", "correct"),
            Some(_) => ("fail", "incorrect"),
            None => ("", "-"),
        };
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{class}\">{response}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            step.step,
            step.item_id.map(|id| id.to_string()).unwrap_or_default(),
            step.difficulty.map(|d| num(d, 2)).unwrap_or_default(),
            num(step.ability_estimate, 3),
            num(step.standard_error, 3),
            num(step.fisher_info, 3),
        ));
    }
    out.push_str("</tbody></table>\n</details>\n");
    out
}

/// Horizontal bars of (estimate - true) per session, centred on zero.
fn generate_error_chart(trajectories: &[Trajectory]) -> String {
    let bar_height = 14;
    let padding = 4;
    let label_width = 60;
    let half_width = 250.0;

    let max_abs = trajectories
        .iter()
        .map(|t| t.error().abs())
        .fold(0.0_f64, f64::max)
        .max(0.1);

    let total_height = trajectories.len() * (bar_height + padding) + padding;
    let centre = label_width as f64 + half_width;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + 2 * half_width as usize + 70,
        total_height
    );
    svg.push_str(&format!(
        "  <line x1=\"{centre}\" y1=\"0\" x2=\"{centre}\" y2=\"{total_height}\" stroke=\"currentColor\" stroke-width=\"1\"/>\n"
    ));

    for (i, t) in trajectories.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let error = t.error();
        let width = error.abs() / max_abs * half_width;
        let x = if error < 0.0 { centre - width } else { centre };

        let color = if error.abs() <= 0.3 {
            "#22c55e"
        } else if error.abs() <= 0.8 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 8,
            y + bar_height / 2,
            i + 1
        ));
        svg.push_str(&format!(
            "  <rect x=\"{x:.1}\" y=\"{y}\" width=\"{width:.1}\" height=\"{bar_height}\" fill=\"{color}\" rx=\"2\"/>\n"
        ));
        let label_x = if error < 0.0 { centre + 6.0 } else { centre + width + 6.0 };
        svg.push_str(&format!(
            "  <text x=\"{label_x:.1}\" y=\"{}\" font-size=\"10\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            y + bar_height / 2,
            num(error, 2)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Ability estimate by step, with the true ability as a dashed reference line.
fn generate_progress_chart(t: &Trajectory) -> String {
    let width = 480.0;
    let height = 200.0;
    let margin = 30.0;

    let steps = t.progression.len().max(2) - 1;
    let x_at = |step: usize| margin + step as f64 / steps as f64 * (width - 2.0 * margin);
    let y_at = |theta: f64| {
        let clamped = theta.clamp(MIN_ABILITY, MAX_ABILITY);
        margin + (MAX_ABILITY - clamped) / (MAX_ABILITY - MIN_ABILITY) * (height - 2.0 * margin)
    };

    let mut svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n"
    );
    let zero = y_at(0.0);
    svg.push_str(&format!(
        "  <line x1=\"{margin}\" y1=\"{zero:.1}\" x2=\"{}\" y2=\"{zero:.1}\" stroke=\"#9ca3af\" stroke-width=\"1\"/>\n",
        width - margin
    ));
    let truth = y_at(t.true_ability);
    svg.push_str(&format!(
        "  <line x1=\"{margin}\" y1=\"{truth:.1}\" x2=\"{}\" y2=\"{truth:.1}\" stroke=\"#ef4444\" stroke-dasharray=\"4 4\"/>\n",
        width - margin
    ));

    let points: Vec<String> = t
        .progression
        .iter()
        .map(|s| format!("{:.1},{:.1}", x_at(s.step), y_at(s.ability_estimate)))
        .collect();
    svg.push_str(&format!(
        "  <polyline points=\"{}\" fill=\"none\" stroke=\"#2563eb\" stroke-width=\"2\"/>\n",
        points.join(" ")
    ));
    for s in &t.progression {
        svg.push_str(&format!(
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"#2563eb\"/>\n",
            x_at(s.step),
            y_at(s.ability_estimate)
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.4rem 0.8rem; text-align: right; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  const key = (cell) => {
    const n = parseFloat(cell.textContent.replace('∞', 'Infinity'));
    return isNaN(n) ? cell.textContent : n;
  };
  rows.sort((a, b) => {
    const va = key(a.cells[col]);
    const vb = key(b.cells[col]);
    const cmp = typeof va === 'number' && typeof vb === 'number' ? va - vb : String(va).localeCompare(String(vb));
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use catsim_core::model::{
        EstimationMethod, ItemPool, ProgressionStep, StopReason, StoppingRule,
    };
    use catsim_core::report::SimulationSettings;
    use catsim_core::statistics::{compute_aggregate_stats, compute_conditional_stats};

    fn make_test_report(trajectories: Vec<Trajectory>) -> SimulationReport {
        SimulationReport {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            settings: SimulationSettings {
                pool: ItemPool::from_difficulties(&[-1.0, 0.0, 1.0]).unwrap(),
                method: EstimationMethod::Mle,
                stopping_rule: StoppingRule::FixedLength { length: 2 },
                seed: 42,
                replications: 1,
                parallelism: 4,
            },
            aggregate: compute_aggregate_stats(&trajectories),
            conditional: compute_conditional_stats(&trajectories),
            trajectories,
            duration_ms: 5,
        }
    }

    fn trajectory(true_ability: f64, final_estimate: f64, final_se: f64) -> Trajectory {
        let step = ProgressionStep {
            step: 1,
            item_id: Some(2),
            difficulty: Some(0.0),
            response: Some(1),
            ability_estimate: final_estimate,
            standard_error: final_se,
            fisher_info: 0.2,
            cumulative_fisher_info: 0.2,
            test_information: 0.2,
        };
        Trajectory {
            true_ability,
            final_estimate,
            final_se,
            items_administered: 1,
            stop_reason: StopReason::FixedLengthReached,
            seed: Some(42),
            progression: vec![ProgressionStep::initial(), step],
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report(vec![trajectory(0.7, 1.2, 0.9), trajectory(-0.5, -0.4, 1.1)]);
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("catsim report"));
        assert!(html.contains("fixed-length(2)"));
        assert!(html.contains("Session 2"));
        assert!(html.contains("<svg"));
        assert!(html.contains("fixed length reached (2)"));
        // No replications, so no per-ability table.
        assert!(!html.contains("By true ability"));
    }

    #[test]
    fn infinite_se_is_rendered() {
        let report = make_test_report(vec![trajectory(0.0, 0.0, f64::INFINITY)]);
        let html = generate_html(&report);
        assert!(html.contains("∞"));
        assert!(html.contains("n/a"));
    }

    #[test]
    fn replicated_report_has_conditional_table() {
        let report = make_test_report(vec![trajectory(0.5, 0.7, 0.9), trajectory(0.5, 0.1, 0.9)]);
        assert!(generate_html(&report).contains("By true ability"));
    }

    #[test]
    fn empty_report_renders() {
        let report = make_test_report(vec![]);
        let html = generate_html(&report);
        assert!(html.contains("No sessions were run."));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report(vec![trajectory(0.7, 1.2, 0.9)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html_report(&report, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }

    #[test]
    fn escaping() {
        assert_eq!(html_escape("<a & 'b'>"), "&lt;a &amp; &#x27;b&#x27;&gt;");
        assert_eq!(num(f64::NEG_INFINITY, 2), "-∞");
        assert_eq!(num(0.12345, 3), "0.123");
    }
}
