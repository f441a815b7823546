use colored::{control, Colorize};

use crate::core::models::cost::Summary;
use crate::core::models::sla::SlaSummary;

/// Render the cost cross-index as a colored (or plain) string.
///
/// Layout:
/// ```text
///  Monthly costs (refreshed 2026-03-10 09:00 UTC)
///   metanodes            $1,482.00
///     chain-rpc            $912.00
///     dns-anycast          $570.00
///   stakesquid             $760.00
///     dns-anycast          $760.00
///
///  By service
///   chain-rpc              $912.00
///   dns-anycast          $1,330.00
///
///  Total                $2,242.00
/// ```
pub fn render_summary(summary: &Summary, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    let header = format!(
        " Monthly costs (refreshed {})",
        summary.refreshed_at.format("%Y-%m-%d %H:%M UTC")
    );
    lines.push(header.bold().to_string());

    for (name, member) in &summary.members {
        lines.push(format!(
            "  {:<20} {:>12}",
            name.cyan(),
            format_usd(member.total).bold()
        ));
        for (service, cost) in &member.service_costs {
            lines.push(format!("    {:<18} {:>12}", service, format_usd(*cost)));
        }
    }

    lines.push(String::new());
    lines.push(" By service".bold().to_string());
    for (name, service) in &summary.services {
        lines.push(format!(
            "  {:<20} {:>12}",
            name.cyan(),
            format_usd(service.total)
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        " {:<21} {:>12}",
        "Total".bold(),
        format_usd(summary.grand_total()).bold()
    ));

    lines.join("\n")
}

/// Render the per-member SLA table for one month.
pub fn render_sla(sla: &SlaSummary, month: &str, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" SLA report for {month}").bold().to_string());

    if sla.is_empty() {
        lines.push("  No billed member/service pairs this month.".to_string());
        return lines.join("\n");
    }

    for (member, services) in sla {
        lines.push(format!("  {}", member.cyan()));
        for (service, breakdown) in services {
            let verdict = if breakdown.meets_sla {
                "met".green()
            } else {
                "VIOLATED".red().bold()
            };
            lines.push(format!(
                "    {:<18} {:>9} uptime  {:>7} down  {}",
                service,
                format!("{:.4}%", breakdown.uptime_percent),
                format!("{:.2}h", breakdown.hours_down),
                verdict
            ));
        }
    }

    lines.join("\n")
}

fn format_usd(amount: f64) -> String {
    let whole = amount.trunc() as i64;
    let cents = ((amount - amount.trunc()) * 100.0).round().abs() as i64;
    let mut grouped = String::new();
    let digits = whole.abs().to_string();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if whole < 0 { "-" } else { "" };
    format!("${sign}{grouped}.{cents:02}")
}
