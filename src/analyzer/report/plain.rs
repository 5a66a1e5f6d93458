//! Plain text formatter.

use super::{Report, SectionReport};
use crate::analyzer::issues::{Issues, Severity, ROOT_GROUP};
use colored::{ColoredString, Colorize};

/// Format a report as colored plain text.
pub fn format(report: &Report, level: Severity) -> String {
    let mut output = String::new();

    for section in &report.sections {
        format_section(&mut output, section, level);
    }

    output.push_str(&format!("{}\n", "─".repeat(60).dimmed()));
    output.push_str(&format!(
        "{} {} {}\n",
        "▶".bright_blue(),
        "SCORE".bright_white().bold(),
        format!("{}% ({})", report.score, report.grade).bold()
    ));
    output
}

fn format_section(output: &mut String, section: &SectionReport, level: Severity) {
    let tally = &section.tally;
    output.push_str(&format!(
        "\n{} {} ({} scanned)  {} {} {} {}  {}%\n",
        "▶".bright_blue(),
        section.section.name().to_uppercase().bright_white().bold(),
        tally.total(),
        paint(Severity::Error, &format!("E:{}", tally.error)),
        paint(Severity::Warn, &format!("W:{}", tally.warn)),
        paint(Severity::Info, &format!("I:{}", tally.info)),
        paint(Severity::Ok, &format!("OK:{}", tally.ok)),
        tally.score,
    ));

    if tally.is_empty() {
        output.push_str(&format!("  {}\n", "Nothing to report.".dimmed()));
        return;
    }

    for id in section.outcome.sorted_ids() {
        let Some(issues) = section.outcome.get(id) else {
            continue;
        };
        let max = issues.max_severity();
        if max < level {
            continue;
        }
        output.push_str(&format!(
            "  {} {} {}\n",
            paint(max, marker(max)),
            id,
            paint(max, max.as_str())
        ));
        format_issues(output, &issues.sort(level));
    }
}

fn format_issues(output: &mut String, issues: &Issues) {
    for (group, issues) in issues.group() {
        let indent = if group == ROOT_GROUP {
            "    "
        } else {
            output.push_str(&format!("    {} {}\n", "◆".dimmed(), group.bold()));
            "      "
        };
        for issue in &issues {
            output.push_str(&format!(
                "{}{} {}\n",
                indent,
                paint(issue.severity, marker(issue.severity)),
                issue.message
            ));
        }
    }
}

fn marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "✓",
        Severity::Info => "i",
        Severity::Warn => "!",
        Severity::Error => "✗",
    }
}

fn paint(severity: Severity, text: &str) -> ColoredString {
    match severity {
        Severity::Ok => text.green(),
        Severity::Info => text.bright_blue(),
        Severity::Warn => text.yellow(),
        Severity::Error => text.red().bold(),
    }
}
