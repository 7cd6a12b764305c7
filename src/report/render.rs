use std::fmt::Write;

use super::{Ranked, Report};

const BAR_WIDTH: usize = 40;

/// Horizontal bar chart, bars scaled to the largest value.
pub fn bar_chart(title: &str, rows: &[(String, f64)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(title.chars().count()));
    if rows.is_empty() {
        let _ = writeln!(out, "  (no data)");
        return out;
    }

    let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0).min(32);
    let max = rows.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    for (label, value) in rows {
        let len = if max > 0.0 {
            ((value / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "  {:<width$} | {:<bar$} {}",
            truncate(label, label_width),
            "#".repeat(len),
            format_value(*value),
            width = label_width,
            bar = BAR_WIDTH,
        );
    }
    out
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn ranked_rows(items: &[Ranked]) -> Vec<(String, f64)> {
    items.iter().map(|r| (r.name.clone(), r.count as f64)).collect()
}

pub fn print_report(report: &Report) {
    println!(
        "{} records ({} without a usable date)\n",
        report.records, report.undated
    );

    let per_year: Vec<_> = report
        .crashes_per_year
        .iter()
        .map(|(y, n)| (y.to_string(), *n as f64))
        .collect();
    println!("{}", bar_chart("Crashes Over Time", &per_year));

    let fatalities: Vec<_> = report
        .fatalities_per_year
        .iter()
        .map(|(y, n)| (y.to_string(), *n as f64))
        .collect();
    println!("{}", bar_chart("Total Fatalities Per Year", &fatalities));

    println!(
        "{}",
        bar_chart("Top 10 Locations with Most Crashes", &ranked_rows(&report.top_locations))
    );
    println!(
        "{}",
        bar_chart("Top 10 Operators with Most Crashes", &ranked_rows(&report.top_operators))
    );

    let survival: Vec<_> = report
        .survival_histogram
        .iter()
        .map(|b| (format!("{:>6.1}-{:<6.1}", b.start, b.end), b.count as f64))
        .collect();
    println!("{}", bar_chart("Distribution of Survival Rates (%)", &survival));

    let categories: Vec<_> = report
        .category_counts
        .iter()
        .map(|(c, n)| (c.label().to_string(), *n as f64))
        .collect();
    println!("{}", bar_chart("Crash Categories", &categories));

    println!("Worst Disasters");
    println!("---------------");
    println!(
        "{:>3} | {:<19} | {:<28} | {:>5} | {}",
        "#", "DateTime", "Location", "Dead", "Summary"
    );
    for (i, crash) in report.worst_crashes.iter().enumerate() {
        println!(
            "{:>3} | {:<19} | {:<28} | {:>5} | {}",
            i + 1,
            crash.datetime.as_deref().unwrap_or("-"),
            truncate(&crash.location, 28),
            crash.fatalities,
            truncate(&crash.summary, 60),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_scale_to_largest_value() {
        let chart = bar_chart(
            "Crashes",
            &[("1970".into(), 4.0), ("1971".into(), 2.0), ("1972".into(), 0.0)],
        );
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0], "Crashes");
        assert_eq!(lines[1], "-------");
        assert_eq!(lines[2].matches('#').count(), BAR_WIDTH);
        assert_eq!(lines[3].matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(lines[4].matches('#').count(), 0);
        assert!(lines[2].ends_with(" 4"));
    }

    #[test]
    fn empty_chart() {
        assert!(bar_chart("Nothing", &[]).contains("(no data)"));
    }

    #[test]
    fn long_labels_are_truncated() {
        assert_eq!(truncate("Al Qaysumah, Saudi Arabia", 10), "Al Qays...");
        assert_eq!(truncate("Lima", 10), "Lima");
        assert_eq!(format_value(1.5), "1.50");
        assert_eq!(format_value(3.0), "3");
    }

    #[test]
    fn renders_report_without_panicking() {
        use crate::report::tests::record;
        let report = crate::report::build(&[
            record(Some(1999), "Lima, Peru", "Faucett", 10, 2, "storm"),
            record(None, "Unknown", "Unknown Operator", 0, 0, ""),
        ]);
        print_report(&report);
    }
}
