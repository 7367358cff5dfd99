use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::granularity::Granularity;
use crate::models::{
    AggregationResult, OfficialRecord, RatingEvent, RatingSummary, SectorAverage,
    SectorDefinition,
};

pub fn summarize(
    official: &OfficialRecord,
    events: &[RatingEvent],
    sectors: &[SectorDefinition],
) -> RatingSummary {
    let mut map: HashMap<&str, (usize, i64)> = HashMap::new();

    for event in events {
        let Some(sector) = &event.sector else {
            continue;
        };
        if !sectors.iter().any(|s| s.name == sector.sector_name) {
            continue;
        }
        let entry = map.entry(sector.sector_name.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += sector.rating as i64;
    }

    let mut averages: Vec<SectorAverage> = map
        .into_iter()
        .map(|(name, (count, total))| SectorAverage {
            sector_name: name.to_string(),
            color: sectors
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.color.clone())
                .unwrap_or_default(),
            count,
            average: average(total, count),
        })
        .collect();

    averages.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.sector_name.cmp(&b.sector_name))
    });

    let total: i64 = events.iter().map(|e| e.overall_rating as i64).sum();

    RatingSummary {
        official: official.name.clone(),
        total_ratings: events.len(),
        overall_average: average(total, events.len()),
        sectors: averages,
    }
}

fn average(total: i64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Latest value in the window and its change since the first bucket.
pub fn trend(data: &[i32]) -> Option<(i32, i32)> {
    let first = *data.first()?;
    let last = *data.last()?;
    Some((last, last - first))
}

pub fn render_period(granularity: Granularity, result: &AggregationResult) -> String {
    let mut output = String::new();
    let Some(series) = result.period(granularity) else {
        return output;
    };
    let sectors = result.sectors(granularity);

    let _ = write!(output, "{:<10} {:>7}", "period", "overall");
    if let Some(sectors) = sectors {
        for name in sectors.keys() {
            let _ = write!(output, " {name:>12}");
        }
    }
    let _ = writeln!(output);

    for (index, label) in series.labels.iter().enumerate() {
        let _ = write!(output, "{label:<10} {:>7}", series.data[index]);
        if let Some(sectors) = sectors {
            for sector in sectors.values() {
                let _ = write!(output, " {:>12}", sector.data[index]);
            }
        }
        let _ = writeln!(output);
    }

    output
}

pub fn build_report(
    official: &OfficialRecord,
    now: DateTime<Utc>,
    result: &AggregationResult,
    summary: &RatingSummary,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Approval Report: {}", official.name);
    let _ = writeln!(
        output,
        "{} (generated {})",
        official.office,
        now.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Approval");

    if summary.total_ratings == 0 {
        let _ = writeln!(output, "No ratings recorded yet.");
    } else {
        let _ = writeln!(
            output,
            "- {} ratings, average {:.1}",
            summary.total_ratings, summary.overall_average
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sector Performance");

    if summary.sectors.is_empty() {
        let _ = writeln!(output, "No sector ratings recorded yet.");
    } else {
        for sector in summary.sectors.iter() {
            let _ = writeln!(
                output,
                "- {}: {} ratings (avg {:.1})",
                sector.sector_name, sector.count, sector.average
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");

    for granularity in Granularity::ALL {
        let Some((latest, change)) = result
            .period(granularity)
            .and_then(|series| trend(&series.data))
        else {
            continue;
        };
        let _ = writeln!(
            output,
            "- {}: latest {} ({:+} across the window)",
            granularity, latest, change
        );
    }

    for granularity in Granularity::ALL {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {granularity}");
        let _ = writeln!(output, "```");
        let _ = write!(output, "{}", render_period(granularity, result));
        let _ = writeln!(output, "```");
    }

    output
}
