//! Time-bucketed rating aggregation.
//!
//! Turns the full rating history of one official into the four chart
//! windows, each with an overall series and one series per configured
//! sector. Empty buckets carry the previous bucket's value forward so a
//! quiet hour or month never shows up as a drop to zero.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::granularity::Granularity;
use crate::models::{AggregationResult, RatingEvent, SectorDefinition, SectorSeries, TimeSeries};

#[derive(Debug, Clone, Copy, Default)]
struct BucketTotal {
    sum: i64,
    count: u32,
}

impl BucketTotal {
    fn add(&mut self, rating: i32) {
        self.sum += rating as i64;
        self.count += 1;
    }

    fn average(&self) -> Option<i32> {
        if self.count == 0 {
            None
        } else {
            Some((self.sum as f64 / self.count as f64).round() as i32)
        }
    }
}

/// Rating history and sector list for one official, as handed to
/// [`aggregate_many`].
#[derive(Debug, Clone)]
pub struct OfficialRatings {
    pub official_id: Uuid,
    pub events: Vec<RatingEvent>,
    pub sectors: Vec<SectorDefinition>,
}

pub fn aggregate(
    events: &[RatingEvent],
    sectors: &[SectorDefinition],
    now: DateTime<Utc>,
) -> AggregationResult {
    let sectors = distinct_sectors(sectors);

    if events.is_empty() {
        return empty_result(&sectors, now);
    }

    let mut ordered: Vec<&RatingEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.created_at);

    let mut periods = BTreeMap::new();
    let mut sector_data = BTreeMap::new();

    for granularity in Granularity::ALL {
        let buckets = granularity.bucket_count();
        let mut overall = vec![BucketTotal::default(); buckets];
        let mut by_sector: BTreeMap<&str, Vec<BucketTotal>> = sectors
            .iter()
            .map(|sector| (sector.name.as_str(), vec![BucketTotal::default(); buckets]))
            .collect();

        for event in &ordered {
            let Some(index) = granularity.bucket_index(event.created_at, now) else {
                continue;
            };

            overall[index].add(event.overall_rating);

            if let Some(sector) = &event.sector {
                if let Some(totals) = by_sector.get_mut(sector.sector_name.as_str()) {
                    totals[index].add(sector.rating);
                }
            }
        }

        periods.insert(
            granularity,
            TimeSeries {
                labels: granularity.labels(now),
                data: forward_fill(&overall),
            },
        );

        let series = sectors
            .iter()
            .map(|sector| {
                let data = forward_fill(&by_sector[sector.name.as_str()]);
                (sector.name.clone(), sector_series(sector, data))
            })
            .collect();
        sector_data.insert(granularity, series);
    }

    AggregationResult {
        periods,
        sector_data,
    }
}

/// Aggregates several officials concurrently on the blocking pool.
pub async fn aggregate_many(
    inputs: Vec<OfficialRatings>,
    now: DateTime<Utc>,
) -> anyhow::Result<BTreeMap<Uuid, AggregationResult>> {
    let mut tasks = JoinSet::new();

    for input in inputs {
        tasks.spawn_blocking(move || {
            let result = aggregate(&input.events, &input.sectors, now);
            (input.official_id, result)
        });
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (official_id, result) = joined.context("aggregation task failed")?;
        results.insert(official_id, result);
    }

    Ok(results)
}

fn empty_result(sectors: &[&SectorDefinition], now: DateTime<Utc>) -> AggregationResult {
    let mut periods = BTreeMap::new();
    let mut sector_data = BTreeMap::new();

    for granularity in Granularity::ALL {
        let buckets = granularity.bucket_count();
        periods.insert(
            granularity,
            TimeSeries {
                labels: granularity.empty_labels(now),
                data: vec![0; buckets],
            },
        );
        sector_data.insert(
            granularity,
            sectors
                .iter()
                .map(|sector| (sector.name.clone(), sector_series(sector, vec![0; buckets])))
                .collect(),
        );
    }

    AggregationResult {
        periods,
        sector_data,
    }
}

/// Single left-to-right pass: an empty bucket repeats the previous value,
/// an empty first bucket is zero.
fn forward_fill(totals: &[BucketTotal]) -> Vec<i32> {
    let mut values = Vec::with_capacity(totals.len());
    let mut previous = 0;

    for total in totals {
        let value = total.average().unwrap_or(previous);
        values.push(value);
        previous = value;
    }

    values
}

/// Keeps the first definition of every sector name.
fn distinct_sectors(sectors: &[SectorDefinition]) -> Vec<&SectorDefinition> {
    let mut seen = std::collections::HashSet::new();
    sectors
        .iter()
        .filter(|sector| seen.insert(sector.name.as_str()))
        .collect()
}

fn sector_series(sector: &SectorDefinition, data: Vec<i32>) -> SectorSeries {
    SectorSeries {
        sector_id: sector.id,
        color: sector.color.clone(),
        data,
    }
}
