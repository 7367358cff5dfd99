use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::granularity::Granularity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEvent {
    pub id: Uuid,
    pub official_id: Uuid,
    pub user_id: String,
    pub overall_rating: i32,
    #[serde(default, flatten, skip_serializing_if = "Option::is_none")]
    pub sector: Option<SectorRating>,
    pub created_at: DateTime<Utc>,
}

/// Sector-specific part of a rating. Either all of these are known or the
/// event carries no sector score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorRating {
    pub sector_id: Uuid,
    pub sector_name: String,
    pub sector_color: String,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDefinition {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialRecord {
    pub id: Uuid,
    pub name: String,
    pub office: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Vec<String>,
    pub data: Vec<i32>,
}

/// Per-sector values; labels are shared with the matching overall series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorSeries {
    pub sector_id: Uuid,
    pub color: String,
    pub data: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub periods: BTreeMap<Granularity, TimeSeries>,
    pub sector_data: BTreeMap<Granularity, BTreeMap<String, SectorSeries>>,
}

impl AggregationResult {
    pub fn period(&self, granularity: Granularity) -> Option<&TimeSeries> {
        self.periods.get(&granularity)
    }

    pub fn sectors(&self, granularity: Granularity) -> Option<&BTreeMap<String, SectorSeries>> {
        self.sector_data.get(&granularity)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorAverage {
    pub sector_name: String,
    pub color: String,
    pub count: usize,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub official: String,
    pub total_ratings: usize,
    pub overall_average: f64,
    pub sectors: Vec<SectorAverage>,
}
