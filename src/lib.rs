//! Approval ratings for public officials, bucketed into chart-ready time
//! series.
//!
//! [`aggregate::aggregate`] is the pure core: it takes the full rating
//! history of one official plus its sector list and returns hourly, daily,
//! monthly and yearly series. [`db`] and [`source`] supply that history from
//! Postgres or CSV files; [`report`] turns the result into markdown.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod granularity;
pub mod models;
pub mod report;
pub mod source;

pub use aggregate::{aggregate, aggregate_many, OfficialRatings};
pub use granularity::Granularity;
pub use models::{AggregationResult, RatingEvent, SectorDefinition, SectorSeries, TimeSeries};
