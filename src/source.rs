//! CSV rating exports, used both for database imports and for running the
//! aggregation offline without a database.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::RecordError;
use crate::models::{RatingEvent, SectorDefinition, SectorRating};

pub const DEFAULT_SECTOR_COLOR: &str = "#64748b";

#[derive(Debug, Clone, Deserialize)]
pub struct RatingRow {
    pub official: String,
    pub user_id: String,
    pub overall_rating: i32,
    pub sector_name: Option<String>,
    pub sector_color: Option<String>,
    pub sector_rating: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectorRow {
    pub official: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorScore<'a> {
    pub name: &'a str,
    /// `None` when the row leaves the color blank.
    pub color: Option<&'a str>,
    pub rating: i32,
}

impl SectorScore<'_> {
    pub fn color_or_default(&self) -> &str {
        self.color.unwrap_or(DEFAULT_SECTOR_COLOR)
    }
}

impl RatingRow {
    /// Checks rating ranges and that sector name and sector rating come
    /// together. Returns the sector part when the row has one.
    pub fn sector_score(&self) -> Result<Option<SectorScore<'_>>, RecordError> {
        check_range("overall_rating", self.overall_rating)?;

        let name = self
            .sector_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        match (name, self.sector_rating) {
            (None, None) => Ok(None),
            (Some(name), None) => Err(RecordError::MissingSectorRating(name.to_string())),
            (None, Some(rating)) => Err(RecordError::MissingSectorName(rating)),
            (Some(name), Some(rating)) => {
                check_range("sector_rating", rating)?;
                let color = self
                    .sector_color
                    .as_deref()
                    .map(str::trim)
                    .filter(|color| !color.is_empty());
                Ok(Some(SectorScore { name, color, rating }))
            }
        }
    }

    /// Stable key used to skip rows that were already imported. Rows without
    /// a source key are keyed by their content.
    pub fn import_key(&self) -> String {
        match self.source_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!(
                "{}|{}|{}|{}|{}|{}",
                self.official,
                self.user_id,
                self.created_at.to_rfc3339(),
                self.overall_rating,
                self.sector_name.as_deref().unwrap_or_default().trim(),
                self.sector_rating.map(|r| r.to_string()).unwrap_or_default(),
            ),
        }
    }

    pub fn to_event(&self) -> Result<RatingEvent, RecordError> {
        let official_id = official_id(&self.official);
        let sector = self.sector_score()?.map(|score| SectorRating {
            sector_id: sector_id(official_id, score.name),
            sector_name: score.name.to_string(),
            sector_color: score.color_or_default().to_string(),
            rating: score.rating,
        });

        Ok(RatingEvent {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, self.import_key().as_bytes()),
            official_id,
            user_id: self.user_id.clone(),
            overall_rating: self.overall_rating,
            sector,
            created_at: self.created_at,
        })
    }
}

fn check_range(field: &'static str, value: i32) -> Result<(), RecordError> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        Err(RecordError::RatingOutOfRange { field, value })
    }
}

pub fn official_id(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("townhall/officials/{name}").as_bytes())
}

pub fn sector_id(official_id: Uuid, name: &str) -> Uuid {
    Uuid::new_v5(&official_id, name.as_bytes())
}

pub fn parse_ratings<R: Read>(reader: R) -> anyhow::Result<Vec<RatingRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<RatingRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = result.with_context(|| format!("unreadable rating on line {line}"))?;
        row.sector_score()
            .with_context(|| format!("invalid rating on line {line}"))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn parse_sectors<R: Read>(reader: R) -> anyhow::Result<Vec<SectorRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for result in reader.deserialize::<SectorRow>() {
        rows.push(result.context("unreadable sector row")?);
    }

    Ok(rows)
}

pub fn read_ratings(path: &Path) -> anyhow::Result<Vec<RatingRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_ratings(file)
}

pub fn read_sectors(path: &Path) -> anyhow::Result<Vec<SectorRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_sectors(file)
}

/// Events of one official, in file order.
pub fn events_for(official: &str, rows: &[RatingRow]) -> Result<Vec<RatingEvent>, RecordError> {
    rows.iter()
        .filter(|row| row.official == official)
        .map(RatingRow::to_event)
        .collect()
}

/// Sector definitions of one official. Without an explicit sector list the
/// sectors referenced by the official's ratings are used, in order of first
/// appearance.
pub fn sectors_for(
    official: &str,
    rows: &[RatingRow],
    sector_rows: Option<&[SectorRow]>,
) -> Vec<SectorDefinition> {
    let owner = official_id(official);

    if let Some(sector_rows) = sector_rows {
        return sector_rows
            .iter()
            .filter(|row| row.official == official)
            .map(|row| SectorDefinition {
                id: sector_id(owner, &row.name),
                name: row.name.clone(),
                color: row.color.clone(),
            })
            .collect();
    }

    let mut sectors: Vec<SectorDefinition> = Vec::new();
    for row in rows.iter().filter(|row| row.official == official) {
        let Ok(Some(score)) = row.sector_score() else {
            continue;
        };
        if sectors.iter().any(|sector| sector.name == score.name) {
            continue;
        }
        sectors.push(SectorDefinition {
            id: sector_id(owner, score.name),
            name: score.name.to_string(),
            color: score.color_or_default().to_string(),
        });
    }
    sectors
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATINGS: &str = "\
official,user_id,overall_rating,sector_name,sector_color,sector_rating,created_at,source_key
Dana Ruiz,device-a,72,Health,#22c55e,64,2026-03-14T10:00:00Z,r-1
Dana Ruiz,device-b,58,,,,2026-03-13T09:00:00Z,
Dana Ruiz,device-c,81,Education,,77,2026-03-12T08:00:00Z,r-3
Marcus Hale,device-a,40,Health,#22c55e,35,2026-03-11T08:00:00Z,r-4
";

    #[test]
    fn parses_rows_with_and_without_sectors() {
        let rows = parse_ratings(RATINGS.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].sector_score().unwrap(), None);
        assert_eq!(
            rows[2].sector_score().unwrap(),
            Some(SectorScore {
                name: "Education",
                color: None,
                rating: 77
            })
        );
    }

    #[test]
    fn rejects_incomplete_sector_groups() {
        let data = "\
official,user_id,overall_rating,sector_name,sector_color,sector_rating,created_at,source_key
Dana Ruiz,device-a,72,Health,,,2026-03-14T10:00:00Z,
";
        let err = parse_ratings(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(
            err.root_cause().to_string(),
            RecordError::MissingSectorRating("Health".to_string()).to_string()
        );
    }

    #[test]
    fn rejects_out_of_range_ratings() {
        let data = "\
official,user_id,overall_rating,sector_name,sector_color,sector_rating,created_at,source_key
Dana Ruiz,device-a,101,,,,2026-03-14T10:00:00Z,
";
        let err = parse_ratings(data.as_bytes()).unwrap_err();
        assert!(err.root_cause().to_string().contains("overall_rating"));
    }

    #[test]
    fn events_are_filtered_by_official_with_stable_ids() {
        let rows = parse_ratings(RATINGS.as_bytes()).unwrap();
        let events = events_for("Dana Ruiz", &rows).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.official_id == official_id("Dana Ruiz")));
        assert_eq!(events, events_for("Dana Ruiz", &rows).unwrap());

        let health = events[0].sector.as_ref().unwrap();
        assert_eq!(health.sector_id, sector_id(official_id("Dana Ruiz"), "Health"));
        assert_eq!(health.rating, 64);
    }

    #[test]
    fn derives_sectors_from_ratings_when_no_list_given() {
        let rows = parse_ratings(RATINGS.as_bytes()).unwrap();
        let sectors = sectors_for("Dana Ruiz", &rows, None);
        let names: Vec<&str> = sectors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Health", "Education"]);
        assert_eq!(sectors[0].color, "#22c55e");
    }

    #[test]
    fn explicit_sector_list_wins() {
        let rows = parse_ratings(RATINGS.as_bytes()).unwrap();
        let sector_rows = parse_sectors(
            "official,name,color\nDana Ruiz,Transport,#f97316\nMarcus Hale,Health,#22c55e\n".as_bytes(),
        )
        .unwrap();
        let sectors = sectors_for("Dana Ruiz", &rows, Some(&sector_rows));
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors[0].name, "Transport");
    }

    #[test]
    fn import_key_prefers_source_key() {
        let rows = parse_ratings(RATINGS.as_bytes()).unwrap();
        assert_eq!(rows[0].import_key(), "r-1");
        assert_eq!(
            rows[1].import_key(),
            "Dana Ruiz|device-b|2026-03-13T09:00:00+00:00|58||"
        );
    }

    #[test]
    fn keyless_rows_from_different_files_do_not_collide() {
        let header =
            "official,user_id,overall_rating,sector_name,sector_color,sector_rating,created_at,source_key\n";
        let first = parse_ratings(
            format!("{header}Dana Ruiz,device-b,58,,,,2026-03-13T09:00:00Z,\n").as_bytes(),
        )
        .unwrap();
        let second = parse_ratings(
            format!("{header}Dana Ruiz,device-b,61,Health,,70,2026-03-14T11:00:00Z,\n").as_bytes(),
        )
        .unwrap();

        assert_ne!(first[0].import_key(), second[0].import_key());
    }

    #[test]
    fn blank_color_is_left_to_the_store() {
        let rows = parse_ratings(RATINGS.as_bytes()).unwrap();
        let score = rows[2].sector_score().unwrap().unwrap();
        assert_eq!(score.color, None);
        assert_eq!(score.color_or_default(), DEFAULT_SECTOR_COLOR);
        assert_eq!(rows[0].sector_score().unwrap().unwrap().color, Some("#22c55e"));
    }
}
