use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{OfficialRecord, RatingEvent, SectorDefinition, SectorRating};
use crate::source;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let officials = vec![
        ("Dana Ruiz", "Mayor"),
        ("Marcus Hale", "City Council, District 4"),
    ];
    let sectors = vec![
        ("Health", "#22c55e"),
        ("Education", "#0ea5e9"),
        ("Transport", "#f97316"),
        ("Public Safety", "#a855f7"),
    ];

    for (name, office) in &officials {
        let official_id = upsert_official(pool, name, office).await?;
        for (sector, color) in &sectors {
            upsert_sector(pool, official_id, sector, Some(*color)).await?;
        }
    }

    let now = Utc::now();
    let ratings = vec![
        ("seed-001", "Dana Ruiz", "device-7f3a", 72, Some(("Health", 68)), Duration::hours(2)),
        ("seed-002", "Dana Ruiz", "device-19c0", 64, None, Duration::hours(9)),
        ("seed-003", "Dana Ruiz", "device-a2d4", 81, Some(("Education", 85)), Duration::days(3)),
        ("seed-004", "Dana Ruiz", "device-5be1", 58, Some(("Transport", 41)), Duration::days(40)),
        ("seed-005", "Dana Ruiz", "device-7f3a", 66, Some(("Health", 70)), Duration::days(400)),
        ("seed-006", "Marcus Hale", "device-19c0", 49, Some(("Public Safety", 52)), Duration::hours(5)),
        ("seed-007", "Marcus Hale", "device-c8e2", 55, None, Duration::days(12)),
        ("seed-008", "Marcus Hale", "device-a2d4", 61, Some(("Education", 58)), Duration::days(900)),
    ];

    for (source_key, official, user_id, overall, sector, age) in ratings {
        let official_id = source::official_id(official);
        let sector = match sector {
            Some((name, rating)) => {
                let color = sectors
                    .iter()
                    .find(|(sector, _)| *sector == name)
                    .map(|(_, color)| *color)
                    .unwrap_or(source::DEFAULT_SECTOR_COLOR);
                Some((upsert_sector(pool, official_id, name, Some(color)).await?, rating))
            }
            None => None,
        };

        insert_rating(pool, source_key, official_id, user_id, overall, sector, now - age).await?;
    }

    Ok(())
}

pub async fn upsert_official(pool: &PgPool, name: &str, office: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO townhall.officials (id, name, office)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE
        SET office = COALESCE(NULLIF(EXCLUDED.office, ''), townhall.officials.office)
        RETURNING id
        "#,
    )
    .bind(source::official_id(name))
    .bind(name)
    .bind(office)
    .fetch_one(pool)
    .await?
    .try_get("id")?;

    Ok(id)
}

pub async fn upsert_sector(
    pool: &PgPool,
    official_id: Uuid,
    name: &str,
    color: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO townhall.sectors (id, official_id, name, color)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (official_id, name) DO UPDATE
        SET color = COALESCE($5, townhall.sectors.color)
        RETURNING id
        "#,
    )
    .bind(source::sector_id(official_id, name))
    .bind(official_id)
    .bind(name)
    .bind(color.unwrap_or(source::DEFAULT_SECTOR_COLOR))
    .bind(color)
    .fetch_one(pool)
    .await?
    .try_get("id")?;

    Ok(id)
}

/// Returns `false` when a rating with the same source key already exists.
async fn insert_rating(
    pool: &PgPool,
    source_key: &str,
    official_id: Uuid,
    user_id: &str,
    overall_rating: i32,
    sector: Option<(Uuid, i32)>,
    created_at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO townhall.ratings
        (id, official_id, user_id, overall_rating, sector_id, sector_rating, created_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(official_id)
    .bind(user_id)
    .bind(overall_rating)
    .bind(sector.map(|(id, _)| id))
    .bind(sector.map(|(_, rating)| rating))
    .bind(created_at)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let rows = source::read_ratings(csv_path)?;
    let mut inserted = 0usize;

    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        let official_id = upsert_official(pool, &row.official, "").await?;

        let sector = match row.sector_score()? {
            Some(score) => Some((
                upsert_sector(pool, official_id, score.name, score.color).await?,
                score.rating,
            )),
            None => None,
        };

        let created = insert_rating(
            pool,
            &row.import_key(),
            official_id,
            &row.user_id,
            row.overall_rating,
            sector,
            row.created_at,
        )
        .await
        .with_context(|| format!("failed to import line {line}"))?;

        if created {
            inserted += 1;
        } else {
            debug!(line, "rating already imported, skipping");
        }
    }

    info!(inserted, total = rows.len(), "csv import finished");
    Ok(inserted)
}

fn official_from_row(row: &PgRow) -> anyhow::Result<OfficialRecord> {
    Ok(OfficialRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        office: row.try_get("office")?,
    })
}

pub async fn list_officials(pool: &PgPool) -> anyhow::Result<Vec<OfficialRecord>> {
    let records = sqlx::query("SELECT id, name, office FROM townhall.officials ORDER BY name")
        .fetch_all(pool)
        .await?;

    records.iter().map(official_from_row).collect()
}

pub async fn find_official(pool: &PgPool, name: &str) -> anyhow::Result<Option<OfficialRecord>> {
    let record = sqlx::query("SELECT id, name, office FROM townhall.officials WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    record.as_ref().map(official_from_row).transpose()
}

/// Full rating history of an official; windowing happens in the aggregator.
pub async fn fetch_events(pool: &PgPool, official_id: Uuid) -> anyhow::Result<Vec<RatingEvent>> {
    let records = sqlx::query(
        "SELECT r.id, r.official_id, r.user_id, r.overall_rating, r.sector_id, \
         s.name AS sector_name, s.color AS sector_color, r.sector_rating, r.created_at \
         FROM townhall.ratings r \
         LEFT JOIN townhall.sectors s ON s.id = r.sector_id \
         WHERE r.official_id = $1 \
         ORDER BY r.created_at",
    )
    .bind(official_id)
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(records.len());

    for row in records {
        let sector_id: Option<Uuid> = row.try_get("sector_id")?;
        let sector_name: Option<String> = row.try_get("sector_name")?;
        let sector_color: Option<String> = row.try_get("sector_color")?;
        let sector_rating: Option<i32> = row.try_get("sector_rating")?;

        let sector = match (sector_id, sector_name, sector_color, sector_rating) {
            (Some(sector_id), Some(sector_name), Some(sector_color), Some(rating)) => {
                Some(SectorRating {
                    sector_id,
                    sector_name,
                    sector_color,
                    rating,
                })
            }
            _ => None,
        };

        events.push(RatingEvent {
            id: row.try_get("id")?,
            official_id: row.try_get("official_id")?,
            user_id: row.try_get("user_id")?,
            overall_rating: row.try_get("overall_rating")?,
            sector,
            created_at: row.try_get("created_at")?,
        });
    }

    debug!(%official_id, count = events.len(), "fetched rating history");
    Ok(events)
}

pub async fn fetch_sectors(
    pool: &PgPool,
    official_id: Uuid,
) -> anyhow::Result<Vec<SectorDefinition>> {
    let records = sqlx::query(
        "SELECT id, name, color FROM townhall.sectors WHERE official_id = $1 ORDER BY name",
    )
    .bind(official_id)
    .fetch_all(pool)
    .await?;

    let mut sectors = Vec::with_capacity(records.len());
    for row in records {
        sectors.push(SectorDefinition {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            color: row.try_get("color")?,
        });
    }

    Ok(sectors)
}
