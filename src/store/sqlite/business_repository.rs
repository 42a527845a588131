//! Business repository — the `businesses` table.
//!
//! `(domain, page_url)` is a SQL `UNIQUE` constraint; `insert` maps a
//! constraint violation to `InsertOutcome::AlreadyExists` instead of
//! bubbling a raw SQL error, so the caller (the supervisor) can implement
//! the duplicate-counting rule without touching SQL error codes itself.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::{Business, Coordinates, ExportMode, InsertOutcome};

pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, business: &Business) -> Result<InsertOutcome> {
        let scraped_at = business
            .scraped_at
            .unwrap_or_else(Utc::now)
            .to_rfc3339();
        let (latitude, longitude) = business
            .coordinates
            .map(|c| (Some(c.latitude), Some(c.longitude)))
            .unwrap_or((None, None));
        let working_hours = business
            .working_hours
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let tags = business.tags.as_ref().map(serde_json::to_string).transpose()?;
        let export_mode = business.export_mode.map(|m| m.as_str());

        let result = sqlx::query!(
            r#"
            INSERT INTO businesses (
                domain, page_url, name, title, country, city, category, address,
                phone, mobile, fax, website, latitude, longitude, working_hours,
                description, tags, reviews_count, rating, established_year,
                employees, scraped_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
            business.domain,
            business.page_url,
            business.name,
            business.title,
            business.country,
            business.city,
            business.category,
            business.address,
            business.phone,
            business.mobile,
            business.fax,
            business.website,
            latitude,
            longitude,
            working_hours,
            business.description,
            tags,
            business.reviews_count,
            business.rating,
            business.established_year,
            business.employees,
            scraped_at,
        )
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => Ok(InsertOutcome::Inserted(res.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(other) => Err(other).context("failed to insert business"),
        }
    }

    /// Of the given `urls` for `domain`, return the subset already present —
    /// the dedup filter from the supervisor algorithm's step 4c.
    pub async fn existing_urls(&self, domain: &str, urls: &[String]) -> Result<HashSet<String>> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }

        let mut qb = sqlx::QueryBuilder::new(
            "SELECT page_url FROM businesses WHERE domain = ",
        );
        qb.push_bind(domain);
        qb.push(" AND page_url IN (");
        let mut separated = qb.separated(", ");
        for url in urls {
            separated.push_bind(url);
        }
        separated.push_unseparated(")");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to query existing business urls")?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("page_url"))
            .collect())
    }

    pub async fn count_by_domain(&self, domain: &str) -> Result<i64> {
        let row = sqlx::query!(
            "SELECT COUNT(*) as count FROM businesses WHERE domain = ?1",
            domain
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to count businesses")?;
        Ok(row.count)
    }

    /// Records not yet exported, optionally narrowed to a city/category —
    /// used by the export pipeline's query step.
    pub async fn find_unexported(
        &self,
        city: Option<&str>,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Business>> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT id, domain, page_url, name, title, country, city, category, address,
                phone, mobile, fax, website, latitude, longitude, working_hours,
                description, tags, reviews_count, rating, established_year, employees,
                scraped_at, exported_at, export_mode
            FROM businesses
            WHERE exported_at IS NULL
            "#,
        );
        if let Some(city) = city {
            qb.push(" AND city = ").push_bind(city);
        }
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category);
        }
        qb.push(" ORDER BY scraped_at ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("failed to query unexported businesses")?;

        rows.into_iter().map(row_to_business).collect()
    }

    pub async fn count_unexported(&self, city: Option<&str>, category: Option<&str>) -> Result<i64> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT COUNT(*) as count FROM businesses WHERE exported_at IS NULL",
        );
        if let Some(city) = city {
            qb.push(" AND city = ").push_bind(city);
        }
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category);
        }
        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .context("failed to count unexported businesses")?;
        Ok(row.get::<i64, _>("count"))
    }

    pub async fn mark_exported(&self, business_id: i64, mode: ExportMode) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mode_str = mode.as_str();
        sqlx::query!(
            "UPDATE businesses SET exported_at = ?1, export_mode = ?2 WHERE id = ?3",
            now,
            mode_str,
            business_id,
        )
        .execute(&self.pool)
        .await
        .context("failed to mark business exported")?;
        Ok(())
    }
}

fn row_to_business(row: sqlx::sqlite::SqliteRow) -> Result<Business> {
    let working_hours: Option<String> = row.try_get("working_hours")?;
    let tags: Option<String> = row.try_get("tags")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let scraped_at: String = row.try_get("scraped_at")?;
    let exported_at: Option<String> = row.try_get("exported_at")?;
    let export_mode: Option<String> = row.try_get("export_mode")?;

    Ok(Business {
        id: row.try_get("id")?,
        domain: row.try_get("domain")?,
        page_url: row.try_get("page_url")?,
        name: row.try_get("name")?,
        title: row.try_get("title")?,
        country: row.try_get("country")?,
        city: row.try_get("city")?,
        category: row.try_get("category")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        mobile: row.try_get("mobile")?,
        fax: row.try_get("fax")?,
        website: row.try_get("website")?,
        coordinates: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Coordinates { latitude, longitude }),
        working_hours: working_hours.and_then(|s| serde_json::from_str(&s).ok()),
        description: row.try_get("description")?,
        tags: tags.and_then(|s| serde_json::from_str(&s).ok()),
        reviews_count: row.try_get("reviews_count")?,
        rating: row.try_get("rating")?,
        established_year: row.try_get("established_year")?,
        employees: row.try_get("employees")?,
        scraped_at: Some(super::parse_datetime(&scraped_at)),
        exported_at: exported_at.as_deref().map(super::parse_datetime),
        export_mode: export_mode.and_then(|s| s.parse().ok()),
    })
}
