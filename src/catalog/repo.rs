use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Title joined with its category; `rating` is the live average review
/// score, never stored.
#[derive(Debug, Clone, FromRow)]
pub struct TitleRow {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TitleGenreRow {
    pub title_id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Default)]
pub struct TitleFilter {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub genre_ids: Vec<Uuid>,
}

#[derive(Debug, Default)]
pub struct TitlePatch {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    /// `Some` replaces the whole genre set.
    pub genre_ids: Option<Vec<Uuid>>,
}

impl Category {
    pub async fn list(
        db: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%') \
             ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_slug(db: &PgPool, slug: &str) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn create(db: &PgPool, name: &str, slug: &str) -> anyhow::Result<Category> {
        let row = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn delete_by_slug(db: &PgPool, slug: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Genre {
    pub async fn list(
        db: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Genre>> {
        let rows = sqlx::query_as::<_, Genre>(
            "SELECT id, name, slug FROM genres \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%') \
             ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_slug(db: &PgPool, slug: &str) -> anyhow::Result<Option<Genre>> {
        let row =
            sqlx::query_as::<_, Genre>("SELECT id, name, slug FROM genres WHERE slug = $1")
                .bind(slug)
                .fetch_optional(db)
                .await?;
        Ok(row)
    }

    pub async fn find_by_slugs(db: &PgPool, slugs: &[String]) -> anyhow::Result<Vec<Genre>> {
        let rows = sqlx::query_as::<_, Genre>(
            "SELECT id, name, slug FROM genres WHERE slug = ANY($1)",
        )
        .bind(slugs)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn create(db: &PgPool, name: &str, slug: &str) -> anyhow::Result<Genre> {
        let row = sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn delete_by_slug(db: &PgPool, slug: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM genres WHERE slug = $1")
            .bind(slug)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, \
    c.name AS category_name, c.slug AS category_slug, \
    (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating \
    FROM titles t LEFT JOIN categories c ON c.id = t.category_id";

pub struct Title;

impl Title {
    pub async fn list(
        db: &PgPool,
        filter: &TitleFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<TitleRow>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(TITLE_SELECT);
        qb.push(" WHERE 1=1");
        if let Some(category) = &filter.category {
            qb.push(" AND c.slug = ").push_bind(category);
        }
        if let Some(genre) = &filter.genre {
            qb.push(" AND EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id WHERE tg.title_id = t.id AND g.slug = ")
                .push_bind(genre)
                .push(")");
        }
        if let Some(name) = &filter.name {
            qb.push(" AND t.name ILIKE ").push_bind(format!("%{name}%"));
        }
        if let Some(year) = filter.year {
            qb.push(" AND t.year = ").push_bind(year);
        }
        qb.push(" ORDER BY t.name LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build_query_as::<TitleRow>().fetch_all(db).await?;
        Ok(rows)
    }

    pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<TitleRow>> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM titles WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(found.is_some())
    }

    pub async fn create(db: &PgPool, new: &NewTitle) -> anyhow::Result<Uuid> {
        let mut tx = db.begin().await?;
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO titles (name, year, description, category_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&new.name)
        .bind(new.year)
        .bind(&new.description)
        .bind(new.category_id)
        .fetch_one(&mut *tx)
        .await?;

        for genre_id in &new.genre_ids {
            sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                .bind(id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(id)
    }

    pub async fn update(db: &PgPool, id: Uuid, patch: &TitlePatch) -> anyhow::Result<bool> {
        let mut tx = db.begin().await?;
        let result = sqlx::query(
            "UPDATE titles SET \
               name = COALESCE($2, name), \
               year = COALESCE($3, year), \
               description = COALESCE($4, description), \
               category_id = COALESCE($5, category_id) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.year)
        .bind(patch.description.as_deref())
        .bind(patch.category_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(genre_ids) = &patch.genre_ids {
            sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for genre_id in genre_ids {
                sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2)")
                    .bind(id)
                    .bind(genre_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn genres_for(db: &PgPool, title_ids: &[Uuid]) -> anyhow::Result<Vec<TitleGenreRow>> {
        let rows = sqlx::query_as::<_, TitleGenreRow>(
            "SELECT tg.title_id, g.name, g.slug \
             FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
             WHERE tg.title_id = ANY($1) ORDER BY g.name",
        )
        .bind(title_ids)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
