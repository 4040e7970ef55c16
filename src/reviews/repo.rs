use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Review joined with its author's username.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub title_id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub text: String,
    pub score: i32,
    pub pub_date: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub review_id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub text: String,
    pub pub_date: OffsetDateTime,
}

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, r.author_id, u.username AS author, \
    r.text, r.score, r.pub_date \
    FROM reviews r JOIN users u ON u.id = r.author_id";

const COMMENT_SELECT: &str = "SELECT c.id, c.review_id, c.author_id, u.username AS author, \
    c.text, c.pub_date \
    FROM comments c JOIN users u ON u.id = c.author_id";

pub struct Review;

impl Review {
    pub async fn list_by_title(
        db: &PgPool,
        title_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ReviewRow>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{REVIEW_SELECT} WHERE r.title_id = $1 ORDER BY r.pub_date DESC LIMIT $2 OFFSET $3"
        ))
        .bind(title_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get(
        db: &PgPool,
        title_id: Uuid,
        review_id: Uuid,
    ) -> anyhow::Result<Option<ReviewRow>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "{REVIEW_SELECT} WHERE r.id = $1 AND r.title_id = $2"
        ))
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn exists_for_author(
        db: &PgPool,
        title_id: Uuid,
        author_id: Uuid,
    ) -> anyhow::Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM reviews WHERE title_id = $1 AND author_id = $2",
        )
        .bind(title_id)
        .bind(author_id)
        .fetch_optional(db)
        .await?;
        Ok(found.is_some())
    }

    pub async fn create(
        db: &PgPool,
        title_id: Uuid,
        author_id: Uuid,
        text: &str,
        score: i32,
    ) -> anyhow::Result<ReviewRow> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO reviews (title_id, author_id, text, score) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(title_id)
        .bind(author_id)
        .bind(text)
        .bind(score)
        .fetch_one(db)
        .await?;
        Self::get(db, title_id, id)
            .await?
            .context("created review missing")
    }

    pub async fn update(
        db: &PgPool,
        review_id: Uuid,
        text: Option<&str>,
        score: Option<i32>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE reviews SET text = COALESCE($2, text), score = COALESCE($3, score) \
             WHERE id = $1",
        )
        .bind(review_id)
        .bind(text)
        .bind(score)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, review_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct Comment;

impl Comment {
    pub async fn list_by_review(
        db: &PgPool,
        review_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CommentRow>> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.review_id = $1 ORDER BY c.pub_date DESC LIMIT $2 OFFSET $3"
        ))
        .bind(review_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get(
        db: &PgPool,
        review_id: Uuid,
        comment_id: Uuid,
    ) -> anyhow::Result<Option<CommentRow>> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.id = $1 AND c.review_id = $2"
        ))
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn create(
        db: &PgPool,
        review_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> anyhow::Result<CommentRow> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO comments (review_id, author_id, text) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(db)
        .await?;
        Self::get(db, review_id, id)
            .await?
            .context("created comment missing")
    }

    pub async fn update(db: &PgPool, comment_id: Uuid, text: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET text = $2 WHERE id = $1")
            .bind(comment_id)
            .bind(text)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, comment_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
