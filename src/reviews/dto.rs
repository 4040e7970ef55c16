use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::reviews::repo::{CommentRow, ReviewRow};

#[derive(Debug, Deserialize)]
pub struct ReviewCreateRequest {
    pub text: String,
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPatchRequest {
    pub text: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub text: String,
    /// Author's username.
    pub author: String,
    pub score: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
}

impl From<ReviewRow> for ReviewResponse {
    fn from(r: ReviewRow) -> Self {
        Self {
            id: r.id,
            text: r.text,
            author: r.author,
            score: r.score,
            pub_date: r.pub_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentPatchRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub text: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
}

impl From<CommentRow> for CommentResponse {
    fn from(c: CommentRow) -> Self {
        Self {
            id: c.id,
            text: c.text,
            author: c.author,
            pub_date: c.pub_date,
        }
    }
}

fn default_limit() -> i64 {
    50
}

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

impl Pagination {
    /// Negative or oversized values never reach LIMIT/OFFSET.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(0, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_response_uses_username_for_author() {
        let row = ReviewRow {
            id: Uuid::new_v4(),
            title_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            author: "neo".into(),
            text: "great".into(),
            score: 10,
            pub_date: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        };
        let json = serde_json::to_string(&ReviewResponse::from(row)).unwrap();
        assert!(json.contains("\"author\":\"neo\""));
        assert!(!json.contains("author_id"));
    }

    #[test]
    fn pagination_clamps_hostile_values() {
        let p: Pagination = serde_json::from_str(r#"{"limit":-1,"offset":-10}"#).unwrap();
        assert_eq!(p.limit(), 0);
        assert_eq!(p.offset(), 0);

        let p: Pagination = serde_json::from_str(r#"{"limit":5000}"#).unwrap();
        assert_eq!(p.limit(), 100);
    }
}
