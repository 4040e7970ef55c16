use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::repo::{Category, Genre};

/// Shared shape for category/genre payloads.
#[derive(Debug, Serialize, Deserialize)]
pub struct NamedSlug {
    pub name: String,
    pub slug: String,
}

impl From<Category> for NamedSlug {
    fn from(c: Category) -> Self {
        Self {
            name: c.name,
            slug: c.slug,
        }
    }
}

impl From<Genre> for NamedSlug {
    fn from(g: Genre) -> Self {
        Self {
            name: g.name,
            slug: g.slug,
        }
    }
}

fn default_limit() -> i64 {
    50
}

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

impl SearchQuery {
    /// Negative or oversized values never reach LIMIT/OFFSET.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(0, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

/// Title list filters: slugs match exactly, `name` is a substring match.
#[derive(Debug, Deserialize)]
pub struct TitleListQuery {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

impl TitleListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(0, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

#[derive(Debug, Deserialize)]
pub struct TitleCreateRequest {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    /// Category slug.
    pub category: String,
    /// Genre slugs.
    #[serde(default)]
    pub genre: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitlePatchRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: Uuid,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<NamedSlug>,
    /// Absent when the title's category was deleted.
    pub category: Option<NamedSlug>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_response_serialization() {
        let response = TitleResponse {
            id: Uuid::new_v4(),
            name: "The Matrix".into(),
            year: 1999,
            rating: Some(9.5),
            description: None,
            genre: vec![NamedSlug {
                name: "Sci-Fi".into(),
                slug: "sci-fi".into(),
            }],
            category: Some(NamedSlug {
                name: "Films".into(),
                slug: "films".into(),
            }),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"rating\":9.5"));
        assert!(json.contains("\"slug\":\"sci-fi\""));
    }

    #[test]
    fn title_filters_deserialize_from_query_shape() {
        let q: TitleListQuery = serde_json::from_str(
            r#"{"category":"films","genre":"sci-fi","name":"matrix","year":1999}"#,
        )
        .unwrap();
        assert_eq!(q.category.as_deref(), Some("films"));
        assert_eq!(q.year, Some(1999));
        assert_eq!(q.limit(), 50);
    }

    #[test]
    fn search_query_clamps_hostile_pagination() {
        let q: SearchQuery = serde_json::from_str(r#"{"limit":-1,"offset":-50}"#).unwrap();
        assert_eq!(q.limit(), 0);
        assert_eq!(q.offset(), 0);

        let q: TitleListQuery = serde_json::from_str(r#"{"limit":99999}"#).unwrap();
        assert_eq!(q.limit(), 100);
    }
}
