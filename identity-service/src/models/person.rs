//! Person model - the human behind one or more accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Person {
    pub id: Uuid,
    /// URL-safe, globally unique.
    pub slug: String,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

impl Person {
    /// Create a person with a random id.
    pub fn new(slug: String, name: String) -> Self {
        Self::with_id(Uuid::new_v4(), slug, name)
    }

    pub fn with_id(id: Uuid, slug: String, name: String) -> Self {
        Self {
            id,
            slug,
            name,
            created_utc: Utc::now(),
        }
    }
}

/// Turn a free-form username into a slug: lowercase ASCII alphanumerics
/// joined by single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonResponse {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

impl From<Person> for PersonResponse {
    fn from(p: Person) -> Self {
        Self {
            id: p.id,
            slug: p.slug,
            name: p.name,
        }
    }
}
