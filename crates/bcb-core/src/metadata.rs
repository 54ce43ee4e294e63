//! Book-metadata lookup port (search by title).
//!
//! Optional collaborator: without one the add-book wizard falls back to the
//! manual title/author flow. The HTTP implementation lives in `bcb-metadata`.

use async_trait::async_trait;

use crate::Result;

/// One search result, enough to render a pick button.
#[derive(Clone, Debug)]
pub struct BookHit {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: Option<String>,
}

/// Full record for a picked book.
#[derive(Clone, Debug)]
pub struct BookMeta {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub thumb_url: Option<String>,
}

#[async_trait]
pub trait BookSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<BookHit>>;
    async fn get(&self, id: &str) -> Result<BookMeta>;
}
