//! Open Library adapter for the core `BookSearch` port.
//!
//! Two endpoints: `/search.json` for title search and `/works/{id}.json` for
//! the full record (plus one `/authors/{key}.json` hop for the author name).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use bcb_core::{
    errors::Error,
    metadata::{BookHit, BookMeta, BookSearch},
    Result,
};

const SEARCH_LIMIT: usize = 5;

#[derive(Clone, Debug)]
pub struct HttpBookSearch {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBookSearch {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Metadata(format!("http client build error: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("metadata request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Metadata(format!(
                "metadata request failed: {} {path}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Metadata(format!("metadata json error: {e}")))
    }
}

#[async_trait]
impl BookSearch for HttpBookSearch {
    async fn search(&self, query: &str) -> Result<Vec<BookHit>> {
        let limit = SEARCH_LIMIT.to_string();
        let body = self
            .get_json("/search.json", &[("q", query), ("limit", &limit)])
            .await?;
        Ok(parse_search(&body))
    }

    async fn get(&self, id: &str) -> Result<BookMeta> {
        let body = self.get_json(&format!("/works/{id}.json"), &[]).await?;
        let mut meta = parse_work(id, &body)?;

        // The work record only links the author; one more hop for the name.
        if let Some(key) = author_key(&body) {
            match self.get_json(&format!("{key}.json"), &[]).await {
                Ok(author) => {
                    if let Some(name) = author.get("name").and_then(Value::as_str) {
                        meta.author = name.to_string();
                    }
                }
                Err(err) => tracing::warn!(%err, "author lookup failed"),
            }
        }
        Ok(meta)
    }
}

fn parse_search(body: &Value) -> Vec<BookHit> {
    let Some(docs) = body.get("docs").and_then(Value::as_array) else {
        return Vec::new();
    };
    docs.iter()
        .take(SEARCH_LIMIT)
        .filter_map(|doc| {
            let id = doc
                .get("key")
                .and_then(Value::as_str)?
                .trim_start_matches("/works/")
                .to_string();
            let title = doc.get("title").and_then(Value::as_str)?.to_string();
            let author = doc
                .get("author_name")
                .and_then(Value::as_array)
                .and_then(|a| a.first())
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            let year = doc
                .get("first_publish_year")
                .and_then(Value::as_i64)
                .map(|y| y.to_string());
            Some(BookHit {
                id,
                title,
                author,
                year,
            })
        })
        .collect()
}

fn parse_work(id: &str, body: &Value) -> Result<BookMeta> {
    let title = body
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Metadata(format!("work {id} has no title")))?
        .to_string();

    // Older records store the description as a bare string, newer ones as
    // a typed object.
    let description = match body.get("description") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(obj) => obj
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    };

    let thumb_url = body
        .get("covers")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(Value::as_i64)
        .map(|cover| format!("https://covers.openlibrary.org/b/id/{cover}-M.jpg"));

    Ok(BookMeta {
        id: id.to_string(),
        title,
        author: "Unknown".to_string(),
        isbn: None,
        description,
        url: Some(format!("https://openlibrary.org/works/{id}")),
        thumb_url,
    })
}

fn author_key(body: &Value) -> Option<String> {
    body.get("authors")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|entry| entry.get("author"))
        .and_then(|author| author.get("key"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_search_docs() {
        let body = json!({
            "numFound": 2,
            "docs": [
                {
                    "key": "/works/OL893415W",
                    "title": "Dune",
                    "author_name": ["Frank Herbert"],
                    "first_publish_year": 1965
                },
                {
                    "key": "/works/OL1W",
                    "title": "Anonymous Work"
                }
            ]
        });
        let hits = parse_search(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "OL893415W");
        assert_eq!(hits[0].author, "Frank Herbert");
        assert_eq!(hits[0].year.as_deref(), Some("1965"));
        assert_eq!(hits[1].author, "Unknown");
    }

    #[test]
    fn skips_docs_without_key_or_title() {
        let body = json!({ "docs": [ { "title": "No key" }, { "key": "/works/OL2W" } ] });
        assert!(parse_search(&body).is_empty());
    }

    #[test]
    fn parses_work_with_string_description() {
        let body = json!({
            "title": "Dune",
            "description": "A desert planet.",
            "covers": [111]
        });
        let meta = parse_work("OL893415W", &body).unwrap();
        assert_eq!(meta.title, "Dune");
        assert_eq!(meta.description.as_deref(), Some("A desert planet."));
        assert_eq!(
            meta.thumb_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/111-M.jpg")
        );
        assert_eq!(
            meta.url.as_deref(),
            Some("https://openlibrary.org/works/OL893415W")
        );
    }

    #[test]
    fn parses_work_with_typed_description() {
        let body = json!({
            "title": "Dune",
            "description": { "type": "/type/text", "value": "A desert planet." }
        });
        let meta = parse_work("OL893415W", &body).unwrap();
        assert_eq!(meta.description.as_deref(), Some("A desert planet."));
    }

    #[test]
    fn work_without_title_is_an_error() {
        let body = json!({ "description": "orphan" });
        assert!(parse_work("OL0W", &body).is_err());
    }

    #[test]
    fn extracts_author_key() {
        let body = json!({
            "title": "Dune",
            "authors": [ { "author": { "key": "/authors/OL79034A" } } ]
        });
        assert_eq!(author_key(&body).as_deref(), Some("/authors/OL79034A"));
    }
}
