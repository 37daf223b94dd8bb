//! Article records.
//!
//! Articles are stored as fields of the [`ARTICLES`] hash, keyed by their
//! derived [`ArticleKey`]. The stored value is one line of plain text holding
//! the author, a space, then the title. Neither field may contain whitespace
//! if it is to be read back.

use std::fmt;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::key::{ArticleKey, ARTICLES};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub author: String,
}

impl Article {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }

    pub fn key(&self) -> ArticleKey {
        ArticleKey::derive(&self.title, &self.author)
    }

    pub fn encode(&self) -> Vec<u8> {
        format!("{} {}\n", self.author, self.title).into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        let text = std::str::from_utf8(bytes).map_err(|err| err.to_string())?;
        let line = text.strip_suffix('\n').unwrap_or(text);

        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(author), Some(title), None) => Ok(Self::new(title, author)),
            (_, _, Some(_)) => Err("expected two fields, found more".to_string()),
            _ => Err("expected two fields: author title".to_string()),
        }
    }

    /// Whether [`Article::decode`] can recover this article from its encoding.
    pub fn round_trips(&self) -> bool {
        let clean = |field: &str| !field.is_empty() && !field.contains(char::is_whitespace);
        clean(&self.title) && clean(&self.author)
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Title:{} Author:{}}}", self.title, self.author)
    }
}

/// Reads and writes article records through a [`Store`].
pub struct ArticleStore<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: Store + ?Sized> ArticleStore<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Stores the article under its derived key and returns the key.
    ///
    /// Whatever was stored under that key before is replaced, including a
    /// different article whose key happens to collide.
    pub fn insert(&self, title: &str, author: &str) -> Result<ArticleKey> {
        let article = Article::new(title, author);
        let key = article.key();
        if !article.round_trips() {
            warn!(%key, title, author, "article fields contain whitespace and will not read back");
        }

        self.store.hset(ARTICLES, key.as_str(), &article.encode())?;
        info!(%key, title, author, "article stored");
        Ok(key)
    }

    pub fn get(&self, key: &ArticleKey) -> Result<Article> {
        let bytes = self
            .store
            .hget(ARTICLES, key.as_str())?
            .ok_or_else(|| Error::NotFound(key.clone()))?;

        Article::decode(&bytes).map_err(|reason| Error::Decode {
            key: key.clone(),
            reason,
        })
    }
}
