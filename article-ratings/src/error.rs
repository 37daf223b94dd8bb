use thiserror::Error;

use crate::key::ArticleKey;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by the article, rating and leaderboard operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("rating must be between 0 and 5, got {0:.2}")]
    InvalidRating(f64),

    #[error("account:{account} already rated article:{key}")]
    AlreadyRated { account: String, key: ArticleKey },

    #[error("article {0} not found")]
    NotFound(ArticleKey),

    #[error("article {key} cannot be decoded: {reason}")]
    Decode { key: ArticleKey, reason: String },

    #[error("failed to read score of article {key}: {source}")]
    ScoreRead {
        key: ArticleKey,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
