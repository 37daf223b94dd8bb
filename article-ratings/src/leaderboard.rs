use crate::error::Result;
use crate::key::{ArticleKey, SCORES};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedArticle {
    pub key: ArticleKey,
    pub score: f64,
}

/// Read-only view of the scoreboard.
pub struct Leaderboard<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: Store + ?Sized> Leaderboard<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Best-rated articles, highest average first.
    ///
    /// `n` is used as an inclusive end rank, so up to `n + 1` articles come
    /// back. Negative values count from the bottom of the board: `-1` returns
    /// every rated article.
    pub fn top(&self, n: i64) -> Result<Vec<RankedArticle>> {
        let entries = self.store.zrevrange_with_scores(SCORES, 0, n)?;
        Ok(entries
            .into_iter()
            .map(|entry| RankedArticle {
                key: ArticleKey::from(entry.member),
                score: entry.score,
            })
            .collect())
    }
}
