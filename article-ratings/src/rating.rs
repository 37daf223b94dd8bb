//! Rating articles.
//!
//! Every article has a set of accounts that rated it (`ratings:<key>`) and an
//! entry in the global [`SCORES`] sorted set holding the mean of all ratings so
//! far. The full history of ratings is never stored: the mean is updated
//! incrementally from the previous mean and the size of the rater set.
//!
//! Both the rater set and the scoreboard are watched by one optimistic
//! transaction, so two concurrent ratings of the same article cannot both
//! build on the same previous mean. An account racing itself is caught the same
//! way: the losing attempt reruns, finds the account already in the set, and
//! fails with [`Error::AlreadyRated`].

use tracing::info;

use crate::error::{Error, Result};
use crate::key::{ArticleKey, SCORES};
use crate::store::transaction::{self, RetryPolicy};
use crate::store::Store;

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

pub struct RatingEngine<'s, S: ?Sized> {
    store: &'s S,
    retry: RetryPolicy,
}

impl<'s, S: Store + ?Sized> RatingEngine<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: &'s S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Folds `rating` from `account` into the article's average and returns
    /// the new average.
    ///
    /// The article itself does not have to exist.
    pub fn rate(&self, key: &ArticleKey, account: &str, rating: f64) -> Result<f64> {
        validate_rating(rating)?;

        let raters = key.raters_key();
        let watched = [raters.clone(), SCORES.to_string()];

        let average = transaction::run(self.store, &watched, &self.retry, |tx| -> Result<f64> {
            if tx.sadd(&raters, account)? == 0 {
                return Err(Error::AlreadyRated {
                    account: account.to_string(),
                    key: key.clone(),
                });
            }

            let count = tx.scard(&raters)?;
            let previous = match tx.zscore(SCORES, key.as_str()) {
                Ok(score) => score.unwrap_or(0.0),
                Err(err) if err.is_unavailable() => return Err(err.into()),
                Err(source) => {
                    return Err(Error::ScoreRead {
                        key: key.clone(),
                        source,
                    })
                }
            };

            let average = running_average(previous, count, rating);
            tx.zadd(SCORES, key.as_str(), average);
            Ok(average)
        })?;

        info!(%key, account, rating, average, "rating accepted");
        Ok(average)
    }
}

/// Accepts ratings in `[MIN_RATING, MAX_RATING]`; NaN is rejected too.
pub fn validate_rating(rating: f64) -> Result<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(Error::InvalidRating(rating))
    }
}

/// Mean of `count` ratings, given the mean of the first `count - 1` of them
/// and the newest one.
pub fn running_average(previous: f64, count: u64, rating: f64) -> f64 {
    let count = count.max(1) as f64;
    (previous * (count - 1.0) + rating) / count
}
