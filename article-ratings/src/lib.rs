//! Articles with a running average rating, kept in a small data-structure
//! store.
//!
//! The interesting part is [`rating`]: folding a new rating into an article's
//! average is a read-modify-write over two shared keys (the article's rater
//! set and the global scoreboard), done as an optimistic transaction so that
//! any number of concurrent clients can rate without losing updates or letting
//! an account rate twice.
//!
//! - [`key`] derives short article keys and names the store keys.
//! - [`article`] encodes article records and stores/loads them.
//! - [`rating`] applies ratings under optimistic concurrency control.
//! - [`leaderboard`] reads the best-rated articles.
//! - [`store`] defines the store contract, the in-memory store, the TCP
//!   client and the transaction retry loop.
//! - [`protocol`] and [`server`] expose an in-memory store over TCP.
//! - [`cli`], [`config`] and [`commands`] make up the command-line tool.

pub mod article;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod key;
pub mod leaderboard;
pub mod protocol;
pub mod rating;
pub mod server;
pub mod store;

pub use article::{Article, ArticleStore};
pub use error::{Error, Result};
pub use key::ArticleKey;
pub use leaderboard::{Leaderboard, RankedArticle};
pub use rating::RatingEngine;
