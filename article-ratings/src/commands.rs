//! Client subcommands, run against any [`Store`] and printing to any writer.

use std::io::Write;

use anyhow::Result;

use crate::article::ArticleStore;
use crate::cli::ClientCommand;
use crate::config::Settings;
use crate::error::Error;
use crate::key::ArticleKey;
use crate::leaderboard::Leaderboard;
use crate::rating::{validate_rating, RatingEngine};
use crate::store::Store;

/// Articles stored by `fill`, as (title, author).
pub const SAMPLE_ARTICLES: [(&str, &str); 8] = [
    ("ETH", "Metcalfe/Boggs"),
    ("ERM", "Chen"),
    ("GoTo", "Dijkstra"),
    ("UNIX", "Richie/Thompson"),
    ("CSP", "Hoare"),
    ("OSI", "Zimmerman"),
    ("RDB", "Codd"),
    ("CRY", "Diffie/Hellman"),
];

/// Checks what can be checked without touching the store.
pub fn validate(command: &ClientCommand) -> Result<(), Error> {
    match command {
        ClientCommand::Rate { rating, .. } => validate_rating(*rating),
        _ => Ok(()),
    }
}

pub fn execute<S, W>(
    command: &ClientCommand,
    store: &S,
    settings: &Settings,
    out: &mut W,
) -> Result<()>
where
    S: Store + ?Sized,
    W: Write,
{
    match command {
        ClientCommand::Add { title, author } => {
            let key = ArticleStore::new(store).insert(title, author)?;
            writeln!(out, "{key}")?;
        }
        ClientCommand::Show { key } => {
            let article = ArticleStore::new(store).get(&ArticleKey::from(key.as_str()))?;
            writeln!(out, "{article}")?;
        }
        ClientCommand::Rate {
            key,
            account,
            rating,
        } => {
            RatingEngine::with_retry(store, settings.retry).rate(
                &ArticleKey::from(key.as_str()),
                account,
                *rating,
            )?;
        }
        ClientCommand::Best { n } => {
            for ranked in Leaderboard::new(store).top(*n)? {
                writeln!(out, "{} {:.2}", ranked.key, ranked.score)?;
            }
        }
        ClientCommand::Fill => {
            let articles = ArticleStore::new(store);
            for (title, author) in SAMPLE_ARTICLES {
                let key = articles.insert(title, author)?;
                writeln!(out, "{key}")?;
            }
        }
    }

    Ok(())
}
