use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::config::{Settings, DEFAULT_STORE_ADDR, DEFAULT_TIMEOUT_MS};
use crate::store::transaction::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about = "Store articles and rank them by average rating", long_about = None)]
pub struct Cli {
    /// Address of the article store.
    #[arg(long, global = true, env = "ARTICLE_RATINGS_STORE", default_value = DEFAULT_STORE_ADDR)]
    pub store: String,

    /// How many times a conflicting rating transaction is attempted.
    #[arg(long, global = true, env = "ARTICLE_RATINGS_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Read/write timeout on the store connection in milliseconds; 0 disables it.
    #[arg(long, global = true, env = "ARTICLE_RATINGS_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        let retry = RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            ..RetryPolicy::default()
        };
        Settings {
            store_addr: self.store.clone(),
            retry,
            ..Settings::default()
        }
        .with_timeout_ms(self.timeout_ms)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the article store, accepting local TCP connections.
    Serve(ServeArgs),
    #[command(flatten)]
    Client(ClientCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Store an article and print its key.
    Add { title: String, author: String },
    /// Print the article stored under a key.
    Show { key: String },
    /// Rate an article on a scale from 0 to 5.
    Rate {
        key: String,
        account: String,
        #[arg(allow_negative_numbers = true)]
        rating: f64,
    },
    /// Print the best-rated articles with their average rating.
    Best {
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },
    /// Store a handful of sample articles.
    Fill,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address the store should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = DEFAULT_STORE_ADDR)]
    pub listen: SocketAddr,
}
