//! Command-line surface of the `courier-client` binary.

use crate::call::CallContext;
use clap::{Args, Parser, Subcommand};
use core::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:50051";

/// Calls a courier server.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    /// Server URL
    #[arg(long, env = "SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server_url: String,

    /// Per-call deadline in milliseconds. Without it calls have no deadline.
    #[arg(long, env = "CALL_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Pause between outbound messages of bidirectional calls, in
    /// milliseconds
    #[arg(long, env = "PACE_MS", default_value_t = 0)]
    pub pace_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl CliArgs {
    /// A fresh context for one call.
    #[must_use]
    pub fn context(&self) -> CallContext {
        CallContext::from_timeout(self.timeout_ms.map(Duration::from_millis))
    }

    #[must_use]
    pub const fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Adds two integers
    #[command(allow_negative_numbers = true)]
    Sum { x: i64, y: i64 },
    /// Square root of a non-negative number
    #[command(allow_negative_numbers = true)]
    SquareRoot { number: f64 },
    /// Streams the prime factors of a positive integer
    #[command(allow_negative_numbers = true)]
    PrimeFactor { number: i64 },
    /// Streams numbers and prints their average
    #[command(allow_negative_numbers = true)]
    RunningAverage {
        #[arg(required = true)]
        numbers: Vec<i64>,
    },
    /// Streams numbers and prints every new maximum as it is reported
    #[command(allow_negative_numbers = true)]
    RunningMax {
        #[arg(required = true)]
        numbers: Vec<i64>,
    },
    /// Greets one person
    Greet {
        first_name: String,
        #[arg(default_value = "")]
        last_name: String,
    },
    /// Receives a series of greetings for one name
    GreetManyTimes { first_name: String },
    /// Sends several names and receives one combined greeting
    LongGreet {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Sends several names and receives a greeting for each
    GreetEveryone {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Greets after a server-side delay, subject to the call deadline
    GreetWithDeadline { first_name: String },
    /// Creates a blog
    CreateBlog(BlogFields),
    /// Reads a blog by id
    ReadBlog { id: String },
    /// Replaces every field of a blog
    UpdateBlog {
        id: String,
        #[command(flatten)]
        fields: BlogFields,
    },
    /// Deletes a blog by id
    DeleteBlog { id: String },
    /// Streams every stored blog
    ListBlog,
}

#[derive(Args, Debug, PartialEq, Eq)]
pub struct BlogFields {
    #[arg(long)]
    pub author_id: String,
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub content: String,
}
