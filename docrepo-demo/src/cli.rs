//! CLI argument definitions using clap.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::scenarios::{
    DEFAULT_PHONES, DEFAULT_PHYSICAL_ADDRESS, DEFAULT_ROAD, DEFAULT_TODO, DEFAULT_USERNAME,
};

/// Runs the docrepo scenarios against a MongoDB deployment
#[derive(Parser, Debug)]
#[command(name = "docrepo-demo")]
#[command(version)]
#[command(about = "Runs the docrepo scenarios against a MongoDB deployment", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// MongoDB connection string
    #[arg(long, env = "DOCREPO_MONGO_URI", default_value = "mongodb://localhost:27017", global = true)]
    pub uri: String,

    /// Database holding the `users` collection
    #[arg(long, env = "DOCREPO_DATABASE", default_value = "mongolang", global = true)]
    pub database: String,

    /// Seconds to wait for the cluster to answer before giving up
    #[arg(long, env = "DOCREPO_CONNECT_TIMEOUT_SECS", default_value_t = 20, global = true)]
    pub connect_timeout_secs: u64,

    /// Scenario to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Available scenarios
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert a single user
    AddUser {
        /// Username of the new user
        #[arg(long, default_value = DEFAULT_USERNAME)]
        username: String,
    },

    /// Insert the five demo users in one batch
    AddManyUsers,

    /// Append phone numbers to a user
    AddPhone {
        #[command(flatten)]
        user: UserArgs,

        /// Phone number to append, repeat for several
        #[arg(long = "phone", default_values_t = DEFAULT_PHONES.map(String::from))]
        phones: Vec<String>,
    },

    /// Replace a user's address
    SetAddress {
        #[command(flatten)]
        user: UserArgs,

        /// Physical address line
        #[arg(long, default_value = DEFAULT_PHYSICAL_ADDRESS)]
        physical_address: String,

        /// Road name
        #[arg(long, default_value = DEFAULT_ROAD)]
        road: String,
    },

    /// Append a todo to a user
    AddTodo {
        #[command(flatten)]
        user: UserArgs,

        /// Text of the todo
        #[arg(long, default_value = DEFAULT_TODO)]
        text: String,
    },

    /// Remove a todo by position
    DeleteTodo {
        #[command(flatten)]
        user: UserArgs,

        /// Zero-based position of the todo
        #[arg(long)]
        index: usize,
    },

    /// Mark a todo as done by position
    MarkDone {
        #[command(flatten)]
        user: UserArgs,

        /// Zero-based position of the todo
        #[arg(long)]
        index: usize,
    },

    /// Look a user up by username
    FindUser {
        /// Username to look up
        #[arg(long)]
        username: String,
    },
}

/// Identifies the user a scenario modifies
#[derive(Args, Debug)]
pub struct UserArgs {
    /// Hex ObjectId of the user
    #[arg(long = "id")]
    pub id: String,
}
