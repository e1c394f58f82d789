//! docrepo-demo - runs the repository scenarios against a live MongoDB.

mod cli;
mod models;
mod scenarios;

use clap::Parser;
use docrepo::{
    document::Model,
    error::RepositoryResult,
    mongodb::{Connector, MongoConfig, MongoDbStore},
    prelude::{Repository, StoreBackend, TypedRepository},
};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Command},
    models::{User, UserAddress},
};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!(error = %e, "scenario failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> RepositoryResult<()> {
    let cli = Cli::parse();

    let config = MongoConfig::builder()
        .uri(cli.uri.as_str())
        .database(cli.database.as_str())
        .app_name("docrepo-demo")
        .connect_timeout(cli.connect_timeout())
        .build()?;

    let store = Connector::from_config(config.clone()).connect().await?;

    let outcome = {
        let users = TypedRepository::<_, User>::from_repository(
            Repository::new(&store, cli.database.as_str(), User::collection_name())
                .with_timeout(config.operation_timeout),
        );
        dispatch(&users, cli.command).await
    };

    shutdown(store).await;

    outcome
}

async fn dispatch(users: &TypedRepository<&MongoDbStore, User>, command: Command) -> RepositoryResult<()> {
    match command {
        Command::AddUser { username } => print(&scenarios::add_user(users, &username).await?),
        Command::AddManyUsers => print(&scenarios::add_many_users(users).await?),
        Command::AddPhone { user, phones } => print(&scenarios::add_phone(users, &user.id, &phones).await?),
        Command::SetAddress {
            user,
            physical_address,
            road,
        } => {
            let address = UserAddress { physical_address, road };
            print(&scenarios::set_address(users, &user.id, address).await?)
        }
        Command::AddTodo { user, text } => print(&scenarios::add_todo(users, &user.id, &text).await?),
        Command::DeleteTodo { user, index } => print(&scenarios::delete_todo(users, &user.id, index).await?),
        Command::MarkDone { user, index } => print(&scenarios::mark_done(users, &user.id, index).await?),
        Command::FindUser { username } => print(&scenarios::find_user(users, &username).await?),
    }
}

fn print<T: Serialize>(value: &T) -> RepositoryResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown(store: MongoDbStore) {
    match store.shutdown().await {
        Ok(()) => info!("connection pool closed"),
        Err(e) => error!(error = %e, "failed to close connection pool"),
    }
}
