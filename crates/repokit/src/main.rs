use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use repokit::{
    AggregateRoot, Config, DomainEvents, Filter, QueryOptions, Repository, RepositoryName,
    RepositoryRegistry, UnitOfWork,
};

/// repokit - Smoke check a repository pipeline against the configured backend
#[derive(Parser, Debug)]
#[command(name = "repokit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Storage backend (`inmemory` or `sqlite`)
    #[arg(long, env = "REPOKIT_BACKEND")]
    backend: Option<String>,

    /// SQLite database path
    #[arg(long, env = "SQLITE_PATH")]
    sqlite_path: Option<String>,

    /// Buffer writes in a unit of work and save after each step
    #[arg(long)]
    unit_of_work: bool,

    /// Name the repository is registered under
    #[arg(long, default_value = RepositoryName::DEFAULT)]
    repository: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Contact {
    id: Uuid,
    name: String,
    age: u32,
    #[serde(skip)]
    events: DomainEvents,
}

impl AggregateRoot for Contact {
    type Key = Uuid;
    const TYPE_NAME: &'static str = "Contact";

    fn id(&self) -> &Uuid {
        &self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn events(&self) -> &DomainEvents {
        &self.events
    }

    fn events_mut(&mut self) -> &mut DomainEvents {
        &mut self.events
    }
}

/// Commits buffered writes when the scenario runs in a unit of work.
async fn commit(uow: Option<&UnitOfWork>) -> Result<()> {
    if let Some(uow) = uow {
        uow.save_changes(&CancellationToken::new())
            .await
            .context("Failed to save changes")?;
    }
    Ok(())
}

async fn run_scenario(repo: Arc<dyn Repository<Contact>>, uow: Option<&UnitOfWork>) -> Result<()> {
    let added = repo
        .add(Contact {
            id: Uuid::nil(),
            name: "Ada".to_string(),
            age: 36,
            events: DomainEvents::default(),
        })
        .await
        .context("add failed")?;
    commit(uow).await?;
    println!("added:   {} {} ({})", added.id, added.name, added.age);

    let mut changed = added.clone();
    changed.age += 1;
    let updated = repo.update(changed).await.context("update failed")?;
    commit(uow).await?;
    println!("updated: {} {} ({})", updated.id, updated.name, updated.age);

    let fetched = repo.get(&added.id).await.context("get failed")?;
    match &fetched {
        Some(contact) => println!("get:     {} {} ({})", contact.id, contact.name, contact.age),
        None => println!("get:     not found"),
    }

    let adults = repo
        .find_many(
            &Filter::ge("age", 18),
            Some(&QueryOptions::new().sort_by("name")),
        )
        .await
        .context("find failed")?;
    println!("adults:  {}", adults.len());
    println!("count:   {}", repo.count().await.context("count failed")?);

    repo.remove_by_id(&added.id).await.context("remove failed")?;
    commit(uow).await?;
    println!("removed: {}", added.id);
    println!("count:   {}", repo.count().await.context("count failed")?);

    anyhow::ensure!(fetched.map(|c| c.age) == Some(37), "update was not persisted");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repokit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(path) = cli.sqlite_path {
        config.sqlite_path = path;
    }
    config.unit_of_work |= cli.unit_of_work;

    let provider = config
        .caching_provider()
        .await
        .context("Failed to connect cache")?;
    let registry = Arc::new(
        RepositoryRegistry::new(provider).with_repository(cli.repository.as_str(), config.to_options()),
    );
    tracing::info!(repository = %cli.repository, backend = %config.backend, "Running smoke check");

    if config.unit_of_work {
        let uow = UnitOfWork::new(registry.clone());
        uow.initialize(cli.repository.as_str()).await?;
        run_scenario(uow.repository::<Contact>()?, Some(&uow)).await?;
    } else {
        let repo = registry.repository::<Contact>(cli.repository.as_str()).await?;
        run_scenario(repo, None).await?;
    }

    tracing::info!("Smoke check passed");
    Ok(())
}
