//! Load or wipe the development data set.
//!
//! ```text
//! import_data --import   # users, tours, then reviews from dev-data/data
//! import_data --delete   # remove reviews, bookings, tours and users
//! ```

use std::{fs, path::Path};

use anyhow::{bail, Context};
use serde::{de::DeserializeOwned, Deserialize};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use natours_server::{
    config::AppConfig,
    models::{review::CreateReview, tour::CreateTour, user::CreateUser},
    repository::Repository,
    services::Services,
};

const DATA_DIR: &str = "dev-data/data";

/// A seed record keeps its identifier so references between files resolve
#[derive(Deserialize)]
struct Seed<T> {
    id: Uuid,
    #[serde(flatten)]
    data: T,
}

fn read_seed<T: DeserializeOwned>(file: &str) -> anyhow::Result<Vec<Seed<T>>> {
    let path = Path::new(DATA_DIR).join(file);
    let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn import(services: &Services) -> anyhow::Result<()> {
    let users = read_seed::<CreateUser>("users.json")?;
    let tours = read_seed::<CreateTour>("tours.json")?;
    let reviews = read_seed::<CreateReview>("reviews.json")?;

    for seed in users {
        services.users.import(seed.id, seed.data).await?;
    }
    for seed in tours {
        services.tours.import(seed.id, seed.data).await?;
    }
    for seed in reviews {
        services.reviews.import(seed.id, None, seed.data).await?;
    }
    Ok(())
}

async fn delete(repository: &Repository) -> anyhow::Result<()> {
    let reviews = repository.reviews.delete_all().await?;
    let bookings = repository.bookings.delete_all().await?;
    let tours = repository.tours.delete_all().await?;
    let users = repository.users.delete_all().await?;
    tracing::info!(reviews, bookings, tours, users, "Rows deleted");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "import_data=info,natours_server=info".into()),
        )
        .init();

    let action = std::env::args().nth(1).unwrap_or_default();
    if action != "--import" && action != "--delete" {
        bail!("Usage: import_data --import | --delete");
    }

    let config = AppConfig::load().context("Failed to load configuration")?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.connection_url())
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let repository = Repository::new(pool);
    let services = Services::new(repository.clone());

    if action == "--import" {
        import(&services).await?;
        tracing::info!("Data successfully loaded");
    } else {
        delete(&repository).await?;
        tracing::info!("Data successfully deleted");
    }

    Ok(())
}
