use anyhow::Result;

use super::{init_database, serve};

/// Apply pending migrations and immediately start serving; saves a
/// separate `init-db` step on fresh deployments.
pub async fn migrate_and_serve(database_url: &str, bind_address: &str) -> Result<()> {
    init_database(database_url).await?;
    serve(database_url, bind_address).await
}
