use anyhow::{Context, Result};
use tracing::{info, trace};

use super::initdb::connect_and_migrate;
use crate::identity::{self, NewUser};

pub async fn create_superuser(
    database_url: &str,
    username: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    trace!("Entering create_superuser function");
    let db = connect_and_migrate(database_url).await?;

    let created = identity::create_user(
        &db,
        NewUser {
            username,
            email,
            password,
            is_staff: true,
            is_superuser: true,
        },
    )
    .await
    .with_context(|| format!("Failed to create superuser '{}'", username))?;

    info!("Superuser '{}' created with ID {}", created.username, created.id);
    Ok(())
}
