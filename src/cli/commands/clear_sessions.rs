use anyhow::{Context, Result};
use tracing::{info, trace};

use super::initdb::connect_and_migrate;
use crate::session;

/// Delete expired sessions left behind by clients that never came back.
pub async fn clear_sessions(database_url: &str) -> Result<u64> {
    trace!("Entering clear_sessions function");
    let db = connect_and_migrate(database_url).await?;

    let purged = session::purge_expired(&db)
        .await
        .context("Failed to purge expired sessions")?;
    info!("Removed {} expired session(s)", purged);
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::identity::{self, NewUser};
    use model::entities::prelude::Session;
    use sea_orm::{Database, EntityTrait};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clear_sessions() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("sessions.db").display());

        let db = connect_and_migrate(&url).await.unwrap();
        let user = identity::create_user(
            &db,
            NewUser {
                username: "iris",
                email: "iris@example.com",
                password: "pw",
                is_staff: false,
                is_superuser: false,
            },
        )
        .await
        .unwrap();
        let expired = SessionSettings {
            ttl_hours: -1,
            ..SessionSettings::default()
        };
        session::start(&db, &expired, user.id).await.unwrap();
        session::start(&db, &SessionSettings::default(), user.id).await.unwrap();

        assert_eq!(clear_sessions(&url).await.unwrap(), 1);

        let db = Database::connect(&url).await.unwrap();
        assert_eq!(Session::find().all(&db).await.unwrap().len(), 1);
    }
}
