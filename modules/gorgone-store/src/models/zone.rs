use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use gorgone_common::types::{Zone, ZoneSettings};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ZoneRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub tweet_enabled: bool,
    pub video_enabled: bool,
    pub news_enabled: bool,
    pub settings: serde_json::Value,
    pub is_active: bool,
}

impl ZoneRow {
    /// Zones are created and updated by external collaborators; the core
    /// only ever reads them.
    pub async fn find(id: Uuid, pool: &PgPool) -> Result<Option<Zone>> {
        let row = sqlx::query_as::<_, Self>(
            "SELECT id, client_id, tweet_enabled, video_enabled, news_enabled, settings, is_active
             FROM zones WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(ZoneRow::into_zone))
    }

    fn into_zone(self) -> Zone {
        let settings: ZoneSettings =
            serde_json::from_value(self.settings).unwrap_or_default();
        Zone {
            id: self.id,
            client_id: self.client_id,
            tweet_enabled: self.tweet_enabled,
            video_enabled: self.video_enabled,
            news_enabled: self.news_enabled,
            settings,
            is_active: self.is_active,
        }
    }
}
