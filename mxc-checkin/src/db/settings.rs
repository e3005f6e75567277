//! Settings database operations
//!
//! Key/value accessors over the `settings` table.

use mxc_common::{Error, Result};
use mxc_screensaver::ScreensaverConfig;
use sqlx::{Pool, Sqlite};

pub const BITRIX_WEBHOOK_URL: &str = "bitrix_webhook_url";
pub const SCREENSAVER_SLIDE_SECS: &str = "screensaver_slide_secs";
pub const SCREENSAVER_TAGLINE_SECS: &str = "screensaver_tagline_secs";
pub const SCREENSAVER_MEDIA: &str = "screensaver_media";
pub const SCREENSAVER_TAGLINES: &str = "screensaver_taglines";

/// Bitrix24 webhook base stored by an admin, if any
pub async fn get_bitrix_webhook_url(db: &Pool<Sqlite>) -> Result<Option<String>> {
    Ok(get_setting::<String>(db, BITRIX_WEBHOOK_URL)
        .await?
        .filter(|url| !url.trim().is_empty()))
}

pub async fn set_bitrix_webhook_url(db: &Pool<Sqlite>, url: Option<&str>) -> Result<()> {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => set_setting(db, BITRIX_WEBHOOK_URL, url).await,
        None => delete_setting(db, BITRIX_WEBHOOK_URL).await,
    }
}

/// Resolve the webhook URL: database, then the resolved configuration
/// (CLI, environment, TOML)
pub async fn resolve_bitrix_webhook_url(
    db: &Pool<Sqlite>,
    configured: Option<&str>,
) -> Result<Option<String>> {
    if let Some(url) = get_bitrix_webhook_url(db).await? {
        tracing::debug!("Bitrix24 webhook URL from database");
        return Ok(Some(url));
    }
    Ok(configured.map(str::to_string))
}

/// Screensaver playlist and cadence
pub async fn load_screensaver_config(db: &Pool<Sqlite>) -> Result<ScreensaverConfig> {
    let defaults = ScreensaverConfig::default();
    Ok(ScreensaverConfig {
        media: get_json_setting(db, SCREENSAVER_MEDIA).await?.unwrap_or_default(),
        taglines: get_json_setting(db, SCREENSAVER_TAGLINES).await?.unwrap_or_default(),
        slide_secs: get_setting(db, SCREENSAVER_SLIDE_SECS).await?.unwrap_or(defaults.slide_secs),
        tagline_secs: get_setting(db, SCREENSAVER_TAGLINE_SECS).await?.unwrap_or(defaults.tagline_secs),
    })
}

pub async fn save_screensaver_config(db: &Pool<Sqlite>, config: &ScreensaverConfig) -> Result<()> {
    if config.slide_secs == 0 || config.tagline_secs == 0 {
        return Err(Error::InvalidInput(
            "Slide and tagline periods must be at least one second".to_string(),
        ));
    }
    if config.media.iter().any(|m| m.id.trim().is_empty() || m.url.trim().is_empty()) {
        return Err(Error::InvalidInput("Every media item needs an id and a url".to_string()));
    }

    let mut tx = db.begin().await?;
    for (key, value) in [
        (SCREENSAVER_MEDIA, serde_json::to_string(&config.media)?),
        (SCREENSAVER_TAGLINES, serde_json::to_string(&config.taglines)?),
        (SCREENSAVER_SLIDE_SECS, config.slide_secs.to_string()),
        (SCREENSAVER_TAGLINE_SECS, config.tagline_secs.to_string()),
    ] {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

/// JSON-valued setting
pub async fn get_json_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    match get_setting::<String>(db, key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json_setting<T>(db: &Pool<Sqlite>, key: &str, value: &T) -> Result<()>
where
    T: serde::Serialize,
{
    set_setting(db, key, serde_json::to_string(value)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        mxc_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_defaults_seeded() {
        let pool = setup_test_db().await;
        let slide: Option<u64> = get_setting(&pool, SCREENSAVER_SLIDE_SECS).await.unwrap();
        assert_eq!(slide, Some(7));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let pool = setup_test_db().await;
        set_setting(&pool, "k", 1).await.unwrap();
        set_setting(&pool, "k", 2).await.unwrap();
        assert_eq!(get_setting::<i64>(&pool, "k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_parse_failure_is_config_error() {
        let pool = setup_test_db().await;
        set_setting(&pool, "k", "abc").await.unwrap();
        let err = get_setting::<i64>(&pool, "k").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_webhook_url_database_wins() {
        let pool = setup_test_db().await;
        assert_eq!(
            resolve_bitrix_webhook_url(&pool, Some("https://from-config")).await.unwrap().as_deref(),
            Some("https://from-config")
        );

        set_bitrix_webhook_url(&pool, Some("https://from-db")).await.unwrap();
        assert_eq!(
            resolve_bitrix_webhook_url(&pool, Some("https://from-config")).await.unwrap().as_deref(),
            Some("https://from-db")
        );

        set_bitrix_webhook_url(&pool, Some("  ")).await.unwrap();
        assert_eq!(resolve_bitrix_webhook_url(&pool, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_screensaver_config_roundtrip() {
        use mxc_screensaver::engine::{MediaItem, MediaKind};

        let pool = setup_test_db().await;
        let loaded = load_screensaver_config(&pool).await.unwrap();
        assert_eq!(loaded, ScreensaverConfig::default());

        let config = ScreensaverConfig {
            media: vec![MediaItem { id: "a".into(), url: "/media/a.jpg".into(), kind: MediaKind::Image }],
            taglines: vec!["Bem-vinda".into()],
            slide_secs: 10,
            tagline_secs: 8,
        };
        save_screensaver_config(&pool, &config).await.unwrap();
        assert_eq!(load_screensaver_config(&pool).await.unwrap(), config);

        let bad = ScreensaverConfig { slide_secs: 0, ..config };
        assert!(matches!(save_screensaver_config(&pool, &bad).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_json_setting() {
        let pool = setup_test_db().await;
        set_json_setting(&pool, SCREENSAVER_TAGLINES, &vec!["a", "b"]).await.unwrap();
        let taglines: Vec<String> = get_json_setting(&pool, SCREENSAVER_TAGLINES).await.unwrap().unwrap();
        assert_eq!(taglines, vec!["a", "b"]);
    }
}
