use crate::core::model::{GameRecord, GameSource, Platform};
use crate::error::LibraryError;
use anyhow::Context;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

/// SQLite catalogue of known games.
#[derive(Clone)]
pub struct LibraryStore {
    pool: SqlitePool,
}

impl LibraryStore {
    pub async fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await
                .with_context(|| format!("create_dir_all {}", parent.display()))?;
        }

        let abs = if db_path.is_absolute() {
            db_path.to_path_buf()
        } else {
            std::env::current_dir()
                .with_context(|| "current_dir")?
                .join(db_path)
        };

        let mut p = abs.to_string_lossy().to_string();
        if cfg!(windows) {
            p = p.replace('\\', "/");
        }

        // mode=rwc creates the file on first use
        let url = if p.starts_with('/') {
            format!("sqlite://{}?mode=rwc", p)
        } else {
            format!("sqlite:///{}?mode=rwc", p)
        };

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .with_context(|| format!("connect sqlite url={} (file={})", url, abs.display()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS games (
              id TEXT PRIMARY KEY,
              title TEXT NOT NULL,
              source TEXT NOT NULL,
              platform TEXT NULL,
              install_path TEXT NULL,
              executable TEXT NULL,
              updated_at INTEGER NOT NULL
            );
            "#,
        )
            .execute(&self.pool)
            .await
            .context("create games table")?;

        Ok(())
    }

    fn now_epoch() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    pub async fn upsert(&self, game: &GameRecord) -> Result<(), LibraryError> {
        sqlx::query(
            r#"
            INSERT INTO games (id, title, source, platform, install_path, executable, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
              title = excluded.title,
              source = excluded.source,
              platform = excluded.platform,
              install_path = excluded.install_path,
              executable = excluded.executable,
              updated_at = excluded.updated_at;
            "#,
        )
            .bind(&game.id)
            .bind(&game.title)
            .bind(game.source.as_str())
            .bind(game.platform.map(|p| p.as_str()))
            .bind(game.install_path.as_deref().map(path_to_string))
            .bind(game.executable.as_deref().map(path_to_string))
            .bind(Self::now_epoch())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<GameRecord>, LibraryError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, source, platform, install_path, executable
            FROM games
            WHERE id = ?;
            "#,
        )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_game).transpose()
    }

    pub async fn list(&self) -> Result<Vec<GameRecord>, LibraryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, source, platform, install_path, executable
            FROM games
            ORDER BY title COLLATE NOCASE ASC;
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_game).collect()
    }

    pub async fn remove(&self, id: &str) -> Result<bool, LibraryError> {
        let res = sqlx::query(r#"DELETE FROM games WHERE id = ?"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

fn path_to_string(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn row_to_game(r: &SqliteRow) -> Result<GameRecord, LibraryError> {
    let id: String = r.try_get("id")?;
    let source: String = r.try_get("source")?;
    let source = source
        .parse::<GameSource>()
        .map_err(|e| LibraryError::Corrupt(format!("{}: {}", id, e)))?;
    let platform = r
        .try_get::<Option<String>, _>("platform")?
        .map(|p| p.parse::<Platform>())
        .transpose()
        .map_err(|e| LibraryError::Corrupt(format!("{}: {}", id, e)))?;

    Ok(GameRecord {
        title: r.try_get("title")?,
        source,
        platform,
        install_path: r.try_get::<Option<String>, _>("install_path")?.map(PathBuf::from),
        executable: r.try_get::<Option<String>, _>("executable")?.map(PathBuf::from),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_get_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(&dir.path().join("lib.sqlite")).await.unwrap();

        let mut remote = GameRecord::remote("Sugar", "sugar rush");
        let local = GameRecord::local("Alpha", dir.path().join("alpha"), PathBuf::from("alpha.exe"), Platform::Windows);
        store.upsert(&remote).await.unwrap();
        store.upsert(&local).await.unwrap();

        let loaded = store.get(&local.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Alpha");
        assert_eq!(loaded.source, GameSource::Local);
        assert_eq!(loaded.platform, Some(Platform::Windows));
        assert_eq!(loaded.executable, Some(PathBuf::from("alpha.exe")));

        remote.install_path = Some(PathBuf::from("/games/sugar"));
        remote.platform = Some(Platform::Native);
        store.upsert(&remote).await.unwrap();
        let loaded = store.get("Sugar").await.unwrap().unwrap();
        assert_eq!(loaded.install_path, Some(PathBuf::from("/games/sugar")));

        let titles: Vec<_> = store.list().await.unwrap().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, vec!["Alpha", "sugar rush"]);

        assert!(store.remove("Sugar").await.unwrap());
        assert!(!store.remove("Sugar").await.unwrap());
        assert!(store.get("Sugar").await.unwrap().is_none());
    }
}
