use crate::core::model::{GameRecord, GameSource, Platform};
use crate::core::store::LibraryStore;
use crate::error::LibraryError;
use crate::plugins::registry::{GameLocator, InstallInfo};
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};

/// Catalogue of known games on top of [`LibraryStore`].
#[derive(Clone)]
pub struct GameLibrary {
    store: LibraryStore,
}

impl GameLibrary {
    pub fn new(store: LibraryStore) -> Self {
        Self { store }
    }

    pub async fn add_local(
        &self,
        title: &str,
        install_path: PathBuf,
        executable: PathBuf,
        platform: Platform,
    ) -> Result<GameRecord, LibraryError> {
        let game = GameRecord::local(title, install_path, executable, platform);
        self.store.upsert(&game).await?;
        tracing::info!(game_id = %game.id, game = %game.title, "local game imported");
        Ok(game)
    }

    pub async fn upsert(&self, game: &GameRecord) -> Result<(), LibraryError> {
        self.store.upsert(game).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<GameRecord>, LibraryError> {
        self.store.get(id).await
    }

    pub async fn require(&self, id: &str) -> Result<GameRecord, LibraryError> {
        self.store.get(id).await?.ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<GameRecord>, LibraryError> {
        self.store.list().await
    }

    pub async fn remove(&self, id: &str) -> Result<bool, LibraryError> {
        self.store.remove(id).await
    }

    /// Returns install info for `game`, asking `locator` on a cache miss and
    /// remembering the answer.
    ///
    /// `Ok(None)` means the location is unknown (not installed, or the locator
    /// has no record of it). Local games never consult the locator.
    pub async fn resolve(
        &self,
        game: &mut GameRecord,
        locator: &dyn GameLocator,
    ) -> anyhow::Result<Option<InstallInfo>> {
        if let (Some(install_path), Some(platform)) = (&game.install_path, game.platform) {
            return Ok(Some(InstallInfo {
                install_path: install_path.clone(),
                platform,
                executable: game.executable.clone(),
            }));
        }
        if game.source == GameSource::Local {
            return Ok(None);
        }

        let Some(info) = locator.locate(game).await? else {
            tracing::debug!(game = %game.title, "install location unknown");
            return Ok(None);
        };

        game.install_path = Some(info.install_path.clone());
        game.platform = Some(info.platform);
        if info.executable.is_some() {
            game.executable = info.executable.clone();
        }
        self.store.upsert(game).await?;
        Ok(Some(info))
    }

    /// Moves a local game's folder into `destination_dir`.
    ///
    /// The folder keeps a sanitized form of the title as its name. On success
    /// the stored record points at the new location.
    pub async fn move_local(&self, id: &str, destination_dir: &Path) -> Result<GameRecord, LibraryError> {
        let mut game = self.require(id).await?;
        if game.source != GameSource::Local {
            return Err(LibraryError::NotLocal(game.title));
        }
        let from = game
            .install_path
            .clone()
            .ok_or_else(|| LibraryError::NotInstalled(game.title.clone()))?;

        let to = destination_dir.join(sanitize(&game.title));

        if tokio::fs::metadata(&to).await.is_ok() {
            return Err(LibraryError::DestinationExists(to));
        }
        if let Err(source) = tokio::fs::create_dir_all(destination_dir).await {
            return Err(LibraryError::Move { from, to, source });
        }
        if let Err(source) = tokio::fs::rename(&from, &to).await {
            return Err(LibraryError::Move { from, to, source });
        }

        tracing::info!(game = %game.title, from = %from.display(), to = %to.display(), "local game moved");
        game.install_path = Some(to);
        self.store.upsert(&game).await?;
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLocator {
        answer: Option<InstallInfo>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GameLocator for FixedLocator {
        async fn locate(&self, _game: &GameRecord) -> anyhow::Result<Option<InstallInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    async fn library(dir: &Path) -> GameLibrary {
        GameLibrary::new(LibraryStore::open(&dir.join("lib.sqlite")).await.unwrap())
    }

    #[tokio::test]
    async fn resolve_caches_located_info() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library(dir.path()).await;
        let locator = FixedLocator {
            answer: Some(InstallInfo {
                install_path: PathBuf::from("/games/Sugar"),
                platform: Platform::Windows,
                executable: Some(PathBuf::from("Sugar.exe")),
            }),
            calls: AtomicUsize::new(0),
        };

        let mut game = GameRecord::remote("Sugar", "Sugar");
        let first = lib.resolve(&mut game, &locator).await.unwrap();
        let second = lib.resolve(&mut game, &locator).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);

        let stored = lib.require("Sugar").await.unwrap();
        assert_eq!(stored.install_path, Some(PathBuf::from("/games/Sugar")));
        assert_eq!(stored.platform, Some(Platform::Windows));
    }

    #[tokio::test]
    async fn removed_game_is_no_longer_required() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library(dir.path()).await;
        lib.upsert(&GameRecord::remote("Sugar", "Sugar")).await.unwrap();

        assert!(lib.remove("Sugar").await.unwrap());
        assert!(matches!(lib.require("Sugar").await, Err(LibraryError::NotFound(_))));
        assert!(!lib.remove("Sugar").await.unwrap());
    }

    #[tokio::test]
    async fn resolve_unknown_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library(dir.path()).await;
        let locator = FixedLocator { answer: None, calls: AtomicUsize::new(0) };

        let mut game = GameRecord::remote("Ghost", "Ghost");
        assert_eq!(lib.resolve(&mut game, &locator).await.unwrap(), None);
        assert!(game.install_path.is_none());
    }

    #[tokio::test]
    async fn move_local_relocates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library(dir.path()).await;
        let src = dir.path().join("old").join("Alpha");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("alpha.sh"), "#!/bin/sh\n").unwrap();

        let game = lib
            .add_local("Alpha", src.clone(), PathBuf::from("alpha.sh"), Platform::Native)
            .await
            .unwrap();
        let dest = dir.path().join("new");
        let moved = lib.move_local(&game.id, &dest).await.unwrap();

        assert_eq!(moved.install_path, Some(dest.join("Alpha")));
        assert!(dest.join("Alpha").join("alpha.sh").exists());
        assert!(!src.exists());
        assert_eq!(lib.require(&game.id).await.unwrap().install_path, Some(dest.join("Alpha")));
    }

    #[tokio::test]
    async fn move_local_reports_typed_errors() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library(dir.path()).await;

        assert!(matches!(
            lib.move_local("missing", dir.path()).await,
            Err(LibraryError::NotFound(_))
        ));

        lib.upsert(&GameRecord::remote("Sugar", "Sugar")).await.unwrap();
        assert!(matches!(
            lib.move_local("Sugar", dir.path()).await,
            Err(LibraryError::NotLocal(_))
        ));

        let src = dir.path().join("Beta");
        std::fs::create_dir_all(&src).unwrap();
        let taken = dir.path().join("dest").join("Beta");
        std::fs::create_dir_all(&taken).unwrap();
        let game = lib
            .add_local("Beta", src.clone(), PathBuf::from("beta"), Platform::Native)
            .await
            .unwrap();
        assert!(matches!(
            lib.move_local(&game.id, &dir.path().join("dest")).await,
            Err(LibraryError::DestinationExists(_))
        ));

        let gone = lib
            .add_local("Gone", dir.path().join("does-not-exist"), PathBuf::from("gone"), Platform::Native)
            .await
            .unwrap();
        assert!(matches!(
            lib.move_local(&gone.id, &dir.path().join("elsewhere")).await,
            Err(LibraryError::Move { .. })
        ));
        assert!(src.exists());
    }
}
