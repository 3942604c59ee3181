//! Snipe list
//!
//! A plain-text allow-list of mints, one per line. Blank lines and `#` comments
//! are ignored; lines that are not valid public keys are skipped with a warning.

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

pub struct SnipeList {
    path: PathBuf,
    mints: RwLock<HashSet<Pubkey>>,
}

impl SnipeList {
    /// An empty list backed by `path`. Call [`SnipeList::reload`] to read it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mints: RwLock::new(HashSet::new()),
        }
    }

    /// Create and read the list
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let list = Self::new(path);
        list.reload().await?;
        Ok(list)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and swap in its contents
    pub async fn reload(&self) -> Result<usize> {
        let data = tokio::fs::read_to_string(&self.path).await?;
        let mints = parse(&data);
        let count = mints.len();
        self.replace(mints).await;
        debug!(path = %self.path.display(), count, "Snipe list loaded");
        Ok(count)
    }

    pub async fn replace(&self, mints: HashSet<Pubkey>) {
        *self.mints.write().await = mints;
    }

    pub async fn contains(&self, mint: &Pubkey) -> bool {
        self.mints.read().await.contains(mint)
    }

    pub async fn len(&self) -> usize {
        self.mints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mints.read().await.is_empty()
    }

    /// Sorted copy of the current entries
    pub async fn entries(&self) -> Vec<Pubkey> {
        let mut mints: Vec<Pubkey> = self.mints.read().await.iter().copied().collect();
        mints.sort();
        mints
    }

    /// Reload the file every `every` until `cancel` fires. Failed reloads keep
    /// the previous contents.
    pub fn spawn_refresh(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            if every.is_zero() {
                return;
            }

            info!(path = %self.path.display(), "Snipe list refresh every {}ms", every.as_millis());
            let mut interval = tokio::time::interval(every);
            // First tick fires immediately; the list was loaded at startup
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.reload().await {
                            warn!(path = %self.path.display(), error = %e, "Failed to refresh snipe list");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("Snipe list refresh stopped");
                        break;
                    }
                }
            }
        })
    }
}

fn parse(data: &str) -> HashSet<Pubkey> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match Pubkey::from_str(line) {
            Ok(mint) => Some(mint),
            Err(e) => {
                warn!(line, error = %e, "Skipping invalid snipe list entry");
                None
            }
        })
        .collect()
}
