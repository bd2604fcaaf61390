#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! The Detail Registry: syncs content-addressed blobs from a filesystem
//! directory into the [`Store`](providerd_store::Store) on boot, and writes
//! new blobs back to disk so the next boot preserves them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use providerd_types::detail::{Cid, DetailBlob};
use providerd_types::Address;
use providerd_store::Store;

/// Recursively reads every regular file under `dir`, builds a [`DetailBlob`]
/// for each, and calls `Store::sync_detail_files` so the store's CID set
/// exactly matches what's on disk. Returns the number of blobs synced.
pub async fn sync_from_directory(store: &dyn Store, dir: &Path) -> Result<usize> {
    let blobs = read_directory(dir)?;
    let count = blobs.len();
    store
        .sync_detail_files(blobs)
        .await
        .with_context(|| format!("syncing detail files from {}", dir.display()))?;
    tracing::info!(
        target: "registry",
        event = "sync_complete",
        count,
        directory = %dir.display(),
    );
    Ok(count)
}

fn read_directory(dir: &Path) -> Result<Vec<DetailBlob>> {
    if !dir.exists() {
        tracing::warn!(
            target: "registry",
            event = "directory_missing",
            directory = %dir.display(),
            "detail directory does not exist; starting with an empty registry",
        );
        return Ok(Vec::new());
    }
    let mut blobs = Vec::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let content = std::fs::read(entry.path())
            .with_context(|| format!("reading detail file {}", entry.path().display()))?;
        blobs.push(DetailBlob::new(content));
    }
    Ok(blobs)
}

/// Naming convention for a virtual-provider details file written back to
/// disk after `POST /virtual-providers` (§6 of the design docs).
pub fn vprov_details_filename(owner_address: &Address, cid: &Cid) -> String {
    format!("vprov.{}.details.{}.json", normalized(owner_address), cid)
}

/// Naming convention for a virtual-provider offer details file written back
/// to disk after `POST /virtual-providers/offers`.
pub fn vprov_offer_details_filename(
    owner_address: &Address,
    offer_id: u64,
    protocol_address: &Address,
    cid: &Cid,
) -> String {
    format!(
        "vprov.{}.offer.{}.{}.details.{}.json",
        normalized(owner_address),
        offer_id,
        normalized(protocol_address),
        cid
    )
}

fn normalized(address: &Address) -> String {
    address.as_str().trim_start_matches("0x").to_string()
}

/// Writes `content` under `dir/filename`, creating parent directories as
/// needed. Used for the write-back side of vPROV registration so the next
/// boot's directory sync preserves the blob.
pub fn write_back(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating detail directory {}", dir.display()))?;
    let path = dir.join(filename);
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use providerd_store::memory::MemoryStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sync_picks_up_nested_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("sub/b.json"), b"{\"x\":1}").unwrap();

        let store = MemoryStore::new();
        let count = sync_from_directory(&store, dir.path()).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn second_sync_deletes_removed_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("b.json"), b"{\"x\":1}").unwrap();

        let store = MemoryStore::new();
        sync_from_directory(&store, dir.path()).await.unwrap();
        let a_cid = Cid::of(b"{}");
        assert!(store.get_detail(&a_cid).await.unwrap().is_some());

        std::fs::remove_file(dir.path().join("a.json")).unwrap();
        sync_from_directory(&store, dir.path()).await.unwrap();
        assert!(store.get_detail(&a_cid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_directory_syncs_empty() {
        let store = MemoryStore::new();
        let count = sync_from_directory(&store, Path::new("/nonexistent/path/xyz")).await.unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn write_back_filename_conventions() {
        let owner: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let cid = Cid::of(b"hello");
        let name = vprov_details_filename(&owner, &cid);
        assert!(name.starts_with("vprov."));
        assert!(name.ends_with(".json"));
    }
}
