//! Subcommand implementations

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tiercache::{Locator, Resolver};
use tierstore::BlobStore;
use tracing::{error, info};

/// Retrieve every URL concurrently, writing one report line per URL
///
/// Report format: `<status>\t<bytes>\t<key>\t<url>`, or
/// `error\t-\t-\t<url>: <reason>` for failures.
///
/// # Returns
/// * `Result<usize>` - Number of failed retrievals
pub async fn get<W: Write>(
    cache: &Resolver,
    urls: &[String],
    output: Option<&Path>,
    report: &mut W,
) -> Result<usize> {
    if output.is_some() && urls.len() != 1 {
        bail!("--output needs exactly one URL, got {}", urls.len());
    }

    let results = futures::future::join_all(urls.iter().map(|url| cache.retrieve(url))).await;

    let mut failed = 0;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(hit) => {
                let key = Locator::parse(url)?.key();
                writeln!(report, "{}\t{}\t{}\t{}", hit.status, hit.data.len(), key, url)?;

                if let Some(path) = output {
                    write_output(path, &hit.data)?;
                }
            }
            Err(e) => {
                error!(url = %url, error = %e, "retrieval failed");
                writeln!(report, "error\t-\t-\t{}: {}", url, e)?;
                failed += 1;
            }
        }
    }

    let stats = cache.stats();
    info!(
        cache = cache.namespace(),
        memory_hits = stats.memory_hits(),
        disk_hits = stats.disk_hits(),
        fetches = stats.fetches(),
        coalesced = stats.coalesced(),
        "done"
    );

    Ok(failed)
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if path == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(data)?;
        stdout.flush()?;
    } else {
        std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Print the keys stored on disk for a cache, one per line
pub fn list<W: Write>(store: &BlobStore, name: &str, out: &mut W) -> Result<usize> {
    let keys = store.keys(name)?;
    for key in &keys {
        writeln!(out, "{}", key)?;
    }
    Ok(keys.len())
}

/// Delete every blob stored on disk for a cache
pub fn purge(store: &BlobStore, name: &str) -> Result<usize> {
    let removed = store.clear(name)?;
    info!(cache = name, removed, "purged");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tiercache::{CacheRegistry, FetchError, Fetcher};

    /// Echoes the URL path back as the payload; `/missing` is a 404
    struct PathFetcher;

    #[async_trait]
    impl Fetcher for PathFetcher {
        async fn fetch(&self, locator: &Locator) -> Result<Bytes, FetchError> {
            match locator.url().path() {
                "/missing" => Err(FetchError::Status(404)),
                path => Ok(Bytes::copy_from_slice(path.as_bytes())),
            }
        }
    }

    fn setup(dir: &TempDir) -> (Arc<BlobStore>, Resolver) {
        let store = Arc::new(BlobStore::open(dir.path()).unwrap());
        let registry = CacheRegistry::builder(store.clone(), Arc::new(PathFetcher))
            .build()
            .unwrap();
        let cache = registry.cache_with_name("images").unwrap();
        (store, cache)
    }

    #[tokio::test]
    async fn test_get_reports_each_url() {
        let dir = TempDir::new().unwrap();
        let (_store, cache) = setup(&dir);

        let urls = vec!["https://x/a.png".to_string(), "https://x/missing".to_string()];
        let mut report = Vec::new();
        let failed = get(&cache, &urls, None, &mut report).await.unwrap();

        assert_eq!(failed, 1);
        let report = String::from_utf8(report).unwrap();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines.len(), 2);

        let key = Locator::parse("https://x/a.png").unwrap().key();
        assert_eq!(lines[0], format!("network\t6\t{}\thttps://x/a.png", key));
        assert!(lines[1].starts_with("error\t-\t-\thttps://x/missing: "));
    }

    #[tokio::test]
    async fn test_get_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let (_store, cache) = setup(&dir);
        let out = dir.path().join("out.bin");

        let urls = vec!["https://x/a.png".to_string()];
        let failed = get(&cache, &urls, Some(out.as_path()), &mut Vec::<u8>::new()).await.unwrap();

        assert_eq!(failed, 0);
        assert_eq!(std::fs::read(&out).unwrap(), b"/a.png");
    }

    #[tokio::test]
    async fn test_get_output_needs_single_url() {
        let dir = TempDir::new().unwrap();
        let (_store, cache) = setup(&dir);

        let urls = vec!["https://x/a.png".to_string(), "https://x/b.png".to_string()];
        let result = get(&cache, &urls, Some(Path::new("-")), &mut Vec::<u8>::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_and_purge() {
        let dir = TempDir::new().unwrap();
        let (store, cache) = setup(&dir);

        let urls = vec!["https://x/a.png".to_string(), "https://x/b.png".to_string()];
        get(&cache, &urls, None, &mut Vec::<u8>::new()).await.unwrap();

        let mut out = Vec::new();
        assert_eq!(list(&store, "images", &mut out).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);

        assert_eq!(purge(&store, "images").unwrap(), 2);
        assert_eq!(list(&store, "images", &mut Vec::<u8>::new()).unwrap(), 0);
    }
}
