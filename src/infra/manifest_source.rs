//! Manifest loading
//!
//! Turns manifest identifiers into text and then into the run's working set.
//! Library names are read from the library directory, paths from disk, and
//! URLs over HTTP with retry and exponential backoff.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;
use crate::core::manifest::{parse_manifest, ManifestRequest, ManifestSource};
use crate::core::scheduler::WorkingSet;
use crate::error::ManifestError;

/// Loads manifests from the library, local files, or HTTP(S)
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    /// HTTP client
    client: reqwest::Client,
    /// Library directory for bare names
    library: PathBuf,
    /// Maximum fetch attempts
    max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds)
    base_delay_ms: u64,
}

impl ManifestLoader {
    /// Create a loader reading bare names from `library`
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .connect_timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            library: library.into(),
            max_retries: defaults::MAX_MANIFEST_FETCH_RETRIES,
            base_delay_ms: defaults::MANIFEST_FETCH_BASE_DELAY_MS,
        }
    }

    /// Override retry settings
    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Library directory
    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Names of every manifest in the library, in lexical order
    pub fn list_library(&self) -> Result<Vec<String>, ManifestError> {
        let unreadable = |e: std::io::Error| ManifestError::LibraryUnreadable {
            path: self.library.clone(),
            error: e.to_string(),
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.library).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            if !entry.file_type().map_err(unreadable)?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!("Ignoring non-UTF-8 library entry {:?}", entry.file_name());
                continue;
            };
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load the text of one manifest
    pub async fn load(&self, request: &ManifestRequest) -> Result<String, ManifestError> {
        match &request.source {
            ManifestSource::Library(name) => {
                let path = self.library.join(name);
                if path.is_file() {
                    return read_local(&path).await;
                }
                // A bare name may still be a file in the working directory
                let local = Path::new(name);
                if local.is_file() {
                    return read_local(local).await;
                }
                Err(ManifestError::NotFound {
                    name: name.clone(),
                    library: self.library.clone(),
                })
            }
            ManifestSource::Path(path) => read_local(path).await,
            ManifestSource::Url(url) => self.fetch(url).await,
        }
    }

    /// Load and parse every requested manifest into one working set
    ///
    /// With `all`, `identifiers` is ignored and every library manifest is
    /// loaded. A library name that does not exist becomes an unknown tag, so
    /// the scheduler reports it as skipped. Any other load failure aborts.
    pub async fn load_working_set(
        &self,
        identifiers: &[String],
        all: bool,
    ) -> Result<WorkingSet, ManifestError> {
        let identifiers = if all {
            self.list_library()?
        } else {
            identifiers.to_vec()
        };

        let mut set = WorkingSet::new();
        for identifier in &identifiers {
            let request = ManifestRequest::parse(identifier)?;
            let unknown = request
                .requested_tag()
                .unwrap_or_else(|| request.name.clone());

            let text = match self.load(&request).await {
                Ok(text) => text,
                Err(e @ ManifestError::NotFound { .. }) => {
                    tracing::warn!("{e}");
                    set.add_unknown(unknown);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let parsed = parse_manifest(&request.name, &text, request.variant.as_deref());
            if parsed.units.is_empty() {
                tracing::warn!("{identifier} defines no matching images");
                set.add_unknown(unknown);
                continue;
            }
            for unit in parsed.units {
                set.add_unit(unit);
            }
        }

        Ok(set)
    }

    /// Fetch a remote manifest with retry logic
    async fn fetch(&self, url: &str) -> Result<String, ManifestError> {
        let mut attempts = 0;
        let mut delay_ms = self.base_delay_ms;

        loop {
            attempts += 1;
            match self.fetch_once(url).await {
                Ok(text) => return Ok(text),
                Err(Fetch::Permanent(e)) => return Err(e),
                Err(Fetch::Transient(e)) if attempts >= self.max_retries => return Err(e),
                Err(Fetch::Transient(e)) => {
                    tracing::debug!("Attempt {attempts} for {url} failed: {e}");
                    // Exponential backoff with cap at 10 seconds
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(10_000);
                }
            }
        }
    }

    /// Single fetch attempt without retry
    async fn fetch_once(&self, url: &str) -> Result<String, Fetch> {
        let failed = |error: String| ManifestError::FetchFailed {
            url: url.to_string(),
            error,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Fetch::Transient(failed(e.to_string())))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(Fetch::Permanent(failed(format!("HTTP {status}"))));
        }
        if !status.is_success() {
            return Err(Fetch::Transient(failed(format!("HTTP {status}"))));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Fetch::Transient(failed(e.to_string())))?;
            body.extend_from_slice(&chunk);
            if body.len() > defaults::MAX_MANIFEST_BYTES {
                return Err(Fetch::Permanent(failed(format!(
                    "manifest larger than {} bytes",
                    defaults::MAX_MANIFEST_BYTES
                ))));
            }
        }

        String::from_utf8(body).map_err(|e| Fetch::Permanent(failed(e.to_string())))
    }
}

/// Whether another attempt could succeed
enum Fetch {
    Transient(ManifestError),
    Permanent(ManifestError),
}

async fn read_local(path: &Path) -> Result<String, ManifestError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ManifestError::ReadFailed {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEBIAN: &str = "\
bookworm: https://example.com/debian.git@deadbeef bookworm
bullseye: https://example.com/debian.git@cafebabe bullseye
";

    fn library() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("debian"), DEBIAN).unwrap();
        std::fs::write(
            temp.path().join("alpine"),
            "3.19: https://example.com/alpine.git@v3.19\n",
        )
        .unwrap();
        std::fs::write(temp.path().join(".hidden"), "x: y@z\n").unwrap();
        std::fs::create_dir(temp.path().join("subdir")).unwrap();
        temp
    }

    #[test]
    fn test_list_library_is_sorted_files_only() {
        let temp = library();
        let loader = ManifestLoader::new(temp.path());
        assert_eq!(loader.list_library().unwrap(), vec!["alpine", "debian"]);
    }

    #[test]
    fn test_list_missing_library() {
        let temp = TempDir::new().unwrap();
        let loader = ManifestLoader::new(temp.path().join("missing"));
        assert!(matches!(
            loader.list_library(),
            Err(ManifestError::LibraryUnreadable { .. })
        ));
    }

    #[tokio::test]
    async fn test_working_set_for_single_variant() {
        let temp = library();
        let loader = ManifestLoader::new(temp.path());

        let set = loader
            .load_working_set(&["debian:bookworm".to_string()], false)
            .await
            .unwrap();

        assert_eq!(set.queue(), ["debian:bookworm"]);
    }

    #[tokio::test]
    async fn test_working_set_all_in_lexical_order() {
        let temp = library();
        let loader = ManifestLoader::new(temp.path());

        let set = loader.load_working_set(&[], true).await.unwrap();

        assert_eq!(
            set.queue(),
            ["alpine:3.19", "debian:bookworm", "debian:bullseye"]
        );
    }

    #[tokio::test]
    async fn test_unknown_names_and_variants_are_queued_as_unknown() {
        let temp = library();
        let loader = ManifestLoader::new(temp.path());

        let set = loader
            .load_working_set(
                &["nonexistent:latest".to_string(), "debian:sid".to_string()],
                false,
            )
            .await
            .unwrap();

        assert_eq!(set.queue(), ["nonexistent:latest", "debian:sid"]);
        assert_eq!(set.units().count(), 0);
    }

    #[tokio::test]
    async fn test_path_manifest() {
        let temp = library();
        let loader = ManifestLoader::new("/nonexistent-library");
        let identifier = format!("{}:bullseye", temp.path().join("debian").display());

        let set = loader.load_working_set(&[identifier], false).await.unwrap();

        assert_eq!(set.queue(), ["debian:bullseye"]);
    }

    #[tokio::test]
    async fn test_unreadable_path_is_fatal() {
        let temp = TempDir::new().unwrap();
        let loader = ManifestLoader::new(temp.path());
        let identifier = format!("{}", temp.path().join("missing/debian").display());

        let result = loader.load_working_set(&[identifier], false).await;
        assert!(matches!(result, Err(ManifestError::ReadFailed { .. })));
    }

    #[tokio::test]
    async fn test_fetch_remote_manifest() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/library/debian"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DEBIAN))
            .mount(&mock_server)
            .await;

        let loader = ManifestLoader::new("/nonexistent-library");
        let identifier = format!("{}/library/debian", mock_server.uri());

        let set = loader.load_working_set(&[identifier], false).await.unwrap();

        assert_eq!(set.queue(), ["debian:bookworm", "debian:bullseye"]);
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/library/debian"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/library/debian"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DEBIAN))
            .mount(&mock_server)
            .await;

        let loader = ManifestLoader::new("/nonexistent-library").with_retry(3, 10);
        let request =
            ManifestRequest::parse(&format!("{}/library/debian", mock_server.uri())).unwrap();

        assert_eq!(loader.load(&request).await.unwrap(), DEBIAN);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/library/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let loader = ManifestLoader::new("/nonexistent-library").with_retry(3, 10);
        let request =
            ManifestRequest::parse(&format!("{}/library/missing", mock_server.uri())).unwrap();

        let err = loader.load(&request).await.unwrap_err();
        assert!(matches!(err, ManifestError::FetchFailed { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/library/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let loader = ManifestLoader::new("/nonexistent-library").with_retry(2, 10);
        let request =
            ManifestRequest::parse(&format!("{}/library/flaky", mock_server.uri())).unwrap();

        assert!(loader.load(&request).await.is_err());
    }
}
