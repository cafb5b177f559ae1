use crate::error::UpdateError;
use crate::net::NetContext;
use crate::types::Coordinate;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Response, StatusCode};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Expand a mirror template for one artifact file.
pub fn build_url(template: &str, coordinate: &Coordinate) -> String {
    template
        .replace("{group}", &coordinate.group)
        .replace("{project}", &coordinate.project)
        .replace("{extension}", &coordinate.extension)
        .replace("{version}", &coordinate.version)
}

/// Why a single mirror did not deliver.
#[derive(Debug)]
enum Miss {
    NotFound(String),
    Failed(String),
}

impl Miss {
    fn describe(&self) -> &str {
        match self {
            Miss::NotFound(msg) | Miss::Failed(msg) => msg,
        }
    }
}

/// Fetches repository files from an ordered list of mirrors, primary first.
pub struct MirrorFetcher {
    client: reqwest::Client,
    mirrors: Vec<String>,
    listing_bases: Vec<String>,
}

impl MirrorFetcher {
    pub fn new(ctx: &NetContext, mirrors: Vec<String>, listing_bases: Vec<String>) -> Self {
        Self {
            client: ctx.client().clone(),
            mirrors,
            listing_bases,
        }
    }

    pub fn mirror_urls(&self, coordinate: &Coordinate) -> Vec<String> {
        self.mirrors
            .iter()
            .map(|template| build_url(template, coordinate))
            .collect()
    }

    async fn request(&self, url: &str) -> Result<Response, Miss> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Miss::Failed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(Miss::NotFound(format!("{}: HTTP {}", url, status)));
        }
        // Some mirrors answer 200 and put the real status in a header.
        if response
            .headers()
            .get("status")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "404")
        {
            return Err(Miss::NotFound(format!("{}: status header 404", url)));
        }
        if !status.is_success() {
            return Err(Miss::Failed(format!("{}: HTTP {}", url, status)));
        }

        Ok(response)
    }

    async fn fetch_first(&self, target: &str, urls: Vec<String>) -> Result<Response, UpdateError> {
        if urls.is_empty() {
            return Err(UpdateError::FetchFailed {
                context: format!("No mirrors configured for {}", target),
                failures: vec![],
            });
        }

        let mut misses = Vec::new();
        for (index, url) in urls.iter().enumerate() {
            tracing::debug!("GET {}", url);
            match self.request(url).await {
                Ok(response) => {
                    if index > 0 {
                        tracing::info!("Fetched {} from fallback mirror {}", target, url);
                    }
                    return Ok(response);
                }
                Err(miss) => {
                    if index + 1 < urls.len() {
                        tracing::warn!("{}, trying next mirror", miss.describe());
                    } else {
                        tracing::debug!("{}", miss.describe());
                    }
                    misses.push(miss);
                }
            }
        }

        if misses.iter().all(|m| matches!(m, Miss::NotFound(_))) {
            Err(UpdateError::ArtifactNotFound {
                target: target.to_string(),
                urls,
            })
        } else {
            Err(UpdateError::FetchFailed {
                context: format!("Failed to fetch {}", target),
                failures: misses.iter().map(|m| m.describe().to_string()).collect(),
            })
        }
    }

    /// Open a streaming response for `coordinate` from the first mirror that has it.
    pub async fn fetch(&self, coordinate: &Coordinate) -> Result<Response, UpdateError> {
        self.fetch_first(&coordinate.to_string(), self.mirror_urls(coordinate))
            .await
    }

    pub async fn fetch_text(&self, coordinate: &Coordinate) -> Result<String, UpdateError> {
        let response = self.fetch(coordinate).await?;
        read_text(response, &coordinate.to_string()).await
    }

    pub async fn fetch_jar(
        &self,
        group: &str,
        project: &str,
        version: &str,
    ) -> Result<Response, UpdateError> {
        self.fetch(&Coordinate::new(group, project, version, "jar"))
            .await
    }

    pub async fn fetch_pom(
        &self,
        group: &str,
        project: &str,
        version: &str,
    ) -> Result<Response, UpdateError> {
        self.fetch(&Coordinate::new(group, project, version, "pom"))
            .await
    }

    /// The POM of one version, as text.
    pub async fn fetch_pom_text(
        &self,
        group: &str,
        project: &str,
        version: &str,
    ) -> Result<String, UpdateError> {
        let response = self.fetch_pom(group, project, version).await?;
        read_text(response, &format!("{}/{}-{}.pom", group, project, version)).await
    }

    /// The repository directory listing at `path`, e.g. `/net/mamoe/mirai-console/`.
    pub async fn fetch_listing(&self, path: &str) -> Result<String, UpdateError> {
        let urls = self
            .listing_bases
            .iter()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), path))
            .collect();
        let response = self.fetch_first(path, urls).await?;
        read_text(response, path).await
    }

    /// Stream the jar of `coordinate` into a temporary file inside `dir`.
    ///
    /// The file is removed again when the returned handle is dropped without being
    /// persisted, so an interrupted download never shows up under a real name.
    pub async fn download(
        &self,
        coordinate: &Coordinate,
        dir: &Path,
    ) -> Result<NamedTempFile, UpdateError> {
        let file_name = coordinate.file_name();
        tracing::info!("Downloading {}...", file_name);

        let response = self
            .fetch_jar(&coordinate.group, &coordinate.project, &coordinate.version)
            .await?;
        let total_size = response.content_length().unwrap_or(0);

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(format!("Downloading {}", file_name));

        let mut file = NamedTempFile::new_in(dir)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                pb.abandon_with_message("Download interrupted");
                UpdateError::FetchFailed {
                    context: format!("Download of {} interrupted", file_name),
                    failures: vec![e.to_string()],
                }
            })?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush()?;

        pb.finish_with_message("Download complete");
        tracing::debug!("Downloaded {} bytes of {}", downloaded, file_name);
        Ok(file)
    }
}

async fn read_text(response: Response, target: &str) -> Result<String, UpdateError> {
    response
        .text()
        .await
        .map_err(|e| UpdateError::FetchFailed {
            context: format!("Failed to read {}", target),
            failures: vec![e.to_string()],
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JAR_PATH: &str = "net/mamoe/mirai-console/2.3.1/mirai-console-2.3.1.jar";

    fn jar() -> Coordinate {
        Coordinate::new("net/mamoe", "mirai-console", "2.3.1", "jar")
    }

    fn fetcher_for(primary: &str, secondary: &str) -> MirrorFetcher {
        let template = "{group}/{project}/{version}/{project}-{version}.{extension}";
        MirrorFetcher::new(
            &NetContext::direct().unwrap(),
            vec![
                format!("{}/primary/{}", primary, template),
                format!("{}/secondary/{}", secondary, template),
            ],
            vec![format!("{}/primary", primary), format!("{}/secondary", secondary)],
        )
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url(
                "https://repo.example/{group}/{project}/{version}/{project}-{version}.{extension}",
                &Coordinate::new("net/mamoe", "mirai-console", "0.5.2", "pom")
            ),
            "https://repo.example/net/mamoe/mirai-console/0.5.2/mirai-console-0.5.2.pom"
        );
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_is_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/primary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/secondary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        let body = fetcher.fetch(&jar()).await.unwrap().bytes().await.unwrap();
        assert_eq!(&body[..], b"jar-bytes");
    }

    #[tokio::test]
    async fn test_status_header_404_counts_as_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/primary/{}", JAR_PATH)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("status", "404")
                    .set_body_string("not really here"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/secondary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_string("real"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        assert_eq!(fetcher.fetch_text(&jar()).await.unwrap(), "real");
    }

    #[tokio::test]
    async fn test_unreachable_primary_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/secondary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_string("from secondary"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for("http://127.0.0.1:1", &server.uri());
        assert_eq!(fetcher.fetch_text(&jar()).await.unwrap(), "from secondary");
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/primary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/secondary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        match fetcher.fetch(&jar()).await.unwrap_err() {
            UpdateError::ArtifactNotFound { urls, .. } => assert_eq!(urls.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_fetch_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/primary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/secondary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        match fetcher.fetch(&jar()).await.unwrap_err() {
            UpdateError::FetchFailed { failures, .. } => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("500"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_listing_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/primary/net/mamoe/mirai-console/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/secondary/net/mamoe/mirai-console/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>listing</html>"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        let listing = fetcher
            .fetch_listing("/net/mamoe/mirai-console/")
            .await
            .unwrap();
        assert!(listing.contains("listing"));
    }

    #[tokio::test]
    async fn test_pom_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/primary/net/mamoe/mirai-console/0.5.2/mirai-console-0.5.2.pom",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("<project/>"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        let pom = fetcher
            .fetch_pom_text("net/mamoe", "mirai-console", "0.5.2")
            .await
            .unwrap();
        assert_eq!(pom, "<project/>");
    }

    #[tokio::test]
    async fn test_fetch_jar_and_pom_pick_extension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/primary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_string("jar"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(
                "/primary/net/mamoe/mirai-console/2.3.1/mirai-console-2.3.1.pom",
            ))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(
                "/secondary/net/mamoe/mirai-console/2.3.1/mirai-console-2.3.1.pom",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("pom"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server.uri(), &server.uri());
        let jar = fetcher
            .fetch_jar("net/mamoe", "mirai-console", "2.3.1")
            .await
            .unwrap();
        assert_eq!(jar.text().await.unwrap(), "jar");

        let pom = fetcher
            .fetch_pom("net/mamoe", "mirai-console", "2.3.1")
            .await
            .unwrap();
        assert_eq!(pom.text().await.unwrap(), "pom");
    }

    #[tokio::test]
    async fn test_download_into_temp_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/primary/{}", JAR_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher_for(&server.uri(), &server.uri());
        let file = fetcher.download(&jar(), dir.path()).await.unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), vec![7u8; 4096]);
        assert!(file.path().starts_with(dir.path()));

        let temp_path = file.path().to_path_buf();
        drop(file);
        assert!(!temp_path.exists());
    }
}
