use crate::config::{DateRange, PipelineConfig};
use crate::fetch::error::TransportError;
use crate::registry::Location;
use crate::utils::ensure_dir_exists_async;
use log::{debug, info, warn};
use reqwest::Client;
use std::path::{Path, PathBuf};

/// A raw payload persisted by the fetcher, ready for the transform stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFile {
    pub location: String,
    pub range: DateRange,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Issues one bounded request per location to the forecast API and stores the response
/// body verbatim under the raw directory.
pub struct Fetcher {
    client: Client,
    base_url: String,
    hourly_variables: String,
    timezone: String,
    raw_dir: PathBuf,
}

impl Fetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            hourly_variables: config.hourly_variables.join(","),
            timezone: config.timezone.clone(),
            raw_dir: config.raw_dir(),
        })
    }

    /// `<raw_dir>/<safe-name>_<start>_<end>.json`
    pub fn raw_path(&self, location: &Location, range: &DateRange) -> PathBuf {
        self.raw_dir
            .join(format!("{}_{}.json", location.safe_name(), range))
    }

    fn query(&self, location: &Location, range: &DateRange) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("hourly", self.hourly_variables.clone()),
            ("start_date", range.start.to_string()),
            ("end_date", range.end.to_string()),
            ("timezone", self.timezone.clone()),
        ]
    }

    /// Downloads the raw response body for one location. Non-2xx answers are errors that
    /// carry the status and the body the server sent.
    pub async fn download(
        &self,
        location: &Location,
        range: &DateRange,
    ) -> Result<Vec<u8>, TransportError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&self.query(location, range))
            .build()
            .map_err(|e| TransportError::Network {
                url: self.base_url.clone(),
                source: e,
            })?;
        let url = request.url().to_string();
        debug!("Requesting {}", url);

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| TransportError::Network {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Failed to read error body from {}: {}", url, e);
                    String::new()
                }
            };
            warn!("HTTP error for {}: {}", url, status);
            return Err(TransportError::HttpStatus { url, status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body {
                url: url.clone(),
                source: e,
            })?;
        Ok(bytes.to_vec())
    }

    pub async fn fetch(
        &self,
        location: &Location,
        range: &DateRange,
    ) -> Result<RawFile, TransportError> {
        info!(
            "Fetching {} ({},{}) for {} to {}",
            location.name, location.latitude, location.longitude, range.start, range.end
        );
        let payload = self.download(location, range).await?;

        ensure_dir_exists_async(&self.raw_dir)
            .await
            .map_err(|e| TransportError::DirCreation(self.raw_dir.clone(), e))?;
        let path = self.raw_path(location, range);
        write_raw(&path, &payload).await?;
        info!("Saved raw JSON to {}", path.display());

        Ok(RawFile {
            location: location.name.clone(),
            range: *range,
            path,
            bytes: payload.len(),
        })
    }
}

async fn write_raw(path: &Path, payload: &[u8]) -> Result<(), TransportError> {
    tokio::fs::write(path, payload)
        .await
        .map_err(|e| TransportError::Write(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::error::Error;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 8, 27).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 28).unwrap(),
        )
        .unwrap()
    }

    fn config(base_url: String, data_dir: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .base_url(base_url)
            .data_dir(data_dir)
            .build()
    }

    #[tokio::test]
    async fn test_fetch_writes_payload_verbatim() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start().await;
        let body = r#"{"latitude":24.875,"hourly":{"time":["2025-08-27T00:00"],"temperature_2m":[29.1]}}"#;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "24.8607"))
            .and(query_param("longitude", "67.0011"))
            .and(query_param(
                "hourly",
                "temperature_2m,relativehumidity_2m,precipitation,weathercode",
            ))
            .and(query_param("start_date", "2025-08-27"))
            .and(query_param("end_date", "2025-08-28"))
            .and(query_param("timezone", "Asia/Karachi"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir()?;
        let fetcher = Fetcher::new(&config(format!("{}/v1/forecast", server.uri()), tmp.path()))?;
        let karachi = Location::new("Karachi", 24.8607, 67.0011);

        let raw = fetcher.fetch(&karachi, &range()).await?;

        assert_eq!(
            raw.path,
            tmp.path().join("raw").join("Karachi_2025-08-27_2025-08-28.json")
        );
        assert_eq!(std::fs::read_to_string(&raw.path)?, body);
        assert_eq!(raw.bytes, body.len());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"reason\":\"bad date\"}"))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir()?;
        let fetcher = Fetcher::new(&config(server.uri(), tmp.path()))?;
        let lahore = Location::new("Lahore", 31.5204, 74.3587);

        let err = fetcher.fetch(&lahore, &range()).await.unwrap_err();
        match &err {
            TransportError::HttpStatus { status, body, .. } => {
                assert_eq!(status.as_u16(), 400);
                assert!(body.contains("bad date"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
        assert!(!tmp.path().join("raw").join("Lahore_2025-08-27_2025-08-28.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_error_body_keeps_status() -> Result<(), Box<dyn Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(502)
                    .insert_header("content-encoding", "gzip")
                    .set_body_bytes(b"not gzip".to_vec()),
            )
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir()?;
        let fetcher = Fetcher::new(&config(server.uri(), tmp.path()))?;
        let karachi = Location::new("Karachi", 24.8607, 67.0011);

        let err = fetcher.fetch(&karachi, &range()).await.unwrap_err();
        match &err {
            TransportError::HttpStatus { status, body, .. } => {
                assert_eq!(status.as_u16(), 502);
                assert!(body.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_network_failure() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        // Nothing listens on port 1.
        let fetcher = Fetcher::new(&config("http://127.0.0.1:1/v1/forecast".into(), tmp.path()))?;
        let quetta = Location::new("Quetta", 30.1798, 66.9750);

        let err = fetcher.fetch(&quetta, &range()).await.unwrap_err();
        assert!(matches!(err, TransportError::Network { .. }));
        assert!(err.status().is_none());
        Ok(())
    }
}
