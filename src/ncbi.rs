use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::PathogenError;
use crate::fs_util;

pub const CHUNK_SIZE: usize = 8192;

pub trait NcbiClient: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, PathogenError>;

    fn download(&self, url: &str, destination: &Path) -> Result<u64, PathogenError>;
}

#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
}

impl NcbiHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, PathogenError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pathogen-db/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PathogenError::NcbiHttp(err.to_string()))?,
        );

        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key.trim())
                        .map_err(|err| PathogenError::NcbiHttp(err.to_string()))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PathogenError::NcbiHttp(err.to_string()))?;

        Ok(Self { client })
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PathogenError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let message = response
            .text()
            .ok()
            .map(|body| body.lines().next().unwrap_or_default().to_string())
            .filter(|line| !line.is_empty())
            .unwrap_or(url);
        Err(PathogenError::NcbiStatus { status, message })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<u64, PathogenError> {
        let mut temp = fs_util::sibling_tempfile(destination, ".pathogen-db-download")?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| PathogenError::NcbiHttp(err.to_string()))?;
            if read == 0 {
                break;
            }
            temp.write_all(&buffer[..read])
                .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
            written += read as u64;
        }
        temp.flush()
            .map_err(|err| PathogenError::Filesystem(err.to_string()))?;
        fs_util::persist(temp, destination)?;
        Ok(written)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, PathogenError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PathogenError::NcbiHttp(err.to_string()));
                }
            }
        }
    }
}

impl NcbiClient for NcbiHttpClient {
    fn fetch_text(&self, url: &str) -> Result<String, PathogenError> {
        debug!("GET {url}");
        let response = self.send_with_retries(|| self.client.get(url))?;
        let response = Self::check_status(response)?;
        response
            .text()
            .map_err(|err| PathogenError::NcbiHttp(err.to_string()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, PathogenError> {
        debug!("GET {url} -> {}", destination.display());
        let response = self.send_with_retries(|| self.client.get(url))?;
        let response = Self::check_status(response)?;
        self.write_response_to_file(response, destination)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
