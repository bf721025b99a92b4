//! Ingestion sources.
//!
//! A [`CsvSource`] is either bytes already in memory or an http(s) URL that
//! is fetched into memory. Either way the result is a [`Bytes`] buffer that
//! is moved into the worker without copying.

use bytes::Bytes;
use url::Url;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};

/// Input to `read_csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvSource {
    /// An http or https URL
    Url(String),
    Bytes(Bytes),
}

impl CsvSource {
    /// Validate the source without touching the network.
    pub fn validate(&self) -> BridgeResult<()> {
        match self {
            CsvSource::Url(input) => parse_source_url(input).map(|_| ()),
            CsvSource::Bytes(_) => Ok(()),
        }
    }

    /// Turn the source into a buffer, fetching it if it is a URL.
    pub async fn into_bytes(self, client: &reqwest::Client) -> BridgeResult<Bytes> {
        match self {
            CsvSource::Bytes(buf) => Ok(buf),
            CsvSource::Url(input) => {
                let url = parse_source_url(&input)?;
                fetch(client, url).await
            }
        }
    }
}

impl From<&str> for CsvSource {
    fn from(url: &str) -> Self {
        CsvSource::Url(url.to_string())
    }
}

impl From<String> for CsvSource {
    fn from(url: String) -> Self {
        CsvSource::Url(url)
    }
}

impl From<Bytes> for CsvSource {
    fn from(buf: Bytes) -> Self {
        CsvSource::Bytes(buf)
    }
}

impl From<Vec<u8>> for CsvSource {
    fn from(buf: Vec<u8>) -> Self {
        CsvSource::Bytes(Bytes::from(buf))
    }
}

impl From<&'static [u8]> for CsvSource {
    fn from(buf: &'static [u8]) -> Self {
        CsvSource::Bytes(Bytes::from_static(buf))
    }
}

/// Parse `input` as a fetchable URL. Only http and https are accepted.
pub fn parse_source_url(input: &str) -> BridgeResult<Url> {
    let url = Url::parse(input).map_err(|e| BridgeError::invalid_source(input, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BridgeError::invalid_source(
            input,
            format!("unsupported scheme `{}`", other),
        )),
    }
}

/// Build the HTTP client used for URL sources.
pub fn http_client(config: &BridgeConfig) -> BridgeResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.http.user_agent.clone())
        .timeout(config.http_timeout())
        .build()
        .map_err(BridgeError::HttpClient)
}

/// Download `url` into memory.
pub async fn fetch(client: &reqwest::Client, url: Url) -> BridgeResult<Bytes> {
    tracing::debug!("[fetch] GET {}", url);
    let fetch_error = |source: reqwest::Error| BridgeError::Fetch {
        url: url.to_string(),
        source,
    };

    let response = client.get(url.clone()).send().await.map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(BridgeError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(fetch_error)?;
    tracing::debug!("[fetch] {} -> {} bytes", url, body.len());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`, returning the URL to hit.
    async fn serve_once(status: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        parse_source_url(&format!("http://{}/data.csv", addr)).unwrap()
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn test_accepts_http_and_https() {
        assert!(parse_source_url("http://example.com/data.csv").is_ok());
        assert!(parse_source_url("https://example.com/data.csv?x=1").is_ok());
    }

    #[test]
    fn test_rejects_other_schemes_and_garbage() {
        for input in ["ftp://host/data.csv", "not a url", "file:///tmp/data.csv", "data.csv"] {
            let err = parse_source_url(input).unwrap_err();
            assert!(err.is_configuration_error(), "{}", input);
        }
    }

    #[test]
    fn test_source_conversions() {
        assert_eq!(
            CsvSource::from("https://x.test/a.csv"),
            CsvSource::Url("https://x.test/a.csv".to_string())
        );
        let source = CsvSource::from(vec![b'a', b'\n']);
        assert_eq!(source, CsvSource::Bytes(Bytes::from_static(b"a\n")));
        assert!(source.validate().is_ok());
        assert!(CsvSource::from("ftp://host/data.csv").validate().is_err());
    }

    #[tokio::test]
    async fn test_bytes_source_is_not_copied() {
        let buf = Bytes::from(vec![7u8; 64]);
        let addr = buf.as_ptr();
        let client = reqwest::Client::new();
        let out = CsvSource::from(buf).into_bytes(&client).await.unwrap();
        assert_eq!(out.as_ptr(), addr);
    }

    #[tokio::test]
    async fn test_bad_url_fails_before_fetch() {
        let client = reqwest::Client::new();
        let err = CsvSource::from("not a url").into_bytes(&client).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSource { .. }));
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let url = serve_once("200 OK", "a,b\n1,2\n").await;
        let body = fetch(&local_client(), url).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"a,b\n1,2\n"));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let url = serve_once("404 Not Found", "missing").await;
        let err = fetch(&local_client(), url.clone()).await.unwrap_err();
        assert!(err.is_transport_error());
        match err {
            BridgeError::HttpStatus { url: failed, status } => {
                assert_eq!(status, 404);
                assert_eq!(failed, url.to_string());
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = CsvSource::from(format!("http://{}/data.csv", addr));
        let err = source.into_bytes(&local_client()).await.unwrap_err();
        assert!(err.is_transport_error());
        assert!(!err.is_configuration_error());
        assert!(matches!(err, BridgeError::Fetch { .. }));
    }
}
