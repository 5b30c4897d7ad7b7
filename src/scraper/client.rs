//! Blocking HTTP client that always sends the same browser-like header set.

use super::error::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;

/// Desktop Chrome UA; the origin rejects obviously scripted clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Source of chapter pages. Implemented by [PageClient]; tests script their own.
pub trait PageSource {
    /// GET `url` and return the body. Non-2xx statuses are errors.
    fn get_page(&mut self, url: &str) -> Result<String, FetchError>;
}

impl<T: PageSource + ?Sized> PageSource for &mut T {
    fn get_page(&mut self, url: &str) -> Result<String, FetchError> {
        (**self).get_page(url)
    }
}

/// Blocking reqwest client with a fixed header profile and cookie jar.
#[derive(Debug)]
pub struct PageClient {
    inner: reqwest::blocking::Client,
}

impl PageClient {
    pub fn builder() -> PageClientBuilder {
        PageClientBuilder::default()
    }
}

impl PageSource for PageClient {
    fn get_page(&mut self, url: &str) -> Result<String, FetchError> {
        let response = self
            .inner
            .get(url)
            .send()
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response.text().map_err(|e| FetchError::BodyRead {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Builder for [PageClient] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct PageClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for PageClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PageClientBuilder {
    /// Set a custom User-Agent. Empty strings fall back to the default.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<PageClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .default_headers(default_headers())
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PageClient { inner })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answers a single request on a loopback port. The handle yields the request head, lowercased.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&head).to_lowercase()
        });
        (format!("http://{}/truyen/x/chuong-1.html", addr), handle)
    }

    #[test]
    fn non_success_status_is_http_status_error_with_browser_headers() {
        let (url, server) = serve_once("503 Service Unavailable", "");
        let mut client = PageClient::builder().timeout_secs(5).build().unwrap();
        let err = client.get_page(&url).unwrap_err();
        match &err {
            FetchError::HttpStatus { status, url: failed } => {
                assert_eq!(*status, 503);
                assert_eq!(failed, &url);
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
        assert_eq!(err.kind(), crate::model::FailureKind::Network);

        let request = server.join().unwrap();
        assert!(request.starts_with("get /truyen/x/chuong-1.html http/1.1"));
        assert!(request.contains(&format!("user-agent: {}", DEFAULT_USER_AGENT.to_lowercase())));
        assert!(request.contains("\r\naccept: text/html"));
        assert!(request.contains("\r\naccept-language: vi-vn"));
    }

    #[test]
    fn success_returns_body_and_sends_custom_user_agent() {
        let (url, server) = serve_once("200 OK", "<p>Nội dung</p>");
        let mut client = PageClient::builder()
            .user_agent("Custom/1.0")
            .timeout_secs(5)
            .build()
            .unwrap();
        assert_eq!(client.get_page(&url).unwrap(), "<p>Nội dung</p>");
        let request = server.join().unwrap();
        assert!(request.contains("user-agent: custom/1.0"));
        assert!(request.contains("accept-language: vi-vn"));
    }

    #[test]
    fn default_header_set_is_fixed_and_non_empty() {
        let headers = default_headers();
        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key(ACCEPT));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }

    #[test]
    fn builder_accepts_custom_user_agent() {
        let client = PageClient::builder()
            .user_agent("Custom/1.0")
            .timeout_secs(5)
            .build();
        assert!(client.is_ok());
    }

    #[test]
    fn builder_with_blank_user_agent_still_builds() {
        assert!(PageClient::builder().user_agent("  ").build().is_ok());
    }

    #[test]
    fn unreachable_host_is_network_error() {
        let mut client = PageClient::builder().timeout_secs(2).build().unwrap();
        let err = client
            .get_page("http://127.0.0.1:9/chuong-1.html")
            .unwrap_err();
        assert_eq!(err.kind(), crate::model::FailureKind::Network);
    }
}
