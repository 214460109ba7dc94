use std::time::Duration;

use reqwest::blocking::Client;
use serde_derive::Deserialize;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::error::{Error, Result};
use crate::settings::Settings;

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Envelope { results: Vec<Value> },
    Bare(Vec<Value>),
}

impl FeedDocument {
    fn into_records(self) -> Vec<Value> {
        match self {
            FeedDocument::Envelope { results } => results,
            FeedDocument::Bare(records) => records,
        }
    }
}

/// Parses a saved feed response: either the API's `{"results": [...]}`
/// envelope or a bare array of records.
pub fn parse_document(text: &str) -> Result<Vec<Value>> {
    Ok(serde_json::from_str::<FeedDocument>(text)?.into_records())
}

/// Request/response client for the activity feed. Holds no store state, so
/// a slow or failed fetch never leaves anything half-written.
pub struct FeedClient {
    client: Client,
    url: Url,
}

impl FeedClient {
    pub fn new(url: &str, timeout: Duration) -> Result<FeedClient> {
        let url = Url::parse(url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::NetworkFailure)?;
        Ok(FeedClient { client, url })
    }

    pub fn from_settings(settings: &Settings) -> Result<FeedClient> {
        FeedClient::new(&settings.feed_url, settings.feed_timeout())
    }

    /// Fetches the full record list. Any transport error, non-2xx status or
    /// undecodable body fails the whole call.
    pub fn fetch(&self) -> Result<Vec<Value>> {
        let records = self
            .client
            .get(self.url.clone())
            .send()
            .map_err(Error::NetworkFailure)?
            .error_for_status()
            .map_err(Error::NetworkFailure)?
            .json::<FeedDocument>()
            .map_err(Error::NetworkFailure)?
            .into_records();
        info!(url = %self.url, records = records.len(), "fetched activity feed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one HTTP response on a local port.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = stream.read(&mut buf).unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/api/activities?targetGroups=SKHWC")
    }

    #[test]
    fn test_fetch_reads_results_envelope() {
        let url = serve_once("200 OK", r#"{"results": [{"subActivityCode": "SA-1"}, {}]}"#);
        let client = FeedClient::new(&url, Duration::from_secs(5)).unwrap();

        let records = client.fetch().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["subActivityCode"], "SA-1");
    }

    #[test]
    fn test_fetch_non_success_status_fails() {
        let url = serve_once("503 Service Unavailable", "{}");
        let client = FeedClient::new(&url, Duration::from_secs(5)).unwrap();

        assert!(matches!(client.fetch(), Err(Error::NetworkFailure(_))));
    }

    #[test]
    fn test_fetch_undecodable_body_fails() {
        let url = serve_once("200 OK", r#"{"unexpected": true}"#);
        let client = FeedClient::new(&url, Duration::from_secs(5)).unwrap();

        assert!(matches!(client.fetch(), Err(Error::NetworkFailure(_))));
    }

    #[test]
    fn test_fetch_unreachable_feed_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = FeedClient::new(&format!("http://{addr}/"), Duration::from_secs(2)).unwrap();

        assert!(matches!(client.fetch(), Err(Error::NetworkFailure(_))));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            FeedClient::new("not a url", Duration::from_secs(1)),
            Err(Error::FeedUrl(_))
        ));
    }

    #[test]
    fn test_parse_document_shapes() {
        assert_eq!(parse_document(r#"{"results": [{}, {}]}"#).unwrap().len(), 2);
        assert_eq!(parse_document(r#"[{}]"#).unwrap().len(), 1);
        assert!(matches!(parse_document("{\"oops\": 1}"), Err(Error::Json(_))));
    }
}
