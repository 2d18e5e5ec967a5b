//! Read-only ICS subscription over HTTPS.

use crate::calendar::common::validate_ics_url_format;
use crate::calendar::remote::{RemoteCalendar, TimeRange};
use crate::error::{AppResult, RemoteError};
use crate::utils::retry::{retry_blocking, RetryConfig};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use std::time::Duration;

const USER_AGENT: &str = "calsync/0.1";

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Total request timeout
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl HttpConfig {
    /// ICS files can be large, so reads get the full request timeout.
    pub fn ics_fetch(timeout: Duration) -> Self {
        Self {
            connect_timeout: timeout.min(Duration::from_secs(20)),
            timeout,
            retry: RetryConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(2000),
                max_delay: Duration::from_secs(30),
                backoff_multiplier: 1.5,
            },
        }
    }

    pub fn build_client(&self) -> anyhow::Result<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| anyhow!("Failed to build client: {}", e))
    }
}

#[derive(Debug, Clone)]
pub struct IcsFeed {
    url: String,
    http: HttpConfig,
}

impl IcsFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let url = url.into();
        validate_ics_url_format(&url)?;
        Ok(Self {
            url,
            http: HttpConfig::ics_fetch(timeout),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn download(&self) -> anyhow::Result<String> {
        let client = self.http.build_client()?;
        let response = client
            .get(&self.url)
            .send()
            .map_err(|e| anyhow!("Request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(anyhow!("HTTP {}: {}", status, text));
        }

        let content = response
            .text()
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;
        check_feed_body(&content)?;
        Ok(content)
    }

    fn head_token(&self) -> anyhow::Result<Option<String>> {
        let client = self.http.build_client()?;
        let response = client
            .head(&self.url)
            .send()
            .map_err(|e| anyhow!("Request failed: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }
        let headers = response.headers();
        let token = headers
            .get(reqwest::header::ETAG)
            .or_else(|| headers.get(reqwest::header::LAST_MODIFIED))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(token)
    }
}

/// Catch servers that answer a calendar URL with a web page.
fn check_feed_body(content: &str) -> anyhow::Result<()> {
    let trimmed = content.trim_start();
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        return Err(anyhow!(
            "Invalid ICS URL: The server returned HTML instead of a calendar file. \
             Please ensure you are using the 'Secret address in iCal format' from your calendar settings."
        ));
    }
    if !content.contains("BEGIN:VCALENDAR") {
        log::warn!("Content does not contain BEGIN:VCALENDAR.");
    }
    Ok(())
}

impl RemoteCalendar for IcsFeed {
    /// Feeds are not range-addressable; the whole calendar is returned.
    fn fetch_raw(&self, _range: TimeRange) -> Result<String, RemoteError> {
        retry_blocking(&self.http.retry, || self.download())
            .map_err(|e| RemoteError::classify(e.to_string()))
    }

    fn push_create(&self, _payload: &str) -> Result<(), RemoteError> {
        Err(RemoteError::ReadOnly(self.url.clone()))
    }

    fn push_update(&self, _uid: &str, _payload: &str) -> Result<(), RemoteError> {
        Err(RemoteError::ReadOnly(self.url.clone()))
    }

    fn push_delete(&self, _uid: &str) -> Result<(), RemoteError> {
        Err(RemoteError::ReadOnly(self.url.clone()))
    }

    fn push_exclude_occurrence(&self, _uid: &str, _occurrence_start: DateTime<Utc>) -> Result<(), RemoteError> {
        Err(RemoteError::ReadOnly(self.url.clone()))
    }

    fn change_token(&self) -> Result<Option<String>, RemoteError> {
        self.head_token().map_err(|e| RemoteError::classify(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_requires_https() {
        assert!(IcsFeed::new("http://example.com/cal.ics", Duration::from_secs(5)).is_err());
        let feed = IcsFeed::new("https://example.com/cal.ics", Duration::from_secs(5)).unwrap();
        assert_eq!(feed.url(), "https://example.com/cal.ics");
    }

    #[test]
    fn test_feed_rejects_writes() {
        let feed = IcsFeed::new("https://example.com/cal.ics", Duration::from_secs(5)).unwrap();
        assert!(matches!(feed.push_create("BEGIN:VCALENDAR"), Err(RemoteError::ReadOnly(_))));
        assert!(matches!(feed.push_delete("uid"), Err(RemoteError::ReadOnly(_))));
        assert!(matches!(
            feed.push_exclude_occurrence("uid", Utc::now()),
            Err(RemoteError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_html_body_rejected() {
        assert!(check_feed_body("<!DOCTYPE html><html></html>").is_err());
        assert!(check_feed_body("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").is_ok());
    }

    #[test]
    fn test_connect_timeout_never_exceeds_total() {
        let http = HttpConfig::ics_fetch(Duration::from_secs(5));
        assert_eq!(http.connect_timeout, Duration::from_secs(5));
        let http = HttpConfig::ics_fetch(Duration::from_secs(90));
        assert_eq!(http.connect_timeout, Duration::from_secs(20));
    }
}
