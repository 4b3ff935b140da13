//! OpsGenie schedule feeds.
//!
//! `GET {api_url}/v2/schedules/{id}.ics` with `Authorization: GenieKey {key}`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use rotamirror_core::FeedError;
use rotamirror_core::config::OpsgenieConfig;
use rotamirror_core::feed::FeedSource;
use url::Url;

pub struct OpsgenieFeed {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl OpsgenieFeed {
    pub fn new(config: &OpsgenieConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid OpsGenie API URL '{}'", config.api_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid OpsGenie API URL '{}'", config.api_url);
        }

        Ok(OpsgenieFeed {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn schedule_url(&self, schedule_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "v2",
                "schedules",
                format!("{}.ics", schedule_id).as_str(),
            ]);
        }
        url
    }
}

#[async_trait]
impl FeedSource for OpsgenieFeed {
    async fn fetch(&self, schedule_id: &str) -> Result<Vec<u8>, FeedError> {
        let request_error = |e: reqwest::Error| FeedError::Request {
            schedule_id: schedule_id.to_string(),
            message: e.to_string(),
        };

        let response = self
            .http
            .get(self.schedule_url(schedule_id))
            .header(AUTHORIZATION, format!("GenieKey {}", self.api_key))
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                schedule_id: schedule_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        tracing::debug!(schedule_id, bytes = body.len(), "Fetched feed");

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(server: &MockServer) -> OpsgenieFeed {
        let config = OpsgenieConfig {
            api_key: "genie-key".to_string(),
            api_url: format!("{}/", server.uri()),
        };
        OpsgenieFeed::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_genie_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/schedules/sched-1.ics"))
            .and(header("authorization", "GenieKey genie-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let body = feed(&server).fetch("sched-1").await.unwrap();

        assert_eq!(body, b"BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n".to_vec());
    }

    #[test]
    fn test_schedule_id_is_encoded_as_one_segment() {
        let config = OpsgenieConfig {
            api_key: "genie-key".to_string(),
            api_url: "https://api.eu.opsgenie.com/".to_string(),
        };
        let feed = OpsgenieFeed::new(&config, Duration::from_secs(5)).unwrap();

        assert_eq!(
            feed.schedule_url("sched-1").as_str(),
            "https://api.eu.opsgenie.com/v2/schedules/sched-1.ics"
        );
        assert_eq!(
            feed.schedule_url("team a/b?x").as_str(),
            "https://api.eu.opsgenie.com/v2/schedules/team%20a%2Fb%3Fx.ics"
        );
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        let config = OpsgenieConfig {
            api_key: "genie-key".to_string(),
            api_url: "not a url".to_string(),
        };

        assert!(OpsgenieFeed::new(&config, Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/schedules/unknown.ics"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = feed(&server).fetch("unknown").await;

        assert_eq!(
            result,
            Err(FeedError::Status {
                schedule_id: "unknown".to_string(),
                status: 404,
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let config = OpsgenieConfig {
            api_key: "genie-key".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
        };
        let feed = OpsgenieFeed::new(&config, Duration::from_secs(5)).unwrap();

        let result = feed.fetch("sched-1").await;

        assert!(matches!(result, Err(FeedError::Request { .. })));
    }
}
