//! `CalendarStore` backed by the Google Calendar v3 REST API.
//!
//! Entry ids are used verbatim as Google event ids. Hex digests satisfy
//! Google's id alphabet (lowercase base32hex).
//!
//! Google keeps the id of a deleted event reserved: inserting it again fails
//! with 409. `get` therefore reports cancelled events as found, and the
//! following `update` (which always writes `status: confirmed`) revives them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use rotamirror_core::{CalendarStore, EntryPage, MirroredEntry, StoreError, StoreResult};
use url::Url;

use crate::convert::{FromGoogle, ToGoogle};
use crate::error::GoogleError;
use crate::session::{Session, TokenSource};
use crate::types::{ApiErrorBody, EventList, GoogleEvent};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PAGE_SIZE: &str = "250";

pub struct GoogleCalendarStore {
    http: reqwest::Client,
    base_url: Url,
    calendar_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleCalendarStore {
    pub fn new(
        calendar_id: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        http: reqwest::Client,
    ) -> Result<Self, GoogleError> {
        Ok(GoogleCalendarStore {
            http,
            base_url: parse_base_url(DEFAULT_API_BASE)?,
            calendar_id: calendar_id.into(),
            tokens,
        })
    }

    /// Store authenticated with a service account key (JSON text).
    pub fn from_service_account(
        calendar_id: impl Into<String>,
        service_account_json: &str,
        timeout: Duration,
    ) -> Result<Self, GoogleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GoogleError::Transport(e.to_string()))?;
        let session = Session::from_json(service_account_json, http.clone())?;

        tracing::debug!(account = %session.account_email(), "Using service account");

        Self::new(calendar_id, Arc::new(session), http)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, GoogleError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    fn events_url(&self, event_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GoogleError> {
        let token = self.tokens.access_token().await?;

        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GoogleError::Transport(e.to_string()))
    }

    async fn read_event(response: Response) -> Result<MirroredEntry, GoogleError> {
        let event: GoogleEvent = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))?;
        MirroredEntry::from_google(event)
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, GoogleError> {
    let url = Url::parse(base_url)
        .map_err(|e| GoogleError::Transport(format!("invalid API base URL '{}': {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(GoogleError::Transport(format!(
            "invalid API base URL '{}'",
            base_url
        )));
    }
    Ok(url)
}

/// Turn a non-success response into an error, preferring Google's own message.
async fn api_error(response: Response) -> GoogleError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => body,
    };
    GoogleError::Api { status, message }
}

fn is_gone(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait]
impl CalendarStore for GoogleCalendarStore {
    async fn list(&self, from: DateTime<Utc>, page_token: Option<&str>) -> StoreResult<EntryPage> {
        let time_min = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut query: Vec<(&str, &str)> = vec![
            ("timeMin", time_min.as_str()),
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("maxResults", PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .send(self.http.get(self.events_url(None)).query(&query))
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }

        let list: EventList = response
            .json()
            .await
            .map_err(|e| GoogleError::Decode(e.to_string()))?;

        let entries = list
            .items
            .into_iter()
            .filter(|event| !event.is_cancelled())
            .map(MirroredEntry::from_google)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EntryPage {
            entries,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn get(&self, id: &str) -> StoreResult<MirroredEntry> {
        let response = self.send(self.http.get(self.events_url(Some(id)))).await?;

        let status = response.status();
        if is_gone(status) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(api_error(response).await.into());
        }

        Ok(Self::read_event(response).await?)
    }

    async fn insert(&self, entry: &MirroredEntry) -> StoreResult<MirroredEntry> {
        let body: GoogleEvent = entry.to_google();
        let response = self
            .send(self.http.post(self.events_url(None)).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }

        Ok(Self::read_event(response).await?)
    }

    async fn update(&self, id: &str, entry: &MirroredEntry) -> StoreResult<MirroredEntry> {
        let mut body: GoogleEvent = entry.to_google();
        body.id = id.to_string();
        let response = self
            .send(self.http.put(self.events_url(Some(id))).json(&body))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            return Err(api_error(response).await.into());
        }

        Ok(Self::read_event(response).await?)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let response = self.send(self.http.delete(self.events_url(Some(id)))).await?;

        let status = response.status();
        // 410 Gone: already deleted
        if status.is_success() || status == StatusCode::GONE {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Err(api_error(response).await.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StaticToken;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EVENTS_PATH: &str = "/calendars/oncall/events";

    async fn store(server: &MockServer) -> GoogleCalendarStore {
        GoogleCalendarStore::new(
            "oncall",
            Arc::new(StaticToken("test-token".to_string())),
            reqwest::Client::new(),
        )
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
    }

    fn entry() -> MirroredEntry {
        MirroredEntry {
            id: "0a1b2c".to_string(),
            summary: "TEAM_X: On call".to_string(),
            start: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 9, 8, 0, 0).unwrap(),
            color: Some("5".to_string()),
        }
    }

    fn event_json(id: &str, start: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "summary": "TEAM_X: On call",
            "status": status,
            "start": { "dateTime": start },
            "end": { "dateTime": start },
        })
    }

    #[test]
    fn test_events_url_keeps_base_path() {
        let store = GoogleCalendarStore::new(
            "team#oncall@group.calendar.google.com",
            Arc::new(StaticToken(String::new())),
            reqwest::Client::new(),
        )
        .unwrap();

        assert_eq!(
            store.events_url(Some("abc")).as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%23oncall@group.calendar.google.com/events/abc"
        );
    }

    #[tokio::test]
    async fn test_list_sends_window_and_paging_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(header("authorization", "Bearer test-token"))
            .and(query_param("timeMin", "2025-06-01T00:00:00Z"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    event_json("a", "2025-06-02T08:00:00Z", "confirmed"),
                    event_json("b", "2025-06-03T08:00:00Z", "cancelled"),
                ],
                "nextPageToken": "page-3",
            })))
            .mount(&server)
            .await;

        let page = store(&server)
            .await
            .list(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(), Some("page-2"))
            .await
            .unwrap();

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].id, "a");
        assert_eq!(page.next_page_token.as_deref(), Some("page-3"));
    }

    #[tokio::test]
    async fn test_get_missing_event_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/missing", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "code": 404, "message": "Not Found" }
            })))
            .mount(&server)
            .await;

        let result = store(&server).await.get("missing").await;

        assert_eq!(result, Err(StoreError::NotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_get_returns_cancelled_event_as_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/deleted", EVENTS_PATH)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(event_json("deleted", "2025-06-02T08:00:00Z", "cancelled")),
            )
            .mount(&server)
            .await;

        let entry = store(&server).await.get("deleted").await.unwrap();

        assert_eq!(entry.id, "deleted");
    }

    #[tokio::test]
    async fn test_insert_posts_event_with_derived_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENTS_PATH))
            .and(body_partial_json(serde_json::json!({
                "id": "0a1b2c",
                "summary": "TEAM_X: On call",
                "colorId": "5",
                "status": "confirmed",
                "start": { "dateTime": "2025-06-02T08:00:00Z" },
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(event_json("0a1b2c", "2025-06-02T08:00:00Z", "confirmed")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stored = store(&server).await.insert(&entry()).await.unwrap();

        assert_eq!(stored.id, "0a1b2c");
    }

    #[tokio::test]
    async fn test_insert_conflict_reports_google_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": { "code": 409, "message": "The requested identifier already exists." }
            })))
            .mount(&server)
            .await;

        let result = store(&server).await.insert(&entry()).await;

        assert_eq!(
            result,
            Err(StoreError::Api {
                status: 409,
                message: "The requested identifier already exists.".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_update_puts_event() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{}/0a1b2c", EVENTS_PATH)))
            .and(body_partial_json(serde_json::json!({ "status": "confirmed" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(event_json("0a1b2c", "2025-06-02T08:00:00Z", "confirmed")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stored = store(&server).await.update("0a1b2c", &entry()).await.unwrap();

        assert_eq!(stored.summary, "TEAM_X: On call");
    }

    #[tokio::test]
    async fn test_delete_treats_gone_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/gone", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/ok", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/denied", EVENTS_PATH)))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let store = store(&server).await;

        assert_eq!(store.delete("gone").await, Ok(()));
        assert_eq!(store.delete("ok").await, Ok(()));
        assert_eq!(
            store.delete("denied").await,
            Err(StoreError::Api {
                status: 403,
                message: "Forbidden".to_string(),
            })
        );
    }
}
