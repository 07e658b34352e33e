use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Config;
use crate::debug_log;
use crate::types::{ChatEvent, ChatGroupSummary, ErrorResponse};
use crate::utils::deserialize_flexible_timestamp;

/// Upper bound on event pages fetched for one chat group.
const MAX_EVENT_PAGES: u32 = 200;

/// Where chat groups and their events come from.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Most recent chat groups, newest first.
    async fn list_chat_groups(&self) -> Result<Vec<ChatGroupSummary>>;

    /// Every event of one chat group in ascending time order.
    async fn list_chat_events(&self, group_id: &str) -> Result<Vec<ChatEvent>>;
}

#[derive(Deserialize)]
struct ChatGroupsPage {
    chat_groups_page: Vec<RawChatGroup>,
}

#[derive(Deserialize)]
struct RawChatGroup {
    id: String,
    #[serde(deserialize_with = "deserialize_flexible_timestamp")]
    most_recent_start_timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventsPayload {
    Page {
        #[serde(default)]
        total_pages: Option<u32>,
        events_page: Vec<ChatEvent>,
    },
    Bare(Vec<ChatEvent>),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the Hume empathic-voice REST API.
pub struct HumeClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl HumeClient {
    pub fn new(base_url: &str, api_key: &str, page_size: u32, timeout: Duration) -> Result<Self> {
        if api_key.is_empty() {
            anyhow::bail!(
                "Hume API key is not configured. Run `peakform config set api-key ...` or set HUME_API_KEY"
            );
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            page_size: page_size.clamp(1, 100),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.hume.base_url,
            &config.hume.api_key,
            config.hume.page_size,
            Duration::from_secs(config.hume.timeout_seconds),
        )
    }

    async fn get(&self, url: &str) -> Result<Response> {
        debug_log::api_request("GET", url);
        let response = self
            .client
            .get(url)
            .header("X-Hume-Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.base_url))?;

        ensure_success(response).await
    }

    /// Events endpoint for one chat group; the id is encoded as a single path segment.
    fn events_url(&self, group_id: &str, page_number: u32) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Hume base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid Hume base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v0", "evi", "chat_groups", group_id, "events"]);
        url.set_query(Some(&format!(
            "page_number={page_number}&page_size={}&ascending_order=true",
            self.page_size
        )));
        Ok(url)
    }
}

#[async_trait]
impl ChatSource for HumeClient {
    async fn list_chat_groups(&self) -> Result<Vec<ChatGroupSummary>> {
        let url = format!(
            "{}/v0/evi/chat_groups?page_number=0&page_size={}&ascending_order=false",
            self.base_url, self.page_size
        );
        let response = self.get(&url).await?;
        let page: ChatGroupsPage = read_json(response)
            .await
            .context("Unexpected response format for chat groups")?;

        Ok(page
            .chat_groups_page
            .into_iter()
            .map(|g| ChatGroupSummary {
                id: g.id,
                start_timestamp: g.most_recent_start_timestamp,
            })
            .collect())
    }

    async fn list_chat_events(&self, group_id: &str) -> Result<Vec<ChatEvent>> {
        if group_id.trim().is_empty() {
            anyhow::bail!("Chat group ID is missing");
        }

        let mut events = Vec::new();
        let mut page_number = 0u32;

        loop {
            let url = self.events_url(group_id, page_number)?;
            let response = self.get(url.as_str()).await?;
            let payload: EventsPayload = read_json(response)
                .await
                .with_context(|| format!("Unexpected events format for chat group {group_id}"))?;

            let (page, total_pages) = match payload {
                EventsPayload::Page {
                    total_pages,
                    events_page,
                } => (events_page, total_pages),
                EventsPayload::Bare(events) => (events, None),
            };

            let short_page = (page.len() as u32) < self.page_size;
            events.extend(page);
            page_number += 1;

            let exhausted = match total_pages {
                Some(total) => page_number >= total,
                None => short_page,
            };
            if exhausted || page_number >= MAX_EVENT_PAGES {
                break;
            }
        }

        Ok(events)
    }
}

/// Exchange API credentials for a short-lived client access token.
pub async fn fetch_access_token(config: &Config) -> Result<String> {
    if config.is_api_key_missing() || config.is_secret_key_missing() {
        anyhow::bail!("Both the Hume API key and secret key must be configured");
    }

    let url = format!("{}/oauth2-cc/token", config.hume.base_url.trim_end_matches('/'));
    debug_log::api_request("POST", &url);

    let client = Client::builder()
        .timeout(Duration::from_secs(config.hume.timeout_seconds))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .post(&url)
        .basic_auth(&config.hume.api_key, Some(&config.hume.secret_key))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("grant_type=client_credentials")
        .send()
        .await
        .context("Token request failed")?;

    let response = ensure_success(response).await?;
    let token: TokenResponse = read_json(response)
        .await
        .context("Failed to parse token response")?;

    if token.access_token.is_empty() || token.access_token == "undefined" {
        anyhow::bail!("Hume returned an empty access token");
    }

    Ok(token.access_token)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let mut bytes = response.bytes().await?.to_vec();
    Ok(simd_json::from_slice(&mut bytes)?)
}

fn parse_json_error(error_body: &str) -> Option<String> {
    if !error_body.trim().starts_with('{') {
        return None;
    }
    let mut bytes = error_body.as_bytes().to_vec();
    simd_json::from_slice::<ErrorResponse>(&mut bytes)
        .ok()
        .map(|e| e.message)
}

pub(crate) fn describe_http_error(status: StatusCode, body: &str) -> String {
    let parsed = parse_json_error(body);

    match status.as_u16() {
        400 => match parsed {
            Some(msg) => format!("Bad request: {msg}"),
            None => "Bad request".to_string(),
        },
        401 => "Unauthorized (check your Hume API key)".to_string(),
        403 => "Forbidden (the API key lacks access)".to_string(),
        404 => "Chat group not found".to_string(),
        422 => match parsed {
            Some(msg) => format!("Validation: {msg}"),
            None => "Validation error".to_string(),
        },
        429 => "Rate limited".to_string(),
        500 => "Server error".to_string(),
        502 => "Bad gateway".to_string(),
        503 => "Service unavailable".to_string(),
        504 => "Gateway timeout".to_string(),
        code => match parsed {
            Some(msg) => msg,
            None if !body.trim().is_empty() => format!("Error {code}: {}", body.trim()),
            None => format!("Error {code}"),
        },
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{}", describe_http_error(status, &body))
}
