use std::sync::Arc;

use chrono::Local;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, Implementation, ListResourcesResult, PaginatedRequestParam, ProtocolVersion,
    RawResource, ReadResourceRequestParam, ReadResourceResult, ResourceContents,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{
    ErrorData as McpError, Json, RoleServer, ServerHandler, ServiceExt, tool, tool_handler,
    tool_router,
};

use crate::analytics::{self, AnalyticsFilter, ResultsStore};
use crate::config::Config;
use crate::emotions;
use crate::history::{self, bucketize};
use crate::hume::{ChatSource, HumeClient};
use crate::schedule::{self, ScheduleStore};
use crate::sports;

use super::types::*;

/// Resource URI constants
mod resource_uris {
    pub const CHAT_HISTORY: &str = "peakform://history";
    pub const SCHEDULE: &str = "peakform://schedule";
}

/// Number of most recent outcomes included in analytics responses.
const RECENT_OUTCOMES: usize = 5;

/// The PeakForm MCP Server
#[derive(Clone)]
pub struct PeakFormMcpServer {
    tool_router: ToolRouter<Self>,
    config: Config,
    source: Option<Arc<dyn ChatSource>>,
}

impl PeakFormMcpServer {
    pub fn new(config: Config) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config,
            source: None,
        }
    }

    #[cfg(test)]
    pub fn with_source(config: Config, source: Arc<dyn ChatSource>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config,
            source: Some(source),
        }
    }

    /// The configured chat backend, built on first use so that tools which
    /// don't need Hume work without an API key.
    fn chat_source(&self) -> Result<Arc<dyn ChatSource>, String> {
        if let Some(source) = &self.source {
            return Ok(source.clone());
        }
        HumeClient::from_config(&self.config)
            .map(|client| Arc::new(client) as Arc<dyn ChatSource>)
            .map_err(|e| format!("{e:#}"))
    }

    fn sport(&self) -> &'static sports::SportConfig {
        sports::get_sport(&self.config.athlete.sport)
            .or_else(|| sports::get_sport(sports::DEFAULT_SPORT))
            .unwrap_or_else(|| sports::all_sports()[0])
    }

    async fn load_history(&self) -> Result<history::ChatHistoryBuckets, String> {
        let source = self.chat_source()?;
        let mut groups = source
            .list_chat_groups()
            .await
            .map_err(|e| format!("Failed to fetch chat history: {e:#}"))?;
        history::sort_newest_first(&mut groups);
        Ok(bucketize(&groups, &Local::now()))
    }
}

#[tool_router]
impl PeakFormMcpServer {
    #[tool(
        name = "list_chat_history",
        description = "List the athlete's Hume voice chat groups grouped into Today, Yesterday, Previous 7 Days, Previous 30 Days and one section per older month (newest first)."
    )]
    async fn list_chat_history(
        &self,
        Parameters(req): Parameters<ListChatHistoryRequest>,
    ) -> Result<Json<ChatHistoryResponse>, String> {
        let buckets = self.load_history().await?;

        let mut sections: Vec<HistorySection> = buckets
            .sections()
            .into_iter()
            .map(HistorySection::from)
            .collect();
        if let Some(max) = req.max_sections {
            sections.truncate(max);
        }

        Ok(Json(ChatHistoryResponse {
            total_groups: buckets.len(),
            sections,
        }))
    }

    #[tool(
        name = "get_chat_emotions",
        description = "Get the transcript of one chat group with the top emotions of each user message and the strongest average emotions over the whole conversation."
    )]
    async fn get_chat_emotions(
        &self,
        Parameters(req): Parameters<GetChatEmotionsRequest>,
    ) -> Result<Json<ChatEmotionsResponse>, String> {
        let source = self.chat_source()?;
        let events = source
            .list_chat_events(&req.chat_group_id)
            .await
            .map_err(|e| format!("{e:#}"))?;

        let top = req.top.unwrap_or(self.config.history.top_emotions);
        let history = emotions::process_history(&events, top);

        Ok(Json(ChatEmotionsResponse::new(&req.chat_group_id, &history)))
    }

    #[tool(
        name = "get_active_session",
        description = "Check whether a scheduled session is currently in its pre-session (2h before start) or post-session (4h after start) window, and which emotions to check in on."
    )]
    async fn get_active_session(
        &self,
        Parameters(_req): Parameters<GetActiveSessionRequest>,
    ) -> Result<Json<ActiveSessionResponse>, String> {
        let schedules = ScheduleStore::open()
            .and_then(|store| store.list())
            .map_err(|e| format!("{e:#}"))?;

        let active = schedule::find_active_session(&schedules, &Local::now());
        Ok(Json(ActiveSessionResponse::new(active.as_ref(), self.sport())))
    }

    #[tool(
        name = "get_session_analytics",
        description = "Summarize recorded session results: wins and losses, average performance metrics, and how each emotion shifted from pre-session to post-session. Can filter by period and sport."
    )]
    async fn get_session_analytics(
        &self,
        Parameters(req): Parameters<GetSessionAnalyticsRequest>,
    ) -> Result<Json<SessionAnalyticsResponse>, String> {
        let sport = match req.sport.as_deref() {
            Some(name) => Some(
                sports::get_sport(name)
                    .ok_or_else(|| format!("Unknown sport: {name}"))?
                    .slug
                    .to_string(),
            ),
            None => None,
        };

        let results = ResultsStore::open()
            .and_then(|store| store.list())
            .map_err(|e| format!("{e:#}"))?;

        let today = Local::now().date_naive();
        let filter = AnalyticsFilter {
            period: req.period,
            sport: sport.clone(),
        };
        let summary = analytics::summarize(&results, &filter, today);

        let recent_outcomes = results
            .iter()
            .rev()
            .filter(|r| filter.matches(r, today))
            .take(RECENT_OUTCOMES)
            .map(|r| OutcomeEntry::new(r.date, &r.sport, r.outcome))
            .collect();

        Ok(Json(SessionAnalyticsResponse::new(
            summary,
            req.period,
            sport,
            recent_outcomes,
        )))
    }

    #[tool(
        name = "list_sports",
        description = "List supported sports with the performance metrics recorded for each and the key emotions to monitor."
    )]
    async fn list_sports(
        &self,
        Parameters(_req): Parameters<ListSportsRequest>,
    ) -> Result<Json<SportsResponse>, String> {
        Ok(Json(SportsResponse {
            sports: sports::all_sports()
                .into_iter()
                .map(SportEntry::from)
                .collect(),
            current: self.sport().slug.to_string(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for PeakFormMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "peakform".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("PeakForm".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "PeakForm MCP Server - Emotional readiness for athletes. \
                 Browse voice chat history, inspect emotions per conversation, \
                 check the active session and review session analytics."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new(resource_uris::CHAT_HISTORY, "Chat History".to_string())
                    .no_annotation(),
                RawResource::new(resource_uris::SCHEDULE, "Schedule".to_string()).no_annotation(),
            ],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            resource_uris::CHAT_HISTORY => {
                let buckets = self
                    .load_history()
                    .await
                    .map_err(|e| McpError::internal_error(e, None))?;

                let content = if buckets.is_empty() {
                    "No chat history available".to_string()
                } else {
                    buckets
                        .sections()
                        .into_iter()
                        .map(|(key, groups)| format!("{}: {} chats", key.label(), groups.len()))
                        .collect::<Vec<_>>()
                        .join("\n")
                };

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            resource_uris::SCHEDULE => {
                let schedules = ScheduleStore::open()
                    .and_then(|store| store.list())
                    .map_err(|e| McpError::internal_error(format!("{e:#}"), None))?;

                let content = if schedules.is_empty() {
                    "Nothing scheduled".to_string()
                } else {
                    schedules
                        .iter()
                        .map(|s| {
                            let against = s
                                .opponent
                                .as_deref()
                                .map(|o| format!(" vs {o}"))
                                .unwrap_or_default();
                            format!("{} {}{}", s.date, s.time, against)
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                };

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                "resource_not_found",
                Some(rmcp::serde_json::json!({ "uri": uri })),
            )),
        }
    }
}

/// Run the MCP server with stdio transport
pub async fn run_mcp_server(config: Config) -> anyhow::Result<()> {
    use rmcp::transport::stdio;

    let server = PeakFormMcpServer::new(config);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::set_test_data_dir;
    use crate::types::{ChatEvent, ChatGroupSummary, EventRole, EventType};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct FakeSource {
        groups: Vec<ChatGroupSummary>,
        events: Vec<ChatEvent>,
    }

    #[async_trait]
    impl ChatSource for FakeSource {
        async fn list_chat_groups(&self) -> Result<Vec<ChatGroupSummary>> {
            Ok(self.groups.clone())
        }

        async fn list_chat_events(&self, group_id: &str) -> Result<Vec<ChatEvent>> {
            if group_id == "missing" {
                anyhow::bail!("Chat group not found");
            }
            Ok(self.events.clone())
        }
    }

    fn event(
        role: EventRole,
        event_type: EventType,
        text: &str,
        features: Option<&str>,
    ) -> ChatEvent {
        ChatEvent {
            role,
            event_type,
            text: Some(text.to_string()),
            timestamp: 0,
            emotion_features: features.map(|f| f.to_string()),
        }
    }

    fn server() -> PeakFormMcpServer {
        let source = FakeSource {
            groups: vec![
                ChatGroupSummary {
                    id: "old-1".to_string(),
                    start_timestamp: Utc.with_ymd_and_hms(2020, 3, 2, 10, 0, 0).unwrap(),
                },
                ChatGroupSummary {
                    id: "old-2".to_string(),
                    start_timestamp: Utc.with_ymd_and_hms(2020, 1, 2, 10, 0, 0).unwrap(),
                },
            ],
            events: vec![
                event(
                    EventRole::User,
                    EventType::UserMessage,
                    "Nervous about the final",
                    Some(r#"{"Anxiety":0.7,"Determination":0.5,"Joy":0.1}"#),
                ),
                event(EventRole::Agent, EventType::AgentMessage, "Let's breathe", None),
            ],
        };
        PeakFormMcpServer::with_source(Config::default(), Arc::new(source))
    }

    #[tokio::test]
    async fn list_chat_history_groups_by_month() {
        let Json(resp) = server()
            .list_chat_history(Parameters(ListChatHistoryRequest { max_sections: None }))
            .await
            .unwrap();

        assert_eq!(resp.total_groups, 2);
        let keys: Vec<&str> = resp.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["2020-03", "2020-01"]);
        assert_eq!(resp.sections[0].label, "March 2020");
        assert_eq!(resp.sections[0].groups[0].id, "old-1");

        let Json(resp) = server()
            .list_chat_history(Parameters(ListChatHistoryRequest {
                max_sections: Some(1),
            }))
            .await
            .unwrap();
        assert_eq!(resp.sections.len(), 1);
    }

    #[tokio::test]
    async fn list_chat_history_sorts_groups_newest_first() {
        let source = FakeSource {
            groups: vec![
                ChatGroupSummary {
                    id: "older".to_string(),
                    start_timestamp: Utc.with_ymd_and_hms(2020, 3, 2, 10, 0, 0).unwrap(),
                },
                ChatGroupSummary {
                    id: "newer".to_string(),
                    start_timestamp: Utc.with_ymd_and_hms(2020, 3, 20, 10, 0, 0).unwrap(),
                },
            ],
            events: Vec::new(),
        };
        let server = PeakFormMcpServer::with_source(Config::default(), Arc::new(source));

        let Json(resp) = server
            .list_chat_history(Parameters(ListChatHistoryRequest { max_sections: None }))
            .await
            .unwrap();

        assert_eq!(resp.sections.len(), 1);
        let ids: Vec<&str> = resp.sections[0].groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn get_chat_emotions_ranks_user_emotions() {
        let Json(resp) = server()
            .get_chat_emotions(Parameters(GetChatEmotionsRequest {
                chat_group_id: "g".to_string(),
                top: Some(2),
            }))
            .await
            .unwrap();

        assert_eq!(resp.messages.len(), 2);
        let user_emotions = resp.messages[0].emotions.as_ref().unwrap();
        let names: Vec<&str> = user_emotions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Anxiety", "Determination"]);
        assert!(resp.messages[1].emotions.is_none());
        assert_eq!(resp.top_emotions[0].name, "Anxiety");
        assert!(resp.transcript.contains("User: Nervous about the final"));
    }

    #[tokio::test]
    async fn get_chat_emotions_surfaces_fetch_errors() {
        let err = server()
            .get_chat_emotions(Parameters(GetChatEmotionsRequest {
                chat_group_id: "missing".to_string(),
                top: None,
            }))
            .await
            .err()
            .expect("tool call should fail");
        assert_eq!(err, "Chat group not found");
    }

    #[tokio::test]
    async fn tools_without_hume_work_without_api_key() {
        let dir = TempDir::new().unwrap();
        set_test_data_dir(dir.path().to_path_buf());
        let server = PeakFormMcpServer::new(Config::default());

        let Json(resp) = server
            .list_sports(Parameters(ListSportsRequest {}))
            .await
            .unwrap();
        assert_eq!(resp.sports.len(), 3);
        assert_eq!(resp.current, "tennis");

        let Json(resp) = server
            .get_active_session(Parameters(GetActiveSessionRequest {}))
            .await
            .unwrap();
        assert!(!resp.active);
        assert_eq!(resp.key_emotions, vec!["Confidence", "Focus", "Anxiety"]);

        let Json(resp) = server
            .get_session_analytics(Parameters(GetSessionAnalyticsRequest {
                period: None,
                sport: None,
            }))
            .await
            .unwrap();
        assert_eq!(resp.sessions, 0);
        assert_eq!(resp.period, "all");

        let err = server
            .list_chat_history(Parameters(ListChatHistoryRequest { max_sections: None }))
            .await
            .err()
            .expect("tool call should fail");
        assert!(err.contains("API key"));
    }

    #[tokio::test]
    async fn get_session_analytics_rejects_unknown_sport() {
        let err = server()
            .get_session_analytics(Parameters(GetSessionAnalyticsRequest {
                period: None,
                sport: Some("curling".to_string()),
            }))
            .await
            .err()
            .expect("tool call should fail");
        assert!(err.contains("Unknown sport"));
    }
}
