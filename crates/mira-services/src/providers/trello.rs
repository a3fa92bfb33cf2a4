//! Trello board client
//!
//! Upstream failures of any kind come back as [`BoardError`], which callers
//! treat as a recoverable `{error: message}` result rather than a crash.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use mira_core::AppError;

pub const TRELLO_API_URL: &str = "https://api.trello.com/1";
const CHECKLIST_NAME: &str = "Checklist";

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Trello credentials not configured")]
    NotConfigured,

    #[error("Invalid Board ID or credentials: {0}")]
    InvalidBoard(String),

    #[error("Trello API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Trello request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Trello request failed: {0}")]
    Transport(String),
}

impl From<BoardError> for AppError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::NotConfigured => {
                AppError::not_configured("Trello", "trello_api_key and trello_token are required")
            }
            BoardError::Timeout { seconds } => AppError::Timeout {
                service: "Trello".to_string(),
                seconds,
            },
            other => AppError::external("Trello", other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardLabel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub labels: Vec<CardLabel>,
    #[serde(default, rename = "idMembers")]
    pub id_members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub cards: Vec<BoardCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Lists and cards of one board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardData {
    pub board_id: String,
    pub lists: Vec<BoardList>,
}

impl BoardData {
    /// `(list name, card summary lines)` in board order.
    pub fn summaries(&self) -> Vec<(String, Vec<String>)> {
        self.lists
            .iter()
            .map(|list| (list.name.clone(), list.cards.iter().map(card_summary).collect()))
            .collect()
    }
}

/// `- name[: desc][ (Due: YYYY-MM-DD)]`
pub fn card_summary(card: &BoardCard) -> String {
    let mut line = format!("- {}", card.name);
    if !card.desc.is_empty() {
        line.push_str(&format!(": {}", card.desc));
    }
    if let Some(due) = card.due.as_deref().filter(|d| !d.is_empty()) {
        let date: String = due.chars().take(10).collect();
        line.push_str(&format!(" (Due: {})", date));
    }
    line
}

/// Board id from a raw id or short link, or a `https://trello.com/b/<id>/<slug>` URL.
pub fn parse_board_ref(input: &str) -> Option<String> {
    let input = input.trim();
    let id = match input.find("trello.com/b/") {
        Some(pos) => input[pos + "trello.com/b/".len()..]
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default(),
        None => input,
    };
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(id.to_string())
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub list_id: String,
    pub name: String,
    pub desc: Option<String>,
    pub due: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub due: Option<String>,
    pub list_id: Option<String>,
}

/// Task-board operations.
#[async_trait]
pub trait BoardClient: Send + Sync {
    /// Resolve a raw id, short link or board URL to the board's full id.
    async fn resolve_board(&self, board_ref: &str) -> Result<BoardSummary, BoardError>;

    /// All lists with their cards.
    async fn fetch_board(&self, board_ref: &str) -> Result<BoardData, BoardError>;

    async fn create_card(&self, card: NewCard) -> Result<BoardCard, BoardError>;

    async fn update_card(&self, card_id: &str, update: CardUpdate) -> Result<BoardCard, BoardError>;

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardError>;

    /// Add an item to the card's first checklist, creating one named
    /// `Checklist` when the card has none.
    async fn add_checklist_item(&self, card_id: &str, item: &str) -> Result<(), BoardError>;

    async fn set_card_archived(&self, card_id: &str, archived: bool) -> Result<(), BoardError>;

    async fn set_list_archived(&self, list_id: &str, archived: bool) -> Result<(), BoardError>;

    async fn create_board(&self, name: &str) -> Result<BoardSummary, BoardError>;

    async fn create_list(&self, board_id: &str, name: &str) -> Result<BoardList, BoardError>;
}

pub struct TrelloClient {
    client: Client,
    base_url: String,
    api_key: String,
    token: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for TrelloClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrelloClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct ChecklistRef {
    id: String,
}

impl TrelloClient {
    pub fn new(
        api_key: impl Into<String>,
        token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, BoardError> {
        let api_key = api_key.into();
        let token = token.into();
        if api_key.trim().is_empty() || token.trim().is_empty() {
            return Err(BoardError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BoardError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: TRELLO_API_URL.to_string(),
            api_key,
            token,
            timeout_secs,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
    }

    fn map_transport(&self, err: reqwest::Error) -> BoardError {
        if err.is_timeout() {
            BoardError::Timeout {
                seconds: self.timeout_secs,
            }
        } else {
            BoardError::Transport(err.to_string())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BoardError> {
        let response = request.send().await.map_err(|e| self.map_transport(e))?;
        let status = response.status();
        if !status.is_success() {
            let message = if status.as_u16() == 401 {
                "unauthorized".to_string()
            } else {
                response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<body read error: {}>", e))
            };
            return Err(BoardError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response.json().await.map_err(|e| self.map_transport(e))
    }

    async fn send_unit(&self, request: RequestBuilder) -> Result<(), BoardError> {
        self.send::<serde_json::Value>(request).await.map(|_| ())
    }
}

#[async_trait]
impl BoardClient for TrelloClient {
    async fn resolve_board(&self, board_ref: &str) -> Result<BoardSummary, BoardError> {
        let id = parse_board_ref(board_ref)
            .ok_or_else(|| BoardError::InvalidBoard(format!("'{}' is not a board id or URL", board_ref)))?;
        self.send(self.request(Method::GET, &format!("/boards/{}", id)))
            .await
            .map_err(|e| match e {
                BoardError::Timeout { .. } => e,
                other => BoardError::InvalidBoard(other.to_string()),
            })
    }

    async fn fetch_board(&self, board_ref: &str) -> Result<BoardData, BoardError> {
        let start = std::time::Instant::now();
        let board = self.resolve_board(board_ref).await?;
        let lists: Vec<BoardList> = self
            .send(
                self.request(Method::GET, &format!("/boards/{}/lists", board.id))
                    .query(&[
                        ("cards", "all"),
                        ("card_fields", "name,desc,due,labels,idMembers"),
                    ]),
            )
            .await?;

        tracing::info!(
            board_id = %board.id,
            lists = lists.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Board fetched"
        );
        Ok(BoardData {
            board_id: board.id,
            lists,
        })
    }

    async fn create_card(&self, card: NewCard) -> Result<BoardCard, BoardError> {
        let mut query = vec![("idList", card.list_id), ("name", card.name)];
        if let Some(desc) = card.desc {
            query.push(("desc", desc));
        }
        if let Some(due) = card.due {
            query.push(("due", due));
        }
        self.send(self.request(Method::POST, "/cards").query(&query))
            .await
    }

    async fn update_card(&self, card_id: &str, update: CardUpdate) -> Result<BoardCard, BoardError> {
        let mut query = Vec::new();
        if let Some(name) = update.name {
            query.push(("name", name));
        }
        if let Some(desc) = update.desc {
            query.push(("desc", desc));
        }
        if let Some(due) = update.due {
            query.push(("due", due));
        }
        if let Some(list_id) = update.list_id {
            query.push(("idList", list_id));
        }
        self.send(
            self.request(Method::PUT, &format!("/cards/{}", card_id))
                .query(&query),
        )
        .await
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), BoardError> {
        self.send_unit(
            self.request(Method::POST, &format!("/cards/{}/actions/comments", card_id))
                .query(&[("text", text)]),
        )
        .await
    }

    async fn add_checklist_item(&self, card_id: &str, item: &str) -> Result<(), BoardError> {
        let existing: Vec<ChecklistRef> = self
            .send(self.request(Method::GET, &format!("/cards/{}/checklists", card_id)))
            .await?;
        let checklist_id = match existing.into_iter().next() {
            Some(checklist) => checklist.id,
            None => {
                let created: ChecklistRef = self
                    .send(
                        self.request(Method::POST, "/checklists")
                            .query(&[("idCard", card_id), ("name", CHECKLIST_NAME)]),
                    )
                    .await?;
                created.id
            }
        };
        self.send_unit(
            self.request(Method::POST, &format!("/checklists/{}/checkItems", checklist_id))
                .query(&[("name", item)]),
        )
        .await
    }

    async fn set_card_archived(&self, card_id: &str, archived: bool) -> Result<(), BoardError> {
        self.send_unit(
            self.request(Method::PUT, &format!("/cards/{}", card_id))
                .query(&[("closed", archived.to_string())]),
        )
        .await
    }

    async fn set_list_archived(&self, list_id: &str, archived: bool) -> Result<(), BoardError> {
        self.send_unit(
            self.request(Method::PUT, &format!("/lists/{}/closed", list_id))
                .query(&[("value", archived.to_string())]),
        )
        .await
    }

    async fn create_board(&self, name: &str) -> Result<BoardSummary, BoardError> {
        self.send(
            self.request(Method::POST, "/boards")
                .query(&[("name", name), ("defaultLists", "false")]),
        )
        .await
    }

    async fn create_list(&self, board_id: &str, name: &str) -> Result<BoardList, BoardError> {
        self.send(
            self.request(Method::POST, "/lists")
                .query(&[("name", name), ("idBoard", board_id)]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn auth() -> Vec<Matcher> {
        vec![
            Matcher::UrlEncoded("key".into(), "k".into()),
            Matcher::UrlEncoded("token".into(), "t".into()),
        ]
    }

    fn client(server: &Server) -> TrelloClient {
        TrelloClient::new("k", "t", 5).unwrap().with_base_url(server.url())
    }

    #[test]
    fn board_refs() {
        assert_eq!(parse_board_ref("AbC123").as_deref(), Some("AbC123"));
        assert_eq!(
            parse_board_ref("https://trello.com/b/xYz789/ai-adoption").as_deref(),
            Some("xYz789")
        );
        assert_eq!(parse_board_ref("https://trello.com/b/xYz789").as_deref(), Some("xYz789"));
        assert_eq!(parse_board_ref(""), None);
        assert_eq!(parse_board_ref("../boards"), None);
    }

    #[test]
    fn card_summary_format() {
        let card = BoardCard {
            id: "1".to_string(),
            name: "Task B".to_string(),
            desc: String::new(),
            due: Some("2025-01-01T12:00:00.000Z".to_string()),
            labels: vec![],
            id_members: vec![],
        };
        assert_eq!(card_summary(&card), "- Task B (Due: 2025-01-01)");

        let card = BoardCard {
            desc: "wire up SSO".to_string(),
            due: None,
            ..card
        };
        assert_eq!(card_summary(&card), "- Task B: wire up SSO");
    }

    #[test]
    fn missing_credentials() {
        assert!(matches!(TrelloClient::new("", "t", 5), Err(BoardError::NotConfigured)));
    }

    #[tokio::test]
    async fn fetch_board_resolves_then_lists() {
        let mut server = Server::new_async().await;
        let board = server
            .mock("GET", "/boards/short1")
            .match_query(Matcher::AllOf(auth()))
            .with_status(200)
            .with_body(r#"{"id":"full-board-id","name":"AI Adoption","url":"https://trello.com/b/short1"}"#)
            .create_async()
            .await;
        let mut list_query = auth();
        list_query.push(Matcher::UrlEncoded("cards".into(), "all".into()));
        list_query.push(Matcher::UrlEncoded(
            "card_fields".into(),
            "name,desc,due,labels,idMembers".into(),
        ));
        let lists = server
            .mock("GET", "/boards/full-board-id/lists")
            .match_query(Matcher::AllOf(list_query))
            .with_status(200)
            .with_body(
                r#"[
                    {"id":"l1","name":"To Do","cards":[{"id":"c1","name":"Task A","desc":"","due":null,"labels":[],"idMembers":[]}]},
                    {"id":"l2","name":"Done","cards":[{"id":"c2","name":"Task B","desc":"","due":"2025-01-01T00:00:00.000Z","labels":[{"name":"green","color":"green"}],"idMembers":["m1"]}]},
                    {"id":"l3","name":"Later","cards":[]}
                ]"#,
            )
            .create_async()
            .await;

        let data = client(&server)
            .fetch_board("https://trello.com/b/short1/ai-adoption")
            .await
            .unwrap();

        board.assert_async().await;
        lists.assert_async().await;
        assert_eq!(data.board_id, "full-board-id");
        assert_eq!(
            data.summaries(),
            vec![
                ("To Do".to_string(), vec!["- Task A".to_string()]),
                ("Done".to_string(), vec!["- Task B (Due: 2025-01-01)".to_string()]),
                ("Later".to_string(), vec![]),
            ]
        );
        assert_eq!(data.lists[1].cards[0].id_members, vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_board_is_invalid_board() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/boards/nope")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("The requested resource was not found.")
            .create_async()
            .await;

        let err = client(&server).fetch_board("nope").await.unwrap_err();
        assert!(matches!(err, BoardError::InvalidBoard(_)));
        assert!(err.to_string().starts_with("Invalid Board ID or credentials:"));
    }

    #[tokio::test]
    async fn checklist_created_when_card_has_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/cards/c1/checklists")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let created = server
            .mock("POST", "/checklists")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("idCard".into(), "c1".into()),
                Matcher::UrlEncoded("name".into(), "Checklist".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"cl1"}"#)
            .create_async()
            .await;
        let item = server
            .mock("POST", "/checklists/cl1/checkItems")
            .match_query(Matcher::UrlEncoded("name".into(), "Write tests".into()))
            .with_status(200)
            .with_body(r#"{"id":"i1"}"#)
            .create_async()
            .await;

        client(&server)
            .add_checklist_item("c1", "Write tests")
            .await
            .unwrap();
        created.assert_async().await;
        item.assert_async().await;
    }

    #[tokio::test]
    async fn archive_list_uses_closed_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/lists/l1/closed")
            .match_query(Matcher::UrlEncoded("value".into(), "true".into()))
            .with_status(200)
            .with_body(r#"{"id":"l1","name":"Old","closed":true}"#)
            .create_async()
            .await;

        client(&server).set_list_archived("l1", true).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_card_passes_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/cards")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("idList".into(), "l1".into()),
                Matcher::UrlEncoded("name".into(), "Kickoff".into()),
                Matcher::UrlEncoded("due".into(), "2025-02-01".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"c9","name":"Kickoff","desc":"","due":"2025-02-01T00:00:00.000Z"}"#)
            .create_async()
            .await;

        let card = client(&server)
            .create_card(NewCard {
                list_id: "l1".to_string(),
                name: "Kickoff".to_string(),
                desc: None,
                due: Some("2025-02-01".to_string()),
            })
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(card.id, "c9");
    }
}
