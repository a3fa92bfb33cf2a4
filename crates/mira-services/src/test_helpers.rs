//! In-memory doubles for repositories and external collaborators.
//!
//! Enabled for this crate's tests and, through the `test-helpers` feature,
//! for dependent crates' tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use mira_core::models::{
    normalize_email, AuditLogEntry, Document, LoginToken, NewAuditLogEntry, NewDocument,
    Principal, Role, SecretRecord, SecretScope, Tenant, ACTION_UPLOAD_DOCUMENT,
};
use mira_core::{AppError, EncryptionService};
use mira_db::{
    AuditRepositoryTrait, DocumentRepositoryTrait, LoginTokenRepositoryTrait,
    PrincipalRepositoryTrait, SecretRepositoryTrait,
};

use crate::auth::Mailer;
use crate::providers::{
    parse_board_ref, BoardCard, BoardClient, BoardData, BoardError, BoardList, BoardSummary,
    CardUpdate, ChatRequest, ChatResponse, ContentBlock, EmbeddingProvider, LlmProvider, NewCard,
    ProviderError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cipher with a fixed key.
pub fn test_cipher() -> EncryptionService {
    match EncryptionService::from_key_bytes(b"01234567890123456789012345678901") {
        Ok(cipher) => cipher,
        Err(e) => panic!("fixed test key rejected: {}", e),
    }
}

/// A principal of `tenant_id` that exists only in memory.
pub fn principal_in(tenant_id: Uuid, role: Role) -> Principal {
    let id = Uuid::new_v4();
    Principal {
        id,
        email: format!("{}@example.com", id.simple()),
        tenant_id,
        role,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySecretRepository {
    rows: Mutex<HashMap<(SecretScope, String), SecretRecord>>,
    fail_reads: AtomicBool,
}

impl InMemorySecretRepository {
    pub fn row_count(&self) -> usize {
        lock(&self.rows).len()
    }

    /// Stored ciphertext.
    pub fn raw_value(&self, scope: SecretScope, key_name: &str) -> Option<String> {
        lock(&self.rows)
            .get(&(scope, key_name.to_string()))
            .map(|r| r.encrypted_value.clone())
    }

    /// Make every read fail as if the database were unreachable.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretRepositoryTrait for InMemorySecretRepository {
    async fn upsert(
        &self,
        scope: SecretScope,
        key_name: &str,
        encrypted_value: &str,
    ) -> Result<SecretRecord, AppError> {
        let now = Utc::now();
        let mut rows = lock(&self.rows);
        let record = rows
            .entry((scope, key_name.to_string()))
            .and_modify(|r| {
                r.encrypted_value = encrypted_value.to_string();
                r.updated_at = now;
            })
            .or_insert_with(|| SecretRecord {
                id: Uuid::new_v4(),
                owner_id: scope.owner_id(),
                key_name: key_name.to_string(),
                encrypted_value: encrypted_value.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn get(
        &self,
        scope: SecretScope,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("secret store unreachable".to_string()));
        }
        Ok(lock(&self.rows).get(&(scope, key_name.to_string())).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPrincipalRepository {
    tenants: Mutex<Vec<Tenant>>,
    principals: Mutex<Vec<Principal>>,
}

impl InMemoryPrincipalRepository {
    pub fn tenant_name(&self, tenant_id: Uuid) -> Option<String> {
        lock(&self.tenants)
            .iter()
            .find(|t| t.id == tenant_id)
            .map(|t| t.name.clone())
    }

    fn tenant_for(&self, company_name: &str, domain: Option<&str>) -> Uuid {
        let mut tenants = lock(&self.tenants);
        if let Some(domain) = domain {
            if let Some(t) = tenants.iter().find(|t| t.domain.as_deref() == Some(domain)) {
                return t.id;
            }
        }
        if let Some(t) = tenants.iter_mut().find(|t| t.name == company_name) {
            if t.domain.is_none() {
                t.domain = domain.map(str::to_string);
            }
            return t.id;
        }
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: company_name.to_string(),
            domain: domain.map(str::to_string),
            created_at: Utc::now(),
        };
        let id = tenant.id;
        tenants.push(tenant);
        id
    }
}

#[async_trait]
impl PrincipalRepositoryTrait for InMemoryPrincipalRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        Ok(lock(&self.principals).iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError> {
        let email = normalize_email(email);
        Ok(lock(&self.principals)
            .iter()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn get_or_create(
        &self,
        email: &str,
        company_name: &str,
        domain: Option<&str>,
    ) -> Result<Principal, AppError> {
        if let Some(existing) = self.find_by_email(email).await? {
            return Ok(existing);
        }
        let tenant_id = self.tenant_for(company_name, domain);
        let mut principals = lock(&self.principals);
        let members = principals.iter().filter(|p| p.tenant_id == tenant_id).count();
        let principal = Principal {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            tenant_id,
            role: Role::for_new_member(members as i64),
            created_at: Utc::now(),
        };
        principals.push(principal.clone());
        Ok(principal)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Principal, AppError> {
        let mut principals = lock(&self.principals);
        let principal = principals
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;
        principal.role = role;
        Ok(principal.clone())
    }
}

#[derive(Default)]
pub struct InMemoryLoginTokenRepository {
    tokens: Mutex<Vec<LoginToken>>,
}

impl InMemoryLoginTokenRepository {
    /// Move every token's expiry into the past.
    pub fn expire_all(&self) {
        let past = Utc::now() - Duration::minutes(1);
        for token in lock(&self.tokens).iter_mut() {
            token.expires_at = past;
        }
    }

    pub fn hashes(&self) -> Vec<String> {
        lock(&self.tokens).iter().map(|t| t.token_hash.clone()).collect()
    }
}

#[async_trait]
impl LoginTokenRepositoryTrait for InMemoryLoginTokenRepository {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        lock(&self.tokens).push(LoginToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn consume(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        let now = Utc::now();
        let mut tokens = lock(&self.tokens);
        Ok(tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && t.is_consumable(now))
            .map(|t| {
                t.used_at = Some(now);
                t.user_id
            }))
    }
}

#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: Mutex<Vec<Document>>,
    audit: Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryDocumentRepository {
    pub fn audit_actions(&self) -> Vec<String> {
        lock(&self.audit).iter().map(|e| e.action.clone()).collect()
    }
}

#[async_trait]
impl DocumentRepositoryTrait for InMemoryDocumentRepository {
    async fn create_with_audit(&self, doc: NewDocument) -> Result<Document, AppError> {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            tenant_id: doc.tenant_id,
            principal_id: doc.principal_id,
            filename: doc.filename,
            path: doc.path,
            size: doc.size,
            sha256: doc.sha256,
            uploaded_at: now,
        };
        lock(&self.audit).push(AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id: document.tenant_id,
            principal_id: document.principal_id,
            action: ACTION_UPLOAD_DOCUMENT.to_string(),
            doc_id: Some(document.id),
            meta_json: Some(json!({
                "filename": document.filename,
                "path": document.path,
            })),
            created_at: now,
        });
        lock(&self.documents).push(document.clone());
        Ok(document)
    }

    async fn list_by_tenant(&self, tenant_id: Uuid, limit: i64) -> Result<Vec<Document>, AppError> {
        Ok(lock(&self.documents)
            .iter()
            .rev()
            .filter(|d| d.tenant_id == tenant_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryAuditRepository {
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl AuditRepositoryTrait for InMemoryAuditRepository {
    async fn append(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, AppError> {
        let stored = AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            principal_id: entry.principal_id,
            action: entry.action.clone(),
            doc_id: entry.doc_id,
            meta_json: entry.meta_json.clone(),
            created_at: Utc::now(),
        };
        lock(&self.entries).push(stored.clone());
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

/// Captures `(to, subject, body)` instead of sending.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        lock(&self.sent).push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

const KEYWORD_DIM: usize = 256;

/// Deterministic bag-of-words embedder: each lowercase alphanumeric token
/// adds one to a hashed bucket. Texts sharing words end up close.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    fail_marker: Option<String>,
}

impl KeywordEmbedder {
    /// Fail any request with an input containing `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Number of `embed` requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; KEYWORD_DIM];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            // FNV-1a
            let hash = token
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            vector[(hash % KEYWORD_DIM as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if inputs.iter().any(|i| i.contains(marker.as_str())) {
                return Err(ProviderError::Api {
                    service: "test embeddings",
                    status: 400,
                    message: "rejected input".to_string(),
                });
            }
        }
        Ok(inputs.iter().map(|i| self.vector_for(i)).collect())
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Api {
            service: "test embeddings",
            status: 500,
            message: "upstream unavailable".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

pub fn text_response(text: impl Into<String>) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::Text { text: text.into() }],
    }
}

pub fn tool_call_response(id: &str, name: &str, input: Value) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
    }
}

enum Script {
    Queue(VecDeque<Result<ChatResponse, ProviderError>>),
    Repeat(ChatResponse),
}

/// LLM that replays scripted responses and records every request.
///
/// Once a queue is exhausted it answers with plain text `"Done."`.
pub struct ScriptedLlm {
    script: Mutex<Script>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ChatResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(results.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return `response` for every call.
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            script: Mutex::new(Script::Repeat(response)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as a rejected API key would.
    pub fn unauthorized() -> Self {
        Self::with_results(vec![Err(ProviderError::Api {
            service: "OpenAI",
            status: 401,
            message: "authentication failed (HTTP 401)".to_string(),
        })])
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted-test"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        lock(&self.requests).push(request);
        match &mut *lock(&self.script) {
            Script::Repeat(response) => Ok(response.clone()),
            Script::Queue(queue) => queue.pop_front().unwrap_or_else(|| Ok(text_response("Done."))),
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

pub fn card(name: &str, desc: &str, due: Option<&str>) -> BoardCard {
    BoardCard {
        id: Uuid::new_v4().simple().to_string(),
        name: name.to_string(),
        desc: desc.to_string(),
        due: due.map(str::to_string),
        labels: Vec::new(),
        id_members: Vec::new(),
    }
}

/// Board client backed by one in-memory board.
pub struct FakeBoard {
    board_id: String,
    lists: Mutex<Vec<BoardList>>,
    fetches: AtomicUsize,
}

impl FakeBoard {
    pub fn new(board_id: &str, lists: Vec<(&str, Vec<BoardCard>)>) -> Self {
        let lists = lists
            .into_iter()
            .enumerate()
            .map(|(i, (name, cards))| BoardList {
                id: format!("list{}", i),
                name: name.to_string(),
                closed: false,
                cards,
            })
            .collect();
        Self {
            board_id: board_id.to_string(),
            lists: Mutex::new(lists),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check(&self, board_ref: &str) -> Result<(), BoardError> {
        match parse_board_ref(board_ref) {
            Some(id) if id == self.board_id => Ok(()),
            _ => Err(BoardError::InvalidBoard(format!("board {} not found", board_ref))),
        }
    }

    fn with_card<T>(
        &self,
        card_id: &str,
        f: impl FnOnce(&mut BoardCard) -> T,
    ) -> Result<T, BoardError> {
        let mut lists = lock(&self.lists);
        lists
            .iter_mut()
            .flat_map(|l| l.cards.iter_mut())
            .find(|c| c.id == card_id)
            .map(f)
            .ok_or_else(|| BoardError::Api {
                status: 404,
                message: format!("card {} not found", card_id),
            })
    }
}

#[async_trait]
impl BoardClient for FakeBoard {
    async fn resolve_board(&self, board_ref: &str) -> Result<BoardSummary, BoardError> {
        self.check(board_ref)?;
        Ok(BoardSummary {
            id: self.board_id.clone(),
            name: "Test Board".to_string(),
            url: None,
        })
    }

    async fn fetch_board(&self, board_ref: &str) -> Result<BoardData, BoardError> {
        self.check(board_ref)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(BoardData {
            board_id: self.board_id.clone(),
            lists: lock(&self.lists).iter().filter(|l| !l.closed).cloned().collect(),
        })
    }

    async fn create_card(&self, new: NewCard) -> Result<BoardCard, BoardError> {
        let mut lists = lock(&self.lists);
        let list = lists
            .iter_mut()
            .find(|l| l.id == new.list_id)
            .ok_or_else(|| BoardError::Api {
                status: 404,
                message: format!("list {} not found", new.list_id),
            })?;
        let created = card(&new.name, new.desc.as_deref().unwrap_or_default(), new.due.as_deref());
        list.cards.push(created.clone());
        Ok(created)
    }

    async fn update_card(&self, card_id: &str, update: CardUpdate) -> Result<BoardCard, BoardError> {
        self.with_card(card_id, |c| {
            if let Some(name) = update.name {
                c.name = name;
            }
            if let Some(desc) = update.desc {
                c.desc = desc;
            }
            if let Some(due) = update.due {
                c.due = Some(due);
            }
            c.clone()
        })
    }

    async fn add_comment(&self, card_id: &str, _text: &str) -> Result<(), BoardError> {
        self.with_card(card_id, |_| ())
    }

    async fn add_checklist_item(&self, card_id: &str, _item: &str) -> Result<(), BoardError> {
        self.with_card(card_id, |_| ())
    }

    async fn set_card_archived(&self, card_id: &str, _archived: bool) -> Result<(), BoardError> {
        self.with_card(card_id, |_| ())
    }

    async fn set_list_archived(&self, list_id: &str, archived: bool) -> Result<(), BoardError> {
        let mut lists = lock(&self.lists);
        let list = lists
            .iter_mut()
            .find(|l| l.id == list_id)
            .ok_or_else(|| BoardError::Api {
                status: 404,
                message: format!("list {} not found", list_id),
            })?;
        list.closed = archived;
        Ok(())
    }

    async fn create_board(&self, name: &str) -> Result<BoardSummary, BoardError> {
        Ok(BoardSummary {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            url: None,
        })
    }

    async fn create_list(&self, _board_id: &str, name: &str) -> Result<BoardList, BoardError> {
        let mut lists = lock(&self.lists);
        let list = BoardList {
            id: format!("list{}", lists.len()),
            name: name.to_string(),
            closed: false,
            cards: Vec::new(),
        };
        lists.push(list.clone());
        Ok(list)
    }
}

