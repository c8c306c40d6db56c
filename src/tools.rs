//! Tool surface: the [`Tool`] trait, its execution context, the built-in
//! skill tools, and the [`ToolRegistry`].
//!
//! The same registry backs `POST /tools/{name}` and the MCP endpoint, so
//! every transport sees identical tools with identical schemas.
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `search_skills` | Hybrid search by free text (and optional embedding) |
//! | `get_skill` | Fetch one skill by id |
//! | `check_duplicate` | Find a near-duplicate of an embedding or text |
//! | `create_skill` | Create unless a near-duplicate exists |
//! | `update_skill` | Partial update with version bump |
//!
//! When a tool needs an embedding and the caller did not pass one, the
//! configured [`EmbeddingProvider`] computes it from the skill's problem,
//! conditions, and keywords (or from the query text for search).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use skillbank_core::models::compose_embedding_text;
use skillbank_core::{
    CreateOutcome, ScoredSkill, Skill, SkillDraft, SkillError, SkillLibrary, SkillPatch,
};

use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::sqlite_store::SqliteStore;

/// A tool agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name: `POST /tools/{name}`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// True for tools that only read.
    fn read_only(&self) -> bool {
        false
    }

    /// JSON Schema (`type: "object"`) for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` has already passed [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool descriptor for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub read_only: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            read_only: tool.read_only(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Everything a tool needs: the library, an embedder, retrieval defaults.
///
/// Built once at startup and shared behind an `Arc`. The CLI commands go
/// through the same methods, so `skb add` and `create_skill` behave alike.
pub struct ToolContext {
    library: SkillLibrary<SqliteStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retrieval: RetrievalConfig,
}

impl ToolContext {
    pub fn new(
        library: SkillLibrary<SqliteStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            library,
            embedder,
            retrieval,
        }
    }

    /// Connect to the configured database, ensure indexes, and build the
    /// configured embedding provider.
    pub async fn open(config: &Config) -> Result<Self> {
        let settings = config.library_settings();
        let pool = db::connect(&config.db).await?;
        let library = SkillLibrary::new(SqliteStore::new(pool, settings.dims), settings);
        library.ensure_indexes().await?;
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        Ok(Self::new(library, embedder, config.retrieval.clone()))
    }

    pub fn library(&self) -> &SkillLibrary<SqliteStore> {
        &self.library
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Use `given` if present, else embed `text` with the configured provider.
    pub async fn resolve_embedding(&self, given: Option<Vec<f32>>, text: &str) -> Result<Vec<f32>> {
        match given {
            Some(embedding) => Ok(embedding),
            None => embed_query(self.embedder.as_ref(), self.library.dims(), text).await,
        }
    }

    /// Hybrid search, embedding `query` when no embedding is given.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        min_score: Option<f64>,
        embedding: Option<Vec<f32>>,
    ) -> Result<Vec<ScoredSkill>> {
        require_non_blank(query, "query")?;
        let limit = limit.unwrap_or(self.retrieval.top_k);
        let min_score = min_score.or(self.library.settings().merge.min_score);
        let embedding = self.resolve_embedding(embedding, query).await?;
        Ok(self
            .library
            .search_with_min_score(&embedding, query, limit, min_score)
            .await?)
    }

    /// Create from a draft unless a near-duplicate exists. An empty
    /// `draft.embedding` is computed from the draft's embedding text.
    pub async fn create(&self, mut draft: SkillDraft) -> Result<CreateOutcome> {
        require_non_blank(&draft.title, "title")?;
        require_non_blank(&draft.problem, "problem")?;
        if draft.embedding.is_empty() {
            draft.embedding = self.resolve_embedding(None, &draft.embedding_text()).await?;
        }
        let skill = self.library.new_skill(draft)?;
        Ok(self.library.create_or_get(&skill).await?)
    }

    /// Apply `patch` to skill `id`. When the patch changes embedded text
    /// and carries no embedding, the merged text is re-embedded.
    pub async fn update(&self, id: &str, mut patch: SkillPatch) -> Result<Skill> {
        require_non_blank(id, "id")?;
        if patch.embedding.is_none() && patch.touches_embedding_text() {
            let current = self
                .library
                .get(id)
                .await?
                .ok_or_else(|| SkillError::NotFound(id.to_string()))?;
            let text = compose_embedding_text(
                patch.problem.as_deref().unwrap_or(&current.problem),
                patch.conditions.as_deref().unwrap_or(&current.conditions),
                patch.keywords.as_deref().unwrap_or(&current.keywords),
            );
            patch.embedding = Some(self.resolve_embedding(None, &text).await?);
        }
        Ok(self.library.update(id, patch).await?)
    }
}

/// Skill as returned by tools: every field except the raw embedding.
#[derive(Debug, Clone, Serialize)]
pub struct SkillView {
    pub id: String,
    pub title: String,
    pub version: i64,
    pub problem: String,
    pub resolution: String,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    pub product_area: String,
    pub issue_type: String,
    pub confidence: f64,
    pub times_used: i64,
    pub times_confirmed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Skill> for SkillView {
    fn from(s: &Skill) -> Self {
        Self {
            id: s.id.clone(),
            title: s.title.clone(),
            version: s.version,
            problem: s.problem.clone(),
            resolution: s.resolution.clone(),
            conditions: s.conditions.clone(),
            keywords: s.keywords.clone(),
            product_area: s.product_area.clone(),
            issue_type: s.issue_type.clone(),
            confidence: s.confidence,
            times_used: s.times_used,
            times_confirmed: s.times_confirmed,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| SkillError::Validation(e.to_string()).into())
}

fn require_non_blank(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SkillError::Validation(format!("{field} must not be empty")).into());
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

pub struct SearchSkillsTool;

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    limit: Option<usize>,
    min_score: Option<f64>,
    embedding: Option<Vec<f32>>,
}

#[derive(Serialize)]
struct SearchHit {
    score: f64,
    vector_score: Option<f64>,
    keyword_score: Option<f64>,
    #[serde(flatten)]
    skill: SkillView,
}

#[async_trait]
impl Tool for SearchSkillsTool {
    fn name(&self) -> &str {
        "search_skills"
    }

    fn description(&self) -> &str {
        "Find skills relevant to a problem description using hybrid vector + keyword search"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Problem description or keywords" },
                "limit": { "type": "integer", "description": "Max results" },
                "min_score": { "type": "number", "description": "Drop results scoring below this (0..1)" },
                "embedding": {
                    "type": "array",
                    "items": { "type": "number" },
                    "description": "Pre-computed query embedding; computed from query when absent"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: SearchParams = parse_params(params)?;
        let results = ctx
            .search(&p.query, p.limit, p.min_score, p.embedding)
            .await?;

        let hits: Vec<SearchHit> = results
            .iter()
            .map(|r| SearchHit {
                score: r.score,
                vector_score: r.vector_score,
                keyword_score: r.keyword_score,
                skill: SkillView::from(&r.skill),
            })
            .collect();
        Ok(json!({ "results": hits }))
    }
}

pub struct GetSkillTool;

#[derive(Deserialize)]
struct GetParams {
    id: String,
}

#[async_trait]
impl Tool for GetSkillTool {
    fn name(&self) -> &str {
        "get_skill"
    }

    fn description(&self) -> &str {
        "Retrieve a skill by id"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Skill UUID" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: GetParams = parse_params(params)?;
        require_non_blank(&p.id, "id")?;

        match ctx.library().get(&p.id).await? {
            Some(skill) => Ok(serde_json::to_value(SkillView::from(&skill))?),
            None => Err(SkillError::NotFound(p.id).into()),
        }
    }
}

pub struct CheckDuplicateTool;

#[derive(Deserialize)]
struct DuplicateParams {
    embedding: Option<Vec<f32>>,
    text: Option<String>,
    threshold: Option<f64>,
}

#[async_trait]
impl Tool for CheckDuplicateTool {
    fn name(&self) -> &str {
        "check_duplicate"
    }

    fn description(&self) -> &str {
        "Return the existing skill whose embedding is nearly identical to the given one, if any"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "embedding": { "type": "array", "items": { "type": "number" } },
                "text": { "type": "string", "description": "Embedded with the configured provider when no embedding is given" },
                "threshold": { "type": "number", "description": "Cosine similarity a match must exceed" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: DuplicateParams = parse_params(params)?;
        let embedding = match (p.embedding, p.text.as_deref()) {
            (Some(e), _) => e,
            (None, Some(text)) if !text.trim().is_empty() => {
                ctx.resolve_embedding(None, text).await?
            }
            _ => {
                return Err(
                    SkillError::Validation("one of embedding or text is required".into()).into(),
                )
            }
        };

        let existing = ctx.library().check_duplicate(&embedding, p.threshold).await?;
        Ok(json!({
            "duplicate": existing.is_some(),
            "skill": existing.as_ref().map(SkillView::from),
        }))
    }
}

pub struct CreateSkillTool;

#[derive(Deserialize)]
struct CreateParams {
    title: String,
    problem: String,
    resolution: String,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    product_area: String,
    #[serde(default)]
    issue_type: String,
    embedding: Option<Vec<f32>>,
}

#[async_trait]
impl Tool for CreateSkillTool {
    fn name(&self) -> &str {
        "create_skill"
    }

    fn description(&self) -> &str {
        "Save a new skill, or return the existing one if a near-duplicate is already stored"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "problem": { "type": "string", "description": "What the customer is experiencing" },
                "resolution": { "type": "string", "description": "Markdown playbook" },
                "conditions": { "type": "array", "items": { "type": "string" } },
                "keywords": { "type": "array", "items": { "type": "string" } },
                "product_area": { "type": "string" },
                "issue_type": { "type": "string" },
                "embedding": { "type": "array", "items": { "type": "number" } }
            },
            "required": ["title", "problem", "resolution"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let p: CreateParams = parse_params(params)?;
        let draft = SkillDraft {
            title: p.title,
            problem: p.problem,
            resolution: p.resolution,
            conditions: p.conditions,
            keywords: p.keywords,
            embedding: p.embedding.unwrap_or_default(),
            product_area: p.product_area,
            issue_type: p.issue_type,
        };
        let outcome = ctx.create(draft).await?;
        Ok(json!({
            "skill_id": outcome.skill.id,
            "title": outcome.skill.title,
            "created": outcome.created,
            "skill": SkillView::from(&outcome.skill),
        }))
    }
}

pub struct UpdateSkillTool;

/// Split `{ "id": ..., <patch fields> }` into the id and a [`SkillPatch`].
fn parse_update_params(params: Value) -> Result<(String, SkillPatch)> {
    let mut obj = match params {
        Value::Object(map) => map,
        _ => return Err(SkillError::Validation("parameters must be an object".into()).into()),
    };
    let id = match obj.remove("id") {
        Some(Value::String(id)) => id,
        _ => return Err(SkillError::Validation("id must be a string".into()).into()),
    };
    let patch: SkillPatch = parse_params(Value::Object(obj))?;
    Ok((id, patch))
}

#[async_trait]
impl Tool for UpdateSkillTool {
    fn name(&self) -> &str {
        "update_skill"
    }

    fn description(&self) -> &str {
        "Change some fields of a skill; bumps its version and re-embeds when the problem, conditions, or keywords change"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "title": { "type": "string" },
                "problem": { "type": "string" },
                "resolution": { "type": "string" },
                "conditions": { "type": "array", "items": { "type": "string" } },
                "keywords": { "type": "array", "items": { "type": "string" } },
                "product_area": { "type": "string" },
                "issue_type": { "type": "string" },
                "confidence": { "type": "number" },
                "embedding": { "type": "array", "items": { "type": "number" } }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let (id, patch) = parse_update_params(params)?;
        let changes = patch.changed_fields();
        let updated = ctx.update(&id, patch).await?;
        Ok(json!({
            "skill_id": updated.id,
            "title": updated.title,
            "version": updated.version,
            "changes": changes,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-loaded with the five skill tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchSkillsTool));
        registry.register(Box::new(GetSkillTool));
        registry.register(Box::new(CheckDuplicateTool));
        registry.register(Box::new(CreateSkillTool));
        registry.register(Box::new(UpdateSkillTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's schema: object shape, required keys,
/// and top-level property types. Unknown keys are rejected.
pub fn validate_params(schema: &Value, params: &Value) -> std::result::Result<Value, SkillError> {
    let empty = serde_json::Map::new();
    let obj = match params {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(SkillError::Validation(format!(
                "parameters must be a JSON object, got {}",
                json_type_name(other)
            )))
        }
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|v| v.as_str()) {
            if !obj.contains_key(field) {
                return Err(SkillError::Validation(format!(
                    "missing required parameter: {field}"
                )));
            }
        }
    }

    for (name, value) in obj {
        let Some(prop) = properties.get(name) else {
            return Err(SkillError::Validation(format!("unknown parameter: {name}")));
        };
        let Some(expected) = prop.get("type").and_then(|t| t.as_str()) else {
            continue;
        };
        let ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !ok {
            return Err(SkillError::Validation(format!(
                "parameter '{name}' must be of type '{expected}', got {}",
                json_type_name(value)
            )));
        }
    }

    Ok(Value::Object(obj.clone()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered_once() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 5);
        for name in [
            "search_skills",
            "get_skill",
            "check_duplicate",
            "create_skill",
            "update_skill",
        ] {
            assert!(registry.find(name).is_some(), "missing {name}");
        }
        assert!(registry.find("delete_skill").is_none());
    }

    #[test]
    fn test_validate_params_required() {
        let schema = GetSkillTool.parameters_schema();
        let err = validate_params(&schema, &json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: id"));
    }

    #[test]
    fn test_validate_params_type_mismatch() {
        let schema = SearchSkillsTool.parameters_schema();
        let err = validate_params(&schema, &json!({"query": "x", "limit": "ten"})).unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));
        assert!(err.to_string().contains("'limit'"));
    }

    #[test]
    fn test_validate_params_negative_limit() {
        let schema = SearchSkillsTool.parameters_schema();
        assert!(validate_params(&schema, &json!({"query": "x", "limit": -1})).is_err());
    }

    #[test]
    fn test_validate_params_unknown_key() {
        let schema = GetSkillTool.parameters_schema();
        let err = validate_params(&schema, &json!({"id": "a", "force": true})).unwrap_err();
        assert!(err.to_string().contains("unknown parameter: force"));
    }

    #[test]
    fn test_validate_params_null_is_empty_object() {
        let schema = CheckDuplicateTool.parameters_schema();
        assert_eq!(validate_params(&schema, &Value::Null).unwrap(), json!({}));
    }

    #[test]
    fn test_validate_params_rejects_non_object() {
        let schema = CheckDuplicateTool.parameters_schema();
        assert!(validate_params(&schema, &json!([1, 2])).is_err());
    }

    #[test]
    fn test_update_params_split_id_from_patch() {
        let (id, patch) =
            parse_update_params(json!({"id": "abc", "title": "New", "confidence": 0.9})).unwrap();
        assert_eq!(id, "abc");
        assert_eq!(patch.changed_fields(), vec!["title", "confidence"]);
    }

    #[test]
    fn test_update_params_reject_unknown_field() {
        let err = parse_update_params(json!({"id": "abc", "version": 7})).unwrap_err();
        assert!(err.downcast_ref::<SkillError>().is_some());
    }
}
