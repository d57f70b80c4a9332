//! Memory, graph and session-context tools.

use super::{ToolCategory, ToolHandler, ToolOutput, ToolRegistry, ToolSpec};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::memory::{
    group_by_day, Direction, MemoryRecord, MemoryStore, SearchOptions, SearchStrategy,
    TimelineQuery, DEFAULT_CATEGORY, DEFAULT_WEIGHT,
};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_DEPTH: usize = 2;
const PREVIEW_CHARS: usize = 100;
const CONTEXT_CATEGORY: &str = "context";
const IMPORTANCE_THRESHOLD: f64 = 0.6;
const MAX_PRIORITIZED: usize = 20;

/// Input for save_memory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveInput {
    pub key: String,
    pub value: String,
    pub category: Option<String>,
    pub priority: Option<i64>,
}

/// Input for tools addressing a single record.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyInput {
    pub key: String,
}

/// Input for update_memory.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInput {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub append: bool,
}

/// Input for list_memories.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListInput {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Input for search_memories.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchInput {
    pub query: String,
    pub category: Option<String>,
}

/// Input for get_memories_by_priority.
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityInput {
    pub priority: i64,
}

/// Input for set_memory_priority.
#[derive(Debug, Clone, Deserialize)]
pub struct SetPriorityInput {
    pub key: String,
    pub priority: i64,
}

/// Input for link_memories.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInput {
    pub source_key: String,
    pub target_key: String,
    pub relation_type: String,
    pub weight: Option<f64>,
}

/// Input for unlink_memories.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkInput {
    pub source_key: String,
    pub target_key: String,
    pub relation_type: String,
}

/// Input for get_relations.
#[derive(Debug, Clone, Deserialize)]
pub struct GetRelationsInput {
    pub key: String,
    pub direction: Option<String>,
}

/// Input for get_related_memories.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedInput {
    pub key: String,
    pub depth: Option<usize>,
    pub relation_type: Option<String>,
}

/// Input for get_memory_graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryGraphInput {
    pub root_key: Option<String>,
    pub depth: Option<usize>,
}

/// Input for find_memory_path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindPathInput {
    pub source_key: String,
    pub target_key: String,
}

/// Input for search_memories_advanced.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchAdvancedInput {
    pub query: String,
    pub strategy: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Input for create_memory_timeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineInput {
    pub category: Option<String>,
    pub relation_type: Option<String>,
    pub limit: Option<usize>,
}

/// How urgently a context snapshot should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Record priority assigned to a snapshot of this urgency.
    pub fn priority(self) -> i64 {
        match self {
            Self::High | Self::Critical => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::High | Self::Critical => "critical",
            Self::Medium => "important",
            Self::Low => "normal",
        }
    }
}

/// Input for auto_save_context.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveContextInput {
    pub urgency: Urgency,
    pub context_type: String,
    pub session_id: Option<String>,
    pub summary: Option<String>,
}

/// How much context to bring back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreLevel {
    Essential,
    #[default]
    Detailed,
    Complete,
}

impl RestoreLevel {
    pub fn max_items(self) -> usize {
        match self {
            Self::Essential => 3,
            Self::Detailed => 10,
            Self::Complete => 20,
        }
    }
}

/// Input for restore_session_context.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreContextInput {
    pub session_id: String,
    #[serde(default)]
    pub restore_level: RestoreLevel,
    pub filter_type: Option<String>,
}

/// Input for prioritize_memory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeInput {
    pub current_task: String,
    #[serde(default)]
    pub critical_decisions: Vec<String>,
    #[serde(default)]
    pub code_changes: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Payload stored as the value of a context record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextSnapshot {
    timestamp: String,
    urgency: Urgency,
    context_type: String,
    session_id: Option<String>,
    summary: Option<String>,
    priority: String,
}

/// Compact listing entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordSummary<'a> {
    key: &'a str,
    category: &'a str,
    priority: i64,
    created_at: String,
    preview: String,
}

impl<'a> From<&'a MemoryRecord> for RecordSummary<'a> {
    fn from(record: &'a MemoryRecord) -> Self {
        Self {
            key: &record.key,
            category: &record.category,
            priority: record.priority,
            created_at: record.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            preview: record.preview(PREVIEW_CHARS),
        }
    }
}

fn parse_args<A: DeserializeOwned>(tool: &str, input: Value) -> Result<A> {
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input)
        .map_err(|e| Error::invalid_input(format!("{}: {}", tool, e)))
}

fn typed_handler<A, F>(tool: &'static str, store: &Arc<MemoryStore>, f: F) -> ToolHandler
where
    A: DeserializeOwned + 'static,
    F: Fn(&MemoryStore, A) -> Result<ToolOutput> + Send + Sync + 'static,
{
    let store = Arc::clone(store);
    Arc::new(move |input| {
        let args: A = parse_args(tool, input)?;
        debug!(tool, "Executing memory tool");
        f(&store, args)
    })
}

fn not_found(key: &str) -> ToolOutput {
    ToolOutput::message(format!("Memory not found for key: \"{}\"", key))
}

impl ToolRegistry {
    /// Create a registry with every memory, graph and context tool bound to `store`.
    pub fn with_memory_tools(store: Arc<MemoryStore>, config: &StoreConfig) -> Self {
        let mut registry = Self::new();

        registry.register_save_memory(&store);
        registry.register_recall_memory(&store);
        registry.register_update_memory(&store);
        registry.register_delete_memory(&store);
        registry.register_list_memories(&store, config.list_limit);
        registry.register_search_memories(&store);
        registry.register_get_memories_by_priority(&store);
        registry.register_set_memory_priority(&store);
        registry.register_memory_stats(&store);
        registry.register_prioritize_memory(&store);

        registry.register_link_memories(&store);
        registry.register_unlink_memories(&store);
        registry.register_get_relations(&store);
        registry.register_get_related_memories(&store);
        registry.register_get_memory_graph(&store);
        registry.register_find_memory_path(&store);
        registry.register_search_memories_advanced(&store);
        registry.register_create_memory_timeline(&store, config.timeline_limit);

        registry.register_auto_save_context(&store);
        registry.register_restore_session_context(&store);

        registry
    }

    // =========================================================================
    // Record Tools
    // =========================================================================

    fn register_save_memory(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "save_memory",
            ToolCategory::Memory,
            "Save information to long-term memory. Overwrites any existing memory \
             with the same key but keeps its relations.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Unique key for the memory" },
                "value": { "type": "string", "description": "Content to remember" },
                "category": {
                    "type": "string",
                    "description": "Grouping tag",
                    "default": DEFAULT_CATEGORY
                },
                "priority": {
                    "type": "integer",
                    "description": "Ranking priority; higher is more important",
                    "default": 0
                }
            },
            "required": ["key", "value"]
        }));

        let handler = typed_handler("save_memory", store, |store, args: SaveInput| {
            let category = args.category.as_deref().unwrap_or(DEFAULT_CATEGORY);
            let record = store.save(&args.key, &args.value, category, args.priority.unwrap_or(0))?;
            ToolOutput::report("Memory saved successfully", &record)
        });

        self.register(tool, handler);
    }

    fn register_recall_memory(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new("recall_memory", ToolCategory::Memory, "Recall a memory by key.")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key of the memory to recall" }
                },
                "required": ["key"]
            }));

        let handler = typed_handler("recall_memory", store, |store, args: KeyInput| {
            match store.recall(&args.key)? {
                Some(record) => ToolOutput::report("Memory recalled", &record),
                None => Ok(not_found(&args.key)),
            }
        });

        self.register(tool, handler);
    }

    fn register_update_memory(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "update_memory",
            ToolCategory::Memory,
            "Replace or append to the value of an existing memory. Never creates a memory.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Key of the memory to update" },
                "value": { "type": "string", "description": "New value, or text to append" },
                "append": {
                    "type": "boolean",
                    "description": "Append to the existing value separated by a space",
                    "default": false
                }
            },
            "required": ["key", "value"]
        }));

        let handler = typed_handler("update_memory", store, |store, args: UpdateInput| {
            if !store.update(&args.key, &args.value, args.append)? {
                return Ok(ToolOutput::message(format!(
                    "Memory not found for key: \"{}\". Use save_memory to create new memory.",
                    args.key
                )));
            }
            ToolOutput::report(
                "Memory updated",
                &json!({ "key": args.key, "value": args.value, "append": args.append }),
            )
        });

        self.register(tool, handler);
    }

    fn register_delete_memory(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "delete_memory",
            ToolCategory::Memory,
            "Delete a memory and every relation that references it.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Key of the memory to delete" }
            },
            "required": ["key"]
        }))
        .destructive();

        let handler = typed_handler("delete_memory", store, |store, args: KeyInput| {
            if !store.delete(&args.key)? {
                return Ok(not_found(&args.key));
            }
            ToolOutput::report("Memory deleted", &json!({ "key": args.key, "deleted": true }))
        });

        self.register(tool, handler);
    }

    fn register_list_memories(&mut self, store: &Arc<MemoryStore>, default_limit: usize) {
        let tool = ToolSpec::new(
            "list_memories",
            ToolCategory::Memory,
            "List memories by priority then recency, optionally within one category.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "category": { "type": "string", "description": "Only list this category" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results",
                    "default": default_limit
                }
            }
        }));

        let handler = typed_handler("list_memories", store, move |store, args: ListInput| {
            let records = store.list(args.category.as_deref())?;
            let limit = args.limit.unwrap_or(default_limit);
            let memories: Vec<RecordSummary> =
                records.iter().take(limit).map(RecordSummary::from).collect();
            ToolOutput::report(
                "Memory list",
                &json!({
                    "total": records.len(),
                    "category": args.category,
                    "limit": limit,
                    "memories": memories,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_search_memories(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "search_memories",
            ToolCategory::Memory,
            "Case-insensitive search over memory keys and values.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to search for" },
                "category": { "type": "string", "description": "Only search this category" }
            },
            "required": ["query"]
        }));

        let handler = typed_handler("search_memories", store, |store, args: SearchInput| {
            let results: Vec<MemoryRecord> = store
                .search(&args.query)?
                .into_iter()
                .filter(|r| args.category.as_ref().map_or(true, |c| &r.category == c))
                .collect();
            ToolOutput::report(
                "Memory search results",
                &json!({
                    "query": args.query,
                    "category": args.category,
                    "total": results.len(),
                    "results": results,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_get_memories_by_priority(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "get_memories_by_priority",
            ToolCategory::Memory,
            "List memories with exactly the given priority, newest first.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "priority": { "type": "integer", "description": "Priority to match" }
            },
            "required": ["priority"]
        }));

        let handler = typed_handler(
            "get_memories_by_priority",
            store,
            |store, args: PriorityInput| {
                let memories = store.get_by_priority(args.priority)?;
                ToolOutput::report(
                    "Memories by priority",
                    &json!({
                        "priority": args.priority,
                        "total": memories.len(),
                        "memories": memories,
                    }),
                )
            },
        );

        self.register(tool, handler);
    }

    fn register_set_memory_priority(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "set_memory_priority",
            ToolCategory::Memory,
            "Change the priority of an existing memory without touching its timestamps.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Key of the memory" },
                "priority": { "type": "integer", "description": "New priority" }
            },
            "required": ["key", "priority"]
        }));

        let handler = typed_handler(
            "set_memory_priority",
            store,
            |store, args: SetPriorityInput| {
                if !store.set_priority(&args.key, args.priority)? {
                    return Ok(not_found(&args.key));
                }
                ToolOutput::report(
                    "Memory priority updated",
                    &json!({ "key": args.key, "priority": args.priority }),
                )
            },
        );

        self.register(tool, handler);
    }

    fn register_memory_stats(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "memory_stats",
            ToolCategory::Memory,
            "Count memories per category and relations overall.",
        )
        .with_schema(json!({ "type": "object", "properties": {} }));

        let handler = typed_handler("memory_stats", store, |store, _: Value| {
            ToolOutput::report("Memory statistics", &store.stats()?)
        });

        self.register(tool, handler);
    }

    fn register_prioritize_memory(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "prioritize_memory",
            ToolCategory::Memory,
            "Rank stored memories by importance to the current task. Errors, decisions \
             and code notes score highest; mentions of the task, decisions, code \
             changes or blockers raise the score.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "currentTask": { "type": "string", "description": "Current task description" },
                "criticalDecisions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Critical decisions made so far"
                },
                "codeChanges": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Important code changes"
                },
                "blockers": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Current blockers or issues"
                },
                "nextSteps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Planned next steps"
                }
            },
            "required": ["currentTask"]
        }));

        let handler = typed_handler("prioritize_memory", store, |store, args: PrioritizeInput| {
            let records = store.list(None)?;
            let mut scored: Vec<(f64, String, &MemoryRecord)> = records
                .iter()
                .map(|record| {
                    let (score, reason) = importance(record, &args);
                    (score, reason, record)
                })
                .filter(|(score, _, _)| *score >= IMPORTANCE_THRESHOLD)
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.truncate(MAX_PRIORITIZED);

            let prioritized: Vec<Value> = scored
                .iter()
                .map(|(score, reason, record)| {
                    json!({
                        "key": record.key,
                        "category": record.category,
                        "priority": score,
                        "reason": reason,
                        "timestamp": record.created_at,
                        "preview": record.preview(PREVIEW_CHARS),
                    })
                })
                .collect();

            ToolOutput::report(
                "Memory prioritization completed",
                &json!({
                    "action": "prioritize_memory",
                    "currentTask": args.current_task,
                    "criticalDecisions": args.critical_decisions,
                    "codeChanges": args.code_changes,
                    "blockers": args.blockers,
                    "nextSteps": args.next_steps,
                    "total": prioritized.len(),
                    "prioritized": prioritized,
                    "status": "success",
                }),
            )
        });

        self.register(tool, handler);
    }

    // =========================================================================
    // Graph Tools
    // =========================================================================

    fn register_link_memories(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "link_memories",
            ToolCategory::Graph,
            "Create a typed, directed relation between two existing memories. \
             Linking the same triple again only replaces its weight.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "sourceKey": { "type": "string", "description": "Key of the source memory" },
                "targetKey": { "type": "string", "description": "Key of the target memory" },
                "relationType": {
                    "type": "string",
                    "description": "Relation label, e.g. related_to, depends_on, implements"
                },
                "weight": {
                    "type": "number",
                    "description": "Relation strength",
                    "default": DEFAULT_WEIGHT
                }
            },
            "required": ["sourceKey", "targetKey", "relationType"]
        }));

        let handler = typed_handler("link_memories", store, |store, args: LinkInput| {
            let weight = args.weight.unwrap_or(DEFAULT_WEIGHT);
            if !store.link(&args.source_key, &args.target_key, &args.relation_type, weight)? {
                return Ok(ToolOutput::message(format!(
                    "Cannot link: both \"{}\" and \"{}\" must exist",
                    args.source_key, args.target_key
                )));
            }
            ToolOutput::report(
                "Memories linked",
                &json!({
                    "sourceKey": args.source_key,
                    "targetKey": args.target_key,
                    "relationType": args.relation_type,
                    "weight": weight,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_unlink_memories(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new("unlink_memories", ToolCategory::Graph, "Remove one typed relation.")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "sourceKey": { "type": "string" },
                    "targetKey": { "type": "string" },
                    "relationType": { "type": "string" }
                },
                "required": ["sourceKey", "targetKey", "relationType"]
            }));

        let handler = typed_handler("unlink_memories", store, |store, args: UnlinkInput| {
            if !store.unlink(&args.source_key, &args.target_key, &args.relation_type)? {
                return Ok(ToolOutput::message(format!(
                    "Relation not found: \"{}\" -[{}]-> \"{}\"",
                    args.source_key, args.relation_type, args.target_key
                )));
            }
            ToolOutput::report(
                "Relation removed",
                &json!({
                    "sourceKey": args.source_key,
                    "targetKey": args.target_key,
                    "relationType": args.relation_type,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_get_relations(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new("get_relations", ToolCategory::Graph, "List the relations adjacent to a memory.")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string", "description": "Key of the memory" },
                    "direction": {
                        "type": "string",
                        "enum": ["outgoing", "incoming", "both"],
                        "default": "both"
                    }
                },
                "required": ["key"]
            }));

        let handler = typed_handler("get_relations", store, |store, args: GetRelationsInput| {
            let direction: Direction = match args.direction.as_deref() {
                Some(s) => s.parse()?,
                None => Direction::default(),
            };
            let relations = store.relations_of(&args.key, direction)?;
            ToolOutput::report(
                "Relations",
                &json!({
                    "key": args.key,
                    "direction": direction,
                    "total": relations.len(),
                    "relations": relations,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_get_related_memories(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "get_related_memories",
            ToolCategory::Graph,
            "Memories reachable from a key within a number of hops, nearest first. \
             Relation direction is ignored.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Starting memory" },
                "depth": { "type": "integer", "description": "Maximum hops", "default": DEFAULT_DEPTH },
                "relationType": { "type": "string", "description": "Only follow this relation type" }
            },
            "required": ["key"]
        }));

        let handler = typed_handler("get_related_memories", store, |store, args: RelatedInput| {
            let depth = args.depth.unwrap_or(DEFAULT_DEPTH);
            let memories =
                store.related_memories(&args.key, depth, args.relation_type.as_deref())?;
            ToolOutput::report(
                "Related memories",
                &json!({
                    "key": args.key,
                    "depth": depth,
                    "relationType": args.relation_type,
                    "total": memories.len(),
                    "memories": memories,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_get_memory_graph(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "get_memory_graph",
            ToolCategory::Graph,
            "Nodes, edges and clusters around a root memory, or of the whole store.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "rootKey": { "type": "string", "description": "Root memory; omit for the whole graph" },
                "depth": { "type": "integer", "description": "Maximum hops from the root", "default": DEFAULT_DEPTH }
            }
        }));

        let handler = typed_handler("get_memory_graph", store, |store, args: MemoryGraphInput| {
            let depth = args.depth.unwrap_or(DEFAULT_DEPTH);
            let graph = store.memory_graph(args.root_key.as_deref(), depth)?;
            ToolOutput::report(
                "Memory graph",
                &json!({
                    "rootKey": args.root_key,
                    "depth": depth,
                    "nodeCount": graph.nodes.len(),
                    "edgeCount": graph.edges.len(),
                    "clusterCount": graph.clusters.len(),
                    "graph": graph,
                }),
            )
        });

        self.register(tool, handler);
    }

    fn register_find_memory_path(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "find_memory_path",
            ToolCategory::Graph,
            "Shortest chain of relations connecting two memories, ignoring direction.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "sourceKey": { "type": "string" },
                "targetKey": { "type": "string" }
            },
            "required": ["sourceKey", "targetKey"]
        }));

        let handler = typed_handler("find_memory_path", store, |store, args: FindPathInput| {
            match store.find_path(&args.source_key, &args.target_key)? {
                Some(path) => ToolOutput::report(
                    "Path found",
                    &json!({
                        "sourceKey": args.source_key,
                        "targetKey": args.target_key,
                        "hops": path.len() - 1,
                        "path": path,
                    }),
                ),
                None => Ok(ToolOutput::message(format!(
                    "No path found between \"{}\" and \"{}\"",
                    args.source_key, args.target_key
                ))),
            }
        });

        self.register(tool, handler);
    }

    fn register_search_memories_advanced(&mut self, store: &Arc<MemoryStore>) {
        let strategies: Vec<&str> = SearchStrategy::ALL.iter().map(|s| s.as_str()).collect();
        let tool = ToolSpec::new(
            "search_memories_advanced",
            ToolCategory::Graph,
            "Search memories with an explicit ranking strategy.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to search for" },
                "strategy": {
                    "type": "string",
                    "enum": strategies,
                    "default": SearchStrategy::default().as_str()
                },
                "category": { "type": "string", "description": "Only search this category" },
                "limit": { "type": "integer", "description": "Maximum number of results" }
            },
            "required": ["query"]
        }));

        let handler = typed_handler(
            "search_memories_advanced",
            store,
            |store, args: SearchAdvancedInput| {
                let strategy: SearchStrategy = match args.strategy.as_deref() {
                    Some(s) => s.parse()?,
                    None => SearchStrategy::default(),
                };
                let options = SearchOptions {
                    category: args.category,
                    limit: args.limit,
                };
                let results = store.search_advanced(&args.query, strategy, &options)?;
                ToolOutput::report(
                    "Advanced search results",
                    &json!({
                        "query": args.query,
                        "strategy": strategy,
                        "total": results.len(),
                        "results": results,
                    }),
                )
            },
        );

        self.register(tool, handler);
    }

    fn register_create_memory_timeline(&mut self, store: &Arc<MemoryStore>, default_limit: usize) {
        let tool = ToolSpec::new(
            "create_memory_timeline",
            ToolCategory::Graph,
            "Memories newest first, grouped by day.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "category": { "type": "string", "description": "Only include this category" },
                "relationType": {
                    "type": "string",
                    "description": "Only include memories touched by relations of this type"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of memories",
                    "default": default_limit
                }
            }
        }));

        let handler = typed_handler(
            "create_memory_timeline",
            store,
            move |store, args: TimelineInput| {
                let query = TimelineQuery {
                    category: args.category,
                    relation_type: args.relation_type,
                    limit: Some(args.limit.unwrap_or(default_limit)),
                };
                let records = store.timeline(&query)?;
                let total = records.len();
                ToolOutput::report(
                    "Memory timeline",
                    &json!({ "total": total, "days": group_by_day(records) }),
                )
            },
        );

        self.register(tool, handler);
    }

    // =========================================================================
    // Session Context Tools
    // =========================================================================

    fn register_auto_save_context(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "auto_save_context",
            ToolCategory::Context,
            "Save a snapshot of the current working context. Call this when the user \
             says commit, save, checkpoint or backup.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "urgency": {
                    "type": "string",
                    "enum": ["low", "medium", "high", "critical"]
                },
                "contextType": {
                    "type": "string",
                    "enum": ["progress", "decisions", "code-snippets", "debugging", "planning"]
                },
                "sessionId": { "type": "string", "description": "Current session identifier" },
                "summary": { "type": "string", "description": "Brief summary of the context" }
            },
            "required": ["urgency", "contextType"]
        }));

        let handler = typed_handler(
            "auto_save_context",
            store,
            |store, args: AutoSaveContextInput| {
                let now = Utc::now();
                let snapshot = ContextSnapshot {
                    timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                    urgency: args.urgency,
                    context_type: args.context_type,
                    session_id: args.session_id,
                    summary: args.summary,
                    priority: args.urgency.label().to_string(),
                };
                let key = match &snapshot.session_id {
                    Some(id) => format!("session_{}_context", id),
                    None => format!("auto_context_{}", now.timestamp_millis()),
                };

                let value = serde_json::to_string(&snapshot)?;
                store.save(&key, &value, CONTEXT_CATEGORY, args.urgency.priority())?;

                ToolOutput::report(
                    "Context auto-saved successfully",
                    &json!({
                        "action": "auto_save_context",
                        "key": key,
                        "contextData": snapshot,
                        "status": "success",
                    }),
                )
            },
        );

        self.register(tool, handler);
    }

    fn register_restore_session_context(&mut self, store: &Arc<MemoryStore>) {
        let tool = ToolSpec::new(
            "restore_session_context",
            ToolCategory::Context,
            "Restore saved context snapshots for a session, newest first.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "sessionId": { "type": "string", "description": "Session ID to restore" },
                "restoreLevel": {
                    "type": "string",
                    "enum": ["essential", "detailed", "complete"],
                    "default": "detailed"
                },
                "filterType": {
                    "type": "string",
                    "enum": ["all", "progress", "decisions", "code-snippets", "debugging", "planning"],
                    "default": "all"
                }
            },
            "required": ["sessionId"]
        }));

        let handler = typed_handler(
            "restore_session_context",
            store,
            |store, args: RestoreContextInput| {
                let filter = args.filter_type.as_deref().filter(|f| *f != "all");

                let mut records: Vec<MemoryRecord> = store
                    .list(Some(CONTEXT_CATEGORY))?
                    .into_iter()
                    .filter(|r| r.key.contains(&args.session_id))
                    .filter(|r| filter.map_or(true, |f| context_type_of(r).as_deref() == Some(f)))
                    .collect();
                records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                records.truncate(args.restore_level.max_items());

                let restored: Vec<Value> = records
                    .iter()
                    .map(|r| {
                        json!({
                            "key": r.key,
                            "data": serde_json::from_str::<Value>(&r.value)
                                .unwrap_or_else(|_| Value::String(r.value.clone())),
                            "timestamp": r.created_at,
                        })
                    })
                    .collect();

                ToolOutput::report(
                    "Session context restored",
                    &json!({
                        "action": "restore_session_context",
                        "sessionId": args.session_id,
                        "restoreLevel": args.restore_level,
                        "filterType": filter.unwrap_or("all"),
                        "restored": restored,
                        "status": "success",
                    }),
                )
            },
        );

        self.register(tool, handler);
    }
}

/// Importance of `record` for the task in `args`, capped at 1.0, with the
/// reasons that produced it.
fn importance(record: &MemoryRecord, args: &PrioritizeInput) -> (f64, String) {
    let value = record.value.as_str();
    let (base, reason) = if value.contains("error") || value.contains("Error") {
        (0.9, "Contains error information")
    } else if value.contains("decision") || value.contains("Decision") {
        (0.8, "Contains decision information")
    } else if value.contains("code") || value.contains("function") {
        (0.7, "Contains code-related information")
    } else if record.category == CONTEXT_CATEGORY {
        (0.6, "Context information")
    } else if record.category == "project" {
        (0.7, "Project-related information")
    } else {
        (0.5, "General information")
    };

    let lowered = value.to_lowercase();
    // Blank needles would match everything.
    let mentions =
        |needle: &str| !needle.trim().is_empty() && lowered.contains(&needle.to_lowercase());

    let mut score = base;
    let mut reason = reason.to_string();
    if mentions(args.current_task.as_str()) {
        score += 0.2;
        reason.push_str(" (related to current task)");
    }

    let boosts: [(&[String], f64, &str); 3] = [
        (args.critical_decisions.as_slice(), 0.15, " (critical decision)"),
        (args.code_changes.as_slice(), 0.1, " (code change)"),
        (args.blockers.as_slice(), 0.25, " (blocker/issue)"),
    ];
    for (needles, boost, note) in boosts {
        if needles.iter().any(|needle| mentions(needle.as_str())) {
            score += boost;
            reason.push_str(note);
        }
    }

    (score.min(1.0), reason)
}

fn context_type_of(record: &MemoryRecord) -> Option<String> {
    serde_json::from_str::<Value>(&record.value)
        .ok()?
        .get("contextType")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_text;

    fn registry() -> (Arc<MemoryStore>, ToolRegistry) {
        let store = Arc::new(MemoryStore::in_memory().unwrap());
        let registry = ToolRegistry::with_memory_tools(Arc::clone(&store), &StoreConfig::default());
        (store, registry)
    }

    fn call(registry: &ToolRegistry, name: &str, input: Value) -> String {
        let result = registry.execute(name, input).unwrap();
        result_text(&result).unwrap().to_string()
    }

    /// Parse the JSON body following the `<label>:\n` prefix.
    fn body(text: &str) -> Value {
        let (_, json) = text.split_once('\n').unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_registry_has_all_tools() {
        let (_, registry) = registry();

        assert_eq!(registry.len(), 20);
        assert_eq!(registry.specs_in(ToolCategory::Memory).len(), 10);
        assert_eq!(registry.specs_in(ToolCategory::Graph).len(), 8);
        assert_eq!(registry.specs_in(ToolCategory::Context).len(), 2);

        let schema = registry.export_schema();
        assert_eq!(schema["tools"].as_array().unwrap().len(), 20);

        let destructive: Vec<&str> = registry
            .specs()
            .filter(|spec| spec.destructive)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(destructive, vec!["delete_memory"]);
    }

    #[test]
    fn test_save_then_recall() {
        let (_, registry) = registry();

        let text = call(
            &registry,
            "save_memory",
            json!({ "key": "api", "value": "uses JWT", "priority": 2 }),
        );
        assert!(text.starts_with("Memory saved successfully:\n"));
        assert_eq!(body(&text)["category"], "general");

        let text = call(&registry, "recall_memory", json!({ "key": "api" }));
        let record = body(&text);
        assert_eq!(record["value"], "uses JWT");
        assert_eq!(record["priority"], 2);
    }

    #[test]
    fn test_not_found_is_plain_message() {
        let (_, registry) = registry();

        let text = call(&registry, "recall_memory", json!({ "key": "ghost" }));
        assert_eq!(text, "Memory not found for key: \"ghost\"");

        let text = call(&registry, "update_memory", json!({ "key": "ghost", "value": "v" }));
        assert!(text.contains("Use save_memory"));

        let text = call(&registry, "delete_memory", json!({ "key": "ghost" }));
        assert!(text.starts_with("Memory not found"));
    }

    #[test]
    fn test_malformed_arguments_are_invalid_input() {
        let (_, registry) = registry();

        let err = registry
            .execute("save_memory", json!({ "key": "k" }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.starts_with("save_memory")));

        let err = registry
            .execute("get_memories_by_priority", json!({ "priority": "high" }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_strategy_is_distinct_error() {
        let (_, registry) = registry();

        let err = registry
            .execute(
                "search_memories_advanced",
                json!({ "query": "x", "strategy": "semantic" }),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStrategy(ref s) if s == "semantic"));
    }

    #[test]
    fn test_update_append_and_list() {
        let (store, registry) = registry();
        store.save("a", "one", "project", 1).unwrap();
        store.save("b", "x".repeat(150).as_str(), "project", 0).unwrap();
        store.save("c", "three", "personal", 0).unwrap();

        call(&registry, "update_memory", json!({ "key": "a", "value": "two", "append": true }));
        assert_eq!(store.get("a").unwrap().unwrap().value, "one two");

        let text = call(&registry, "list_memories", json!({ "category": "project", "limit": 1 }));
        let listing = body(&text);
        assert_eq!(listing["total"], 2);
        assert_eq!(listing["memories"].as_array().unwrap().len(), 1);
        assert_eq!(listing["memories"][0]["key"], "a");

        let text = call(&registry, "list_memories", Value::Null);
        let listing = body(&text);
        let long = listing["memories"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["key"] == "b")
            .unwrap();
        assert!(long["preview"].as_str().unwrap().ends_with("..."));
    }

    #[test]
    fn test_priority_tools_and_stats() {
        let (store, registry) = registry();
        store.save("a", "v", "project", 0).unwrap();
        store.save("b", "v", "personal", 0).unwrap();

        call(&registry, "set_memory_priority", json!({ "key": "a", "priority": 3 }));
        let text = call(&registry, "get_memories_by_priority", json!({ "priority": 3 }));
        assert_eq!(body(&text)["memories"][0]["key"], "a");

        let text = call(&registry, "memory_stats", json!({}));
        let stats = body(&text);
        assert_eq!(stats["total"], 2);
        assert_eq!(stats["byCategory"]["project"], 1);
        assert_eq!(stats["totalRelations"], 0);
    }

    #[test]
    fn test_graph_tools() {
        let (store, registry) = registry();
        for key in ["a", "b", "c"] {
            store.save(key, "v", "general", 0).unwrap();
        }

        let text = call(
            &registry,
            "link_memories",
            json!({ "sourceKey": "a", "targetKey": "b", "relationType": "related_to" }),
        );
        assert_eq!(body(&text)["weight"], 1.0);
        call(
            &registry,
            "link_memories",
            json!({ "sourceKey": "b", "targetKey": "c", "relationType": "depends_on", "weight": 0.5 }),
        );

        let text = call(
            &registry,
            "link_memories",
            json!({ "sourceKey": "a", "targetKey": "ghost", "relationType": "related_to" }),
        );
        assert!(text.starts_with("Cannot link"));

        let text = call(&registry, "get_relations", json!({ "key": "b" }));
        assert_eq!(body(&text)["total"], 2);
        let text = call(&registry, "get_relations", json!({ "key": "b", "direction": "out" }));
        assert_eq!(body(&text)["total"], 1);

        let text = call(&registry, "get_related_memories", json!({ "key": "a", "depth": 1 }));
        assert_eq!(body(&text)["total"], 1);

        let text = call(&registry, "find_memory_path", json!({ "sourceKey": "c", "targetKey": "a" }));
        let path = body(&text);
        assert_eq!(path["hops"], 2);
        assert_eq!(path["path"], json!(["c", "b", "a"]));

        let text = call(&registry, "get_memory_graph", json!({}));
        let graph = body(&text);
        assert_eq!(graph["nodeCount"], 3);
        assert_eq!(graph["clusterCount"], 1);

        let text = call(
            &registry,
            "unlink_memories",
            json!({ "sourceKey": "b", "targetKey": "c", "relationType": "depends_on" }),
        );
        assert!(text.starts_with("Relation removed"));
        let text = call(&registry, "find_memory_path", json!({ "sourceKey": "c", "targetKey": "a" }));
        assert!(text.starts_with("No path found"));
    }

    #[test]
    fn test_bad_direction_is_invalid_input() {
        let (_, registry) = registry();
        let err = registry
            .execute("get_relations", json!({ "key": "a", "direction": "sideways" }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_timeline_tool() {
        let (store, registry) = registry();
        store.save("old", "v", "general", 0).unwrap();
        store.save("new", "v", "general", 0).unwrap();

        let text = call(&registry, "create_memory_timeline", json!({ "limit": 1 }));
        let timeline = body(&text);
        assert_eq!(timeline["total"], 1);
        assert_eq!(timeline["days"][0]["entries"][0]["key"], "new");
    }

    #[test]
    fn test_auto_save_and_restore_context() {
        let (store, registry) = registry();

        let text = call(
            &registry,
            "auto_save_context",
            json!({
                "urgency": "high",
                "contextType": "progress",
                "sessionId": "s1",
                "summary": "halfway through the parser"
            }),
        );
        assert_eq!(body(&text)["key"], "session_s1_context");

        let record = store.get("session_s1_context").unwrap().unwrap();
        assert_eq!(record.category, "context");
        assert_eq!(record.priority, 2);

        let text = call(&registry, "restore_session_context", json!({ "sessionId": "s1" }));
        let restored = body(&text);
        assert_eq!(restored["restored"].as_array().unwrap().len(), 1);
        assert_eq!(restored["restored"][0]["data"]["summary"], "halfway through the parser");

        let text = call(
            &registry,
            "restore_session_context",
            json!({ "sessionId": "s1", "filterType": "debugging" }),
        );
        assert!(body(&text)["restored"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_restore_level_limits_results() {
        let (store, registry) = registry();
        for i in 0..5 {
            store
                .save(&format!("session_s2_context_{}", i), "plain text", "context", 0)
                .unwrap();
        }

        let text = call(
            &registry,
            "restore_session_context",
            json!({ "sessionId": "s2", "restoreLevel": "essential" }),
        );
        let restored = body(&text);
        let entries = restored["restored"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["key"], "session_s2_context_4");
        assert_eq!(entries[0]["data"], "plain text");
    }

    #[test]
    fn test_auto_save_rejects_unknown_urgency() {
        let (_, registry) = registry();
        let err = registry
            .execute(
                "auto_save_context",
                json!({ "urgency": "whenever", "contextType": "progress" }),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_prioritize_memory_ranks_by_importance() {
        let (store, registry) = registry();
        store.save("e1", "Build Error in parser", "general", 0).unwrap();
        store.save("d1", "decision: use sqlite", "general", 0).unwrap();
        store.save("p1", "roadmap notes", "project", 0).unwrap();
        store.save("g1", "lunch plans", "general", 0).unwrap();
        store.save("g2", "remember to refactor storage later", "general", 0).unwrap();
        store.save("b1", "error: flaky login test", "general", 0).unwrap();

        let text = call(
            &registry,
            "prioritize_memory",
            json!({
                "currentTask": "Refactor Storage",
                "criticalDecisions": ["SQLite"],
                "blockers": ["flaky login"],
                "nextSteps": ["ship it"]
            }),
        );
        assert!(text.starts_with("Memory prioritization completed:\n"));

        let result = body(&text);
        let entries = result["prioritized"].as_array().unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e["key"].as_str().unwrap()).collect();
        assert_eq!(result["total"], 5);
        assert_eq!(&keys[..3], &["b1", "d1", "e1"]);
        assert!(keys.contains(&"p1"));
        assert!(keys.contains(&"g2"));
        assert!(!keys.contains(&"g1"));

        assert_eq!(entries[0]["priority"], 1.0);
        assert_eq!(
            entries[0]["reason"],
            "Contains error information (blocker/issue)"
        );
        assert_eq!(result["nextSteps"][0], "ship it");
    }

    #[test]
    fn test_prioritize_memory_ignores_blank_needles() {
        let (store, registry) = registry();
        store.save("g1", "lunch plans", "general", 0).unwrap();
        store.save("c1", "session notes", "context", 0).unwrap();

        let text = call(
            &registry,
            "prioritize_memory",
            json!({ "currentTask": "", "blockers": ["  "] }),
        );
        let result = body(&text);
        assert_eq!(result["total"], 1);
        assert_eq!(result["prioritized"][0]["key"], "c1");
        assert_eq!(result["prioritized"][0]["reason"], "Context information");

        let err = registry
            .execute("prioritize_memory", json!({ "blockers": [] }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
