//! SQUAD Store - MongoDB Coordination Plane
//!
//! One shared document database serves as message bus, task board,
//! checkpoint log, and sandbox registry. This crate owns the connection
//! lifecycle, the five collections with their schema validators and indexes,
//! and a typed facade per collection:
//!
//! - [`MessageBus`] - notification/read-on-demand messaging
//! - [`CheckpointStore`] - append-only checkpoints and resume context
//! - [`TaskStore`] - task CRUD and the forward-only status DAG
//! - [`AgentRegistry`] - agent records, sessions, token counters, heartbeat
//! - [`SandboxTracker`] - one record per (sandbox, agent) pair

mod agents;
mod checkpoints;
mod documents;
mod messages;
mod sandboxes;
mod tasks;
mod views;

pub use agents::{AgentRegistry, RegisterAgent};
pub use checkpoints::{render_resume_context, CheckpointStore};
pub use documents::{
    AgentDoc, CheckpointDoc, MessageDoc, MessagePreview, SandboxDoc, SandboxLifecycleDoc, TaskDoc,
    TokenUsageDoc,
};
pub use messages::{preview_of, MessageBus};
pub use sandboxes::SandboxTracker;
pub use tasks::TaskStore;
pub use views::{AgentView, CheckpointView, MessageView, SandboxView, TaskView};

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, CreateCollectionOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use squad_core::{SquadResult, StorageError};
use tracing::{debug, info};

/// Collection names.
pub const AGENTS: &str = "agents";
pub const MESSAGES: &str = "messages";
pub const CHECKPOINTS: &str = "checkpoints";
pub const TASKS: &str = "tasks";
pub const SANDBOXES: &str = "sandboxes";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// MongoDB connection configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Connection string (`MONGODB_URI`)
    pub uri: String,
    /// Database name (`MONGODB_DB_NAME`)
    pub db_name: String,
}

impl StoreConfig {
    /// Load configuration from environment variables with development
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            uri: std::env::var("MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            db_name: std::env::var("MONGODB_DB_NAME").unwrap_or_else(|_| "squad-lite".to_string()),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            db_name: "squad-lite".to_string(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Shared handle to the coordination database.
///
/// Cloning is cheap: the underlying driver client is an `Arc` and pools
/// connections internally. One `Store` per process is the intended shape.
#[derive(Debug, Clone)]
pub struct Store {
    client: Client,
    db: Database,
}

impl Store {
    /// Connect to MongoDB and select the squad database. Does not create
    /// collections; call [`Store::ensure_schema`] once on startup.
    pub async fn connect(config: &StoreConfig) -> SquadResult<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| StorageError::Unavailable {
                reason: format!("invalid MongoDB URI: {e}"),
            })?;
        options.app_name = Some("squad".to_string());

        let client = Client::with_options(options).map_err(|e| StorageError::Unavailable {
            reason: e.to_string(),
        })?;
        let db = client.database(&config.db_name);

        info!(db = %config.db_name, "Connected to MongoDB");
        Ok(Self { client, db })
    }

    /// The underlying database handle (used by the change-stream watchers).
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Message bus facade.
    pub fn messages(&self) -> MessageBus {
        MessageBus::new(self.db.collection(MESSAGES))
    }

    /// Checkpoint store facade.
    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.db.collection(CHECKPOINTS))
    }

    /// Task store facade.
    pub fn tasks(&self) -> TaskStore {
        TaskStore::new(self.db.collection(TASKS))
    }

    /// Agent registry facade.
    pub fn agents(&self) -> AgentRegistry {
        AgentRegistry::new(self.db.collection(AGENTS))
    }

    /// Sandbox tracking facade.
    pub fn sandboxes(&self) -> SandboxTracker {
        SandboxTracker::new(self.db.collection(SANDBOXES))
    }

    /// Create collections with their `$jsonSchema` validators and all
    /// required indexes. Idempotent; safe to call on every startup.
    pub async fn ensure_schema(&self) -> SquadResult<()> {
        self.create_validated_collection(AGENTS, agents_validator())
            .await?;
        self.create_validated_collection(MESSAGES, messages_validator())
            .await?;
        self.create_validated_collection(CHECKPOINTS, checkpoints_validator())
            .await?;
        self.create_validated_collection(TASKS, tasks_validator())
            .await?;
        self.create_validated_collection(SANDBOXES, sandboxes_validator())
            .await?;
        self.ensure_indexes().await
    }

    async fn create_validated_collection(
        &self,
        name: &str,
        validator: mongodb::bson::Document,
    ) -> SquadResult<()> {
        let options = CreateCollectionOptions::builder()
            .validator(validator)
            .build();
        match self.db.create_collection(name, options).await {
            Ok(()) => {
                debug!(collection = name, "Created collection");
                Ok(())
            }
            // NamespaceExists: the collection is already there
            Err(e) if matches!(error_code(&e), Some(48)) => Ok(()),
            Err(e) => Err(StorageError::Backend {
                reason: format!("create collection {name}: {e}"),
            }
            .into()),
        }
    }

    async fn ensure_indexes(&self) -> SquadResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.create_indexes(
            AGENTS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "agentId": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "status": 1, "lastHeartbeat": 1 })
                    .build(),
            ],
        )
        .await?;

        self.create_indexes(
            MESSAGES,
            vec![
                IndexModel::builder()
                    .keys(doc! { "messageId": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "toAgent": 1, "readAt": 1, "createdAt": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "threadId": 1, "createdAt": 1 })
                    .build(),
            ],
        )
        .await?;

        self.create_indexes(
            CHECKPOINTS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "checkpointId": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "agentId": 1, "createdAt": -1 })
                    .build(),
            ],
        )
        .await?;

        self.create_indexes(
            TASKS,
            vec![
                IndexModel::builder()
                    .keys(doc! { "taskId": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "assignedTo": 1, "status": 1 })
                    .build(),
            ],
        )
        .await?;

        self.create_indexes(
            SANDBOXES,
            vec![
                IndexModel::builder()
                    .keys(doc! { "sandboxId": 1, "agentId": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "status": 1, "lifecycle.lastHeartbeat": 1 })
                    .build(),
            ],
        )
        .await?;

        info!("Ensured collection indexes");
        Ok(())
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexModel>) -> SquadResult<()> {
        self.db
            .collection::<mongodb::bson::Document>(collection)
            .create_indexes(indexes, None)
            .await
            .map_err(|e| StorageError::Backend {
                reason: format!("create indexes on {collection}: {e}"),
            })?;
        Ok(())
    }

    /// Tear down the connection pool. Further use of clones of this store
    /// fails; call only on process shutdown.
    pub async fn disconnect(self) {
        self.client.shutdown().await;
        info!("Disconnected from MongoDB");
    }
}

/// Extract the server error code from a driver error, if any.
pub(crate) fn error_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Command(c) => Some(c.code),
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(w)) => {
            Some(w.code)
        }
        _ => None,
    }
}

/// True when the driver error is a unique-index violation (E11000).
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(error_code(err), Some(11000))
}

/// Map an arbitrary driver error onto the storage error domain.
pub(crate) fn backend(err: mongodb::error::Error) -> StorageError {
    StorageError::Backend {
        reason: err.to_string(),
    }
}

// ============================================================================
// SCHEMA VALIDATORS
// ============================================================================

fn agents_validator() -> mongodb::bson::Document {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": ["agentId", "type", "status", "tokenUsage", "createdAt", "lastHeartbeat"],
            "properties": {
                "agentId": { "bsonType": "string" },
                "type": { "enum": ["director", "specialist"] },
                "specialization": {
                    "enum": ["researcher", "writer", "analyst", "general", null]
                },
                "status": { "enum": ["idle", "working", "waiting", "completed", "error"] },
                "sandboxStatus": { "enum": ["none", "active", "paused", "killed"] },
                "tokenUsage": {
                    "bsonType": "object",
                    "required": ["totalInputTokens", "totalOutputTokens"],
                },
            }
        }
    }
}

fn messages_validator() -> mongodb::bson::Document {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": ["messageId", "fromAgent", "toAgent", "content", "type", "threadId", "priority", "createdAt"],
            "properties": {
                "messageId": { "bsonType": "string" },
                "type": { "enum": ["task", "result", "status", "error"] },
                "priority": { "enum": ["high", "normal", "low"] },
                "priorityRank": { "bsonType": "int" },
            }
        }
    }
}

fn checkpoints_validator() -> mongodb::bson::Document {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": ["checkpointId", "agentId", "summary", "resumePointer", "tokensUsed", "createdAt"],
            "properties": {
                "checkpointId": { "bsonType": "string" },
                "summary": {
                    "bsonType": "object",
                    "required": ["goal"],
                    "properties": { "goal": { "bsonType": "string", "minLength": 1 } }
                },
                "resumePointer": {
                    "bsonType": "object",
                    "required": ["nextAction", "phase"],
                    "properties": {
                        "nextAction": { "bsonType": "string", "minLength": 1 },
                        "phase": { "bsonType": "string", "minLength": 1 },
                    }
                },
            }
        }
    }
}

fn tasks_validator() -> mongodb::bson::Document {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": ["taskId", "title", "description", "status", "createdAt", "updatedAt"],
            "properties": {
                "taskId": { "bsonType": "string" },
                "status": { "enum": ["pending", "assigned", "in_progress", "completed", "failed"] },
            }
        }
    }
}

fn sandboxes_validator() -> mongodb::bson::Document {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": ["sandboxId", "agentId", "status", "metadata", "lifecycle", "resources", "costs"],
            "properties": {
                "sandboxId": { "bsonType": "string" },
                "agentId": { "bsonType": "string" },
                "status": { "enum": ["creating", "active", "paused", "resuming", "killed"] },
            }
        }
    }
}
