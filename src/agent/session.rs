//! Session state and its stores.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::SwitchboardError;
use crate::types::Conversation;

/// What persists between turns of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub active_agent_name: String,
    pub conversation: Conversation,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        active_agent_name: impl Into<String>,
        conversation: Conversation,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            active_agent_name: active_agent_name.into(),
            conversation,
            updated_at: Utc::now(),
        }
    }
}

/// Keyed session persistence. Expiry, if any, is the store's concern.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SwitchboardError>;
    async fn set(&self, session: &Session) -> Result<(), SwitchboardError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SwitchboardError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn set(&self, session: &Session) -> Result<(), SwitchboardError> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}

/// One JSON document per session under a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One file per id. The name is the id in unpadded base64url, so
    /// distinct ids never share a file.
    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join(format!("session-{}.json", URL_SAFE_NO_PAD.encode(session_id)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SwitchboardError> {
        let path = self.session_path(session_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SwitchboardError::Session(format!(
                    "cannot read {}: {err}",
                    path.display()
                )))
            }
        };
        let session: Session = serde_json::from_str(&raw).map_err(|e| {
            SwitchboardError::Session(format!("corrupt session file {}: {e}", path.display()))
        })?;
        if session.session_id != session_id {
            return Err(SwitchboardError::Session(format!(
                "{} holds session '{}', expected '{session_id}'",
                path.display(),
                session.session_id
            )));
        }
        Ok(Some(session))
    }

    async fn set(&self, session: &Session) -> Result<(), SwitchboardError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            SwitchboardError::Session(format!("cannot create {}: {e}", self.root.display()))
        })?;
        let path = self.session_path(&session.session_id);
        let serialized = serde_json::to_vec_pretty(session)?;
        // Readers never observe a partial file.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(session = %session.session_id, path = %path.display(), "session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelMessage;
    use pretty_assertions::assert_eq;

    fn session(id: &str) -> Session {
        Session::new(
            id,
            "generic_agent",
            Conversation::from_messages(vec![
                ModelMessage::system("persona"),
                ModelMessage::assistant("hello"),
            ]),
        )
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = InMemorySessionStore::new();
        assert!(store.get("s1").await.unwrap().is_none());

        let saved = session("s1");
        store.set(&saved).await.unwrap();

        assert_eq!(store.get("s1").await.unwrap(), Some(saved));
        assert_eq!(store.session_ids().await, vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let original = session("user/42");
        FileSessionStore::new(dir.path()).set(&original).await.unwrap();

        let loaded = FileSessionStore::new(dir.path())
            .get("user/42")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded, original);
        assert!(dir.path().join("session-dXNlci80Mg.json").exists());
    }

    #[tokio::test]
    async fn file_store_keeps_similar_ids_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let mut alice = session("user/alice");
        alice.conversation.push(ModelMessage::user("alice's private question"));
        store.set(&alice).await.unwrap();
        store.set(&session("default")).await.unwrap();

        assert!(store.get("user-alice").await.unwrap().is_none());
        assert!(store.get("user alice").await.unwrap().is_none());
        assert!(store.get("   ").await.unwrap().is_none());
        assert!(store.get("").await.unwrap().is_none());

        store.set(&session("user-alice")).await.unwrap();
        let loaded = store.get("user/alice").await.unwrap().unwrap();
        assert_eq!(loaded, alice);
    }

    #[tokio::test]
    async fn file_holding_another_session_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.set(&session("bob")).await.unwrap();
        std::fs::rename(store.session_path("bob"), store.session_path("eve")).unwrap();

        let err = store.get("eve").await.unwrap_err();

        assert!(matches!(err, SwitchboardError::Session(_)));
    }

    #[tokio::test]
    async fn file_store_missing_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested"));

        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(store.session_path("s1"), "not json").unwrap();

        let err = store.get("s1").await.unwrap_err();

        assert!(matches!(err, SwitchboardError::Session(_)));
    }
}
