//! 会话存储
//!
//! Session 由存储层独占持有，编排器在一轮处理内只拿临时副本，结束时整体写回
//! （这即是 §提交语义：一轮内的追加全部缓冲，最后原子落盘）。
//! 两种实现：内存（测试/临时运行）与 SQLite（跨进程重启持久）。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::error::TutorError;
use crate::quiz::QuizState;
use crate::session::message::{Message, Role};
use crate::specialists::SpecialistId;

/// 会话标题最大字符数（取首条用户消息开头）
const TITLE_CHARS: usize = 48;

/// 一个学习者的会话：只追加的消息序列 + 当前激活的专家指针
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub active: SpecialistId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: None,
            messages: Vec::new(),
            active: SpecialistId::Host,
            created_at: now,
            updated_at: now,
        }
    }

    /// 追加一条消息；首条用户消息同时生成会话标题
    pub fn push(&mut self, message: Message) {
        if self.title.is_none() && message.role == Role::User {
            let title: String = message.content.chars().take(TITLE_CHARS).collect();
            if !title.trim().is_empty() {
                self.title = Some(title);
            }
        }
        self.messages.push(message);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 会话列表项（最新优先）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// 会话存储接口：会话与测验状态都以 session_id 为键
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, TutorError>;

    async fn save(&self, session: &Session) -> Result<(), TutorError>;

    async fn load_quiz(&self, session_id: &str) -> Result<Option<QuizState>, TutorError>;

    async fn save_quiz(&self, quiz: &QuizState) -> Result<(), TutorError>;

    async fn clear_quiz(&self, session_id: &str) -> Result<(), TutorError>;

    /// 会话列表，created_at 倒序
    async fn list(&self) -> Result<Vec<SessionMeta>, TutorError>;
}

/// 内存会话存储
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    quizzes: RwLock<HashMap<String, QuizState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, TutorError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), TutorError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load_quiz(&self, session_id: &str) -> Result<Option<QuizState>, TutorError> {
        Ok(self.quizzes.read().await.get(session_id).cloned())
    }

    async fn save_quiz(&self, quiz: &QuizState) -> Result<(), TutorError> {
        self.quizzes
            .write()
            .await
            .insert(quiz.session_id.clone(), quiz.clone());
        Ok(())
    }

    async fn clear_quiz(&self, session_id: &str) -> Result<(), TutorError> {
        self.quizzes.write().await.remove(session_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionMeta>, TutorError> {
        let mut metas: Vec<SessionMeta> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| SessionMeta {
                id: s.id.clone(),
                title: s.title.clone().unwrap_or_else(|| "Chat".to_string()),
                created_at: s.created_at,
            })
            .collect();
        metas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(metas)
    }
}

/// SQLite 会话存储：messages 与测验状态以 JSON 列保存
pub struct SqliteSessionStore {
    conn: StdMutex<Connection>,
}

impl SqliteSessionStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, TutorError> {
        let conn = Connection::open(db_path).map_err(store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                 id         TEXT PRIMARY KEY,
                 title      TEXT,
                 active     TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL,
                 messages   TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS quizzes (
                 session_id TEXT PRIMARY KEY,
                 state      TEXT NOT NULL
             );",
        )
        .map_err(store_err)?;
        Ok(Self {
            conn: StdMutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, TutorError>,
    ) -> Result<T, TutorError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| TutorError::Store("connection lock poisoned".to_string()))?;
        f(&conn)
    }
}

fn store_err(e: impl std::fmt::Display) -> TutorError {
    TutorError::Store(e.to_string())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, TutorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, active, created_at, updated_at, messages
                     FROM sessions WHERE id = ?1",
                )
                .map_err(store_err)?;
            let mut rows = stmt.query([session_id]).map_err(store_err)?;
            let Some(row) = rows.next().map_err(store_err)? else {
                return Ok(None);
            };
            let id: String = row.get(0).map_err(store_err)?;
            let title: Option<String> = row.get(1).map_err(store_err)?;
            let active_raw: String = row.get(2).map_err(store_err)?;
            let created_raw: String = row.get(3).map_err(store_err)?;
            let updated_raw: String = row.get(4).map_err(store_err)?;
            let messages_raw: String = row.get(5).map_err(store_err)?;

            let active = SpecialistId::parse(&active_raw)
                .ok_or_else(|| TutorError::Store(format!("bad active specialist: {active_raw}")))?;
            let created_at = created_raw
                .parse::<DateTime<Utc>>()
                .map_err(store_err)?;
            let updated_at = updated_raw
                .parse::<DateTime<Utc>>()
                .map_err(store_err)?;
            let messages: Vec<Message> =
                serde_json::from_str(&messages_raw).map_err(store_err)?;

            Ok(Some(Session {
                id,
                title,
                messages,
                active,
                created_at,
                updated_at,
            }))
        })
    }

    async fn save(&self, session: &Session) -> Result<(), TutorError> {
        let messages = serde_json::to_string(&session.messages).map_err(store_err)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, title, active, created_at, updated_at, messages)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     active = excluded.active,
                     updated_at = excluded.updated_at,
                     messages = excluded.messages",
                rusqlite::params![
                    session.id,
                    session.title,
                    session.active.as_str(),
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                    messages,
                ],
            )
            .map_err(store_err)?;
            Ok(())
        })
    }

    async fn load_quiz(&self, session_id: &str) -> Result<Option<QuizState>, TutorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT state FROM quizzes WHERE session_id = ?1")
                .map_err(store_err)?;
            let mut rows = stmt.query([session_id]).map_err(store_err)?;
            let Some(row) = rows.next().map_err(store_err)? else {
                return Ok(None);
            };
            let state_raw: String = row.get(0).map_err(store_err)?;
            let state: QuizState = serde_json::from_str(&state_raw).map_err(store_err)?;
            Ok(Some(state))
        })
    }

    async fn save_quiz(&self, quiz: &QuizState) -> Result<(), TutorError> {
        let state = serde_json::to_string(quiz).map_err(store_err)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO quizzes (session_id, state) VALUES (?1, ?2)
                 ON CONFLICT(session_id) DO UPDATE SET state = excluded.state",
                rusqlite::params![quiz.session_id, state],
            )
            .map_err(store_err)?;
            Ok(())
        })
    }

    async fn clear_quiz(&self, session_id: &str) -> Result<(), TutorError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM quizzes WHERE session_id = ?1", [session_id])
                .map_err(store_err)?;
            Ok(())
        })
    }

    async fn list(&self) -> Result<Vec<SessionMeta>, TutorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, title, created_at FROM sessions ORDER BY created_at DESC")
                .map_err(store_err)?;
            let rows = stmt
                .query_map([], |row| {
                    let id: String = row.get(0)?;
                    let title: Option<String> = row.get(1)?;
                    let created_raw: String = row.get(2)?;
                    Ok((id, title, created_raw))
                })
                .map_err(store_err)?;
            let mut metas = Vec::new();
            for row in rows {
                let (id, title, created_raw) = row.map_err(store_err)?;
                let created_at = created_raw
                    .parse::<DateTime<Utc>>()
                    .map_err(store_err)?;
                metas.push(SessionMeta {
                    id,
                    title: title.unwrap_or_else(|| "Chat".to_string()),
                    created_at,
                });
            }
            Ok(metas)
        })
    }
}

/// 创建会话存储：给定 db_path 时用 SQLite，失败或未给定时回退内存存储
pub fn create_session_store(db_path: Option<&Path>) -> std::sync::Arc<dyn SessionStore> {
    if let Some(path) = db_path {
        match SqliteSessionStore::new(path) {
            Ok(store) => {
                tracing::info!(?path, "Using SQLite session store");
                return std::sync::Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open session database, falling back to memory: {}", e);
            }
        }
    }
    tracing::info!("Using in-memory session store");
    std::sync::Arc::new(MemorySessionStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let mut session = Session::new("s1");
        session.push(Message::user("hello"));
        session.push(Message::specialist("hi there"));
        session.active = SpecialistId::Planner;
        store.save(&session).await.unwrap();

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.active, SpecialistId::Planner);
        assert_eq!(loaded.title.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");

        {
            let store = SqliteSessionStore::new(&path).unwrap();
            let mut session = Session::new("s1");
            session.push(Message::user("quiz me on algebra"));
            session.push(Message::specialist("Question 1 of 3: ..."));
            session.active = SpecialistId::QuizCoach;
            store.save(&session).await.unwrap();
        }

        let store = SqliteSessionStore::new(&path).unwrap();
        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.active, SpecialistId::QuizCoach);
        assert_eq!(loaded.messages[0].content, "quiz me on algebra");
    }

    #[tokio::test]
    async fn sqlite_list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::new(dir.path().join("sessions.db")).unwrap();

        let mut old = Session::new("old");
        old.created_at = Utc::now() - chrono::Duration::hours(1);
        old.push(Message::user("first chat"));
        store.save(&old).await.unwrap();

        let mut new = Session::new("new");
        new.push(Message::user("second chat"));
        store.save(&new).await.unwrap();

        let metas = store.list().await.unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].id, "new");
    }
}
