//! 文件会话存储
//!
//! 每会话一个 JSON 文件（<dir>/<id>.json），整体读改写；
//! 先写临时文件再 rename，保证单会话粒度的原子追加。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::session::{Message, Session, SessionStore};

/// 目录式文件存储：一个会话一个 JSON 文件
pub struct FileSessionStore {
    dir: PathBuf,
    /// 串行化同目录下的读改写
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn session_path(&self, id: &str) -> PathBuf {
        // 会话 id 可能含路径分隔符，统一替换
        let safe: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn load(&self, id: &str) -> Result<Option<Session>, String> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        let session: Session = serde_json::from_str(&data).map_err(|e| e.to_string())?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;
        let path = self.session_path(&session.id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(session).map_err(|e| e.to_string())?;
        std::fs::write(&tmp, data).map_err(|e| e.to_string())?;
        std::fs::rename(&tmp, &path).map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get_session(&self, id: &str) -> Result<Option<Session>, String> {
        let _guard = self.write_lock.lock().await;
        self.load(id)
    }

    async fn create_session(&self, id: &str) -> Result<Session, String> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.load(id)? {
            return Ok(existing);
        }
        let session = Session::new(id);
        self.save(&session)?;
        Ok(session)
    }

    async fn append_message(&self, id: &str, message: Message) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;
        let mut session = self
            .load(id)?
            .ok_or_else(|| format!("session not found: {id}"))?;
        session.push(message);
        self.save(&session)
    }

    // 整批落在同一次 rename 里，对崩溃与重试都是全有或全无
    async fn append_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;
        let mut session = self
            .load(id)?
            .ok_or_else(|| format!("session not found: {id}"))?;
        for message in messages {
            session.push(message);
        }
        self.save(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        store.create_session("s1").await.unwrap();
        store
            .append_message("s1", Message::user("hello"))
            .await
            .unwrap();
        store
            .append_message("s1", Message::assistant("hi"))
            .await
            .unwrap();

        let session = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "hi");
    }

    #[tokio::test]
    async fn test_append_messages_batch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_session("s1").await.unwrap();
        store
            .append_messages("s1", vec![Message::user("q"), Message::assistant("a")])
            .await
            .unwrap();
        let session = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "a");
    }

    #[tokio::test]
    async fn test_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.get_session("nope").await.unwrap().is_none());
        assert!(store
            .append_message("nope", Message::user("x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_odd_session_id_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_session("a/b:c").await.unwrap();
        assert!(store.get_session("a/b:c").await.unwrap().is_some());
    }
}
