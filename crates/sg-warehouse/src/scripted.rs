//! Scripted in-memory warehouse for tests and dry runs.
//!
//! Statements are matched against registered substrings in registration
//! order; the first hit decides the reply. Unmatched statements succeed with
//! an empty result set. Every statement is recorded.

use crate::{
    MetadataCatalog, Statement, WarehouseConnector, WarehouseError, WarehouseSession,
};
use async_trait::async_trait;
use sg_core::request::SnowflakeCredentials;
use sg_core::result::ResultSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Reply {
    Rows(ResultSet),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

#[derive(Debug, Default)]
struct ScriptState {
    rules: Vec<Rule>,
    executed: Vec<Statement>,
    connect_failure: Option<String>,
    connects: usize,
    closes: usize,
}

/// Cloneable handle; clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWarehouse {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reply with `rows` to statements containing `needle`.
    pub fn respond(&self, needle: impl Into<String>, rows: ResultSet) {
        self.lock().rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Rows(rows),
        });
    }

    /// Fail statements containing `needle` with `message`.
    pub fn fail(&self, needle: impl Into<String>, message: impl Into<String>) {
        self.lock().rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Fail(message.into()),
        });
    }

    pub fn fail_connect(&self, message: impl Into<String>) {
        self.lock().connect_failure = Some(message.into());
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.lock().executed.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().executed.iter().map(|s| s.text.clone()).collect()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    fn reply_for(&self, statement: &Statement) -> Result<ResultSet, WarehouseError> {
        let mut state = self.lock();
        state.executed.push(statement.clone());
        let reply = state
            .rules
            .iter()
            .find(|rule| statement.text.contains(&rule.needle))
            .map(|rule| rule.reply.clone());
        match reply {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(message)) => Err(WarehouseError::Statement(message)),
            None => Ok(ResultSet::default()),
        }
    }
}

#[async_trait]
impl WarehouseSession for ScriptedWarehouse {
    async fn execute(&self, statement: &Statement) -> Result<ResultSet, WarehouseError> {
        self.reply_for(statement)
    }

    async fn close(&self) -> Result<(), WarehouseError> {
        self.lock().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl WarehouseConnector for ScriptedWarehouse {
    async fn connect(
        &self,
        _credentials: &SnowflakeCredentials,
    ) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        let mut state = self.lock();
        state.connects += 1;
        if let Some(message) = &state.connect_failure {
            return Err(WarehouseError::Connect(message.clone()));
        }
        drop(state);
        Ok(Box::new(self.clone()))
    }
}

/// Catalog answers scripted per level; `None` at a level means "fail".
#[derive(Debug, Clone, Default)]
pub struct ScriptedCatalog {
    pub datasets: Option<Vec<String>>,
    pub tables: Vec<(String, Option<Vec<String>>)>,
    pub columns: Vec<((String, String), Option<Vec<String>>)>,
}

impl ScriptedCatalog {
    fn lookup<K: PartialEq>(
        entries: &[(K, Option<Vec<String>>)],
        key: &K,
        what: &str,
    ) -> Result<Vec<String>, WarehouseError> {
        match entries.iter().find(|(k, _)| k == key) {
            Some((_, Some(values))) => Ok(values.clone()),
            Some((_, None)) => Err(WarehouseError::Statement(format!("{what} unavailable"))),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl MetadataCatalog for ScriptedCatalog {
    async fn list_datasets(&self) -> Result<Vec<String>, WarehouseError> {
        self.datasets
            .clone()
            .ok_or_else(|| WarehouseError::Statement("datasets unavailable".into()))
    }

    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>, WarehouseError> {
        Self::lookup(&self.tables, &dataset.to_string(), "tables")
    }

    async fn list_columns(
        &self,
        dataset: &str,
        table: &str,
    ) -> Result<Vec<String>, WarehouseError> {
        Self::lookup(
            &self.columns,
            &(dataset.to_string(), table.to_string()),
            "columns",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_matching_rule_wins_and_everything_is_recorded() {
        let wh = ScriptedWarehouse::new();
        wh.fail("STAGE", "denied");
        wh.respond("STAGE", ResultSet::new(vec!["X".into()], vec![]));

        let err = wh.execute(&Statement::new("CREATE STAGE s")).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Statement(m) if m == "denied"));
        assert!(wh.execute(&Statement::new("SELECT 1")).await.is_ok());
        assert_eq!(wh.statements(), vec!["CREATE STAGE s", "SELECT 1"]);
    }

    #[tokio::test]
    async fn connect_shares_state_and_can_fail() {
        let wh = ScriptedWarehouse::new();
        let creds = SnowflakeCredentials {
            user: "u".into(),
            password: "p".into(),
            account: "a".into(),
            database: "D".into(),
            schema: "S".into(),
            warehouse: "W".into(),
            role: "R".into(),
        };
        let session = wh.connect(&creds).await.unwrap();
        session.execute(&Statement::new("SELECT 1")).await.unwrap();
        session.close().await.unwrap();
        assert_eq!(wh.statements().len(), 1);
        assert_eq!(wh.close_count(), 1);

        wh.fail_connect("bad password");
        assert!(wh.connect(&creds).await.is_err());
        assert_eq!(wh.connect_count(), 2);
    }
}
