//! In-memory database double for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::database::{Database, DatabaseError, Rows};

/// Records every statement and replays scripted responses in order; an
/// exhausted script answers with an empty row set.
#[derive(Default)]
pub struct FakeDatabase {
    statements: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Result<Rows, DatabaseError>>>,
}

impl FakeDatabase {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<Rows, DatabaseError>>,
    ) -> Self {
        Self {
            statements: Mutex::default(),
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

impl Database for FakeDatabase {
    async fn query(&self, sql: &str) -> Result<Rows, DatabaseError> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Rows::default()))
    }
}
