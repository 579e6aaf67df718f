//! In-memory [`DataApi`] for tests and offline use.
//!
//! Rows are JSON objects kept per table. Queries evaluate filters, order,
//! limit, projection and registered embeds the same way the backend would for
//! the subset of the dialect this workspace uses. Every call that would have
//! hit the network is recorded so tests can assert on request counts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{DataApi, UserScoped};
use crate::error::{RestError, Result};
use crate::query::{Embed, Filter, Query, Returning};

type Row = Map<String, Value>;

/// A call as seen by the double.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    Query(Query),
    Insert {
        table: String,
        rows: Value,
        returning: Returning,
    },
    Update {
        table: String,
        filters: Vec<Filter>,
        patch: Value,
        returning: Returning,
    },
    Delete {
        table: String,
        filters: Vec<Filter>,
    },
}

impl RecordedCall {
    pub fn table(&self) -> &str {
        match self {
            RecordedCall::Query(query) => &query.table,
            RecordedCall::Insert { table, .. }
            | RecordedCall::Update { table, .. }
            | RecordedCall::Delete { table, .. } => table,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, RecordedCall::Query(_))
    }
}

/// How an embedded relation joins to its parent row.
#[derive(Clone, Debug)]
enum Relation {
    /// `parent[local_column] == related.id`, embedded as an object.
    One { local_column: String },
    /// `related[foreign_column] == parent.id`, embedded as an array.
    Many { foreign_column: String },
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    next_serial: HashMap<String, i64>,
    now_columns: HashMap<String, Vec<String>>,
    relations: HashMap<(String, String), Relation>,
    faults: HashMap<String, (u16, String)>,
    calls: Vec<RecordedCall>,
    user_tokens: Vec<String>,
}

/// Clones share the same tables and call log.
#[derive(Clone, Default)]
pub struct MemoryDataApi {
    state: Arc<Mutex<State>>,
    user_token: Option<String>,
}

impl MemoryDataApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows inserted into `table` without an `id` get 1, 2, 3... instead of
    /// a random UUID.
    pub fn with_serial_ids(self, table: &str) -> Self {
        self.lock().next_serial.insert(table.to_string(), 1);
        self
    }

    /// Fill `column` with the current time on insert when absent.
    pub fn with_now_column(self, table: &str, column: &str) -> Self {
        self.lock()
            .now_columns
            .entry(table.to_string())
            .or_default()
            .push(column.to_string());
        self
    }

    /// Many-to-one embed: `parent.local_column` references `relation.id`.
    pub fn with_relation_one(self, parent: &str, relation: &str, local_column: &str) -> Self {
        self.lock().relations.insert(
            (parent.to_string(), relation.to_string()),
            Relation::One {
                local_column: local_column.to_string(),
            },
        );
        self
    }

    /// One-to-many embed: `relation.foreign_column` references `parent.id`.
    pub fn with_relation_many(self, parent: &str, relation: &str, foreign_column: &str) -> Self {
        self.lock().relations.insert(
            (parent.to_string(), relation.to_string()),
            Relation::Many {
                foreign_column: foreign_column.to_string(),
            },
        );
        self
    }

    /// Insert rows directly, bypassing call recording.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.lock();
        for row in rows {
            if let Value::Object(row) = row {
                state.store(table, row);
            }
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, Vec::len)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// End-user tokens presented by scoped handles, one per call.
    pub fn user_tokens(&self) -> Vec<String> {
        self.lock().user_tokens.clone()
    }

    /// Queries issued against `table`, in order.
    pub fn queries_to(&self, table: &str) -> Vec<Query> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Query(query) if query.table == table => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    /// Writes issued against `table`, in order.
    pub fn writes_to(&self, table: &str) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_write() && call.table() == table)
            .cloned()
            .collect()
    }

    /// Make every call touching `table` fail with a remote fault.
    pub fn fail_table(&self, table: &str, status: u16, body: &str) {
        self.lock()
            .faults
            .insert(table.to_string(), (status, body.to_string()));
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call, then apply cancellation and injected faults.
    fn begin(&self, call: RecordedCall, cancel: &CancellationToken) -> Result<MutexGuard<'_, State>> {
        if cancel.is_cancelled() {
            return Err(RestError::Cancelled);
        }
        let mut state = self.lock();
        let table = call.table().to_string();
        state.calls.push(call);
        if let Some(token) = &self.user_token {
            state.user_tokens.push(token.clone());
        }
        if let Some((status, body)) = state.faults.get(&table) {
            return Err(RestError::Remote {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(state)
    }
}

impl State {
    fn store(&mut self, table: &str, mut row: Row) -> Row {
        if !row.contains_key("id") {
            let id = match self.next_serial.get_mut(table) {
                Some(next) => {
                    let id = *next;
                    *next += 1;
                    Value::from(id)
                }
                None => Value::String(Uuid::new_v4().to_string()),
            };
            row.insert("id".to_string(), id);
        } else if let (Some(next), Some(id)) =
            (self.next_serial.get_mut(table), row.get("id").and_then(Value::as_i64))
        {
            *next = (*next).max(id + 1);
        }
        if let Some(columns) = self.now_columns.get(table) {
            for column in columns {
                row.entry(column.clone())
                    .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            }
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    fn select(&self, query: &Query) -> Vec<Value> {
        let mut rows: Vec<Row> = self
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_rows(&mut rows, &query.order);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows.into_iter()
            .map(|row| Value::Object(self.project(&query.table, row, query)))
            .collect()
    }

    fn project(&self, table: &str, row: Row, query: &Query) -> Row {
        let mut out = if query.select.is_wildcard() {
            row.clone()
        } else {
            query
                .select
                .columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect()
        };
        for embed in &query.select.embeds {
            out.insert(embed.relation.clone(), self.embed(table, &row, embed));
        }
        out
    }

    fn embed(&self, parent: &str, row: &Row, embed: &Embed) -> Value {
        let key = (parent.to_string(), embed.relation.clone());
        let Some(relation) = self.relations.get(&key) else {
            return Value::Null;
        };
        let related = self.tables.get(&embed.relation);
        let pick = |r: &Row| -> Value {
            let columns = if embed.columns.is_empty() || embed.columns.iter().any(|c| c == "*") {
                r.clone()
            } else {
                embed
                    .columns
                    .iter()
                    .filter_map(|c| r.get(c).map(|v| (c.clone(), v.clone())))
                    .collect()
            };
            Value::Object(columns)
        };
        match relation {
            Relation::One { local_column } => {
                let Some(target) = row.get(local_column) else {
                    return Value::Null;
                };
                related
                    .and_then(|rows| rows.iter().find(|r| r.get("id") == Some(target)))
                    .map(pick)
                    .unwrap_or(Value::Null)
            }
            Relation::Many { foreign_column } => {
                let parent_id = row.get("id");
                let mut children: Vec<Row> = related
                    .map(|rows| {
                        rows.iter()
                            .filter(|r| parent_id.is_some() && r.get(foreign_column) == parent_id)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                sort_rows(&mut children, &embed.order);
                if let Some(limit) = embed.limit {
                    children.truncate(limit);
                }
                Value::Array(children.iter().map(pick).collect())
            }
        }
    }
}

fn sort_rows(rows: &mut [Row], order: &[crate::query::Order]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        order
            .iter()
            .map(|o| o.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn row_objects(rows: Value) -> Vec<Row> {
    match rows {
        Value::Object(row) => vec![row],
        Value::Array(rows) => rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl UserScoped for MemoryDataApi {
    fn for_user(&self, access_token: &str) -> Self {
        let user_token = Some(access_token.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self {
            state: Arc::clone(&self.state),
            user_token,
        }
    }
}

impl DataApi for MemoryDataApi {
    async fn query(&self, query: &Query, cancel: &CancellationToken) -> Result<Vec<Value>> {
        let state = self.begin(RecordedCall::Query(query.clone()), cancel)?;
        Ok(state.select(query))
    }

    async fn insert(
        &self,
        table: &str,
        rows: Value,
        returning: Returning,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let call = RecordedCall::Insert {
            table: table.to_string(),
            rows: rows.clone(),
            returning,
        };
        let mut state = self.begin(call, cancel)?;
        let created: Vec<Value> = row_objects(rows)
            .into_iter()
            .map(|row| Value::Object(state.store(table, row)))
            .collect();
        Ok(match returning {
            Returning::Representation => created,
            Returning::Minimal => Vec::new(),
        })
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: Returning,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let call = RecordedCall::Update {
            table: table.to_string(),
            filters: filters.to_vec(),
            patch: patch.clone(),
            returning,
        };
        let mut state = self.begin(call, cancel)?;
        let Value::Object(patch) = patch else {
            return Err(RestError::Remote {
                status: 400,
                body: "update body must be an object".to_string(),
            });
        };
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filters.iter().all(|f| f.matches(row))) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                updated.push(Value::Object(row.clone()));
            }
        }
        Ok(match returning {
            Returning::Representation => updated,
            Returning::Minimal => Vec::new(),
        })
    }

    async fn delete(
        &self,
        table: &str,
        filters: &[Filter],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let call = RecordedCall::Delete {
            table: table.to_string(),
            filters: filters.to_vec(),
        };
        let mut state = self.begin(call, cancel)?;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
        }
        Ok(())
    }
}
