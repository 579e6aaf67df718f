use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use sominner_core::lenient;

// =============================================================================
// Projects
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub client: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub budget: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub icon_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub is_public: bool,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp_or_now")]
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for `projects`.
///
/// `end_date` is stored as the project's `due_date` and `color_theme` as its
/// `icon_color`. `start_date` has no column and is not sent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub client: Option<String>,
    pub budget: Option<f64>,
    #[serde(skip)]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "due_date")]
    pub end_date: Option<NaiveDate>,
    pub icon: Option<String>,
    #[serde(rename = "icon_color")]
    pub color_theme: Option<String>,
    pub is_public: bool,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A project with its tasks, oldest task first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectWithTasks {
    #[serde(flatten)]
    pub project: Project,
    pub tasks: Vec<Task>,
}

// =============================================================================
// Tasks
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTag {
    pub tag: String,
}

/// Embedded `task_tags(tag)` rows; entries without a non-empty tag are
/// dropped.
fn task_tags<'de, D>(deserializer: D) -> Result<Vec<TaskTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags: Vec<TaskTag> = lenient::embedded_many(deserializer)?;
    Ok(tags.into_iter().filter(|t| !t.tag.is_empty()).collect())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub project_id: i64,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub description: Option<String>,
    #[serde(
        default = "lenient::default_task_status",
        deserialize_with = "lenient::task_status"
    )]
    pub status: String,
    #[serde(
        default = "lenient::default_task_priority",
        deserialize_with = "lenient::task_priority"
    )]
    pub priority: String,
    #[serde(default, deserialize_with = "lenient::optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::optional_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub assigned_count: i32,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub comment_count: i32,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub total_subtasks: i32,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub completed_subtasks: i32,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp_or_now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, rename(deserialize = "task_tags"), deserialize_with = "task_tags")]
    pub tags: Vec<TaskTag>,
}

/// Insert payload for `tasks`. Unset status and priority take the board
/// defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(project_id: i64, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Default::default()
        }
    }

    pub(crate) fn payload(&self) -> TaskPayload<'_> {
        TaskPayload {
            project_id: self.project_id,
            title: &self.title,
            description: self.description.as_deref(),
            status: self
                .status
                .clone()
                .unwrap_or_else(lenient::default_task_status),
            priority: self
                .priority
                .clone()
                .unwrap_or_else(lenient::default_task_priority),
            start_date: self.start_date,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TaskPayload<'a> {
    pub project_id: i64,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: String,
    pub priority: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Replacement values for a task's editable columns. Every field is sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskPatch {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl From<&Task> for TaskPatch {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.clone(),
            priority: task.priority.clone(),
            start_date: task.start_date,
            due_date: task.due_date,
        }
    }
}

// =============================================================================
// Comments
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct MemberName {
    #[serde(default, deserialize_with = "lenient::optional_string")]
    display_name: Option<String>,
}

/// `task_comments` row, optionally with the author's team member embedded.
#[derive(Debug, Deserialize)]
pub(crate) struct CommentRow {
    #[serde(default, deserialize_with = "lenient::or_default")]
    id: i64,
    #[serde(default, deserialize_with = "lenient::or_default")]
    task_id: i64,
    #[serde(default = "Uuid::nil", deserialize_with = "lenient::uuid_or_nil")]
    user_id: Uuid,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    content: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient::timestamp_or_now")]
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::embedded_one")]
    team_members: Option<MemberName>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskComment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// `User <first 8 chars of the id>`.
pub fn fallback_author(user_id: Uuid) -> String {
    let id = user_id.to_string();
    format!("User {}", &id[..8])
}

impl From<CommentRow> for TaskComment {
    fn from(row: CommentRow) -> Self {
        let user_name = row
            .team_members
            .and_then(|m| m.display_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| fallback_author(row.user_id));
        Self {
            id: row.id,
            task_id: row.task_id,
            user_id: row.user_id,
            user_name,
            content: row.content,
            created_at: row.created_at,
        }
    }
}
