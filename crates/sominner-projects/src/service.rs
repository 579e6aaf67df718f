use tracing::{debug, info};
use uuid::Uuid;

use sominner_rest::{
    CancellationToken, DataApi, DataApiExt, Embed, Filter, Order, Query, RestError, Select,
    UserScoped,
};

use crate::error::{ProjectError, Result};
use crate::models::{
    CommentRow, NewProject, NewTask, Project, ProjectWithTasks, Task, TaskComment, TaskPatch,
};

pub(crate) const PROJECTS: &str = "projects";
pub(crate) const TASKS: &str = "tasks";
pub(crate) const TASK_COMMENTS: &str = "task_comments";
pub(crate) const TEAM_MEMBERS: &str = "team_members";

const COMMENT_AUTHOR_HINT: &str = "task_comments_user_id_fkey";

#[derive(serde::Serialize)]
struct NewComment<'a> {
    task_id: i64,
    user_id: Uuid,
    content: &'a str,
}

/// Project board operations over any [`DataApi`].
///
/// Row security on the backend decides what a caller can see; use
/// [`ProjectService::for_user`] to act as a signed-in user.
pub struct ProjectService<A> {
    api: A,
}

impl<A: DataApi> ProjectService<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn tasks_query() -> Query {
        Query::table(TASKS).select(Select::all().embed(Embed::new("task_tags", &["tag"])))
    }

    /// Newest first.
    pub async fn list_projects(&self, cancel: &CancellationToken) -> Result<Vec<Project>> {
        let query = Query::table(PROJECTS).order(Order::desc("created_at"));
        let projects: Vec<Project> = self.api.select(&query, cancel).await?;
        debug!(count = projects.len(), "projects listed");
        Ok(projects)
    }

    pub async fn project(&self, id: i64, cancel: &CancellationToken) -> Result<Option<Project>> {
        let query = Query::table(PROJECTS).eq("id", id).limit(1);
        Ok(self.api.select_first(&query, cancel).await?)
    }

    /// Tasks of one project, oldest first, with their tags.
    pub async fn project_tasks(
        &self,
        project_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Task>> {
        let query = Self::tasks_query()
            .eq("project_id", project_id)
            .order(Order::asc("created_at"));
        Ok(self.api.select(&query, cancel).await?)
    }

    pub async fn project_with_tasks(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<ProjectWithTasks>> {
        let Some(project) = self.project(id, cancel).await? else {
            return Ok(None);
        };
        let tasks = self.project_tasks(id, cancel).await?;
        Ok(Some(ProjectWithTasks { project, tasks }))
    }

    /// Every visible project with its tasks, in one task query.
    pub async fn all_projects_with_tasks(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProjectWithTasks>> {
        let projects = self.list_projects(cancel).await?;
        if projects.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
        let query = Self::tasks_query()
            .filter(Filter::is_in("project_id", &ids))
            .order(Order::asc("created_at"));
        let tasks: Vec<Task> = self.api.select(&query, cancel).await?;

        Ok(projects
            .into_iter()
            .map(|project| {
                let tasks = tasks
                    .iter()
                    .filter(|t| t.project_id == project.id)
                    .cloned()
                    .collect();
                ProjectWithTasks { project, tasks }
            })
            .collect())
    }

    pub async fn create_project(
        &self,
        project: &NewProject,
        cancel: &CancellationToken,
    ) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(ProjectError::EmptyTitle);
        }
        let created: Project = self.api.insert_one(PROJECTS, project, cancel).await?;
        info!(project_id = created.id, name = %created.name, "project created");
        Ok(created)
    }

    /// Tasks go with the project through the store's cascade.
    pub async fn delete_project(&self, id: i64, cancel: &CancellationToken) -> Result<()> {
        self.api.delete_where(PROJECTS, "id", id, cancel).await?;
        info!(project_id = id, "project deleted");
        Ok(())
    }

    pub async fn create_task(&self, task: &NewTask, cancel: &CancellationToken) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(ProjectError::EmptyTitle);
        }
        let created: Task = self.api.insert_one(TASKS, &task.payload(), cancel).await?;
        info!(task_id = created.id, project_id = created.project_id, "task created");
        Ok(created)
    }

    pub async fn task(&self, id: i64, cancel: &CancellationToken) -> Result<Option<Task>> {
        let query = Self::tasks_query().eq("id", id).limit(1);
        Ok(self.api.select_first(&query, cancel).await?)
    }

    /// Replace the editable columns; a missing task is `EmptyResult`.
    pub async fn update_task(
        &self,
        id: i64,
        patch: &TaskPatch,
        cancel: &CancellationToken,
    ) -> Result<Task> {
        if patch.title.trim().is_empty() {
            return Err(ProjectError::EmptyTitle);
        }
        let updated: Vec<Task> = self
            .api
            .update_returning(TASKS, &[Filter::eq("id", id)], patch, cancel)
            .await?;
        debug!(task_id = id, "task updated");
        updated
            .into_iter()
            .next()
            .ok_or_else(|| RestError::EmptyResult(TASKS.to_string()).into())
    }

    pub async fn delete_task(&self, id: i64, cancel: &CancellationToken) -> Result<()> {
        self.api.delete_where(TASKS, "id", id, cancel).await?;
        info!(task_id = id, "task deleted");
        Ok(())
    }

    /// Oldest first, each with its author's display name.
    pub async fn task_comments(
        &self,
        task_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskComment>> {
        let select = Select::columns(&["id", "task_id", "user_id", "content", "created_at"])
            .embed(Embed::new(TEAM_MEMBERS, &["display_name"]).hint(COMMENT_AUTHOR_HINT));
        let query = Query::table(TASK_COMMENTS)
            .select(select)
            .eq("task_id", task_id)
            .order(Order::asc("created_at"));
        let rows: Vec<CommentRow> = self.api.select(&query, cancel).await?;
        Ok(rows.into_iter().map(TaskComment::from).collect())
    }

    pub async fn create_comment(
        &self,
        task_id: i64,
        user_id: Uuid,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskComment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ProjectError::EmptyComment);
        }
        let payload = NewComment {
            task_id,
            user_id,
            content,
        };
        let row: CommentRow = self.api.insert_one(TASK_COMMENTS, &payload, cancel).await?;
        info!(task_id, "comment added");
        Ok(row.into())
    }
}

impl<A: UserScoped> ProjectService<A> {
    /// Same operations, sent with the user's access token.
    pub fn for_user(&self, access_token: &str) -> Self {
        Self {
            api: self.api.for_user(access_token),
        }
    }
}
