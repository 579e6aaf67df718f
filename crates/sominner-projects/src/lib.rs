//! Projects, tasks and task comments over the data endpoint.
//!
//! Rows are decoded leniently: a missing or malformed column falls back to a
//! documented default instead of failing the whole listing.

pub mod error;
pub mod models;
pub mod service;

pub use error::{ProjectError, Result};
pub use models::{NewProject, NewTask, Project, ProjectWithTasks, Task, TaskComment, TaskPatch, TaskTag};
pub use service::ProjectService;
