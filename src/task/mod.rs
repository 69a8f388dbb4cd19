//! Task data model shared by every worker service.
//!
//! A [`Task`] is what the dispatcher hands out from `POST /get-task/`;
//! [`TaskStatus`] is what the worker reports back on `POST /report-task/`.

mod model;
mod status;

pub use model::{Domain, Task, TaskData, TaskId, TaskType};
pub use status::{TaskStatus, UnknownStatus};
