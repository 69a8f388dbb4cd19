use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId, TaskStatus, TaskType};

pub const STATUS_OK: &str = "OK";
pub const STATUS_NO_TASKS: &str = "no tasks";

/// Body of `POST /get-task/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTaskRequest {
    pub task_type: TaskType,
}

/// Answer of `POST /get-task/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTaskResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<Task>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /report-task/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTaskRequest {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub text_msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_body_shape() {
        let body = ReportTaskRequest {
            task_id: 12,
            status: TaskStatus::Accepted,
            text_msg: "transmission get the job: 12".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"taskId": 12, "status": 3, "textMsg": "transmission get the job: 12"})
        );
    }

    #[test]
    fn test_get_task_body_shape() {
        assert_eq!(
            serde_json::to_value(GetTaskRequest { task_type: 5 }).unwrap(),
            json!({"taskType": 5})
        );
    }

    #[test]
    fn test_no_tasks_response_without_data() {
        let res: GetTaskResponse =
            serde_json::from_value(json!({"status": "no tasks"})).unwrap();
        assert_eq!(res.status, STATUS_NO_TASKS);
        assert!(res.data.is_none());
        assert!(res.error.is_none());
    }
}
