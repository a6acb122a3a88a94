use chrono::{DateTime, Utc};

use crate::hypermedia::{FieldValue, Representable};
use crate::models::format_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskInstance {
    pub id: String,
    pub workflow_instance_id: String,
    pub name: String,
    pub position: i64,
    pub status: TaskStatus,
    pub due_datetime: Option<DateTime<Utc>>,
}

impl TaskInstance {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

impl Representable for TaskInstance {
    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "position" => Some(FieldValue::Integer(self.position)),
            "status" => Some(self.status.as_str().into()),
            "due_datetime" => self.due_datetime.as_ref().map(|d| format_timestamp(d).into()),
            "workflow_instance_id" => Some(self.workflow_instance_id.as_str().into()),
            _ => None,
        }
    }

    fn permits(&self, rel: &str) -> bool {
        match rel {
            "complete" => self.status == TaskStatus::Pending,
            "reopen" => self.status == TaskStatus::Completed,
            _ => true,
        }
    }
}
