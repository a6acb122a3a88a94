use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::hypermedia::{FieldValue, Representable};
use crate::models::task::TaskInstance;
use crate::models::{format_timestamp, non_blank, parse_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Active,
    Completed,
    Archived,
}

impl InstanceStatus {
    pub const ALL: [InstanceStatus; 4] = [
        InstanceStatus::Pending,
        InstanceStatus::Active,
        InstanceStatus::Completed,
        InstanceStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Pending => "pending",
            InstanceStatus::Active => "active",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Whether an edit may move an instance from `self` to `to`.
    /// Completion is driven by tasks, so `completed` is only reachable when
    /// every task is done, and left only by reopening a task.
    pub fn check_transition(self, to: InstanceStatus, all_tasks_done: bool) -> Result<(), String> {
        use InstanceStatus::*;
        match (self, to) {
            (from, to) if from == to => Ok(()),
            (Completed, Archived) => Err("A completed workflow cannot be archived".to_string()),
            (Completed, _) => Err("Reopen a task to make a completed workflow active again".to_string()),
            (Archived, Active) => Ok(()),
            (Archived, _) => Err("An archived workflow can only be unarchived to active".to_string()),
            (_, Completed) if !all_tasks_done => {
                Err("A workflow is completed when all of its tasks are".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkflowInstance {
    pub id: String,
    pub workflow_definition_id: String,
    pub user_id: i64,
    pub name: String,
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
    pub due_datetime: Option<DateTime<Utc>>,
    pub share_token: Option<String>,
    #[sqlx(skip)]
    pub tasks: Vec<TaskInstance>,
}

impl WorkflowInstance {
    /// (completed, total)
    pub fn progress(&self) -> (usize, usize) {
        let done = self.tasks.iter().filter(|t| t.is_completed()).count();
        (done, self.tasks.len())
    }

    pub fn all_tasks_done(&self) -> bool {
        self.tasks.iter().all(|t| t.is_completed())
    }
}

impl Representable for WorkflowInstance {
    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "workflow_definition_id" => Some(self.workflow_definition_id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "status" => Some(self.status.as_str().into()),
            "progress" => {
                let (done, total) = self.progress();
                Some(format!("{done}/{total}").into())
            }
            "created_at" => Some(format_timestamp(&self.created_at).into()),
            "due_datetime" => self.due_datetime.as_ref().map(|d| format_timestamp(d).into()),
            "share_token" => self.share_token.as_deref().map(FieldValue::from),
            _ => None,
        }
    }

    fn permits(&self, rel: &str) -> bool {
        match rel {
            "edit" => self.status != InstanceStatus::Archived,
            "archive" => !matches!(self.status, InstanceStatus::Completed | InstanceStatus::Archived),
            "unarchive" => self.status == InstanceStatus::Archived,
            "shared" => self.share_token.is_some(),
            _ => true,
        }
    }
}

fn text<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn due_from(payload: &Map<String, Value>, errors: &mut Vec<String>) -> Option<DateTime<Utc>> {
    let raw = non_blank(text(payload, "due_datetime"))?;
    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        errors.push(format!("Due date '{raw}' is not an RFC 3339 timestamp"));
    }
    parsed
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    pub workflow_definition_id: String,
    /// Defaults to the definition's name.
    pub name: Option<String>,
    pub status: InstanceStatus,
    pub due_datetime: Option<DateTime<Utc>>,
}

impl NewInstance {
    pub fn new(workflow_definition_id: impl Into<String>) -> Self {
        Self {
            workflow_definition_id: workflow_definition_id.into(),
            name: None,
            status: InstanceStatus::Active,
            due_datetime: None,
        }
    }

    /// Read a schema-validated write payload. New instances start pending or active.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        let workflow_definition_id = non_blank(text(payload, "workflow_definition_id"))
            .unwrap_or_else(|| {
                errors.push("A workflow definition is required".to_string());
                String::new()
            });
        let status = match text(payload, "status").map(InstanceStatus::parse) {
            None => InstanceStatus::Active,
            Some(Some(s @ (InstanceStatus::Pending | InstanceStatus::Active))) => s,
            Some(_) => {
                errors.push("A new workflow starts as pending or active".to_string());
                InstanceStatus::Active
            }
        };
        let due_datetime = due_from(payload, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            workflow_definition_id,
            name: non_blank(text(payload, "name")),
            status,
            due_datetime,
        })
    }
}

/// Fields a user may change on an existing instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceUpdate {
    /// Blank keeps the current name.
    pub name: Option<String>,
    pub status: Option<InstanceStatus>,
    /// Absent keeps the current due date; `Some(None)` clears it.
    pub due_datetime: Option<Option<DateTime<Utc>>>,
    /// The definition cannot change; a differing id is rejected.
    pub workflow_definition_id: Option<String>,
}

impl InstanceUpdate {
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        let status = match text(payload, "status") {
            Some(raw) => {
                let parsed = InstanceStatus::parse(raw);
                if parsed.is_none() {
                    errors.push(format!("Unknown status '{raw}'"));
                }
                parsed
            }
            None => None,
        };
        let due_datetime = payload
            .contains_key("due_datetime")
            .then(|| due_from(payload, &mut errors));
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            name: non_blank(text(payload, "name")),
            status,
            due_datetime,
            workflow_definition_id: non_blank(text(payload, "workflow_definition_id")),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub status: Option<InstanceStatus>,
    pub definition_id: Option<String>,
    /// Case-insensitive substring match.
    pub name: Option<String>,
}

impl InstanceFilter {
    /// Build from query-catalog values; unknown statuses are ignored.
    pub fn from_values(values: &[(String, FieldValue)]) -> Self {
        let mut filter = Self::default();
        for (name, value) in values {
            let text = value.to_string();
            match name.as_str() {
                "status" => filter.status = InstanceStatus::parse(&text),
                "workflow_definition_id" => filter.definition_id = Some(text),
                "name" => filter.name = Some(text),
                _ => {}
            }
        }
        filter
    }
}
