use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::hypermedia::{FieldValue, Representable};
use crate::models::{format_timestamp, non_blank};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct TaskDefinition {
    pub id: String,
    pub workflow_definition_id: String,
    pub name: String,
    pub position: i64,
    pub due_offset_minutes: Option<i64>,
}

/// Largest due offset a task may carry, in either direction: one year.
pub const MAX_DUE_OFFSET_MINUTES: i64 = 525_600;

/// One task line as entered by a user: `name` or `name | offset_minutes`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub due_offset_minutes: Option<i64>,
}

impl TaskSpec {
    pub fn parse_lines(text: &str) -> Result<Vec<TaskSpec>, Vec<String>> {
        let mut specs = Vec::new();
        let mut errors = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, offset) = match line.split_once('|') {
                Some((name, offset)) => (name.trim(), Some(offset.trim())),
                None => (line, None),
            };
            if name.is_empty() {
                errors.push(format!("Line {}: task name is empty", n + 1));
                continue;
            }
            let due_offset_minutes = match offset.filter(|o| !o.is_empty()) {
                Some(raw) => match raw.parse::<i64>() {
                    Ok(minutes) if minutes.abs() <= MAX_DUE_OFFSET_MINUTES => Some(minutes),
                    Ok(_) => {
                        errors.push(format!(
                            "Line {}: offset '{raw}' is outside ±{MAX_DUE_OFFSET_MINUTES} minutes",
                            n + 1
                        ));
                        continue;
                    }
                    Err(_) => {
                        errors.push(format!(
                            "Line {}: offset '{raw}' is not a whole number of minutes",
                            n + 1
                        ));
                        continue;
                    }
                },
                None => None,
            };
            specs.push(TaskSpec {
                name: name.to_string(),
                due_offset_minutes,
            });
        }
        if errors.is_empty() { Ok(specs) } else { Err(errors) }
    }
}

/// Render task definitions back into the editable line format.
pub fn task_lines(tasks: &[TaskDefinition]) -> String {
    tasks
        .iter()
        .map(|t| match t.due_offset_minutes {
            Some(minutes) => format!("{} | {minutes}", t.name),
            None => t.name.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Create/update input for a definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

impl NewDefinition {
    /// Read a schema-validated write payload.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, Vec<String>> {
        let text = |key: &str| payload.get(key).and_then(Value::as_str);
        let name = non_blank(text("name"))
            .ok_or_else(|| vec!["Definition name cannot be empty.".to_string()])?;
        let tasks = TaskSpec::parse_lines(text("tasks").unwrap_or_default())?;
        Ok(Self {
            name,
            description: non_blank(text("description")),
            tasks,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionFilter {
    /// Case-insensitive substring match.
    pub name: Option<String>,
}

impl DefinitionFilter {
    /// Build from query-catalog values, see `EntitySchema::filter_values`.
    pub fn from_values(values: &[(String, FieldValue)]) -> Self {
        let mut filter = Self::default();
        for (name, value) in values {
            if name == "name" {
                filter.name = Some(value.to_string());
            }
        }
        filter
    }
}

impl Representable for WorkflowDefinition {
    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "description" => self.description.as_deref().map(FieldValue::from),
            "tasks" => Some(task_lines(&self.tasks)).filter(|s| !s.is_empty()).map(FieldValue::from),
            "task_count" => Some(FieldValue::Integer(self.tasks.len() as i64)),
            "created_at" => Some(format_timestamp(&self.created_at).into()),
            _ => None,
        }
    }
}
