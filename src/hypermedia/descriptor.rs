use std::fmt;

use serde_json::Value;

/// A scalar value carried by a field: current entity data, a filter value,
/// or a template default.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl FieldValue {
    /// Convert a JSON scalar. Null, arrays and objects have no field value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Bool(b) => Some(FieldValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Integer(i)),
                None => n.as_f64().map(FieldValue::Number),
            },
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Boolean(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

/// How a consuming UI should present a field. Each variant carries only the
/// constraints that make sense for it.
#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    Text {
        pattern: Option<String>,
        min_length: Option<u64>,
        max_length: Option<u64>,
    },
    Textarea {
        min_length: Option<u64>,
        max_length: Option<u64>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Select {
        options: Vec<String>,
    },
    Hidden,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Text { .. } => "text",
            InputKind::Textarea { .. } => "textarea",
            InputKind::Number { .. } => "number",
            InputKind::Boolean => "boolean",
            InputKind::Select { .. } => "select",
            InputKind::Hidden => "hidden",
        }
    }
}

/// Why a field descriptor could not be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidField {
    EmptyOptions,
    ValueNotInOptions(String),
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidField::EmptyOptions => write!(f, "select field has no options"),
            InvalidField::ValueNotInOptions(v) => {
                write!(f, "value '{v}' is not one of the select options")
            }
        }
    }
}

/// One field of an item, query or template.
///
/// Fields are private so that the select invariant (non-empty options, value
/// among them) holds for every descriptor in existence.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    prompt: String,
    kind: InputKind,
    required: bool,
    value: Option<FieldValue>,
}

impl FieldDescriptor {
    pub fn new(
        name: impl Into<String>,
        prompt: Option<String>,
        kind: InputKind,
        required: bool,
        value: Option<FieldValue>,
    ) -> Result<Self, InvalidField> {
        let name = name.into();
        if let InputKind::Select { options } = &kind {
            if options.is_empty() {
                return Err(InvalidField::EmptyOptions);
            }
        }
        let descriptor = Self {
            prompt: prompt.unwrap_or_else(|| name.clone()),
            name,
            kind,
            required,
            value: None,
        };
        descriptor.with_value(value)
    }

    /// A copy of this descriptor carrying `value`.
    pub fn with_value(&self, value: Option<FieldValue>) -> Result<Self, InvalidField> {
        if let (InputKind::Select { options }, Some(v)) = (&self.kind, &value) {
            let rendered = v.to_string();
            if !options.iter().any(|o| *o == rendered) {
                return Err(InvalidField::ValueNotInOptions(rendered));
            }
        }
        Ok(Self { value, ..self.clone() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn kind(&self) -> &InputKind {
        &self.kind
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    /// The value as text, empty when absent.
    pub fn value_text(&self) -> String {
        self.value.as_ref().map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn options(&self) -> &[String] {
        match &self.kind {
            InputKind::Select { options } => options,
            _ => &[],
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        match &self.kind {
            InputKind::Text { pattern, .. } => pattern.as_deref(),
            _ => None,
        }
    }

    pub fn min_length(&self) -> Option<u64> {
        match &self.kind {
            InputKind::Text { min_length, .. } | InputKind::Textarea { min_length, .. } => {
                *min_length
            }
            _ => None,
        }
    }

    pub fn max_length(&self) -> Option<u64> {
        match &self.kind {
            InputKind::Text { max_length, .. } | InputKind::Textarea { max_length, .. } => {
                *max_length
            }
            _ => None,
        }
    }

    pub fn minimum(&self) -> Option<f64> {
        match &self.kind {
            InputKind::Number { minimum, .. } => *minimum,
            _ => None,
        }
    }

    pub fn maximum(&self) -> Option<f64> {
        match &self.kind {
            InputKind::Number { maximum, .. } => *maximum,
            _ => None,
        }
    }

    /// HTML `<input type=…>` for kinds rendered as plain inputs.
    pub fn input_type(&self) -> &'static str {
        match self.kind {
            InputKind::Number { .. } => "number",
            InputKind::Boolean => "checkbox",
            InputKind::Hidden => "hidden",
            _ => "text",
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self.kind, InputKind::Select { .. })
    }

    pub fn is_textarea(&self) -> bool {
        matches!(self.kind, InputKind::Textarea { .. })
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, InputKind::Boolean)
    }

    pub fn is_checked(&self) -> bool {
        matches!(self.value, Some(FieldValue::Boolean(true)))
    }

    pub fn is_selected(&self, option: &str) -> bool {
        self.value.as_ref().is_some_and(|v| v.to_string() == option)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_get(&self) -> bool {
        *self == Method::Get
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a link is navigated to or fetched and embedded in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderHint {
    #[default]
    Link,
    Embed,
}

impl RenderHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderHint::Link => "link",
            RenderHint::Embed => "embed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescriptor {
    pub href: String,
    pub rel: String,
    pub prompt: Option<String>,
    pub method: Method,
    pub render: RenderHint,
}

impl LinkDescriptor {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            prompt: None,
            method: Method::Get,
            render: RenderHint::Link,
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn render(mut self, render: RenderHint) -> Self {
        self.render = render;
        self
    }

    /// Label for buttons and anchors.
    pub fn label(&self) -> &str {
        self.prompt.as_deref().unwrap_or(&self.rel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDescriptor {
    pub href: String,
    pub data: Vec<FieldDescriptor>,
    pub links: Vec<LinkDescriptor>,
}

impl ItemDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.data.iter().find(|f| f.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub href: String,
    pub rel: String,
    pub prompt: Option<String>,
    pub method: Method,
    pub data: Vec<FieldDescriptor>,
}

impl QueryDescriptor {
    pub fn label(&self) -> &str {
        self.prompt.as_deref().unwrap_or(&self.rel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDescriptor {
    pub href: String,
    pub method: Method,
    pub prompt: Option<String>,
    pub data: Vec<FieldDescriptor>,
}

impl TemplateDescriptor {
    pub fn label(&self) -> &str {
        self.prompt.as_deref().unwrap_or("Save")
    }
}

/// A complete hypermedia document, ready to be serialized as
/// Collection+JSON or rendered as HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDocument {
    pub href: String,
    pub title: String,
    pub links: Vec<LinkDescriptor>,
    pub items: Vec<ItemDescriptor>,
    pub queries: Vec<QueryDescriptor>,
    pub templates: Vec<TemplateDescriptor>,
}

impl CollectionDocument {
    pub fn template(&self) -> Option<&TemplateDescriptor> {
        self.templates.first()
    }

    pub fn link(&self, rel: &str) -> Option<&LinkDescriptor> {
        self.links.iter().find(|l| l.rel == rel)
    }
}
