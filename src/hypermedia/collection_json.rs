//! Collection+JSON wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::descriptor::{
    CollectionDocument, FieldDescriptor, ItemDescriptor, LinkDescriptor, QueryDescriptor,
    TemplateDescriptor,
};

pub const MEDIA_TYPE: &str = "application/vnd.collection+json";
pub const VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
pub struct CollectionJson {
    pub collection: Collection,
}

#[derive(Debug, Serialize)]
pub struct Collection {
    pub version: &'static str,
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub links: Vec<Link>,
    pub items: Vec<Item>,
    pub queries: Vec<Query>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub render: &'static str,
    pub method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Item {
    pub href: String,
    pub data: Vec<Data>,
    pub links: Vec<Link>,
}

#[derive(Debug, Serialize)]
pub struct Query {
    pub href: String,
    pub rel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub data: Vec<Data>,
}

#[derive(Debug, Serialize)]
pub struct Template {
    pub href: String,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub data: Vec<Data>,
}

#[derive(Debug, Serialize)]
pub struct Data {
    pub name: String,
    pub value: Value,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub title: String,
    pub code: u16,
    pub message: String,
}

impl Data {
    fn from_field(field: &FieldDescriptor, with_required: bool) -> Self {
        Self {
            name: field.name().to_string(),
            value: field.value().map(|v| v.to_json()).unwrap_or(Value::Null),
            prompt: field.prompt().to_string(),
            kind: field.kind().as_str(),
            required: with_required.then(|| field.required()),
            pattern: field.pattern().map(String::from),
            min_length: field.min_length(),
            max_length: field.max_length(),
            min: field.minimum(),
            max: field.maximum(),
            options: field.options().to_vec(),
        }
    }
}

impl From<&LinkDescriptor> for Link {
    fn from(link: &LinkDescriptor) -> Self {
        Self {
            href: link.href.clone(),
            rel: link.rel.clone(),
            prompt: link.prompt.clone(),
            render: link.render.as_str(),
            method: link.method.as_str(),
        }
    }
}

impl From<&ItemDescriptor> for Item {
    fn from(item: &ItemDescriptor) -> Self {
        Self {
            href: item.href.clone(),
            data: item.data.iter().map(|f| Data::from_field(f, false)).collect(),
            links: item.links.iter().map(Link::from).collect(),
        }
    }
}

impl From<&QueryDescriptor> for Query {
    fn from(query: &QueryDescriptor) -> Self {
        Self {
            href: query.href.clone(),
            rel: query.rel.clone(),
            prompt: query.prompt.clone(),
            data: query.data.iter().map(|f| Data::from_field(f, true)).collect(),
        }
    }
}

impl From<&TemplateDescriptor> for Template {
    fn from(template: &TemplateDescriptor) -> Self {
        Self {
            href: template.href.clone(),
            method: template.method.as_str(),
            prompt: template.prompt.clone(),
            data: template.data.iter().map(|f| Data::from_field(f, true)).collect(),
        }
    }
}

impl From<&CollectionDocument> for CollectionJson {
    fn from(doc: &CollectionDocument) -> Self {
        Self {
            collection: Collection {
                version: VERSION,
                href: doc.href.clone(),
                title: Some(doc.title.clone()),
                links: doc.links.iter().map(Link::from).collect(),
                items: doc.items.iter().map(Item::from).collect(),
                queries: doc.queries.iter().map(Query::from).collect(),
                template: doc.template().map(Template::from),
                error: None,
            },
        }
    }
}

impl CollectionJson {
    pub fn error(href: impl Into<String>, title: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            collection: Collection {
                version: VERSION,
                href: href.into(),
                title: None,
                links: Vec::new(),
                items: Vec::new(),
                queries: Vec::new(),
                template: None,
                error: Some(ErrorBody {
                    title: title.into(),
                    code,
                    message: message.into(),
                }),
            },
        }
    }
}

/// A client write: `{"template": {"data": [{"name": …, "value": …}]}}`.
#[derive(Debug, Deserialize)]
pub struct TemplateWrite {
    pub template: WriteTemplate,
}

#[derive(Debug, Deserialize)]
pub struct WriteTemplate {
    #[serde(default)]
    pub data: Vec<WriteData>,
}

#[derive(Debug, Deserialize)]
pub struct WriteData {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl TemplateWrite {
    /// Flatten into a JSON object. Later entries win over earlier ones.
    pub fn into_payload(self) -> Map<String, Value> {
        self.template
            .data
            .into_iter()
            .map(|d| (d.name, d.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypermedia::descriptor::{FieldValue, InputKind, Method};
    use serde_json::json;

    fn doc() -> CollectionDocument {
        let status = FieldDescriptor::new(
            "status",
            Some("Status".into()),
            InputKind::Select {
                options: vec!["open".into(), "done".into()],
            },
            true,
            Some(FieldValue::from("open")),
        )
        .unwrap();
        let title = FieldDescriptor::new(
            "title",
            None,
            InputKind::Text {
                pattern: None,
                min_length: Some(1),
                max_length: Some(80),
            },
            true,
            None,
        )
        .unwrap();
        CollectionDocument {
            href: "/chores".into(),
            title: "Chores".into(),
            links: vec![LinkDescriptor::new("home", "/").prompt("Home")],
            items: vec![ItemDescriptor {
                href: "/chores/c1".into(),
                data: vec![status.clone()],
                links: vec![],
            }],
            queries: vec![],
            templates: vec![TemplateDescriptor {
                href: "/chores".into(),
                method: Method::Post,
                prompt: None,
                data: vec![title, status],
            }],
        }
    }

    #[test]
    fn wire_keys_follow_collection_json() {
        let wire = serde_json::to_value(CollectionJson::from(&doc())).unwrap();
        let c = &wire["collection"];
        assert_eq!(c["version"], "1.0");
        assert_eq!(c["href"], "/chores");
        assert_eq!(c["links"][0]["rel"], "home");
        assert_eq!(c["links"][0]["method"], "GET");
        assert_eq!(c["items"][0]["data"][0]["value"], "open");
        assert!(c["items"][0]["data"][0].get("required").is_none());
        assert_eq!(c["queries"], json!([]));

        let title = &c["template"]["data"][0];
        assert_eq!(title["type"], "text");
        assert_eq!(title["required"], true);
        assert_eq!(title["minLength"], 1);
        assert_eq!(title["maxLength"], 80);
        assert_eq!(title["value"], Value::Null);
        assert!(title.get("options").is_none());
        assert_eq!(c["template"]["data"][1]["options"], json!(["open", "done"]));
        assert!(c.get("error").is_none());
    }

    #[test]
    fn error_document_has_no_template() {
        let wire = serde_json::to_value(CollectionJson::error("/x", "Not found", 404, "missing")).unwrap();
        assert_eq!(wire["collection"]["error"]["code"], 404);
        assert!(wire["collection"].get("template").is_none());
    }

    #[test]
    fn write_template_flattens_to_payload() {
        let write: TemplateWrite = serde_json::from_value(json!({
            "template": { "data": [
                { "name": "title", "value": "Sweep" },
                { "name": "done", "value": true },
                { "name": "note" }
            ] }
        }))
        .unwrap();
        let payload = write.into_payload();
        assert_eq!(payload["title"], "Sweep");
        assert_eq!(payload["done"], true);
        assert_eq!(payload["note"], Value::Null);
    }
}
