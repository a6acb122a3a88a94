//! Document builders shared by the HTML pages and the Collection+JSON API.
//!
//! Both surfaces expose the same resources; they differ only in where hrefs
//! point and in which methods writes use (HTML forms can only POST).

use crate::config::AppConfig;
use crate::handlers::api_cj::API_PREFIX;
use crate::hypermedia::{
    ActionTemplate, CatalogContext, CollectionDocument, DocumentSpec, EntitySchema, FieldValue,
    LinkDescriptor, Method, QueryTarget, RepresentationError, TemplateTarget, represent_list,
    represent_single,
};
use crate::models::definition::WorkflowDefinition;
use crate::models::instance::WorkflowInstance;
use crate::models::task::TaskInstance;
use crate::schemas::SchemaRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Html,
    Api,
}

/// Href construction for one surface, rooted at the configured base URL.
#[derive(Debug, Clone)]
pub struct Uris {
    root: String,
    surface: Surface,
}

impl Uris {
    pub fn new(config: &AppConfig, surface: Surface) -> Self {
        let root = match surface {
            Surface::Html => config.public_base_url.clone(),
            Surface::Api => format!("{}{API_PREFIX}", config.public_base_url),
        };
        Self { root, surface }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn home(&self) -> String {
        format!("{}/", self.root)
    }

    pub fn definitions(&self) -> String {
        format!("{}/workflow-definitions", self.root)
    }

    pub fn definition(&self, id: &str) -> String {
        format!("{}/{}", self.definitions(), urlencoding::encode(id))
    }

    pub fn instances(&self) -> String {
        format!("{}/workflow-instances", self.root)
    }

    pub fn instance(&self, id: &str) -> String {
        format!("{}/{}", self.instances(), urlencoding::encode(id))
    }

    pub fn instance_tasks(&self, id: &str) -> String {
        format!("{}/tasks", self.instance(id))
    }

    pub fn task(&self, id: &str) -> String {
        format!("{}/task-instances/{}", self.root, urlencoding::encode(id))
    }

    pub fn share(&self, token: &str) -> String {
        format!("{}/share/{}", self.root, urlencoding::encode(token))
    }

    /// Href template for item actions; `{field}` is filled per entity.
    fn action(&self, path: &str) -> String {
        format!("{}{path}", self.root)
    }

    /// HTML forms send every write as POST.
    fn write(&self, method: Method) -> Method {
        match self.surface {
            Surface::Html => Method::Post,
            Surface::Api => method,
        }
    }
}

/// What the current user may do, as far as documents are concerned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Abilities {
    pub manage_definitions: bool,
    pub manage_instances: bool,
}

pub struct Documents<'a> {
    registry: &'a SchemaRegistry,
    uris: Uris,
}

impl<'a> Documents<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &AppConfig, surface: Surface) -> Self {
        Self {
            registry,
            uris: Uris::new(config, surface),
        }
    }

    pub fn uris(&self) -> &Uris {
        &self.uris
    }

    fn html(&self) -> bool {
        self.uris.surface == Surface::Html
    }

    fn nav_links(&self) -> Vec<LinkDescriptor> {
        vec![
            LinkDescriptor::new("home", self.uris.home()).prompt("Home"),
            LinkDescriptor::new("definitions", self.uris.definitions()).prompt("Workflow definitions"),
            LinkDescriptor::new("instances", self.uris.instances()).prompt("My workflows"),
        ]
    }

    /// Entry point: links to every collection, no items.
    pub fn home(&self) -> CollectionDocument {
        CollectionDocument {
            href: self.uris.home(),
            title: "Home".to_string(),
            links: self.nav_links(),
            items: Vec::new(),
            queries: Vec::new(),
            templates: Vec::new(),
        }
    }

    /// Instance schema whose definition field only offers `definition_ids`.
    /// An empty list leaves the field as free text.
    pub fn instance_schema(&self, definition_ids: Vec<String>) -> EntitySchema {
        if definition_ids.is_empty() {
            return self.registry.instance.clone();
        }
        self.registry
            .instance
            .with_allowed_values("workflow_definition_id", definition_ids)
    }

    fn definition_actions(&self, abilities: Abilities) -> Vec<ActionTemplate> {
        let mut actions = Vec::new();
        if abilities.manage_definitions && self.html() {
            actions.push(ActionTemplate::new("edit", self.uris.action("/workflow-definitions/{id}/edit")).prompt("Edit"));
        }
        if abilities.manage_instances {
            actions.push(
                ActionTemplate::new("instantiate", self.uris.action("/workflow-definitions/{id}/instances"))
                    .prompt("Start")
                    .method(Method::Post),
            );
        }
        if abilities.manage_definitions {
            let (path, method) = match self.uris.surface {
                Surface::Html => ("/workflow-definitions/{id}/delete", Method::Post),
                Surface::Api => ("/workflow-definitions/{id}", Method::Delete),
            };
            actions.push(ActionTemplate::new("delete", self.uris.action(path)).prompt("Delete").method(method));
        }
        actions
    }

    /// `filters` are the current query values; `draft` refills the create
    /// template after a rejected submission.
    pub fn definition_list(
        &self,
        definitions: &[WorkflowDefinition],
        filters: Vec<(String, FieldValue)>,
        draft: Vec<(String, FieldValue)>,
        abilities: Abilities,
    ) -> Result<CollectionDocument, RepresentationError> {
        let schema = &self.registry.definition;
        let display = self.registry.catalog(schema, CatalogContext::Display)?;
        let query = self.registry.catalog(&schema.with_values(filters), CatalogContext::Query)?;
        let template = self.registry.catalog(&schema.with_values(draft), CatalogContext::Template)?;

        let href = self.uris.definitions();
        let mut spec = DocumentSpec::new(href.clone(), "Workflow definitions", &display).query(
            &query,
            QueryTarget {
                href: href.clone(),
                rel: "search".to_string(),
                prompt: Some("Filter".to_string()),
            },
        );
        if abilities.manage_definitions {
            spec = spec.template(
                &template,
                TemplateTarget {
                    href,
                    method: Method::Post,
                    prompt: Some("Create definition".to_string()),
                },
            );
        }
        for link in self.nav_links().into_iter().filter(|l| l.rel != "definitions") {
            spec = spec.link(link);
        }
        for action in self.definition_actions(abilities) {
            spec = spec.item_action(action);
        }

        represent_list(&spec, definitions, &|d: &WorkflowDefinition| Some(self.uris.definition(&d.id)))
    }

    /// One definition. The update template is included only when `editable`.
    pub fn definition_single(
        &self,
        definition: &WorkflowDefinition,
        editable: bool,
        abilities: Abilities,
    ) -> Result<CollectionDocument, RepresentationError> {
        let schema = &self.registry.definition;
        let display = self.registry.catalog(schema, CatalogContext::Display)?;
        let template = self.registry.catalog(schema, CatalogContext::Template)?;

        let href = self.uris.definition(&definition.id);
        let mut spec = DocumentSpec::new(href.clone(), definition.name.clone(), &display)
            .link(LinkDescriptor::new("collection", self.uris.definitions()).prompt("All definitions"));
        if editable && abilities.manage_definitions {
            spec = spec.template(
                &template,
                TemplateTarget {
                    href,
                    method: self.uris.write(Method::Put),
                    prompt: Some("Save definition".to_string()),
                },
            );
        }
        for action in self.definition_actions(abilities) {
            spec = spec.item_action(action);
        }

        represent_single(&spec, definition, &|d: &WorkflowDefinition| Some(self.uris.definition(&d.id)))
    }

    fn instance_actions(&self, abilities: Abilities) -> Vec<ActionTemplate> {
        if !abilities.manage_instances {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if self.html() {
            actions.push(ActionTemplate::new("edit", self.uris.action("/workflow-instances/{id}/edit")).prompt("Edit"));
        } else {
            actions.push(ActionTemplate::new("tasks", self.uris.action("/workflow-instances/{id}/tasks")).prompt("Tasks"));
        }
        for (rel, prompt) in [("archive", "Archive"), ("unarchive", "Unarchive"), ("share", "Share")] {
            actions.push(
                ActionTemplate::new(rel, self.uris.action(&format!("/workflow-instances/{{id}}/{rel}")))
                    .prompt(prompt)
                    .method(Method::Post),
            );
        }
        actions.push(ActionTemplate::new("shared", self.uris.action("/share/{share_token}")).prompt("Shared view"));
        actions
    }

    /// `schema` comes from [`Documents::instance_schema`] so the query and
    /// template offer the existing definitions.
    pub fn instance_list(
        &self,
        schema: &EntitySchema,
        instances: &[WorkflowInstance],
        filters: Vec<(String, FieldValue)>,
        draft: Vec<(String, FieldValue)>,
        abilities: Abilities,
    ) -> Result<CollectionDocument, RepresentationError> {
        let display = self.registry.catalog(&self.registry.instance, CatalogContext::Display)?;
        let query = self.registry.catalog(&schema.with_values(filters), CatalogContext::Query)?;
        let template = self.registry.catalog(&schema.with_values(draft), CatalogContext::Template)?;

        let href = self.uris.instances();
        let mut spec = DocumentSpec::new(href.clone(), "My workflows", &display).query(
            &query,
            QueryTarget {
                href: href.clone(),
                rel: "search".to_string(),
                prompt: Some("Filter".to_string()),
            },
        );
        // Without definitions there is nothing to start
        let can_create = abilities.manage_instances
            && schema
                .field("workflow_definition_id")
                .is_some_and(|f| !f.allowed_values.is_empty());
        if can_create {
            spec = spec.template(
                &template,
                TemplateTarget {
                    href,
                    method: Method::Post,
                    prompt: Some("Start workflow".to_string()),
                },
            );
        }
        for link in self.nav_links().into_iter().filter(|l| l.rel != "instances") {
            spec = spec.link(link);
        }
        for action in self.instance_actions(abilities) {
            spec = spec.item_action(action);
        }

        represent_list(&spec, instances, &|w: &WorkflowInstance| Some(self.uris.instance(&w.id)))
    }

    /// One instance. The update template, when `editable`, keeps the
    /// definition fixed to the current one.
    pub fn instance_single(
        &self,
        instance: &WorkflowInstance,
        editable: bool,
        abilities: Abilities,
    ) -> Result<CollectionDocument, RepresentationError> {
        let display = self.registry.catalog(&self.registry.instance, CatalogContext::Display)?;
        let schema = self.instance_schema(vec![instance.workflow_definition_id.clone()]);
        let template = self.registry.catalog(&schema, CatalogContext::Template)?;

        let href = self.uris.instance(&instance.id);
        let mut spec = DocumentSpec::new(href.clone(), instance.name.clone(), &display)
            .link(LinkDescriptor::new("collection", self.uris.instances()).prompt("My workflows"))
            .link(
                LinkDescriptor::new("definition", self.uris.definition(&instance.workflow_definition_id))
                    .prompt("Definition"),
            );
        if !self.html() {
            spec = spec.link(LinkDescriptor::new("tasks", self.uris.instance_tasks(&instance.id)).prompt("Tasks"));
        }
        if editable && abilities.manage_instances {
            spec = spec.template(
                &template,
                TemplateTarget {
                    href,
                    method: self.uris.write(Method::Put),
                    prompt: Some("Save workflow".to_string()),
                },
            );
        }
        for action in self.instance_actions(abilities) {
            spec = spec.item_action(action);
        }

        represent_single(&spec, instance, &|w: &WorkflowInstance| Some(self.uris.instance(&w.id)))
    }

    fn task_actions(&self, abilities: Abilities) -> Vec<ActionTemplate> {
        if !abilities.manage_instances {
            return Vec::new();
        }
        vec![
            ActionTemplate::new("complete", self.uris.action("/task-instances/{id}/complete"))
                .prompt("Done")
                .method(Method::Post),
            ActionTemplate::new("reopen", self.uris.action("/task-instances/{id}/reopen"))
                .prompt("Reopen")
                .method(Method::Post),
        ]
    }

    /// The tasks of one instance. Without abilities (shared views) the
    /// items carry no actions.
    pub fn task_list(
        &self,
        instance: &WorkflowInstance,
        abilities: Abilities,
    ) -> Result<CollectionDocument, RepresentationError> {
        let display = self.registry.catalog(&self.registry.task, CatalogContext::Display)?;

        let mut spec = DocumentSpec::new(self.uris.instance_tasks(&instance.id), "Tasks", &display);
        if abilities.manage_instances {
            spec = spec.link(LinkDescriptor::new("up", self.uris.instance(&instance.id)).prompt(instance.name.clone()));
        }
        for action in self.task_actions(abilities) {
            spec = spec.item_action(action);
        }

        represent_list(&spec, &instance.tasks, &|t: &TaskInstance| Some(self.uris.task(&t.id)))
    }

    /// One task with a status template.
    pub fn task_single(&self, task: &TaskInstance, abilities: Abilities) -> Result<CollectionDocument, RepresentationError> {
        let display = self.registry.catalog(&self.registry.task, CatalogContext::Display)?;
        let template = self.registry.catalog(&self.registry.task, CatalogContext::Template)?;

        let href = self.uris.task(&task.id);
        let mut spec = DocumentSpec::new(href.clone(), task.name.clone(), &display)
            .link(LinkDescriptor::new("up", self.uris.instance(&task.workflow_instance_id)).prompt("Workflow"));
        if abilities.manage_instances {
            spec = spec.template(
                &template,
                TemplateTarget {
                    href,
                    method: self.uris.write(Method::Put),
                    prompt: Some("Update task".to_string()),
                },
            );
        }
        for action in self.task_actions(abilities) {
            spec = spec.item_action(action);
        }

        represent_single(&spec, task, &|t: &TaskInstance| Some(self.uris.task(&t.id)))
    }

    /// Read-only view behind a share token: the instance and its tasks.
    pub fn shared(&self, token: &str, instance: &WorkflowInstance) -> Result<Vec<CollectionDocument>, RepresentationError> {
        let href = self.uris.share(token);
        let tasks_href = match self.uris.surface {
            Surface::Html => href.clone(),
            Surface::Api => format!("{href}/tasks"),
        };

        let display = self.registry.catalog(&self.registry.instance, CatalogContext::Display)?;
        let mut spec = DocumentSpec::new(href.clone(), instance.name.clone(), &display);
        if !self.html() {
            spec = spec.link(LinkDescriptor::new("tasks", tasks_href.clone()).prompt("Tasks"));
        }
        let doc = represent_single(&spec, instance, &|_: &WorkflowInstance| Some(href.clone()))?;

        let tasks = self.registry.catalog(&self.registry.task, CatalogContext::Display)?;
        let task_spec = DocumentSpec::new(tasks_href.clone(), "Tasks", &tasks);
        let task_doc = represent_list(&task_spec, &instance.tasks, &|t: &TaskInstance| {
            Some(format!("{tasks_href}#{}", t.id))
        })?;
        Ok(vec![doc, task_doc])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::instance::InstanceStatus;
    use crate::models::task::TaskStatus;

    fn config(base: &str) -> AppConfig {
        AppConfig {
            public_base_url: base.to_string(),
            ..AppConfig::default()
        }
    }

    fn instance(status: InstanceStatus) -> WorkflowInstance {
        WorkflowInstance {
            id: "wf_00000001".into(),
            workflow_definition_id: "def_morning".into(),
            user_id: 1,
            name: "Morning".into(),
            status,
            created_at: Utc::now(),
            due_datetime: None,
            share_token: None,
            tasks: vec![TaskInstance {
                id: "task_00000001".into(),
                workflow_instance_id: "wf_00000001".into(),
                name: "Make bed".into(),
                position: 1,
                status: TaskStatus::Pending,
                due_datetime: None,
            }],
        }
    }

    const ALL: Abilities = Abilities {
        manage_definitions: true,
        manage_instances: true,
    };

    #[test]
    fn api_uris_carry_base_and_prefix() {
        let uris = Uris::new(&config("https://lists.example"), Surface::Api);
        assert_eq!(uris.definitions(), "https://lists.example/api/cj/workflow-definitions");
        assert_eq!(uris.task("task 1"), "https://lists.example/api/cj/task-instances/task%201");
        let html = Uris::new(&config(""), Surface::Html);
        assert_eq!(html.home(), "/");
        assert_eq!(html.share("abc"), "/share/abc");
    }

    #[test]
    fn archived_instance_offers_unarchive_only() {
        let registry = SchemaRegistry::load(255).unwrap();
        let docs = Documents::new(&registry, &config(""), Surface::Html);
        let doc = docs.instance_single(&instance(InstanceStatus::Archived), false, ALL).unwrap();
        let rels: Vec<&str> = doc.items[0].links.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(rels, ["unarchive", "share"]);
        assert!(doc.templates.is_empty());
    }

    #[test]
    fn html_writes_use_post() {
        let registry = SchemaRegistry::load(255).unwrap();
        let docs = Documents::new(&registry, &config(""), Surface::Html);
        let doc = docs.instance_single(&instance(InstanceStatus::Active), true, ALL).unwrap();
        let template = doc.template().unwrap();
        assert_eq!(template.method, Method::Post);
        assert_eq!(template.href, "/workflow-instances/wf_00000001");

        let api = Documents::new(&registry, &config(""), Surface::Api);
        let doc = api.instance_single(&instance(InstanceStatus::Active), true, ALL).unwrap();
        assert_eq!(doc.template().unwrap().method, Method::Put);
        assert!(doc.link("tasks").is_some());
    }

    #[test]
    fn instance_list_without_definitions_has_no_template() {
        let registry = SchemaRegistry::load(255).unwrap();
        let docs = Documents::new(&registry, &config(""), Surface::Api);
        let schema = docs.instance_schema(Vec::new());
        let doc = docs.instance_list(&schema, &[], Vec::new(), Vec::new(), ALL).unwrap();
        assert!(doc.templates.is_empty());
        assert_eq!(doc.queries.len(), 1);

        let schema = docs.instance_schema(vec!["def_morning".into()]);
        let doc = docs.instance_list(&schema, &[], Vec::new(), Vec::new(), ALL).unwrap();
        let field = doc.template().unwrap().data.iter().find(|f| f.name() == "workflow_definition_id").unwrap();
        assert_eq!(field.options(), ["def_morning"]);
    }

    #[test]
    fn shared_view_has_no_actions_or_templates() {
        let registry = SchemaRegistry::load(255).unwrap();
        let docs = Documents::new(&registry, &config(""), Surface::Html);
        let shared = docs.shared("feedface", &instance(InstanceStatus::Active)).unwrap();
        assert_eq!(shared.len(), 2);
        for doc in &shared {
            assert!(doc.templates.is_empty());
            assert!(doc.items.iter().all(|i| i.links.is_empty()));
        }
        assert_eq!(shared[1].items[0].href, "/share/feedface#task_00000001");
    }

    #[test]
    fn members_see_no_definition_writes() {
        let registry = SchemaRegistry::load(255).unwrap();
        let docs = Documents::new(&registry, &config(""), Surface::Html);
        let member = Abilities {
            manage_definitions: false,
            manage_instances: true,
        };
        let doc = docs.definition_list(&[], Vec::new(), Vec::new(), member).unwrap();
        assert!(doc.templates.is_empty());
        assert!(doc.link("instances").is_some());
        assert!(doc.link("definitions").is_none());
    }
}
