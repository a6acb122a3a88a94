//! Assembles [`CollectionDocument`]s from domain entities and catalogs.
//!
//! The representor never builds URIs on its own. Entity hrefs come from a
//! caller-supplied [`HrefResolver`], and item actions are href templates whose
//! `{field}` placeholders are filled from the entity's own values.

use std::collections::HashSet;

use super::catalog::{Catalog, CatalogContext};
use super::descriptor::{
    CollectionDocument, FieldDescriptor, FieldValue, ItemDescriptor, LinkDescriptor, Method,
    QueryDescriptor, RenderHint, TemplateDescriptor,
};
use super::error::RepresentationError;

/// A domain entity that can be shown through a catalog.
pub trait Representable {
    /// Current value of the named field, `None` when absent.
    fn field_value(&self, name: &str) -> Option<FieldValue>;

    /// Whether the item action `rel` applies to this entity in its current state.
    fn permits(&self, _rel: &str) -> bool {
        true
    }
}

pub trait HrefResolver<E: ?Sized> {
    fn resolve(&self, entity: &E) -> Option<String>;
}

impl<E: ?Sized, F> HrefResolver<E> for F
where
    F: Fn(&E) -> Option<String>,
{
    fn resolve(&self, entity: &E) -> Option<String> {
        self(entity)
    }
}

/// An item-level action whose href still contains `{field}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTemplate {
    pub rel: String,
    pub href: String,
    pub prompt: Option<String>,
    pub method: Method,
    pub render: RenderHint,
}

impl ActionTemplate {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
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

    fn expand<E: Representable + ?Sized>(&self, entity: &E) -> Result<LinkDescriptor, String> {
        let href = interpolate(&self.href, entity)?;
        Ok(LinkDescriptor {
            href,
            rel: self.rel.clone(),
            prompt: self.prompt.clone(),
            method: self.method,
            render: self.render,
        })
    }
}

fn interpolate<E: Representable + ?Sized>(template: &str, entity: &E) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unterminated placeholder in '{template}'"))?;
        let name = &after[..end];
        let value = entity
            .field_value(name)
            .ok_or_else(|| format!("no value for placeholder '{name}' in '{template}'"))?;
        out.push_str(&urlencoding::encode(&value.to_string()));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTarget {
    pub href: String,
    pub rel: String,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateTarget {
    pub href: String,
    pub method: Method,
    pub prompt: Option<String>,
}

/// Everything the representor needs besides the entities themselves.
///
/// `query` and `template` are only set when the caller permits them; leaving
/// `template` unset is how a list without creation rights is expressed.
#[derive(Debug, Clone)]
pub struct DocumentSpec<'a> {
    pub href: String,
    pub title: String,
    pub display: &'a Catalog,
    pub query: Option<(&'a Catalog, QueryTarget)>,
    pub template: Option<(&'a Catalog, TemplateTarget)>,
    pub links: Vec<LinkDescriptor>,
    pub item_actions: Vec<ActionTemplate>,
}

impl<'a> DocumentSpec<'a> {
    pub fn new(href: impl Into<String>, title: impl Into<String>, display: &'a Catalog) -> Self {
        Self {
            href: href.into(),
            title: title.into(),
            display,
            query: None,
            template: None,
            links: Vec::new(),
            item_actions: Vec::new(),
        }
    }

    pub fn query(mut self, catalog: &'a Catalog, target: QueryTarget) -> Self {
        self.query = Some((catalog, target));
        self
    }

    pub fn template(mut self, catalog: &'a Catalog, target: TemplateTarget) -> Self {
        self.template = Some((catalog, target));
        self
    }

    pub fn link(mut self, link: LinkDescriptor) -> Self {
        self.links.push(link);
        self
    }

    pub fn item_action(mut self, action: ActionTemplate) -> Self {
        self.item_actions.push(action);
        self
    }

    fn check(&self) -> Result<(), RepresentationError> {
        let entity_type = self.display.entity_type();
        expect_context(self.display, CatalogContext::Display, entity_type)?;
        if let Some((catalog, _)) = &self.query {
            expect_context(catalog, CatalogContext::Query, entity_type)?;
        }
        if let Some((catalog, _)) = &self.template {
            expect_context(catalog, CatalogContext::Template, entity_type)?;
        }
        unique_rels(self.links.iter().map(|l| l.rel.as_str()))?;
        unique_rels(self.item_actions.iter().map(|a| a.rel.as_str()))?;
        Ok(())
    }
}

fn expect_context(
    catalog: &Catalog,
    context: CatalogContext,
    entity_type: &str,
) -> Result<(), RepresentationError> {
    if catalog.context() != context {
        return Err(RepresentationError::CatalogMismatch {
            entity_type: catalog.entity_type().to_string(),
            field: "*".to_string(),
            reason: format!(
                "expected a {} catalog, got {}",
                context.as_str(),
                catalog.context().as_str()
            ),
        });
    }
    if catalog.entity_type() != entity_type {
        return Err(RepresentationError::CatalogMismatch {
            entity_type: entity_type.to_string(),
            field: "*".to_string(),
            reason: format!(
                "{} catalog belongs to {}",
                context.as_str(),
                catalog.entity_type()
            ),
        });
    }
    Ok(())
}

fn unique_rels<'r>(rels: impl Iterator<Item = &'r str>) -> Result<(), RepresentationError> {
    let mut seen = HashSet::new();
    for rel in rels {
        if !seen.insert(rel) {
            return Err(RepresentationError::DuplicateRel(rel.to_string()));
        }
    }
    Ok(())
}

fn mismatch(catalog: &Catalog, field: &FieldDescriptor, reason: impl Into<String>) -> RepresentationError {
    RepresentationError::CatalogMismatch {
        entity_type: catalog.entity_type().to_string(),
        field: field.name().to_string(),
        reason: reason.into(),
    }
}

fn item<E, R>(spec: &DocumentSpec<'_>, entity: &E, resolver: &R) -> Result<ItemDescriptor, RepresentationError>
where
    E: Representable + ?Sized,
    R: HrefResolver<E> + ?Sized,
{
    let entity_type = spec.display.entity_type();
    let href = resolver
        .resolve(entity)
        .ok_or_else(|| RepresentationError::MissingHrefResolver {
            entity_type: entity_type.to_string(),
            detail: "resolver returned no href for entity".to_string(),
        })?;

    let mut data = Vec::with_capacity(spec.display.len());
    for field in spec.display.fields() {
        let value = entity.field_value(field.name());
        if value.is_none() && field.required() {
            return Err(mismatch(spec.display, field, "required display field has no value"));
        }
        let filled = field
            .with_value(value)
            .map_err(|e| mismatch(spec.display, field, e.to_string()))?;
        data.push(filled);
    }

    let mut links = Vec::new();
    for action in spec.item_actions.iter().filter(|a| entity.permits(&a.rel)) {
        let link = action
            .expand(entity)
            .map_err(|detail| RepresentationError::MissingHrefResolver {
                entity_type: entity_type.to_string(),
                detail,
            })?;
        links.push(link);
    }

    Ok(ItemDescriptor { href, data, links })
}

fn template_descriptor<E>(
    catalog: &Catalog,
    target: &TemplateTarget,
    entity: Option<&E>,
) -> Result<TemplateDescriptor, RepresentationError>
where
    E: Representable + ?Sized,
{
    let mut data = Vec::with_capacity(catalog.len());
    for field in catalog.fields() {
        let filled = match entity.and_then(|e| e.field_value(field.name())) {
            Some(value) => field
                .with_value(Some(value))
                .map_err(|e| mismatch(catalog, field, e.to_string()))?,
            None => field.clone(),
        };
        data.push(filled);
    }
    Ok(TemplateDescriptor {
        href: target.href.clone(),
        method: target.method,
        prompt: target.prompt.clone(),
        data,
    })
}

/// List shape: one item per entity, plus the query and template when given.
pub fn represent_list<E, R>(
    spec: &DocumentSpec<'_>,
    entities: &[E],
    resolver: &R,
) -> Result<CollectionDocument, RepresentationError>
where
    E: Representable,
    R: HrefResolver<E> + ?Sized,
{
    spec.check()?;

    let items = entities
        .iter()
        .map(|entity| item(spec, entity, resolver))
        .collect::<Result<Vec<_>, _>>()?;

    let queries = match &spec.query {
        Some((catalog, target)) => vec![QueryDescriptor {
            href: target.href.clone(),
            rel: target.rel.clone(),
            prompt: target.prompt.clone(),
            method: Method::Get,
            data: catalog.fields().to_vec(),
        }],
        None => Vec::new(),
    };

    let templates = match &spec.template {
        Some((catalog, target)) => vec![template_descriptor::<E>(catalog, target, None)?],
        None => Vec::new(),
    };

    log::debug!(
        "Represented {} list with {} items",
        spec.display.entity_type(),
        items.len()
    );

    Ok(CollectionDocument {
        href: spec.href.clone(),
        title: spec.title.clone(),
        links: spec.links.clone(),
        items,
        queries,
        templates,
    })
}

/// Single shape: exactly one item and no query. The template, when given,
/// carries the entity's current values.
pub fn represent_single<E, R>(
    spec: &DocumentSpec<'_>,
    entity: &E,
    resolver: &R,
) -> Result<CollectionDocument, RepresentationError>
where
    E: Representable + ?Sized,
    R: HrefResolver<E> + ?Sized,
{
    spec.check()?;

    let item = item(spec, entity, resolver)?;
    let templates = match &spec.template {
        Some((catalog, target)) => vec![template_descriptor(catalog, target, Some(entity))?],
        None => Vec::new(),
    };

    Ok(CollectionDocument {
        href: spec.href.clone(),
        title: spec.title.clone(),
        links: spec.links.clone(),
        items: vec![item],
        queries: Vec::new(),
        templates,
    })
}
