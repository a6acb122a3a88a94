use askama::Template;

use crate::hypermedia::CollectionDocument;

use super::PageContext;

/// Any number of hypermedia documents rendered one after another. The first
/// document supplies the page title.
#[derive(Template)]
#[template(path = "collection.html")]
pub struct CollectionPage {
    pub ctx: PageContext,
    pub docs: Vec<CollectionDocument>,
    pub errors: Vec<String>,
}

impl CollectionPage {
    pub fn new(ctx: PageContext, docs: Vec<CollectionDocument>) -> Self {
        Self { ctx, docs, errors: Vec::new() }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn title(&self) -> &str {
        self.docs.first().map(|d| d.title.as_str()).unwrap_or("")
    }
}
