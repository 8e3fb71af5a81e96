//! Generic detector driven by URL templates and evidence trees.

use crate::checks::core::ProbeResponse;

use super::evidence::{Evidence, HANDLE_PLACEHOLDER};
use super::{Detector, Precedence};

/// Detector for platforms whose verdict is a pure function of the response.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    key: String,
    name: String,
    url_templates: Vec<String>,
    profile_template: Option<String>,
    found: Evidence,
    not_found: Evidence,
    precedence: Precedence,
}

impl MarkerDetector {
    pub fn builder(key: impl Into<String>, name: impl Into<String>) -> MarkerDetectorBuilder {
        MarkerDetectorBuilder::new(key, name)
    }

    pub fn url_templates(&self) -> &[String] {
        &self.url_templates
    }
}

fn fill(template: &str, handle: &str) -> String {
    template.replace(HANDLE_PLACEHOLDER, handle)
}

impl Detector for MarkerDetector {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn urls(&self, handle: &str) -> Vec<String> {
        self.url_templates
            .iter()
            .map(|template| fill(template, handle))
            .collect()
    }

    fn detect_found(&self, response: &ProbeResponse, handle: &str) -> bool {
        self.found.matches(response, handle)
    }

    fn detect_not_found(&self, response: &ProbeResponse, handle: &str) -> bool {
        self.not_found.matches(response, handle)
    }

    fn profile_url(&self, handle: &str) -> String {
        match &self.profile_template {
            Some(template) => fill(template, handle),
            None => self
                .url_templates
                .first()
                .map(|template| fill(template, handle))
                .unwrap_or_default(),
        }
    }

    fn precedence(&self) -> Precedence {
        self.precedence
    }
}

/// Builder for [`MarkerDetector`]. Without explicit evidence a response is
/// found on 200 and not found on 404.
#[derive(Debug, Clone)]
pub struct MarkerDetectorBuilder {
    key: String,
    name: String,
    url_templates: Vec<String>,
    profile_template: Option<String>,
    found: Option<Evidence>,
    not_found: Option<Evidence>,
    precedence: Precedence,
}

impl MarkerDetectorBuilder {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            url_templates: Vec::new(),
            profile_template: None,
            found: None,
            not_found: None,
            precedence: Precedence::NotFoundFirst,
        }
    }

    /// Appends a candidate URL template containing `{handle}`.
    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url_templates.push(template.into());
        self
    }

    pub fn urls<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_templates.extend(templates.into_iter().map(Into::into));
        self
    }

    pub fn profile_url(mut self, template: impl Into<String>) -> Self {
        self.profile_template = Some(template.into());
        self
    }

    pub fn found(mut self, evidence: Evidence) -> Self {
        self.found = Some(evidence);
        self
    }

    pub fn not_found(mut self, evidence: Evidence) -> Self {
        self.not_found = Some(evidence);
        self
    }

    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn build(self) -> MarkerDetector {
        MarkerDetector {
            key: self.key.to_lowercase(),
            name: self.name,
            url_templates: self.url_templates,
            profile_template: self.profile_template,
            found: self.found.unwrap_or(Evidence::Status(200)),
            not_found: self.not_found.unwrap_or(Evidence::Status(404)),
            precedence: self.precedence,
        }
    }
}
