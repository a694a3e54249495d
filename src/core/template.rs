//! Template rendering.

use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::graph::{Output, Resource, ResourceGraph};
use crate::utils::error::{DeployError, Result};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Yaml,
    Json,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Yaml => "yaml",
            TemplateFormat::Json => "json",
        }
    }
}

impl FromStr for TemplateFormat {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            "json" => Ok(TemplateFormat::Json),
            other => Err(DeployError::InvalidConfigValueError {
                field: "format".to_string(),
                value: other.to_string(),
                reason: "expected 'yaml' or 'json'".to_string(),
            }),
        }
    }
}

#[derive(Serialize)]
struct Template<'a> {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(rename = "Resources")]
    resources: &'a BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", skip_serializing_if = "no_outputs")]
    outputs: &'a BTreeMap<String, Output>,
}

fn no_outputs(outputs: &&BTreeMap<String, Output>) -> bool {
    outputs.is_empty()
}

impl<'a> From<&'a ResourceGraph> for Template<'a> {
    fn from(graph: &'a ResourceGraph) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION,
            description: graph.description(),
            resources: graph.resources(),
            outputs: graph.outputs(),
        }
    }
}

/// Validates `graph` and renders it as a template document.
pub fn render(graph: &ResourceGraph, format: TemplateFormat) -> Result<String> {
    graph.validate()?;
    let template = Template::from(graph);
    let body = match format {
        TemplateFormat::Yaml => serde_yaml::to_string(&template)?,
        TemplateFormat::Json => serde_json::to_string_pretty(&template)?,
    };
    tracing::debug!("Rendered template for {}:\n{}", graph.name(), body);
    Ok(body)
}

/// The template document as a JSON value, for inspection.
pub fn to_document(graph: &ResourceGraph) -> Result<serde_json::Value> {
    graph.validate()?;
    Ok(serde_json::to_value(Template::from(graph))?)
}
