//! In-memory resource graph.
//!
//! A [`ResourceGraph`] is what a template is rendered from: typed resources
//! keyed by logical id, outputs, and the set of export names the graph imports
//! from other stacks. References between resources are [`Expr`] values and are
//! checked by [`ResourceGraph::validate`] before rendering.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use super::exports::ExportName;
use super::resources::ResourceKind;
use crate::utils::error::{DeployError, Result};

/// Pseudo parameter resolved by CloudFormation to the stack's region.
pub const PSEUDO_REGION: &str = "AWS::Region";
/// Pseudo parameter resolved by CloudFormation to the stack's name.
pub const PSEUDO_STACK_NAME: &str = "AWS::StackName";

/// A property value: either a literal or a CloudFormation intrinsic.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(serde_json::Value),
    /// `Ref` to a logical id or pseudo parameter.
    Ref(String),
    /// `Fn::GetAtt` of a resource attribute.
    GetAtt(String, String),
    /// `Fn::ImportValue` of another stack's export.
    ImportValue(ExportName),
    /// `Fn::Sub` with `${...}` placeholders.
    Sub(String),
    /// The n-th availability zone of the stack's region.
    SelectAz(u32),
}

impl Expr {
    pub fn str(value: impl Into<String>) -> Self {
        Expr::Literal(serde_json::Value::String(value.into()))
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Expr::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt(logical_id.into(), attribute.into())
    }

    pub fn region() -> Self {
        Expr::Ref(PSEUDO_REGION.to_string())
    }

    pub fn stack_name() -> Self {
        Expr::Ref(PSEUDO_STACK_NAME.to_string())
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::str(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::str(value)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Expr::Literal(value) => value.serialize(serializer),
            Expr::Ref(id) => single_entry(serializer, "Ref", id),
            Expr::GetAtt(id, attribute) => {
                single_entry(serializer, "Fn::GetAtt", &[id.as_str(), attribute.as_str()])
            }
            Expr::ImportValue(name) => single_entry(serializer, "Fn::ImportValue", name),
            Expr::Sub(template) => single_entry(serializer, "Fn::Sub", template),
            Expr::SelectAz(index) => single_entry(serializer, "Fn::Select", &SelectAz(*index)),
        }
    }
}

struct SelectAz(u32);

impl Serialize for SelectAz {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.0.to_string())?;
        seq.serialize_element(&serde_json::json!({ "Fn::GetAZs": "" }))?;
        seq.end()
    }
}

fn single_entry<S: Serializer, V: Serialize + ?Sized>(
    serializer: S,
    key: &str,
    value: &V,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

/// A declared resource: its typed properties plus explicit ordering hints.
#[derive(Debug, Clone)]
pub struct Resource {
    kind: ResourceKind,
    depends_on: Vec<String>,
}

impl Resource {
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// Adds explicit `DependsOn` entries, keeping declaration order.
    pub fn depends_on<I, S>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.depends_on.contains(&id) {
                self.depends_on.push(id);
            }
        }
        self
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = if self.depends_on.is_empty() { 2 } else { 3 };
        let mut map = serializer.serialize_map(Some(entries))?;
        map.serialize_entry("Type", self.kind.type_name())?;
        map.serialize_entry("Properties", &self.kind)?;
        if !self.depends_on.is_empty() {
            map.serialize_entry("DependsOn", &self.depends_on)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Export {
    #[serde(rename = "Name")]
    pub name: ExportName,
}

/// A template output, optionally exported for other stacks.
#[derive(Debug, Clone, Serialize)]
pub struct Output {
    #[serde(rename = "Value")]
    pub value: Expr,
    #[serde(rename = "Export", skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

impl Output {
    pub fn exported(value: Expr, name: ExportName) -> Self {
        Self {
            value,
            export: Some(Export { name }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceGraph {
    name: String,
    description: Option<String>,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
    imports: BTreeSet<ExportName>,
}

impl ResourceGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            imports: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    pub fn imports(&self) -> &BTreeSet<ExportName> {
        &self.imports
    }

    /// Names this graph makes available to other stacks.
    pub fn exports(&self) -> BTreeSet<ExportName> {
        self.outputs
            .values()
            .filter_map(|output| output.export.as_ref().map(|e| e.name.clone()))
            .collect()
    }

    /// Declares a resource under a new logical id.
    pub fn declare(
        &mut self,
        logical_id: impl Into<String>,
        kind: impl Into<ResourceKind>,
    ) -> Result<&mut Resource> {
        let logical_id = logical_id.into();
        if logical_id.is_empty() || !logical_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DeployError::InvalidLogicalId {
                graph: self.name.clone(),
                logical_id,
            });
        }
        if self.resources.contains_key(&logical_id) {
            return Err(DeployError::DuplicateResource {
                graph: self.name.clone(),
                logical_id,
            });
        }
        let resource = Resource {
            kind: kind.into(),
            depends_on: Vec::new(),
        };
        Ok(self.resources.entry(logical_id).or_insert(resource))
    }

    /// Records an import and returns the expression reading it.
    pub fn import(&mut self, name: ExportName) -> Expr {
        self.imports.insert(name.clone());
        Expr::ImportValue(name)
    }

    pub fn add_output(&mut self, output_id: impl Into<String>, output: Output) {
        self.outputs.insert(output_id.into(), output);
    }

    /// Checks that every reference resolves inside this graph or to a declared import.
    pub fn validate(&self) -> Result<()> {
        for (id, resource) in &self.resources {
            let value = serde_json::to_value(resource)?;
            self.check_references(id, &value)?;
        }
        for (id, output) in &self.outputs {
            let value = serde_json::to_value(output)?;
            self.check_references(id, &value)?;
        }
        Ok(())
    }

    fn check_references(&self, owner: &str, value: &serde_json::Value) -> Result<()> {
        for reference in collect_references(value) {
            let resolved = match &reference {
                Reference::Ref(target) => {
                    target.starts_with("AWS::") || self.resources.contains_key(target)
                }
                Reference::GetAtt(target) | Reference::DependsOn(target) => {
                    self.resources.contains_key(target)
                }
                Reference::Import(name) => self.imports.iter().any(|i| i.as_str() == name),
            };
            if !resolved {
                return Err(DeployError::DanglingReference {
                    graph: self.name.clone(),
                    resource: owner.to_string(),
                    target: reference.target().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A reference found in a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reference {
    Ref(String),
    GetAtt(String),
    Import(String),
    DependsOn(String),
}

impl Reference {
    pub fn target(&self) -> &str {
        match self {
            Reference::Ref(t)
            | Reference::GetAtt(t)
            | Reference::Import(t)
            | Reference::DependsOn(t) => t,
        }
    }
}

/// Walks a template fragment and returns every reference it embeds.
pub fn collect_references(value: &serde_json::Value) -> Vec<Reference> {
    let mut found = Vec::new();
    walk(value, &mut found);
    found
}

fn walk(value: &serde_json::Value, found: &mut Vec<Reference>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                match (key.as_str(), inner) {
                    ("Ref", serde_json::Value::String(target)) => {
                        found.push(Reference::Ref(target.clone()))
                    }
                    ("Fn::GetAtt", serde_json::Value::Array(parts)) => {
                        if let Some(serde_json::Value::String(target)) = parts.first() {
                            found.push(Reference::GetAtt(target.clone()));
                        }
                    }
                    ("Fn::GetAtt", serde_json::Value::String(dotted)) => {
                        let target = dotted.split('.').next().unwrap_or_default();
                        found.push(Reference::GetAtt(target.to_string()));
                    }
                    ("Fn::ImportValue", serde_json::Value::String(name)) => {
                        found.push(Reference::Import(name.clone()))
                    }
                    ("DependsOn", serde_json::Value::String(target)) => {
                        found.push(Reference::DependsOn(target.clone()))
                    }
                    ("DependsOn", serde_json::Value::Array(targets)) => {
                        found.extend(
                            targets
                                .iter()
                                .filter_map(|t| t.as_str())
                                .map(|t| Reference::DependsOn(t.to_string())),
                        );
                    }
                    _ => walk(inner, found),
                }
            }
        }
        serde_json::Value::Array(items) => items.iter().for_each(|item| walk(item, found)),
        _ => {}
    }
}
