//! The seam between the scope and whatever host renders its output.
//!
//! Results, categories and preview widgets are plain data. A host adapter
//! implements [`SearchReply`] and [`PreviewReply`] to translate them into
//! its own wire format; [`CollectingReply`] keeps everything in memory.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::{department::DepartmentNode, error::Result};

/// Layout template for the search result category.
pub const SEARCH_CATEGORY_TEMPLATE: &str = r#"{
  "schema-version": 1,
  "template": {
    "category-layout": "grid",
    "card-size": "small",
    "card-layout": "horizontal"
  },
  "components": {
    "title": "title",
    "art": "art",
    "summary": "short_summary"
  }
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub template: String,
}

impl Category {
    /// The single result category, titled after the searched department.
    pub fn for_department(department_id: &str) -> Self {
        Self {
            id: "category".to_string(),
            title: department_id.to_string(),
            icon: String::new(),
            template: SEARCH_CATEGORY_TEMPLATE.to_string(),
        }
    }
}

/// One search result: a category plus named string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub category: String,
    pub attributes: BTreeMap<String, String>,
}

impl ResultRecord {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Attribute value, or `""` when unset.
    pub fn get(&self, key: &str) -> &str {
        self.attributes.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn uri(&self) -> &str {
        self.get("uri")
    }

    pub fn title(&self) -> &str {
        self.get("title")
    }
}

/// A preview widget: a typed box whose attributes are either copied from
/// the selected result (`mappings`) or given literally (`values`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewWidget {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Widget attribute name to result attribute name.
    pub mappings: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
}

impl PreviewWidget {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            mappings: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn add_attribute_mapping(&mut self, attribute: &str, field: &str) {
        self.mappings
            .insert(attribute.to_string(), field.to_string());
    }

    pub fn add_attribute_value(&mut self, attribute: &str, value: Value) {
        self.values.insert(attribute.to_string(), value);
    }

    /// Resolve mappings against `result`, with literal values taking
    /// precedence.
    pub fn resolve(&self, result: &ResultRecord) -> BTreeMap<String, Value> {
        let mut resolved: BTreeMap<String, Value> = self
            .mappings
            .iter()
            .map(|(attr, field)| {
                (attr.clone(), Value::String(result.get(field).to_string()))
            })
            .collect();
        for (attr, value) in &self.values {
            resolved.insert(attr.clone(), value.clone());
        }
        resolved
    }
}

/// Widget ids per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub columns: Vec<Vec<String>>,
}

impl ColumnLayout {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn add_column(&mut self, widget_ids: &[&str]) {
        self.columns
            .push(widget_ids.iter().map(|id| id.to_string()).collect());
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::new()
    }
}

pub trait SearchReply {
    fn register_departments(&mut self, root: DepartmentNode);

    fn register_category(&mut self, category: Category);

    fn push(&mut self, result: ResultRecord) -> Result<()>;
}

pub trait PreviewReply {
    fn register_layout(&mut self, layout: ColumnLayout);

    fn push_widgets(&mut self, widgets: Vec<PreviewWidget>) -> Result<()>;
}

/// Reply that records everything it is given.
#[derive(Debug, Default)]
pub struct CollectingReply {
    pub departments: Option<DepartmentNode>,
    pub categories: Vec<Category>,
    pub results: Vec<ResultRecord>,
    pub layouts: Vec<ColumnLayout>,
    pub widgets: Vec<PreviewWidget>,
}

impl SearchReply for CollectingReply {
    fn register_departments(&mut self, root: DepartmentNode) {
        self.departments = Some(root);
    }

    fn register_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    fn push(&mut self, result: ResultRecord) -> Result<()> {
        self.results.push(result);
        Ok(())
    }
}

impl PreviewReply for CollectingReply {
    fn register_layout(&mut self, layout: ColumnLayout) {
        self.layouts.push(layout);
    }

    fn push_widgets(&mut self, widgets: Vec<PreviewWidget>) -> Result<()> {
        self.widgets.extend(widgets);
        Ok(())
    }
}
