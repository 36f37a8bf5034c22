use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::reply::{ColumnLayout, PreviewWidget};

/// Widget ids in the order the single preview column shows them.
pub const PREVIEW_COLUMN: &[&str] =
    &["image", "header", "summary", "content", "actions"];

/// What the host tells us about the preview request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionMetadata {
    #[serde(default)]
    pub hints: Map<String, Value>,
    /// Opaque data the host attaches on behalf of the scope.
    #[serde(default)]
    pub scope_data: Option<String>,
}

pub fn preview_layout() -> ColumnLayout {
    let mut layout = ColumnLayout::new();
    layout.add_column(PREVIEW_COLUMN);
    layout
}

/// Widgets for a selected result. Attribute mappings refer to the result
/// record fields the formatter fills in.
pub fn preview_widgets(metadata: &ActionMetadata) -> Vec<PreviewWidget> {
    let mut image = PreviewWidget::new("image", "image");
    image.add_attribute_mapping("source", "art");

    let mut header = PreviewWidget::new("header", "header");
    header.add_attribute_mapping("title", "title");
    header.add_attribute_mapping("text", "short_summary");

    let mut summary = PreviewWidget::new("summary", "text");
    summary.add_attribute_mapping("text", "summary");

    let mut content = PreviewWidget::new("content", "text");
    content.add_attribute_mapping("text", "text_content");

    let mut actions = PreviewWidget::new("actions", "actions");
    actions.add_attribute_value(
        "actions",
        json!([
            { "id": "copy", "label": "Copy" },
            { "id": "download", "label": "Download" },
        ]),
    );

    let mut widgets = vec![header, image, summary, content, actions];

    if let Some(data) = metadata.scope_data.as_deref()
        && !data.is_empty()
    {
        let mut extra = PreviewWidget::new("extra", "text");
        extra.add_attribute_value("text", Value::String(data.to_string()));
        widgets.push(extra);
    }

    widgets
}
