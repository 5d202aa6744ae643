use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::widgets::Widget;

/// One named unit of visualization data.
///
/// `range` is carried as raw JSON: producers send either `null` or a
/// `[min, max]` pair, and the client never rejects a record over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viz {
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub range: Option<Value>,
}

impl Viz {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            widgets: Vec::new(),
            range: None,
        }
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }

    pub fn add_widget(&mut self, widget: Widget) {
        self.widgets.push(widget);
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    pub fn set_range(&mut self, min: f64, max: f64) {
        self.range = Some(Value::from(vec![min, max]));
    }

    /// Interpret `range` as `(min, max)`. Accepts `[min, max]` and
    /// `{"min": .., "max": ..}`; anything else yields `None`.
    pub fn range_bounds(&self) -> Option<(f64, f64)> {
        match self.range.as_ref()? {
            Value::Array(items) if items.len() == 2 => {
                Some((items[0].as_f64()?, items[1].as_f64()?))
            }
            Value::Object(map) => Some((map.get("min")?.as_f64()?, map.get("max")?.as_f64()?)),
            _ => None,
        }
    }

    /// Comma-separated widget kinds, e.g. `plot_scalar, 3d_view`.
    pub fn widget_summary(&self) -> String {
        self.widgets
            .iter()
            .map(Widget::kind)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
