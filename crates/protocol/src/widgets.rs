use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PLOT_SCALAR_KEY: &str = "plot_scalar";
pub const THREE_D_VIEW_KEY: &str = "3d_view";

/// A 2D line/scatter series of `(x, y)` samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotScalarData {
    pub data_x: Vec<(f64, f64)>,
}

impl PlotScalarData {
    pub fn new(data_x: Vec<(f64, f64)>) -> Self {
        Self { data_x }
    }

    /// Build a series by zipping separate x and y columns. Extra values in
    /// the longer column are ignored.
    pub fn from_xy(xs: &[f64], ys: &[f64]) -> Self {
        Self {
            data_x: xs.iter().copied().zip(ys.iter().copied()).collect(),
        }
    }

    pub fn push(&mut self, x: f64, y: f64) {
        self.data_x.push((x, y));
    }

    pub fn len(&self) -> usize {
        self.data_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_x.is_empty()
    }

    /// `(min, max)` of the y values, `None` for an empty series.
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        self.data_x.iter().fold(None, |acc, &(_, y)| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThreeDPrimitive {
    Point(Vec<(f64, f64, f64)>),
}

impl ThreeDPrimitive {
    pub fn point_count(&self) -> usize {
        match self {
            ThreeDPrimitive::Point(points) => points.len(),
        }
    }
}

/// An animated 3D scene: one primitive per timestamp, in playback order.
///
/// The wire name `primatives` is kept as-is for compatibility with existing
/// producers and recordings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreeDViewData {
    #[serde(rename = "primatives")]
    pub primitives: Vec<(f64, ThreeDPrimitive)>,
}

impl ThreeDViewData {
    pub fn push_points(&mut self, time: f64, points: Vec<(f64, f64, f64)>) {
        self.primitives.push((time, ThreeDPrimitive::Point(points)));
    }

    /// Time between the first and last frame.
    pub fn duration(&self) -> f64 {
        match (self.primitives.first(), self.primitives.last()) {
            (Some((start, _)), Some((end, _))) => end - start,
            _ => 0.0,
        }
    }

    /// The latest frame whose timestamp is at or before `time`. Before the
    /// first frame this returns the first frame.
    pub fn frame_at(&self, time: f64) -> Option<&ThreeDPrimitive> {
        let first = self.primitives.first()?;
        let frame = self
            .primitives
            .iter()
            .take_while(|(t, _)| *t <= time)
            .last()
            .unwrap_or(first);
        Some(&frame.1)
    }
}

/// A single renderable item within a [`Viz`](crate::Viz).
///
/// Decoding never fails: a widget object without a recognized key, or whose
/// recognized payload does not have the expected shape, becomes
/// [`Widget::Unknown`] and keeps the raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    ScalarPlot(PlotScalarData),
    ThreeDView(ThreeDViewData),
    Unknown(Value),
}

impl Widget {
    pub fn from_value(value: Value) -> Self {
        if let Some(payload) = value.get(PLOT_SCALAR_KEY)
            && let Ok(data) = PlotScalarData::deserialize(payload)
        {
            return Widget::ScalarPlot(data);
        }
        if let Some(payload) = value.get(THREE_D_VIEW_KEY)
            && let Ok(data) = ThreeDViewData::deserialize(payload)
        {
            return Widget::ThreeDView(data);
        }
        Widget::Unknown(value)
    }

    /// Short label used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Widget::ScalarPlot(_) => PLOT_SCALAR_KEY,
            Widget::ThreeDView(_) => THREE_D_VIEW_KEY,
            Widget::Unknown(_) => "unknown",
        }
    }

    pub fn as_scalar_plot(&self) -> Option<&PlotScalarData> {
        match self {
            Widget::ScalarPlot(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_three_d_view(&self) -> Option<&ThreeDViewData> {
        match self {
            Widget::ThreeDView(data) => Some(data),
            _ => None,
        }
    }
}

impl Serialize for Widget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Widget::ScalarPlot(data) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(PLOT_SCALAR_KEY, data)?;
                map.end()
            }
            Widget::ThreeDView(data) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(THREE_D_VIEW_KEY, data)?;
                map.end()
            }
            Widget::Unknown(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Widget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Widget::from_value)
    }
}
