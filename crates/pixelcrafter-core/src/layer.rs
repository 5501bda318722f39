//! Layer records and the ordered layer store.
//!
//! A [`Layer`] is the persisted description of one piece of editable content.
//! The JSON shape matches what the backend stores:
//!
//! ```json
//! { "id": "layer_1700000000000", "name": "Text Layer", "type": "text",
//!   "visible": true, "opacity": 1.0, "x": 100, "y": 100,
//!   "width": 80, "height": 23.2, "z_index": 0,
//!   "data": { "text": "New Text", "fontSize": 20, "color": "#000000" } }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Unique identifier of a layer within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Shape sub-kind carried in a shape layer's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
}

impl ShapeKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Circle => "Circle",
        }
    }
}

fn default_text() -> String {
    "Text".to_string()
}

fn default_font_size() -> f64 {
    20.0
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f64 {
    10.0
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

/// Payload of a text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(rename = "fontSize", default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_color")]
    pub color: String,
}

/// Payload of a shape layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeData {
    pub shape: ShapeKind,
    #[serde(default = "default_color")]
    pub fill: String,
}

/// Payload of an image layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// Data URL or http(s) URL of the pixels.
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Payload of a freehand stroke layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushData {
    /// Stroke points in project space.
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "default_color")]
    pub color: String,
    /// Eraser strokes remove paint underneath instead of adding it.
    #[serde(default)]
    pub erase: bool,
}

/// Layer variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Image,
    Text,
    Shape,
    Brush,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Image => "image",
            LayerKind::Text => "text",
            LayerKind::Shape => "shape",
            LayerKind::Brush => "brush",
        }
    }
}

/// Type tag plus type-specific payload, serialized as `"type"` and `"data"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LayerContent {
    Image(ImageData),
    Text(TextData),
    Shape(ShapeData),
    Brush(BrushData),
}

impl LayerContent {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerContent::Image(_) => LayerKind::Image,
            LayerContent::Text(_) => LayerKind::Text,
            LayerContent::Shape(_) => LayerKind::Shape,
            LayerContent::Brush(_) => LayerKind::Brush,
        }
    }
}

/// One editable content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Paint order among layers, lowest first.
    #[serde(default)]
    pub z_index: i64,
    #[serde(flatten)]
    pub content: LayerContent,
}

impl Layer {
    /// Create a visible, fully opaque layer at the origin with zero size.
    pub fn new(id: LayerId, name: impl Into<String>, content: LayerContent) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            z_index: 0,
            content,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_z_index(mut self, z_index: i64) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn kind(&self) -> LayerKind {
        self.content.kind()
    }
}

/// Partial update of a layer's attributes.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub opacity: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl LayerPatch {
    pub fn visible(visible: bool) -> Self {
        Self { visible: Some(visible), ..Self::default() }
    }

    pub fn opacity(opacity: f64) -> Self {
        Self { opacity: Some(opacity), ..Self::default() }
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the set fields into `layer`. Opacity is clamped to [0, 1].
    pub fn apply(&self, layer: &mut Layer) {
        if let Some(name) = &self.name {
            layer.name = name.clone();
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
        if let Some(opacity) = self.opacity {
            layer.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(x) = self.x {
            layer.x = x;
        }
        if let Some(y) = self.y {
            layer.y = y;
        }
        if let Some(width) = self.width {
            layer.width = width;
        }
        if let Some(height) = self.height {
            layer.height = height;
        }
    }
}

/// Layer store errors.
#[derive(Debug, Error, PartialEq)]
pub enum LayerError {
    #[error("Layer already exists: {0}")]
    Duplicate(LayerId),
    #[error("Layer not found: {0}")]
    NotFound(LayerId),
    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

/// Ordered list of layer records; the source of truth for persisted state.
///
/// Ids are unique: inserting a record whose id is already present fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerStore {
    layers: Vec<Layer>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list. Records repeating an earlier id are dropped.
    pub fn replace_all(&mut self, layers: Vec<Layer>) {
        self.layers.clear();
        for layer in layers {
            if self.contains(&layer.id) {
                log::warn!("Dropping layer with duplicate id {}", layer.id);
                continue;
            }
            self.layers.push(layer);
        }
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn to_vec(&self) -> Vec<Layer> {
        self.layers.clone()
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &LayerId) -> Option<usize> {
        self.layers.iter().position(|l| &l.id == id)
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    /// Append a record (paints on top of everything before it).
    pub fn push(&mut self, layer: Layer) -> Result<(), LayerError> {
        if self.contains(&layer.id) {
            return Err(LayerError::Duplicate(layer.id));
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Insert a record at `index` (clamped to the list length).
    pub fn insert(&mut self, index: usize, layer: Layer) -> Result<(), LayerError> {
        if self.contains(&layer.id) {
            return Err(LayerError::Duplicate(layer.id));
        }
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Remove a record, returning its former index and value.
    pub fn remove(&mut self, id: &LayerId) -> Option<(usize, Layer)> {
        let index = self.position(id)?;
        Some((index, self.layers.remove(index)))
    }

    /// Replace the record with the same id, returning the previous value.
    pub fn replace(&mut self, layer: Layer) -> Result<Layer, LayerError> {
        let index = self
            .position(&layer.id)
            .ok_or_else(|| LayerError::NotFound(layer.id.clone()))?;
        Ok(std::mem::replace(&mut self.layers[index], layer))
    }

    /// Mutate one record in place, returning `(before, after)` copies.
    ///
    /// The id cannot be changed through this function.
    pub fn update<F>(&mut self, id: &LayerId, f: F) -> Option<(Layer, Layer)>
    where
        F: FnOnce(&mut Layer),
    {
        let layer = self.layers.iter_mut().find(|l| &l.id == id)?;
        let before = layer.clone();
        f(layer);
        layer.id = before.id.clone();
        Some((before, layer.clone()))
    }

    /// z-index for a layer appended on top of the current ones.
    pub fn next_z_index(&self) -> i64 {
        self.layers
            .iter()
            .map(|l| l.z_index)
            .max()
            .map_or(0, |max| max + 1)
    }
}

/// Hands out `layer_<millis>` ids that never repeat within a store.
#[derive(Debug, Clone, Default)]
pub struct LayerIdAllocator {
    last_millis: u64,
}

impl LayerIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id based on the current time.
    pub fn allocate(&mut self, store: &LayerStore) -> LayerId {
        self.allocate_at(unix_millis(), store)
    }

    /// Allocate an id for the given timestamp, bumping it forward until it is
    /// both newer than the last id issued and free in `store`.
    pub fn allocate_at(&mut self, now_millis: u64, store: &LayerStore) -> LayerId {
        let mut millis = if now_millis > self.last_millis {
            now_millis
        } else {
            self.last_millis + 1
        };
        let mut id = LayerId::new(format!("layer_{millis}"));
        while store.contains(&id) {
            millis += 1;
            id = LayerId::new(format!("layer_{millis}"));
        }
        self.last_millis = millis;
        id
    }
}
