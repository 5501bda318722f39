//! Canvas surface: live graphical objects and direct-manipulation events.
//!
//! This is the headless stand-in for the drawing surface. Objects are kept in
//! paint order (back to front). Interactions that the user would perform with
//! the mouse (drag, resize, freehand strokes) go through the methods here and
//! leave a [`SurfaceEvent`] behind, which the editor drains with
//! [`CanvasSurface::poll_events`] and feeds to the synchronizer.

use crate::layer::LayerId;
use kurbo::{Point, Rect, Size};
use thiserror::Error;

/// Average glyph advance as a fraction of the font size.
pub const TEXT_ADVANCE_RATIO: f64 = 0.5;
/// Line height as a fraction of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.16;

/// Surface-local identifier of a live object.
pub type ObjectId = u64;

/// Measure a single line of text.
pub fn measure_text(text: &str, font_size: f64) -> Size {
    let chars = text.chars().count() as f64;
    Size::new(chars * font_size * TEXT_ADVANCE_RATIO, font_size * TEXT_LINE_HEIGHT)
}

/// Kind-specific part of a live object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Text { text: String, font_size: f64, fill: String },
    Rect { fill: String },
    Circle { radius: f64, fill: String },
    Image { src: String, source_size: Size },
    Path { points: Vec<Point>, stroke_width: f64, color: String, erase: bool },
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Text { .. } => "text",
            ObjectKind::Rect { .. } => "rect",
            ObjectKind::Circle { .. } => "circle",
            ObjectKind::Image { .. } => "image",
            ObjectKind::Path { .. } => "path",
        }
    }
}

/// A live object on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasObject {
    pub(crate) id: ObjectId,
    /// Back-reference to the layer this object represents (non-owning).
    pub layer_id: Option<LayerId>,
    /// Top-left corner.
    pub position: Point,
    /// Unscaled width.
    pub width: f64,
    /// Unscaled height.
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub opacity: f64,
    pub visible: bool,
    pub kind: ObjectKind,
}

impl CanvasObject {
    /// Create an unscaled, visible, opaque object.
    pub fn new(kind: ObjectKind, position: Point, width: f64, height: f64) -> Self {
        Self {
            id: 0,
            layer_id: None,
            position,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            visible: true,
            kind,
        }
    }

    /// Text object sized from its content.
    pub fn text(text: impl Into<String>, font_size: f64, fill: impl Into<String>, position: Point) -> Self {
        let text = text.into();
        let size = measure_text(&text, font_size);
        Self::new(
            ObjectKind::Text { text, font_size, fill: fill.into() },
            position,
            size.width,
            size.height,
        )
    }

    pub fn rect(fill: impl Into<String>, position: Point, width: f64, height: f64) -> Self {
        Self::new(ObjectKind::Rect { fill: fill.into() }, position, width, height)
    }

    pub fn circle(fill: impl Into<String>, position: Point, radius: f64) -> Self {
        Self::new(
            ObjectKind::Circle { radius, fill: fill.into() },
            position,
            radius * 2.0,
            radius * 2.0,
        )
    }

    pub fn image(src: impl Into<String>, source_size: Size, position: Point) -> Self {
        Self::new(
            ObjectKind::Image { src: src.into(), source_size },
            position,
            source_size.width,
            source_size.height,
        )
    }

    /// Path object whose bounds enclose all points (stroke width included).
    pub fn path(points: Vec<Point>, stroke_width: f64, color: impl Into<String>, erase: bool) -> Self {
        let bounds = path_bounds(&points, stroke_width);
        Self::new(
            ObjectKind::Path { points, stroke_width, color: color.into(), erase },
            bounds.origin(),
            bounds.width(),
            bounds.height(),
        )
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn with_layer(mut self, layer_id: LayerId) -> Self {
        self.layer_id = Some(layer_id);
        self
    }

    /// Displayed width (`width * scale_x`).
    pub fn scaled_width(&self) -> f64 {
        self.width * self.scale_x
    }

    /// Displayed height (`height * scale_y`).
    pub fn scaled_height(&self) -> f64 {
        self.height * self.scale_y
    }

    /// Scale so that the displayed size becomes `width` x `height`.
    /// Zero intrinsic dimensions keep a scale of 1.
    pub fn fit_to(&mut self, width: f64, height: f64) {
        self.scale_x = if self.width > 0.0 { width / self.width } else { 1.0 };
        self.scale_y = if self.height > 0.0 { height / self.height } else { 1.0 };
    }

    /// Bounding box in project space.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, Size::new(self.scaled_width(), self.scaled_height()))
    }
}

fn path_bounds(points: &[Point], stroke_width: f64) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    let rect = points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p));
    rect.inflate(stroke_width / 2.0, stroke_width / 2.0)
}

/// Freehand stroke mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrushMode {
    #[default]
    Paint,
    Erase,
}

/// Active freehand brush.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub width: f64,
    pub color: String,
    pub mode: BrushMode,
}

impl Default for Brush {
    fn default() -> Self {
        Self { width: 10.0, color: "#000000".to_string(), mode: BrushMode::Paint }
    }
}

/// Something that happened on the surface as a result of direct manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// An object was moved, resized or had its opacity changed.
    ObjectModified(ObjectId),
    /// A freehand stroke was finished and added as a path object.
    PathCreated(ObjectId),
}

/// Surface errors.
#[derive(Debug, Error, PartialEq)]
pub enum SurfaceError {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),
    #[error("Drawing mode is off")]
    NotDrawing,
    #[error("No stroke in progress")]
    NoStroke,
}

/// Result type for surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// The drawing surface.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    size: Size,
    background_color: String,
    objects: Vec<CanvasObject>,
    next_id: ObjectId,
    drawing_mode: bool,
    brush: Brush,
    zoom: f64,
    stroke: Option<Vec<Point>>,
    events: Vec<SurfaceEvent>,
}

impl Default for CanvasSurface {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

impl CanvasSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Size::new(width, height),
            background_color: "#ffffff".to_string(),
            objects: Vec::new(),
            next_id: 1,
            drawing_mode: false,
            brush: Brush::default(),
            zoom: 1.0,
            stroke: None,
            events: Vec::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.size = Size::new(width, height);
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.background_color = color.into();
    }

    /// Remove every object, any stroke in progress and pending events.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.stroke = None;
        self.events.clear();
    }

    /// Add an object on top and return its id.
    pub fn add(&mut self, object: CanvasObject) -> ObjectId {
        let index = self.objects.len();
        self.insert(index, object)
    }

    /// Insert an object at a paint position (clamped) and return its id.
    pub fn insert(&mut self, index: usize, mut object: CanvasObject) -> ObjectId {
        object.id = self.next_id;
        self.next_id += 1;
        let index = index.min(self.objects.len());
        let id = object.id;
        self.objects.insert(index, object);
        id
    }

    /// Remove an object, returning its former paint position and value.
    pub fn remove(&mut self, id: ObjectId) -> Option<(usize, CanvasObject)> {
        let index = self.index_of(id)?;
        Some((index, self.objects.remove(index)))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects back to front.
    pub fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&CanvasObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut CanvasObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    /// The live object tagged with `layer_id`, if any.
    pub fn find_by_layer(&self, layer_id: &LayerId) -> Option<&CanvasObject> {
        self.objects.iter().find(|o| o.layer_id.as_ref() == Some(layer_id))
    }

    pub fn find_by_layer_mut(&mut self, layer_id: &LayerId) -> Option<&mut CanvasObject> {
        self.objects.iter_mut().find(|o| o.layer_id.as_ref() == Some(layer_id))
    }

    /// Topmost visible object under `point` (project space).
    pub fn object_at(&self, point: Point) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.visible && o.bounds().contains(point))
            .map(|o| o.id)
    }

    // --- Direct manipulation ---

    /// Move an object's top-left corner.
    pub fn move_object(&mut self, id: ObjectId, to: Point) -> SurfaceResult<()> {
        let object = self.object_mut(id).ok_or(SurfaceError::ObjectNotFound(id))?;
        object.position = to;
        self.events.push(SurfaceEvent::ObjectModified(id));
        Ok(())
    }

    /// Set an object's scale factors.
    pub fn scale_object(&mut self, id: ObjectId, scale_x: f64, scale_y: f64) -> SurfaceResult<()> {
        let object = self.object_mut(id).ok_or(SurfaceError::ObjectNotFound(id))?;
        object.scale_x = scale_x;
        object.scale_y = scale_y;
        self.events.push(SurfaceEvent::ObjectModified(id));
        Ok(())
    }

    /// Change an object's opacity (clamped to [0, 1]).
    pub fn set_object_opacity(&mut self, id: ObjectId, opacity: f64) -> SurfaceResult<()> {
        let object = self.object_mut(id).ok_or(SurfaceError::ObjectNotFound(id))?;
        object.opacity = opacity.clamp(0.0, 1.0);
        self.events.push(SurfaceEvent::ObjectModified(id));
        Ok(())
    }

    // --- Freehand drawing ---

    pub fn is_drawing_mode(&self) -> bool {
        self.drawing_mode
    }

    /// Turn freehand drawing on or off. Turning it off drops any open stroke.
    pub fn set_drawing_mode(&mut self, enabled: bool) {
        self.drawing_mode = enabled;
        if !enabled {
            self.stroke = None;
        }
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    pub fn begin_stroke(&mut self, point: Point) -> SurfaceResult<()> {
        if !self.drawing_mode {
            return Err(SurfaceError::NotDrawing);
        }
        self.stroke = Some(vec![point]);
        Ok(())
    }

    pub fn extend_stroke(&mut self, point: Point) -> SurfaceResult<()> {
        let stroke = self.stroke.as_mut().ok_or(SurfaceError::NoStroke)?;
        stroke.push(point);
        Ok(())
    }

    /// Finish the stroke, adding it as a path object drawn with the active brush.
    pub fn end_stroke(&mut self) -> SurfaceResult<ObjectId> {
        let points = self.stroke.take().ok_or(SurfaceError::NoStroke)?;
        let brush = self.brush.clone();
        let path = CanvasObject::path(points, brush.width, brush.color, brush.mode == BrushMode::Erase);
        let id = self.add(path);
        self.events.push(SurfaceEvent::PathCreated(id));
        Ok(id)
    }

    // --- View ---

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Drain pending surface events in the order they happened.
    pub fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }
}
