//! Keeps layer records and live canvas objects consistent.
//!
//! The [`LayerStore`] is the source of truth for persisted state; the
//! [`CanvasSurface`] owns live geometry until a manipulation is synced back.
//! Every live object built from a record goes through [`Synchronizer::reconstruct`],
//! whether it comes from a project load, a new layer, an undo step or a remote
//! collaborator.

use crate::canvas::{CanvasObject, CanvasSurface, ObjectId, ObjectKind, measure_text};
use crate::color::is_valid_color;
use crate::history::LayerCommand;
use crate::image::{ImageError, ImageLoader};
use crate::layer::{
    BrushData, Layer, LayerContent, LayerError, LayerId, LayerIdAllocator, LayerPatch, LayerStore,
    ShapeData, ShapeKind, TextData,
};
use crate::project::Project;
use futures_util::future::join_all;
use kurbo::{Point, Size};
use std::collections::HashMap;

/// Defaults for a new text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDefaults {
    pub name: String,
    pub text: String,
    pub font_size: f64,
    pub color: String,
    pub position: Point,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            name: "Text Layer".to_string(),
            text: "New Text".to_string(),
            font_size: 20.0,
            color: "#000000".to_string(),
            position: Point::new(100.0, 100.0),
        }
    }
}

/// Defaults for a new shape layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDefaults {
    pub name: String,
    pub fill: String,
    pub position: Point,
    pub size: Size,
}

impl ShapeDefaults {
    /// Red 100x100 rectangle or green circle of radius 50, both at (100, 100).
    pub fn for_kind(kind: ShapeKind) -> Self {
        let fill = match kind {
            ShapeKind::Rectangle => "#ff0000",
            ShapeKind::Circle => "#00ff00",
        };
        Self {
            name: kind.display_name().to_string(),
            fill: fill.to_string(),
            position: Point::new(100.0, 100.0),
            size: Size::new(100.0, 100.0),
        }
    }
}

/// Outcome of loading a project onto the surface.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Layers that now have a live object.
    pub restored: usize,
    /// Image layers whose pixels could not be decoded. Their records stay in
    /// the store without a live object.
    pub missing: Vec<(LayerId, ImageError)>,
}

/// Owner of the layer store and the surface.
#[derive(Debug, Default)]
pub struct Synchronizer {
    store: LayerStore,
    surface: CanvasSurface,
    ids: LayerIdAllocator,
    /// Intrinsic pixel size of decoded images, by layer.
    images: HashMap<LayerId, Size>,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn surface(&self) -> &CanvasSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut CanvasSurface {
        &mut self.surface
    }

    pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
        self.store.get(id)
    }

    /// The live object for a layer, if it has one.
    pub fn object_for_layer(&self, id: &LayerId) -> Option<&CanvasObject> {
        self.surface.find_by_layer(id)
    }

    /// Whether an image layer's pixels have been decoded.
    pub fn has_image(&self, id: &LayerId) -> bool {
        self.images.contains_key(id)
    }

    /// Drop every record and object.
    pub fn clear(&mut self) {
        self.store.clear();
        self.surface.clear();
        self.images.clear();
    }

    /// Build the live object for a record.
    ///
    /// Returns `None` only for image layers whose pixels are not decoded.
    pub fn reconstruct(&self, layer: &Layer) -> Option<CanvasObject> {
        let position = Point::new(layer.x, layer.y);
        let mut object = match &layer.content {
            LayerContent::Text(data) => {
                CanvasObject::text(&data.text, data.font_size, &data.color, position)
            }
            LayerContent::Shape(data) => match data.shape {
                ShapeKind::Rectangle => {
                    CanvasObject::rect(&data.fill, position, layer.width, layer.height)
                }
                ShapeKind::Circle => CanvasObject::circle(&data.fill, position, layer.width / 2.0),
            },
            LayerContent::Image(data) => {
                let size = self.images.get(&layer.id)?;
                CanvasObject::image(&data.src, *size, position)
            }
            LayerContent::Brush(data) => {
                let points = data.points.iter().map(|[x, y]| Point::new(*x, *y)).collect();
                let mut path = CanvasObject::path(points, data.stroke_width, &data.color, data.erase);
                path.position = position;
                path
            }
        };
        object.fit_to(layer.width, layer.height);
        object.opacity = layer.opacity;
        object.visible = layer.visible;
        object.layer_id = Some(layer.id.clone());
        Some(object)
    }

    /// Replace the store with `project.layers` and rebuild the surface.
    ///
    /// All image layers are decoded concurrently; objects are inserted only
    /// after every decode has resolved, in `(z_index, list position)` order.
    pub async fn load<L: ImageLoader + ?Sized>(&mut self, project: &Project, loader: &L) -> LoadReport {
        self.clear();
        self.surface.set_size(project.width as f64, project.height as f64);
        self.surface.set_background_color(&project.background_color);
        self.store.replace_all(project.layers.clone());

        let pending: Vec<(LayerId, String)> = self
            .store
            .iter()
            .filter_map(|layer| match &layer.content {
                LayerContent::Image(data) => Some((layer.id.clone(), data.src.clone())),
                _ => None,
            })
            .collect();
        let decoded = join_all(pending.iter().map(|(_, src)| loader.load(src))).await;

        let mut report = LoadReport::default();
        for ((id, _), result) in pending.into_iter().zip(decoded) {
            match result {
                Ok(image) => {
                    self.images
                        .insert(id, Size::new(image.width as f64, image.height as f64));
                }
                Err(e) => {
                    log::warn!("Could not load image for layer {}: {}", id, e);
                    report.missing.push((id, e));
                }
            }
        }

        let mut order: Vec<(i64, usize)> = self
            .store
            .iter()
            .enumerate()
            .map(|(index, layer)| (layer.z_index, index))
            .collect();
        order.sort_unstable();
        for (_, index) in order {
            if let Some(object) = self.reconstruct(&self.store.layers()[index]) {
                self.surface.add(object);
                report.restored += 1;
            }
        }
        log::info!(
            "Loaded project {} ({} layers, {} live objects)",
            project.id,
            self.store.len(),
            report.restored
        );
        report
    }

    /// Paint position for a layer with `z_index`: just below the first live
    /// object whose layer sits higher.
    fn paint_index(&self, z_index: i64) -> usize {
        self.surface
            .objects()
            .iter()
            .position(|object| {
                object
                    .layer_id
                    .as_ref()
                    .and_then(|id| self.store.get(id))
                    .is_some_and(|layer| layer.z_index > z_index)
            })
            .unwrap_or(self.surface.len())
    }

    /// Build and place the live object for a record already in the store.
    fn instantiate(&mut self, layer: &Layer) -> Option<ObjectId> {
        let object = self.reconstruct(layer)?;
        let index = self.paint_index(layer.z_index);
        Some(self.surface.insert(index, object))
    }

    /// Append a freshly created record on top and give it a live object.
    fn append_new(&mut self, layer: Layer) -> Result<Layer, LayerError> {
        self.store.push(layer.clone())?;
        self.instantiate(&layer);
        Ok(layer)
    }

    /// Create a text layer and its live object. Returns the new record.
    pub fn add_text_layer(&mut self, defaults: &TextDefaults) -> Result<Layer, LayerError> {
        if !is_valid_color(&defaults.color) {
            return Err(LayerError::InvalidColor(defaults.color.clone()));
        }
        let id = self.ids.allocate(&self.store);
        let size = measure_text(&defaults.text, defaults.font_size);
        let layer = Layer::new(
            id,
            &defaults.name,
            LayerContent::Text(TextData {
                text: defaults.text.clone(),
                font_size: defaults.font_size,
                color: defaults.color.clone(),
            }),
        )
        .with_position(defaults.position.x, defaults.position.y)
        .with_size(size.width, size.height)
        .with_z_index(self.store.next_z_index());
        self.append_new(layer)
    }

    /// Create a shape layer and its live object. Returns the new record.
    pub fn add_shape_layer(&mut self, kind: ShapeKind, defaults: &ShapeDefaults) -> Result<Layer, LayerError> {
        if !is_valid_color(&defaults.fill) {
            return Err(LayerError::InvalidColor(defaults.fill.clone()));
        }
        let id = self.ids.allocate(&self.store);
        let layer = Layer::new(
            id,
            &defaults.name,
            LayerContent::Shape(ShapeData { shape: kind, fill: defaults.fill.clone() }),
        )
        .with_position(defaults.position.x, defaults.position.y)
        .with_size(defaults.size.width, defaults.size.height)
        .with_z_index(self.store.next_z_index());
        self.append_new(layer)
    }

    /// Decode an image layer's pixels and keep its intrinsic size.
    pub async fn decode_image<L: ImageLoader + ?Sized>(&mut self, layer: &Layer, loader: &L) -> Result<(), ImageError> {
        let LayerContent::Image(data) = &layer.content else {
            return Ok(());
        };
        self.images.remove(&layer.id);
        let image = loader.load(&data.src).await?;
        self.images
            .insert(layer.id.clone(), Size::new(image.width as f64, image.height as f64));
        Ok(())
    }

    /// Append an image layer returned by an upload and instantiate it once
    /// decoded. The record is kept even if decoding fails.
    pub async fn insert_image_layer<L: ImageLoader + ?Sized>(
        &mut self,
        layer: Layer,
        loader: &L,
    ) -> Result<Option<ObjectId>, LayerError> {
        if self.store.contains(&layer.id) {
            return Err(LayerError::Duplicate(layer.id));
        }
        if let Err(e) = self.decode_image(&layer, loader).await {
            log::warn!("Could not load image for layer {}: {}", layer.id, e);
        }
        self.store.push(layer.clone())?;
        Ok(self.instantiate(&layer))
    }

    /// Apply a patch to a record, then re-apply the visual properties to its
    /// live object. Returns `(before, after)`.
    pub fn update_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> Option<(Layer, Layer)> {
        let (before, after) = self.store.update(id, |layer| patch.apply(layer))?;
        if let Some(object) = self.surface.find_by_layer_mut(id) {
            object.position = Point::new(after.x, after.y);
            object.fit_to(after.width, after.height);
            object.opacity = after.opacity;
            object.visible = after.visible;
        }
        Some((before, after))
    }

    pub fn toggle_visible(&mut self, id: &LayerId) -> Option<(Layer, Layer)> {
        let visible = !self.store.get(id)?.visible;
        self.update_layer(id, &LayerPatch::visible(visible))
    }

    pub fn set_opacity(&mut self, id: &LayerId, opacity: f64) -> Option<(Layer, Layer)> {
        self.update_layer(id, &LayerPatch::opacity(opacity))
    }

    /// Copy a manipulated object's geometry and opacity into its record.
    ///
    /// No-op when the object is gone, carries no layer id, or the id has no
    /// record. Returns `(before, after)`.
    pub fn on_object_modified(&mut self, object_id: ObjectId) -> Option<(Layer, Layer)> {
        let object = self.surface.object(object_id)?;
        let layer_id = object.layer_id.clone()?;
        let (x, y) = (object.position.x, object.position.y);
        let (width, height) = (object.scaled_width(), object.scaled_height());
        let opacity = object.opacity;

        let changes = self.store.update(&layer_id, |layer| {
            layer.x = x;
            layer.y = y;
            layer.width = width;
            layer.height = height;
            layer.opacity = opacity;
        });
        if changes.is_none() {
            log::debug!("Modified object {} refers to unknown layer {}", object_id, layer_id);
        }
        changes
    }

    /// Turn a finished freehand stroke into a brush layer and tag the path.
    pub fn on_path_created(&mut self, object_id: ObjectId) -> Option<Layer> {
        let object = self.surface.object(object_id)?;
        if object.layer_id.is_some() {
            return None;
        }
        let ObjectKind::Path { points, stroke_width, color, erase } = &object.kind else {
            return None;
        };
        let name = if *erase { "Eraser Stroke" } else { "Brush Stroke" };
        let content = LayerContent::Brush(BrushData {
            points: points.iter().map(|p| [p.x, p.y]).collect(),
            stroke_width: *stroke_width,
            color: color.clone(),
            erase: *erase,
        });
        let (position, width, height) = (object.position, object.scaled_width(), object.scaled_height());

        let id = self.ids.allocate(&self.store);
        let layer = Layer::new(id.clone(), name, content)
            .with_position(position.x, position.y)
            .with_size(width, height)
            .with_z_index(self.store.next_z_index());
        self.store.push(layer.clone()).ok()?;
        if let Some(object) = self.surface.object_mut(object_id) {
            object.layer_id = Some(id);
        }
        Some(layer)
    }

    /// Remove a record and its live object. Returns the record's former index.
    pub fn remove_layer(&mut self, id: &LayerId) -> Option<(usize, Layer)> {
        let removed = self.store.remove(id)?;
        if let Some(object_id) = self.surface.find_by_layer(id).map(|o| o.id()) {
            self.surface.remove(object_id);
        }
        Some(removed)
    }

    /// Put a record back at `index` and rebuild its live object.
    pub fn restore_layer(&mut self, index: usize, layer: Layer) -> Result<Option<ObjectId>, LayerError> {
        self.store.insert(index, layer.clone())?;
        Ok(self.instantiate(&layer))
    }

    /// Replace a record (or append it if unknown) and rebuild its live object
    /// at the same paint position. Returns the previous record, if any.
    pub fn upsert_layer(&mut self, layer: Layer) -> Result<Option<Layer>, LayerError> {
        if !self.store.contains(&layer.id) {
            self.store.push(layer.clone())?;
            self.instantiate(&layer);
            return Ok(None);
        }

        let previous = self.store.replace(layer.clone())?;
        let old_index = self
            .surface
            .find_by_layer(&layer.id)
            .map(|o| o.id())
            .and_then(|object_id| self.surface.remove(object_id))
            .map(|(index, _)| index);
        if let Some(object) = self.reconstruct(&layer) {
            let index = match old_index {
                Some(index) if previous.z_index == layer.z_index => index,
                _ => self.paint_index(layer.z_index),
            };
            self.surface.insert(index, object);
        }
        Ok(Some(previous))
    }

    /// Apply a history command.
    pub fn apply(&mut self, command: &LayerCommand) -> Result<(), LayerError> {
        match command {
            LayerCommand::Add { index, layer } => self.restore_layer(*index, layer.clone()).map(|_| ()),
            LayerCommand::Remove { layer, .. } => self
                .remove_layer(&layer.id)
                .map(|_| ())
                .ok_or_else(|| LayerError::NotFound(layer.id.clone())),
            LayerCommand::Update { after, .. } => {
                if !self.store.contains(&after.id) {
                    return Err(LayerError::NotFound(after.id.clone()));
                }
                self.upsert_layer(after.clone()).map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{DecodedImage, ImageResult, SourceLoader, encode_data_url, png_bytes};
    use crate::layer::ImageData;
    use crate::storage::BoxFuture;
    use crate::testing::block_on;

    fn circle_layer(id: &str, z_index: i64) -> Layer {
        Layer::new(
            LayerId::from(id),
            "Circle",
            LayerContent::Shape(ShapeData { shape: ShapeKind::Circle, fill: "#00ff00".to_string() }),
        )
        .with_position(10.0, 20.0)
        .with_size(100.0, 100.0)
        .with_z_index(z_index)
    }

    fn image_layer(id: &str, z_index: i64, src: String) -> Layer {
        Layer::new(LayerId::from(id), "Image", LayerContent::Image(ImageData { src, filename: None }))
            .with_size(300.0, 200.0)
            .with_z_index(z_index)
    }

    /// Resolves every source after a number of polls that depends on the
    /// source, so completion order differs from request order.
    struct StaggeredLoader;

    struct Delay {
        remaining: usize,
    }

    impl std::future::Future for Delay {
        type Output = ();
        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<()> {
            if self.remaining == 0 {
                return std::task::Poll::Ready(());
            }
            self.remaining -= 1;
            cx.waker().wake_by_ref();
            std::task::Poll::Pending
        }
    }

    impl ImageLoader for StaggeredLoader {
        fn load(&self, src: &str) -> BoxFuture<'_, ImageResult<DecodedImage>> {
            let delay = if src.contains("slow") { 10 } else { 0 };
            let failing = src.contains("broken");
            Box::pin(async move {
                Delay { remaining: delay }.await;
                if failing {
                    return Err(ImageError::Decode("broken".to_string()));
                }
                Ok(DecodedImage { width: 600, height: 400 })
            })
        }
    }

    fn project(layers: Vec<Layer>) -> Project {
        let mut project = Project::new("p1", "Poster");
        project.width = 800;
        project.height = 600;
        project.layers = layers;
        project
    }

    fn layer_order(sync: &Synchronizer) -> Vec<String> {
        sync.surface()
            .objects()
            .iter()
            .map(|o| o.layer_id.as_ref().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_add_text_layer_creates_record_and_object() {
        let mut sync = Synchronizer::new();
        let layer = sync.add_text_layer(&TextDefaults::default()).unwrap();

        assert_eq!(sync.store().len(), 1);
        assert_eq!((layer.x, layer.y), (100.0, 100.0));
        assert_eq!(layer.name, "Text Layer");
        let object = sync.object_for_layer(&layer.id).unwrap();
        assert_eq!(object.scaled_width(), layer.width);
        assert!(matches!(&object.kind, ObjectKind::Text { text, .. } if text == "New Text"));
    }

    #[test]
    fn test_add_shape_layers() {
        let mut sync = Synchronizer::new();
        let rect = sync
            .add_shape_layer(ShapeKind::Rectangle, &ShapeDefaults::for_kind(ShapeKind::Rectangle))
            .unwrap();
        let circle = sync
            .add_shape_layer(ShapeKind::Circle, &ShapeDefaults::for_kind(ShapeKind::Circle))
            .unwrap();

        assert_ne!(rect.id, circle.id);
        assert_eq!(circle.z_index, rect.z_index + 1);
        let object = sync.object_for_layer(&circle.id).unwrap();
        assert!(matches!(object.kind, ObjectKind::Circle { radius, .. } if radius == 50.0));
        assert_eq!(object.scaled_width(), 100.0);
    }

    #[test]
    fn test_invalid_colors_are_rejected() {
        let mut sync = Synchronizer::new();
        let mut shape = ShapeDefaults::for_kind(ShapeKind::Rectangle);
        shape.fill = "notacolor".to_string();
        assert_eq!(
            sync.add_shape_layer(ShapeKind::Rectangle, &shape),
            Err(LayerError::InvalidColor("notacolor".to_string()))
        );

        let text = TextDefaults { color: "#12".to_string(), ..TextDefaults::default() };
        assert_eq!(sync.add_text_layer(&text), Err(LayerError::InvalidColor("#12".to_string())));

        assert!(sync.store().is_empty());
        assert!(sync.surface().is_empty());
    }

    #[test]
    fn test_object_modified_updates_only_its_record() {
        let mut sync = Synchronizer::new();
        let a = sync.add_text_layer(&TextDefaults::default()).unwrap();
        let b = sync
            .add_shape_layer(ShapeKind::Rectangle, &ShapeDefaults::for_kind(ShapeKind::Rectangle))
            .unwrap();
        let untouched = sync.layer(&b.id).unwrap().clone();

        let object_id = sync.object_for_layer(&a.id).unwrap().id();
        sync.surface_mut().move_object(object_id, Point::new(150.0, 120.0)).unwrap();
        sync.surface_mut().scale_object(object_id, 2.0, 1.0).unwrap();
        let (before, after) = sync.on_object_modified(object_id).unwrap();

        assert_eq!((before.x, before.y), (100.0, 100.0));
        assert_eq!((after.x, after.y), (150.0, 120.0));
        assert_eq!(after.width, a.width * 2.0);
        assert_eq!(sync.layer(&b.id).unwrap(), &untouched);
    }

    #[test]
    fn test_object_without_layer_is_ignored() {
        let mut sync = Synchronizer::new();
        let id = sync
            .surface_mut()
            .add(CanvasObject::rect("#000000", Point::ZERO, 5.0, 5.0));
        assert!(sync.on_object_modified(id).is_none());
    }

    #[test]
    fn test_visibility_and_opacity_reach_live_object() {
        let mut sync = Synchronizer::new();
        let layer = sync.add_text_layer(&TextDefaults::default()).unwrap();

        sync.toggle_visible(&layer.id).unwrap();
        sync.set_opacity(&layer.id, 0.4).unwrap();

        let record = sync.layer(&layer.id).unwrap();
        let object = sync.object_for_layer(&layer.id).unwrap();
        assert!(!record.visible);
        assert!(!object.visible);
        assert_eq!(record.opacity, 0.4);
        assert_eq!(object.opacity, 0.4);
    }

    #[test]
    fn test_load_restores_every_layer_type() {
        let src = encode_data_url("image/png", &png_bytes(60, 40));
        let text = Layer::new(
            LayerId::from("t"),
            "Text",
            LayerContent::Text(TextData { text: "Hi".to_string(), font_size: 20.0, color: "#000000".to_string() }),
        )
        .with_size(20.0, 23.2);
        let brush = Layer::new(
            LayerId::from("b"),
            "Brush Stroke",
            LayerContent::Brush(BrushData {
                points: vec![[0.0, 0.0], [10.0, 10.0]],
                stroke_width: 2.0,
                color: "#000000".to_string(),
                erase: false,
            }),
        )
        .with_position(-1.0, -1.0)
        .with_size(12.0, 12.0)
        .with_z_index(3);
        let layers = vec![text, circle_layer("c", 1), image_layer("i", 2, src), brush];

        let mut sync = Synchronizer::new();
        let report = block_on(sync.load(&project(layers), &SourceLoader::default()));

        assert_eq!(report.restored, 4);
        assert!(report.missing.is_empty());
        assert_eq!(sync.surface().size(), Size::new(800.0, 600.0));
        let image = sync.object_for_layer(&LayerId::from("i")).unwrap();
        assert_eq!(image.width, 60.0);
        assert_eq!(image.scaled_width(), 300.0);
        assert_eq!(image.scaled_height(), 200.0);
    }

    #[test]
    fn test_load_inserts_in_z_order_despite_decode_order() {
        let layers = vec![
            image_layer("slow", 0, "slow".to_string()),
            circle_layer("top", 5),
            image_layer("fast", 1, "fast".to_string()),
        ];
        let mut sync = Synchronizer::new();
        block_on(sync.load(&project(layers), &StaggeredLoader));

        assert_eq!(layer_order(&sync), vec!["slow", "fast", "top"]);
    }

    #[test]
    fn test_failed_image_keeps_record_without_object() {
        let layers = vec![image_layer("x", 0, "broken".to_string()), circle_layer("c", 1)];
        let mut sync = Synchronizer::new();
        let report = block_on(sync.load(&project(layers), &StaggeredLoader));

        assert_eq!(report.restored, 1);
        assert_eq!(report.missing[0].0, LayerId::from("x"));
        assert!(sync.layer(&LayerId::from("x")).is_some());
        assert!(sync.object_for_layer(&LayerId::from("x")).is_none());
    }

    #[test]
    fn test_saved_layers_round_trip_through_load() {
        let mut sync = Synchronizer::new();
        sync.add_text_layer(&TextDefaults::default()).unwrap();
        sync.add_shape_layer(ShapeKind::Circle, &ShapeDefaults::for_kind(ShapeKind::Circle))
            .unwrap();
        let saved = project(sync.store().to_vec());

        let mut reopened = Synchronizer::new();
        block_on(reopened.load(&saved, &StaggeredLoader));

        assert_eq!(reopened.store(), sync.store());
        assert_eq!(reopened.surface().len(), 2);
    }

    #[test]
    fn test_path_created_becomes_brush_layer() {
        let mut sync = Synchronizer::new();
        sync.surface_mut().set_drawing_mode(true);
        sync.surface_mut().begin_stroke(Point::new(10.0, 10.0)).unwrap();
        sync.surface_mut().extend_stroke(Point::new(30.0, 40.0)).unwrap();
        let path = sync.surface_mut().end_stroke().unwrap();

        let layer = sync.on_path_created(path).unwrap();
        assert_eq!(layer.name, "Brush Stroke");
        assert_eq!(layer.kind(), crate::layer::LayerKind::Brush);
        assert_eq!(sync.surface().object(path).unwrap().layer_id, Some(layer.id.clone()));
        assert!(sync.on_path_created(path).is_none());
    }

    #[test]
    fn test_remove_and_restore_keep_paint_position() {
        let mut sync = Synchronizer::new();
        let layers = vec![circle_layer("a", 0), circle_layer("b", 1), circle_layer("c", 2)];
        block_on(sync.load(&project(layers), &StaggeredLoader));

        let (index, layer) = sync.remove_layer(&LayerId::from("b")).unwrap();
        assert_eq!(layer_order(&sync), vec!["a", "c"]);

        sync.restore_layer(index, layer).unwrap();
        assert_eq!(layer_order(&sync), vec!["a", "b", "c"]);
        assert_eq!(sync.store().position(&LayerId::from("b")), Some(1));
    }

    #[test]
    fn test_upsert_replaces_in_place_or_appends() {
        let mut sync = Synchronizer::new();
        block_on(sync.load(&project(vec![circle_layer("a", 0), circle_layer("b", 1)]), &StaggeredLoader));

        let mut moved = circle_layer("a", 0);
        moved.x = 400.0;
        let previous = sync.upsert_layer(moved).unwrap().unwrap();
        assert_eq!(previous.x, 10.0);
        assert_eq!(layer_order(&sync), vec!["a", "b"]);
        assert_eq!(sync.object_for_layer(&LayerId::from("a")).unwrap().position.x, 400.0);

        assert!(sync.upsert_layer(circle_layer("c", 2)).unwrap().is_none());
        assert_eq!(layer_order(&sync), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_apply_update_for_missing_layer_fails() {
        let mut sync = Synchronizer::new();
        let command = LayerCommand::Update { before: circle_layer("a", 0), after: circle_layer("a", 0) };
        assert_eq!(sync.apply(&command), Err(LayerError::NotFound(LayerId::from("a"))));
    }
}
