//! Plain-text rendering of editor state for the terminal.

use pixelcrafter_core::canvas::{CanvasObject, ObjectKind};
use pixelcrafter_core::layer::{Layer, LayerContent};
use pixelcrafter_core::project::Project;
use pixelcrafter_core::storage::FlushReport;

/// One line per project: id, name, size, layer count.
pub fn project_line(project: &Project) -> String {
    format!(
        "{}  {}  {}x{}  {} layer{}",
        project.id,
        project.name,
        project.width,
        project.height,
        project.layers.len(),
        if project.layers.len() == 1 { "" } else { "s" }
    )
}

fn content_summary(content: &LayerContent) -> String {
    match content {
        LayerContent::Text(text) => format!("{:?} {}px {}", text.text, text.font_size, text.color),
        LayerContent::Shape(shape) => format!("{} {}", shape.shape.display_name(), shape.fill),
        LayerContent::Image(image) => match &image.filename {
            Some(name) => format!("{} ({} bytes of src)", name, image.src.len()),
            None => format!("{} bytes of src", image.src.len()),
        },
        LayerContent::Brush(brush) => format!(
            "{} points, width {}{}",
            brush.points.len(),
            brush.stroke_width,
            if brush.erase { ", eraser" } else { "" }
        ),
    }
}

/// `z  id  type  name  visibility  opacity  geometry  content`
pub fn layer_line(layer: &Layer) -> String {
    format!(
        "{:>3}  {}  {:<5}  {}  {}  {:.0}%  ({}, {}) {}x{}  {}",
        layer.z_index,
        layer.id,
        layer.kind().as_str(),
        layer.name,
        if layer.visible { "shown" } else { "hidden" },
        layer.opacity * 100.0,
        layer.x,
        layer.y,
        layer.width,
        layer.height,
        content_summary(&layer.content)
    )
}

/// Paint-order position, kind, owning layer and on-screen bounds.
pub fn object_line(index: usize, object: &CanvasObject) -> String {
    let bounds = object.bounds();
    let extra = match &object.kind {
        ObjectKind::Circle { radius, .. } => format!(" r={}", radius),
        ObjectKind::Path { points, .. } => format!(" {} points", points.len()),
        _ => String::new(),
    };
    format!(
        "{:>3}  {:<6}  {}  [{:.1}, {:.1} .. {:.1}, {:.1}]{}{}",
        index,
        object.kind.name(),
        object.layer_id.as_ref().map_or("-", |id| id.as_str()),
        bounds.x0,
        bounds.y0,
        bounds.x1,
        bounds.y1,
        if object.visible { "" } else { " hidden" },
        extra
    )
}

/// Summary of a save flush, e.g. `2 saved` or `1 saved, 1 failed: ...`.
pub fn flush_summary(report: &FlushReport) -> String {
    let mut summary = format!("{} saved", report.sent.len());
    for (seq, error) in &report.failed {
        summary.push_str(&format!(", save #{} failed: {}", seq, error));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use pixelcrafter_core::layer::{LayerId, ShapeData, ShapeKind, TextData};
    use pixelcrafter_core::storage::ApiError;

    #[test]
    fn test_project_line_pluralizes() {
        let mut project = Project::new("p1", "Poster");
        assert_eq!(project_line(&project), "p1  Poster  1920x1080  0 layers");

        project.layers.push(Layer::new(
            LayerId::from("l"),
            "Rectangle",
            LayerContent::Shape(ShapeData { shape: ShapeKind::Rectangle, fill: "#ff0000".to_string() }),
        ));
        assert!(project_line(&project).ends_with("1 layer"));
    }

    #[test]
    fn test_layer_line() {
        let mut layer = Layer::new(
            LayerId::from("layer_1"),
            "Text Layer",
            LayerContent::Text(TextData { text: "Hi".to_string(), font_size: 20.0, color: "#000000".to_string() }),
        )
        .with_position(100.0, 100.0)
        .with_size(20.0, 23.2);
        layer.opacity = 0.5;
        layer.visible = false;

        let line = layer_line(&layer);
        assert!(line.contains("layer_1  text "));
        assert!(line.contains("hidden  50%"));
        assert!(line.ends_with("\"Hi\" 20px #000000"));
    }

    #[test]
    fn test_object_line() {
        let object = CanvasObject::circle("#00ff00", Point::new(100.0, 100.0), 50.0).with_layer(LayerId::from("c"));
        let line = object_line(0, &object);
        assert!(line.contains("circle"));
        assert!(line.contains(" c "));
        assert!(line.ends_with(" r=50"));
    }

    #[test]
    fn test_flush_summary() {
        let report = FlushReport { sent: vec![1], failed: vec![(2, ApiError::NotAuthenticated)] };
        let summary = flush_summary(&report);
        assert!(summary.starts_with("1 saved, save #2 failed: "));
    }
}
