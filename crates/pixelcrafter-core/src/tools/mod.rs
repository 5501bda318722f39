//! Tool selection and how it configures the canvas surface.

use crate::canvas::{Brush, BrushMode, CanvasSurface};
use crate::color::is_valid_color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest brush size.
pub const MIN_BRUSH_SIZE: f64 = 1.0;
/// Largest brush size.
pub const MAX_BRUSH_SIZE: f64 = 100.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Select,
    Brush,
    Eraser,
    /// Reserved; behaves like `Select` on the surface.
    Pan,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Brush => "brush",
            ToolKind::Eraser => "eraser",
            ToolKind::Pan => "pan",
        }
    }

    /// Whether the tool puts the surface into freehand drawing mode.
    pub fn is_drawing(&self) -> bool {
        matches!(self, ToolKind::Brush | ToolKind::Eraser)
    }
}

impl std::str::FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(ToolKind::Select),
            "brush" => Ok(ToolKind::Brush),
            "eraser" => Ok(ToolKind::Eraser),
            "pan" => Ok(ToolKind::Pan),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

/// Tool errors.
#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid brush color: {0}")]
    InvalidColor(String),
}

/// Brush size and color; the only state shared across tool switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushSettings {
    pub size: f64,
    pub color: String,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self { size: 10.0, color: "#000000".to_string() }
    }
}

/// Translates the active tool into the surface's interaction mode.
#[derive(Debug, Clone, Default)]
pub struct ToolController {
    current: ToolKind,
    brush: BrushSettings,
}

impl ToolController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ToolKind {
        self.current
    }

    pub fn brush_settings(&self) -> &BrushSettings {
        &self.brush
    }

    /// Switch tools and reconfigure the surface immediately.
    pub fn set_tool(&mut self, tool: ToolKind, surface: &mut CanvasSurface) {
        log::debug!("Tool changed: {} -> {}", self.current.as_str(), tool.as_str());
        self.current = tool;
        self.apply(surface);
    }

    /// Change the brush size (clamped); applies live while drawing.
    pub fn set_brush_size(&mut self, size: f64, surface: &mut CanvasSurface) {
        self.brush.size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
        self.apply(surface);
    }

    /// Change the brush color; applies live while drawing.
    pub fn set_brush_color(&mut self, color: &str, surface: &mut CanvasSurface) -> Result<(), ToolError> {
        if !is_valid_color(color) {
            return Err(ToolError::InvalidColor(color.to_string()));
        }
        self.brush.color = color.to_string();
        self.apply(surface);
        Ok(())
    }

    /// Push the current tool and brush settings onto the surface.
    pub fn apply(&self, surface: &mut CanvasSurface) {
        match self.current {
            ToolKind::Brush => {
                surface.set_drawing_mode(true);
                surface.set_brush(Brush {
                    width: self.brush.size,
                    color: self.brush.color.clone(),
                    mode: BrushMode::Paint,
                });
            }
            ToolKind::Eraser => {
                surface.set_drawing_mode(true);
                surface.set_brush(Brush {
                    width: self.brush.size,
                    color: self.brush.color.clone(),
                    mode: BrushMode::Erase,
                });
            }
            ToolKind::Select | ToolKind::Pan => surface.set_drawing_mode(false),
        }
    }
}
