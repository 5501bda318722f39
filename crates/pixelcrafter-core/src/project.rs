//! Project and user records as exchanged with the backend.

use crate::layer::Layer;
use serde::{Deserialize, Serialize};

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_background() -> String {
    "#ffffff".to_string()
}

/// A persisted canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Project {
    /// An empty project with default dimensions and background.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            width: default_width(),
            height: default_height(),
            background_color: default_background(),
            layers: Vec::new(),
            owner_id: String::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Body of a project creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_background")]
    pub background_color: String,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: default_width(),
            height: default_height(),
            background_color: default_background(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_defaults() {
        let project: Project = serde_json::from_str(r#"{"id":"p1","name":"Poster"}"#).unwrap();
        assert_eq!(project.width, 1920);
        assert_eq!(project.height, 1080);
        assert_eq!(project.background_color, "#ffffff");
        assert!(project.layers.is_empty());
    }

    #[test]
    fn test_new_project_body() {
        let body = serde_json::to_value(NewProject::new("Flyer").with_size(800, 600)).unwrap();
        assert_eq!(body["name"], "Flyer");
        assert_eq!(body["width"], 800);
        assert_eq!(body["background_color"], "#ffffff");
    }
}
