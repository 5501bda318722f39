//! Collaboration messages and last-writer-wins merging of layer operations.
//!
//! Every message on the project socket is a JSON object
//! `{ "type": ..., "data": ..., "user_id": ... }`. Layer edits travel as
//! [`LayerOp`]s stamped with a Lamport clock; for each layer the op with the
//! greatest `(clock, user_id)` wins, so all peers converge on the same record
//! regardless of arrival order.

use crate::layer::{Layer, LayerId};
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pointer position in project space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Payload of a `tool_change` message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolChange {
    pub tool: ToolKind,
}

/// A replicated change to one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayerOp {
    /// Create or replace the whole record.
    Upsert { layer: Layer, clock: u64 },
    /// Remove the record.
    Delete { layer_id: LayerId, clock: u64 },
}

impl LayerOp {
    pub fn layer_id(&self) -> &LayerId {
        match self {
            LayerOp::Upsert { layer, .. } => &layer.id,
            LayerOp::Delete { layer_id, .. } => layer_id,
        }
    }

    pub fn clock(&self) -> u64 {
        match self {
            LayerOp::Upsert { clock, .. } | LayerOp::Delete { clock, .. } => *clock,
        }
    }
}

/// Messages exchanged over the project socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollabMessage {
    Cursor {
        #[serde(default)]
        user_id: String,
        data: CursorPosition,
    },
    LayerUpdate {
        #[serde(default)]
        user_id: String,
        data: LayerOp,
    },
    ToolChange {
        #[serde(default)]
        user_id: String,
        data: ToolChange,
    },
    /// Sent by the backend after a project was saved.
    ProjectUpdate {
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

impl CollabMessage {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CollabMessage::Cursor { user_id, .. }
            | CollabMessage::LayerUpdate { user_id, .. }
            | CollabMessage::ToolChange { user_id, .. }
            | CollabMessage::ProjectUpdate { user_id, .. } => Some(user_id),
            CollabMessage::Unknown => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CollabMessage::Cursor { .. } => "cursor",
            CollabMessage::LayerUpdate { .. } => "layer_update",
            CollabMessage::ToolChange { .. } => "tool_change",
            CollabMessage::ProjectUpdate { .. } => "project_update",
            CollabMessage::Unknown => "unknown",
        }
    }
}

/// A remote edit that won and must be applied locally.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    Upsert(Layer),
    Delete(LayerId),
}

type Stamp = (u64, String);

/// Per-project collaboration state.
#[derive(Debug, Clone)]
pub struct CollaborationManager {
    user_id: String,
    clock: u64,
    /// Winning stamp per layer.
    stamps: HashMap<LayerId, Stamp>,
    cursors: HashMap<String, CursorPosition>,
    tools: HashMap<String, ToolKind>,
    outgoing: Vec<CollabMessage>,
}

impl CollaborationManager {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            clock: 0,
            stamps: HashMap::new(),
            cursors: HashMap::new(),
            tools: HashMap::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = user_id.into();
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Forget per-project state. The clock keeps running.
    pub fn reset(&mut self) {
        self.stamps.clear();
        self.cursors.clear();
        self.tools.clear();
        self.outgoing.clear();
    }

    /// Last known cursor of every remote user.
    pub fn remote_cursors(&self) -> &HashMap<String, CursorPosition> {
        &self.cursors
    }

    /// Last announced tool of every remote user.
    pub fn remote_tools(&self) -> &HashMap<String, ToolKind> {
        &self.tools
    }

    fn tick(&mut self, layer_id: &LayerId) -> u64 {
        self.clock += 1;
        self.stamps
            .insert(layer_id.clone(), (self.clock, self.user_id.clone()));
        self.clock
    }

    /// Broadcast a local create/update.
    pub fn local_upsert(&mut self, layer: &Layer) {
        let clock = self.tick(&layer.id);
        self.outgoing.push(CollabMessage::LayerUpdate {
            user_id: self.user_id.clone(),
            data: LayerOp::Upsert { layer: layer.clone(), clock },
        });
    }

    /// Broadcast a local delete.
    pub fn local_delete(&mut self, layer_id: &LayerId) {
        let clock = self.tick(layer_id);
        self.outgoing.push(CollabMessage::LayerUpdate {
            user_id: self.user_id.clone(),
            data: LayerOp::Delete { layer_id: layer_id.clone(), clock },
        });
    }

    pub fn local_cursor(&mut self, x: f64, y: f64) {
        self.outgoing.push(CollabMessage::Cursor {
            user_id: self.user_id.clone(),
            data: CursorPosition { x, y },
        });
    }

    pub fn local_tool(&mut self, tool: ToolKind) {
        self.outgoing.push(CollabMessage::ToolChange {
            user_id: self.user_id.clone(),
            data: ToolChange { tool },
        });
    }

    /// Messages queued for broadcast, oldest first.
    pub fn take_outgoing(&mut self) -> Vec<CollabMessage> {
        std::mem::take(&mut self.outgoing)
    }

    /// Process an incoming message. Returns the change to apply, if the
    /// message carries a layer op that wins over what is known locally.
    pub fn receive(&mut self, message: CollabMessage) -> Option<RemoteChange> {
        if message.user_id() == Some(self.user_id.as_str()) {
            return None;
        }
        match message {
            CollabMessage::Cursor { user_id, data } => {
                self.cursors.insert(user_id, data);
                None
            }
            CollabMessage::ToolChange { user_id, data } => {
                log::debug!("{} switched to {}", user_id, data.tool.as_str());
                self.tools.insert(user_id, data.tool);
                None
            }
            CollabMessage::LayerUpdate { user_id, data } => self.merge(user_id, data),
            CollabMessage::ProjectUpdate { user_id, .. } => {
                log::debug!("Project saved by {}", if user_id.is_empty() { "server" } else { &user_id });
                None
            }
            CollabMessage::Unknown => {
                log::info!("Ignoring unknown collaboration message");
                None
            }
        }
    }

    fn merge(&mut self, user_id: String, op: LayerOp) -> Option<RemoteChange> {
        self.clock = self.clock.max(op.clock());
        let stamp = (op.clock(), user_id);
        if let Some(current) = self.stamps.get(op.layer_id()) {
            if &stamp <= current {
                log::debug!("Dropping stale op for layer {}", op.layer_id());
                return None;
            }
        }
        self.stamps.insert(op.layer_id().clone(), stamp);
        Some(match op {
            LayerOp::Upsert { layer, .. } => RemoteChange::Upsert(layer),
            LayerOp::Delete { layer_id, .. } => RemoteChange::Delete(layer_id),
        })
    }
}
