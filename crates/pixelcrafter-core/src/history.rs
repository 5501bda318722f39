//! Undo/redo as a log of invertible layer commands.

use crate::layer::Layer;

/// Maximum number of undo steps to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// One reversible change to the layer list.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerCommand {
    /// `layer` was inserted at `index`.
    Add { index: usize, layer: Layer },
    /// `layer` was removed from `index`.
    Remove { index: usize, layer: Layer },
    /// A layer's record changed from `before` to `after`.
    Update { before: Layer, after: Layer },
}

impl LayerCommand {
    /// The command that undoes this one.
    pub fn inverse(&self) -> LayerCommand {
        match self {
            LayerCommand::Add { index, layer } => LayerCommand::Remove { index: *index, layer: layer.clone() },
            LayerCommand::Remove { index, layer } => LayerCommand::Add { index: *index, layer: layer.clone() },
            LayerCommand::Update { before, after } => LayerCommand::Update {
                before: after.clone(),
                after: before.clone(),
            },
        }
    }

    /// The layer record as it stands after the command.
    pub fn layer(&self) -> &Layer {
        match self {
            LayerCommand::Add { layer, .. } | LayerCommand::Remove { layer, .. } => layer,
            LayerCommand::Update { after, .. } => after,
        }
    }
}

/// Undo and redo stacks.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: Vec<LayerCommand>,
    redo_stack: Vec<LayerCommand>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command that was just applied. Clears the redo stack.
    pub fn record(&mut self, command: LayerCommand) {
        if let LayerCommand::Update { before, after } = &command {
            if before == after {
                return;
            }
        }
        self.undo_stack.push(command);
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Pop the latest command and return the command to apply to undo it.
    pub fn undo(&mut self) -> Option<LayerCommand> {
        let command = self.undo_stack.pop()?;
        let inverse = command.inverse();
        self.redo_stack.push(command);
        Some(inverse)
    }

    /// Put back the command handed out by the last `undo` when it could not
    /// be applied.
    pub fn cancel_undo(&mut self) {
        if let Some(command) = self.redo_stack.pop() {
            self.undo_stack.push(command);
        }
    }

    /// Pop the latest undone command and return it for re-application.
    pub fn redo(&mut self) -> Option<LayerCommand> {
        let command = self.redo_stack.pop()?;
        self.undo_stack.push(command.clone());
        Some(command)
    }

    /// Put back the command handed out by the last `redo` when it could not
    /// be applied.
    pub fn cancel_redo(&mut self) {
        if let Some(command) = self.undo_stack.pop() {
            self.redo_stack.push(command);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
