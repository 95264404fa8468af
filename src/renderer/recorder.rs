use std::collections::VecDeque;

use super::draw::{DrawBackend, DrawCommand};

/// Backend that keeps every submitted command. Used for headless runs and to
/// inspect what a frame produced.
#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<DrawCommand>,
    texture_binds: u64,
    pending_errors: VecDeque<String>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Queues an error that the next `take_error` will report.
    pub fn inject_error(&mut self, message: impl Into<String>) {
        self.pending_errors.push_back(message.into());
    }

    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    pub fn draw_calls(&self) -> usize {
        self.count(DrawCommand::is_draw_call)
    }

    pub fn mesh_draws(&self) -> usize {
        self.count(|command| matches!(command, DrawCommand::DrawMesh { .. }))
    }

    pub fn quad_count(&self) -> usize {
        self.commands
            .iter()
            .map(|command| match command {
                DrawCommand::DrawQuads(vertices) => vertices.len() / 4,
                _ => 0,
            })
            .sum()
    }
}

impl DrawBackend for CommandRecorder {
    fn submit(&mut self, command: DrawCommand) {
        if let DrawCommand::BindTexture {
            texture: Some(_), ..
        } = command
        {
            self.texture_binds += 1;
        }
        self.commands.push(command);
    }

    fn texture_binds(&self) -> u64 {
        self.texture_binds
    }

    fn take_error(&mut self) -> Option<String> {
        self.pending_errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::draw::TextureId;

    #[test]
    fn counts_only_real_binds() {
        let mut recorder = CommandRecorder::new();
        recorder.submit(DrawCommand::BindTexture {
            unit: 0,
            texture: Some(TextureId(1)),
        });
        recorder.submit(DrawCommand::BindTexture {
            unit: 0,
            texture: None,
        });
        assert_eq!(recorder.texture_binds(), 1);
        assert_eq!(recorder.commands().len(), 2);
    }

    #[test]
    fn injected_errors_are_reported_once() {
        let mut recorder = CommandRecorder::new();
        recorder.inject_error("lost device");
        assert_eq!(recorder.take_error().as_deref(), Some("lost device"));
        assert!(recorder.take_error().is_none());
    }
}
