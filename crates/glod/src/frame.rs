//! # Frame — Phase-Ordered Command Recording
//!
//! The deferred pipeline runs three phases per frame, always in the same
//! order, none skipped:
//!
//! ```text
//! Geometry ──▶ Lighting ──▶ PostProcess
//! ```
//!
//! The lighting phase reads surfaces the geometry phase wrote, and the
//! post-process phase reads the surface the lighting phase wrote. Because
//! the command stream is strictly ordered, phase ordering *is* the
//! write-before-read guarantee — there are no locks to take. The original
//! sin this type exists to prevent is enforcing that ordering by call-site
//! discipline alone: [`FrameRecorder`] carries the phase as state and
//! [`advance_to`](FrameRecorder::advance_to) is the single transition
//! operation, so a phase regression or skip fails loudly at the violating
//! call instead of as a garbage frame.

use crate::command::{
    Command, GeometryDraw, GeometryId, PassDesc, ProgramId, TargetId, UniformValue,
};
use crate::light::LightBlocks;

/// The three phases of a deferred frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Geometry,
    Lighting,
    PostProcess,
}

impl Phase {
    fn successor(self) -> Option<Phase> {
        match self {
            Phase::Geometry => Some(Phase::Lighting),
            Phase::Lighting => Some(Phase::PostProcess),
            Phase::PostProcess => None,
        }
    }
}

/// Records one frame's command stream while enforcing phase order.
///
/// A frame, once begun, always runs all three phases to completion;
/// [`finish`](FrameRecorder::finish) checks that before releasing the
/// commands.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    commands: Vec<Command>,
    phase: Option<Phase>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The phase currently being recorded, if any.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Enter the next phase. The only legal transitions are
    /// start → `Geometry`, `Geometry` → `Lighting`, and
    /// `Lighting` → `PostProcess`; anything else is a bug in the caller
    /// and panics.
    pub fn advance_to(&mut self, phase: Phase) {
        let expected = match self.phase {
            None => Phase::Geometry,
            Some(current) => current
                .successor()
                .unwrap_or_else(|| panic!("frame already completed its final phase")),
        };
        assert_eq!(
            phase, expected,
            "phase order violation: expected {expected:?}, got {phase:?}"
        );
        self.phase = Some(phase);
    }

    /// Consume the recorder and return the command stream. Panics if the
    /// frame did not reach the post-process phase — a partial frame is a
    /// setup bug, never a value to hand to the device.
    pub fn finish(self) -> Vec<Command> {
        assert_eq!(
            self.phase,
            Some(Phase::PostProcess),
            "frame finished before completing all three phases"
        );
        self.commands
    }

    fn push(&mut self, command: Command) {
        assert!(
            self.phase.is_some(),
            "command recorded before entering the geometry phase"
        );
        self.commands.push(command);
    }

    pub fn begin_pass(&mut self, desc: PassDesc) {
        self.push(Command::BeginPass(desc));
    }

    pub fn end_pass(&mut self) {
        self.push(Command::EndPass);
    }

    pub fn set_program(&mut self, program: ProgramId) {
        self.push(Command::SetProgram(program));
    }

    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.push(Command::SetUniform {
            name: name.into(),
            value,
        });
    }

    pub fn bind_attachment(&mut self, slot: u32, target: TargetId, attachment: usize) {
        self.push(Command::BindAttachment {
            slot,
            target,
            attachment,
        });
    }

    pub fn bind_texture(&mut self, slot: u32, texture: crate::command::TextureId) {
        self.push(Command::BindTexture { slot, texture });
    }

    pub fn upload_lights(&mut self, blocks: LightBlocks) {
        self.push(Command::UploadLights(blocks));
    }

    pub fn draw(&mut self, geometry: GeometryId, draw: GeometryDraw) {
        self.push(Command::Draw { geometry, draw });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order() {
        let mut frame = FrameRecorder::new();
        assert_eq!(frame.phase(), None);
        frame.advance_to(Phase::Geometry);
        frame.advance_to(Phase::Lighting);
        frame.advance_to(Phase::PostProcess);
        assert_eq!(frame.phase(), Some(Phase::PostProcess));
        assert!(frame.finish().is_empty());
    }

    #[test]
    #[should_panic(expected = "phase order violation")]
    fn skipping_geometry_panics() {
        let mut frame = FrameRecorder::new();
        frame.advance_to(Phase::Lighting);
    }

    #[test]
    #[should_panic(expected = "phase order violation")]
    fn regressing_a_phase_panics() {
        let mut frame = FrameRecorder::new();
        frame.advance_to(Phase::Geometry);
        frame.advance_to(Phase::Lighting);
        frame.advance_to(Phase::Geometry);
    }

    #[test]
    #[should_panic(expected = "before completing all three phases")]
    fn finishing_a_partial_frame_panics() {
        let mut frame = FrameRecorder::new();
        frame.advance_to(Phase::Geometry);
        frame.finish();
    }

    #[test]
    #[should_panic(expected = "before entering the geometry phase")]
    fn recording_before_any_phase_panics() {
        let mut frame = FrameRecorder::new();
        frame.set_program(ProgramId(0));
    }
}
