//! Announcement synthesis pipeline.
//!
//! A request flows through [`style`] (prosody presets), [`text`] (speech
//! polish), [`synth`] (the Piper engine), [`master`] (fixed ffmpeg chain) and
//! [`export`] (mp3/opus/m4a). [`pipeline`] wires the stages together and
//! decides which file survives as the primary artifact. Every external
//! program runs through an [`announce_exec::CommandRunner`].

pub mod error;
pub mod export;
pub mod master;
pub mod pipeline;
pub mod rewrite;
pub mod style;
pub mod synth;
pub mod text;

pub use error::VoiceError;
pub use export::{AudioFormat, ExportStage, ExportedFile, ParseFormatError};
pub use master::{MasteringChain, MASTERING_FILTER};
pub use pipeline::{
    AnnouncementPipeline, AnnouncementRequest, AudioArtifact, OutputNames, PipelineConfig,
};
pub use rewrite::{style_note, AnnouncementWriter, OpenAiWriter};
pub use style::{resolve_style, Style, SynthesisParameters};
pub use synth::{SynthesisInvoker, SynthesisRequest};
pub use text::polish_text;
