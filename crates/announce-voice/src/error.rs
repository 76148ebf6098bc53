use crate::export::AudioFormat;
use announce_exec::{CommandOutput, ExecError};
use announce_types::VoiceKey;
use std::path::PathBuf;
use thiserror::Error;

fn exit_label(output: &CommandOutput) -> String {
    match output.code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("no voice for {key}; available languages: {}", .available.join(", "))]
    UnknownVoice { key: VoiceKey, available: Vec<String> },

    #[error("voice {key} is not installed (missing {}); {remediation}", join_paths(.missing))]
    VoiceUnavailable {
        key: VoiceKey,
        missing: Vec<PathBuf>,
        remediation: String,
    },

    #[error("announcement text is empty")]
    EmptyText,

    #[error("synthesis failed ({}): {}\ncommand: {command}", exit_label(.output), .output.diagnostics())]
    SynthesisFailed {
        command: String,
        output: CommandOutput,
    },

    #[error("mastering failed ({}): {}\ncommand: {command}", exit_label(.output), .output.diagnostics())]
    MasteringFailed {
        command: String,
        output: CommandOutput,
    },

    #[error("export to {format} failed ({}): {}\ncommand: {command}", exit_label(.output), .output.diagnostics())]
    ExportFailed {
        format: AudioFormat,
        command: String,
        output: CommandOutput,
    },

    /// The process could not be run to completion (spawn failure, timeout).
    /// Whatever it had written is already removed.
    #[error("{stage} did not finish: {source}\ncommand: {command}")]
    Interrupted {
        stage: String,
        command: String,
        #[source]
        source: ExecError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("announcement rewrite failed: {0}")]
    Rewrite(String),
}
