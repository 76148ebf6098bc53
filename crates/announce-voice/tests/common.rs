#![allow(dead_code)]

use announce_exec::{CommandOutput, CommandRunner, ExecError, Invocation};
use announce_types::Catalog;
use announce_voice::{AnnouncementPipeline, PipelineConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Stands in for piper and ffmpeg: writes the output file each call names,
/// unless an argument contains the configured failure marker.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    fail_marker: Option<String>,
    timeout_marker: Option<String>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails any call whose arguments contain `marker`, after writing a
    /// partial output file.
    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        })
    }

    /// Like [`ScriptedRunner::failing_on`], but the process is killed by
    /// the timeout instead of exiting.
    pub fn timing_out_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            timeout_marker: Some(marker.to_string()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::program_name).collect()
    }
}

/// The file an engine or ffmpeg call writes.
fn output_of(invocation: &Invocation) -> PathBuf {
    let args = invocation.args_lossy();
    if let Some(i) = args.iter().position(|a| a == "-f") {
        return PathBuf::from(&args[i + 1]);
    }
    PathBuf::from(args.last().cloned().unwrap_or_default())
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let output = output_of(invocation);
        std::fs::write(&output, b"RIFF....WAVEfmt ").unwrap();

        let matches = |marker: &Option<String>| {
            marker
                .as_deref()
                .is_some_and(|m| invocation.args_lossy().iter().any(|a| a.contains(m)))
        };
        if matches(&self.timeout_marker) {
            return Err(ExecError::Timeout {
                program: invocation.program_name(),
                timeout: Duration::from_secs(120),
            });
        }
        if matches(&self.fail_marker) {
            return Ok(CommandOutput::failure(1, "Error while processing the stream"));
        }
        Ok(CommandOutput::success())
    }
}

/// Writes both files of every built-in voice into `dir`.
pub fn install_voices(dir: &Path) {
    for entry in Catalog::builtin().entries() {
        std::fs::write(entry.path_in(dir), b"asset").unwrap();
    }
}

pub struct Fixture {
    pub voices: tempfile::TempDir,
    pub output: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let voices = tempfile::tempdir().unwrap();
        install_voices(voices.path());
        Self {
            voices,
            output: tempfile::tempdir().unwrap(),
        }
    }

    pub fn pipeline(&self, runner: Arc<ScriptedRunner>) -> AnnouncementPipeline {
        let config = PipelineConfig {
            voices_dir: self.voices.path().to_path_buf(),
            output_dir: self.output.path().to_path_buf(),
            engine: PathBuf::from("piper"),
            ffmpeg: PathBuf::from("ffmpeg"),
        };
        AnnouncementPipeline::new(config, Catalog::builtin(), runner)
    }

    /// Files left in the output directory, sorted.
    pub fn outputs(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
