use crate::error::VoiceError;
use crate::style::SynthesisParameters;
use announce_assets::is_asset_present;
use announce_exec::{CommandOutput, CommandRunner, Invocation};
use announce_types::{Catalog, VoiceKey};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REMEDIATION: &str = "run `piper-announce download` to fetch the voice files";

/// One engine call: text, voice, prosody and where to write the WAV.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceKey,
    pub parameters: SynthesisParameters,
    /// Passed to the engine verbatim, after the prosody flags.
    pub extra_args: Vec<String>,
    pub output: PathBuf,
}

/// Runs the Piper engine for a resolved voice.
#[derive(Debug, Clone)]
pub struct SynthesisInvoker {
    engine: PathBuf,
    catalog: Catalog,
    voices_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl SynthesisInvoker {
    pub fn new(
        engine: impl Into<PathBuf>,
        catalog: Catalog,
        voices_dir: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            engine: engine.into(),
            catalog,
            voices_dir: voices_dir.into(),
            runner,
        }
    }

    /// Model path for `key`, after checking both the model and its config
    /// are on disk.
    pub fn model_for(&self, key: &VoiceKey) -> Result<PathBuf, VoiceError> {
        let voice = self
            .catalog
            .find(key)
            .ok_or_else(|| VoiceError::UnknownVoice {
                key: key.clone(),
                available: self
                    .catalog
                    .languages()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })?;

        let model = voice.model_path(&self.voices_dir);
        let config = voice.config_path(&self.voices_dir);
        let missing: Vec<PathBuf> = [&model, &config]
            .into_iter()
            .filter(|p| !is_asset_present(p))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(VoiceError::VoiceUnavailable {
                key: key.clone(),
                missing,
                remediation: REMEDIATION.to_string(),
            });
        }
        Ok(model)
    }

    /// `-m <model> -f <out> -q <prosody> [--speaker K] [extra...] -- <text>`
    pub fn invocation(&self, model: &Path, request: &SynthesisRequest) -> Invocation {
        let p = &request.parameters;
        let mut inv = Invocation::new(&self.engine)
            .arg("-m")
            .arg(model)
            .arg("-f")
            .arg(&request.output)
            .arg("-q")
            .args([
                "--length_scale".to_string(),
                format!("{:.2}", p.length_scale()),
                "--noise_scale".to_string(),
                format!("{:.2}", p.noise_scale()),
                "--noise_w".to_string(),
                format!("{:.2}", p.noise_w()),
                "--sentence_silence".to_string(),
                format!("{:.2}", p.sentence_silence()),
            ]);
        if let Some(speaker) = p.speaker() {
            inv = inv.arg("--speaker").arg(speaker.to_string());
        }
        inv.args(&request.extra_args).arg("--").arg(&request.text)
    }

    /// Writes the raw WAV named in the request and returns its path.
    ///
    /// A failed run removes whatever partial output the engine left.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<PathBuf, VoiceError> {
        let model = self.model_for(&request.voice)?;
        let invocation = self.invocation(&model, request);
        tracing::debug!(voice = %request.voice, output = %request.output.display(), "running synthesis engine");

        let output =
            run_stage(self.runner.as_ref(), &invocation, &request.output, "synthesis").await?;
        if !output.is_success() || !request.output.is_file() {
            discard(&request.output);
            return Err(VoiceError::SynthesisFailed {
                command: invocation.to_string(),
                output,
            });
        }

        tracing::info!(voice = %request.voice, path = %request.output.display(), "synthesized raw audio");
        Ok(request.output.clone())
    }
}

/// Runs one stage's process. If it never completes, the file it was
/// writing is removed and the error names the stage and command.
pub(crate) async fn run_stage(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
    output: &Path,
    stage: &str,
) -> Result<CommandOutput, VoiceError> {
    match runner.run(invocation).await {
        Ok(result) => Ok(result),
        Err(source) => {
            discard(output);
            tracing::warn!(stage, error = %source, path = %output.display(), "stage interrupted");
            Err(VoiceError::Interrupted {
                stage: stage.to_string(),
                command: invocation.to_string(),
                source,
            })
        }
    }
}

/// Best-effort removal of a file this crate created.
pub(crate) fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::resolve_style;
    use announce_exec::TokioRunner;
    use announce_types::Gender;

    fn invoker(voices_dir: &Path) -> SynthesisInvoker {
        SynthesisInvoker::new(
            "/opt/piper/piper",
            Catalog::builtin(),
            voices_dir,
            Arc::new(TokioRunner::default()),
        )
    }

    fn request(parameters: SynthesisParameters) -> SynthesisRequest {
        SynthesisRequest {
            text: "Doors close in 5 minutes.".to_string(),
            voice: VoiceKey::new("en", Gender::Male),
            parameters,
            extra_args: vec!["--cuda".to_string()],
            output: PathBuf::from("/out/raw.wav"),
        }
    }

    #[test]
    fn arguments_follow_engine_contract() {
        let inv = invoker(Path::new("/voices")).invocation(
            Path::new("/voices/en_GB-alan-low.onnx"),
            &request(resolve_style("urgent").with_speaker(2)),
        );
        assert_eq!(inv.program(), Path::new("/opt/piper/piper"));
        assert_eq!(
            inv.args_lossy(),
            vec![
                "-m",
                "/voices/en_GB-alan-low.onnx",
                "-f",
                "/out/raw.wav",
                "-q",
                "--length_scale",
                "0.94",
                "--noise_scale",
                "0.55",
                "--noise_w",
                "0.60",
                "--sentence_silence",
                "0.22",
                "--speaker",
                "2",
                "--cuda",
                "--",
                "Doors close in 5 minutes.",
            ]
        );
    }

    #[test]
    fn speaker_flag_is_omitted_by_default() {
        let inv = invoker(Path::new("/voices"))
            .invocation(Path::new("/m.onnx"), &request(resolve_style("formal")));
        assert!(!inv.args_lossy().iter().any(|a| a == "--speaker"));
    }

    #[test]
    fn missing_files_are_named() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("en_GB-alan-low.onnx"), b"model").unwrap();

        match invoker(tmp.path()).model_for(&VoiceKey::new("en", Gender::Male)) {
            Err(VoiceError::VoiceUnavailable { missing, remediation, .. }) => {
                assert_eq!(missing, vec![tmp.path().join("en_GB-alan-low.onnx.json")]);
                assert!(remediation.contains("download"));
            }
            other => panic!("expected VoiceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn unknown_language_lists_alternatives() {
        let tmp = tempfile::tempdir().unwrap();
        match invoker(tmp.path()).model_for(&VoiceKey::new("fr", Gender::Female)) {
            Err(VoiceError::UnknownVoice { available, .. }) => {
                assert!(available.contains(&"en".to_string()));
            }
            other => panic!("expected UnknownVoice, got {other:?}"),
        }
    }
}
