use crate::error::VoiceError;
use crate::synth::{discard, run_stage};
use announce_exec::{CommandRunner, Invocation};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loudness normalisation, band limiting, leading-silence trim and a
/// canonical 48 kHz / s16 output, in that order.
pub const MASTERING_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11,\
highpass=f=80,\
lowpass=f=12000,\
silenceremove=start_periods=1:start_threshold=-40dB:start_silence=0.3:detection=peak,\
aformat=sample_fmts=s16:sample_rates=48000";

/// Fixed ffmpeg post-processing applied to every synthesized file.
#[derive(Debug, Clone)]
pub struct MasteringChain {
    ffmpeg: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl MasteringChain {
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
        }
    }

    pub fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        Invocation::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-af")
            .arg(MASTERING_FILTER)
            .arg(output)
    }

    /// Masters `input` into `output`. The input is left untouched; deleting
    /// it is the caller's decision.
    pub async fn master(&self, input: &Path, output: &Path) -> Result<PathBuf, VoiceError> {
        let invocation = self.invocation(input, output);
        let result = run_stage(self.runner.as_ref(), &invocation, output, "mastering").await?;
        if !result.is_success() || !output.is_file() {
            discard(output);
            return Err(VoiceError::MasteringFailed {
                command: invocation.to_string(),
                output: result,
            });
        }

        tracing::info!(path = %output.display(), "mastered audio");
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use announce_exec::TokioRunner;

    #[test]
    fn filter_graph_is_fixed_and_ordered() {
        let stages: Vec<&str> = MASTERING_FILTER
            .split(',')
            .map(|s| s.split('=').next().unwrap_or_default())
            .collect();
        assert_eq!(
            stages,
            vec!["loudnorm", "highpass", "lowpass", "silenceremove", "aformat"]
        );
        assert!(MASTERING_FILTER.contains("sample_rates=48000"));
    }

    #[test]
    fn invocation_layout() {
        let chain = MasteringChain::new("ffmpeg", Arc::new(TokioRunner::default()));
        let inv = chain.invocation(Path::new("raw.wav"), Path::new("out.wav"));
        assert_eq!(
            inv.args_lossy(),
            vec!["-y", "-i", "raw.wav", "-af", MASTERING_FILTER, "out.wav"]
        );
    }
}
