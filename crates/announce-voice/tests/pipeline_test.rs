mod common;

use announce_exec::ExecError;
use announce_types::Gender;
use announce_voice::{AnnouncementRequest, AudioFormat, VoiceError};
use common::{Fixture, ScriptedRunner};

#[tokio::test]
async fn friendly_store_welcome_ends_as_single_mp3() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::new();
    let request = AnnouncementRequest::new("Welcome to our store!", "en", Gender::Female)
        .style("friendly")
        .formats(["mp3"]);

    let artifact = fx.pipeline(runner.clone()).run(&request).await.unwrap();

    assert_eq!(artifact.text, "Welcome to our store.");
    assert_eq!(artifact.primary.extension().unwrap(), "mp3");
    assert!(artifact.primary.is_file());
    assert_eq!(artifact.exports.len(), 1);
    assert_eq!(artifact.exports[0].format, AudioFormat::Mp3);

    let outputs = fx.outputs();
    assert_eq!(outputs.len(), 1, "only the mp3 may remain: {outputs:?}");
    assert!(outputs[0].starts_with("announcement_en_friendly_female_"));
    assert!(!outputs.iter().any(|n| n.ends_with(".wav")));

    // synth, master, export, in that order.
    assert_eq!(runner.programs(), vec!["piper", "ffmpeg", "ffmpeg"]);
    let synth = runner.calls()[0].args_lossy();
    let at = synth.iter().position(|a| a == "--length_scale").unwrap();
    assert_eq!(synth[at + 1], "1.02");
    assert_eq!(synth.last().unwrap(), "Welcome to our store.");
}

#[tokio::test]
async fn mastered_wav_is_primary_without_exports() {
    let fx = Fixture::new();
    let request = AnnouncementRequest::new("Platform change", "ca", Gender::Male).style("formal");

    let artifact = fx.pipeline(ScriptedRunner::new()).run(&request).await.unwrap();

    assert!(artifact.exports.is_empty());
    let name = artifact.primary.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("announcement_ca_formal_male_"));
    assert_eq!(fx.outputs(), vec![name.into_owned()], "raw file must be gone");
}

#[tokio::test]
async fn unmastered_raw_file_is_primary() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::new();
    let request = AnnouncementRequest::new("Gate closing", "es", Gender::Female).master(false);

    let artifact = fx.pipeline(runner.clone()).run(&request).await.unwrap();

    let name = artifact.primary.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("raw_es_default_female_"));
    assert_eq!(runner.programs(), vec!["piper"]);
}

#[tokio::test]
async fn keep_intermediate_retains_wav_alongside_exports() {
    let fx = Fixture::new();
    let request = AnnouncementRequest::new("Last call", "en", Gender::Male)
        .style("urgent")
        .formats(["opus", "aac"])
        .keep_intermediate(true);

    let artifact = fx.pipeline(ScriptedRunner::new()).run(&request).await.unwrap();

    assert_eq!(artifact.primary.extension().unwrap(), "wav");
    let formats: Vec<AudioFormat> = artifact.exports.iter().map(|e| e.format).collect();
    assert_eq!(formats, vec![AudioFormat::Opus, AudioFormat::M4a]);
    assert_eq!(fx.outputs().len(), 3);
}

#[tokio::test]
async fn first_exported_format_becomes_primary() {
    let fx = Fixture::new();
    let request = AnnouncementRequest::new("Last call", "en", Gender::Male)
        .formats(["flac", "opus", "mp3", "opus"]);

    let artifact = fx.pipeline(ScriptedRunner::new()).run(&request).await.unwrap();

    assert_eq!(artifact.primary.extension().unwrap(), "opus");
    assert_eq!(artifact.exports.len(), 2, "unknown and repeated formats are skipped");
    assert_eq!(fx.outputs().len(), 2);
}

#[tokio::test]
async fn only_unknown_formats_keep_the_wav() {
    let fx = Fixture::new();
    let request = AnnouncementRequest::new("Last call", "en", Gender::Male).formats(["wma"]);

    let artifact = fx.pipeline(ScriptedRunner::new()).run(&request).await.unwrap();

    assert!(artifact.exports.is_empty());
    assert_eq!(artifact.primary.extension().unwrap(), "wav");
    assert!(artifact.primary.is_file());
}

#[tokio::test]
async fn missing_voice_files_fail_before_running_anything() {
    let fx = Fixture::new();
    std::fs::remove_file(fx.voices.path().join("es_ES-carlfm-x_low.onnx")).unwrap();
    let runner = ScriptedRunner::new();
    let request = AnnouncementRequest::new("Hola", "es", Gender::Male);

    match fx.pipeline(runner.clone()).run(&request).await {
        Err(VoiceError::VoiceUnavailable { missing, .. }) => {
            assert_eq!(missing.len(), 1);
            assert!(missing[0].ends_with("es_ES-carlfm-x_low.onnx"));
        }
        other => panic!("expected VoiceUnavailable, got {other:?}"),
    }
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn synthesis_failure_leaves_no_files() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::failing_on("--length_scale");
    let request = AnnouncementRequest::new("Hello", "en", Gender::Female);

    match fx.pipeline(runner).run(&request).await {
        Err(VoiceError::SynthesisFailed { command, output }) => {
            assert!(command.starts_with("piper -m "));
            assert_eq!(output.code, Some(1));
        }
        other => panic!("expected SynthesisFailed, got {other:?}"),
    }
    assert!(fx.outputs().is_empty());
}

#[tokio::test]
async fn mastering_failure_keeps_raw_file() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::failing_on("loudnorm");
    let request = AnnouncementRequest::new("Hello", "en", Gender::Female).formats(["mp3"]);

    let err = fx.pipeline(runner.clone()).run(&request).await.unwrap_err();
    assert!(matches!(err, VoiceError::MasteringFailed { .. }), "{err}");

    let outputs = fx.outputs();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].starts_with("raw_"), "raw survives: {outputs:?}");
    assert_eq!(runner.programs(), vec!["piper", "ffmpeg"], "no export attempted");
}

#[tokio::test]
async fn export_failure_keeps_earlier_formats_and_wav() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::failing_on("libopus");
    let request = AnnouncementRequest::new("Hello", "en", Gender::Female).formats(["mp3", "opus", "m4a"]);

    match fx.pipeline(runner.clone()).run(&request).await {
        Err(VoiceError::ExportFailed { format, .. }) => assert_eq!(format, AudioFormat::Opus),
        other => panic!("expected ExportFailed, got {other:?}"),
    }

    let outputs = fx.outputs();
    assert!(outputs.iter().any(|n| n.ends_with(".mp3")));
    assert!(outputs.iter().any(|n| n.starts_with("announcement_") && n.ends_with(".wav")));
    assert!(!outputs.iter().any(|n| n.ends_with(".opus")), "partial opus removed");
    assert!(!outputs.iter().any(|n| n.ends_with(".m4a")), "later formats not attempted");
}

#[tokio::test]
async fn synthesis_timeout_removes_partial_raw_file() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::timing_out_on("--length_scale");
    let request = AnnouncementRequest::new("Hello", "en", Gender::Female);

    match fx.pipeline(runner).run(&request).await {
        Err(VoiceError::Interrupted { stage, command, source }) => {
            assert_eq!(stage, "synthesis");
            assert!(command.starts_with("piper -m "), "{command}");
            assert!(matches!(source, ExecError::Timeout { .. }));
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }
    assert!(fx.outputs().is_empty(), "left {:?}", fx.outputs());
}

#[tokio::test]
async fn mastering_timeout_keeps_only_raw_file() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::timing_out_on("loudnorm");
    let request = AnnouncementRequest::new("Hello", "en", Gender::Female);

    let err = fx.pipeline(runner).run(&request).await.unwrap_err();
    match &err {
        VoiceError::Interrupted { stage, command, .. } => {
            assert_eq!(stage, "mastering");
            assert!(command.contains("loudnorm"), "{command}");
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }
    assert!(err.to_string().starts_with("mastering did not finish"), "{err}");

    let outputs = fx.outputs();
    assert_eq!(outputs.len(), 1, "{outputs:?}");
    assert!(outputs[0].starts_with("raw_"));
}

#[tokio::test]
async fn export_timeout_removes_partial_export() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::timing_out_on("libmp3lame");
    let request = AnnouncementRequest::new("Hello", "en", Gender::Female).formats(["mp3"]);

    match fx.pipeline(runner).run(&request).await {
        Err(VoiceError::Interrupted { stage, command, .. }) => {
            assert_eq!(stage, "export to mp3");
            assert!(command.ends_with(".mp3"), "{command}");
        }
        other => panic!("expected Interrupted, got {other:?}"),
    }

    let outputs = fx.outputs();
    assert!(!outputs.iter().any(|n| n.ends_with(".mp3")), "{outputs:?}");
    assert!(outputs.iter().any(|n| n.starts_with("announcement_") && n.ends_with(".wav")));
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::new();
    let request = AnnouncementRequest::new("   ", "en", Gender::Female);

    assert!(matches!(
        fx.pipeline(runner.clone()).run(&request).await,
        Err(VoiceError::EmptyText)
    ));
    assert!(runner.calls().is_empty());
}
