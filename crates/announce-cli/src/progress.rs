//! Renders download events on stderr.
//!
//! The downloader only publishes [`DownloadEvent`]s; this module decides how
//! they look. Interactive terminals get a progress bar, CI logs and pipes get
//! one plain line per event worth reporting.

use announce_assets::{DownloadEvent, EventReceiver, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use tokio::task::JoinHandle;

const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Bar,
    Lines,
}

impl ProgressMode {
    /// A bar only when stderr is a terminal outside CI.
    pub fn detect(ci: bool) -> Self {
        if !ci && std::io::stderr().is_terminal() {
            Self::Bar
        } else {
            Self::Lines
        }
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / MB
}

fn progress_line(p: &ProgressEvent) -> String {
    match (p.percent(), p.total_bytes) {
        (Some(pct), Some(total)) => format!(
            "  {}: {pct}% ({:.1}/{:.1} MB)",
            p.filename,
            megabytes(p.bytes_downloaded),
            megabytes(total)
        ),
        _ => format!("  {}: {:.1} MB", p.filename, megabytes(p.bytes_downloaded)),
    }
}

/// The plain-text form of an event, if it is worth a line.
pub fn describe(event: &DownloadEvent) -> Option<String> {
    match event {
        DownloadEvent::Planned {
            files,
            estimated_bytes,
            force,
        } => Some(format!(
            "{} {files} file(s), about {:.0} MB",
            if *force { "Re-downloading" } else { "Downloading" },
            megabytes(*estimated_bytes)
        )),
        DownloadEvent::Started {
            index,
            total_files,
            filename,
            size_label,
        } => Some(format!("[{index}/{total_files}] {filename} ({size_label})")),
        DownloadEvent::Progress(p) => Some(progress_line(p)),
        DownloadEvent::Finished {
            filename,
            bytes,
            elapsed,
        } => Some(format!(
            "  done: {filename} ({:.1} MB in {:.1}s)",
            megabytes(*bytes),
            elapsed.as_secs_f64()
        )),
        DownloadEvent::Failed { filename, error } => Some(format!("  failed: {filename}: {error}")),
        DownloadEvent::Retrying {
            filename,
            attempt,
            delay,
        } => Some(format!(
            "  retrying {filename} (attempt {attempt}) in {} ms",
            delay.as_millis()
        )),
        DownloadEvent::BatchProgress { .. } => None,
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("  {msg} [{bar:30}] {bytes}/{total_bytes} {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn render_bar(rx: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = rx;
        let mut bar: Option<ProgressBar> = None;
        while let Some(event) = rx.recv().await {
            match &event {
                DownloadEvent::Started { filename, .. } => {
                    if let Some(line) = describe(&event) {
                        eprintln!("{line}");
                    }
                    let pb = ProgressBar::new(0).with_style(bar_style());
                    pb.set_message(filename.clone());
                    bar = Some(pb);
                }
                DownloadEvent::Progress(p) => {
                    if let Some(pb) = &bar {
                        if let Some(total) = p.total_bytes {
                            pb.set_length(total);
                        }
                        pb.set_position(p.bytes_downloaded);
                    }
                }
                DownloadEvent::Finished { .. } | DownloadEvent::Failed { .. } => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                    if let Some(line) = describe(&event) {
                        eprintln!("{line}");
                    }
                }
                _ => {
                    if let Some(line) = describe(&event) {
                        eprintln!("{line}");
                    }
                }
            }
        }
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    })
}

fn render_lines(rx: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            if let Some(line) = describe(&event) {
                eprintln!("{line}");
            }
        }
    })
}

/// Consumes events until every sender is dropped.
pub fn spawn_renderer(rx: EventReceiver, mode: ProgressMode) -> JoinHandle<()> {
    match mode {
        ProgressMode::Bar => render_bar(rx),
        ProgressMode::Lines => render_lines(rx),
    }
}
