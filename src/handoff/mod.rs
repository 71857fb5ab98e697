//! Handoff — where a finished capture goes.
//!
//! The session hands its PNG to a [`HandoffSink`]; the caller then
//! delivers it to disk, the clipboard and/or the image-to-chat endpoint.

mod clipboard;
mod file;
pub mod streaming;
pub mod transcript;
pub mod vision;

pub use clipboard::copy_png;
pub use file::save_png;
pub use transcript::{Transcript, TranscriptEntry, TranscriptError};
pub use vision::{VisionClient, VisionError};

use crate::capture::{CancelReason, CaptureSink, EncodedImage};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("Failed to save capture: {0}")]
    Save(#[from] std::io::Error),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// Keeps the session outcome for delivery after the session ends.
///
/// Cancellations are announced on stderr right away. A failure's message is
/// kept instead, so the caller can report it once and exit non-zero.
#[derive(Debug, Default)]
pub struct HandoffSink {
    captured: Option<EncodedImage>,
    cancel_message: Option<String>,
}

impl HandoffSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_capture(&mut self) -> Option<EncodedImage> {
        self.captured.take()
    }

    /// Why the session ended without an image, if it did.
    pub fn cancel_message(&self) -> Option<&str> {
        self.cancel_message.as_deref()
    }
}

impl CaptureSink for HandoffSink {
    fn on_capture(&mut self, image: EncodedImage) {
        log::info!(
            "[HANDOFF] Received {}x{} capture ({} bytes)",
            image.width,
            image.height,
            image.png.len()
        );
        self.captured = Some(image);
    }

    fn on_cancel(&mut self, reason: &CancelReason) {
        let message = reason.to_string();
        if !matches!(reason, CancelReason::Failed(_)) {
            eprintln!("snipchat: {}", message.to_lowercase());
        }
        self.cancel_message = Some(message);
    }
}

/// What to do with a capture.
#[derive(Debug, Clone, Default)]
pub struct HandoffTargets {
    pub save_dir: Option<PathBuf>,
    pub copy_to_clipboard: bool,
    /// Prompt for image-to-chat.
    pub ask: Option<String>,
}

/// Image-to-chat collaborators.
pub struct ChatHandoff<'a> {
    pub client: &'a VisionClient,
    pub transcript: &'a mut Transcript,
    /// Earlier transcript entries sent along as context.
    pub history_turns: usize,
}

#[derive(Debug, Default)]
pub struct HandoffReport {
    pub saved_to: Option<PathBuf>,
    pub copied: bool,
    pub answer: Option<String>,
}

/// Delivers `image` to every requested target, in order: disk, clipboard, chat.
pub async fn deliver(
    image: &EncodedImage,
    targets: &HandoffTargets,
    chat: Option<ChatHandoff<'_>>,
) -> Result<HandoffReport, HandoffError> {
    let mut report = HandoffReport::default();

    if let Some(dir) = &targets.save_dir {
        report.saved_to = Some(save_png(dir, &image.png)?);
    }

    if targets.copy_to_clipboard {
        copy_png(&image.png)?;
        report.copied = true;
    }

    if let (Some(prompt), Some(chat)) = (&targets.ask, chat) {
        let history = chat.transcript.recent(chat.history_turns).to_vec();
        let mut stdout = std::io::stdout();

        let answer = chat
            .client
            .ask(&image.png, prompt, &history, |delta| {
                let _ = write!(stdout, "{}", delta);
                let _ = stdout.flush();
            })
            .await?;
        println!();

        chat.transcript.push(TranscriptEntry::new(
            "user",
            format!("{} [image {}x{}]", prompt, image.width, image.height),
        ));
        chat.transcript
            .push(TranscriptEntry::new("assistant", answer.clone()));
        chat.transcript.save()?;
        log::info!(
            "[HANDOFF] Transcript updated at {}",
            chat.transcript.path().display()
        );

        report.answer = Some(answer);
    }

    Ok(report)
}
