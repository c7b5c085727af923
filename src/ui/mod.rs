use iced::{
    widget::{button, column, pick_list, progress_bar, row, text, text_input, Column, Space},
    Element, Length,
};

use lumen_downloader::domain::{
    CompletedFile, FormatBuckets, FormatKind, FormatOption, JobStatus, Platform, SessionEvent,
};
use lumen_downloader::utils::format_file_size;

/// Main view state, mirrored from session events
pub struct DownloadView {
    pub url_input: String,
    pub platform: Option<Platform>,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub status: JobStatus,
    pub video_options: Vec<FormatOption>,
    pub audio_options: Vec<FormatOption>,
    pub video_only_options: Vec<FormatOption>,
    pub video_pick: Option<FormatOption>,
    pub audio_pick: Option<FormatOption>,
    pub video_only_pick: Option<FormatOption>,
    pub progress: f32,
    pub progress_label: String,
    pub completed: Option<CompletedFile>,
    pub save_status: Option<String>,
    pub error: Option<String>,
    pub service_warning: Option<String>,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url_input: String::new(),
            platform: None,
            title: None,
            duration_seconds: None,
            status: JobStatus::Idle,
            video_options: Vec::new(),
            audio_options: Vec::new(),
            video_only_options: Vec::new(),
            video_pick: None,
            audio_pick: None,
            video_only_pick: None,
            progress: 0.0,
            progress_label: "Paste a video link to get started".to_string(),
            completed: None,
            save_status: None,
            error: None,
            service_warning: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    AnalyzePressed,
    FormatPicked(FormatKind, FormatOption),
    DownloadPressed(FormatKind),
    BestPressed,
    SavePressed,
    ResetPressed,
}

/// `m:ss`, or `h:mm:ss` for anything an hour or longer
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

impl DownloadView {
    pub fn picked(&self, kind: FormatKind) -> Option<&FormatOption> {
        match kind {
            FormatKind::VideoWithAudio => self.video_pick.as_ref(),
            FormatKind::AudioOnly => self.audio_pick.as_ref(),
            FormatKind::VideoOnly => self.video_only_pick.as_ref(),
        }
    }

    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url_input = url;
            }
            DownloadMessage::FormatPicked(kind, option) => match kind {
                FormatKind::VideoWithAudio => self.video_pick = Some(option),
                FormatKind::AudioOnly => self.audio_pick = Some(option),
                FormatKind::VideoOnly => self.video_only_pick = Some(option),
            },
            DownloadMessage::AnalyzePressed
            | DownloadMessage::DownloadPressed(_)
            | DownloadMessage::BestPressed
            | DownloadMessage::SavePressed
            | DownloadMessage::ResetPressed => {
                // Will be handled by the app
            }
        }
    }

    /// Fold a controller notification into what is on screen
    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StatusChanged(status) => {
                self.status = status;
                match status {
                    JobStatus::Analyzing => {
                        self.error = None;
                        self.title = None;
                        self.completed = None;
                        self.save_status = None;
                        self.progress = 0.1;
                        self.progress_label = "Analyzing video...".to_string();
                    }
                    JobStatus::AwaitingSelection => {
                        self.error = None;
                        self.completed = None;
                        self.save_status = None;
                    }
                    _ => {}
                }
            }
            SessionEvent::PlatformDetected(platform) => {
                self.platform = Some(platform);
            }
            SessionEvent::MediaInfoReady(media) => {
                let buckets = FormatBuckets::classify(&media.formats);
                self.video_options = buckets.options(FormatKind::VideoWithAudio);
                self.audio_options = buckets.options(FormatKind::AudioOnly);
                self.video_only_options = buckets.options(FormatKind::VideoOnly);
                self.video_pick = None;
                self.audio_pick = None;
                self.video_only_pick = None;
                self.title = Some(media.title);
                self.duration_seconds = media.duration_seconds;
            }
            SessionEvent::FormatSelected(_) => {}
            SessionEvent::Progress { percent, label } => {
                self.progress = f32::from(percent) / 100.0;
                self.progress_label = label;
            }
            SessionEvent::Completed(file) => {
                self.progress = 1.0;
                self.completed = Some(file);
            }
            SessionEvent::Failed(message) | SessionEvent::ValidationError(message) => {
                self.error = Some(message);
            }
            SessionEvent::RetrievalProgress(progress) => {
                self.save_status = Some(match progress {
                    Some(p) => format!("Saving: {:.1}%", p * 100.0),
                    None => "Saving...".to_string(),
                });
            }
            SessionEvent::RetrievalFinished(path) => {
                self.save_status = Some(format!("Saved: {}", path.display()));
            }
            SessionEvent::RetrievalFailed(error) => {
                self.save_status = Some(format!("Save failed: {}", error));
            }
            SessionEvent::Reset => {
                let service_warning = self.service_warning.take();
                *self = Self {
                    service_warning,
                    ..Self::default()
                };
            }
        }
    }

    fn format_card<'a>(
        &'a self,
        heading: &'a str,
        kind: FormatKind,
        options: &'a [FormatOption],
    ) -> Element<'a, DownloadMessage> {
        let picked = self.picked(kind).cloned();
        let download = button("Download")
            .on_press_maybe(picked.is_some().then_some(DownloadMessage::DownloadPressed(kind)))
            .padding([6, 14]);

        column![
            text(heading).size(16),
            row![
                pick_list(options, picked, move |option| {
                    DownloadMessage::FormatPicked(kind, option)
                })
                .placeholder("Select quality...")
                .width(Length::Fill),
                download,
            ]
            .spacing(10),
        ]
        .spacing(6)
        .into()
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let busy = matches!(self.status, JobStatus::Analyzing | JobStatus::Downloading);

        let mut content = Column::new()
            .push(text("Lumen Downloader").size(32))
            .push(Space::new().height(Length::Fixed(20.0)))
            .push(text("Video URL:").size(16))
            .push(
                row![
                    text_input("Paste a link from YouTube, TikTok, Instagram...", &self.url_input)
                        .on_input(DownloadMessage::UrlChanged)
                        .on_submit(DownloadMessage::AnalyzePressed)
                        .padding(10),
                    button("Analyze")
                        .on_press_maybe((!busy).then_some(DownloadMessage::AnalyzePressed))
                        .padding([10, 20]),
                ]
                .spacing(10),
            );

        if let Some(warning) = &self.service_warning {
            content = content.push(text(warning).size(13));
        }

        if let Some(platform) = self.platform {
            content = content.push(text(format!("Platform: {}", platform)).size(14));
        }

        if let Some(title) = &self.title {
            let line = match self.duration_seconds {
                Some(d) => format!("{} ({})", title, format_duration(d)),
                None => title.clone(),
            };
            content = content.push(text(line).size(18));
        }

        let choosing = self.title.is_some()
            && matches!(
                self.status,
                JobStatus::AwaitingSelection | JobStatus::Failed | JobStatus::Completed
            );
        if choosing {
            content = content
                .push(Space::new().height(Length::Fixed(10.0)))
                .push(self.format_card(
                    "Video",
                    FormatKind::VideoWithAudio,
                    &self.video_options,
                ))
                .push(self.format_card("Audio only", FormatKind::AudioOnly, &self.audio_options))
                .push(self.format_card(
                    "Video only",
                    FormatKind::VideoOnly,
                    &self.video_only_options,
                ))
                .push(
                    button("Best quality")
                        .on_press(DownloadMessage::BestPressed)
                        .padding([10, 20]),
                );
        }

        if busy {
            content = content
                .push(Space::new().height(Length::Fixed(10.0)))
                .push(progress_bar(0.0..=1.0, self.progress))
                .push(
                    text(format!(
                        "{:.0}% {}",
                        self.progress * 100.0,
                        self.progress_label
                    ))
                    .size(14),
                );
        }

        if let Some(file) = &self.completed {
            content = content
                .push(Space::new().height(Length::Fixed(10.0)))
                .push(text(format!("Ready: {}", file.filename)).size(16))
                .push(text(format_file_size(file.file_size)).size(14))
                .push(text(&file.file_url).size(12))
                .push(
                    button("Save file...")
                        .on_press(DownloadMessage::SavePressed)
                        .padding([10, 20]),
                );
            if let Some(save_status) = &self.save_status {
                content = content.push(text(save_status).size(14));
            }
        }

        if let Some(error) = &self.error {
            content = content.push(text(format!("Error: {}", error)).size(14));
        }

        content
            .push(Space::new().height(Length::Fixed(20.0)))
            .push(
                button("Start over")
                    .on_press(DownloadMessage::ResetPressed)
                    .padding([10, 20]),
            )
            .padding(20)
            .spacing(10)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_downloader::domain::{FormatDescriptor, MediaInfo};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59.4), "0:59");
        assert_eq!(format_duration(212.0), "3:32");
        assert_eq!(format_duration(3725.0), "1:02:05");
    }

    #[test]
    fn test_apply_media_info_fills_pickers() {
        let mut view = DownloadView::default();
        view.apply(SessionEvent::MediaInfoReady(MediaInfo {
            title: "Clip".to_string(),
            formats: vec![FormatDescriptor {
                format_id: "18".to_string(),
                ext: "mp4".to_string(),
                height: Some(360),
                has_audio: true,
                ..Default::default()
            }],
            ..Default::default()
        }));

        assert_eq!(view.title.as_deref(), Some("Clip"));
        assert_eq!(view.video_options.len(), 1);
        assert_eq!(view.video_options[0].label, "360p MP4 (Unknown size)");
        assert!(view.audio_options.is_empty());
    }

    #[test]
    fn test_reset_keeps_service_warning() {
        let mut view = DownloadView {
            url_input: "https://youtu.be/abc123".to_string(),
            error: Some("boom".to_string()),
            service_warning: Some("offline".to_string()),
            ..Default::default()
        };
        view.apply(SessionEvent::Reset);
        assert!(view.url_input.is_empty());
        assert!(view.error.is_none());
        assert_eq!(view.service_warning.as_deref(), Some("offline"));
    }
}
