use std::path::PathBuf;

use futures::channel::mpsc::UnboundedReceiver;
use iced::Task;
use log::{debug, warn};

use crate::ui::{DownloadMessage, DownloadView};
use lumen_downloader::application::channel_observer;
use lumen_downloader::domain::{JobStatus, SessionError, SessionEvent};
use lumen_downloader::{ApiClient, SessionController};

pub struct DownloadApp {
    view: DownloadView,
    controller: SessionController,
    // Handed to iced as a stream on the first interaction
    events: Option<UnboundedReceiver<SessionEvent>>,
}

impl DownloadApp {
    pub fn new(api_client: ApiClient) -> Self {
        let (observer, events) = channel_observer();
        let controller = SessionController::new(api_client, observer);

        Self {
            view: DownloadView::default(),
            controller,
            events: Some(events),
        }
    }

    /// Start listening to the controller, and probe the backend while at it
    fn attach_events(&mut self) -> Task<Message> {
        let Some(events) = self.events.take() else {
            return Task::none();
        };

        let controller = self.controller.clone();
        Task::batch([
            Task::stream(events).map(Message::Session),
            Task::perform(
                async move { controller.check_health().await },
                Message::HealthChecked,
            ),
        ])
    }

    fn run<F>(&mut self, action: F) -> Task<Message>
    where
        F: std::future::Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        let attach = self.attach_events();
        Task::batch([attach, Task::perform(action, Message::ActionFinished)])
    }

    /// Coming back from a finished or failed job, pick again from the same media
    fn reopen_selection(&self) {
        if matches!(
            self.controller.status(),
            JobStatus::Completed | JobStatus::Failed
        ) {
            self.controller.back_to_selection();
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    Session(SessionEvent),
    HealthChecked(Result<bool, SessionError>),
    /// Outcome of an analyse or download request
    ActionFinished(Result<(), SessionError>),
    /// Where to save the finished file, None when the dialog was dismissed
    SaveLocationChosen(Option<PathBuf>),
    Saved(Result<PathBuf, SessionError>),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::AnalyzePressed => {
                    let controller = app.controller.clone();
                    let url = app.view.url_input.clone();
                    return app.run(async move { controller.set_source_url(&url).await });
                }
                DownloadMessage::DownloadPressed(kind) => {
                    let Some(format_id) = app.view.picked(kind).map(|o| o.format_id.clone())
                    else {
                        return Task::none();
                    };

                    app.reopen_selection();
                    if app.controller.select_format(&format_id) {
                        let controller = app.controller.clone();
                        return app.run(async move { controller.start_download().await });
                    }
                }
                DownloadMessage::BestPressed => {
                    app.reopen_selection();
                    if app.controller.select_best() {
                        let controller = app.controller.clone();
                        return app.run(async move { controller.start_download().await });
                    }
                }
                DownloadMessage::SavePressed => {
                    let Some(suggested_filename) = app.controller.suggested_filename() else {
                        return Task::none();
                    };

                    return Task::perform(
                        async move {
                            rfd::AsyncFileDialog::new()
                                .set_file_name(&suggested_filename)
                                .save_file()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::SaveLocationChosen,
                    );
                }
                DownloadMessage::ResetPressed => {
                    app.controller.reset();
                }
                DownloadMessage::UrlChanged(_) | DownloadMessage::FormatPicked(..) => {}
            }
        }
        Message::Session(event) => {
            app.view.apply(event);
        }
        Message::HealthChecked(result) => match result {
            Ok(true) => debug!("Download service is healthy"),
            Ok(false) => {
                app.view.service_warning =
                    Some("The download service reports it is not healthy".to_string());
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                app.view.service_warning =
                    Some(format!("The download service is unreachable: {}", e));
            }
        },
        Message::ActionFinished(result) => {
            // Failures already reached the view as session events
            match result {
                Err(e) if e.is_validation() => debug!("Rejected input: {}", e),
                Err(e) => warn!("Action failed: {}", e),
                Ok(()) => {}
            }
        }
        Message::SaveLocationChosen(path_opt) => match path_opt {
            Some(path) => {
                let controller = app.controller.clone();
                return Task::perform(
                    async move { controller.retrieve_to(path).await },
                    Message::Saved,
                );
            }
            None => {
                // User cancelled dialog
                app.view.save_status = Some("Save cancelled".to_string());
            }
        },
        Message::Saved(result) => {
            if let Err(e) = result {
                debug!("Saving ended with: {}", e);
            }
        }
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
