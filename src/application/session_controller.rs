use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::observer::SessionObserver;
use super::retrieval;
use crate::api::models::ProgressResponse;
use crate::api::ApiClient;
use crate::domain::{
    detect_platform, CompletedFile, FormatBuckets, JobStatus, MediaInfo, Platform, Session,
    SessionError, SessionEvent, BEST_FORMAT,
};
use crate::utils::sanitize_filename;

const UNKNOWN_TITLE: &str = "Unknown Title";
const FALLBACK_FILENAME: &str = "Downloaded File";
const STARTING_LABEL: &str = "Starting download...";
const DOWNLOADING_LABEL: &str = "Downloading...";
const COMPLETED_LABEL: &str = "Download completed!";

/// Result of one progress check
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Progress { percent: u8, label: String },
    Completed(CompletedFile),
    Failed(String),
    /// The poll belonged to a job that was reset or replaced meanwhile
    Stopped,
    /// No job is being tracked
    Inactive,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollOutcome::Progress { .. })
    }
}

struct Inner {
    session: Session,
    /// Bumped on every new URL, new job, return to selection and reset.
    /// Replies from an older epoch are discarded.
    epoch: u64,
    /// Token of the one poll loop allowed to touch the session
    poller: Option<CancellationToken>,
}

/// Drives one download session: analyse a URL, pick a format, run a job on
/// the backend and follow its progress until a file is ready.
///
/// Cloning yields another handle to the same session. Hosts wanting several
/// sessions create several controllers.
#[derive(Clone)]
pub struct SessionController {
    api: ApiClient,
    inner: Arc<Mutex<Inner>>,
    observer: Arc<dyn SessionObserver>,
    live_pollers: Arc<AtomicUsize>,
}

/// Counts a running poll loop for as long as it is alive
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A URL is accepted when it parses as an absolute http(s) URL with a host
pub fn validate_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).ok()?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    if matches!(url.scheme(), "http" | "https") && has_host {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn stop_poller(inner: &mut Inner) {
    if let Some(token) = inner.poller.take() {
        debug!("Stopping progress polling for job {:?}", inner.session.job_id);
        token.cancel();
    }
}

fn fail(inner: &mut Inner, events: &mut Vec<SessionEvent>, message: String) {
    warn!("Session failed: {}", message);
    inner.session.job_status = JobStatus::Failed;
    inner.session.last_error = Some(message.clone());
    events.push(SessionEvent::StatusChanged(JobStatus::Failed));
    events.push(SessionEvent::Failed(message));
}

fn reject(inner: &mut Inner, events: &mut Vec<SessionEvent>, error: SessionError) -> SessionError {
    debug!("Rejected: {}", error);
    inner.session.last_error = Some(error.to_string());
    events.push(SessionEvent::ValidationError(error.to_string()));
    error
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn percent_of(progress: Option<f64>) -> u8 {
    match progress {
        Some(p) if p.is_finite() => p.clamp(0.0, 100.0).round() as u8,
        _ => 0,
    }
}

impl SessionController {
    pub fn new(api: ApiClient, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            api,
            inner: Arc::new(Mutex::new(Inner {
                session: Session::default(),
                epoch: 0,
                poller: None,
            })),
            observer,
            live_pollers: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the session under the lock, then hand the collected events to
    /// the observer once the lock is released.
    fn update<R>(&self, f: impl FnOnce(&mut Inner, &mut Vec<SessionEvent>) -> R) -> R {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.lock();
            f(&mut *inner, &mut events)
        };
        for event in events {
            self.observer.notify(event);
        }
        result
    }

    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.lock().session.job_status
    }

    /// Whether a poll loop is currently scheduled for this session
    pub fn is_polling(&self) -> bool {
        self.lock().poller.is_some()
    }

    /// Number of poll loop tasks still running
    pub fn live_pollers(&self) -> usize {
        self.live_pollers.load(Ordering::SeqCst)
    }

    pub fn detect_platform(url: &str) -> Platform {
        detect_platform(url)
    }

    /// Take a pasted link. A malformed URL only records the error; a valid
    /// one starts a fresh session and analyses it.
    pub async fn set_source_url(&self, url: &str) -> Result<(), SessionError> {
        let Some(url) = validate_url(url) else {
            return Err(self.update(|inner, events| {
                reject(inner, events, SessionError::InvalidUrl)
            }));
        };

        let epoch = self.update(|inner, events| {
            stop_poller(inner);
            inner.epoch += 1;

            let platform = detect_platform(&url);
            info!("Analyzing {} link: {}", platform, url);
            inner.session = Session {
                source_url: url.clone(),
                platform,
                job_status: JobStatus::Analyzing,
                ..Session::default()
            };
            events.push(SessionEvent::PlatformDetected(platform));
            events.push(SessionEvent::StatusChanged(JobStatus::Analyzing));
            inner.epoch
        });

        self.run_analysis(url, epoch).await
    }

    /// Re-run metadata analysis for the current URL
    pub async fn fetch_media_info(&self) -> Result<(), SessionError> {
        let (url, epoch) = self.update(|inner, events| {
            if inner.session.source_url.is_empty() {
                return Err(reject(inner, events, SessionError::InvalidUrl));
            }

            stop_poller(inner);
            inner.epoch += 1;

            let session = &mut inner.session;
            session.media_info = None;
            session.buckets = FormatBuckets::default();
            session.selected_format_id.clear();
            session.job_id.clear();
            session.completed = None;
            session.last_error = None;
            session.progress = 0;
            session.status_label.clear();
            session.job_status = JobStatus::Analyzing;
            events.push(SessionEvent::StatusChanged(JobStatus::Analyzing));
            Ok((session.source_url.clone(), inner.epoch))
        })?;

        self.run_analysis(url, epoch).await
    }

    async fn run_analysis(&self, url: String, epoch: u64) -> Result<(), SessionError> {
        let result = self.api.get_media_info(&url).await;

        self.update(|inner, events| {
            if inner.epoch != epoch {
                debug!("Discarding stale media info for {}", url);
                return Ok(());
            }

            match result {
                Ok(reply) => {
                    let media = MediaInfo {
                        title: non_empty(reply.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                        thumbnail_url: non_empty(reply.thumbnail),
                        duration_seconds: reply.duration.filter(|d| *d > 0.0),
                        formats: reply.formats,
                    };
                    info!(
                        "Media info for {:?}: {} formats",
                        media.title,
                        media.formats.len()
                    );

                    let session = &mut inner.session;
                    session.buckets = FormatBuckets::classify(&media.formats);
                    session.media_info = Some(media.clone());
                    session.last_error = None;
                    session.job_status = JobStatus::AwaitingSelection;
                    events.push(SessionEvent::MediaInfoReady(media));
                    events.push(SessionEvent::StatusChanged(JobStatus::AwaitingSelection));
                    Ok(())
                }
                Err(e) => {
                    let message = e.user_message();
                    fail(inner, events, message.clone());
                    Err(SessionError::Api(message))
                }
            }
        })
    }

    /// Pick one of the analysed formats. Ignored outside of format selection
    /// or for ids the backend did not offer.
    pub fn select_format(&self, format_id: &str) -> bool {
        self.update(|inner, events| {
            let session = &mut inner.session;
            let offered = session
                .media_info
                .as_ref()
                .is_some_and(|m| m.has_format(format_id));
            if session.job_status != JobStatus::AwaitingSelection || !offered {
                debug!("Ignoring selection of format {:?}", format_id);
                return false;
            }

            session.selected_format_id = format_id.to_string();
            events.push(SessionEvent::FormatSelected(format_id.to_string()));
            true
        })
    }

    /// Let the backend choose its best combined stream
    pub fn select_best(&self) -> bool {
        self.update(|inner, events| {
            let session = &mut inner.session;
            if session.job_status != JobStatus::AwaitingSelection {
                return false;
            }

            session.selected_format_id = BEST_FORMAT.to_string();
            events.push(SessionEvent::FormatSelected(BEST_FORMAT.to_string()));
            true
        })
    }

    /// Return from a finished or failed job to format selection, keeping the
    /// analysed media. Returns false when there is nothing to go back to.
    pub fn back_to_selection(&self) -> bool {
        self.update(|inner, events| {
            let finished = matches!(
                inner.session.job_status,
                JobStatus::Completed | JobStatus::Failed
            );
            if !finished || inner.session.media_info.is_none() {
                return false;
            }

            stop_poller(inner);
            inner.epoch += 1;

            let session = &mut inner.session;
            session.selected_format_id.clear();
            session.job_id.clear();
            session.completed = None;
            session.last_error = None;
            session.progress = 0;
            session.status_label.clear();
            session.job_status = JobStatus::AwaitingSelection;
            events.push(SessionEvent::StatusChanged(JobStatus::AwaitingSelection));
            true
        })
    }

    /// Create a job for the selected format and start following it. Any
    /// previous poll loop is stopped first.
    pub async fn start_download(&self) -> Result<(), SessionError> {
        let (url, format, title, epoch) = self.update(|inner, events| {
            let title = match &inner.session.media_info {
                Some(media) if inner.session.job_status.allows_download() => media.title.clone(),
                _ => return Err(reject(inner, events, SessionError::NoMediaInfo)),
            };
            if inner.session.selected_format_id.is_empty() {
                return Err(reject(inner, events, SessionError::NoFormatSelected));
            }

            stop_poller(inner);
            inner.epoch += 1;

            let session = &mut inner.session;
            session.job_id.clear();
            session.completed = None;
            session.last_error = None;
            session.progress = 0;
            session.status_label = STARTING_LABEL.to_string();
            events.push(SessionEvent::Progress {
                percent: 0,
                label: STARTING_LABEL.to_string(),
            });

            Ok((
                session.source_url.clone(),
                session.selected_format_id.clone(),
                title,
                inner.epoch,
            ))
        })?;

        info!("Requesting download of {} as {:?}", url, format);
        let result = self
            .api
            .create_download(&url, &format, Some(title.as_str()))
            .await;

        let started = self.update(|inner, events| {
            if inner.epoch != epoch {
                debug!("Discarding stale download job for {}", url);
                return Ok(None);
            }

            match result {
                Ok(job_id) => {
                    info!("Download job {} created", job_id);
                    let token = CancellationToken::new();
                    inner.poller = Some(token.clone());
                    inner.session.job_id = job_id.clone();
                    inner.session.job_status = JobStatus::Downloading;
                    events.push(SessionEvent::StatusChanged(JobStatus::Downloading));
                    Ok(Some((job_id, token)))
                }
                Err(e) => {
                    let message = e.user_message();
                    fail(inner, events, message.clone());
                    Err(SessionError::Api(message))
                }
            }
        })?;

        if let Some((job_id, token)) = started {
            tokio::spawn(self.clone().poll_loop(job_id, token));
        }
        Ok(())
    }

    async fn poll_loop(self, job_id: String, token: CancellationToken) {
        let _live = LiveGuard::new(self.live_pollers.clone());
        let period = self.api.config().poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            debug!("Polling progress of job {}", job_id);
            if self.poll_job(&job_id, &token).await.is_terminal() {
                break;
            }
        }
        debug!("Poll loop for job {} finished", job_id);
    }

    /// Check the progress of the current job once
    pub async fn poll(&self) -> PollOutcome {
        let tracked = {
            let inner = self.lock();
            let downloading = inner.session.job_status == JobStatus::Downloading
                && !inner.session.job_id.is_empty();
            let job_id = inner.session.job_id.clone();
            inner.poller.clone().filter(|_| downloading).map(|token| (job_id, token))
        };

        match tracked {
            Some((job_id, token)) => self.poll_job(&job_id, &token).await,
            None => PollOutcome::Inactive,
        }
    }

    async fn poll_job(&self, job_id: &str, token: &CancellationToken) -> PollOutcome {
        let result = tokio::select! {
            _ = token.cancelled() => return PollOutcome::Stopped,
            result = self.api.get_progress(job_id) => result,
        };

        self.update(|inner, events| {
            // Whoever cancels the token first (reset, a new job, or a
            // terminal reply) owns the transition.
            if token.is_cancelled() {
                return PollOutcome::Stopped;
            }

            match result {
                Ok(reply) if reply.completed => {
                    token.cancel();
                    inner.poller = None;
                    let file = self.completed_file(&inner.session, job_id, reply);
                    info!("Job {} completed: {}", job_id, file.filename);

                    let session = &mut inner.session;
                    session.progress = 100;
                    session.status_label = COMPLETED_LABEL.to_string();
                    session.completed = Some(file.clone());
                    session.job_status = JobStatus::Completed;
                    events.push(SessionEvent::StatusChanged(JobStatus::Completed));
                    events.push(SessionEvent::Completed(file.clone()));
                    PollOutcome::Completed(file)
                }
                Ok(reply) => {
                    let percent = percent_of(reply.progress);
                    let label =
                        non_empty(reply.status).unwrap_or_else(|| DOWNLOADING_LABEL.to_string());

                    let session = &mut inner.session;
                    session.progress = percent;
                    session.status_label = label.clone();
                    events.push(SessionEvent::Progress {
                        percent,
                        label: label.clone(),
                    });
                    PollOutcome::Progress { percent, label }
                }
                Err(e) => {
                    token.cancel();
                    inner.poller = None;
                    let message = e.user_message();
                    fail(inner, events, message.clone());
                    PollOutcome::Failed(message)
                }
            }
        })
    }

    fn completed_file(
        &self,
        session: &Session,
        job_id: &str,
        reply: ProgressResponse,
    ) -> CompletedFile {
        let filename = non_empty(reply.filename)
            .or_else(|| session.media_info.as_ref().map(|m| m.title.clone()))
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

        CompletedFile {
            filename,
            file_size: reply.file_size.filter(|s| *s > 0),
            file_url: self.api.file_url(job_id),
        }
    }

    /// Drop everything and return to `Idle`. Safe in any state.
    pub fn reset(&self) {
        self.update(|inner, events| {
            stop_poller(inner);
            inner.epoch += 1;
            inner.session = Session::default();
            info!("Session reset");
            events.push(SessionEvent::Reset);
            events.push(SessionEvent::StatusChanged(JobStatus::Idle));
        });
    }

    /// Retrieval link of the finished file
    pub fn file_url(&self) -> Option<String> {
        self.lock()
            .session
            .completed
            .as_ref()
            .map(|f| f.file_url.clone())
    }

    /// File name to propose when saving the finished file locally
    pub fn suggested_filename(&self) -> Option<String> {
        self.lock().session.completed.as_ref().map(|f| {
            sanitize_filename(&f.filename)
                .trim_matches(|c| c == '.' || c == ' ')
                .to_string()
        })
    }

    /// Save the finished file to `path`, reporting progress to the observer
    pub async fn retrieve_to(&self, path: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        let job_id = {
            let inner = self.lock();
            let ready = inner.session.job_status == JobStatus::Completed
                && inner.session.completed.is_some();
            let job_id = inner.session.job_id.clone();
            ready.then_some(job_id)
        }
        .ok_or(SessionError::NotCompleted)?;

        let path = path.as_ref().to_path_buf();
        let mut stream = retrieval::file_stream(self.api.clone(), job_id, path);
        let mut outcome = Err(SessionError::NotCompleted);
        while let Some(event) = stream.next().await {
            match &event {
                SessionEvent::RetrievalFinished(saved) => {
                    info!("Saved file to {}", saved.display());
                    outcome = Ok(saved.clone());
                }
                SessionEvent::RetrievalFailed(error) => {
                    warn!("Saving file failed: {}", error);
                    outcome = Err(error.clone());
                }
                _ => {}
            }
            self.observer.notify(event);
        }
        outcome
    }

    /// Whether the backend answers its health check
    pub async fn check_health(&self) -> Result<bool, SessionError> {
        self.api
            .health()
            .await
            .map_err(|e| SessionError::Api(e.user_message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url("  https://youtu.be/abc123 "),
            Some("https://youtu.be/abc123".to_string())
        );
        assert!(validate_url("https://example.com/x").is_some());
        assert!(validate_url("youtube.com/watch?v=1").is_none());
        assert!(validate_url("ftp://example.com/file").is_none());
        assert!(validate_url("").is_none());
        assert!(validate_url("not a url").is_none());
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(Some(42.4)), 42);
        assert_eq!(percent_of(Some(150.0)), 100);
        assert_eq!(percent_of(Some(-3.0)), 0);
        assert_eq!(percent_of(Some(f64::NAN)), 0);
        assert_eq!(percent_of(None), 0);
    }

    #[test]
    fn test_poll_outcome_terminal() {
        assert!(!PollOutcome::Progress {
            percent: 1,
            label: String::new()
        }
        .is_terminal());
        assert!(PollOutcome::Stopped.is_terminal());
        assert!(PollOutcome::Failed("x".into()).is_terminal());
    }
}
