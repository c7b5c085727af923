use std::path::{Path, PathBuf};

use futures::{stream::BoxStream, StreamExt};
use log::warn;
use tokio::io::AsyncWriteExt;

use crate::{
    api::ApiClient,
    domain::{SessionError, SessionEvent},
};

/// Stream the finished file of `job_id` into `path`.
/// Yields retrieval progress and ends with `RetrievalFinished` or `RetrievalFailed`.
/// The file is only created once the backend starts sending it, and is
/// removed again when the transfer fails.
pub fn file_stream(
    client: ApiClient,
    job_id: String,
    path: PathBuf,
) -> BoxStream<'static, SessionEvent> {
    futures::stream::unfold(
        RetrievalState::Start {
            client,
            job_id,
            path,
        },
        |state| async move {
            match state {
                RetrievalState::Start {
                    client,
                    job_id,
                    path,
                } => {
                    let (total_size, stream) = match client.download_file_stream(&job_id).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            return Some((
                                SessionEvent::RetrievalFailed(SessionError::Api(e.user_message())),
                                RetrievalState::Finished,
                            ));
                        }
                    };

                    let file = match tokio::fs::File::create(&path).await {
                        Ok(file) => file,
                        Err(e) => {
                            return Some((
                                SessionEvent::RetrievalFailed(SessionError::Io(format!(
                                    "Failed to create file: {}",
                                    e
                                ))),
                                RetrievalState::Finished,
                            ));
                        }
                    };

                    Some((
                        SessionEvent::RetrievalProgress(total_size.map(|_| 0.0)),
                        RetrievalState::Receiving {
                            file,
                            stream,
                            received: 0,
                            total: total_size,
                            path,
                        },
                    ))
                }
                RetrievalState::Receiving {
                    mut file,
                    mut stream,
                    mut received,
                    total,
                    path,
                } => match stream.next().await {
                    Some(Ok(chunk)) => {
                        if let Err(e) = file.write_all(&chunk).await {
                            drop(file);
                            discard(&path).await;
                            return Some((
                                SessionEvent::RetrievalFailed(SessionError::Io(format!(
                                    "Write error: {}",
                                    e
                                ))),
                                RetrievalState::Finished,
                            ));
                        }

                        received += chunk.len() as u64;

                        let progress = match total {
                            Some(total_size) if total_size > 0 => {
                                Some((received as f32 / total_size as f32).min(1.0))
                            }
                            _ => None,
                        };

                        Some((
                            SessionEvent::RetrievalProgress(progress),
                            RetrievalState::Receiving {
                                file,
                                stream,
                                received,
                                total,
                                path,
                            },
                        ))
                    }
                    Some(Err(e)) => {
                        drop(file);
                        discard(&path).await;
                        Some((
                            SessionEvent::RetrievalFailed(SessionError::Api(e.user_message())),
                            RetrievalState::Finished,
                        ))
                    }
                    None => {
                        if let Err(e) = file.sync_all().await {
                            drop(file);
                            discard(&path).await;
                            return Some((
                                SessionEvent::RetrievalFailed(SessionError::Io(format!(
                                    "Failed to sync file: {}",
                                    e
                                ))),
                                RetrievalState::Finished,
                            ));
                        }

                        Some((
                            SessionEvent::RetrievalFinished(path),
                            RetrievalState::Finished,
                        ))
                    }
                },
                RetrievalState::Finished => None,
            }
        },
    )
    .boxed()
}

/// Remove a partially written file
async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove partial file {}: {}", path.display(), e);
    }
}

enum RetrievalState {
    Start {
        client: ApiClient,
        job_id: String,
        path: PathBuf,
    },
    Receiving {
        file: tokio::fs::File,
        stream: BoxStream<'static, crate::api::Result<bytes::Bytes>>,
        received: u64,
        total: Option<u64>,
        path: PathBuf,
    },
    Finished,
}
