use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("no stream registered for invocation {0}")]
    NotFound(Uuid),
    #[error("stream {0} is already finished")]
    AlreadyFinished(Uuid),
}
