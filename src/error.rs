use tokio::runtime::TryCurrentError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Deferred executions are scheduled on a tokio runtime, and none was running.
    #[error("debounce gate needs a tokio runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

pub type Result<T> = std::result::Result<T, Error>;
