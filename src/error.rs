use thiserror::Error;

/// Errors surfaced while constructing or configuring an event queue.
///
/// Steady-state queue operations (post, next-event, dispatch, timer and
/// handler management) never fail with an error value; their contracts are
/// expressed through `bool`/`Option` returns instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// A queue instance is already installed in this process.
    #[error("an event queue is already installed in this process")]
    AlreadyInstalled,

    /// Registering the process interrupt watcher failed.
    #[error("failed to register interrupt watcher")]
    Interrupt(#[source] std::io::Error),

    /// Reading a config file from disk failed.
    #[error("failed to read config file")]
    ConfigIo(#[source] std::io::Error),

    /// A config file did not parse.
    #[error("failed to parse config file")]
    ConfigParse(#[from] toml::de::Error),
}
