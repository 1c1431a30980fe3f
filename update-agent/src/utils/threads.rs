use std::thread::{Builder, JoinHandle};
use tracing::trace;

/// Spawns `f` on a thread named `name`, so it can be told apart in logs and debuggers.
pub fn spawn_named_thread<F, T, S>(name: S, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
    S: Into<String>,
{
    let name = name.into();
    trace!(thread = %name, "spawning thread");
    Builder::new()
        .name(name)
        .spawn(f)
        .expect("thread config should be valid")
}
