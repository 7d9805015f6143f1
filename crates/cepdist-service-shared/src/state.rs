//! Application state contract shared by the service routers.

use cepdist_lib::Database;

/// What the shared handlers need from a service's state.
///
/// Implementations are cheap to clone (`Arc`/handle based) and are passed to
/// axum through `Router::with_state`.
pub trait ServiceState: Clone + Send + Sync + 'static {
    /// Short service name used in health responses and logs.
    fn service_name(&self) -> &'static str;

    /// Service version, usually `env!("CARGO_PKG_VERSION")` of the binary crate.
    fn version(&self) -> &'static str;

    /// The SQLite database backing the service's stores.
    fn database(&self) -> &Database;
}
