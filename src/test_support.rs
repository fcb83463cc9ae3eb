use tokio::sync::Mutex as AsyncMutex;

/// Serializes tests that read or write `PADHAI_*` environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());
