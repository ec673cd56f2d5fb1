use anyhow::Result;

/// Every transition and tick runs on this one thread, so timer and store state need no locks.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
