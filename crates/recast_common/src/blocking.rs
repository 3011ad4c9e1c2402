//! Synchronous bridge over the async implementation.
//!
//! Every `*_blocking` method in the workspace is the async method driven to
//! completion here, so the two surfaces cannot drift apart.

use std::future::Future;

/// Runs `future` to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if called from within an async execution context; async callers
/// must use the async method directly.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
