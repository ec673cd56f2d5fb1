use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancelation` on Ctrl-C, or returns quietly once something else cancels it first.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    info!("Received Ctrl-C");
                    cancelation.cancel();
                }
                Err(e) => {
                    error!("Failed to listen for Ctrl-C {e:?}");
                    cancelation.cancelled().await;
                }
            }
        },
        _ = cancelation.cancelled() => {},
    };
}
