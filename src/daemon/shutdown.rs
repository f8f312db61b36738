use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Detects signals sent to the process and cancels the token. Also returns once the token is
/// cancelled by anything else, so it never outlives the loops it guards.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
