//! OS signal handling.
//!
//! The workers are plain threads, so signals are awaited on a small
//! current-thread Tokio runtime owned by the main thread.

use std::io;

/// Block until Ctrl-C or SIGTERM arrives.
pub fn wait_for_signal() -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(shutdown_signal())
}

async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    let terminate = async {
        let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        stream.recv().await;
        Ok::<(), io::Error>(())
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<()>>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!(signal = "SIGINT", "Signal received");
        }
        result = terminate => {
            result?;
            tracing::info!(signal = "SIGTERM", "Signal received");
        }
    }
    Ok(())
}
