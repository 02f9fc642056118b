use std::io::Write;

/// Initialise `env_logger` from `RUST_LOG` with millisecond timestamps and source locations.
///
/// Meant for applications, call it at the start of `main` before opening a connection. The
/// crate only logs through the `log` facade, so any other logger works as well. Calling it
/// more than once is harmless, later calls are ignored.
pub fn setup_logger() {
    let mut builder = env_logger::Builder::from_default_env();

    let _ = builder
        .format_timestamp_millis()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - [{}] {}:{} {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.args()
            )
        })
        .try_init();
}

/// Logger for unit and integration tests, output is captured by the test harness.
pub fn setup_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Send a value on a bounded mpsc, giving up after `timeout`.
pub(crate) async fn send_timeout<T>(
    ms: &tokio::sync::mpsc::Sender<T>,
    value: T,
    timeout: std::time::Duration,
) -> anyhow::Result<()> {
    match ms.send_timeout(value, timeout).await {
        Ok(()) => Ok(()),
        Err(tokio::sync::mpsc::error::SendTimeoutError::Timeout(_)) => {
            crate::client_error!(Transport, None, 541, "Timeout during sending to the connection", 0)
        }
        Err(tokio::sync::mpsc::error::SendTimeoutError::Closed(_)) => {
            crate::client_error!(Transport, None, 541, "Connection is closed", 0)
        }
    }
}
