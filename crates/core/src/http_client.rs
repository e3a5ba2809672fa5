use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client shared by every upstream strategy.
///
/// `request_timeout` is a backstop. Callers wrap each attempt in
/// `tokio::time::timeout` with a shorter deadline that covers body reads too.
pub fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, anyhow::Error> {
    let client = Client::builder()
        .user_agent(concat!("kite/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .no_proxy()
        .build()?;
    Ok(client)
}
