use std::time::Duration;

use reqwest::Client;

use crate::error::TransportError;

const DISABLE_SYSTEM_PROXY_ENV: &str = "RELAYCHAT_DISABLE_SYSTEM_PROXY";

pub(crate) fn build_http_client(connect_timeout: Duration) -> Result<Client, TransportError> {
    let builder = Client::builder().connect_timeout(connect_timeout);
    let builder = if should_disable_system_proxy() {
        builder.no_proxy()
    } else {
        builder
    };
    Ok(builder.build()?)
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
