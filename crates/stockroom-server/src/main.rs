// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use stockroom_server::{init_tracing, run_server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = ServerConfig::from_env();
    init_tracing(config.log_json, config.log_level.as_deref());
    run_server(config).await
}
