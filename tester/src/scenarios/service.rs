//! Service scenarios

use super::ensure;
use crate::config::load;
use crate::error::HarnessResult;
use crate::runtime::SuiteContext;
use std::time::Duration;
use tracing::info;

/// The service answers HTTP and was started from the config we wrote
pub async fn service_ready(context: &SuiteContext) -> HarnessResult<()> {
    const NAME: &str = "service_ready";

    let written = load(&context.config_path)?;
    ensure(
        written == context.config,
        NAME,
        format!("{} does not match the suite config", context.config_path.display()),
    )?;

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    let response = client.get(&context.service_url).send().await?;
    info!("🌐 {} answered {}", context.service_url, response.status());
    ensure(
        !response.status().is_server_error(),
        NAME,
        format!("{} answered {}", context.service_url, response.status()),
    )
}
