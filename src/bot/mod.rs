pub mod telegram;

use anyhow::Result;

use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    telegram::run(config).await
}
