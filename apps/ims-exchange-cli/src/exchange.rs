use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use ims_exchange::{ExchangeOptions, IntegrationConfig, exchange_with};

#[derive(Args, Debug)]
pub struct ExchangeArgs {
    /// Integration document (JSON) downloaded from the developer console
    #[arg(value_name = "JSONFILE")]
    pub file: PathBuf,
}

impl ExchangeArgs {
    /// Load the integration, exchange it and render the token response as
    /// pretty JSON.
    pub async fn run(&self, verbose: bool) -> anyhow::Result<String> {
        self.run_with(&ExchangeOptions {
            verbose,
            ..ExchangeOptions::default()
        })
        .await
    }

    async fn run_with(&self, options: &ExchangeOptions) -> anyhow::Result<String> {
        let config = IntegrationConfig::load(&self.file)?;
        let token = exchange_with(&config, options).await?;
        serde_json::to_string_pretty(&token).context("cannot render token response")
    }
}
