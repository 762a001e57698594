use clap::Parser;
use color_eyre::eyre::Result;

use adedel::cli::{self, Cli};
use adedel::{error, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    error::install_hooks()?;

    let args = Cli::parse();
    logging::init(args.verbose);

    cli::run(args).await
}
