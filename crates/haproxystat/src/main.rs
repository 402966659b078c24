use clap::Parser;
use haproxystat::conf::Cli;
use haproxystat::runtime::{boot, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    boot::init_logging(cli.log_level.as_deref());
    let service = boot::boot(&cli)?;
    serve::serve(service).await
}
