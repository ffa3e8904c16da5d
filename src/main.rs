use clap::Parser;
use log::info;
use recipe_capture::{load_config, serve};

#[derive(Parser)]
#[command(name = "recipe-capture")]
#[command(about = "Relay recipe transcription and parsing requests to upstream services")]
#[command(version)]
struct Cli {
    /// Address to listen on (overrides RECIPE_CAPTURE__LISTEN_ADDR)
    #[arg(long)]
    listen: Option<String>,

    /// Base URL of the transcription service (overrides RECIPE_CAPTURE__UPSTREAM_URL)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Base URL of the recipe parser service (overrides RECIPE_CAPTURE__PARSER_URL)
    #[arg(long)]
    parser_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Cli::parse();

    let mut config = load_config()?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(url) = args.upstream_url {
        config.upstream_url = url;
    }
    if let Some(url) = args.parser_url {
        config.parser_url = Some(url);
    }
    info!("Starting recipe-capture {}", env!("CARGO_PKG_VERSION"));

    serve(config).await
}
