use alicloud_collector::catalog;
use alicloud_exporter::{
    init_errors,
    init_logging,
    start_server,
    Args,
    Command,
};
use alicloud_exporter_config::ServiceKind;
use clap::Parser;
use color_eyre::Result;
use strum::IntoEnumIterator;

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let args = Args::parse();

    match args.command() {
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Metrics => {
            print_catalog();
            Ok(())
        }
        Command::Validate => {
            let config = args.load_config()?;
            config.validate()?;
            println!("Configuration is valid");
            Ok(())
        }
        Command::Run => {
            let config = args.load_config()?;
            init_logging(&config.server)?;
            config.validate()?;
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                alicloud = ?config.alicloud,
                "Starting Alibaba Cloud exporter"
            );
            start_server(config).await
        }
    }
}

fn print_catalog() {
    for kind in ServiceKind::iter() {
        let metrics = catalog::metrics(kind);
        println!("{kind}: {} ({} metrics)", kind.description(), metrics.len());
        for metric in metrics {
            println!("  {metric}");
        }
    }
}
