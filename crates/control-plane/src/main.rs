use control_plane::config::{Config, LogFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load error: {err}");
            return ExitCode::from(1);
        }
    };

    init_logging(config.log_format);

    let catalog = match control_plane::connect_catalog(&config).await {
        Ok(catalog) => catalog,
        Err(err) => {
            tracing::error!(error = %err, "catalog unreachable");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = control_plane::serve(config, catalog).await {
        tracing::error!(error = %err, "control plane exited");
        return ExitCode::from(3);
    }
    ExitCode::SUCCESS
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}
