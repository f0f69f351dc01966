use crate::client::Client;
use crate::commands::{
    Commands, CreateMirrorRequest, CreateMirrorResponse, CreatePeerRequest, CreatePeerResponse, MirrorCommand,
    MirrorStatusResponse, NameArg, PeerCommand, PeerTestResult, SchemaDeltaResponse, TableEntry, parse_mapping,
};
use crate::error::CliError;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod error;

#[derive(Parser)]
#[command(name = "bunnydb", version = "0.1.0", about = "PostgreSQL-to-PostgreSQL CDC replication")]
struct Cli {
    /// Control plane base URL.
    #[arg(long, env = "BUNNY_API_URL", default_value = "http://127.0.0.1:8085")]
    api_url: String,

    /// Bearer token for the control plane's auth layer.
    #[arg(long, env = "BUNNY_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Commands::Serve = cli.command {
        return serve().await;
    }

    let client = Client::new(cli.api_url, cli.token);
    match run(&client, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::from(1)
        }
    }
}

async fn serve() -> ExitCode {
    let config = match control_plane::config::Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load error: {err}");
            return ExitCode::from(1);
        }
    };

    let catalog = match control_plane::connect_catalog(&config).await {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "catalog unreachable");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = control_plane::serve(config, catalog).await {
        error!(error = %err, "control plane exited");
        return ExitCode::from(3);
    }
    ExitCode::SUCCESS
}

async fn run(client: &Client, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Serve => unreachable!("handled before client construction"),
        Commands::Peer { command } => run_peer(client, command).await,
        Commands::Mirror { command } => run_mirror(client, command).await,
    }
}

async fn run_peer(client: &Client, command: PeerCommand) -> Result<(), CliError> {
    match command {
        PeerCommand::Create { name, host, port, user, password, database, ssl_mode } => {
            let body = CreatePeerRequest { name, host, port, user, password, database, ssl_mode };
            let response: CreatePeerResponse = client.post("/v1/peers", &body).await?;
            println!("peer '{}' created", response.id);
        }
        PeerCommand::Test { name } => {
            let result: PeerTestResult = client.post_empty_returning(&format!("/v1/peers/{name}/test")).await?;
            match result.error {
                Some(error) => println!("peer '{name}': unreachable ({error})"),
                None => println!("peer '{name}': ok (server_version_num={:?})", result.version),
            }
        }
        PeerCommand::Tables { name } => {
            let tables: Vec<TableEntry> = client.get(&format!("/v1/peers/{name}/tables")).await?;
            for table in tables {
                println!("{}.{}", table.schema, table.table);
            }
        }
    }
    Ok(())
}

async fn run_mirror(client: &Client, command: MirrorCommand) -> Result<(), CliError> {
    match command {
        MirrorCommand::Create { name, source_peer, destination_peer, mappings, no_initial_snapshot } => {
            let table_mappings = mappings
                .iter()
                .map(|raw| parse_mapping(raw).map_err(|value| CliError::InvalidArg { flag: "mapping", value }))
                .collect::<Result<Vec<_>, _>>()?;
            let body = CreateMirrorRequest {
                name,
                source_peer,
                destination_peer,
                do_initial_snapshot: !no_initial_snapshot,
                table_mappings,
            };
            let response: CreateMirrorResponse = client.post("/v1/mirrors", &body).await?;
            println!("mirror '{}' {}", response.name, response.status);
        }
        MirrorCommand::Get(NameArg { name }) => {
            let status: MirrorStatusResponse = client.get(&format!("/v1/mirrors/{name}")).await?;
            print_mirror_status(&status);
        }
        MirrorCommand::Pause(NameArg { name }) => {
            client.post_empty(&format!("/v1/mirrors/{name}/pause")).await?;
            println!("mirror '{name}' pausing");
        }
        MirrorCommand::Resume(NameArg { name }) => {
            client.post_empty(&format!("/v1/mirrors/{name}/resume")).await?;
            println!("mirror '{name}' resuming");
        }
        MirrorCommand::Resync(NameArg { name }) => {
            client.post_empty(&format!("/v1/mirrors/{name}/resync")).await?;
            println!("mirror '{name}' resync requested");
        }
        MirrorCommand::ResyncTable { name, table } => {
            client.post_empty(&format!("/v1/mirrors/{name}/resync/{table}")).await?;
            println!("mirror '{name}' table '{table}' resync requested");
        }
        MirrorCommand::Retry(NameArg { name }) => {
            client.post_empty(&format!("/v1/mirrors/{name}/retry")).await?;
            println!("mirror '{name}' retrying");
        }
        MirrorCommand::SyncSchema(NameArg { name }) => {
            client.post_empty(&format!("/v1/mirrors/{name}/sync-schema")).await?;
            println!("mirror '{name}' schema sync requested");
        }
        MirrorCommand::SchemaDiff(NameArg { name }) => {
            let deltas: Vec<SchemaDeltaResponse> = client.get(&format!("/v1/mirrors/{name}/schema-diff")).await?;
            if deltas.is_empty() {
                println!("mirror '{name}': no pending schema deltas");
            }
            for delta in deltas {
                println!("{}: {} -> {}", delta.destination_table, delta.kind, delta.payload);
            }
        }
        MirrorCommand::Delete(NameArg { name }) => {
            client.delete(&format!("/v1/mirrors/{name}")).await?;
            println!("mirror '{name}' deleted");
        }
    }
    Ok(())
}

fn print_mirror_status(status: &MirrorStatusResponse) {
    println!("mirror '{}': {}", status.name, status.status);
    println!("  slot:            {}", status.slot_name);
    println!("  publication:     {}", status.publication_name);
    println!("  last applied lsn: {}", status.last_applied_lsn);
    println!("  last sync batch:  {}", status.last_sync_batch_id);
    if let Some(error) = &status.error {
        println!("  error:            {error}");
    }
    for table in &status.tables {
        let error = table.last_error.as_deref().unwrap_or("-");
        println!("  [{}] {} rows_synced={} last_error={error}", table.status, table.destination_table, table.rows_synced);
    }
}
