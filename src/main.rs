use std::io::BufRead;
use todo_sync::client_context::ClientContext;
use todo_sync::config::{self, AppConfig, Backend};
use todo_sync::domain::identity::driven_ports::IdentityProvider;
use todo_sync::domain::store::driven_ports::DocumentStore;
use todo_sync::domain::sync::{SyncController, SystemClock};
use todo_sync::logging::{self, OtelExporterEndpoints};
use todo_sync::ui::terminal::TerminalSession;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    config::load_dotenv()?;
    let app_config = AppConfig::from_env()?;

    let otel_exporters = match &app_config.otel {
        Some(endpoints) => Some(logging::init_exporters(&OtelExporterEndpoints::from(
            endpoints,
        ))?),
        None => None,
    };
    let telemetry = logging::setup_logging_and_tracing(logging::init_env_filter()?, otel_exporters);

    let result = run_backend(&app_config.backend).await;
    if let Err(err) = &result {
        error!("Client stopped with an error: {err:#}");
    }

    telemetry.shutdown().await;
    result
}

async fn run_backend(backend: &Backend) -> Result<(), anyhow::Error> {
    match backend {
        Backend::Firebase(firebase) => run_client(ClientContext::init_firebase(firebase)?).await,
        Backend::InMemory => run_client(ClientContext::init_in_memory()?).await,
    }
}

async fn run_client<S, I>(context: ClientContext<S, I>) -> Result<(), anyhow::Error>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    let controller = SyncController::new();
    let clock = SystemClock;
    let mut stdout = tokio::io::stdout();

    info!("Starting to-do client");
    TerminalSession::new(
        &context.ext_cxn,
        &context.store,
        &context.identity,
        &clock,
        &controller,
    )
    .run(forward_stdin_lines(), &mut stdout)
    .await?;

    context.shutdown().await
}

/// Reads stdin on a plain thread, since a read that never completes would otherwise keep the
/// runtime from shutting down
fn forward_stdin_lines() -> mpsc::Receiver<String> {
    let (lines_tx, lines_rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("Stopped reading input: {err}");
                    break;
                }
            };
            if lines_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    lines_rx
}
