//! futbot - soccer chatbot over MCP tool servers
//!
//! Connects an OpenAI-compatible chat API to a set of MCP backends (a
//! soccer data server plus filesystem and git helpers) and runs an
//! interactive terminal conversation where the model can call their tools.

use std::path::PathBuf;

use clap::Parser;

use futbot_mcp::{availability_summary, CallRecorder, CatalogBuilder, DEFAULT_LOG_PATH};

mod backends;
mod chat;
mod openai;

#[derive(Debug, Parser)]
#[command(name = "futbot", about = "Chatbot de fútbol con herramientas MCP", version)]
struct Args {
    /// Override model from OPENAI_MODEL / the built-in default
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Call record sink (JSONL, appended)
    #[arg(long, default_value = DEFAULT_LOG_PATH)]
    log_file: PathBuf,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.verbose { "futbot=debug" } else { "futbot=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let client = openai::ChatClient::from_env(args.model)?;
    let recorder = CallRecorder::new(&args.log_file);

    println!("⚽ Chatbot de Fútbol con MCP");
    println!("Pregunta sobre competiciones y equipos. Escribe 'salir' para terminar.");

    let build = CatalogBuilder::new(&recorder)
        .connect_all(&backends::default_backends())
        .await?;
    let mut catalog = build.catalog;

    for (backend, available) in availability_summary(&catalog) {
        if available {
            println!("✓ Conectado al backend '{backend}'");
        } else {
            println!("✗ Backend '{backend}' no disponible");
        }
    }

    if catalog.is_empty() {
        println!("No se pudieron cargar herramientas MCP. Verificar conexión a los servidores.");
        catalog.shutdown().await;
        return Ok(());
    }

    println!(
        "🛠️ Herramientas disponibles: {} (modelo: {})",
        catalog.descriptors().len(),
        client.model()
    );
    if args.verbose {
        for descriptor in catalog.descriptors() {
            println!("   • {}", descriptor.qualified_name);
        }
    }
    println!("📝 Los logs se guardan en: {}", args.log_file.display());

    let result = chat::ChatSession::new(&client, &catalog, &recorder).run().await;

    // Sessions are released whichever way the loop ended.
    catalog.shutdown().await;
    result
}
