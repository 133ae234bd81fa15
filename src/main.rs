// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HUBEDU CLI
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Uso:
//   hubedu --server [--port 3000] [--secret TOKEN]
//   hubedu classify "Quero fazer um simulado do ENEM"
//   hubedu enem-stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use hubedu::classification::{detect_complexity, detect_use_case, ModuleClassifier};
use hubedu::config::{create_tokio_runtime, install_panic_hook, load_runtime_config, ServerConfig};
use hubedu::enem::EnemLocalDatabase;
use std::path::PathBuf;

/// Tenta carregar o arquivo .env de múltiplos locais possíveis
fn load_dotenv() {
    let possible_paths = [
        PathBuf::from(".env"),
        PathBuf::from("../.env"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env"),
    ];

    for path in &possible_paths {
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => {
                    eprintln!(
                        "✓ Carregado .env de: {:?}",
                        path.canonicalize().unwrap_or(path.clone())
                    );
                    return;
                }
                Err(e) => {
                    eprintln!("⚠ Erro ao carregar {:?}: {}", path, e);
                }
            }
        }
    }

    if dotenvy::dotenv().is_err() {
        eprintln!("⚠ Nenhum arquivo .env encontrado. Usando apenas variáveis de ambiente.");
    }
}

fn print_usage(program: &str) {
    eprintln!("HubEdu CLI v{}", hubedu::VERSION);
    eprintln!();
    eprintln!("Uso:");
    eprintln!("  {} --server [--port <porta>] [--secret <token>]", program);
    eprintln!("  {} classify \"<mensagem>\"", program);
    eprintln!("  {} enem-stats", program);
}

/// Valor de `--flag valor` ou `--flag=valor`
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{}=", flag);
    args.iter().enumerate().find_map(|(i, arg)| {
        if let Some(value) = arg.strip_prefix(&prefix) {
            Some(value.to_string())
        } else if arg == flag {
            args.get(i + 1).cloned()
        } else {
            None
        }
    })
}

fn main() -> anyhow::Result<()> {
    // Carregar .env PRIMEIRO, antes de qualquer coisa
    load_dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    install_panic_hook();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("hubedu");

    let Some(command) = args.get(1) else {
        print_usage(program);
        std::process::exit(1);
    };

    let runtime = create_tokio_runtime(&load_runtime_config())?;

    match command.as_str() {
        "--server" | "server" => runtime.block_on(run_server(&args[2..])),
        "classify" => {
            let message = args[2..].join(" ");
            if message.trim().is_empty() {
                print_usage(program);
                std::process::exit(1);
            }
            runtime.block_on(run_classify(&message));
            Ok(())
        }
        "enem-stats" => runtime.block_on(run_enem_stats()),
        _ => {
            print_usage(program);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "server")]
async fn run_server(args: &[String]) -> anyhow::Result<()> {
    use hubedu::config::ProviderKeys;
    use hubedu::llm::LlmClients;
    use hubedu::server::{start_server, AppState};
    use std::net::SocketAddr;
    use std::sync::Arc;

    let mut config = ServerConfig::from_env();
    if let Some(port) = flag_value(args, "--port") {
        config.port = port
            .parse()
            .map_err(|_| anyhow::anyhow!("Porta inválida: {}", port))?;
    }
    if let Some(secret) = flag_value(args, "--secret").filter(|s| !s.is_empty()) {
        config.secret = Some(secret);
    }

    let clients = LlmClients::from_keys(&ProviderKeys::from_env(), config.llm_timeout);
    log::info!(
        "🔌 Provedores: {}",
        clients
            .available()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(config, &clients));
    start_server(addr, state).await
}

#[cfg(not(feature = "server"))]
async fn run_server(_args: &[String]) -> anyhow::Result<()> {
    anyhow::bail!("Compilado sem a feature \"server\"")
}

async fn run_classify(message: &str) {
    let classifier = ModuleClassifier::local_only();
    let classification = classifier.classify(message, 0).await;
    let use_case = detect_use_case(message);
    let complexity = detect_complexity(message, use_case);

    println!("Módulo:       {}", classification.module);
    println!("Confiança:    {:.2}", classification.confidence);
    println!("Motivo:       {}", classification.rationale);
    println!("Complexidade: {}", complexity);
    println!("Caso de uso:  {}", use_case);
}

async fn run_enem_stats() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    let db = EnemLocalDatabase::new(config.enem_data_dir);

    if !db.is_available().await {
        anyhow::bail!("Base ENEM não encontrada em {}", db.base_path().display());
    }

    let stats = db.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
