use anyhow::{Context, Result};
use ledsock::config::IngressConfig;
use ledsock::servers::ingress::IngressServer;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut conf_file: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: ledsock_server [--conf FILE]");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = Some(args[i].clone());
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let config = match &conf_file {
        Some(path) => IngressConfig::from_file(path)?,
        None => IngressConfig::default(),
    };

    let bind = config.bind_addr();
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Cannot bind {}", bind))?;

    let (mut server, _buffers) = IngressServer::with_buffer_manager(config);
    tracing::info!("[ingress] [started] LED ingress server started");

    tokio::select! {
        result = server.run(listener) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("[ingress] [shutdown] interrupt received");
        }
    }
    Ok(())
}
