use anyhow::{Context as _, Result, bail};
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::services::ServeDir;
use walkdir::WalkDir;

const LIVERELOAD_PATH: &str = "/__livereload";

/// Where and what `skier serve` serves
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    pub host: String,
    pub port: u16,
    /// Build output directory
    pub root: PathBuf,
    /// Open the site in a browser once listening
    pub open: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            root: PathBuf::from("public"),
            open: false,
        }
    }
}

/// Tells connected browsers to reload. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<String>,
}

impl ReloadHandle {
    /// Returns the number of browsers notified.
    pub fn reload(&self) -> usize {
        self.tx.send("reload".to_string()).unwrap_or(0)
    }
}

/// Static file server for the build output, plus a reload websocket
pub struct LiveServer {
    settings: LiveServerConfig,
    reloads: broadcast::Sender<String>,
}

impl LiveServer {
    pub fn new(settings: LiveServerConfig) -> Self {
        let (reloads, _) = broadcast::channel(16);
        Self { settings, reloads }
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            tx: self.reloads.clone(),
        }
    }

    pub fn address(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        addr.parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {addr}"))
    }

    /// Serve until the process is stopped
    pub async fn run(self) -> Result<()> {
        let root = &self.settings.root;
        if !root.is_dir() {
            bail!("Output directory does not exist: {}", root.display());
        }

        let addr = self.address()?;
        let router = Router::new()
            .route(LIVERELOAD_PATH, get(livereload))
            .fallback_service(ServeDir::new(root))
            .with_state(self.reloads.clone());
        let listener = tokio::net::TcpListener::bind(addr).await?;

        println!("Serving {} at http://{addr}", root.display());
        tracing::debug!("Live reload socket at ws://{addr}{LIVERELOAD_PATH}");
        if self.settings.open
            && let Err(e) = open::that(format!("http://{addr}"))
        {
            tracing::warn!("Failed to open browser: {}", e);
        }

        axum::serve(listener, router).await?;
        Ok(())
    }
}

async fn livereload(
    upgrade: WebSocketUpgrade,
    State(reloads): State<broadcast::Sender<String>>,
) -> Response {
    upgrade.on_upgrade(move |socket| reload_socket(socket, reloads.subscribe()))
}

/// Forward reload messages to one browser until either side goes away.
async fn reload_socket(mut socket: WebSocket, mut reloads: broadcast::Receiver<String>) {
    if socket.send(Message::Text("connected".to_string().into())).await.is_err() {
        return;
    }

    loop {
        let outgoing = tokio::select! {
            reload = reloads.recv() => match reload {
                Ok(message) => message,
                Err(RecvError::Lagged(_)) => "reload".to_string(),
                Err(RecvError::Closed) => return,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(_)) => continue,
                _ => return,
            },
        };
        if socket.send(Message::Text(outgoing.into())).await.is_err() {
            return;
        }
    }
}

const LIVERELOAD_CLIENT: &str = r#"<script data-skier-livereload>
new WebSocket("ws://" + location.host + "/__livereload").addEventListener("message", (e) => {
  if (e.data === "reload") location.reload();
});
</script>
"#;

/// Inject the live reload client before `</body>`, or append it.
/// Pages that already carry it are returned unchanged.
pub fn inject_livereload_script(html: &str) -> String {
    if html.contains("data-skier-livereload") {
        return html.to_string();
    }
    match html.rfind("</body>") {
        Some(body_end) => {
            let (head, tail) = html.split_at(body_end);
            format!("{head}{LIVERELOAD_CLIENT}{tail}")
        }
        None => format!("{html}{LIVERELOAD_CLIENT}"),
    }
}

/// Inject the live reload client into every `.html` file under `dir`.
/// Returns how many files were changed.
pub fn inject_livereload(dir: &Path) -> Result<usize> {
    let mut changed = 0;
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "html") {
            continue;
        }
        let html = std::fs::read_to_string(path)?;
        let injected = inject_livereload_script(&html);
        if injected != html {
            std::fs::write(path, injected)?;
            changed += 1;
        }
    }
    tracing::debug!(files = changed, "Injected live reload client");
    Ok(changed)
}
