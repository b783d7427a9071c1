use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use huddle_api::middleware::require_auth;
use huddle_api::{AppState, AppStateInner, board};
use huddle_cache::MemoryCache;
use huddle_chat::{ChatEngine, KanbanBroadcaster};
use huddle_db::Database;
use huddle_gateway::auth;
use huddle_gateway::broker::{Broker, InProcessBroker};
use huddle_gateway::connection::{self, Gateway};
use huddle_gateway::presence::PresenceRegistry;
use huddle_gateway::rooms::GroupRouter;

#[derive(Clone)]
struct ServerState {
    gateway: Arc<Gateway<ChatEngine>>,
    db: Arc<Database>,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HUDDLE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("HUDDLE_DB_PATH").unwrap_or_else(|_| "huddle.db".into());
    let host = std::env::var("HUDDLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HUDDLE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let broker: Arc<dyn Broker> = Arc::new(InProcessBroker::new());
    let presence = PresenceRegistry::new(Arc::new(MemoryCache::new()));
    let router = GroupRouter::new(broker.clone());
    let engine = Arc::new(ChatEngine::new(db.clone(), broker.clone(), presence.clone()));

    let gateway = Arc::new(Gateway {
        broker: broker.clone(),
        presence,
        router,
        db: db.clone(),
        handler: engine,
    });

    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        kanban: KanbanBroadcaster::new(broker.clone()),
        jwt_secret: jwt_secret.clone(),
    });

    let state = ServerState {
        gateway,
        db,
        jwt_secret,
    };

    // Routes
    let protected_routes = Router::new()
        .route("/projects/{project_id}/board", get(board::get_board))
        .route(
            "/projects/{project_id}/board/columns",
            post(board::create_column),
        )
        .route("/boards/columns/{column_id}", patch(board::rename_column))
        .route("/boards/columns/{column_id}", delete(board::delete_column))
        .route(
            "/boards/columns/{column_id}/reorder",
            post(board::reorder_column),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_routes = Router::new()
        .route("/ws/chat/", get(chat_ws))
        .route("/ws/kanban/", get(kanban_ws))
        .with_state(state);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .merge(protected_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Huddle server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Chat connections authenticate with a `token` query parameter; a failed
/// handshake completes the upgrade and closes with 4403.
async fn chat_ws(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let token = params.get("token").map(String::as_str);
        match auth::authenticate(&state.db, &state.jwt_secret, token) {
            Ok(identity) => state.gateway.handle_chat_socket(socket, identity).await,
            Err(e) => {
                warn!("chat handshake rejected: {e}");
                connection::reject(socket, "authentication failed").await;
            }
        }
    })
}

async fn kanban_ws(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let token = params.get("token").map(String::as_str);
        match auth::authenticate(&state.db, &state.jwt_secret, token) {
            Ok(identity) => state.gateway.handle_kanban_socket(socket, identity).await,
            Err(e) => {
                warn!("kanban handshake rejected: {e}");
                connection::reject(socket, "authentication failed").await;
            }
        }
    })
}
