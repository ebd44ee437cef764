mod announcements;
mod auth;
mod content;
mod guard_api;
mod objects;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use wanxuanju_attachments::AttachmentStore;
use wanxuanju_auth::{AuthBackend, AuthConfig};
use wanxuanju_db::Database;
use wanxuanju_storage::{Bucket, BucketConfig};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: AuthBackend,
    pub attachments: AttachmentStore,
    pub bucket: Arc<Bucket>,
    /// SPA origin embedded in confirmation and reset links.
    pub site_origin: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wanxuanju=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = env_or("WXJ_DB_PATH", "wanxuanju.db");
    let storage_dir = env_or("WXJ_STORAGE_DIR", "./storage");
    let bucket_name = env_or("WXJ_BUCKET", "wanxuanju-files");
    let jwt_secret = env_or("WXJ_JWT_SECRET", "dev-secret-change-me");
    let signing_secret = env_or("WXJ_SIGNING_SECRET", "dev-signing-change-me");
    let host = env_or("WXJ_HOST", "0.0.0.0");
    let port: u16 = env_or("WXJ_PORT", "8080").parse()?;
    let site_origin = env_or("WXJ_SITE_ORIGIN", "http://localhost:5173");
    let require_confirmation = env_or("WXJ_REQUIRE_EMAIL_CONFIRMATION", "false") == "true";
    let public_base_url =
        env_or("WXJ_PUBLIC_BASE_URL", &format!("http://{host}:{port}/storage"));

    // Backends
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    let bucket = Arc::new(
        Bucket::new(BucketConfig {
            name: bucket_name,
            root: PathBuf::from(&storage_dir),
            public_base_url,
            signing_secret,
        })
        .await?,
    );
    let auth = AuthBackend::new(
        db.clone(),
        AuthConfig {
            jwt_secret,
            require_email_confirmation: require_confirmation,
            ..AuthConfig::default()
        },
    );
    let attachments = AttachmentStore::new(db.clone(), bucket.clone());

    let state = AppState {
        db,
        auth,
        attachments,
        bucket,
        site_origin,
    };

    // Routes — admin handlers validate the bearer token themselves
    let app = Router::new()
        .route("/api/history", get(content::history_page))
        .route("/api/directors", get(content::directors_page))
        .route("/api/features", get(content::features_page))
        .route("/api/public-affairs", get(content::public_affairs_page))
        .route(
            "/api/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route(
            "/api/announcements/{id}",
            get(announcements::detail).delete(announcements::remove),
        )
        .route(
            "/api/announcements/{id}/attachments",
            post(announcements::upload_attachment),
        )
        .route(
            "/api/attachments/{id}",
            delete(announcements::remove_attachment),
        )
        .route(
            "/api/attachments/{id}/signed-url",
            get(announcements::attachment_signed_url),
        )
        .route("/api/guard", get(guard_api::decide_route))
        .route("/storage/{bucket}/{*path}", get(objects::serve))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/session", get(auth::session))
        .route("/auth/confirm/{user_id}", get(auth::confirm))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Wanxuanju server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}
