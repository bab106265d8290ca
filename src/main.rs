#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use axum::{
    Router,
    routing::{get, post, put},
};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{Expiry, SessionManagerLayer, cookie::time::Duration},
};
use roster::{
    auth::{backend::RosterAuthBackend, postgres_store::PostgresSessionStore},
    config::RuntimeConfiguration,
    routes::{
        import_export::{get_export, get_import_checker, get_import_export_page, put_import},
        index::{get_index_route, internal_get_dashboard},
        login::{get_login, post_login, post_logout},
        profile::{get_change_password, post_change_password},
        register::{
            get_email_availability, get_register, get_username_availability, post_register,
        },
        sse::sse_feed,
        students::{
            delete_student, get_student_page, get_students, internal_get_edit_student_form,
            internal_get_new_student_form, internal_get_student_in_detail, internal_get_students,
            internal_post_update_student, internal_put_new_student,
        },
    },
    state::RosterState,
};
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

async fn shutdown_signal(state: RosterState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    if let Err(e) = state.sensible_shutdown().await {
        error!(?e, "Error sensibly shutting down");
    }
    warn!("signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() {
    //a missing .env is fine, everything can come from the real environment
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("not loading .env: {e}");
    }

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");

    let config = RuntimeConfiguration::new().expect("unable to create config");
    let server_config = config.server_config();
    let options = PgPoolOptions::new().max_connections(server_config.max_connections);
    let state = RosterState::new(options, config).expect("unable to create state");
    state
        .initialise()
        .await
        .expect("unable to initialise state");

    let session_store = PostgresSessionStore::new(state.clone());
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(5)));
    let auth_backend = RosterAuthBackend::new(state.clone());
    let auth_layer = AuthManagerLayerBuilder::new(auth_backend, session_layer).build();

    let trace_layer = TraceLayer::new_for_http();

    let app = Router::new()
        .route("/", get(get_index_route))
        .route("/students", get(get_students))
        .route("/students/{id}", get(get_student_page))
        .route("/login", get(get_login).post(post_login))
        .route("/logout", post(post_logout))
        .route("/register", get(get_register).post(post_register))
        .route("/register/check_username", get(get_username_availability))
        .route("/register/check_email", get(get_email_availability))
        .route(
            "/profile/password",
            get(get_change_password).post(post_change_password),
        )
        .route("/import_export", get(get_import_export_page))
        .route("/import_export/export", get(get_export))
        .route("/import_export/import", put(put_import))
        .route("/import_export/import_checker", get(get_import_checker))
        .route("/internal/dashboard", get(internal_get_dashboard))
        .route(
            "/internal/students",
            get(internal_get_students)
                .put(internal_put_new_student)
                .delete(delete_student),
        )
        .route(
            "/internal/students/new_form",
            get(internal_get_new_student_form),
        )
        .route(
            "/internal/students/{id}",
            get(internal_get_student_in_detail).post(internal_post_update_student),
        )
        .route(
            "/internal/students/{id}/edit_form",
            get(internal_get_edit_student_form),
        )
        .route("/sse_feed", get(sse_feed))
        .layer(auth_layer)
        .layer(trace_layer)
        .with_state(state.clone());

    let server_ip = server_config.server_ip.clone();
    let listener = TcpListener::bind(&server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("unable to serve app");
}
