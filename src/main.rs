//! `media-resolver` HTTP server.
//!
//! Configuration comes from the environment and `app.env`; see
//! [`media_resolver::config::env`].

use std::net::SocketAddr;

use media_resolver::config::env::{
    bind_addr_from_env, trust_proxy_headers_from_env, video_api_endpoint_from_env,
    youtube_api_key_from_env,
};
use media_resolver::integrations::axum::{AppState, router, shutdown_signal};
use media_resolver::{VideoInfoClient, init_resolver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let resolver = init_resolver()?;
    let mut state = AppState::new(resolver)?.trust_proxy_headers(trust_proxy_headers_from_env());

    match youtube_api_key_from_env() {
        Some(key) => {
            let client = VideoInfoClient::new(&video_api_endpoint_from_env(), key)?
                .timeout(state.resolver.config().extractor_timeout);
            state = state.video_info(client);
            log::info!("🎬 Video quick info enabled");
        }
        None => log::warn!("⚠️ YOUTUBE_API_KEY not set, /quick-info is disabled"),
    }

    let addr = bind_addr_from_env();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🚀 Listening on http://{}", addr);

    axum::serve(
        listener,
        router(state.clone()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state))
    .await?;

    log::info!("Server stopped");
    Ok(())
}
