use std::{process, sync::Arc};

use shapemask::{
    application::{error::AppError, orchestrator::ShapeMaskOrchestrator},
    cache::{CacheConfig, build_mask_cache},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::{HttpAccessChecker, HttpMaskRenderer, UpstreamClient},
    },
};
use shapemask_api_types::{ShapeIdRepr, ShapeMaskRequest};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, *args).await,
    }
}

fn build_orchestrator(settings: &config::Settings) -> Result<Arc<ShapeMaskOrchestrator>, AppError> {
    let upstream = UpstreamClient::new(&settings.upstream)?;
    let access = Arc::new(HttpAccessChecker::new(
        upstream.clone(),
        settings.upstream.access_url.clone(),
    ));
    let renderer = Arc::new(HttpMaskRenderer::new(
        upstream,
        settings.upstream.render_url.clone(),
    ));
    let cache = build_mask_cache(&CacheConfig::from(&settings.cache));

    let orchestrator = ShapeMaskOrchestrator::new(cache, access, renderer)
        .with_access_policy(settings.access.policy);
    Ok(Arc::new(orchestrator))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let masks = build_orchestrator(&settings)?;
    let state = HttpState {
        masks,
        session_header: settings.upstream.session_header.clone(),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "shapemask::serve",
        addr = %settings.server.addr,
        access_policy = %settings.access.policy,
        cache_enabled = settings.cache.enabled,
        "Listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        () = shutdown_signal() => {}
    }

    info!(target = "shapemask::serve", "Shutdown requested; draining connections");
    let _ = stop_tx.send(());

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "shapemask::serve",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let masks = build_orchestrator(&settings)?;

    let mut request = ShapeMaskRequest::new(ShapeIdRepr::Text(args.shape_id), args.session_key)
        .with_flip(args.flip_horizontal, args.flip_vertical);
    if let Some(color) = args.color {
        request = request.with_color(color);
    }
    let raw = request
        .to_bytes()
        .map_err(|err| AppError::validation(format!("failed to encode request: {err}")))?;

    let mask = masks.handle(&raw).await.into_result()?;

    tokio::fs::write(&args.output, &mask)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "shapemask::render",
        path = %args.output.display(),
        bytes = mask.len(),
        "Mask written"
    );
    Ok(())
}
