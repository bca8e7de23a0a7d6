use std::sync::Arc;

use actix::{Actor, System};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use arcana_server::{
    env::Settings,
    metrics::{self, MetricsCtx},
    server::{end_point, registry::MatchRegistry},
    AppState, LoggerManager,
};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "arcana server",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,
)]
struct Args {
    /// config/<run_mode>.toml 을 읽는다. RUN_MODE 환경 변수보다 우선.
    #[arg(long = "run-mode")]
    run_mode: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    // 1. 환경변수 로드
    dotenv::dotenv().ok();
    if let Some(run_mode) = &args.run_mode {
        std::env::set_var("RUN_MODE", run_mode);
    }

    // 2. 설정 파일 로드
    let mut settings = Settings::new().expect("Failed to load settings");
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    // 3. 로거 초기화
    let logger_manager = Arc::new(LoggerManager::setup(&settings));
    info!("Logger initialized");

    // 4. Metrics 초기화
    let metrics = Arc::new(MetricsCtx::new());
    let metrics_registry = prometheus::Registry::new();
    metrics::register_custom_metrics(&metrics_registry)
        .expect("Failed to register custom metrics");
    info!("Metrics initialized and registered");

    // 5. MatchRegistry 시작
    let registry_addr = MatchRegistry::new(
        settings.game.clone(),
        settings.ai.clone(),
        metrics.clone(),
    )
    .start();
    info!("MatchRegistry actor started");

    // 6. AppState 구성
    let app_state = AppState {
        settings: settings.clone(),
        registry_addr,
        logger_manager,
        metrics,
        metrics_registry,
    };

    // 7. HTTP 서버 시작
    let bind_address = format!("{}:{}", settings.server.bind_address, settings.server.port);
    info!("Starting HTTP server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        // /metrics 엔드포인트 (optional auth)
        let metrics_route = |req: HttpRequest, state: web::Data<AppState>| async move {
            if let Some(expected_token) = &state.settings.server.metrics_auth_token {
                let provided_token = req
                    .headers()
                    .get("Authorization")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.strip_prefix("Bearer "));

                if provided_token != Some(expected_token.as_str()) {
                    return HttpResponse::Unauthorized()
                        .body("Unauthorized: Invalid or missing token");
                }
            }

            let metric_families = state.metrics_registry.gather();
            let mut buffer = Vec::new();
            let encoder = TextEncoder::new();

            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                return HttpResponse::InternalServerError()
                    .body(format!("Metrics encode error: {}", e));
            }

            HttpResponse::Ok()
                .content_type(encoder.format_type())
                .body(buffer)
        };

        let health_route = || async { HttpResponse::Ok().body("OK") };

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(end_point::configure)
            .route("/metrics", web::get().to(metrics_route))
            .route("/health", web::get().to(health_route))
    })
    .bind(&bind_address)?
    .run();

    info!("Arcana Server is running on {}", bind_address);

    // 8. 종료 신호 대기
    tokio::select! {
        res = &mut server => {
            error!("Server exited unexpectedly");
            return res;
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received. Initiating graceful shutdown...");
            System::current().stop();
        },
    }

    server.await?;
    info!("System has shut down gracefully");

    Ok(())
}
