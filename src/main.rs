use actix_web::{App, HttpServer, middleware::Logger, web};
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use chrono::Local;  // timestamp in log lines
use std::sync::Arc;

use activity_backend::{
    config::{Config, StorageBackend},
    external::CommunityClient,
    handlers,
    middlewares::{IdentityMiddleware, create_cors},
    repo::{ActivityRepo, MemoryRepo, SeaRepo, connect},
    rules::ActivityRegistry,
    services::*,
    swagger::swagger_config,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 存储后端（PostgreSQL 启动时自动执行迁移）
    let repo: Arc<dyn ActivityRepo> = match config.database.backend {
        StorageBackend::Postgres => {
            let pool = connect(&config.database)
                .await
                .expect("Failed to connect database and run migrations");
            Arc::new(SeaRepo::new(pool))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage, data will be lost on restart");
            Arc::new(MemoryRepo::new())
        }
    };

    // 外部服务
    let community = CommunityClient::new(config.community.clone())
        .expect("Failed to create community client");
    if !community.is_enabled() {
        log::warn!("Community service is not configured, post games will fail");
    }

    // 创建服务
    let registry = Arc::new(ActivityRegistry::standard());
    let activity_service = ActivityService::new(repo.clone(), registry);
    let participation_service = ParticipationService::new(
        activity_service.clone(),
        repo,
        Arc::new(community),
        &config.engine,
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{} (backend: {:?})",
        config.server.host,
        config.server.port,
        config.database.backend
    );

    HttpServer::new(move || {
        App::new()
            .wrap(IdentityMiddleware::new())
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(activity_service.clone()))
            .app_data(web::Data::new(participation_service.clone()))
            .configure(handlers::extractor_config)
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::activity_config)
                    .configure(handlers::game_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
