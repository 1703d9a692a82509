use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use tracing::info;

use brandlink::analytics::{ClickRecorder, StorageSink};
use brandlink::api::{domain_routes, redirect_routes};
use brandlink::config::{get_config, init_config};
use brandlink::domains::{DomainDirectory, DomainVerifier, VerificationPoller};
use brandlink::metrics_core::NoopMetrics;
use brandlink::routing::{Resolver, RuleStore};
use brandlink::services::HickoryResolver;
use brandlink::services::geoip::GeoIpProvider;
use brandlink::storage::{Storage, StorageFactory};
use brandlink::system::init_logging;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_config();
    let config = get_config();

    let _log_guard = init_logging(&config.logging);

    let storage: Arc<dyn Storage> = StorageFactory::create()
        .await
        .expect("Failed to create storage backend");
    info!("Using storage backend: {}", storage.backend_name().await);

    let metrics = NoopMetrics::arc();
    let geoip = GeoIpProvider::new(&config.geoip);

    // Domain subsystem
    let directory = Arc::new(DomainDirectory::new(&config.root_domain));
    directory
        .load(storage.as_ref())
        .await
        .expect("Failed to load domain directory");

    let dns = Arc::new(HickoryResolver::new(Duration::from_secs(
        config.verifier.dns_timeout_secs,
    )));
    let verifier = Arc::new(DomainVerifier::new(
        Arc::clone(&storage),
        Arc::clone(&directory),
        dns,
        Arc::clone(&metrics),
        Duration::from_secs(config.verifier.dns_timeout_secs),
    ));
    let poller = Arc::new(VerificationPoller::new(
        Arc::clone(&verifier),
        config.verifier.clone(),
    ));
    poller
        .seed(storage.as_ref())
        .await
        .expect("Failed to seed verification poller");
    tokio::spawn(Arc::clone(&poller).run());
    tokio::spawn(Arc::clone(&poller).run_diagnostics(Arc::clone(&storage)));

    // Resolution pipeline
    let rule_store = Arc::new(RuleStore::new(Arc::clone(&storage), &config.cache));
    let resolver = Arc::new(Resolver::new(
        Arc::clone(&directory),
        Arc::clone(&storage),
        rule_store,
        Arc::clone(&metrics),
    ));

    // Click telemetry
    let recorder = Arc::new(ClickRecorder::new(
        Arc::new(StorageSink::new(Arc::clone(&storage))),
        geoip.clone(),
        Arc::clone(&metrics),
        config.clicks.detailed_events,
        Duration::from_secs(config.clicks.flush_interval_secs),
    ));
    tokio::spawn(Arc::clone(&recorder).run());

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting server at http://{}", bind_address);

    let recorder_drain = Arc::clone(&recorder);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&storage)))
            .app_data(web::Data::new(Arc::clone(&resolver)))
            .app_data(web::Data::new(Arc::clone(&recorder)))
            .app_data(web::Data::new(Arc::clone(&directory)))
            .app_data(web::Data::new(Arc::clone(&verifier)))
            .app_data(web::Data::new(Arc::clone(&poller)))
            .app_data(web::Data::new(geoip.clone()))
            .service(domain_routes())
            .service(redirect_routes())
    })
    .bind(&bind_address)?
    .run();

    let result = server.await;

    // Drain buffered clicks before exit
    recorder_drain.flush().await;
    result
}
