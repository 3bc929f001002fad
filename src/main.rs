use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::application::{
    CreationCoordinator, OutcomePolicy, Paginator, RandomOutcome, StatusProcessor, StatusWorker,
};
use payflow::config::{Cli, Command, SeedArgs, ServeArgs, ServiceConfig};
use payflow::domain::payment::PaymentStatus;
use payflow::infrastructure::Ports;
use payflow::interfaces::http::AppState;
use payflow::seed::sample_payments;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Service {
    coordinator: Arc<CreationCoordinator>,
    paginator: Arc<Paginator>,
    worker: StatusWorker,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Seed(args) => seed(args).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_ports(config: &ServiceConfig) -> Result<Ports> {
    match &config.db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using RocksDB storage");
            Ports::rocksdb(path, config.queue_config()).into_diagnostic()
        }
        None => Ok(Ports::in_memory(config.queue_config())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_ports(config: &ServiceConfig) -> Result<Ports> {
    if config.db_path.is_some() {
        miette::bail!("--db-path requires a build with the `storage-rocksdb` feature");
    }
    Ok(Ports::in_memory(config.queue_config()))
}

fn build_service(config: &ServiceConfig) -> Result<Service> {
    let ports = open_ports(config)?;

    let coordinator = CreationCoordinator::new(
        ports.payments.clone(),
        ports.idempotency.clone(),
        ports.queue.clone(),
    )
    .with_idempotency_ttl(config.idempotency_ttl());

    let policy: Arc<dyn OutcomePolicy> = Arc::new(RandomOutcome::new(config.success_rate));
    let processor = StatusProcessor::new(ports.payments.clone(), policy);
    let worker = StatusWorker::new(
        ports.queue.clone(),
        Arc::new(processor),
        config.worker_config(),
    );

    Ok(Service {
        coordinator: Arc::new(coordinator),
        paginator: Arc::new(Paginator::new(ports.payments)),
        worker,
    })
}

async fn serve(args: ServeArgs) -> Result<()> {
    let service = build_service(&args.service)?;
    let state = AppState {
        coordinator: service.coordinator,
        paginator: service.paginator,
    };

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .into_diagnostic()?;
    tracing::info!(addr = %args.bind, "Payment API listening");

    payflow::interfaces::http::serve(listener, state, service.worker, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await
    .into_diagnostic()?;

    tracing::info!("Shut down");
    Ok(())
}

async fn seed(args: SeedArgs) -> Result<()> {
    let service = build_service(&args.service)?;
    let samples = sample_payments(&mut rand::thread_rng(), args.count).into_diagnostic()?;

    println!("Seeding {} payments...\n", samples.len());
    for input in samples {
        let merchant = input.merchant.clone();
        let amount = input.amount;
        let currency = input.currency;
        let payment_type = input.payment_type;

        match service.coordinator.create(input).await {
            Ok(outcome) => println!(
                "  Created {} | {} | ${} {} | {}",
                outcome.payment_id(),
                merchant,
                amount,
                currency,
                payment_type
            ),
            Err(e) => eprintln!("  FAILED: {}", e),
        }
    }

    let processed = service.worker.drain().await.into_diagnostic()?;
    println!("\nDone! Processed {} events.", processed);

    let mut statuses: BTreeMap<PaymentStatus, usize> = BTreeMap::new();
    let mut total = 0;
    let mut cursor: Option<String> = None;
    loop {
        let page = service
            .paginator
            .list(None, 100, cursor.as_deref())
            .await
            .into_diagnostic()?;
        total += page.items.len();
        for payment in &page.items {
            *statuses.entry(payment.status).or_default() += 1;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    println!("\nTotal payments: {}", total);
    println!("Status breakdown:");
    for (status, count) in statuses {
        println!("  {}: {}", status, count);
    }

    Ok(())
}
