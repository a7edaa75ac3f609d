use anyhow::{anyhow, Context, Result};
use nostr_printer::__private::config::Config;
use nostr_printer::__private::metrics::{get_metrics_app, register_metrics};
use nostr_printer::actuator::{Actuator, Indicator, LinePrinter, LogIndicator, Printer, SysfsLed};
use nostr_printer::classifier::CursorAdvancer;
use nostr_printer::client::{Client, ClientChannels};
use nostr_printer::clock::{Clock, SystemClock};
use nostr_printer::errors::SetupError;
use nostr_printer::filter::{FilterBuilder, RecipientSource};
use nostr_printer::session::Session;
use nostr_printer::store::FileStore;
use nostr_printer_common::logging::init_tracing;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    // Command line parsing
    let args: Vec<String> = std::env::args().collect();
    let config_file_path = match args.len() {
        1 => {
            return Err(anyhow!("Missing config file path"));
        }
        2 => args[1].clone(),
        _ => {
            return Err(anyhow!("Too many arguments"));
        }
    };

    let mut config = Config::load(&config_file_path, "printer")?;
    config.apply_env();

    register_metrics()?;
    if let Some(addr) = &config.metrics_addr {
        let (router, listener) = get_metrics_app(addr)
            .await
            .with_context(|| format!("cannot bind metrics server on {addr}"))?;
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!("metrics server: {err}");
            }
        });
    }

    // Recipient, then the initial cursor document
    let recipients = match config.recipient.clone() {
        Some(recipient) => recipient.into_source().await.map_err(SetupError::from)?,
        None => RecipientSource::Unfiltered,
    };
    let builder = FilterBuilder::new(recipients)
        .kinds(config.kinds.clone())
        .until(config.until);

    let mut store = FileStore::new(&config.store_dir);
    let filter = builder.seed(&mut store, SystemClock.now())?;
    tracing::info!("cursor seeded: {filter}");

    let printer: Box<dyn Printer> = match &config.printer_device {
        Some(device) => Box::new(
            LinePrinter::open(device)
                .with_context(|| format!("cannot open printer {}", device.display()))?,
        ),
        None => Box::new(LinePrinter::new(std::io::stdout())),
    };
    let indicator: Box<dyn Indicator> = match &config.led_path {
        Some(path) => Box::new(SysfsLed::new(path)),
        None => Box::new(LogIndicator),
    };
    let actuator = Actuator::new(printer, indicator).with_pause(config.blink());

    let mut session = Session::new(
        &config.subscription_id,
        store,
        CursorAdvancer::new(config.since_epsilon),
        actuator,
    );

    let ClientChannels {
        commands,
        mut events,
        handle,
    } = Client::new(&config.relay_url, config.reconnect_interval()).spawn();

    session
        .await_connected(
            &mut events,
            &commands,
            config.connect_timeout(),
            config.blink(),
        )
        .await?;
    tracing::info!("connected to {}", config.relay_url);

    session.run(&mut events, &commands).await;
    handle.abort();

    Err(anyhow!("transport stopped"))
}
