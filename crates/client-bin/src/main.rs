// ============================
// quickbite-client-bin/src/main.rs
// ============================
//! Courier demo client: signs in, streams simulated positions, and
//! prints delivery updates as they arrive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use quickbite_client_lib::config::Settings;
use quickbite_client_lib::location::SimulatedProvider;
use quickbite_client_lib::realtime::UpdateKind;
use quickbite_client_lib::Client;

#[derive(Parser, Debug)]
#[command(name = "quickbite-courier", about = "QuickBite courier demo client")]
struct Args {
    /// Account email
    #[arg(long)]
    email: String,
    /// Account password
    #[arg(long)]
    password: String,
    /// Order id to attach streamed positions to
    #[arg(long)]
    order: Option<String>,
}

/// Short loop through Sydney's CBD for the simulated courier
fn demo_route() -> Vec<(f64, f64)> {
    vec![
        (-33.8688, 151.2093),
        (-33.8700, 151.2100),
        (-33.8712, 151.2089),
        (-33.8705, 151.2075),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load().context("loading settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let provider = Arc::new(SimulatedProvider::new(demo_route()));
    let client = Client::open(settings, provider).context("wiring client")?;

    client.session.restore().await;
    if !client.session.is_authenticated().await {
        info!(email = %args.email, "no stored session, signing in");
        client
            .session
            .login(&args.email, &args.password)
            .await
            .context("signing in")?;
    }
    let user = client
        .session
        .current_user()
        .await
        .context("profile missing after sign-in")?;
    info!(user_id = %user.id, name = %user.name, role = ?user.role, "signed in");

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, signing out");
                break;
            },
            _ = ticker.tick() => {
                report(&client, args.order.as_deref());
            },
        }
    }

    client.session.logout().await;
    Ok(())
}

/// Emit the latest fix and drain any delivery updates
fn report(client: &Client, order: Option<&str>) {
    if let (Some(order), Some(fix)) = (order, client.location.last_fix()) {
        if client.realtime.send_location_update(order, fix.lat, fix.lng) {
            debug!(order, lat = fix.lat, lng = fix.lng, "position emitted");
        } else {
            warn!(order, "realtime connection is down, position not emitted");
        }
    }
    for record in client.realtime.updates(UpdateKind::Delivery) {
        info!(
            event = record.record_type,
            order_id = record.frame.order_id(),
            "delivery update"
        );
        client.realtime.clear_update(UpdateKind::Delivery, record.id);
    }
}
