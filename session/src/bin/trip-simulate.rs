//! Simulated trip from the command line.
//!
//! Builds a route through the given waypoints with the offline router,
//! runs simulated guidance to the destination and prints every event as
//! JSON, one per line.
//!
//! # Usage
//!
//! ```bash
//! # Demo trip
//! cargo run --bin trip-simulate
//!
//! # Custom trip: name@lat,lon (a leading ~ marks a silent waypoint)
//! TRIP_SIMULATION_SPEED_MPS=500 TRIP_HISTORY_ENABLED=true \
//!   cargo run --bin trip-simulate -- "Home@48.8566,2.3522" "~Via@48.86,2.34" "Work@48.87,2.33"
//! ```

use anyhow::{Context, bail};
use std::time::Duration;
use trip_session::{
    Coordinate, DomainEvent, GuidanceMode, TripConfig, TripOrchestrator, Waypoint, WaypointInput,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const EVENT_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let waypoints = parse_waypoints(std::env::args().skip(1))?;
    let config = TripConfig::from_env();
    let orchestrator = TripOrchestrator::new(config);
    let mut events = orchestrator.subscribe();

    tracing::info!(waypoints = waypoints.len(), "=== Trip simulation ===");
    orchestrator
        .submit(waypoints, orchestrator.default_options())
        .await?;

    loop {
        let Ok(Some(event)) = tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await else {
            bail!("no event within {EVENT_TIMEOUT:?}");
        };
        println!("{}", event.to_json());

        match event {
            DomainEvent::RouteBuilt(_) => {
                let state = orchestrator.start(GuidanceMode::Simulated).await?;
                tracing::info!(%state, "Guidance started");
            },
            DomainEvent::RouteBuildFailed(failure) => bail!("route failed: {failure}"),
            DomainEvent::NavigationFinished | DomainEvent::NavigationCancelled => break,
            _ => {},
        }
    }

    for record in orchestrator.history().list() {
        tracing::info!(
            id = %record.id,
            from = %record.start_point_name,
            to = %record.end_point_name,
            seconds = record.duration_seconds,
            "History record"
        );
    }

    orchestrator.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

fn parse_waypoints(args: impl Iterator<Item = String>) -> anyhow::Result<Vec<WaypointInput>> {
    let parsed = args.map(|arg| parse_waypoint(&arg)).collect::<anyhow::Result<Vec<_>>>()?;
    if !parsed.is_empty() {
        return Ok(parsed);
    }

    Ok(vec![
        Waypoint::new("Louvre", Coordinate::new(48.8606, 2.3376)).into(),
        Waypoint::new("Pont Neuf", Coordinate::new(48.8570, 2.3413)).silent().into(),
        Waypoint::new("Notre-Dame", Coordinate::new(48.8530, 2.3499)).into(),
        Waypoint::new("Bastille", Coordinate::new(48.8532, 2.3692)).into(),
    ])
}

fn parse_waypoint(arg: &str) -> anyhow::Result<WaypointInput> {
    let (silent, arg) = arg.strip_prefix('~').map_or((false, arg), |rest| (true, rest));
    let (name, position) = arg
        .split_once('@')
        .with_context(|| format!("expected name@lat,lon, got {arg:?}"))?;
    let (latitude, longitude) = position
        .split_once(',')
        .with_context(|| format!("expected lat,lon, got {position:?}"))?;

    let coordinate = Coordinate::new(
        latitude.trim().parse().context("invalid latitude")?,
        longitude.trim().parse().context("invalid longitude")?,
    );
    let waypoint = Waypoint::new(name, coordinate);
    Ok(if silent { waypoint.silent() } else { waypoint }.into())
}
