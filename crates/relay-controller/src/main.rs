//! Relay Controller - drives two relay coils from configured rules

use chrono::Local;
use relay_rules::config;
use relay_rules::RuleEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clock;
mod control;
mod controller;

use controller::Controller;

/// Log engine events as they arrive
fn spawn_event_logger(mut rx: broadcast::Receiver<RuleEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(RuleEvent::StateChanged { relay, now, change }) => {
                    tracing::info!(
                        "[{}] {:?} -> {:?} ({:?}, rule {})",
                        now,
                        relay,
                        change.state,
                        change.kind(),
                        change.rule_id
                    );
                }
                Ok(RuleEvent::RuleBlocked {
                    relay,
                    now,
                    blocked,
                }) => {
                    tracing::info!(
                        "[{}] {:?}: rule {} wanted {:?} but rule {} is operative",
                        now,
                        relay,
                        blocked.rule_id,
                        blocked.preference,
                        blocked.blocking_rule_id
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event logger lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Rule event channel closed");
                    break;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_controller=debug,relay_rules=debug,info".into()),
        )
        .init();

    tracing::info!("Starting relay controller");

    let rules_path: PathBuf = std::env::var("RELAY_RULES_PATH")
        .unwrap_or_else(|_| "data/rules.json".to_string())
        .into();
    let control_path: PathBuf = std::env::var("RELAY_CONTROL_PATH")
        .unwrap_or_else(|_| "data/control.json".to_string())
        .into();

    let config = config::load_config(&rules_path).await;
    let controller = Arc::new(Controller::from_config(&config)?);

    spawn_event_logger(controller.subscribe());
    control::spawn_watcher(Arc::clone(&controller), control_path);

    let period = Duration::from_secs(u64::from(config.tick_seconds.max(1)));
    tracing::info!("Ticking every {:?}", period);
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock::engine_seconds(&Local::now());
                match controller.tick(now) {
                    Ok(states) => {
                        for (relay, state) in states {
                            tracing::trace!("{:?} is {:?}", relay, state);
                        }
                    }
                    Err(e) => tracing::error!("Tick failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                for relay in controller::COILS {
                    tracing::info!("Shutting down with {:?} {:?}", relay, controller.state(relay));
                }
                break;
            }
        }
    }

    Ok(())
}
