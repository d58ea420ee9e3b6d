// src/commands.rs

//! What each CLI subcommand does against a freshly registered device.

use std::thread;

use anyhow::{Context, Result, bail};
use myioctl_driver::{CounterDevice, DeviceBuilder, DeviceConfig};
use serde::Serialize;
use shared::Count;

use crate::comms::CounterClient;

/// One agent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reset,
    Get,
    Increment(Count),
    Stress { sessions: usize, iterations: usize },
}

/// Outcome printed by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub device: String,
    pub major: u32,
    pub count: Count,
}

/// Registers the device described by `config`, runs `action`, and
/// unregisters it again.
pub fn execute(config: &DeviceConfig, action: Action) -> Result<Report> {
    let device = DeviceBuilder::from_config(config)
        .register()
        .with_context(|| format!("registering {}", config.name))?;
    log::info!(
        "{} registered with major {} (persistence: {})",
        device.name(),
        device.major(),
        device.policy().map_or_else(|| "off".to_string(), |p| p.to_string())
    );

    let count = run(&device, action)?;
    let report = Report { device: device.name().to_owned(), major: device.major(), count };
    device.unregister();
    Ok(report)
}

/// Runs `action` on an already registered device and returns the final count.
pub fn run(device: &CounterDevice, action: Action) -> Result<Count> {
    match action {
        Action::Reset => {
            let client = CounterClient::open(device);
            client.reset()?;
            Ok(client.get_count()?)
        }
        Action::Get => Ok(CounterClient::open(device).get_count()?),
        Action::Increment(delta) => {
            let client = CounterClient::open(device);
            client.increment(delta)?;
            Ok(client.get_count()?)
        }
        Action::Stress { sessions, iterations } => stress(device, sessions, iterations),
    }
}

/// `sessions` threads, each with its own session, each incrementing by one
/// `iterations` times.
fn stress(device: &CounterDevice, sessions: usize, iterations: usize) -> Result<Count> {
    if sessions == 0 {
        bail!("stress needs at least one session");
    }

    thread::scope(|s| {
        let workers: Vec<_> = (0..sessions)
            .map(|_| {
                s.spawn(move || {
                    let client = CounterClient::open(device);
                    for _ in 0..iterations {
                        client.increment(1)?;
                    }
                    Ok::<_, anyhow::Error>(())
                })
            })
            .collect();
        for worker in workers {
            match worker.join() {
                Ok(result) => result?,
                Err(_) => bail!("stress worker panicked"),
            }
        }
        Ok(())
    })?;

    log::info!("stress: {} sessions x {} increments done", sessions, iterations);
    Ok(CounterClient::open(device).get_count()?)
}
