//! RF Bench - sub-GHz capture, replay and jamming
//!
//! Drives one or two sub-GHz transceivers through a radio helper process to
//! capture and classify keyfob transmissions, replay them, run the two-radio
//! rolling code attack, jam, scan for activity, and brute force fixed codes
//! with de Bruijn sequences.

mod attack;
mod capture;
mod classifier;
mod codec;
mod config;
mod debruijn;
mod operator;
mod radio;
mod scan;
#[cfg(test)]
mod testutil;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use attack::{ReplayMode, RollingCodeAttack, RollingOutcome};
use capture::{CancelToken, CapturePolicy, CaptureStore};
use config::{Config, Mode};
use debruijn::Alphabet;
use operator::TerminalOperator;
use radio::{configure, ProcessRadio, Radio, RadioSettings};
use scan::{ScanLog, Scanner};

/// How often the standalone jammer checks for cancellation
const JAM_POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   RF Bench - sub-GHz capture and replay");
    info!("===========================================");

    // Load configuration
    let config = Config::from_env(std::env::args().nth(1)).context("Invalid configuration")?;
    let settings = config.radio_settings().context("Invalid radio settings")?;

    info!("Configuration:");
    info!("  Mode: {}", config.mode);
    info!("  Radio helper: {}", config.radio_command);
    info!("  Sniffer index: {}", config.sniffer_index);
    info!("  Jammer index: {}", config.jammer_index);
    for line in settings.to_template().lines() {
        info!("  {}", line);
    }

    // Ctrl-C only cancels; the worker idles every radio on its way out.
    // Receives are bounded, so the cancel is seen within one receive window.
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if cancel.is_cancelled() {
                    warn!("Already stopping, waiting for the radios to go idle");
                } else {
                    warn!("Interrupted, stopping after the current receive");
                    cancel.cancel();
                }
            }
        });
    }

    // Radio I/O blocks, keep it off the async workers
    tokio::task::spawn_blocking(move || run(&config, &settings, &cancel))
        .await
        .context("Worker task failed")??;

    info!("Done");
    Ok(())
}

fn run(config: &Config, settings: &RadioSettings, cancel: &CancelToken) -> Result<()> {
    let store = CaptureStore::new(&config.captures_dir);
    info!("Capture files: {}", store.dir().display());

    match config.mode {
        Mode::Capture => {
            let mut radio = spawn_radio(config, config.sniffer_index, "sniffer")?;
            let mut operator = TerminalOperator::stdio();
            match attack::live_replay(
                &mut radio,
                settings,
                &store,
                &config.replay_timing(),
                &mut operator,
                cancel,
            )? {
                Some(result) => info!(
                    "Captured {} (replayed: {}, saved: {})",
                    result.capture.payload(),
                    result.replayed,
                    result
                        .saved
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "no".to_string())
                ),
                None => info!("No capture taken"),
            }
        }

        Mode::Replay | Mode::Send => {
            let path = config
                .replay_file
                .as_deref()
                .context("RFBENCH_REPLAY_FILE must name a capture file")?;
            let mode = if config.mode == Mode::Replay {
                ReplayMode::Forever
            } else {
                ReplayMode::Once
            };
            let mut radio = spawn_radio(config, config.sniffer_index, "sniffer")?;
            attack::replay_saved(
                &mut radio,
                settings,
                path,
                mode,
                &config.replay_timing(),
                cancel,
            )?;
        }

        Mode::Rolling => {
            let jammer = spawn_radio(config, config.jammer_index, "jammer")?;
            let sniffer = spawn_radio(config, config.sniffer_index, "sniffer")?;
            let mut attack = RollingCodeAttack::new(
                jammer,
                sniffer,
                settings.clone(),
                config.jamming_variance,
                store,
            )
            .with_retry(config.retry_policy())
            .with_receive_timeout(config.receive_timeout());

            let mut operator = TerminalOperator::stdio();
            match attack.run(&mut operator, cancel)? {
                RollingOutcome::ReplayedBoth => info!("Both codes replayed"),
                RollingOutcome::SavedSecond(path) => {
                    info!("Second code saved to {}", path.display())
                }
                RollingOutcome::Cancelled => info!("Rolling code attack cancelled"),
            }
            debug!("Rolling code states: {:?}", attack.history());
            info!("Rolling code attack finished in state {:?}", attack.state());
        }

        Mode::Jam => {
            let mut radio = spawn_radio(config, config.jammer_index, "jammer")?;
            attack::jam(
                &mut radio,
                settings,
                config.jamming_variance,
                JAM_POLL,
                &config.retry_policy(),
                cancel,
            )?;
        }

        Mode::ScanKnown | Mode::ScanRange => {
            let mut radio = spawn_radio(config, config.sniffer_index, "scanner")?;
            configure(&mut radio, settings).context("Failed to configure scanner")?;
            radio
                .set_receive_mode()
                .context("Failed to put scanner in receive mode")?;

            let policy = if config.scan_windowed {
                CapturePolicy::Windowed(settings.rssi_window()?)
            } else {
                CapturePolicy::PassThrough
            };
            let scanner = Scanner::new(policy)
                .with_timeout(config.scan_timeout())
                .with_retry(config.retry_policy());
            let mut log = ScanLog::create(&config.captures_dir).with_context(|| {
                format!("Failed to create scan log in {}", config.captures_dir.display())
            })?;

            let summary = if config.mode == Mode::ScanKnown {
                scanner.scan_known(&mut radio, &config.known_frequencies, &mut log, cancel)?
            } else {
                scanner.scan_range(&mut radio, settings.frequency, config.scan_step, &mut log, cancel)?
            };
            info!(
                "Scanned {} frequencies, {} hit(s) logged to {}",
                summary.frequencies_scanned,
                summary.hits,
                log.path().display()
            );
        }

        Mode::DeBruijn => {
            let mut radio = spawn_radio(config, config.sniffer_index, "transmitter")?;
            let bits = attack::debruijn_attack(
                &mut radio,
                settings,
                config.debruijn_order,
                &config.retry_policy(),
            )?;
            info!("Sent {} bits", bits);
        }

        Mode::Sequence => {
            let sequence = debruijn::generate(
                Alphabet::from_chars(&config.debruijn_alphabet),
                config.debruijn_order,
            )?;
            info!(
                "de Bruijn sequence over {} symbols [{}], order {}: {} symbols long",
                sequence.arity(),
                sequence.symbols().join(","),
                sequence.order(),
                sequence.len()
            );
            println!("{}", sequence);

            // Two-symbol sequences are sent as packed bits, first symbol as 0
            if sequence.arity() == 2 {
                let bits: Vec<bool> = sequence.indices().iter().map(|&i| i == 1).collect();
                info!("Packed payload: {}", hex::encode(codec::bits_to_bytes(&bits)));
            }
        }
    }

    Ok(())
}

fn spawn_radio(config: &Config, index: u32, label: &str) -> Result<ProcessRadio> {
    ProcessRadio::spawn(&config.radio_command, index, label)
        .with_context(|| format!("Failed to start {} radio (index {})", label, index))
}
