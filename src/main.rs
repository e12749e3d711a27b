//! Offline driver for the `meshfrag` engine.
//!
//! Parses CLI arguments, builds a packet of the requested size and runs it
//! through fragmentation and, for `roundtrip`, reassembly.

mod cli;

use std::{error::Error, time::Duration};

use clap::Parser;
use meshfrag::{
    FragmentManager,
    FragmentOutcome,
    FragmentPlan,
    FragmentationConfig,
    MessageType,
    Packet,
    PeerId,
    fragment::ConfigError,
};
use rand::{Rng, seq::SliceRandom};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FragmentationArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let manager = FragmentManager::new(build_config(&cli.fragmentation)?);
    manager.start()?;

    let result = match cli.command {
        Command::Split { size } => split(&manager, size),
        Command::Roundtrip { size } => roundtrip(&manager, size),
    };
    manager.stop();
    result
}

fn build_config(args: &FragmentationArgs) -> Result<FragmentationConfig, ConfigError> {
    let config = match args.mtu {
        Some(mtu) => FragmentationConfig::for_link_mtu(mtu)?,
        None => FragmentationConfig::new(
            args.threshold,
            args.max_fragment_size,
            FragmentationConfig::default().reassembly_timeout,
            FragmentationConfig::default().cleanup_interval,
        )?,
    };
    let timings = FragmentationConfig::new(
        config.threshold,
        config.max_fragment_size.get(),
        Duration::from_secs(args.timeout_secs),
        Duration::from_secs(args.cleanup_secs),
    )?;
    Ok(timings.with_strict_completeness(args.strict))
}

fn random_packet(size: usize) -> Packet {
    let mut rng = rand::thread_rng();
    let payload: Vec<u8> = (0..size).map(|_| rng.r#gen()).collect();
    Packet::new(MessageType::MESSAGE, PeerId::new(rng.r#gen()), payload)
}

fn split(manager: &FragmentManager, size: usize) -> Result<(), Box<dyn Error>> {
    let packet = random_packet(size);
    match manager.try_create_fragments(&packet)? {
        FragmentPlan::Unfragmented => {
            println!("packet of {size} payload bytes fits the threshold; sent whole");
        }
        FragmentPlan::Fragmented {
            fragment_id,
            fragments,
        } => {
            println!("fragment set {fragment_id}: {} fragments", fragments.len());
            for (index, fragment) in fragments.iter().enumerate() {
                println!(
                    "  [{index}] payload {} bytes, envelope {} bytes",
                    fragment.payload().len(),
                    fragment.encoded_len()
                );
            }
        }
    }
    Ok(())
}

fn roundtrip(manager: &FragmentManager, size: usize) -> Result<(), Box<dyn Error>> {
    let packet = random_packet(size);
    let mut fragments = manager.create_fragments(packet.clone());
    if fragments.len() <= 1 {
        println!("packet of {size} payload bytes fits the threshold; nothing to reassemble");
        return Ok(());
    }
    fragments.shuffle(&mut rand::thread_rng());
    info!(count = fragments.len(), "delivering shuffled fragments");

    let mut rebuilt = None;
    for fragment in &fragments {
        match manager.process_fragment(fragment) {
            FragmentOutcome::Pending { received, total, .. } => {
                println!("  collected {received}/{total}");
            }
            FragmentOutcome::Complete(packet) => rebuilt = Some(packet),
            FragmentOutcome::Rejected(reason) => return Err(reason.into()),
        }
    }

    let rebuilt = rebuilt.ok_or("fragment set did not complete")?;
    if rebuilt.payload() != packet.payload() {
        return Err("reassembled payload differs from the original".into());
    }
    println!(
        "reassembled {} payload bytes from {} fragments, ttl {}",
        rebuilt.payload().len(),
        fragments.len(),
        rebuilt.ttl()
    );
    Ok(())
}
