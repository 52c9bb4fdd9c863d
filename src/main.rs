//! Probe tool: find an MTP device, open a session, and print what we see.
//!
//! Usage: mtpkit [--device vid:pid] [--mtpz PATH] [--authenticate] [--log FILTER]

use anyhow::{bail, Context};
use mtpkit_client::{ClientConfig, MtpClient};
use mtpkit_mtpz::TrustedApp;
use tracing_subscriber::EnvFilter;

fn parse_args() -> anyhow::Result<(ClientConfig, bool)> {
    let mut config = ClientConfig::default();
    let mut authenticate = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--device" => {
                let selector = args.next().context("--device needs a vid:pid argument")?;
                config.device_selector = Some(selector);
            }
            "--mtpz" => {
                let path = args.next().context("--mtpz needs a path argument")?;
                config.mtpz_bundle = Some(path.into());
            }
            "--log" => {
                let filter = args.next().context("--log needs a filter argument")?;
                config.log_filter = Some(filter);
            }
            "--authenticate" => authenticate = true,
            "--help" | "-h" => {
                println!("usage: mtpkit [--device vid:pid] [--mtpz PATH] [--authenticate] [--log FILTER]");
                std::process::exit(0);
            }
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok((config, authenticate))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, authenticate) = parse_args()?;

    let filter = match &config.log_filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = MtpClient::connect(&config)
        .await
        .context("no usable MTP device")?;

    let info = client.device_info().await;
    println!("{} {} (version {})", info.manufacturer, info.model, info.device_version);
    if !info.serial_number.is_empty() {
        println!("serial: {}", info.serial_number);
    }
    println!(
        "{} operations, {} events, {} playback formats",
        info.operations_supported.len(),
        info.events_supported.len(),
        info.playback_formats.len()
    );

    for (id, storage) in client.storages().await? {
        let free_gib = storage.free_space_bytes as f64 / (1u64 << 30) as f64;
        let max_gib = storage.max_capacity as f64 / (1u64 << 30) as f64;
        let label = if storage.volume_label.is_empty() {
            storage.description.as_str()
        } else {
            storage.volume_label.as_str()
        };
        println!("storage {id}: {label} ({free_gib:.1} GiB free of {max_gib:.1} GiB)");
    }

    if authenticate {
        let mut trusted =
            TrustedApp::create(client.session(), config.mtpz_bundle.as_deref()).await;
        if !trusted.keys_loaded() {
            bail!("MTPZ key bundle not available; pass --mtpz or install ~/.mtpz-data");
        }
        trusted.authenticate().await.context("MTPZ handshake failed")?;
        println!("trusted-app authentication succeeded");
    }

    client.close().await?;
    Ok(())
}
