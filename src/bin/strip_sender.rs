//! Sends random-color pixel frames to an ingress server and prints the
//! status response for each one.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use ledsock::compress::encode_compressed_frame;
use ledsock::network::response::{StatusResponse, STATUS_RESPONSE_SIZE};
use ledsock::network::wire::{encode_pixel_frame, LED_DATA_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct Options {
    addr: String,
    leds: usize,
    per_second: u32,
    count: Option<u64>,
    compress: bool,
}

fn parse_args() -> Result<Option<Options>> {
    let mut opts = Options {
        addr: "127.0.0.1:49152".to_string(),
        leds: 60,
        per_second: 3,
        count: None,
        compress: false,
    };

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| -> Result<&String> {
            args.get(i + 1)
                .with_context(|| format!("{} requires a value", args[i]))
        };
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!(
                    "Usage: strip_sender [--addr HOST:PORT] [--leds N] [--rate PER_SEC] [--count N] [--compress]"
                );
                return Ok(None);
            }
            "--addr" => {
                opts.addr = value(i)?.clone();
                i += 1;
            }
            "--leds" => {
                opts.leds = value(i)?.parse().context("--leds must be a number")?;
                i += 1;
            }
            "--rate" => {
                opts.per_second = value(i)?.parse().context("--rate must be a number")?;
                i += 1;
            }
            "--count" => {
                opts.count = Some(value(i)?.parse().context("--count must be a number")?);
                i += 1;
            }
            "--compress" => opts.compress = true,
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    if opts.per_second == 0 {
        bail!("--rate must be greater than zero");
    }
    Ok(Some(opts))
}

fn print_response(resp: &StatusResponse) {
    println!("Size: {}", resp.size);
    println!("Sequence: {}", resp.sequence);
    println!("Flash Version: {}", resp.flash_version);
    println!("Current Clock: {:.6}", resp.current_clock);
    println!("Oldest Packet: {:.6}", resp.oldest_packet);
    println!("Newest Packet: {:.6}", resp.newest_packet);
    println!("Brightness: {:.6}", resp.brightness);
    println!("Wi-Fi Signal: {:.6}", resp.wifi_signal);
    println!("Buffer Size: {}", resp.buffer_size);
    println!("Buffer Position: {}", resp.buffer_pos);
    println!("FPS Drawing: {}", resp.fps_drawing);
    println!("Watts: {}", resp.watts);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(opts) = parse_args()? else {
        return Ok(());
    };

    let mut stream = TcpStream::connect(&opts.addr)
        .await
        .with_context(|| format!("Cannot connect to {}", opts.addr))?;
    tracing::info!("[sender] [connected] addr={} leds={}", opts.addr, opts.leds);

    let mut ticker = tokio::time::interval(Duration::from_secs(1) / opts.per_second);
    let mut sent: u64 = 0;

    while opts.count.map_or(true, |count| sent < count) {
        ticker.tick().await;

        let colors: Vec<u8> = (0..opts.leds * LED_DATA_SIZE)
            .map(|_| rand::random::<u8>())
            .collect();
        let now = chrono::Utc::now();
        let frame = encode_pixel_frame(
            0,
            now.timestamp() as u64,
            now.timestamp_subsec_micros() as u64,
            &colors,
        );

        if opts.compress {
            let packet = encode_compressed_frame(&frame)?;
            stream.write_all(&packet).await?;
            tracing::debug!("[sender] [sent] compressed {} -> {} bytes", frame.len(), packet.len());
        } else {
            stream.write_all(&frame).await?;
            tracing::debug!("[sender] [sent] {} bytes", frame.len());

            let mut reply = [0u8; STATUS_RESPONSE_SIZE];
            stream
                .read_exact(&mut reply)
                .await
                .context("Failed to receive status response")?;
            if let Some(resp) = StatusResponse::decode(&reply) {
                print_response(&resp);
            }
        }
        sent += 1;
    }

    Ok(())
}
