//! Simple inspector for project files.
//!
//! Usage: `cargo run --example dump_events -- <file.flp> [limit]`
//! Set `RUST_LOG=flp_events=trace` to see the parser's per-event log.

use std::fs;

use flp_events::model::ModelBase;
use flp_events::project::{arrangements, EnvelopeLfo, ProjectFile};
use flp_events::{Event, SizeKind, TextEncoding};
use tracing_subscriber::EnvFilter;

fn format_event(event: &Event, encoding: Option<TextEncoding>) -> String {
    match event.kind() {
        SizeKind::Byte | SizeKind::Word | SizeKind::DWord => format!("{event:?}"),
        SizeKind::Text => match encoding.map(|e| event.as_text(e)) {
            Some(Ok(text)) => {
                let preview: String = text.chars().take(60).collect();
                if text.chars().count() > 60 {
                    format!("TEXT \"{preview}...\"")
                } else {
                    format!("TEXT \"{preview}\"")
                }
            }
            _ => format!("TEXT[{} bytes]", event.payload().len()),
        },
        SizeKind::Data => format!("DATA[{} bytes]", event.payload().len()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "project.flp".to_string());
    let limit: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(40);

    println!("Reading: {}", path);
    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let file = ProjectFile::parse(&data).expect("Failed to parse");
    let stream = &file.events;
    let encoding = stream.text_encoding().ok();

    println!("\n=== Header ===");
    println!("Format: {:?} ({})", file.file_format(), file.format);
    println!("Channels: {}", file.channel_count);
    println!("PPQ: {}", file.ppq);
    match stream.version() {
        Some(v) => println!("Version: {} ({:?} text)", v, v.text_encoding()),
        None => println!("Version: not found"),
    }

    let mut counts = [0usize; 5];
    for event in stream {
        let slot = match event.kind() {
            SizeKind::Byte => 0,
            SizeKind::Word => 1,
            SizeKind::DWord => 2,
            SizeKind::Text => 3,
            SizeKind::Data => 4,
        };
        counts[slot] += 1;
    }
    println!("\n=== Events ({}) ===", stream.len());
    println!("  Byte: {}", counts[0]);
    println!("  Word: {}", counts[1]);
    println!("  DWord: {}", counts[2]);
    println!("  Text: {}", counts[3]);
    println!("  Data: {}", counts[4]);

    println!("\n=== First {} Events (detail) ===", limit);
    for (pos, event) in stream.iter().take(limit).enumerate() {
        println!("[{pos}] {}", format_event(event, encoding));
    }
    if stream.len() > limit {
        println!("... and {} more events", stream.len() - limit);
    }

    match arrangements(stream) {
        Ok(list) => {
            println!("\n=== Arrangements ({}) ===", list.len());
            for arrangement in &list {
                let clips = arrangement.playlist(stream).map_or(0, |p| p.len(stream));
                println!(
                    "  {:?} {:?}: {} clip(s)",
                    arrangement.index(stream),
                    arrangement.name(stream),
                    clips
                );
            }
        }
        Err(e) => println!("\nArrangements: {e}"),
    }

    let envelopes = EnvelopeLfo::all(stream);
    println!("\n=== Envelope/LFO records ({}) ===", envelopes.len());
    for envelope in envelopes.iter().take(5) {
        if let Some(registry) = envelope.properties() {
            for (name, value) in registry.read_all(envelope.model(), stream) {
                match value {
                    Some(v) => println!("  {name} = {v}"),
                    None => println!("  {name} = <unset>"),
                }
            }
            println!();
        }
    }

    let round_trip = file.serialize().expect("Failed to serialize");
    println!(
        "Round trip: {}",
        if round_trip == data { "identical" } else { "DIFFERS" }
    );
}
