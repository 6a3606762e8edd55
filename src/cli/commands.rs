//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::info;

use crate::config::ChainConfig;
use crate::dsp::{MidiEvent, MidiMessage};
use crate::engine::{read_wav, write_wav, AudioBuffer, ProcessSpec};
use crate::error::Result;

/// Render `input` through the configured chain into `output`.
pub fn render(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    cc: &[(u8, u8)],
) -> Result<()> {
    let config = match config {
        Some(path) => ChainConfig::from_file(path)?,
        None => ChainConfig::default(),
    };

    let mut buffer = read_wav(input)?;
    info!(
        "Rendering {} ({} ch, {} Hz, {:.2}s)",
        input.display(),
        buffer.channels(),
        buffer.sample_rate,
        buffer.duration_secs()
    );

    let events: Vec<MidiEvent> = cc
        .iter()
        .map(|&(controller, value)| MidiEvent::new(0, MidiMessage::control_change(controller, value)))
        .collect();

    render_buffer(&config, &mut buffer, &events);
    write_wav(output, &buffer)?;

    println!("Rendered: {}", output.display());
    Ok(())
}

/// Run a whole buffer through a chain built from `config`
///
/// `events` are delivered with the first block only.
pub fn render_buffer(config: &ChainConfig, buffer: &mut AudioBuffer, events: &[MidiEvent]) {
    let block_size = config.block_size.max(1);
    let mut chain = config.build();
    chain.prepare(&ProcessSpec::new(
        buffer.sample_rate as f64,
        buffer.channels(),
        block_size,
    ));

    let len = buffer.len();
    let mut block = buffer.as_block();
    let mut offset = 0;
    while offset < len {
        let midi: &[MidiEvent] = if offset == 0 { events } else { &[] };
        chain.process(&mut block.sub_block(offset, block_size), midi);
        offset += block_size;
    }
}

/// Print the default configuration as pretty JSON.
pub fn default_config() -> Result<()> {
    println!("{}", ChainConfig::default().to_json_string()?);
    Ok(())
}
