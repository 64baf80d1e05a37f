//! Lists ALSA sound cards so the operator can pick `audio.device`.
//!
//! Card `N` is addressed as `plughw:N,0` in the gateway config.

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    println!("--- ALSA Sound Cards ---");

    let mut found = 0usize;
    for card in alsa::card::Iter::new() {
        let card = card.context("failed to enumerate sound cards")?;
        let name = card
            .get_name()
            .unwrap_or_else(|_| "<unnamed>".to_string());
        let long_name = card.get_longname().unwrap_or_default();
        if long_name.is_empty() || long_name == name {
            println!("Card {}: {name}", card.get_index());
        } else {
            println!("Card {}: {name} ({long_name})", card.get_index());
        }
        found += 1;
    }

    if found == 0 {
        println!("No sound cards found.");
    }

    println!();
    println!("--- Note ---");
    println!("Use the 'Card X' number as 'plughw:X,0' for audio.device or --device.");
    println!("Example: if a USB interface is Card 1, the device is 'plughw:1,0'.");
    Ok(())
}
