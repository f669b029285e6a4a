//! List commands implementation

use crate::programmers;
use fwprov_core::ChipFamily;

/// List all available device backends
pub fn list_programmers() {
    let programmers = programmers::available_programmers();
    if programmers.is_empty() {
        println!("No device backends available (recompile with backend features enabled)");
        return;
    }

    println!("Available device backends:");
    println!();
    for p in &programmers {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        println!("  {:<10} - {}{}", p.name, p.description, aliases);
    }
}

/// List supported chip families and their flashing baud rates
pub fn list_chips() {
    println!("Supported chip families:");
    println!();
    println!("{:<10} {:>10}", "Family", "Baud rate");
    println!("{}", "-".repeat(21));
    for chip in ChipFamily::ALL {
        println!("{:<10} {:>10}", chip.as_str(), chip.baud_rate());
    }
}
