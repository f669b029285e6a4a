//! Chip family selection
//!
//! The user picks the chip family before connecting. The family only
//! decides the serial baud rate used by the flashing engine.

use core::fmt;
use core::str::FromStr;

/// Baud rate for ESP32-C3
pub const SLOW_BAUD_RATE: u32 = 115_200;
/// Baud rate used for every other family
pub const FAST_BAUD_RATE: u32 = 921_600;

/// Supported chip families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChipFamily {
    /// ESP32
    #[default]
    Esp32,
    /// ESP32-S2
    Esp32S2,
    /// ESP32-S3
    Esp32S3,
    /// ESP32-C3
    Esp32C3,
    /// ESP32-C6
    Esp32C6,
    /// ESP32-H2
    Esp32H2,
    /// ESP8266
    Esp8266,
}

impl ChipFamily {
    /// All families, in display order
    pub const ALL: [ChipFamily; 7] = [
        ChipFamily::Esp32,
        ChipFamily::Esp32S2,
        ChipFamily::Esp32S3,
        ChipFamily::Esp32C3,
        ChipFamily::Esp32C6,
        ChipFamily::Esp32H2,
        ChipFamily::Esp8266,
    ];

    /// Selector value (as used in `<select>` options and on the command line)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Esp32 => "esp32",
            Self::Esp32S2 => "esp32s2",
            Self::Esp32S3 => "esp32s3",
            Self::Esp32C3 => "esp32c3",
            Self::Esp32C6 => "esp32c6",
            Self::Esp32H2 => "esp32h2",
            Self::Esp8266 => "esp8266",
        }
    }

    /// Baud rate to run the flashing protocol at
    pub fn baud_rate(&self) -> u32 {
        match self {
            Self::Esp32C3 => SLOW_BAUD_RATE,
            _ => FAST_BAUD_RATE,
        }
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChipFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_chip_name(s);
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == wanted)
            .ok_or_else(|| format!("unknown chip family: {}", s))
    }
}

/// Lower-case a chip name and drop separators ("ESP32-C3" -> "esp32c3")
pub fn normalize_chip_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether two chip names refer to the same chip
///
/// The flashing engine reports names such as "ESP32-C3 (QFN32) (revision v0.4)";
/// only the leading name is compared.
pub fn chip_names_match(detected: &str, expected: &str) -> bool {
    let head = detected.split_whitespace().next().unwrap_or("");
    normalize_chip_name(head) == normalize_chip_name(expected)
}
