use crate::error::ConfigError;

pub const DEFAULT_PALETTE: [&str; 10] = [
    "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#14b8a6", "#f97316",
    "#6366f1", "#84cc16",
];

/// Maps a device identifier to one palette entry. The mapping depends only
/// on the identifier and the palette, so every view colors a device the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colorizer {
    palette: Vec<String>,
}

impl Colorizer {
    pub fn new(palette: Vec<String>) -> Result<Self, ConfigError> {
        if palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        Ok(Colorizer { palette })
    }

    pub fn color_for(&self, ip: &str) -> &str {
        let index = string_hash(ip).unsigned_abs() as usize % self.palette.len();
        &self.palette[index]
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }
}

impl Default for Colorizer {
    fn default() -> Self {
        Colorizer {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// `hash = code + (hash << 5) - hash` over UTF-16 code units, wrapping at
/// 32 bits signed.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    })
}
