/// A single profile in the compression ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStep {
    pub name: &'static str,
    /// Target image resolution for the external-tool backend
    pub dpi: u32,
    /// Longest image side in pixels for the fallback backend
    pub max_dimension: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

/// Monochrome images are never downsampled below this resolution.
const MIN_MONO_DPI: u32 = 150;

impl CompressionStep {
    pub const fn new(name: &'static str, dpi: u32, max_dimension: u32, quality: u8) -> Self {
        Self {
            name,
            dpi,
            max_dimension,
            quality,
        }
    }

    /// Resolution used for 1-bit images
    pub fn mono_dpi(&self) -> u32 {
        self.dpi.max(MIN_MONO_DPI)
    }
}

/// Compression ladder, from least to most aggressive.
pub const LADDER: [CompressionStep; 6] = [
    CompressionStep::new("light", 200, 2000, 85),
    CompressionStep::new("moderate", 175, 1600, 75),
    CompressionStep::new("standard", 150, 1200, 65),
    CompressionStep::new("aggressive", 125, 1000, 55),
    CompressionStep::new("heavy", 110, 800, 45),
    CompressionStep::new("extreme", 100, 600, 35),
];

/// Look up a ladder position by step name
pub fn step_index(name: &str) -> Option<usize> {
    LADDER.iter().position(|step| step.name == name)
}
