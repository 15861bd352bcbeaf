//! Transform configuration and the discrete selector levels exposed on the
//! batch input surface.

use clap::ValueEnum;

/// Settings applied to every image in every document of one batch run.
///
/// `quality` and `scale` both live in `(0.0, 1.0]`; values outside that range
/// are clamped by [`TransformConfig::normalized`] before any image is decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConfig {
    /// JPEG quality factor, 1.0 = best quality / largest size.
    pub quality: f32,
    /// Convert images to single-channel grayscale before encoding.
    pub grayscale: bool,
    /// Resolution multiplier applied to both image width and height.
    pub scale: f32,
}

impl TransformConfig {
    pub fn new(quality: QualityLevel, scale: ResolutionLevel, grayscale: bool) -> Self {
        Self {
            quality: quality.factor(),
            grayscale,
            scale: scale.factor(),
        }
    }

    /// Clamp quality and scale into `(0.0, 1.0]` so degenerate values never
    /// reach the decode/encode steps.
    pub fn normalized(self) -> Self {
        Self {
            quality: self.quality.clamp(0.01, 1.0),
            grayscale: self.grayscale,
            scale: self.scale.clamp(0.01, 1.0),
        }
    }

    /// The quality factor mapped onto the JPEG encoder's 1-100 range.
    pub fn jpeg_quality(&self) -> u8 {
        ((self.quality * 100.0).round() as u8).clamp(1, 100)
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig::new(QualityLevel::Medium, ResolutionLevel::Full, false)
    }
}

/// The six named quality levels offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityLevel {
    VeryLow,
    Lowest,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl QualityLevel {
    pub fn factor(self) -> f32 {
        match self {
            QualityLevel::VeryLow => 0.05,
            QualityLevel::Lowest => 0.10,
            QualityLevel::Low => 0.30,
            QualityLevel::Medium => 0.50,
            QualityLevel::High => 0.80,
            QualityLevel::VeryHigh => 1.00,
        }
    }
}

/// The eight resolution levels, named by the percentage they keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionLevel {
    #[value(name = "100")]
    Full,
    #[value(name = "90")]
    Ninety,
    #[value(name = "80")]
    Eighty,
    #[value(name = "70")]
    Seventy,
    #[value(name = "60")]
    Sixty,
    #[value(name = "50")]
    Fifty,
    #[value(name = "40")]
    Forty,
    #[value(name = "30")]
    Thirty,
}

impl ResolutionLevel {
    pub fn factor(self) -> f32 {
        match self {
            ResolutionLevel::Full => 1.0,
            ResolutionLevel::Ninety => 0.9,
            ResolutionLevel::Eighty => 0.8,
            ResolutionLevel::Seventy => 0.7,
            ResolutionLevel::Sixty => 0.6,
            ResolutionLevel::Fifty => 0.5,
            ResolutionLevel::Forty => 0.4,
            ResolutionLevel::Thirty => 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_levels_map_to_fixed_factors() {
        assert_eq!(QualityLevel::VeryLow.factor(), 0.05);
        assert_eq!(QualityLevel::Lowest.factor(), 0.10);
        assert_eq!(QualityLevel::Low.factor(), 0.30);
        assert_eq!(QualityLevel::Medium.factor(), 0.50);
        assert_eq!(QualityLevel::High.factor(), 0.80);
        assert_eq!(QualityLevel::VeryHigh.factor(), 1.00);
    }

    #[test]
    fn resolution_levels_cover_100_down_to_30() {
        let factors: Vec<f32> = [
            ResolutionLevel::Full,
            ResolutionLevel::Ninety,
            ResolutionLevel::Eighty,
            ResolutionLevel::Seventy,
            ResolutionLevel::Sixty,
            ResolutionLevel::Fifty,
            ResolutionLevel::Forty,
            ResolutionLevel::Thirty,
        ]
        .iter()
        .map(|r| r.factor())
        .collect();
        assert_eq!(factors, vec![1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3]);
    }

    #[test]
    fn normalized_clamps_degenerate_values() {
        let config = TransformConfig {
            quality: 0.0,
            grayscale: false,
            scale: -2.0,
        }
        .normalized();
        assert!(config.quality > 0.0);
        assert!(config.scale > 0.0);

        let config = TransformConfig {
            quality: 7.0,
            grayscale: false,
            scale: 1.5,
        }
        .normalized();
        assert_eq!(config.quality, 1.0);
        assert_eq!(config.scale, 1.0);
    }

    #[test]
    fn jpeg_quality_maps_directly_to_codec_range() {
        let mut config = TransformConfig::default();
        config.quality = 0.5;
        assert_eq!(config.jpeg_quality(), 50);
        config.quality = 1.0;
        assert_eq!(config.jpeg_quality(), 100);
        config.quality = 0.004;
        assert_eq!(config.jpeg_quality(), 1);
    }
}
