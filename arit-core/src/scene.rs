/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// Centred on an empty screen, above the bar when a bar is shown.
    pub message: Option<String>,
    pub bar: Option<BarScene>,
    pub countdown: Option<u32>,
}

/// Geometry in centimetres, measured from the bottom of the bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarScene {
    pub bar_height_cm: f64,
    pub bar_width_cm: f64,
    pub fill_cm: f64,
    pub target_cm: f64,
    pub arrow_color: [u8; 4],
}

impl Scene {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }
}
