pub mod render;
pub use render::{load_font, render_text_pixmap, FrameStats, SkiaRenderer};
