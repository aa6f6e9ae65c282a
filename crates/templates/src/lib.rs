//! Template rendering for subjects and bodies.

pub mod placeholder;
pub mod render;
pub mod style;

pub use placeholder::{Placeholder, PlaceholderContext};
pub use render::{render_body, render_subject};
pub use style::{BodyStyle, FontPreset};
