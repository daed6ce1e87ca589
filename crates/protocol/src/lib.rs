pub mod annotation;
pub mod commands;
pub mod shared_str;
pub mod theme;
pub mod types;

pub use annotation::AnnotationView;
pub use commands::{RenderCommand, TextAlign};
pub use shared_str::SharedStr;
pub use theme::{BubblePalette, StyleTag, ThemeToken};
pub use types::{EntityId, Point, Rect, Viewport};
