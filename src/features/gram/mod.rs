pub mod compositor;
pub mod gradient_text;
pub mod layout;
pub mod service;
pub mod text;

pub use compositor::Compositor;
pub use gradient_text::{GradientTextRenderer, RatingTier};
pub use layout::{GramLayout, LayoutSpec, SectionFrame};
pub use service::GramRenderer;
pub use text::TextShaper;
