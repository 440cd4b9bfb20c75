pub mod rendering;

pub use rendering::{
    DEFAULT_MAX_OUTPUT_SIZE, OutputValidator, RenderConfig, RenderingError, SafeRenderer,
    TEMPLATE_EXTENSION, ValidationError,
};
