pub mod content_type;
pub mod noop;
pub mod size;
pub mod transform;

pub use content_type::ContentTypeValidator;
pub use noop::NoopValidator;
pub use size::MaxSizeValidator;
pub use transform::TransformValidator;
