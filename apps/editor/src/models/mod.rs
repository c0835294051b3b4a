// Document model: resume content, field addressing, and the editable document that
// keeps content and formatting overlay in step.

pub mod document;
pub mod field_key;
pub mod resume;
