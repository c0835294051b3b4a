// Formatting: closed attribute sets, the per-field overlay, and the applicator that
// turns toolbar actions into overlay updates plus inline preview marks.

pub mod applicator;
pub mod attributes;
pub mod overlay;

pub use attributes::{AttributeValue, FormatAttribute, FormatAttributes, FormatCommand};
pub use overlay::FormatOverlay;
