pub mod data;
pub mod shadow;
pub mod source;

pub use data::handle_data_events;
pub use source::handle_source_events;
