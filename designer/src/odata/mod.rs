pub mod compiler;
pub mod mapper;
pub mod naming;

pub use compiler::compile;
pub use mapper::{columns, map_rows};
pub use naming::{escape_literal, navigation_property, navigation_property_for};
