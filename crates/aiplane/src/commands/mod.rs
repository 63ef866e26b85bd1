pub mod apply;
pub mod import;
pub mod list;
pub mod plan;
pub mod resources;
