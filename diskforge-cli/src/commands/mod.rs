pub mod create;
pub mod plan;
pub mod size;
