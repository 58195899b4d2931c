pub mod labels;
pub mod nutrition;
