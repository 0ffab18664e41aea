pub mod cases;
pub mod operations;
pub mod shared;
