pub mod engine;
pub mod util;
