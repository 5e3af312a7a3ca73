pub mod dialects;
pub mod named_params;
