pub mod client;
pub mod decode;
pub mod error;

pub use client::{HttpInferenceClient, InferenceApi};
pub use error::InferenceError;
