#![forbid(unsafe_code)]

pub mod color;
pub mod config;
pub mod encode;
pub mod error;
pub mod filter;
pub mod frame;
pub mod layout;
pub mod pipeline;
pub mod rng;
pub mod sampler;
pub mod text;
pub mod words;

pub use config::{Config, RawConfig};
pub use error::{GifweaveError, GifweaveResult};
pub use frame::RawFrame;
pub use rng::{RandomPool, Seeds};
