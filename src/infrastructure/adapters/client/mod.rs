//! Synthesis Client Adapter - 远端合成服务

mod http_synthesis_client;

pub use http_synthesis_client::{HttpSynthesisClient, HttpSynthesisClientConfig};
