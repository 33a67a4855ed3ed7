// RenderQ Generative Language API Infrastructure

mod client;
mod types;

pub use client::GenAiClient;
