//! Boundary with the external inference server.
//!
//! `process` owns the OS process (serve / stop <model>), `health` answers whether the HTTP
//! endpoint is reachable, and `ollama` performs completion calls for a loaded model.

mod health;
mod ollama;
mod process;

pub use health::HealthProber;
pub use ollama::ModelHandle;
pub use process::{ModelUnloader, ProcessController, ServerProcess};
