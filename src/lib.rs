pub mod api;
pub mod codegen;
pub mod config;
pub mod errors;
pub mod figma;
pub mod generate;
pub mod pdf;
pub mod preview;
pub mod prompt;
pub mod server;
pub mod session;
pub mod settings;
pub mod sse;
pub mod vector_store;
