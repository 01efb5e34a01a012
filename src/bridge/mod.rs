pub mod chunk_bridge;
pub mod frame_parser;
pub mod types;
