// lib.rs - Main library file that exports all modules
pub mod config;
pub mod core;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod scanner;
pub mod scenes;
pub mod state;
pub mod storage;
pub mod transform;
pub mod types;
pub mod utils;
pub mod visual;
pub mod workspace;

// Re-export commonly used types for convenience
pub use types::*;
pub use self::core::analyze_video;
pub use error::{ApiError, ProcessingError};
pub use scenes::{detect_scenes, DEFAULT_SCENE_THRESHOLD};
pub use state::AppState;
pub use transform::{process_video_output, EditPlan};
