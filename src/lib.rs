//! Candor: multimodal emotion fusion and authenticity engine.
//!
//! Continuously infers a user's emotional state from independent classifier
//! outputs (facial expression, voice, free text) and decides whether the
//! evidence is consistent enough to be trusted before reporting a final
//! emotion.
//!
//! # Architecture
//!
//! The engine is built from independent pieces wired behind ports:
//! - **Capture sources**: supply raw modality samples on demand; physical
//!   devices are exclusively owned by one session at a time
//! - **Classifiers**: pluggable per-modality black boxes returning a label
//!   and confidence (a built-in keyword heuristic covers text)
//! - **Tracker**: one timer loop per active session pulls samples, classifies
//!   them, and feeds each tick's results into fusion
//! - **Fusion engine**: plurality vote, two-stage confidence weighting,
//!   consistency scoring, and the authenticity verdict with a deterministic
//!   explanation
//! - **Session store**: bounded per-session fusion history with sliding
//!   window queries
//!
//! `EmotionService` ties these together behind the public operations, and
//! `server` exposes them over HTTP.

pub mod capture;
pub mod classifier;
pub mod config;
pub mod emotion;
pub mod error;
pub mod fusion;
pub mod server;
pub mod service;
pub mod session;
pub mod tracker;

pub use capture::{CaptureSource, DeviceRegistry};
pub use classifier::{EmotionClassifier, NullClassifier, RawSample, TextClassifier};
pub use config::EngineConfig;
pub use emotion::{EmotionLabel, FusionResult, Modality, ModalityResult};
pub use error::{EmotionError, Result};
pub use fusion::FusionEngine;
pub use server::EmotionServer;
pub use service::EmotionService;
pub use session::{SessionStore, TrackingStatus, WindowConsistency};
pub use tracker::ContinuousTracker;
