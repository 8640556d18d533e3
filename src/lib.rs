//! Reelgen: topic-to-video generation pipeline
//!
//! Turns a topic into a narrated short video by chaining remote generation
//! calls: a script, a set of images per paragraph, narration audio, and a
//! video rendered by a long-running remote job. Also hosts the iterative
//! thumbnail refinement loop.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod refinement;
pub mod telemetry;
pub mod types;
