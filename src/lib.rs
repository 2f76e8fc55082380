//! Client core for the SAHAB legal-information chat assistant.
//!
//! [`session::ChatSession`] owns the transcript of one conversation and sends
//! each prompt to the remote chat endpoint through [`ai::StreamClient`],
//! applying the streamed answer as it arrives.

pub mod ai;
pub mod config;
pub mod error;
pub mod session;
pub mod transcript;
pub mod types;
