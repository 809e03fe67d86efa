//! Phrasecast asynchronous speech synthesis
//!
//! This library provides the job-processing core of the phrasecast system:
//! a worker claims queued synthesis jobs, decrypts the owner's stored
//! provider API key, synthesizes each phrase through an external
//! text-to-speech provider, and drives the job to a terminal state.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
