//! Service integrations for external APIs and local tools.
//!
//! This module contains implementations for the services used by assistkit:
//! - The OpenAI Assistants API and the run orchestrator
//! - LLM and embedding providers (Maritaca, Jina, OpenAI-compatible hosts)
//! - Audio transcription (Whisper)
//! - Local tools (echo, web scrapers)
//! - Run tracing (LangSmith)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod assistants;
pub mod audio;
pub mod embeddings;
pub mod llm;
pub mod tools;
pub mod trace;
