//! Generative-AI providers

pub mod google;
