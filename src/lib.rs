//! Library crate for quiz-rooms-back, exposing modules for the binary and
//! integration tests.

pub mod cache;
pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
