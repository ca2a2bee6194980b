//! Branching utopia/dystopia story client.
//!
//! The engine sequences the generative backend calls for each story beat and
//! keeps one append-only history consistent while image, narration and video
//! jobs resolve out of order. The `ui` module is an egui front end over it.

pub mod config;
pub mod engine;
pub mod error;
pub mod minigame;
pub mod model;
pub mod ui;
