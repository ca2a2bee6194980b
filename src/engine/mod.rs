pub mod animation;
pub mod audio_output;
pub mod backend;
pub mod credentials;
pub mod engine;
pub mod gate;
pub mod gemini;
pub mod playback;
pub mod prompt_builder;
pub mod protocol;
