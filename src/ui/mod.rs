pub mod app;
pub mod minigame_view;
pub mod settings;
pub mod story_panel;
pub mod textures;
