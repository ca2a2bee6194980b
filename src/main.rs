use anyhow::anyhow;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use utopia_dystopia::config::AppConfig;
use utopia_dystopia::ui::app::StoryApp;
use utopia_dystopia::ui::settings::UiSettings;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load();
    let settings = UiSettings::load();
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Utopia / Dystopia",
        options,
        Box::new(move |cc| Ok(Box::new(StoryApp::new(cc, config, settings)?))),
    )
    .map_err(|err| anyhow!("window closed with an error: {err}"))
}
