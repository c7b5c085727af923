mod app;
mod ui;

use iced::{window, Size};
use log::{error, info};

use lumen_downloader::{logging, ApiClient, ApiConfig};

fn main() -> iced::Result {
    logging::init();

    let config = ApiConfig::from_env();
    info!("Using download service at {}", config.base_url);

    let api_client = match ApiClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            eprintln!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    iced::application(
        move || app::DownloadApp::new(api_client.clone()),
        app::update,
        app::view,
    )
    .title("Lumen Downloader")
    .window(window::Settings {
        size: Size::new(560.0, 760.0),
        ..Default::default()
    })
    .run()
}
