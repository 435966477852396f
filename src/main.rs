mod api;
mod app;
mod config;
mod models;
mod services;
#[cfg(test)]
mod test_support;
mod ui;
mod voice;

use gtk::prelude::*;
use relm4::prelude::*;
use tracing_subscriber::EnvFilter;

use app::App;
use config::APP_ID;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tripchat=info")),
        )
        .init();

    let app = adw::Application::builder().application_id(APP_ID).build();

    app.connect_startup(|_| {
        let resource_bytes = glib::Bytes::from_static(include_bytes!(concat!(
            env!("OUT_DIR"),
            "/tripchat.gresource"
        )));
        let resource =
            gio::Resource::from_data(&resource_bytes).expect("Failed to load GResource");
        gio::resources_register(&resource);

        gtk::Window::set_default_icon_name(APP_ID);

        let Some(display) = gtk::gdk::Display::default() else {
            tracing::error!("No display available, skipping custom styles");
            return;
        };
        let provider = gtk::CssProvider::new();
        provider.load_from_resource("/com/tripchat/TripChat/style.css");
        gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    });

    RelmApp::from_app(app).run_async::<App>(());
}
