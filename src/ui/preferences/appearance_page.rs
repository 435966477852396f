use adw::prelude::*;
use relm4::prelude::*;

use crate::services::settings::{AppSettings, ColorScheme, SettingChange};

pub struct AppearancePage {
    scheme: ColorScheme,
}

#[derive(Debug)]
pub enum AppearancePageMsg {
    SchemeSelected(u32),
}

#[derive(Debug)]
pub enum AppearancePageOutput {
    Changed(SettingChange),
}

#[relm4::component(pub)]
impl Component for AppearancePage {
    type Init = AppSettings;
    type Input = AppearancePageMsg;
    type Output = AppearancePageOutput;
    type CommandOutput = ();

    view! {
        adw::PreferencesPage {
            set_title: "Appearance",
            set_icon_name: Some("preferences-desktop-appearance-symbolic"),

            adw::PreferencesGroup {
                set_title: "Style",
                set_description: Some("Takes effect right away"),

                adw::ComboRow {
                    set_title: "Color scheme",
                    set_model: Some(&scheme_labels),
                    set_selected: model.scheme.position(),
                    connect_selected_notify[sender] => move |row| {
                        sender.input(AppearancePageMsg::SchemeSelected(row.selected()));
                    },
                },
            },
        }
    }

    fn init(
        settings: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let labels: Vec<&str> = ColorScheme::ALL.iter().map(ColorScheme::label).collect();
        let scheme_labels = gtk::StringList::new(&labels);

        let model = Self {
            scheme: settings.color_scheme,
        };
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            AppearancePageMsg::SchemeSelected(position) => {
                let scheme = ColorScheme::from_position(position);
                if scheme == self.scheme {
                    return;
                }
                self.scheme = scheme;
                apply_color_scheme(scheme);
                let _ = sender.output(AppearancePageOutput::Changed(SettingChange::ColorScheme(
                    scheme,
                )));
            }
        }
    }
}

pub fn apply_color_scheme(scheme: ColorScheme) {
    let adw_scheme = match scheme {
        ColorScheme::System => adw::ColorScheme::Default,
        ColorScheme::Light => adw::ColorScheme::ForceLight,
        ColorScheme::Dark => adw::ColorScheme::ForceDark,
    };
    adw::StyleManager::default().set_color_scheme(adw_scheme);
}
