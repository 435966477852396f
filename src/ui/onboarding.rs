use adw::prelude::*;
use relm4::prelude::*;

use crate::config::APP_NAME;

/// Landing page shown while nobody is signed in.
pub struct WelcomePage {
    restoring: bool,
}

#[derive(Debug)]
pub enum WelcomeMsg {
    SetRestoring(bool),
    SignIn,
    CreateAccount,
}

#[derive(Debug)]
pub enum WelcomeOutput {
    SignIn,
    CreateAccount,
}

#[relm4::component(pub)]
impl Component for WelcomePage {
    type Init = ();
    type Input = WelcomeMsg;
    type Output = WelcomeOutput;
    type CommandOutput = ();

    view! {
        adw::Clamp {
            set_maximum_size: 440,
            set_margin_top: 32,
            set_margin_bottom: 40,

            gtk::Box {
                set_orientation: gtk::Orientation::Vertical,
                set_spacing: 24,
                set_valign: gtk::Align::Center,
                set_halign: gtk::Align::Center,

                gtk::Image {
                    set_icon_name: Some("airplane-mode-symbolic"),
                    set_pixel_size: 96,
                    add_css_class: "dim-label",
                },

                gtk::Box {
                    set_orientation: gtk::Orientation::Vertical,
                    set_spacing: 8,
                    set_halign: gtk::Align::Center,

                    gtk::Label {
                        set_label: &format!("Welcome to {}", APP_NAME),
                        add_css_class: "title-1",
                    },

                    gtk::Label {
                        set_label: "Tell us where you want to go and our agents plan the trip",
                        set_wrap: true,
                        set_justify: gtk::Justification::Center,
                        add_css_class: "dim-label",
                    },
                },

                gtk::Spinner {
                    #[watch]
                    set_spinning: model.restoring,
                    #[watch]
                    set_visible: model.restoring,
                },

                gtk::Box {
                    set_orientation: gtk::Orientation::Vertical,
                    set_spacing: 12,
                    set_halign: gtk::Align::Center,
                    #[watch]
                    set_visible: !model.restoring,

                    gtk::Button {
                        set_label: "Sign In",
                        add_css_class: "suggested-action",
                        add_css_class: "pill",
                        connect_clicked => WelcomeMsg::SignIn,
                    },

                    gtk::Button {
                        set_label: "Create Account",
                        add_css_class: "pill",
                        connect_clicked => WelcomeMsg::CreateAccount,
                    },
                },
            },
        }
    }

    fn init(
        _init: Self::Init,
        root: Self::Root,
        _sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let model = Self { restoring: true };
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            WelcomeMsg::SetRestoring(restoring) => {
                self.restoring = restoring;
            }
            WelcomeMsg::SignIn => {
                let _ = sender.output(WelcomeOutput::SignIn);
            }
            WelcomeMsg::CreateAccount => {
                let _ = sender.output(WelcomeOutput::CreateAccount);
            }
        }
    }
}
