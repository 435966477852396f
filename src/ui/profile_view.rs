use adw::prelude::*;
use relm4::prelude::*;

use crate::models::User;

pub struct ProfileView {
    user: Option<User>,
}

#[derive(Debug)]
pub enum ProfileViewMsg {
    SetUser(Option<User>),
    SignOut,
}

#[derive(Debug)]
pub enum ProfileViewOutput {
    SignOut,
}

#[relm4::component(pub)]
impl Component for ProfileView {
    type Init = ();
    type Input = ProfileViewMsg;
    type Output = ProfileViewOutput;
    type CommandOutput = ();

    view! {
        gtk::ScrolledWindow {
            set_vexpand: true,
            set_hscrollbar_policy: gtk::PolicyType::Never,

            adw::Clamp {
                set_maximum_size: 560,

                gtk::Box {
                    set_orientation: gtk::Orientation::Vertical,
                    set_spacing: 24,
                    set_margin_all: 24,

                    adw::Avatar {
                        set_size: 96,
                        set_show_initials: true,
                        #[watch]
                        set_text: model.user.as_ref().map(|u| u.name.as_str()),
                    },

                    gtk::Label {
                        #[watch]
                        set_label: model.user.as_ref().map(|u| u.name.as_str()).unwrap_or("Not signed in"),
                        add_css_class: "title-2",
                    },

                    adw::PreferencesGroup {
                        set_title: "Profile",

                        adw::ActionRow {
                            set_title: "Email",
                            add_css_class: "property",
                            #[watch]
                            set_subtitle: model.user.as_ref().map(|u| u.email.as_str()).unwrap_or_default(),
                        },

                        adw::ActionRow {
                            set_title: "Phone",
                            add_css_class: "property",
                            #[watch]
                            set_visible: model.user.as_ref().is_some_and(|u| !u.phone_number.is_empty()),
                            #[watch]
                            set_subtitle: model.user.as_ref().map(|u| u.phone_number.as_str()).unwrap_or_default(),
                        },

                        adw::ActionRow {
                            set_title: "Location",
                            add_css_class: "property",
                            #[watch]
                            set_subtitle: &model
                                .user
                                .as_ref()
                                .and_then(User::location)
                                .unwrap_or_else(|| "Not set".to_string()),
                        },

                        adw::ActionRow {
                            set_title: "Member since",
                            add_css_class: "property",
                            #[watch]
                            set_subtitle: &model
                                .user
                                .as_ref()
                                .and_then(|u| u.created_at)
                                .map(|at| at.with_timezone(&chrono::Local).format("%B %-d, %Y").to_string())
                                .unwrap_or_else(|| "Unknown".to_string()),
                        },
                    },

                    gtk::Button {
                        set_label: "Sign Out",
                        set_halign: gtk::Align::Center,
                        add_css_class: "destructive-action",
                        add_css_class: "pill",
                        #[watch]
                        set_sensitive: model.user.is_some(),
                        connect_clicked => ProfileViewMsg::SignOut,
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
        let model = Self { user: None };
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            ProfileViewMsg::SetUser(user) => {
                self.user = user;
            }
            ProfileViewMsg::SignOut => {
                let _ = sender.output(ProfileViewOutput::SignOut);
            }
        }
    }
}
