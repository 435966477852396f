use gtk::prelude::*;
use relm4::prelude::*;

use crate::models::{StatusLevel, StatusUpdate};
use crate::services::status::{find_completion, progress};

/// Live progress of the backend planning agents for one conversation.
pub struct StatusView {
    title: String,
    updates: Vec<StatusUpdate>,
    polling: bool,
    complete: bool,
    error: Option<String>,
    updates_box: gtk::Box,
}

#[derive(Debug)]
pub enum StatusViewMsg {
    /// Reset for a conversation, optionally seeded from the local cache.
    SetConversation {
        title: String,
        cached: Vec<StatusUpdate>,
    },
    SetTitle(String),
    SetUpdates(Vec<StatusUpdate>),
    SetPolling(bool),
    SetError(Option<String>),
    Clear,
    // Internal
    ViewPlan,
    BackToChat,
}

#[derive(Debug)]
pub enum StatusViewOutput {
    ViewPlan,
    BackToChat,
}

#[relm4::component(pub)]
impl Component for StatusView {
    type Init = ();
    type Input = StatusViewMsg;
    type Output = StatusViewOutput;
    type CommandOutput = ();

    view! {
        gtk::ScrolledWindow {
            set_vexpand: true,
            set_hscrollbar_policy: gtk::PolicyType::Never,

            adw::Clamp {
                set_maximum_size: 720,

                gtk::Box {
                    set_orientation: gtk::Orientation::Vertical,
                    set_spacing: 16,
                    set_margin_all: 24,

                    gtk::Box {
                        set_orientation: gtk::Orientation::Horizontal,
                        set_spacing: 8,

                        gtk::Button {
                            set_icon_name: "go-previous-symbolic",
                            set_tooltip_text: Some("Back to chat"),
                            add_css_class: "flat",
                            connect_clicked => StatusViewMsg::BackToChat,
                        },

                        gtk::Label {
                            #[watch]
                            set_label: &model.title,
                            set_halign: gtk::Align::Start,
                            set_hexpand: true,
                            set_ellipsize: gtk::pango::EllipsizeMode::End,
                            add_css_class: "title-2",
                        },
                    },

                    gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_spacing: 4,

                        gtk::ProgressBar {
                            #[watch]
                            set_fraction: f64::from(progress(&model.updates)) / 100.0,
                        },

                        gtk::Label {
                            set_halign: gtk::Align::End,
                            add_css_class: "caption",
                            add_css_class: "dim-label",
                            #[watch]
                            set_label: &format!("{}%", progress(&model.updates)),
                        },
                    },

                    // Processing banner
                    gtk::Box {
                        set_orientation: gtk::Orientation::Horizontal,
                        set_spacing: 12,
                        add_css_class: "processing-banner",
                        #[watch]
                        set_visible: model.polling && !model.complete,

                        gtk::Spinner {
                            #[watch]
                            set_spinning: model.polling && !model.complete,
                        },

                        gtk::Box {
                            set_orientation: gtk::Orientation::Vertical,

                            gtk::Label {
                                set_label: "Processing...",
                                set_halign: gtk::Align::Start,
                                add_css_class: "heading",
                            },

                            gtk::Label {
                                set_label: "Our agents are working on your trip plan. Updates appear below.",
                                set_halign: gtk::Align::Start,
                                set_wrap: true,
                                add_css_class: "dim-label",
                            },
                        },
                    },

                    // Plan ready banner
                    gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_spacing: 8,
                        add_css_class: "plan-ready-banner",
                        #[watch]
                        set_visible: model.complete,

                        gtk::Label {
                            set_label: "Trip plan ready!",
                            set_halign: gtk::Align::Start,
                            add_css_class: "title-3",
                        },

                        gtk::Label {
                            set_label: "Your personalized trip plan has been generated.",
                            set_halign: gtk::Align::Start,
                            set_wrap: true,
                        },

                        gtk::Button {
                            set_label: "View Trip Plan",
                            set_halign: gtk::Align::Start,
                            add_css_class: "suggested-action",
                            add_css_class: "pill",
                            connect_clicked => StatusViewMsg::ViewPlan,
                        },
                    },

                    gtk::Label {
                        #[watch]
                        set_visible: model.error.is_some(),
                        #[watch]
                        set_label: model.error.as_deref().unwrap_or_default(),
                        set_halign: gtk::Align::Start,
                        set_wrap: true,
                        add_css_class: "error",
                    },

                    gtk::Label {
                        set_label: "No status updates yet.",
                        add_css_class: "dim-label",
                        #[watch]
                        set_visible: model.updates.is_empty(),
                    },

                    #[local_ref]
                    updates_box -> gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_spacing: 8,
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
        let updates_box = gtk::Box::new(gtk::Orientation::Vertical, 8);

        let model = Self {
            title: "Trip Planning Status".to_string(),
            updates: Vec::new(),
            polling: false,
            complete: false,
            error: None,
            updates_box: updates_box.clone(),
        };

        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            StatusViewMsg::SetConversation { title, cached } => {
                self.title = title;
                self.error = None;
                self.polling = false;
                self.set_updates(cached);
            }
            StatusViewMsg::SetTitle(title) => {
                self.title = title;
            }
            StatusViewMsg::SetUpdates(updates) => {
                self.error = None;
                self.set_updates(updates);
            }
            StatusViewMsg::SetPolling(polling) => {
                self.polling = polling;
            }
            StatusViewMsg::SetError(error) => {
                self.error = error;
            }
            StatusViewMsg::Clear => {
                self.title = "Trip Planning Status".to_string();
                self.error = None;
                self.polling = false;
                self.set_updates(Vec::new());
            }
            StatusViewMsg::ViewPlan => {
                let _ = sender.output(StatusViewOutput::ViewPlan);
            }
            StatusViewMsg::BackToChat => {
                let _ = sender.output(StatusViewOutput::BackToChat);
            }
        }
    }
}

impl StatusView {
    fn set_updates(&mut self, updates: Vec<StatusUpdate>) {
        self.complete = find_completion(&updates).is_some();

        while let Some(child) = self.updates_box.first_child() {
            self.updates_box.remove(&child);
        }
        for update in &updates {
            self.updates_box.append(&update_row(update));
        }
        self.updates = updates;
    }
}

fn update_row(update: &StatusUpdate) -> gtk::Box {
    let row = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(12)
        .build();
    row.add_css_class("status-update");

    let (icon_name, level_class) = match update.level() {
        StatusLevel::Success => ("emblem-ok-symbolic", "success"),
        StatusLevel::Info => ("dialog-information-symbolic", "info"),
    };
    row.add_css_class(level_class);

    let icon = gtk::Image::from_icon_name(icon_name);
    icon.set_valign(gtk::Align::Start);
    row.append(&icon);

    let text_box = gtk::Box::builder()
        .orientation(gtk::Orientation::Vertical)
        .spacing(2)
        .hexpand(true)
        .build();

    let agent_label = gtk::Label::builder()
        .label(update.agent_label())
        .halign(gtk::Align::Start)
        .build();
    agent_label.add_css_class("caption-heading");
    text_box.append(&agent_label);

    let text_label = gtk::Label::builder()
        .label(update.display_text())
        .halign(gtk::Align::Start)
        .xalign(0.0)
        .wrap(true)
        .selectable(true)
        .build();
    text_box.append(&text_label);
    row.append(&text_box);

    let time = update
        .parsed_timestamp()
        .map(|ts| ts.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let time_label = gtk::Label::builder()
        .label(time)
        .valign(gtk::Align::Start)
        .build();
    time_label.add_css_class("caption");
    time_label.add_css_class("dim-label");
    row.append(&time_label);

    row
}
