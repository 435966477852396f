use gtk::prelude::*;
use relm4::prelude::*;

use crate::services::activity::{
    filter_and_sort, ActivityFilter, ActivitySort, ConversationActivity,
};

/// Overview of every trip conversation and how far along its planning is.
pub struct ActivityView {
    items: Vec<ConversationActivity>,
    filter: ActivityFilter,
    sort: ActivitySort,
    visible_count: usize,
    rows_box: gtk::Box,
}

#[derive(Debug)]
pub enum ActivityViewMsg {
    SetItems(Vec<ConversationActivity>),
    FilterChanged(u32),
    SortChanged(u32),
    // Internal
    Refresh,
    View(String),
}

#[derive(Debug)]
pub enum ActivityViewOutput {
    Refresh,
    ViewConversation(String),
}

#[relm4::component(pub)]
impl Component for ActivityView {
    type Init = ();
    type Input = ActivityViewMsg;
    type Output = ActivityViewOutput;
    type CommandOutput = ();

    view! {
        gtk::ScrolledWindow {
            set_vexpand: true,
            set_hscrollbar_policy: gtk::PolicyType::Never,

            adw::Clamp {
                set_maximum_size: 820,

                gtk::Box {
                    set_orientation: gtk::Orientation::Vertical,
                    set_spacing: 16,
                    set_margin_all: 24,

                    gtk::Box {
                        set_orientation: gtk::Orientation::Horizontal,
                        set_spacing: 8,

                        gtk::Label {
                            set_label: "All Trip Activity",
                            set_halign: gtk::Align::Start,
                            set_hexpand: true,
                            add_css_class: "title-2",
                        },

                        #[name = "filter_dropdown"]
                        gtk::DropDown {
                            set_tooltip_text: Some("Filter by state"),
                        },

                        #[name = "sort_dropdown"]
                        gtk::DropDown {
                            set_tooltip_text: Some("Sort order"),
                        },

                        gtk::Button {
                            set_icon_name: "view-refresh-symbolic",
                            set_tooltip_text: Some("Refresh"),
                            add_css_class: "flat",
                            connect_clicked => ActivityViewMsg::Refresh,
                        },
                    },

                    gtk::Label {
                        set_halign: gtk::Align::Start,
                        add_css_class: "dim-label",
                        #[watch]
                        set_label: &format!(
                            "Showing {} of {} conversations",
                            model.visible_count,
                            model.items.len()
                        ),
                    },

                    adw::StatusPage {
                        set_icon_name: Some("folder-symbolic"),
                        set_title: "No conversations",
                        set_description: Some("Nothing matches the current filter."),
                        #[watch]
                        set_visible: model.visible_count == 0,
                    },

                    #[local_ref]
                    rows_box -> gtk::Box {
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
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let rows_box = gtk::Box::new(gtk::Orientation::Vertical, 8);

        let model = Self {
            items: Vec::new(),
            filter: ActivityFilter::default(),
            sort: ActivitySort::default(),
            visible_count: 0,
            rows_box: rows_box.clone(),
        };

        let widgets = view_output!();

        let filter_model = gtk::StringList::new(&ActivityFilter::LABELS);
        widgets.filter_dropdown.set_model(Some(&filter_model));
        let sender_filter = sender.input_sender().clone();
        widgets.filter_dropdown.connect_selected_notify(move |dd| {
            sender_filter.emit(ActivityViewMsg::FilterChanged(dd.selected()));
        });

        let sort_model = gtk::StringList::new(&ActivitySort::LABELS);
        widgets.sort_dropdown.set_model(Some(&sort_model));
        let sender_sort = sender.input_sender().clone();
        widgets.sort_dropdown.connect_selected_notify(move |dd| {
            sender_sort.emit(ActivityViewMsg::SortChanged(dd.selected()));
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            ActivityViewMsg::SetItems(items) => {
                self.items = items;
                self.rebuild(&sender);
            }
            ActivityViewMsg::FilterChanged(index) => {
                self.filter = ActivityFilter::from_index(index);
                self.rebuild(&sender);
            }
            ActivityViewMsg::SortChanged(index) => {
                self.sort = ActivitySort::from_index(index);
                self.rebuild(&sender);
            }
            ActivityViewMsg::Refresh => {
                let _ = sender.output(ActivityViewOutput::Refresh);
            }
            ActivityViewMsg::View(id) => {
                let _ = sender.output(ActivityViewOutput::ViewConversation(id));
            }
        }
    }
}

impl ActivityView {
    fn rebuild(&mut self, sender: &ComponentSender<Self>) {
        while let Some(child) = self.rows_box.first_child() {
            self.rows_box.remove(&child);
        }

        let shown = filter_and_sort(self.items.clone(), self.filter, self.sort);
        self.visible_count = shown.len();
        for item in &shown {
            self.rows_box.append(&activity_row(item, sender));
        }
    }
}

fn activity_row(item: &ConversationActivity, sender: &ComponentSender<ActivityView>) -> gtk::Box {
    let row = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(12)
        .build();
    row.add_css_class("card");

    let icon = gtk::Image::from_icon_name(item.state.icon_name());
    icon.set_margin_start(12);
    row.append(&icon);

    let text_box = gtk::Box::builder()
        .orientation(gtk::Orientation::Vertical)
        .spacing(4)
        .hexpand(true)
        .margin_top(10)
        .margin_bottom(10)
        .build();

    let title_box = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(8)
        .build();
    let title = gtk::Label::builder()
        .label(&item.conversation.title)
        .halign(gtk::Align::Start)
        .ellipsize(gtk::pango::EllipsizeMode::End)
        .build();
    title.add_css_class("heading");
    title_box.append(&title);

    let badge = gtk::Label::new(Some(item.state.label()));
    badge.add_css_class("badge");
    badge.add_css_class(item.state.css_class());
    title_box.append(&badge);
    text_box.append(&title_box);

    let meta = gtk::Label::builder()
        .label(format!(
            "{} update{} · last activity {}",
            item.update_count,
            if item.update_count == 1 { "" } else { "s" },
            item.last_activity
                .with_timezone(&chrono::Local)
                .format("%b %-d, %H:%M")
        ))
        .halign(gtk::Align::Start)
        .build();
    meta.add_css_class("caption");
    meta.add_css_class("dim-label");
    text_box.append(&meta);

    if let Some(latest) = &item.latest_update {
        let latest_label = gtk::Label::builder()
            .label(latest)
            .halign(gtk::Align::Start)
            .ellipsize(gtk::pango::EllipsizeMode::End)
            .build();
        text_box.append(&latest_label);
    }
    row.append(&text_box);

    let view_btn = gtk::Button::builder()
        .label("View")
        .valign(gtk::Align::Center)
        .margin_end(12)
        .build();
    view_btn.add_css_class("pill");
    let id = item.conversation.id.clone();
    let sender_view = sender.input_sender().clone();
    view_btn.connect_clicked(move |_| {
        sender_view.emit(ActivityViewMsg::View(id.clone()));
    });
    row.append(&view_btn);

    row
}
