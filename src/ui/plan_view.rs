use adw::prelude::*;
use relm4::prelude::*;

use crate::models::{PlanDecision, TripPlan, TripTask};
use crate::services::markdown::to_pango_markup;
use crate::services::plan::{format_markdown, total_estimated_cost};

pub struct PlanView {
    plan: Option<TripPlan>,
    tasks_box: gtk::Box,
    markdown_label: gtk::Label,
}

#[derive(Debug)]
pub enum PlanViewMsg {
    SetPlan(Option<TripPlan>),
    // Internal
    Decide(PlanDecision),
    Import,
    Export,
    BackToStatus,
}

#[derive(Debug)]
pub enum PlanViewOutput {
    Decide(String, PlanDecision), // plan id, decision
    Import,
    Export,
    BackToStatus,
}

#[relm4::component(pub)]
impl Component for PlanView {
    type Init = ();
    type Input = PlanViewMsg;
    type Output = PlanViewOutput;
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

                        gtk::Button {
                            set_icon_name: "go-previous-symbolic",
                            set_tooltip_text: Some("Back to status"),
                            add_css_class: "flat",
                            connect_clicked => PlanViewMsg::BackToStatus,
                        },

                        gtk::Label {
                            #[watch]
                            set_label: &model
                                .plan
                                .as_ref()
                                .map(|p| format!("Trip to {}", p.destination))
                                .unwrap_or_else(|| "Trip Plan".to_string()),
                            set_halign: gtk::Align::Start,
                            set_hexpand: true,
                            set_ellipsize: gtk::pango::EllipsizeMode::End,
                            add_css_class: "title-2",
                        },

                        gtk::Button {
                            set_icon_name: "document-open-symbolic",
                            set_tooltip_text: Some("Import plan JSON"),
                            add_css_class: "flat",
                            connect_clicked => PlanViewMsg::Import,
                        },

                        gtk::Button {
                            set_icon_name: "document-save-symbolic",
                            set_tooltip_text: Some("Export as Markdown"),
                            add_css_class: "flat",
                            #[watch]
                            set_sensitive: model.plan.is_some(),
                            connect_clicked => PlanViewMsg::Export,
                        },
                    },

                    adw::StatusPage {
                        set_icon_name: Some("x-office-document-symbolic"),
                        set_title: "No trip plan yet",
                        set_description: Some("Import the planner's JSON output to review it here."),
                        #[watch]
                        set_visible: model.plan.is_none(),

                        gtk::Button {
                            set_label: "Import Plan",
                            set_halign: gtk::Align::Center,
                            add_css_class: "suggested-action",
                            add_css_class: "pill",
                            connect_clicked => PlanViewMsg::Import,
                        },
                    },

                    gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_spacing: 16,
                        #[watch]
                        set_visible: model.plan.is_some(),

                        adw::PreferencesGroup {
                            set_title: "Overview",

                            adw::ActionRow {
                                set_title: "Dates",
                                #[watch]
                                set_subtitle: &model.plan.as_ref().map(dates_text).unwrap_or_default(),
                            },

                            adw::ActionRow {
                                set_title: "Participants",
                                #[watch]
                                set_subtitle: &model
                                    .plan
                                    .as_ref()
                                    .map(|p| p.participants.join(", "))
                                    .unwrap_or_default(),
                            },

                            adw::ActionRow {
                                set_title: "Status",
                                #[watch]
                                set_subtitle: model.plan.as_ref().map(|p| p.status.label()).unwrap_or_default(),
                            },

                            adw::ActionRow {
                                set_title: "Total estimated cost",
                                #[watch]
                                set_subtitle: &model
                                    .plan
                                    .as_ref()
                                    .map(|p| format!("${:.2}", total_estimated_cost(p)))
                                    .unwrap_or_default(),
                            },
                        },

                        gtk::Label {
                            set_label: "Tasks",
                            set_halign: gtk::Align::Start,
                            add_css_class: "heading",
                        },

                        #[local_ref]
                        tasks_box -> gtk::Box {
                            set_orientation: gtk::Orientation::Vertical,
                            set_spacing: 8,
                        },

                        gtk::Expander {
                            set_label: Some("Full itinerary"),

                            #[local_ref]
                            markdown_label -> gtk::Label {
                                set_halign: gtk::Align::Start,
                                set_xalign: 0.0,
                                set_wrap: true,
                                set_selectable: true,
                                set_margin_top: 8,
                            },
                        },

                        gtk::Box {
                            set_orientation: gtk::Orientation::Horizontal,
                            set_spacing: 12,
                            set_halign: gtk::Align::End,
                            #[watch]
                            set_sensitive: model.plan.as_ref().is_some_and(|p| !p.status.is_decided()),

                            gtk::Button {
                                set_label: "Reject",
                                add_css_class: "destructive-action",
                                add_css_class: "pill",
                                connect_clicked => PlanViewMsg::Decide(PlanDecision::Reject),
                            },

                            gtk::Button {
                                set_label: "Approve",
                                add_css_class: "suggested-action",
                                add_css_class: "pill",
                                connect_clicked => PlanViewMsg::Decide(PlanDecision::Approve),
                            },
                        },
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
        let model = Self {
            plan: None,
            tasks_box: gtk::Box::new(gtk::Orientation::Vertical, 8),
            markdown_label: gtk::Label::new(None),
        };

        let tasks_box = &model.tasks_box;
        let markdown_label = &model.markdown_label;
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            PlanViewMsg::SetPlan(plan) => {
                while let Some(child) = self.tasks_box.first_child() {
                    self.tasks_box.remove(&child);
                }
                match &plan {
                    Some(plan) => {
                        for task in &plan.tasks {
                            self.tasks_box.append(&task_row(task));
                        }
                        self.markdown_label
                            .set_markup(&to_pango_markup(&format_markdown(plan)));
                    }
                    None => self.markdown_label.set_text(""),
                }
                self.plan = plan;
            }
            PlanViewMsg::Decide(decision) => {
                if let Some(plan) = &self.plan {
                    let _ = sender.output(PlanViewOutput::Decide(plan.id.clone(), decision));
                }
            }
            PlanViewMsg::Import => {
                let _ = sender.output(PlanViewOutput::Import);
            }
            PlanViewMsg::Export => {
                let _ = sender.output(PlanViewOutput::Export);
            }
            PlanViewMsg::BackToStatus => {
                let _ = sender.output(PlanViewOutput::BackToStatus);
            }
        }
    }
}

fn dates_text(plan: &TripPlan) -> String {
    let days = plan.dates.days();
    format!(
        "{} to {} ({} day{})",
        plan.dates.start.format("%b %-d, %Y"),
        plan.dates.end.format("%b %-d, %Y"),
        days,
        if days == 1 { "" } else { "s" }
    )
}

fn badge(text: &str, class: Option<&str>) -> gtk::Label {
    let label = gtk::Label::new(Some(text));
    label.add_css_class("badge");
    if let Some(class) = class {
        label.add_css_class(class);
    }
    label
}

fn task_row(task: &TripTask) -> gtk::Box {
    let row = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(12)
        .build();
    row.add_css_class("card");

    let icon = gtk::Image::from_icon_name(task.category.icon_name());
    icon.set_margin_start(12);
    icon.set_tooltip_text(Some(task.category.label()));
    row.append(&icon);

    let text_box = gtk::Box::builder()
        .orientation(gtk::Orientation::Vertical)
        .spacing(4)
        .hexpand(true)
        .margin_top(10)
        .margin_bottom(10)
        .build();

    let title = gtk::Label::builder()
        .label(&task.title)
        .halign(gtk::Align::Start)
        .wrap(true)
        .build();
    title.add_css_class("heading");
    text_box.append(&title);

    if !task.description.is_empty() {
        let description = gtk::Label::builder()
            .label(&task.description)
            .halign(gtk::Align::Start)
            .xalign(0.0)
            .wrap(true)
            .build();
        description.add_css_class("dim-label");
        text_box.append(&description);
    }

    let badges = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(6)
        .build();
    badges.append(&badge(task.priority.label(), Some(task.priority.css_class())));
    badges.append(&badge(task.status.label(), None));
    if let Some(assignee) = &task.assigned_to {
        badges.append(&badge(assignee, None));
    }
    if let Some(due) = task.due_date {
        badges.append(&badge(&format!("Due {}", due.format("%b %-d")), None));
    }
    text_box.append(&badges);
    row.append(&text_box);

    if let Some(cost) = task.estimated_cost {
        let cost_label = gtk::Label::builder()
            .label(format!("${:.2}", cost))
            .valign(gtk::Align::Center)
            .margin_end(12)
            .build();
        cost_label.add_css_class("numeric");
        row.append(&cost_label);
    }

    row
}
