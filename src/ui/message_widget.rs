use gtk::prelude::*;
use relm4::prelude::*;

use crate::models::{Message, Role};
use crate::services::markdown::to_pango_markup;

pub struct MessageWidgetInit {
    pub message: Message,
    pub show_date_separator: Option<String>, // e.g. "January 15, 2025"
}

/// A single transcript bubble. Agent replies are rendered from markdown.
pub struct MessageWidget {
    pub message: Message,
    show_date_separator: Option<String>,
}

#[derive(Debug)]
pub enum MessageWidgetOutput {
    CopyContent(String),
}

#[relm4::factory(pub)]
impl FactoryComponent for MessageWidget {
    type Init = MessageWidgetInit;
    type Input = ();
    type Output = MessageWidgetOutput;
    type CommandOutput = ();
    type ParentWidget = gtk::Box;

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_spacing: 0,
        }
    }

    fn init_model(init: Self::Init, _index: &DynamicIndex, _sender: FactorySender<Self>) -> Self {
        Self {
            message: init.message,
            show_date_separator: init.show_date_separator,
        }
    }

    fn init_widgets(
        &mut self,
        _index: &DynamicIndex,
        root: Self::Root,
        _returned_widget: &<Self::ParentWidget as relm4::factory::FactoryView>::ReturnedWidget,
        sender: FactorySender<Self>,
    ) -> Self::Widgets {
        let is_user = self.message.role == Role::User;

        if let Some(date_text) = &self.show_date_separator {
            let sep_label = gtk::Label::builder()
                .label(date_text)
                .halign(gtk::Align::Center)
                .margin_top(12)
                .margin_bottom(8)
                .build();
            sep_label.add_css_class("dim-label");
            sep_label.add_css_class("caption");
            sep_label.add_css_class("date-separator");
            root.append(&sep_label);
        }

        let bubble = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(4)
            .build();
        bubble.add_css_class("card");
        bubble.add_css_class(if is_user {
            "message-bubble-user"
        } else {
            "message-bubble-assistant"
        });

        let role_time_box = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .spacing(8)
            .margin_start(8)
            .margin_end(8)
            .margin_top(4)
            .build();

        let role_label = gtk::Label::builder()
            .label(if is_user { "You" } else { "Trip Planner" })
            .halign(gtk::Align::Start)
            .hexpand(true)
            .build();
        role_label.add_css_class("caption");
        role_label.add_css_class("dim-label");
        role_time_box.append(&role_label);

        let time_label = gtk::Label::builder()
            .label(
                self.message
                    .created_at
                    .with_timezone(&chrono::Local)
                    .format("%H:%M")
                    .to_string(),
            )
            .halign(gtk::Align::End)
            .build();
        time_label.add_css_class("caption");
        time_label.add_css_class("dim-label");
        role_time_box.append(&time_label);

        let copy_btn = gtk::Button::builder()
            .icon_name("edit-copy-symbolic")
            .tooltip_text("Copy message")
            .visible(false)
            .build();
        copy_btn.add_css_class("flat");
        copy_btn.add_css_class("circular");
        let content = self.message.content.clone();
        let sender_copy = sender.output_sender().clone();
        copy_btn.connect_clicked(move |_| {
            sender_copy.emit(MessageWidgetOutput::CopyContent(content.clone()));
        });
        role_time_box.append(&copy_btn);

        bubble.append(&role_time_box);

        let body = gtk::Label::builder()
            .halign(gtk::Align::Start)
            .xalign(0.0)
            .wrap(true)
            .wrap_mode(gtk::pango::WrapMode::WordChar)
            .selectable(true)
            .margin_start(8)
            .margin_end(8)
            .margin_bottom(8)
            .build();
        if is_user {
            body.set_label(&self.message.content);
        } else {
            body.set_markup(&to_pango_markup(&self.message.content));
        }
        bubble.append(&body);

        // Show the copy button on hover
        let motion = gtk::EventControllerMotion::new();
        let copy_enter = copy_btn.clone();
        motion.connect_enter(move |_, _, _| copy_enter.set_visible(true));
        let copy_leave = copy_btn;
        motion.connect_leave(move |_| copy_leave.set_visible(false));
        bubble.add_controller(motion);

        let message_row = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .margin_top(4)
            .margin_bottom(4)
            .margin_start(if is_user { 48 } else { 12 })
            .margin_end(if is_user { 12 } else { 48 })
            .halign(if is_user {
                gtk::Align::End
            } else {
                gtk::Align::Start
            })
            .build();
        message_row.append(&bubble);
        root.append(&message_row);

        let widgets = view_output!();
        widgets
    }
}
