use adw::prelude::*;
use relm4::prelude::*;

use crate::services::settings::{AppSettings, SettingChange};

pub struct BehaviorPage {
    poll_spin: gtk::SpinButton,
}

#[derive(Debug)]
pub enum BehaviorPageMsg {
    SetSendWithEnter(bool),
    SetAutoTitles(bool),
    SetShowExamples(bool),
    PollIntervalChanged,
}

#[derive(Debug)]
pub enum BehaviorPageOutput {
    Changed(SettingChange),
}

#[relm4::component(pub)]
impl Component for BehaviorPage {
    type Init = AppSettings;
    type Input = BehaviorPageMsg;
    type Output = BehaviorPageOutput;
    type CommandOutput = ();

    view! {
        adw::PreferencesPage {
            set_title: "Behavior",
            set_icon_name: Some("preferences-system-symbolic"),

            adw::PreferencesGroup {
                set_title: "Chat",

                adw::SwitchRow {
                    set_title: "Send with Enter",
                    set_subtitle: "When off, use Ctrl+Enter to send",
                    set_active: settings.send_with_enter,
                    connect_active_notify[sender] => move |row| {
                        sender.input(BehaviorPageMsg::SetSendWithEnter(row.is_active()));
                    },
                },

                adw::SwitchRow {
                    set_title: "Show example prompts",
                    set_subtitle: "Suggest trips on an empty conversation",
                    set_active: settings.show_examples,
                    connect_active_notify[sender] => move |row| {
                        sender.input(BehaviorPageMsg::SetShowExamples(row.is_active()));
                    },
                },

                adw::SwitchRow {
                    set_title: "Automatic titles",
                    set_subtitle: "Name new trips after your first message",
                    set_active: settings.auto_titles,
                    connect_active_notify[sender] => move |row| {
                        sender.input(BehaviorPageMsg::SetAutoTitles(row.is_active()));
                    },
                },
            },

            adw::PreferencesGroup {
                set_title: "Planning Status",

                #[local_ref]
                poll_row -> adw::ActionRow {
                    set_title: "Refresh interval",
                    set_subtitle: "Seconds between status checks while a plan is generated",
                },
            },
        }
    }

    fn init(
        settings: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let poll_spin = gtk::SpinButton::with_range(1.0, 30.0, 1.0);
        poll_spin.set_value(settings.poll_interval().as_secs_f64());
        poll_spin.set_valign(gtk::Align::Center);

        let sender_poll = sender.input_sender().clone();
        poll_spin.connect_value_changed(move |_| {
            sender_poll.emit(BehaviorPageMsg::PollIntervalChanged);
        });

        let poll_row = adw::ActionRow::new();

        let model = Self {
            poll_spin: poll_spin.clone(),
        };

        let widgets = view_output!();

        widgets.poll_row.add_suffix(&poll_spin);

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        let change = match msg {
            BehaviorPageMsg::SetSendWithEnter(active) => SettingChange::SendWithEnter(active),
            BehaviorPageMsg::SetAutoTitles(active) => SettingChange::AutoTitles(active),
            BehaviorPageMsg::SetShowExamples(active) => SettingChange::ShowExamples(active),
            BehaviorPageMsg::PollIntervalChanged => {
                SettingChange::PollIntervalMs((self.poll_spin.value() * 1000.0).round() as u64)
            }
        };
        let _ = sender.output(BehaviorPageOutput::Changed(change));
    }
}
