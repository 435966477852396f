use gtk::prelude::*;
use relm4::factory::FactoryVecDeque;
use relm4::prelude::*;

use crate::models::Message;
use crate::ui::input_area::{InputArea, InputAreaInit, InputAreaMsg, InputAreaOutput};
use crate::ui::message_widget::{MessageWidget, MessageWidgetInit, MessageWidgetOutput};
use crate::voice::AgentMode;

pub const EXAMPLE_PROMPTS: [&str; 4] = [
    "Plan a trip to Paris with friends on July 5th",
    "Weekend getaway to Tokyo for 4 people",
    "Book a hiking trip to Yosemite with Alex and Jamie",
    "Girls' trip to Barcelona in September",
];

pub struct ChatViewInit {
    pub send_with_enter: bool,
    pub show_examples: bool,
    pub voice_available: bool,
}

pub struct ChatView {
    messages: FactoryVecDeque<MessageWidget>,
    input_area: Controller<InputArea>,
    scrolled_window: gtk::ScrolledWindow,
    recording: bool,
    voice_mode: Option<AgentMode>,
    show_examples: bool,
    has_conversation: bool,
    user_scrolled_up: bool,
    last_message_date: Option<String>,
}

#[derive(Debug)]
pub enum ChatViewMsg {
    AddMessage(Message),
    LoadMessages(Vec<Message>),
    Clear,
    SetSending(bool),
    SetRecording(bool),
    SetVoiceMode(Option<AgentMode>),
    SetSendWithEnter(bool),
    SetShowExamples(bool),
    SetHasConversation(bool),
    ExampleClicked(usize),
    ScrollToBottom,
    CopyToClipboard(String),
    // Internal
    ScrollPositionChanged,
    UserSendMessage(String),
    ToggleRecording,
    ShowStatus,
}

#[derive(Debug)]
pub enum ChatViewOutput {
    SendMessage(String),
    ToggleRecording,
    ShowStatus,
}

#[relm4::component(pub)]
impl Component for ChatView {
    type Init = ChatViewInit;
    type Input = ChatViewMsg;
    type Output = ChatViewOutput;
    type CommandOutput = ();

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_vexpand: true,

            // Shortcut to the planner status once a trip is under way
            gtk::Box {
                set_orientation: gtk::Orientation::Horizontal,
                set_margin_top: 6,
                set_margin_end: 12,
                set_halign: gtk::Align::End,
                #[watch]
                set_visible: model.has_conversation,

                gtk::Button {
                    add_css_class: "pill",
                    set_tooltip_text: Some("Check trip planning status"),
                    connect_clicked => ChatViewMsg::ShowStatus,

                    adw::ButtonContent {
                        set_icon_name: "emblem-synchronizing-symbolic",
                        set_label: "Status",
                    },
                },
            },

            gtk::Overlay {
                set_vexpand: true,

                #[local_ref]
                scrolled_window -> gtk::ScrolledWindow {
                    set_vexpand: true,
                    set_hscrollbar_policy: gtk::PolicyType::Never,

                    gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,

                        #[name = "examples_box"]
                        gtk::Box {
                            set_orientation: gtk::Orientation::Vertical,
                            set_spacing: 12,
                            set_margin_top: 48,
                            set_halign: gtk::Align::Center,
                            #[watch]
                            set_visible: model.show_examples && model.messages.is_empty(),

                            gtk::Label {
                                set_label: "Try an example:",
                                add_css_class: "dim-label",
                            },

                            #[name = "examples_flow"]
                            gtk::FlowBox {
                                set_selection_mode: gtk::SelectionMode::None,
                                set_max_children_per_line: 2,
                                set_column_spacing: 8,
                                set_row_spacing: 8,
                            },
                        },

                        #[local_ref]
                        message_list -> gtk::Box {
                            set_orientation: gtk::Orientation::Vertical,
                            set_spacing: 0,
                            set_margin_top: 8,
                            set_margin_bottom: 8,
                            set_margin_start: 16,
                            set_margin_end: 16,
                        },
                    },
                },

                add_overlay = &gtk::Button {
                    set_icon_name: "go-down-symbolic",
                    set_tooltip_text: Some("Scroll to bottom"),
                    set_halign: gtk::Align::Center,
                    set_valign: gtk::Align::End,
                    set_margin_bottom: 8,
                    add_css_class: "circular",
                    add_css_class: "osd",
                    #[watch]
                    set_visible: model.user_scrolled_up,
                    connect_clicked => ChatViewMsg::ScrollToBottom,
                },
            },

            // Voice state
            gtk::Box {
                set_orientation: gtk::Orientation::Horizontal,
                set_halign: gtk::Align::Center,
                set_spacing: 8,
                set_margin_bottom: 4,
                #[watch]
                set_visible: model.recording,

                gtk::Spinner {
                    #[watch]
                    set_spinning: model.recording && model.voice_mode.is_none(),
                    #[watch]
                    set_visible: model.voice_mode.is_none(),
                },

                gtk::Label {
                    add_css_class: "voice-state",
                    add_css_class: "dim-label",
                    #[watch]
                    set_label: model.voice_mode.map(|m| m.label()).unwrap_or("Connecting..."),
                },
            },

            gtk::Separator {
                set_orientation: gtk::Orientation::Horizontal,
            },

            model.input_area.widget().clone(),
        }
    }

    fn init(
        init: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let messages = FactoryVecDeque::builder()
            .launch(gtk::Box::default())
            .forward(sender.input_sender(), |output| match output {
                MessageWidgetOutput::CopyContent(content) => ChatViewMsg::CopyToClipboard(content),
            });

        let input_area = InputArea::builder()
            .launch(InputAreaInit {
                send_with_enter: init.send_with_enter,
                voice_available: init.voice_available,
            })
            .forward(sender.input_sender(), |output| match output {
                InputAreaOutput::SendMessage(text) => ChatViewMsg::UserSendMessage(text),
                InputAreaOutput::ToggleRecording => ChatViewMsg::ToggleRecording,
            });

        let scrolled_window = gtk::ScrolledWindow::new();

        let model = Self {
            messages,
            input_area,
            scrolled_window: scrolled_window.clone(),
            recording: false,
            voice_mode: None,
            show_examples: init.show_examples,
            has_conversation: false,
            user_scrolled_up: false,
            last_message_date: None,
        };

        let message_list = model.messages.widget();
        let widgets = view_output!();

        for (index, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
            let button = gtk::Button::builder()
                .label(*prompt)
                .tooltip_text(format!("Use example: {}", prompt))
                .build();
            button.add_css_class("example-prompt");
            let sender_ex = sender.input_sender().clone();
            button.connect_clicked(move |_| {
                sender_ex.emit(ChatViewMsg::ExampleClicked(index));
            });
            widgets.examples_flow.insert(&button, -1);
        }

        let sender_scroll = sender.input_sender().clone();
        scrolled_window
            .vadjustment()
            .connect_value_changed(move |_| {
                sender_scroll.emit(ChatViewMsg::ScrollPositionChanged);
            });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            ChatViewMsg::AddMessage(message) => {
                let date_sep = self.compute_date_separator(&message);
                self.messages.guard().push_back(MessageWidgetInit {
                    message,
                    show_date_separator: date_sep,
                });
                self.auto_scroll_to_bottom(&sender);
            }
            ChatViewMsg::LoadMessages(messages) => {
                self.last_message_date = None;
                let rows: Vec<MessageWidgetInit> = messages
                    .into_iter()
                    .map(|message| MessageWidgetInit {
                        show_date_separator: self.compute_date_separator(&message),
                        message,
                    })
                    .collect();
                let mut guard = self.messages.guard();
                guard.clear();
                for row in rows {
                    guard.push_back(row);
                }
                drop(guard);
                sender.input(ChatViewMsg::ScrollToBottom);
            }
            ChatViewMsg::Clear => {
                self.messages.guard().clear();
                self.last_message_date = None;
                self.user_scrolled_up = false;
            }
            ChatViewMsg::SetSending(sending) => {
                self.input_area.emit(InputAreaMsg::SetSending(sending));
            }
            ChatViewMsg::SetRecording(recording) => {
                self.recording = recording;
                if !recording {
                    self.voice_mode = None;
                }
                self.input_area.emit(InputAreaMsg::SetRecording(recording));
            }
            ChatViewMsg::SetVoiceMode(mode) => {
                self.voice_mode = mode;
            }
            ChatViewMsg::SetSendWithEnter(enabled) => {
                self.input_area.emit(InputAreaMsg::SetSendWithEnter(enabled));
            }
            ChatViewMsg::SetShowExamples(show) => {
                self.show_examples = show;
            }
            ChatViewMsg::SetHasConversation(has) => {
                self.has_conversation = has;
            }
            ChatViewMsg::ExampleClicked(index) => {
                if let Some(prompt) = EXAMPLE_PROMPTS.get(index) {
                    self.input_area.emit(InputAreaMsg::SetText(prompt.to_string()));
                }
            }
            ChatViewMsg::ScrollToBottom => {
                self.user_scrolled_up = false;
                let adj = self.scrolled_window.vadjustment();
                glib::idle_add_local_once(move || {
                    adj.set_value(adj.upper());
                });
            }
            ChatViewMsg::ScrollPositionChanged => {
                let adj = self.scrolled_window.vadjustment();
                let at_bottom = adj.value() >= adj.upper() - adj.page_size() - 50.0;
                self.user_scrolled_up = !at_bottom;
            }
            ChatViewMsg::CopyToClipboard(content) => {
                if let Some(display) = gtk::gdk::Display::default() {
                    display.clipboard().set_text(&content);
                }
            }
            ChatViewMsg::UserSendMessage(text) => {
                let _ = sender.output(ChatViewOutput::SendMessage(text));
            }
            ChatViewMsg::ToggleRecording => {
                let _ = sender.output(ChatViewOutput::ToggleRecording);
            }
            ChatViewMsg::ShowStatus => {
                let _ = sender.output(ChatViewOutput::ShowStatus);
            }
        }
    }
}

impl ChatView {
    fn auto_scroll_to_bottom(&mut self, sender: &ComponentSender<Self>) {
        let adj = self.scrolled_window.vadjustment();
        let at_bottom = adj.value() >= adj.upper() - adj.page_size() - 50.0;
        self.user_scrolled_up = !at_bottom;

        if !self.user_scrolled_up {
            sender.input(ChatViewMsg::ScrollToBottom);
        }
    }

    fn compute_date_separator(&mut self, message: &Message) -> Option<String> {
        let local = message.created_at.with_timezone(&chrono::Local);
        let msg_date = local.date_naive().to_string();
        let needs_sep = self.last_message_date.as_deref() != Some(&msg_date);
        self.last_message_date = Some(msg_date);
        needs_sep.then(|| local.format("%B %e, %Y").to_string())
    }
}
