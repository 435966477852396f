use std::cell::Cell;
use std::rc::Rc;

use gtk::prelude::*;
use relm4::prelude::*;

pub struct InputAreaInit {
    pub send_with_enter: bool,
    pub voice_available: bool,
}

pub struct InputArea {
    buffer: gtk::TextBuffer,
    sending: bool,
    recording: bool,
    voice_available: bool,
    send_with_enter: bool,
    // Read by the key controller, which outlives any single update.
    enter_flag: Rc<Cell<bool>>,
    char_count: i32,
}

#[derive(Debug)]
pub enum InputAreaMsg {
    SendClicked,
    SetSending(bool),
    SetRecording(bool),
    SetSendWithEnter(bool),
    /// Replace the draft, e.g. from an example prompt.
    SetText(String),
    RecordToggled,
    TextChanged,
}

#[derive(Debug)]
pub enum InputAreaOutput {
    SendMessage(String),
    ToggleRecording,
}

#[relm4::component(pub)]
impl Component for InputArea {
    type Init = InputAreaInit;
    type Input = InputAreaMsg;
    type Output = InputAreaOutput;
    type CommandOutput = ();

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_spacing: 0,

            gtk::Box {
                set_orientation: gtk::Orientation::Vertical,
                set_margin_top: 8,
                set_margin_bottom: 8,
                set_margin_start: 12,
                set_margin_end: 12,
                add_css_class: "input-card",

                gtk::Overlay {
                    set_hexpand: true,

                    gtk::ScrolledWindow {
                        set_hexpand: true,
                        set_max_content_height: 150,
                        set_propagate_natural_height: true,
                        set_min_content_height: 40,

                        #[name = "text_view"]
                        gtk::TextView {
                            set_wrap_mode: gtk::WrapMode::WordChar,
                            set_accepts_tab: false,
                            set_top_margin: 8,
                            set_bottom_margin: 8,
                            set_left_margin: 8,
                            set_right_margin: 8,
                            add_css_class: "input-text-view",

                            set_buffer: Some(&model.buffer),
                        },
                    },

                    add_overlay = &gtk::Label {
                        #[watch]
                        set_label: if model.send_with_enter {
                            "Where to next? Shift+Enter for a new line"
                        } else {
                            "Where to next? Ctrl+Enter to send"
                        },
                        set_halign: gtk::Align::Start,
                        set_valign: gtk::Align::Start,
                        set_margin_start: 12,
                        set_margin_top: 8,
                        set_can_target: false,
                        add_css_class: "dim-label",
                        #[watch]
                        set_visible: model.char_count == 0 && !model.sending,
                    },
                },

                gtk::Box {
                    set_orientation: gtk::Orientation::Horizontal,
                    set_spacing: 4,
                    set_margin_start: 4,
                    set_margin_end: 4,
                    set_margin_bottom: 4,

                    #[name = "record_button"]
                    gtk::ToggleButton {
                        set_icon_name: "audio-input-microphone-symbolic",
                        #[watch]
                        set_tooltip_text: Some(if model.recording { "Stop recording" } else { "Start recording" }),
                        add_css_class: "circular",
                        add_css_class: "record-button",
                        #[watch]
                        set_visible: model.voice_available,
                        #[watch]
                        #[block_signal(record_toggled)]
                        set_active: model.recording,
                        connect_toggled[sender] => move |_| {
                            sender.input(InputAreaMsg::RecordToggled);
                        } @record_toggled,
                    },

                    gtk::Box {
                        set_hexpand: true,
                    },

                    gtk::Button {
                        set_icon_name: "go-up-symbolic",
                        set_tooltip_text: Some("Send message"),
                        add_css_class: "suggested-action",
                        add_css_class: "circular",
                        #[watch]
                        set_sensitive: !model.sending && model.char_count > 0,
                        connect_clicked => InputAreaMsg::SendClicked,
                    },
                },
            },
        }
    }

    fn init(
        init: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let buffer = gtk::TextBuffer::new(None::<&gtk::TextTagTable>);
        let enter_flag = Rc::new(Cell::new(init.send_with_enter));

        let model = Self {
            buffer: buffer.clone(),
            sending: false,
            recording: false,
            voice_available: init.voice_available,
            send_with_enter: init.send_with_enter,
            enter_flag: enter_flag.clone(),
            char_count: 0,
        };

        let widgets = view_output!();

        let sender_key = sender.clone();
        let key_controller = gtk::EventControllerKey::new();
        key_controller.connect_key_pressed(move |_, key, _code, modifier| {
            if key != gtk::gdk::Key::Return && key != gtk::gdk::Key::KP_Enter {
                return gtk::glib::Propagation::Proceed;
            }
            if should_send(enter_flag.get(), modifier) {
                sender_key.input(InputAreaMsg::SendClicked);
                gtk::glib::Propagation::Stop
            } else {
                gtk::glib::Propagation::Proceed
            }
        });
        widgets.text_view.add_controller(key_controller);

        let sender_buf = sender.clone();
        buffer.connect_changed(move |_| {
            sender_buf.input(InputAreaMsg::TextChanged);
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            InputAreaMsg::SendClicked => {
                let text = self.get_text();
                let trimmed = text.trim();
                if !trimmed.is_empty() && !self.sending {
                    let _ = sender.output(InputAreaOutput::SendMessage(trimmed.to_string()));
                    self.buffer.set_text("");
                }
            }
            InputAreaMsg::SetSending(sending) => {
                self.sending = sending;
            }
            InputAreaMsg::SetRecording(recording) => {
                self.recording = recording;
            }
            InputAreaMsg::SetSendWithEnter(enabled) => {
                self.send_with_enter = enabled;
                self.enter_flag.set(enabled);
            }
            InputAreaMsg::SetText(text) => {
                self.buffer.set_text(&text);
            }
            InputAreaMsg::RecordToggled => {
                let _ = sender.output(InputAreaOutput::ToggleRecording);
            }
            InputAreaMsg::TextChanged => {
                self.char_count = self.buffer.char_count();
            }
        }
    }
}

impl InputArea {
    fn get_text(&self) -> String {
        let start = self.buffer.start_iter();
        let end = self.buffer.end_iter();
        self.buffer.text(&start, &end, false).to_string()
    }
}

/// Whether an Enter press submits the draft. Shift+Enter always inserts a
/// newline; Ctrl+Enter always sends.
fn should_send(send_with_enter: bool, modifier: gtk::gdk::ModifierType) -> bool {
    if modifier.contains(gtk::gdk::ModifierType::SHIFT_MASK) {
        return false;
    }
    send_with_enter || modifier.contains(gtk::gdk::ModifierType::CONTROL_MASK)
}

#[cfg(test)]
mod tests {
    use gtk::gdk::ModifierType;

    use super::*;

    #[test]
    fn test_enter_handling() {
        assert!(should_send(true, ModifierType::empty()));
        assert!(!should_send(true, ModifierType::SHIFT_MASK));
        assert!(!should_send(false, ModifierType::empty()));
        assert!(should_send(false, ModifierType::CONTROL_MASK));
    }
}
