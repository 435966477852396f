use adw::prelude::*;
use chrono::{DateTime, Datelike, Local, Utc};
use relm4::factory::FactoryVecDeque;
use relm4::prelude::*;

use crate::models::{Conversation, ConversationStatus};

// --- SidebarItem: date headers vs conversation rows ---

#[derive(Debug, Clone)]
pub enum SidebarItem {
    Header(String), // "Today", "Yesterday", ...
    Conversation(Conversation),
}

#[derive(Debug)]
pub struct ConversationRow {
    pub item: SidebarItem,
}

#[relm4::factory(pub)]
impl FactoryComponent for ConversationRow {
    type Init = SidebarItem;
    type Input = ();
    type Output = ();
    type CommandOutput = ();
    type ParentWidget = gtk::ListBox;

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_spacing: 2,
            set_margin_all: 6,
        }
    }

    fn init_model(item: Self::Init, _index: &DynamicIndex, _sender: FactorySender<Self>) -> Self {
        Self { item }
    }

    fn init_widgets(
        &mut self,
        _index: &DynamicIndex,
        root: Self::Root,
        returned_widget: &<Self::ParentWidget as relm4::factory::FactoryView>::ReturnedWidget,
        _sender: FactorySender<Self>,
    ) -> Self::Widgets {
        match &self.item {
            SidebarItem::Header(label) => {
                let header_label = gtk::Label::builder()
                    .label(label)
                    .halign(gtk::Align::Start)
                    .margin_top(8)
                    .margin_bottom(2)
                    .margin_start(4)
                    .build();
                header_label.add_css_class("dim-label");
                header_label.add_css_class("caption");
                header_label.add_css_class("sidebar-date-header");
                root.append(&header_label);

                returned_widget.set_activatable(false);
                returned_widget.set_selectable(false);
            }
            SidebarItem::Conversation(conv) => {
                let title_box = gtk::Box::builder()
                    .orientation(gtk::Orientation::Horizontal)
                    .spacing(4)
                    .build();

                if conv.status == ConversationStatus::Completed {
                    let done_icon = gtk::Image::from_icon_name("emblem-ok-symbolic");
                    done_icon.add_css_class("success");
                    done_icon.set_pixel_size(12);
                    title_box.append(&done_icon);
                }

                let title_label = gtk::Label::builder()
                    .label(&conv.title)
                    .halign(gtk::Align::Start)
                    .ellipsize(gtk::pango::EllipsizeMode::End)
                    .max_width_chars(30)
                    .build();
                title_label.add_css_class("heading");
                title_box.append(&title_label);
                root.append(&title_box);

                let started = conv
                    .created_at
                    .with_timezone(&Local)
                    .format("%b %-d, %H:%M")
                    .to_string();
                let meta_label = gtk::Label::builder()
                    .label(format!("Started {}", started))
                    .halign(gtk::Align::Start)
                    .ellipsize(gtk::pango::EllipsizeMode::End)
                    .build();
                meta_label.add_css_class("dim-label");
                meta_label.add_css_class("caption");
                root.append(&meta_label);
            }
        }

        let widgets = view_output!();
        widgets
    }
}

// --- Sidebar component ---

pub struct Sidebar {
    pub conversations: FactoryVecDeque<ConversationRow>,
    search_term: String,
}

#[derive(Debug)]
pub enum SidebarMsg {
    LoadConversations(Vec<Conversation>),
    NewChat,
    ConversationSelected(usize),
    AddConversation(Conversation),
    RemoveConversation(String),
    UpdateConversationTitle(String, String),
    UpdateConversationStatus(String, ConversationStatus),
    SelectConversation(String),
    // Context menu
    ShowContextMenu(f64, f64, usize), // x, y, index
    RenameConversation(usize),
    ToggleCompleted(usize),
    ArchiveConversation(usize),
    ExportConversation(usize),
    DoRename(String, String), // id, new_title
    SearchChanged(String),
}

#[derive(Debug)]
pub enum SidebarOutput {
    NewChat,
    ConversationSelected(String),
    RenameConversation(String, String),
    SetStatus(String, ConversationStatus),
    ArchiveConversation(String),
    ExportConversation(String),
}

#[relm4::component(pub)]
impl Component for Sidebar {
    type Init = ();
    type Input = SidebarMsg;
    type Output = SidebarOutput;
    type CommandOutput = ();

    view! {
        adw::ToolbarView {
            add_top_bar = &adw::HeaderBar {
                set_show_end_title_buttons: false,

                pack_start = &gtk::Button {
                    set_icon_name: "list-add-symbolic",
                    set_tooltip_text: Some("New Trip"),
                    connect_clicked => SidebarMsg::NewChat,
                },

                #[wrap(Some)]
                set_title_widget = &adw::WindowTitle {
                    set_title: "Trips",
                },
            },

            #[wrap(Some)]
            set_content = &gtk::Box {
                set_orientation: gtk::Orientation::Vertical,

                gtk::SearchEntry {
                    set_placeholder_text: Some("Search trips..."),
                    set_margin_start: 8,
                    set_margin_end: 8,
                    set_margin_top: 4,
                    set_margin_bottom: 4,
                    connect_search_changed[sender] => move |entry| {
                        sender.input(SidebarMsg::SearchChanged(entry.text().to_string()));
                    },
                },

                gtk::ScrolledWindow {
                    set_hscrollbar_policy: gtk::PolicyType::Never,
                    set_vexpand: true,

                    #[local_ref]
                    conversation_list -> gtk::ListBox {
                        set_selection_mode: gtk::SelectionMode::Single,
                        add_css_class: "navigation-sidebar",
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
        let conversations = FactoryVecDeque::builder()
            .launch(gtk::ListBox::default())
            .detach();

        let model = Self {
            conversations,
            search_term: String::new(),
        };

        let conversation_list = model.conversations.widget();
        let widgets = view_output!();

        let sender_activate = sender.clone();
        model
            .conversations
            .widget()
            .connect_row_activated(move |_, row| {
                sender_activate.input(SidebarMsg::ConversationSelected(row.index() as usize));
            });

        let gesture = gtk::GestureClick::new();
        gesture.set_button(3); // right-click
        let list = model.conversations.widget().clone();
        let sender_rc = sender.clone();
        gesture.connect_released(move |_, _, x, y| {
            if let Some(row) = list.row_at_y(y as i32) {
                sender_rc.input(SidebarMsg::ShowContextMenu(x, y, row.index() as usize));
            }
        });
        model.conversations.widget().add_controller(gesture);

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, root: &Self::Root) {
        match msg {
            SidebarMsg::LoadConversations(conversations) => {
                let mut guard = self.conversations.guard();
                guard.clear();

                let mut current_group: Option<&'static str> = None;
                for conv in conversations {
                    let group = date_group(&conv.created_at, Utc::now());
                    if current_group != Some(group) {
                        current_group = Some(group);
                        guard.push_back(SidebarItem::Header(group.to_string()));
                    }
                    guard.push_back(SidebarItem::Conversation(conv));
                }

                drop(guard);
                self.apply_search_filter();
            }
            SidebarMsg::NewChat => {
                let _ = sender.output(SidebarOutput::NewChat);
            }
            SidebarMsg::ConversationSelected(index) => {
                if let Some(id) = self.conversation_at(index).map(|c| c.id.clone()) {
                    let _ = sender.output(SidebarOutput::ConversationSelected(id));
                }
            }
            SidebarMsg::AddConversation(conversation) => {
                let mut guard = self.conversations.guard();
                let group = date_group(&conversation.created_at, Utc::now());
                let has_header = matches!(
                    guard.get(0).map(|r| &r.item),
                    Some(SidebarItem::Header(h)) if h == group
                );
                if has_header {
                    guard.insert(1, SidebarItem::Conversation(conversation));
                } else {
                    guard.push_front(SidebarItem::Conversation(conversation));
                    guard.push_front(SidebarItem::Header(group.to_string()));
                }
                drop(guard);
                self.apply_search_filter();
                self.select_index(1);
            }
            SidebarMsg::RemoveConversation(id) => {
                let mut guard = self.conversations.guard();
                if let Some(index) = position_of(guard.iter().map(|r| &r.item), &id) {
                    guard.remove(index);
                    // Drop a header left with nothing under it.
                    let orphan = index > 0
                        && matches!(guard.get(index - 1).map(|r| &r.item), Some(SidebarItem::Header(_)))
                        && !matches!(
                            guard.get(index).map(|r| &r.item),
                            Some(SidebarItem::Conversation(_))
                        );
                    if orphan {
                        guard.remove(index - 1);
                    }
                }
            }
            SidebarMsg::UpdateConversationTitle(id, title) => {
                self.edit_conversation(&id, |conv| conv.title = title);
            }
            SidebarMsg::UpdateConversationStatus(id, status) => {
                self.edit_conversation(&id, |conv| conv.status = status);
            }
            SidebarMsg::SelectConversation(id) => {
                let index = position_of(self.conversations.iter().map(|r| &r.item), &id);
                if let Some(index) = index {
                    self.select_index(index);
                }
            }
            SidebarMsg::ShowContextMenu(x, y, index) => {
                let Some(conv) = self.conversation_at(index).cloned() else {
                    return;
                };

                let list_widget = self.conversations.widget();

                let menu = gio::Menu::new();
                menu.append(Some("Rename"), Some("sidebar.rename"));
                if conv.status == ConversationStatus::Completed {
                    menu.append(Some("Mark as Active"), Some("sidebar.toggle-completed"));
                } else {
                    menu.append(Some("Mark as Completed"), Some("sidebar.toggle-completed"));
                }
                menu.append(Some("Export Transcript"), Some("sidebar.export"));
                menu.append(Some("Archive"), Some("sidebar.archive"));

                let action_group = gio::SimpleActionGroup::new();
                let actions: [(&str, SidebarMsg); 4] = [
                    ("rename", SidebarMsg::RenameConversation(index)),
                    ("toggle-completed", SidebarMsg::ToggleCompleted(index)),
                    ("export", SidebarMsg::ExportConversation(index)),
                    ("archive", SidebarMsg::ArchiveConversation(index)),
                ];
                for (name, msg) in actions {
                    let action = gio::SimpleAction::new(name, None);
                    let input = sender.input_sender().clone();
                    let msg = std::cell::Cell::new(Some(msg));
                    action.connect_activate(move |_, _| {
                        if let Some(msg) = msg.take() {
                            input.emit(msg);
                        }
                    });
                    action_group.add_action(&action);
                }
                list_widget.insert_action_group("sidebar", Some(&action_group));

                let popover = gtk::PopoverMenu::from_model(Some(&menu));
                popover.set_parent(list_widget);
                popover.set_pointing_to(Some(&gtk::gdk::Rectangle::new(x as i32, y as i32, 1, 1)));
                popover.set_has_arrow(true);

                // Unparent after the action had a chance to fire.
                let parent = list_widget.clone();
                popover.connect_closed(move |p| {
                    let popover = p.clone();
                    let parent = parent.clone();
                    glib::idle_add_local_once(move || {
                        popover.unparent();
                        parent.insert_action_group("sidebar", None::<&gio::SimpleActionGroup>);
                    });
                });

                popover.popup();
            }
            SidebarMsg::RenameConversation(index) => {
                let Some((id, current_title)) = self
                    .conversation_at(index)
                    .map(|c| (c.id.clone(), c.title.clone()))
                else {
                    return;
                };

                let dialog = adw::AlertDialog::builder()
                    .heading("Rename Trip")
                    .body("Enter a new name:")
                    .build();

                let entry = gtk::Entry::builder()
                    .text(&current_title)
                    .activates_default(true)
                    .build();

                dialog.set_extra_child(Some(&entry));
                dialog.add_response("cancel", "Cancel");
                dialog.add_response("rename", "Rename");
                dialog.set_response_appearance("rename", adw::ResponseAppearance::Suggested);
                dialog.set_default_response(Some("rename"));
                dialog.set_close_response("cancel");

                let input = sender.input_sender().clone();
                dialog.connect_response(None, move |_dialog, response| {
                    if response == "rename" {
                        let new_title = entry.text().trim().to_string();
                        if !new_title.is_empty() {
                            input.emit(SidebarMsg::DoRename(id.clone(), new_title));
                        }
                    }
                });

                if let Some(window) = root.root().and_then(|r| r.downcast::<gtk::Window>().ok()) {
                    dialog.present(Some(&window));
                }
            }
            SidebarMsg::DoRename(id, new_title) => {
                let title = new_title.clone();
                self.edit_conversation(&id, |conv| conv.title = title);
                let _ = sender.output(SidebarOutput::RenameConversation(id, new_title));
            }
            SidebarMsg::ToggleCompleted(index) => {
                let Some((id, status)) = self.conversation_at(index).map(|c| {
                    let next = if c.status == ConversationStatus::Completed {
                        ConversationStatus::Active
                    } else {
                        ConversationStatus::Completed
                    };
                    (c.id.clone(), next)
                }) else {
                    return;
                };
                self.edit_conversation(&id, |conv| conv.status = status);
                let _ = sender.output(SidebarOutput::SetStatus(id, status));
            }
            SidebarMsg::ArchiveConversation(index) => {
                if let Some(id) = self.conversation_at(index).map(|c| c.id.clone()) {
                    sender.input(SidebarMsg::RemoveConversation(id.clone()));
                    let _ = sender.output(SidebarOutput::ArchiveConversation(id));
                }
            }
            SidebarMsg::ExportConversation(index) => {
                if let Some(id) = self.conversation_at(index).map(|c| c.id.clone()) {
                    let _ = sender.output(SidebarOutput::ExportConversation(id));
                }
            }
            SidebarMsg::SearchChanged(term) => {
                self.search_term = term.to_lowercase();
                self.apply_search_filter();
            }
        }
    }
}

impl Sidebar {
    fn conversation_at(&self, index: usize) -> Option<&Conversation> {
        match self.conversations.get(index).map(|r| &r.item) {
            Some(SidebarItem::Conversation(conv)) => Some(conv),
            _ => None,
        }
    }

    /// Replace a row in place so the factory redraws it.
    fn edit_conversation(&mut self, id: &str, edit: impl FnOnce(&mut Conversation)) {
        let mut guard = self.conversations.guard();
        let Some(index) = position_of(guard.iter().map(|r| &r.item), id) else {
            return;
        };
        if let Some(SidebarItem::Conversation(conv)) = guard.get(index).map(|r| r.item.clone()) {
            let mut conv = conv;
            edit(&mut conv);
            guard.remove(index);
            guard.insert(index, SidebarItem::Conversation(conv));
        }
    }

    fn select_index(&self, index: usize) {
        let list = self.conversations.widget();
        if let Some(row) = list.row_at_index(index as i32) {
            list.select_row(Some(&row));
        }
    }

    fn apply_search_filter(&mut self) {
        let is_searching = !self.search_term.is_empty();
        let list_widget = self.conversations.widget();

        for (i, row_data) in self.conversations.iter().enumerate() {
            let visible = match &row_data.item {
                SidebarItem::Header(_) => !is_searching,
                SidebarItem::Conversation(conv) => {
                    !is_searching || conv.title.to_lowercase().contains(&self.search_term)
                }
            };
            if let Some(row) = list_widget.row_at_index(i as i32) {
                row.set_visible(visible);
            }
        }
    }
}

fn position_of<'a>(items: impl Iterator<Item = &'a SidebarItem>, id: &str) -> Option<usize> {
    let mut items = items;
    items.position(|item| matches!(item, SidebarItem::Conversation(c) if c.id == id))
}

/// Classify a timestamp into a date group label.
fn date_group(dt: &DateTime<Utc>, now: DateTime<Utc>) -> &'static str {
    let today = now.with_timezone(&Local).date_naive();
    let date = dt.with_timezone(&Local).date_naive();

    if date == today {
        "Today"
    } else if Some(date) == today.pred_opt() {
        "Yesterday"
    } else if date.iso_week() == today.iso_week() {
        "This Week"
    } else {
        "Older"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_date_groups() {
        let now = Utc::now();
        assert_eq!(date_group(&now, now), "Today");
        assert_eq!(date_group(&(now - Duration::days(1)), now), "Yesterday");
        assert_eq!(date_group(&(now - Duration::days(30)), now), "Older");
    }
}
