use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use adw::prelude::*;
use relm4::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, BackendClient, StatusClient, StatusSource, TitleClient};
use crate::config::{self, Endpoints};
use crate::models::{
    Conversation, ConversationStatus, Message, PlanDecision, Role, StatusUpdate, TripPlan, User,
};
use crate::services::activity::{load_overview, ConversationActivity};
use crate::services::conversation::truncate_title;
use crate::services::export::{
    export_plan_to_markdown, export_to_markdown, suggested_file_name, write_markdown,
};
use crate::services::settings::{AppSettings, SettingChange};
use crate::services::status::{run_polling, CachedStatusSource, PollEvent};
use crate::services::{
    AuthService, ConversationService, Database, KeyringService, SettingsService, TripPlanService,
};
use crate::ui::activity_view::{ActivityView, ActivityViewMsg, ActivityViewOutput};
use crate::ui::chat_view::{ChatView, ChatViewInit, ChatViewMsg, ChatViewOutput};
use crate::ui::dialogs::login::{LoginDialog, LoginMode};
use crate::ui::onboarding::{WelcomeMsg, WelcomeOutput, WelcomePage};
use crate::ui::plan_view::{PlanView, PlanViewMsg, PlanViewOutput};
use crate::ui::preferences::appearance_page::{apply_color_scheme, AppearancePage};
use crate::ui::preferences::behavior_page::BehaviorPage;
use crate::ui::profile_view::{ProfileView, ProfileViewMsg, ProfileViewOutput};
use crate::ui::sidebar::{Sidebar, SidebarMsg, SidebarOutput};
use crate::ui::status_view::{StatusView, StatusViewMsg, StatusViewOutput};
#[cfg(feature = "microphone")]
use crate::voice::microphone::Microphone;
use crate::voice::elevenlabs::ElevenLabsProvider;
use crate::voice::{VoiceEvent, VoiceProvider, VoiceSession};

/// Everything that needs the database or the network. Built once the
/// asynchronous startup finishes.
#[derive(Clone)]
pub struct Services {
    db: Database,
    auth: AuthService,
    conversations: ConversationService,
    plans: TripPlanService,
    status: Arc<dyn StatusSource>,
    voice: Option<Arc<dyn VoiceProvider>>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("voice", &self.voice.as_ref().map(|v| v.name()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    SignIn,
    Chat,
    Status,
    Activity,
    Plan,
    Profile,
}

impl Page {
    fn name(self) -> &'static str {
        match self {
            Page::SignIn => "signin",
            Page::Chat => "chat",
            Page::Status => "status",
            Page::Activity => "activity",
            Page::Plan => "plan",
            Page::Profile => "profile",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Page::SignIn => config::APP_NAME,
            Page::Chat => "Chat",
            Page::Status => "Planning Status",
            Page::Activity => "Trip Activity",
            Page::Plan => "Trip Plan",
            Page::Profile => "Profile",
        }
    }

    /// Pages that belong to the current conversation show its title.
    fn shows_conversation(self) -> bool {
        matches!(self, Page::Chat | Page::Status | Page::Plan)
    }
}

/// What to do once a conversation or voice session exists.
#[derive(Debug, Clone)]
pub enum PendingAction {
    Send(String),
    Record,
}

pub struct App {
    services: Option<Services>,
    voice_available: bool,
    sidebar: Controller<Sidebar>,
    chat_view: Controller<ChatView>,
    status_view: Controller<StatusView>,
    activity_view: Controller<ActivityView>,
    plan_view: Controller<PlanView>,
    profile_view: Controller<ProfileView>,
    welcome: Controller<WelcomePage>,
    toast_overlay: adw::ToastOverlay,
    content_stack: gtk::Stack,
    window_title: adw::WindowTitle,
    header_actions: gtk::Box,
    split_view: adw::NavigationSplitView,
    page: Page,
    user: Option<User>,
    conversations: Vec<Conversation>,
    current: Option<Conversation>,
    current_plan: Option<TripPlan>,
    creating_conversation: bool,
    // Status polling
    poll_cancel: Option<CancellationToken>,
    plan_ready: bool,
    // Voice
    voice: Option<VoiceSession>,
    voice_generation: u64,
    voice_starting: bool,
    recording: bool,
    #[cfg(feature = "microphone")]
    microphone: Option<Microphone>,
    // Dialogs
    preferences_window: Option<adw::PreferencesWindow>,
    behavior_page: Option<Controller<BehaviorPage>>,
    appearance_page: Option<Controller<AppearancePage>>,
    login_dialog: Option<AsyncController<LoginDialog>>,
    settings: AppSettings,
}

#[derive(Debug)]
pub enum AppMsg {
    NewChat,
    ConversationSelected(String),
    ViewConversationStatus(String),
    ShowChat,
    ShowStatus,
    ShowActivity,
    ShowPlan,
    ShowProfile,
    ShowLogin(LoginMode),
    LoggedIn(User),
    LoginCancelled,
    SignOut,
    SendMessage(String),
    ToggleRecording,
    RenameConversation(String, String), // id, new_title
    SetConversationStatus(String, ConversationStatus),
    ArchiveConversation(String),
    ExportConversation(String),
    RefreshActivity,
    DecidePlan(String, PlanDecision), // plan id, decision
    ImportPlan,
    ImportPlanFrom(PathBuf),
    ExportPlan,
    WriteExport(PathBuf, String),
    ShowPreferences,
    ShowShortcuts,
    ShowAbout,
    SettingChanged(SettingChange),
    ShowToast(String),
}

#[derive(Debug)]
pub enum AppCmd {
    Initialized(Box<Services>, AppSettings),
    InitFailed(String),
    SessionRestored(Result<Option<User>, String>),
    ConversationsLoaded(Vec<Conversation>),
    ConversationCreated(Conversation, Option<PendingAction>),
    ConversationOpened {
        id: String,
        messages: Vec<Message>,
        updates: Vec<StatusUpdate>,
        plan: Option<TripPlan>,
    },
    MessageSaved {
        message: Message,
        first_from_user: bool,
    },
    Retitled(String, String),
    Renamed(String, String),
    StatusSaved(String, ConversationStatus),
    Archived(String),
    ExportReady {
        dialog_title: &'static str,
        name: String,
        contents: String,
    },
    Exported,
    Poll(String, PollEvent),
    PlanLoaded(String, Option<TripPlan>),
    PlanDecided(TripPlan),
    PlanImported(TripPlan),
    ActivityLoaded(Vec<Conversation>, Vec<ConversationActivity>),
    VoiceStarted(u64, VoiceSession, Option<PendingAction>),
    Voice(u64, VoiceEvent),
    VoiceFailed(u64, String),
    TextDelivered,
    AudioStopped(String),
    Failed {
        context: &'static str,
        message: String,
        expired: bool,
    },
}

fn failure(context: &'static str, err: &anyhow::Error) -> AppCmd {
    let expired = err
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::needs_login);
    AppCmd::Failed {
        context,
        message: err.to_string(),
        expired,
    }
}

#[relm4::component(pub, async)]
impl AsyncComponent for App {
    type Init = ();
    type Input = AppMsg;
    type Output = ();
    type CommandOutput = AppCmd;

    view! {
        adw::ApplicationWindow {
            set_title: Some(config::APP_NAME),
            set_default_width: 1100,
            set_default_height: 760,
            set_width_request: 360,
            set_height_request: 480,

            #[local_ref]
            toast_overlay -> adw::ToastOverlay {},
        }
    }

    async fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: AsyncComponentSender<Self>,
    ) -> AsyncComponentParts<Self> {
        let settings = AppSettings::default();
        let voice_available = Endpoints::from_env().is_ok_and(|e| e.voice_enabled());

        let sidebar = Sidebar::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                SidebarOutput::NewChat => AppMsg::NewChat,
                SidebarOutput::ConversationSelected(id) => AppMsg::ConversationSelected(id),
                SidebarOutput::RenameConversation(id, title) => {
                    AppMsg::RenameConversation(id, title)
                }
                SidebarOutput::SetStatus(id, status) => AppMsg::SetConversationStatus(id, status),
                SidebarOutput::ArchiveConversation(id) => AppMsg::ArchiveConversation(id),
                SidebarOutput::ExportConversation(id) => AppMsg::ExportConversation(id),
            });

        let chat_view = ChatView::builder()
            .launch(ChatViewInit {
                send_with_enter: settings.send_with_enter,
                show_examples: settings.show_examples,
                voice_available,
            })
            .forward(sender.input_sender(), |output| match output {
                ChatViewOutput::SendMessage(text) => AppMsg::SendMessage(text),
                ChatViewOutput::ToggleRecording => AppMsg::ToggleRecording,
                ChatViewOutput::ShowStatus => AppMsg::ShowStatus,
            });

        let status_view = StatusView::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                StatusViewOutput::ViewPlan => AppMsg::ShowPlan,
                StatusViewOutput::BackToChat => AppMsg::ShowChat,
            });

        let activity_view = ActivityView::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                ActivityViewOutput::Refresh => AppMsg::RefreshActivity,
                ActivityViewOutput::ViewConversation(id) => AppMsg::ViewConversationStatus(id),
            });

        let plan_view = PlanView::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                PlanViewOutput::Decide(plan_id, decision) => AppMsg::DecidePlan(plan_id, decision),
                PlanViewOutput::Import => AppMsg::ImportPlan,
                PlanViewOutput::Export => AppMsg::ExportPlan,
                PlanViewOutput::BackToStatus => AppMsg::ShowStatus,
            });

        let profile_view = ProfileView::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                ProfileViewOutput::SignOut => AppMsg::SignOut,
            });

        let welcome = WelcomePage::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                WelcomeOutput::SignIn => AppMsg::ShowLogin(LoginMode::SignIn),
                WelcomeOutput::CreateAccount => AppMsg::ShowLogin(LoginMode::SignUp),
            });

        let toast_overlay = adw::ToastOverlay::new();
        toast_overlay.set_hexpand(true);
        toast_overlay.set_vexpand(true);

        let content_stack = gtk::Stack::new();
        content_stack.set_hexpand(true);
        content_stack.set_vexpand(true);
        content_stack.set_transition_type(gtk::StackTransitionType::Crossfade);
        content_stack.add_named(welcome.widget(), Some(Page::SignIn.name()));
        content_stack.add_named(chat_view.widget(), Some(Page::Chat.name()));
        content_stack.add_named(status_view.widget(), Some(Page::Status.name()));
        content_stack.add_named(activity_view.widget(), Some(Page::Activity.name()));
        content_stack.add_named(plan_view.widget(), Some(Page::Plan.name()));
        content_stack.add_named(profile_view.widget(), Some(Page::Profile.name()));
        content_stack.set_visible_child_name(Page::SignIn.name());

        let content_header = adw::HeaderBar::new();
        content_header.set_show_start_title_buttons(false);

        let window_title = adw::WindowTitle::new(config::APP_NAME, "");
        content_header.set_title_widget(Some(&window_title));

        // Signed-in only
        let header_actions = gtk::Box::new(gtk::Orientation::Horizontal, 4);
        header_actions.set_visible(false);

        let activity_btn = gtk::Button::builder()
            .icon_name("view-list-bullet-symbolic")
            .tooltip_text("Trip Activity")
            .build();
        let sender_activity = sender.input_sender().clone();
        activity_btn.connect_clicked(move |_| {
            sender_activity.emit(AppMsg::ShowActivity);
        });
        header_actions.append(&activity_btn);

        let profile_btn = gtk::Button::builder()
            .icon_name("avatar-default-symbolic")
            .tooltip_text("Profile")
            .build();
        let sender_profile = sender.input_sender().clone();
        profile_btn.connect_clicked(move |_| {
            sender_profile.emit(AppMsg::ShowProfile);
        });
        header_actions.append(&profile_btn);

        let menu = gio::Menu::new();
        let trip_section = gio::Menu::new();
        trip_section.append(Some("New Trip"), Some("app.new-chat"));
        trip_section.append(Some("Import Trip Plan…"), Some("app.import-plan"));
        menu.append_section(None, &trip_section);
        let app_section = gio::Menu::new();
        app_section.append(Some("Preferences"), Some("app.preferences"));
        app_section.append(Some("Keyboard Shortcuts"), Some("app.show-shortcuts"));
        app_section.append(Some("About TripChat"), Some("app.about"));
        menu.append_section(None, &app_section);
        let account_section = gio::Menu::new();
        account_section.append(Some("Sign Out"), Some("app.sign-out"));
        menu.append_section(None, &account_section);

        let menu_button = gtk::MenuButton::builder()
            .icon_name("open-menu-symbolic")
            .menu_model(&menu)
            .build();

        content_header.pack_end(&menu_button);
        content_header.pack_end(&header_actions);

        let content_toolbar = adw::ToolbarView::new();
        content_toolbar.add_top_bar(&content_header);
        content_toolbar.set_content(Some(&content_stack));

        let content_page = adw::NavigationPage::builder()
            .title("Chat")
            .tag("content")
            .child(&content_toolbar)
            .build();

        let sidebar_page = adw::NavigationPage::builder()
            .title("Trips")
            .tag("sidebar")
            .child(sidebar.widget())
            .build();

        let split_view = adw::NavigationSplitView::new();
        split_view.set_hexpand(true);
        split_view.set_vexpand(true);
        split_view.set_min_sidebar_width(220.0);
        split_view.set_max_sidebar_width(320.0);
        split_view.set_sidebar(Some(&sidebar_page));
        split_view.set_content(Some(&content_page));

        if let Ok(condition) = adw::BreakpointCondition::parse("max-width: 600px") {
            let breakpoint = adw::Breakpoint::new(condition);
            breakpoint.add_setter(&split_view, "collapsed", Some(&true.to_value()));
            breakpoint.add_setter(
                &content_header,
                "show-start-title-buttons",
                Some(&true.to_value()),
            );
            root.add_breakpoint(breakpoint);
        }

        toast_overlay.set_child(Some(&split_view));

        let model = App {
            services: None,
            voice_available,
            sidebar,
            chat_view,
            status_view,
            activity_view,
            plan_view,
            profile_view,
            welcome,
            toast_overlay: toast_overlay.clone(),
            content_stack,
            window_title,
            header_actions,
            split_view,
            page: Page::SignIn,
            user: None,
            conversations: Vec::new(),
            current: None,
            current_plan: None,
            creating_conversation: false,
            poll_cancel: None,
            plan_ready: false,
            voice: None,
            voice_generation: 0,
            voice_starting: false,
            recording: false,
            #[cfg(feature = "microphone")]
            microphone: None,
            preferences_window: None,
            behavior_page: None,
            appearance_page: None,
            login_dialog: None,
            settings,
        };

        let widgets = view_output!();

        let app = relm4::main_adw_application();
        let input = sender.input_sender();
        add_app_action(&app, input, "new-chat", &["<Control>n"], || AppMsg::NewChat);
        add_app_action(&app, input, "preferences", &["<Control>comma"], || {
            AppMsg::ShowPreferences
        });
        add_app_action(&app, input, "show-shortcuts", &["<Control>slash"], || {
            AppMsg::ShowShortcuts
        });
        add_app_action(&app, input, "activity", &["<Control>h"], || AppMsg::ShowActivity);
        add_app_action(&app, input, "toggle-recording", &["<Control>r"], || {
            AppMsg::ToggleRecording
        });
        add_app_action(&app, input, "status", &["<Control>i"], || AppMsg::ShowStatus);
        add_app_action(&app, input, "import-plan", &["<Control>o"], || AppMsg::ImportPlan);
        add_app_action(&app, input, "about", &[], || AppMsg::ShowAbout);
        add_app_action(&app, input, "sign-out", &[], || AppMsg::SignOut);

        sender.command(|out, _| {
            Box::pin(async move {
                match Self::async_init().await {
                    Ok((services, settings)) => {
                        let auth = services.auth.clone();
                        if out
                            .send(AppCmd::Initialized(Box::new(services), settings))
                            .is_err()
                        {
                            return;
                        }
                        let restored = auth.restore_session().await.map_err(|e| e.to_string());
                        let _ = out.send(AppCmd::SessionRestored(restored));
                    }
                    Err(e) => {
                        tracing::error!("Startup failed: {:#}", e);
                        let _ = out.send(AppCmd::InitFailed(format!("{:#}", e)));
                    }
                }
            })
        });

        AsyncComponentParts { model, widgets }
    }

    async fn update(
        &mut self,
        msg: Self::Input,
        sender: AsyncComponentSender<Self>,
        root: &Self::Root,
    ) {
        match msg {
            AppMsg::NewChat => {
                if self.user.is_none() {
                    self.show_page(Page::SignIn);
                    return;
                }
                self.leave_conversation();
                self.chat_view.emit(ChatViewMsg::Clear);
                self.chat_view.emit(ChatViewMsg::SetHasConversation(false));
                self.show_page(Page::Chat);
            }
            AppMsg::ConversationSelected(id) => {
                if self.current.as_ref().is_some_and(|c| c.id == id) {
                    self.show_page(Page::Chat);
                    return;
                }
                let Some(conversation) = self.conversations.iter().find(|c| c.id == id).cloned()
                else {
                    tracing::warn!("Selected unknown conversation {}", id);
                    return;
                };
                self.sidebar.emit(SidebarMsg::SelectConversation(id));
                self.open_conversation(conversation, false, &sender);
            }
            AppMsg::ViewConversationStatus(id) => {
                if !self.current.as_ref().is_some_and(|c| c.id == id) {
                    let Some(conversation) =
                        self.conversations.iter().find(|c| c.id == id).cloned()
                    else {
                        return;
                    };
                    self.sidebar.emit(SidebarMsg::SelectConversation(id));
                    self.open_conversation(conversation, false, &sender);
                }
                self.show_page(Page::Status);
            }
            AppMsg::ShowChat => self.show_page(Page::Chat),
            AppMsg::ShowStatus => {
                if self.current.is_some() {
                    self.show_page(Page::Status);
                } else {
                    self.show_toast("Start a conversation to follow its planning status");
                }
            }
            AppMsg::ShowPlan => {
                if self.current.is_some() {
                    self.show_page(Page::Plan);
                }
            }
            AppMsg::ShowProfile => {
                if self.user.is_some() {
                    self.show_page(Page::Profile);
                }
            }
            AppMsg::ShowActivity | AppMsg::RefreshActivity => {
                let (Some(services), Some(user)) = (self.services.clone(), self.user.clone())
                else {
                    return;
                };
                self.show_page(Page::Activity);
                run(&sender, "Couldn't load trip activity", async move {
                    let conversations = services.conversations.list(&user.id).await?;
                    let items = load_overview(&services.db, conversations.clone()).await?;
                    Ok(AppCmd::ActivityLoaded(conversations, items))
                });
            }
            AppMsg::ShowLogin(mode) => {
                let Some(services) = &self.services else {
                    self.show_toast("Still starting up, try again in a moment");
                    return;
                };
                if self.login_dialog.is_some() {
                    return;
                }
                self.login_dialog = Some(crate::ui::window::create_login_dialog(
                    root,
                    sender.input_sender(),
                    services.auth.clone(),
                    mode,
                ));
            }
            AppMsg::LoggedIn(user) => {
                self.login_dialog = None;
                self.show_toast(&format!("Welcome, {}", user.name));
                self.signed_in(user, &sender);
            }
            AppMsg::LoginCancelled => {
                self.login_dialog = None;
            }
            AppMsg::SignOut => {
                if self.user.is_none() {
                    return;
                }
                if let Some(services) = &self.services {
                    services.auth.logout().await;
                }
                self.signed_out();
            }
            AppMsg::SendMessage(text) => {
                self.send_message(text, &sender);
            }
            AppMsg::ToggleRecording => {
                self.toggle_recording(&sender);
            }
            AppMsg::RenameConversation(id, title) => {
                let Some(services) = self.services.clone() else {
                    return;
                };
                run(&sender, "Couldn't rename the conversation", async move {
                    services.conversations.rename(&id, &title).await?;
                    Ok(AppCmd::Renamed(id, title.trim().to_string()))
                });
            }
            AppMsg::SetConversationStatus(id, status) => {
                self.save_status(id, status, &sender);
            }
            AppMsg::ArchiveConversation(id) => {
                let Some(services) = self.services.clone() else {
                    return;
                };
                run(&sender, "Couldn't archive the conversation", async move {
                    services.conversations.archive(&id).await?;
                    Ok(AppCmd::Archived(id))
                });
            }
            AppMsg::ExportConversation(id) => {
                let Some(services) = self.services.clone() else {
                    return;
                };
                let Some(conversation) = self.conversations.iter().find(|c| c.id == id).cloned()
                else {
                    return;
                };
                run(&sender, "Couldn't export the transcript", async move {
                    let messages = services.conversations.list_messages(&conversation.id).await?;
                    Ok(AppCmd::ExportReady {
                        dialog_title: "Export Transcript",
                        name: conversation.title.clone(),
                        contents: export_to_markdown(&conversation, &messages),
                    })
                });
            }
            AppMsg::DecidePlan(plan_id, decision) => {
                let Some(services) = self.services.clone() else {
                    return;
                };
                run(&sender, "Couldn't update the trip plan", async move {
                    let plan = services.plans.decide(&plan_id, decision).await?;
                    Ok(AppCmd::PlanDecided(plan))
                });
            }
            AppMsg::ImportPlan => {
                if self.user.is_none() {
                    return;
                }
                self.choose_plan_file(root, &sender);
            }
            AppMsg::ImportPlanFrom(path) => {
                let Some(services) = self.services.clone() else {
                    return;
                };
                let conversation_id = self.current.as_ref().map(|c| c.id.clone());
                run(&sender, "Couldn't import the trip plan", async move {
                    let plan = services
                        .plans
                        .import_json(&path, conversation_id.as_deref())
                        .await?;
                    Ok(AppCmd::PlanImported(plan))
                });
            }
            AppMsg::ExportPlan => {
                let Some(plan) = &self.current_plan else {
                    self.show_toast("There is no trip plan to export yet");
                    return;
                };
                let name = self
                    .current
                    .as_ref()
                    .map_or_else(|| "Trip Plan".to_string(), |c| c.title.clone());
                self.save_markdown(root, &sender, "Export Trip Plan", &name, export_plan_to_markdown(plan));
            }
            AppMsg::WriteExport(path, contents) => {
                run(&sender, "Export failed", async move {
                    write_markdown(&path, contents).await?;
                    Ok(AppCmd::Exported)
                });
            }
            AppMsg::ShowPreferences => {
                self.show_preferences(root, sender.input_sender().clone());
            }
            AppMsg::ShowShortcuts => {
                crate::ui::window::create_shortcuts_window(root);
            }
            AppMsg::ShowAbout => {
                crate::ui::window::create_about_dialog(root);
            }
            AppMsg::SettingChanged(change) => {
                self.apply_setting(change, &sender);
            }
            AppMsg::ShowToast(message) => {
                self.show_toast(&message);
            }
        }
    }

    async fn update_cmd(
        &mut self,
        msg: Self::CommandOutput,
        sender: AsyncComponentSender<Self>,
        root: &Self::Root,
    ) {
        match msg {
            AppCmd::Initialized(services, settings) => {
                tracing::info!("Services ready ({:?})", services);
                self.services = Some(*services);
                apply_color_scheme(settings.color_scheme);
                self.chat_view
                    .emit(ChatViewMsg::SetSendWithEnter(settings.send_with_enter));
                self.chat_view
                    .emit(ChatViewMsg::SetShowExamples(settings.show_examples));
                self.settings = settings;
            }
            AppCmd::InitFailed(err) => {
                self.welcome.emit(WelcomeMsg::SetRestoring(false));
                self.show_toast(&format!("Failed to start: {}", err));
            }
            AppCmd::SessionRestored(result) => {
                self.welcome.emit(WelcomeMsg::SetRestoring(false));
                match result {
                    Ok(Some(user)) => self.signed_in(user, &sender),
                    Ok(None) => self.show_page(Page::SignIn),
                    Err(e) => {
                        tracing::warn!("Could not restore the previous session: {}", e);
                        self.show_toast("Couldn't restore your session. Please sign in.");
                        self.show_page(Page::SignIn);
                    }
                }
            }
            AppCmd::ConversationsLoaded(conversations) => {
                self.sidebar
                    .emit(SidebarMsg::LoadConversations(conversations.clone()));
                self.conversations = conversations;
            }
            AppCmd::ConversationCreated(conversation, pending) => {
                self.creating_conversation = false;
                self.conversations.insert(0, conversation.clone());
                self.sidebar
                    .emit(SidebarMsg::AddConversation(conversation.clone()));
                self.open_conversation(conversation, true, &sender);
                match pending {
                    Some(PendingAction::Send(text)) => self.send_message(text, &sender),
                    Some(PendingAction::Record) => self.toggle_recording(&sender),
                    None => {}
                }
            }
            AppCmd::ConversationOpened {
                id,
                messages,
                updates,
                plan,
            } => {
                let Some(current) = self.current.clone().filter(|c| c.id == id) else {
                    return;
                };
                self.chat_view.emit(ChatViewMsg::LoadMessages(messages));
                self.status_view.emit(StatusViewMsg::SetConversation {
                    title: current.title.clone(),
                    cached: updates,
                });
                self.set_plan(plan);
                self.start_polling(&id, &sender);
            }
            AppCmd::MessageSaved {
                message,
                first_from_user,
            } => {
                let conversation_id = message.conversation_id.clone();
                let is_current = self
                    .current
                    .as_ref()
                    .is_some_and(|c| c.id == conversation_id);
                if is_current {
                    self.chat_view.emit(ChatViewMsg::AddMessage(message.clone()));
                }
                if first_from_user {
                    self.name_conversation(conversation_id, message.content, &sender);
                }
            }
            AppCmd::Retitled(id, title) | AppCmd::Renamed(id, title) => {
                self.sidebar
                    .emit(SidebarMsg::UpdateConversationTitle(id.clone(), title.clone()));
                self.edit_conversation(&id, |c| c.title = title.clone());
                if self.current.as_ref().is_some_and(|c| c.id == id) {
                    self.status_view.emit(StatusViewMsg::SetTitle(title));
                    self.refresh_title();
                }
            }
            AppCmd::StatusSaved(id, status) => {
                self.sidebar
                    .emit(SidebarMsg::UpdateConversationStatus(id.clone(), status));
                self.edit_conversation(&id, |c| c.status = status);
            }
            AppCmd::Archived(id) => {
                self.sidebar.emit(SidebarMsg::RemoveConversation(id.clone()));
                self.conversations.retain(|c| c.id != id);
                if self.current.as_ref().is_some_and(|c| c.id == id) {
                    sender.input(AppMsg::NewChat);
                }
                self.show_toast("Conversation archived");
            }
            AppCmd::ExportReady {
                dialog_title,
                name,
                contents,
            } => {
                self.save_markdown(root, &sender, dialog_title, &name, contents);
            }
            AppCmd::Exported => {
                self.show_toast("Exported");
            }
            AppCmd::Poll(id, event) => {
                if !self.current.as_ref().is_some_and(|c| c.id == id) {
                    return;
                }
                self.handle_poll_event(id, event, &sender);
            }
            AppCmd::PlanLoaded(id, plan) => {
                if self.current.as_ref().is_some_and(|c| c.id == id) {
                    self.set_plan(plan);
                }
            }
            AppCmd::PlanDecided(plan) => {
                self.show_toast(&format!("Trip plan {}", plan.status.label().to_lowercase()));
                self.set_plan(Some(plan));
            }
            AppCmd::PlanImported(plan) => {
                self.show_toast("Trip plan imported");
                let for_current = self
                    .current
                    .as_ref()
                    .is_some_and(|c| c.id == plan.conversation_id);
                if for_current || self.current.is_none() {
                    self.set_plan(Some(plan));
                    self.show_page(Page::Plan);
                }
            }
            AppCmd::ActivityLoaded(conversations, items) => {
                if conversations.len() != self.conversations.len() {
                    self.sidebar
                        .emit(SidebarMsg::LoadConversations(conversations.clone()));
                }
                self.conversations = conversations;
                self.activity_view.emit(ActivityViewMsg::SetItems(items));
            }
            AppCmd::VoiceStarted(generation, session, pending) => {
                if generation != self.voice_generation {
                    session.end();
                    return;
                }
                self.voice_starting = false;
                self.voice = Some(session);
                match pending {
                    Some(PendingAction::Send(text)) => self.deliver_text(text, &sender),
                    Some(PendingAction::Record) => self.start_microphone(&sender),
                    None => {}
                }
            }
            AppCmd::Voice(generation, event) => {
                if generation == self.voice_generation {
                    self.handle_voice_event(event, &sender);
                }
            }
            AppCmd::VoiceFailed(generation, err) => {
                if generation != self.voice_generation {
                    return;
                }
                self.voice_starting = false;
                self.stop_recording();
                self.chat_view.emit(ChatViewMsg::SetSending(false));
                self.show_toast(&format!("Voice agent unavailable: {}", err));
            }
            AppCmd::TextDelivered => {
                self.chat_view.emit(ChatViewMsg::SetSending(false));
            }
            AppCmd::AudioStopped(err) => {
                tracing::warn!("Microphone stream ended: {}", err);
                self.stop_recording();
            }
            AppCmd::Failed {
                context,
                message,
                expired,
            } => {
                self.creating_conversation = false;
                self.chat_view.emit(ChatViewMsg::SetSending(false));
                if expired {
                    if let Some(services) = &self.services {
                        services.auth.handle_expired().await;
                    }
                    self.signed_out();
                    self.show_toast("Your session expired. Please sign in again.");
                } else {
                    tracing::error!("{}: {}", context, message);
                    self.show_toast(&format!("{}: {}", context, message));
                }
            }
        }
    }
}

/// Run a background task whose result or error comes back as a command.
fn run<F>(sender: &AsyncComponentSender<App>, context: &'static str, task: F)
where
    F: Future<Output = anyhow::Result<AppCmd>> + Send + 'static,
{
    sender.command(move |out, _| {
        Box::pin(async move {
            let cmd = match task.await {
                Ok(cmd) => cmd,
                Err(e) => failure(context, &e),
            };
            let _ = out.send(cmd);
        })
    });
}

fn add_app_action(
    app: &adw::Application,
    sender: &relm4::Sender<AppMsg>,
    name: &str,
    accels: &[&str],
    msg: fn() -> AppMsg,
) {
    let action = gio::SimpleAction::new(name, None);
    let sender = sender.clone();
    action.connect_activate(move |_, _| {
        sender.emit(msg());
    });
    app.add_action(&action);
    if !accels.is_empty() {
        app.set_accels_for_action(&format!("app.{}", name), accels);
    }
}

impl App {
    async fn async_init() -> anyhow::Result<(Services, AppSettings)> {
        let endpoints = Endpoints::from_env()?;
        let db = Database::new().await?;

        let keyring = match KeyringService::new().await {
            Ok(keyring) => Some(keyring),
            Err(e) => {
                tracing::warn!("Secret service unavailable, sessions will not be remembered: {}", e);
                None
            }
        };

        let backend = BackendClient::new(endpoints.api_url.clone());
        let auth = AuthService::new(backend.clone(), keyring);
        let conversations = ConversationService::new(
            backend,
            TitleClient::new(endpoints.title_url.clone()),
            db.clone(),
        );
        let plans = TripPlanService::new(db.clone());
        let status: Arc<dyn StatusSource> = Arc::new(CachedStatusSource::new(
            StatusClient::new(endpoints.status_url.clone()),
            db.clone(),
        ));

        let voice: Option<Arc<dyn VoiceProvider>> = match ElevenLabsProvider::from_endpoints(&endpoints) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                tracing::info!("Voice agent disabled: {}", e);
                None
            }
        };

        let settings = SettingsService::load(&db).await;

        Ok((
            Services {
                db,
                auth,
                conversations,
                plans,
                status,
                voice,
            },
            settings,
        ))
    }

    fn show_toast(&self, message: &str) {
        let toast = adw::Toast::new(message);
        toast.set_timeout(3);
        self.toast_overlay.add_toast(toast);
    }

    fn show_page(&mut self, page: Page) {
        self.page = page;
        self.content_stack.set_visible_child_name(page.name());
        self.header_actions.set_visible(self.user.is_some());
        self.refresh_title();
        self.split_view.set_show_content(true);
    }

    fn refresh_title(&self) {
        self.window_title.set_title(self.page.title());
        let subtitle = match &self.current {
            Some(conversation) if self.page.shows_conversation() => conversation.title.as_str(),
            _ => "",
        };
        self.window_title.set_subtitle(subtitle);
    }

    fn show_preferences(&mut self, parent: &adw::ApplicationWindow, sender: relm4::Sender<AppMsg>) {
        let handles =
            crate::ui::window::create_preferences_window(parent, &sender, &self.settings);
        self.preferences_window = Some(handles.window);
        self.behavior_page = Some(handles.behavior_page);
        self.appearance_page = Some(handles.appearance_page);
    }

    fn apply_setting(&mut self, change: SettingChange, sender: &AsyncComponentSender<Self>) {
        change.apply(&mut self.settings);
        match change {
            SettingChange::SendWithEnter(enabled) => {
                self.chat_view.emit(ChatViewMsg::SetSendWithEnter(enabled));
            }
            SettingChange::ShowExamples(show) => {
                self.chat_view.emit(ChatViewMsg::SetShowExamples(show));
            }
            SettingChange::ColorScheme(scheme) => apply_color_scheme(scheme),
            SettingChange::PollIntervalMs(_) => {
                // Restart a running poll so the new interval takes effect.
                if self.poll_cancel.is_some() {
                    if let Some(id) = self.current.as_ref().map(|c| c.id.clone()) {
                        self.start_polling(&id, sender);
                    }
                }
            }
            SettingChange::AutoTitles(_) => {}
        }

        if let Some(services) = &self.services {
            let db = services.db.clone();
            let settings = self.settings.clone();
            sender.command(move |_out, _| {
                Box::pin(async move {
                    if let Err(e) = SettingsService::save(&db, &settings).await {
                        tracing::error!("Failed to save settings: {}", e);
                    }
                })
            });
        }
    }

    fn edit_conversation(&mut self, id: &str, edit: impl Fn(&mut Conversation)) {
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) {
            edit(conversation);
        }
        if let Some(current) = self.current.as_mut().filter(|c| c.id == id) {
            edit(current);
        }
    }

    fn signed_in(&mut self, user: User, sender: &AsyncComponentSender<Self>) {
        tracing::info!("Signed in as {}", user.email);
        self.profile_view.emit(ProfileViewMsg::SetUser(Some(user.clone())));
        self.user = Some(user.clone());
        self.leave_conversation();
        self.chat_view.emit(ChatViewMsg::Clear);
        self.chat_view.emit(ChatViewMsg::SetHasConversation(false));
        self.show_page(Page::Chat);

        if let Some(services) = self.services.clone() {
            run(sender, "Couldn't load your trips", async move {
                let conversations = services.conversations.list(&user.id).await?;
                Ok(AppCmd::ConversationsLoaded(conversations))
            });
        }
    }

    /// Drop all per-user state and return to the welcome page.
    fn signed_out(&mut self) {
        self.leave_conversation();
        self.user = None;
        self.conversations.clear();
        self.creating_conversation = false;
        self.sidebar.emit(SidebarMsg::LoadConversations(Vec::new()));
        self.profile_view.emit(ProfileViewMsg::SetUser(None));
        self.activity_view.emit(ActivityViewMsg::SetItems(Vec::new()));
        self.chat_view.emit(ChatViewMsg::Clear);
        self.chat_view.emit(ChatViewMsg::SetHasConversation(false));
        self.show_page(Page::SignIn);
    }

    /// Stop everything bound to the current conversation.
    fn leave_conversation(&mut self) {
        self.stop_polling();
        self.stop_recording();
        self.end_voice();
        self.current = None;
        self.set_plan(None);
        self.status_view.emit(StatusViewMsg::Clear);
    }

    /// Make `conversation` current. A `fresh` one was just created and has
    /// nothing stored yet.
    fn open_conversation(
        &mut self,
        conversation: Conversation,
        fresh: bool,
        sender: &AsyncComponentSender<Self>,
    ) {
        self.leave_conversation();
        self.plan_ready = conversation.status == ConversationStatus::Completed;
        self.current = Some(conversation.clone());
        self.chat_view.emit(ChatViewMsg::Clear);
        self.chat_view.emit(ChatViewMsg::SetHasConversation(true));
        self.show_page(Page::Chat);

        if fresh {
            self.status_view.emit(StatusViewMsg::SetConversation {
                title: conversation.title.clone(),
                cached: Vec::new(),
            });
            self.start_polling(&conversation.id, sender);
            return;
        }

        let Some(services) = self.services.clone() else {
            return;
        };
        run(sender, "Couldn't open the conversation", async move {
            let messages = services.conversations.list_messages(&conversation.id).await?;
            let updates = services.db.list_status_updates(&conversation.id).await?;
            let plan = services.plans.get(&conversation.id).await?;
            Ok(AppCmd::ConversationOpened {
                id: conversation.id,
                messages,
                updates,
                plan,
            })
        });
    }

    fn create_conversation(&mut self, pending: PendingAction, sender: &AsyncComponentSender<Self>) {
        let (Some(services), Some(user)) = (self.services.clone(), self.user.clone()) else {
            return;
        };
        if self.creating_conversation {
            return;
        }
        self.creating_conversation = true;
        if matches!(pending, PendingAction::Send(_)) {
            self.chat_view.emit(ChatViewMsg::SetSending(true));
        }
        run(sender, "Couldn't start a new trip", async move {
            let conversation = services.conversations.create(&user.id).await?;
            Ok(AppCmd::ConversationCreated(conversation, Some(pending)))
        });
    }

    fn save_status(
        &mut self,
        id: String,
        status: ConversationStatus,
        sender: &AsyncComponentSender<Self>,
    ) {
        let Some(services) = self.services.clone() else {
            return;
        };
        run(sender, "Couldn't update the conversation", async move {
            services.conversations.set_status(&id, status).await?;
            Ok(AppCmd::StatusSaved(id, status))
        });
    }

    fn persist_message(&self, role: Role, content: String, sender: &AsyncComponentSender<Self>) {
        let (Some(services), Some(conversation)) = (self.services.clone(), self.current.clone())
        else {
            return;
        };
        run(sender, "Couldn't save the message", async move {
            let message = services
                .conversations
                .save_message(&conversation.id, role, &content)
                .await?;
            let first_from_user = role == Role::User
                && services
                    .conversations
                    .user_message_count(&conversation.id)
                    .await?
                    == 1;
            Ok(AppCmd::MessageSaved {
                message,
                first_from_user,
            })
        });
    }

    /// Title a conversation after its opening message, through the title
    /// service or locally when auto titles are off.
    fn name_conversation(
        &self,
        conversation_id: String,
        first_message: String,
        sender: &AsyncComponentSender<Self>,
    ) {
        let Some(services) = self.services.clone() else {
            return;
        };
        let auto_titles = self.settings.auto_titles;
        run(sender, "Couldn't name the conversation", async move {
            let title = if auto_titles {
                services
                    .conversations
                    .retitle_from_first_message(&conversation_id, &first_message)
                    .await?
            } else {
                let title = truncate_title(&first_message);
                services.conversations.rename(&conversation_id, &title).await?;
                title
            };
            Ok(AppCmd::Retitled(conversation_id, title))
        });
    }

    fn send_message(&mut self, text: String, sender: &AsyncComponentSender<Self>) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.user.is_none() {
            self.show_page(Page::SignIn);
            return;
        }
        if self.current.is_none() {
            self.create_conversation(PendingAction::Send(text), sender);
            return;
        }

        self.persist_message(Role::User, text.clone(), sender);

        if self.voice.as_ref().is_some_and(VoiceSession::is_active) {
            self.chat_view.emit(ChatViewMsg::SetSending(true));
            self.deliver_text(text, sender);
        } else if self.voice_available {
            self.chat_view.emit(ChatViewMsg::SetSending(true));
            self.start_voice(Some(PendingAction::Send(text)), sender);
        } else {
            self.chat_view.emit(ChatViewMsg::SetSending(false));
            self.show_toast("The travel agent is not configured; set ELEVENLABS_AGENT_ID");
        }
    }

    fn deliver_text(&self, text: String, sender: &AsyncComponentSender<Self>) {
        let Some(session) = self.voice.clone() else {
            return;
        };
        run(sender, "Couldn't reach the travel agent", async move {
            session.send_text(&text).await?;
            Ok(AppCmd::TextDelivered)
        });
    }

    fn toggle_recording(&mut self, sender: &AsyncComponentSender<Self>) {
        if self.recording {
            self.stop_recording();
            self.end_voice();
            return;
        }
        if self.user.is_none() {
            self.show_page(Page::SignIn);
            return;
        }
        if !self.voice_available {
            self.chat_view.emit(ChatViewMsg::SetRecording(false));
            self.show_toast("The voice agent is not configured; set ELEVENLABS_AGENT_ID");
            return;
        }
        if self.current.is_none() {
            self.create_conversation(PendingAction::Record, sender);
            return;
        }

        if self.voice.as_ref().is_some_and(VoiceSession::is_active) {
            self.start_microphone(sender);
        } else {
            self.chat_view.emit(ChatViewMsg::SetRecording(true));
            self.start_voice(Some(PendingAction::Record), sender);
        }
    }

    /// Open a voice session. Its events come back tagged with the session's
    /// generation so late events from an ended session are ignored.
    fn start_voice(&mut self, pending: Option<PendingAction>, sender: &AsyncComponentSender<Self>) {
        let Some(provider) = self.services.as_ref().and_then(|s| s.voice.clone()) else {
            self.show_toast("The voice agent is not configured");
            return;
        };
        if self.voice_starting {
            return;
        }
        self.voice_starting = true;
        self.voice_generation += 1;
        let generation = self.voice_generation;

        sender.command(move |out, _| {
            Box::pin(async move {
                let (events_tx, mut events_rx) = mpsc::channel(64);
                match provider.start_session(events_tx).await {
                    Ok(session) => {
                        if out
                            .send(AppCmd::VoiceStarted(generation, session, pending))
                            .is_err()
                        {
                            return;
                        }
                        while let Some(event) = events_rx.recv().await {
                            if out.send(AppCmd::Voice(generation, event)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = out.send(AppCmd::VoiceFailed(generation, e.to_string()));
                    }
                }
            })
        });
    }

    fn end_voice(&mut self) {
        // Anything still in flight belongs to a stale generation now.
        self.voice_generation += 1;
        self.voice_starting = false;
        if let Some(session) = self.voice.take() {
            session.end();
        }
        self.chat_view.emit(ChatViewMsg::SetVoiceMode(None));
    }

    fn handle_voice_event(&mut self, event: VoiceEvent, sender: &AsyncComponentSender<Self>) {
        match event {
            VoiceEvent::Connected { conversation_id } => {
                tracing::info!("Voice agent conversation {}", conversation_id);
            }
            VoiceEvent::ModeChanged(mode) => {
                self.chat_view.emit(ChatViewMsg::SetVoiceMode(Some(mode)));
            }
            VoiceEvent::Message(transcript) => {
                if transcript.role == Role::Assistant {
                    self.chat_view.emit(ChatViewMsg::SetSending(false));
                }
                self.persist_message(transcript.role, transcript.content, sender);
            }
            VoiceEvent::Disconnected => {
                tracing::info!("Voice session ended");
                self.voice = None;
                self.stop_recording();
                self.chat_view.emit(ChatViewMsg::SetSending(false));
                self.chat_view.emit(ChatViewMsg::SetVoiceMode(None));
            }
            VoiceEvent::Error(err) => {
                tracing::warn!("Voice agent error: {}", err);
                self.show_toast(&format!("Voice agent: {}", err));
            }
        }
    }

    #[cfg(feature = "microphone")]
    fn start_microphone(&mut self, sender: &AsyncComponentSender<Self>) {
        let Some(session) = self.voice.clone() else {
            return;
        };
        if self.microphone.is_none() {
            match Microphone::new() {
                Ok(microphone) => self.microphone = Some(microphone),
                Err(e) => {
                    self.chat_view.emit(ChatViewMsg::SetRecording(false));
                    self.show_toast(&format!("Microphone unavailable: {}", e));
                    return;
                }
            }
        }
        let Some(microphone) = self.microphone.as_mut() else {
            return;
        };

        let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<f32>>(32);
        let started = microphone
            .start(chunk_tx)
            .map(|()| microphone.sample_rate());
        let sample_rate = match started {
            Ok(rate) => rate,
            Err(e) => {
                self.chat_view.emit(ChatViewMsg::SetRecording(false));
                self.show_toast(&format!("Couldn't start recording: {}", e));
                return;
            }
        };

        self.recording = true;
        self.chat_view.emit(ChatViewMsg::SetRecording(true));

        // Ends when the microphone stops and drops its sender.
        sender.command(move |out, _| {
            Box::pin(async move {
                let mut resampler = session.resampler(sample_rate);
                while let Some(chunk) = chunk_rx.recv().await {
                    if let Err(e) = session.send_audio(&mut resampler, &chunk) {
                        let _ = out.send(AppCmd::AudioStopped(e.to_string()));
                        break;
                    }
                }
            })
        });
    }

    #[cfg(not(feature = "microphone"))]
    fn start_microphone(&mut self, _sender: &AsyncComponentSender<Self>) {
        self.chat_view.emit(ChatViewMsg::SetRecording(false));
        self.show_toast("This build has no microphone support");
    }

    fn stop_recording(&mut self) {
        #[cfg(feature = "microphone")]
        if let Some(microphone) = self.microphone.as_mut() {
            microphone.stop();
        }
        self.recording = false;
        self.chat_view.emit(ChatViewMsg::SetRecording(false));
    }

    fn start_polling(&mut self, conversation_id: &str, sender: &AsyncComponentSender<Self>) {
        self.stop_polling();
        let Some(services) = &self.services else {
            return;
        };
        let cancel = CancellationToken::new();
        self.poll_cancel = Some(cancel.clone());
        self.status_view.emit(StatusViewMsg::SetPolling(true));

        let source = services.status.clone();
        let interval = self.settings.poll_interval();
        let id = conversation_id.to_string();
        sender.command(move |out, _| {
            Box::pin(async move {
                let tag = id.clone();
                run_polling(source, id, interval, cancel, move |event| {
                    let _ = out.send(AppCmd::Poll(tag.clone(), event));
                })
                .await;
            })
        });
    }

    fn stop_polling(&mut self) {
        if let Some(cancel) = self.poll_cancel.take() {
            cancel.cancel();
        }
        self.status_view.emit(StatusViewMsg::SetPolling(false));
    }

    fn handle_poll_event(&mut self, id: String, event: PollEvent, sender: &AsyncComponentSender<Self>) {
        match event {
            PollEvent::Updates(updates) => {
                self.status_view.emit(StatusViewMsg::SetError(None));
                self.status_view.emit(StatusViewMsg::SetUpdates(updates));
            }
            PollEvent::Complete(updates) => {
                self.poll_cancel = None;
                self.status_view.emit(StatusViewMsg::SetError(None));
                self.status_view.emit(StatusViewMsg::SetUpdates(updates));
                self.status_view.emit(StatusViewMsg::SetPolling(false));

                let already_completed = self
                    .current
                    .as_ref()
                    .is_some_and(|c| c.status == ConversationStatus::Completed);
                if !already_completed {
                    self.save_status(id.clone(), ConversationStatus::Completed, sender);
                }
                if !self.plan_ready {
                    self.plan_ready = true;
                    self.show_toast("Your trip plan is ready");
                }

                if let Some(services) = self.services.clone() {
                    run(sender, "Couldn't load the trip plan", async move {
                        let plan = services.plans.get(&id).await?;
                        Ok(AppCmd::PlanLoaded(id, plan))
                    });
                }
            }
            PollEvent::Error(err) => {
                self.status_view.emit(StatusViewMsg::SetError(Some(err)));
            }
        }
    }

    fn set_plan(&mut self, plan: Option<TripPlan>) {
        self.plan_view.emit(PlanViewMsg::SetPlan(plan.clone()));
        self.current_plan = plan;
    }

    fn choose_plan_file(&self, root: &adw::ApplicationWindow, sender: &AsyncComponentSender<Self>) {
        let filter = gtk::FileFilter::new();
        filter.set_name(Some("Trip plans (JSON)"));
        filter.add_mime_type("application/json");
        filter.add_suffix("json");
        let filters = gio::ListStore::new::<gtk::FileFilter>();
        filters.append(&filter);

        let dialog = gtk::FileDialog::builder()
            .title("Import Trip Plan")
            .filters(&filters)
            .default_filter(&filter)
            .build();

        let input = sender.input_sender().clone();
        dialog.open(Some(root), None::<&gio::Cancellable>, move |result| {
            // Err means the user dismissed the dialog.
            if let Some(path) = result.ok().and_then(|file| file.path()) {
                input.emit(AppMsg::ImportPlanFrom(path));
            }
        });
    }

    fn save_markdown(
        &self,
        root: &adw::ApplicationWindow,
        sender: &AsyncComponentSender<Self>,
        dialog_title: &str,
        name: &str,
        contents: String,
    ) {
        let dialog = gtk::FileDialog::builder()
            .title(dialog_title)
            .initial_name(suggested_file_name(name))
            .build();

        let input = sender.input_sender().clone();
        dialog.save(Some(root), None::<&gio::Cancellable>, move |result| {
            if let Some(path) = result.ok().and_then(|file| file.path()) {
                input.emit(AppMsg::WriteExport(path, contents));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_sessions_are_flagged() {
        let err = anyhow::Error::from(ApiError::SessionExpired);
        assert!(matches!(
            failure("Couldn't load your trips", &err),
            AppCmd::Failed { expired: true, .. }
        ));

        let err = anyhow::anyhow!("disk full");
        match failure("Export failed", &err) {
            AppCmd::Failed {
                context,
                message,
                expired,
            } => {
                assert_eq!(context, "Export failed");
                assert_eq!(message, "disk full");
                assert!(!expired);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_page_names_are_unique() {
        let pages = [
            Page::SignIn,
            Page::Chat,
            Page::Status,
            Page::Activity,
            Page::Plan,
            Page::Profile,
        ];
        let mut names: Vec<_> = pages.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), pages.len());
        assert!(pages.iter().filter(|p| p.shows_conversation()).count() == 3);
    }
}
