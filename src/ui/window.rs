use adw::prelude::*;
use relm4::prelude::*;

use crate::app::AppMsg;
use crate::config;
use crate::services::settings::AppSettings;
use crate::services::AuthService;
use crate::ui::dialogs::login::{LoginDialog, LoginDialogInit, LoginMode, LoginOutput};
use crate::ui::preferences::appearance_page::{AppearancePage, AppearancePageOutput};
use crate::ui::preferences::behavior_page::{BehaviorPage, BehaviorPageOutput};

/// Returned handles from `create_preferences_window` so the caller can store them.
pub struct PreferencesHandles {
    pub window: adw::PreferencesWindow,
    pub behavior_page: Controller<BehaviorPage>,
    pub appearance_page: Controller<AppearancePage>,
}

pub fn create_preferences_window(
    parent: &adw::ApplicationWindow,
    sender: &relm4::Sender<AppMsg>,
    settings: &AppSettings,
) -> PreferencesHandles {
    let behavior_page = BehaviorPage::builder()
        .launch(settings.clone())
        .forward(sender, |output| match output {
            BehaviorPageOutput::Changed(change) => AppMsg::SettingChanged(change),
        });

    let appearance_page = AppearancePage::builder()
        .launch(settings.clone())
        .forward(sender, |output| match output {
            AppearancePageOutput::Changed(change) => AppMsg::SettingChanged(change),
        });

    let prefs_window = adw::PreferencesWindow::new();
    prefs_window.set_title(Some("Preferences"));
    prefs_window.set_transient_for(Some(parent));
    prefs_window.set_modal(true);
    prefs_window.add(behavior_page.widget());
    prefs_window.add(appearance_page.widget());

    prefs_window.present();

    PreferencesHandles {
        window: prefs_window,
        behavior_page,
        appearance_page,
    }
}

pub fn create_shortcuts_window(parent: &adw::ApplicationWindow) {
    let window = gtk::ShortcutsWindow::builder()
        .transient_for(parent)
        .modal(true)
        .build();

    let general_group = gtk::ShortcutsGroup::builder()
        .title("General")
        .build();
    for (title, accelerator) in [
        ("New trip", "<Control>n"),
        ("Preferences", "<Control>comma"),
        ("Keyboard shortcuts", "<Control>slash"),
        ("All trip activity", "<Control>h"),
    ] {
        let shortcut = gtk::ShortcutsShortcut::builder()
            .title(title)
            .accelerator(accelerator)
            .build();
        general_group.add_shortcut(&shortcut);
    }

    let chat_group = gtk::ShortcutsGroup::builder()
        .title("Chat")
        .build();
    for (title, accelerator) in [
        ("Send message", "Return"),
        ("New line", "<Shift>Return"),
        ("Start or stop recording", "<Control>r"),
        ("Planning status", "<Control>i"),
    ] {
        let shortcut = gtk::ShortcutsShortcut::builder()
            .title(title)
            .accelerator(accelerator)
            .build();
        chat_group.add_shortcut(&shortcut);
    }

    let plan_group = gtk::ShortcutsGroup::builder()
        .title("Trip Plan")
        .build();
    let import = gtk::ShortcutsShortcut::builder()
        .title("Import plan")
        .accelerator("<Control>o")
        .build();
    plan_group.add_shortcut(&import);

    let section = gtk::ShortcutsSection::builder()
        .title(config::APP_NAME)
        .build();
    section.add_group(&general_group);
    section.add_group(&chat_group);
    section.add_group(&plan_group);

    window.add_section(&section);
    window.present();
}

pub fn create_about_dialog(parent: &adw::ApplicationWindow) {
    let about = adw::AboutWindow::builder()
        .application_name(config::APP_NAME)
        .version(config::VERSION)
        .developer_name("TripChat Contributors")
        .license_type(gtk::License::Gpl30)
        .comments("Plan trips by chatting or talking with an AI travel agent")
        .application_icon(config::APP_ID)
        .build();
    about.set_transient_for(Some(parent));
    about.present();
}

pub fn create_login_dialog(
    parent: &adw::ApplicationWindow,
    sender: &relm4::Sender<AppMsg>,
    auth: AuthService,
    mode: LoginMode,
) -> AsyncController<LoginDialog> {
    let dialog = LoginDialog::builder()
        .launch(LoginDialogInit { auth, mode })
        .forward(sender, |output| match output {
            LoginOutput::LoggedIn(user) => AppMsg::LoggedIn(user),
            LoginOutput::Cancelled => AppMsg::LoginCancelled,
        });

    dialog.widget().set_transient_for(Some(parent));
    dialog.widget().present();

    dialog
}
