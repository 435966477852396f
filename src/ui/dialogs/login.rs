use adw::prelude::*;
use relm4::prelude::*;

use crate::models::{NewUser, User};
use crate::services::AuthService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    SignIn,
    SignUp,
}

pub struct LoginDialogInit {
    pub auth: AuthService,
    pub mode: LoginMode,
}

pub struct LoginDialog {
    auth: AuthService,
    mode: LoginMode,
    form: LoginForm,
    working: bool,
    error: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct LoginForm {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    phone_number: String,
    country: String,
    city: String,
}

impl LoginForm {
    fn is_complete(&self, mode: LoginMode) -> bool {
        let signed_in = !self.email.trim().is_empty() && !self.password.is_empty();
        match mode {
            LoginMode::SignIn => signed_in,
            LoginMode::SignUp => {
                signed_in
                    && !self.first_name.trim().is_empty()
                    && !self.last_name.trim().is_empty()
                    && !self.phone_number.trim().is_empty()
            }
        }
    }

    fn new_user(&self) -> NewUser {
        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        NewUser {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            password: self.password.clone(),
            country: optional(&self.country),
            city: optional(&self.city),
        }
    }
}

#[derive(Debug)]
pub enum LoginMsg {
    Cancel,
    ToggleMode,
    EmailChanged(String),
    PasswordChanged(String),
    FirstNameChanged(String),
    LastNameChanged(String),
    PhoneChanged(String),
    CountryChanged(String),
    CityChanged(String),
    Submit,
}

#[derive(Debug)]
pub enum LoginCmd {
    Done(Result<User, String>),
}

#[derive(Debug)]
pub enum LoginOutput {
    LoggedIn(User),
    Cancelled,
}

#[relm4::component(pub, async)]
impl AsyncComponent for LoginDialog {
    type Init = LoginDialogInit;
    type Input = LoginMsg;
    type Output = LoginOutput;
    type CommandOutput = LoginCmd;

    view! {
        adw::Window {
            #[watch]
            set_title: Some(match model.mode {
                LoginMode::SignIn => "Sign In",
                LoginMode::SignUp => "Create Account",
            }),
            set_default_width: 450,
            set_default_height: -1,
            set_modal: true,

            adw::ToolbarView {
                add_top_bar = &adw::HeaderBar {
                    set_show_end_title_buttons: false,

                    pack_start = &gtk::Button {
                        set_label: "Cancel",
                        connect_clicked => LoginMsg::Cancel,
                    },

                    pack_end = &gtk::Button {
                        #[watch]
                        set_label: match model.mode {
                            LoginMode::SignIn => "Sign In",
                            LoginMode::SignUp => "Create",
                        },
                        add_css_class: "suggested-action",
                        #[watch]
                        set_sensitive: !model.working && model.form.is_complete(model.mode),
                        connect_clicked => LoginMsg::Submit,
                    },
                },

                #[wrap(Some)]
                set_content = &adw::Clamp {
                    set_maximum_size: 400,
                    set_margin_all: 16,

                    gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_spacing: 16,

                        adw::PreferencesGroup {
                            set_title: "Account",

                            #[name = "email_row"]
                            adw::EntryRow {
                                set_title: "Email",
                                set_input_purpose: gtk::InputPurpose::Email,
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::EmailChanged(entry.text().to_string()));
                                },
                            },

                            adw::PasswordEntryRow {
                                set_title: "Password",
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::PasswordChanged(entry.text().to_string()));
                                },
                                connect_entry_activated => LoginMsg::Submit,
                            },
                        },

                        adw::PreferencesGroup {
                            set_title: "About You",
                            #[watch]
                            set_visible: model.mode == LoginMode::SignUp,

                            adw::EntryRow {
                                set_title: "First Name",
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::FirstNameChanged(entry.text().to_string()));
                                },
                            },

                            adw::EntryRow {
                                set_title: "Last Name",
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::LastNameChanged(entry.text().to_string()));
                                },
                            },

                            adw::EntryRow {
                                set_title: "Phone Number",
                                set_input_purpose: gtk::InputPurpose::Phone,
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::PhoneChanged(entry.text().to_string()));
                                },
                            },

                            adw::EntryRow {
                                set_title: "Country (optional)",
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::CountryChanged(entry.text().to_string()));
                                },
                            },

                            adw::EntryRow {
                                set_title: "City (optional)",
                                connect_changed[sender] => move |entry| {
                                    sender.input(LoginMsg::CityChanged(entry.text().to_string()));
                                },
                            },
                        },

                        // Status area
                        gtk::Box {
                            set_orientation: gtk::Orientation::Horizontal,
                            set_spacing: 8,
                            set_halign: gtk::Align::Center,
                            #[watch]
                            set_visible: model.working || model.error.is_some(),

                            gtk::Spinner {
                                #[watch]
                                set_spinning: model.working,
                                #[watch]
                                set_visible: model.working,
                            },

                            gtk::Label {
                                #[watch]
                                set_label: model.error.as_deref().unwrap_or(""),
                                add_css_class: "error",
                                set_wrap: true,
                            },
                        },

                        gtk::Button {
                            #[watch]
                            set_label: match model.mode {
                                LoginMode::SignIn => "New here? Create an account",
                                LoginMode::SignUp => "Already have an account? Sign in",
                            },
                            add_css_class: "flat",
                            set_halign: gtk::Align::Center,
                            connect_clicked => LoginMsg::ToggleMode,
                        },
                    },
                },
            },
        }
    }

    async fn init(
        init: Self::Init,
        root: Self::Root,
        sender: AsyncComponentSender<Self>,
    ) -> AsyncComponentParts<Self> {
        let model = Self {
            auth: init.auth,
            mode: init.mode,
            form: LoginForm::default(),
            working: false,
            error: None,
        };

        let widgets = view_output!();
        widgets.email_row.grab_focus();

        AsyncComponentParts { model, widgets }
    }

    async fn update(
        &mut self,
        msg: Self::Input,
        sender: AsyncComponentSender<Self>,
        root: &Self::Root,
    ) {
        match msg {
            LoginMsg::Cancel => {
                let _ = sender.output(LoginOutput::Cancelled);
                root.close();
            }
            LoginMsg::ToggleMode => {
                self.mode = match self.mode {
                    LoginMode::SignIn => LoginMode::SignUp,
                    LoginMode::SignUp => LoginMode::SignIn,
                };
                self.error = None;
            }
            LoginMsg::EmailChanged(value) => {
                self.form.email = value;
                self.error = None;
            }
            LoginMsg::PasswordChanged(value) => {
                self.form.password = value;
                self.error = None;
            }
            LoginMsg::FirstNameChanged(value) => self.form.first_name = value,
            LoginMsg::LastNameChanged(value) => self.form.last_name = value,
            LoginMsg::PhoneChanged(value) => self.form.phone_number = value,
            LoginMsg::CountryChanged(value) => self.form.country = value,
            LoginMsg::CityChanged(value) => self.form.city = value,
            LoginMsg::Submit => {
                if self.working || !self.form.is_complete(self.mode) {
                    return;
                }
                self.working = true;
                self.error = None;

                let auth = self.auth.clone();
                let mode = self.mode;
                let form = self.form.clone();
                sender.command(move |out, _| {
                    Box::pin(async move {
                        let result = match mode {
                            LoginMode::SignIn => auth.login(&form.email, &form.password).await,
                            LoginMode::SignUp => auth.sign_up(&form.new_user()).await,
                        };
                        let _ = out.send(LoginCmd::Done(result.map_err(|e| e.to_string())));
                    })
                });
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
            LoginCmd::Done(Ok(user)) => {
                self.working = false;
                tracing::info!("Signed in as {}", user.email);
                // Send output BEFORE closing - closing may tear down the component
                let _ = sender.output(LoginOutput::LoggedIn(user));
                root.close();
            }
            LoginCmd::Done(Err(error)) => {
                self.working = false;
                self.error = Some(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_completeness() {
        let mut form = LoginForm {
            email: "ana@example.com".into(),
            password: "secret".into(),
            ..Default::default()
        };
        assert!(form.is_complete(LoginMode::SignIn));
        assert!(!form.is_complete(LoginMode::SignUp));

        form.first_name = "Ana".into();
        form.last_name = "Silva".into();
        form.phone_number = "555".into();
        assert!(form.is_complete(LoginMode::SignUp));

        form.email = "   ".into();
        assert!(!form.is_complete(LoginMode::SignIn));
    }

    #[test]
    fn test_new_user_trims_and_drops_blank_optionals() {
        let form = LoginForm {
            email: " ana@example.com ".into(),
            password: " pw ".into(),
            first_name: "Ana ".into(),
            last_name: " Silva".into(),
            phone_number: "555".into(),
            country: "  ".into(),
            city: "Lisbon".into(),
        };
        let user = form.new_user();
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.password, " pw ");
        assert_eq!(user.first_name, "Ana");
        assert!(user.country.is_none());
        assert_eq!(user.city.as_deref(), Some("Lisbon"));
    }
}
