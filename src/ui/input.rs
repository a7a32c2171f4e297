//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Returns true when the app should quit.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_email_char, can_add_field_char, can_add_password_char, App, EditFocus, LoginFocus,
    PasswordFocus, ProfileMode, Route,
};

pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Any keypress dismisses the current notice
    app.notice = None;

    match app.current_route() {
        Route::Login => handle_login_input(app, key),
        Route::ForgotPassword => handle_forgot_input(app, key),
        Route::VerifyOtp => handle_verify_input(app, key),
        Route::Home => handle_home_input(app, key),
        Route::Profile => handle_profile_input(app, key),
    }
}

fn handle_login_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            // Quit from the sign-in screen
            app.quitting = true;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Submit,
                LoginFocus::Submit => LoginFocus::Forgot,
                LoginFocus::Forgot => LoginFocus::Email,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Email => LoginFocus::Forgot,
                LoginFocus::Password => LoginFocus::Email,
                LoginFocus::Submit => LoginFocus::Password,
                LoginFocus::Forgot => LoginFocus::Submit,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Submit => app.submit_login(),
            LoginFocus::Forgot => {
                app.forgot_email = app.login_email.clone();
                app.navigate_push(Route::ForgotPassword);
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            _ => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email if can_add_email_char(app.login_email.len(), c) => {
                app.login_email.push(c);
            }
            LoginFocus::Password if can_add_password_char(app.login_password.len(), c) => {
                app.login_password.push(c);
            }
            _ => {}
        },
        _ => {}
    }
    false
}

fn handle_forgot_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => app.navigate_back(),
        KeyCode::Enter => app.submit_forgot(),
        KeyCode::Backspace => {
            app.forgot_email.pop();
        }
        KeyCode::Char(c) if can_add_email_char(app.forgot_email.len(), c) => {
            app.forgot_email.push(c);
        }
        _ => {}
    }
    false
}

fn handle_verify_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => app.navigate_back(),
        KeyCode::Enter => app.submit_otp_code(),
        KeyCode::Backspace => app.otp.pop_digit(),
        // Resend; a no-op while the cooldown is running
        KeyCode::Char('r') => app.resend_otp_code(),
        KeyCode::Char(c) if c.is_ascii_digit() => app.otp.push_digit(c),
        _ => {}
    }
    false
}

fn handle_home_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => {
            app.quitting = true;
            return true;
        }
        KeyCode::Char('p') => app.navigate_push(Route::Profile),
        KeyCode::Char('o') => app.sign_out(),
        _ => {}
    }
    false
}

fn handle_profile_input(app: &mut App, key: KeyEvent) -> bool {
    match app.profile_mode {
        ProfileMode::View => match key.code {
            KeyCode::Esc => app.navigate_back(),
            KeyCode::Char('e') => app.open_profile_editor(),
            KeyCode::Char('w') => app.open_password_editor(),
            KeyCode::Char('o') => app.sign_out(),
            _ => {}
        },
        ProfileMode::EditProfile => handle_profile_edit_input(app, key),
        ProfileMode::ChangePassword => handle_password_input(app, key),
    }
    false
}

fn handle_profile_edit_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.profile_mode = ProfileMode::View,
        KeyCode::Down | KeyCode::Tab => {
            app.edit_focus = match app.edit_focus {
                EditFocus::FirstName => EditFocus::LastName,
                EditFocus::LastName => EditFocus::Expertise,
                EditFocus::Expertise => EditFocus::Bio,
                EditFocus::Bio => EditFocus::Save,
                EditFocus::Save => EditFocus::FirstName,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.edit_focus = match app.edit_focus {
                EditFocus::FirstName => EditFocus::Save,
                EditFocus::LastName => EditFocus::FirstName,
                EditFocus::Expertise => EditFocus::LastName,
                EditFocus::Bio => EditFocus::Expertise,
                EditFocus::Save => EditFocus::Bio,
            };
        }
        KeyCode::Enter => match app.edit_focus {
            EditFocus::Save => app.submit_profile_edit(),
            EditFocus::FirstName => app.edit_focus = EditFocus::LastName,
            EditFocus::LastName => app.edit_focus = EditFocus::Expertise,
            EditFocus::Expertise => app.edit_focus = EditFocus::Bio,
            EditFocus::Bio => app.edit_focus = EditFocus::Save,
        },
        KeyCode::Backspace => {
            if let Some(field) = edit_field(app) {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(field) = edit_field(app) {
                if can_add_field_char(field.len(), c) {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
}

fn edit_field<'a>(app: &'a mut App) -> Option<&'a mut String> {
    match app.edit_focus {
        EditFocus::FirstName => Some(&mut app.edit_first_name),
        EditFocus::LastName => Some(&mut app.edit_last_name),
        EditFocus::Expertise => Some(&mut app.edit_expertise),
        EditFocus::Bio => Some(&mut app.edit_bio),
        EditFocus::Save => None,
    }
}

fn handle_password_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.profile_mode = ProfileMode::View,
        KeyCode::Down | KeyCode::Tab => {
            app.password_focus = match app.password_focus {
                PasswordFocus::Current => PasswordFocus::New,
                PasswordFocus::New => PasswordFocus::Confirm,
                PasswordFocus::Confirm => PasswordFocus::Save,
                PasswordFocus::Save => PasswordFocus::Current,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.password_focus = match app.password_focus {
                PasswordFocus::Current => PasswordFocus::Save,
                PasswordFocus::New => PasswordFocus::Current,
                PasswordFocus::Confirm => PasswordFocus::New,
                PasswordFocus::Save => PasswordFocus::Confirm,
            };
        }
        KeyCode::Enter => match app.password_focus {
            PasswordFocus::Save => app.submit_password_change(),
            PasswordFocus::Current => app.password_focus = PasswordFocus::New,
            PasswordFocus::New => app.password_focus = PasswordFocus::Confirm,
            PasswordFocus::Confirm => app.password_focus = PasswordFocus::Save,
        },
        KeyCode::Backspace => {
            if let Some(field) = password_field(app) {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(field) = password_field(app) {
                if can_add_password_char(field.len(), c) {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
}

fn password_field<'a>(app: &'a mut App) -> Option<&'a mut String> {
    match app.password_focus {
        PasswordFocus::Current => Some(&mut app.current_password),
        PasswordFocus::New => Some(&mut app.new_password),
        PasswordFocus::Confirm => Some(&mut app.confirm_password),
        PasswordFocus::Save => None,
    }
}
