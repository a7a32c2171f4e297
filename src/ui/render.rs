use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, EditFocus, LoginFocus, PasswordFocus, ProfileMode, Route};
use crate::auth::{GuardView, OtpPhase};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Studyhall";
    let route = app.current_route().title();

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::styled(" | ", styles::muted_style()),
        Span::styled(route, styles::help_desc_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_route() {
        route if route.is_protected() => match app.guard_view() {
            // The protected subtree only ever appears once the guard settles
            // authenticated; everything else shows the neutral indicator
            // until the redirect lands
            Some(GuardView::Protected) => match route {
                Route::Profile => render_profile(frame, app, area),
                _ => render_home(frame, app, area),
            },
            _ => render_loading(frame, area),
        },
        Route::Login => render_login(frame, app, area),
        Route::ForgotPassword => render_forgot(frame, app, area),
        Route::VerifyOtp => render_verify(frame, app, area),
        _ => render_loading(frame, area),
    }
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let dialog = centered_rect_fixed(30, 3, area);
    frame.render_widget(Clear, dialog);
    let text = Line::from(Span::styled("Checking session ...", styles::muted_style()));
    frame.render_widget(Paragraph::new(text).centered(), dialog);
}

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let dialog = centered_rect_fixed(46, 13, area);
    frame.render_widget(Clear, dialog);

    let version = env!("CARGO_PKG_VERSION");
    let mut lines = vec![
        Line::from(Span::styled("      S T U D Y H A L L", styles::title_style())),
        Line::from(Span::styled(
            format!("          version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        field_line(
            "Email   ",
            &app.login_email,
            app.login_focus == LoginFocus::Email,
            false,
        ),
        field_line(
            "Password",
            &app.login_password,
            app.login_focus == LoginFocus::Password,
            true,
        ),
        Line::from(""),
        button_line("[ Sign in ]", app.login_focus == LoginFocus::Submit),
        button_line("Forgot password?", app.login_focus == LoginFocus::Forgot),
        Line::from(""),
    ];

    if app.login_in_flight {
        lines.push(Line::from(Span::styled(
            "  Signing in ...",
            styles::muted_style(),
        )));
    } else {
        lines.push(Line::from(vec![
            Span::styled("  Tab", styles::help_key_style()),
            Span::styled(" next field  ", styles::muted_style()),
            Span::styled("Enter", styles::help_key_style()),
            Span::styled(" submit  ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" quit", styles::muted_style()),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

fn render_forgot(frame: &mut Frame, app: &App, area: Rect) {
    let dialog = centered_rect_fixed(52, 9, area);
    frame.render_widget(Clear, dialog);

    let lines = vec![
        Line::from(Span::styled("  Reset your password", styles::title_style())),
        Line::from(Span::styled(
            "  We will email a 6-digit code to this address.",
            styles::muted_style(),
        )),
        Line::from(""),
        field_line("Email", &app.forgot_email, true, false),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Enter", styles::help_key_style()),
            Span::styled(" send code  ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" back", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

fn render_verify(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = app.otp.snapshot();
    let dialog = centered_rect_fixed(52, 11, area);
    frame.render_widget(Clear, dialog);

    // Six slots, filled left to right as digits are typed
    let mut code_spans = vec![Span::raw("   ")];
    for i in 0..6 {
        let slot = snapshot
            .code
            .chars()
            .nth(i)
            .map(|c| format!(" {} ", c))
            .unwrap_or_else(|| " _ ".to_string());
        code_spans.push(Span::styled(slot, styles::field_style()));
        if i == 2 {
            code_spans.push(Span::styled(" - ", styles::muted_style()));
        }
    }

    let resend_line = if snapshot.send_in_flight {
        Line::from(Span::styled("  Sending ...", styles::muted_style()))
    } else if snapshot.cooldown_remaining > 0 {
        Line::from(Span::styled(
            format!("  Resend available in {}s", snapshot.cooldown_remaining),
            styles::muted_style(),
        ))
    } else {
        Line::from(vec![
            Span::styled("  r", styles::help_key_style()),
            Span::styled(" resend the code", styles::muted_style()),
        ])
    };

    let state_line = if snapshot.phase == OtpPhase::Verifying {
        Line::from(Span::styled("  Verifying ...", styles::muted_style()))
    } else {
        Line::from(vec![
            Span::styled("  Enter", styles::help_key_style()),
            Span::styled(" verify  ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" back", styles::muted_style()),
        ])
    };

    let lines = vec![
        Line::from(Span::styled("  Check your inbox", styles::title_style())),
        Line::from(Span::styled(
            format!("  A 6-digit code was sent to {}.", snapshot.email),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(code_spans),
        Line::from(""),
        resend_line,
        Line::from(""),
        state_line,
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

fn render_home(frame: &mut Frame, app: &App, area: Rect) {
    // Identity can be momentarily absent here; the view degrades gracefully
    let greeting = match app.auth.identity() {
        Some(identity) => format!("  Welcome back, {}!", identity.display_name()),
        None => "  Welcome back!".to_string(),
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(greeting, styles::title_style())),
        Line::from(""),
    ];

    if let Some(identity) = app.auth.identity() {
        lines.push(Line::from(vec![
            Span::styled("  Signed in as ", styles::muted_style()),
            Span::styled(identity.email.clone(), styles::field_style()),
            Span::styled(format!("  ({})", identity.role), styles::muted_style()),
        ]));
        lines.push(Line::from(""));
    }

    lines.extend([
        Line::from(vec![
            Span::styled("  p  ", styles::help_key_style()),
            Span::styled("Profile", styles::help_desc_style()),
        ]),
        Line::from(vec![
            Span::styled("  o  ", styles::help_key_style()),
            Span::styled("Sign out", styles::help_desc_style()),
        ]),
        Line::from(vec![
            Span::styled("  q  ", styles::help_key_style()),
            Span::styled("Quit", styles::help_desc_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_profile(frame: &mut Frame, app: &App, area: Rect) {
    match app.profile_mode {
        ProfileMode::View => render_profile_view(frame, app, area),
        ProfileMode::EditProfile => render_profile_edit(frame, app, area),
        ProfileMode::ChangePassword => render_password_change(frame, app, area),
    }
}

fn render_profile_view(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];

    match app.auth.identity() {
        Some(identity) => {
            let detail = |label: &str, value: String| {
                Line::from(vec![
                    Span::styled(format!("  {:<12}", label), styles::muted_style()),
                    Span::styled(value, styles::field_style()),
                ])
            };
            lines.push(detail("Name", identity.display_name()));
            lines.push(detail("Email", identity.email.clone()));
            lines.push(detail("Role", identity.role.clone()));
            if let Some(campus) = &identity.campus {
                lines.push(detail("Campus", campus.clone()));
            }
            if let Some(expertise) = &identity.expertise {
                lines.push(detail("Expertise", expertise.clone()));
            }
            lines.push(detail("Status", identity.status.label().to_string()));
            if let Some(bio) = &identity.bio {
                lines.push(detail("Bio", bio.clone()));
            }
            if let Some(expires_at) = app.auth.credential().and_then(|c| c.expires_at) {
                lines.push(detail(
                    "Session",
                    format!("expires {}", expires_at.format("%H:%M UTC")),
                ));
            }
        }
        None => {
            lines.push(Line::from(Span::styled(
                "  Profile not loaded yet.",
                styles::muted_style(),
            )));
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  e", styles::help_key_style()),
        Span::styled(" edit  ", styles::muted_style()),
        Span::styled("w", styles::help_key_style()),
        Span::styled(" change password  ", styles::muted_style()),
        Span::styled("Esc", styles::help_key_style()),
        Span::styled(" back", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_profile_edit(frame: &mut Frame, app: &App, area: Rect) {
    let dialog = centered_rect_fixed(56, 12, area);
    frame.render_widget(Clear, dialog);

    let lines = vec![
        Line::from(Span::styled("  Edit profile", styles::title_style())),
        Line::from(""),
        field_line(
            "First name",
            &app.edit_first_name,
            app.edit_focus == EditFocus::FirstName,
            false,
        ),
        field_line(
            "Last name ",
            &app.edit_last_name,
            app.edit_focus == EditFocus::LastName,
            false,
        ),
        field_line(
            "Expertise ",
            &app.edit_expertise,
            app.edit_focus == EditFocus::Expertise,
            false,
        ),
        field_line("Bio       ", &app.edit_bio, app.edit_focus == EditFocus::Bio, false),
        Line::from(""),
        button_line("[ Save ]", app.edit_focus == EditFocus::Save),
        progress_or_hints(app.profile_in_flight),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

fn render_password_change(frame: &mut Frame, app: &App, area: Rect) {
    let dialog = centered_rect_fixed(56, 11, area);
    frame.render_widget(Clear, dialog);

    let lines = vec![
        Line::from(Span::styled("  Change password", styles::title_style())),
        Line::from(""),
        field_line(
            "Current    ",
            &app.current_password,
            app.password_focus == PasswordFocus::Current,
            true,
        ),
        field_line(
            "New        ",
            &app.new_password,
            app.password_focus == PasswordFocus::New,
            true,
        ),
        field_line(
            "Confirm new",
            &app.confirm_password,
            app.password_focus == PasswordFocus::Confirm,
            true,
        ),
        Line::from(""),
        button_line("[ Save ]", app.password_focus == PasswordFocus::Save),
        progress_or_hints(app.profile_in_flight),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (left_text, left_style) = match &app.notice {
        Some(notice) => (
            format!(" {}: {} ", notice.title, notice.message),
            styles::notice_style(notice.severity),
        ),
        None => (String::from(" Ready "), styles::muted_style()),
    };

    let right_text = " Studyhall ";
    let width = area.width as usize;
    let padding = width
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

// ============================================================================
// Helpers
// ============================================================================

fn field_line(label: &str, value: &str, focused: bool, masked: bool) -> Line<'static> {
    let shown = if masked {
        "\u{2022}".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let cursor = if focused { "\u{258c}" } else { "" };
    let value_style = if focused {
        styles::selected_style()
    } else {
        styles::field_style()
    };

    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{}: [", label), styles::muted_style()),
        Span::styled(format!("{}{}", shown, cursor), value_style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn button_line(label: &str, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::highlight_style()
    };
    Line::from(vec![Span::raw("  "), Span::styled(label.to_string(), style)])
}

fn progress_or_hints(in_flight: bool) -> Line<'static> {
    if in_flight {
        Line::from(Span::styled("  Saving ...", styles::muted_style()))
    } else {
        Line::from(vec![
            Span::styled("  Tab", styles::help_key_style()),
            Span::styled(" next  ", styles::muted_style()),
            Span::styled("Enter", styles::help_key_style()),
            Span::styled(" save  ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" cancel", styles::muted_style()),
        ])
    }
}

/// Fixed-size rectangle centered in the given area, clamped to fit
fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
