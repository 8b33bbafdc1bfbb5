use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};

/// Which dispatch table keys go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    HostNav,
    LogScroll,
    FullScreen,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    FocusPrevVisible,
    FocusNextVisible,
    FocusPrev,
    FocusNext,
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollPageUp,
    ScrollPageDown,
    ScrollTop,
    ScrollBottom,
    EnterFullScreen,
    ExitFullScreen,
    LeaveLogScroll,
    OpenMenu,
    CloseMenu,
    MenuPrev,
    MenuNext,
    MenuSelect,
    MenuJump(usize),
    ToggleMinimized,
    None,
}

pub fn handle_event(event: &Event, mode: NavMode) -> Action {
    match event {
        Event::Key(key) => handle_key(key, mode),
        _ => Action::None,
    }
}

fn handle_key(key: &KeyEvent, mode: NavMode) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }
    // Global keys apply in every mode.
    match key.code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('h') => return Action::ToggleHelp,
        _ => {}
    }

    match mode {
        NavMode::HostNav => handle_host_nav_key(key),
        NavMode::LogScroll => handle_log_scroll_key(key),
        NavMode::FullScreen => handle_full_screen_key(key),
        NavMode::Menu => handle_menu_key(key),
    }
}

fn handle_host_nav_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Up => Action::FocusPrevVisible,
        KeyCode::Down => Action::FocusNextVisible,
        KeyCode::Left => Action::FocusPrev,
        KeyCode::Right => Action::FocusNext,
        KeyCode::Enter => Action::EnterFullScreen,
        KeyCode::Tab => Action::OpenMenu,
        KeyCode::Char('m') => Action::ToggleMinimized,
        // Paging the focused tile drops into log-scroll mode.
        KeyCode::PageUp => Action::ScrollPageUp,
        KeyCode::PageDown => Action::ScrollPageDown,
        _ => Action::None,
    }
}

fn handle_log_scroll_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Up => Action::ScrollUp(1),
        KeyCode::Down => Action::ScrollDown(1),
        KeyCode::PageUp => Action::ScrollPageUp,
        KeyCode::PageDown => Action::ScrollPageDown,
        KeyCode::Home => Action::ScrollTop,
        KeyCode::End => Action::ScrollBottom,
        KeyCode::Esc => Action::LeaveLogScroll,
        _ => Action::None,
    }
}

fn handle_full_screen_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::PageUp => Action::ScrollPageUp,
        KeyCode::PageDown => Action::ScrollPageDown,
        KeyCode::Home => Action::ScrollTop,
        KeyCode::End => Action::ScrollBottom,
        KeyCode::Enter | KeyCode::Esc => Action::ExitFullScreen,
        _ => Action::None,
    }
}

fn handle_menu_key(key: &KeyEvent) -> Action {
    match key.code {
        KeyCode::Up => Action::MenuPrev,
        KeyCode::Down => Action::MenuNext,
        KeyCode::Enter => Action::MenuSelect,
        KeyCode::Esc => Action::CloseMenu,
        KeyCode::Char(c @ '1'..='9') => Action::MenuJump((c as usize) - ('1' as usize)),
        _ => Action::None,
    }
}
