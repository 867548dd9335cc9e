//! crates/portal_core/src/router.rs
//!
//! Maps a location to a view, gated by the session state.

use crate::domain::AuthState;

pub const LOGIN_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Dashboard,
}

/// The tabs inside the dashboard view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    Overview,
    Courses,
    Exams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(View),
    Redirect(&'static str),
}

/// Resolves a single routing step for `path`.
pub fn resolve(path: &str, state: AuthState) -> Resolution {
    match (path, state) {
        (LOGIN_PATH, AuthState::Unauthenticated) => Resolution::Render(View::Login),
        (LOGIN_PATH, AuthState::Authenticated) => Resolution::Redirect(DASHBOARD_PATH),
        (DASHBOARD_PATH, AuthState::Authenticated) => Resolution::Render(View::Dashboard),
        (DASHBOARD_PATH, AuthState::Unauthenticated) => Resolution::Redirect(LOGIN_PATH),
        _ => Resolution::Redirect(LOGIN_PATH),
    }
}

/// Follows redirects until a view renders. Every path settles within two hops.
pub fn navigate(path: &str, state: AuthState) -> View {
    let mut current = path;
    loop {
        match resolve(current, state) {
            Resolution::Render(view) => return view,
            Resolution::Redirect(next) => current = next,
        }
    }
}
