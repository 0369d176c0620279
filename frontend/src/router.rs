use std::sync::{Mutex, PoisonError};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::state::permissions::Role;

pub const LOGIN_ROUTE: &str = "/auth/login";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// A navigable route and the roles allowed to open it. An empty role list
/// admits any authenticated user.
#[derive(Debug, Clone, Copy)]
pub struct RouteDef {
    pub path: &'static str,
    pub requires_auth: bool,
    pub roles: &'static [Role],
}

pub const ROUTES: &[RouteDef] = &[
    RouteDef {
        path: LOGIN_ROUTE,
        requires_auth: false,
        roles: &[],
    },
    RouteDef {
        path: "/auth/register",
        requires_auth: false,
        roles: &[],
    },
    RouteDef {
        path: DASHBOARD_ROUTE,
        requires_auth: true,
        roles: &[],
    },
    RouteDef {
        path: "/policies",
        requires_auth: true,
        roles: &[],
    },
    RouteDef {
        path: "/claims",
        requires_auth: true,
        roles: &[],
    },
    RouteDef {
        path: "/admin/policies",
        requires_auth: true,
        roles: &[Role::Admin, Role::SuperAdmin],
    },
    RouteDef {
        path: "/admin/claims",
        requires_auth: true,
        roles: &[Role::Admin, Role::SuperAdmin],
    },
    RouteDef {
        path: "/admin/users",
        requires_auth: true,
        roles: &[Role::SuperAdmin],
    },
];

pub fn find_route(url: &str) -> Option<&'static RouteDef> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    ROUTES
        .iter()
        .filter(|route| path == route.path || path.starts_with(&format!("{}/", route.path)))
        .max_by_key(|route| route.path.len())
}

const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?');

/// `/auth/login?returnUrl=<attempted url>`, keeping query and fragment of
/// the attempted url intact once decoded.
pub fn login_redirect(login_route: &str, return_url: &str) -> String {
    format!(
        "{}?returnUrl={}",
        login_route,
        utf8_percent_encode(return_url, QUERY_VALUE)
    )
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Tracks the current url and the navigation history.
#[derive(Debug, Default)]
pub struct InMemoryNavigator {
    history: Mutex<Vec<String>>,
}

impl InMemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for InMemoryNavigator {
    fn navigate(&self, url: &str) {
        tracing::debug!(url, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}
