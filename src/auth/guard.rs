use crate::auth::service::AuthSnapshot;
use crate::config::RoutesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGuard {
    /// Only for logged-in users; everyone else goes to the login page.
    Protected,
    /// Only for visitors; logged-in users go to the landing area.
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    Render,
    Redirect(String),
}

impl RouteGuard {
    pub fn evaluate(self, snapshot: &AuthSnapshot, routes: &RoutesConfig) -> GuardDecision {
        if snapshot.loading {
            return GuardDecision::Loading;
        }

        match (self, snapshot.is_authenticated()) {
            (RouteGuard::Protected, false) => GuardDecision::Redirect(routes.login.clone()),
            (RouteGuard::Public, true) => GuardDecision::Redirect(routes.home.clone()),
            _ => GuardDecision::Render,
        }
    }
}
