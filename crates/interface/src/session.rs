use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub role: Option<String>,
}

/// 외부 세션 스토어 상태의 읽기 전용 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub user: Option<SessionUser>,
    pub has_seen_onboarding: bool,
    pub is_initializing: bool,
}

impl SessionSnapshot {
    /// 초기화 중인 스냅샷 (스토어가 아직 복원 중)
    pub fn initializing() -> Self {
        Self {
            is_initializing: true,
            ..Default::default()
        }
    }

    /// 비어있지 않은 role 이 있으면 반환
    pub fn role(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.role.as_deref())
            .filter(|r| !r.is_empty())
    }

    /// 우선순위: role 있음 → Dashboard, 온보딩 미확인 → Onboarding, 그 외 → Login
    pub fn routing_decision(&self) -> RoutingDecision {
        if self.role().is_some() {
            RoutingDecision::Dashboard
        } else if !self.has_seen_onboarding {
            RoutingDecision::Onboarding
        } else {
            RoutingDecision::Login
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingDecision {
    Dashboard,
    Onboarding,
    Login,
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutingDecision::Dashboard => "dashboard",
            RoutingDecision::Onboarding => "onboarding",
            RoutingDecision::Login => "login",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_role(role: Option<&str>, seen: bool) -> SessionSnapshot {
        SessionSnapshot {
            is_authenticated: role.is_some(),
            user: Some(SessionUser {
                role: role.map(str::to_string),
            }),
            has_seen_onboarding: seen,
            is_initializing: false,
        }
    }

    #[test]
    fn test_role_takes_priority_over_onboarding() {
        assert_eq!(
            with_role(Some("seller"), false).routing_decision(),
            RoutingDecision::Dashboard
        );
    }

    #[test]
    fn test_no_role_routes_by_onboarding_flag() {
        assert_eq!(
            with_role(None, false).routing_decision(),
            RoutingDecision::Onboarding
        );
        assert_eq!(
            with_role(None, true).routing_decision(),
            RoutingDecision::Login
        );
    }

    #[test]
    fn test_empty_role_counts_as_absent() {
        assert_eq!(
            with_role(Some(""), true).routing_decision(),
            RoutingDecision::Login
        );
    }

    #[test]
    fn test_snapshot_uses_camel_case_on_the_wire() {
        let snapshot: SessionSnapshot = serde_json::from_str(
            r#"{"isAuthenticated":true,"user":{"role":"buyer"},"hasSeenOnboarding":true,"isInitializing":false}"#,
        )
        .unwrap();
        assert_eq!(snapshot.role(), Some("buyer"));
        assert!(!snapshot.is_initializing);
    }
}
