//! Routing state machine.
//!
//! Pure and stateless: maps a risk category plus the hard-block flag onto
//! one of five terminal routes, honoring the raw-forwarding and
//! critical-local-only policy switches fixed at startup.

use serde::Serialize;

use crate::risk::Category;

/// Terminal disposition of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    RawForward,
    SanitizedForward,
    HighAbstraction,
    CriticalLocalOnly,
    CriticalBlocked,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::RawForward => "raw_forward",
            Route::SanitizedForward => "sanitized_forward",
            Route::HighAbstraction => "high_abstraction",
            Route::CriticalLocalOnly => "critical_local_only",
            Route::CriticalBlocked => "critical_blocked",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a routing decision. `egress` is false exactly for the two
/// critical routes: no request content leaves the process boundary.
#[derive(Debug, Clone, Copy)]
pub struct RouteDecision {
    pub category: Category,
    pub route: Route,
    pub egress: bool,
}

/// Routing engine with policy switches fixed at construction.
pub struct RouteEngine {
    allow_raw_forwarding: bool,
    critical_local_only: bool,
}

impl RouteEngine {
    pub fn new(allow_raw_forwarding: bool, critical_local_only: bool) -> Self {
        Self {
            allow_raw_forwarding,
            critical_local_only,
        }
    }

    pub fn decide(&self, category: Category, has_hard_block: bool) -> RouteDecision {
        match category {
            Category::Low => {
                if self.allow_raw_forwarding && !has_hard_block {
                    RouteDecision {
                        category,
                        route: Route::RawForward,
                        egress: true,
                    }
                } else {
                    RouteDecision {
                        category,
                        route: Route::SanitizedForward,
                        egress: true,
                    }
                }
            }
            Category::Medium => RouteDecision {
                category,
                route: Route::SanitizedForward,
                egress: true,
            },
            Category::High => RouteDecision {
                category,
                route: Route::HighAbstraction,
                egress: true,
            },
            Category::Critical => {
                if self.critical_local_only {
                    RouteDecision {
                        category,
                        route: Route::CriticalLocalOnly,
                        egress: false,
                    }
                } else {
                    RouteDecision {
                        category,
                        route: Route::CriticalBlocked,
                        egress: false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_with_raw_allowed_forwards_raw() {
        let engine = RouteEngine::new(true, false);
        let decision = engine.decide(Category::Low, false);
        assert_eq!(decision.route, Route::RawForward);
        assert!(decision.egress);
    }

    #[test]
    fn low_with_hard_block_never_forwards_raw() {
        let engine = RouteEngine::new(true, false);
        let decision = engine.decide(Category::Low, true);
        assert_eq!(decision.route, Route::SanitizedForward);
        assert!(decision.egress);
    }

    #[test]
    fn low_without_raw_allowed_forwards_sanitized() {
        let engine = RouteEngine::new(false, false);
        let decision = engine.decide(Category::Low, false);
        assert_eq!(decision.route, Route::SanitizedForward);
    }

    #[test]
    fn medium_always_forwards_sanitized() {
        for allow_raw in [false, true] {
            let engine = RouteEngine::new(allow_raw, false);
            let decision = engine.decide(Category::Medium, false);
            assert_eq!(decision.route, Route::SanitizedForward);
            assert!(decision.egress);
        }
    }

    #[test]
    fn high_goes_to_abstraction() {
        let engine = RouteEngine::new(false, false);
        let decision = engine.decide(Category::High, false);
        assert_eq!(decision.route, Route::HighAbstraction);
        assert!(decision.egress);
    }

    #[test]
    fn critical_blocks_by_default() {
        let engine = RouteEngine::new(false, false);
        let decision = engine.decide(Category::Critical, true);
        assert_eq!(decision.route, Route::CriticalBlocked);
        assert!(!decision.egress);
    }

    #[test]
    fn critical_local_only_when_enabled() {
        let engine = RouteEngine::new(false, true);
        let decision = engine.decide(Category::Critical, true);
        assert_eq!(decision.route, Route::CriticalLocalOnly);
        assert!(!decision.egress);
    }

    #[test]
    fn egress_false_only_for_critical_routes() {
        let engine = RouteEngine::new(true, false);
        for (category, expected) in [
            (Category::Low, true),
            (Category::Medium, true),
            (Category::High, true),
            (Category::Critical, false),
        ] {
            assert_eq!(engine.decide(category, false).egress, expected);
        }
    }

    #[test]
    fn route_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Route::CriticalLocalOnly).unwrap(),
            "\"critical_local_only\""
        );
        assert_eq!(Route::HighAbstraction.to_string(), "high_abstraction");
    }
}
