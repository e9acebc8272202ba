//! Single-principal gating, replacing a multi-user allowlist.
//!
//! With no `user_id`/`username` configured, the bridge runs in ID-discovery
//! mode: it answers every incoming message with the caller's own identifiers
//! instead of ever reaching the Turn Engine, so the operator can copy the
//! numeric id into config and restart.

use skynet_core::config::PrincipalConfig;

/// Outcome of checking an incoming sender against the configured principal.
pub enum Gate {
    /// Sender matches the configured principal; proceed normally.
    Allowed,
    /// No principal is configured yet; reply with discovery info and stop.
    Discover { reply: String },
    /// A principal is configured and this sender isn't it; stay silent.
    Denied,
}

pub fn check(principal: &PrincipalConfig, user_id: i64, username: Option<&str>) -> Gate {
    if !principal.is_configured() {
        let who = match username {
            Some(u) if !u.is_empty() => format!("@{u} (id {user_id})"),
            _ => format!("id {user_id}"),
        };
        return Gate::Discover {
            reply: format!(
                "No principal configured yet. You are {who}.\n\n\
                 Set `principal.user_id = {user_id}` in bridge.toml and restart to finish setup."
            ),
        };
    }

    if let Some(configured_id) = principal.user_id {
        if configured_id == user_id {
            return Gate::Allowed;
        }
        return Gate::Denied;
    }

    if let Some(configured_username) = &principal.username {
        if username.map(|u| u.eq_ignore_ascii_case(configured_username)).unwrap_or(false) {
            return Gate::Allowed;
        }
    }

    Gate::Denied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> PrincipalConfig {
        PrincipalConfig { user_id: None, username: None }
    }

    #[test]
    fn discover_mode_when_unconfigured() {
        assert!(matches!(check(&unconfigured(), 42, Some("alice")), Gate::Discover { .. }));
    }

    #[test]
    fn user_id_match_allows() {
        let p = PrincipalConfig { user_id: Some(42), username: None };
        assert!(matches!(check(&p, 42, None), Gate::Allowed));
        assert!(matches!(check(&p, 99, None), Gate::Denied));
    }

    #[test]
    fn user_id_takes_priority_over_username() {
        let p = PrincipalConfig { user_id: Some(42), username: Some("bob".to_string()) };
        // Even with a matching username, a mismatched id is denied — id wins.
        assert!(matches!(check(&p, 99, Some("bob")), Gate::Denied));
    }

    #[test]
    fn username_match_is_case_insensitive() {
        let p = PrincipalConfig { user_id: None, username: Some("Alice".to_string()) };
        assert!(matches!(check(&p, 1, Some("alice")), Gate::Allowed));
        assert!(matches!(check(&p, 1, Some("bob")), Gate::Denied));
    }
}
