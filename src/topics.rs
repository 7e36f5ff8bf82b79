//! Topic layout.
//!
//! ```text
//! {prefix}/$version | $lines | $logins | last_update
//! {prefix}/login/{login}/{metric topic}
//! {discovery_prefix}/sensor/{sanitized login}/{metric name}/config
//! ```

/// Topic for one of the bridge-wide index values.
pub fn index_topic(prefix: &str, leaf: &str) -> String {
    format!("{prefix}/{leaf}")
}

pub fn state_topic(prefix: &str, login: &str, metric_topic: &str) -> String {
    format!("{prefix}/login/{login}/{metric_topic}")
}

pub fn discovery_topic(discovery_prefix: &str, login: &str, metric_name: &str) -> String {
    format!(
        "{discovery_prefix}/sensor/{}/{metric_name}/config",
        sanitize_login(login)
    )
}

/// Logins look like `ab12@a.1`; Home Assistant object ids may not
/// contain `@` or `.`.
pub fn sanitize_login(login: &str) -> String {
    login.replace(['@', '.'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_topic() {
        assert_eq!(index_topic("aaisp", "$version"), "aaisp/$version");
        assert_eq!(index_topic("home/isp", "last_update"), "home/isp/last_update");
    }

    #[test]
    fn test_state_topic() {
        assert_eq!(
            state_topic("aaisp", "ab12@a.1", "quota/remaining/gb"),
            "aaisp/login/ab12@a.1/quota/remaining/gb"
        );
    }

    #[test]
    fn test_discovery_topic_sanitizes_login() {
        assert_eq!(
            discovery_topic("homeassistant", "ab12@a.1", "quota_remaining"),
            "homeassistant/sensor/ab12_a_1/quota_remaining/config"
        );
    }

    #[test]
    fn test_sanitize_login() {
        assert_eq!(sanitize_login("ab12@a.1"), "ab12_a_1");
        assert_eq!(sanitize_login("plain"), "plain");
        assert_eq!(sanitize_login("a.b.c@d@e"), "a_b_c_d_e");
    }
}
