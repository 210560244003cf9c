//! Agent runtime section: who is reporting and in which locale.

use beacon_core::Section;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::producer::Collector;

/// Collects the `runtime` section.
#[derive(Debug, Clone)]
pub struct RuntimeCollector {
    user_agent: String,
}

impl RuntimeCollector {
    /// Creates a collector reporting the given user agent.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into() }
    }
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new(beacon_core::USER_AGENT)
    }
}

impl Collector for RuntimeCollector {
    fn name(&self) -> &str {
        "runtime"
    }

    fn collect(&self) -> BoxFuture<'_, Section> {
        Box::pin(async move {
            let env = |key: &str| std::env::var(key).ok();
            let language = ["LC_ALL", "LC_MESSAGES", "LANG"]
                .into_iter()
                .find_map(|key| env(key).and_then(|value| language_tag(&value)));
            let languages = languages(env("LANGUAGE").as_deref(), language.as_deref());

            Section::Available(json!({
                "userAgent": self.user_agent,
                "language": language,
                "languages": languages,
                "platform": std::env::consts::OS,
                "family": std::env::consts::FAMILY,
                "hardwareConcurrency": num_cpus::get(),
                "terminal": console::user_attended(),
                "pid": std::process::id(),
            }))
        })
    }
}

/// Converts a POSIX locale such as `en_US.UTF-8` into a language tag
/// (`en-US`).
///
/// Returns `None` for the `C` and `POSIX` locales, which carry no language.
pub fn language_tag(locale: &str) -> Option<String> {
    let name = locale.split(['.', '@']).next()?.trim();
    if name.is_empty() || name == "C" || name == "POSIX" {
        return None;
    }
    Some(name.replace('_', "-"))
}

/// Builds the preference list from `LANGUAGE` (colon separated), falling
/// back to the primary language.
pub fn languages(preference: Option<&str>, primary: Option<&str>) -> Value {
    let listed: Vec<String> =
        preference.unwrap_or_default().split(':').filter_map(language_tag).collect();

    if listed.is_empty() {
        return json!(primary.into_iter().collect::<Vec<_>>());
    }
    json!(listed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_locale_becomes_language_tag() {
        assert_eq!(language_tag("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(language_tag("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(language_tag("fr").as_deref(), Some("fr"));
    }

    #[test]
    fn neutral_locales_have_no_language() {
        assert_eq!(language_tag("C"), None);
        assert_eq!(language_tag("POSIX"), None);
        assert_eq!(language_tag("C.UTF-8"), None);
        assert_eq!(language_tag(""), None);
    }

    #[test]
    fn language_list_prefers_explicit_preferences() {
        assert_eq!(languages(Some("fr_CA:en_GB:C"), Some("en-US")), json!(["fr-CA", "en-GB"]));
        assert_eq!(languages(None, Some("en-US")), json!(["en-US"]));
        assert_eq!(languages(Some(""), None), json!([]));
    }

    #[tokio::test]
    async fn section_reports_user_agent() {
        let section = RuntimeCollector::new("beacon/test").collect().await;

        let data = section.data().unwrap();
        assert_eq!(data["userAgent"], "beacon/test");
        assert_eq!(data["platform"], std::env::consts::OS);
        assert!(data["hardwareConcurrency"].as_u64().unwrap() >= 1);
    }
}
