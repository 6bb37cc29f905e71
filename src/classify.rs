use std::collections::BTreeMap;

pub const UNKNOWN: &str = "不明";
pub const OTHER: &str = "その他";

/// Route prefixes in priority order. A longer prefix must precede any shorter
/// one it extends.
const ROUTE_PREFIXES: &[(&str, &str)] = &[
    ("さきAI_YTチャンネルプロフ", "さきAI_YTプロフ"),
    ("さきAI_YTQR", "さきAI_YT(QR)"),
    ("さきAI_YT", "さきAI_YT(動画)"),
    ("さきAI業務効率化", "さきAI業務効率化"),
    ("たくむAIインスタ", "たくむAIインスタ"),
    ("たくむAI業務効率化", "たくむAI業務効率化"),
    ("たくむビジ系インスタ", "たくむビジ系インスタ"),
    ("ビジたくインスタ", "たくむビジ系インスタ"),
    ("たくむビジ系ハウス", "たくむビジ系ハウス"),
    ("たくむYT", "たくむYT"),
    ("みさをインスタ", "みさをインスタ"),
    ("みさをハウス", "みさをハウス"),
    ("えむ", "えむ"),
    ("lp01_Meta", "Meta広告(LP01)"),
    ("lp02_Meta", "Meta広告(LP02)"),
];

/// Channel fragments matched against an already classified route.
const CHANNEL_FRAGMENTS: &[(&str, &str)] = &[
    ("さきAI_YT", "さきAI YouTube系"),
    ("さきAI業務効率化", "さきAI その他"),
    ("たくむ", "たくむ系"),
    ("みさを", "みさを系"),
    ("えむ", "えむ系"),
    ("Meta", "Meta広告系"),
];

pub fn categorize_route(raw: Option<&str>) -> &'static str {
    let value = match raw.map(str::trim) {
        None | Some("") => return UNKNOWN,
        Some(value) => value,
    };
    if value == UNKNOWN {
        return UNKNOWN;
    }

    ROUTE_PREFIXES
        .iter()
        .find(|(prefix, _)| value.starts_with(prefix))
        .map(|(_, category)| *category)
        .unwrap_or(OTHER)
}

pub fn channel_category(route: &str) -> &'static str {
    if let Some((_, channel)) = CHANNEL_FRAGMENTS
        .iter()
        .find(|(fragment, _)| route.contains(fragment))
    {
        return *channel;
    }
    if route == UNKNOWN {
        UNKNOWN
    } else {
        OTHER
    }
}

pub fn has_label(value: Option<&str>, labels: &[String]) -> bool {
    value
        .map(str::trim)
        .is_some_and(|value| labels.iter().any(|label| label == value))
}

/// Short display label for a willingness answer; unknown answers pass through.
pub fn shorten_willingness(value: &str, labels: &BTreeMap<String, String>) -> String {
    labels
        .get(value)
        .cloned()
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_prefix_beats_generic_one() {
        assert_eq!(categorize_route(Some("さきAI_YTQR_001")), "さきAI_YT(QR)");
        assert_eq!(
            categorize_route(Some("さきAI_YTチャンネルプロフ_A")),
            "さきAI_YTプロフ"
        );
        assert_eq!(categorize_route(Some("さきAI_YT_0123")), "さきAI_YT(動画)");
    }

    #[test]
    fn alias_prefix_shares_category() {
        assert_eq!(
            categorize_route(Some("ビジたくインスタ_story")),
            "たくむビジ系インスタ"
        );
        assert_eq!(
            categorize_route(Some("たくむビジ系インスタ_bio")),
            "たくむビジ系インスタ"
        );
    }

    #[test]
    fn missing_and_unmatched_routes() {
        assert_eq!(categorize_route(None), UNKNOWN);
        assert_eq!(categorize_route(Some("  ")), UNKNOWN);
        assert_eq!(categorize_route(Some("不明")), UNKNOWN);
        assert_eq!(categorize_route(Some("紹介")), OTHER);
        assert_eq!(categorize_route(Some("lp03_Meta")), OTHER);
    }

    #[test]
    fn route_classification_is_deterministic() {
        let input = Some("lp02_Meta_carousel");
        assert_eq!(categorize_route(input), categorize_route(input));
        assert_eq!(categorize_route(input), "Meta広告(LP02)");
    }

    #[test]
    fn channels_follow_route_categories() {
        assert_eq!(channel_category("さきAI_YT(QR)"), "さきAI YouTube系");
        assert_eq!(channel_category("さきAI業務効率化"), "さきAI その他");
        assert_eq!(channel_category("たくむAI業務効率化"), "たくむ系");
        assert_eq!(channel_category("みさをハウス"), "みさを系");
        assert_eq!(channel_category("えむ"), "えむ系");
        assert_eq!(channel_category("Meta広告(LP01)"), "Meta広告系");
        assert_eq!(channel_category(UNKNOWN), UNKNOWN);
        assert_eq!(channel_category(OTHER), OTHER);
    }

    #[test]
    fn label_membership_trims_and_rejects_missing() {
        let labels = vec!["成約".to_string(), "GH成約（クロスセル/99万）".to_string()];
        assert!(has_label(Some("成約 "), &labels));
        assert!(has_label(Some("GH成約（クロスセル/99万）"), &labels));
        assert!(!has_label(Some("失注"), &labels));
        assert!(!has_label(None, &labels));
    }

    #[test]
    fn willingness_short_labels() {
        let mut labels = BTreeMap::new();
        labels.insert("入会を前向きに検討している".to_string(), "前向き検討".to_string());
        assert_eq!(
            shorten_willingness("入会を前向きに検討している", &labels),
            "前向き検討"
        );
        assert_eq!(shorten_willingness("未回答", &labels), "未回答");
    }
}
