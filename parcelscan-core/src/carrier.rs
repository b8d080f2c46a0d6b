//! Carrier classification from tracking-code patterns
//!
//! Classification is pure and independent of any scan session, so the same
//! rules serve both scanned and manually typed codes.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[cfg(feature = "logging")]
use tracing::debug;

/// Placeholder substituted with the normalized code in tracking URL templates
const CODE_PLACEHOLDER: &str = "{code}";

/// Display and lookup data for one carrier
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CarrierDescriptor {
    /// Human-readable carrier name
    pub name: &'static str,

    /// Stable short code
    pub code: &'static str,

    /// Display color as `#rrggbb`
    pub color: &'static str,

    /// Tracking-site URL with a `{code}` placeholder
    pub track_url_template: Option<&'static str>,

    /// Carrier logo
    pub logo_url: Option<&'static str>,
}

impl CarrierDescriptor {
    /// Tracking-site URL for `tracking_code`, if the carrier has one
    pub fn track_url(&self, tracking_code: &str) -> Option<String> {
        self.track_url_template
            .map(|template| template.replace(CODE_PLACEHOLDER, tracking_code))
    }

    /// Emoji shown when no logo is available
    pub fn icon(&self) -> &'static str {
        match self.code {
            "fedex" => "🚚",
            "usps" => "✉️",
            "unknown" => "❓",
            _ => "📦",
        }
    }

    /// Display color as an RGB triple
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = self.color.trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .unwrap_or(0x80)
        };
        (channel(0), channel(2), channel(4))
    }

    /// True for the canonical unknown descriptor
    pub fn is_unknown(&self) -> bool {
        std::ptr::eq(self, &UNKNOWN)
    }
}

/// UPS
pub static UPS: CarrierDescriptor = CarrierDescriptor {
    name: "UPS",
    code: "ups",
    color: "#351c15",
    track_url_template: Some("https://www.ups.com/track?tracknum={code}"),
    logo_url: Some("https://logo.clearbit.com/ups.com"),
};

/// FedEx
pub static FEDEX: CarrierDescriptor = CarrierDescriptor {
    name: "FedEx",
    code: "fedex",
    color: "#4d148c",
    track_url_template: Some("https://www.fedex.com/fedextrack/?trknbr={code}"),
    logo_url: Some("https://logo.clearbit.com/fedex.com"),
};

/// United States Postal Service
pub static USPS: CarrierDescriptor = CarrierDescriptor {
    name: "USPS",
    code: "usps",
    color: "#333366",
    track_url_template: Some("https://tools.usps.com/go/TrackConfirmAction?tLabels={code}"),
    logo_url: Some("https://logo.clearbit.com/usps.com"),
};

/// Amazon Logistics
pub static AMAZON: CarrierDescriptor = CarrierDescriptor {
    name: "Amazon Logistics",
    code: "amazon",
    color: "#ff9900",
    track_url_template: Some("https://track.amazon.com/tracking/{code}"),
    logo_url: Some("https://logo.clearbit.com/amazon.com"),
};

/// Returned when no rule matches
pub static UNKNOWN: CarrierDescriptor = CarrierDescriptor {
    name: "Unknown",
    code: "unknown",
    color: "#6b7280",
    track_url_template: None,
    logo_url: None,
};

/// One classification rule
pub struct CarrierRule {
    /// Stable rule name, reported in [`CarrierMatch::rule`]
    pub name: &'static str,

    /// Carrier assigned on match
    pub carrier: &'static CarrierDescriptor,

    pattern: &'static str,
}

impl CarrierRule {
    const fn new(name: &'static str, pattern: &'static str, carrier: &'static CarrierDescriptor) -> Self {
        Self {
            name,
            carrier,
            pattern,
        }
    }

    /// Anchored pattern matched against the normalized code
    pub fn pattern(&self) -> &'static str {
        self.pattern
    }
}

/// Rules in evaluation order; the first match wins
///
/// `usps-certified` is fully shadowed by `usps-20` and never fires.
pub static RULES: [CarrierRule; 8] = [
    CarrierRule::new("ups-1z", r"^1Z[A-Z0-9]{16}$", &UPS),
    CarrierRule::new("fedex-12", r"^[0-9]{12}$", &FEDEX),
    CarrierRule::new("fedex-15", r"^[0-9]{15}$", &FEDEX),
    CarrierRule::new("usps-20", r"^[0-9]{20}$", &USPS),
    CarrierRule::new("usps-22", r"^(94|93|92|95)[0-9]{20}$", &USPS),
    CarrierRule::new("usps-express", r"^(9407|9303|9270)[0-9]{17}$", &USPS),
    CarrierRule::new("usps-certified", r"^9407[0-9]{16}$", &USPS),
    CarrierRule::new("amazon-tba", r"^TBA[0-9]{12}$", &AMAZON),
];

static COMPILED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|rule| Regex::new(rule.pattern).expect("carrier rule patterns are valid"))
        .collect()
});

/// Result of classifying a tracking code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarrierMatch {
    /// Whitespace-stripped, upper-cased code
    pub tracking_code: String,

    /// Matched carrier, or [`UNKNOWN`]
    pub carrier: &'static CarrierDescriptor,

    /// Name of the rule that fired
    pub rule: Option<&'static str>,

    /// Resolved tracking-site URL
    pub track_url: Option<String>,
}

/// Strip all whitespace and upper-case
pub fn normalize(tracking_code: &str) -> String {
    tracking_code
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Carrier for a tracking code
pub fn classify(tracking_code: &str) -> &'static CarrierDescriptor {
    detect(tracking_code).carrier
}

/// Classify a tracking code, keeping the normalized code, the rule that fired and the tracking URL
pub fn detect(tracking_code: &str) -> CarrierMatch {
    let normalized = normalize(tracking_code);

    let hit = if normalized.is_empty() {
        None
    } else {
        RULES
            .iter()
            .zip(COMPILED.iter())
            .find(|(_, re)| re.is_match(&normalized))
            .map(|(rule, _)| rule)
    };

    #[cfg(feature = "logging")]
    debug!(
        "Classified {:?} as {} (rule {:?})",
        normalized,
        hit.map_or(UNKNOWN.name, |r| r.carrier.name),
        hit.map(|r| r.name)
    );

    match hit {
        Some(rule) => CarrierMatch {
            track_url: rule.carrier.track_url(&normalized),
            carrier: rule.carrier,
            rule: Some(rule.name),
            tracking_code: normalized,
        },
        None => CarrierMatch {
            tracking_code: normalized,
            carrier: &UNKNOWN,
            rule: None,
            track_url: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ups_any_case_and_spacing() {
        assert_eq!(classify("1Z999AA10123456784"), &UPS);
        assert_eq!(classify("1z999aa10123456784"), &UPS);
        assert_eq!(classify(" 1Z 999 AA1 0123 456784 "), &UPS);
    }

    #[test]
    fn test_ups_requires_exact_length() {
        assert!(classify("1Z999AA1012345678").is_unknown());
        assert!(classify("1Z999AA101234567845").is_unknown());
    }

    #[test]
    fn test_fedex_lengths() {
        assert_eq!(classify("123456789012"), &FEDEX);
        assert_eq!(classify("123456789012345"), &FEDEX);
        assert!(classify("1234567890123").is_unknown());
    }

    #[test]
    fn test_usps_forms() {
        assert_eq!(classify("12345678901234567890"), &USPS);
        assert_eq!(classify("9400111899223100000000"), &USPS);
        assert_eq!(classify("9205500000000000000000"), &USPS);
        assert_eq!(classify("930312345678901234567"), &USPS);
        assert_eq!(classify("927012345678901234567"), &USPS);
        assert!(classify("9100111899223100000000").is_unknown());
        assert!(classify("912312345678901234567").is_unknown());
    }

    #[test]
    fn test_amazon() {
        let m = detect("tba123456789012");
        assert_eq!(m.carrier, &AMAZON);
        assert_eq!(m.tracking_code, "TBA123456789012");
        assert_eq!(
            m.track_url.as_deref(),
            Some("https://track.amazon.com/tracking/TBA123456789012")
        );
    }

    #[test]
    fn test_first_listed_rule_wins() {
        // 20 digits with the certified-mail prefix satisfies both usps-20 and usps-certified
        let m = detect("94071234567890123456");
        assert_eq!(m.carrier, &USPS);
        assert_eq!(m.rule, Some("usps-20"));
    }

    #[test]
    fn test_unknown_has_no_links() {
        let m = detect("HELLO-WORLD");
        assert!(m.carrier.is_unknown());
        assert_eq!(m.rule, None);
        assert_eq!(m.track_url, None);
        assert_eq!(m.carrier.logo_url, None);
        assert_eq!(m.carrier.track_url_template, None);
    }

    #[test]
    fn test_empty_is_unknown() {
        assert!(classify("").is_unknown());
        assert!(classify("   \t").is_unknown());
    }

    #[test]
    fn test_track_url_uses_normalized_code() {
        let m = detect("1z999aa1 0123456784");
        assert_eq!(
            m.track_url.as_deref(),
            Some("https://www.ups.com/track?tracknum=1Z999AA10123456784")
        );
    }

    #[test]
    fn test_descriptor_rgb_and_icon() {
        assert_eq!(AMAZON.rgb(), (0xff, 0x99, 0x00));
        assert_eq!(USPS.icon(), "✉️");
        assert_eq!(UPS.icon(), "📦");
        assert_eq!(UNKNOWN.icon(), "❓");
    }
}
