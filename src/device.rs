//! Device fingerprint used to talk to the mobile app feed.
//!
//! The feed authorises callers by how plausible their app/device parameters
//! look, not by a token. Everything here only has to look like a real phone;
//! none of it needs cryptographic strength.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Numeric app id of the international app.
pub const APP_ID: &str = "1180";

/// App versions known to be accepted by the feed, newest first.
pub const APP_PROFILES: &[AppProfile] = &[
    AppProfile::new("26.1.3", "260103"),
    AppProfile::new("26.1.2", "260102"),
    AppProfile::new("26.1.1", "260101"),
    AppProfile::new("25.6.2", "256202"),
];

/// Range `device_id` values are drawn from.
pub const DEVICE_ID_RANGE: (u64, u64) = (7_250_000_000_000_000_000, 7_351_147_085_025_500_000);

/// Range `iid` (install id) values are drawn from.
pub const INSTALL_ID_RANGE: (u64, u64) = (7_250_000_000_000_000_000, 7_325_099_899_999_994_577);

/// One app release the feed can be asked to impersonate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppProfile {
    pub version_name: &'static str,
    pub version_code: &'static str,
}

impl AppProfile {
    pub const fn new(version_name: &'static str, version_code: &'static str) -> Self {
        Self {
            version_name,
            version_code,
        }
    }

    /// Android client user-agent matching this release.
    pub fn user_agent(&self) -> String {
        format!(
            "com.ss.android.ugc.trill/{} (Linux; U; Android 10; en_US; Pixel 4; Build/QQ3A.200805.001; Cronet/58.0.2991.0)",
            self.version_code
        )
    }
}

/// Per-request random identity. Built fresh for every feed attempt.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub openudid: String,
    pub uuid: String,
    pub device_id: String,
    pub install_id: String,
    pub requested_at: DateTime<Utc>,
}

impl DeviceIdentity {
    pub fn generate<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Self {
        Self {
            openudid: random_hex(rng, 16),
            uuid: random_digits(rng, 16),
            device_id: rng.gen_range(DEVICE_ID_RANGE.0..=DEVICE_ID_RANGE.1).to_string(),
            install_id: rng
                .gen_range(INSTALL_ID_RANGE.0..=INSTALL_ID_RANGE.1)
                .to_string(),
            requested_at: now,
        }
    }

    /// Every query parameter the feed expects for `profile` and `aweme_id`.
    pub fn feed_query(&self, profile: &AppProfile, aweme_id: &str) -> Vec<(String, String)> {
        let rticket = self.requested_at.timestamp_millis().to_string();
        let ts = self.requested_at.timestamp().to_string();

        let pairs = [
            ("aid", APP_ID),
            ("version_name", profile.version_name),
            ("version_code", profile.version_code),
            ("aweme_id", aweme_id),
            ("build_number", profile.version_name),
            ("manifest_version_code", profile.version_code),
            ("update_version_code", profile.version_code),
            ("openudid", self.openudid.as_str()),
            ("uuid", self.uuid.as_str()),
            ("device_id", self.device_id.as_str()),
            ("iid", self.install_id.as_str()),
            ("_rticket", rticket.as_str()),
            ("ts", ts.as_str()),
            ("device_brand", "Google"),
            ("device_type", "Pixel 4"),
            ("device_platform", "android"),
            ("resolution", "1080*1920"),
            ("dpi", "420"),
            ("os_version", "10"),
            ("os_api", "29"),
            ("carrier_region", "US"),
            ("sys_region", "US"),
            ("region", "US"),
            ("op_region", "US"),
            ("app_name", "trill"),
            ("app_type", "normal"),
            ("app_language", "en"),
            ("language", "en"),
            ("locale", "en"),
            ("timezone_name", "America/New_York"),
            ("timezone_offset", "-14400"),
            ("channel", "googleplay"),
            ("ac", "wifi"),
            ("mcc_mnc", "310260"),
            ("is_my_cn", "0"),
            ("ssmix", "a"),
            ("as", "a1qwert123"),
            ("cp", "cbfhckdckkde1"),
            ("host_abi", "arm64-v8a"),
            ("residence", "US"),
        ];

        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

/// `len` independently sampled lowercase hex digits.
pub fn random_hex<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
        .collect()
}

/// `len` independently sampled decimal digits.
pub fn random_digits<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..10), 10).unwrap_or('0'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{SeedableRng, rngs::StdRng};

    fn identity() -> DeviceIdentity {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        DeviceIdentity::generate(&mut rng, now)
    }

    #[test]
    fn identifiers_have_the_expected_shape() {
        let device = identity();
        assert_eq!(device.openudid.len(), 16);
        assert!(device.openudid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(device.uuid.len(), 16);
        assert!(device.uuid.chars().all(|c| c.is_ascii_digit()));

        let device_id: u64 = device.device_id.parse().unwrap();
        assert!((DEVICE_ID_RANGE.0..=DEVICE_ID_RANGE.1).contains(&device_id));
        let install_id: u64 = device.install_id.parse().unwrap();
        assert!((INSTALL_ID_RANGE.0..=INSTALL_ID_RANGE.1).contains(&install_id));
    }

    #[test]
    fn feed_query_carries_profile_and_timestamps() {
        let device = identity();
        let profile = APP_PROFILES[1];
        let query = device.feed_query(&profile, "123");
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("aweme_id"), "123");
        assert_eq!(get("version_code"), "260102");
        assert_eq!(get("manifest_version_code"), "260102");
        assert_eq!(get("build_number"), "26.1.2");
        assert_eq!(get("ts"), "1714564800");
        assert_eq!(get("_rticket"), "1714564800000");
        assert_eq!(get("aid"), APP_ID);
    }

    #[test]
    fn user_agent_embeds_the_version_code() {
        assert!(APP_PROFILES[0].user_agent().starts_with("com.ss.android.ugc.trill/260103 "));
    }
}
