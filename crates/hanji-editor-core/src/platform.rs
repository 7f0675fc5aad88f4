//! Platform detection for browser-specific workarounds.
//!
//! Detection is a pure function of the user agent so it can run anywhere the
//! strings are available; the browser crate feeds it from `navigator`.

/// Platform facts relevant to input workarounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platform {
    pub ios: bool,
    pub mac: bool,
    pub android: bool,
    pub chrome: bool,
    pub safari: bool,
    pub gecko: bool,
    pub webkit_version: Option<u32>,
    pub chrome_version: Option<u32>,
    pub mobile: bool,
}

impl Platform {
    /// Parse from `navigator.userAgent`, `navigator.platform` and
    /// `navigator.maxTouchPoints`.
    pub fn from_user_agent(user_agent: &str, platform: &str, max_touch_points: i32) -> Self {
        let user_agent = user_agent.to_lowercase();
        let platform_str = platform.to_lowercase();

        // iPadOS reports a Mac platform but has touch
        let ios = user_agent.contains("iphone")
            || user_agent.contains("ipad")
            || user_agent.contains("ipod")
            || (platform_str.contains("mac") && max_touch_points > 0);

        let mac = platform_str.contains("mac") && !ios;
        let android = user_agent.contains("android");

        // Edge also contains "chrome"
        let chrome = user_agent.contains("chrome") && !user_agent.contains("edg");
        let safari = user_agent.contains("safari") && !user_agent.contains("chrome");
        let gecko = user_agent.contains("gecko/") && !user_agent.contains("like gecko");

        let webkit_version = extract_version(&user_agent, "applewebkit/");
        let chrome_version = extract_version(&user_agent, "chrome/");

        let mobile =
            ios || android || user_agent.contains("mobile") || user_agent.contains("iemobile");

        Platform {
            ios,
            mac,
            android,
            chrome,
            safari,
            gecko,
            webkit_version,
            chrome_version,
            mobile,
        }
    }

    /// An iPhone running Safari, handy for tests and the CLI.
    pub fn ios_safari() -> Self {
        Self::from_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
            "iPhone",
            5,
        )
    }
}

fn extract_version(ua: &str, prefix: &str) -> Option<u32> {
    ua.find(prefix).and_then(|idx| {
        let after = &ua[idx + prefix.len()..];
        let version_str: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        version_str.parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iphone_safari() {
        let p = Platform::ios_safari();
        assert!(p.ios);
        assert!(p.safari);
        assert!(p.mobile);
        assert!(!p.mac);
        assert!(!p.chrome);
        assert_eq!(p.webkit_version, Some(605));
    }

    #[test]
    fn test_ipad_desktop_mode() {
        let p = Platform::from_user_agent(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
            "MacIntel",
            5,
        );
        assert!(p.ios);
        assert!(!p.mac);
    }

    #[test]
    fn test_android_chrome() {
        let p = Platform::from_user_agent(
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36",
            "Linux armv8l",
            5,
        );
        assert!(p.android);
        assert!(p.chrome);
        assert!(!p.safari);
        assert!(p.mobile);
        assert_eq!(p.chrome_version, Some(126));
    }

    #[test]
    fn test_desktop_firefox() {
        let p = Platform::from_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
            "Linux x86_64",
            0,
        );
        assert!(p.gecko);
        assert!(!p.mobile);
        assert!(!p.ios);
    }
}
