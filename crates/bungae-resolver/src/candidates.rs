//! Extension candidate ordering.

use bungae_config::Platform;

/// Build the prioritized extension suffix list for a probe.
///
/// Order: platform-specific variants for every source extension, then
/// `.native` variants (off-web, when preferred), then plain extensions.
/// Platform variants are omitted entirely for web.
pub fn extension_candidates(
    platform: Platform,
    prefer_native: bool,
    source_exts: &[String],
) -> Vec<String> {
    let mut suffixes =
        Vec::with_capacity(source_exts.len() * if platform.has_variants() { 3 } else { 1 });
    if platform.has_variants() {
        for ext in source_exts {
            suffixes.push(format!("{}.{ext}", platform.as_str()));
        }
        if prefer_native {
            for ext in source_exts {
                suffixes.push(format!("native.{ext}"));
            }
        }
    }
    for ext in source_exts {
        suffixes.push(ext.clone());
    }
    suffixes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["js".to_string(), "ts".to_string()]
    }

    #[test]
    fn test_ios_ordering() {
        let got = extension_candidates(Platform::Ios, true, &exts());
        assert_eq!(
            got,
            vec!["ios.js", "ios.ts", "native.js", "native.ts", "js", "ts"]
        );
    }

    #[test]
    fn test_native_skipped_when_not_preferred() {
        let got = extension_candidates(Platform::Android, false, &exts());
        assert_eq!(got, vec!["android.js", "android.ts", "js", "ts"]);
    }

    #[test]
    fn test_web_has_no_variants() {
        let got = extension_candidates(Platform::Web, true, &exts());
        assert_eq!(got, vec!["js", "ts"]);
    }
}
