// Country and region suffixes of the identity provider's localized sign-in
// hosts (`accounts.google.<suffix>`).

/// Suffixes accepted after `accounts.google.` by the navigation gate.
pub const IDENTITY_DOMAIN_SUFFIXES: [&str; 187] = [
    "com", "ad", "ae", "com.af", "com.ag", "al", "am", "co.ao", "com.ar", "as", "at", "com.au",
    "az", "ba", "com.bd", "be", "bf", "bg", "com.bh", "bi", "bj", "com.bn", "com.bo", "com.br",
    "bs", "bt", "co.bw", "by", "com.bz", "ca", "cd", "cf", "cg", "ch", "ci", "co.ck", "cl",
    "cm", "cn", "com.co", "co.cr", "com.cu", "cv", "com.cy", "cz", "de", "dj", "dk", "dm",
    "com.do", "dz", "com.ec", "ee", "com.eg", "es", "com.et", "fi", "com.fj", "fm", "fr", "ga",
    "ge", "gg", "com.gh", "com.gi", "gl", "gm", "gr", "com.gt", "gy", "com.hk", "hn", "hr",
    "ht", "hu", "co.id", "ie", "co.il", "im", "co.in", "iq", "is", "it", "je", "com.jm", "jo",
    "co.jp", "co.ke", "com.kh", "ki", "kg", "co.kr", "com.kw", "kz", "la", "com.lb", "li",
    "lk", "co.ls", "lt", "lu", "lv", "com.ly", "co.ma", "md", "me", "mg", "mk", "ml", "com.mm",
    "mn", "com.mt", "mu", "mv", "mw", "com.mx", "com.my", "co.mz", "com.na", "com.ng",
    "com.ni", "ne", "nl", "no", "com.np", "nr", "nu", "co.nz", "com.om", "com.pa", "com.pe",
    "com.pg", "com.ph", "com.pk", "pl", "pn", "com.pr", "ps", "pt", "com.py", "com.qa", "ro",
    "ru", "rw", "com.sa", "com.sb", "sc", "se", "com.sg", "sh", "si", "sk", "com.sl", "sn",
    "so", "sm", "sr", "st", "com.sv", "td", "tg", "co.th", "com.tj", "tl", "tm", "tn", "to",
    "com.tr", "tt", "com.tw", "co.tz", "com.ua", "co.ug", "co.uk", "com.uy", "co.uz", "com.vc",
    "co.ve", "co.vi", "com.vn", "vu", "ws", "rs", "co.za", "co.zm", "co.zw", "cat",
];

/// Returns true if `suffix` is a supported identity-provider domain suffix.
pub fn is_identity_suffix(suffix: &str) -> bool {
    IDENTITY_DOMAIN_SUFFIXES.contains(&suffix)
}

/// Longest supported public suffix that `host` ends with (e.g. `co.uk` for
/// `www.google.co.uk`).
pub fn matching_public_suffix(host: &str) -> Option<&'static str> {
    IDENTITY_DOMAIN_SUFFIXES
        .iter()
        .copied()
        .filter(|suffix| {
            host.len() > suffix.len()
                && host.ends_with(suffix)
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
        })
        .max_by_key(|suffix| suffix.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_has_no_duplicates() {
        let unique: HashSet<_> = IDENTITY_DOMAIN_SUFFIXES.iter().collect();
        assert_eq!(unique.len(), IDENTITY_DOMAIN_SUFFIXES.len());
    }

    #[test]
    fn test_known_suffixes() {
        assert!(is_identity_suffix("com"));
        assert!(is_identity_suffix("co.uk"));
        assert!(is_identity_suffix("com.br"));
        assert!(!is_identity_suffix("evil"));
        assert!(!is_identity_suffix(""));
    }

    #[test]
    fn test_matching_public_suffix_prefers_longest() {
        assert_eq!(matching_public_suffix("www.google.co.uk"), Some("co.uk"));
        assert_eq!(matching_public_suffix("music.youtube.com"), Some("com"));
        assert_eq!(matching_public_suffix("example.invalid"), None);
        assert_eq!(matching_public_suffix("com"), None);
    }
}
