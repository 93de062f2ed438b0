use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const PREVIEW_MARK: &str = "-preview.";

/// A runtime version such as `6.0.14` or `6.0.0-preview.3`.
///
/// `preview == 0` means a final release. `==` compares all four fields;
/// ordering only ever looks at `major.minor.patch` (see [`Version::release_cmp`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub preview: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            preview: 0,
        }
    }

    pub const fn preview(major: u16, minor: u16, patch: u16, preview: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            preview,
        }
    }

    /// Parses `M.m`, `M.m.p` or `M.m.p-preview.N[.anything]`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let s = s.trim();

        let (release, label) = match s.find(PREVIEW_MARK) {
            Some(pos) => (&s[..pos], Some(&s[pos + PREVIEW_MARK.len()..])),
            None => (s, None),
        };

        let mut parts = release.split('.');
        let major = parse_segment(parts.next()).ok_or_else(invalid)?;
        let minor = parse_segment(parts.next()).ok_or_else(invalid)?;
        let patch = match parts.next() {
            Some(seg) => parse_segment(Some(seg)).ok_or_else(invalid)?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        // 3.21201.4 -> 3
        let preview = match label {
            Some(label) => parse_segment(label.split('.').next()).ok_or_else(invalid)?,
            None => 0,
        };

        Ok(Self {
            major,
            minor,
            patch,
            preview,
        })
    }

    pub fn is_preview(&self) -> bool {
        self.preview != 0
    }

    pub fn is_zero(&self) -> bool {
        self.major == 0 && self.minor == 0 && self.patch == 0
    }

    pub fn is_equal(&self, other: &Version, only_major_minor: bool) -> bool {
        let same = self.major == other.major && self.minor == other.minor;
        if only_major_minor {
            same
        } else {
            same && self.patch == other.patch && self.preview == other.preview
        }
    }

    /// Lexicographic comparison of `(major, minor, patch)`. Preview numbers
    /// do not take part.
    pub fn release_cmp(&self, other: &Version) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }

    pub fn is_older_than(&self, other: &Version) -> bool {
        self.release_cmp(other) == Ordering::Less
    }

    pub fn is_at_most(&self, other: &Version) -> bool {
        self.release_cmp(other) != Ordering::Greater
    }

    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.release_cmp(other) == Ordering::Greater
    }

    pub fn is_at_least(&self, other: &Version) -> bool {
        self.release_cmp(other) != Ordering::Less
    }

    /// Whether an installed `candidate` satisfies `self` as a requirement.
    ///
    /// Major and minor must match and the candidate may carry a newer patch.
    /// Previews only ever match themselves exactly.
    pub fn is_compatible(&self, candidate: &Version) -> bool {
        if self.is_preview() || candidate.is_preview() {
            return self.is_equal(candidate, false);
        }
        self.major == candidate.major
            && self.minor == candidate.minor
            && candidate.patch >= self.patch
    }

    pub fn to_major_minor_string(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

fn parse_segment(seg: Option<&str>) -> Option<u16> {
    let seg = seg?;
    if seg.is_empty() || !seg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seg.parse().ok()
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.is_preview() {
            write!(f, "{}{}", PREVIEW_MARK, self.preview)?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u16, minor: u16, patch: u16) -> Version {
        Version::new(major, minor, patch)
    }

    fn p(major: u16, minor: u16, patch: u16, preview: u16) -> Version {
        Version::preview(major, minor, patch, preview)
    }

    #[test]
    fn parses_supported_forms() {
        let cases = [
            ("3.0.0", v(3, 0, 0)),
            ("3.0", v(3, 0, 0)),
            ("3.1.0", v(3, 1, 0)),
            ("3.1", v(3, 1, 0)),
            ("3.1.4", v(3, 1, 4)),
            ("6.0.0-preview.3.21201.4", p(6, 0, 0, 3)),
            ("6.0.0-preview.7", p(6, 0, 0, 7)),
            (" 5.0.5\r", v(5, 0, 5)),
        ];
        for (s, expected) in cases {
            assert_eq!(Version::parse(s).unwrap(), expected, "{s}");
        }
    }

    #[test]
    fn rejects_malformed_strings() {
        for s in [
            "",
            "6",
            "6.",
            ".1",
            "a.b",
            "6.x.1",
            "6.0.1.2",
            "6.0.0-preview.",
            "6.0.0-preview.x",
            "7.0.0-rc.2.22472.3",
            "-1.0",
            "70000.0",
        ] {
            assert!(Version::parse(s).is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn display_round_trips() {
        for ver in [v(3, 1, 14), v(0, 0, 0), p(6, 0, 0, 3), p(8, 1, 2, 11)] {
            let text = ver.to_string();
            assert_eq!(Version::parse(&text).unwrap(), ver, "{text}");
        }
        assert_eq!(p(6, 0, 0, 3).to_string(), "6.0.0-preview.3");
        assert_eq!(v(6, 1, 3).to_major_minor_string(), "6.1");
    }

    #[test]
    fn equality_modes() {
        assert!(v(6, 1, 3).is_equal(&v(6, 1, 9), true));
        assert!(!v(6, 1, 3).is_equal(&v(6, 1, 9), false));
        assert!(v(6, 0, 0).is_equal(&p(6, 0, 0, 3), true));
        assert!(!v(6, 0, 0).is_equal(&p(6, 0, 0, 3), false));
        assert_ne!(v(6, 0, 0), p(6, 0, 0, 3));
    }

    #[test]
    fn compatible_with_release_requirement() {
        let required = v(6, 1, 3);
        let cases = [
            (v(3, 0, 0), false),
            (v(3, 1, 0), false),
            (p(6, 0, 0, 2), false),
            (v(6, 0, 0), false),
            (v(6, 1, 0), false),
            (v(6, 1, 1), false),
            (v(6, 1, 3), true),
            (v(6, 1, 7), true),
            (v(6, 2, 0), false),
            (v(7, 0, 0), false),
            (v(7, 1, 3), false),
            (v(7, 2, 0), false),
        ];
        for (candidate, expected) in cases {
            assert_eq!(required.is_compatible(&candidate), expected, "{candidate}");
        }
    }

    #[test]
    fn preview_candidate_never_satisfies_release() {
        let required = v(6, 0, 0);
        for (candidate, expected) in [
            (p(6, 0, 0, 2), false),
            (p(6, 0, 0, 3), false),
            (p(6, 0, 0, 4), false),
            (v(6, 0, 0), true),
            (v(7, 0, 0), false),
        ] {
            assert_eq!(required.is_compatible(&candidate), expected, "{candidate}");
        }
    }

    #[test]
    fn preview_requirement_needs_exact_match() {
        let required = p(6, 0, 0, 3);
        for (candidate, expected) in [
            (v(3, 0, 0), false),
            (v(3, 1, 0), false),
            (p(6, 0, 0, 2), false),
            (p(6, 0, 0, 3), true),
            (p(6, 0, 0, 4), false),
            (v(6, 0, 0), false),
            (v(6, 1, 0), false),
            (v(7, 0, 0), false),
        ] {
            assert_eq!(required.is_compatible(&candidate), expected, "{candidate}");
        }
    }

    #[test]
    fn ordering_is_lexicographic() {
        // a field-wise AND of `<` would call both of these false
        assert!(v(6, 0, 12).is_older_than(&v(7, 0, 3)));
        assert!(v(6, 0, 12).is_older_than(&v(7, 0, 0)));
        assert!(v(6, 0, 12).is_older_than(&v(6, 0, 14)));
        assert!(!v(6, 0, 12).is_older_than(&v(6, 0, 12)));
        assert!(!v(6, 0, 12).is_older_than(&v(6, 0, 0)));
        assert!(!v(6, 0, 12).is_older_than(&v(5, 0, 0)));
        assert!(!v(6, 0, 12).is_older_than(&v(3, 1, 0)));

        assert!(v(7, 0, 3).is_newer_than(&v(6, 1, 12)));
        assert!(v(6, 2, 0).is_at_least(&v(6, 1, 9)));
        assert!(v(6, 1, 9).is_at_most(&v(6, 2, 0)));
        assert!(!v(6, 2, 0).is_at_most(&v(6, 1, 9)));
    }

    #[test]
    fn ordering_ignores_preview() {
        let preview = p(6, 0, 0, 2);
        let release = v(6, 0, 0);
        assert_eq!(preview.release_cmp(&release), Ordering::Equal);
        assert!(!preview.is_older_than(&release));
        assert!(!release.is_older_than(&preview));
        assert!(preview.is_at_most(&release));
        assert!(release.is_at_least(&preview));
        assert!(preview.is_older_than(&v(6, 0, 5)));
        assert!(preview.is_older_than(&v(7, 0, 0)));
    }
}
