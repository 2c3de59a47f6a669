//! Colour-coded player messages.
//!
//! Messages carry inline codes introduced by `§`: a single hex digit selects
//! one of the sixteen palette colors, `#RRGGBB` selects an arbitrary color.
//! Hosts that cannot render colors call [`strip`].

use crate::models::{ServerVersion, TeamColor};

/// Marker that starts a color code.
pub const CODE_MARK: char = '§';

/// Legacy code for a palette color.
pub fn legacy(color: TeamColor) -> String {
    format!("{CODE_MARK}{}", color.legacy_code())
}

/// RGB code for an arbitrary color.
pub fn hex(rgb: u32) -> String {
    format!("{CODE_MARK}#{:06X}", rgb & 0xFF_FFFF)
}

/// Best code for `color` on the given server: RGB from 1.16, legacy before.
pub fn team_code(color: TeamColor, version: ServerVersion) -> String {
    if version.supports_hex_colors() {
        hex(color.rgb())
    } else {
        legacy(color)
    }
}

/// Prefix `text` with a palette color.
pub fn paint(color: TeamColor, text: impl AsRef<str>) -> String {
    format!("{}{}", legacy(color), text.as_ref())
}

/// Confirmation of a successful action.
pub fn success(text: impl AsRef<str>) -> String {
    paint(TeamColor::Green, text)
}

/// Neutral notice.
pub fn notice(text: impl AsRef<str>) -> String {
    paint(TeamColor::Yellow, text)
}

/// Failure reported to the issuing participant.
pub fn failure(text: impl AsRef<str>) -> String {
    paint(TeamColor::Red, text)
}

/// `Label: value` line as used by `info` and `stats`.
pub fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!(
        "{}{label}: {}{value}",
        legacy(TeamColor::Yellow),
        legacy(TeamColor::White)
    )
}

/// Section banner, e.g. `===== Teams =====`.
pub fn banner(title: impl AsRef<str>) -> String {
    success(format!("===== {} =====", title.as_ref()))
}

/// Drop every color code.
pub fn strip(message: &str) -> String {
    segments(message)
        .into_iter()
        .map(|segment| segment.text)
        .collect()
}

/// Run of text sharing one color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// RGB value, `None` for the host default.
    pub rgb: Option<u32>,
    /// Text with codes removed.
    pub text: String,
}

/// Split a message into colored runs. Unknown codes are kept as text.
pub fn segments(message: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut current = Segment {
        rgb: None,
        text: String::new(),
    };
    let mut rest = message;

    while let Some(pos) = rest.find(CODE_MARK) {
        current.text.push_str(&rest[..pos]);
        let after = &rest[pos + CODE_MARK.len_utf8()..];

        let parsed = if let Some(hex_digits) = after.strip_prefix('#') {
            hex_digits
                .get(..6)
                .and_then(|digits| u32::from_str_radix(digits, 16).ok())
                .map(|rgb| (rgb, 7))
        } else {
            after.chars().next().and_then(|ch| {
                let index = ch.to_digit(16)? as usize;
                Some((TeamColor::ALL[index].rgb(), ch.len_utf8()))
            })
        };

        match parsed {
            Some((rgb, consumed)) => {
                if !current.text.is_empty() {
                    out.push(current);
                }
                current = Segment {
                    rgb: Some(rgb),
                    text: String::new(),
                };
                rest = &after[consumed..];
            }
            None => {
                current.text.push(CODE_MARK);
                rest = after;
            }
        }
    }
    current.text.push_str(rest);
    if !current.text.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_code_depends_on_version() {
        let modern = ServerVersion::new(1, 16, 0);
        let legacy_server = ServerVersion::new(1, 15, 2);
        assert_eq!(team_code(TeamColor::DarkAqua, modern), "§#00AAAA");
        assert_eq!(team_code(TeamColor::DarkAqua, legacy_server), "§3");
    }

    #[test]
    fn segments_split_on_codes() {
        let message = format!("{}Hi {}there", success(""), hex(0x123456));
        let parts = segments(&message);
        assert_eq!(
            parts,
            vec![
                Segment {
                    rgb: Some(TeamColor::Green.rgb()),
                    text: "Hi ".to_string()
                },
                Segment {
                    rgb: Some(0x123456),
                    text: "there".to_string()
                },
            ]
        );
    }

    #[test]
    fn strip_keeps_unknown_codes() {
        assert_eq!(strip("§cred §zodd §#12zz"), "red §zodd §#12zz");
        assert_eq!(strip(&field("Level", 3)), "Level: 3");
    }
}
