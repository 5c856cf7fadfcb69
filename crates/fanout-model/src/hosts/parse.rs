//! Line grammar for host list sources.
//!
//! ```text
//! %label              set the label for every following host
//! [user@]host[:port]  one target; anything after the first whitespace is ignored
//! ```

use super::LABEL_MARKER;

/// What a single source line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    /// Label marker. An empty marker clears the current label.
    Label(Option<&'a str>),
    /// A target entry.
    Target {
        user: Option<&'a str>,
        hostname: &'a str,
        port: Option<u16>,
    },
    /// Blank, comment or malformed.
    Skip,
}

pub(crate) fn parse_line(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if let Some(rest) = line.strip_prefix(LABEL_MARKER) {
        let label = rest.trim();
        return Line::Label((!label.is_empty()).then_some(label));
    }

    let Some(token) = line.split_whitespace().next() else {
        return Line::Skip;
    };

    let (user, rest) = match token.split_once('@') {
        Some((user, rest)) => {
            if !is_valid_user(user) {
                return Line::Skip;
            }
            (Some(user), rest)
        }
        None => (None, token),
    };

    // A non-numeric port is dropped, the target itself is kept.
    let (hostname, port) = match rest.rsplit_once(':') {
        Some((name, port)) => (name, port.parse::<u16>().ok().filter(|p| *p != 0)),
        None => (rest, None),
    };

    if !is_valid_hostname(hostname) {
        return Line::Skip;
    }
    Line::Target {
        user,
        hostname,
        port,
    }
}

fn is_valid_hostname(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_')
}

fn is_valid_user(user: &str) -> bool {
    !user.is_empty()
        && user
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_')
}
