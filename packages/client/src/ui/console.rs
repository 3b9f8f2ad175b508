//! Terminal rendering of chat and stream status.

use std::collections::BTreeMap;
use std::io::{self, Write};

use reqwest::Url;
use sajiki_shared::time::{format_uptime, local_clock, unix_seconds_to_rfc3339};
use tokio::time::Instant;

use crate::{
    domain::{
        CaptchaDigest, ChatMessage, Color, Indicator, SessionState, SessionUpdate, StatusView,
        TokenHash, UserStyle, Watching, style_map,
    },
    ui::session::Presenter,
    usecase::{HealthReport, SubmitError},
};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

fn fg(color: Color) -> String {
    let (r, g, b) = color.rgb();
    format!("\x1b[38;2;{r};{g};{b}m")
}

fn bg(color: Color) -> String {
    let (r, g, b) = color.rgb();
    format!("\x1b[48;2;{r};{g};{b}m")
}

/// Turn server-rendered message markup into plain text.
///
/// Tags are dropped and the HTML entities the server emits are decoded.
pub fn markup_to_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => text.push(c),
        }
    }
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Captcha image location for `digest`.
pub fn captcha_url(base: &Url, digest: &CaptchaDigest) -> Option<Url> {
    let mut url = base.join("/captcha.jpg").ok()?;
    url.query_pairs_mut().clear().append_pair("digest", digest.as_str());
    Some(url)
}

/// One status line, e.g. `[green] The stream is online. (4 viewers, up 1:30)`.
pub fn status_line(report: &HealthReport, now: Instant) -> String {
    let mut line = format!("[{}] {}", report.view.indicator, report.view.message);
    if let Some(snapshot) = &report.snapshot {
        let mut details = vec![format!("{} viewers", snapshot.viewers)];
        if let Some(uptime) = report.uptime_at(now) {
            details.push(format!("up {}", format_uptime(uptime)));
        }
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    line
}

fn indicator_color(indicator: Indicator) -> Color {
    match indicator {
        Indicator::Red => Color::from_rgb(0xe0, 0x40, 0x40),
        Indicator::Yellow => Color::from_rgb(0xe0, 0xc0, 0x40),
        Indicator::Green => Color::from_rgb(0x40, 0xc0, 0x60),
    }
}

/// Writes chat to stdout.
#[derive(Debug, Clone)]
pub struct Console {
    base_url: Url,
    styles: BTreeMap<TokenHash, UserStyle>,
    last_status: Option<StatusView>,
}

impl Console {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            styles: BTreeMap::new(),
            last_status: None,
        }
    }

    fn print(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        // A closed stdout leaves nothing useful to do with the error.
        let _ = writeln!(stdout, "\r{line}");
    }

    fn notice(&self, text: &str) {
        self.print(&format!("{BOLD}!{RESET} {text}"));
    }

    fn info(&self, text: &str) {
        self.print(&format!("* {text}"));
    }

    fn author(&self, token_hash: &TokenHash, state: &SessionState) -> String {
        let name = state.author_name(token_hash);
        let Some(style) = self.styles.get(token_hash) else {
            return name.to_string();
        };
        let mut author = format!("{}{name}{RESET}", fg(style.name_color));
        if style.broadcaster {
            author = format!("{BOLD}{author}");
        }
        if let (Some((fore, back)), Some(tripcode)) = (
            style.tripcode_colors,
            state.roster().get(token_hash).and_then(|u| u.tripcode.as_ref()),
        ) {
            author.push_str(&format!(" {}{}!{}{RESET}", fg(fore), bg(back), tripcode.digest));
        }
        author
    }

    fn print_message(&self, message: &ChatMessage, state: &SessionState) {
        self.print(&format!(
            "{} {}: {}",
            message.time,
            self.author(&message.token_hash, state),
            markup_to_text(&message.markup)
        ));
    }

    /// Print a heartbeat result when the status changed.
    pub fn show_health(&mut self, report: &HealthReport) {
        if self.last_status.as_ref() == Some(&report.view) {
            return;
        }
        self.last_status = Some(report.view.clone());
        self.print_status(report);
    }

    /// Print a heartbeat result unconditionally.
    pub fn print_status(&self, report: &HealthReport) {
        let color = fg(indicator_color(report.view.indicator));
        let mut line = format!(
            "{color}●{RESET} {} {}",
            local_clock(),
            status_line(report, Instant::now())
        );
        if let Some(started) = report
            .snapshot
            .as_ref()
            .and_then(|s| s.start_abs)
            .and_then(unix_seconds_to_rfc3339)
        {
            line.push_str(&format!(" started {started}"));
        }
        self.print(&line);
    }
}

impl Presenter for Console {
    fn present(&mut self, update: &SessionUpdate, state: &SessionState) {
        match update {
            SessionUpdate::Connection(connection) => self.info(&connection.to_string()),
            SessionUpdate::Snapshot { appended } => {
                self.styles = style_map(state.roster());
                if !state.title().is_empty() {
                    self.info(&format!("Title: {}", state.title()));
                }
                for message in appended {
                    self.print_message(message, state);
                }
                self.info(&format!("{} in chat", state.roster().len()));
            }
            SessionUpdate::Title(title) => self.info(&format!("Title: {title}")),
            SessionUpdate::Stats(Some(stats)) => self.info(&format!(
                "{} viewers, up {}",
                stats.viewership,
                format_uptime(stats.uptime.max(0.0) as u64)
            )),
            SessionUpdate::Stats(None) => self.info("The stream is offline"),
            SessionUpdate::Message(message) => self.print_message(message, state),
            SessionUpdate::Deleted(seqs) => {
                let seqs: Vec<String> = seqs.iter().map(|s| format!("#{}", s.value())).collect();
                self.info(&format!("Deleted {}", seqs.join(", ")));
            }
            SessionUpdate::Roster => self.styles = style_map(state.roster()),
            SessionUpdate::Acknowledged { clear } => {
                if !clear {
                    tracing::debug!("Acknowledged without clearing the draft");
                }
            }
            SessionUpdate::Notice(notice) => self.notice(notice),
            SessionUpdate::Captcha(digest) => match captcha_url(&self.base_url, digest) {
                Some(url) => self.notice(&format!(
                    "Captcha required: open {url} and reply with /answer TEXT"
                )),
                None => self.notice("Captcha required: reply with /answer TEXT"),
            },
            SessionUpdate::AppearanceChanged(appearance) => {
                let name = appearance
                    .name
                    .as_deref()
                    .unwrap_or(&state.default_names().anonymous);
                self.info(&format!(
                    "You are now {}{name}{RESET} ({})",
                    fg(appearance.color),
                    appearance.color
                ));
            }
            SessionUpdate::AppearanceRejected(errors) => {
                for error in errors {
                    self.notice(error);
                }
            }
        }
    }

    fn submit_failed(&mut self, error: &SubmitError) {
        self.notice(&error.to_string());
    }

    fn show_users(&mut self, state: &SessionState) {
        let mut users: Vec<_> = state.roster().iter().collect();
        users.sort_by(|(a, _), (b, _)| a.cmp(b));
        self.info(&format!("{} in chat:", users.len()));
        for (token_hash, user) in users {
            let watching = match user.watching {
                Watching::Yes => " (watching)",
                Watching::No | Watching::Unknown => "",
            };
            let tag = user
                .tag
                .as_deref()
                .map(|tag| format!(" [{tag}]"))
                .unwrap_or_default();
            self.print(&format!(
                "  {}{tag}{watching} {}",
                self.author(token_hash, state),
                token_hash.short()
            ));
        }
    }
}
