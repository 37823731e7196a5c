/*
[INPUT]:  Routes, editor URLs and notices from the controller
[OUTPUT]: Styled terminal output
[POS]:    CLI presentation - terminal Navigator/Notifier
[UPDATE]: When the terminal rendering of routes or notices changes
*/

use console::style;
use tasking_manager_contributor::{Navigator, NoticeLevel, Notifier, Route};
use tracing::info;
use url::Url;

/// Prints where the web client would go, relative to the site root
pub struct ConsoleNavigator {
    site_root: String,
}

impl ConsoleNavigator {
    /// Derive the site root from the API base URL (`…/api/v2` is dropped).
    pub fn from_api_base(api_base_url: &str) -> Self {
        let trimmed = api_base_url.trim_end_matches('/');
        let site_root = trimmed
            .strip_suffix("/api/v2")
            .unwrap_or(trimmed)
            .to_string();
        Self { site_root }
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: &Route) {
        info!(%route, "navigate");
        println!(
            "{} {}{}",
            style("→").cyan(),
            self.site_root,
            style(route.to_path()).bold()
        );
    }

    fn open_window(&self, url: &Url) {
        info!(%url, "open window");
        println!("{} Open the editor at {}", style("↗").cyan(), style(url).underlined());
    }
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => println!("{}", style(message).dim()),
            NoticeLevel::Warning => {
                println!("{} {}", style("!").yellow().bold(), style(message).yellow())
            }
            NoticeLevel::Error => {
                println!("{} {}", style("✗").red().bold(), style(message).red())
            }
        }
    }
}
