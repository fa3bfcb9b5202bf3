//! Target window discovery.
//!
//! The macro needs the on-screen rectangle of the game window so captures and
//! matches stay bounded. Discovery is a capability: the live implementation
//! enumerates visible top-level windows through `xcap`, while a fixed-region
//! implementation serves setups where enumeration is unavailable.

use crate::capture::Region;

/// A visible top-level window.
#[derive(Clone, Debug)]
pub struct WindowInfo {
    pub title: String,
    pub region: Region,
}

pub trait WindowLocator {
    fn list_visible_windows(&self) -> Vec<WindowInfo>;
}

/// Enumerates visible windows via `xcap`.
pub struct XcapWindowLocator;

impl WindowLocator for XcapWindowLocator {
    fn list_visible_windows(&self) -> Vec<WindowInfo> {
        let Ok(windows) = xcap::Window::all() else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for window in windows {
            if window.is_minimized().unwrap_or(true) {
                continue;
            }
            let Ok(title) = window.title() else { continue };
            if title.is_empty() {
                continue;
            }
            let (Ok(x), Ok(y), Ok(w), Ok(h)) =
                (window.x(), window.y(), window.width(), window.height())
            else {
                continue;
            };
            if w == 0 || h == 0 {
                continue;
            }
            found.push(WindowInfo {
                title,
                region: Region::new(x, y, x + w as i32, y + h as i32),
            });
        }
        found
    }
}

/// Always reports a single pre-configured window. Fallback for platforms or
/// sessions where window enumeration does not work.
pub struct FixedRegionLocator {
    pub title: String,
    pub region: Region,
}

impl WindowLocator for FixedRegionLocator {
    fn list_visible_windows(&self) -> Vec<WindowInfo> {
        vec![WindowInfo {
            title: self.title.clone(),
            region: self.region,
        }]
    }
}

/// Windows smaller than this are toasts/tooltips, not the game.
const MIN_WINDOW_DIMENSION: u32 = 200;

/// Finds the target window by case-insensitive title substring.
///
/// Among matching candidates the largest is kept: the game client is assumed
/// to be the biggest window carrying its name.
pub fn find_target_window(locator: &dyn WindowLocator, title_fragment: &str) -> Option<WindowInfo> {
    let needle = title_fragment.to_lowercase();
    locator
        .list_visible_windows()
        .into_iter()
        .filter(|w| w.title.to_lowercase().contains(&needle))
        .filter(|w| {
            w.region.width() > MIN_WINDOW_DIMENSION && w.region.height() > MIN_WINDOW_DIMENSION
        })
        .max_by_key(|w| w.region.area())
}
