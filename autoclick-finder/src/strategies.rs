//! The five ordered window-resolution strategies, evaluated in priority
//! order against the live top-level window list.

use autoclick_capture::win32::EnumeratedWindow;
use autoclick_ipc::FinderStrategies;

/// What the finder is looking for. Any field left `None`/empty disables
/// the corresponding strategy for this query, independent of the
/// `FinderStrategies` enable flags (both must agree for a strategy to run).
#[derive(Debug, Clone, Default)]
pub struct FinderQuery {
    pub process_basename: Option<String>,
    pub process_path_fragment: Option<String>,
    pub window_title_fragment: Option<String>,
    pub window_class_fragment: Option<String>,
    pub fuzzy_title_tokens: Vec<String>,
    pub enabled: FinderStrategies,
}

/// Tokenizes a window title the same way on both sides of the fuzzy-match
/// comparison: split on `.` and `_`, lowercase, keep tokens of length >= 3.
pub fn tokenize_title(title: &str) -> Vec<String> {
    title
        .split(|c| c == '.' || c == '_' || c.is_whitespace())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= 3)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyName {
    ProcessBasename,
    ProcessPath,
    WindowTitle,
    WindowClass,
    FuzzyTitle,
}

impl StrategyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyName::ProcessBasename => "process_basename",
            StrategyName::ProcessPath => "process_path",
            StrategyName::WindowTitle => "window_title",
            StrategyName::WindowClass => "window_class",
            StrategyName::FuzzyTitle => "fuzzy_title",
        }
    }
}

/// Runs the five strategies in priority order, returning the first
/// matching visible window and which strategy found it.
pub fn resolve<'a>(
    query: &FinderQuery,
    windows: &'a [EnumeratedWindow],
) -> Option<(&'a EnumeratedWindow, StrategyName)> {
    let candidates: Vec<&EnumeratedWindow> = windows.iter().filter(|w| w.visible).collect();

    if query.enabled.process_basename
        && let Some(text) = &query.process_basename
        && let Some(w) = candidates
            .iter()
            .find(|w| w.process_name.eq_ignore_ascii_case(text))
    {
        return Some((w, StrategyName::ProcessBasename));
    }

    if query.enabled.process_path
        && let Some(text) = &query.process_path_fragment
        && let Some(w) = candidates
            .iter()
            .find(|w| w.process_path.to_lowercase().contains(&text.to_lowercase()))
    {
        return Some((w, StrategyName::ProcessPath));
    }

    if query.enabled.window_title
        && let Some(text) = &query.window_title_fragment
        && let Some(w) = candidates
            .iter()
            .find(|w| w.title.to_lowercase().contains(&text.to_lowercase()))
    {
        return Some((w, StrategyName::WindowTitle));
    }

    if query.enabled.window_class
        && let Some(text) = &query.window_class_fragment
        && let Some(w) = candidates
            .iter()
            .find(|w| w.class_name.to_lowercase().contains(&text.to_lowercase()))
    {
        return Some((w, StrategyName::WindowClass));
    }

    if query.enabled.fuzzy_title && !query.fuzzy_title_tokens.is_empty() {
        let w = candidates.iter().find(|w| {
            let title_tokens = tokenize_title(&w.title);
            query
                .fuzzy_title_tokens
                .iter()
                .any(|t| title_tokens.contains(t))
        });
        if let Some(w) = w {
            return Some((w, StrategyName::FuzzyTitle));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(title: &str, class: &str, process: &str, path: &str) -> EnumeratedWindow {
        EnumeratedWindow {
            hwnd: 1,
            title: title.to_string(),
            class_name: class.to_string(),
            process_name: process.to_string(),
            process_path: path.to_string(),
            visible: true,
        }
    }

    #[test]
    fn tokenize_splits_on_dot_and_underscore_and_drops_short_tokens() {
        let tokens = tokenize_title("my_app.window_1 ab");
        assert_eq!(tokens, vec!["app".to_string(), "window".to_string()]);
    }

    #[test]
    fn process_basename_takes_priority_over_title() {
        let windows = vec![
            window("Notepad", "Notepad", "notepad.exe", "C:\\Windows\\notepad.exe"),
            window("Other", "Other", "other.exe", "C:\\other.exe"),
        ];
        let query = FinderQuery {
            process_basename: Some("notepad.exe".into()),
            window_title_fragment: Some("Other".into()),
            ..Default::default()
        };
        let (found, strategy) = resolve(&query, &windows).unwrap();
        assert_eq!(found.process_name, "notepad.exe");
        assert_eq!(strategy, StrategyName::ProcessBasename);
    }

    #[test]
    fn fuzzy_title_matches_on_shared_token() {
        let windows = vec![window("My App Window 1", "Chrome_WidgetWin_1", "app.exe", "C:\\app.exe")];
        let query = FinderQuery {
            fuzzy_title_tokens: vec!["app".to_string()],
            ..Default::default()
        };
        let (found, strategy) = resolve(&query, &windows).unwrap();
        assert_eq!(found.title, "My App Window 1");
        assert_eq!(strategy, StrategyName::FuzzyTitle);
    }

    #[test]
    fn disabled_strategy_is_skipped_even_with_a_matching_window() {
        let windows = vec![window("Notepad", "Notepad", "notepad.exe", "C:\\notepad.exe")];
        let mut enabled = FinderStrategies::default();
        enabled.process_basename = false;
        let query = FinderQuery {
            process_basename: Some("notepad.exe".into()),
            enabled,
            ..Default::default()
        };
        assert!(resolve(&query, &windows).is_none());
    }

    #[test]
    fn invisible_windows_are_never_candidates() {
        let mut w = window("Notepad", "Notepad", "notepad.exe", "C:\\notepad.exe");
        w.visible = false;
        let query = FinderQuery {
            process_basename: Some("notepad.exe".into()),
            ..Default::default()
        };
        assert!(resolve(&query, &[w]).is_none());
    }
}
