use minijinja::Environment;
use serde_json::json;
use skein_action::ActionState;

use crate::error::RouteError;

/// A URL template rendered with minijinja.
///
/// The render context exposes:
/// - `query`: the action's query string
/// - `page`: shorthand for `state.current_page`
/// - `state`: the full action state (`current_page`, `data`, `last_link`, ...)
///
/// ```text
/// https://github.com/{{ query }}/followers?page={{ page }}
/// https://example.com/search?q={{ query | urlencode }}&cursor={{ state.data.cursor }}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
  source: String,
}

impl UrlTemplate {
  /// Compile-check the template.
  pub fn new(source: impl Into<String>) -> Result<Self, RouteError> {
    let source = source.into();
    Environment::new()
      .template_from_str(&source)
      .map_err(|e| RouteError::Template {
        message: format!("invalid template '{}': {}", source, e),
      })?;
    Ok(Self { source })
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn render(&self, query: &str, state: &ActionState) -> Result<String, RouteError> {
    let context = json!({
      "query": query,
      "page": state.current_page,
      "state": state,
    });

    Environment::new()
      .render_str(&self.source, context)
      .map(|url| url.trim().to_string())
      .map_err(|e| RouteError::Template {
        message: format!("failed to render '{}': {}", self.source, e),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_render_query_and_page() {
    let template = UrlTemplate::new("https://github.com/{{ query }}/followers?page={{ page }}").unwrap();
    let mut state = ActionState::default();
    state.current_page = 3;

    let url = template.render("isaacs", &state).unwrap();
    assert_eq!(url, "https://github.com/isaacs/followers?page=3");
  }

  #[test]
  fn test_render_reads_continuation_data() {
    let template = UrlTemplate::new(
      "https://example.com/search?q={{ query | urlencode }}&cursor={{ state.data.cursor }}",
    )
    .unwrap();
    let mut state = ActionState::default();
    state.data.insert("cursor".into(), json!("abc"));

    let url = template.render("rust lang", &state).unwrap();
    assert_eq!(url, "https://example.com/search?q=rust%20lang&cursor=abc");
  }

  #[test]
  fn test_invalid_template_rejected() {
    let err = UrlTemplate::new("https://example.com/{{ query").unwrap_err();
    assert!(matches!(err, RouteError::Template { .. }));
  }
}
