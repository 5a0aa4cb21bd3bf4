/// A retrieved page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
  /// Final location, after redirects.
  pub location: String,
  pub html: String,
}

impl Page {
  pub fn new(location: impl Into<String>, html: impl Into<String>) -> Self {
    Self {
      location: location.into(),
      html: html.into(),
    }
  }
}
