//! Declarative routes driven by CSS selectors.
//!
//! ```json
//! {
//!   "provider": "github",
//!   "name": "followers",
//!   "url": "https://github.com/{{ query }}/followers?page={{ page }}",
//!   "priority": 80,
//!   "concurrency": 2,
//!   "items": {
//!     "selector": ".follow-list-item",
//!     "fields": {
//!       "key": { "selector": "a.gravatar", "attr": "href" },
//!       "name": { "selector": ".follow-list-name" }
//!     }
//!   },
//!   "follow": [
//!     { "selector": ".follow-list-item a.gravatar", "attr": "href", "route": "profile", "strip_prefix": "/" }
//!   ],
//!   "next_page": { "selector": ".pagination a", "text": "Next" }
//! }
//! ```

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use skein_action::{DEFAULT_PRIORITY, RouteId};
use skein_fetch::Page;

use crate::error::RouteError;
use crate::route::{Route, RouteDescriptor};
use crate::template::UrlTemplate;

/// File format of a declarative route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDef {
  pub provider: String,
  pub name: String,
  pub url: String,
  #[serde(default = "default_priority")]
  pub priority: i64,
  #[serde(default)]
  pub concurrency: Option<usize>,
  /// Render the page before extraction.
  #[serde(default)]
  pub dynamic: bool,
  #[serde(default)]
  pub items: Option<ItemRule>,
  #[serde(default)]
  pub follow: Vec<FollowRule>,
  #[serde(default)]
  pub next_page: Option<NextPageRule>,
}

fn default_priority() -> i64 {
  DEFAULT_PRIORITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRule {
  /// One item per matched element.
  pub selector: String,
  #[serde(default)]
  pub fields: BTreeMap<String, FieldRule>,
}

/// How to read one item field.
///
/// Without `selector` the item element itself is read; without `attr` its
/// text content is taken. `location` reads the page URL instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
  #[serde(default)]
  pub selector: Option<String>,
  #[serde(default)]
  pub attr: Option<String>,
  #[serde(default)]
  pub location: bool,
}

/// Spawn one operation per matched element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRule {
  pub selector: String,
  /// Attribute holding the query; text content when absent.
  #[serde(default)]
  pub attr: Option<String>,
  pub route: String,
  #[serde(default)]
  pub provider: Option<String>,
  #[serde(default)]
  pub strip_prefix: Option<String>,
  #[serde(default)]
  pub priority: Option<i64>,
}

/// A next page exists when the selector matches (and, with `text`, when a
/// matched element's trimmed text equals it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextPageRule {
  pub selector: String,
  #[serde(default)]
  pub text: Option<String>,
}

struct CompiledField {
  name: String,
  selector: Option<Selector>,
  attr: Option<String>,
  location: bool,
}

struct CompiledItems {
  selector: Selector,
  fields: Vec<CompiledField>,
}

struct CompiledFollow {
  selector: Selector,
  rule: FollowRule,
}

struct CompiledNextPage {
  selector: Selector,
  text: Option<String>,
}

/// A [`Route`] compiled from a [`RouteDef`].
pub struct SelectorRoute {
  descriptor: RouteDescriptor,
  items: Option<CompiledItems>,
  follow: Vec<CompiledFollow>,
  next_page: Option<CompiledNextPage>,
}

impl SelectorRoute {
  /// Compile the URL template and every selector.
  pub fn compile(def: RouteDef) -> Result<Self, RouteError> {
    let id = RouteId::new(def.provider, def.name);
    let parse = |selector: &str| -> Result<Selector, RouteError> {
      Selector::parse(selector).map_err(|e| RouteError::Selector {
        route: id.clone(),
        selector: selector.to_string(),
        message: e.to_string(),
      })
    };

    let items = match &def.items {
      Some(rule) => {
        let mut fields = Vec::with_capacity(rule.fields.len());
        for (name, field) in &rule.fields {
          fields.push(CompiledField {
            name: name.clone(),
            selector: field.selector.as_deref().map(parse).transpose()?,
            attr: field.attr.clone(),
            location: field.location,
          });
        }
        Some(CompiledItems {
          selector: parse(&rule.selector)?,
          fields,
        })
      }
      None => None,
    };

    let follow = def
      .follow
      .iter()
      .map(|rule| {
        Ok(CompiledFollow {
          selector: parse(&rule.selector)?,
          rule: rule.clone(),
        })
      })
      .collect::<Result<Vec<_>, RouteError>>()?;

    let next_page = match &def.next_page {
      Some(rule) => Some(CompiledNextPage {
        selector: parse(&rule.selector)?,
        text: rule.text.clone(),
      }),
      None => None,
    };

    let url = UrlTemplate::new(def.url)?;
    let mut descriptor = RouteDescriptor::new(id, url)
      .with_priority(def.priority)
      .render_dynamically(def.dynamic);
    descriptor.concurrency = def.concurrency;

    Ok(Self {
      descriptor,
      items,
      follow,
      next_page,
    })
  }

  fn extract_items(&self, document: &Html, page: &Page) -> Vec<Value> {
    let Some(items) = &self.items else {
      return Vec::new();
    };

    document
      .select(&items.selector)
      .map(|element| {
        let fields: Map<String, Value> = items
          .fields
          .iter()
          .map(|field| {
            let value = if field.location {
              Some(page.location.clone())
            } else {
              let target = match &field.selector {
                Some(selector) => element.select(selector).next(),
                None => Some(element),
              };
              target.and_then(|el| read(el, field.attr.as_deref()))
            };
            (field.name.clone(), value.map(Value::String).unwrap_or(Value::Null))
          })
          .collect();
        Value::Object(fields)
      })
      .collect()
  }

  fn extract_operations(&self, document: &Html) -> Vec<Value> {
    let mut operations = Vec::new();
    for follow in &self.follow {
      for element in document.select(&follow.selector) {
        let Some(raw) = read(element, follow.rule.attr.as_deref()) else {
          continue;
        };
        let raw = raw.trim();
        let query = match &follow.rule.strip_prefix {
          Some(prefix) => raw.strip_prefix(prefix.as_str()).unwrap_or(raw),
          None => raw,
        };
        if query.is_empty() {
          continue;
        }

        let mut operation = Map::new();
        operation.insert("route".into(), json!(follow.rule.route));
        operation.insert("query".into(), json!(query));
        if let Some(provider) = &follow.rule.provider {
          operation.insert("provider".into(), json!(provider));
        }
        if let Some(priority) = follow.rule.priority {
          operation.insert("priority".into(), json!(priority));
        }
        operations.push(Value::Object(operation));
      }
    }
    operations
  }

  fn has_next_page(&self, document: &Html) -> bool {
    let Some(next) = &self.next_page else {
      return false;
    };

    let mut matches = document.select(&next.selector);
    match &next.text {
      Some(text) => matches.any(|el| el.text().collect::<String>().trim() == text),
      None => matches.next().is_some(),
    }
  }
}

fn read(element: ElementRef<'_>, attr: Option<&str>) -> Option<String> {
  match attr {
    Some(name) => element.value().attr(name).map(str::to_string),
    None => Some(element.text().collect::<String>()),
  }
}

impl Route for SelectorRoute {
  fn descriptor(&self) -> &RouteDescriptor {
    &self.descriptor
  }

  fn transform(&self, page: &Page) -> Result<Value, RouteError> {
    let document = Html::parse_document(&page.html);

    Ok(json!({
      "items": self.extract_items(&document, page),
      "operations": self.extract_operations(&document),
      "hasNextPage": self.has_next_page(&document),
    }))
  }
}

impl std::fmt::Debug for SelectorRoute {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SelectorRoute")
      .field("descriptor", &self.descriptor)
      .field("follow", &self.follow.len())
      .finish_non_exhaustive()
  }
}
