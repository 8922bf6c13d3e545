//! Declared mapping from mutation endpoints to the cached collections they touch.
//!
//! A route pattern such as `/tanks/{tank}/readings/{id}` is matched segment by
//! segment. Captured parameters are substituted into the collection templates,
//! so a PATCH to `/tanks/3/readings/9` can name `/tanks/3/readings` as the
//! list to patch and `9` as the item id.

use serde::Deserialize;
use std::collections::HashMap;

/// One declared route, as written in the config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
  pub pattern: String,
  pub collections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  Literal(String),
  Param(String),
}

#[derive(Debug, Clone)]
struct Route {
  segments: Vec<Segment>,
  collections: Vec<String>,
}

/// Result of matching an endpoint against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
  /// Collection endpoints with parameters filled in
  pub collections: Vec<String>,
  pub params: HashMap<String, String>,
  /// Value of the `{id}` parameter, or of the last parameter if none is named `id`
  pub item_id: Option<String>,
}

/// Ordered list of routes; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
  routes: Vec<Route>,
}

impl RouteTable {
  pub fn new(configs: &[RouteConfig]) -> Self {
    let routes = configs
      .iter()
      .map(|c| Route {
        segments: split_path(&c.pattern)
          .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
          })
          .collect(),
        collections: c.collections.clone(),
      })
      .collect();
    Self { routes }
  }

  pub fn is_empty(&self) -> bool {
    self.routes.is_empty()
  }

  /// Match an endpoint (query string ignored) against the declared routes.
  pub fn resolve(&self, endpoint: &str) -> Option<RouteMatch> {
    let path = endpoint.split(['?', '#']).next().unwrap_or_default();
    let parts: Vec<&str> = split_path(path).collect();

    self.routes.iter().find_map(|route| route.matches(&parts))
  }
}

impl Route {
  fn matches(&self, parts: &[&str]) -> Option<RouteMatch> {
    if parts.len() != self.segments.len() {
      return None;
    }

    let mut params = HashMap::new();
    let mut last_param = None;
    for (segment, part) in self.segments.iter().zip(parts) {
      match segment {
        Segment::Literal(lit) if lit == part => {}
        Segment::Literal(_) => return None,
        Segment::Param(name) => {
          params.insert(name.clone(), part.to_string());
          last_param = Some(part.to_string());
        }
      }
    }

    let collections = self
      .collections
      .iter()
      .map(|template| fill_template(template, &params))
      .collect();
    let item_id = params.get("id").cloned().or(last_param);

    Some(RouteMatch {
      collections,
      params,
      item_id,
    })
  }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
  path.split('/').filter(|s| !s.is_empty())
}

fn fill_template(template: &str, params: &HashMap<String, String>) -> String {
  params.iter().fold(template.to_string(), |acc, (name, value)| {
    acc.replace(&format!("{{{}}}", name), value)
  })
}
