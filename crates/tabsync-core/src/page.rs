//! URL classification for customer and action pages.
//!
//! A navigated URL is matched by path prefix against configurable pattern
//! sets. Customer and action ids are read from the `CustomerId` and
//! `ActionId` query parameters.

use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

/// Query parameter carrying the customer id.
pub const CUSTOMER_ID_PARAM: &str = "CustomerId";

/// Query parameter carrying the action id.
pub const ACTION_ID_PARAM: &str = "ActionId";

/// Default customer-page path prefixes.
pub const DEFAULT_CUSTOMER_PATHS: &[&str] =
    &["/CustomerScreenEntry.aspx", "/sante-cs-tabs-test/client"];

/// Default action-page path prefixes.
pub const DEFAULT_ACTION_PATHS: &[&str] = &[
    "/CustomerService/ActionScreen.aspx",
    "/sante-cs-tabs-test/action",
];

/// Result of classifying a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMatch {
    pub is_customer_page: bool,
    pub is_action_page: bool,
    pub is_main_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl PageMatch {
    /// Customer id when this is a customer page carrying one.
    pub fn customer(&self) -> Option<&str> {
        if self.is_customer_page {
            self.customer_id.as_deref()
        } else {
            None
        }
    }

    /// Customer and action ids when this is an action page carrying both.
    pub fn action(&self) -> Option<(&str, &str)> {
        if !self.is_action_page {
            return None;
        }
        match (self.customer_id.as_deref(), self.action_id.as_deref()) {
            (Some(customer_id), Some(action_id)) => Some((customer_id, action_id)),
            _ => None,
        }
    }
}

/// Path-prefix matcher for customer, action and main pages.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMatcher {
    pub customer_paths: Vec<String>,
    pub action_paths: Vec<String>,
    pub main_paths: Vec<String>,
}

impl Default for PageMatcher {
    fn default() -> Self {
        Self {
            customer_paths: DEFAULT_CUSTOMER_PATHS.iter().map(|s| s.to_string()).collect(),
            action_paths: DEFAULT_ACTION_PATHS.iter().map(|s| s.to_string()).collect(),
            main_paths: Vec::new(),
        }
    }
}

impl PageMatcher {
    pub fn new(
        customer_paths: Vec<String>,
        action_paths: Vec<String>,
        main_paths: Vec<String>,
    ) -> Self {
        Self {
            customer_paths,
            action_paths,
            main_paths,
        }
    }

    /// Classifies a URL. Unparseable URLs match nothing.
    pub fn classify(&self, url: &str) -> PageMatch {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!(url, error = %e, "Ignoring unparseable URL");
                return PageMatch::default();
            }
        };

        let path = parsed.path();
        let mut customer_id = None;
        let mut action_id = None;
        for (key, value) in parsed.query_pairs() {
            if key == CUSTOMER_ID_PARAM && customer_id.is_none() {
                customer_id = Some(value.into_owned());
            } else if key == ACTION_ID_PARAM && action_id.is_none() {
                action_id = Some(value.into_owned());
            }
        }

        PageMatch {
            is_customer_page: starts_with_any(path, &self.customer_paths),
            is_action_page: starts_with_any(path, &self.action_paths),
            is_main_page: starts_with_any(path, &self.main_paths),
            customer_id: customer_id.filter(|id| !id.is_empty()),
            action_id: action_id.filter(|id| !id.is_empty()),
        }
    }
}

fn starts_with_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}
