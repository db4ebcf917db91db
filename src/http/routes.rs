//! Route table
//!
//! An ordered list of `(pattern, parameter names, handler)`. The first
//! matching pattern wins, so declaration order matters.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Which handler serves a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Home,
    Find,
    Parse,
    Reference,
    Static {
        file: &'static str,
        content_type: &'static str,
    },
    /// Scanner bait: responds 404 and blocks the caller
    Trap,
}

pub struct Route {
    pub pattern: Regex,
    /// Template shown by the home handler
    pub template: &'static str,
    pub param_names: &'static [&'static str],
    pub handler: Handler,
    /// Whether the template appears in the home listing
    pub listed: bool,
}

impl Route {
    fn new(
        pattern: &str,
        template: &'static str,
        param_names: &'static [&'static str],
        handler: Handler,
    ) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("route pattern is valid"),
            template,
            param_names,
            handler,
            listed: handler != Handler::Trap,
        }
    }
}

pub static ROUTES: Lazy<Vec<Route>> = Lazy::new(|| {
    vec![
        Route::new(r"^/$", "/", &[], Handler::Home),
        Route::new(r"^/v1$", "/v1", &[], Handler::Home),
        Route::new(
            r"^/v1/find$",
            "/v1/find?ref=&book=&volume=&start=&end=",
            &[],
            Handler::Find,
        ),
        Route::new(r"^/v1/parse$", "/v1/parse?ref=&content=", &[], Handler::Parse),
        Route::new(
            r"^/v1/([^/]+)/([^/]+)(?:/([\d\-/]+))?$",
            "/v1/:book/:chapter/:verses",
            &["book", "chapter", "verses"],
            Handler::Reference,
        ),
        Route::new(
            r"^/favicon\.ico$",
            "/favicon.ico",
            &[],
            Handler::Static {
                file: "favicon.ico",
                content_type: "image/x-icon",
            },
        ),
        Route::new(
            r"^/apple-touch-icon\.png$",
            "/apple-touch-icon.png",
            &[],
            Handler::Static {
                file: "apple-touch-icon.png",
                content_type: "image/png",
            },
        ),
        Route::new(
            r"^/apple-touch-icon-precomposed\.png$",
            "/apple-touch-icon-precomposed.png",
            &[],
            Handler::Static {
                file: "apple-touch-icon.png",
                content_type: "image/png",
            },
        ),
        Route::new(r"^/\.env$", "/.env", &[], Handler::Trap),
        Route::new(r"^/wp-login\.php$", "/wp-login.php", &[], Handler::Trap),
        Route::new(r"^/xmlrpc\.php$", "/xmlrpc.php", &[], Handler::Trap),
        Route::new(r"^/wp-admin(?:/.*)?$", "/wp-admin", &[], Handler::Trap),
    ]
});

/// Templates listed by `/` and `/v1`, in declaration order
pub fn templates() -> Vec<&'static str> {
    ROUTES
        .iter()
        .filter(|route| route.listed)
        .map(|route| route.template)
        .collect()
}

/// A path parameter, numeric when the segment is an integer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl ParamValue {
    fn coerce(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => ParamValue::Int(n),
            Err(_) => ParamValue::Text(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// Named parameters captured from a path; unmatched optional groups are absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(&'static str, ParamValue)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0
            .iter()
            .find(|(param, _)| *param == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// First route matching `path`, with its parameters
pub fn match_route(path: &str) -> Option<(&'static Route, Params)> {
    ROUTES.iter().find_map(|route| {
        let caps = route.pattern.captures(path)?;
        let params = route
            .param_names
            .iter()
            .enumerate()
            .filter_map(|(i, &name)| {
                caps.get(i + 1)
                    .map(|m| (name, ParamValue::coerce(m.as_str())))
            })
            .collect();
        Some((route, Params(params)))
    })
}
